//! Class file parsing, symbolic reference remapping and reassembly.
//!
//! Classes are read with krakatau2, re-pointed at relocated pool constants and
//! written back through a round trip disassembly.

pub mod assembly;
pub mod descriptor;
pub mod remap;

#[cfg(test)]
pub(crate) mod fixtures;

pub use remap::{class_name, parse, remap_class, RemapError, TypeRemapper};
