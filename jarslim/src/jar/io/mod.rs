//! Reading inputs and writing the output archive.

pub mod source;
pub mod writer;

pub use source::{InputSource, ResourceReader};
pub use writer::{assemble, AssemblyStats};
