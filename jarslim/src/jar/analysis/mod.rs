//! First half of a run: reading every input and building the class graph.

pub mod analyzer;
pub mod scanner;

pub use analyzer::{AnalyzedClass, ClassAnalyzer};
pub use scanner::{scan_inputs, ScanStats};
