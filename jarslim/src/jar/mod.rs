//! Class-graph shading for jar files
//!
//! - `patterns`: package name matching for the keep/unshaded/ignore/runtime sets
//! - `graph`: the class reference graph, manifest and resources of one run
//! - `core`: class file codec and symbolic reference remapping
//! - `analysis`: reading every input and populating the graph
//! - `io`: input sources and the output archive assembler
//! - `report`: the plain text analysis report
//!
//! # Example Usage
//!
//! ```no_run
//! use jarslim::{shade, ShadeConfig};
//!
//! let config = ShadeConfig {
//!     inputs: vec!["guava.jar".into(), "build/classes".into()],
//!     output: Some("build/libs/app-shaded.jar".into()),
//!     shadow_package: Some("org.acme.shadow".into()),
//!     keep_packages: vec!["org.acme.app".into()],
//!     unshaded_packages: vec!["org.acme.app".into()],
//!     ..Default::default()
//! };
//! let summary = shade(&config, |_| {})?;
//! println!("{summary}");
//! # Ok::<(), jarslim::ShadeError>(())
//! ```

pub mod analysis;
pub mod core;
pub mod graph;
pub mod io;
pub mod patterns;
pub mod report;

pub use analysis::{ClassAnalyzer, ScanStats};
pub use graph::{ClassGraph, ClassId, ClassRecord, ResourceDetails, ResourceSource};
pub use io::{assemble, AssemblyStats, InputSource};
pub use patterns::PackagePatterns;
pub use report::{AnalysisReport, Verdict};
