use tracing::info;

use crate::{
    jar::{
        analysis::{scan_inputs, ClassAnalyzer},
        graph::{ClassGraph, RewrittenClasses},
        io::assemble,
        patterns::PackagePatterns,
        report::AnalysisReport,
    },
    types::{ShadeEvent, ShadeSummary},
};

pub mod config;
pub mod error;
pub mod jar;
pub mod types;

pub use config::ShadeConfig;
pub use error::ShadeError;

/// Runs one shading pass as described by `config`.
///
/// Builds the class graph from every input, writes the reachable classes,
/// the manifest, unshaded resources and merged service files to the output archive, and leaves an
/// analysis report next to it. The report is written even when the run
/// fails.
pub fn shade(
    config: &ShadeConfig,
    mut report_progress: impl FnMut(ShadeEvent),
) -> Result<ShadeSummary, ShadeError> {
    config.validate()?;
    let output = config.output_path()?;
    let analysis = config.analysis_path()?;

    let mut report = AnalysisReport::create(&analysis)?;
    let mut graph = ClassGraph::new(
        PackagePatterns::new(&config.keep_packages),
        PackagePatterns::new(&config.unshaded_packages),
        PackagePatterns::new(&config.ignore_packages),
        config.shadow_package.as_deref(),
    );
    let mut analyzer = ClassAnalyzer::new(
        PackagePatterns::new(&config.runtime_packages),
        config.verify,
    );
    let mut rewritten = RewrittenClasses::new();

    let scan = scan_inputs(
        &config.inputs,
        &mut graph,
        &mut analyzer,
        &mut rewritten,
        &mut report,
        &mut report_progress,
    )?;
    let assembly = assemble(
        &graph,
        &mut rewritten,
        output,
        &mut report,
        &mut report_progress,
    )?;
    report.finish().map_err(anyhow::Error::from)?;

    let summary = ShadeSummary {
        input_files: scan.input_files,
        classes_analyzed: scan.classes_analyzed,
        classes_written: assembly.classes_written,
        classes_missing: assembly.classes_missing,
        resources_written: assembly.resources_written,
        manifest_written: assembly.manifest_written,
        services_written: assembly.services_written,
    };
    info!("Shaded {}: {}", output.display(), summary);
    Ok(summary)
}
