use std::{io::Write, path::PathBuf};

use anyhow::Context;
use tracing::{debug, info};

use crate::{
    error::ShadeError,
    jar::{
        analysis::analyzer::ClassAnalyzer,
        graph::{ClassGraph, RewrittenClasses, MANIFEST_NAME},
        io::InputSource,
        report::{AnalysisReport, Verdict},
    },
    types::{ShadeEvent, Stage, StageProgress},
};

const MODULE_INFO: &str = "module-info.class";
const VERSIONED_PREFIX: &str = "META-INF/versions/";

#[derive(Debug, Default)]
pub struct ScanStats {
    pub input_files: usize,
    pub classes_analyzed: usize,
}

/// Class entries that are never analyzed, whatever package they are in.
pub fn is_ignored_class(entry_name: &str) -> bool {
    entry_name == MODULE_INFO
        || entry_name.ends_with(&format!("/{MODULE_INFO}"))
        || entry_name.starts_with(VERSIONED_PREFIX)
}

/// Walks every entry of every input once, in order.
///
/// Class entries go through `analyzer`, the manifest and unshaded resources
/// are captured on `graph`, and every file gets a line in `report`.
pub fn scan_inputs<W: Write>(
    inputs: &[PathBuf],
    graph: &mut ClassGraph,
    analyzer: &mut ClassAnalyzer,
    rewritten: &mut RewrittenClasses,
    report: &mut AnalysisReport<W>,
    mut report_progress: impl FnMut(ShadeEvent),
) -> Result<ScanStats, ShadeError> {
    report_progress(Stage::LoadingInputs.into());
    let mut sources = Vec::with_capacity(inputs.len());
    for input in inputs {
        sources.push(InputSource::open(input)?);
    }
    let total: usize = sources.iter().map(InputSource::len).sum();
    report_progress(ShadeEvent {
        stage: Stage::LoadingInputs,
        progress: StageProgress::Done,
    });

    let mut stats = ScanStats::default();
    let mut done = 0;
    for source in &mut sources {
        info!("Scanning {} ({} entries)", source.path().display(), source.len());
        for index in 0..source.len() {
            done += 1;
            report_progress(ShadeEvent {
                stage: Stage::AnalyzingClasses,
                progress: StageProgress::Percentage(done as f32 / total as f32),
            });

            let entry = source.entry(index)?;
            if entry.is_dir {
                continue;
            }
            stats.input_files += 1;

            let origin = source.resource_source(&entry.name);
            let verdict = if entry.name.ends_with(".class") {
                if is_ignored_class(&entry.name) {
                    Verdict::Skipped
                } else {
                    match analyzer.analyze(&origin.to_string(), &entry.data, graph)? {
                        Some(analyzed) => {
                            stats.classes_analyzed += 1;
                            let output_name = graph.record(analyzed.id).output_name.clone();
                            rewritten.insert(analyzed.id, analyzed.bytes);
                            Verdict::Mapped(output_name)
                        }
                        None => Verdict::Skipped,
                    }
                }
            } else if graph.capture_services(&entry.name, &entry.data) {
                Verdict::Include
            } else if entry.name == MANIFEST_NAME {
                if graph.capture_manifest(&entry.name, origin) {
                    Verdict::Include
                } else {
                    Verdict::Skipped
                }
            } else if graph.capture_resource(&entry.name, origin) {
                Verdict::Include
            } else {
                Verdict::Skipped
            };

            debug!("{}: {:?}", entry.name, verdict);
            report
                .entry(&entry.name, &verdict)
                .context("Failed to write analysis report")?;
        }
    }

    report_progress(ShadeEvent {
        stage: Stage::AnalyzingClasses,
        progress: StageProgress::Done,
    });
    info!(
        "Analyzed {} classes, {} known to the graph, {} entry points",
        stats.classes_analyzed,
        graph.len(),
        graph.entry_points().len()
    );
    Ok(stats)
}
