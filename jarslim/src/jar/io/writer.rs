use std::{
    collections::HashSet,
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context};
use krakatau2::file_output_util::Writer;
use tracing::{debug, info, warn};

use crate::{
    error::ShadeError,
    jar::{
        graph::{ClassGraph, RewrittenClasses, MANIFEST_NAME, SERVICES_PREFIX},
        io::source::ResourceReader,
        report::AnalysisReport,
    },
    types::{ShadeEvent, Stage, StageProgress},
};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AssemblyStats {
    pub classes_written: usize,
    pub classes_missing: usize,
    pub resources_written: usize,
    pub manifest_written: bool,
    pub services_written: usize,
}

/// Sibling of `output` the archive is built in. Keeps the extension, in lower
/// case, which is what selects the archive format.
pub fn partial_path(output: &Path) -> anyhow::Result<PathBuf> {
    let stem = output
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| anyhow!("Output path {} has no file name", output.display()))?;
    let ext = output
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| "jar".to_owned());
    Ok(output.with_file_name(format!(".{stem}-partial.{ext}")))
}

/// Writes every class reachable from the entry points, then the manifest, the
/// captured resources and the merged service files, and completes the class graph part of `report`.
///
/// The archive only appears at `output` once it is complete. On failure
/// nothing is left behind and an existing `output` is untouched.
pub fn assemble<W: Write>(
    graph: &ClassGraph,
    rewritten: &mut RewrittenClasses,
    output: &Path,
    report: &mut AnalysisReport<W>,
    mut report_progress: impl FnMut(ShadeEvent),
) -> Result<AssemblyStats, ShadeError> {
    report_progress(Stage::WritingArchive.into());
    let partial = partial_path(output).map_err(|err| ShadeError::archive_write(output, err))?;

    let result = write_archive(graph, rewritten, &partial, report, &mut report_progress)
        .and_then(|stats| {
            fs::rename(&partial, output).with_context(|| {
                format!("Failed to move {} to {}", partial.display(), output.display())
            })?;
            Ok(stats)
        });

    match result {
        Ok(stats) => {
            report_progress(ShadeEvent {
                stage: Stage::WritingArchive,
                progress: StageProgress::Done,
            });
            info!("Wrote {}", output.display());
            Ok(stats)
        }
        Err(err) => {
            if partial.exists() {
                if let Err(remove_err) = fs::remove_file(&partial) {
                    warn!("Failed to remove {}: {}", partial.display(), remove_err);
                }
            }
            Err(ShadeError::archive_write(output, err))
        }
    }
}

fn write_archive<W: Write>(
    graph: &ClassGraph,
    rewritten: &mut RewrittenClasses,
    path: &Path,
    report: &mut AnalysisReport<W>,
    report_progress: &mut impl FnMut(ShadeEvent),
) -> anyhow::Result<AssemblyStats> {
    let mut stats = AssemblyStats::default();
    let mut writer = Writer::new(path)?;
    let expected = rewritten.len().max(1);

    report.begin_class_graph()?;
    let mut visited = HashSet::new();
    let mut written = HashSet::new();
    for &entry_point in graph.entry_points() {
        // Same order as a recursive pre-order walk: children are pushed in
        // reverse and the visited check happens when a node is popped.
        let mut stack = vec![(entry_point, 0usize)];
        while let Some((id, depth)) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            let record = graph.record(id);
            if !record.analyzed {
                report.tree_line(depth, &record.original_name, false)?;
                stats.classes_missing += 1;
                continue;
            }

            let bytes = rewritten
                .remove(&id)
                .ok_or_else(|| anyhow!("No rewritten bytes for {}", record.original_name))?;
            let entry_name = format!("{}.class", record.output_name);
            writer
                .write(Some(&entry_name), &bytes)
                .with_context(|| format!("Failed to write {}", entry_name))?;
            report.tree_line(depth, &record.original_name, true)?;
            written.insert(id);
            stats.classes_written += 1;
            report_progress(ShadeEvent {
                stage: Stage::WritingArchive,
                progress: StageProgress::Percentage(stats.classes_written as f32 / expected as f32),
            });

            stack.extend(record.dependencies().rev().map(|dep| (dep, depth + 1)));
        }
    }
    debug!(
        "{} classes written, {} analyzed but unreachable",
        stats.classes_written,
        rewritten.len()
    );

    let mut reader = ResourceReader::default();
    if let Some(manifest) = graph.manifest() {
        let data = reader.read(&manifest.source)?;
        writer.write(Some(MANIFEST_NAME), &data)?;
        stats.manifest_written = true;
    }
    for resource in graph.resources() {
        let data = reader.read(&resource.source)?;
        writer
            .write(Some(&resource.entry_name), &data)
            .with_context(|| format!("Failed to write {}", resource.entry_name))?;
        stats.resources_written += 1;
    }

    for (service, providers) in graph.services() {
        let output_name = |name: &str| match graph.find(name) {
            Some(id) => graph.record(id).output_name.replace('/', "."),
            None => name.replace('/', "."),
        };
        // Providers that did not make it into the archive would fail lookups.
        let mut contents = String::new();
        for provider in providers {
            match graph.find(provider) {
                Some(id) if written.contains(&id) => {
                    contents.push_str(&output_name(provider));
                    contents.push('\n');
                }
                _ => debug!("Dropping provider {} of {}", provider, service),
            }
        }
        if contents.is_empty() {
            continue;
        }
        let entry_name = format!("{}{}", SERVICES_PREFIX, output_name(service));
        writer
            .write(Some(&entry_name), contents.as_bytes())
            .with_context(|| format!("Failed to write {}", entry_name))?;
        stats.services_written += 1;
    }

    // Dropping the writer finishes the archive.
    drop(writer);
    Ok(stats)
}
