use std::fmt;

#[derive(Debug)]
pub struct ShadeEvent {
    pub stage: Stage,
    pub progress: StageProgress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    LoadingInputs,
    AnalyzingClasses,
    WritingArchive,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::LoadingInputs => "Loading Inputs",
            Stage::AnalyzingClasses => "Analyzing Classes",
            Stage::WritingArchive => "Writing Archive",
        }
    }
}

impl From<Stage> for ShadeEvent {
    fn from(value: Stage) -> Self {
        ShadeEvent {
            stage: value,
            progress: StageProgress::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StageProgress {
    Unknown,
    Percentage(f32),
    Done,
}

/// What a successful run produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShadeSummary {
    pub input_files: usize,
    pub classes_analyzed: usize,
    pub classes_written: usize,
    pub classes_missing: usize,
    pub resources_written: usize,
    pub manifest_written: bool,
    pub services_written: usize,
}

impl fmt::Display for ShadeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} input files, {} classes analyzed, {} written, {} not included, {} resources",
            self.input_files,
            self.classes_analyzed,
            self.classes_written,
            self.classes_missing,
            self.resources_written
        )?;
        if self.services_written > 0 {
            write!(f, ", {} service files", self.services_written)?;
        }
        if self.manifest_written {
            write!(f, ", manifest")?;
        }
        Ok(())
    }
}
