use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::ShadeError;

pub const DEFAULT_RUNTIME_PACKAGES: &[&str] = &["java"];

/// Everything one shading run needs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShadeConfig {
    pub inputs: Vec<PathBuf>,
    pub output: Option<PathBuf>,
    /// Defaults to `<output>.analysis.txt`.
    pub analysis: Option<PathBuf>,
    /// Dotted package the shaded classes are moved under.
    pub shadow_package: Option<String>,
    pub keep_packages: Vec<String>,
    pub unshaded_packages: Vec<String>,
    pub ignore_packages: Vec<String>,
    pub runtime_packages: Vec<String>,
    pub verify: bool,
}

impl Default for ShadeConfig {
    fn default() -> Self {
        Self {
            inputs: Vec::new(),
            output: None,
            analysis: None,
            shadow_package: None,
            keep_packages: Vec::new(),
            unshaded_packages: Vec::new(),
            ignore_packages: Vec::new(),
            runtime_packages: DEFAULT_RUNTIME_PACKAGES
                .iter()
                .map(|p| p.to_string())
                .collect(),
            verify: true,
        }
    }
}

impl ShadeConfig {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config {}", path.display()))
    }

    pub fn validate(&self) -> Result<(), ShadeError> {
        if self.inputs.is_empty() {
            return Err(ShadeError::Config("no inputs given".into()));
        }
        let Some(output) = &self.output else {
            return Err(ShadeError::Config("no output archive given".into()));
        };
        let extension = output
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("jar" | "zip") => {}
            _ => {
                return Err(ShadeError::Config(format!(
                    "output {} must end in .jar or .zip",
                    output.display()
                )))
            }
        }

        let lists = [
            ("keep", &self.keep_packages),
            ("unshaded", &self.unshaded_packages),
            ("ignore", &self.ignore_packages),
            ("runtime", &self.runtime_packages),
        ];
        for (kind, packages) in lists {
            if packages.iter().any(|p| p.trim().is_empty()) {
                return Err(ShadeError::Config(format!("blank {kind} package")));
            }
        }
        if let Some(shadow) = &self.shadow_package {
            if shadow.contains('/') {
                return Err(ShadeError::Config(format!(
                    "shadow package `{shadow}` must be dotted"
                )));
            }
        }
        Ok(())
    }

    pub fn output_path(&self) -> Result<&Path, ShadeError> {
        self.output
            .as_deref()
            .ok_or_else(|| ShadeError::Config("no output archive given".into()))
    }

    pub fn analysis_path(&self) -> Result<PathBuf, ShadeError> {
        if let Some(analysis) = &self.analysis {
            return Ok(analysis.clone());
        }
        let mut path = self.output_path()?.as_os_str().to_owned();
        path.push(".analysis.txt");
        Ok(PathBuf::from(path))
    }
}
