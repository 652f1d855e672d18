use std::{
    collections::HashMap,
    fmt,
    path::PathBuf,
};

use indexmap::{IndexMap, IndexSet};
use tracing::{debug, warn};

use crate::jar::patterns::PackagePatterns;

pub const MANIFEST_NAME: &str = "META-INF/MANIFEST.MF";
pub const SERVICES_PREFIX: &str = "META-INF/services/";

/// Rewritten class bytes, filled by the analyzer and drained by the assembler.
pub type RewrittenClasses = HashMap<ClassId, Vec<u8>>;

/// Handle of a class record inside its [`ClassGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(usize);

#[derive(Debug)]
pub struct ClassRecord {
    pub original_name: String,
    pub output_name: String,
    pub analyzed: bool,
    dependencies: IndexSet<ClassId>,
}

impl ClassRecord {
    pub fn dependencies(
        &self,
    ) -> impl DoubleEndedIterator<Item = ClassId> + ExactSizeIterator + '_ {
        self.dependencies.iter().copied()
    }
}

/// Where the bytes of a pass-through resource come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceSource {
    ArchiveEntry { archive: PathBuf, entry: String },
    File(PathBuf),
}

impl fmt::Display for ResourceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceSource::ArchiveEntry { archive, entry } => {
                write!(f, "{}!/{}", archive.display(), entry)
            }
            ResourceSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDetails {
    pub entry_name: String,
    pub source: ResourceSource,
}

/// Registry of every class seen during one shading run.
///
/// Records are only ever created through [`ClassGraph::get_or_create`], which
/// also decides once and for all whether the class is an entry point.
pub struct ClassGraph {
    records: Vec<ClassRecord>,
    by_name: HashMap<String, ClassId>,
    entry_points: Vec<ClassId>,
    resources: IndexMap<String, ResourceDetails>,
    manifest: Option<ResourceDetails>,
    services: IndexMap<String, IndexSet<String>>,
    keep_packages: PackagePatterns,
    unshaded_packages: PackagePatterns,
    ignore_packages: PackagePatterns,
    shadow_prefix: String,
}

impl ClassGraph {
    pub fn new(
        keep_packages: PackagePatterns,
        unshaded_packages: PackagePatterns,
        ignore_packages: PackagePatterns,
        shadow_package: Option<&str>,
    ) -> Self {
        let shadow_prefix = match shadow_package.map(str::trim) {
            Some(package) if !package.is_empty() => {
                format!("{}/", package.trim_matches('.').replace('.', "/"))
            }
            _ => String::new(),
        };

        Self {
            records: Vec::new(),
            by_name: HashMap::new(),
            entry_points: Vec::new(),
            resources: IndexMap::new(),
            manifest: None,
            services: IndexMap::new(),
            keep_packages,
            unshaded_packages,
            ignore_packages,
            shadow_prefix,
        }
    }

    pub fn get_or_create(&mut self, class_name: &str) -> ClassId {
        if let Some(id) = self.by_name.get(class_name) {
            return *id;
        }

        let output_name = if self.unshaded_packages.matches(class_name) {
            class_name.to_owned()
        } else {
            format!("{}{}", self.shadow_prefix, class_name)
        };

        let id = ClassId(self.records.len());
        self.records.push(ClassRecord {
            original_name: class_name.to_owned(),
            output_name,
            analyzed: false,
            dependencies: IndexSet::new(),
        });
        self.by_name.insert(class_name.to_owned(), id);

        if self.keep_packages.matches(class_name) && !self.ignore_packages.matches(class_name) {
            debug!("Entry point: {}", class_name);
            self.entry_points.push(id);
        }

        id
    }

    pub fn find(&self, class_name: &str) -> Option<ClassId> {
        self.by_name.get(class_name).copied()
    }

    pub fn record(&self, id: ClassId) -> &ClassRecord {
        &self.records[id.0]
    }

    pub fn mark_analyzed(&mut self, id: ClassId) {
        self.records[id.0].analyzed = true;
    }

    /// Records that `from` refers to `to`. Self references are dropped.
    pub fn add_dependency(&mut self, from: ClassId, to: ClassId) {
        if from != to {
            self.records[from.0].dependencies.insert(to);
        }
    }

    pub fn entry_points(&self) -> &[ClassId] {
        &self.entry_points
    }

    pub fn is_entry_point(&self, id: ClassId) -> bool {
        self.entry_points.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Keeps the first manifest seen in the run.
    pub fn capture_manifest(&mut self, entry_path: &str, source: ResourceSource) -> bool {
        if entry_path != MANIFEST_NAME || self.manifest.is_some() {
            return false;
        }
        self.manifest = Some(ResourceDetails {
            entry_name: entry_path.to_owned(),
            source,
        });
        true
    }

    /// Merges a `META-INF/services/` provider configuration into the providers
    /// already seen for the same service type. Names are kept in internal
    /// form, in first-seen order and without duplicates.
    pub fn capture_services(&mut self, entry_path: &str, data: &[u8]) -> bool {
        let Some(service) = entry_path.strip_prefix(SERVICES_PREFIX) else {
            return false;
        };
        if service.is_empty() || service.contains('/') {
            return false;
        }

        let providers = self
            .services
            .entry(service.replace('.', "/"))
            .or_default();
        for line in String::from_utf8_lossy(data).lines() {
            let provider = line.split('#').next().unwrap_or_default().trim();
            if !provider.is_empty() {
                providers.insert(provider.replace('.', "/"));
            }
        }
        true
    }

    /// Keeps a non-class entry living under an unshaded package. The first
    /// entry for a given path wins.
    pub fn capture_resource(&mut self, entry_path: &str, source: ResourceSource) -> bool {
        if entry_path.ends_with(".class")
            || entry_path == MANIFEST_NAME
            || !self.unshaded_packages.matches(entry_path)
        {
            return false;
        }
        if let Some(existing) = self.resources.get(entry_path) {
            warn!(
                "Duplicate resource {} from {}, keeping {}",
                entry_path, source, existing.source
            );
            return false;
        }
        self.resources.insert(
            entry_path.to_owned(),
            ResourceDetails {
                entry_name: entry_path.to_owned(),
                source,
            },
        );
        true
    }

    pub fn manifest(&self) -> Option<&ResourceDetails> {
        self.manifest.as_ref()
    }

    pub fn resources(&self) -> impl ExactSizeIterator<Item = &ResourceDetails> {
        self.resources.values()
    }

    /// Service types with their providers, both as internal names.
    pub fn services(&self) -> impl Iterator<Item = (&str, &IndexSet<String>)> {
        self.services
            .iter()
            .map(|(service, providers)| (service.as_str(), providers))
    }
}
