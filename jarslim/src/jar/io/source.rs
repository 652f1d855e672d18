use std::{
    collections::{hash_map::Entry, HashMap},
    fs::{self, File},
    io::Read,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context};
use krakatau2::zip::ZipArchive;
use walkdir::WalkDir;

use crate::jar::graph::ResourceSource;

/// An input of a run: a jar/zip archive or a directory of compiled classes.
pub enum InputSource {
    Archive {
        path: PathBuf,
        zip: ZipArchive<File>,
    },
    Directory {
        root: PathBuf,
        /// Slash separated path relative to `root`, sorted.
        files: Vec<String>,
    },
}

/// One file inside an [`InputSource`].
pub struct SourceEntry {
    pub name: String,
    pub is_dir: bool,
    pub data: Vec<u8>,
}

impl InputSource {
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if path.is_dir() {
            let mut files = Vec::new();
            for entry in WalkDir::new(path) {
                let entry =
                    entry.with_context(|| format!("Failed to walk {}", path.display()))?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let relative = entry.path().strip_prefix(path)?;
                let name = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                files.push(name);
            }
            files.sort();
            return Ok(InputSource::Directory {
                root: path.to_owned(),
                files,
            });
        }

        let file =
            File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        let zip = ZipArchive::new(file)
            .with_context(|| format!("Failed to read archive {}", path.display()))?;
        Ok(InputSource::Archive {
            path: path.to_owned(),
            zip,
        })
    }

    pub fn path(&self) -> &Path {
        match self {
            InputSource::Archive { path, .. } => path,
            InputSource::Directory { root, .. } => root,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            InputSource::Archive { zip, .. } => zip.len(),
            InputSource::Directory { files, .. } => files.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads the entry at `index`, in archive order or sorted path order.
    /// Directory entries of archives come back empty.
    pub fn entry(&mut self, index: usize) -> anyhow::Result<SourceEntry> {
        match self {
            InputSource::Archive { path, zip } => {
                let mut file = zip.by_index(index).with_context(|| {
                    format!("Failed to read entry {} of {}", index, path.display())
                })?;
                let name = file.name().to_owned();
                let is_dir = file.is_dir();
                let mut data = Vec::new();
                if !is_dir {
                    file.read_to_end(&mut data).with_context(|| {
                        format!("Failed to read {}!/{}", path.display(), name)
                    })?;
                }
                Ok(SourceEntry { name, is_dir, data })
            }
            InputSource::Directory { root, files } => {
                let name = files
                    .get(index)
                    .ok_or_else(|| anyhow!("No entry {} in {}", index, root.display()))?
                    .clone();
                let full = root.join(&name);
                let data = fs::read(&full)
                    .with_context(|| format!("Failed to read {}", full.display()))?;
                Ok(SourceEntry {
                    name,
                    is_dir: false,
                    data,
                })
            }
        }
    }

    /// Where the assembler can find `entry_name` again later.
    pub fn resource_source(&self, entry_name: &str) -> ResourceSource {
        match self {
            InputSource::Archive { path, .. } => ResourceSource::ArchiveEntry {
                archive: path.clone(),
                entry: entry_name.to_owned(),
            },
            InputSource::Directory { root, .. } => ResourceSource::File(root.join(entry_name)),
        }
    }
}

/// Reads captured resources back, keeping each archive open once opened.
#[derive(Default)]
pub struct ResourceReader {
    archives: HashMap<PathBuf, ZipArchive<File>>,
}

impl ResourceReader {
    pub fn read(&mut self, source: &ResourceSource) -> anyhow::Result<Vec<u8>> {
        match source {
            ResourceSource::File(path) => {
                fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
            }
            ResourceSource::ArchiveEntry { archive, entry } => {
                let zip = match self.archives.entry(archive.clone()) {
                    Entry::Occupied(occupied) => occupied.into_mut(),
                    Entry::Vacant(vacant) => {
                        let file = File::open(archive)
                            .with_context(|| format!("Failed to open {}", archive.display()))?;
                        vacant.insert(ZipArchive::new(file)?)
                    }
                };
                let mut file = zip
                    .by_name(entry)
                    .with_context(|| format!("Failed to find {}", source))?;
                let mut data = Vec::new();
                file.read_to_end(&mut data)
                    .with_context(|| format!("Failed to read {}", source))?;
                Ok(data)
            }
        }
    }
}
