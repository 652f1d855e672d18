use anyhow::anyhow;
use tracing::debug;

use crate::{
    error::ShadeError,
    jar::{
        core::{assembly::parse_class, class_name, parse, remap_class, TypeRemapper},
        graph::{ClassGraph, ClassId},
        patterns::PackagePatterns,
    },
};

pub struct AnalyzedClass {
    pub id: ClassId,
    pub bytes: Vec<u8>,
}

/// Records every class a class file refers to as a dependency of its owner
/// and answers with the referenced class's output name.
struct GraphRemapper<'a> {
    graph: &'a mut ClassGraph,
    runtime: &'a mut PackagePatterns,
    owner: ClassId,
}

impl TypeRemapper for GraphRemapper<'_> {
    fn map_type(&mut self, internal_name: &str) -> String {
        if self.runtime.matches(internal_name) {
            return internal_name.to_owned();
        }
        let id = self.graph.get_or_create(internal_name);
        self.graph.add_dependency(self.owner, id);
        self.graph.record(id).output_name.clone()
    }
}

pub struct ClassAnalyzer {
    runtime: PackagePatterns,
    verify: bool,
}

impl ClassAnalyzer {
    pub fn new(runtime: PackagePatterns, verify: bool) -> Self {
        Self { runtime, verify }
    }

    /// Rewrites one class file and adds it, with its references, to `graph`.
    ///
    /// Returns `None` when a class of the same name was already analyzed from
    /// an earlier entry.
    pub fn analyze(
        &mut self,
        location: &str,
        bytes: &[u8],
        graph: &mut ClassGraph,
    ) -> Result<Option<AnalyzedClass>, ShadeError> {
        let class = parse(bytes).map_err(|err| ShadeError::class_analysis(location, err))?;
        let name = class_name(&class).map_err(|err| ShadeError::class_analysis(location, err))?;

        if let Some(existing) = graph.find(&name) {
            if graph.record(existing).analyzed {
                debug!("{} already analyzed, skipping {}", name, location);
                return Ok(None);
            }
        }

        let id = graph.get_or_create(&name);
        graph.mark_analyzed(id);

        let mut remapper = GraphRemapper {
            graph: &mut *graph,
            runtime: &mut self.runtime,
            owner: id,
        };
        let rewritten = remap_class(class, &mut remapper)
            .map_err(|err| ShadeError::class_analysis(location, err))?;

        if self.verify {
            parse_class(&rewritten)
                .map_err(|err| ShadeError::class_analysis(location, anyhow!("Parse: {}", err)))?;
        }

        debug!(
            "{} -> {} ({} dependencies)",
            name,
            graph.record(id).output_name,
            graph.record(id).dependencies().len()
        );
        Ok(Some(AnalyzedClass {
            id,
            bytes: rewritten,
        }))
    }
}
