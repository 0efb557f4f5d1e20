//! The immutable set of parts available for composition.

mod declaration;
mod discovery;
mod filtered;
mod part;

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tracing::debug;

use crate::error::CompositionError;
use crate::metadata::PartMetadata;
use crate::reflection::{AssemblyName, TypeRef};

pub use declaration::{ExportDeclaration, PartDeclaration, PartFactory};
pub use discovery::{AttributedPartDiscovery, PartDiscovery};
pub use filtered::ExportFilter;
pub use part::{
    ComposablePartDefinition, ExportDefinition, ImportCardinality, ImportDefinition,
    SharingPolicy,
};

/// Immutable catalog of parts, unique by [`TypeRef`].
///
/// Adding a part whose type is already present replaces the earlier
/// definition in place (last write wins). Every "mutating" operation returns
/// a new catalog; clones share storage.
#[derive(Clone, Debug, Default)]
pub struct ComposableCatalog {
    parts: Arc<Vec<ComposablePartDefinition>>,
    index: Arc<HashMap<TypeRef, usize>>,
}

impl ComposableCatalog {
    pub fn create(parts: impl IntoIterator<Item = ComposablePartDefinition>) -> Self {
        Self::default().with_parts(parts)
    }

    /// New catalog with `part` added.
    ///
    /// `None` stands for an absent argument and is rejected.
    pub fn with_part(
        &self,
        part: Option<ComposablePartDefinition>,
    ) -> Result<Self, CompositionError> {
        let part = part.ok_or(CompositionError::ArgumentNull("part"))?;
        Ok(self.with_parts([part]))
    }

    pub fn with_parts(&self, parts: impl IntoIterator<Item = ComposablePartDefinition>) -> Self {
        let mut all = (*self.parts).clone();
        let mut index = (*self.index).clone();

        for part in parts {
            match index.get(part.type_ref()) {
                Some(&existing) => {
                    debug!(part = %part.type_ref(), "replacing part already in catalog");
                    all[existing] = part;
                }
                None => {
                    index.insert(part.type_ref().clone(), all.len());
                    all.push(part);
                }
            }
        }

        Self {
            parts: Arc::new(all),
            index: Arc::new(index),
        }
    }

    /// Merge another catalog into this one; its parts win on conflict.
    pub fn with_catalog(&self, other: &ComposableCatalog) -> Self {
        self.with_parts(other.parts.iter().cloned())
    }

    pub fn parts(&self) -> &[ComposablePartDefinition] {
        &self.parts
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn get_part(&self, ty: &TypeRef) -> Option<&ComposablePartDefinition> {
        self.index.get(ty).map(|&i| &self.parts[i])
    }

    /// Every assembly a part type, a preferred exporter, or a type-valued
    /// metadata entry lives in.
    ///
    /// Reads raw metadata, so no type is resolved and no lazy wrapper is
    /// touched.
    pub fn get_input_assemblies(&self) -> BTreeSet<AssemblyName> {
        let mut assemblies = BTreeSet::new();

        for part in self.parts.iter() {
            assemblies.insert(part.type_ref().assembly().clone());
            collect_metadata_assemblies(part.metadata(), &mut assemblies);

            for export in part.exports() {
                collect_metadata_assemblies(export.metadata(), &mut assemblies);
            }

            for import in part.imports() {
                if let Some(exporter) = import.preferred_exporter() {
                    assemblies.insert(exporter.assembly().clone());
                }
            }
        }

        assemblies
    }
}

fn collect_metadata_assemblies(metadata: &PartMetadata, assemblies: &mut BTreeSet<AssemblyName>) {
    for value in metadata.try_unwrap().values() {
        assemblies.extend(value.referenced_assemblies().into_iter().cloned());
    }
}
