use futures::future::{try_join_all, BoxFuture};
use tracing::trace;

use crate::catalog::{ComposablePartDefinition, ExportDefinition};
use crate::error::CompositionError;
use crate::metadata::{Direction, LazyMetadataWrapper, Metadata, PartMetadata};
use crate::reflection::{AssemblyName, Resolver, Type};

/// Turns types into part definitions.
///
/// Implementations decide what makes a type a part; types that are not
/// parts yield `None` and are left out of the result.
pub trait PartDiscovery: Send + Sync {
    fn create_part(&self, ty: &Type) -> Result<Option<ComposablePartDefinition>, CompositionError>;

    fn create_parts<'a>(
        &'a self,
        types: &'a [Type],
    ) -> BoxFuture<'a, Result<Vec<ComposablePartDefinition>, CompositionError>> {
        Box::pin(async move {
            types
                .iter()
                .map(|ty| self.create_part(ty))
                .filter_map(Result::transpose)
                .collect()
        })
    }

    /// Load each assembly and discover parts among all of its types.
    fn create_parts_from_assemblies<'a>(
        &'a self,
        resolver: &'a Resolver,
        assemblies: &'a [AssemblyName],
    ) -> BoxFuture<'a, Result<Vec<ComposablePartDefinition>, CompositionError>> {
        Box::pin(async move {
            let loaded = assemblies
                .iter()
                .map(|name| resolver.load_assembly(name))
                .collect::<Result<Vec<_>, _>>()?;

            let batches = try_join_all(
                loaded
                    .iter()
                    .map(|assembly| self.create_parts(assembly.types())),
            )
            .await?;
            Ok(batches.into_iter().flatten().collect())
        })
    }
}

/// Discovers parts from the [`PartDeclaration`](crate::catalog::PartDeclaration)
/// attached to a type. Types without a declaration, or whose declaration
/// exports nothing, are not parts.
///
/// Export and part metadata are stored behind
/// [`Direction::ToSubstitutedValue`] wrappers so the catalog can be kept
/// without holding live types.
#[derive(Clone, Copy, Debug, Default)]
pub struct AttributedPartDiscovery;

impl AttributedPartDiscovery {
    pub fn new() -> Self {
        Self
    }
}

fn substituted(metadata: &Metadata) -> PartMetadata {
    PartMetadata::lazy(LazyMetadataWrapper::new(
        metadata.clone(),
        Direction::ToSubstitutedValue,
    ))
}

impl PartDiscovery for AttributedPartDiscovery {
    fn create_part(&self, ty: &Type) -> Result<Option<ComposablePartDefinition>, CompositionError> {
        let Some(declaration) = ty.part_declaration() else {
            trace!(ty = %ty, "no part declaration");
            return Ok(None);
        };
        if declaration.exports().is_empty() {
            trace!(ty = %ty, "part declaration has no exports");
            return Ok(None);
        }

        let exports = declaration
            .exports()
            .iter()
            .map(|export| {
                let contract = export
                    .contract
                    .clone()
                    .unwrap_or_else(|| ty.full_name().to_string());
                ExportDefinition::new(contract, substituted(&export.metadata))
            })
            .collect();

        let part = ComposablePartDefinition::new(
            ty.type_ref(),
            exports,
            declaration.imports().to_vec(),
            declaration.sharing(),
        )
        .with_metadata(substituted(declaration.metadata()));

        Ok(Some(part))
    }
}
