use std::any::type_name;

use serde::{Deserialize, Serialize};

use crate::metadata::PartMetadata;
use crate::reflection::TypeRef;

/// Whether a container hands out one instance of a part or a new one per request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SharingPolicy {
    #[default]
    Shared,
    NonShared,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportCardinality {
    #[default]
    ExactlyOne,
    ZeroOrOne,
    ZeroOrMore,
}

impl ImportCardinality {
    pub fn allows_many(self) -> bool {
        self == Self::ZeroOrMore
    }

    pub fn is_required(self) -> bool {
        self == Self::ExactlyOne
    }
}

/// A dependency a part needs, matched against exports by contract name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportDefinition {
    contract_name: String,
    cardinality: ImportCardinality,
    lazy: bool,
    preferred_exporter: Option<TypeRef>,
}

impl ImportDefinition {
    pub fn new(contract_name: impl Into<String>, cardinality: ImportCardinality) -> Self {
        Self {
            contract_name: contract_name.into(),
            cardinality,
            lazy: false,
            preferred_exporter: None,
        }
    }

    pub fn exactly_one(contract_name: impl Into<String>) -> Self {
        Self::new(contract_name, ImportCardinality::ExactlyOne)
    }

    pub fn zero_or_one(contract_name: impl Into<String>) -> Self {
        Self::new(contract_name, ImportCardinality::ZeroOrOne)
    }

    pub fn zero_or_more(contract_name: impl Into<String>) -> Self {
        Self::new(contract_name, ImportCardinality::ZeroOrMore)
    }

    /// Exactly one export whose contract is the Rust type name of `T`.
    pub fn of<T: ?Sized>() -> Self {
        Self::exactly_one(type_name::<T>())
    }

    /// Satisfy through a [`LazyExport`](crate::runtime::LazyExport).
    ///
    /// Lazy imports do not count as construction dependencies, so they may
    /// close a cycle.
    pub fn lazy(mut self) -> Self {
        self.lazy = true;
        self
    }

    /// Pick this exporter when several parts export the contract.
    pub fn prefer(mut self, exporter: TypeRef) -> Self {
        self.preferred_exporter = Some(exporter);
        self
    }

    pub fn contract_name(&self) -> &str {
        &self.contract_name
    }

    pub fn cardinality(&self) -> ImportCardinality {
        self.cardinality
    }

    pub fn is_lazy(&self) -> bool {
        self.lazy
    }

    pub fn preferred_exporter(&self) -> Option<&TypeRef> {
        self.preferred_exporter.as_ref()
    }
}

/// A capability a part provides, with its metadata.
#[derive(Clone, Debug)]
pub struct ExportDefinition {
    contract_name: String,
    metadata: PartMetadata,
}

impl ExportDefinition {
    pub fn new(contract_name: impl Into<String>, metadata: impl Into<PartMetadata>) -> Self {
        Self {
            contract_name: contract_name.into(),
            metadata: metadata.into(),
        }
    }

    pub fn contract_name(&self) -> &str {
        &self.contract_name
    }

    pub fn metadata(&self) -> &PartMetadata {
        &self.metadata
    }
}

/// A part as stored in a catalog: identity, exports, imports and sharing.
///
/// Holds only [`TypeRef`]s, so building and merging catalogs never loads the
/// assemblies that declare the parts.
#[derive(Clone, Debug)]
pub struct ComposablePartDefinition {
    ty: TypeRef,
    metadata: PartMetadata,
    exports: Vec<ExportDefinition>,
    imports: Vec<ImportDefinition>,
    sharing: SharingPolicy,
}

impl ComposablePartDefinition {
    pub fn new(
        ty: TypeRef,
        exports: Vec<ExportDefinition>,
        imports: Vec<ImportDefinition>,
        sharing: SharingPolicy,
    ) -> Self {
        Self {
            ty,
            metadata: PartMetadata::default(),
            exports,
            imports,
            sharing,
        }
    }

    pub fn with_metadata(mut self, metadata: impl Into<PartMetadata>) -> Self {
        self.metadata = metadata.into();
        self
    }

    pub fn with_exports(&self, exports: Vec<ExportDefinition>) -> Self {
        Self {
            exports,
            ..self.clone()
        }
    }

    pub fn type_ref(&self) -> &TypeRef {
        &self.ty
    }

    pub fn metadata(&self) -> &PartMetadata {
        &self.metadata
    }

    pub fn exports(&self) -> &[ExportDefinition] {
        &self.exports
    }

    pub fn imports(&self) -> &[ImportDefinition] {
        &self.imports
    }

    pub fn sharing(&self) -> SharingPolicy {
        self.sharing
    }

    pub fn is_shared(&self) -> bool {
        self.sharing == SharingPolicy::Shared
    }
}
