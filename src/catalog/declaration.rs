use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::catalog::{ImportDefinition, SharingPolicy};
use crate::error::PartError;
use crate::metadata::{Metadata, MetadataValue};
use crate::runtime::{Disposable, ImportContext, PartInstance};

/// Constructs a part instance, pulling its imports from the context.
pub type PartFactory =
    Arc<dyn Fn(&ImportContext<'_>) -> Result<PartInstance, PartError> + Send + Sync>;

/// One declared export. `contract` of `None` means the part's own type name.
#[derive(Clone, Debug)]
pub struct ExportDeclaration {
    pub(crate) contract: Option<String>,
    pub(crate) metadata: Metadata,
}

/// What a type declares about itself as a part, attached when the type is
/// added to an [`Assembly`](crate::reflection::Assembly).
///
/// A declaration with no exports describes a type that discovery skips.
#[derive(Clone)]
pub struct PartDeclaration {
    exports: Vec<ExportDeclaration>,
    imports: Vec<ImportDefinition>,
    sharing: SharingPolicy,
    metadata: Metadata,
    factory: PartFactory,
}

impl PartDeclaration {
    pub fn new<T, F>(factory: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&ImportContext<'_>) -> Result<T, PartError> + Send + Sync + 'static,
    {
        Self::from_factory(move |ctx| factory(ctx).map(PartInstance::new))
    }

    /// Like [`new`](Self::new), for parts the container must dispose.
    pub fn disposable<T, F>(factory: F) -> Self
    where
        T: Disposable + Any,
        F: Fn(&ImportContext<'_>) -> Result<T, PartError> + Send + Sync + 'static,
    {
        Self::from_factory(move |ctx| factory(ctx).map(PartInstance::disposable))
    }

    pub fn from_factory<F>(factory: F) -> Self
    where
        F: Fn(&ImportContext<'_>) -> Result<PartInstance, PartError> + Send + Sync + 'static,
    {
        Self {
            exports: Vec::new(),
            imports: Vec::new(),
            sharing: SharingPolicy::default(),
            metadata: Metadata::new(),
            factory: Arc::new(factory),
        }
    }

    /// Export under the part's own type name.
    pub fn export(self) -> Self {
        self.export_with_metadata(Metadata::new())
    }

    pub fn export_with_metadata(mut self, metadata: Metadata) -> Self {
        self.exports.push(ExportDeclaration {
            contract: None,
            metadata,
        });
        self
    }

    pub fn export_contract(mut self, contract: impl Into<String>, metadata: Metadata) -> Self {
        self.exports.push(ExportDeclaration {
            contract: Some(contract.into()),
            metadata,
        });
        self
    }

    pub fn import(mut self, import: ImportDefinition) -> Self {
        self.imports.push(import);
        self
    }

    pub fn non_shared(mut self) -> Self {
        self.sharing = SharingPolicy::NonShared;
        self
    }

    pub fn shared(mut self) -> Self {
        self.sharing = SharingPolicy::Shared;
        self
    }

    pub fn with_metadata(
        mut self,
        key: impl Into<String>,
        value: impl Into<MetadataValue>,
    ) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn exports(&self) -> &[ExportDeclaration] {
        &self.exports
    }

    pub fn imports(&self) -> &[ImportDefinition] {
        &self.imports
    }

    pub fn sharing(&self) -> SharingPolicy {
        self.sharing
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub(crate) fn factory(&self) -> &PartFactory {
        &self.factory
    }
}

impl fmt::Debug for PartDeclaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartDeclaration")
            .field("exports", &self.exports)
            .field("imports", &self.imports)
            .field("sharing", &self.sharing)
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}
