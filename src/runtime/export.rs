use std::any::{type_name, Any};
use std::fmt;
use std::sync::{Arc, Weak};

use once_cell::sync::OnceCell;

use crate::composition::ExportRef;
use crate::error::CompositionError;
use crate::metadata::PartMetadata;

use super::ProviderInner;

/// A produced export value together with its contract and metadata.
#[derive(Clone)]
pub struct Export {
    contract_name: String,
    metadata: PartMetadata,
    value: Arc<dyn Any + Send + Sync>,
}

impl Export {
    pub(crate) fn new(
        contract_name: String,
        metadata: PartMetadata,
        value: Arc<dyn Any + Send + Sync>,
    ) -> Self {
        Self {
            contract_name,
            metadata,
            value,
        }
    }

    pub fn contract_name(&self) -> &str {
        &self.contract_name
    }

    /// Export metadata with type references restored to live types on read.
    pub fn metadata(&self) -> &PartMetadata {
        &self.metadata
    }

    pub fn value(&self) -> &Arc<dyn Any + Send + Sync> {
        &self.value
    }

    pub fn downcast<T: Any + Send + Sync>(&self) -> Result<Arc<T>, CompositionError> {
        self.value
            .clone()
            .downcast::<T>()
            .map_err(|_| CompositionError::ExportTypeMismatch {
                contract: self.contract_name.clone(),
                expected: type_name::<T>(),
            })
    }
}

impl fmt::Debug for Export {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Export")
            .field("contract_name", &self.contract_name)
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

/// An export whose value is produced on first [`value`](Self::value) call.
///
/// Metadata is available without creating the part. Holds only a weak
/// reference to its provider; once the provider is gone or disposed,
/// `value` fails with [`CompositionError::ObjectDisposed`].
pub struct LazyExport<T> {
    provider: Weak<ProviderInner>,
    export: ExportRef,
    contract_name: String,
    metadata: PartMetadata,
    value: OnceCell<Arc<T>>,
}

impl<T: Any + Send + Sync> LazyExport<T> {
    pub(crate) fn new(provider: &Arc<ProviderInner>, export: ExportRef) -> Self {
        Self {
            provider: Arc::downgrade(provider),
            export,
            contract_name: provider.contract_name(export).to_string(),
            metadata: provider.export_metadata(export).clone(),
            value: OnceCell::new(),
        }
    }

    pub fn contract_name(&self) -> &str {
        &self.contract_name
    }

    pub fn metadata(&self) -> &PartMetadata {
        &self.metadata
    }

    pub fn is_value_created(&self) -> bool {
        self.value.get().is_some()
    }

    pub fn value(&self) -> Result<Arc<T>, CompositionError> {
        self.value
            .get_or_try_init(|| {
                let provider = self
                    .provider
                    .upgrade()
                    .ok_or(CompositionError::ObjectDisposed)?;
                provider.export(self.export)?.downcast::<T>()
            })
            .cloned()
    }
}

impl<T> fmt::Debug for LazyExport<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyExport")
            .field("contract_name", &self.contract_name)
            .field("value_created", &self.value.get().is_some())
            .finish_non_exhaustive()
    }
}
