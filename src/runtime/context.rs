use std::any::{type_name, Any};
use std::sync::Arc;

use crate::composition::ImportPlan;
use crate::error::CompositionError;
use crate::reflection::TypeRef;

use super::{Export, LazyExport, ProviderInner};

/// Hands a part factory the exports bound to the part's declared imports.
///
/// Only contracts the part declared as imports can be requested; anything
/// else fails with [`CompositionError::UndeclaredImport`].
pub struct ImportContext<'a> {
    provider: &'a Arc<ProviderInner>,
    part: usize,
}

impl<'a> ImportContext<'a> {
    pub(crate) fn new(provider: &'a Arc<ProviderInner>, part: usize) -> Self {
        Self { provider, part }
    }

    /// The part being constructed.
    pub fn part(&self) -> &TypeRef {
        self.provider.part_type(self.part)
    }

    fn import_plan(&self, contract: &str) -> Result<&'a ImportPlan, CompositionError> {
        let provider: &'a ProviderInner = self.provider;
        provider
            .part_plan(self.part)
            .import(contract)
            .ok_or_else(|| CompositionError::UndeclaredImport {
                part: self.part().to_string(),
                contract: contract.to_string(),
            })
    }

    /// The single export bound to `contract`.
    pub fn import_export(&self, contract: &str) -> Result<Export, CompositionError> {
        let plan = self.import_plan(contract)?;
        let export = plan
            .exports
            .first()
            .ok_or_else(|| CompositionError::ExportNotFound(contract.to_string()))?;
        self.provider.export(*export)
    }

    pub fn import<T: Any + Send + Sync>(&self, contract: &str) -> Result<Arc<T>, CompositionError> {
        self.import_export(contract)?.downcast()
    }

    /// Import by the Rust type name of `T`.
    pub fn import_of<T: Any + Send + Sync>(&self) -> Result<Arc<T>, CompositionError> {
        self.import(type_name::<T>())
    }

    /// `None` when a zero-or-one import found no exporter.
    pub fn import_optional<T: Any + Send + Sync>(
        &self,
        contract: &str,
    ) -> Result<Option<Arc<T>>, CompositionError> {
        let plan = self.import_plan(contract)?;
        plan.exports
            .first()
            .map(|export| self.provider.export(*export)?.downcast())
            .transpose()
    }

    pub fn import_exports(&self, contract: &str) -> Result<Vec<Export>, CompositionError> {
        let plan = self.import_plan(contract)?;
        plan.exports
            .iter()
            .map(|export| self.provider.export(*export))
            .collect()
    }

    pub fn import_many<T: Any + Send + Sync>(
        &self,
        contract: &str,
    ) -> Result<Vec<Arc<T>>, CompositionError> {
        self.import_exports(contract)?
            .iter()
            .map(Export::downcast)
            .collect()
    }

    /// The single export bound to `contract`, created on first use.
    pub fn import_lazy<T: Any + Send + Sync>(
        &self,
        contract: &str,
    ) -> Result<LazyExport<T>, CompositionError> {
        let plan = self.import_plan(contract)?;
        let export = plan
            .exports
            .first()
            .ok_or_else(|| CompositionError::ExportNotFound(contract.to_string()))?;
        Ok(LazyExport::new(self.provider, *export))
    }

    pub fn import_lazy_many<T: Any + Send + Sync>(
        &self,
        contract: &str,
    ) -> Result<Vec<LazyExport<T>>, CompositionError> {
        let plan = self.import_plan(contract)?;
        Ok(plan
            .exports
            .iter()
            .map(|export| LazyExport::new(self.provider, *export))
            .collect())
    }
}
