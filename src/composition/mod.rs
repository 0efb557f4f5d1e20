//! Resolution of a catalog into an executable composition plan.

pub mod builder;
mod graph;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::warn;

use crate::catalog::{ComposableCatalog, ComposablePartDefinition, ImportDefinition};
use crate::config::CompositionConfig;
use crate::error::CompositionError;
use crate::reflection::{Resolver, TypeRef};
use crate::runtime::ExportProviderFactory;

/// Why a part was rejected from a composition.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DiagnosticKind {
    #[error("import '{contract}' has no matching export")]
    UnsatisfiedImport { contract: String },

    #[error("import '{contract}' matches several exports: {}", join(.candidates))]
    AmbiguousImport {
        contract: String,
        candidates: Vec<TypeRef>,
    },

    #[error("import '{contract}' prefers '{hint}', which does not export it")]
    ImportHintInvalid { contract: String, hint: TypeRef },

    #[error("part is on a construction cycle: {}", join(.cycle))]
    CyclicDependency { cycle: Vec<TypeRef> },
}

fn join(types: &[TypeRef]) -> String {
    types
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// A rejected part and the reason.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompositionDiagnostic {
    pub part: TypeRef,
    pub kind: DiagnosticKind,
}

impl fmt::Display for CompositionDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.part, self.kind)
    }
}

/// Index of an export within a [`CompositionPlan`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct ExportRef {
    pub part: usize,
    pub export: usize,
}

#[derive(Debug)]
pub(crate) struct ImportPlan {
    pub definition: ImportDefinition,
    pub exports: Vec<ExportRef>,
}

#[derive(Debug)]
pub(crate) struct PartPlan {
    pub definition: ComposablePartDefinition,
    pub imports: Vec<ImportPlan>,
}

impl PartPlan {
    pub fn import(&self, contract: &str) -> Option<&ImportPlan> {
        self.imports
            .iter()
            .find(|import| import.definition.contract_name() == contract)
    }
}

/// Surviving parts with every import bound to concrete exports.
#[derive(Debug, Default)]
pub(crate) struct CompositionPlan {
    pub parts: Vec<PartPlan>,
    pub exports_by_contract: HashMap<String, Vec<ExportRef>>,
}

/// A catalog resolved against itself.
///
/// Parts whose imports cannot be satisfied are rejected, transitively, and
/// reported through [`diagnostics`](Self::diagnostics). The remaining parts
/// form the plan an [`ExportProviderFactory`] executes.
#[derive(Clone, Debug)]
pub struct CompositionConfiguration {
    catalog: ComposableCatalog,
    plan: Arc<CompositionPlan>,
    diagnostics: Vec<CompositionDiagnostic>,
    config: CompositionConfig,
}

impl CompositionConfiguration {
    pub fn create(catalog: ComposableCatalog) -> Self {
        Self::with_config(catalog, CompositionConfig::default())
    }

    pub fn with_config(catalog: ComposableCatalog, config: CompositionConfig) -> Self {
        let graph::Resolution { plan, diagnostics } = graph::resolve(&catalog, &config);
        for diagnostic in &diagnostics {
            warn!(part = %diagnostic.part, reason = %diagnostic.kind, "rejected part");
        }

        Self {
            catalog,
            plan: Arc::new(plan),
            diagnostics,
            config,
        }
    }

    pub fn builder() -> builder::CompositionBuilder {
        builder::CompositionBuilder::new()
    }

    pub fn catalog(&self) -> &ComposableCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &CompositionConfig {
        &self.config
    }

    /// Parts that survived resolution.
    pub fn parts(&self) -> impl Iterator<Item = &ComposablePartDefinition> {
        self.plan.parts.iter().map(|part| &part.definition)
    }

    pub fn diagnostics(&self) -> &[CompositionDiagnostic] {
        &self.diagnostics
    }

    pub fn rejected_parts(&self) -> Vec<&TypeRef> {
        let mut rejected: Vec<&TypeRef> = Vec::new();
        for diagnostic in &self.diagnostics {
            if !rejected.contains(&&diagnostic.part) {
                rejected.push(&diagnostic.part);
            }
        }
        rejected
    }

    pub fn is_valid(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn throw_on_errors(&self) -> Result<(), CompositionError> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(CompositionError::Diagnostics(self.diagnostics.clone()))
        }
    }

    pub fn create_export_provider_factory(&self, resolver: Arc<Resolver>) -> ExportProviderFactory {
        ExportProviderFactory::new(self.plan.clone(), resolver, self.config.clone())
    }
}
