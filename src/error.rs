use thiserror::Error;

use crate::composition::CompositionDiagnostic;
use crate::reflection::{AssemblyName, TypeRef};

/// Error raised by part factories and disposers.
pub type PartError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum CompositionError {
    #[error("argument '{0}' must not be null")]
    ArgumentNull(&'static str),

    #[error("metadata is read-only")]
    ReadOnlyMetadata,

    #[error("assembly '{0}' is not registered with the resolver")]
    AssemblyNotFound(AssemblyName),

    #[error("type token {token:#010x} not found in assembly '{assembly}'")]
    TypeNotFound { assembly: AssemblyName, token: u32 },

    #[error("type '{0}' does not declare a part")]
    NotAPart(String),

    #[error("no export found for contract '{0}'")]
    ExportNotFound(String),

    #[error("{count} exports found for contract '{contract}', expected exactly one")]
    TooManyExports { contract: String, count: usize },

    #[error("export for contract '{contract}' is not of type '{expected}'")]
    ExportTypeMismatch {
        contract: String,
        expected: &'static str,
    },

    #[error("import '{contract}' is not declared by part '{part}'")]
    UndeclaredImport { part: String, contract: String },

    #[error("composition has errors:\n{}", format_diagnostics(.0))]
    Diagnostics(Vec<CompositionDiagnostic>),

    #[error("part '{part}' failed to construct: {source}")]
    Construction {
        part: TypeRef,
        #[source]
        source: PartError,
    },

    #[error("part '{0}' was requested while it is being constructed")]
    Reentrancy(TypeRef),

    #[error("export provider has been disposed")]
    ObjectDisposed,

    #[error("{} part(s) failed to dispose", .0.len())]
    Disposal(Vec<DisposalFailure>),

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

/// One part whose disposal failed.
#[derive(Debug)]
pub struct DisposalFailure {
    pub part: TypeRef,
    pub error: PartError,
}

fn format_diagnostics(diagnostics: &[CompositionDiagnostic]) -> String {
    diagnostics
        .iter()
        .map(|d| format!("  - {d}"))
        .collect::<Vec<_>>()
        .join("\n")
}
