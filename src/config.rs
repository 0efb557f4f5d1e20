use serde::{Deserialize, Serialize};

use crate::error::CompositionError;

/// What [`ExportProvider::dispose`](crate::runtime::ExportProvider::dispose)
/// does when a part's own disposal fails. Either way every created part is
/// still disposed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisposalErrorPolicy {
    /// Log each failure, then return them together as
    /// [`CompositionError::Disposal`].
    #[default]
    Aggregate,
    /// Log each failure and report success.
    LogAndSwallow,
}

/// Options for resolution and for the export providers built from it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositionConfig {
    pub disposal_errors: DisposalErrorPolicy,
    /// Accept cycles that pass through at least one lazy import.
    pub allow_lazy_cycles: bool,
    /// Dispose an export provider when it is dropped.
    pub dispose_on_drop: bool,
}

impl Default for CompositionConfig {
    fn default() -> Self {
        Self {
            disposal_errors: DisposalErrorPolicy::Aggregate,
            allow_lazy_cycles: true,
            dispose_on_drop: true,
        }
    }
}

impl CompositionConfig {
    pub fn from_json_str(json: &str) -> Result<Self, CompositionError> {
        Ok(serde_json::from_str(json)?)
    }
}
