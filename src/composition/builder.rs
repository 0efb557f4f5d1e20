use crate::catalog::{
    AttributedPartDiscovery, ComposableCatalog, ComposablePartDefinition, PartDiscovery,
};
use crate::config::CompositionConfig;
use crate::error::CompositionError;
use crate::reflection::Type;

use super::CompositionConfiguration;

/// Builder for creating a [`CompositionConfiguration`].
pub struct CompositionBuilder {
    catalog: ComposableCatalog,
    discovery: Box<dyn PartDiscovery>,
    config: CompositionConfig,
}

impl CompositionBuilder {
    pub fn new() -> Self {
        Self {
            catalog: ComposableCatalog::default(),
            discovery: Box::new(AttributedPartDiscovery),
            config: CompositionConfig::default(),
        }
    }

    /// Replace the discovery used by [`add_type`](Self::add_type).
    pub fn with_discovery(mut self, discovery: impl PartDiscovery + 'static) -> Self {
        self.discovery = Box::new(discovery);
        self
    }

    pub fn with_config(mut self, config: CompositionConfig) -> Self {
        self.config = config;
        self
    }

    /// Add an already discovered part.
    pub fn add_part(&mut self, part: ComposablePartDefinition) -> &mut Self {
        self.catalog = self.catalog.with_parts([part]);
        self
    }

    /// Discover a part from `ty` and add it.
    pub fn add_type(&mut self, ty: &Type) -> Result<&mut Self, CompositionError> {
        let part = self
            .discovery
            .create_part(ty)?
            .ok_or_else(|| CompositionError::NotAPart(ty.full_name().to_string()))?;
        Ok(self.add_part(part))
    }

    /// Add every part from `catalog`.
    pub fn add_catalog(&mut self, catalog: &ComposableCatalog) -> &mut Self {
        self.catalog = self.catalog.with_catalog(catalog);
        self
    }

    /// Resolve the collected parts.
    pub fn build(self) -> CompositionConfiguration {
        CompositionConfiguration::with_config(self.catalog, self.config)
    }
}

impl Default for CompositionBuilder {
    fn default() -> Self {
        Self::new()
    }
}
