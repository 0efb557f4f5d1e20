//! Dependency composition over declared parts.
//!
//! Discovery turns [`Type`]s into [`ComposablePartDefinition`]s collected in
//! an immutable [`ComposableCatalog`]. A [`CompositionConfiguration`]
//! resolves every import against the catalog's exports, and the
//! [`ExportProviderFactory`] it produces creates [`ExportProvider`]s that
//! instantiate parts on demand and dispose what they created.

pub mod catalog;
pub mod composition;
pub mod config;
pub mod error;
pub mod metadata;
pub mod reflection;
pub mod runtime;

pub use catalog::{
    AttributedPartDiscovery, ComposableCatalog, ComposablePartDefinition, ExportDefinition,
    ExportFilter, ImportCardinality, ImportDefinition, PartDeclaration, PartDiscovery,
    SharingPolicy,
};
pub use composition::builder::CompositionBuilder;
pub use composition::{CompositionConfiguration, CompositionDiagnostic, DiagnosticKind};
pub use config::{CompositionConfig, DisposalErrorPolicy};
pub use error::{CompositionError, DisposalFailure, PartError};
pub use metadata::{
    Direction, LazyMetadataWrapper, Metadata, MetadataValue, PartMetadata, PlainWrapper,
    WrapperFactory,
};
pub use reflection::{
    Assembly, AssemblyBuilder, AssemblyLoader, AssemblyName, Resolver, Type, TypeRef,
};
pub use runtime::{
    Disposable, Export, ExportProvider, ExportProviderFactory, ImportContext, LazyExport,
    PartInstance,
};
