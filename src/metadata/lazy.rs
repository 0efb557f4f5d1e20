use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::CompositionError;
use crate::reflection::{Resolver, TypeRef};

use super::{Metadata, MetadataValue};

/// Which way a [`LazyMetadataWrapper`] translates values on read.
#[derive(Clone, Debug)]
pub enum Direction {
    /// Replace live [`Type`](crate::reflection::Type)s with [`TypeRef`]s.
    ToSubstitutedValue,
    /// Reverse of [`ToSubstitutedValue`](Self::ToSubstitutedValue), loading
    /// assemblies through the resolver as needed.
    ToOriginalValue(Arc<Resolver>),
}

impl Direction {
    pub fn is_to_original(&self) -> bool {
        matches!(self, Self::ToOriginalValue(_))
    }
}

/// Rebuilds a wrapper of the same kind around new raw metadata.
///
/// [`PartMetadata::rewrap`](super::PartMetadata::rewrap) goes through this so
/// specialized wrappers can carry extra context across a rewrap.
pub trait WrapperFactory: Send + Sync + fmt::Debug {
    fn clone_with(&self, old: &LazyMetadataWrapper, new_metadata: Metadata) -> LazyMetadataWrapper;
}

/// Factory for wrappers with no extra context.
#[derive(Debug, Default)]
pub struct PlainWrapper;

impl WrapperFactory for PlainWrapper {
    fn clone_with(&self, old: &LazyMetadataWrapper, new_metadata: Metadata) -> LazyMetadataWrapper {
        LazyMetadataWrapper::new(new_metadata, old.direction().clone())
    }
}

/// Read-only metadata view that translates type values on access.
///
/// Scalar translations are recomputed on every read. Array translations are
/// written back into the underlying map under the same key, so later reads
/// find the translated array and skip the work. Writes are copy-on-write:
/// snapshots handed out earlier never change.
pub struct LazyMetadataWrapper {
    direction: Direction,
    underlying: RwLock<Arc<Metadata>>,
    factory: Arc<dyn WrapperFactory>,
}

impl LazyMetadataWrapper {
    pub fn new(metadata: Metadata, direction: Direction) -> Self {
        Self::with_factory(metadata, direction, Arc::new(PlainWrapper))
    }

    pub fn with_factory(
        metadata: Metadata,
        direction: Direction,
        factory: Arc<dyn WrapperFactory>,
    ) -> Self {
        Self {
            direction,
            underlying: RwLock::new(Arc::new(metadata)),
            factory,
        }
    }

    pub fn direction(&self) -> &Direction {
        &self.direction
    }

    pub fn factory(&self) -> &Arc<dyn WrapperFactory> {
        &self.factory
    }

    /// Current underlying map, including any memoized translations.
    pub fn underlying(&self) -> Arc<Metadata> {
        self.underlying.read().clone()
    }

    pub fn get(&self, key: &str) -> Result<Option<MetadataValue>, CompositionError> {
        let value = self.underlying.read().get(key).cloned();
        value
            .map(|value| self.substitute_value_if_required(key, value))
            .transpose()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.underlying.read().contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.underlying.read().keys().cloned().collect()
    }

    pub fn values(&self) -> Result<Vec<MetadataValue>, CompositionError> {
        Ok(self.entries()?.into_iter().map(|(_, value)| value).collect())
    }

    pub fn entries(&self) -> Result<Vec<(String, MetadataValue)>, CompositionError> {
        let snapshot = self.underlying();
        snapshot
            .iter()
            .map(|(key, value)| {
                let value = self.substitute_value_if_required(key, value.clone())?;
                Ok((key.clone(), value))
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.underlying.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn substitute_value_if_required(
        &self,
        key: &str,
        value: MetadataValue,
    ) -> Result<MetadataValue, CompositionError> {
        let (value, persist) = match (&self.direction, value) {
            (Direction::ToSubstitutedValue, MetadataValue::Type(ty)) => {
                (MetadataValue::TypeRef(TypeRef::get(&ty)), false)
            }
            (Direction::ToSubstitutedValue, MetadataValue::Types(types)) => {
                (MetadataValue::TypeRefs(types.iter().map(TypeRef::get).collect()), true)
            }
            (Direction::ToOriginalValue(resolver), MetadataValue::TypeRef(type_ref)) => {
                (MetadataValue::Type(resolver.resolve(&type_ref)?), false)
            }
            (Direction::ToOriginalValue(resolver), MetadataValue::TypeRefs(type_refs)) => {
                (MetadataValue::Types(resolver.resolve_all(&type_refs)?), true)
            }
            (_, value) => (value, false),
        };

        if persist {
            let mut underlying = self.underlying.write();
            Arc::make_mut(&mut underlying).insert(key.to_string(), value.clone());
        }

        Ok(value)
    }
}

impl fmt::Debug for LazyMetadataWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyMetadataWrapper")
            .field("direction", &self.direction)
            .field("underlying", &self.underlying())
            .field("factory", &self.factory)
            .finish()
    }
}
