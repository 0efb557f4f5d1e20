//! Export and part metadata.
//!
//! Metadata is a key-ordered map whose values may be live [`Type`]s. Those
//! force their assembly to stay loaded, so catalogs keep metadata in a
//! substituted form ([`TypeRef`]s) and translate back only when a consumer
//! reads it. [`PartMetadata`] is either a raw map or a
//! [`LazyMetadataWrapper`] performing that translation on access.

mod lazy;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::CompositionError;
use crate::reflection::{AssemblyName, Type, TypeRef};

pub use lazy::{Direction, LazyMetadataWrapper, PlainWrapper, WrapperFactory};

/// Raw metadata map. Keys are unique and iterate in order.
pub type Metadata = BTreeMap<String, MetadataValue>;

/// A single metadata value.
///
/// Live [`Type`] values cannot be serialized; substitute them first.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum MetadataValue {
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
    Json(serde_json::Value),
    #[serde(skip)]
    Type(Type),
    #[serde(skip)]
    Types(Vec<Type>),
    TypeRef(TypeRef),
    TypeRefs(Vec<TypeRef>),
}

impl MetadataValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_type(&self) -> Option<&Type> {
        match self {
            Self::Type(ty) => Some(ty),
            _ => None,
        }
    }

    pub fn as_types(&self) -> Option<&[Type]> {
        match self {
            Self::Types(types) => Some(types),
            _ => None,
        }
    }

    /// Assemblies this value refers to, without resolving anything.
    pub(crate) fn referenced_assemblies(&self) -> Vec<&AssemblyName> {
        match self {
            Self::Type(ty) => vec![ty.assembly()],
            Self::Types(types) => types.iter().map(Type::assembly).collect(),
            Self::TypeRef(r) => vec![r.assembly()],
            Self::TypeRefs(refs) => refs.iter().map(TypeRef::assembly).collect(),
            _ => Vec::new(),
        }
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<serde_json::Value> for MetadataValue {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

impl From<Type> for MetadataValue {
    fn from(value: Type) -> Self {
        Self::Type(value)
    }
}

impl From<Vec<Type>> for MetadataValue {
    fn from(value: Vec<Type>) -> Self {
        Self::Types(value)
    }
}

impl From<TypeRef> for MetadataValue {
    fn from(value: TypeRef) -> Self {
        Self::TypeRef(value)
    }
}

impl From<Vec<TypeRef>> for MetadataValue {
    fn from(value: Vec<TypeRef>) -> Self {
        Self::TypeRefs(value)
    }
}

/// Read-only metadata as seen by callers: a raw map or a lazy wrapper.
///
/// Clones share the wrapper, and with it any memoized substitutions.
#[derive(Clone, Debug)]
pub enum PartMetadata {
    Raw(Arc<Metadata>),
    Lazy(Arc<LazyMetadataWrapper>),
}

impl PartMetadata {
    pub fn raw(metadata: Metadata) -> Self {
        Self::Raw(Arc::new(metadata))
    }

    pub fn lazy(wrapper: LazyMetadataWrapper) -> Self {
        Self::Lazy(Arc::new(wrapper))
    }

    /// The raw dictionary under a wrapper, or the raw map itself.
    ///
    /// Values are returned as currently stored; no substitution runs.
    pub fn try_unwrap(&self) -> Arc<Metadata> {
        match self {
            Self::Raw(metadata) => metadata.clone(),
            Self::Lazy(wrapper) => wrapper.underlying(),
        }
    }

    /// Wrap `updated` the same way `self` is wrapped.
    ///
    /// Lazy metadata is rebuilt through its wrapper's [`WrapperFactory`], so
    /// specialized wrappers survive the round trip.
    pub fn rewrap(&self, updated: Metadata) -> Self {
        match self {
            Self::Raw(_) => Self::raw(updated),
            Self::Lazy(wrapper) => Self::lazy(wrapper.factory().clone_with(wrapper, updated)),
        }
    }

    pub fn as_wrapper(&self) -> Option<&LazyMetadataWrapper> {
        match self {
            Self::Raw(_) => None,
            Self::Lazy(wrapper) => Some(wrapper),
        }
    }

    pub fn get(&self, key: &str) -> Result<Option<MetadataValue>, CompositionError> {
        match self {
            Self::Raw(metadata) => Ok(metadata.get(key).cloned()),
            Self::Lazy(wrapper) => wrapper.get(key),
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        match self {
            Self::Raw(metadata) => metadata.contains_key(key),
            Self::Lazy(wrapper) => wrapper.contains_key(key),
        }
    }

    pub fn contains(&self, key: &str, value: &MetadataValue) -> Result<bool, CompositionError> {
        Ok(self.get(key)?.as_ref() == Some(value))
    }

    pub fn keys(&self) -> Vec<String> {
        match self {
            Self::Raw(metadata) => metadata.keys().cloned().collect(),
            Self::Lazy(wrapper) => wrapper.keys(),
        }
    }

    pub fn values(&self) -> Result<Vec<MetadataValue>, CompositionError> {
        match self {
            Self::Raw(metadata) => Ok(metadata.values().cloned().collect()),
            Self::Lazy(wrapper) => wrapper.values(),
        }
    }

    pub fn entries(&self) -> Result<Vec<(String, MetadataValue)>, CompositionError> {
        match self {
            Self::Raw(metadata) => Ok(metadata
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()),
            Self::Lazy(wrapper) => wrapper.entries(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Raw(metadata) => metadata.len(),
            Self::Lazy(wrapper) => wrapper.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn insert(&self, _key: &str, _value: MetadataValue) -> Result<(), CompositionError> {
        Err(CompositionError::ReadOnlyMetadata)
    }

    pub fn remove(&self, _key: &str) -> Result<(), CompositionError> {
        Err(CompositionError::ReadOnlyMetadata)
    }

    pub fn clear(&self) -> Result<(), CompositionError> {
        Err(CompositionError::ReadOnlyMetadata)
    }
}

impl Default for PartMetadata {
    fn default() -> Self {
        Self::raw(Metadata::new())
    }
}

impl From<Metadata> for PartMetadata {
    fn from(metadata: Metadata) -> Self {
        Self::raw(metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflection::{Assembly, Resolver};

    struct Marker;

    fn marker_type() -> Type {
        Assembly::builder("Markers", "1.0.0")
            .add_type::<Marker>()
            .build()
            .types()[0]
            .clone()
    }

    #[test]
    fn raw_metadata_rejects_writes() {
        let metadata = PartMetadata::raw(Metadata::from([("a".to_string(), 1i64.into())]));
        assert!(matches!(
            metadata.insert("b", true.into()),
            Err(CompositionError::ReadOnlyMetadata)
        ));
        assert!(matches!(metadata.remove("a"), Err(CompositionError::ReadOnlyMetadata)));
        assert!(matches!(metadata.clear(), Err(CompositionError::ReadOnlyMetadata)));
        assert_eq!(metadata.len(), 1);
    }

    #[test]
    fn try_unwrap_and_rewrap_pass_raw_maps_through() {
        let original = PartMetadata::raw(Metadata::from([("a".to_string(), "x".into())]));
        assert_eq!(original.try_unwrap().get("a"), Some(&MetadataValue::from("x")));

        let rewrapped = original.rewrap(Metadata::from([("b".to_string(), "y".into())]));
        assert!(rewrapped.as_wrapper().is_none());
        assert_eq!(rewrapped.keys(), vec!["b".to_string()]);
    }

    #[test]
    fn rewrap_keeps_wrapper_direction() {
        let resolver = Arc::new(Resolver::new());
        let wrapper = LazyMetadataWrapper::new(
            Metadata::new(),
            Direction::ToOriginalValue(resolver),
        );
        let original = PartMetadata::lazy(wrapper);

        let rewrapped = original.rewrap(Metadata::from([("k".to_string(), 3i64.into())]));
        let wrapper = rewrapped.as_wrapper().unwrap();
        assert!(wrapper.direction().is_to_original());
        assert_eq!(rewrapped.get("k").unwrap(), Some(MetadataValue::Int(3)));
    }

    #[test]
    fn substituted_metadata_serializes() {
        let ty = marker_type();
        let metadata = Metadata::from([
            ("name".to_string(), "marker".into()),
            ("type".to_string(), TypeRef::get(&ty).into()),
            ("extra".to_string(), serde_json::json!({ "n": 1 }).into()),
        ]);

        let json = serde_json::to_string(&metadata).unwrap();
        let restored: Metadata = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, metadata);
    }

    #[test]
    fn live_types_do_not_serialize() {
        let value = MetadataValue::Type(marker_type());
        assert!(serde_json::to_string(&value).is_err());
    }
}
