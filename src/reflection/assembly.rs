use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::sync::Arc;

use crate::catalog::PartDeclaration;

use super::{AssemblyName, TypeRef, FIRST_TYPE_TOKEN};

struct TypeDefinition {
    full_name: String,
    assembly: AssemblyName,
    token: u32,
    type_id: TypeId,
    part: Option<PartDeclaration>,
}

/// Live handle to a type in a loaded [`Assembly`].
///
/// Cheap to clone. Equality follows [`TypeRef`]: same assembly, same token.
#[derive(Clone)]
pub struct Type(Arc<TypeDefinition>);

impl Type {
    pub fn full_name(&self) -> &str {
        &self.0.full_name
    }

    pub fn assembly(&self) -> &AssemblyName {
        &self.0.assembly
    }

    pub fn token(&self) -> u32 {
        self.0.token
    }

    /// The Rust type this definition was registered for.
    pub fn type_id(&self) -> TypeId {
        self.0.type_id
    }

    pub fn is<T: Any>(&self) -> bool {
        self.0.type_id == TypeId::of::<T>()
    }

    /// Export/import declaration, if the type was registered as a part.
    pub fn part_declaration(&self) -> Option<&PartDeclaration> {
        self.0.part.as_ref()
    }

    pub fn type_ref(&self) -> TypeRef {
        TypeRef::get(self)
    }
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
            || (self.0.token == other.0.token && self.0.assembly == other.0.assembly)
    }
}

impl Eq for Type {}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Type({})", self.0.full_name)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.full_name)
    }
}

struct AssemblyInner {
    name: AssemblyName,
    types: Vec<Type>,
}

/// A loaded unit of type definitions.
#[derive(Clone)]
pub struct Assembly(Arc<AssemblyInner>);

impl Assembly {
    pub fn builder(name: impl Into<String>, version: impl Into<String>) -> AssemblyBuilder {
        AssemblyBuilder::new(name, version)
    }

    pub fn name(&self) -> &AssemblyName {
        &self.0.name
    }

    /// All types in declaration order.
    pub fn types(&self) -> &[Type] {
        &self.0.types
    }

    pub fn type_by_token(&self, token: u32) -> Option<&Type> {
        let index = token.checked_sub(FIRST_TYPE_TOKEN)? as usize;
        self.0.types.get(index)
    }

    pub fn type_by_name(&self, full_name: &str) -> Option<&Type> {
        self.0.types.iter().find(|ty| ty.full_name() == full_name)
    }

    pub fn get_type<T: Any>(&self) -> Option<&Type> {
        self.0.types.iter().find(|ty| ty.is::<T>())
    }
}

impl fmt::Debug for Assembly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Assembly")
            .field("name", &self.0.name)
            .field("types", &self.0.types)
            .finish()
    }
}

/// Declares the types of an [`Assembly`].
///
/// Tokens are assigned in declaration order starting at [`FIRST_TYPE_TOKEN`].
pub struct AssemblyBuilder {
    name: AssemblyName,
    types: Vec<(String, TypeId, Option<PartDeclaration>)>,
}

impl AssemblyBuilder {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: AssemblyName::new(name, version),
            types: Vec::new(),
        }
    }

    /// Declare a plain type that is not a part.
    pub fn add_type<T: Any>(mut self) -> Self {
        self.types.push((type_name::<T>().to_string(), TypeId::of::<T>(), None));
        self
    }

    /// Declare a part type named after the Rust type.
    pub fn add_part<T: Any>(self, declaration: PartDeclaration) -> Self {
        self.add_part_named::<T>(type_name::<T>(), declaration)
    }

    pub fn add_part_named<T: Any>(
        mut self,
        full_name: impl Into<String>,
        declaration: PartDeclaration,
    ) -> Self {
        self.types
            .push((full_name.into(), TypeId::of::<T>(), Some(declaration)));
        self
    }

    pub fn build(self) -> Assembly {
        let Self { name, types } = self;
        let types = types
            .into_iter()
            .zip(FIRST_TYPE_TOKEN..)
            .map(|((full_name, type_id, part), token)| {
                Type(Arc::new(TypeDefinition {
                    full_name,
                    assembly: name.clone(),
                    token,
                    type_id,
                    part,
                }))
            })
            .collect();
        Assembly(Arc::new(AssemblyInner { name, types }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct First;
    struct Second;

    #[test]
    fn tokens_follow_declaration_order() {
        let assembly = Assembly::builder("Parts", "1.0.0")
            .add_type::<First>()
            .add_type::<Second>()
            .build();

        let second = assembly.get_type::<Second>().unwrap();
        assert_eq!(second.token(), FIRST_TYPE_TOKEN + 1);
        assert_eq!(assembly.type_by_token(FIRST_TYPE_TOKEN + 1), Some(second));
        assert!(assembly.type_by_token(FIRST_TYPE_TOKEN + 2).is_none());
        assert!(assembly.type_by_token(0).is_none());
    }

    #[test]
    fn type_ref_round_trips_to_equal_type() {
        let assembly = Assembly::builder("Parts", "1.0.0").add_type::<First>().build();
        let ty = assembly.get_type::<First>().unwrap();
        let reference = ty.type_ref();
        assert_eq!(reference.full_name(), type_name::<First>());
        assert_eq!(assembly.type_by_token(reference.token()), Some(ty));
    }
}
