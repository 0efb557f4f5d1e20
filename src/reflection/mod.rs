//! Type identities that can be stored, compared and serialized without
//! loading the assembly that declares the type.
//!
//! A [`TypeRef`] is the storage form; a [`Type`] is the live form handed out
//! by a [`Resolver`] once the backing [`Assembly`] has been loaded.

mod assembly;
mod resolver;

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

pub use assembly::{Assembly, AssemblyBuilder, Type};
pub use resolver::{AssemblyLoader, Resolver};

/// First token handed out in an assembly's type-definition table.
pub const FIRST_TYPE_TOKEN: u32 = 0x0200_0001;

/// Name and version of an assembly.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssemblyName {
    name: String,
    version: String,
}

impl AssemblyName {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }
}

impl fmt::Display for AssemblyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, Version={}", self.name, self.version)
    }
}

/// Serializable, assembly-qualified handle to a type.
///
/// Two references are equal iff they point at the same token in the same
/// assembly. `full_name` rides along for diagnostics only.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TypeRef {
    assembly: AssemblyName,
    token: u32,
    full_name: String,
}

impl TypeRef {
    pub fn new(assembly: AssemblyName, token: u32, full_name: impl Into<String>) -> Self {
        Self {
            assembly,
            token,
            full_name: full_name.into(),
        }
    }

    /// Storage form of a live type. Never loads anything.
    pub fn get(ty: &Type) -> Self {
        Self::new(ty.assembly().clone(), ty.token(), ty.full_name())
    }

    pub fn assembly(&self) -> &AssemblyName {
        &self.assembly
    }

    pub fn token(&self) -> u32 {
        self.token
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }
}

impl PartialEq for TypeRef {
    fn eq(&self, other: &Self) -> bool {
        self.token == other.token && self.assembly == other.assembly
    }
}

impl Eq for TypeRef {}

impl Hash for TypeRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.assembly.hash(state);
        self.token.hash(state);
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name)
    }
}
