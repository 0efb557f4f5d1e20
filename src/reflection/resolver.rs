use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use tracing::debug;

use crate::error::CompositionError;

use super::{Assembly, AssemblyName, Type, TypeRef};

/// Produces an [`Assembly`] the first time one of its types is resolved.
pub trait AssemblyLoader: Send + Sync {
    fn load(&self) -> Result<Assembly, CompositionError>;
}

impl<F> AssemblyLoader for F
where
    F: Fn() -> Assembly + Send + Sync,
{
    fn load(&self) -> Result<Assembly, CompositionError> {
        Ok(self())
    }
}

struct AssemblySlot {
    loader: Option<Arc<dyn AssemblyLoader>>,
    loaded: OnceCell<Assembly>,
}

/// Turns [`TypeRef`]s back into live [`Type`]s, loading assemblies on demand.
pub struct Resolver {
    assemblies: RwLock<HashMap<AssemblyName, Arc<AssemblySlot>>>,
    loads: AtomicUsize,
    resolutions: AtomicUsize,
}

impl Resolver {
    pub fn new() -> Self {
        Self {
            assemblies: RwLock::new(HashMap::new()),
            loads: AtomicUsize::new(0),
            resolutions: AtomicUsize::new(0),
        }
    }

    /// Register an assembly that is loaded on first use.
    ///
    /// Re-registering a name replaces the previous loader and forgets any
    /// assembly loaded through it.
    pub fn register(&self, name: AssemblyName, loader: impl AssemblyLoader + 'static) {
        let slot = AssemblySlot {
            loader: Some(Arc::new(loader)),
            loaded: OnceCell::new(),
        };
        self.assemblies.write().insert(name, Arc::new(slot));
    }

    /// Register an assembly that is already loaded.
    pub fn register_loaded(&self, assembly: Assembly) {
        let slot = AssemblySlot {
            loader: None,
            loaded: OnceCell::with_value(assembly.clone()),
        };
        self.assemblies
            .write()
            .insert(assembly.name().clone(), Arc::new(slot));
    }

    pub fn is_loaded(&self, name: &AssemblyName) -> bool {
        self.assemblies
            .read()
            .get(name)
            .is_some_and(|slot| slot.loaded.get().is_some())
    }

    pub fn load_assembly(&self, name: &AssemblyName) -> Result<Assembly, CompositionError> {
        let slot = self
            .assemblies
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| CompositionError::AssemblyNotFound(name.clone()))?;

        slot.loaded
            .get_or_try_init(|| {
                let loader = slot
                    .loader
                    .as_ref()
                    .ok_or_else(|| CompositionError::AssemblyNotFound(name.clone()))?;
                let assembly = loader.load()?;
                self.loads.fetch_add(1, Ordering::Relaxed);
                debug!(assembly = %name, types = assembly.types().len(), "loaded assembly");
                Ok(assembly)
            })
            .cloned()
    }

    pub fn resolve(&self, type_ref: &TypeRef) -> Result<Type, CompositionError> {
        self.resolutions.fetch_add(1, Ordering::Relaxed);
        let assembly = self.load_assembly(type_ref.assembly())?;
        assembly
            .type_by_token(type_ref.token())
            .cloned()
            .ok_or_else(|| CompositionError::TypeNotFound {
                assembly: type_ref.assembly().clone(),
                token: type_ref.token(),
            })
    }

    /// Element-wise [`resolve`](Self::resolve), preserving order.
    pub fn resolve_all(&self, type_refs: &[TypeRef]) -> Result<Vec<Type>, CompositionError> {
        type_refs.iter().map(|r| self.resolve(r)).collect()
    }

    /// Number of assemblies actually loaded through a loader.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::Relaxed)
    }

    /// Number of single-type resolutions performed.
    pub fn resolve_count(&self) -> usize {
        self.resolutions.load(Ordering::Relaxed)
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let assemblies = self.assemblies.read();
        f.debug_struct("Resolver")
            .field("assemblies", &assemblies.keys().collect::<Vec<_>>())
            .field("loads", &self.load_count())
            .finish()
    }
}
