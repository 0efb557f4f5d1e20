//! Export providers: on-demand instantiation, sharing and disposal of parts.
//!
//! Every created instance moves through `NotCreated -> Created -> Disposed`.
//! Only instances that were actually created are ever disposed, each exactly
//! once, when the provider that owns them is disposed.

mod context;
mod export;
mod instance;

use std::any::{type_name, Any};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::composition::{CompositionPlan, ExportRef, PartPlan};
use crate::config::{CompositionConfig, DisposalErrorPolicy};
use crate::error::{CompositionError, DisposalFailure};
use crate::metadata::{Direction, LazyMetadataWrapper, PartMetadata};
use crate::reflection::{Resolver, TypeRef};

pub use context::ImportContext;
pub use export::{Export, LazyExport};
pub use instance::{Disposable, PartInstance};

/// Creates export providers for one resolved composition.
#[derive(Clone, Debug)]
pub struct ExportProviderFactory {
    plan: Arc<CompositionPlan>,
    resolver: Arc<Resolver>,
    config: CompositionConfig,
}

impl ExportProviderFactory {
    pub(crate) fn new(
        plan: Arc<CompositionPlan>,
        resolver: Arc<Resolver>,
        config: CompositionConfig,
    ) -> Self {
        Self {
            plan,
            resolver,
            config,
        }
    }

    /// A fresh provider. Nothing is instantiated until requested.
    pub fn create_export_provider(&self) -> ExportProvider {
        ExportProvider {
            inner: Arc::new(ProviderInner::new(
                self.plan.clone(),
                self.resolver.clone(),
                self.config.clone(),
            )),
        }
    }
}

struct OwnedInstance {
    part: TypeRef,
    disposer: Arc<dyn Disposable>,
}

pub(crate) struct ProviderInner {
    plan: Arc<CompositionPlan>,
    resolver: Arc<Resolver>,
    config: CompositionConfig,
    /// One creation slot per part; unused for non-shared parts.
    shared: Vec<OnceCell<PartInstance>>,
    /// Export metadata per part and export, restored to live types on read.
    metadata: Vec<Vec<PartMetadata>>,
    /// Disposable instances in creation order.
    owned: Mutex<Vec<OwnedInstance>>,
    construction: Mutex<Construction>,
    disposed: AtomicBool,
}

/// Which threads are building which parts, and which shared part each
/// blocked thread is waiting for.
#[derive(Default)]
struct Construction {
    building: HashSet<(usize, ThreadId)>,
    waiting: HashMap<ThreadId, usize>,
}

impl Construction {
    fn builder_of(&self, part: usize) -> Option<ThreadId> {
        self.building
            .iter()
            .find(|(building, _)| *building == part)
            .map(|(_, thread)| *thread)
    }

    /// Whether `thread` blocking on `part` would close a wait-for cycle.
    fn would_deadlock(&self, thread: ThreadId, part: usize) -> bool {
        let mut part = part;
        for _ in 0..=self.waiting.len() {
            let Some(builder) = self.builder_of(part) else {
                return false;
            };
            if builder == thread {
                return true;
            }
            match self.waiting.get(&builder) {
                Some(&next) => part = next,
                None => return false,
            }
        }
        false
    }
}

/// Marks a part as under construction on the current thread.
struct ConstructionGuard<'a> {
    provider: &'a ProviderInner,
    key: (usize, ThreadId),
}

impl<'a> ConstructionGuard<'a> {
    fn enter(provider: &'a ProviderInner, part: usize) -> Self {
        let thread = thread::current().id();
        let mut construction = provider.construction.lock();
        construction.waiting.remove(&thread);
        construction.building.insert((part, thread));
        Self {
            provider,
            key: (part, thread),
        }
    }
}

impl Drop for ConstructionGuard<'_> {
    fn drop(&mut self) {
        self.provider.construction.lock().building.remove(&self.key);
    }
}

/// Records that the current thread may block on a shared part's slot.
struct WaitGuard<'a> {
    provider: &'a ProviderInner,
    thread: ThreadId,
}

impl<'a> WaitGuard<'a> {
    fn enter(provider: &'a ProviderInner, part: usize) -> Result<Self, CompositionError> {
        let thread = thread::current().id();
        let mut construction = provider.construction.lock();
        if construction.would_deadlock(thread, part) {
            return Err(CompositionError::Reentrancy(provider.part_type(part).clone()));
        }
        construction.waiting.insert(thread, part);
        Ok(Self { provider, thread })
    }
}

impl Drop for WaitGuard<'_> {
    fn drop(&mut self) {
        self.provider.construction.lock().waiting.remove(&self.thread);
    }
}

impl ProviderInner {
    fn new(plan: Arc<CompositionPlan>, resolver: Arc<Resolver>, config: CompositionConfig) -> Self {
        let shared = plan.parts.iter().map(|_| OnceCell::new()).collect();
        let metadata = plan
            .parts
            .iter()
            .map(|part| {
                part.definition
                    .exports()
                    .iter()
                    .map(|export| {
                        let raw = (*export.metadata().try_unwrap()).clone();
                        PartMetadata::lazy(LazyMetadataWrapper::new(
                            raw,
                            Direction::ToOriginalValue(resolver.clone()),
                        ))
                    })
                    .collect()
            })
            .collect();

        Self {
            plan,
            resolver,
            config,
            shared,
            metadata,
            owned: Mutex::new(Vec::new()),
            construction: Mutex::new(Construction::default()),
            disposed: AtomicBool::new(false),
        }
    }

    pub(crate) fn part_plan(&self, part: usize) -> &PartPlan {
        &self.plan.parts[part]
    }

    pub(crate) fn part_type(&self, part: usize) -> &TypeRef {
        self.plan.parts[part].definition.type_ref()
    }

    pub(crate) fn contract_name(&self, export: ExportRef) -> &str {
        self.plan.parts[export.part].definition.exports()[export.export].contract_name()
    }

    pub(crate) fn export_metadata(&self, export: ExportRef) -> &PartMetadata {
        &self.metadata[export.part][export.export]
    }

    fn ensure_live(&self) -> Result<(), CompositionError> {
        if self.disposed.load(Ordering::SeqCst) {
            Err(CompositionError::ObjectDisposed)
        } else {
            Ok(())
        }
    }

    fn exports_for(&self, contract: &str) -> &[ExportRef] {
        self.plan
            .exports_by_contract
            .get(contract)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    fn single(&self, contract: &str) -> Result<ExportRef, CompositionError> {
        match self.exports_for(contract) {
            [] => Err(CompositionError::ExportNotFound(contract.to_string())),
            [export] => Ok(*export),
            many => Err(CompositionError::TooManyExports {
                contract: contract.to_string(),
                count: many.len(),
            }),
        }
    }

    pub(crate) fn export(self: &Arc<Self>, export: ExportRef) -> Result<Export, CompositionError> {
        let instance = self.instance(export.part)?;
        Ok(Export::new(
            self.contract_name(export).to_string(),
            self.export_metadata(export).clone(),
            instance.value().clone(),
        ))
    }

    fn instance(self: &Arc<Self>, part: usize) -> Result<PartInstance, CompositionError> {
        self.ensure_live()?;
        let thread = thread::current().id();
        if self.construction.lock().building.contains(&(part, thread)) {
            return Err(CompositionError::Reentrancy(self.part_type(part).clone()));
        }

        if !self.plan.parts[part].definition.is_shared() {
            return self.create(part);
        }
        if let Some(instance) = self.shared[part].get() {
            return Ok(instance.clone());
        }

        // Another thread may be building this part and, through its own
        // imports, waiting on one this thread is building.
        let _wait = WaitGuard::enter(self, part)?;
        self.shared[part]
            .get_or_try_init(|| self.create(part))
            .cloned()
    }

    fn create(self: &Arc<Self>, part: usize) -> Result<PartInstance, CompositionError> {
        let _guard = ConstructionGuard::enter(self, part);
        let type_ref = self.part_type(part);

        let ty = self.resolver.resolve(type_ref)?;
        let declaration = ty
            .part_declaration()
            .ok_or_else(|| CompositionError::NotAPart(ty.full_name().to_string()))?;

        let context = ImportContext::new(self, part);
        let instance = (declaration.factory())(&context).map_err(|source| {
            CompositionError::Construction {
                part: type_ref.clone(),
                source,
            }
        })?;
        debug!(
            part = %type_ref,
            shared = self.plan.parts[part].definition.is_shared(),
            "created part"
        );

        if let Some(disposer) = instance.disposer() {
            self.track(type_ref, disposer.clone())?;
        }
        Ok(instance)
    }

    /// Record a disposable instance, or dispose it right away if the
    /// provider was disposed while it was being constructed.
    fn track(&self, part: &TypeRef, disposer: Arc<dyn Disposable>) -> Result<(), CompositionError> {
        let mut owned = self.owned.lock();
        if self.disposed.load(Ordering::SeqCst) {
            drop(owned);
            if let Err(error) = disposer.dispose() {
                warn!(part = %part, %error, "part created after disposal failed to dispose");
            }
            return Err(CompositionError::ObjectDisposed);
        }
        owned.push(OwnedInstance {
            part: part.clone(),
            disposer,
        });
        Ok(())
    }

    fn dispose(&self) -> Result<(), CompositionError> {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let owned = std::mem::take(&mut *self.owned.lock());
        debug!(instances = owned.len(), "disposing export provider");

        let mut failures = Vec::new();
        for instance in owned.into_iter().rev() {
            match instance.disposer.dispose() {
                Ok(()) => trace!(part = %instance.part, "disposed part"),
                Err(error) => {
                    warn!(part = %instance.part, %error, "part failed to dispose");
                    failures.push(DisposalFailure {
                        part: instance.part,
                        error,
                    });
                }
            }
        }

        match self.config.disposal_errors {
            DisposalErrorPolicy::Aggregate if !failures.is_empty() => {
                Err(CompositionError::Disposal(failures))
            }
            _ => Ok(()),
        }
    }
}

/// Container that creates parts on demand and owns what it creates.
///
/// Shared parts are created at most once per provider, even under
/// concurrent first requests. Non-shared parts are created per request.
/// Disposing the provider disposes every created disposable instance in
/// reverse creation order; later requests fail with
/// [`CompositionError::ObjectDisposed`].
pub struct ExportProvider {
    inner: Arc<ProviderInner>,
}

impl ExportProvider {
    /// The single export whose contract is the Rust type name of `T`.
    pub fn get_export<T: Any + Send + Sync>(&self) -> Result<Arc<T>, CompositionError> {
        self.get_exported_value(type_name::<T>())
    }

    pub fn get_exported_value<T: Any + Send + Sync>(
        &self,
        contract: &str,
    ) -> Result<Arc<T>, CompositionError> {
        self.get_export_by_contract(contract)?.downcast()
    }

    pub fn get_export_by_contract(&self, contract: &str) -> Result<Export, CompositionError> {
        self.inner.ensure_live()?;
        let export = self.inner.single(contract)?;
        self.inner.export(export)
    }

    /// All exports for `contract`, creating their parts as needed.
    pub fn get_exports(&self, contract: &str) -> Result<Vec<Export>, CompositionError> {
        self.inner.ensure_live()?;
        self.inner
            .exports_for(contract)
            .iter()
            .map(|export| self.inner.export(*export))
            .collect()
    }

    pub fn get_exported_values<T: Any + Send + Sync>(
        &self,
        contract: &str,
    ) -> Result<Vec<Arc<T>>, CompositionError> {
        self.get_exports(contract)?
            .iter()
            .map(Export::downcast)
            .collect()
    }

    /// All exports for `contract` without creating anything yet.
    pub fn get_lazy_exports<T: Any + Send + Sync>(
        &self,
        contract: &str,
    ) -> Result<Vec<LazyExport<T>>, CompositionError> {
        self.inner.ensure_live()?;
        Ok(self
            .inner
            .exports_for(contract)
            .iter()
            .map(|export| LazyExport::new(&self.inner, *export))
            .collect())
    }

    /// Dispose every created disposable part. Calling again is a no-op.
    pub fn dispose(&self) -> Result<(), CompositionError> {
        self.inner.dispose()
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for ExportProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportProvider")
            .field("parts", &self.inner.plan.parts.len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl Drop for ExportProvider {
    fn drop(&mut self) {
        if !self.inner.config.dispose_on_drop {
            return;
        }
        if let Err(error) = self.inner.dispose() {
            warn!(%error, "export provider failed to dispose on drop");
        }
    }
}
