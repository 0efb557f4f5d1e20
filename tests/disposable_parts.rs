use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::any::type_name;
use std::sync::mpsc;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use part_composer::{
    Assembly, CompositionConfig, CompositionConfiguration, CompositionError, Disposable,
    DisposalErrorPolicy, ExportProvider, ImportDefinition, PartDeclaration, PartError, Resolver,
};

#[derive(Default)]
struct DisposablePart {
    disposed: AtomicBool,
    disposals: AtomicUsize,
}

impl DisposablePart {
    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

impl Disposable for DisposablePart {
    fn dispose(&self) -> Result<(), PartError> {
        self.disposed.store(true, Ordering::SeqCst);
        self.disposals.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

static UNINSTANTIATED_CREATED: AtomicBool = AtomicBool::new(false);
static UNINSTANTIATED_DISPOSED: AtomicBool = AtomicBool::new(false);

struct UninstantiatedPart;

impl UninstantiatedPart {
    fn new() -> Self {
        UNINSTANTIATED_CREATED.store(true, Ordering::SeqCst);
        Self
    }
}

impl Disposable for UninstantiatedPart {
    fn dispose(&self) -> Result<(), PartError> {
        UNINSTANTIATED_DISPOSED.store(true, Ordering::SeqCst);
        Ok(())
    }
}

struct FailingPart;

impl Disposable for FailingPart {
    fn dispose(&self) -> Result<(), PartError> {
        Err("handle already closed".into())
    }
}

fn container(assembly: Assembly, config: CompositionConfig) -> ExportProvider {
    let resolver = Arc::new(Resolver::new());
    resolver.register_loaded(assembly.clone());

    let mut builder = CompositionConfiguration::builder().with_config(config);
    for ty in assembly.types() {
        builder.add_type(ty).unwrap();
    }
    let configuration = builder.build();
    configuration.throw_on_errors().unwrap();
    configuration
        .create_export_provider_factory(resolver)
        .create_export_provider()
}

fn assembly() -> Assembly {
    Assembly::builder("DisposablePartsTests", "1.0.0")
        .add_part::<DisposablePart>(
            PartDeclaration::disposable(|_| Ok(DisposablePart::default())).export(),
        )
        .add_part::<UninstantiatedPart>(
            PartDeclaration::disposable(|_| Ok(UninstantiatedPart::new())).export(),
        )
        .build()
}

#[test]
fn disposable_part_disposed_with_container() {
    let container = container(assembly(), CompositionConfig::default());

    let part = container.get_export::<DisposablePart>().unwrap();
    assert!(!part.is_disposed());
    container.dispose().unwrap();
    assert!(part.is_disposed());

    // Values not created should not be disposed.
    assert!(!UNINSTANTIATED_CREATED.load(Ordering::SeqCst));
    assert!(!UNINSTANTIATED_DISPOSED.load(Ordering::SeqCst));
}

#[test]
fn second_dispose_does_not_dispose_parts_again() {
    let container = container(assembly(), CompositionConfig::default());
    let part = container.get_export::<DisposablePart>().unwrap();

    container.dispose().unwrap();
    container.dispose().unwrap();
    drop(container);

    assert_eq!(part.disposals.load(Ordering::SeqCst), 1);
}

#[test]
fn dropping_container_disposes_created_parts() {
    let container = container(assembly(), CompositionConfig::default());
    let part = container.get_export::<DisposablePart>().unwrap();
    drop(container);
    assert!(part.is_disposed());
}

#[test]
fn dispose_on_drop_can_be_disabled() {
    let config = CompositionConfig {
        dispose_on_drop: false,
        ..CompositionConfig::default()
    };
    let container = container(assembly(), config);
    let part = container.get_export::<DisposablePart>().unwrap();
    drop(container);
    assert!(!part.is_disposed());
}

fn failing_assembly() -> Assembly {
    Assembly::builder("DisposablePartsTests", "1.0.0")
        .add_part::<FailingPart>(PartDeclaration::disposable(|_| Ok(FailingPart)).export())
        .add_part::<DisposablePart>(
            PartDeclaration::disposable(|_| Ok(DisposablePart::default())).export(),
        )
        .build()
}

#[test]
fn failing_disposal_is_aggregated_after_siblings_are_disposed() {
    let container = container(failing_assembly(), CompositionConfig::default());
    container.get_export::<FailingPart>().unwrap();
    let sibling = container.get_export::<DisposablePart>().unwrap();

    let err = container.dispose().unwrap_err();
    match err {
        CompositionError::Disposal(failures) => {
            assert_eq!(failures.len(), 1);
            assert!(failures[0].part.full_name().ends_with("FailingPart"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(sibling.is_disposed());
    assert!(container.is_disposed());
    container.dispose().unwrap();
}

#[test]
fn failing_disposal_can_be_swallowed() {
    let config = CompositionConfig {
        disposal_errors: DisposalErrorPolicy::LogAndSwallow,
        ..CompositionConfig::default()
    };
    let container = container(failing_assembly(), config);
    container.get_export::<FailingPart>().unwrap();
    let sibling = container.get_export::<DisposablePart>().unwrap();

    container.dispose().unwrap();
    assert!(sibling.is_disposed());
}

struct Slow {
    id: usize,
}

#[test]
fn concurrent_first_requests_create_one_shared_instance() {
    let created = Arc::new(AtomicUsize::new(0));
    let counter = created.clone();
    let assembly = Assembly::builder("DisposablePartsTests", "1.0.0")
        .add_part::<Slow>(
            PartDeclaration::new(move |_| {
                let id = counter.fetch_add(1, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(20));
                Ok(Slow { id })
            })
            .export(),
        )
        .build();
    let container = container(assembly, CompositionConfig::default());

    let threads = 8;
    let barrier = Barrier::new(threads);
    let instances: Vec<Arc<Slow>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                scope.spawn(|| {
                    barrier.wait();
                    container.get_export::<Slow>().unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(created.load(Ordering::SeqCst), 1);
    assert!(instances.iter().all(|i| Arc::ptr_eq(i, &instances[0])));
    assert_eq!(instances[0].id, 0);
}

struct Service {
    dependency: Arc<DisposablePart>,
}

#[test]
fn imports_are_created_and_owned_by_the_container() {
    let assembly = Assembly::builder("DisposablePartsTests", "1.0.0")
        .add_part::<DisposablePart>(
            PartDeclaration::disposable(|_| Ok(DisposablePart::default()))
                .export()
                .non_shared(),
        )
        .add_part::<Service>(
            PartDeclaration::new(|ctx| {
                Ok(Service {
                    dependency: ctx.import_of::<DisposablePart>()?,
                })
            })
            .export()
            .import(ImportDefinition::of::<DisposablePart>()),
        )
        .build();
    let container = container(assembly, CompositionConfig::default());

    let service = container.get_export::<Service>().unwrap();
    assert!(!service.dependency.is_disposed());
    container.dispose().unwrap();
    assert!(service.dependency.is_disposed());
}

struct LatePart {
    disposals: Arc<AtomicUsize>,
}

impl Disposable for LatePart {
    fn dispose(&self) -> Result<(), PartError> {
        self.disposals.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[test]
fn part_finished_after_dispose_is_disposed_and_request_fails() {
    let started = Arc::new(Barrier::new(2));
    let release = Arc::new(Barrier::new(2));
    let disposals = Arc::new(AtomicUsize::new(0));

    let (factory_started, factory_release, factory_disposals) =
        (started.clone(), release.clone(), disposals.clone());
    let assembly = Assembly::builder("DisposablePartsTests", "1.0.0")
        .add_part::<LatePart>(
            PartDeclaration::disposable(move |_| {
                factory_started.wait();
                factory_release.wait();
                Ok(LatePart {
                    disposals: factory_disposals.clone(),
                })
            })
            .export(),
        )
        .build();
    let container = container(assembly, CompositionConfig::default());

    let late = thread::scope(|scope| {
        let request = scope.spawn(|| container.get_export::<LatePart>());
        started.wait();
        container.dispose().unwrap();
        release.wait();
        request.join().unwrap()
    });

    assert!(matches!(late, Err(CompositionError::ObjectDisposed)));
    assert_eq!(disposals.load(Ordering::SeqCst), 1);
    container.dispose().unwrap();
    assert_eq!(disposals.load(Ordering::SeqCst), 1);
}

struct Left;
struct Right;

#[test]
fn lazy_cycle_forced_from_two_threads_fails_instead_of_deadlocking() {
    let barrier = Arc::new(Barrier::new(2));
    let left_waited = Arc::new(AtomicBool::new(false));
    let right_waited = Arc::new(AtomicBool::new(false));

    let (left_barrier, right_barrier) = (barrier.clone(), barrier);
    let assembly = Assembly::builder("DisposablePartsTests", "1.0.0")
        .add_part::<Left>(
            PartDeclaration::new(move |ctx| {
                let right = ctx.import_lazy::<Right>(type_name::<Right>())?;
                if !left_waited.swap(true, Ordering::SeqCst) {
                    left_barrier.wait();
                }
                right.value()?;
                Ok(Left)
            })
            .export()
            .import(ImportDefinition::of::<Right>().lazy()),
        )
        .add_part::<Right>(
            PartDeclaration::new(move |ctx| {
                if !right_waited.swap(true, Ordering::SeqCst) {
                    right_barrier.wait();
                }
                ctx.import_of::<Left>()?;
                Ok(Right)
            })
            .export()
            .import(ImportDefinition::of::<Left>()),
        )
        .build();
    let container = Arc::new(container(assembly, CompositionConfig::default()));

    let (sender, results) = mpsc::channel();
    let left = {
        let (container, sender) = (container.clone(), sender.clone());
        thread::spawn(move || {
            let result = container.get_export::<Left>().map(|_| ());
            let _ = sender.send(("left", result));
        })
    };
    let right = {
        let container = container.clone();
        thread::spawn(move || {
            let result = container.get_export::<Right>().map(|_| ());
            let _ = sender.send(("right", result));
        })
    };

    for _ in 0..2 {
        let (name, result) = results
            .recv_timeout(Duration::from_secs(10))
            .expect("cross-thread lazy cycle deadlocked");
        assert!(
            matches!(result, Err(CompositionError::Construction { .. })),
            "{name} unexpectedly succeeded"
        );
    }
    left.join().unwrap();
    right.join().unwrap();
}
