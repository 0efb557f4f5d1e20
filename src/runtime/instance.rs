use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::error::PartError;

/// Capability of a part that holds resources the container must release.
///
/// Called at most once per instance, when the owning export provider is
/// disposed.
pub trait Disposable: Send + Sync {
    fn dispose(&self) -> Result<(), PartError>;
}

/// An object produced by a part factory.
#[derive(Clone)]
pub struct PartInstance {
    value: Arc<dyn Any + Send + Sync>,
    disposer: Option<Arc<dyn Disposable>>,
}

impl PartInstance {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            value: Arc::new(value),
            disposer: None,
        }
    }

    pub fn disposable<T: Disposable + Any>(value: T) -> Self {
        let value = Arc::new(value);
        Self {
            value: value.clone(),
            disposer: Some(value),
        }
    }

    pub fn value(&self) -> &Arc<dyn Any + Send + Sync> {
        &self.value
    }

    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.value.clone().downcast::<T>().ok()
    }

    pub fn is_disposable(&self) -> bool {
        self.disposer.is_some()
    }

    pub(crate) fn disposer(&self) -> Option<&Arc<dyn Disposable>> {
        self.disposer.as_ref()
    }
}

impl fmt::Debug for PartInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartInstance")
            .field("disposable", &self.is_disposable())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    struct Handle(AtomicBool);

    impl Disposable for Handle {
        fn dispose(&self) -> Result<(), PartError> {
            self.0.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn disposer_and_value_are_the_same_object() {
        let instance = PartInstance::disposable(Handle::default());
        instance.disposer().unwrap().dispose().unwrap();
        assert!(instance.downcast::<Handle>().unwrap().0.load(Ordering::SeqCst));
    }

    #[test]
    fn plain_values_are_not_disposable() {
        let instance = PartInstance::new(7u32);
        assert!(!instance.is_disposable());
        assert_eq!(*instance.downcast::<u32>().unwrap(), 7);
        assert!(instance.downcast::<i64>().is_none());
    }
}
