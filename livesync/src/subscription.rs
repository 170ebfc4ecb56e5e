//! Unsubscribe handles and handler registries

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

/// Handle returned by every subscription call
///
/// Call [`Subscription::unsubscribe`] or drop the handle to stop receiving
/// callbacks.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A handle with nothing to cancel
    pub fn noop() -> Self {
        Self { cancel: None }
    }

    pub fn unsubscribe(mut self) {
        self.cancel_now();
    }

    fn cancel_now(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel_now();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

type Handler<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Set of callbacks keyed by registration id
pub struct HandlerRegistry<T> {
    next_id: AtomicU64,
    handlers: Arc<Mutex<HashMap<u64, Handler<T>>>>,
}

impl<T: 'static> HandlerRegistry<T> {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            handlers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn register(&self, handler: Box<dyn Fn(&T) + Send + Sync>) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.handlers.lock().insert(id, Arc::from(handler));

        let handlers = Arc::downgrade(&self.handlers);
        Subscription::new(move || {
            if let Some(handlers) = handlers.upgrade() {
                handlers.lock().remove(&id);
            }
        })
    }

    /// Invoke every handler with `value`
    ///
    /// Handlers run without the registry lock held, so they may register or
    /// unsubscribe.
    pub fn notify(&self, value: &T) {
        let handlers: Vec<Handler<T>> = self.handlers.lock().values().cloned().collect();
        for handler in handlers {
            handler(value);
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: 'static> Default for HandlerRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_drop_unsubscribes() {
        let registry = HandlerRegistry::<u32>::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&hits);
        let sub = registry.register(Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        registry.notify(&1);
        drop(sub);
        registry.notify(&2);

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_explicit_unsubscribe() {
        let registry = HandlerRegistry::<u32>::new();
        let sub = registry.register(Box::new(|_| {}));
        assert_eq!(registry.len(), 1);
        sub.unsubscribe();
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_subscription_outlives_registry() {
        let registry = HandlerRegistry::<u32>::new();
        let sub = registry.register(Box::new(|_| {}));
        drop(registry);
        sub.unsubscribe();
    }
}
