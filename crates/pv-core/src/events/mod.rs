use std::sync::Arc;
use parking_lot::Mutex;
use ahash::AHashMap;

/// Application-wide event bus; clones share their subscribers
#[derive(Clone)]
pub struct EventBus {
    handlers: Arc<Mutex<AHashMap<std::any::TypeId, Vec<Box<dyn EventHandler>>>>>,
}

/// Event trait that all events must implement
pub trait Event: Send + Sync + 'static {
    fn as_any(&self) -> &dyn std::any::Any;
}

/// Handler trait for event handlers
pub trait EventHandler: Send + Sync {
    fn handle(&mut self, event: &dyn Event);
}

/// Events raised by the state controller
pub mod events {
    use super::Event;
    use crate::DatasetId;

    /// A dataset was parsed and added to the working set
    #[derive(Debug, Clone)]
    pub struct DatasetLoaded {
        pub id: DatasetId,
        pub name: String,
        pub row_count: usize,
        pub column_count: usize,
        pub is_shared: bool,
    }

    /// Parsing an uploaded file failed
    #[derive(Debug, Clone)]
    pub struct DatasetLoadFailed {
        pub name: String,
        pub error: String,
    }

    /// A dataset was closed by the user
    #[derive(Debug, Clone)]
    pub struct DatasetClosed {
        pub id: DatasetId,
    }

    /// A column header was renamed
    #[derive(Debug, Clone)]
    pub struct ColumnRenamed {
        pub id: DatasetId,
        pub old_name: String,
        pub new_name: String,
    }

    /// Persisting the session had to drop data
    #[derive(Debug, Clone)]
    pub struct StorageWarningRaised {
        pub message: String,
        pub files_removed: usize,
    }

    /// All persisted session data was removed
    #[derive(Debug, Clone)]
    pub struct SessionCleared;

    macro_rules! impl_event {
        ($($t:ty),*) => {
            $(
                impl Event for $t {
                    fn as_any(&self) -> &dyn std::any::Any {
                        self
                    }
                }
            )*
        }
    }

    impl_event!(
        DatasetLoaded,
        DatasetLoadFailed,
        DatasetClosed,
        ColumnRenamed,
        StorageWarningRaised,
        SessionCleared
    );
}

impl EventBus {
    /// Create a new event bus
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(Mutex::new(AHashMap::new())),
        }
    }

    /// Subscribe to events of a specific type
    pub fn subscribe<E: Event>(&self, handler: Box<dyn EventHandler>) {
        let type_id = std::any::TypeId::of::<E>();
        let mut handlers = self.handlers.lock();
        handlers.entry(type_id).or_insert_with(Vec::new).push(handler);
    }

    /// Publish an event
    ///
    /// Handlers run without the lock held, so they may publish or subscribe.
    /// An event of the same type published from one of its own handlers is
    /// not delivered to the handlers that are running.
    pub fn publish<E: Event>(&self, event: E) {
        let type_id = std::any::TypeId::of::<E>();
        let Some(mut running) = self.handlers.lock().remove(&type_id) else {
            return;
        };

        for handler in running.iter_mut() {
            handler.handle(&event);
        }

        let mut handlers = self.handlers.lock();
        let added = handlers.remove(&type_id).unwrap_or_default();
        running.extend(added);
        handlers.insert(type_id, running);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Helper struct for creating event handlers from closures
pub struct ClosureEventHandler<F> {
    handler: F,
}

impl<F> EventHandler for ClosureEventHandler<F>
where
    F: FnMut(&dyn Event) + Send + Sync,
{
    fn handle(&mut self, event: &dyn Event) {
        (self.handler)(event);
    }
}

/// Create an event handler from a closure
pub fn handler_from_fn<F>(f: F) -> Box<dyn EventHandler>
where
    F: FnMut(&dyn Event) + Send + Sync + 'static,
{
    Box::new(ClosureEventHandler { handler: f })
}
