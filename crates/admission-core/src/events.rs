//! Event system shared by every admission-pipeline stage.
//!
//! Each stage (sanitizer, rate limiter, circuit breaker, throttler) defines
//! its own event enum and emits through the same [`EventListeners`]
//! machinery, so a caller can attach one tracing/metrics sink uniformly
//! instead of wiring each stage separately.

#[cfg(feature = "tracing")]
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Trait for events emitted by an admission-pipeline stage.
pub trait AdmissionEvent: Send + Sync + fmt::Debug {
    /// Returns the type of event (e.g. "state_transition", "threat_detected").
    fn event_type(&self) -> &'static str;

    /// Returns when this event occurred.
    fn timestamp(&self) -> Instant;

    /// Returns the name of the stage instance that emitted this event.
    fn stage_name(&self) -> &str;
}

/// Trait for listening to admission-pipeline events.
pub trait EventListener<E: AdmissionEvent>: Send + Sync {
    /// Called when an event occurs.
    fn on_event(&self, event: &E);
}

/// Type alias for boxed event listeners.
pub type BoxedEventListener<E> = Arc<dyn EventListener<E>>;

/// A collection of event listeners for one event type.
#[derive(Clone)]
pub struct EventListeners<E: AdmissionEvent> {
    listeners: Vec<BoxedEventListener<E>>,
}

impl<E: AdmissionEvent> EventListeners<E> {
    /// Creates a new empty event listener collection.
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    /// Adds a listener to the collection.
    pub fn add<L>(&mut self, listener: L)
    where
        L: EventListener<E> + 'static,
    {
        self.listeners.push(Arc::new(listener));
    }

    /// Emits an event to all registered listeners.
    ///
    /// A panicking listener is caught so it never takes down the admission
    /// path; the remaining listeners still run.
    pub fn emit(&self, event: &E) {
        for (index, listener) in self.listeners.iter().enumerate() {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                listener.on_event(event);
            }));

            if let Err(_panic_payload) = result {
                #[cfg(feature = "tracing")]
                log_listener_panic(index, event, _panic_payload.as_ref());

                #[cfg(feature = "metrics")]
                record_listener_panic_metric(event);

                #[cfg(not(feature = "tracing"))]
                let _ = index;

                #[cfg(not(any(feature = "tracing", feature = "metrics")))]
                let _ = _panic_payload;
            }
        }
    }

    /// Returns true if there are no listeners.
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Returns the number of listeners.
    pub fn len(&self) -> usize {
        self.listeners.len()
    }
}

impl<E: AdmissionEvent> Default for EventListeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// A simple function-based event listener.
pub struct FnListener<E, F>
where
    F: Fn(&E) + Send + Sync,
{
    f: F,
    _phantom: std::marker::PhantomData<E>,
}

impl<E, F> FnListener<E, F>
where
    F: Fn(&E) + Send + Sync,
{
    /// Creates a new function-based listener.
    pub fn new(f: F) -> Self {
        Self {
            f,
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<E, F> EventListener<E> for FnListener<E, F>
where
    E: AdmissionEvent,
    F: Fn(&E) + Send + Sync,
{
    fn on_event(&self, event: &E) {
        (self.f)(event)
    }
}

#[cfg(feature = "tracing")]
fn log_listener_panic<E: AdmissionEvent>(
    index: usize,
    event: &E,
    panic_payload: &(dyn Any + Send),
) {
    let panic_message = panic_payload
        .downcast_ref::<&'static str>()
        .map(|s| (*s).to_string())
        .or_else(|| panic_payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());

    tracing::warn!(
        listener_index = index,
        stage = event.stage_name(),
        event_type = event.event_type(),
        panic_message = %panic_message,
        "admission event listener panicked"
    );
}

#[cfg(feature = "metrics")]
fn record_listener_panic_metric<E: AdmissionEvent>(event: &E) {
    let stage_label = event.stage_name().to_string();
    let event_type_label = event.event_type().to_string();

    metrics::counter!(
        "admission_event_listener_panics_total",
        "stage" => stage_label,
        "event_type" => event_type_label
    )
        .increment(1);
}
