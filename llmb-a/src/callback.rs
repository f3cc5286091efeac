//! One-directional callback channel from the worker to the listener.
//!
//! A sink receives each serialized token event synchronously on the worker
//! thread, one at a time, in generation order. Delivery failures are the
//! sink's problem to contain: log, drop the one payload, return.

/// Destination for serialized token events.
///
/// Dropped exactly once when the worker finishes; whatever pins the
/// managed-side listener alive must be released by that drop.
pub trait TokenSink: Send + 'static {
    fn deliver(&self, payload: &str);
}

/// Adapter for closure-backed sinks (host tools and tests).
pub struct FnSink<F>(pub F);

impl<F> TokenSink for FnSink<F>
where
    F: Fn(&str) + Send + 'static,
{
    fn deliver(&self, payload: &str) {
        (self.0)(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn fn_sink_forwards_payloads() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&seen);
        let sink = FnSink(move |payload: &str| captured.lock().unwrap().push(payload.to_string()));

        sink.deliver("a");
        sink.deliver("b");
        assert_eq!(*seen.lock().unwrap(), vec!["a", "b"]);
    }
}
