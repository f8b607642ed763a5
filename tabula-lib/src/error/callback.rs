//! Guarded invocation of host-supplied callbacks.
//!
//! Host callbacks report failure by returning `Err`, but a panicking callback
//! must not take the table down with it. Both paths end up as a
//! [`CallbackError`] that the recovery registry can act on.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;

use super::CallbackError;
use super::CallbackResult;

/// Error produced when a host callback panics.
#[derive(Debug, Clone, thiserror::Error)]
#[error("callback panicked: {message}")]
pub struct CallbackPanic {
    /// Panic message extracted from the payload.
    pub message: String,
}

/// Extract a human-readable message from a panic payload.
///
/// Panics can contain either `&str` or `String` payloads. This function
/// attempts to extract either, falling back to a generic message.
pub fn extract_panic_message(panic: &Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

/// Runs a synchronous callback, turning a panic into an error.
///
/// The panic hook is left alone, so each caught panic is still printed by
/// it. Callbacks that fail routinely should return `Err` instead.
pub(crate) fn guard<T>(f: impl FnOnce() -> CallbackResult<T>) -> CallbackResult<T> {
    match std::panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(panic) => Err(panic_error(&panic)),
    }
}

/// Awaits an asynchronous callback, turning a panic into an error.
pub(crate) async fn guard_async<T, F>(future: F) -> CallbackResult<T>
where
    F: Future<Output = CallbackResult<T>>,
{
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => Err(panic_error(&panic)),
    }
}

fn panic_error(panic: &Box<dyn Any + Send>) -> CallbackError {
    Box::new(CallbackPanic {
        message: extract_panic_message(panic),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_panic_message_str() {
        let panic: Box<dyn Any + Send> = Box::new("test panic message");
        assert_eq!(extract_panic_message(&panic), "test panic message");
    }

    #[test]
    fn test_extract_panic_message_unknown() {
        let panic: Box<dyn Any + Send> = Box::new(42i32);
        assert_eq!(extract_panic_message(&panic), "Unknown panic");
    }

    #[test]
    fn test_guard_passes_results_through() {
        assert_eq!(guard(|| Ok(5)).unwrap(), 5);
        let err = guard::<()>(|| Err("nope".into())).unwrap_err();
        assert_eq!(err.to_string(), "nope");
    }

    #[test]
    fn test_guard_catches_panics() {
        let err = guard::<()>(|| panic!("boom")).unwrap_err();
        assert_eq!(err.to_string(), "callback panicked: boom");
    }

    #[tokio::test]
    async fn test_guard_async_catches_panics() {
        let err = guard_async::<(), _>(async { panic!("async boom") })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "callback panicked: async boom");
    }
}
