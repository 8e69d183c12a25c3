use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

/// Teardown hook for referents stored in a [`RefSheet`](crate::RefSheet).
///
/// The sheet never owns a referent, but when a handle is stored with
/// [`RefSheet::set_disposable`](crate::RefSheet::set_disposable) its `dispose`
/// runs once when the owning sheet is torn down (or the entry is evicted by
/// its container).
pub trait Dispose {
    fn dispose(&self);
}

/// Runs `f`, catching a panic and logging it. Returns false if `f` panicked.
pub(crate) fn isolate<F: FnOnce()>(what: &'static str, f: F) -> bool {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(()) => true,
        Err(payload) => {
            tracing::warn!(
                what,
                panic = %panic_message(payload.as_ref()),
                "isolated panic"
            );
            false
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}
