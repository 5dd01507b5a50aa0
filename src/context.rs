//! Library context: the cancellation signal shared by devices and parsers.
//!
//! Logging goes through the [`log`] facade directly, so the context carries
//! no log state; it exists to let another thread interrupt a download that
//! is blocked on serial I/O.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared, cloneable handle injected into every device and parser.
///
/// Cloning is cheap and all clones observe the same cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct Context {
    cancelled: Arc<AtomicBool>,
}

impl Context {
    pub fn new() -> Self {
        Context::default()
    }

    /// Request cancellation. Devices observe the flag at every packet
    /// boundary and fail the running operation with
    /// [`Error::Cancelled`](crate::Error::Cancelled).
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_is_shared_between_clones() {
        let ctx = Context::new();
        let other = ctx.clone();
        assert!(!other.is_cancelled());
        ctx.cancel();
        assert!(other.is_cancelled());
    }
}
