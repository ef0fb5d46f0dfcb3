//! Cooperative cancellation for long-running copies.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[cfg(test)]
type CheckHook = Arc<dyn Fn(&CancelToken) + Send + Sync>;

/// Shared flag checked between copy steps.
///
/// Clones observe the same flag. Cancelling never interrupts an atomic
/// publish or swap; it only stops work that has not reached that point.
#[derive(Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    #[cfg(test)]
    hook: Option<CheckHook>,
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.flag.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl CancelToken {
    /// Builds an untriggered token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.before_check();
        self.flag.load(Ordering::SeqCst)
    }

    /// Token that runs `hook` at every check, letting tests act between
    /// copy steps.
    #[cfg(test)]
    pub(crate) fn with_hook(hook: impl Fn(&Self) + Send + Sync + 'static) -> Self {
        Self {
            flag: Arc::default(),
            hook: Some(Arc::new(hook)),
        }
    }

    #[cfg(test)]
    fn before_check(&self) {
        if let Some(hook) = &self.hook {
            hook(self);
        }
    }

    #[cfg(not(test))]
    const fn before_check(&self) {}
}
