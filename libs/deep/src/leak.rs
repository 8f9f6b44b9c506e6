//! Live store counting for leak checks.
//!
//! [`live_stores`] counts every store alive in the process. A [`LeakCheck`]
//! additionally counts the stores created on its thread while it is
//! installed; a store stays counted until its last handle is dropped, on
//! whichever thread that happens.

use std::cell::RefCell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

static LIVE_STORES: AtomicUsize = AtomicUsize::new(0);

thread_local! {
    static SCOPE: RefCell<Option<Arc<AtomicUsize>>> = const { RefCell::new(None) };
}

/// The number of stores alive in this process.
pub fn live_stores() -> usize {
    LIVE_STORES.load(Ordering::SeqCst)
}

/// Held by a store for as long as it lives.
#[derive(Debug)]
pub(crate) struct StoreToken {
    scope: Option<Arc<AtomicUsize>>,
}

impl StoreToken {
    pub(crate) fn new() -> Self {
        LIVE_STORES.fetch_add(1, Ordering::SeqCst);
        let scope = SCOPE.with(|scope| scope.borrow().clone());
        if let Some(scope) = &scope {
            scope.fetch_add(1, Ordering::SeqCst);
        }
        Self { scope }
    }
}

impl Drop for StoreToken {
    fn drop(&mut self) {
        LIVE_STORES.fetch_sub(1, Ordering::SeqCst);
        if let Some(scope) = &self.scope {
            scope.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

/// Counts the stores created on the current thread between [`LeakCheck::new`]
/// and the drop of the check.
///
/// Checks nest: while an inner check is installed, new stores count against
/// it only.
#[derive(Debug)]
pub struct LeakCheck {
    live: Arc<AtomicUsize>,
    outer: Option<Arc<AtomicUsize>>,
}

impl LeakCheck {
    pub fn new() -> Self {
        let live = Arc::new(AtomicUsize::new(0));
        let outer = SCOPE.with(|scope| scope.borrow_mut().replace(live.clone()));
        Self { live, outer }
    }

    /// Stores created under this check that are still alive.
    pub fn leaked(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

impl Default for LeakCheck {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for LeakCheck {
    fn drop(&mut self) {
        let outer = self.outer.take();
        SCOPE.with(|scope| *scope.borrow_mut() = outer);
    }
}
