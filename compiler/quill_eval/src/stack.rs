//! Native stack growth for nested `{{template}}` walks.
//!
//! Every invocation level recurses through the walker a few frames deep. At
//! [`crate::MAX_TEMPLATE_DEPTH`] levels that exceeds a default thread stack,
//! so each nested walk first makes sure a red zone is left and otherwise
//! continues on a fresh segment.

/// Run `f` with at least a red zone of native stack available.
#[inline]
#[cfg(not(target_arch = "wasm32"))]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    const RED_ZONE: usize = 128 * 1024;
    const SEGMENT: usize = 2 * 1024 * 1024;

    if stacker::remaining_stack().is_some_and(|left| left < RED_ZONE) {
        tracing::trace!(segment = SEGMENT, "growing stack for nested template");
    }
    stacker::maybe_grow(RED_ZONE, SEGMENT, f)
}

/// WASM manages its own stack.
#[inline]
#[cfg(target_arch = "wasm32")]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    f()
}
