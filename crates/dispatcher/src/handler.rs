use std::fmt;

use crate::request::HttpRequest;

/// A request handler registered on the [`Dispatcher`](crate::Dispatcher).
///
/// Handlers run on the reactor worker threads, so they are shared across
/// threads and must not block. A handler either replies right away or
/// registers a write continuation before returning.
pub trait Handler: Send + Sync {
    fn call(&self, request: &mut HttpRequest<'_>);
}

/// A handler backed by a function, see [`handler_fn`].
pub struct FnHandler<F> {
    f: F,
}

impl<F> fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler").finish_non_exhaustive()
    }
}

impl<F> Handler for FnHandler<F>
where
    F: Fn(&mut HttpRequest<'_>) + Send + Sync,
{
    fn call(&self, request: &mut HttpRequest<'_>) {
        (self.f)(request);
    }
}

pub fn handler_fn<F>(f: F) -> FnHandler<F>
where
    F: Fn(&mut HttpRequest<'_>) + Send + Sync,
{
    FnHandler { f }
}
