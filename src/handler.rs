//! Handler trait, type erasure, and [`Next`].
//!
//! # How async handlers are stored
//!
//! The router holds handlers of *different* types in one map, so each one is
//! hidden behind a trait object and stored uniformly:
//!
//! ```text
//! async fn hello(c: Context) -> Result<(), Error> { … }   ← user writes this
//!        ↓ router.get("/", hello)
//! Next::new(hello)                                        ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(hello))                              ← heap-allocated wrapper
//!        ↓  stored as Next(Arc<dyn ErasedHandler>)
//! next.run(c)  at request time                            ← one vtable dispatch
//! ```
//!
//! Middleware works on the same type: it receives a [`Next`] and returns a
//! new [`Next`] that calls the old one.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::Context;
use crate::error::Error;

/// A heap-allocated, type-erased future resolving to a handler outcome.
pub type BoxFuture = Pin<Box<dyn Future<Output = Result<(), Error>> + Send + 'static>>;

#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, c: Context) -> BoxFuture;
}

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Implemented for every valid route handler.
///
/// You never implement this yourself. It is satisfied by any `async fn` (or
/// closure returning a future) with the signature:
///
/// ```text
/// async fn name(c: Context) -> Result<(), Error>
/// ```
///
/// The trait is sealed: only the blanket impl below can satisfy it.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_next(self) -> Next;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut> private::Sealed for F
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), Error>> + Send + 'static,
{
}

impl<F, Fut> Handler for F
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), Error>> + Send + 'static,
{
    fn into_next(self) -> Next {
        Next(Arc::new(FnHandler(self)))
    }
}

struct FnHandler<F>(F);

impl<F, Fut> ErasedHandler for FnHandler<F>
where
    F: Fn(Context) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), Error>> + Send + 'static,
{
    fn call(&self, c: Context) -> BoxFuture {
        Box::pin((self.0)(c))
    }
}

// ── Next ──────────────────────────────────────────────────────────────────────

/// The next step in a request's handler chain.
///
/// Cloning is one atomic reference-count increment.
#[derive(Clone)]
pub struct Next(Arc<dyn ErasedHandler + Send + Sync + 'static>);

impl Next {
    /// Erases `handler` into a chain step.
    pub fn new(handler: impl Handler) -> Self {
        handler.into_next()
    }

    /// Runs this step (and everything behind it) for one request.
    pub fn run(&self, c: Context) -> BoxFuture {
        self.0.call(c)
    }
}
