//! Handler and middleware type erasure.
//!
//! # How handlers are stored
//!
//! Every route owns one terminal handler and a snapshot of the middleware in
//! front of it. Handlers are closures of different concrete types returning
//! different response types, so they are stored as trait objects:
//!
//! ```text
//! fn hello(ctx: &mut Context) -> Result<Text> { … }   ← user writes this
//!        ↓ app.get("/", hello)
//! handler::boxed(hello)                                 ← wraps in FnHandler
//!        ↓
//! Arc::new(FnHandler(hello))                            ← stored as BoxedHandler
//!        ↓
//! handler.call(ctx)  at request time                    ← one vtable dispatch
//!        ↓
//! hello(ctx).map(IntoResponse::into_response)           ← Result<BoxResponse>
//! ```
//!
//! Middleware needs no wrapper: every middleware already has the one shape
//! `Fn(&mut Context) -> Result<()>`, so it is boxed as-is.
//!
//! Registration methods spell the `Fn` bound out instead of hiding it behind
//! a trait, so closures get their argument and return types inferred:
//! `app.get("/", |ctx| Ok(ctx.request().path().to_owned()))` needs no
//! annotations.

use std::sync::Arc;

use crate::abort::Result;
use crate::context::Context;
use crate::response::{BoxResponse, IntoResponse};

/// Internal dispatch interface for terminal handlers.
pub(crate) trait ErasedHandler {
    fn call(&self, ctx: &mut Context) -> Result<BoxResponse>;
}

/// A type-erased terminal handler shared by every request on its route.
pub(crate) type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

/// A type-erased middleware, cloned cheaply into every route snapshot.
pub type BoxedMiddleware = Arc<dyn Fn(&mut Context) -> Result<()> + Send + Sync + 'static>;

pub(crate) fn boxed<F, R>(handler: F) -> BoxedHandler
where
    F: Fn(&mut Context) -> Result<R> + Send + Sync + 'static,
    R: IntoResponse + 'static,
{
    Arc::new(FnHandler(handler))
}

/// Newtype wrapper that holds a concrete handler `F` and implements
/// [`ErasedHandler`], bridging the typed world to the trait-object world.
struct FnHandler<F>(F);

impl<F, R> ErasedHandler for FnHandler<F>
where
    F: Fn(&mut Context) -> Result<R> + Send + Sync,
    R: IntoResponse,
{
    fn call(&self, ctx: &mut Context) -> Result<BoxResponse> {
        (self.0)(ctx).map(IntoResponse::into_response)
    }
}
