//! Per-request execution context and the pipeline executor.
//!
//! A [`Context`] is created for every routed request and dropped once its
//! response has been produced. It carries the request, the response sink, the
//! route's middleware snapshot, a cursor into it, and a [`Store`] middleware
//! use to hand values to each other.
//!
//! # Pipeline
//!
//! ```text
//! Pending ─▶ Running(cursor = i) ─▶ Running(cursor = i + 1) ─▶ … ─▶ Completed
//!                     │
//!                     └──────────────▶ Aborted
//! ```
//!
//! [`Context::next`] is the single advance operation. Each call runs one step
//! (the next middleware, or the handler once the list is exhausted) inside its
//! own recovery boundary. A returned `Err(Abort)`, an [`Abort::raise`] or any
//! other panic is intercepted by the innermost `next` frame that ran the
//! failing step; that frame marks the context aborted, which turns every
//! enclosing `next` call into a no-op. Exactly one response is sent either way.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use http::StatusCode;
use parking_lot::RwLock;
use tracing::{error, warn};

use crate::abort::{Abort, Result};
use crate::app::Hooks;
use crate::error::BoxError;
use crate::handler::{BoxedHandler, BoxedMiddleware};
use crate::panic as diagnostics;
use crate::request::Request;
use crate::response::{BoxResponse, Response, ResponseWriter};
use crate::router::Route;

// ── Store ────────────────────────────────────────────────────────────────────

/// Request-scoped key/value bag shared by middleware and handlers.
///
/// Cloning yields another handle to the same map, so work a handler spawns on
/// other threads can read and write it too. Reads share the lock; writes
/// exclude everything else.
#[derive(Clone, Default)]
pub struct Store(Arc<RwLock<HashMap<String, Arc<dyn Any + Send + Sync>>>>);

impl Store {
    /// Stores `value` under `key`, replacing any previous value.
    pub fn set<T: Any + Send + Sync>(&self, key: impl Into<String>, value: T) {
        self.0.write().insert(key.into(), Arc::new(value));
    }

    /// Returns a clone of the value under `key` if it exists and is a `T`.
    pub fn get<T: Any + Send + Sync + Clone>(&self, key: &str) -> Option<T> {
        self.0.read().get(key)?.downcast_ref::<T>().cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.read().contains_key(key)
    }

    /// Removes `key`, reporting whether it was present.
    pub fn remove(&self, key: &str) -> bool {
        self.0.write().remove(key).is_some()
    }
}

// ── Context ──────────────────────────────────────────────────────────────────

/// The execution context of one request.
pub struct Context {
    request: Request,
    writer: ResponseWriter,
    hooks: Arc<Hooks>,
    handler: BoxedHandler,
    middleware: Arc<[BoxedMiddleware]>,
    cursor: usize,
    aborted: bool,
    store: Store,
}

impl Context {
    pub(crate) fn new(request: Request, hooks: Arc<Hooks>, route: &Route) -> Self {
        Self {
            request,
            writer: ResponseWriter::new(),
            hooks,
            handler: Arc::clone(&route.handler),
            middleware: Arc::clone(&route.middleware),
            cursor: 0,
            aborted: false,
            store: Store::default(),
        }
    }

    pub fn request(&self) -> &Request { &self.request }

    /// The response sink. Writing to it directly bypasses the handler's
    /// returned response; the first status written is the one that sticks.
    pub fn writer(&mut self) -> &mut ResponseWriter { &mut self.writer }

    /// The status committed to the sink, or recorded by the abort path just
    /// before the error handler runs. `None` while unset.
    pub fn status(&self) -> Option<StatusCode> { self.writer.status() }

    pub fn is_aborted(&self) -> bool { self.aborted }

    pub fn store(&self) -> &Store { &self.store }

    /// Shorthand for `self.store().set(key, value)`.
    pub fn set<T: Any + Send + Sync>(&self, key: impl Into<String>, value: T) {
        self.store.set(key, value);
    }

    /// Shorthand for `self.store().get(key)`.
    pub fn get<T: Any + Send + Sync + Clone>(&self, key: &str) -> Option<T> {
        self.store.get(key)
    }

    /// Runs the rest of the pipeline from the current cursor.
    ///
    /// Calling it again after the request was aborted does nothing.
    pub fn next(&mut self) {
        if self.aborted {
            return;
        }
        let abort = match panic::catch_unwind(AssertUnwindSafe(|| self.step())) {
            Ok(Ok(())) => return,
            Ok(Err(abort)) => abort,
            Err(payload) => match payload.downcast::<Abort>() {
                Ok(abort) => *abort,
                Err(payload) => return self.recover_panic(payload),
            },
        };
        self.recover_abort(abort);
    }

    fn step(&mut self) -> Result<()> {
        if self.cursor == self.middleware.len() {
            let handler = Arc::clone(&self.handler);
            let response = handler.call(self)?;
            self.send(response);
            return Ok(());
        }
        let middleware = Arc::clone(&self.middleware[self.cursor]);
        self.cursor += 1;
        middleware(self)
    }

    fn recover_abort(&mut self, abort: Abort) {
        self.aborted = true;
        let (status, cause) = abort.into_parts();
        if self.writer.is_finished() {
            warn!(%status, path = self.request.path(), "abort after the response was sent; ignored");
            return;
        }
        self.writer.observe(status);
        match cause {
            Some(cause) => {
                let hooks = Arc::clone(&self.hooks);
                let response = (hooks.error_handler)(self, cause);
                self.send(response);
            }
            None => {
                self.writer.write_header(status);
                self.writer.finish();
            }
        }
    }

    fn recover_panic(&mut self, payload: Box<dyn Any + Send>) {
        self.aborted = true;
        let message = diagnostics::describe(payload.as_ref());
        error!(panic = %message, path = self.request.path(), "request pipeline panicked");
        if self.writer.is_finished() {
            return;
        }
        self.writer.observe(StatusCode::INTERNAL_SERVER_ERROR);
        let hooks = Arc::clone(&self.hooks);
        let response = (hooks.error_handler)(self, BoxError::from(message));
        self.send(response);
    }

    /// Sends `response` unless one was already sent for this request.
    fn send(&mut self, response: BoxResponse) {
        if self.writer.is_finished() {
            warn!(path = self.request.path(), "a response was already sent; dropping another");
            return;
        }
        response.send(&mut self.writer);
        self.writer.finish();
    }

    pub(crate) fn validate(&self, value: &dyn Any) -> std::result::Result<(), BoxError> {
        (self.hooks.validator)(value)
    }

    /// Whether anything reached the sink, through `send` or a direct write.
    pub(crate) fn has_responded(&self) -> bool {
        self.writer.is_finished() || self.writer.is_committed()
    }

    pub(crate) fn into_writer(self) -> ResponseWriter { self.writer }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use bytes::Bytes;

    use super::*;
    use crate::abort::abort;
    use crate::app::Hooks;
    use crate::handler;
    use crate::response::text;

    fn context(middleware: Vec<BoxedMiddleware>, handler: BoxedHandler) -> Context {
        let (parts, ()) = http::Request::builder().uri("/t").body(()).unwrap().into_parts();
        let route = Route { handler, middleware: middleware.into() };
        Context::new(Request::new(parts, Bytes::new(), HashMap::new()), Arc::new(Hooks::default()), &route)
    }

    fn ok_handler() -> BoxedHandler {
        handler::boxed(|_ctx: &mut Context| Ok(text(StatusCode::OK, "done")))
    }

    #[test]
    fn runs_middleware_in_order_then_handler() {
        let trail = Arc::new(Mutex::new(Vec::new()));
        let mw = |name: &'static str, trail: Arc<Mutex<Vec<&'static str>>>| -> BoxedMiddleware {
            Arc::new(move |ctx: &mut Context| -> Result<()> {
                trail.lock().unwrap().push(name);
                ctx.next();
                trail.lock().unwrap().push(name);
                Ok(())
            })
        };
        let mut ctx = context(vec![mw("a", trail.clone()), mw("b", trail.clone())], ok_handler());
        ctx.next();
        assert_eq!(*trail.lock().unwrap(), ["a", "b", "b", "a"]);
        assert_eq!(ctx.status(), Some(StatusCode::OK));
        assert!(!ctx.is_aborted());
    }

    #[test]
    fn abort_without_cause_writes_bare_status() {
        let deny: BoxedMiddleware = Arc::new(|_ctx: &mut Context| -> Result<()> {
            Err(Abort::new(StatusCode::UNAUTHORIZED))
        });
        let mut ctx = context(vec![deny], ok_handler());
        ctx.next();
        assert!(ctx.is_aborted());
        assert_eq!(ctx.status(), Some(StatusCode::UNAUTHORIZED));
        let res = ctx.into_writer().into_inner();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn next_after_abort_is_a_no_op() {
        let calls = Arc::new(Mutex::new(0));
        let counted = Arc::clone(&calls);
        let retry: BoxedMiddleware = Arc::new(|ctx: &mut Context| -> Result<()> {
            ctx.next();
            ctx.next();
            Ok(())
        });
        let handler = handler::boxed(move |_ctx: &mut Context| -> Result<StatusCode> {
            *counted.lock().unwrap() += 1;
            Err(abort(StatusCode::BAD_REQUEST, "nope"))
        });
        let mut ctx = context(vec![retry], handler);
        ctx.next();
        ctx.next();
        assert_eq!(*calls.lock().unwrap(), 1);
        assert_eq!(ctx.status(), Some(StatusCode::BAD_REQUEST));
    }

    #[test]
    fn raised_abort_is_handled_like_a_returned_one() {
        fn deep_helper() -> u32 {
            Abort::new(StatusCode::CONFLICT).raise()
        }
        crate::panic::install_hook();
        let handler = handler::boxed(|_ctx: &mut Context| Ok(deep_helper().to_string()));
        let mut ctx = context(Vec::new(), handler);
        ctx.next();
        assert_eq!(ctx.status(), Some(StatusCode::CONFLICT));
    }

    #[test]
    fn panics_become_500() {
        crate::panic::install_hook();
        let handler = handler::boxed(|_ctx: &mut Context| -> Result<String> {
            let v: Vec<u32> = Vec::new();
            Ok(v[1].to_string())
        });
        let mut ctx = context(Vec::new(), handler);
        ctx.next();
        assert!(ctx.is_aborted());
        assert_eq!(ctx.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[test]
    fn post_processing_abort_keeps_the_sent_response() {
        let late: BoxedMiddleware = Arc::new(|ctx: &mut Context| -> Result<()> {
            ctx.next();
            Err(abort(StatusCode::BAD_GATEWAY, "too late"))
        });
        let mut ctx = context(vec![late], ok_handler());
        ctx.next();
        assert!(ctx.is_aborted());
        assert_eq!(ctx.status(), Some(StatusCode::OK));
    }

    #[test]
    fn store_is_shared_across_threads() {
        let store = Store::default();
        let remote = store.clone();
        std::thread::spawn(move || remote.set("user", String::from("ann")))
            .join()
            .unwrap();
        assert_eq!(store.get::<String>("user").as_deref(), Some("ann"));
        assert_eq!(store.get::<u32>("user"), None);
        assert!(store.remove("user"));
        assert!(!store.contains("user"));
    }
}
