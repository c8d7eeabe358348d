//! Route groups with their own middleware.

use http::Method;

use crate::abort::Result;
use crate::app::App;
use crate::context::Context;
use crate::handler::BoxedMiddleware;
use crate::response::IntoResponse;
use crate::router::method_shortcuts;

/// A set of routes sharing middleware on top of the app's.
///
/// Created by [`App::group`], which copies the app's middleware as it stands
/// at that moment. Middleware added to the group afterwards, or to the app
/// afterwards, does not affect the other. Routes keep the group's list as it
/// stood when they were registered.
///
/// ```rust
/// use mango::{abort, App};
/// use http::StatusCode;
///
/// let mut app = App::new();
/// let mut admin = app.group().with(|ctx| {
///     if ctx.request().header("x-admin").is_none() {
///         return Err(abort(StatusCode::FORBIDDEN, "admins only"));
///     }
///     ctx.next();
///     Ok(())
/// });
/// admin.get("/admin/stats", |_ctx| Ok("42 users"));
/// ```
pub struct Group<'a> {
    app: &'a mut App,
    middleware: Vec<BoxedMiddleware>,
}

impl<'a> Group<'a> {
    pub(crate) fn new(app: &'a mut App, middleware: Vec<BoxedMiddleware>) -> Self {
        Self { app, middleware }
    }

    /// Builder form of [`use_middleware`](Self::use_middleware).
    pub fn with<F>(mut self, middleware: F) -> Self
    where
        F: Fn(&mut Context) -> Result<()> + Send + Sync + 'static,
    {
        self.use_middleware(middleware);
        self
    }

    /// Appends middleware that only this group's later routes run.
    pub fn use_middleware<F>(&mut self, middleware: F) -> &mut Self
    where
        F: Fn(&mut Context) -> Result<()> + Send + Sync + 'static,
    {
        self.middleware.push(std::sync::Arc::new(middleware));
        self
    }

    /// Like [`App::route`], with the group's middleware in front.
    pub fn route<F, R>(&mut self, method: Option<Method>, path: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Context) -> Result<R> + Send + Sync + 'static,
        R: IntoResponse + 'static,
    {
        self.app.register(method, path, handler, self.middleware.clone());
        self
    }

    method_shortcuts!();
}
