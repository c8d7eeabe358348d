//! The application: route registration, global middleware and the
//! per-request entry point.

use std::any::Any;
use std::panic::{self as unwind, AssertUnwindSafe};
use std::sync::Arc;

use bytes::Bytes;
use http::header::{ALLOW, HeaderValue};
use http::{Method, StatusCode};
use http_body_util::Full;
use tracing::{debug, error, warn};

use crate::abort::Result;
use crate::config::Config;
use crate::context::Context;
use crate::error::{BoxError, Error};
use crate::group::Group;
use crate::handler::{self, BoxedMiddleware};
use crate::panic;
use crate::request::Request;
use crate::response::{BoxResponse, IntoResponse, ResponseWriter, Text, text};
use crate::router::{Lookup, Route, Router, method_shortcuts};
use crate::server::Server;
use crate::validate::{self, Validator};

/// Renders the response for an aborted request.
///
/// Called with the context (its [`status`](Context::status) already holds the
/// abort status) and the abort's cause.
pub type ErrorHandler = Arc<dyn Fn(&Context, BoxError) -> BoxResponse + Send + Sync + 'static>;

/// The app-wide hooks every request's context consults.
pub(crate) struct Hooks {
    pub(crate) validator: Validator,
    pub(crate) error_handler: ErrorHandler,
}

impl Default for Hooks {
    fn default() -> Self {
        Self {
            validator: validate::accept_all(),
            error_handler: Arc::new(|ctx: &Context, cause: BoxError| {
                default_error_handler(ctx, cause).into_response()
            }),
        }
    }
}

/// The built-in error handler.
///
/// Server errors (5xx) are logged and answered with a generic
/// `internal server error` so internals do not leak. Anything else echoes the
/// cause's message as plain text.
pub fn default_error_handler(ctx: &Context, cause: BoxError) -> Text {
    let status = ctx.status().unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        error!(%status, path = ctx.request().path(), error = %cause, "request failed");
        return text(status, "internal server error");
    }
    text(status, cause.to_string())
}

// ── Builder ──────────────────────────────────────────────────────────────────

/// Creation-time options for an [`App`].
pub struct AppBuilder {
    config: Config,
    hooks: Hooks,
}

impl AppBuilder {
    /// Replaces the whole configuration, `ADDR` included.
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Listen address, overriding `ADDR`.
    pub fn addr(mut self, addr: impl Into<String>) -> Self {
        self.config.addr = addr.into();
        self
    }

    /// Validation run on every bound value. See [`validate`](crate::validate).
    pub fn validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&dyn Any) -> std::result::Result<(), BoxError> + Send + Sync + 'static,
    {
        self.hooks.validator = Arc::new(validator);
        self
    }

    /// Replaces [`default_error_handler`].
    pub fn error_handler<F, R>(mut self, handler: F) -> Self
    where
        F: Fn(&Context, BoxError) -> R + Send + Sync + 'static,
        R: IntoResponse,
    {
        self.hooks.error_handler =
            Arc::new(move |ctx: &Context, cause: BoxError| handler(ctx, cause).into_response());
        self
    }

    pub fn build(self) -> App {
        panic::install_hook();
        App {
            router: Router::default(),
            middleware: Vec::new(),
            hooks: Arc::new(self.hooks),
            config: self.config,
        }
    }
}

// ── App ──────────────────────────────────────────────────────────────────────

/// An HTTP application.
///
/// Middleware registered with [`use_middleware`](Self::use_middleware) applies
/// to routes registered *after* it: every route keeps the list as it stood at
/// registration time.
pub struct App {
    router: Router,
    middleware: Vec<BoxedMiddleware>,
    hooks: Arc<Hooks>,
    config: Config,
}

impl Default for App {
    fn default() -> Self { Self::new() }
}

impl App {
    /// An app with default options, listening on `ADDR` (or `:8000`).
    pub fn new() -> Self { Self::builder().build() }

    pub fn builder() -> AppBuilder {
        AppBuilder { config: Config::from_env(), hooks: Hooks::default() }
    }

    pub fn config(&self) -> &Config { &self.config }

    /// Appends app-wide middleware.
    pub fn use_middleware<F>(&mut self, middleware: F) -> &mut Self
    where
        F: Fn(&mut Context) -> Result<()> + Send + Sync + 'static,
    {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// Starts a route group carrying a copy of the app's current middleware.
    pub fn group(&mut self) -> Group<'_> {
        let middleware = self.middleware.clone();
        Group::new(self, middleware)
    }

    /// Registers `handler` for `method` (`None` for every method) at `path`.
    ///
    /// Patterns use `{name}` for one segment and `{*name}` for the rest of the
    /// path.
    ///
    /// # Panics
    ///
    /// Panics if `path` is malformed or conflicts with an existing route.
    pub fn route<F, R>(&mut self, method: Option<Method>, path: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Context) -> Result<R> + Send + Sync + 'static,
        R: IntoResponse + 'static,
    {
        let middleware = self.middleware.clone();
        self.register(method, path, handler, middleware)
    }

    method_shortcuts!();

    pub(crate) fn register<F, R>(
        &mut self,
        method: Option<Method>,
        path: &str,
        handler: F,
        middleware: Vec<BoxedMiddleware>,
    ) -> &mut Self
    where
        F: Fn(&mut Context) -> Result<R> + Send + Sync + 'static,
        R: IntoResponse + 'static,
    {
        debug!(method = method.as_ref().map_or("ANY", Method::as_str), path, "route registered");
        let route = Route { handler: handler::boxed(handler), middleware: middleware.into() };
        self.router.add(method, path, route);
        self
    }

    /// Serves one request in-process: routing, the middleware chain, the
    /// handler and error recovery. The body must already be buffered.
    pub fn handle(&self, req: http::Request<Bytes>) -> http::Response<Full<Bytes>> {
        let (parts, body) = req.into_parts();
        let method = parts.method.clone();
        let path = parts.uri.path().to_owned();

        let (route, params) = match self.router.lookup(&method, &path) {
            Lookup::Found(route, params) => (route, params),
            Lookup::NotFound => {
                debug!(%method, path = %path, "no route");
                return render(text(StatusCode::NOT_FOUND, "404 page not found\n"));
            }
            Lookup::MethodNotAllowed(allowed) => {
                debug!(%method, path = %path, "method not allowed");
                return method_not_allowed(&allowed);
            }
        };

        let mut ctx = Context::new(Request::new(parts, body, params), Arc::clone(&self.hooks), route);
        // Each step recovers its own panics; only a panicking error handler
        // gets this far.
        if unwind::catch_unwind(AssertUnwindSafe(|| ctx.next())).is_err() {
            error!(%method, path = %path, "error handler panicked");
            return bare(StatusCode::INTERNAL_SERVER_ERROR);
        }
        if !ctx.has_responded() {
            warn!(%method, path = %path, "pipeline finished without a response");
            return bare(StatusCode::INTERNAL_SERVER_ERROR);
        }

        let res = ctx.into_writer().into_inner();
        debug!(%method, path = %path, status = %res.status(), "request handled");
        res
    }

    /// Binds the configured address and serves until SIGTERM or Ctrl-C.
    pub async fn listen(self) -> std::result::Result<(), Error> {
        let addr = self.config.socket_addr()?;
        Server::bind(addr).serve(self).await
    }
}

fn render(response: impl IntoResponse) -> http::Response<Full<Bytes>> {
    let mut w = ResponseWriter::new();
    response.into_response().send(&mut w);
    w.into_inner()
}

fn bare(status: StatusCode) -> http::Response<Full<Bytes>> {
    render(status)
}

fn method_not_allowed(allowed: &[Method]) -> http::Response<Full<Bytes>> {
    let mut res = render(text(StatusCode::METHOD_NOT_ALLOWED, "405 method not allowed\n"));
    let list = allowed.iter().map(Method::as_str).collect::<Vec<_>>().join(", ");
    if let Ok(value) = HeaderValue::from_str(&list) {
        res.headers_mut().insert(ALLOW, value);
    }
    res
}

#[cfg(test)]
mod tests {
    use http_body_util::BodyExt;

    use super::*;
    use crate::abort::abort;

    fn get(app: &App, uri: &str) -> http::Response<Full<Bytes>> {
        app.handle(http::Request::get(uri).body(Bytes::new()).unwrap())
    }

    async fn body(res: http::Response<Full<Bytes>>) -> String {
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn default_handler_hides_server_errors() {
        let mut app = App::builder().addr(":0").build();
        app.get("/boom", |_ctx| -> Result<StatusCode> { Err(abort(StatusCode::BAD_GATEWAY, "db down")) });
        app.get("/bad", |_ctx| -> Result<StatusCode> { Err(abort(StatusCode::BAD_REQUEST, "no id")) });

        let res = get(&app, "/boom");
        assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(body(res).await, "internal server error");

        let res = get(&app, "/bad");
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body(res).await, "no id");
    }

    #[tokio::test]
    async fn unknown_path_and_wrong_method() {
        let mut app = App::builder().addr(":0").build();
        app.get("/items", |_ctx| Ok("items"));

        let res = get(&app, "/missing");
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(body(res).await, "404 page not found\n");

        let res = app.handle(http::Request::post("/items").body(Bytes::new()).unwrap());
        assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(res.headers()[ALLOW], "GET");
    }

    #[test]
    fn middleware_without_next_or_response_is_500() {
        let mut app = App::builder().addr(":0").build();
        app.use_middleware(|_ctx| Ok(()));
        app.get("/", |_ctx| Ok("unreachable"));
        assert_eq!(get(&app, "/").status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn panicking_error_handler_still_answers() {
        let mut app = App::builder()
            .addr(":0")
            .error_handler(|_ctx, _cause| -> StatusCode { panic!("handler bug") })
            .build();
        app.get("/", |_ctx| -> Result<StatusCode> { Err(abort(StatusCode::BAD_REQUEST, "x")) });
        assert_eq!(get(&app, "/").status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
