//! # mango
//!
//! A small HTTP framework built around a middleware pipeline.
//!
//! - Radix-tree routing via [`matchit`], with route groups
//! - Middleware that wraps the rest of the chain through [`Context::next`]
//! - An abort protocol: any step can stop the request with a status and a
//!   cause, either by returning `Err(Abort)` or by [`Abort::raise`]
//! - Panic recovery: a panicking handler becomes a `500`, the server lives on
//! - Typed binding of query strings, path parameters and JSON bodies, with a
//!   pluggable validator
//! - Graceful shutdown on SIGTERM / Ctrl-C
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use http::StatusCode;
//! use mango::{abort, json, App, Context, Result};
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct UserPath {
//!     id: u64,
//! }
//!
//! #[tokio::main]
//! async fn main() -> std::result::Result<(), mango::Error> {
//!     let mut app = App::new();
//!     app.use_middleware(|ctx| {
//!         ctx.next();
//!         tracing::info!(status = ?ctx.status(), "done");
//!         Ok(())
//!     });
//!     app.get("/users/{id}", get_user);
//!     app.listen().await
//! }
//!
//! fn get_user(ctx: &mut Context) -> Result<json::Json<serde_json::Value>> {
//!     let path: UserPath = ctx.bind_path()?;
//!     if path.id == 0 {
//!         return Err(abort(StatusCode::NOT_FOUND, "no such user"));
//!     }
//!     Ok(json::ok(serde_json::json!({ "id": path.id })))
//! }
//! ```

mod abort;
mod app;
mod bind;
mod config;
mod context;
mod error;
mod group;
mod handler;
mod panic;
mod request;
mod response;
mod router;
mod server;

pub mod json;
pub mod validate;

pub use abort::{Abort, Result, abort};
pub use app::{App, AppBuilder, ErrorHandler, default_error_handler};
pub use bind::{BindError, Origin};
pub use config::{ADDR_VAR, Config, DEFAULT_ADDR};
pub use context::{Context, Store};
pub use error::{BoxError, Error};
pub use group::Group;
pub use handler::BoxedMiddleware;
pub use request::Request;
pub use response::{BoxResponse, IntoResponse, Response, ResponseWriter, Text, text};
pub use server::Server;
