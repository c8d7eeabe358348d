//! Minimal mango example: a request logger, an authenticated group and typed
//! binding.
//!
//! Run with:
//!   RUST_LOG=debug ADDR=:3000 cargo run --example basic
//!
//! Try:
//!   curl 'http://localhost:3000/users?name=al'
//!   curl http://localhost:3000/users/42
//!   curl -X POST http://localhost:3000/admin/users \
//!        -H 'x-token: secret' -H 'content-type: application/json' \
//!        -d '{"name":"alice","age":30}'

use std::time::Instant;

use http::StatusCode;
use mango::json::Json;
use mango::validate::Registry;
use mango::{App, Context, Result, abort, json};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;
use validator::Validate;

#[derive(Deserialize)]
struct Search {
    name: String,
    limit: Option<u32>,
}

#[derive(Deserialize)]
struct UserPath {
    id: u64,
}

#[derive(Serialize, Deserialize, Validate)]
struct NewUser {
    #[validate(length(min = 3, max = 32))]
    name: String,
    #[validate(range(min = 18))]
    age: u32,
}

#[tokio::main]
async fn main() -> std::result::Result<(), mango::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let rules = Registry::new().derive::<NewUser>();
    let mut app = App::builder()
        .validator(move |value| rules.validate(value))
        .build();

    app.use_middleware(log_requests);
    app.get("/users", search_users);
    app.get("/users/{id}", get_user);

    app.group()
        .with(require_token)
        .post("/admin/users", create_user)
        .delete("/admin/users/{id}", |_ctx| Ok(StatusCode::NO_CONTENT));

    app.listen().await
}

fn log_requests(ctx: &mut Context) -> Result<()> {
    let started = Instant::now();
    ctx.next();
    tracing::info!(
        path = ctx.request().path(),
        status = ?ctx.status(),
        elapsed = ?started.elapsed(),
        "request"
    );
    Ok(())
}

fn require_token(ctx: &mut Context) -> Result<()> {
    if ctx.request().header("x-token") != Some("secret") {
        return Err(abort(StatusCode::UNAUTHORIZED, "bad token"));
    }
    ctx.set("admin", true);
    ctx.next();
    Ok(())
}

// GET /users?name=al&limit=10
fn search_users(ctx: &mut Context) -> Result<Json<Value>> {
    let q: Search = ctx.bind_query()?;
    Ok(json::ok(json!({ "name": q.name, "limit": q.limit.unwrap_or(20) })))
}

// GET /users/{id}
fn get_user(ctx: &mut Context) -> Result<Json<Value>> {
    let p: UserPath = ctx.bind_path()?;
    Ok(json::ok(json!({ "id": p.id, "name": "alice" })))
}

// POST /admin/users → 201, or 422 when validation fails
fn create_user(ctx: &mut Context) -> Result<Json<NewUser>> {
    let user: NewUser = ctx.bind_json()?;
    Ok(json::response(StatusCode::CREATED, user))
}
