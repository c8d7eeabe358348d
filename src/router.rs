//! Radix-tree request router.
//!
//! One tree per HTTP method plus one method-less tree for `ANY` routes.
//! O(path-length) lookup. Each leaf holds the terminal handler and the
//! middleware snapshot captured when the route was registered.

use std::collections::HashMap;
use std::sync::Arc;

use http::Method;
use matchit::Router as MatchitRouter;

use crate::handler::{BoxedHandler, BoxedMiddleware};

/// A registered route: handler plus the middleware in front of it.
pub(crate) struct Route {
    pub(crate) handler: BoxedHandler,
    pub(crate) middleware: Arc<[BoxedMiddleware]>,
}

pub(crate) enum Lookup<'a> {
    Found(&'a Route, HashMap<String, String>),
    /// The path exists, but only under these methods.
    MethodNotAllowed(Vec<Method>),
    NotFound,
}

#[derive(Default)]
pub(crate) struct Router {
    routes: HashMap<Method, MatchitRouter<Route>>,
    any: MatchitRouter<Route>,
}

impl Router {
    /// Registers `route`. `None` as method matches every method.
    ///
    /// # Panics
    ///
    /// Panics on a malformed pattern or one that conflicts with an existing
    /// route under the same method. Both are setup mistakes.
    pub(crate) fn add(&mut self, method: Option<Method>, path: &str, route: Route) {
        let tree = match method {
            Some(method) => self.routes.entry(method).or_default(),
            None => &mut self.any,
        };
        tree.insert(path, route)
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
    }

    /// Method tree first, then `GET` for `HEAD` requests, then `ANY`.
    pub(crate) fn lookup(&self, method: &Method, path: &str) -> Lookup<'_> {
        let head_fallback = (method == Method::HEAD)
            .then(|| self.routes.get(&Method::GET))
            .flatten();
        let trees = [self.routes.get(method), head_fallback, Some(&self.any)];

        for tree in trees.into_iter().flatten() {
            if let Ok(matched) = tree.at(path) {
                let params = matched.params.iter()
                    .map(|(k, v)| (k.to_owned(), decode_segment(v)))
                    .collect();
                return Lookup::Found(matched.value, params);
            }
        }

        let mut allowed: Vec<Method> = self.routes.iter()
            .filter(|(_, tree)| tree.at(path).is_ok())
            .map(|(m, _)| m.clone())
            .collect();
        if allowed.is_empty() {
            return Lookup::NotFound;
        }
        allowed.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        Lookup::MethodNotAllowed(allowed)
    }
}

/// Percent-decodes a captured segment. Bytes that are not UTF-8 after
/// decoding become U+FFFD rather than failing the request.
fn decode_segment(raw: &str) -> String {
    String::from_utf8_lossy(&urlencoding::decode_binary(raw.as_bytes())).into_owned()
}

/// Generates the `get`/`post`/`put`/`patch`/`delete`/`any` shortcuts on a
/// type that has a `route(&mut self, Option<Method>, &str, F) -> &mut Self`.
macro_rules! method_shortcuts {
    () => {
        $crate::router::method_shortcuts! {
            /// Registers a `GET` handler. `HEAD` requests fall back to it.
            get => Some(::http::Method::GET);
            /// Registers a `POST` handler.
            post => Some(::http::Method::POST);
            /// Registers a `PUT` handler.
            put => Some(::http::Method::PUT);
            /// Registers a `PATCH` handler.
            patch => Some(::http::Method::PATCH);
            /// Registers a `DELETE` handler.
            delete => Some(::http::Method::DELETE);
            /// Registers a handler for every method.
            any => None;
        }
    };
    ($($(#[$doc:meta])* $name:ident => $method:expr;)*) => {
        $(
            $(#[$doc])*
            pub fn $name<F, R>(&mut self, path: &str, handler: F) -> &mut Self
            where
                F: Fn(&mut $crate::Context) -> $crate::Result<R> + Send + Sync + 'static,
                R: $crate::IntoResponse + 'static,
            {
                self.route($method, path, handler)
            }
        )*
    };
}

pub(crate) use method_shortcuts;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::handler;

    fn route() -> Route {
        Route {
            handler: handler::boxed(|_ctx: &mut Context| Ok("ok")),
            middleware: Arc::from(Vec::new()),
        }
    }

    fn router() -> Router {
        let mut r = Router::default();
        r.add(Some(Method::GET), "/users/{id}", route());
        r.add(Some(Method::DELETE), "/users/{id}", route());
        r.add(None, "/any", route());
        r
    }

    #[test]
    fn captures_params() {
        match router().lookup(&Method::GET, "/users/42") {
            Lookup::Found(_, params) => assert_eq!(params["id"], "42"),
            _ => panic!("expected a match"),
        }
    }

    #[test]
    fn params_are_percent_decoded() {
        match router().lookup(&Method::GET, "/users/john%20doe") {
            Lookup::Found(_, params) => assert_eq!(params["id"], "john doe"),
            _ => panic!("expected a match"),
        }
        assert_eq!(decode_segment("%31%32"), "12");
        assert_eq!(decode_segment("a+b"), "a+b");
        assert_eq!(decode_segment("%FF"), "\u{FFFD}");
    }

    #[test]
    fn head_falls_back_to_get_and_any_matches_all() {
        let r = router();
        assert!(matches!(r.lookup(&Method::HEAD, "/users/1"), Lookup::Found(..)));
        assert!(matches!(r.lookup(&Method::PATCH, "/any"), Lookup::Found(..)));
    }

    #[test]
    fn wrong_method_lists_allowed_ones() {
        match router().lookup(&Method::POST, "/users/1") {
            Lookup::MethodNotAllowed(allowed) => assert_eq!(allowed, [Method::DELETE, Method::GET]),
            _ => panic!("expected 405"),
        }
        assert!(matches!(router().lookup(&Method::GET, "/nope"), Lookup::NotFound));
    }

    #[test]
    #[should_panic(expected = "invalid route")]
    fn conflicting_routes_panic() {
        let mut r = router();
        r.add(Some(Method::GET), "/users/{name}", route());
    }
}
