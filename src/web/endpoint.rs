//! Endpoint descriptors and the route registry built from them.
//!
//! Each endpoint is a plain async function plus a static [`EndpointSpec`]
//! describing its verb, path pattern, and parameter contract. The registry is
//! assembled once at startup; registration validates every descriptor so a
//! bad declaration aborts boot instead of failing per request.

use std::future::Future;
use std::pin::Pin;

use axum::http::{Extensions, HeaderMap, Method, Uri};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::error::{BadRequest, HandlerError};
use crate::web::reply::Reply;

/// Keyword arguments assembled by the binder: path segment values merged
/// over body or query values.
#[derive(Clone, Debug, Default)]
pub struct Params(pub Map<String, Value>);

impl Params {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// String argument, or `BadRequest` naming the argument.
    pub fn str(&self, name: &str) -> Result<&str, BadRequest> {
        self.0
            .get(name)
            .and_then(Value::as_str)
            .ok_or_else(|| BadRequest::new(format!("Missing argument: {}", name)))
    }

    /// String argument, falling back for absent or non-string values.
    pub fn str_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.0.get(name).and_then(Value::as_str).unwrap_or(default)
    }
}

impl From<Map<String, Value>> for Params {
    fn from(map: Map<String, Value>) -> Params {
        Params(map)
    }
}

/// Request metadata handed to every handler alongside its bound parameters.
/// The body is consumed by the binder before the handler runs.
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub extensions: Extensions,
}

pub type HandlerResult = Result<Reply, HandlerError>;
pub type HandlerFuture = Pin<Box<dyn Future<Output = HandlerResult> + Send + 'static>>;

/// Endpoint function: application state, request context, bound arguments.
pub type Handler<S> = fn(S, RequestContext, Params) -> HandlerFuture;

/// Static description of one endpoint: verb, path pattern, handler, and the
/// parameter contract the binder enforces.
#[derive(Debug)]
pub struct EndpointSpec<S> {
    pub method: Method,
    pub path: &'static str,
    pub handler: Handler<S>,
    /// Parameters the handler understands beyond its path placeholders.
    pub named_params: &'static [&'static str],
    /// Names that must be present after binding, from either source.
    pub required_params: &'static [&'static str],
    /// Handler reads request metadata (headers, current user).
    pub accepts_request: bool,
    /// Keep body/query keys outside `named_params` instead of dropping them.
    pub accepts_extra: bool,
}

impl<S> EndpointSpec<S> {
    pub fn get(path: &'static str, handler: Handler<S>) -> EndpointSpec<S> {
        EndpointSpec::new(Method::GET, path, handler)
    }

    pub fn post(path: &'static str, handler: Handler<S>) -> EndpointSpec<S> {
        EndpointSpec::new(Method::POST, path, handler)
    }

    fn new(method: Method, path: &'static str, handler: Handler<S>) -> EndpointSpec<S> {
        EndpointSpec {
            method,
            path,
            handler,
            named_params: &[],
            required_params: &[],
            accepts_request: false,
            accepts_extra: false,
        }
    }

    pub fn named(mut self, params: &'static [&'static str]) -> Self {
        self.named_params = params;
        self
    }

    pub fn required(mut self, params: &'static [&'static str]) -> Self {
        self.required_params = params;
        self
    }

    pub fn with_request(mut self) -> Self {
        self.accepts_request = true;
        self
    }

    pub fn with_extra(mut self) -> Self {
        self.accepts_extra = true;
        self
    }

    /// Whether binding must look at the body or query string at all.
    pub fn needs_kw_input(&self) -> bool {
        self.accepts_extra || !self.named_params.is_empty() || !self.required_params.is_empty()
    }
}

impl<S> Clone for EndpointSpec<S> {
    fn clone(&self) -> EndpointSpec<S> {
        EndpointSpec {
            method: self.method.clone(),
            path: self.path,
            handler: self.handler,
            named_params: self.named_params,
            required_params: self.required_params,
            accepts_request: self.accepts_request,
            accepts_extra: self.accepts_extra,
        }
    }
}

#[derive(Error, Debug)]
pub enum RouteError {
    #[error("route {method} {path}: only GET and POST are supported")]
    UnsupportedMethod { method: Method, path: &'static str },
    #[error("route pattern '{pattern}': {reason}")]
    BadPattern {
        pattern: &'static str,
        reason: &'static str,
    },
    #[error("duplicate route {method} {path}")]
    DuplicateRoute { method: Method, path: &'static str },
    #[error("route {path}: required parameter '{name}' is neither named nor a path placeholder")]
    RequiredNotNamed {
        path: &'static str,
        name: &'static str,
    },
    #[error("route {path}: parameter '{name}' declared twice")]
    DuplicateParam {
        path: &'static str,
        name: &'static str,
    },
}

/// `{name}` placeholders in pattern order.
pub fn path_param_names(pattern: &'static str) -> Result<Vec<&'static str>, RouteError> {
    let mut names = Vec::new();
    let mut rest = pattern;
    while let Some(open) = rest.find('{') {
        let after = &rest[open + 1..];
        let close = after.find('}').ok_or(RouteError::BadPattern {
            pattern,
            reason: "unclosed '{' placeholder",
        })?;
        let name = &after[..close];
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(RouteError::BadPattern {
                pattern,
                reason: "placeholder names must match [A-Za-z0-9_]+",
            });
        }
        names.push(name);
        rest = &after[close + 1..];
    }
    Ok(names)
}

/// Startup-built route registry.
#[derive(Debug)]
pub struct RouteTable<S> {
    routes: Vec<EndpointSpec<S>>,
}

impl<S> RouteTable<S> {
    pub fn new() -> RouteTable<S> {
        RouteTable { routes: Vec::new() }
    }

    /// Validate one descriptor and add it. A path placeholder may share a
    /// name with a named parameter; the binder resolves that in the path's
    /// favor at request time.
    pub fn register(mut self, spec: EndpointSpec<S>) -> Result<RouteTable<S>, RouteError> {
        if spec.method != Method::GET && spec.method != Method::POST {
            return Err(RouteError::UnsupportedMethod {
                method: spec.method.clone(),
                path: spec.path,
            });
        }
        let path_names = path_param_names(spec.path)?;
        if self
            .routes
            .iter()
            .any(|r| r.method == spec.method && r.path == spec.path)
        {
            return Err(RouteError::DuplicateRoute {
                method: spec.method.clone(),
                path: spec.path,
            });
        }
        for (i, &name) in path_names.iter().enumerate() {
            if path_names[..i].contains(&name) {
                return Err(RouteError::DuplicateParam {
                    path: spec.path,
                    name,
                });
            }
        }
        for (i, &name) in spec.named_params.iter().enumerate() {
            if spec.named_params[..i].contains(&name) {
                return Err(RouteError::DuplicateParam {
                    path: spec.path,
                    name,
                });
            }
        }
        for &name in spec.required_params {
            if !spec.named_params.contains(&name) && !path_names.contains(&name) {
                return Err(RouteError::RequiredNotNamed {
                    path: spec.path,
                    name,
                });
            }
        }
        tracing::info!(method = %spec.method, path = spec.path, "add route");
        self.routes.push(spec);
        Ok(self)
    }

    pub fn routes(&self) -> &[EndpointSpec<S>] {
        &self.routes
    }

    pub fn into_routes(self) -> Vec<EndpointSpec<S>> {
        self.routes
    }
}

impl<S> Default for RouteTable<S> {
    fn default() -> RouteTable<S> {
        RouteTable::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn noop(_: (), _: RequestContext, _: Params) -> HandlerFuture {
        Box::pin(async { Ok(Reply::Status(200)) })
    }

    #[test]
    fn placeholders_are_extracted_in_order() {
        assert_eq!(path_param_names("/").unwrap(), Vec::<&str>::new());
        assert_eq!(path_param_names("/blog/{id}").unwrap(), vec!["id"]);
        assert_eq!(
            path_param_names("/a/{x}/b/{y}").unwrap(),
            vec!["x", "y"]
        );
    }

    #[test]
    fn unclosed_or_empty_placeholders_are_rejected() {
        assert!(matches!(
            path_param_names("/blog/{id"),
            Err(RouteError::BadPattern { .. })
        ));
        assert!(matches!(
            path_param_names("/blog/{}"),
            Err(RouteError::BadPattern { .. })
        ));
    }

    #[test]
    fn duplicate_method_path_pairs_are_rejected() {
        let table = RouteTable::new()
            .register(EndpointSpec::get("/api/blogs", noop))
            .unwrap();
        let err = table
            .register(EndpointSpec::get("/api/blogs", noop))
            .unwrap_err();
        assert!(matches!(err, RouteError::DuplicateRoute { .. }));
    }

    #[test]
    fn same_path_may_carry_both_verbs() {
        let table = RouteTable::new()
            .register(EndpointSpec::get("/api/users", noop))
            .unwrap()
            .register(EndpointSpec::post("/api/users", noop))
            .unwrap();
        assert_eq!(table.routes().len(), 2);
    }

    #[test]
    fn non_get_post_verbs_are_rejected() {
        let mut spec = EndpointSpec::get("/x", noop);
        spec.method = Method::PUT;
        let err = RouteTable::new().register(spec).unwrap_err();
        assert!(matches!(err, RouteError::UnsupportedMethod { .. }));
    }

    #[test]
    fn required_params_must_be_named_or_placeholders() {
        let err = RouteTable::new()
            .register(EndpointSpec::post("/api/blogs", noop).required(&["name"]))
            .unwrap_err();
        assert!(matches!(
            err,
            RouteError::RequiredNotNamed { name: "name", .. }
        ));

        // satisfied by a placeholder
        RouteTable::new()
            .register(EndpointSpec::get("/api/blogs/{id}", noop).required(&["id"]))
            .unwrap();
        // satisfied by a named parameter
        RouteTable::new()
            .register(
                EndpointSpec::post("/api/blogs", noop)
                    .named(&["name"])
                    .required(&["name"]),
            )
            .unwrap();
    }

    #[test]
    fn repeated_names_within_one_source_are_rejected() {
        let err = RouteTable::new()
            .register(EndpointSpec::get("/a/{x}/{x}", noop))
            .unwrap_err();
        assert!(matches!(err, RouteError::DuplicateParam { name: "x", .. }));

        let err = RouteTable::new()
            .register(EndpointSpec::get("/a", noop).named(&["p", "p"]))
            .unwrap_err();
        assert!(matches!(err, RouteError::DuplicateParam { name: "p", .. }));
    }

    #[test]
    fn placeholder_and_named_param_may_share_a_name() {
        let table = RouteTable::new()
            .register(
                EndpointSpec::get("/api/blogs/{id}", noop)
                    .named(&["id"])
                    .required(&["id"]),
            )
            .unwrap();
        assert_eq!(table.routes().len(), 1);
    }

    #[test]
    fn kw_input_is_needed_only_with_a_parameter_contract() {
        assert!(!EndpointSpec::get("/", noop).needs_kw_input());
        assert!(EndpointSpec::get("/", noop).named(&["page"]).needs_kw_input());
        assert!(EndpointSpec::post("/", noop).with_extra().needs_kw_input());
    }

    #[test]
    fn string_params_resolve_with_fallbacks() {
        let params = Params::from(
            json!({"page": "2", "n": 7})
                .as_object()
                .cloned()
                .unwrap(),
        );
        assert_eq!(params.str("page").unwrap(), "2");
        assert_eq!(params.str_or("missing", "1"), "1");
        assert_eq!(params.str_or("n", "1"), "1");
        let err = params.str("absent").unwrap_err();
        assert_eq!(err.to_string(), "Missing argument: absent");
    }
}
