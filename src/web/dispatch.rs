//! Request dispatch: mounts the route table on an axum router and drives
//! bind, invoke, and coerce for every request.

use std::sync::Arc;

use axum::extract::{FromRequest, Multipart, RawPathParams, Request, State};
use axum::http::{header, Method};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::routing::{MethodFilter, MethodRouter};
use axum::Router;
use serde_json::{Map, Value};

use crate::error::{BadRequest, HandlerError};
use crate::session::CurrentUser;
use crate::web::binder::{bind, collect_post_kw};
use crate::web::endpoint::{EndpointSpec, RequestContext, RouteTable};
use crate::web::reply::{coerce, Reply, TemplateEngine, TEMPLATE_KEY};

/// Mount every registered endpoint. Routes sharing a path collapse into one
/// method router, so `GET` and `POST` on the same pattern coexist.
pub fn into_router<S>(
    table: RouteTable<S>,
    state: S,
    engine: Arc<dyn TemplateEngine>,
) -> Router
where
    S: Clone + Send + Sync + 'static,
{
    let mut method_routers: Vec<(String, MethodRouter<S>)> = Vec::new();
    for spec in table.into_routes() {
        let path = axum_path(spec.path);
        let filter = if spec.method == Method::POST {
            MethodFilter::POST
        } else {
            MethodFilter::GET
        };
        let spec = Arc::new(spec);
        let engine = engine.clone();
        let handler = move |State(state): State<S>, raw: RawPathParams, req: Request| {
            let spec = spec.clone();
            let engine = engine.clone();
            async move {
                match run(state, &spec, &*engine, raw, req).await {
                    Ok(resp) => resp,
                    Err(err) => err.into_response(),
                }
            }
        };
        match method_routers.iter_mut().find(|(p, _)| *p == path) {
            Some((_, router)) => {
                let routed = std::mem::take(router);
                *router = routed.on(filter, handler);
            }
            None => method_routers.push((path, MethodRouter::new().on(filter, handler))),
        }
    }
    let mut router = Router::new();
    for (path, method_router) in method_routers {
        router = router.route(&path, method_router);
    }
    router.with_state(state)
}

async fn run<S>(
    state: S,
    spec: &EndpointSpec<S>,
    engine: &dyn TemplateEngine,
    raw: RawPathParams,
    req: Request,
) -> Result<Response, HandlerError>
where
    S: Clone + Send + Sync + 'static,
{
    let ctx = RequestContext {
        method: req.method().clone(),
        uri: req.uri().clone(),
        headers: req.headers().clone(),
        extensions: req.extensions().clone(),
    };
    let path_values: Vec<(String, String)> = raw
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let query = ctx.uri.query().map(str::to_string);

    let body_kw = if spec.needs_kw_input() && ctx.method == Method::POST {
        Some(read_post_kw(req).await?)
    } else {
        None
    };

    let params = bind(spec, &ctx.method, &path_values, query.as_deref(), body_kw)?;
    let mut reply = match (spec.handler)(state, ctx.clone(), params).await {
        Ok(reply) => reply,
        Err(HandlerError::Api(api)) => Reply::Json(api.body()),
        Err(other) => return Err(other),
    };
    attach_template_user(&mut reply, &ctx);
    coerce(reply, engine)
}

/// Consume a POST body into keyword candidates, dispatching on content type.
async fn read_post_kw(req: Request) -> Result<Map<String, Value>, HandlerError> {
    let content_type = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let is_multipart = content_type
        .as_deref()
        .map(|ct| ct.to_ascii_lowercase().starts_with("multipart/form-data"))
        .unwrap_or(false);
    if is_multipart {
        return multipart_kw(req).await;
    }
    let body = axum::body::to_bytes(req.into_body(), usize::MAX)
        .await
        .map_err(|_| BadRequest::new("Invalid request body."))?;
    Ok(collect_post_kw(content_type.as_deref(), &body)?)
}

/// Text parts bind like form fields, first value per name; file parts are
/// drained and ignored.
async fn multipart_kw(req: Request) -> Result<Map<String, Value>, HandlerError> {
    let mut multipart = Multipart::from_request(req, &())
        .await
        .map_err(|_| BadRequest::new("Invalid multipart body."))?;
    let mut map = Map::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| BadRequest::new("Invalid multipart body."))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        if field.file_name().is_some() {
            let _ = field.bytes().await;
            continue;
        }
        let text = field
            .text()
            .await
            .map_err(|_| BadRequest::new("Invalid multipart body."))?;
        map.entry(name).or_insert(Value::String(text));
    }
    Ok(map)
}

/// Template contexts carry the authenticated user under `__user__`; handlers
/// do not thread it manually.
fn attach_template_user(reply: &mut Reply, ctx: &RequestContext) {
    if let Reply::Json(Value::Object(map)) = reply {
        if map.contains_key(TEMPLATE_KEY) {
            let value = ctx
                .extensions
                .get::<CurrentUser>()
                .and_then(|u| u.0.as_ref())
                .and_then(|user| serde_json::to_value(user).ok())
                .unwrap_or(Value::Null);
            map.insert("__user__".to_string(), value);
        }
    }
}

/// Log method and path ahead of dispatch.
pub async fn log_requests(req: Request, next: Next) -> Response {
    tracing::info!(method = %req.method(), path = %req.uri().path(), "request");
    next.run(req).await
}

/// Rewrite `{name}` placeholders into the router's `:name` capture syntax.
fn axum_path(pattern: &'static str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut rest = pattern;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => {
                out.push(':');
                out.push_str(&after[..close]);
                rest = &after[close + 1..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apis::ApiError;
    use crate::web::endpoint::{HandlerFuture, Params};
    use crate::web::reply::PlainTemplates;
    use axum::body::Body;
    use axum::http::{Request as HttpRequest, StatusCode};
    use http_body_util::BodyExt;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tower::ServiceExt;

    fn hello(_: (), _: RequestContext, _: Params) -> HandlerFuture {
        Box::pin(async { Ok(Reply::Text("hi".into())) })
    }

    fn echo_id(_: (), _: RequestContext, params: Params) -> HandlerFuture {
        Box::pin(async move { Ok(Reply::Text(params.str("id")?.to_string())) })
    }

    fn echo_json(_: (), _: RequestContext, params: Params) -> HandlerFuture {
        Box::pin(async move { Ok(Reply::Json(Value::Object(params.0))) })
    }

    fn reject(_: (), _: RequestContext, _: Params) -> HandlerFuture {
        Box::pin(async { Err(ApiError::invalid("email", "Invalid email.").into()) })
    }

    fn test_router() -> Router {
        let table = RouteTable::new()
            .register(EndpointSpec::get("/ping", hello))
            .unwrap()
            .register(EndpointSpec::get("/blog/{id}", echo_id))
            .unwrap()
            .register(
                EndpointSpec::post("/echo", echo_json)
                    .named(&["v"])
                    .required(&["v"]),
            )
            .unwrap()
            .register(EndpointSpec::post("/bad", reject).named(&["x"]))
            .unwrap();
        into_router(table, (), Arc::new(PlainTemplates))
    }

    async fn body_of(resp: Response) -> String {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn placeholders_rewrite_to_capture_segments() {
        assert_eq!(axum_path("/"), "/");
        assert_eq!(axum_path("/blog/{id}"), "/blog/:id");
        assert_eq!(axum_path("/a/{x}/b/{y}"), "/a/:x/b/:y");
    }

    #[tokio::test]
    async fn plain_handlers_serve_html() {
        let resp = test_router()
            .oneshot(HttpRequest::get("/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_of(resp).await, "hi");
    }

    #[tokio::test]
    async fn path_segments_reach_the_handler() {
        let resp = test_router()
            .oneshot(HttpRequest::get("/blog/b42").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(body_of(resp).await, "b42");
    }

    #[tokio::test]
    async fn json_posts_bind_and_echo() {
        let req = HttpRequest::post("/echo")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"v":"x","stray":1}"#))
            .unwrap();
        let resp = test_router().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = serde_json::from_str(&body_of(resp).await).unwrap();
        assert_eq!(body, json!({"v": "x"}));
    }

    #[tokio::test]
    async fn posts_without_content_type_get_400() {
        let req = HttpRequest::post("/echo")
            .body(Body::from(r#"{"v":"x"}"#))
            .unwrap();
        let resp = test_router().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_of(resp).await, "Missing Content-Type.");
    }

    #[tokio::test]
    async fn missing_required_parameters_get_400() {
        let req = HttpRequest::post("/echo")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{}"))
            .unwrap();
        let resp = test_router().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_of(resp).await, "Missing argument: v");
    }

    #[tokio::test]
    async fn api_errors_render_as_ok_with_error_bodies() {
        let req = HttpRequest::post("/bad")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{}"))
            .unwrap();
        let resp = test_router().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers()[header::CONTENT_TYPE],
            "application/json;charset=utf-8"
        );
        let body: Value = serde_json::from_str(&body_of(resp).await).unwrap();
        assert_eq!(
            body,
            json!({"error": "value:invalid", "data": "email", "message": "Invalid email."})
        );
    }

    #[tokio::test]
    async fn unknown_paths_fall_through_to_404() {
        let resp = test_router()
            .oneshot(HttpRequest::get("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
