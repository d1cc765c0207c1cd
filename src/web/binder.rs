//! Parameter binding: assembles a handler's keyword arguments from the
//! request body, the query string, and matched path segments.

use axum::http::Method;
use serde_json::{Map, Value};

use crate::error::BadRequest;
use crate::web::endpoint::EndpointSpec;

/// Parse a POST body into keyword candidates. JSON bodies must decode to an
/// object; form bodies keep the first value per repeated key. Multipart is
/// handled upstream, before the body reaches this point.
pub fn collect_post_kw(
    content_type: Option<&str>,
    body: &[u8],
) -> Result<Map<String, Value>, BadRequest> {
    let raw = content_type.map(str::trim).unwrap_or("");
    if raw.is_empty() {
        return Err(BadRequest::new("Missing Content-Type."));
    }
    let lowered = raw.to_ascii_lowercase();
    if lowered.starts_with("application/json") {
        return match serde_json::from_slice::<Value>(body) {
            Ok(Value::Object(map)) => Ok(map),
            _ => Err(BadRequest::new("JSON body must be object.")),
        };
    }
    if lowered.starts_with("application/x-www-form-urlencoded") {
        let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(body)
            .map_err(|_| BadRequest::new("Invalid form body."))?;
        let mut map = Map::new();
        for (k, v) in pairs {
            map.entry(k).or_insert(Value::String(v));
        }
        return Ok(map);
    }
    let mime = lowered.split(';').next().unwrap_or("").trim();
    Err(BadRequest::new(format!(
        "Unsupported Content-Type: {}",
        mime
    )))
}

/// Assemble the final arguments for one invocation.
///
/// Keyword candidates come from the body (POST) or the query string (GET)
/// when the endpoint declares any parameter contract; with no candidates the
/// path segment values are the arguments outright. Otherwise candidates are
/// filtered to the declared names (unless the endpoint accepts extras) and
/// path values are merged over them, winning any name conflict. Required
/// names missing after all that reject the request.
pub fn bind<S>(
    spec: &EndpointSpec<S>,
    method: &Method,
    path_values: &[(String, String)],
    query: Option<&str>,
    body_kw: Option<Map<String, Value>>,
) -> Result<crate::web::endpoint::Params, BadRequest> {
    let mut collected: Option<Map<String, Value>> = None;
    if spec.needs_kw_input() {
        if *method == Method::POST {
            collected = body_kw;
        }
        if *method == Method::GET {
            if let Some(qs) = query.filter(|q| !q.is_empty()) {
                let pairs: Vec<(String, String)> =
                    serde_urlencoded::from_str(qs).unwrap_or_default();
                let mut map = Map::new();
                for (k, v) in pairs {
                    // first value wins for repeated keys; blanks are kept
                    map.entry(k).or_insert(Value::String(v));
                }
                collected = Some(map);
            }
        }
    }

    let kw = match collected {
        None => {
            let mut map = Map::new();
            for (k, v) in path_values {
                map.insert(k.clone(), Value::String(v.clone()));
            }
            map
        }
        Some(candidates) => {
            let mut map = if !spec.accepts_extra && !spec.named_params.is_empty() {
                let mut named = Map::new();
                for name in spec.named_params {
                    if let Some(v) = candidates.get(*name) {
                        named.insert((*name).to_string(), v.clone());
                    }
                }
                named
            } else {
                candidates
            };
            for (k, v) in path_values {
                if map.contains_key(k) {
                    tracing::warn!(name = %k, "Duplicate arg name in named arg and kw args");
                }
                map.insert(k.clone(), Value::String(v.clone()));
            }
            map
        }
    };

    for name in spec.required_params {
        if !kw.contains_key(*name) {
            return Err(BadRequest::new(format!("Missing argument: {}", name)));
        }
    }
    tracing::debug!(args = ?kw, "call with args");
    Ok(crate::web::endpoint::Params(kw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::web::endpoint::{HandlerFuture, Params, RequestContext};
    use crate::web::reply::Reply;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn noop(_: (), _: RequestContext, _: Params) -> HandlerFuture {
        Box::pin(async { Ok(Reply::Status(200)) })
    }

    fn owned(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn posts_without_a_content_type_are_rejected() {
        let err = collect_post_kw(None, b"{}").unwrap_err();
        assert_eq!(err.to_string(), "Missing Content-Type.");
        let err = collect_post_kw(Some("  "), b"{}").unwrap_err();
        assert_eq!(err.to_string(), "Missing Content-Type.");
    }

    #[test]
    fn json_bodies_must_decode_to_objects() {
        let map = collect_post_kw(
            Some("application/json; charset=utf-8"),
            br#"{"name":"Ann"}"#,
        )
        .unwrap();
        assert_eq!(map.get("name"), Some(&json!("Ann")));

        let err = collect_post_kw(Some("application/json"), b"[1,2]").unwrap_err();
        assert_eq!(err.to_string(), "JSON body must be object.");
        let err = collect_post_kw(Some("application/json"), b"not json").unwrap_err();
        assert_eq!(err.to_string(), "JSON body must be object.");
    }

    #[test]
    fn form_bodies_keep_the_first_value_per_key() {
        let map = collect_post_kw(
            Some("application/x-www-form-urlencoded"),
            b"a=1&b=two%20words&a=3",
        )
        .unwrap();
        assert_eq!(map.get("a"), Some(&json!("1")));
        assert_eq!(map.get("b"), Some(&json!("two words")));
    }

    #[test]
    fn unsupported_content_types_are_named_in_the_error() {
        let err = collect_post_kw(Some("Text/Plain; charset=utf-8"), b"x").unwrap_err();
        assert_eq!(err.to_string(), "Unsupported Content-Type: text/plain");
    }

    #[test]
    fn get_queries_bind_first_values_and_keep_blanks() {
        let spec = EndpointSpec::get("/", noop).named(&["page", "q"]);
        let params = bind(&spec, &Method::GET, &[], Some("page=2&page=9&q="), None).unwrap();
        assert_eq!(params.get("page"), Some(&json!("2")));
        assert_eq!(params.get("q"), Some(&json!("")));
    }

    #[test]
    fn empty_queries_fall_back_to_path_values() {
        let spec = EndpointSpec::get("/blog/{id}", noop).named(&["page"]);
        let path = owned(&[("id", "b1")]);
        let params = bind(&spec, &Method::GET, &path, None, None).unwrap();
        assert_eq!(params.get("id"), Some(&json!("b1")));
        assert_eq!(params.get("page"), None);
    }

    #[test]
    fn endpoints_without_a_contract_bind_path_values_outright() {
        let spec = EndpointSpec::post("/api/comments/{id}/delete", noop);
        let path = owned(&[("id", "7")]);
        let params = bind(&spec, &Method::POST, &path, None, None).unwrap();
        assert_eq!(params.get("id"), Some(&json!("7")));
    }

    #[test]
    fn path_values_override_same_named_body_values() {
        let spec = EndpointSpec::post("/api/blogs/{id}", noop).named(&["id", "content"]);
        let path = owned(&[("id", "real")]);
        let body = json!({"id": "evil", "content": "hi"});
        let params = bind(
            &spec,
            &Method::POST,
            &path,
            None,
            Some(body.as_object().cloned().unwrap()),
        )
        .unwrap();
        assert_eq!(params.get("id"), Some(&json!("real")));
        assert_eq!(params.get("content"), Some(&json!("hi")));
    }

    #[test]
    fn unnamed_body_keys_are_dropped_unless_extras_are_accepted() {
        let body = json!({"content": "x", "stray": true});
        let spec = EndpointSpec::post("/c", noop).named(&["content"]);
        let params = bind(
            &spec,
            &Method::POST,
            &[],
            None,
            Some(body.as_object().cloned().unwrap()),
        )
        .unwrap();
        assert_eq!(params.get("content"), Some(&json!("x")));
        assert_eq!(params.get("stray"), None);

        let spec = EndpointSpec::post("/c", noop).named(&["content"]).with_extra();
        let params = bind(
            &spec,
            &Method::POST,
            &[],
            None,
            Some(body.as_object().cloned().unwrap()),
        )
        .unwrap();
        assert_eq!(params.get("stray"), Some(&json!(true)));
    }

    #[test]
    fn the_first_missing_required_name_is_reported() {
        let spec = EndpointSpec::post("/api/authenticate", noop)
            .named(&["email", "passwd"])
            .required(&["email", "passwd"]);
        let body = json!({"passwd": "0123"});
        let err = bind(
            &spec,
            &Method::POST,
            &[],
            None,
            Some(body.as_object().cloned().unwrap()),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "Missing argument: email");
    }
}
