//! Handler return values and their coercion into wire responses.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::error::HandlerError;

pub(crate) const TEMPLATE_KEY: &str = "__template__";

const CT_HTML: &str = "text/html;charset=utf-8";
const CT_JSON: &str = "application/json;charset=utf-8";
const CT_PLAIN: &str = "text/plain;charset=utf-8";
const CT_BYTES: &str = "application/octet-stream";

/// What an endpoint returns. Coercion turns each variant into a concrete
/// response; handlers never build status lines or headers themselves except
/// through [`Reply::Full`].
pub enum Reply {
    /// Already-built response; passes through untouched.
    Full(Response),
    /// Raw payload served as an octet stream.
    Bytes(Vec<u8>),
    /// `redirect:<location>` becomes a 302; any other string is HTML.
    Text(String),
    /// Objects carrying `__template__` render through the engine; everything
    /// else serializes as JSON.
    Json(Value),
    /// Bare status line, for codes in [100, 600).
    Status(u16),
    /// Status plus a plain-text body, for codes in [200, 600).
    StatusText(u16, String),
    /// Plain-text fallback.
    Plain(String),
}

impl Reply {
    /// A template render request: the context object tagged with the
    /// template's name.
    pub fn template(name: impl Into<String>, mut context: Map<String, Value>) -> Reply {
        context.insert(TEMPLATE_KEY.to_string(), Value::String(name.into()));
        Reply::Json(Value::Object(context))
    }
}

/// Renders a named template with a JSON context into an HTML string.
pub trait TemplateEngine: Send + Sync {
    fn render(&self, name: &str, context: &Value) -> Result<String, RenderError>;
}

#[derive(Error, Debug)]
#[error("template '{name}': {reason}")]
pub struct RenderError {
    pub name: String,
    pub reason: String,
}

/// Stand-in engine for deployments without a template pack mounted: emits a
/// minimal page titled after the template with the context embedded as
/// escaped JSON.
pub struct PlainTemplates;

impl TemplateEngine for PlainTemplates {
    fn render(&self, name: &str, context: &Value) -> Result<String, RenderError> {
        let body = serde_json::to_string_pretty(context).map_err(|e| RenderError {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        Ok(format!(
            "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>{}</title></head>\n\
             <body>\n<pre>{}</pre>\n</body>\n</html>\n",
            escape_html(name),
            escape_html(&body)
        ))
    }
}

/// Escape `&`, `<` and `>` for embedding in markup.
pub(crate) fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Coerce one handler return value into a response, in variant priority
/// order. Render and serialization failures surface as errors so the
/// dispatch boundary maps them like any other handler failure.
pub fn coerce(reply: Reply, engine: &dyn TemplateEngine) -> Result<Response, HandlerError> {
    let response = match reply {
        Reply::Full(resp) => resp,
        Reply::Bytes(body) => ([(header::CONTENT_TYPE, CT_BYTES)], body).into_response(),
        Reply::Text(text) => match text.strip_prefix("redirect:") {
            Some(location) => redirect_found(location),
            None => ([(header::CONTENT_TYPE, CT_HTML)], text).into_response(),
        },
        Reply::Json(value) => {
            let template = value
                .get(TEMPLATE_KEY)
                .and_then(Value::as_str)
                .map(str::to_string);
            match template {
                Some(name) => {
                    let html = engine.render(&name, &value)?;
                    ([(header::CONTENT_TYPE, CT_HTML)], html).into_response()
                }
                None => {
                    let body = serde_json::to_string(&value)?;
                    ([(header::CONTENT_TYPE, CT_JSON)], body).into_response()
                }
            }
        }
        Reply::Status(code) => match StatusCode::from_u16(code) {
            Ok(status) if (100..600).contains(&code) => status.into_response(),
            _ => plain(code.to_string()),
        },
        Reply::StatusText(code, message) => match StatusCode::from_u16(code) {
            Ok(status) if (200..600).contains(&code) => {
                (status, [(header::CONTENT_TYPE, CT_PLAIN)], message).into_response()
            }
            _ => plain(format!("({}, {})", code, message)),
        },
        Reply::Plain(text) => plain(text),
    };
    Ok(response)
}

/// 302 with a Location header; axum's redirect helpers only cover 303+.
pub(crate) fn redirect_found(location: &str) -> Response {
    (
        StatusCode::FOUND,
        [(header::LOCATION, location.to_string())],
        (),
    )
        .into_response()
}

fn plain(text: String) -> Response {
    ([(header::CONTENT_TYPE, CT_PLAIN)], text).into_response()
}
