//! Cookie sessions: signing, verification, and the middleware attaching the
//! authenticated user to every request.
//!
//! A session cookie is `uid-expires-digest` where the digest is the sha1 of
//! `uid-passwd-expires-secret`. The password component is the stored digest,
//! so a password change invalidates outstanding sessions.

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use sha1::{Digest, Sha1};

use crate::apis::ApiError;
use crate::error::HandlerError;
use crate::models::User;
use crate::orm::{OrmError, Store};
use crate::state::AppState;
use crate::web::endpoint::RequestContext;
use crate::web::reply::redirect_found;

pub const COOKIE_NAME: &str = "awesession";
const SESSION_MAX_AGE: i64 = 86400;

/// Authenticated user for the request, set by [`session_middleware`];
/// `None` when the cookie is absent or invalid.
#[derive(Clone, Debug, Default)]
pub struct CurrentUser(pub Option<User>);

pub fn sha1_hex(input: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Stored password digest: sha1 of `uid:passwd` where `passwd` is what the
/// client submitted (itself a sha1 of the plaintext).
pub fn password_digest(uid: &str, passwd: &str) -> String {
    sha1_hex(&format!("{}:{}", uid, passwd))
}

fn cookie_digest(uid: &str, passwd: &str, expires: i64, secret: &str) -> String {
    sha1_hex(&format!("{}-{}-{}-{}", uid, passwd, expires, secret))
}

/// Session cookie for `user`, valid `max_age` seconds from now.
pub fn sign_cookie(user: &User, secret: &str, max_age: i64) -> String {
    sign_cookie_at(user, secret, chrono::Utc::now().timestamp() + max_age)
}

pub(crate) fn sign_cookie_at(user: &User, secret: &str, expires: i64) -> String {
    format!(
        "{}-{}-{}",
        user.id,
        expires,
        cookie_digest(&user.id, &user.passwd, expires, secret)
    )
}

/// Structural check: exactly three hyphen-joined fields and an unexpired
/// timestamp. The digest needs the user row, so comparison happens in
/// [`verify_cookie`].
fn parse_cookie(cookie: &str, now: i64) -> Option<(&str, i64, &str)> {
    let mut parts = cookie.split('-');
    let uid = parts.next()?;
    let expires = parts.next()?;
    let digest = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    let expires: i64 = expires.parse().ok()?;
    if expires < now {
        return None;
    }
    Some((uid, expires, digest))
}

/// Resolve a cookie to its user: expiry first, then the lookup, then the
/// keyed digest. Every mismatch yields no user rather than an error, and the
/// stored password digest is masked on the way out.
pub async fn verify_cookie(
    store: &Store,
    secret: &str,
    cookie: &str,
) -> Result<Option<User>, OrmError> {
    let now = chrono::Utc::now().timestamp();
    let Some((uid, expires, digest)) = parse_cookie(cookie, now) else {
        return Ok(None);
    };
    let Some(mut user) = store.find::<User>(uid).await? else {
        return Ok(None);
    };
    if digest != cookie_digest(uid, &user.passwd, expires, secret) {
        tracing::info!("invalid sha1");
        return Ok(None);
    }
    user.passwd = "******".to_string();
    Ok(Some(user))
}

/// Attach [`CurrentUser`] to the request, then gate the manage pages: anyone
/// not signed in as an administrator is sent to the sign-in page.
pub async fn session_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    tracing::info!(method = %req.method(), path = %req.uri().path(), "check user");
    let mut current = CurrentUser(None);
    if let Some(cookie) = cookie_value(req.headers(), COOKIE_NAME) {
        match verify_cookie(&state.store, &state.session_secret, &cookie).await {
            Ok(Some(user)) => {
                tracing::info!(email = %user.email, "set current user");
                current = CurrentUser(Some(user));
            }
            Ok(None) => {}
            Err(err) => tracing::error!(error = %err, "session lookup failed"),
        }
    }
    let is_admin = current.0.as_ref().map(|u| u.admin).unwrap_or(false);
    if req.uri().path().starts_with("/manage/") && !is_admin {
        return redirect_found("/signin");
    }
    req.extensions_mut().insert(current);
    next.run(req).await
}

/// Value of one cookie from the `Cookie` header.
pub(crate) fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let raw = headers.get(header::COOKIE)?.to_str().ok()?;
    for pair in raw.split(';') {
        let mut kv = pair.trim().splitn(2, '=');
        if kv.next() == Some(name) {
            return Some(kv.next().unwrap_or("").trim().to_string());
        }
    }
    None
}

/// The authenticated user for this request, if any.
pub fn current_user(ctx: &RequestContext) -> Option<&User> {
    ctx.extensions.get::<CurrentUser>().and_then(|c| c.0.as_ref())
}

/// The authenticated administrator, or a permission rejection.
pub fn check_admin(ctx: &RequestContext) -> Result<&User, ApiError> {
    match current_user(ctx) {
        Some(user) if user.admin => Ok(user),
        _ => Err(ApiError::permission("")),
    }
}

/// Set a fresh session cookie and return the user as JSON with the stored
/// password digest masked.
pub fn signed_in_response(user: &User, secret: &str) -> Result<Response, HandlerError> {
    let cookie = format!(
        "{}={}; Max-Age={}; Path=/; HttpOnly",
        COOKIE_NAME,
        sign_cookie(user, secret, SESSION_MAX_AGE),
        SESSION_MAX_AGE
    );
    let mut masked = user.clone();
    masked.passwd = "******".to_string();
    let body = serde_json::to_string(&masked)?;
    Ok((
        [
            (header::SET_COOKIE, cookie),
            (
                header::CONTENT_TYPE,
                "application/json;charset=utf-8".to_string(),
            ),
        ],
        body,
    )
        .into_response())
}

/// Clear the session cookie and bounce to `location`.
pub fn signed_out_redirect(location: &str) -> Response {
    let cookie = format!("{}=-deleted-; Max-Age=0; Path=/; HttpOnly", COOKIE_NAME);
    (
        StatusCode::FOUND,
        [
            (header::SET_COOKIE, cookie),
            (header::LOCATION, location.to_string()),
        ],
        (),
    )
        .into_response()
}
