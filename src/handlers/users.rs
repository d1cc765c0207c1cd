//! User accounts: registration, authentication, and the admin user API.

use std::sync::LazyLock;

use md5::{Digest, Md5};
use regex::Regex;
use serde_json::json;

use crate::apis::{page_index_of, ApiError, Page};
use crate::handlers::count;
use crate::models::{next_id, Comment, User};
use crate::orm::Query;
use crate::session::{check_admin, password_digest, signed_in_response};
use crate::state::AppState;
use crate::web::endpoint::{HandlerResult, Params, RequestContext};
use crate::web::reply::Reply;

static RE_EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9.\-_]+@[a-z0-9\-_]+(\.[a-z0-9\-_]+){1,4}$").unwrap()
});
static RE_SHA1: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9a-f]{40}$").unwrap());

fn gravatar(email: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(email.as_bytes());
    format!(
        "http://www.gravatar.com/avatar/{}?d=mm&s=120",
        hex::encode(hasher.finalize())
    )
}

/// Verify credentials and open a session. The submitted password is already
/// a sha1 of the plaintext; it is salted with the user id and compared
/// against the stored digest.
pub async fn authenticate(state: AppState, _ctx: RequestContext, params: Params) -> HandlerResult {
    let email = params.str_or("email", "");
    let passwd = params.str_or("passwd", "");
    if email.is_empty() {
        return Err(ApiError::invalid("email", "Invalid email.").into());
    }
    if passwd.is_empty() {
        return Err(ApiError::invalid("passwd", "Invalid password.").into());
    }
    let users = state
        .store
        .find_all::<User>(Query::new().where_clause("email=?").bind(email))
        .await?;
    let Some(user) = users.into_iter().next() else {
        return Err(ApiError::invalid("email", "Email not exist.").into());
    };
    if user.passwd != password_digest(&user.id, passwd) {
        return Err(ApiError::invalid("passwd", "Invalid password.").into());
    }
    Ok(Reply::Full(signed_in_response(
        &user,
        &state.session_secret,
    )?))
}

/// Create an account and sign it in. Expects `passwd` as a 40-hex sha1, not
/// plaintext.
pub async fn api_register_user(
    state: AppState,
    _ctx: RequestContext,
    params: Params,
) -> HandlerResult {
    let name = params.str_or("name", "");
    let email = params.str_or("email", "");
    let passwd = params.str_or("passwd", "");
    if name.trim().is_empty() {
        return Err(ApiError::invalid("name", "").into());
    }
    if email.is_empty() || !RE_EMAIL.is_match(email) {
        return Err(ApiError::invalid("email", "").into());
    }
    if passwd.is_empty() || !RE_SHA1.is_match(passwd) {
        return Err(ApiError::invalid("passwd", "").into());
    }
    let existing = state
        .store
        .find_all::<User>(Query::new().where_clause("email=?").bind(email))
        .await?;
    if !existing.is_empty() {
        return Err(ApiError::new("register:failed", "email", "Email is already in use").into());
    }
    let uid = next_id();
    let mut user = User {
        id: uid.clone(),
        email: email.to_string(),
        passwd: password_digest(&uid, passwd),
        admin: false,
        name: name.trim().to_string(),
        image: gravatar(email),
        created_at: None,
    };
    state.store.save(&mut user).await?;
    Ok(Reply::Full(signed_in_response(
        &user,
        &state.session_secret,
    )?))
}

/// Paged user listing with password digests masked.
pub async fn api_get_users(state: AppState, _ctx: RequestContext, params: Params) -> HandlerResult {
    let page_index = page_index_of(params.str_or("page", "1"));
    let num = count::<User>(&state.store).await?;
    let page = Page::new(num, page_index);
    if num == 0 {
        return Ok(Reply::Json(json!({"page": page, "users": []})));
    }
    let mut users = state
        .store
        .find_all::<User>(
            Query::new()
                .order_by("created_at desc")
                .limit((page.offset, page.limit)),
        )
        .await?;
    for user in &mut users {
        user.passwd = "******".to_string();
    }
    Ok(Reply::Json(json!({"page": page, "users": users})))
}

/// Delete an account and mark the author's comments so threads stay legible.
pub async fn api_delete_users(
    state: AppState,
    ctx: RequestContext,
    params: Params,
) -> HandlerResult {
    check_admin(&ctx)?;
    let id = params.str("id")?;
    let Some(user) = state.store.find::<User>(id).await? else {
        return Err(ApiError::not_found("User", "").into());
    };
    state.store.remove(&user).await?;
    let comments = state
        .store
        .find_all::<Comment>(Query::new().where_clause("user_id=?").bind(id))
        .await?;
    for mut comment in comments {
        comment.user_name = format!("{} (deleted)", comment.user_name);
        state.store.update(&comment).await?;
    }
    Ok(Reply::Json(json!({"id": id})))
}
