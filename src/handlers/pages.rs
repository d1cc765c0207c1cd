//! Public and management pages, rendered through the template engine.

use axum::http::header;
use serde_json::{json, Map, Value};

use crate::apis::{page_index_of, ApiError, Page};
use crate::handlers::{context, count};
use crate::models::{Blog, Comment};
use crate::orm::Query;
use crate::session::signed_out_redirect;
use crate::state::AppState;
use crate::web::endpoint::{HandlerResult, Params, RequestContext};
use crate::web::reply::{escape_html, Reply};

/// Paragraphs with markup escaped; blank lines are dropped.
fn text2html(text: &str) -> String {
    text.split('\n')
        .filter(|line| !line.trim().is_empty())
        .map(|line| format!("<p>{}</p>", escape_html(line)))
        .collect()
}

/// Serialize an entity and attach an `html_content` view of `content`.
fn with_html_content<T: serde::Serialize>(entity: &T, content: &str) -> Result<Value, serde_json::Error> {
    let mut view = serde_json::to_value(entity)?;
    if let Value::Object(map) = &mut view {
        map.insert("html_content".to_string(), Value::String(text2html(content)));
    }
    Ok(view)
}

pub async fn index(state: AppState, _ctx: RequestContext, params: Params) -> HandlerResult {
    let page_index = page_index_of(params.str_or("page", "1"));
    let num = count::<Blog>(&state.store).await?;
    let page = Page::new(num, page_index);
    let blogs: Vec<Blog> = if num == 0 {
        tracing::info!("index num is 0");
        Vec::new()
    } else {
        state
            .store
            .find_all::<Blog>(
                Query::new()
                    .order_by("created_at desc")
                    .limit((page.offset, page.limit)),
            )
            .await?
    };
    Ok(Reply::template(
        "blogs.html",
        context(json!({"page": page, "blogs": blogs})),
    ))
}

pub async fn get_blog(state: AppState, _ctx: RequestContext, params: Params) -> HandlerResult {
    let id = params.str("id")?;
    let Some(blog) = state.store.find::<Blog>(id).await? else {
        return Err(ApiError::not_found("blog", "Blog not found.").into());
    };
    let comments = state
        .store
        .find_all::<Comment>(
            Query::new()
                .where_clause("blog_id=?")
                .bind(id)
                .order_by("created_at desc"),
        )
        .await?;

    let mut comment_views = Vec::with_capacity(comments.len());
    for comment in &comments {
        comment_views.push(with_html_content(comment, &comment.content)?);
    }
    let blog_view = with_html_content(&blog, &blog.content)?;
    Ok(Reply::template(
        "blog.html",
        context(json!({"blog": blog_view, "comments": comment_views})),
    ))
}

pub async fn register(_state: AppState, _ctx: RequestContext, _params: Params) -> HandlerResult {
    Ok(Reply::template("register.html", Map::new()))
}

pub async fn signin(_state: AppState, _ctx: RequestContext, _params: Params) -> HandlerResult {
    Ok(Reply::template("signin.html", Map::new()))
}

/// Clear the session and bounce back to the referring page.
pub async fn signout(_state: AppState, ctx: RequestContext, _params: Params) -> HandlerResult {
    let referer = ctx
        .headers
        .get(header::REFERER)
        .and_then(|v| v.to_str().ok())
        .filter(|r| !r.is_empty())
        .unwrap_or("/");
    tracing::info!("user signed out");
    Ok(Reply::Full(signed_out_redirect(referer)))
}

pub async fn manage(_state: AppState, _ctx: RequestContext, _params: Params) -> HandlerResult {
    Ok(Reply::Text("redirect:/manage/comments".to_string()))
}

pub async fn manage_comments(
    _state: AppState,
    _ctx: RequestContext,
    params: Params,
) -> HandlerResult {
    Ok(Reply::template(
        "manage_comments.html",
        context(json!({"page_index": page_index_of(params.str_or("page", "1"))})),
    ))
}

pub async fn manage_blogs(
    _state: AppState,
    _ctx: RequestContext,
    params: Params,
) -> HandlerResult {
    Ok(Reply::template(
        "manage_blogs.html",
        context(json!({"page_index": page_index_of(params.str_or("page", "1"))})),
    ))
}

pub async fn manage_users(
    _state: AppState,
    _ctx: RequestContext,
    params: Params,
) -> HandlerResult {
    Ok(Reply::template(
        "manage_users.html",
        context(json!({"page_index": page_index_of(params.str_or("page", "1"))})),
    ))
}

pub async fn manage_create_blog(
    _state: AppState,
    _ctx: RequestContext,
    _params: Params,
) -> HandlerResult {
    Ok(Reply::template(
        "manage_blog_edit.html",
        context(json!({"id": "", "action": "/api/blogs"})),
    ))
}

pub async fn manage_edit_blog(
    _state: AppState,
    _ctx: RequestContext,
    params: Params,
) -> HandlerResult {
    let id = params.str("id")?;
    Ok(Reply::template(
        "manage_blog_edit.html",
        context(json!({"id": id, "action": format!("/api/blogs/{}", id)})),
    ))
}
