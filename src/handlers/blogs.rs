//! Blog post API: listing, retrieval, and admin-only create/update/delete.

use serde_json::json;

use crate::apis::{page_index_of, ApiError, Page};
use crate::handlers::count;
use crate::models::Blog;
use crate::orm::Query;
use crate::session::check_admin;
use crate::state::AppState;
use crate::web::endpoint::{HandlerResult, Params, RequestContext};
use crate::web::reply::Reply;

/// Trimmed string argument, rejecting missing or blank values.
fn nonempty(params: &Params, field: &str, message: &str) -> Result<String, ApiError> {
    match params.get(field).and_then(|v| v.as_str()) {
        Some(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        _ => Err(ApiError::invalid(field, message)),
    }
}

pub async fn api_blogs(state: AppState, _ctx: RequestContext, params: Params) -> HandlerResult {
    let page_index = page_index_of(params.str_or("page", "1"));
    let num = count::<Blog>(&state.store).await?;
    let page = Page::new(num, page_index);
    if num == 0 {
        return Ok(Reply::Json(json!({"page": page, "blogs": []})));
    }
    let blogs = state
        .store
        .find_all::<Blog>(
            Query::new()
                .order_by("created_at desc")
                .limit((page.offset, page.limit)),
        )
        .await?;
    Ok(Reply::Json(json!({"page": page, "blogs": blogs})))
}

pub async fn api_get_blog(state: AppState, _ctx: RequestContext, params: Params) -> HandlerResult {
    let id = params.str("id")?;
    let Some(blog) = state.store.find::<Blog>(id).await? else {
        return Err(ApiError::not_found("blog", "Blog not found.").into());
    };
    Ok(Reply::Json(serde_json::to_value(blog)?))
}

pub async fn api_create_blog(
    state: AppState,
    ctx: RequestContext,
    params: Params,
) -> HandlerResult {
    let user = check_admin(&ctx)?.clone();
    let name = nonempty(&params, "name", "Name cannot be empty.")?;
    let summary = nonempty(&params, "summary", "Summary cannot be empty.")?;
    let content = nonempty(&params, "content", "Content cannot be empty.")?;
    let mut blog = Blog {
        id: None,
        user_id: user.id,
        user_name: user.name,
        user_image: user.image,
        name,
        summary,
        content,
        created_at: None,
    };
    state.store.save(&mut blog).await?;
    Ok(Reply::Json(serde_json::to_value(blog)?))
}

pub async fn api_update_blog(
    state: AppState,
    ctx: RequestContext,
    params: Params,
) -> HandlerResult {
    check_admin(&ctx)?;
    let id = params.str("id")?;
    let Some(mut blog) = state.store.find::<Blog>(id).await? else {
        return Err(ApiError::not_found("blog", "Blog not found.").into());
    };
    blog.name = nonempty(&params, "name", "Name cannot be empty.")?;
    blog.summary = nonempty(&params, "summary", "Summary cannot be empty.")?;
    blog.content = nonempty(&params, "content", "Content cannot be empty.")?;
    state.store.update(&blog).await?;
    Ok(Reply::Json(serde_json::to_value(blog)?))
}

pub async fn api_delete_blog(
    state: AppState,
    ctx: RequestContext,
    params: Params,
) -> HandlerResult {
    check_admin(&ctx)?;
    let id = params.str("id")?;
    let Some(blog) = state.store.find::<Blog>(id).await? else {
        return Err(ApiError::not_found("blog", "Blog not found.").into());
    };
    state.store.remove(&blog).await?;
    Ok(Reply::Json(json!({"id": id})))
}
