//! Comment API: listing, posting under a blog, and admin-only deletion.

use serde_json::json;

use crate::apis::{page_index_of, ApiError, Page};
use crate::handlers::count;
use crate::models::{Blog, Comment};
use crate::orm::Query;
use crate::session::{check_admin, current_user};
use crate::state::AppState;
use crate::web::endpoint::{HandlerResult, Params, RequestContext};
use crate::web::reply::Reply;

pub async fn api_comments(state: AppState, _ctx: RequestContext, params: Params) -> HandlerResult {
    let page_index = page_index_of(params.str_or("page", "1"));
    let num = count::<Comment>(&state.store).await?;
    let page = Page::new(num, page_index);
    if num == 0 {
        return Ok(Reply::Json(json!({"page": page, "comments": []})));
    }
    let comments = state
        .store
        .find_all::<Comment>(
            Query::new()
                .order_by("created_at desc")
                .limit((page.offset, page.limit)),
        )
        .await?;
    Ok(Reply::Json(json!({"page": page, "comments": comments})))
}

/// Post a comment under a blog. Any signed-in user may comment.
pub async fn api_create_comment(
    state: AppState,
    ctx: RequestContext,
    params: Params,
) -> HandlerResult {
    let Some(user) = current_user(&ctx) else {
        return Err(ApiError::permission("Please signin first.").into());
    };
    let user = user.clone();
    let id = params.str("id")?;
    let content = params.str_or("content", "");
    if content.trim().is_empty() {
        return Err(ApiError::invalid("content", "").into());
    }
    let Some(blog) = state.store.find::<Blog>(id).await? else {
        return Err(ApiError::not_found("Blog", "").into());
    };
    let mut comment = Comment {
        id: None,
        blog_id: blog.id.unwrap_or_else(|| id.to_string()),
        user_id: user.id,
        user_name: user.name,
        user_image: user.image,
        content: content.trim().to_string(),
        created_at: None,
    };
    state.store.save(&mut comment).await?;
    Ok(Reply::Json(serde_json::to_value(comment)?))
}

pub async fn api_delete_comments(
    state: AppState,
    ctx: RequestContext,
    params: Params,
) -> HandlerResult {
    check_admin(&ctx)?;
    let id = params.str("id")?;
    let Some(comment) = state.store.find::<Comment>(id).await? else {
        return Err(ApiError::not_found("Comment", "").into());
    };
    state.store.remove(&comment).await?;
    Ok(Reply::Json(json!({"id": id})))
}
