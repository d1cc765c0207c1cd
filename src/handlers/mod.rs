//! HTTP endpoints: public pages, the management pages, and the JSON APIs.

pub mod blogs;
pub mod comments;
pub mod pages;
pub mod users;

use serde_json::{Map, Value};

use crate::error::HandlerError;
use crate::orm::{Entity, Store};
use crate::state::AppState;
use crate::web::endpoint::{EndpointSpec, RouteError, RouteTable};

/// Wrap an async endpoint function into the boxed-future shape the route
/// table stores.
macro_rules! endpoint {
    ($handler:path) => {
        |state, ctx, params| -> $crate::web::endpoint::HandlerFuture {
            Box::pin($handler(state, ctx, params))
        }
    };
}

/// Every endpoint of the application, bound to its path and parameter
/// contract.
pub fn route_table() -> Result<RouteTable<AppState>, RouteError> {
    RouteTable::new()
        .register(EndpointSpec::get("/", endpoint!(pages::index)).named(&["page"]))?
        .register(EndpointSpec::get("/blog/{id}", endpoint!(pages::get_blog)))?
        .register(EndpointSpec::get("/register", endpoint!(pages::register)))?
        .register(EndpointSpec::get("/signin", endpoint!(pages::signin)))?
        .register(EndpointSpec::get("/signout", endpoint!(pages::signout)).with_request())?
        .register(EndpointSpec::get("/manage/", endpoint!(pages::manage)))?
        .register(
            EndpointSpec::get("/manage/comments", endpoint!(pages::manage_comments))
                .named(&["page"]),
        )?
        .register(
            EndpointSpec::get("/manage/blogs", endpoint!(pages::manage_blogs)).named(&["page"]),
        )?
        .register(EndpointSpec::get(
            "/manage/blogs/create",
            endpoint!(pages::manage_create_blog),
        ))?
        .register(
            EndpointSpec::get("/manage/blogs/edit", endpoint!(pages::manage_edit_blog))
                .named(&["id"])
                .required(&["id"]),
        )?
        .register(
            EndpointSpec::get("/manage/users", endpoint!(pages::manage_users)).named(&["page"]),
        )?
        .register(
            EndpointSpec::post("/api/authenticate", endpoint!(users::authenticate))
                .named(&["email", "passwd"])
                .required(&["email", "passwd"]),
        )?
        .register(
            EndpointSpec::get("/api/users", endpoint!(users::api_get_users)).named(&["page"]),
        )?
        .register(
            EndpointSpec::post("/api/users", endpoint!(users::api_register_user))
                .named(&["email", "name", "passwd"])
                .required(&["email", "name", "passwd"]),
        )?
        .register(
            EndpointSpec::post("/api/users/{id}/delete", endpoint!(users::api_delete_users))
                .with_request(),
        )?
        .register(EndpointSpec::get("/api/blogs", endpoint!(blogs::api_blogs)).named(&["page"]))?
        .register(
            EndpointSpec::get("/api/blogs/{id}", endpoint!(blogs::api_get_blog))
                .named(&["id"])
                .required(&["id"]),
        )?
        .register(
            EndpointSpec::post("/api/blogs", endpoint!(blogs::api_create_blog))
                .named(&["name", "summary", "content"])
                .required(&["name", "summary", "content"])
                .with_request(),
        )?
        .register(
            EndpointSpec::post("/api/blogs/{id}", endpoint!(blogs::api_update_blog))
                .named(&["name", "summary", "content"])
                .required(&["name", "summary", "content"])
                .with_request(),
        )?
        .register(
            EndpointSpec::post("/api/blogs/{id}/delete", endpoint!(blogs::api_delete_blog))
                .named(&["id"])
                .required(&["id"])
                .with_request(),
        )?
        .register(
            EndpointSpec::get("/api/comments", endpoint!(comments::api_comments))
                .named(&["page"]),
        )?
        .register(
            EndpointSpec::post(
                "/api/blogs/{id}/comments",
                endpoint!(comments::api_create_comment),
            )
            .named(&["content"])
            .required(&["content"])
            .with_request(),
        )?
        .register(
            EndpointSpec::post(
                "/api/comments/{id}/delete",
                endpoint!(comments::api_delete_comments),
            )
            .with_request(),
        )
}

/// Template context from a `json!` object literal.
pub(crate) fn context(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// `count(id)` over the entity's table.
pub(crate) async fn count<E: Entity>(store: &Store) -> Result<u64, HandlerError> {
    let n = store.find_number::<E>("count(id)", None, &[]).await?;
    Ok(n.and_then(|v| v.as_u64()).unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_full_route_table_registers_cleanly() {
        let table = route_table().unwrap();
        assert_eq!(table.routes().len(), 23);
    }
}
