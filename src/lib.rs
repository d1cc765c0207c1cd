//! Weblog: a small blogging service built on axum and MySQL.
//!
//! The [`web`] module is a miniature request framework (endpoint descriptors,
//! parameter binding, response coercion); [`orm`] maps entity structs onto
//! tables through compiled statement templates. Everything above those two
//! layers is the application itself.

pub mod apis;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod orm;
pub mod session;
pub mod state;
pub mod web;

pub use apis::{page_index_of, ApiError, Page};
pub use config::Config;
pub use error::{BadRequest, HandlerError};
pub use handlers::route_table;
pub use models::{next_id, Blog, Comment, User};
pub use orm::{Catalog, Db, DbConfig, OrmError, Query, Store};
pub use session::{session_middleware, CurrentUser};
pub use state::AppState;
pub use web::{into_router, log_requests, PlainTemplates, Reply, RouteTable};
