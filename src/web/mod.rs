//! The request pipeline: endpoint descriptors, parameter binding, response
//! coercion, and the dispatch glue mounting it all on the HTTP stack.

pub mod binder;
pub mod dispatch;
pub mod endpoint;
pub mod reply;

pub use binder::{bind, collect_post_kw};
pub use dispatch::{into_router, log_requests};
pub use endpoint::{
    EndpointSpec, Handler, HandlerFuture, HandlerResult, Params, RequestContext, RouteError,
    RouteTable,
};
pub use reply::{coerce, PlainTemplates, RenderError, Reply, TemplateEngine};
