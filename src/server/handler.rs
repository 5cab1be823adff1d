//! Handler and middleware types.

use std::future::Future;
use std::sync::Arc;

use crate::parser::{BoxFuture, HttpRequest};
use crate::server::HttpResponse;

/// Type alias for a boxed future that resolves to an HttpResponse.
pub type HandlerFuture = BoxFuture<'static, HttpResponse>;

/// Type alias for a handler function that takes an HttpRequest and returns a HandlerFuture.
pub type HandlerFn = Arc<dyn Fn(HttpRequest) -> HandlerFuture + Send + Sync>;

/// Runs before routing; returning a response skips the router.
pub type MiddlewareFn = Arc<dyn Fn(&HttpRequest) -> Option<HttpResponse> + Send + Sync>;

/// Box an async handler closure.
pub fn into_handler<F, Fut>(handler: F) -> HandlerFn
where
    F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HttpResponse> + Send + 'static,
{
    Arc::new(move |req: HttpRequest| -> HandlerFuture { Box::pin(handler(req)) })
}
