//! HTTP server implementation.

use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::parser::{
    read_content, read_request_head, BodyStrategy, Connection, Error as ParserError, HttpRequest, Method,
    Socket, Transport,
};
use crate::server::config::ServerConfig;
use crate::server::error::Error;
use crate::server::handler::{into_handler, HandlerFn, MiddlewareFn};
use crate::server::response::{HttpResponse, StatusCode};
use crate::server::router::{Route, RoutePattern, Router};
use crate::server::writer::{write_response, WriteOutcome};

/// Deletes a spooled upload when dropped.
struct SpooledFile(Option<PathBuf>);

impl Drop for SpooledFile {
    fn drop(&mut self) {
        if let Some(path) = self.0.take() {
            if let Err(e) = std::fs::remove_file(&path) {
                warn!("Failed to remove spooled upload {path}: {e}", path = path.display());
            }
        }
    }
}

/// An HTTP server.
///
/// Routes, middleware and the not-found handler are registered up front;
/// once serving starts the server is shared read-only by every connection.
pub struct HttpServer {
    /// The server configuration.
    pub config: ServerConfig,
    /// The routes.
    pub router: Router,
    middleware: Vec<MiddlewareFn>,
    not_found: Option<HandlerFn>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            router: Router::new(),
            middleware: Vec::new(),
            not_found: None,
        }
    }

    /// Add a route to the server. An empty `methods` list accepts any method.
    pub fn add_route<F, Fut>(&mut self, path: impl AsRef<str>, methods: Vec<Method>, handler: F)
    where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HttpResponse> + Send + 'static,
    {
        self.router.add(Route {
            pattern: RoutePattern::parse(path.as_ref()),
            methods,
            handler: into_handler(handler),
        });
    }

    /// Add a `GET` route.
    pub fn get<F, Fut>(&mut self, path: impl AsRef<str>, handler: F)
    where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HttpResponse> + Send + 'static,
    {
        self.add_route(path, vec![Method::GET], handler);
    }

    /// Add a `POST` route.
    pub fn post<F, Fut>(&mut self, path: impl AsRef<str>, handler: F)
    where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HttpResponse> + Send + 'static,
    {
        self.add_route(path, vec![Method::POST], handler);
    }

    /// Add a route that accepts any method.
    pub fn any<F, Fut>(&mut self, path: impl AsRef<str>, handler: F)
    where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HttpResponse> + Send + 'static,
    {
        self.add_route(path, Vec::new(), handler);
    }

    /// Append a middleware. Middleware run in registration order before routing.
    pub fn add_middleware<F>(&mut self, middleware: F)
    where
        F: Fn(&HttpRequest) -> Option<HttpResponse> + Send + Sync + 'static,
    {
        self.middleware.push(Arc::new(middleware));
    }

    /// Handler for requests no route matches. Defaults to a plain 404.
    pub fn set_not_found_handler<F, Fut>(&mut self, handler: F)
    where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HttpResponse> + Send + 'static,
    {
        self.not_found = Some(into_handler(handler));
    }

    /// Display registered endpoints.
    fn display_server_info(&self) {
        info!("Registered endpoints:");
        for route in self.router.routes() {
            let methods = if route.methods.is_empty() {
                "*".to_string()
            } else {
                route.methods.iter()
                    .map(|m| format!("{m}"))
                    .collect::<Vec<String>>()
                    .join(", ")
            };
            info!("  {methods} {}", route.pattern);
        }
    }

    /// Start the server on `config.addr` and serve until Ctrl+C.
    pub async fn start(self) -> Result<(), Error> {
        let listener = TcpListener::bind(&self.config.addr).await?;
        info!("Server listening on http://{addr}", addr = self.config.addr);

        self.serve(listener, async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Received Ctrl+C, initiating graceful shutdown"),
                Err(e) => error!("Error setting up Ctrl+C handler: {e}"),
            }
        })
        .await
    }

    /// Accept connections from `listener` until `shutdown` completes, then
    /// wait for in-flight connections to finish.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<(), Error>
    where
        F: Future<Output = ()> + Send,
    {
        self.display_server_info();

        let server = Arc::new(self);
        let semaphore = Arc::new(Semaphore::new(server.config.max_connections));
        let mut tasks = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutting down server...");
                    break;
                }

                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((socket, addr)) => {
                            Self::handle_new_connection(socket, addr, &server, &semaphore, &mut tasks).await;
                        }
                        Err(e) => Self::handle_accept_error(e).await,
                    }
                }

                // Reap finished connections so the set does not grow unbounded.
                Some(res) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = res {
                        error!("Connection task failed: {e}");
                    }
                }
            }
        }

        Self::perform_shutdown(&mut tasks).await;
        Ok(())
    }

    /// Hand an accepted socket to its own task, or reject it at capacity.
    async fn handle_new_connection(
        socket: TcpStream,
        addr: SocketAddr,
        server: &Arc<HttpServer>,
        semaphore: &Arc<Semaphore>,
        tasks: &mut JoinSet<()>,
    ) {
        let permit = match semaphore.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                warn!("Connection limit reached, rejecting connection from {addr}");
                let response = HttpResponse::new(StatusCode::ServiceUnavailable)
                    .with_content_type("text/plain")
                    .with_body_string("Server is at capacity, please try again later");
                let mut connection = Connection::new(socket, 1024);
                if let Err(e) = write_response(&mut connection, response, false, &Method::GET).await {
                    debug!("Failed to send 503 to {addr}: {e}");
                }
                if let Err(e) = connection.close().await {
                    debug!("Failed to close rejected connection from {addr}: {e}");
                }
                return;
            }
        };

        let server = server.clone();
        tasks.spawn(async move {
            // The permit is dropped when the task completes, releasing the semaphore slot
            let _permit = permit;

            if let Err(e) = server.handle_connection(socket, Some(addr)).await {
                error!("Error handling connection from {addr}: {e}");
            }
        });
    }

    async fn handle_accept_error(e: std::io::Error) {
        error!("Error accepting connection: {e}");
        // Usually descriptor exhaustion; back off before retrying.
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    }

    /// Perform graceful shutdown.
    async fn perform_shutdown(tasks: &mut JoinSet<()>) {
        info!("Waiting for {len} active connections to complete...", len = tasks.len());
        let shutdown_timeout = tokio::time::Duration::from_secs(30);
        let drained = tokio::time::timeout(shutdown_timeout, async {
            while let Some(res) = tasks.join_next().await {
                if let Err(e) = res {
                    error!("Task failed during shutdown: {e}");
                }
            }
        })
        .await;

        if drained.is_err() {
            warn!("Shutdown timeout elapsed, aborting {len} connections", len = tasks.len());
            tasks.abort_all();
        }
        info!("Server shutdown complete");
    }

    /// Run one connection: parse, dispatch and respond until the connection
    /// closes, keep-alive ends, or the protocol is switched.
    pub async fn handle_connection<S>(&self, socket: S, peer: Option<SocketAddr>) -> Result<(), Error>
    where
        S: Socket + 'static,
    {
        let mut connection = Connection::new(socket, self.config.read_buffer_size);
        if let Some(peer) = peer {
            connection = connection.with_peer(peer);
        }

        loop {
            let mut request = match read_request_head(&mut connection).await {
                Ok(request) => request,
                Err(ParserError::ConnectionClosed) => {
                    debug!("Peer closed the connection");
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            };
            request.address = connection.peer().map(|addr| addr.to_string());

            let strategy = BodyStrategy::select(&request.headers, self.config.spool_uploads);
            read_content(&mut connection, &mut request, strategy, &self.config.temp_dir).await?;
            let spooled = SpooledFile(request.temp_file.clone());

            let keep_alive = request.supports_keep_alive();
            let method = request.method.clone();
            debug!("{method} {path}", path = request.path);

            let response = self.dispatch(request).await;
            match write_response(&mut connection, response, keep_alive, &method).await? {
                WriteOutcome::KeepAlive => {}
                WriteOutcome::Close => {
                    let _ = connection.close().await;
                    return Ok(());
                }
                WriteOutcome::Upgrade(session) => {
                    drop(spooled);
                    session(Box::new(connection)).await;
                    return Ok(());
                }
            }
        }
    }

    /// Run middleware, then the router, then the not-found fallback.
    pub async fn dispatch(&self, mut request: HttpRequest) -> HttpResponse {
        for middleware in &self.middleware {
            if let Some(response) = middleware(&request) {
                return response;
            }
        }

        match self.router.find(&request.method, request.path_only()) {
            Some((route, params)) => {
                request.params = params;
                (route.handler)(request).await
            }
            None => match &self.not_found {
                Some(handler) => handler(request).await,
                None => HttpResponse::not_found(),
            },
        }
    }
}
