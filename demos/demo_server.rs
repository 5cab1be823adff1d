//! Demo server exercising every response kind microserve supports.
//!
//! Run with `RUST_LOG=debug cargo run --example demo_server`, then try:
//!
//! ```text
//! curl http://127.0.0.1:8080/magic
//! curl http://127.0.0.1:8080/test/foo/bar
//! curl -F my_file1=@Cargo.toml -F my_file2=@README.md http://127.0.0.1:8080/upload
//! curl -d "login=admin&password=secret" http://127.0.0.1:8080/login
//! curl -N http://127.0.0.1:8080/stream
//! curl -H "Content-Type: application/octet-stream" --data-binary @logo.png http://127.0.0.1:8080/upload/logo
//! ```

use std::collections::HashMap;
use std::time::Duration;

use log::info;
use microserve::websocket::{websocket, WebSocketHandlers};
use microserve::{HttpResponse, HttpServer, Method, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ServerConfig::default()
        .with_addr("127.0.0.1:8080".parse()?)
        .with_spool_uploads(true);
    let mut server = HttpServer::new(config);

    server.add_middleware(|req| {
        info!("{} {} from {}", req.method, req.path, req.address.as_deref().unwrap_or("unknown"));
        None
    });

    server.get("/magic", |req| async move {
        let mut headers: Vec<String> = req.headers.iter().map(|(k, v)| format!("{k}: {v}")).collect();
        headers.sort();
        HttpResponse::ok_text(format!(
            "method: {}\npath: {}\nquery: {:?}\n\n{}",
            req.method,
            req.path_only(),
            req.query_params,
            headers.join("\n")
        ))
    });

    server.get("/test/:param1/:param2", |req| async move {
        HttpResponse::ok_text(format!(
            "param1 = {}, param2 = {}",
            req.param("param1").unwrap_or_default(),
            req.param("param2").unwrap_or_default()
        ))
    });

    server.get("/wildcard/*/test/*/:param", |req| async move {
        HttpResponse::ok_text(format!("param = {}", req.param("param").unwrap_or_default()))
    });

    server.post("/upload", |req| async move {
        let listing: Vec<String> = req
            .multipart()
            .map(|part| {
                format!(
                    "{} ({}): {} bytes",
                    part.name.unwrap_or_else(|| "-".to_string()),
                    part.file_name.unwrap_or_else(|| "-".to_string()),
                    part.body.len()
                )
            })
            .collect();
        HttpResponse::ok_text(listing.join("\n"))
    });

    server.add_route("/login", vec![Method::GET, Method::POST], |req| async move {
        if req.method == Method::GET {
            return HttpResponse::ok_html(
                "<form method=\"POST\"><input name=\"login\"><input name=\"password\" type=\"password\">\
                 <button>Login</button></form>",
            );
        }
        let form: HashMap<String, String> = req.parse_urlencoded_form().into_iter().collect();
        match (form.get("login"), form.get("password")) {
            (Some(login), Some(_)) => HttpResponse::ok_text(format!("Welcome, {login}")),
            _ => HttpResponse::bad_request("login and password are required"),
        }
    });

    server.get("/raw", |_req| async {
        HttpResponse::raw(200, "OK", HashMap::new(), |writer| {
            Box::pin(async move { writer.write(b"raw response").await })
        })
    });

    server.get("/redirect", |_req| async { HttpResponse::moved_permanently("/magic") });

    server.get("/long", |_req| async {
        let body: String = (0..1000).map(|i| format!("line {i}\n")).collect();
        HttpResponse::ok_text(body)
    });

    server.get("/stream", |_req| async {
        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), "text/plain".to_string());
        HttpResponse::raw(200, "OK", headers, |writer| {
            Box::pin(async move {
                for i in 0..10 {
                    writer.write(format!("[chunk {i}]\n").as_bytes()).await?;
                    tokio::time::sleep(Duration::from_millis(200)).await;
                }
                Ok(())
            })
        })
    });

    server.post("/upload/logo", |req| async move {
        let Some(path) = req.temp_file.clone() else {
            return HttpResponse::bad_request("expected an application/octet-stream upload");
        };
        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), "image/png".to_string());
        HttpResponse::raw(200, "OK", headers, move |writer| {
            Box::pin(async move {
                writer.write_file(&path).await?;
                Ok(())
            })
        })
    });

    server.get(
        "/websocket-echo",
        websocket(
            WebSocketHandlers::new()
                .on_connected(|_session| {
                    info!("WebSocket client connected");
                    Box::pin(async {})
                })
                .on_text(|session, text| {
                    Box::pin(async move {
                        let _ = session.write_text(&text).await;
                    })
                })
                .on_binary(|session, data| {
                    Box::pin(async move {
                        let _ = session.write_binary(&data).await;
                    })
                })
                .on_disconnected(|_session| {
                    info!("WebSocket client disconnected");
                    Box::pin(async {})
                }),
        ),
    );

    server.set_not_found_handler(|req| async move {
        HttpResponse::not_found()
            .with_content_type("text/html")
            .with_body_string(format!("<h1>Nothing at {}</h1><a href=\"/magic\">Try /magic</a>", req.path_only()))
    });

    server.start().await?;
    Ok(())
}
