//! Native actix-web front end. Requests are adapted into Spin requests and
//! dispatched through the same [`crate::route`] table the component uses.

use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;

use actix_web::dev::Server;
use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
use tracing::{error, info};

use crate::config::Config;
use crate::context::AppContext;

mod adapter {
    use actix_web::HttpRequest;
    use spin_sdk::http::{Method, Request};

    pub fn actix_to_spin_request(
        req: &HttpRequest,
        body: actix_web::web::Bytes,
    ) -> anyhow::Result<Request> {
        let method = match req.method().as_str() {
            "GET" => Method::Get,
            "POST" => Method::Post,
            "PUT" => Method::Put,
            "DELETE" => Method::Delete,
            "HEAD" => Method::Head,
            "OPTIONS" => Method::Options,
            "PATCH" => Method::Patch,
            other => anyhow::bail!("unsupported method {}", other),
        };

        let uri = req.uri().to_string();

        let mut req_builder = Request::builder();
        let mut with_headers = req_builder.method(method).uri(&uri);
        for (name, value) in req.headers() {
            if let Ok(val_str) = value.to_str() {
                with_headers = with_headers.header(name.as_str(), val_str);
            }
        }

        Ok(with_headers.body(body.to_vec()).build())
    }

    pub fn spin_to_actix_response(spin_resp: spin_sdk::http::Response) -> actix_web::HttpResponse {
        let status = *spin_resp.status();

        actix_web::HttpResponse::build(
            actix_web::http::StatusCode::from_u16(status)
                .unwrap_or(actix_web::http::StatusCode::INTERNAL_SERVER_ERROR),
        )
        .content_type("application/json")
        .body(spin_resp.body().to_vec())
    }
}

async fn handle_all(
    ctx: web::Data<AppContext>,
    req: HttpRequest,
    body: web::Bytes,
) -> HttpResponse {
    let spin_req = match adapter::actix_to_spin_request(&req, body) {
        Ok(r) => r,
        Err(_) => {
            return HttpResponse::BadRequest()
                .json(serde_json::json!({"error": "Invalid request"}))
        }
    };

    match crate::route(&ctx, spin_req) {
        Ok(spin_resp) => adapter::spin_to_actix_response(spin_resp),
        Err(e) => {
            error!(path = %req.path(), error = %e, "request failed");
            HttpResponse::InternalServerError()
                .json(serde_json::json!({"error": "Internal server error"}))
        }
    }
}

/// Bind the server without starting it. Returns the bound addresses, which
/// matters when binding port 0.
pub fn bind(
    ctx: Arc<AppContext>,
    addr: impl ToSocketAddrs,
) -> std::io::Result<(Server, Vec<SocketAddr>)> {
    let data = web::Data::from(ctx);
    let server = HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .default_service(web::route().to(handle_all))
    })
    .bind(addr)?;

    let addrs = server.addrs();
    Ok((server.run(), addrs))
}

pub async fn run(config: Config) -> std::io::Result<()> {
    let addr = (config.host.clone(), config.port);
    info!(
        serialize_post_updates = config.serialize_post_updates,
        "Initializing in-memory store..."
    );
    let ctx = Arc::new(AppContext::in_memory(config));

    let (server, addrs) = bind(ctx, addr)?;
    for addr in &addrs {
        info!("Server listening on http://{addr}");
    }

    server.await
}
