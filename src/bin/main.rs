#[cfg(not(target_arch = "wasm32"))]
#[actix_web::main]
async fn main() -> std::io::Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let config = ripple::config::Config::load();
    ripple::server::run(config).await
}

#[cfg(target_arch = "wasm32")]
fn main() {}
