use tracing_subscriber::{fmt, EnvFilter};

/// Initialize dotenv and structured tracing based on RUST_LOG.
///
/// Looks for an explicit env file via ENV_FILE, then falls back to standard
/// `.env` discovery in the working directory. Logs the source used.
pub fn init_tracing() {
    let mut env_source: String = "none".into();
    if let Ok(p) = std::env::var("ENV_FILE") {
        let p = p.trim();
        if !p.is_empty() && std::path::Path::new(p).is_file() && dotenvy::from_filename(p).is_ok() {
            env_source = p.to_string();
        }
    }
    if env_source == "none" && dotenvy::dotenv().is_ok() {
        env_source = ".env".into();
    }

    // Initialize tracing (respects RUST_LOG potentially provided by the env file)
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into());
    let subscriber = fmt().with_env_filter(EnvFilter::new(filter)).finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    tracing::info!("Environment loaded from: {}", env_source);
}

/// Build the shared HTTP client honoring the timeout environment variable.
///
/// Environment:
/// - MODELGATE_HTTP_TIMEOUT_SECONDS -> overall request timeout (u64)
pub fn build_http_client_from_env() -> reqwest::Client {
    let mut builder = reqwest::Client::builder();

    if let Ok(secs) = std::env::var("MODELGATE_HTTP_TIMEOUT_SECONDS") {
        if let Ok(n) = secs.trim().parse::<u64>() {
            builder = builder.timeout(std::time::Duration::from_secs(n));
        }
    }

    // User-Agent for observability
    builder = builder.user_agent(format!("modelgate/{}", env!("CARGO_PKG_VERSION")));

    builder.build().unwrap_or_else(|_| reqwest::Client::new())
}

/// Rough token estimate used for pre-dispatch diagnostics only.
pub fn estimate_tokens(prompt: &str) -> usize {
    prompt.len() / 5
}
