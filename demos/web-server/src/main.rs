//! Example web server tracking visits in a tiered session.
//!
//! Run with: cargo run -p web-server-example
//!
//! Then open http://localhost:3000 in your browser. Set `REDIS_URL` (feature
//! `redis`) or `DATABASE_URL` (feature `sqlite`) to use real backends.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    Router,
    extract::ConnectInfo,
    response::{Html, Redirect},
    routing::get,
};
use chrono::Utc;
use tiered_session::{DynSessionEngine, MemoryCache, MemoryStore, SessionEngine};
use tiered_session_core::{SessionCache, SessionConfig, SessionStore};
use tiered_session_http::{Session, SessionLayer, with_sessions};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const GC_INTERVAL: Duration = Duration::from_secs(3600);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = SessionConfig::from_env()?;
    let engine = SessionEngine::from_shared(cache_from_env().await?, store_from_env().await?, config);

    tokio::spawn(collect_garbage(engine.clone()));

    // Build router
    let router = Router::new()
        .route("/", get(index_handler))
        .route("/logout", get(logout_handler));
    let app = with_sessions(router, SessionLayer::new(engine))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let addr = SocketAddr::from(([127, 0, 0, 1], 3000));
    tracing::info!("Server listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

async fn cache_from_env() -> anyhow::Result<Arc<dyn SessionCache>> {
    #[cfg(feature = "redis")]
    if let Ok(url) = std::env::var("REDIS_URL") {
        tracing::info!("Using Redis session cache");
        return Ok(Arc::new(tiered_session::RedisCache::connect(&url).await?));
    }

    tracing::info!("Using in-memory session cache");
    Ok(Arc::new(MemoryCache::new()))
}

async fn store_from_env() -> anyhow::Result<Arc<dyn SessionStore>> {
    #[cfg(feature = "sqlite")]
    if let Ok(url) = std::env::var("DATABASE_URL") {
        tracing::info!("Using SQLite session store");
        return Ok(Arc::new(tiered_session::SqliteStore::new(&url).await?));
    }

    tracing::info!("Using in-memory session store");
    Ok(Arc::new(MemoryStore::new()))
}

async fn collect_garbage(engine: DynSessionEngine) {
    let mut interval = tokio::time::interval(GC_INTERVAL);
    loop {
        interval.tick().await;
        let purged = engine
            .coordinator()
            .collect_garbage(engine.config().duration)
            .await;
        tracing::info!(purged, "Session garbage collection finished");
    }
}

async fn index_handler(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    session: Session,
) -> Html<String> {
    let now = Utc::now().to_rfc3339();
    let ip = addr.ip().to_string();

    if session.get::<String>("first_seen").is_none() {
        record(&session, "first_seen", &now);
        record(&session, "first_seen_ip", &ip);
    }
    record(&session, "last_seen", &now);
    record(&session, "last_seen_ip", &ip);

    let rows: String = ["first_seen", "first_seen_ip", "last_seen", "last_seen_ip"]
        .iter()
        .map(|key| {
            let value = session.get::<String>(key).unwrap_or_default();
            format!("<tr><th>{key}</th><td>{}</td></tr>", escape_html(&value))
        })
        .collect();

    Html(format!(
        "<!DOCTYPE html>\n<html>\n<head><title>Session</title></head>\n<body>\n\
         <h1>Session {}</h1>\n<table>{rows}</table>\n\
         <p><a href=\"/logout\">Log out</a></p>\n</body>\n</html>\n",
        escape_html(session.id()),
    ))
}

async fn logout_handler(session: Session) -> Redirect {
    session.destroy();
    Redirect::to("/")
}

fn record(session: &Session, key: &str, value: &str) {
    if let Err(e) = session.insert(key, value) {
        tracing::warn!(key, error = %e, "Unable to update session");
    }
}

fn escape_html(value: &str) -> String {
    value
        .chars()
        .fold(String::with_capacity(value.len()), |mut out, c| {
            match c {
                '&' => out.push_str("&amp;"),
                '<' => out.push_str("&lt;"),
                '>' => out.push_str("&gt;"),
                '"' => out.push_str("&quot;"),
                '\'' => out.push_str("&#39;"),
                _ => out.push(c),
            }
            out
        })
}
