//! Local HTTP server for the site.
//!
//! `GET /api/health` answers `{"ok": true, "service": "studio-gallery"}`;
//! every other path is served from the public directory (the site itself,
//! including its `galeria.json` snapshot). No authentication.

use crate::config::ServerConfig;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use std::path::Path;
use thiserror::Error;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Serialize)]
struct Health {
    ok: bool,
    service: &'static str,
}

async fn health() -> Json<Health> {
    Json(Health {
        ok: true,
        service: env!("CARGO_PKG_NAME"),
    })
}

/// Routes for the site. A missing `public_dir` only disables static files.
pub fn router(public_dir: &Path) -> Router {
    let app = Router::new().route("/api/health", get(health));
    let app = if public_dir.is_dir() {
        app.fallback_service(ServeDir::new(public_dir))
    } else {
        tracing::warn!(dir = %public_dir.display(), "public directory not found, serving health endpoint only");
        app
    };
    app.layer(TraceLayer::new_for_http())
}

/// Bind and serve until Ctrl-C.
pub async fn serve(config: &ServerConfig) -> Result<(), ServerError> {
    let app = router(Path::new(&config.public_dir));
    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port)).await?;
    let addr = listener.local_addr()?;
    tracing::info!(%addr, public_dir = %config.public_dir, "server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
            }
            tracing::info!("shutting down");
        })
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use tempfile::TempDir;
    use tower::ServiceExt;

    async fn get_path(app: Router, path: &str) -> (StatusCode, String) {
        let response = app
            .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8_lossy(&body).into_owned())
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let dir = TempDir::new().unwrap();
        let (status, body) = get_path(router(dir.path()), "/api/health").await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["ok"], true);
        assert_eq!(json["service"], "studio-gallery");
    }

    #[tokio::test]
    async fn serves_public_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("galeria.json"), r#"["a.jpg"]"#).unwrap();
        let (status, body) = get_path(router(dir.path()), "/galeria.json").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, r#"["a.jpg"]"#);

        let (status, _) = get_path(router(dir.path()), "/missing.html").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn missing_public_dir_still_serves_health() {
        let dir = TempDir::new().unwrap();
        let app = router(&dir.path().join("nope"));
        assert_eq!(get_path(app.clone(), "/api/health").await.0, StatusCode::OK);
        assert_eq!(get_path(app, "/index.html").await.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unresolvable_host_is_io_error() {
        let config = ServerConfig {
            host: "not a host".into(),
            ..ServerConfig::default()
        };
        assert!(matches!(serve(&config).await, Err(ServerError::Io(_))));
    }
}
