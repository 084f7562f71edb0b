//! Browsing the media directory.

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Json,
};

use crate::conversion::PoolStats;
use crate::server::{pages, AppContext};

/// Directory listing for `/`. Individual files are served by the fallback.
pub async fn index(State(ctx): State<AppContext>) -> Response {
    match list_media(ctx.media.root()).await {
        Ok(names) => Html(pages::directory_listing(&names)).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to list media directory");
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to list media directory").into_response()
        }
    }
}

/// Conversion pipeline statistics.
pub async fn status(State(ctx): State<AppContext>) -> Json<PoolStats> {
    Json(ctx.conversion.stats())
}

async fn list_media(root: &std::path::Path) -> std::io::Result<Vec<String>> {
    let mut entries = tokio::fs::read_dir(root).await?;
    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}
