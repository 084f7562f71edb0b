//! Upload endpoint: store the file, queue RAW files for conversion.

use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use rawdrop_common::paths::is_raw_file;
use rawdrop_common::TaskId;
use serde::Serialize;
use std::path::Path;

use crate::conversion::SubmitError;
use crate::server::{pages, AppContext};

/// Multipart field carrying the file.
pub const UPLOAD_FIELD: &str = "file";

/// Seconds a client should wait before retrying a rejected conversion.
pub const RETRY_AFTER_SECS: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionStatus {
    Queued,
    NotApplicable,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    /// Stored file name, relative to the media directory
    pub path: String,
    pub conversion: ConversionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<TaskId>,
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("multipart field \"{UPLOAD_FIELD}\" is missing")]
    MissingFile,

    #[error("malformed upload: {0}")]
    Multipart(#[from] MultipartError),

    #[error("could not store upload: {0}")]
    Storage(#[from] rawdrop_common::Error),

    #[error("stored {path} but conversion was not queued: {source}")]
    Rejected {
        path: String,
        #[source]
        source: SubmitError,
    },
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<&'a str>,
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        match self {
            UploadError::MissingFile => (
                StatusCode::BAD_REQUEST,
                Json(ErrorBody {
                    error: message,
                    path: None,
                }),
            )
                .into_response(),
            UploadError::Multipart(e) => (
                e.status(),
                Json(ErrorBody {
                    error: message,
                    path: None,
                }),
            )
                .into_response(),
            UploadError::Storage(rawdrop_common::Error::InvalidInput(_)) => (
                StatusCode::BAD_REQUEST,
                Json(ErrorBody {
                    error: message,
                    path: None,
                }),
            )
                .into_response(),
            UploadError::Storage(e) => {
                tracing::error!(error = %e, "Failed to store upload");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorBody {
                        error: message,
                        path: None,
                    }),
                )
                    .into_response()
            }
            UploadError::Rejected { ref path, .. } => (
                StatusCode::SERVICE_UNAVAILABLE,
                [(header::RETRY_AFTER, RETRY_AFTER_SECS.to_string())],
                Json(ErrorBody {
                    error: message,
                    path: Some(path),
                }),
            )
                .into_response(),
        }
    }
}

pub async fn upload_page() -> Html<&'static str> {
    Html(pages::UPLOAD_PAGE)
}

/// Store the `file` field and queue it for conversion when it is a RAW file.
///
/// The file is fully written and synced before a task is submitted. When the
/// queue refuses the task the upload is kept and the client gets a 503.
pub async fn upload(
    State(ctx): State<AppContext>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), UploadError> {
    while let Some(mut field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let client_name = field.file_name().unwrap_or_default().to_string();
        let mut stored = ctx.media.create(&client_name).await?;

        loop {
            match field.chunk().await {
                Ok(Some(chunk)) => {
                    if let Err(e) = stored.write_chunk(&chunk).await {
                        stored.discard().await;
                        return Err(e.into());
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    stored.discard().await;
                    return Err(e.into());
                }
            }
        }

        let bytes = stored.written();
        let path = stored.finish().await?;
        let name = display_name(&path);
        tracing::info!(path = %path.display(), bytes, "Stored upload");

        if !is_raw_file(&path) {
            return Ok((
                StatusCode::CREATED,
                Json(UploadResponse {
                    path: name,
                    conversion: ConversionStatus::NotApplicable,
                    task: None,
                }),
            ));
        }

        let task = ctx.conversion.task_for(&path)?;
        let id = task.id();
        return match ctx.conversion.submit(task).await {
            Ok(()) => Ok((
                StatusCode::CREATED,
                Json(UploadResponse {
                    path: name,
                    conversion: ConversionStatus::Queued,
                    task: Some(id),
                }),
            )),
            Err(source) => Err(UploadError::Rejected { path: name, source }),
        };
    }

    Err(UploadError::MissingFile)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
