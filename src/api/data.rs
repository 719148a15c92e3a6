use axum::body::Bytes;
use axum::extract::multipart::{Multipart, MultipartError, MultipartRejection};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::error::AppError;
use crate::models::{DataStatus, TabularReport};
use crate::tabular;

const UPLOAD_FIELD: &str = "file";
const CLEAN_FILENAME: &str = "clean_data.csv";

struct Upload {
    filename: String,
    bytes: Bytes,
}

fn upload_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(err.body_text())
    } else {
        AppError::InvalidRequest(err.body_text())
    }
}

/// Pull the `file` field out of a multipart body.
async fn read_upload(multipart: Result<Multipart, MultipartRejection>) -> Result<Upload, AppError> {
    let mut multipart = multipart.map_err(|e| AppError::InvalidRequest(e.body_text()))?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(upload_error)?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let filename = field.file_name().unwrap_or("upload.csv").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(upload_error)?;
        return Ok(Upload { filename, bytes });
    }

    Err(AppError::InvalidRequest(format!(
        "multipart field '{UPLOAD_FIELD}' is required"
    )))
}

/// POST /analyze-data - Count missing cells in an uploaded CSV.
pub async fn analyze_data(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<TabularReport>, AppError> {
    let upload = read_upload(multipart).await?;
    let bytes = upload.bytes;
    let stats = tokio::task::spawn_blocking(move || tabular::inspect(&bytes)).await??;

    tracing::info!(
        "Inspected {}: {} rows x {} columns, {} missing",
        upload.filename,
        stats.rows,
        stats.columns,
        stats.missing
    );

    Ok(Json(TabularReport {
        filename: upload.filename,
        missing: stats.missing,
        status: DataStatus::from_missing(stats.missing),
        rows: stats.rows,
        columns: stats.columns,
    }))
}

/// POST /unspaghetti-it - Return the uploaded CSV with missing cells set to 0.
pub async fn unspaghetti_it(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, AppError> {
    let upload = read_upload(multipart).await?;
    let bytes = upload.bytes;
    let cleaned = tokio::task::spawn_blocking(move || tabular::clean(&bytes)).await??;

    tracing::info!("Cleaned {} ({} bytes)", upload.filename, cleaned.len());

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={CLEAN_FILENAME}"),
            ),
        ],
        cleaned,
    )
        .into_response())
}
