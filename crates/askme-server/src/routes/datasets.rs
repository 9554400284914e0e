//! Dataset routes: upload a document for ingestion, delete chunks by
//! metadata.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::extract::multipart::{Field, MultipartRejection};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, State};
use axum::routing::post;
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use askme_core::Error;
use askme_store::MetadataFilter;

use crate::error::ApiError;
use crate::state::AppState;

/// The multipart field carrying the document.
const FILE_FIELD: &str = "file";

/// Description of a stored upload, echoed back to the client.
#[derive(Debug, Clone, Serialize)]
pub struct StoredUpload {
    pub fieldname: String,
    pub originalname: String,
    pub encoding: String,
    pub mimetype: String,
    pub destination: String,
    pub filename: String,
    pub path: String,
    pub size: u64,
    #[serde(skip)]
    pub local_path: PathBuf,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/datasets", post(upload_dataset).delete(delete_dataset))
}

/// POST /api/datasets — store one uploaded file and ingest it.
async fn upload_dataset(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut multipart = multipart?;
    let uploads = &state.config.data_paths.uploads;
    let mut body = serde_json::Map::new();
    let mut upload: Option<StoredUpload> = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        if name == FILE_FIELD {
            if let Some(previous) = upload.take() {
                discard(&previous.local_path).await;
                return Err(Error::InvalidRequest("only one file may be uploaded".into()).into());
            }
            upload = Some(store_upload(uploads, field).await?);
        } else if field.file_name().is_some() {
            if let Some(previous) = upload.take() {
                discard(&previous.local_path).await;
            }
            return Err(Error::InvalidRequest(format!("unexpected file field: {}", name)).into());
        } else {
            let value = field.text().await?;
            body.insert(name, serde_json::Value::String(value));
        }
    }

    let upload = upload.ok_or_else(|| {
        Error::InvalidRequest(format!("missing multipart field `{}`", FILE_FIELD))
    })?;

    let report = match state
        .ingester
        .ingest_file(
            &upload.local_path,
            Some(upload.mimetype.as_str()),
            &upload.originalname,
        )
        .await
    {
        Ok(report) => report,
        Err(e) => {
            discard(&upload.local_path).await;
            return Err(e.into());
        }
    };

    info!(
        "Upload {} stored as {} ({} bytes, {} chunks)",
        upload.originalname, upload.filename, upload.size, report.chunks
    );
    Ok(Json(json!({
        "file": upload,
        "body": body,
        "chunks": report.chunks,
    })))
}

/// DELETE /api/datasets — remove every chunk matching a metadata filter.
async fn delete_dataset(
    State(state): State<Arc<AppState>>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Json(value) = body?;
    let filter = MetadataFilter::try_from(value)?;
    if filter.is_empty() {
        return Err(Error::InvalidRequest("a non-empty metadata filter is required".into()).into());
    }
    let deleted = state.store.delete(&filter).await?;
    Ok(Json(json!({ "deleted": deleted })))
}

/// Stream a file field to a fresh, randomly named file under `dir`.
async fn store_upload(dir: &Path, mut field: Field<'_>) -> Result<StoredUpload, ApiError> {
    let fieldname = field.name().unwrap_or(FILE_FIELD).to_string();
    let originalname = field.file_name().unwrap_or_default().to_string();
    let mimetype = field.content_type().unwrap_or_default().to_string();
    let encoding = field
        .headers()
        .get("content-transfer-encoding")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("7bit")
        .to_string();

    let filename = uuid::Uuid::new_v4().simple().to_string();
    let local_path = dir.join(&filename);

    let size = match write_field(&local_path, &mut field).await {
        Ok(size) => size,
        Err(e) => {
            discard(&local_path).await;
            return Err(e);
        }
    };

    Ok(StoredUpload {
        fieldname,
        originalname,
        encoding,
        mimetype,
        destination: format!("{}/", dir.display()),
        filename,
        path: local_path.display().to_string(),
        size,
        local_path,
    })
}

async fn write_field(path: &Path, field: &mut Field<'_>) -> Result<u64, ApiError> {
    let mut file = tokio::fs::File::create(path).await.map_err(Error::from)?;
    let mut size = 0u64;
    while let Some(bytes) = field.chunk().await? {
        size += bytes.len() as u64;
        file.write_all(&bytes).await.map_err(Error::from)?;
    }
    file.flush().await.map_err(Error::from)?;
    Ok(size)
}

async fn discard(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        warn!("Could not remove upload {}: {}", path.display(), e);
    }
}
