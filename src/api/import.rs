use axum::{
    Json,
    extract::{Multipart, State},
    response::IntoResponse,
};
use sea_orm::DatabaseConnection;

use super::error::ApiError;
use crate::domain::{Caller, DomainError};
use crate::services::import_service::{self, ImportFormat, MAX_IMPORT_BYTES};

/// `POST /import`: multipart upload, field `file`, JSON or CSV.
pub async fn import_tasks(
    State(db): State<DatabaseConnection>,
    caller: Caller,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let invalid =
        |e: axum::extract::multipart::MultipartError| DomainError::bad_request(e.body_text());

    while let Some(field) = multipart.next_field().await.map_err(invalid)? {
        if field.name() != Some("file") {
            continue;
        }
        let content_type = field.content_type().map(str::to_string);
        let file_name = field.file_name().map(str::to_string);
        let bytes = field.bytes().await.map_err(invalid)?;

        if bytes.len() > MAX_IMPORT_BYTES {
            return Err(DomainError::bad_request("File is too large. Maximum size is 5MB.").into());
        }
        let format = ImportFormat::detect(content_type.as_deref(), file_name.as_deref())
            .ok_or_else(|| {
                DomainError::bad_request("Unsupported file type. Please upload a CSV or JSON file.")
            })?;

        tracing::debug!(
            user = %caller.user_id,
            file = file_name.as_deref().unwrap_or("-"),
            bytes = bytes.len(),
            ?format,
            "import upload received"
        );
        let rows = import_service::parse_file(format, &bytes)?;
        let result = import_service::import_tasks(&db, &caller, rows).await?;
        return Ok(Json(result));
    }

    Err(DomainError::bad_request("No file uploaded.").into())
}
