use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use tracing::instrument;

use crate::error::{AppError, ErrorBody};
use crate::models::image::{DeleteImageResponse, UploadImageResponse};
use crate::originals::OriginalUpload;
use crate::state::AppState;

/// Multipart overhead allowed on top of `storage.max_object_size`.
const MULTIPART_SLACK: u64 = 64 * 1024;

pub fn upload_body_limit(max_object_size: u64) -> DefaultBodyLimit {
    DefaultBodyLimit::max((max_object_size + MULTIPART_SLACK) as usize)
}

#[utoipa::path(
    post,
    path = "/{project_id}/images",
    tag = "Images",
    operation_id = "uploadImage",
    summary = "Upload a photograph to a project",
    description = "Stores the `file` multipart field as an original (deduplicated by content hash) \
        and queues a staged image for it. Optional `width` and `height` text fields record the \
        pixel dimensions.",
    params(("project_id" = i32, Path, description = "Project ID")),
    request_body(content_type = "multipart/form-data", description = "Image upload"),
    responses(
        (status = 201, description = "Staged image queued", body = UploadImageResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 413, description = "File too large (PAYLOAD_TOO_LARGE)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, multipart))]
pub async fn upload_image(
    State(state): State<AppState>,
    Path(project_id): Path<i32>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut data: Option<Vec<u8>> = None;
    let mut mime_type: Option<String> = None;
    let mut width: Option<i32> = None;
    let mut height: Option<i32> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Multipart error: {e}")))?
    {
        match field.name() {
            Some("file") => {
                mime_type = field
                    .content_type()
                    .map(str::to_string)
                    .or_else(|| {
                        field
                            .file_name()
                            .and_then(|name| mime_guess::from_path(name).first())
                            .map(|m| m.to_string())
                    });
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Failed to read file: {e}")))?;
                data = Some(bytes.to_vec());
            }
            Some("width") => width = Some(parse_dimension("width", field.text().await)?),
            Some("height") => height = Some(parse_dimension("height", field.text().await)?),
            _ => {} // Ignore unknown fields.
        }
    }

    let data = data.ok_or_else(|| AppError::Validation("Missing 'file' field".into()))?;
    if data.is_empty() {
        return Err(AppError::Validation("Uploaded file is empty".into()));
    }

    let limit = state.config.storage.max_object_size;
    if data.len() as u64 > limit {
        return Err(AppError::PayloadTooLarge(format!(
            "File is {} bytes, limit is {limit}",
            data.len()
        )));
    }

    let mime_type = mime_type.unwrap_or_else(|| "application/octet-stream".into());
    let created = state
        .staged
        .create_from_upload(
            project_id,
            OriginalUpload {
                data: &data,
                mime_type: &mime_type,
                width,
                height,
            },
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(UploadImageResponse::from(created)),
    ))
}

fn parse_dimension<E: std::fmt::Display>(
    name: &str,
    text: Result<String, E>,
) -> Result<i32, AppError> {
    let text = text.map_err(|e| AppError::Validation(format!("Failed to read {name}: {e}")))?;
    match text.trim().parse::<i32>() {
        Ok(v) if v > 0 => Ok(v),
        _ => Err(AppError::Validation(format!(
            "'{name}' must be a positive integer"
        ))),
    }
}

#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "Images",
    operation_id = "deleteImage",
    summary = "Delete a staged image",
    description = "Soft-deletes the staged image and releases its reference on the original. \
        The original is removed once no staged image refers to it.",
    params(("id" = i32, Path, description = "Staged image ID")),
    responses(
        (status = 200, description = "Staged image deleted", body = DeleteImageResponse),
        (status = 404, description = "Staged image not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn delete_image(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<DeleteImageResponse>, AppError> {
    let original_deleted = state.staged.soft_delete(id).await?;
    Ok(Json(DeleteImageResponse { original_deleted }))
}
