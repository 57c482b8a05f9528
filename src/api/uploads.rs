use axum::{
    extract::{Multipart, Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::{extract::CurrentMerchant, AppState};
use crate::services::{UploadSummary, UploadedFile};
use crate::{Result, ShopError};

const FILES_FIELD: &str = "files";

#[derive(Debug, Deserialize)]
pub struct ImagePathParams {
    pub image_path: String,
}

fn bad_multipart(e: axum::extract::multipart::MultipartError) -> ShopError {
    ShopError::Validation(format!("Invalid multipart body: {e}"))
}

pub async fn upload_images(
    State(state): State<AppState>,
    current: CurrentMerchant,
    Path(product_id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<UploadSummary>> {
    let mut files = Vec::new();
    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        if field.name() != Some(FILES_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_owned();
        let bytes = field.bytes().await.map_err(bad_multipart)?;
        files.push(UploadedFile { file_name, bytes: bytes.to_vec() });
    }
    Ok(Json(state.uploads.upload(&current.merchant, product_id, files).await?))
}

pub async fn delete_image(
    State(state): State<AppState>,
    current: CurrentMerchant,
    Path(product_id): Path<Uuid>,
    Query(params): Query<ImagePathParams>,
) -> Result<Json<Value>> {
    state.uploads.delete(&current.merchant, product_id, &params.image_path).await?;
    Ok(Json(json!({ "message": "Image deleted successfully" })))
}
