//! Product image storage on the local filesystem.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::catalog::CatalogService;
use crate::domain::aggregates::Merchant;
use crate::store::Store;
use crate::{Result, ShopError};

pub const ALLOWED_EXTENSIONS: [&str; 5] = [".jpg", ".jpeg", ".png", ".gif", ".webp"];

/// Lowercased extension of `file_name`, dot included, if it is an allowed image type.
pub fn image_extension(file_name: &str) -> Option<String> {
    let ext = Path::new(file_name).extension()?.to_str()?.to_ascii_lowercase();
    let ext = format!(".{ext}");
    ALLOWED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// Files under one root directory, addressed by `/`-separated relative paths.
#[derive(Clone, Debug)]
pub struct ImageStore {
    root: PathBuf,
}

impl ImageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into() } }

    fn resolve(&self, relative: &str) -> Result<PathBuf> {
        let rel = Path::new(relative);
        if rel.components().any(|c| !matches!(c, Component::Normal(_))) {
            return Err(ShopError::Validation(format!("Invalid image path '{relative}'")));
        }
        Ok(self.root.join(rel))
    }

    /// Writes `bytes` as `products/{product_id}/{uuid}{ext}` and returns that path.
    pub async fn save(&self, product_id: Uuid, ext: &str, bytes: &[u8]) -> Result<String> {
        let relative = format!("products/{product_id}/{}{ext}", Uuid::new_v4());
        let path = self.resolve(&relative)?;
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        Ok(relative)
    }

    /// Writes every `(ext, bytes)` pair. If one write fails, the files already
    /// written are removed before the error is returned.
    pub async fn save_all(&self, product_id: Uuid, files: &[(&str, &[u8])]) -> Result<Vec<String>> {
        let mut saved = Vec::with_capacity(files.len());
        for (ext, bytes) in files {
            match self.save(product_id, ext, bytes).await {
                Ok(path) => saved.push(path),
                Err(e) => {
                    self.discard(&saved).await;
                    return Err(e);
                }
            }
        }
        Ok(saved)
    }

    /// Best-effort removal of files no product refers to.
    pub async fn discard(&self, paths: &[String]) {
        for path in paths {
            if let Err(e) = self.remove(path).await {
                warn!(error = %e, image_path = %path, "orphaned image file could not be deleted");
            }
        }
    }

    /// Deletes the file if it is still there.
    pub async fn remove(&self, relative: &str) -> Result<()> {
        let path = self.resolve(relative)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Serialize)]
pub struct UploadSummary {
    pub message: &'static str,
    pub image_paths: Vec<String>,
    pub total_images: usize,
}

#[derive(Clone)]
pub struct UploadService {
    store: Arc<dyn Store>,
    catalog: CatalogService,
    images: ImageStore,
}

impl UploadService {
    pub fn new(store: Arc<dyn Store>, images: ImageStore) -> Self {
        Self { catalog: CatalogService::new(store.clone()), store, images }
    }

    /// Stores every file and appends them to the product's image list.
    ///
    /// All extensions are checked before anything is written.
    #[instrument(skip(self, merchant, files), fields(merchant_id = %merchant.id, files = files.len()))]
    pub async fn upload(&self, merchant: &Merchant, product_id: Uuid, files: Vec<UploadedFile>) -> Result<UploadSummary> {
        let mut product = self.catalog.product_for_owner(merchant, product_id).await?;
        if files.is_empty() {
            return Err(ShopError::Validation("No files provided".into()));
        }
        let extensions = files
            .iter()
            .map(|f| {
                image_extension(&f.file_name).ok_or_else(|| {
                    ShopError::Validation(format!(
                        "File type not allowed: '{}'. Allowed types: {}",
                        f.file_name,
                        ALLOWED_EXTENSIONS.join(", ")
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let pending: Vec<(&str, &[u8])> =
            extensions.iter().zip(&files).map(|(ext, file)| (ext.as_str(), file.bytes.as_slice())).collect();
        let saved = self.images.save_all(product.id, &pending).await?;
        product.image_paths.extend(saved.iter().cloned());
        if let Err(e) = self.store.update_product(&product).await {
            self.images.discard(&saved).await;
            return Err(e);
        }
        info!(product_id = %product.id, added = saved.len(), "product images stored");

        Ok(UploadSummary {
            message: "Images uploaded successfully",
            total_images: product.image_paths.len(),
            image_paths: saved,
        })
    }

    #[instrument(skip(self, merchant), fields(merchant_id = %merchant.id))]
    pub async fn delete(&self, merchant: &Merchant, product_id: Uuid, image_path: &str) -> Result<()> {
        let mut product = self.catalog.product_for_owner(merchant, product_id).await?;
        if !product.remove_image(image_path) {
            return Err(ShopError::not_found("Image"));
        }
        self.store.update_product(&product).await?;
        if let Err(e) = self.images.remove(image_path).await {
            warn!(error = %e, image_path, "image file could not be deleted");
        }
        Ok(())
    }
}
