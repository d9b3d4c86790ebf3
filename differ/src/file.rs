/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::{Context, Result};
use chrono::Utc;
use common::consts::{CONTENT_TYPE_PNG, DIFF_UPLOAD_LOCK};
use common::lock::with_lock;
use common::types::*;
use entity::file::FileType;
use sea_orm::ActiveValue::{Set, Unchanged};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    TransactionTrait,
};
use tracing::{debug, warn};
use uuid::Uuid;

use super::fingerprint::FingerprintOptions;
use super::image_diff::{DiffRaster, is_image, read_dimensions};

#[derive(Debug, Clone, PartialEq)]
pub struct DiffFile {
    pub file: MFile,
    pub is_created: bool,
}

pub fn detect_content_type(bytes: &[u8]) -> String {
    match image::guess_format(bytes) {
        Ok(format) => format.to_mime_type().to_string(),
        Err(_) if std::str::from_utf8(bytes).is_ok() => "text/plain".to_string(),
        Err(_) => "application/octet-stream".to_string(),
    }
}

fn dimension(value: u32) -> Result<i32> {
    i32::try_from(value).with_context(|| format!("Image dimension {} out of range", value))
}

pub async fn find_file<C: ConnectionTrait>(db: &C, key: &str) -> Result<Option<MFile>> {
    EFile::find()
        .filter(CFile::Key.eq(key))
        .one(db)
        .await
        .with_context(|| format!("Failed to query file {}", key))
}

/// Records width and height of a screenshot file, creating the file row when the screenshot has none.
pub async fn ensure_file_dimensions(
    db: &DatabaseConnection,
    screenshot: &MScreenshot,
    file: Option<MFile>,
    bytes: &[u8],
) -> Result<Option<MFile>> {
    if file.as_ref().is_some_and(MFile::has_dimensions) || !is_image(bytes) {
        return Ok(file);
    }

    let (width, height) = read_dimensions(bytes)?;
    let (width, height) = (dimension(width)?, dimension(height)?);

    if let Some(file) = file {
        let active_file = AFile {
            id: Unchanged(file.id),
            width: Set(Some(width)),
            height: Set(Some(height)),
            ..Default::default()
        };

        let file = active_file
            .update(db)
            .await
            .context("Failed to record file dimensions")?;
        return Ok(Some(file));
    }

    let txn = db.begin().await.context("Failed to open file transaction")?;

    let file = match find_file(&txn, &screenshot.storage_key).await? {
        Some(file) => file,
        None => AFile {
            id: Set(Uuid::now_v7()),
            key: Set(screenshot.storage_key.clone()),
            file_type: Set(FileType::Screenshot),
            content_type: Set(detect_content_type(bytes)),
            width: Set(Some(width)),
            height: Set(Some(height)),
            fingerprint: Set(None),
            created_at: Set(Utc::now().naive_utc()),
        }
        .insert(&txn)
        .await
        .context("Failed to create screenshot file")?,
    };

    let active_screenshot = AScreenshot {
        id: Unchanged(screenshot.id),
        file: Set(Some(file.id)),
        ..Default::default()
    };

    active_screenshot
        .update(&txn)
        .await
        .context("Failed to link screenshot file")?;

    txn.commit().await.context("Failed to commit screenshot file")?;

    debug!(screenshot_id = %screenshot.id, file_id = %file.id, "Linked screenshot file");
    Ok(Some(file))
}

fn fingerprint_or_warn(raster: &DiffRaster) -> Option<String> {
    match raster.fingerprint(&FingerprintOptions::default()) {
        Ok(fingerprint) => Some(fingerprint),
        Err(e) => {
            warn!(error = %e, "Failed to fingerprint diff");
            None
        }
    }
}

/// Fills in the fingerprint of a file created before fingerprints existed.
async fn backfill_fingerprint(db: &DatabaseConnection, file: MFile, raster: &DiffRaster) -> MFile {
    if file.fingerprint.is_some() {
        return file;
    }

    let Some(fingerprint) = fingerprint_or_warn(raster) else {
        return file;
    };

    let active_file = AFile {
        id: Unchanged(file.id),
        fingerprint: Set(Some(fingerprint)),
        ..Default::default()
    };

    match active_file.update(db).await {
        Ok(updated) => updated,
        Err(e) => {
            warn!(error = %e, file_id = %file.id, "Failed to backfill diff fingerprint");
            file
        }
    }
}

/// Returns the file stored under the raster's content hash, uploading it if nobody has yet.
pub async fn get_or_create_diff_file(state: &ServerState, raster: &DiffRaster) -> Result<DiffFile> {
    let key = raster.content_hash();

    if let Some(file) = find_file(&state.db, &key).await? {
        let file = backfill_fingerprint(&state.db, file, raster).await;
        return Ok(DiffFile {
            file,
            is_created: false,
        });
    }

    let fingerprint = fingerprint_or_warn(raster);
    let width = dimension(raster.width())?;
    let height = dimension(raster.height())?;

    let key_ref = key.as_str();
    with_lock(state.lock.as_ref(), &[DIFF_UPLOAD_LOCK, key_ref], move || async move {
        if let Some(file) = find_file(&state.db, key_ref).await? {
            return Ok(DiffFile {
                file,
                is_created: false,
            });
        }

        // Content addressed, an object left behind by an earlier attempt is the same bytes.
        let uploaded = if state.storage.exists(key_ref).await? {
            false
        } else {
            state
                .storage
                .put(key_ref, raster.png.clone(), CONTENT_TYPE_PNG)
                .await
                .context("Failed to upload diff file")?;
            true
        };

        let inserted = AFile {
            id: Set(Uuid::now_v7()),
            key: Set(key_ref.to_string()),
            file_type: Set(FileType::ScreenshotDiff),
            content_type: Set(CONTENT_TYPE_PNG.to_string()),
            width: Set(Some(width)),
            height: Set(Some(height)),
            fingerprint: Set(fingerprint),
            created_at: Set(Utc::now().naive_utc()),
        }
        .insert(&state.db)
        .await;

        let file = match inserted {
            Ok(file) => file,
            Err(e) => {
                if uploaded {
                    if let Err(cleanup) = state.storage.delete(key_ref).await {
                        warn!(error = %cleanup, key = %key_ref, "Failed to remove orphaned diff file");
                    }
                }
                return Err(anyhow::Error::new(e).context("Failed to create diff file"));
            }
        };

        debug!(key = %key_ref, uploaded, "Created diff file");

        Ok(DiffFile {
            file,
            is_created: true,
        })
    })
    .await
}
