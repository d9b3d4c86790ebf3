/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::Result;
use common::types::*;
use entity::screenshot_diff::DiffStatus;
use std::collections::BTreeMap;
use tracing::debug;

use super::VirtualScreenshotBucket;
use super::query::{BaseStore, BuildDiff};

/// Projects the screenshots of `base` forward through the changes recorded in `diffs`.
pub fn merge_bucket_screenshots(
    base: Vec<MScreenshot>,
    diffs: &[BuildDiff],
) -> VirtualScreenshotBucket {
    let mut index = base
        .into_iter()
        .map(|screenshot| (screenshot.merge_key().to_string(), screenshot))
        .collect::<BTreeMap<_, _>>();

    for BuildDiff { diff, base, compare } in diffs {
        match diff.status(compare.as_ref()) {
            DiffStatus::Changed | DiffStatus::Added => {
                if let Some(compare) = compare {
                    index.insert(compare.merge_key().to_string(), compare.clone());
                }
            }
            // Removed diffs only reference the screenshot that went away.
            DiffStatus::Removed => {
                if let Some(base) = base {
                    index.remove(base.merge_key());
                }
            }
            DiffStatus::Pending
            | DiffStatus::Failure
            | DiffStatus::RetryFailure
            | DiffStatus::Unchanged
            | DiffStatus::Ignored => {}
        }
    }

    VirtualScreenshotBucket {
        screenshots: index.into_values().collect(),
    }
}

pub async fn merge_bucket_with_build_diffs(
    store: &dyn BaseStore,
    base_bucket: &MScreenshotBucket,
    head_build: &MBuild,
) -> Result<VirtualScreenshotBucket> {
    let (screenshots, diffs) = tokio::try_join!(
        store.bucket_screenshots(base_bucket.id),
        store.build_diffs(head_build.id)
    )?;

    debug!(
        base_bucket_id = %base_bucket.id,
        head_build_id = %head_build.id,
        screenshots = screenshots.len(),
        diffs = diffs.len(),
        "Merging bucket with build diffs"
    );

    Ok(merge_bucket_screenshots(screenshots, &diffs))
}
