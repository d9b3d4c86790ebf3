/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::Result;
use tracing::debug;

use super::bucket_merge::merge_bucket_with_build_diffs;
use super::ci::{CiBaseArgs, get_ci_base};
use super::query::BaseStore;
use super::strategy::MergeBaseStrategy;
use super::{BaseBucket, BaseResolution};

/// Base of a merge queue build: the ci base, projected through the last approved build.
pub async fn get_merge_queue_base(
    store: &dyn BaseStore,
    strategy: Option<&dyn MergeBaseStrategy>,
    args: CiBaseArgs<'_>,
) -> Result<BaseResolution> {
    let build = args.build;
    let compare_bucket = args.compare_bucket;

    let (ci_base, last_approved) = tokio::join!(
        get_ci_base(store, strategy, args),
        store.last_approved_build(build, compare_bucket)
    );
    let ci_base = ci_base?;

    let Some((approved_build, approved_bucket)) = last_approved? else {
        return Ok(ci_base);
    };

    let ci_bucket = match &ci_base.base_bucket {
        Some(BaseBucket::Persisted(bucket)) => bucket.clone(),
        Some(BaseBucket::Virtual(_)) | None => {
            debug!(build_id = %build.id, approved_build_id = %approved_build.id, "Using last approved bucket");
            return Ok(BaseResolution::unbranched(BaseBucket::Persisted(approved_bucket)));
        }
    };

    if ci_bucket.created_at > approved_bucket.created_at {
        return Ok(ci_base);
    }

    let target = store
        .recently_merged_bucket(build, compare_bucket, &ci_bucket)
        .await?
        .unwrap_or(ci_bucket);

    debug!(
        build_id = %build.id,
        target_bucket_id = %target.id,
        approved_build_id = %approved_build.id,
        "Synthesizing merge queue base"
    );

    let virtual_bucket = merge_bucket_with_build_diffs(store, &target, &approved_build).await?;
    Ok(BaseResolution::unbranched(BaseBucket::Virtual(virtual_bucket)))
}
