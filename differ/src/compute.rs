/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::{Context, Result};
use chrono::Utc;
use common::error::Invariant;
use common::storage::LocalFile;
use common::types::*;
use entity::build::{BuildType, JobStatus};
use sea_orm::ActiveValue::{Set, Unchanged};
use sea_orm::{ActiveModelTrait, EntityTrait};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::Collaborators;
use super::file::{DiffFile, ensure_file_dimensions, get_or_create_diff_file};
use super::group::group_similar_diffs;
use super::ignore::{IgnoreTarget, evaluate_auto_ignore, is_change_ignored};
use super::image_diff::{DiffRaster, diff_images, is_image};
use super::stats::StatsChange;
use super::text_diff::diff_text;

/// One side of a comparison, loaded into memory.
#[derive(Debug, Clone)]
pub struct Content {
    pub key: String,
    pub bytes: Vec<u8>,
    pub is_image: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ContentDiff {
    pub score: Option<f64>,
    pub raster: Option<DiffRaster>,
}

/// Scores two contents. Without a base nothing is compared.
pub fn diff_contents(
    base: Option<&Content>,
    compare: &Content,
    threshold: f64,
) -> Result<ContentDiff> {
    let Some(base) = base else {
        return Ok(ContentDiff::default());
    };

    if base.key == compare.key {
        return Ok(ContentDiff {
            score: Some(0.0),
            raster: None,
        });
    }

    match (base.is_image, compare.is_image) {
        (true, true) => {
            let diff = diff_images(&base.bytes, &compare.bytes, threshold)?;
            Ok(ContentDiff {
                score: Some(diff.score),
                raster: diff.raster,
            })
        }
        (false, false) => Ok(ContentDiff {
            score: Some(diff_text(&base.bytes, &compare.bytes)),
            raster: None,
        }),
        _ => Ok(ContentDiff {
            score: Some(1.0),
            raster: None,
        }),
    }
}

struct Side {
    screenshot: MScreenshot,
    file: Option<MFile>,
}

struct DiffGraph {
    diff: MScreenshotDiff,
    build: MBuild,
    project: MProject,
    base: Option<Side>,
    compare: Side,
}

#[derive(Debug, Default)]
struct Outcome {
    score: Option<f64>,
    diff_file: Option<DiffFile>,
    ignored: bool,
}

impl Outcome {
    fn fingerprint(&self) -> Option<&str> {
        self.diff_file
            .as_ref()
            .and_then(|diff_file| diff_file.file.fingerprint.as_deref())
    }
}

async fn load_side(state: &ServerState, id: Uuid) -> Result<Option<Side>> {
    let side = EScreenshot::find_by_id(id)
        .find_also_related(entity::file::Entity)
        .one(&state.db)
        .await
        .context("Failed to query screenshot")?;

    Ok(side.map(|(screenshot, file)| Side { screenshot, file }))
}

async fn load_graph(state: &ServerState, diff: MScreenshotDiff) -> Result<DiffGraph> {
    let build = EBuild::find_by_id(diff.build)
        .one(&state.db)
        .await
        .context("Failed to query build")?
        .ok_or(Invariant::MissingRelation {
            entity: "screenshot_diff",
            relation: "build",
            id: diff.id,
        })?;

    let project = EProject::find_by_id(build.project)
        .one(&state.db)
        .await
        .context("Failed to query project")?
        .ok_or(Invariant::MissingRelation {
            entity: "build",
            relation: "project",
            id: build.id,
        })?;

    let compare_id = diff.compare_screenshot.ok_or_else(|| {
        Invariant::Violated(format!(
            "compare screenshot should be defined for screenshot diff {}",
            diff.id
        ))
    })?;

    let base = match diff.base_screenshot {
        Some(id) => Some(load_side(state, id).await?.ok_or(Invariant::MissingRelation {
            entity: "screenshot_diff",
            relation: "base_screenshot",
            id: diff.id,
        })?),
        None => None,
    };

    let compare = load_side(state, compare_id)
        .await?
        .ok_or(Invariant::MissingRelation {
            entity: "screenshot_diff",
            relation: "compare_screenshot",
            id: diff.id,
        })?;

    Ok(DiffGraph {
        diff,
        build,
        project,
        base,
        compare,
    })
}

async fn prepare_content(
    state: &ServerState,
    side: &mut Side,
    local: &LocalFile,
) -> Result<Content> {
    let bytes = local.read().await?;
    side.file =
        ensure_file_dimensions(&state.db, &side.screenshot, side.file.take(), &bytes).await?;

    let is_image = match &side.file {
        Some(file) => file.is_image(),
        None => is_image(&bytes),
    };

    Ok(Content {
        key: side.screenshot.storage_key.clone(),
        bytes,
        is_image,
    })
}

async fn evaluate(
    state: &ServerState,
    collaborators: &Collaborators,
    graph: &mut DiffGraph,
    base_local: Option<&LocalFile>,
    compare_local: &LocalFile,
) -> Result<Outcome> {
    // Sequential, both sides may point at the same file row.
    let base = match (graph.base.as_mut(), base_local) {
        (Some(side), Some(local)) => Some(prepare_content(state, side, local).await?),
        _ => None,
    };
    let compare = prepare_content(state, &mut graph.compare, compare_local).await?;

    let threshold = graph.compare.screenshot.threshold_or_default();
    let content_diff =
        tokio::task::spawn_blocking(move || diff_contents(base.as_ref(), &compare, threshold))
            .await
            .context("Diff task panicked")??;

    let diff_file = match &content_diff.raster {
        Some(raster) => Some(get_or_create_diff_file(state, raster).await?),
        None => None,
    };
    let fingerprint = diff_file
        .as_ref()
        .and_then(|diff_file| diff_file.file.fingerprint.clone());

    let target = match (graph.diff.test, fingerprint.as_deref()) {
        (Some(test), Some(fingerprint)) => Some(IgnoreTarget {
            project: graph.project.id,
            test,
            fingerprint,
        }),
        _ => None,
    };

    let mut ignored = match target {
        Some(target) => is_change_ignored(&state.db, target).await?,
        None => false,
    };

    if let (Some(test), Some(BuildType::Reference)) = (graph.diff.test, graph.build.build_type) {
        let change = match (&diff_file, &fingerprint) {
            (Some(diff_file), Some(fingerprint)) => Some(StatsChange {
                file: diff_file.file.id,
                fingerprint: fingerprint.clone(),
            }),
            _ => None,
        };

        collaborators
            .stats
            .upsert(test, Utc::now().date_naive(), change)
            .await
            .context("Failed to update test statistics")?;
    }

    if let (Some(target), false) = (target, ignored) {
        ignored = match evaluate_auto_ignore(
            &state.db,
            collaborators.stats.as_ref(),
            state.cli.bot_user,
            &graph.project,
            target,
        )
        .await
        {
            Ok(ignored) => ignored,
            Err(e) => {
                warn!(error = %e, "Failed to evaluate auto-ignore");
                false
            }
        };
    }

    Ok(Outcome {
        score: content_diff.score,
        diff_file,
        ignored,
    })
}

fn release(local: Option<LocalFile>) {
    if let Some(local) = local {
        let key = local.key().to_string();
        if let Err(e) = local.release() {
            warn!(error = %e, key = %key, "Failed to release local file");
        }
    }
}

fn local_dir(state: &ServerState) -> PathBuf {
    Path::new(&state.cli.base_path).join("tmp")
}

/// Diffs the screenshots of one diff row and records the verdict.
#[instrument(skip(state, collaborators), fields(diff_id = %diff_id))]
pub async fn compute_screenshot_diff(
    state: &ServerState,
    collaborators: &Collaborators,
    diff_id: Uuid,
) -> Result<()> {
    let diff = EScreenshotDiff::find_by_id(diff_id)
        .one(&state.db)
        .await
        .context("Failed to query screenshot diff")?
        .ok_or(Invariant::NotFound {
            entity: "screenshot_diff",
            id: diff_id,
        })?;

    if diff.job_status == JobStatus::Complete {
        debug!("Screenshot diff already complete");
        return Ok(());
    }

    let mut graph = load_graph(state, diff).await?;

    let dir = local_dir(state);
    tokio::fs::create_dir_all(&dir)
        .await
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let store = state.storage.as_ref();
    let base_local = match &graph.base {
        Some(side) => Some(LocalFile::fetch(store, &side.screenshot.storage_key, &dir).await?),
        None => None,
    };

    let compare_key = &graph.compare.screenshot.storage_key;
    let compare_local = match LocalFile::fetch(store, compare_key, &dir).await {
        Ok(local) => local,
        Err(e) => {
            release(base_local);
            return Err(e);
        }
    };

    let outcome = evaluate(
        state,
        collaborators,
        &mut graph,
        base_local.as_ref(),
        &compare_local,
    )
    .await;

    release(base_local);
    release(Some(compare_local));

    let outcome = outcome?;
    let fingerprint = outcome.fingerprint().map(str::to_string);

    let active_diff = AScreenshotDiff {
        id: Unchanged(graph.diff.id),
        score: Set(outcome.score),
        ignored: Set(outcome.ignored),
        file: Set(outcome.diff_file.as_ref().map(|diff_file| diff_file.file.id)),
        storage_key: Set(outcome
            .diff_file
            .as_ref()
            .map(|diff_file| diff_file.file.key.clone())),
        fingerprint: Set(fingerprint.clone()),
        job_status: Set(JobStatus::Complete),
        ..Default::default()
    };

    active_diff
        .update(&state.db)
        .await
        .context("Failed to record screenshot diff")?;

    info!(
        score = ?outcome.score,
        ignored = outcome.ignored,
        created_file = outcome.diff_file.as_ref().is_some_and(|diff_file| diff_file.is_created),
        "Recorded screenshot diff"
    );

    collaborators
        .concluder
        .conclude(&graph.build)
        .await
        .context("Failed to conclude build")?;

    if let (Some(diff_file), Some(fingerprint)) = (&outcome.diff_file, fingerprint.as_deref()) {
        group_similar_diffs(state, graph.build.id, &diff_file.file.key, fingerprint).await?;
    }

    Ok(())
}
