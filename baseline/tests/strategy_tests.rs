/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Tests for the git mirror strategy

mod fixtures;

use baseline::strategy::{GitMirrorStrategy, MergeBaseStrategy};
use fixtures::*;
use std::path::PathBuf;

fn unreachable_git() -> GitMirrorStrategy {
    GitMirrorStrategy::new(
        "/nonexistent/shotline/git".to_string(),
        PathBuf::from("/tmp"),
    )
}

#[tokio::test]
async fn test_option_like_revisions_never_reach_git() {
    let strategy = unreachable_git();
    let project = project();
    let compare = bucket(&project, "feature", &sha('f'), 1);
    let build = build(&project, &compare);
    let ctx = context();

    let merge_base = strategy
        .get_merge_base_commit_sha(&project, &ctx, "--output=/tmp/owned", &sha('f'), &build)
        .await
        .unwrap();
    assert!(merge_base.is_none());

    let merge_base = strategy
        .get_merge_base_commit_sha(&project, &ctx, "main", "-c", &build)
        .await
        .unwrap();
    assert!(merge_base.is_none());

    let parents = strategy
        .list_parent_commit_shas(&project, &ctx, "--all")
        .await
        .unwrap();
    assert!(parents.is_empty());
}

#[tokio::test]
async fn test_plain_revisions_are_passed_to_git() {
    let strategy = unreachable_git();
    let project = project();
    let ctx = context();

    let result = strategy
        .list_parent_commit_shas(&project, &ctx, &sha('a'))
        .await;

    assert!(result.is_err());
}
