/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Tests for bucket merging

mod fixtures;

use baseline::bucket_merge::merge_bucket_screenshots;
use common::types::*;
use fixtures::*;

fn ids(screenshots: &[MScreenshot]) -> Vec<uuid::Uuid> {
    let mut ids = screenshots.iter().map(|s| s.id).collect::<Vec<_>>();
    ids.sort();
    ids
}

#[test]
fn test_merge_applies_changes_by_base_name() {
    let project = project();
    let base_bucket = bucket(&project, "main", &sha('a'), 1);
    let head_bucket = bucket(&project, "feature", &sha('b'), 2);
    let head = build(&project, &head_bucket);

    let untouched = screenshot(&base_bucket, "home");
    let changed_base = screenshot(&base_bucket, "cart");
    let removed_base = screenshot(&base_bucket, "legacy");
    let unchanged_base = screenshot(&base_bucket, "footer");

    let changed = MScreenshot {
        base_name: Some("cart".to_string()),
        ..screenshot(&head_bucket, "cart-renamed")
    };
    let added = screenshot(&head_bucket, "checkout");
    let unchanged = screenshot(&head_bucket, "footer");

    let diffs = vec![
        build_diff(&head, Some(&changed_base), Some(&changed), Some(0.2)),
        build_diff(&head, None, Some(&added), None),
        build_diff(&head, Some(&removed_base), None, None),
        build_diff(&head, Some(&unchanged_base), Some(&unchanged), Some(0.0)),
    ];

    let merged = merge_bucket_screenshots(
        vec![
            untouched.clone(),
            changed_base,
            removed_base,
            unchanged_base.clone(),
        ],
        &diffs,
    );

    let mut expected = vec![untouched.id, changed.id, added.id, unchanged_base.id];
    expected.sort();
    assert_eq!(ids(&merged.screenshots), expected);
}

#[test]
fn test_merge_ignores_pending_and_failed() {
    let project = project();
    let base_bucket = bucket(&project, "main", &sha('a'), 1);
    let head_bucket = bucket(&project, "feature", &sha('b'), 2);
    let head = build(&project, &head_bucket);

    let base = screenshot(&base_bucket, "home");
    let pending = screenshot(&head_bucket, "home");
    let failed = screenshot(&head_bucket, "login (failed).png");

    let diffs = vec![
        build_diff(&head, Some(&base), Some(&pending), None),
        build_diff(&head, None, Some(&failed), None),
    ];

    let merged = merge_bucket_screenshots(vec![base.clone()], &diffs);
    assert_eq!(merged.screenshots, vec![base]);
}

#[test]
fn test_merge_with_no_diffs_keeps_base() {
    let project = project();
    let base_bucket = bucket(&project, "main", &sha('a'), 1);
    let base = vec![screenshot(&base_bucket, "a"), screenshot(&base_bucket, "b")];

    let merged = merge_bucket_screenshots(base.clone(), &[]);
    assert_eq!(ids(&merged.screenshots), ids(&base));
}
