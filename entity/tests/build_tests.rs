/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Tests for build entity

use chrono::NaiveDate;
use entity::*;
use sea_orm::{DatabaseBackend, MockDatabase, entity::prelude::*};
use uuid::Uuid;

fn naive_date() -> chrono::NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

#[tokio::test]
async fn test_build_entity_with_base_resolution() -> Result<(), DbErr> {
    let build_id = Uuid::now_v7();
    let project_id = Uuid::now_v7();
    let compare_bucket = Uuid::now_v7();
    let base_bucket = Uuid::now_v7();

    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![build::Model {
            id: build_id,
            project: project_id,
            name: "default".to_owned(),
            mode: build::BuildMode::Ci,
            merge_queue: false,
            pull_request: None,
            pr_head_commit: None,
            base_branch: Some("main".to_owned()),
            base_branch_resolved_from: Some(build::BaseBranchResolvedFrom::Project),
            base_commit: None,
            parent_commits: Some(vec!["a".repeat(40), "b".repeat(40)]),
            compare_screenshot_bucket: compare_bucket,
            base_screenshot_bucket: Some(base_bucket),
            build_type: Some(build::BuildType::Check),
            conclusion: None,
            job_status: build::JobStatus::Pending,
            created_at: naive_date(),
        }]])
        .into_connection();

    let result = build::Entity::find_by_id(build_id).one(&db).await?;

    assert!(result.is_some());
    let build = result.unwrap();
    assert_eq!(build.base_screenshot_bucket, Some(base_bucket));
    assert_eq!(build.build_type, Some(build::BuildType::Check));
    assert_eq!(build.parent_commits.as_ref().map(Vec::len), Some(2));
    assert_eq!(
        build.base_branch_resolved_from,
        Some(build::BaseBranchResolvedFrom::Project)
    );

    Ok(())
}

#[tokio::test]
async fn test_project_auto_approved_branch_glob_fallback() -> Result<(), DbErr> {
    let project_id = Uuid::now_v7();

    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![project::Model {
            id: project_id,
            name: "web".to_owned(),
            repository: None,
            default_base_branch: "main".to_owned(),
            auto_approved_branch_glob: None,
            auto_ignore_changes: Some(3),
            created_at: naive_date(),
        }]])
        .into_connection();

    let project = project::Entity::find_by_id(project_id)
        .one(&db)
        .await?
        .unwrap();

    assert_eq!(project.auto_approved_branch_glob(), "main");
    assert_eq!(project.auto_ignore_changes, Some(3));

    Ok(())
}

#[test]
fn test_review_submission() {
    let review = build_review::Model {
        id: Uuid::now_v7(),
        build: Uuid::now_v7(),
        user: None,
        state: build_review::ReviewState::Pending,
        created_at: naive_date(),
    };

    assert!(!review.is_submitted());
    assert!(
        build_review::Model {
            state: build_review::ReviewState::Rejected,
            ..review
        }
        .is_submitted()
    );
}
