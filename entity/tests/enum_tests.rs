/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Tests for entity enums

use entity::*;

#[test]
fn test_build_conclusion_display() {
    assert_eq!(build::BuildConclusion::NoChanges.to_string(), "no-changes");
    assert_eq!(
        build::BuildConclusion::ChangesDetected.to_string(),
        "changes-detected"
    );
}

#[test]
fn test_base_branch_resolved_from_display() {
    assert_eq!(build::BaseBranchResolvedFrom::User.to_string(), "user");
    assert_eq!(
        build::BaseBranchResolvedFrom::PullRequest.to_string(),
        "pull-request"
    );
    assert_eq!(build::BaseBranchResolvedFrom::Project.to_string(), "project");
}

#[test]
fn test_audit_action_display() {
    assert_eq!(audit_trail::AuditAction::FilesIgnored.to_string(), "files.ignored");
    assert_eq!(
        audit_trail::AuditAction::FilesUnignored.to_string(),
        "files.unignored"
    );
}

#[test]
fn test_job_status_equality() {
    assert_eq!(build::JobStatus::Complete, build::JobStatus::Complete);
    assert_ne!(build::JobStatus::Pending, build::JobStatus::Progress);
}

#[test]
fn test_diff_status_serialization() {
    let json = serde_json::to_string(&screenshot_diff::DiffStatus::RetryFailure).unwrap();
    assert_eq!(json, "\"retryFailure\"");
}
