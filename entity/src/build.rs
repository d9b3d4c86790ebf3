/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use chrono::NaiveDateTime;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, DeriveActiveEnum, EnumIter, Deserialize, Serialize)]
#[sea_orm(rs_type = "i16", db_type = "Integer")]
pub enum JobStatus {
    #[sea_orm(num_value = 0)]
    Pending,
    #[sea_orm(num_value = 1)]
    Progress,
    #[sea_orm(num_value = 2)]
    Complete,
    #[sea_orm(num_value = 3)]
    Error,
    #[sea_orm(num_value = 4)]
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, DeriveActiveEnum, EnumIter, Deserialize, Serialize)]
#[sea_orm(rs_type = "i16", db_type = "Integer")]
pub enum BuildMode {
    #[sea_orm(num_value = 0)]
    Ci,
    #[sea_orm(num_value = 1)]
    Monitoring,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, DeriveActiveEnum, EnumIter, Deserialize, Serialize)]
#[sea_orm(rs_type = "i16", db_type = "Integer")]
pub enum BuildType {
    #[sea_orm(num_value = 0)]
    Reference,
    #[sea_orm(num_value = 1)]
    Check,
    #[sea_orm(num_value = 2)]
    Orphan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, DeriveActiveEnum, EnumIter, Deserialize, Serialize)]
#[sea_orm(rs_type = "i16", db_type = "Integer")]
pub enum BuildConclusion {
    #[sea_orm(num_value = 0)]
    NoChanges,
    #[sea_orm(num_value = 1)]
    ChangesDetected,
}

impl fmt::Display for BuildConclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildConclusion::NoChanges => write!(f, "no-changes"),
            BuildConclusion::ChangesDetected => write!(f, "changes-detected"),
        }
    }
}

/// Where the base branch of a build came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, DeriveActiveEnum, EnumIter, Deserialize, Serialize)]
#[sea_orm(rs_type = "i16", db_type = "Integer")]
pub enum BaseBranchResolvedFrom {
    #[sea_orm(num_value = 0)]
    User,
    #[sea_orm(num_value = 1)]
    PullRequest,
    #[sea_orm(num_value = 2)]
    Project,
}

impl fmt::Display for BaseBranchResolvedFrom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BaseBranchResolvedFrom::User => write!(f, "user"),
            BaseBranchResolvedFrom::PullRequest => write!(f, "pull-request"),
            BaseBranchResolvedFrom::Project => write!(f, "project"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Deserialize, Serialize)]
#[sea_orm(table_name = "build")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: Uuid,
    pub project: Uuid,
    #[sea_orm(indexed)]
    pub name: String,
    pub mode: BuildMode,
    pub merge_queue: bool,
    pub pull_request: Option<Uuid>,
    pub pr_head_commit: Option<String>,
    pub base_branch: Option<String>,
    pub base_branch_resolved_from: Option<BaseBranchResolvedFrom>,
    pub base_commit: Option<String>,
    pub parent_commits: Option<Vec<String>>,
    pub compare_screenshot_bucket: Uuid,
    pub base_screenshot_bucket: Option<Uuid>,
    #[sea_orm(column_name = "type")]
    pub build_type: Option<BuildType>,
    pub conclusion: Option<BuildConclusion>,
    pub job_status: JobStatus,
    pub created_at: NaiveDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::project::Entity",
        from = "Column::Project",
        to = "super::project::Column::Id"
    )]
    Project,
    #[sea_orm(
        belongs_to = "super::pull_request::Entity",
        from = "Column::PullRequest",
        to = "super::pull_request::Column::Id"
    )]
    PullRequest,
    #[sea_orm(
        belongs_to = "super::screenshot_bucket::Entity",
        from = "Column::CompareScreenshotBucket",
        to = "super::screenshot_bucket::Column::Id"
    )]
    CompareScreenshotBucket,
    #[sea_orm(
        belongs_to = "super::screenshot_bucket::Entity",
        from = "Column::BaseScreenshotBucket",
        to = "super::screenshot_bucket::Column::Id"
    )]
    BaseScreenshotBucket,
    #[sea_orm(has_many = "super::build_review::Entity")]
    Review,
    #[sea_orm(has_many = "super::screenshot_diff::Entity")]
    ScreenshotDiff,
}

impl Related<super::project::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Project.def()
    }
}

impl Related<super::pull_request::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PullRequest.def()
    }
}

impl Related<super::screenshot_bucket::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CompareScreenshotBucket.def()
    }
}

impl Related<super::build_review::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Review.def()
    }
}

impl Related<super::screenshot_diff::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ScreenshotDiff.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
