/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use chrono::NaiveDateTime;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::build::JobStatus;
use super::screenshot;

/// Reported state of a diff. Derived from the row, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DiffStatus {
    Pending,
    Failure,
    RetryFailure,
    Unchanged,
    Changed,
    Added,
    Removed,
    Ignored,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Deserialize, Serialize)]
#[sea_orm(table_name = "screenshot_diff")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: Uuid,
    pub build: Uuid,
    pub test: Option<Uuid>,
    pub base_screenshot: Option<Uuid>,
    pub compare_screenshot: Option<Uuid>,
    pub score: Option<f64>,
    pub storage_key: Option<String>,
    pub file: Option<Uuid>,
    #[sea_orm(indexed)]
    pub fingerprint: Option<String>,
    pub group: Option<String>,
    pub ignored: bool,
    pub job_status: JobStatus,
    /// Claims taken so far, including the running one.
    pub attempts: i32,
    pub claimed_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

impl Model {
    /// `compare` must be the loaded compare screenshot whenever the diff has no base.
    pub fn status(&self, compare: Option<&screenshot::Model>) -> DiffStatus {
        if self.compare_screenshot.is_none() {
            return DiffStatus::Removed;
        }

        if self.base_screenshot.is_none() {
            return match compare {
                Some(screenshot) if screenshot.is_failure() => {
                    if screenshot.is_last_retry() {
                        DiffStatus::Failure
                    } else {
                        DiffStatus::RetryFailure
                    }
                }
                _ => DiffStatus::Added,
            };
        }

        match self.score {
            None => DiffStatus::Pending,
            Some(score) if score > 0.0 && self.ignored => DiffStatus::Ignored,
            Some(score) if score > 0.0 => DiffStatus::Changed,
            Some(_) => DiffStatus::Unchanged,
        }
    }

    pub fn has_change(&self) -> bool {
        self.score.is_some_and(|score| score > 0.0)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::build::Entity",
        from = "Column::Build",
        to = "super::build::Column::Id"
    )]
    Build,
    #[sea_orm(
        belongs_to = "super::screenshot::Entity",
        from = "Column::BaseScreenshot",
        to = "super::screenshot::Column::Id"
    )]
    BaseScreenshot,
    #[sea_orm(
        belongs_to = "super::screenshot::Entity",
        from = "Column::CompareScreenshot",
        to = "super::screenshot::Column::Id"
    )]
    CompareScreenshot,
    #[sea_orm(
        belongs_to = "super::file::Entity",
        from = "Column::File",
        to = "super::file::Column::Id"
    )]
    File,
}

impl Related<super::build::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Build.def()
    }
}

impl Related<super::screenshot::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CompareScreenshot.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
