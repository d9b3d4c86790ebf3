/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use chrono::NaiveDateTime;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_THRESHOLD: f64 = 0.5;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Deserialize, Serialize)]
#[sea_orm(table_name = "screenshot")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: Uuid,
    pub bucket: Uuid,
    pub name: String,
    /// Logical identity that survives renames between uploads.
    pub base_name: Option<String>,
    /// Object store key of the captured file.
    pub storage_key: String,
    pub file: Option<Uuid>,
    pub test: Option<Uuid>,
    pub threshold: Option<f64>,
    pub metadata: Option<Json>,
    pub created_at: NaiveDateTime,
}

pub const FAILURE_MARKER: &str = " (failed).";

impl Model {
    pub fn merge_key(&self) -> &str {
        self.base_name.as_deref().unwrap_or(&self.name)
    }

    /// Screenshots captured by a failing test carry a marker in their name.
    pub fn is_failure(&self) -> bool {
        self.name.contains(FAILURE_MARKER)
    }

    /// True unless the test metadata shows further retries are pending.
    pub fn is_last_retry(&self) -> bool {
        let test = self.metadata.as_ref().and_then(|metadata| metadata.get("test"));
        let retry = test.and_then(|test| test.get("retry")).filter(|v| !v.is_null());
        let retries = test.and_then(|test| test.get("retries")).filter(|v| !v.is_null());

        match (retry, retries) {
            (Some(retry), Some(retries)) => retry == retries,
            _ => true,
        }
    }

    pub fn threshold_or_default(&self) -> f64 {
        self.threshold.unwrap_or(DEFAULT_THRESHOLD)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::screenshot_bucket::Entity",
        from = "Column::Bucket",
        to = "super::screenshot_bucket::Column::Id"
    )]
    Bucket,
    #[sea_orm(
        belongs_to = "super::file::Entity",
        from = "Column::File",
        to = "super::file::Column::Id"
    )]
    File,
}

impl Related<super::screenshot_bucket::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Bucket.def()
    }
}

impl Related<super::file::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::File.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
