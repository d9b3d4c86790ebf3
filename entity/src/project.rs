/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use chrono::NaiveDateTime;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Deserialize, Serialize)]
#[sea_orm(table_name = "project")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: Uuid,
    #[sea_orm(indexed)]
    pub name: String,
    /// Remote the merge-base strategies mirror, if any.
    pub repository: Option<String>,
    pub default_base_branch: String,
    /// Glob of branches whose builds are trusted without review.
    /// Falls back to `default_base_branch` when unset.
    pub auto_approved_branch_glob: Option<String>,
    /// Number of recent changes after which a fingerprint is ignored automatically.
    pub auto_ignore_changes: Option<i32>,
    pub created_at: NaiveDateTime,
}

impl Model {
    pub fn auto_approved_branch_glob(&self) -> &str {
        self.auto_approved_branch_glob
            .as_deref()
            .unwrap_or(&self.default_base_branch)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
