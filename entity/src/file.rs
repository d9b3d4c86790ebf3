/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use chrono::NaiveDateTime;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, DeriveActiveEnum, EnumIter, Deserialize, Serialize)]
#[sea_orm(rs_type = "i16", db_type = "Integer")]
pub enum FileType {
    #[sea_orm(num_value = 0)]
    Screenshot,
    #[sea_orm(num_value = 1)]
    ScreenshotDiff,
}

/// Content addressed blob metadata, shared by every screenshot or diff with the same bytes.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Deserialize, Serialize)]
#[sea_orm(table_name = "file")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub key: String,
    pub file_type: FileType,
    pub content_type: String,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub fingerprint: Option<String>,
    pub created_at: NaiveDateTime,
}

impl Model {
    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }

    pub fn has_dimensions(&self) -> bool {
        self.width.is_some() && self.height.is_some()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
