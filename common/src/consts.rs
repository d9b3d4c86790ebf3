/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

pub const DIFF_UPLOAD_LOCK: &str = "diff-upload";
pub const DIFF_GROUP_LOCK: &str = "diff-group";

pub const CONTENT_TYPE_PNG: &str = "image/png";
