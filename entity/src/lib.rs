/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

pub mod audit_trail;
pub mod build;
pub mod build_review;
pub mod file;
pub mod ignored_change;
pub mod project;
pub mod pull_request;
pub mod screenshot;
pub mod screenshot_bucket;
pub mod screenshot_diff;
pub mod test_stats_build;
pub mod test_stats_change;
