/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

pub mod compute;
pub mod conclude;
pub mod file;
pub mod fingerprint;
pub mod group;
pub mod ignore;
pub mod image_diff;
pub mod scheduler;
pub mod stats;
pub mod text_diff;

use common::types::ServerState;
use std::sync::Arc;

use conclude::{BuildConcluder, DatabaseConcluder};
use stats::{DatabaseTestStats, TestStats};

/// External collaborators the diff engine reports to.
#[derive(Clone)]
pub struct Collaborators {
    pub concluder: Arc<dyn BuildConcluder>,
    pub stats: Arc<dyn TestStats>,
}

impl Collaborators {
    pub fn from_state(state: &Arc<ServerState>) -> Self {
        Self {
            concluder: Arc::new(DatabaseConcluder::new(Arc::clone(state))),
            stats: Arc::new(DatabaseTestStats::new(Arc::clone(state))),
        }
    }
}

pub async fn start_differ(state: Arc<ServerState>) -> std::io::Result<()> {
    let collaborators = Collaborators::from_state(&state);
    tokio::spawn(scheduler::schedule_diff_loop(
        Arc::clone(&state),
        collaborators,
    ));
    Ok(())
}
