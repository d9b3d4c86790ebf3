/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use thiserror::Error;
use uuid::Uuid;

/// Programming contract failures. Retrying a job that hit one of these never helps.
#[derive(Debug, Error)]
pub enum Invariant {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },
    #[error("relation `{relation}` missing on {entity} {id}")]
    MissingRelation {
        entity: &'static str,
        relation: &'static str,
        id: Uuid,
    },
    #[error("{0}")]
    Violated(String),
}

/// Stored bytes that fail to decode. They fail the same way on every attempt.
#[derive(Debug, Error)]
#[error("{what} could not be decoded: {reason}")]
pub struct CorruptContent {
    pub what: String,
    pub reason: String,
}

pub fn is_unretryable(err: &anyhow::Error) -> bool {
    err.chain()
        .any(|cause| cause.is::<Invariant>() || cause.is::<CorruptContent>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_invariant_is_unretryable_through_context() {
        let err: anyhow::Result<()> = Err(Invariant::Violated("no compare screenshot".into()))
            .context("Failed to compute screenshot diff");

        assert!(is_unretryable(&err.unwrap_err()));
    }

    #[test]
    fn test_corrupt_content_is_unretryable() {
        let err: anyhow::Result<()> = Err(CorruptContent {
            what: "base image".to_string(),
            reason: "unexpected end of file".to_string(),
        })
        .context("Failed to compute screenshot diff");

        let err = err.unwrap_err();
        assert!(is_unretryable(&err));
        assert!(format!("{:#}", err).contains("base image could not be decoded"));
    }

    #[test]
    fn test_io_error_is_retryable() {
        let err = anyhow::anyhow!("connection reset");
        assert!(!is_unretryable(&err));
    }
}
