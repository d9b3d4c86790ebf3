/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::{Context, Result};
use async_trait::async_trait;
use sea_orm::{
    ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbBackend, Statement,
    TransactionTrait,
};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, warn};

/// Held for the duration of a critical section. Dropping it releases the lock.
pub struct LockGuard {
    name: String,
    inner: GuardInner,
}

enum GuardInner {
    Transaction(DatabaseTransaction),
    Local(OwnedMutexGuard<()>),
}

impl LockGuard {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn release(self) -> Result<()> {
        match self.inner {
            GuardInner::Transaction(txn) => txn
                .commit()
                .await
                .with_context(|| format!("Failed to release lock {}", self.name)),
            GuardInner::Local(guard) => {
                drop(guard);
                Ok(())
            }
        }
    }
}

/// Mutual exclusion across every worker sharing the same backend.
#[async_trait]
pub trait NamedMutex: Send + Sync {
    async fn acquire(&self, name: &[&str]) -> Result<LockGuard>;
}

pub fn lock_name(parts: &[&str]) -> String {
    parts.join(":")
}

/// Runs `f` while holding the named lock. The lock is released whether `f` succeeds or not.
pub async fn with_lock<T, F, Fut>(mutex: &dyn NamedMutex, name: &[&str], f: F) -> Result<T>
where
    F: FnOnce() -> Fut + Send,
    Fut: Future<Output = Result<T>> + Send,
    T: Send,
{
    let guard = mutex.acquire(name).await?;
    let result = f().await;

    if let Err(e) = guard.release().await {
        warn!(error = %e, "Failed to release lock cleanly");
    }

    result
}

/// Postgres advisory lock scoped to a dedicated transaction.
pub struct PgAdvisoryMutex {
    db: DatabaseConnection,
    timeout: Duration,
}

impl PgAdvisoryMutex {
    pub fn new(db: DatabaseConnection, timeout: Duration) -> Self {
        Self { db, timeout }
    }
}

#[async_trait]
impl NamedMutex for PgAdvisoryMutex {
    async fn acquire(&self, name: &[&str]) -> Result<LockGuard> {
        let name = lock_name(name);
        let txn = self
            .db
            .begin()
            .await
            .context("Failed to open lock transaction")?;

        let statement = Statement::from_sql_and_values(
            DbBackend::Postgres,
            "SELECT pg_advisory_xact_lock(hashtextextended($1, 0))",
            [name.clone().into()],
        );

        tokio::time::timeout(self.timeout, txn.execute(statement))
            .await
            .with_context(|| format!("Timed out waiting for lock {}", name))?
            .with_context(|| format!("Failed to acquire lock {}", name))?;

        debug!(lock = %name, "Acquired advisory lock");

        Ok(LockGuard {
            name,
            inner: GuardInner::Transaction(txn),
        })
    }
}

/// Keyed in-process locks for single node deployments.
#[derive(Default)]
pub struct LocalMutex {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    timeout: Option<Duration>,
}

impl LocalMutex {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    fn entry(&self, name: &str) -> Result<Arc<tokio::sync::Mutex<()>>> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| anyhow::anyhow!("Lock table poisoned"))?;
        // Nobody else holds or waits on these.
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        Ok(Arc::clone(locks.entry(name.to_string()).or_default()))
    }
}

#[async_trait]
impl NamedMutex for LocalMutex {
    async fn acquire(&self, name: &[&str]) -> Result<LockGuard> {
        let name = lock_name(name);
        let lock = self.entry(&name)?;

        let guard = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, lock.lock_owned())
                .await
                .with_context(|| format!("Timed out waiting for lock {}", name))?,
            None => lock.lock_owned().await,
        };

        Ok(LockGuard {
            name,
            inner: GuardInner::Local(guard),
        })
    }
}
