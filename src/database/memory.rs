use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use super::{
    AdminRecord, NewUser, PrivilegeStore, SharedConnection, StoreError, UserRecord, UserStore,
};

/// Process-local privilege store for `STORAGE_BACKEND=memory` and tests.
///
/// Mirrors the Postgres backend's observable behavior: lookups fail with
/// `Closed` after `close`, and a second `close` is refused. Administrator
/// rows are not tied to user rows here.
#[derive(Default)]
pub struct MemoryDatabase {
    admins: Mutex<HashMap<i64, AdminRecord>>,
    users: Mutex<Vec<UserRecord>>,
    last_user_id: AtomicI64,
    closed: AtomicBool,
    close_calls: AtomicUsize,
    unavailable: AtomicBool,
    close_delay: Option<Duration>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `close` take `delay` before completing
    pub fn with_close_delay(mut self, delay: Duration) -> Self {
        self.close_delay = Some(delay);
        self
    }

    /// Simulate an outage: every query fails with `Unavailable`
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn check_open(&self) -> Result<(), StoreError> {
        if self.is_closed() {
            return Err(StoreError::Closed);
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("simulated outage".to_string()));
        }
        Ok(())
    }

    fn admins(&self) -> std::sync::MutexGuard<'_, HashMap<i64, AdminRecord>> {
        self.admins.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn users(&self) -> std::sync::MutexGuard<'_, Vec<UserRecord>> {
        self.users.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl PrivilegeStore for MemoryDatabase {
    async fn ping(&self) -> Result<(), StoreError> {
        self.check_open()
    }

    async fn get_admin(&self, user_id: i64) -> Result<AdminRecord, StoreError> {
        self.check_open()?;
        self.admins()
            .get(&user_id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn create_admin(&self, user_id: i64) -> Result<AdminRecord, StoreError> {
        self.check_open()?;
        let mut admins = self.admins();
        if admins.contains_key(&user_id) {
            return Err(StoreError::Conflict(format!(
                "user {} is already an administrator",
                user_id
            )));
        }
        let record = AdminRecord {
            user_id,
            created_at: Utc::now(),
        };
        admins.insert(user_id, record.clone());
        Ok(record)
    }

    async fn delete_admin(&self, user_id: i64) -> Result<AdminRecord, StoreError> {
        self.check_open()?;
        self.admins().remove(&user_id).ok_or(StoreError::NotFound)
    }
}

#[async_trait]
impl UserStore for MemoryDatabase {
    async fn create_user(&self, user: NewUser) -> Result<UserRecord, StoreError> {
        self.check_open()?;
        let mut users = self.users();
        if let Some(taken) = users
            .iter()
            .find(|u| u.email == user.email || u.username == user.username)
        {
            let field = if taken.email == user.email {
                "email"
            } else {
                "username"
            };
            return Err(StoreError::Conflict(format!("{} already registered", field)));
        }

        let record = UserRecord {
            id: self.last_user_id.fetch_add(1, Ordering::SeqCst) + 1,
            email: user.email,
            username: user.username,
            password_hash: user.password_hash,
            created_at: Utc::now(),
        };
        users.push(record.clone());
        Ok(record)
    }

    async fn get_user_by_username(&self, username: &str) -> Result<UserRecord, StoreError> {
        self.check_open()?;
        self.users()
            .iter()
            .find(|u| u.username == username)
            .cloned()
            .ok_or(StoreError::NotFound)
    }
}

#[async_trait]
impl SharedConnection for MemoryDatabase {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.close_delay {
            tokio::time::sleep(delay).await;
        }
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(StoreError::Closed);
        }
        Ok(())
    }
}
