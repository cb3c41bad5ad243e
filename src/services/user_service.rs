use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::database::{NewUser, StoreError, UserRecord, UserStore};

/// bcrypt only reads the first 72 bytes of a password
pub const MAX_PASSWORD_BYTES: usize = 72;

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("password must be at most 72 bytes")]
    PasswordTooLong,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("password hashing failed: {0}")]
    Hashing(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Registration {
    pub email: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Login {
    pub username: String,
    pub password: String,
}

pub struct UserService {
    store: Arc<dyn UserStore>,
    bcrypt_cost: u32,
}

impl UserService {
    pub fn new(store: Arc<dyn UserStore>, bcrypt_cost: u32) -> Self {
        Self { store, bcrypt_cost }
    }

    /// Hash the password and create the account
    pub async fn register(&self, registration: Registration) -> Result<UserRecord, AccountError> {
        let email = required("email", &registration.email)?;
        let username = required("username", &registration.username)?;
        check_password(&registration.password)?;

        let password_hash = hash_password(registration.password, self.bcrypt_cost).await?;
        let user = self
            .store
            .create_user(NewUser {
                email: email.to_string(),
                username: username.to_string(),
                password_hash,
            })
            .await?;

        info!(user_id = user.id, username = %user.username, "user registered");
        Ok(user)
    }

    /// Look the user up by name and check the password against its hash.
    /// An unknown username and a wrong password are the same error.
    pub async fn authenticate(&self, login: Login) -> Result<UserRecord, AccountError> {
        let username = required("username", &login.username)?;
        check_password(&login.password)?;

        let user = match self.store.get_user_by_username(username).await {
            Ok(user) => user,
            Err(StoreError::NotFound) => return Err(AccountError::InvalidCredentials),
            Err(err) => return Err(err.into()),
        };

        if !verify_password(login.password, user.password_hash.clone()).await? {
            return Err(AccountError::InvalidCredentials);
        }

        info!(user_id = user.id, "user logged in");
        Ok(user)
    }
}

fn required<'a>(field: &'static str, value: &'a str) -> Result<&'a str, AccountError> {
    match value.trim() {
        "" => Err(AccountError::MissingField(field)),
        trimmed => Ok(trimmed),
    }
}

fn check_password(password: &str) -> Result<(), AccountError> {
    if password.is_empty() {
        return Err(AccountError::MissingField("password"));
    }
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(AccountError::PasswordTooLong);
    }
    Ok(())
}

// bcrypt is CPU bound; keep it off the request workers
async fn hash_password(password: String, cost: u32) -> Result<String, AccountError> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| AccountError::Hashing(e.to_string()))?
        .map_err(|e| AccountError::Hashing(e.to_string()))
}

async fn verify_password(password: String, hash: String) -> Result<bool, AccountError> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| AccountError::Hashing(e.to_string()))?
        .map_err(|e| AccountError::Hashing(e.to_string()))
}
