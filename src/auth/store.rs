//! Credential store backends.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("user {0} already exists")]
    UserExists(String),
}

/// One connection to a user table.
///
/// Implementations are checked out of a [`ConnPool`](crate::auth::ConnPool)
/// for the duration of a single verification.
pub trait UserStore: Send {
    /// Stored password for `username`, if the user exists.
    fn find_password(&mut self, username: &str) -> Result<Option<String>, AuthError>;

    /// Adds a user. Fails with [`AuthError::UserExists`] if the name is taken.
    fn insert_user(&mut self, username: &str, password: &str) -> Result<(), AuthError>;
}

/// In-process user table shared by all of its connections.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    users: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users<I, K, V>(users: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let users = users
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            users: Arc::new(RwLock::new(users)),
        }
    }

    /// Opens a new connection onto this table.
    pub fn connect(&self) -> MemoryConn {
        MemoryConn {
            users: self.users.clone(),
        }
    }

    pub fn user_count(&self) -> usize {
        self.users.read().len()
    }

    pub fn contains(&self, username: &str) -> bool {
        self.users.read().contains_key(username)
    }
}

#[derive(Debug)]
pub struct MemoryConn {
    users: Arc<RwLock<HashMap<String, String>>>,
}

impl UserStore for MemoryConn {
    fn find_password(&mut self, username: &str) -> Result<Option<String>, AuthError> {
        Ok(self.users.read().get(username).cloned())
    }

    fn insert_user(&mut self, username: &str, password: &str) -> Result<(), AuthError> {
        let mut users = self.users.write();
        if users.contains_key(username) {
            return Err(AuthError::UserExists(username.to_string()));
        }
        users.insert(username.to_string(), password.to_string());
        Ok(())
    }
}
