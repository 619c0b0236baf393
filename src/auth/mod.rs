//! Credential verification for the login and register form endpoints.
//!
//! [`CredentialService`] is handed to connections explicitly (no process-wide
//! singleton). It checks a pooled [`UserStore`] connection out per call.

pub mod pool;
pub mod store;

pub use pool::{ConnPool, PooledConn};
pub use store::{AuthError, MemoryConn, MemoryStore, UserStore};

use crate::config::CredentialConfig;

pub struct CredentialService {
    pool: ConnPool<Box<dyn UserStore>>,
}

impl CredentialService {
    pub fn new(pool: ConnPool<Box<dyn UserStore>>) -> Self {
        Self { pool }
    }

    /// Pool of `pool_size` connections onto `store`.
    pub fn in_memory(store: &MemoryStore, pool_size: usize) -> Self {
        let conns = (0..pool_size.max(1))
            .map(|_| Box::new(store.connect()) as Box<dyn UserStore>)
            .collect();
        Self::new(ConnPool::new(conns))
    }

    /// Builds the bundled in-memory backend, seeded with `cfg.users`.
    pub fn from_config(cfg: &CredentialConfig) -> Self {
        tracing::info!(
            host = %cfg.host,
            port = cfg.port,
            user = %cfg.user,
            database = %cfg.database,
            pool_size = cfg.pool_size,
            seeded = cfg.users.len(),
            "Credential store ready"
        );
        let store = MemoryStore::with_users(cfg.users.clone());
        Self::in_memory(&store, cfg.pool_size)
    }

    pub fn free_connections(&self) -> usize {
        self.pool.free_count()
    }

    /// Login: the stored password must match. Register: the name must be new,
    /// and is inserted. Empty fields never verify.
    pub fn verify(&self, username: &str, password: &str, is_login: bool) -> bool {
        if username.is_empty() || password.is_empty() {
            return false;
        }
        tracing::info!(user = %username, login = is_login, "Verifying credentials");

        let Some(mut conn) = self.pool.get() else {
            tracing::warn!("Credential pool closed");
            return false;
        };

        let stored = match conn.find_password(username) {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!(error = %e, "Credential lookup failed");
                return false;
            }
        };

        if is_login {
            let ok = stored.as_deref() == Some(password);
            if !ok {
                tracing::info!(user = %username, "Password mismatch");
            }
            return ok;
        }

        if stored.is_some() {
            tracing::info!(user = %username, "Username already taken");
            return false;
        }
        match conn.insert_user(username, password) {
            Ok(()) => {
                tracing::debug!(user = %username, "Registered");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "Insert failed");
                false
            }
        }
    }

    pub fn close(&self) {
        self.pool.close();
    }
}
