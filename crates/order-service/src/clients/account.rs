//! Account service trait and in-memory implementation.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use common::AccountId;
use tokio::sync::RwLock;

use crate::error::ServiceError;

/// Point lookups against the account service.
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    /// Returns true if the account exists.
    async fn account_exists(&self, account_id: &AccountId) -> Result<bool, ServiceError>;
}

#[derive(Debug, Default)]
struct InMemoryAccountState {
    accounts: HashSet<AccountId>,
    accept_any: bool,
    unavailable: bool,
}

/// In-memory account directory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAccountDirectory {
    state: Arc<RwLock<InMemoryAccountState>>,
}

impl InMemoryAccountDirectory {
    /// Creates a directory that knows no accounts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a directory that treats every account as existing.
    pub fn accept_any() -> Self {
        let state = InMemoryAccountState {
            accept_any: true,
            ..Default::default()
        };
        Self {
            state: Arc::new(RwLock::new(state)),
        }
    }

    /// Registers an account.
    pub async fn add_account(&self, account_id: AccountId) {
        self.state.write().await.accounts.insert(account_id);
    }

    /// Configures the directory to fail every lookup.
    pub async fn set_unavailable(&self, unavailable: bool) {
        self.state.write().await.unavailable = unavailable;
    }
}

#[async_trait]
impl AccountDirectory for InMemoryAccountDirectory {
    async fn account_exists(&self, account_id: &AccountId) -> Result<bool, ServiceError> {
        let state = self.state.read().await;

        if state.unavailable {
            return Err(ServiceError::AccountService(
                "account service unavailable".to_string(),
            ));
        }

        Ok(state.accept_any || state.accounts.contains(account_id))
    }
}
