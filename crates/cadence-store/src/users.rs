use std::sync::Arc;

use async_trait::async_trait;
use cadence_core::types::UserProfile;

use crate::document::DocumentStore;
use crate::error::{Result, StoreError};
use crate::repo::load_profile;

/// Resolves a user id to the contact details needed for notifications.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Fails with [`StoreError::UserNotFound`] when no profile exists.
    async fn get_user_by_id(&self, user_id: &str) -> Result<UserProfile>;
}

/// Reads profiles from `users/{id}` in the document store.
pub struct StoreUserDirectory {
    store: Arc<dyn DocumentStore>,
}

impl StoreUserDirectory {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl UserDirectory for StoreUserDirectory {
    async fn get_user_by_id(&self, user_id: &str) -> Result<UserProfile> {
        load_profile(self.store.as_ref(), user_id)
            .await?
            .filter(|p| !p.email.trim().is_empty())
            .ok_or_else(|| StoreError::UserNotFound {
                id: user_id.to_string(),
            })
    }
}
