//! In-memory credential store.
//!
//! Records live in a `DashMap` keyed by user id; a second map indexes ids by
//! lower-cased email. Each slot mutation happens under the record's shard
//! lock, which gives the per-subject atomicity the trait requires.

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::store::{CredentialStore, SessionState, StoreError, UserIdentity, UserRecord};

#[derive(Default)]
pub struct MemoryStore {
    users: DashMap<String, UserRecord>,
    emails: DashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let Some(id) = self.emails.get(&email.to_lowercase()).map(|id| id.clone()) else {
            return Ok(None);
        };
        Ok(self.users.get(&id).map(|record| record.clone()))
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<UserRecord>, StoreError> {
        Ok(self.users.get(id).map(|record| record.clone()))
    }

    async fn create(&self, identity: &UserIdentity) -> Result<(), StoreError> {
        // Claim the email first so two concurrent registrations cannot both win.
        match self.emails.entry(identity.email.to_lowercase()) {
            Entry::Occupied(_) => return Err(StoreError::DuplicateEmail),
            Entry::Vacant(slot) => {
                slot.insert(identity.id.clone());
            }
        }

        self.users.insert(
            identity.id.clone(),
            UserRecord {
                identity: identity.clone(),
                session: SessionState::default(),
            },
        );
        Ok(())
    }

    async fn set_refresh_token(&self, id: &str, token: Option<&str>) -> Result<(), StoreError> {
        let mut record = self.users.get_mut(id).ok_or(StoreError::NotFound)?;
        record.session.current_refresh_token = token.map(str::to_string);
        Ok(())
    }

    async fn swap_refresh_token(
        &self,
        id: &str,
        expected: &str,
        new: Option<&str>,
    ) -> Result<bool, StoreError> {
        let mut record = self.users.get_mut(id).ok_or(StoreError::NotFound)?;
        if record.session.current_refresh_token.as_deref() != Some(expected) {
            return Ok(false);
        }
        record.session.current_refresh_token = new.map(str::to_string);
        Ok(true)
    }
}
