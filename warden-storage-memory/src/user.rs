use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use warden_core::{
    Error, User, UserId,
    error::StorageError,
    repositories::UserRepository,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// DashMap-backed user store with an email secondary index.
///
/// Email uniqueness is enforced through the index: the reservation happens
/// under the index entry's guard, so two concurrent creates with the same
/// address see exactly one success.
#[derive(Default)]
pub struct MemoryUserRepository {
    users: DashMap<UserId, User>,
    email_index: DashMap<String, UserId>,
}

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn create(&self, user: User) -> Result<User, Error> {
        match self.email_index.entry(user.email.clone()) {
            Entry::Occupied(_) => Err(Error::Storage(StorageError::Constraint(format!(
                "email already registered: {}",
                user.email
            )))),
            Entry::Vacant(slot) => {
                slot.insert(user.id.clone());
                self.users.insert(user.id.clone(), user.clone());
                Ok(user)
            }
        }
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, Error> {
        Ok(self.users.get(id).map(|u| u.clone()))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, Error> {
        let Some(id) = self.email_index.get(email).map(|e| e.clone()) else {
            return Ok(None);
        };
        Ok(self.users.get(&id).map(|u| u.clone()))
    }

    async fn update(&self, user: &User) -> Result<User, Error> {
        let previous_email = self
            .users
            .get(&user.id)
            .map(|u| u.email.clone())
            .ok_or(Error::Storage(StorageError::NotFound))?;

        if previous_email != user.email {
            match self.email_index.entry(user.email.clone()) {
                Entry::Occupied(_) => {
                    return Err(Error::Storage(StorageError::Constraint(format!(
                        "email already registered: {}",
                        user.email
                    ))));
                }
                Entry::Vacant(slot) => {
                    slot.insert(user.id.clone());
                }
            }
            self.email_index.remove(&previous_email);
        }

        let mut updated = user.clone();
        updated.updated_at = Utc::now();
        self.users.insert(user.id.clone(), updated.clone());
        Ok(updated)
    }

    async fn set_active(&self, id: &UserId, active: bool) -> Result<User, Error> {
        let mut user = self
            .users
            .get_mut(id)
            .ok_or(Error::Storage(StorageError::NotFound))?;
        user.is_active = active;
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn mark_email_verified(&self, id: &UserId) -> Result<(), Error> {
        let mut user = self
            .users
            .get_mut(id)
            .ok_or(Error::Storage(StorageError::NotFound))?;
        user.email_verified_at = Some(Utc::now());
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn record_login(&self, id: &UserId, at: DateTime<Utc>) -> Result<(), Error> {
        let mut user = self
            .users
            .get_mut(id)
            .ok_or(Error::Storage(StorageError::NotFound))?;
        user.last_login_at = Some(at);
        Ok(())
    }

    async fn delete(&self, id: &UserId) -> Result<(), Error> {
        if let Some((_, user)) = self.users.remove(id) {
            self.email_index.remove(&user.email);
        }
        Ok(())
    }
}
