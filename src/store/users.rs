// src/store/users.rs

use std::path::PathBuf;

use super::{JsonFile, StoreError};
use crate::models::user::{Role, User, UserChanges};

pub struct UserStore {
    file: JsonFile<User>,
}

fn same_name(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

impl UserStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            file: JsonFile::new(path),
        }
    }

    pub fn file(&self) -> &JsonFile<User> {
        &self.file
    }

    pub async fn list(&self) -> Result<Vec<User>, StoreError> {
        self.file.load().await
    }

    /// Case-insensitive lookup.
    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let users = self.file.load().await?;
        Ok(users.into_iter().find(|u| same_name(&u.username, username)))
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<User>, StoreError> {
        let users = self.file.load().await?;
        Ok(users.into_iter().find(|u| u.id == id))
    }

    /// Appends a new user. `password_hash` must already be hashed.
    pub async fn create(
        &self,
        username: &str,
        password_hash: String,
        role: Role,
    ) -> Result<User, StoreError> {
        self.file
            .update(|users| {
                if users.iter().any(|u| same_name(&u.username, username)) {
                    return Err(StoreError::Conflict(format!(
                        "Username '{}' already exists",
                        username
                    )));
                }

                let user = User {
                    id: format!("user_{}", uuid::Uuid::new_v4().simple()),
                    username: username.to_string(),
                    password: password_hash,
                    role,
                    created_at: chrono::Utc::now(),
                };
                users.push(user.clone());
                Ok(user)
            })
            .await
    }

    /// Applies `changes` to the user with `id`. Returns `None` for an unknown id.
    pub async fn update(&self, id: &str, changes: UserChanges) -> Result<Option<User>, StoreError> {
        self.file
            .update(|users| {
                if let Some(new_name) = &changes.username {
                    let taken = users
                        .iter()
                        .any(|u| u.id != id && same_name(&u.username, new_name));
                    if taken {
                        return Err(StoreError::Conflict("Username already taken".to_string()));
                    }
                }

                let Some(user) = users.iter_mut().find(|u| u.id == id) else {
                    return Ok(None);
                };

                if let Some(username) = changes.username {
                    user.username = username;
                }
                if let Some(hash) = changes.password_hash {
                    user.password = hash;
                }
                if let Some(role) = changes.role {
                    user.role = role;
                }

                Ok(Some(user.clone()))
            })
            .await
    }
}
