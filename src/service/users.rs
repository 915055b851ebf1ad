//! User service
//!
//! Orchestrates users and the friendship graph: the email duplicate
//! guard, partial updates, symmetric friend mutations, and the
//! friend/common-friend read queries.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};

use crate::data::{NewUser, User, UserPatch, UserStore};
use crate::error::{AppError, Result};

/// User service
pub struct UserService {
    users: Arc<dyn UserStore>,
}

impl UserService {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }

    fn today() -> NaiveDate {
        Utc::now().date_naive()
    }

    pub async fn find_all(&self) -> Result<Vec<User>> {
        self.users.find_all().await
    }

    pub async fn find_by_id(&self, id: i64) -> Result<User> {
        self.users
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user with id {id} not found")))
    }

    pub async fn create(&self, new_user: NewUser) -> Result<User> {
        tracing::debug!(login = %new_user.login, "create user");

        let name = match new_user.name {
            Some(name) if !name.trim().is_empty() => name,
            _ => new_user.login.clone(),
        };
        let user = User {
            id: 0,
            email: new_user.email,
            login: new_user.login,
            name,
            birthday: new_user.birthday,
            friends: HashSet::new(),
        };

        user.validate(Self::today())?;

        if self.users.find_equal(&user).await?.is_some() {
            return Err(AppError::Duplicate("this email is already in use".into()));
        }

        self.users.create(user).await
    }

    /// Apply a partial update. Omitted fields keep their stored
    /// values; the friend set is never replaced through this path.
    pub async fn update(&self, patch: UserPatch) -> Result<User> {
        tracing::debug!(id = patch.id, "update user");

        let original = self.find_by_id(patch.id).await?;

        let merged = User {
            id: original.id,
            email: patch.email.unwrap_or(original.email),
            login: patch.login.unwrap_or(original.login),
            name: patch.name.unwrap_or(original.name),
            birthday: patch.birthday.or(original.birthday),
            friends: original.friends,
        };

        merged.validate(Self::today())?;

        // Post-merge duplicate guard: an update that keeps its own
        // email must not collide with itself.
        if let Some(existing) = self.users.find_equal(&merged).await? {
            if existing.id != merged.id {
                return Err(AppError::Duplicate("this email is already in use".into()));
            }
        }

        self.users.update(merged).await
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        tracing::debug!(id, "delete user");
        self.find_by_id(id).await?;
        self.users.delete(id).await
    }

    /// A user's friends, resolved to full entities in one bulk lookup.
    pub async fn find_friends(&self, id: i64) -> Result<Vec<User>> {
        let user = self.find_by_id(id).await?;
        self.users.find_by_ids(&user.friends).await
    }

    /// Friends both users share. An empty intersection is a valid
    /// empty result.
    pub async fn find_common_friends(&self, id1: i64, id2: i64) -> Result<Vec<User>> {
        let user1 = self.find_by_id(id1).await?;
        let user2 = self.find_by_id(id2).await?;

        let common: HashSet<i64> = user1
            .friends
            .intersection(&user2.friends)
            .copied()
            .collect();
        self.users.find_by_ids(&common).await
    }

    pub async fn add_friend(&self, user_id: i64, friend_id: i64) -> Result<User> {
        tracing::debug!(user_id, friend_id, "add friend");

        if user_id == friend_id {
            return Err(AppError::Validation(
                "a user cannot befriend themselves".into(),
            ));
        }

        let user = self.find_by_id(user_id).await?;
        self.find_by_id(friend_id).await?;

        if user.friends.contains(&friend_id) {
            return Err(AppError::Duplicate(format!(
                "user {friend_id} is already a friend"
            )));
        }

        self.users.add_friend(user_id, friend_id).await
    }

    /// Symmetric removal. Only the users themselves must exist; a
    /// missing membership deletes nothing and is not an error.
    pub async fn delete_friend(&self, user_id: i64, friend_id: i64) -> Result<User> {
        tracing::debug!(user_id, friend_id, "delete friend");

        self.find_by_id(user_id).await?;
        self.find_by_id(friend_id).await?;

        self.users.delete_friend(user_id, friend_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{MemoryFilmStore, MemoryUserStore};

    fn service() -> UserService {
        let films = Arc::new(MemoryFilmStore::new());
        UserService::new(Arc::new(MemoryUserStore::new(films)))
    }

    fn new_user(email: &str, login: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            login: login.to_string(),
            name: None,
            birthday: NaiveDate::from_ymd_opt(1990, 1, 1),
        }
    }

    #[tokio::test]
    async fn create_defaults_blank_name_to_login() {
        let users = service();

        let unnamed = users
            .create(new_user("a@example.com", "alice"))
            .await
            .unwrap();
        assert_eq!(unnamed.name, "alice");
        assert!(unnamed.friends.is_empty());

        let mut blank = new_user("b@example.com", "bob");
        blank.name = Some("   ".to_string());
        let blank_named = users.create(blank).await.unwrap();
        assert_eq!(blank_named.name, "bob");
    }

    #[tokio::test]
    async fn create_rejects_duplicate_email() {
        let users = service();
        users
            .create(new_user("a@example.com", "alice"))
            .await
            .unwrap();

        let err = users
            .create(new_user("a@example.com", "other"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Duplicate(_)));
    }

    #[tokio::test]
    async fn update_without_email_preserves_it_and_avoids_false_duplicate() {
        let users = service();
        let user = users
            .create(new_user("a@example.com", "alice"))
            .await
            .unwrap();

        let updated = users
            .update(UserPatch {
                id: user.id,
                email: None,
                login: None,
                name: Some("Alice".to_string()),
                birthday: None,
            })
            .await
            .unwrap();

        assert_eq!(updated.email, "a@example.com");
        assert_eq!(updated.name, "Alice");
    }

    #[tokio::test]
    async fn update_rejects_taking_another_users_email() {
        let users = service();
        users
            .create(new_user("a@example.com", "alice"))
            .await
            .unwrap();
        let bob = users.create(new_user("b@example.com", "bob")).await.unwrap();

        let err = users
            .update(UserPatch {
                id: bob.id,
                email: Some("a@example.com".to_string()),
                login: None,
                name: None,
                birthday: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Duplicate(_)));
    }

    #[tokio::test]
    async fn friendship_is_symmetric_and_duplicate_guarded() {
        let users = service();
        let a = users.create(new_user("a@example.com", "a")).await.unwrap();
        let b = users.create(new_user("b@example.com", "b")).await.unwrap();

        users.add_friend(a.id, b.id).await.unwrap();
        assert!(users.find_by_id(a.id).await.unwrap().friends.contains(&b.id));
        assert!(users.find_by_id(b.id).await.unwrap().friends.contains(&a.id));

        // The mirror membership also counts as existing.
        assert!(matches!(
            users.add_friend(a.id, b.id).await,
            Err(AppError::Duplicate(_))
        ));
        assert!(matches!(
            users.add_friend(b.id, a.id).await,
            Err(AppError::Duplicate(_))
        ));

        users.delete_friend(a.id, b.id).await.unwrap();
        assert!(users.find_by_id(a.id).await.unwrap().friends.is_empty());
        assert!(users.find_by_id(b.id).await.unwrap().friends.is_empty());

        // Deleting an absent membership passes once both users exist.
        users.delete_friend(a.id, b.id).await.unwrap();
    }

    #[tokio::test]
    async fn add_friend_rejects_self_and_missing_users() {
        let users = service();
        let a = users.create(new_user("a@example.com", "a")).await.unwrap();

        assert!(matches!(
            users.add_friend(a.id, a.id).await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            users.add_friend(a.id, 99).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            users.add_friend(99, a.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn find_friends_resolves_full_entities() {
        let users = service();
        let a = users.create(new_user("a@example.com", "a")).await.unwrap();
        let b = users.create(new_user("b@example.com", "b")).await.unwrap();
        let c = users.create(new_user("c@example.com", "c")).await.unwrap();

        users.add_friend(a.id, b.id).await.unwrap();
        users.add_friend(a.id, c.id).await.unwrap();

        let friends = users.find_friends(a.id).await.unwrap();
        let mut logins: Vec<&str> = friends.iter().map(|u| u.login.as_str()).collect();
        logins.sort();
        assert_eq!(logins, vec!["b", "c"]);

        assert!(matches!(
            users.find_friends(99).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn common_friends_is_a_symmetric_intersection() {
        let users = service();
        let a = users.create(new_user("a@example.com", "a")).await.unwrap();
        let b = users.create(new_user("b@example.com", "b")).await.unwrap();
        let shared = users.create(new_user("s@example.com", "shared")).await.unwrap();

        // No friendships yet: empty, not an error.
        assert!(users.find_common_friends(a.id, b.id).await.unwrap().is_empty());

        users.add_friend(a.id, shared.id).await.unwrap();
        users.add_friend(b.id, shared.id).await.unwrap();

        let ab = users.find_common_friends(a.id, b.id).await.unwrap();
        let ba = users.find_common_friends(b.id, a.id).await.unwrap();
        assert_eq!(ab.iter().map(|u| u.id).collect::<HashSet<_>>(),
                   ba.iter().map(|u| u.id).collect::<HashSet<_>>());
        assert_eq!(ab.len(), 1);
        assert_eq!(ab[0].id, shared.id);

        assert!(matches!(
            users.find_common_friends(a.id, 99).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn create_validates_fields() {
        let users = service();

        assert!(matches!(
            users.create(new_user("not-an-email", "x")).await,
            Err(AppError::Validation(_))
        ));

        let mut future = new_user("f@example.com", "f");
        future.birthday = NaiveDate::from_ymd_opt(2100, 1, 1);
        assert!(matches!(
            users.create(future).await,
            Err(AppError::Validation(_))
        ));
    }
}
