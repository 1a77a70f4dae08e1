use std::sync::Arc;

use anyhow::anyhow;
use argon2::password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString};
use argon2::Argon2;
use serde::Serialize;
use uuid::Uuid;

use crate::app::visibility::{Visibility, VisibilityResolver};
use crate::domain::user::{PublicUser, User};
use crate::error::{Error, Result};
use crate::store::{FollowStore, NewUser, PostStore, ProfilePatch, Stores, UserStore};

/// The one-way hashing collaborator. Signup and login are the only callers.
pub trait PasswordHasher: Send + Sync {
    fn hash(&self, password: &str) -> Result<String>;
    fn verify(&self, password: &str, hash: &str) -> Result<bool>;
}

pub struct Argon2Hasher;

impl PasswordHasher for Argon2Hasher {
    fn hash(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut argon2::password_hash::rand_core::OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|err| anyhow!("failed to hash password: {}", err))?;
        Ok(hash.to_string())
    }

    fn verify(&self, password: &str, hash: &str) -> Result<bool> {
        let parsed =
            PasswordHash::new(hash).map_err(|err| anyhow!("failed to parse password hash: {}", err))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }
}

#[derive(Debug, Clone)]
pub struct Signup {
    pub username: String,
    pub email: String,
    pub password: String,
    pub display_name: String,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub is_private: bool,
}

/// A profile as some viewer sees it: the public fields with counts, plus
/// the relationship predicates for that viewer.
#[derive(Debug, Serialize)]
pub struct ProfileView {
    pub user: PublicUser,
    pub relationship: Visibility,
}

#[derive(Clone)]
pub struct UserService {
    stores: Stores,
    hasher: Arc<dyn PasswordHasher>,
}

impl UserService {
    pub fn new(stores: Stores, hasher: Arc<dyn PasswordHasher>) -> Self {
        Self { stores, hasher }
    }

    pub async fn create_user(&self, signup: Signup) -> Result<User> {
        let password_hash = self.hasher.hash(&signup.password)?;
        self.stores
            .users
            .insert(NewUser {
                username: signup.username,
                email: signup.email,
                password_hash,
                display_name: signup.display_name,
                bio: signup.bio,
                avatar_url: signup.avatar_url,
                is_private: signup.is_private,
            })
            .await
    }

    pub async fn get_user(&self, user_id: Uuid) -> Result<Option<User>> {
        self.stores.users.get(user_id).await
    }

    pub async fn get_profile(&self, viewer_id: Uuid, subject_id: Uuid) -> Result<ProfileView> {
        let relationship = VisibilityResolver::new(self.stores.clone())
            .resolve(viewer_id, subject_id)
            .await?;

        let subject = self
            .stores
            .users
            .get(subject_id)
            .await?
            .ok_or_else(|| Error::not_found("user not found"))?;

        let mut user = PublicUser::from(subject);
        user.followers_count = self.stores.follows.count_followers(subject_id).await?;
        user.following_count = self.stores.follows.count_following(subject_id).await?;
        user.posts_count = self.stores.posts.count_by_author(subject_id).await?;

        Ok(ProfileView { user, relationship })
    }

    /// Self-service only; includes the privacy toggle.
    pub async fn update_profile(
        &self,
        viewer_id: Uuid,
        user_id: Uuid,
        patch: ProfilePatch,
    ) -> Result<User> {
        if viewer_id != user_id {
            return Err(Error::forbidden("cannot update another user's profile"));
        }
        self.stores
            .users
            .update_profile(user_id, patch)
            .await?
            .ok_or_else(|| Error::not_found("user not found"))
    }
}
