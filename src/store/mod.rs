//! Narrow per-entity repositories.
//!
//! Services depend on these traits only; the Postgres backend is the
//! production wiring and the in-memory backend drives the test suite.

pub mod memory;
pub mod postgres;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::engagement::Comment;
use crate::domain::post::Post;
use crate::domain::social_graph::{Block, Follow, FollowRequest, RequestStatus};
use crate::domain::user::User;
use crate::error::Result;

/// Keyset continuation point: rows strictly older than `(created_at, id)`.
pub type Cursor = (OffsetDateTime, Uuid);

/// Everything needed to create a user row. Id and timestamp are assigned by
/// the backend.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub display_name: String,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub is_private: bool,
}

/// Partial profile update. `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct ProfilePatch {
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub is_private: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub author_id: Uuid,
    pub description: String,
    pub images: Vec<String>,
}

/// A user on the far end of a follow or block edge, with the edge timestamp
/// for keyset pagination.
#[derive(Debug, Clone)]
pub struct UserEdge {
    pub user: User,
    pub connected_at: OffsetDateTime,
}

/// A pending follow request joined with its requester.
#[derive(Debug, Clone)]
pub struct RequestEdge {
    pub request: FollowRequest,
    pub requester: User,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with `Conflict` when the username or email is taken.
    async fn insert(&self, user: NewUser) -> Result<User>;
    async fn get(&self, id: Uuid) -> Result<Option<User>>;
    /// Lookup by username or email, for login.
    async fn get_by_login(&self, identifier: &str) -> Result<Option<User>>;
    async fn update_profile(&self, id: Uuid, patch: ProfilePatch) -> Result<Option<User>>;
}

#[async_trait]
pub trait FollowStore: Send + Sync {
    /// Fails with `Conflict` when the edge already exists.
    async fn insert(&self, follower_id: Uuid, following_id: Uuid) -> Result<Follow>;
    /// Returns false when there was no edge to delete.
    async fn delete(&self, follower_id: Uuid, following_id: Uuid) -> Result<bool>;
    async fn exists(&self, follower_id: Uuid, following_id: Uuid) -> Result<bool>;
    async fn count_followers(&self, user_id: Uuid) -> Result<i64>;
    async fn count_following(&self, user_id: Uuid) -> Result<i64>;
    async fn list_followers(
        &self,
        user_id: Uuid,
        cursor: Option<Cursor>,
        limit: i64,
    ) -> Result<Vec<UserEdge>>;
    async fn list_following(
        &self,
        user_id: Uuid,
        cursor: Option<Cursor>,
        limit: i64,
    ) -> Result<Vec<UserEdge>>;
}

#[async_trait]
pub trait BlockStore: Send + Sync {
    /// Fails with `Conflict` when the pair is already blocked in this
    /// direction. On success, follow edges between the pair are purged in
    /// both directions within the same atomic step.
    async fn insert(&self, blocker_id: Uuid, blocked_id: Uuid) -> Result<Block>;
    async fn delete(&self, blocker_id: Uuid, blocked_id: Uuid) -> Result<bool>;
    async fn exists(&self, blocker_id: Uuid, blocked_id: Uuid) -> Result<bool>;
    /// True when a block exists in either direction.
    async fn exists_between(&self, a: Uuid, b: Uuid) -> Result<bool>;
    async fn list_blocked(
        &self,
        blocker_id: Uuid,
        cursor: Option<Cursor>,
        limit: i64,
    ) -> Result<Vec<UserEdge>>;
}

#[async_trait]
pub trait FollowRequestStore: Send + Sync {
    /// Fails with `Conflict` when a pending request for the pair exists.
    async fn insert_pending(&self, requester_id: Uuid, requested_id: Uuid)
        -> Result<FollowRequest>;
    async fn get(&self, id: Uuid) -> Result<Option<FollowRequest>>;
    async fn pending_exists(&self, requester_id: Uuid, requested_id: Uuid) -> Result<bool>;
    async fn set_status(&self, id: Uuid, status: RequestStatus) -> Result<bool>;
    async fn delete(&self, id: Uuid) -> Result<bool>;
    async fn list_pending_for(
        &self,
        requested_id: Uuid,
        cursor: Option<Cursor>,
        limit: i64,
    ) -> Result<Vec<RequestEdge>>;
}

#[async_trait]
pub trait PostStore: Send + Sync {
    async fn insert(&self, post: NewPost) -> Result<Post>;
    /// Raw lookup, regardless of status or viewer. Callers gate visibility.
    async fn get(&self, id: Uuid) -> Result<Option<Post>>;
    async fn update_description(&self, id: Uuid, description: String) -> Result<bool>;
    /// Soft delete: flips status to Deleted, the row stays.
    async fn mark_deleted(&self, id: Uuid) -> Result<bool>;
    async fn count_by_author(&self, author_id: Uuid) -> Result<i64>;
    /// Active posts by one author, newest first.
    async fn list_by_author(
        &self,
        author_id: Uuid,
        cursor: Option<Cursor>,
        limit: i64,
    ) -> Result<Vec<Post>>;
    /// The home-feed page: active posts whose author neither blocks nor is
    /// blocked by the viewer, and is public, followed by the viewer, or the
    /// viewer themself. Newest first, ties broken by post id.
    async fn list_feed(
        &self,
        viewer_id: Uuid,
        cursor: Option<Cursor>,
        limit: i64,
    ) -> Result<Vec<Post>>;
}

#[async_trait]
pub trait LikeStore: Send + Sync {
    /// Returns false when the like already existed.
    async fn insert(&self, post_id: Uuid, user_id: Uuid) -> Result<bool>;
    async fn delete(&self, post_id: Uuid, user_id: Uuid) -> Result<bool>;
    /// Which of the given posts the user has liked.
    async fn liked_by(&self, user_id: Uuid, post_ids: &[Uuid]) -> Result<Vec<Uuid>>;
    async fn count_for(&self, post_ids: &[Uuid]) -> Result<HashMap<Uuid, i64>>;
}

#[async_trait]
pub trait CommentStore: Send + Sync {
    async fn insert(&self, post_id: Uuid, author_id: Uuid, body: String) -> Result<Comment>;
    async fn get(&self, id: Uuid) -> Result<Option<Comment>>;
    async fn delete(&self, id: Uuid) -> Result<bool>;
    async fn list_for_post(
        &self,
        post_id: Uuid,
        cursor: Option<Cursor>,
        limit: i64,
    ) -> Result<Vec<Comment>>;
    async fn count_for(&self, post_ids: &[Uuid]) -> Result<HashMap<Uuid, i64>>;
}

/// Constructor-passed bundle of every repository. Cheap to clone.
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub follows: Arc<dyn FollowStore>,
    pub blocks: Arc<dyn BlockStore>,
    pub requests: Arc<dyn FollowRequestStore>,
    pub posts: Arc<dyn PostStore>,
    pub likes: Arc<dyn LikeStore>,
    pub comments: Arc<dyn CommentStore>,
}

impl Stores {
    pub fn postgres(store: postgres::PgStore) -> Self {
        let store = Arc::new(store);
        Self {
            users: store.clone(),
            follows: store.clone(),
            blocks: store.clone(),
            requests: store.clone(),
            posts: store.clone(),
            likes: store.clone(),
            comments: store,
        }
    }

    pub fn memory() -> Self {
        let store = Arc::new(memory::MemoryStore::new());
        Self {
            users: store.clone(),
            follows: store.clone(),
            blocks: store.clone(),
            requests: store.clone(),
            posts: store.clone(),
            likes: store.clone(),
            comments: store,
        }
    }
}
