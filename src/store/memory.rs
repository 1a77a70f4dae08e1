use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::domain::engagement::{Comment, Like};
use crate::domain::post::{Post, PostStatus};
use crate::domain::social_graph::{Block, Follow, FollowRequest, RequestStatus};
use crate::domain::user::User;
use crate::error::{Error, Result};
use crate::store::{
    BlockStore, CommentStore, Cursor, FollowRequestStore, FollowStore, LikeStore, NewPost,
    NewUser, PostStore, ProfilePatch, RequestEdge, UserEdge, UserStore,
};

/// In-memory backend. Semantics mirror the Postgres backend; the integration
/// suite runs against it so no external services are required.
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    follows: HashMap<(Uuid, Uuid), Follow>,
    blocks: HashMap<(Uuid, Uuid), Block>,
    requests: HashMap<Uuid, FollowRequest>,
    posts: HashMap<Uuid, Post>,
    likes: HashMap<(Uuid, Uuid), Like>,
    comments: HashMap<Uuid, Comment>,
    last_timestamp: Option<OffsetDateTime>,
}

impl Inner {
    /// Strictly monotonic timestamps keep keyset order aligned with insertion
    /// order even when the clock does not advance between writes.
    fn next_timestamp(&mut self) -> OffsetDateTime {
        let mut now = OffsetDateTime::now_utc();
        if let Some(last) = self.last_timestamp {
            if now <= last {
                now = last + Duration::microseconds(1);
            }
        }
        self.last_timestamp = Some(now);
        now
    }

    fn username_of(&self, user_id: Uuid) -> Option<String> {
        self.users.get(&user_id).map(|user| user.username.clone())
    }

    fn post_for_read(&self, post: &Post) -> Post {
        let mut post = post.clone();
        post.author_username = self.username_of(post.author_id);
        post
    }

    fn comment_for_read(&self, comment: &Comment) -> Comment {
        let mut comment = comment.clone();
        comment.author_username = self.username_of(comment.author_id);
        comment
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner.read().expect("store lock poisoned")
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        self.inner.write().expect("store lock poisoned")
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Sort newest-first by `(created_at, id)`, drop rows at or after the cursor,
/// and truncate to the page size. Matches the SQL keyset queries exactly.
fn keyset_page<T, F>(mut rows: Vec<T>, cursor: Option<Cursor>, limit: i64, key: F) -> Vec<T>
where
    F: Fn(&T) -> Cursor,
{
    rows.sort_by(|a, b| key(b).cmp(&key(a)));
    if let Some(cursor) = cursor {
        rows.retain(|row| key(row) < cursor);
    }
    rows.truncate(limit.max(0) as usize);
    rows
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert(&self, user: NewUser) -> Result<User> {
        let mut inner = self.write();
        let taken = inner
            .users
            .values()
            .any(|existing| existing.username == user.username || existing.email == user.email);
        if taken {
            return Err(Error::conflict("username or email already taken"));
        }

        let created_at = inner.next_timestamp();
        let user = User {
            id: Uuid::new_v4(),
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            display_name: user.display_name,
            bio: user.bio,
            avatar_url: user.avatar_url,
            is_private: user.is_private,
            created_at,
        };
        inner.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.read().users.get(&id).cloned())
    }

    async fn get_by_login(&self, identifier: &str) -> Result<Option<User>> {
        Ok(self
            .read()
            .users
            .values()
            .find(|user| user.username == identifier || user.email == identifier)
            .cloned())
    }

    async fn update_profile(&self, id: Uuid, patch: ProfilePatch) -> Result<Option<User>> {
        let mut inner = self.write();
        let Some(user) = inner.users.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(display_name) = patch.display_name {
            user.display_name = display_name;
        }
        if let Some(bio) = patch.bio {
            user.bio = Some(bio);
        }
        if let Some(avatar_url) = patch.avatar_url {
            user.avatar_url = Some(avatar_url);
        }
        if let Some(is_private) = patch.is_private {
            user.is_private = is_private;
        }
        Ok(Some(user.clone()))
    }
}

#[async_trait]
impl FollowStore for MemoryStore {
    async fn insert(&self, follower_id: Uuid, following_id: Uuid) -> Result<Follow> {
        let mut inner = self.write();
        if inner.follows.contains_key(&(follower_id, following_id)) {
            return Err(Error::conflict("already following this user"));
        }
        let follow = Follow {
            follower_id,
            following_id,
            created_at: inner.next_timestamp(),
        };
        inner
            .follows
            .insert((follower_id, following_id), follow.clone());
        Ok(follow)
    }

    async fn delete(&self, follower_id: Uuid, following_id: Uuid) -> Result<bool> {
        Ok(self
            .write()
            .follows
            .remove(&(follower_id, following_id))
            .is_some())
    }

    async fn exists(&self, follower_id: Uuid, following_id: Uuid) -> Result<bool> {
        Ok(self
            .read()
            .follows
            .contains_key(&(follower_id, following_id)))
    }

    async fn count_followers(&self, user_id: Uuid) -> Result<i64> {
        Ok(self
            .read()
            .follows
            .values()
            .filter(|follow| follow.following_id == user_id)
            .count() as i64)
    }

    async fn count_following(&self, user_id: Uuid) -> Result<i64> {
        Ok(self
            .read()
            .follows
            .values()
            .filter(|follow| follow.follower_id == user_id)
            .count() as i64)
    }

    async fn list_followers(
        &self,
        user_id: Uuid,
        cursor: Option<Cursor>,
        limit: i64,
    ) -> Result<Vec<UserEdge>> {
        let inner = self.read();
        let edges: Vec<UserEdge> = inner
            .follows
            .values()
            .filter(|follow| follow.following_id == user_id)
            .filter_map(|follow| {
                inner.users.get(&follow.follower_id).map(|user| UserEdge {
                    user: user.clone(),
                    connected_at: follow.created_at,
                })
            })
            .collect();
        Ok(keyset_page(edges, cursor, limit, |edge| {
            (edge.connected_at, edge.user.id)
        }))
    }

    async fn list_following(
        &self,
        user_id: Uuid,
        cursor: Option<Cursor>,
        limit: i64,
    ) -> Result<Vec<UserEdge>> {
        let inner = self.read();
        let edges: Vec<UserEdge> = inner
            .follows
            .values()
            .filter(|follow| follow.follower_id == user_id)
            .filter_map(|follow| {
                inner.users.get(&follow.following_id).map(|user| UserEdge {
                    user: user.clone(),
                    connected_at: follow.created_at,
                })
            })
            .collect();
        Ok(keyset_page(edges, cursor, limit, |edge| {
            (edge.connected_at, edge.user.id)
        }))
    }
}

#[async_trait]
impl BlockStore for MemoryStore {
    async fn insert(&self, blocker_id: Uuid, blocked_id: Uuid) -> Result<Block> {
        // One lock hold covers the block and the follow purge.
        let mut inner = self.write();
        if inner.blocks.contains_key(&(blocker_id, blocked_id)) {
            return Err(Error::conflict("user is already blocked"));
        }
        let block = Block {
            blocker_id,
            blocked_id,
            created_at: inner.next_timestamp(),
        };
        inner.blocks.insert((blocker_id, blocked_id), block.clone());
        inner.follows.remove(&(blocker_id, blocked_id));
        inner.follows.remove(&(blocked_id, blocker_id));
        Ok(block)
    }

    async fn delete(&self, blocker_id: Uuid, blocked_id: Uuid) -> Result<bool> {
        Ok(self
            .write()
            .blocks
            .remove(&(blocker_id, blocked_id))
            .is_some())
    }

    async fn exists(&self, blocker_id: Uuid, blocked_id: Uuid) -> Result<bool> {
        Ok(self.read().blocks.contains_key(&(blocker_id, blocked_id)))
    }

    async fn exists_between(&self, a: Uuid, b: Uuid) -> Result<bool> {
        let inner = self.read();
        Ok(inner.blocks.contains_key(&(a, b)) || inner.blocks.contains_key(&(b, a)))
    }

    async fn list_blocked(
        &self,
        blocker_id: Uuid,
        cursor: Option<Cursor>,
        limit: i64,
    ) -> Result<Vec<UserEdge>> {
        let inner = self.read();
        let edges: Vec<UserEdge> = inner
            .blocks
            .values()
            .filter(|block| block.blocker_id == blocker_id)
            .filter_map(|block| {
                inner.users.get(&block.blocked_id).map(|user| UserEdge {
                    user: user.clone(),
                    connected_at: block.created_at,
                })
            })
            .collect();
        Ok(keyset_page(edges, cursor, limit, |edge| {
            (edge.connected_at, edge.user.id)
        }))
    }
}

#[async_trait]
impl FollowRequestStore for MemoryStore {
    async fn insert_pending(
        &self,
        requester_id: Uuid,
        requested_id: Uuid,
    ) -> Result<FollowRequest> {
        let mut inner = self.write();
        let pending = inner.requests.values().any(|request| {
            request.requester_id == requester_id
                && request.requested_id == requested_id
                && request.status == RequestStatus::Pending
        });
        if pending {
            return Err(Error::conflict("follow request already sent"));
        }
        let request = FollowRequest {
            id: Uuid::new_v4(),
            requester_id,
            requested_id,
            status: RequestStatus::Pending,
            created_at: inner.next_timestamp(),
        };
        inner.requests.insert(request.id, request.clone());
        Ok(request)
    }

    async fn get(&self, id: Uuid) -> Result<Option<FollowRequest>> {
        Ok(self.read().requests.get(&id).cloned())
    }

    async fn pending_exists(&self, requester_id: Uuid, requested_id: Uuid) -> Result<bool> {
        Ok(self.read().requests.values().any(|request| {
            request.requester_id == requester_id
                && request.requested_id == requested_id
                && request.status == RequestStatus::Pending
        }))
    }

    async fn set_status(&self, id: Uuid, status: RequestStatus) -> Result<bool> {
        let mut inner = self.write();
        match inner.requests.get_mut(&id) {
            Some(request) => {
                request.status = status;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        Ok(self.write().requests.remove(&id).is_some())
    }

    async fn list_pending_for(
        &self,
        requested_id: Uuid,
        cursor: Option<Cursor>,
        limit: i64,
    ) -> Result<Vec<RequestEdge>> {
        let inner = self.read();
        let edges: Vec<RequestEdge> = inner
            .requests
            .values()
            .filter(|request| {
                request.requested_id == requested_id && request.status == RequestStatus::Pending
            })
            .filter_map(|request| {
                inner
                    .users
                    .get(&request.requester_id)
                    .map(|user| RequestEdge {
                        request: request.clone(),
                        requester: user.clone(),
                    })
            })
            .collect();
        Ok(keyset_page(edges, cursor, limit, |edge| {
            (edge.request.created_at, edge.request.id)
        }))
    }
}

#[async_trait]
impl PostStore for MemoryStore {
    async fn insert(&self, post: NewPost) -> Result<Post> {
        let mut inner = self.write();
        let created_at = inner.next_timestamp();
        let stored = Post {
            id: Uuid::new_v4(),
            author_id: post.author_id,
            author_username: None,
            description: post.description,
            images: post.images,
            status: PostStatus::Active,
            created_at,
        };
        inner.posts.insert(stored.id, stored.clone());
        Ok(inner.post_for_read(&stored))
    }

    async fn get(&self, id: Uuid) -> Result<Option<Post>> {
        let inner = self.read();
        Ok(inner.posts.get(&id).map(|post| inner.post_for_read(post)))
    }

    async fn update_description(&self, id: Uuid, description: String) -> Result<bool> {
        let mut inner = self.write();
        match inner.posts.get_mut(&id) {
            Some(post) => {
                post.description = description;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_deleted(&self, id: Uuid) -> Result<bool> {
        let mut inner = self.write();
        match inner.posts.get_mut(&id) {
            Some(post) => {
                post.status = PostStatus::Deleted;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn count_by_author(&self, author_id: Uuid) -> Result<i64> {
        Ok(self
            .read()
            .posts
            .values()
            .filter(|post| post.author_id == author_id && post.status == PostStatus::Active)
            .count() as i64)
    }

    async fn list_by_author(
        &self,
        author_id: Uuid,
        cursor: Option<Cursor>,
        limit: i64,
    ) -> Result<Vec<Post>> {
        let inner = self.read();
        let posts: Vec<Post> = inner
            .posts
            .values()
            .filter(|post| post.author_id == author_id && post.status == PostStatus::Active)
            .map(|post| inner.post_for_read(post))
            .collect();
        Ok(keyset_page(posts, cursor, limit, |post| {
            (post.created_at, post.id)
        }))
    }

    async fn list_feed(
        &self,
        viewer_id: Uuid,
        cursor: Option<Cursor>,
        limit: i64,
    ) -> Result<Vec<Post>> {
        let inner = self.read();
        let posts: Vec<Post> = inner
            .posts
            .values()
            .filter(|post| post.status == PostStatus::Active)
            .filter(|post| {
                let blocked = inner.blocks.contains_key(&(post.author_id, viewer_id))
                    || inner.blocks.contains_key(&(viewer_id, post.author_id));
                if blocked {
                    return false;
                }
                let Some(author) = inner.users.get(&post.author_id) else {
                    return false;
                };
                !author.is_private
                    || post.author_id == viewer_id
                    || inner.follows.contains_key(&(viewer_id, post.author_id))
            })
            .map(|post| inner.post_for_read(post))
            .collect();
        Ok(keyset_page(posts, cursor, limit, |post| {
            (post.created_at, post.id)
        }))
    }
}

#[async_trait]
impl LikeStore for MemoryStore {
    async fn insert(&self, post_id: Uuid, user_id: Uuid) -> Result<bool> {
        let mut inner = self.write();
        if inner.likes.contains_key(&(post_id, user_id)) {
            return Ok(false);
        }
        let like = Like {
            post_id,
            user_id,
            created_at: inner.next_timestamp(),
        };
        inner.likes.insert((post_id, user_id), like);
        Ok(true)
    }

    async fn delete(&self, post_id: Uuid, user_id: Uuid) -> Result<bool> {
        Ok(self.write().likes.remove(&(post_id, user_id)).is_some())
    }

    async fn liked_by(&self, user_id: Uuid, post_ids: &[Uuid]) -> Result<Vec<Uuid>> {
        let inner = self.read();
        Ok(post_ids
            .iter()
            .copied()
            .filter(|post_id| inner.likes.contains_key(&(*post_id, user_id)))
            .collect())
    }

    async fn count_for(&self, post_ids: &[Uuid]) -> Result<HashMap<Uuid, i64>> {
        let inner = self.read();
        let mut counts = HashMap::new();
        for like in inner.likes.values() {
            if post_ids.contains(&like.post_id) {
                *counts.entry(like.post_id).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }
}

#[async_trait]
impl CommentStore for MemoryStore {
    async fn insert(&self, post_id: Uuid, author_id: Uuid, body: String) -> Result<Comment> {
        let mut inner = self.write();
        let comment = Comment {
            id: Uuid::new_v4(),
            post_id,
            author_id,
            author_username: None,
            body,
            created_at: inner.next_timestamp(),
        };
        inner.comments.insert(comment.id, comment.clone());
        Ok(inner.comment_for_read(&comment))
    }

    async fn get(&self, id: Uuid) -> Result<Option<Comment>> {
        let inner = self.read();
        Ok(inner
            .comments
            .get(&id)
            .map(|comment| inner.comment_for_read(comment)))
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        Ok(self.write().comments.remove(&id).is_some())
    }

    async fn list_for_post(
        &self,
        post_id: Uuid,
        cursor: Option<Cursor>,
        limit: i64,
    ) -> Result<Vec<Comment>> {
        let inner = self.read();
        let comments: Vec<Comment> = inner
            .comments
            .values()
            .filter(|comment| comment.post_id == post_id)
            .map(|comment| inner.comment_for_read(comment))
            .collect();
        Ok(keyset_page(comments, cursor, limit, |comment| {
            (comment.created_at, comment.id)
        }))
    }

    async fn count_for(&self, post_ids: &[Uuid]) -> Result<HashMap<Uuid, i64>> {
        let inner = self.read();
        let mut counts = HashMap::new();
        for comment in inner.comments.values() {
            if post_ids.contains(&comment.post_id) {
                *counts.entry(comment.post_id).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }
}
