use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::domain::engagement::Comment;
use crate::domain::post::{Post, PostStatus};
use crate::domain::social_graph::{Block, Follow, FollowRequest, RequestStatus};
use crate::domain::user::User;
use crate::error::{Error, Result};
use crate::store::{
    BlockStore, CommentStore, Cursor, FollowRequestStore, FollowStore, LikeStore, NewPost,
    NewUser, PostStore, ProfilePatch, RequestEdge, UserEdge, UserStore,
};

const USER_COLUMNS: &str = "id, username, email, password_hash, display_name, bio, avatar_url, \
                            is_private, created_at";

// Qualified variant for joins where the edge table also carries created_at.
const JOINED_USER_COLUMNS: &str = "u.id, u.username, u.email, u.password_hash, u.display_name, \
                                   u.bio, u.avatar_url, u.is_private, u.created_at";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(config: &AppConfig) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .acquire_timeout(Duration::from_secs(config.db_connect_timeout_seconds))
            .idle_timeout(Duration::from_secs(config.db_idle_timeout_seconds))
            .max_lifetime(Duration::from_secs(config.db_max_lifetime_seconds))
            .connect(&config.database_url)
            .await?;
        Ok(Self { pool })
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn ping(&self) -> anyhow::Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

fn conflict_on_unique(err: sqlx::Error, message: &str) -> Error {
    if is_unique_violation(&err) {
        Error::conflict(message)
    } else {
        Error::Store(err)
    }
}

fn user_from_row(row: &PgRow) -> User {
    User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        display_name: row.get("display_name"),
        bio: row.get("bio"),
        avatar_url: row.get("avatar_url"),
        is_private: row.get("is_private"),
        created_at: row.get("created_at"),
    }
}

fn post_from_row(row: &PgRow) -> Result<Post> {
    let status: String = row.get("status");
    let status = PostStatus::from_db(&status)
        .ok_or_else(|| Error::Internal(anyhow::anyhow!("unknown post status: {}", status)))?;

    Ok(Post {
        id: row.get("id"),
        author_id: row.get("author_id"),
        author_username: row.try_get("author_username").ok(),
        description: row.get("description"),
        images: row.get("images"),
        status,
        created_at: row.get("created_at"),
    })
}

fn request_from_row(row: &PgRow) -> Result<FollowRequest> {
    let status: String = row.get("status");
    let status = RequestStatus::from_db(&status)
        .ok_or_else(|| Error::Internal(anyhow::anyhow!("unknown request status: {}", status)))?;

    Ok(FollowRequest {
        id: row.get("id"),
        requester_id: row.get("requester_id"),
        requested_id: row.get("requested_id"),
        status,
        created_at: row.get("created_at"),
    })
}

fn user_edge_from_row(row: &PgRow) -> UserEdge {
    UserEdge {
        user: user_from_row(row),
        connected_at: row.get("connected_at"),
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn insert(&self, user: NewUser) -> Result<User> {
        let row = sqlx::query(&format!(
            "INSERT INTO users (username, email, password_hash, display_name, bio, avatar_url, is_private) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(user.username)
        .bind(user.email)
        .bind(user.password_hash)
        .bind(user.display_name)
        .bind(user.bio)
        .bind(user.avatar_url)
        .bind(user.is_private)
        .fetch_one(self.pool())
        .await
        .map_err(|err| conflict_on_unique(err, "username or email already taken"))?;

        Ok(user_from_row(&row))
    }

    async fn get(&self, id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(self.pool())
            .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    async fn get_by_login(&self, identifier: &str) -> Result<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1 OR email = $1"
        ))
        .bind(identifier)
        .fetch_optional(self.pool())
        .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    async fn update_profile(&self, id: Uuid, patch: ProfilePatch) -> Result<Option<User>> {
        let row = sqlx::query(&format!(
            "UPDATE users \
             SET display_name = COALESCE($2, display_name), \
                 bio = COALESCE($3, bio), \
                 avatar_url = COALESCE($4, avatar_url), \
                 is_private = COALESCE($5, is_private) \
             WHERE id = $1 \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(patch.display_name)
        .bind(patch.bio)
        .bind(patch.avatar_url)
        .bind(patch.is_private)
        .fetch_optional(self.pool())
        .await?;

        Ok(row.as_ref().map(user_from_row))
    }
}

#[async_trait]
impl FollowStore for PgStore {
    async fn insert(&self, follower_id: Uuid, following_id: Uuid) -> Result<Follow> {
        let row = sqlx::query(
            "INSERT INTO follows (follower_id, following_id) VALUES ($1, $2) \
             RETURNING follower_id, following_id, created_at",
        )
        .bind(follower_id)
        .bind(following_id)
        .fetch_one(self.pool())
        .await
        .map_err(|err| conflict_on_unique(err, "already following this user"))?;

        Ok(Follow {
            follower_id: row.get("follower_id"),
            following_id: row.get("following_id"),
            created_at: row.get("created_at"),
        })
    }

    async fn delete(&self, follower_id: Uuid, following_id: Uuid) -> Result<bool> {
        let result =
            sqlx::query("DELETE FROM follows WHERE follower_id = $1 AND following_id = $2")
                .bind(follower_id)
                .bind(following_id)
                .execute(self.pool())
                .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn exists(&self, follower_id: Uuid, following_id: Uuid) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM follows WHERE follower_id = $1 AND following_id = $2)",
        )
        .bind(follower_id)
        .bind(following_id)
        .fetch_one(self.pool())
        .await?;

        Ok(exists)
    }

    async fn count_followers(&self, user_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM follows WHERE following_id = $1")
            .bind(user_id)
            .fetch_one(self.pool())
            .await?;

        Ok(count)
    }

    async fn count_following(&self, user_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM follows WHERE follower_id = $1")
            .bind(user_id)
            .fetch_one(self.pool())
            .await?;

        Ok(count)
    }

    async fn list_followers(
        &self,
        user_id: Uuid,
        cursor: Option<Cursor>,
        limit: i64,
    ) -> Result<Vec<UserEdge>> {
        let base = format!(
            "SELECT {JOINED_USER_COLUMNS}, f.created_at AS connected_at \
             FROM follows f JOIN users u ON u.id = f.follower_id \
             WHERE f.following_id = $1"
        );
        let rows = match cursor {
            Some((created_at, id)) => {
                sqlx::query(&format!(
                    "{base} AND (f.created_at < $2 OR (f.created_at = $2 AND f.follower_id < $3)) \
                     ORDER BY f.created_at DESC, f.follower_id DESC LIMIT $4"
                ))
                .bind(user_id)
                .bind(created_at)
                .bind(id)
                .bind(limit)
                .fetch_all(self.pool())
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "{base} ORDER BY f.created_at DESC, f.follower_id DESC LIMIT $2"
                ))
                .bind(user_id)
                .bind(limit)
                .fetch_all(self.pool())
                .await?
            }
        };

        Ok(rows.iter().map(user_edge_from_row).collect())
    }

    async fn list_following(
        &self,
        user_id: Uuid,
        cursor: Option<Cursor>,
        limit: i64,
    ) -> Result<Vec<UserEdge>> {
        let base = format!(
            "SELECT {JOINED_USER_COLUMNS}, f.created_at AS connected_at \
             FROM follows f JOIN users u ON u.id = f.following_id \
             WHERE f.follower_id = $1"
        );
        let rows = match cursor {
            Some((created_at, id)) => {
                sqlx::query(&format!(
                    "{base} AND (f.created_at < $2 OR (f.created_at = $2 AND f.following_id < $3)) \
                     ORDER BY f.created_at DESC, f.following_id DESC LIMIT $4"
                ))
                .bind(user_id)
                .bind(created_at)
                .bind(id)
                .bind(limit)
                .fetch_all(self.pool())
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "{base} ORDER BY f.created_at DESC, f.following_id DESC LIMIT $2"
                ))
                .bind(user_id)
                .bind(limit)
                .fetch_all(self.pool())
                .await?
            }
        };

        Ok(rows.iter().map(user_edge_from_row).collect())
    }
}

#[async_trait]
impl BlockStore for PgStore {
    async fn insert(&self, blocker_id: Uuid, blocked_id: Uuid) -> Result<Block> {
        // Block and follow purge commit together; no window where a follow
        // edge coexists with the block.
        let mut tx = self.pool().begin().await?;

        let row = sqlx::query(
            "INSERT INTO blocks (blocker_id, blocked_id) VALUES ($1, $2) \
             RETURNING blocker_id, blocked_id, created_at",
        )
        .bind(blocker_id)
        .bind(blocked_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|err| conflict_on_unique(err, "user is already blocked"))?;

        sqlx::query(
            "DELETE FROM follows \
             WHERE (follower_id = $1 AND following_id = $2) \
                OR (follower_id = $2 AND following_id = $1)",
        )
        .bind(blocker_id)
        .bind(blocked_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Block {
            blocker_id: row.get("blocker_id"),
            blocked_id: row.get("blocked_id"),
            created_at: row.get("created_at"),
        })
    }

    async fn delete(&self, blocker_id: Uuid, blocked_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM blocks WHERE blocker_id = $1 AND blocked_id = $2")
            .bind(blocker_id)
            .bind(blocked_id)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn exists(&self, blocker_id: Uuid, blocked_id: Uuid) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM blocks WHERE blocker_id = $1 AND blocked_id = $2)",
        )
        .bind(blocker_id)
        .bind(blocked_id)
        .fetch_one(self.pool())
        .await?;

        Ok(exists)
    }

    async fn exists_between(&self, a: Uuid, b: Uuid) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS ( \
                 SELECT 1 FROM blocks \
                 WHERE (blocker_id = $1 AND blocked_id = $2) \
                    OR (blocker_id = $2 AND blocked_id = $1) \
             )",
        )
        .bind(a)
        .bind(b)
        .fetch_one(self.pool())
        .await?;

        Ok(exists)
    }

    async fn list_blocked(
        &self,
        blocker_id: Uuid,
        cursor: Option<Cursor>,
        limit: i64,
    ) -> Result<Vec<UserEdge>> {
        let base = format!(
            "SELECT {JOINED_USER_COLUMNS}, b.created_at AS connected_at \
             FROM blocks b JOIN users u ON u.id = b.blocked_id \
             WHERE b.blocker_id = $1"
        );
        let rows = match cursor {
            Some((created_at, id)) => {
                sqlx::query(&format!(
                    "{base} AND (b.created_at < $2 OR (b.created_at = $2 AND b.blocked_id < $3)) \
                     ORDER BY b.created_at DESC, b.blocked_id DESC LIMIT $4"
                ))
                .bind(blocker_id)
                .bind(created_at)
                .bind(id)
                .bind(limit)
                .fetch_all(self.pool())
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "{base} ORDER BY b.created_at DESC, b.blocked_id DESC LIMIT $2"
                ))
                .bind(blocker_id)
                .bind(limit)
                .fetch_all(self.pool())
                .await?
            }
        };

        Ok(rows.iter().map(user_edge_from_row).collect())
    }
}

#[async_trait]
impl FollowRequestStore for PgStore {
    async fn insert_pending(
        &self,
        requester_id: Uuid,
        requested_id: Uuid,
    ) -> Result<FollowRequest> {
        let row = sqlx::query(
            "INSERT INTO follow_requests (requester_id, requested_id) VALUES ($1, $2) \
             RETURNING id, requester_id, requested_id, status, created_at",
        )
        .bind(requester_id)
        .bind(requested_id)
        .fetch_one(self.pool())
        .await
        .map_err(|err| conflict_on_unique(err, "follow request already sent"))?;

        request_from_row(&row)
    }

    async fn get(&self, id: Uuid) -> Result<Option<FollowRequest>> {
        let row = sqlx::query(
            "SELECT id, requester_id, requested_id, status, created_at \
             FROM follow_requests WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await?;

        row.as_ref().map(request_from_row).transpose()
    }

    async fn pending_exists(&self, requester_id: Uuid, requested_id: Uuid) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS ( \
                 SELECT 1 FROM follow_requests \
                 WHERE requester_id = $1 AND requested_id = $2 AND status = 'pending' \
             )",
        )
        .bind(requester_id)
        .bind(requested_id)
        .fetch_one(self.pool())
        .await?;

        Ok(exists)
    }

    async fn set_status(&self, id: Uuid, status: RequestStatus) -> Result<bool> {
        let result = sqlx::query("UPDATE follow_requests SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status.as_db())
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM follow_requests WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_pending_for(
        &self,
        requested_id: Uuid,
        cursor: Option<Cursor>,
        limit: i64,
    ) -> Result<Vec<RequestEdge>> {
        let base = format!(
            "SELECT r.id AS request_id, r.requester_id, r.requested_id, r.status, \
                    r.created_at AS requested_at, {JOINED_USER_COLUMNS} \
             FROM follow_requests r JOIN users u ON u.id = r.requester_id \
             WHERE r.requested_id = $1 AND r.status = 'pending'"
        );
        let rows = match cursor {
            Some((created_at, id)) => {
                sqlx::query(&format!(
                    "{base} AND (r.created_at < $2 OR (r.created_at = $2 AND r.id < $3)) \
                     ORDER BY r.created_at DESC, r.id DESC LIMIT $4"
                ))
                .bind(requested_id)
                .bind(created_at)
                .bind(id)
                .bind(limit)
                .fetch_all(self.pool())
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "{base} ORDER BY r.created_at DESC, r.id DESC LIMIT $2"
                ))
                .bind(requested_id)
                .bind(limit)
                .fetch_all(self.pool())
                .await?
            }
        };

        let mut edges = Vec::with_capacity(rows.len());
        for row in &rows {
            let status: String = row.get("status");
            let status = RequestStatus::from_db(&status).ok_or_else(|| {
                Error::Internal(anyhow::anyhow!("unknown request status: {}", status))
            })?;
            edges.push(RequestEdge {
                request: FollowRequest {
                    id: row.get("request_id"),
                    requester_id: row.get("requester_id"),
                    requested_id: row.get("requested_id"),
                    status,
                    created_at: row.get("requested_at"),
                },
                requester: user_from_row(row),
            });
        }

        Ok(edges)
    }
}

#[async_trait]
impl PostStore for PgStore {
    async fn insert(&self, post: NewPost) -> Result<Post> {
        let row = sqlx::query(
            "WITH inserted_post AS ( \
                 INSERT INTO posts (author_id, description, images) \
                 VALUES ($1, $2, $3) \
                 RETURNING id, author_id, description, images, status, created_at \
             ) \
             SELECT p.*, u.username AS author_username \
             FROM inserted_post p JOIN users u ON u.id = p.author_id",
        )
        .bind(post.author_id)
        .bind(post.description)
        .bind(post.images)
        .fetch_one(self.pool())
        .await?;

        post_from_row(&row)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Post>> {
        let row = sqlx::query(
            "SELECT p.id, p.author_id, u.username AS author_username, p.description, \
                    p.images, p.status, p.created_at \
             FROM posts p JOIN users u ON u.id = p.author_id \
             WHERE p.id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await?;

        row.as_ref().map(post_from_row).transpose()
    }

    async fn update_description(&self, id: Uuid, description: String) -> Result<bool> {
        let result = sqlx::query("UPDATE posts SET description = $2 WHERE id = $1")
            .bind(id)
            .bind(description)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_deleted(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("UPDATE posts SET status = 'deleted' WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn count_by_author(&self, author_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM posts WHERE author_id = $1 AND status = 'active'",
        )
        .bind(author_id)
        .fetch_one(self.pool())
        .await?;

        Ok(count)
    }

    async fn list_by_author(
        &self,
        author_id: Uuid,
        cursor: Option<Cursor>,
        limit: i64,
    ) -> Result<Vec<Post>> {
        let base = "SELECT p.id, p.author_id, u.username AS author_username, p.description, \
                           p.images, p.status, p.created_at \
                    FROM posts p JOIN users u ON u.id = p.author_id \
                    WHERE p.author_id = $1 AND p.status = 'active'";
        let rows = match cursor {
            Some((created_at, id)) => {
                sqlx::query(&format!(
                    "{base} AND (p.created_at < $2 OR (p.created_at = $2 AND p.id < $3)) \
                     ORDER BY p.created_at DESC, p.id DESC LIMIT $4"
                ))
                .bind(author_id)
                .bind(created_at)
                .bind(id)
                .bind(limit)
                .fetch_all(self.pool())
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "{base} ORDER BY p.created_at DESC, p.id DESC LIMIT $2"
                ))
                .bind(author_id)
                .bind(limit)
                .fetch_all(self.pool())
                .await?
            }
        };

        rows.iter().map(post_from_row).collect()
    }

    async fn list_feed(
        &self,
        viewer_id: Uuid,
        cursor: Option<Cursor>,
        limit: i64,
    ) -> Result<Vec<Post>> {
        let base = "SELECT p.id, p.author_id, u.username AS author_username, p.description, \
                           p.images, p.status, p.created_at \
                    FROM posts p JOIN users u ON u.id = p.author_id \
                    WHERE p.status = 'active' \
                      AND NOT EXISTS ( \
                          SELECT 1 FROM blocks \
                          WHERE (blocker_id = p.author_id AND blocked_id = $1) \
                             OR (blocker_id = $1 AND blocked_id = p.author_id) \
                      ) \
                      AND (u.is_private = FALSE \
                           OR p.author_id = $1 \
                           OR EXISTS ( \
                               SELECT 1 FROM follows \
                               WHERE follower_id = $1 AND following_id = p.author_id \
                           ))";
        let rows = match cursor {
            Some((created_at, id)) => {
                sqlx::query(&format!(
                    "{base} AND (p.created_at < $2 OR (p.created_at = $2 AND p.id < $3)) \
                     ORDER BY p.created_at DESC, p.id DESC LIMIT $4"
                ))
                .bind(viewer_id)
                .bind(created_at)
                .bind(id)
                .bind(limit)
                .fetch_all(self.pool())
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "{base} ORDER BY p.created_at DESC, p.id DESC LIMIT $2"
                ))
                .bind(viewer_id)
                .bind(limit)
                .fetch_all(self.pool())
                .await?
            }
        };

        rows.iter().map(post_from_row).collect()
    }
}

#[async_trait]
impl LikeStore for PgStore {
    async fn insert(&self, post_id: Uuid, user_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO likes (post_id, user_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(post_id)
        .bind(user_id)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, post_id: Uuid, user_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM likes WHERE post_id = $1 AND user_id = $2")
            .bind(post_id)
            .bind(user_id)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn liked_by(&self, user_id: Uuid, post_ids: &[Uuid]) -> Result<Vec<Uuid>> {
        let rows = sqlx::query_scalar(
            "SELECT post_id FROM likes WHERE user_id = $1 AND post_id = ANY($2)",
        )
        .bind(user_id)
        .bind(post_ids)
        .fetch_all(self.pool())
        .await?;

        Ok(rows)
    }

    async fn count_for(&self, post_ids: &[Uuid]) -> Result<HashMap<Uuid, i64>> {
        let rows = sqlx::query(
            "SELECT post_id, COUNT(*) AS count FROM likes \
             WHERE post_id = ANY($1) GROUP BY post_id",
        )
        .bind(post_ids)
        .fetch_all(self.pool())
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| (row.get("post_id"), row.get("count")))
            .collect())
    }
}

#[async_trait]
impl CommentStore for PgStore {
    async fn insert(&self, post_id: Uuid, author_id: Uuid, body: String) -> Result<Comment> {
        let row = sqlx::query(
            "WITH inserted_comment AS ( \
                 INSERT INTO comments (post_id, author_id, body) \
                 VALUES ($1, $2, $3) \
                 RETURNING id, post_id, author_id, body, created_at \
             ) \
             SELECT c.*, u.username AS author_username \
             FROM inserted_comment c JOIN users u ON u.id = c.author_id",
        )
        .bind(post_id)
        .bind(author_id)
        .bind(body)
        .fetch_one(self.pool())
        .await?;

        Ok(Comment {
            id: row.get("id"),
            post_id: row.get("post_id"),
            author_id: row.get("author_id"),
            author_username: row.try_get("author_username").ok(),
            body: row.get("body"),
            created_at: row.get("created_at"),
        })
    }

    async fn get(&self, id: Uuid) -> Result<Option<Comment>> {
        let row = sqlx::query(
            "SELECT c.id, c.post_id, c.author_id, u.username AS author_username, \
                    c.body, c.created_at \
             FROM comments c JOIN users u ON u.id = c.author_id \
             WHERE c.id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(|row| Comment {
            id: row.get("id"),
            post_id: row.get("post_id"),
            author_id: row.get("author_id"),
            author_username: row.try_get("author_username").ok(),
            body: row.get("body"),
            created_at: row.get("created_at"),
        }))
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_for_post(
        &self,
        post_id: Uuid,
        cursor: Option<Cursor>,
        limit: i64,
    ) -> Result<Vec<Comment>> {
        let base = "SELECT c.id, c.post_id, c.author_id, u.username AS author_username, \
                           c.body, c.created_at \
                    FROM comments c JOIN users u ON u.id = c.author_id \
                    WHERE c.post_id = $1";
        let rows = match cursor {
            Some((created_at, id)) => {
                sqlx::query(&format!(
                    "{base} AND (c.created_at < $2 OR (c.created_at = $2 AND c.id < $3)) \
                     ORDER BY c.created_at DESC, c.id DESC LIMIT $4"
                ))
                .bind(post_id)
                .bind(created_at)
                .bind(id)
                .bind(limit)
                .fetch_all(self.pool())
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "{base} ORDER BY c.created_at DESC, c.id DESC LIMIT $2"
                ))
                .bind(post_id)
                .bind(limit)
                .fetch_all(self.pool())
                .await?
            }
        };

        Ok(rows
            .into_iter()
            .map(|row| Comment {
                id: row.get("id"),
                post_id: row.get("post_id"),
                author_id: row.get("author_id"),
                author_username: row.try_get("author_username").ok(),
                body: row.get("body"),
                created_at: row.get("created_at"),
            })
            .collect())
    }

    async fn count_for(&self, post_ids: &[Uuid]) -> Result<HashMap<Uuid, i64>> {
        let rows = sqlx::query(
            "SELECT post_id, COUNT(*) AS count FROM comments \
             WHERE post_id = ANY($1) GROUP BY post_id",
        )
        .bind(post_ids)
        .fetch_all(self.pool())
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| (row.get("post_id"), row.get("count")))
            .collect())
    }
}
