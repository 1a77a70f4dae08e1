use uuid::Uuid;

use crate::domain::engagement::Comment;
use crate::domain::post::PostStatus;
use crate::error::{Error, Result};
use crate::store::{CommentStore, Cursor, LikeStore, PostStore, Stores};

#[derive(Clone)]
pub struct EngagementService {
    stores: Stores,
}

impl EngagementService {
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }

    /// Idempotent: returns false when the viewer had already liked the post.
    pub async fn like_post(&self, viewer_id: Uuid, post_id: Uuid) -> Result<bool> {
        self.ensure_active_post(post_id).await?;
        self.stores.likes.insert(post_id, viewer_id).await
    }

    pub async fn unlike_post(&self, viewer_id: Uuid, post_id: Uuid) -> Result<bool> {
        self.ensure_active_post(post_id).await?;
        self.stores.likes.delete(post_id, viewer_id).await
    }

    pub async fn comment_post(
        &self,
        viewer_id: Uuid,
        post_id: Uuid,
        body: String,
    ) -> Result<Comment> {
        if body.trim().is_empty() {
            return Err(Error::validation("comment body is required"));
        }
        self.ensure_active_post(post_id).await?;
        self.stores.comments.insert(post_id, viewer_id, body).await
    }

    pub async fn list_comments(
        &self,
        post_id: Uuid,
        cursor: Option<Cursor>,
        limit: i64,
    ) -> Result<Vec<Comment>> {
        self.ensure_active_post(post_id).await?;
        self.stores
            .comments
            .list_for_post(post_id, cursor, limit)
            .await
    }

    /// The comment author or the post author may remove a comment.
    pub async fn delete_comment(
        &self,
        viewer_id: Uuid,
        post_id: Uuid,
        comment_id: Uuid,
    ) -> Result<()> {
        let comment = self
            .stores
            .comments
            .get(comment_id)
            .await?
            .ok_or_else(|| Error::not_found("comment not found"))?;
        if comment.post_id != post_id {
            return Err(Error::not_found("comment not found"));
        }

        if comment.author_id != viewer_id {
            let post = self
                .stores
                .posts
                .get(comment.post_id)
                .await?
                .ok_or_else(|| Error::not_found("post not found"))?;
            if post.author_id != viewer_id {
                return Err(Error::forbidden("cannot delete this comment"));
            }
        }

        self.stores.comments.delete(comment_id).await?;
        Ok(())
    }

    async fn ensure_active_post(&self, post_id: Uuid) -> Result<()> {
        let post = self
            .stores
            .posts
            .get(post_id)
            .await?
            .ok_or_else(|| Error::not_found("post not found"))?;
        if post.status != PostStatus::Active {
            return Err(Error::not_found("post not found"));
        }
        Ok(())
    }
}
