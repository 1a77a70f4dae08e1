use uuid::Uuid;

use crate::app::visibility::VisibilityResolver;
use crate::domain::post::{Post, PostStatus};
use crate::error::{Error, Result};
use crate::store::{BlockStore, Cursor, FollowStore, NewPost, PostStore, Stores, UserStore};

#[derive(Clone)]
pub struct PostService {
    stores: Stores,
}

impl PostService {
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }

    pub async fn create_post(
        &self,
        author_id: Uuid,
        description: String,
        images: Vec<String>,
    ) -> Result<Post> {
        if images.is_empty() {
            return Err(Error::validation("post needs at least one image"));
        }
        self.stores
            .posts
            .insert(NewPost {
                author_id,
                description,
                images,
            })
            .await
    }

    /// Single-post lookup. A post hidden from the viewer reads the same as a
    /// missing one.
    pub async fn get_post(&self, viewer_id: Uuid, post_id: Uuid) -> Result<Post> {
        let post = self.active_post(post_id).await?;
        if !self.visible_to(viewer_id, &post).await? {
            return Err(Error::not_found("post not found"));
        }
        Ok(post)
    }

    pub async fn update_description(
        &self,
        viewer_id: Uuid,
        post_id: Uuid,
        description: String,
    ) -> Result<Post> {
        let post = self.active_post(post_id).await?;
        if post.author_id != viewer_id {
            return Err(Error::forbidden("cannot update this post"));
        }
        self.stores
            .posts
            .update_description(post_id, description.clone())
            .await?;
        Ok(Post {
            description,
            ..post
        })
    }

    /// Soft delete: the row stays, the post disappears from every listing.
    pub async fn delete_post(&self, viewer_id: Uuid, post_id: Uuid) -> Result<()> {
        let post = self.active_post(post_id).await?;
        if post.author_id != viewer_id {
            return Err(Error::forbidden("cannot delete this post"));
        }
        self.stores.posts.mark_deleted(post_id).await?;
        Ok(())
    }

    /// One author's active posts, gated once at the author level: every post
    /// in the listing shares the same visibility outcome.
    pub async fn list_user_posts(
        &self,
        viewer_id: Uuid,
        author_id: Uuid,
        cursor: Option<Cursor>,
        limit: i64,
    ) -> Result<Vec<Post>> {
        let visibility = VisibilityResolver::new(self.stores.clone())
            .resolve(viewer_id, author_id)
            .await?;
        if visibility.is_blocked {
            return Err(Error::forbidden("profile unavailable"));
        }
        if visibility.is_private_and_hidden {
            return Err(Error::forbidden("this account is private"));
        }
        self.stores
            .posts
            .list_by_author(author_id, cursor, limit)
            .await
    }

    async fn active_post(&self, post_id: Uuid) -> Result<Post> {
        let post = self
            .stores
            .posts
            .get(post_id)
            .await?
            .ok_or_else(|| Error::not_found("post not found"))?;
        if post.status != PostStatus::Active {
            return Err(Error::not_found("post not found"));
        }
        Ok(post)
    }

    async fn visible_to(&self, viewer_id: Uuid, post: &Post) -> Result<bool> {
        if post.author_id == viewer_id {
            return Ok(true);
        }
        if self
            .stores
            .blocks
            .exists_between(viewer_id, post.author_id)
            .await?
        {
            return Ok(false);
        }
        let author = self
            .stores
            .users
            .get(post.author_id)
            .await?
            .ok_or_else(|| Error::not_found("post not found"))?;
        if !author.is_private {
            return Ok(true);
        }
        self.stores.follows.exists(viewer_id, post.author_id).await
    }
}
