use std::collections::HashSet;

use serde::Serialize;
use uuid::Uuid;

use crate::domain::post::Post;
use crate::error::{Error, Result};
use crate::store::{CommentStore, LikeStore, PostStore, Stores};

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Clone)]
pub struct FeedService {
    stores: Stores,
}

/// A feed entry: the post plus viewer-relative decorations. The decorations
/// never influence which posts are selected.
#[derive(Debug, Clone, Serialize)]
pub struct FeedPost {
    #[serde(flatten)]
    pub post: Post,
    pub owned: bool,
    pub is_liked: bool,
    pub like_count: i64,
    pub comment_count: i64,
}

#[derive(Debug, Serialize)]
pub struct FeedPage {
    pub posts: Vec<FeedPost>,
    pub next_cursor: Option<Uuid>,
}

impl FeedService {
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }

    /// The access-filtered home feed, newest first. The cursor is the id of
    /// the last post of the previous page; it resolves to a keyset point so
    /// pagination stays deterministic when timestamps collide.
    pub async fn home_feed(
        &self,
        viewer_id: Uuid,
        cursor: Option<Uuid>,
        take: i64,
    ) -> Result<FeedPage> {
        if !(1..=MAX_PAGE_SIZE).contains(&take) {
            return Err(Error::validation("take must be between 1 and 100"));
        }

        let start = match cursor {
            Some(post_id) => {
                let post = self
                    .stores
                    .posts
                    .get(post_id)
                    .await?
                    .ok_or_else(|| Error::validation("unknown feed cursor"))?;
                Some((post.created_at, post.id))
            }
            None => None,
        };

        let mut posts = self
            .stores
            .posts
            .list_feed(viewer_id, start, take + 1)
            .await?;

        // A short page is the end-of-feed signal.
        let next_cursor = if posts.len() > take as usize {
            posts.pop();
            posts.last().map(|post| post.id)
        } else {
            None
        };

        let post_ids: Vec<Uuid> = posts.iter().map(|post| post.id).collect();
        let liked: HashSet<Uuid> = self
            .stores
            .likes
            .liked_by(viewer_id, &post_ids)
            .await?
            .into_iter()
            .collect();
        let like_counts = self.stores.likes.count_for(&post_ids).await?;
        let comment_counts = self.stores.comments.count_for(&post_ids).await?;

        let posts = posts
            .into_iter()
            .map(|post| FeedPost {
                owned: post.author_id == viewer_id,
                is_liked: liked.contains(&post.id),
                like_count: like_counts.get(&post.id).copied().unwrap_or(0),
                comment_count: comment_counts.get(&post.id).copied().unwrap_or(0),
                post,
            })
            .collect();

        Ok(FeedPage { posts, next_cursor })
    }
}
