use serde::Serialize;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::store::{BlockStore, FollowStore, Stores, UserStore};

/// Relationship predicates between a viewer and a subject, computed fresh on
/// every call. Used by every profile and feed decision.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Visibility {
    /// The viewer follows the subject.
    pub is_following: bool,
    /// The subject follows the viewer.
    pub is_follower: bool,
    /// A block exists in either direction.
    pub is_blocked: bool,
    /// The subject is private and the viewer is neither the subject nor an
    /// accepted follower.
    pub is_private_and_hidden: bool,
}

impl Visibility {
    /// Self-lookup: all predicates false, full visibility.
    pub const SELF: Self = Self {
        is_following: false,
        is_follower: false,
        is_blocked: false,
        is_private_and_hidden: false,
    };
}

#[derive(Clone)]
pub struct VisibilityResolver {
    stores: Stores,
}

impl VisibilityResolver {
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }

    /// Pure read of the relationship state between two users. No side
    /// effects, no caching; reflects the store at call time.
    pub async fn resolve(&self, viewer_id: Uuid, subject_id: Uuid) -> Result<Visibility> {
        let subject = self
            .stores
            .users
            .get(subject_id)
            .await?
            .ok_or_else(|| Error::not_found("user not found"))?;

        if viewer_id == subject_id {
            return Ok(Visibility::SELF);
        }

        let is_following = self.stores.follows.exists(viewer_id, subject_id).await?;
        let is_follower = self.stores.follows.exists(subject_id, viewer_id).await?;
        let is_blocked = self
            .stores
            .blocks
            .exists_between(viewer_id, subject_id)
            .await?;

        Ok(Visibility {
            is_following,
            is_follower,
            is_blocked,
            is_private_and_hidden: subject.is_private && !is_following,
        })
    }
}
