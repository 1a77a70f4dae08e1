use uuid::Uuid;

use crate::app::visibility::VisibilityResolver;
use crate::domain::social_graph::{FollowRequest, RequestStatus};
use crate::error::{Error, Result};
use crate::store::{
    BlockStore, Cursor, FollowRequestStore, FollowStore, RequestEdge, Stores, UserEdge, UserStore,
};

#[derive(Clone)]
pub struct SocialService {
    stores: Stores,
}

/// What a follow attempt produced: a live edge, or a pending request when
/// the target account is private.
#[derive(Debug)]
pub enum FollowOutcome {
    Followed,
    Requested(FollowRequest),
}

impl SocialService {
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }

    pub async fn follow_user(&self, viewer_id: Uuid, target_id: Uuid) -> Result<FollowOutcome> {
        if viewer_id == target_id {
            return Err(Error::validation("cannot follow yourself"));
        }

        let target = self
            .stores
            .users
            .get(target_id)
            .await?
            .ok_or_else(|| Error::not_found("user not found"))?;

        if self
            .stores
            .blocks
            .exists_between(viewer_id, target_id)
            .await?
        {
            return Err(Error::conflict("unable to follow this user"));
        }
        if self.stores.follows.exists(viewer_id, target_id).await? {
            return Err(Error::conflict("already following this user"));
        }
        if self
            .stores
            .requests
            .pending_exists(viewer_id, target_id)
            .await?
        {
            return Err(Error::conflict("follow request already sent"));
        }

        if target.is_private {
            let request = self
                .stores
                .requests
                .insert_pending(viewer_id, target_id)
                .await?;
            Ok(FollowOutcome::Requested(request))
        } else {
            self.stores.follows.insert(viewer_id, target_id).await?;
            Ok(FollowOutcome::Followed)
        }
    }

    pub async fn unfollow_user(&self, viewer_id: Uuid, target_id: Uuid) -> Result<()> {
        if viewer_id == target_id {
            return Err(Error::validation("cannot unfollow yourself"));
        }
        if !self.stores.follows.delete(viewer_id, target_id).await? {
            return Err(Error::not_found("not following this user"));
        }
        Ok(())
    }

    pub async fn block_user(&self, viewer_id: Uuid, target_id: Uuid) -> Result<()> {
        if viewer_id == target_id {
            return Err(Error::validation("cannot block yourself"));
        }
        self.stores
            .users
            .get(target_id)
            .await?
            .ok_or_else(|| Error::not_found("user not found"))?;

        // The insert also purges follow edges in both directions.
        self.stores.blocks.insert(viewer_id, target_id).await?;
        Ok(())
    }

    pub async fn unblock_user(&self, viewer_id: Uuid, target_id: Uuid) -> Result<()> {
        if viewer_id == target_id {
            return Err(Error::validation("cannot unblock yourself"));
        }
        if !self.stores.blocks.delete(viewer_id, target_id).await? {
            return Err(Error::not_found("block record not found"));
        }
        Ok(())
    }

    pub async fn accept_request(
        &self,
        request_id: Uuid,
        viewer_id: Uuid,
    ) -> Result<FollowRequest> {
        let request = self
            .stores
            .requests
            .get(request_id)
            .await?
            .ok_or_else(|| Error::not_found("follow request not found"))?;

        if request.requested_id != viewer_id {
            return Err(Error::forbidden("not allowed to accept this request"));
        }
        if request.status != RequestStatus::Pending {
            return Err(Error::conflict("follow request already settled"));
        }

        // Raced accepts collapse onto the unique (follower, following) pair:
        // a duplicate-edge conflict means the edge is already there.
        match self
            .stores
            .follows
            .insert(request.requester_id, request.requested_id)
            .await
        {
            Ok(_) => {}
            Err(err) if err.is_conflict() => {}
            Err(err) => return Err(err),
        }

        self.stores
            .requests
            .set_status(request_id, RequestStatus::Accepted)
            .await?;

        Ok(FollowRequest {
            status: RequestStatus::Accepted,
            ..request
        })
    }

    pub async fn reject_request(
        &self,
        request_id: Uuid,
        viewer_id: Uuid,
    ) -> Result<FollowRequest> {
        let request = self
            .stores
            .requests
            .get(request_id)
            .await?
            .ok_or_else(|| Error::not_found("follow request not found"))?;

        if request.requested_id != viewer_id {
            return Err(Error::forbidden("not allowed to reject this request"));
        }
        if request.status != RequestStatus::Pending {
            return Err(Error::conflict("follow request already settled"));
        }

        self.stores
            .requests
            .set_status(request_id, RequestStatus::Rejected)
            .await?;

        Ok(FollowRequest {
            status: RequestStatus::Rejected,
            ..request
        })
    }

    /// Either party may withdraw a request, whatever its status.
    pub async fn delete_request(&self, request_id: Uuid, viewer_id: Uuid) -> Result<()> {
        let request = self
            .stores
            .requests
            .get(request_id)
            .await?
            .ok_or_else(|| Error::not_found("follow request not found"))?;

        if request.requester_id != viewer_id && request.requested_id != viewer_id {
            return Err(Error::forbidden("not allowed to delete this request"));
        }

        self.stores.requests.delete(request_id).await?;
        Ok(())
    }

    pub async fn list_followers(
        &self,
        viewer_id: Uuid,
        subject_id: Uuid,
        cursor: Option<Cursor>,
        limit: i64,
    ) -> Result<Vec<UserEdge>> {
        self.ensure_profile_visible(viewer_id, subject_id).await?;
        self.stores
            .follows
            .list_followers(subject_id, cursor, limit)
            .await
    }

    pub async fn list_following(
        &self,
        viewer_id: Uuid,
        subject_id: Uuid,
        cursor: Option<Cursor>,
        limit: i64,
    ) -> Result<Vec<UserEdge>> {
        self.ensure_profile_visible(viewer_id, subject_id).await?;
        self.stores
            .follows
            .list_following(subject_id, cursor, limit)
            .await
    }

    pub async fn list_pending_requests(
        &self,
        viewer_id: Uuid,
        subject_id: Uuid,
        cursor: Option<Cursor>,
        limit: i64,
    ) -> Result<Vec<RequestEdge>> {
        if viewer_id != subject_id {
            return Err(Error::forbidden(
                "cannot view another user's follow requests",
            ));
        }
        self.stores
            .requests
            .list_pending_for(subject_id, cursor, limit)
            .await
    }

    pub async fn list_blocked(
        &self,
        viewer_id: Uuid,
        subject_id: Uuid,
        cursor: Option<Cursor>,
        limit: i64,
    ) -> Result<Vec<UserEdge>> {
        if viewer_id != subject_id {
            return Err(Error::forbidden("cannot view another user's block list"));
        }
        self.stores
            .blocks
            .list_blocked(subject_id, cursor, limit)
            .await
    }

    async fn ensure_profile_visible(&self, viewer_id: Uuid, subject_id: Uuid) -> Result<()> {
        let visibility = VisibilityResolver::new(self.stores.clone())
            .resolve(viewer_id, subject_id)
            .await?;
        if visibility.is_blocked {
            return Err(Error::forbidden("profile unavailable"));
        }
        if visibility.is_private_and_hidden {
            return Err(Error::forbidden("this account is private"));
        }
        Ok(())
    }
}
