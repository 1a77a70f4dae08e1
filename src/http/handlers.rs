use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::app::auth::{AuthService, TokenService};
use crate::app::engagement::EngagementService;
use crate::app::feed::{FeedPage, FeedService, DEFAULT_PAGE_SIZE};
use crate::app::posts::PostService;
use crate::app::social::{FollowOutcome, SocialService};
use crate::app::users::{ProfileView, Signup, UserService};
use crate::app::visibility::{Visibility, VisibilityResolver};
use crate::domain::engagement::Comment;
use crate::domain::post::Post;
use crate::domain::social_graph::FollowRequest;
use crate::domain::user::{PublicUser, User};
use crate::error::Error;
use crate::http::AuthUser;
use crate::store::{Cursor, ProfilePatch};
use crate::AppState;

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
}

#[derive(Deserialize)]
pub struct PaginationQuery {
    pub limit: Option<i64>,
    pub cursor: Option<String>,
}

#[derive(Serialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

fn parse_cursor(cursor: Option<String>) -> Result<Option<Cursor>, Error> {
    let Some(cursor) = cursor else {
        return Ok(None);
    };

    let mut parts = cursor.splitn(2, '/');
    let timestamp = parts
        .next()
        .ok_or_else(|| Error::validation("invalid cursor"))?;
    let id = parts
        .next()
        .ok_or_else(|| Error::validation("invalid cursor"))?;

    let timestamp = OffsetDateTime::parse(timestamp, &Rfc3339)
        .map_err(|_| Error::validation("invalid cursor"))?;
    let id = Uuid::parse_str(id).map_err(|_| Error::validation("invalid cursor"))?;

    Ok(Some((timestamp, id)))
}

fn encode_cursor(cursor: Option<Cursor>) -> Option<String> {
    let (timestamp, id) = cursor?;
    let timestamp = timestamp.format(&Rfc3339).ok()?;
    Some(format!("{}/{}", timestamp, id))
}

fn page_limit(limit: Option<i64>) -> Result<i64, Error> {
    let limit = limit.unwrap_or(30);
    if !(1..=200).contains(&limit) {
        return Err(Error::validation("limit must be between 1 and 200"));
    }
    Ok(limit)
}

pub(crate) async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct LoginRequest {
    pub identifier: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct AuthTokenResponse {
    pub access_token: String,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
    pub user: PublicUser,
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthTokenResponse>, Error> {
    const MAX_PASSWORD_LEN: usize = 128;

    if payload.identifier.trim().is_empty() || payload.password.trim().is_empty() {
        return Err(Error::validation("identifier and password are required"));
    }
    if payload.password.len() > MAX_PASSWORD_LEN {
        return Err(Error::validation("password must be at most 128 characters"));
    }

    let service = AuthService::new(
        state.stores.clone(),
        state.hasher.clone(),
        TokenService::new(state.token_key, state.access_ttl_minutes),
    );

    match service.login(&payload.identifier, &payload.password).await? {
        Some((user, token)) => Ok(Json(AuthTokenResponse {
            access_token: token.access_token,
            expires_at: token.expires_at,
            user: user.into(),
        })),
        None => Err(Error::unauthorized("invalid credentials")),
    }
}

pub async fn get_current_user(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<User>, Error> {
    let service = UserService::new(state.stores.clone(), state.hasher.clone());
    let user = service
        .get_user(auth.user_id)
        .await?
        .ok_or_else(|| Error::not_found("user not found"))?;
    Ok(Json(user))
}

// ---------------------------------------------------------------------------
// Users & profiles
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub is_private: bool,
}

pub async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<Json<User>, Error> {
    let username = payload.username.trim().to_string();
    if !(3..=30).contains(&username.len()) {
        return Err(Error::validation("username must be 3 to 30 characters"));
    }
    if !payload.email.contains('@') {
        return Err(Error::validation("invalid email address"));
    }
    if !(8..=128).contains(&payload.password.len()) {
        return Err(Error::validation("password must be 8 to 128 characters"));
    }

    let service = UserService::new(state.stores.clone(), state.hasher.clone());
    let user = service
        .create_user(Signup {
            display_name: payload.display_name.unwrap_or_else(|| username.clone()),
            username,
            email: payload.email,
            password: payload.password,
            bio: payload.bio,
            avatar_url: payload.avatar_url,
            is_private: payload.is_private,
        })
        .await?;

    Ok(Json(user))
}

pub async fn get_profile(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<ProfileView>, Error> {
    let service = UserService::new(state.stores.clone(), state.hasher.clone());
    let profile = service.get_profile(auth.user_id, id).await?;
    Ok(Json(profile))
}

#[derive(Deserialize)]
pub struct UpdateProfileRequest {
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub is_private: Option<bool>,
}

pub async fn update_profile(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<User>, Error> {
    let service = UserService::new(state.stores.clone(), state.hasher.clone());
    let user = service
        .update_profile(
            auth.user_id,
            id,
            ProfilePatch {
                display_name: payload.display_name,
                bio: payload.bio,
                avatar_url: payload.avatar_url,
                is_private: payload.is_private,
            },
        )
        .await?;
    Ok(Json(user))
}

// ---------------------------------------------------------------------------
// Social graph
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct FollowResponse {
    pub followed: bool,
    /// Present when the target is private and a request was created instead.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<FollowRequest>,
}

pub async fn follow_user(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<FollowResponse>, Error> {
    let service = SocialService::new(state.stores.clone());
    let response = match service.follow_user(auth.user_id, id).await? {
        FollowOutcome::Followed => FollowResponse {
            followed: true,
            request: None,
        },
        FollowOutcome::Requested(request) => FollowResponse {
            followed: false,
            request: Some(request),
        },
    };
    Ok(Json(response))
}

#[derive(Serialize)]
pub struct UnfollowResponse {
    pub unfollowed: bool,
}

pub async fn unfollow_user(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<UnfollowResponse>, Error> {
    let service = SocialService::new(state.stores.clone());
    service.unfollow_user(auth.user_id, id).await?;
    Ok(Json(UnfollowResponse { unfollowed: true }))
}

#[derive(Serialize)]
pub struct BlockResponse {
    pub blocked: bool,
}

pub async fn block_user(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<BlockResponse>, Error> {
    let service = SocialService::new(state.stores.clone());
    service.block_user(auth.user_id, id).await?;
    Ok(Json(BlockResponse { blocked: true }))
}

#[derive(Serialize)]
pub struct UnblockResponse {
    pub unblocked: bool,
}

pub async fn unblock_user(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<UnblockResponse>, Error> {
    let service = SocialService::new(state.stores.clone());
    service.unblock_user(auth.user_id, id).await?;
    Ok(Json(UnblockResponse { unblocked: true }))
}

pub async fn relationship_status(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Visibility>, Error> {
    let resolver = VisibilityResolver::new(state.stores.clone());
    let visibility = resolver.resolve(auth.user_id, id).await?;
    Ok(Json(visibility))
}

#[derive(Serialize)]
pub struct SocialUserItem {
    pub user: PublicUser,
    #[serde(with = "time::serde::rfc3339")]
    pub followed_at: OffsetDateTime,
}

pub async fn list_followers(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<ListResponse<SocialUserItem>>, Error> {
    let limit = page_limit(query.limit)?;
    let cursor = parse_cursor(query.cursor)?;

    let service = SocialService::new(state.stores.clone());
    let mut followers = service
        .list_followers(auth.user_id, id, cursor, limit + 1)
        .await?;

    let next_cursor = if followers.len() > limit as usize {
        followers.pop();
        followers.last().map(|edge| (edge.connected_at, edge.user.id))
    } else {
        None
    };

    let items = followers
        .into_iter()
        .map(|edge| SocialUserItem {
            user: edge.user.into(),
            followed_at: edge.connected_at,
        })
        .collect();

    Ok(Json(ListResponse {
        items,
        next_cursor: encode_cursor(next_cursor),
    }))
}

pub async fn list_following(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<ListResponse<SocialUserItem>>, Error> {
    let limit = page_limit(query.limit)?;
    let cursor = parse_cursor(query.cursor)?;

    let service = SocialService::new(state.stores.clone());
    let mut following = service
        .list_following(auth.user_id, id, cursor, limit + 1)
        .await?;

    let next_cursor = if following.len() > limit as usize {
        following.pop();
        following.last().map(|edge| (edge.connected_at, edge.user.id))
    } else {
        None
    };

    let items = following
        .into_iter()
        .map(|edge| SocialUserItem {
            user: edge.user.into(),
            followed_at: edge.connected_at,
        })
        .collect();

    Ok(Json(ListResponse {
        items,
        next_cursor: encode_cursor(next_cursor),
    }))
}

#[derive(Serialize)]
pub struct BlockedUserItem {
    pub user: PublicUser,
    #[serde(with = "time::serde::rfc3339")]
    pub blocked_at: OffsetDateTime,
}

pub async fn list_blocked(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<ListResponse<BlockedUserItem>>, Error> {
    let limit = page_limit(query.limit)?;
    let cursor = parse_cursor(query.cursor)?;

    let service = SocialService::new(state.stores.clone());
    let mut blocked = service
        .list_blocked(auth.user_id, id, cursor, limit + 1)
        .await?;

    let next_cursor = if blocked.len() > limit as usize {
        blocked.pop();
        blocked.last().map(|edge| (edge.connected_at, edge.user.id))
    } else {
        None
    };

    let items = blocked
        .into_iter()
        .map(|edge| BlockedUserItem {
            user: edge.user.into(),
            blocked_at: edge.connected_at,
        })
        .collect();

    Ok(Json(ListResponse {
        items,
        next_cursor: encode_cursor(next_cursor),
    }))
}

#[derive(Serialize)]
pub struct FollowRequestItem {
    pub id: Uuid,
    pub requester: PublicUser,
    #[serde(with = "time::serde::rfc3339")]
    pub requested_at: OffsetDateTime,
}

pub async fn list_follow_requests(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<ListResponse<FollowRequestItem>>, Error> {
    let limit = page_limit(query.limit)?;
    let cursor = parse_cursor(query.cursor)?;

    let service = SocialService::new(state.stores.clone());
    let mut requests = service
        .list_pending_requests(auth.user_id, id, cursor, limit + 1)
        .await?;

    let next_cursor = if requests.len() > limit as usize {
        requests.pop();
        requests
            .last()
            .map(|edge| (edge.request.created_at, edge.request.id))
    } else {
        None
    };

    let items = requests
        .into_iter()
        .map(|edge| FollowRequestItem {
            id: edge.request.id,
            requester: edge.requester.into(),
            requested_at: edge.request.created_at,
        })
        .collect();

    Ok(Json(ListResponse {
        items,
        next_cursor: encode_cursor(next_cursor),
    }))
}

// ---------------------------------------------------------------------------
// Follow requests
// ---------------------------------------------------------------------------

pub async fn accept_follow_request(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<FollowRequest>, Error> {
    let service = SocialService::new(state.stores.clone());
    let request = service.accept_request(id, auth.user_id).await?;
    Ok(Json(request))
}

pub async fn reject_follow_request(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<FollowRequest>, Error> {
    let service = SocialService::new(state.stores.clone());
    let request = service.reject_request(id, auth.user_id).await?;
    Ok(Json(request))
}

#[derive(Serialize)]
pub struct DeletedResponse {
    pub deleted: bool,
}

pub async fn delete_follow_request(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<DeletedResponse>, Error> {
    let service = SocialService::new(state.stores.clone());
    service.delete_request(id, auth.user_id).await?;
    Ok(Json(DeletedResponse { deleted: true }))
}

// ---------------------------------------------------------------------------
// Posts
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct CreatePostRequest {
    pub description: String,
    pub images: Vec<String>,
}

pub async fn create_post(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreatePostRequest>,
) -> Result<Json<Post>, Error> {
    let service = PostService::new(state.stores.clone());
    let post = service
        .create_post(auth.user_id, payload.description, payload.images)
        .await?;
    Ok(Json(post))
}

pub async fn get_post(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Post>, Error> {
    let service = PostService::new(state.stores.clone());
    let post = service.get_post(auth.user_id, id).await?;
    Ok(Json(post))
}

#[derive(Deserialize)]
pub struct UpdateDescriptionRequest {
    pub description: String,
}

pub async fn update_post_description(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<UpdateDescriptionRequest>,
) -> Result<Json<Post>, Error> {
    let service = PostService::new(state.stores.clone());
    let post = service
        .update_description(auth.user_id, id, payload.description)
        .await?;
    Ok(Json(post))
}

pub async fn delete_post(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<DeletedResponse>, Error> {
    let service = PostService::new(state.stores.clone());
    service.delete_post(auth.user_id, id).await?;
    Ok(Json(DeletedResponse { deleted: true }))
}

pub async fn list_user_posts(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<ListResponse<Post>>, Error> {
    let limit = page_limit(query.limit)?;
    let cursor = parse_cursor(query.cursor)?;

    let service = PostService::new(state.stores.clone());
    let mut posts = service
        .list_user_posts(auth.user_id, id, cursor, limit + 1)
        .await?;

    let next_cursor = if posts.len() > limit as usize {
        posts.pop();
        posts.last().map(|post| (post.created_at, post.id))
    } else {
        None
    };

    Ok(Json(ListResponse {
        items: posts,
        next_cursor: encode_cursor(next_cursor),
    }))
}

// ---------------------------------------------------------------------------
// Likes & comments
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct LikeResponse {
    pub liked: bool,
}

pub async fn like_post(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<LikeResponse>, Error> {
    let service = EngagementService::new(state.stores.clone());
    let liked = service.like_post(auth.user_id, id).await?;
    Ok(Json(LikeResponse { liked }))
}

#[derive(Serialize)]
pub struct UnlikeResponse {
    pub unliked: bool,
}

pub async fn unlike_post(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<UnlikeResponse>, Error> {
    let service = EngagementService::new(state.stores.clone());
    let unliked = service.unlike_post(auth.user_id, id).await?;
    Ok(Json(UnlikeResponse { unliked }))
}

#[derive(Deserialize)]
pub struct CommentRequest {
    pub body: String,
}

pub async fn comment_post(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CommentRequest>,
) -> Result<Json<Comment>, Error> {
    let service = EngagementService::new(state.stores.clone());
    let comment = service.comment_post(auth.user_id, id, payload.body).await?;
    Ok(Json(comment))
}

pub async fn list_post_comments(
    Path(id): Path<Uuid>,
    _auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<ListResponse<Comment>>, Error> {
    let limit = page_limit(query.limit)?;
    let cursor = parse_cursor(query.cursor)?;

    let service = EngagementService::new(state.stores.clone());
    let mut comments = service.list_comments(id, cursor, limit + 1).await?;

    let next_cursor = if comments.len() > limit as usize {
        comments.pop();
        comments
            .last()
            .map(|comment| (comment.created_at, comment.id))
    } else {
        None
    };

    Ok(Json(ListResponse {
        items: comments,
        next_cursor: encode_cursor(next_cursor),
    }))
}

pub async fn delete_comment(
    Path((post_id, comment_id)): Path<(Uuid, Uuid)>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<DeletedResponse>, Error> {
    let service = EngagementService::new(state.stores.clone());
    service
        .delete_comment(auth.user_id, post_id, comment_id)
        .await?;
    Ok(Json(DeletedResponse { deleted: true }))
}

// ---------------------------------------------------------------------------
// Feed
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct FeedQuery {
    pub take: Option<i64>,
    pub cursor: Option<Uuid>,
}

pub async fn home_feed(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<FeedQuery>,
) -> Result<Json<FeedPage>, Error> {
    let take = query.take.unwrap_or(DEFAULT_PAGE_SIZE);

    let service = FeedService::new(state.stores.clone());
    let page = service.home_feed(auth.user_id, query.cursor, take).await?;
    Ok(Json(page))
}
