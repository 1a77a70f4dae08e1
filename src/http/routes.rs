use axum::{routing::delete, routing::get, routing::patch, routing::post, Router};

use crate::http::handlers;
use crate::AppState;

pub fn health() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health))
}

pub fn auth() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(handlers::login))
        .route("/auth/me", get(handlers::get_current_user))
}

pub fn users() -> Router<AppState> {
    Router::new()
        .route("/users", post(handlers::create_user))
        .route("/users/:id", get(handlers::get_profile))
        .route("/users/:id", patch(handlers::update_profile))
        .route("/users/:id/posts", get(handlers::list_user_posts))
        .route("/users/:id/follow", post(handlers::follow_user))
        .route("/users/:id/unfollow", post(handlers::unfollow_user))
        .route("/users/:id/block", post(handlers::block_user))
        .route("/users/:id/unblock", post(handlers::unblock_user))
        .route("/users/:id/followers", get(handlers::list_followers))
        .route("/users/:id/following", get(handlers::list_following))
        .route("/users/:id/requests", get(handlers::list_follow_requests))
        .route("/users/:id/blocked", get(handlers::list_blocked))
        .route("/users/:id/relationship", get(handlers::relationship_status))
}

pub fn follows() -> Router<AppState> {
    Router::new()
        .route(
            "/follows/requests/:id/accept",
            post(handlers::accept_follow_request),
        )
        .route(
            "/follows/requests/:id/reject",
            post(handlers::reject_follow_request),
        )
        .route(
            "/follows/requests/:id",
            delete(handlers::delete_follow_request),
        )
}

pub fn posts() -> Router<AppState> {
    Router::new()
        .route("/posts", post(handlers::create_post))
        .route("/posts/:id", get(handlers::get_post))
        .route("/posts/:id", patch(handlers::update_post_description))
        .route("/posts/:id", delete(handlers::delete_post))
        .route("/posts/:id/like", post(handlers::like_post))
        .route("/posts/:id/like", delete(handlers::unlike_post))
        .route("/posts/:id/comments", post(handlers::comment_post))
        .route("/posts/:id/comments", get(handlers::list_post_comments))
        .route(
            "/posts/:id/comments/:comment_id",
            delete(handlers::delete_comment),
        )
}

pub fn feed() -> Router<AppState> {
    Router::new().route("/feed", get(handlers::home_feed))
}
