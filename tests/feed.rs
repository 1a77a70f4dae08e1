//! Home Feed Tests
//!
//! Covers the visibility predicate (blocks, privacy, soft-deleted posts),
//! the viewer-relative annotations, and cursor pagination.

mod common;

use axum::http::StatusCode;
use common::app;
use serde_json::json;
use uuid::Uuid;

fn feed_post_ids(body: &serde_json::Value) -> Vec<String> {
    body["posts"]
        .as_array()
        .unwrap()
        .iter()
        .map(|post| post["id"].as_str().unwrap().to_string())
        .collect()
}

// ===========================================================================
// Visibility Predicate
// ===========================================================================

#[tokio::test]
async fn feed_includes_public_authors_without_follow() {
    let app = app().await;
    let author = app.create_user("feed_pub_author").await;
    let viewer = app.create_user("feed_pub_viewer").await;

    let post_id = app.create_post_for_user(&author, "public post").await;

    let resp = app.get("/feed", Some(&viewer.access_token)).await;
    assert_eq!(resp.status, StatusCode::OK);
    let ids = feed_post_ids(&resp.json());
    assert!(ids.contains(&post_id.to_string()));
}

#[tokio::test]
async fn feed_excludes_private_authors_until_accepted() {
    let app = app().await;
    let private = app.create_private_user("feed_priv_author").await;
    let viewer = app.create_user("feed_priv_viewer").await;

    let post_id = app.create_post_for_user(&private, "secret post").await;

    // Stranger: hidden
    let resp = app.get("/feed", Some(&viewer.access_token)).await;
    assert!(!feed_post_ids(&resp.json()).contains(&post_id.to_string()));

    // Pending request: still hidden
    let resp = app
        .post_json(
            &format!("/users/{}/follow", private.id),
            json!({}),
            Some(&viewer.access_token),
        )
        .await;
    let request_id = resp.json()["request"]["id"].as_str().unwrap().to_string();

    let resp = app.get("/feed", Some(&viewer.access_token)).await;
    assert!(!feed_post_ids(&resp.json()).contains(&post_id.to_string()));

    // Accepted follower: visible
    app.post_json(
        &format!("/follows/requests/{}/accept", request_id),
        json!({}),
        Some(&private.access_token),
    )
    .await;

    let resp = app.get("/feed", Some(&viewer.access_token)).await;
    assert!(feed_post_ids(&resp.json()).contains(&post_id.to_string()));
}

#[tokio::test]
async fn feed_excludes_blocked_authors_in_both_directions() {
    let app = app().await;
    let author = app.create_user("feed_block_author").await;
    let viewer = app.create_user("feed_block_viewer").await;

    let post_id = app.create_post_for_user(&author, "soon hidden").await;

    // Author blocks viewer
    app.post_json(
        &format!("/users/{}/block", viewer.id),
        json!({}),
        Some(&author.access_token),
    )
    .await;
    let resp = app.get("/feed", Some(&viewer.access_token)).await;
    assert!(!feed_post_ids(&resp.json()).contains(&post_id.to_string()));

    // Unblock, then the viewer blocks the author: same outcome
    app.post_json(
        &format!("/users/{}/unblock", viewer.id),
        json!({}),
        Some(&author.access_token),
    )
    .await;
    app.post_json(
        &format!("/users/{}/block", author.id),
        json!({}),
        Some(&viewer.access_token),
    )
    .await;
    let resp = app.get("/feed", Some(&viewer.access_token)).await;
    assert!(!feed_post_ids(&resp.json()).contains(&post_id.to_string()));
}

#[tokio::test]
async fn feed_excludes_deleted_posts() {
    let app = app().await;
    let author = app.create_user("feed_del_author").await;

    let keep_id = app.create_post_for_user(&author, "keep").await;
    let gone_id = app.create_post_for_user(&author, "gone").await;

    app.delete(&format!("/posts/{}", gone_id), Some(&author.access_token))
        .await;

    let resp = app.get("/feed", Some(&author.access_token)).await;
    let ids = feed_post_ids(&resp.json());
    assert!(ids.contains(&keep_id.to_string()));
    assert!(!ids.contains(&gone_id.to_string()));
}

#[tokio::test]
async fn own_private_posts_always_visible() {
    let app = app().await;
    let private = app.create_private_user("feed_own_priv").await;

    let post_id = app.create_post_for_user(&private, "mine").await;

    let resp = app.get("/feed", Some(&private.access_token)).await;
    assert!(feed_post_ids(&resp.json()).contains(&post_id.to_string()));
}

// ===========================================================================
// Annotations
// ===========================================================================

#[tokio::test]
async fn feed_annotates_ownership_and_likes() {
    let app = app().await;
    let author = app.create_user("feed_ann_author").await;
    let viewer = app.create_user("feed_ann_viewer").await;

    let post_id = app.create_post_for_user(&author, "annotated").await;

    app.post_json(
        &format!("/posts/{}/like", post_id),
        json!({}),
        Some(&viewer.access_token),
    )
    .await;
    app.post_json(
        &format!("/posts/{}/comments", post_id),
        json!({ "body": "nice" }),
        Some(&viewer.access_token),
    )
    .await;

    // Viewer sees the post as liked, not owned
    let resp = app.get("/feed", Some(&viewer.access_token)).await;
    let body = resp.json();
    let post = body["posts"]
        .as_array()
        .unwrap()
        .iter()
        .find(|post| post["id"].as_str() == Some(&post_id.to_string()))
        .unwrap()
        .clone();
    assert_eq!(post["owned"].as_bool().unwrap(), false);
    assert_eq!(post["is_liked"].as_bool().unwrap(), true);
    assert_eq!(post["like_count"].as_i64().unwrap(), 1);
    assert_eq!(post["comment_count"].as_i64().unwrap(), 1);

    // Author sees it as owned, not liked
    let resp = app.get("/feed", Some(&author.access_token)).await;
    let body = resp.json();
    let post = body["posts"]
        .as_array()
        .unwrap()
        .iter()
        .find(|post| post["id"].as_str() == Some(&post_id.to_string()))
        .unwrap()
        .clone();
    assert_eq!(post["owned"].as_bool().unwrap(), true);
    assert_eq!(post["is_liked"].as_bool().unwrap(), false);
}

// ===========================================================================
// Pagination
// ===========================================================================

#[tokio::test]
async fn feed_paginates_deterministically() {
    let app = app().await;
    let author = app.create_user("feed_page_author").await;
    let viewer = app.create_user("feed_page_viewer").await;

    let mut created = Vec::new();
    for n in 0..4 {
        created.push(
            app.create_post_for_user(&author, &format!("post {}", n))
                .await,
        );
    }
    // Newest first
    created.reverse();

    let resp = app.get("/feed?take=2", Some(&viewer.access_token)).await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    let first_page = feed_post_ids(&body);
    assert_eq!(first_page.len(), 2);
    assert_eq!(first_page[0], created[0].to_string());
    assert_eq!(first_page[1], created[1].to_string());

    let cursor = body["next_cursor"].as_str().unwrap().to_string();
    assert_eq!(cursor, created[1].to_string(), "cursor is the last post id");

    let resp = app
        .get(
            &format!("/feed?take=2&cursor={}", cursor),
            Some(&viewer.access_token),
        )
        .await;
    let body = resp.json();
    let second_page = feed_post_ids(&body);
    assert_eq!(second_page.len(), 2);
    assert_eq!(second_page[0], created[2].to_string());
    assert_eq!(second_page[1], created[3].to_string());

    // Disjoint pages covering all four posts
    assert!(first_page.iter().all(|id| !second_page.contains(id)));

    // Exactly four posts exist, so the second page is the last full one
    match body["next_cursor"].as_str() {
        Some(cursor) => {
            let resp = app
                .get(
                    &format!("/feed?take=2&cursor={}", cursor),
                    Some(&viewer.access_token),
                )
                .await;
            assert_eq!(feed_post_ids(&resp.json()).len(), 0);
        }
        None => {}
    }
}

#[tokio::test]
async fn short_page_ends_the_feed() {
    let app = app().await;
    let author = app.create_user("feed_end_author").await;
    let viewer = app.create_user("feed_end_viewer").await;

    app.create_post_for_user(&author, "only one").await;

    let resp = app.get("/feed?take=10", Some(&viewer.access_token)).await;
    let body = resp.json();
    assert_eq!(feed_post_ids(&body).len(), 1);
    assert!(body["next_cursor"].is_null());
}

#[tokio::test]
async fn take_is_bounded() {
    let app = app().await;
    let viewer = app.create_user("feed_take_viewer").await;

    let resp = app.get("/feed?take=0", Some(&viewer.access_token)).await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);

    let resp = app.get("/feed?take=101", Some(&viewer.access_token)).await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error_message(), "take must be between 1 and 100");
}

#[tokio::test]
async fn unknown_cursor_is_rejected() {
    let app = app().await;
    let viewer = app.create_user("feed_cursor_viewer").await;

    let resp = app
        .get(
            &format!("/feed?cursor={}", Uuid::new_v4()),
            Some(&viewer.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error_message(), "unknown feed cursor");
}

#[tokio::test]
async fn feed_requires_authentication() {
    let app = app().await;

    let resp = app.get("/feed", None).await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}
