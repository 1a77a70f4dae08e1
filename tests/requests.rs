//! Follow-Request Lifecycle Tests
//!
//! Covers the private-account request flow: PENDING creation, accept,
//! reject, delete, and the ownership rules on each transition.

mod common;

use aperture::store::FollowStore;
use axum::http::StatusCode;
use common::app;
use serde_json::json;
use uuid::Uuid;

// ===========================================================================
// Request Creation
// ===========================================================================

#[tokio::test]
async fn follow_private_account_creates_pending_request() {
    let app = app().await;
    let requester = app.create_user("req_create_a").await;
    let private = app.create_private_user("req_create_p").await;

    let resp = app
        .post_json(
            &format!("/users/{}/follow", private.id),
            json!({}),
            Some(&requester.access_token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["followed"].as_bool().unwrap(), false);
    assert_eq!(body["request"]["status"].as_str().unwrap(), "PENDING");
    assert_eq!(
        body["request"]["requester_id"].as_str().unwrap(),
        requester.id.to_string()
    );

    // No follow edge yet
    let resp = app
        .get(
            &format!("/users/{}/relationship", private.id),
            Some(&requester.access_token),
        )
        .await;
    assert_eq!(resp.json()["is_following"].as_bool().unwrap(), false);
}

#[tokio::test]
async fn duplicate_pending_request_is_conflict() {
    let app = app().await;
    let requester = app.create_user("req_dup_a").await;
    let private = app.create_private_user("req_dup_p").await;

    app.post_json(
        &format!("/users/{}/follow", private.id),
        json!({}),
        Some(&requester.access_token),
    )
    .await;

    let resp = app
        .post_json(
            &format!("/users/{}/follow", private.id),
            json!({}),
            Some(&requester.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CONFLICT);
    assert_eq!(resp.error_message(), "follow request already sent");
}

#[tokio::test]
async fn target_sees_pending_request() {
    let app = app().await;
    let requester = app.create_user("req_list_a").await;
    let private = app.create_private_user("req_list_p").await;

    app.post_json(
        &format!("/users/{}/follow", private.id),
        json!({}),
        Some(&requester.access_token),
    )
    .await;

    let resp = app
        .get(
            &format!("/users/{}/requests", private.id),
            Some(&private.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let items = resp.json()["items"].as_array().unwrap().clone();
    assert_eq!(items.len(), 1);
    assert_eq!(
        items[0]["requester"]["id"].as_str().unwrap(),
        requester.id.to_string()
    );

    // Pending requests are visible to their owner only
    let resp = app
        .get(
            &format!("/users/{}/requests", private.id),
            Some(&requester.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);
}

// ===========================================================================
// Accept
// ===========================================================================

#[tokio::test]
async fn accept_request_creates_follow_edge() {
    let app = app().await;
    let requester = app.create_user("req_accept_a").await;
    let private = app.create_private_user("req_accept_p").await;

    let resp = app
        .post_json(
            &format!("/users/{}/follow", private.id),
            json!({}),
            Some(&requester.access_token),
        )
        .await;
    let request_id = resp.json()["request"]["id"].as_str().unwrap().to_string();

    let resp = app
        .post_json(
            &format!("/follows/requests/{}/accept", request_id),
            json!({}),
            Some(&private.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["status"].as_str().unwrap(), "ACCEPTED");

    let resp = app
        .get(
            &format!("/users/{}/relationship", private.id),
            Some(&requester.access_token),
        )
        .await;
    let body = resp.json();
    assert_eq!(body["is_following"].as_bool().unwrap(), true);
    assert_eq!(body["is_private_and_hidden"].as_bool().unwrap(), false);
}

#[tokio::test]
async fn only_the_requested_party_may_accept() {
    let app = app().await;
    let requester = app.create_user("req_authz_a").await;
    let private = app.create_private_user("req_authz_p").await;
    let outsider = app.create_user("req_authz_o").await;

    let resp = app
        .post_json(
            &format!("/users/{}/follow", private.id),
            json!({}),
            Some(&requester.access_token),
        )
        .await;
    let request_id = resp.json()["request"]["id"].as_str().unwrap().to_string();

    // Neither the requester nor a third party may accept
    for token in [&requester.access_token, &outsider.access_token] {
        let resp = app
            .post_json(
                &format!("/follows/requests/{}/accept", request_id),
                json!({}),
                Some(token),
            )
            .await;
        assert_eq!(resp.status, StatusCode::FORBIDDEN);
    }
}

#[tokio::test]
async fn accept_converges_when_the_edge_already_exists() {
    let app = app().await;
    let requester = app.create_user("req_race_a").await;
    let private = app.create_private_user("req_race_p").await;

    let resp = app
        .post_json(
            &format!("/users/{}/follow", private.id),
            json!({}),
            Some(&requester.access_token),
        )
        .await;
    let request_id = resp.json()["request"]["id"].as_str().unwrap().to_string();

    // Plant the follow edge underneath the pending request, as a raced
    // accept would
    app.state
        .stores
        .follows
        .insert(requester.id, private.id)
        .await
        .unwrap();

    // Accept still converges instead of failing on the duplicate edge
    let resp = app
        .post_json(
            &format!("/follows/requests/{}/accept", request_id),
            json!({}),
            Some(&private.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["status"].as_str().unwrap(), "ACCEPTED");

    let resp = app
        .get(
            &format!("/users/{}/relationship", private.id),
            Some(&requester.access_token),
        )
        .await;
    assert_eq!(resp.json()["is_following"].as_bool().unwrap(), true);
}

#[tokio::test]
async fn accept_unknown_request_is_not_found() {
    let app = app().await;
    let user = app.create_user("req_ghost").await;

    let resp = app
        .post_json(
            &format!("/follows/requests/{}/accept", Uuid::new_v4()),
            json!({}),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

// ===========================================================================
// Reject
// ===========================================================================

#[tokio::test]
async fn reject_request_creates_no_edge() {
    let app = app().await;
    let requester = app.create_user("req_reject_a").await;
    let private = app.create_private_user("req_reject_p").await;

    let resp = app
        .post_json(
            &format!("/users/{}/follow", private.id),
            json!({}),
            Some(&requester.access_token),
        )
        .await;
    let request_id = resp.json()["request"]["id"].as_str().unwrap().to_string();

    let resp = app
        .post_json(
            &format!("/follows/requests/{}/reject", request_id),
            json!({}),
            Some(&private.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["status"].as_str().unwrap(), "REJECTED");

    let resp = app
        .get(
            &format!("/users/{}/relationship", private.id),
            Some(&requester.access_token),
        )
        .await;
    assert_eq!(resp.json()["is_following"].as_bool().unwrap(), false);
}

#[tokio::test]
async fn settled_request_cannot_transition_again() {
    let app = app().await;
    let requester = app.create_user("req_settled_a").await;
    let private = app.create_private_user("req_settled_p").await;

    let resp = app
        .post_json(
            &format!("/users/{}/follow", private.id),
            json!({}),
            Some(&requester.access_token),
        )
        .await;
    let request_id = resp.json()["request"]["id"].as_str().unwrap().to_string();

    app.post_json(
        &format!("/follows/requests/{}/reject", request_id),
        json!({}),
        Some(&private.access_token),
    )
    .await;

    // Rejected is terminal: no late accept, no second reject
    let resp = app
        .post_json(
            &format!("/follows/requests/{}/accept", request_id),
            json!({}),
            Some(&private.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CONFLICT);

    let resp = app
        .post_json(
            &format!("/follows/requests/{}/reject", request_id),
            json!({}),
            Some(&private.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn rejected_requester_may_request_again() {
    let app = app().await;
    let requester = app.create_user("req_retry_a").await;
    let private = app.create_private_user("req_retry_p").await;

    let resp = app
        .post_json(
            &format!("/users/{}/follow", private.id),
            json!({}),
            Some(&requester.access_token),
        )
        .await;
    let request_id = resp.json()["request"]["id"].as_str().unwrap().to_string();

    app.post_json(
        &format!("/follows/requests/{}/reject", request_id),
        json!({}),
        Some(&private.access_token),
    )
    .await;

    // Only PENDING requests are unique per pair
    let resp = app
        .post_json(
            &format!("/users/{}/follow", private.id),
            json!({}),
            Some(&requester.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["request"]["status"].as_str().unwrap(), "PENDING");
}

// ===========================================================================
// Delete
// ===========================================================================

#[tokio::test]
async fn either_party_may_delete_a_request() {
    let app = app().await;
    let requester = app.create_user("req_del_a").await;
    let private = app.create_private_user("req_del_p").await;

    // Requester withdraws their own request
    let resp = app
        .post_json(
            &format!("/users/{}/follow", private.id),
            json!({}),
            Some(&requester.access_token),
        )
        .await;
    let request_id = resp.json()["request"]["id"].as_str().unwrap().to_string();

    let resp = app
        .delete(
            &format!("/follows/requests/{}", request_id),
            Some(&requester.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["deleted"].as_bool().unwrap(), true);

    // A withdrawn request frees the pair for a new one, deletable by the
    // requested party too
    let resp = app
        .post_json(
            &format!("/users/{}/follow", private.id),
            json!({}),
            Some(&requester.access_token),
        )
        .await;
    let request_id = resp.json()["request"]["id"].as_str().unwrap().to_string();

    let resp = app
        .delete(
            &format!("/follows/requests/{}", request_id),
            Some(&private.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
}

#[tokio::test]
async fn third_party_may_not_delete_a_request() {
    let app = app().await;
    let requester = app.create_user("req_del3_a").await;
    let private = app.create_private_user("req_del3_p").await;
    let outsider = app.create_user("req_del3_o").await;

    let resp = app
        .post_json(
            &format!("/users/{}/follow", private.id),
            json!({}),
            Some(&requester.access_token),
        )
        .await;
    let request_id = resp.json()["request"]["id"].as_str().unwrap().to_string();

    let resp = app
        .delete(
            &format!("/follows/requests/{}", request_id),
            Some(&outsider.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn settled_request_can_still_be_deleted() {
    let app = app().await;
    let requester = app.create_user("req_delset_a").await;
    let private = app.create_private_user("req_delset_p").await;

    let resp = app
        .post_json(
            &format!("/users/{}/follow", private.id),
            json!({}),
            Some(&requester.access_token),
        )
        .await;
    let request_id = resp.json()["request"]["id"].as_str().unwrap().to_string();

    app.post_json(
        &format!("/follows/requests/{}/accept", request_id),
        json!({}),
        Some(&private.access_token),
    )
    .await;

    let resp = app
        .delete(
            &format!("/follows/requests/{}", request_id),
            Some(&requester.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);

    // The follow edge created by the accept survives the record's deletion
    let resp = app
        .get(
            &format!("/users/{}/relationship", private.id),
            Some(&requester.access_token),
        )
        .await;
    assert_eq!(resp.json()["is_following"].as_bool().unwrap(), true);
}
