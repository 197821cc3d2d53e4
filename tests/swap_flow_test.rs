// End-to-end swap negotiation over HTTP
//
// Point values: Fair tops = 50, Like New outerwear = 50 + 20 + 10 = 80.
// Every user starts at 100 and earns 10 for each listing.

mod common;

use common::{spawn_app, ADMIN_EMAIL};
use serde_json::{json, Value};

#[tokio::test]
async fn test_accepted_swap_settles_points_and_ownership() {
    let app = spawn_app().await;
    let alice = app.register("Alice", "alice@rewear.test").await;
    let bob = app.register("Bob", "bob@rewear.test").await;

    let tee = app.list_item(&alice, "Plain white tee", "tops", "Fair").await;
    let coat = app.list_item(&bob, "Wool winter coat", "outerwear", "Like New").await;
    assert_eq!(app.balance(&alice).await, 110);
    assert_eq!(app.balance(&bob).await, 110);

    let response = app.create_swap(&alice, &tee, &coat).await;
    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["status"], "pending");
    assert_eq!(body["data"]["pointDifference"], 30);
    let swap_id = body["data"]["id"].as_str().unwrap().to_string();

    // Bob sees it waiting for him
    let pending: Value = app
        .client
        .get(app.url("/swaps/pending"))
        .bearer_auth(&bob)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(pending["data"].as_array().unwrap().len(), 1);

    let response = app
        .client
        .put(app.url(&format!("/swaps/{}/respond", swap_id)))
        .bearer_auth(&bob)
        .json(&json!({ "action": "accept" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Swap accepted and completed");
    assert_eq!(body["data"]["status"], "completed");
    assert!(body["data"]["completedAt"].is_string());

    assert_eq!(app.balance(&alice).await, 80);
    assert_eq!(app.balance(&bob).await, 140);

    let alice_id = app.me(&alice).await["id"].clone();
    let bob_id = app.me(&bob).await["id"].clone();
    let coat_now = app.item(&coat).await;
    let tee_now = app.item(&tee).await;
    assert_eq!(coat_now["owner"], alice_id);
    assert_eq!(coat_now["status"], "swapped");
    assert_eq!(tee_now["owner"], bob_id);
    assert_eq!(tee_now["status"], "swapped");

    // Completed swaps are final
    let response = app
        .client
        .put(app.url(&format!("/swaps/{}/respond", swap_id)))
        .bearer_auth(&bob)
        .json(&json!({ "action": "reject" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 409);
}

#[tokio::test]
async fn test_counter_offer_accepted_settles_countered_amount() {
    let app = spawn_app().await;
    let alice = app.register("Alice", "alice@rewear.test").await;
    let bob = app.register("Bob", "bob@rewear.test").await;

    let tee = app.list_item(&alice, "Striped tee", "tops", "Fair").await;
    let coat = app.list_item(&bob, "Rain jacket", "outerwear", "Like New").await;
    let body: Value = app.create_swap(&alice, &tee, &coat).await.json().await.unwrap();
    let swap_id = body["data"]["id"].as_str().unwrap().to_string();

    let response = app
        .client
        .put(app.url(&format!("/swaps/{}/respond", swap_id)))
        .bearer_auth(&bob)
        .json(&json!({ "action": "counter", "counterOffer": { "pointDifference": 10, "message": "meet me halfway" } }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Counter-offer sent");
    assert_eq!(body["data"]["status"], "pending");
    assert_eq!(body["data"]["counterOffer"]["pointDifference"], 10);

    // Only the initiator answers a counter
    let response = app
        .client
        .put(app.url(&format!("/swaps/{}/counter-response", swap_id)))
        .bearer_auth(&bob)
        .json(&json!({ "action": "accept" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);

    let response = app
        .client
        .put(app.url(&format!("/swaps/{}/counter-response", swap_id)))
        .bearer_auth(&alice)
        .json(&json!({ "action": "accept" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["status"], "completed");
    assert_eq!(body["data"]["pointDifference"], 10);

    assert_eq!(app.balance(&alice).await, 100);
    assert_eq!(app.balance(&bob).await, 120);
}

#[tokio::test]
async fn test_insufficient_funds_is_reported_with_detail() {
    let app = spawn_app().await;
    let admin = app.register("Admin", ADMIN_EMAIL).await;
    let alice = app.register("Alice", "alice@rewear.test").await;
    let bob = app.register("Bob", "bob@rewear.test").await;

    let tee = app.list_item(&alice, "Faded tee", "tops", "Fair").await;
    let coat = app.list_item(&bob, "Puffer coat", "outerwear", "Like New").await;

    let alice_id = app.me(&alice).await["id"].as_str().unwrap().to_string();
    let response = app
        .client
        .post(app.url(&format!("/admin/users/{}/points", alice_id)))
        .bearer_auth(&admin)
        .json(&json!({ "delta": -100, "reason": "chargeback" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(app.balance(&alice).await, 10);

    let response = app.create_swap(&alice, &tee, &coat).await;
    assert_eq!(response.status(), 422);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "insufficient_funds");
    assert_eq!(body["party"], "initiator");
    assert_eq!(body["required"], 30);
    assert_eq!(body["available"], 10);

    // Nothing was claimed, so the coat can still be redeemed by someone else
    let item = app.item(&coat).await;
    assert_eq!(item["status"], "available");
}

#[tokio::test]
async fn test_bad_requests_are_rejected() {
    let app = spawn_app().await;
    let alice = app.register("Alice", "alice@rewear.test").await;
    let bob = app.register("Bob", "bob@rewear.test").await;
    let tee = app.list_item(&alice, "Linen shirt", "tops", "Good").await;
    let jeans = app.list_item(&bob, "Raw denim", "bottoms", "Good").await;

    // No token
    let response = app
        .client
        .post(app.url("/swaps/create"))
        .json(&json!({ "offeredItemId": tee, "requestedItemId": jeans }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);

    // Bogus token
    let response = app
        .client
        .get(app.url("/points"))
        .bearer_auth("not-a-session")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);

    // Same item on both sides
    let response = app.create_swap(&alice, &tee, &tee).await;
    assert_eq!(response.status(), 400);

    // Offering someone else's item
    let response = app.create_swap(&alice, &jeans, &tee).await;
    assert_eq!(response.status(), 403);

    let body: Value = app.create_swap(&alice, &tee, &jeans).await.json().await.unwrap();
    let swap_id = body["data"]["id"].as_str().unwrap().to_string();

    // Unknown action
    let response = app
        .client
        .put(app.url(&format!("/swaps/{}/respond", swap_id)))
        .bearer_auth(&bob)
        .json(&json!({ "action": "haggle" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    // Counter without a body
    let response = app
        .client
        .put(app.url(&format!("/swaps/{}/respond", swap_id)))
        .bearer_auth(&bob)
        .json(&json!({ "action": "counter" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    // The initiator cannot answer their own proposal
    let response = app
        .client
        .put(app.url(&format!("/swaps/{}/respond", swap_id)))
        .bearer_auth(&alice)
        .json(&json!({ "action": "accept" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);

    // Unknown swap
    let response = app
        .client
        .get(app.url(&format!("/swaps/{}", uuid::Uuid::new_v4())))
        .bearer_auth(&alice)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_admin_removal_cancels_pending_swap() {
    let app = spawn_app().await;
    let admin = app.register("Admin", ADMIN_EMAIL).await;
    let alice = app.register("Alice", "alice@rewear.test").await;
    let bob = app.register("Bob", "bob@rewear.test").await;
    let tee = app.list_item(&alice, "Band tee", "tops", "Good").await;
    let boots = app.list_item(&bob, "Leather boots", "shoes", "Excellent").await;

    let body: Value = app.create_swap(&alice, &tee, &boots).await.json().await.unwrap();
    let swap_id = body["data"]["id"].as_str().unwrap().to_string();

    // Regular users are not admins
    let response = app
        .client
        .put(app.url(&format!("/admin/items/{}/reject", boots)))
        .bearer_auth(&alice)
        .json(&json!({ "reason": "counterfeit" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);

    let response = app
        .client
        .put(app.url(&format!("/admin/items/{}/reject", boots)))
        .bearer_auth(&admin)
        .json(&json!({ "reason": "counterfeit" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let swap: Value = app
        .client
        .get(app.url(&format!("/swaps/{}", swap_id)))
        .bearer_auth(&alice)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(swap["data"]["status"], "cancelled");

    // The offered item is free again
    let tee_now = app.item(&tee).await;
    assert_eq!(tee_now["status"], "available");
    assert_eq!(app.balance(&alice).await, 110);
}
