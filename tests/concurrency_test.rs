// Competing proposals for the same item: exactly one may hold the claim

mod common;

use common::spawn_app;
use serde_json::Value;

#[tokio::test]
async fn test_concurrent_proposals_for_one_item() {
    let app = spawn_app().await;
    let owner = app.register("Owner", "owner@rewear.test").await;
    let carol = app.register("Carol", "carol@rewear.test").await;
    let dave = app.register("Dave", "dave@rewear.test").await;

    let dress = app.list_item(&owner, "Silk slip dress", "dresses", "Excellent").await;
    let carol_top = app.list_item(&carol, "Cropped cardigan", "tops", "Good").await;
    let dave_top = app.list_item(&dave, "Oversized hoodie", "tops", "Good").await;

    let (first, second) = tokio::join!(
        app.create_swap(&carol, &carol_top, &dress),
        app.create_swap(&dave, &dave_top, &dress),
    );

    let mut statuses = vec![first.status().as_u16(), second.status().as_u16()];
    statuses.sort_unstable();
    assert_eq!(statuses, vec![201, 409]);

    // Only the winner shows up in the owner's queue
    let pending: Value = app
        .client
        .get(app.url("/swaps/pending"))
        .bearer_auth(&owner)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(pending["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_redeem_races_a_proposal() {
    let app = spawn_app().await;
    let owner = app.register("Owner", "owner@rewear.test").await;
    let carol = app.register("Carol", "carol@rewear.test").await;
    let dave = app.register("Dave", "dave@rewear.test").await;

    let scarf = app.list_item(&owner, "Cashmere scarf", "accessories", "Good").await;
    let carol_top = app.list_item(&carol, "Ribbed tank", "tops", "Good").await;

    let redeem = app
        .client
        .post(app.url(&format!("/swaps/{}/redeem", scarf)))
        .bearer_auth(&dave)
        .send();
    let (proposal, redemption) = tokio::join!(app.create_swap(&carol, &carol_top, &scarf), redeem);
    let redemption = redemption.unwrap();

    // Whichever lands first wins; the other sees a conflict
    let mut statuses = vec![proposal.status().as_u16(), redemption.status().as_u16()];
    statuses.sort_unstable();
    assert!(statuses == vec![200, 409] || statuses == vec![201, 409], "got {:?}", statuses);
}
