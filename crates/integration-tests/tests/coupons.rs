//! Coupon lookup and validation.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use rust_decimal::Decimal;
use serde_json::{Value, json};

use shonifity_core::UserRole;
use shonifity_integration_tests::TestContext;

async fn earn_coupon(ctx: &TestContext, cookie: &str) {
    let coat = ctx.add_product("Coat", Decimal::new(250, 0), "coats", false).await;
    let response = ctx
        .post(
            "/api/payments/create-checkout-session",
            Some(cookie),
            json!({ "products": [{ "id": coat.id }] }),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn test_active_coupon_is_null_until_earned() {
    let ctx = TestContext::new();
    let (_, cookie) = ctx.sign_up("Ann", UserRole::Customer).await;

    let none = ctx.get("/api/coupons", Some(&cookie)).await;
    assert_eq!(none.status, StatusCode::OK);
    assert_eq!(none.body, Value::Null);

    earn_coupon(&ctx, &cookie).await;

    let some = ctx.get("/api/coupons", Some(&cookie)).await;
    assert_eq!(some.status, StatusCode::OK);
    assert!(some.body["code"].as_str().unwrap().starts_with("GIFT"));
    assert_eq!(some.body["discountPercentage"], 10);
    assert_eq!(some.body["isActive"], true);
}

#[tokio::test]
async fn test_validate_is_scoped_to_owner() {
    let ctx = TestContext::new();
    let (_, owner) = ctx.sign_up("Ann", UserRole::Customer).await;
    let (_, other) = ctx.sign_up("Bea", UserRole::Customer).await;
    earn_coupon(&ctx, &owner).await;
    let code = ctx.get("/api/coupons", Some(&owner)).await.body["code"].clone();

    let valid = ctx
        .post("/api/coupons/validate", Some(&owner), json!({ "code": code }))
        .await;
    assert_eq!(valid.status, StatusCode::OK);
    assert_eq!(valid.body["message"], "Coupon is valid");
    assert_eq!(valid.body["code"], code);
    assert_eq!(valid.body["discountPercentage"], 10);

    let foreign = ctx
        .post("/api/coupons/validate", Some(&other), json!({ "code": code }))
        .await;
    assert_eq!(foreign.status, StatusCode::NOT_FOUND);
    assert_eq!(foreign.body["message"], "Coupon not found");
}

#[tokio::test]
async fn test_coupon_routes_require_session() {
    let ctx = TestContext::new();

    let response = ctx
        .post("/api/coupons/validate", None, json!({ "code": "GIFTABCDEF" }))
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}
