//! Checkout session creation and payment confirmation.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use axum::http::StatusCode;
use rust_decimal::Decimal;
use serde_json::json;

use shonifity_core::{CurrencyCode, MinorUnits, PaymentStatus, UserRole};
use shonifity_integration_tests::{CLIENT_URL, TestContext, decimal};
use shonifity_storefront::config::CheckoutConfig;

#[tokio::test]
async fn test_session_is_priced_from_catalog() {
    let ctx = TestContext::new();
    let (user, cookie) = ctx.sign_up("Ann", UserRole::Customer).await;
    let jeans = ctx.add_product("Jeans", Decimal::new(5000, 2), "jeans", false).await;
    let tee = ctx.add_product("Tee", Decimal::new(1999, 2), "tees", false).await;

    let response = ctx
        .post(
            "/api/payments/create-checkout-session",
            Some(&cookie),
            json!({
                "products": [
                    // Client prices are ignored
                    { "_id": jeans.id, "quantity": 2, "price": 1 },
                    { "id": tee.id }
                ],
                "currency": "EUR"
            }),
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["success"], true);
    assert_eq!(response.body["id"], "cs_test_1");
    assert_eq!(decimal(&response.body["totalAmount"]), Decimal::new(11999, 2));

    let requests = ctx.payments.requests().await;
    let request = &requests[0];
    assert_eq!(request.line_items.len(), 2);
    assert_eq!(request.line_items[0].unit_amount, MinorUnits::new(5000));
    assert_eq!(request.line_items[0].quantity, 2);
    assert!(request.line_items.iter().all(|l| l.currency == CurrencyCode::USD));
    assert_eq!(
        request.success_url,
        format!("{CLIENT_URL}/purchase-success?session_id={{CHECKOUT_SESSION_ID}}")
    );
    assert_eq!(request.cancel_url, format!("{CLIENT_URL}/purchase-cancel"));
    assert_eq!(request.metadata["userId"], user.to_string());
    assert_eq!(request.metadata["currency"], "EUR");
    assert_eq!(request.metadata["couponCode"], "");

    // Below the gift threshold
    assert!(ctx.store.coupons_for(user).await.is_empty());
}

#[tokio::test]
async fn test_session_validation_errors() {
    let ctx = TestContext::new();
    let (_, cookie) = ctx.sign_up("Ann", UserRole::Customer).await;
    let jeans = ctx.add_product("Jeans", Decimal::new(50, 0), "jeans", false).await;
    let uri = "/api/payments/create-checkout-session";

    let empty = ctx.post(uri, Some(&cookie), json!({ "products": [] })).await;
    assert_eq!(empty.status, StatusCode::BAD_REQUEST);
    assert_eq!(empty.body["message"], "Invalid or empty products array");

    let missing = ctx.post(uri, Some(&cookie), json!({})).await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);

    let unknown = ctx
        .post(uri, Some(&cookie), json!({ "products": [{ "id": 9999 }] }))
        .await;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);

    let zero = ctx
        .post(uri, Some(&cookie), json!({ "products": [{ "id": jeans.id, "quantity": 0 }] }))
        .await;
    assert_eq!(zero.status, StatusCode::BAD_REQUEST);

    let currency = ctx
        .post(
            uri,
            Some(&cookie),
            json!({ "products": [{ "id": jeans.id }], "currency": "XYZ" }),
        )
        .await;
    assert_eq!(currency.status, StatusCode::BAD_REQUEST);

    let malformed = ctx
        .post(uri, Some(&cookie), json!({ "products": "jeans" }))
        .await;
    assert_eq!(malformed.status, StatusCode::BAD_REQUEST);
    assert_eq!(malformed.body["success"], false);

    assert!(ctx.payments.requests().await.is_empty());
}

#[tokio::test]
async fn test_provider_failure_is_reported() {
    let ctx = TestContext::new();
    let (_, cookie) = ctx.sign_up("Ann", UserRole::Customer).await;
    let jeans = ctx.add_product("Jeans", Decimal::new(50, 0), "jeans", false).await;
    ctx.payments.set_fail_create(true).await;

    let response = ctx
        .post(
            "/api/payments/create-checkout-session",
            Some(&cookie),
            json!({ "products": [{ "id": jeans.id }] }),
        )
        .await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.body["message"], "Error processing checkout");
    assert_eq!(response.body["error"], "mock create failure");
}

#[tokio::test]
async fn test_gift_coupon_threshold() {
    let ctx = TestContext::new();
    let (user, cookie) = ctx.sign_up("Ann", UserRole::Customer).await;
    let coat = ctx.add_product("Coat", Decimal::new(200, 0), "coats", false).await;
    let cap = ctx.add_product("Cap", Decimal::new(19999, 2), "hats", false).await;
    let uri = "/api/payments/create-checkout-session";

    ctx.post(uri, Some(&cookie), json!({ "products": [{ "id": cap.id }] })).await;
    assert!(ctx.store.coupons_for(user).await.is_empty());

    // Exactly at the threshold
    ctx.post(uri, Some(&cookie), json!({ "products": [{ "id": coat.id }] })).await;
    let coupons = ctx.store.coupons_for(user).await;
    assert_eq!(coupons.len(), 1);
    assert!(coupons[0].code.starts_with("GIFT"));
    assert_eq!(coupons[0].discount_percentage, 10);

    // A second qualifying checkout replaces the coupon
    ctx.post(uri, Some(&cookie), json!({ "products": [{ "id": coat.id }] })).await;
    let coupons = ctx.store.coupons_for(user).await;
    assert_eq!(coupons.iter().filter(|c| c.is_active).count(), 1);
}

#[tokio::test]
async fn test_coupon_discounts_session_and_is_redeemed_on_success() {
    let ctx = TestContext::with_checkout(CheckoutConfig {
        coupon_threshold: MinorUnits::new(1_000),
        ..CheckoutConfig::default()
    });
    let (user, cookie) = ctx.sign_up("Ann", UserRole::Customer).await;
    let jeans = ctx.add_product("Jeans", Decimal::new(50, 0), "jeans", false).await;
    let uri = "/api/payments/create-checkout-session";

    // First checkout earns a coupon
    ctx.post(uri, Some(&cookie), json!({ "products": [{ "id": jeans.id }] })).await;
    let code = ctx.store.coupons_for(user).await[0].code.clone();

    let discounted = ctx
        .post(
            uri,
            Some(&cookie),
            json!({ "products": [{ "id": jeans.id, "quantity": 2 }], "couponCode": code }),
        )
        .await;
    assert_eq!(discounted.status, StatusCode::OK);
    assert_eq!(decimal(&discounted.body["totalAmount"]), Decimal::new(90, 0));
    assert_eq!(ctx.payments.coupon_count().await, 1);

    let session_id = discounted.body["id"].as_str().unwrap().to_string();
    let requests = ctx.payments.requests().await;
    assert_eq!(requests[1].metadata["couponCode"], code);
    assert!(requests[1].discount_coupon.is_some());

    ctx.payments.mark_paid(&session_id).await;
    let confirmed = ctx
        .post(
            "/api/payments/checkout-success",
            Some(&cookie),
            json!({ "sessionId": session_id }),
        )
        .await;
    assert_eq!(confirmed.status, StatusCode::OK);
    assert_eq!(decimal(&confirmed.body["totalAmount"]), Decimal::new(90, 0));

    // The discounted checkout also qualified, so a fresh coupon replaced the
    // redeemed one; the redeemed code no longer validates.
    let validate = ctx
        .post("/api/coupons/validate", Some(&cookie), json!({ "code": code }))
        .await;
    assert_eq!(validate.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_double_confirmation_records_one_order() {
    let ctx = TestContext::new();
    let (user, cookie) = ctx.sign_up("Ann", UserRole::Customer).await;
    let jeans = ctx.add_product("Jeans", Decimal::new(50, 0), "jeans", false).await;

    let created = ctx
        .post(
            "/api/payments/create-checkout-session",
            Some(&cookie),
            json!({ "products": [{ "id": jeans.id, "quantity": 3 }], "currency": "GBP" }),
        )
        .await;
    let session_id = created.body["id"].as_str().unwrap().to_string();
    ctx.payments.mark_paid(&session_id).await;

    let first = ctx
        .post(
            "/api/payments/checkout-success",
            Some(&cookie),
            json!({ "sessionId": session_id }),
        )
        .await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.body["success"], true);
    assert_eq!(first.body["isExisting"], false);
    assert_eq!(first.body["message"], "Payment successful, order created");

    let second = ctx
        .post(
            "/api/payments/checkout-success",
            Some(&cookie),
            json!({ "sessionId": session_id }),
        )
        .await;
    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(second.body["isExisting"], true);
    assert_eq!(second.body["message"], "Order already processed successfully");
    assert_eq!(second.body["orderId"], first.body["orderId"]);

    let orders = ctx.store.orders().await;
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].user_id, user);
    assert_eq!(orders[0].currency, CurrencyCode::GBP);
    assert_eq!(orders[0].total_amount, Decimal::new(150, 0));
    assert_eq!(orders[0].products[0].quantity, 3);

    let history = ctx.get("/api/orders", Some(&cookie)).await;
    assert_eq!(history.status, StatusCode::OK);
    assert_eq!(history.body.as_array().unwrap().len(), 1);
    assert_eq!(history.body[0]["stripeSessionId"], session_id);
}

#[tokio::test]
async fn test_confirmation_failures_leave_no_order() {
    let ctx = TestContext::new();
    let (_, cookie) = ctx.sign_up("Ann", UserRole::Customer).await;
    let jeans = ctx.add_product("Jeans", Decimal::new(50, 0), "jeans", false).await;
    let uri = "/api/payments/checkout-success";

    let missing = ctx.post(uri, Some(&cookie), json!({})).await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);
    assert_eq!(missing.body["message"], "Session ID is required");

    let unknown = ctx
        .post(uri, Some(&cookie), json!({ "sessionId": "cs_test_nope" }))
        .await;
    assert_eq!(unknown.status, StatusCode::BAD_REQUEST);
    assert_eq!(unknown.body["message"], "Invalid or expired payment session");

    let created = ctx
        .post(
            "/api/payments/create-checkout-session",
            Some(&cookie),
            json!({ "products": [{ "id": jeans.id }] }),
        )
        .await;
    let session_id = created.body["id"].as_str().unwrap().to_string();

    let unpaid = ctx
        .post(uri, Some(&cookie), json!({ "sessionId": session_id }))
        .await;
    assert_eq!(unpaid.status, StatusCode::BAD_REQUEST);
    assert_eq!(unpaid.body["message"], "Payment was not completed");
    assert_eq!(unpaid.body["paymentStatus"], "unpaid");
    assert_eq!(unpaid.body["sessionId"], session_id);

    ctx.payments
        .set_payment_status(&session_id, PaymentStatus::Paid)
        .await;
    ctx.store.set_fail_writes(true).await;
    let failed = ctx
        .post(uri, Some(&cookie), json!({ "sessionId": session_id }))
        .await;
    assert_eq!(failed.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        failed.body["message"],
        "Payment successful but failed to create order record"
    );

    assert!(ctx.store.orders().await.is_empty());
}
