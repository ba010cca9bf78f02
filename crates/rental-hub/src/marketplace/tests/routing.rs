use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use super::common::*;
use crate::marketplace::router::session_token;

#[tokio::test]
async fn anonymous_visitors_can_browse() {
    let fixture = Fixture::new().await;
    let owner = fixture.homeowner("ravi").await;
    let property = fixture.listing(&owner, "Room near campus", 5000).await;
    let router = fixture.router();

    let response = router
        .clone()
        .oneshot(get_request("/api/v1/properties?city=pune&max_rent=oops", None))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["data"].as_array().map(Vec::len), Some(1));
    assert_eq!(payload["data"][0]["title"], "Room near campus");
    assert!(payload["data"][0].get("password_hash").is_none());

    let response = router
        .oneshot(get_request(&format!("/api/v1/properties/{}", property.id.0), None))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["data"]["owner_name"], "Test ravi");
    assert_eq!(payload["data"]["property"]["available"], true);
}

#[tokio::test]
async fn unknown_property_is_not_found() {
    let fixture = Fixture::new().await;

    let response = fixture
        .router()
        .oneshot(get_request("/api/v1/properties/77", None))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let payload = read_json_body(response).await;
    assert_eq!(payload["flash"]["message"], "Property 77 not found.");
}

#[tokio::test]
async fn protected_routes_redirect_to_login() {
    let fixture = Fixture::new().await;

    let response = fixture
        .router()
        .oneshot(json_request(
            "POST",
            "/api/v1/properties",
            None,
            json!({ "title": "Room", "room_type": "single", "city": "Pune", "monthly_rent": 100 }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let payload = read_json_body(response).await;
    assert_eq!(payload["redirect"], "/login");
}

#[tokio::test]
async fn register_login_and_publish_over_http() {
    let fixture = Fixture::new().await;
    let router = fixture.router();

    let response = router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/register/homeowner",
            None,
            json!({
                "first_name": "Ravi",
                "last_name": "Kulkarni",
                "username": "ravi",
                "email": "ravi@example.com",
                "password": PASSWORD,
                "password_confirm": PASSWORD,
                "phone": "9123456780"
            }),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = read_json_body(response).await;
    assert_eq!(payload["flash"]["message"], "Registration successful! Please login.");

    let response = router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/login",
            None,
            json!({ "username": "ravi", "password": PASSWORD }),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .expect("session cookie");
    assert!(cookie.starts_with("session_token="));
    let payload = read_json_body(response).await;
    assert_eq!(payload["flash"]["message"], "Welcome back, ravi!");
    let token = payload["data"]["token"].as_str().expect("token").to_string();
    assert_eq!(payload["data"]["account"]["role"], "homeowner");

    let response = router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/properties",
            Some(&token),
            json!({
                "title": "Room near campus",
                "room_type": "one_bhk",
                "city": "Pune",
                "monthly_rent": 5000,
                "amenities": ["wifi", "lift"]
            }),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = read_json_body(response).await;
    assert_eq!(payload["flash"]["level"], "success");
    assert_eq!(payload["data"]["amenities"], json!(["wifi", "lift"]));

    let response = router
        .oneshot(get_request("/api/v1/me/properties", Some(&token)))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["data"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn registration_errors_are_unprocessable() {
    let fixture = Fixture::new().await;

    let response = fixture
        .router()
        .oneshot(json_request(
            "POST",
            "/api/v1/register/tenant",
            None,
            json!({
                "username": "asha",
                "email": "asha@example.com",
                "password": "abc123",
                "password_confirm": "abc124",
                "phone": "9876543210",
                "village": "Kothrud",
                "subdistrict": "Haveli",
                "district": "Pune"
            }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let payload = read_json_body(response).await;
    assert_eq!(payload["flash"]["message"], "Passwords do not match!");
    assert!(payload["errors"].is_array());
}

#[tokio::test]
async fn booking_round_trip_over_http() {
    let fixture = Fixture::new().await;
    let owner = fixture.homeowner("ravi").await;
    fixture.tenant("asha").await;
    let property = fixture.listing(&owner, "Room near campus", 5000).await;
    let owner_token = owner.session_token().expect("owner token").to_string();
    let tenant_token = fixture.token("asha").await;
    let router = fixture.router();

    let response = router
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/v1/properties/{}/bookings", property.id.0),
            Some(&tenant_token),
            json!({ "message": "Hello" }),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = read_json_body(response).await;
    assert_eq!(
        payload["flash"]["message"],
        "Booking request sent! Check your email."
    );
    let booking_id = payload["data"]["id"].as_u64().expect("booking id");

    let response = router
        .clone()
        .oneshot(get_request("/api/v1/me/booking-requests", Some(&owner_token)))
        .await
        .expect("route executes");
    let payload = read_json_body(response).await;
    assert_eq!(payload["data"][0]["property_title"], "Room near campus");
    assert_eq!(payload["data"][0]["status"], "pending");

    let response = router
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/v1/bookings/{booking_id}/respond"),
            Some(&owner_token),
            json!({ "status": "accepted", "owner_response": "See you Monday" }),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["data"]["booking"]["status"], "accepted");
    assert_eq!(payload["data"]["property_available"], false);

    let response = router
        .oneshot(json_request(
            "POST",
            &format!("/api/v1/properties/{}/bookings", property.id.0),
            Some(&tenant_token),
            json!({ "message": "Again" }),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn strangers_get_forbidden_with_home_redirect() {
    let fixture = Fixture::new().await;
    let owner = fixture.homeowner("ravi").await;
    let stranger = fixture.homeowner("meera").await;
    let property = fixture.listing(&owner, "Room near campus", 5000).await;
    let stranger_token = stranger.session_token().expect("token").to_string();

    let response = fixture
        .router()
        .oneshot(json_request(
            "POST",
            &format!("/api/v1/properties/{}/availability", property.id.0),
            Some(&stranger_token),
            json!({}),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let payload = read_json_body(response).await;
    assert_eq!(payload["redirect"], "/");
}

#[tokio::test]
async fn strangers_are_refused_before_the_body_is_read() {
    let fixture = Fixture::new().await;
    let owner = fixture.homeowner("ravi").await;
    let stranger = fixture.homeowner("meera").await;
    let tenant = fixture.tenant("asha").await;
    let property = fixture.listing(&owner, "Room near campus", 5000).await;
    let booking = fixture
        .marketplace
        .bookings
        .create(&tenant, property.id, Default::default())
        .await
        .expect("request")
        .booking;
    let stranger_token = stranger.session_token().expect("token").to_string();
    let router = fixture.router();

    for body in [json!({ "status": "bogus" }), json!({})] {
        let response = router
            .clone()
            .oneshot(json_request(
                "POST",
                &format!("/api/v1/bookings/{}/respond", booking.id.0),
                Some(&stranger_token),
                body,
            ))
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let payload = read_json_body(response).await;
        assert_eq!(payload["redirect"], "/");
    }

    let response = router
        .clone()
        .oneshot(json_request(
            "PUT",
            &format!("/api/v1/properties/{}", property.id.0),
            Some(&stranger_token),
            json!({ "title": 7 }),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = router
        .oneshot(json_request(
            "POST",
            "/api/v1/properties",
            None,
            json!({ "title": "missing everything else" }),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn malformed_bodies_from_permitted_callers_are_unprocessable() {
    let fixture = Fixture::new().await;
    let owner = fixture.homeowner("ravi").await;
    let tenant = fixture.tenant("asha").await;
    let property = fixture.listing(&owner, "Room near campus", 5000).await;
    let booking = fixture
        .marketplace
        .bookings
        .create(&tenant, property.id, Default::default())
        .await
        .expect("request")
        .booking;
    let owner_token = owner.session_token().expect("token").to_string();
    let router = fixture.router();

    let response = router
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/v1/bookings/{}/respond", booking.id.0),
            Some(&owner_token),
            json!({ "status": "bogus" }),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let payload = read_json_body(response).await;
    assert_eq!(payload["flash"]["level"], "error");
    assert!(payload["flash"]["message"]
        .as_str()
        .unwrap_or_default()
        .starts_with("Invalid request body"));
    assert!(payload["errors"].is_array());

    let response = router
        .oneshot(json_request(
            "POST",
            "/api/v1/register/tenant",
            None,
            json!({ "username": ["not", "a", "string"] }),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let payload = read_json_body(response).await;
    assert!(payload["errors"].is_array());
}

#[tokio::test]
async fn non_numeric_ids_are_not_found() {
    let fixture = Fixture::new().await;
    let owner = fixture.homeowner("ravi").await;
    let owner_token = owner.session_token().expect("token").to_string();
    let router = fixture.router();

    let response = router
        .clone()
        .oneshot(get_request("/api/v1/properties/abc", None))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let payload = read_json_body(response).await;
    assert_eq!(payload["flash"]["message"], "Property not found.");

    let response = router
        .oneshot(json_request(
            "POST",
            "/api/v1/bookings/-1/cancel",
            Some(&owner_token),
            json!({}),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let payload = read_json_body(response).await;
    assert_eq!(payload["flash"]["message"], "Booking request not found.");
}

#[tokio::test]
async fn logout_clears_the_session() {
    let fixture = Fixture::new().await;
    fixture.tenant("asha").await;
    let token = fixture.token("asha").await;
    let router = fixture.router();

    let response = router
        .clone()
        .oneshot(json_request("POST", "/api/v1/logout", Some(&token), json!({})))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);

    let response = router
        .oneshot(get_request("/api/v1/me/bookings", Some(&token)))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn forgot_password_answers_the_same_for_any_address() {
    let fixture = Fixture::new().await;
    fixture.tenant("asha").await;
    let router = fixture.router();

    let mut messages = Vec::new();
    for email in ["asha@example.com", "nobody@example.com"] {
        let response = router
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/v1/forgot-password",
                None,
                json!({ "email": email }),
            ))
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::OK);
        messages.push(read_json_body(response).await["flash"]["message"].clone());
    }

    assert_eq!(messages[0], messages[1]);
    assert_eq!(fixture.sent().len(), 1);
}

#[tokio::test]
async fn register_choice_lists_both_roles() {
    let fixture = Fixture::new().await;

    let response = fixture
        .router()
        .oneshot(get_request("/api/v1/register", None))
        .await
        .expect("route executes");

    let payload = read_json_body(response).await;
    assert_eq!(payload["data"][0]["path"], "/api/v1/register/tenant");
    assert_eq!(payload["data"][1]["role"], "homeowner");
}

#[test]
fn session_token_prefers_bearer_then_cookie() {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::COOKIE,
        HeaderValue::from_static("theme=dark; session_token=from-cookie"),
    );
    assert_eq!(session_token(&headers).as_deref(), Some("from-cookie"));

    headers.insert(
        header::AUTHORIZATION,
        HeaderValue::from_static("Bearer from-header"),
    );
    assert_eq!(session_token(&headers).as_deref(), Some("from-header"));

    assert_eq!(session_token(&HeaderMap::new()), None);
}
