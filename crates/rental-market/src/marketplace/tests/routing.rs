use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use super::common::{marketplace, read_json_body};
use crate::marketplace::router::marketplace_router;

fn router() -> Router {
    marketplace_router(Arc::new(marketplace()))
}

async fn call(
    router: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => request.body(Body::empty()),
    }
    .expect("request");

    let response = router.clone().oneshot(request).await.expect("response");
    let status = response.status();
    if status == StatusCode::NO_CONTENT {
        return (status, Value::Null);
    }
    (status, read_json_body(response).await)
}

async fn sign_up(router: &Router, username: &str, role: &str) -> String {
    let (status, _) = call(
        router,
        Method::POST,
        "/api/v1/users",
        None,
        Some(json!({
            "username": username,
            "email": format!("{username}@example.com"),
            "password": "password123",
            "role": role,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = call(
        router,
        Method::POST,
        "/api/v1/token",
        None,
        Some(json!({ "username": username, "password": "password123" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["access"].as_str().expect("access token").to_string()
}

#[tokio::test]
async fn booking_lifecycle_over_http() {
    let router = router();
    let landlord = sign_up(&router, "landlord", "landlord").await;
    let tenant = sign_up(&router, "tenant1", "tenant").await;
    let intruder = sign_up(&router, "tenant2", "tenant").await;

    let (status, property) = call(
        &router,
        Method::POST,
        "/api/v1/properties",
        Some(&landlord),
        Some(json!({
            "title": "Sample Property",
            "location": "Berlin",
            "price": "1000",
            "room_count": 3,
            "property_type": "apartment",
            "owner": 999,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_ne!(property["owner"], 999);
    let property_id = property["id"].as_u64().expect("property id");

    let (status, booking) = call(
        &router,
        Method::POST,
        "/api/v1/bookings",
        Some(&tenant),
        Some(json!({
            "property": property_id,
            "start_date": "2024-12-01",
            "end_date": "2024-12-10",
            "status": "confirmed",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(booking["status"], "pending");
    let booking_uri = format!("/api/v1/bookings/{}", booking["id"]);

    let (status, _) = call(&router, Method::GET, &booking_uri, Some(&intruder), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, updated) = call(
        &router,
        Method::PATCH,
        &booking_uri,
        Some(&landlord),
        Some(json!({ "status": "confirmed" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["status"], "confirmed");

    let (status, inbox) = call(
        &router,
        Method::GET,
        "/api/v1/notifications",
        Some(&tenant),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(inbox.as_array().map(Vec::len), Some(1));
    assert_eq!(inbox[0]["event_type"], "booking_status_changed");
    assert_eq!(inbox[0]["is_read"], false);

    let (status, body) = call(
        &router,
        Method::PATCH,
        &booking_uri,
        Some(&landlord),
        Some(json!({ "status": "canceled" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "status");
}

#[tokio::test]
async fn anonymous_and_invalid_callers_are_rejected() {
    let router = router();

    let (status, body) = call(
        &router,
        Method::POST,
        "/api/v1/bookings",
        None,
        Some(json!({ "property": 1, "start_date": "2024-12-01", "end_date": "2024-12-02" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"].is_string());

    let (status, _) = call(&router, Method::GET, "/api/v1/notifications", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = call(
        &router,
        Method::GET,
        "/api/v1/properties",
        Some("not-a-real-token"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = call(&router, Method::GET, "/api/v1/bookings", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn property_filters_travel_through_the_query_string() {
    let router = router();
    let landlord = sign_up(&router, "landlord", "landlord").await;
    for (title, location, price) in [
        ("Berlin Studio", "Berlin", "600"),
        ("Berlin Loft", "Berlin", "1500"),
        ("Munich Flat", "Munich", "900"),
    ] {
        let (status, _) = call(
            &router,
            Method::POST,
            "/api/v1/properties",
            Some(&landlord),
            Some(json!({
                "title": title,
                "location": location,
                "price": price,
                "room_count": 1,
                "property_type": "studio",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = call(
        &router,
        Method::GET,
        "/api/v1/properties?location=Berlin&price__lte=1000&ordering=price",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let titles: Vec<&str> = body
        .as_array()
        .expect("array")
        .iter()
        .filter_map(|row| row["title"].as_str())
        .collect();
    assert_eq!(titles, vec!["Berlin Studio"]);
}

#[tokio::test]
async fn token_refresh_and_verify() {
    let router = router();
    let token = sign_up(&router, "henry", "tenant").await;

    let (status, _) = call(
        &router,
        Method::POST,
        "/api/v1/token/verify",
        None,
        Some(json!({ "token": token })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, refreshed) = call(
        &router,
        Method::POST,
        "/api/v1/token/refresh",
        None,
        Some(json!({ "token": token })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_ne!(refreshed["access"], json!(token));

    let (status, _) = call(
        &router,
        Method::POST,
        "/api/v1/token/verify",
        None,
        Some(json!({ "token": token })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn undecodable_bodies_answer_400_naming_the_field() {
    let router = router();
    let landlord = sign_up(&router, "landlord", "landlord").await;
    let tenant = sign_up(&router, "tenant1", "tenant").await;

    let (_, property) = call(
        &router,
        Method::POST,
        "/api/v1/properties",
        Some(&landlord),
        Some(json!({
            "title": "Sample Property",
            "location": "Berlin",
            "price": "1000",
            "room_count": 3,
            "property_type": "apartment",
        })),
    )
    .await;
    let property_id = property["id"].as_u64().expect("property id");

    let (status, body) = call(
        &router,
        Method::POST,
        "/api/v1/bookings",
        Some(&tenant),
        Some(json!({
            "property": property_id,
            "start_date": "2024-13-01",
            "end_date": "2024-12-10",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "start_date");
    assert!(body["detail"].is_string());

    let (_, booking) = call(
        &router,
        Method::POST,
        "/api/v1/bookings",
        Some(&tenant),
        Some(json!({
            "property": property_id,
            "start_date": "2024-12-01",
            "end_date": "2024-12-10",
        })),
    )
    .await;
    let booking_uri = format!("/api/v1/bookings/{}", booking["id"]);

    let (status, body) = call(
        &router,
        Method::PATCH,
        &booking_uri,
        Some(&landlord),
        Some(json!({ "status": "shipped" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "status");

    let (status, body) = call(
        &router,
        Method::POST,
        "/api/v1/reviews",
        Some(&tenant),
        Some(json!({ "property": property_id, "rating": "five", "comment": "Great" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "rating");

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/token")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"username\": "))
        .expect("request");
    let response = router.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json_body(response).await;
    assert!(body.get("field").is_none());
    assert!(body["error"].is_string());

    let (status, booking) = call(&router, Method::GET, &booking_uri, Some(&tenant), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(booking["status"], "pending");
}
