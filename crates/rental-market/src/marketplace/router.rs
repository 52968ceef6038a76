use std::sync::Arc;

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Path, Query, Request, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use super::catalog::PropertyQuery;
use super::domain::{
    BookingId, BookingStatusChange, NewAccount, NewBooking, NewCategory, NewProperty, NewReview,
    NotificationId, PropertyChanges, PropertyId, ReviewId, UserId,
};
use super::error::MarketplaceError;
use super::identity::{Actor, Credentials, IdentityProvider};
use super::reviews::ReviewFilter;
use super::store::MarketplaceStore;
use super::Marketplace;

type Shared<S> = State<Arc<Marketplace<S>>>;

/// Router builder exposing the marketplace over HTTP.
pub fn marketplace_router<S>(marketplace: Arc<Marketplace<S>>) -> Router
where
    S: MarketplaceStore + 'static,
{
    Router::new()
        .route(
            "/api/v1/users",
            post(register_handler::<S>).get(list_users_handler::<S>),
        )
        .route(
            "/api/v1/users/:user_id",
            get(user_handler::<S>).delete(delete_user_handler::<S>),
        )
        .route("/api/v1/token", post(token_handler::<S>))
        .route("/api/v1/token/refresh", post(refresh_token_handler::<S>))
        .route("/api/v1/token/verify", post(verify_token_handler::<S>))
        .route(
            "/api/v1/categories",
            get(list_categories_handler::<S>).post(create_category_handler::<S>),
        )
        .route(
            "/api/v1/properties",
            get(list_properties_handler::<S>).post(create_property_handler::<S>),
        )
        .route(
            "/api/v1/properties/:property_id",
            get(property_handler::<S>)
                .patch(update_property_handler::<S>)
                .delete(delete_property_handler::<S>),
        )
        .route(
            "/api/v1/properties/:property_id/views",
            post(increment_views_handler::<S>),
        )
        .route(
            "/api/v1/bookings",
            get(list_bookings_handler::<S>).post(create_booking_handler::<S>),
        )
        .route(
            "/api/v1/bookings/:booking_id",
            get(booking_handler::<S>)
                .patch(update_booking_handler::<S>)
                .delete(delete_booking_handler::<S>),
        )
        .route(
            "/api/v1/reviews",
            get(list_reviews_handler::<S>).post(create_review_handler::<S>),
        )
        .route("/api/v1/reviews/:review_id", get(review_handler::<S>))
        .route("/api/v1/notifications", get(notifications_handler::<S>))
        .route(
            "/api/v1/notifications/:notification_id/read",
            post(mark_read_handler::<S>),
        )
        .route("/api/v1/search-history", get(search_history_handler::<S>))
        .route("/api/v1/view-history", get(view_history_handler::<S>))
        .with_state(marketplace)
}

/// Missing `Authorization` means anonymous; a malformed or unknown token is
/// rejected outright.
pub(crate) fn resolve_actor<S>(
    marketplace: &Marketplace<S>,
    headers: &HeaderMap,
) -> Result<Actor, MarketplaceError>
where
    S: MarketplaceStore + 'static,
{
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(Actor::Anonymous);
    };
    let token = value
        .to_str()
        .ok()
        .and_then(|raw| raw.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(MarketplaceError::Unauthenticated)?;
    Ok(marketplace.identity.verify(token)?)
}

/// JSON body extractor whose failures surface as `400` with the offending
/// field, instead of axum's plain-text rejection.
#[derive(Debug)]
pub(crate) struct JsonBody<T>(pub(crate) T);

impl From<JsonRejection> for MarketplaceError {
    fn from(rejection: JsonRejection) -> Self {
        MarketplaceError::MalformedBody {
            field: None,
            detail: rejection.body_text(),
        }
    }
}

#[async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = MarketplaceError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<Value>::from_request(req, state).await?;
        serde_path_to_error::deserialize(value)
            .map(JsonBody)
            .map_err(|err| {
                let path = err.path().to_string();
                MarketplaceError::MalformedBody {
                    field: (path != ".").then_some(path),
                    detail: err.into_inner().to_string(),
                }
            })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct TokenPayload {
    token: String,
}

pub(crate) async fn register_handler<S>(
    State(marketplace): Shared<S>,
    JsonBody(account): JsonBody<NewAccount>,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore + 'static,
{
    let profile = marketplace.accounts.register(account)?;
    Ok((StatusCode::CREATED, Json(profile)).into_response())
}

pub(crate) async fn list_users_handler<S>(
    State(marketplace): Shared<S>,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore + 'static,
{
    Ok(Json(marketplace.accounts.list()?).into_response())
}

pub(crate) async fn user_handler<S>(
    State(marketplace): Shared<S>,
    Path(user_id): Path<UserId>,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore + 'static,
{
    Ok(Json(marketplace.accounts.get(user_id)?).into_response())
}

pub(crate) async fn delete_user_handler<S>(
    State(marketplace): Shared<S>,
    headers: HeaderMap,
    Path(user_id): Path<UserId>,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore + 'static,
{
    let actor = resolve_actor(&marketplace, &headers)?;
    marketplace.remove_account(&actor, user_id)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub(crate) async fn token_handler<S>(
    State(marketplace): Shared<S>,
    JsonBody(credentials): JsonBody<Credentials>,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore + 'static,
{
    let issued = marketplace.identity.issue(&credentials)?;
    Ok(Json(issued).into_response())
}

pub(crate) async fn refresh_token_handler<S>(
    State(marketplace): Shared<S>,
    JsonBody(payload): JsonBody<TokenPayload>,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore + 'static,
{
    let issued = marketplace.identity.refresh(&payload.token)?;
    Ok(Json(issued).into_response())
}

pub(crate) async fn verify_token_handler<S>(
    State(marketplace): Shared<S>,
    JsonBody(payload): JsonBody<TokenPayload>,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore + 'static,
{
    marketplace.identity.verify(&payload.token)?;
    Ok(Json(json!({})).into_response())
}

pub(crate) async fn list_categories_handler<S>(
    State(marketplace): Shared<S>,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore + 'static,
{
    Ok(Json(marketplace.categories.list()?).into_response())
}

pub(crate) async fn create_category_handler<S>(
    State(marketplace): Shared<S>,
    headers: HeaderMap,
    JsonBody(category): JsonBody<NewCategory>,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore + 'static,
{
    let actor = resolve_actor(&marketplace, &headers)?;
    let created = marketplace.categories.create(&actor, category)?;
    Ok((StatusCode::CREATED, Json(created)).into_response())
}

pub(crate) async fn list_properties_handler<S>(
    State(marketplace): Shared<S>,
    headers: HeaderMap,
    Query(query): Query<PropertyQuery>,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore + 'static,
{
    let actor = resolve_actor(&marketplace, &headers)?;
    Ok(Json(marketplace.properties.list(&actor, &query)?).into_response())
}

pub(crate) async fn create_property_handler<S>(
    State(marketplace): Shared<S>,
    headers: HeaderMap,
    JsonBody(request): JsonBody<NewProperty>,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore + 'static,
{
    let actor = resolve_actor(&marketplace, &headers)?;
    let created = marketplace.properties.create(&actor, request)?;
    Ok((StatusCode::CREATED, Json(created)).into_response())
}

pub(crate) async fn property_handler<S>(
    State(marketplace): Shared<S>,
    headers: HeaderMap,
    Path(property_id): Path<PropertyId>,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore + 'static,
{
    let actor = resolve_actor(&marketplace, &headers)?;
    Ok(Json(marketplace.properties.get(&actor, property_id)?).into_response())
}

pub(crate) async fn update_property_handler<S>(
    State(marketplace): Shared<S>,
    headers: HeaderMap,
    Path(property_id): Path<PropertyId>,
    JsonBody(changes): JsonBody<PropertyChanges>,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore + 'static,
{
    let actor = resolve_actor(&marketplace, &headers)?;
    let updated = marketplace
        .properties
        .update(&actor, property_id, changes)?;
    Ok(Json(updated).into_response())
}

pub(crate) async fn delete_property_handler<S>(
    State(marketplace): Shared<S>,
    headers: HeaderMap,
    Path(property_id): Path<PropertyId>,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore + 'static,
{
    let actor = resolve_actor(&marketplace, &headers)?;
    marketplace.properties.delete(&actor, property_id)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub(crate) async fn increment_views_handler<S>(
    State(marketplace): Shared<S>,
    Path(property_id): Path<PropertyId>,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore + 'static,
{
    Ok(Json(marketplace.properties.increment_views(property_id)?).into_response())
}

pub(crate) async fn list_bookings_handler<S>(
    State(marketplace): Shared<S>,
    headers: HeaderMap,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore + 'static,
{
    let actor = resolve_actor(&marketplace, &headers)?;
    Ok(Json(marketplace.bookings.list(&actor)?).into_response())
}

pub(crate) async fn create_booking_handler<S>(
    State(marketplace): Shared<S>,
    headers: HeaderMap,
    JsonBody(request): JsonBody<NewBooking>,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore + 'static,
{
    let actor = resolve_actor(&marketplace, &headers)?;
    let booking = marketplace.bookings.create(&actor, request)?;
    Ok((StatusCode::CREATED, Json(booking)).into_response())
}

pub(crate) async fn booking_handler<S>(
    State(marketplace): Shared<S>,
    headers: HeaderMap,
    Path(booking_id): Path<BookingId>,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore + 'static,
{
    let actor = resolve_actor(&marketplace, &headers)?;
    Ok(Json(marketplace.bookings.get(&actor, booking_id)?).into_response())
}

pub(crate) async fn update_booking_handler<S>(
    State(marketplace): Shared<S>,
    headers: HeaderMap,
    Path(booking_id): Path<BookingId>,
    JsonBody(change): JsonBody<BookingStatusChange>,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore + 'static,
{
    let actor = resolve_actor(&marketplace, &headers)?;
    let booking = marketplace
        .bookings
        .update_status(&actor, booking_id, change.status)?;
    Ok(Json(booking).into_response())
}

pub(crate) async fn delete_booking_handler<S>(
    State(marketplace): Shared<S>,
    headers: HeaderMap,
    Path(booking_id): Path<BookingId>,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore + 'static,
{
    let actor = resolve_actor(&marketplace, &headers)?;
    marketplace.bookings.delete(&actor, booking_id)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub(crate) async fn list_reviews_handler<S>(
    State(marketplace): Shared<S>,
    Query(filter): Query<ReviewFilter>,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore + 'static,
{
    Ok(Json(marketplace.reviews.list(filter)?).into_response())
}

pub(crate) async fn create_review_handler<S>(
    State(marketplace): Shared<S>,
    headers: HeaderMap,
    JsonBody(request): JsonBody<NewReview>,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore + 'static,
{
    let actor = resolve_actor(&marketplace, &headers)?;
    let review = marketplace.reviews.create(&actor, request)?;
    Ok((StatusCode::CREATED, Json(review)).into_response())
}

pub(crate) async fn review_handler<S>(
    State(marketplace): Shared<S>,
    Path(review_id): Path<ReviewId>,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore + 'static,
{
    Ok(Json(marketplace.reviews.get(review_id)?).into_response())
}

pub(crate) async fn notifications_handler<S>(
    State(marketplace): Shared<S>,
    headers: HeaderMap,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore + 'static,
{
    let actor = resolve_actor(&marketplace, &headers)?;
    Ok(Json(marketplace.notifications.list_for(&actor)?).into_response())
}

pub(crate) async fn mark_read_handler<S>(
    State(marketplace): Shared<S>,
    headers: HeaderMap,
    Path(notification_id): Path<NotificationId>,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore + 'static,
{
    let actor = resolve_actor(&marketplace, &headers)?;
    let notification = marketplace
        .notifications
        .mark_read(&actor, notification_id)?;
    Ok(Json(notification).into_response())
}

pub(crate) async fn search_history_handler<S>(
    State(marketplace): Shared<S>,
    headers: HeaderMap,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore + 'static,
{
    let actor = resolve_actor(&marketplace, &headers)?;
    Ok(Json(marketplace.activity.searches_for(&actor)?).into_response())
}

pub(crate) async fn view_history_handler<S>(
    State(marketplace): Shared<S>,
    headers: HeaderMap,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore + 'static,
{
    let actor = resolve_actor(&marketplace, &headers)?;
    Ok(Json(marketplace.activity.views_for(&actor)?).into_response())
}
