use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, Query, State,
    },
    http::{
        header::{AUTHORIZATION, COOKIE, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::Response,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::json;

use super::accounts::{
    ForgotPasswordForm, HomeownerRegistration, LoginForm, ProfileSetup, ProfileUpdate,
    ResetPasswordForm, TenantRegistration,
};
use super::authz::{Capability, RequestContext, Role};
use super::bookings::{BookingForm, BookingId, BookingResponseForm};
use super::catalog::{ImageUpload, PropertyDraft, PropertyId, PropertyQuery};
use super::error::{MarketplaceError, ValidationError};
use super::notifications::Mailer;
use super::store::MarketplaceStore;
use super::Marketplace;

pub mod responses;

pub use responses::{ApiError, Envelope, Flash, FlashLevel};
use responses::{ok, with_flash};

pub const SESSION_COOKIE: &str = "session_token";

type Shared<S, M> = State<Arc<Marketplace<S, M>>>;
type Payload<T> = Result<Json<T>, JsonRejection>;
type Id = Result<Path<u64>, PathRejection>;

/// Router exposing the marketplace JSON API.
pub fn marketplace_router<S, M>(marketplace: Arc<Marketplace<S, M>>) -> Router
where
    S: MarketplaceStore + 'static,
    M: Mailer + 'static,
{
    Router::new()
        .route(
            "/api/v1/properties",
            get(list_properties::<S, M>).post(create_property::<S, M>),
        )
        .route(
            "/api/v1/properties/:id",
            get(property_detail::<S, M>)
                .put(edit_property::<S, M>)
                .delete(delete_property::<S, M>),
        )
        .route(
            "/api/v1/properties/:id/availability",
            post(toggle_availability::<S, M>),
        )
        .route("/api/v1/properties/:id/images", post(add_image::<S, M>))
        .route("/api/v1/properties/:id/bookings", post(request_booking::<S, M>))
        .route("/api/v1/me/properties", get(my_properties::<S, M>))
        .route("/api/v1/me/bookings", get(my_bookings::<S, M>))
        .route("/api/v1/me/booking-requests", get(booking_requests::<S, M>))
        .route(
            "/api/v1/me/profile",
            get(view_profile::<S, M>)
                .put(update_profile::<S, M>)
                .post(complete_profile::<S, M>),
        )
        .route("/api/v1/bookings/:id/respond", post(respond_to_booking::<S, M>))
        .route("/api/v1/bookings/:id/cancel", post(cancel_booking::<S, M>))
        .route("/api/v1/register", get(register_choice))
        .route("/api/v1/register/tenant", post(register_tenant::<S, M>))
        .route("/api/v1/register/homeowner", post(register_homeowner::<S, M>))
        .route("/api/v1/login", post(login::<S, M>))
        .route("/api/v1/logout", post(logout::<S, M>))
        .route("/api/v1/forgot-password", post(forgot_password::<S, M>))
        .route("/api/v1/reset-password", post(reset_password::<S, M>))
        .with_state(marketplace)
}

/// Session token from `Authorization: Bearer` or the session cookie.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

async fn context<S, M>(
    marketplace: &Marketplace<S, M>,
    headers: &HeaderMap,
) -> Result<RequestContext, ApiError>
where
    S: MarketplaceStore + 'static,
    M: Mailer + 'static,
{
    Ok(marketplace
        .accounts
        .resolve(session_token(headers).as_deref())
        .await?)
}

/// Unpacks a JSON body once the caller is known to be allowed to send it.
fn payload<T: DeserializeOwned>(body: Payload<T>) -> Result<T, ApiError> {
    match body {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => Err(MarketplaceError::Validation(ValidationError::form(format!(
            "Invalid request body: {}",
            rejection.body_text()
        )))
        .into()),
    }
}

fn path_id(id: Id, entity: &'static str) -> Result<u64, ApiError> {
    id.map(|Path(id)| id)
        .map_err(|_| MarketplaceError::Unknown { entity }.into())
}

fn session_cookie(token: &str, max_age_seconds: i64) -> Option<HeaderValue> {
    HeaderValue::from_str(&format!(
        "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_seconds}"
    ))
    .ok()
}

pub(crate) async fn list_properties<S, M>(
    State(marketplace): Shared<S, M>,
    Query(query): Query<PropertyQuery>,
) -> Result<Response, ApiError>
where
    S: MarketplaceStore + 'static,
    M: Mailer + 'static,
{
    let properties = marketplace.catalog.list(&query).await?;
    Ok(ok(properties))
}

pub(crate) async fn property_detail<S, M>(
    State(marketplace): Shared<S, M>,
    id: Id,
    headers: HeaderMap,
) -> Result<Response, ApiError>
where
    S: MarketplaceStore + 'static,
    M: Mailer + 'static,
{
    let ctx = context(&marketplace, &headers).await?;
    let id = PropertyId(path_id(id, "property")?);
    let detail = marketplace.catalog.detail(&ctx, id).await?;
    Ok(ok(detail))
}

pub(crate) async fn create_property<S, M>(
    State(marketplace): Shared<S, M>,
    headers: HeaderMap,
    draft: Payload<PropertyDraft>,
) -> Result<Response, ApiError>
where
    S: MarketplaceStore + 'static,
    M: Mailer + 'static,
{
    let ctx = context(&marketplace, &headers).await?;
    ctx.require(Capability::PublishListings)?;
    let draft = payload(draft)?;
    let property = marketplace.catalog.create(&ctx, draft).await?;
    Ok(with_flash(
        StatusCode::CREATED,
        Flash::success("Property added successfully!"),
        property,
    ))
}

pub(crate) async fn edit_property<S, M>(
    State(marketplace): Shared<S, M>,
    id: Id,
    headers: HeaderMap,
    draft: Payload<PropertyDraft>,
) -> Result<Response, ApiError>
where
    S: MarketplaceStore + 'static,
    M: Mailer + 'static,
{
    let ctx = context(&marketplace, &headers).await?;
    let id = PropertyId(path_id(id, "property")?);
    marketplace.catalog.authorize_management(&ctx, id).await?;
    let draft = payload(draft)?;
    let property = marketplace.catalog.edit(&ctx, id, draft).await?;
    Ok(with_flash(
        StatusCode::OK,
        Flash::success("Property updated successfully!"),
        property,
    ))
}

pub(crate) async fn delete_property<S, M>(
    State(marketplace): Shared<S, M>,
    id: Id,
    headers: HeaderMap,
) -> Result<Response, ApiError>
where
    S: MarketplaceStore + 'static,
    M: Mailer + 'static,
{
    let ctx = context(&marketplace, &headers).await?;
    let id = path_id(id, "property")?;
    marketplace.catalog.delete(&ctx, PropertyId(id)).await?;
    Ok(with_flash(
        StatusCode::OK,
        Flash::success("Property deleted."),
        json!({ "id": id }),
    ))
}

pub(crate) async fn toggle_availability<S, M>(
    State(marketplace): Shared<S, M>,
    id: Id,
    headers: HeaderMap,
) -> Result<Response, ApiError>
where
    S: MarketplaceStore + 'static,
    M: Mailer + 'static,
{
    let ctx = context(&marketplace, &headers).await?;
    let id = PropertyId(path_id(id, "property")?);
    let property = marketplace.catalog.toggle_availability(&ctx, id).await?;
    let message = if property.available {
        "Property marked as available."
    } else {
        "Property marked as unavailable."
    };
    Ok(with_flash(StatusCode::OK, Flash::success(message), property))
}

pub(crate) async fn add_image<S, M>(
    State(marketplace): Shared<S, M>,
    id: Id,
    headers: HeaderMap,
    upload: Payload<ImageUpload>,
) -> Result<Response, ApiError>
where
    S: MarketplaceStore + 'static,
    M: Mailer + 'static,
{
    let ctx = context(&marketplace, &headers).await?;
    let id = PropertyId(path_id(id, "property")?);
    marketplace.catalog.authorize_management(&ctx, id).await?;
    let upload = payload(upload)?;
    let image = marketplace.catalog.add_image(&ctx, id, upload).await?;
    Ok(with_flash(
        StatusCode::CREATED,
        Flash::success("Image uploaded successfully!"),
        image,
    ))
}

pub(crate) async fn request_booking<S, M>(
    State(marketplace): Shared<S, M>,
    id: Id,
    headers: HeaderMap,
    form: Payload<BookingForm>,
) -> Result<Response, ApiError>
where
    S: MarketplaceStore + 'static,
    M: Mailer + 'static,
{
    let ctx = context(&marketplace, &headers).await?;
    let id = PropertyId(path_id(id, "property")?);
    ctx.actor()?;
    let form = payload(form)?;
    let created = marketplace.bookings.create(&ctx, id, form).await?;
    let message = if created.notified {
        "Booking request sent! Check your email."
    } else {
        "Booking request sent!"
    };
    Ok(with_flash(
        StatusCode::CREATED,
        Flash::success(message),
        created.booking,
    ))
}

pub(crate) async fn my_properties<S, M>(
    State(marketplace): Shared<S, M>,
    headers: HeaderMap,
) -> Result<Response, ApiError>
where
    S: MarketplaceStore + 'static,
    M: Mailer + 'static,
{
    let ctx = context(&marketplace, &headers).await?;
    Ok(ok(marketplace.catalog.my_properties(&ctx).await?))
}

pub(crate) async fn my_bookings<S, M>(
    State(marketplace): Shared<S, M>,
    headers: HeaderMap,
) -> Result<Response, ApiError>
where
    S: MarketplaceStore + 'static,
    M: Mailer + 'static,
{
    let ctx = context(&marketplace, &headers).await?;
    Ok(ok(marketplace.bookings.tenant_bookings(&ctx).await?))
}

pub(crate) async fn booking_requests<S, M>(
    State(marketplace): Shared<S, M>,
    headers: HeaderMap,
) -> Result<Response, ApiError>
where
    S: MarketplaceStore + 'static,
    M: Mailer + 'static,
{
    let ctx = context(&marketplace, &headers).await?;
    Ok(ok(marketplace.bookings.incoming_requests(&ctx).await?))
}

pub(crate) async fn respond_to_booking<S, M>(
    State(marketplace): Shared<S, M>,
    id: Id,
    headers: HeaderMap,
    form: Payload<BookingResponseForm>,
) -> Result<Response, ApiError>
where
    S: MarketplaceStore + 'static,
    M: Mailer + 'static,
{
    let ctx = context(&marketplace, &headers).await?;
    let id = BookingId(path_id(id, "booking request")?);
    marketplace.bookings.authorize_response(&ctx, id).await?;
    let form = payload(form)?;
    let responded = marketplace.bookings.respond(&ctx, id, form).await?;
    let message = format!(
        "Booking request {} successfully!",
        responded.booking.status.label()
    );
    Ok(with_flash(
        StatusCode::OK,
        Flash::success(message),
        json!({
            "booking": responded.booking,
            "property_available": responded.property_available,
        }),
    ))
}

pub(crate) async fn cancel_booking<S, M>(
    State(marketplace): Shared<S, M>,
    id: Id,
    headers: HeaderMap,
) -> Result<Response, ApiError>
where
    S: MarketplaceStore + 'static,
    M: Mailer + 'static,
{
    let ctx = context(&marketplace, &headers).await?;
    let id = BookingId(path_id(id, "booking request")?);
    let booking = marketplace.bookings.cancel(&ctx, id).await?;
    Ok(with_flash(
        StatusCode::OK,
        Flash::success("Booking request cancelled."),
        booking,
    ))
}

pub(crate) async fn view_profile<S, M>(
    State(marketplace): Shared<S, M>,
    headers: HeaderMap,
) -> Result<Response, ApiError>
where
    S: MarketplaceStore + 'static,
    M: Mailer + 'static,
{
    let ctx = context(&marketplace, &headers).await?;
    let view = marketplace.accounts.profile(&ctx).await?;
    if view.role.is_none() {
        return Ok(with_flash(
            StatusCode::OK,
            Flash::warning("Please complete your profile setup to continue."),
            view,
        ));
    }
    Ok(ok(view))
}

pub(crate) async fn update_profile<S, M>(
    State(marketplace): Shared<S, M>,
    headers: HeaderMap,
    update: Payload<ProfileUpdate>,
) -> Result<Response, ApiError>
where
    S: MarketplaceStore + 'static,
    M: Mailer + 'static,
{
    let ctx = context(&marketplace, &headers).await?;
    ctx.actor()?;
    let update = payload(update)?;
    let view = marketplace.accounts.update_profile(&ctx, update).await?;
    Ok(with_flash(
        StatusCode::OK,
        Flash::success("Profile updated successfully!"),
        view,
    ))
}

pub(crate) async fn complete_profile<S, M>(
    State(marketplace): Shared<S, M>,
    headers: HeaderMap,
    setup: Payload<ProfileSetup>,
) -> Result<Response, ApiError>
where
    S: MarketplaceStore + 'static,
    M: Mailer + 'static,
{
    let ctx = context(&marketplace, &headers).await?;
    ctx.actor()?;
    let setup = payload(setup)?;
    let view = marketplace.accounts.complete_profile(&ctx, setup).await?;
    Ok(with_flash(
        StatusCode::CREATED,
        Flash::success("Profile setup complete!"),
        view,
    ))
}

pub(crate) async fn register_choice() -> Response {
    let choices: Vec<_> = [Role::Tenant, Role::Homeowner]
        .into_iter()
        .map(|role| {
            json!({
                "role": role,
                "path": format!("/api/v1/register/{}", role.label()),
            })
        })
        .collect();
    ok(choices)
}

pub(crate) async fn register_tenant<S, M>(
    State(marketplace): Shared<S, M>,
    form: Payload<TenantRegistration>,
) -> Result<Response, ApiError>
where
    S: MarketplaceStore + 'static,
    M: Mailer + 'static,
{
    let user = marketplace.accounts.register_tenant(payload(form)?).await?;
    Ok(registered(user.id.0, &user.username))
}

pub(crate) async fn register_homeowner<S, M>(
    State(marketplace): Shared<S, M>,
    form: Payload<HomeownerRegistration>,
) -> Result<Response, ApiError>
where
    S: MarketplaceStore + 'static,
    M: Mailer + 'static,
{
    let user = marketplace.accounts.register_homeowner(payload(form)?).await?;
    Ok(registered(user.id.0, &user.username))
}

fn registered(id: u64, username: &str) -> Response {
    with_flash(
        StatusCode::CREATED,
        Flash::success("Registration successful! Please login."),
        json!({ "id": id, "username": username }),
    )
}

pub(crate) async fn login<S, M>(
    State(marketplace): Shared<S, M>,
    form: Payload<LoginForm>,
) -> Result<Response, ApiError>
where
    S: MarketplaceStore + 'static,
    M: Mailer + 'static,
{
    let grant = marketplace.accounts.login(payload(form)?).await?;
    let max_age = (grant.expires_at - Utc::now()).num_seconds().max(0);
    let cookie = session_cookie(&grant.token, max_age);
    let message = format!("Welcome back, {}!", grant.account.username);

    let mut response = with_flash(StatusCode::OK, Flash::success(message), grant);
    if let Some(cookie) = cookie {
        response.headers_mut().insert(SET_COOKIE, cookie);
    }
    Ok(response)
}

pub(crate) async fn logout<S, M>(
    State(marketplace): Shared<S, M>,
    headers: HeaderMap,
) -> Result<Response, ApiError>
where
    S: MarketplaceStore + 'static,
    M: Mailer + 'static,
{
    let ctx = context(&marketplace, &headers).await?;
    marketplace.accounts.logout(&ctx).await?;

    let mut response = with_flash(
        StatusCode::OK,
        Flash::success("Logged out successfully!"),
        serde_json::Value::Null,
    );
    if let Some(cookie) = session_cookie("", 0) {
        response.headers_mut().insert(SET_COOKIE, cookie);
    }
    Ok(response)
}

pub(crate) async fn forgot_password<S, M>(
    State(marketplace): Shared<S, M>,
    form: Payload<ForgotPasswordForm>,
) -> Result<Response, ApiError>
where
    S: MarketplaceStore + 'static,
    M: Mailer + 'static,
{
    marketplace.accounts.forgot_password(payload(form)?).await?;
    Ok(with_flash(
        StatusCode::OK,
        Flash::info("If an account exists for that email, a password reset link has been sent."),
        serde_json::Value::Null,
    ))
}

pub(crate) async fn reset_password<S, M>(
    State(marketplace): Shared<S, M>,
    form: Payload<ResetPasswordForm>,
) -> Result<Response, ApiError>
where
    S: MarketplaceStore + 'static,
    M: Mailer + 'static,
{
    marketplace.accounts.reset_password(payload(form)?).await?;
    Ok(with_flash(
        StatusCode::OK,
        Flash::success("Your password has been reset. Please login."),
        serde_json::Value::Null,
    ))
}
