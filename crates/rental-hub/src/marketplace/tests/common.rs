use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request};
use axum::response::Response;
use chrono::Duration;
use serde_json::{json, Value};

use crate::marketplace::accounts::{
    AccountFields, HomeownerRegistration, LoginForm, PasswordCost, TenantRegistration,
};
use crate::marketplace::authz::RequestContext;
use crate::marketplace::catalog::{Property, PropertyDraft};
use crate::marketplace::notifications::{Mailer, MemoryMailer};
use crate::marketplace::store::SqlStore;
use crate::marketplace::{marketplace_router, Marketplace, MarketplaceSettings};

pub(super) const PASSWORD: &str = "s3cure-pass";

pub(super) fn settings() -> MarketplaceSettings {
    MarketplaceSettings {
        base_url: "http://rentals.test".to_string(),
        from_address: "noreply@rentals.test".to_string(),
        maps_api_key: None,
        password_secret: "test-secret".to_string(),
        password_cost: PasswordCost::Light,
        session_ttl: Duration::hours(1),
        password_reset_ttl_minutes: 60,
    }
}

pub(super) fn account_fields(username: &str) -> AccountFields {
    AccountFields {
        first_name: "Test".to_string(),
        last_name: username.to_string(),
        username: username.to_string(),
        email: format!("{username}@example.com"),
        password: PASSWORD.to_string(),
        password_confirm: PASSWORD.to_string(),
    }
}

pub(super) fn tenant_form(username: &str) -> TenantRegistration {
    TenantRegistration {
        account: account_fields(username),
        phone: "9876543210".to_string(),
        village: "Kothrud".to_string(),
        subdistrict: "Haveli".to_string(),
        district: "Pune".to_string(),
    }
}

pub(super) fn homeowner_form(username: &str) -> HomeownerRegistration {
    HomeownerRegistration {
        account: account_fields(username),
        phone: "9123456780".to_string(),
    }
}

pub(super) fn draft(title: &str, city: &str, rent: u32) -> PropertyDraft {
    serde_json::from_value(json!({
        "title": title,
        "room_type": "single",
        "city": city,
        "monthly_rent": rent,
        "amenities": ["wifi", "bed"]
    }))
    .expect("draft parses")
}

/// Marketplace over a fresh in-memory database.
pub(super) struct Fixture<M = MemoryMailer> {
    pub(super) marketplace: Arc<Marketplace<SqlStore, M>>,
    pub(super) store: Arc<SqlStore>,
    pub(super) mailer: Arc<M>,
}

impl Fixture {
    pub(super) async fn new() -> Self {
        Self::with_settings(MemoryMailer::default(), settings()).await
    }

    pub(super) fn sent(&self) -> Vec<crate::marketplace::EmailMessage> {
        self.mailer.sent()
    }
}

impl<M: Mailer + 'static> Fixture<M> {
    pub(super) async fn with_settings(mailer: M, settings: MarketplaceSettings) -> Self {
        let store = Arc::new(SqlStore::in_memory().await.expect("in-memory database"));
        let mailer = Arc::new(mailer);
        let marketplace = Arc::new(Marketplace::new(store.clone(), mailer.clone(), &settings));
        Self {
            marketplace,
            store,
            mailer,
        }
    }

    pub(super) async fn token(&self, username: &str) -> String {
        self.marketplace
            .accounts
            .login(LoginForm {
                username: username.to_string(),
                password: PASSWORD.to_string(),
            })
            .await
            .expect("login succeeds")
            .token
    }

    pub(super) async fn context(&self, username: &str) -> RequestContext {
        let token = self.token(username).await;
        self.resolve(&token).await
    }

    pub(super) async fn resolve(&self, token: &str) -> RequestContext {
        self.marketplace
            .accounts
            .resolve(Some(token))
            .await
            .expect("session resolves")
    }

    pub(super) async fn tenant(&self, username: &str) -> RequestContext {
        self.marketplace
            .accounts
            .register_tenant(tenant_form(username))
            .await
            .expect("tenant registers");
        self.context(username).await
    }

    pub(super) async fn homeowner(&self, username: &str) -> RequestContext {
        self.marketplace
            .accounts
            .register_homeowner(homeowner_form(username))
            .await
            .expect("homeowner registers");
        self.context(username).await
    }

    pub(super) async fn listing(&self, owner: &RequestContext, title: &str, rent: u32) -> Property {
        self.marketplace
            .catalog
            .create(owner, draft(title, "Pune", rent))
            .await
            .expect("listing created")
    }

    pub(super) fn router(&self) -> axum::Router {
        marketplace_router(self.marketplace.clone())
    }
}

pub(super) fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder
        .body(Body::from(serde_json::to_vec(&body).expect("json body")))
        .expect("request builds")
}

pub(super) fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).expect("request builds")
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
