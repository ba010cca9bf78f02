use std::sync::Arc;

use chrono::Duration;
use rental_hub::marketplace::accounts::{
    AccountFields, HomeownerRegistration, LoginForm, TenantRegistration,
};
use rental_hub::marketplace::bookings::{BookingForm, BookingResponseForm, BookingStatus};
use rental_hub::marketplace::catalog::{PropertyDraft, PropertyQuery};
use rental_hub::marketplace::{
    Marketplace, MarketplaceError, MarketplaceSettings, MemoryMailer, PasswordCost, RequestContext,
    SqlStore,
};

const PASSWORD: &str = "correct-horse";

fn settings() -> MarketplaceSettings {
    MarketplaceSettings {
        base_url: "http://localhost:3000".to_string(),
        from_address: "bookings@rental-hub.test".to_string(),
        maps_api_key: None,
        password_secret: "integration-secret".to_string(),
        password_cost: PasswordCost::Light,
        session_ttl: Duration::hours(2),
        password_reset_ttl_minutes: 30,
    }
}

fn fields(username: &str, first_name: &str) -> AccountFields {
    AccountFields {
        first_name: first_name.to_string(),
        last_name: "Patil".to_string(),
        username: username.to_string(),
        email: format!("{username}@example.org"),
        password: PASSWORD.to_string(),
        password_confirm: PASSWORD.to_string(),
    }
}

async fn sign_in(
    marketplace: &Marketplace<SqlStore, MemoryMailer>,
    username: &str,
) -> RequestContext {
    let grant = marketplace
        .accounts
        .login(LoginForm {
            username: username.to_string(),
            password: PASSWORD.to_string(),
        })
        .await
        .expect("login");
    marketplace
        .accounts
        .resolve(Some(&grant.token))
        .await
        .expect("session resolves")
}

async fn marketplace() -> (Marketplace<SqlStore, MemoryMailer>, MemoryMailer) {
    let mailer = MemoryMailer::default();
    let store = SqlStore::in_memory().await.expect("in-memory database");
    let marketplace = Marketplace::new(
        Arc::new(store),
        Arc::new(mailer.clone()),
        &settings(),
    );
    (marketplace, mailer)
}

#[tokio::test]
async fn tenant_request_accepted_by_owner_hides_listing() {
    let (marketplace, mailer) = marketplace().await;
    marketplace
        .accounts
        .register_homeowner(HomeownerRegistration {
            account: fields("sunil", "Sunil"),
            phone: "9000000001".to_string(),
        })
        .await
        .expect("owner registers");
    marketplace
        .accounts
        .register_tenant(TenantRegistration {
            account: fields("priya", "Priya"),
            phone: "9000000002".to_string(),
            village: "Aundh".to_string(),
            subdistrict: "Haveli".to_string(),
            district: "Pune".to_string(),
        })
        .await
        .expect("tenant registers");
    let owner = sign_in(&marketplace, "sunil").await;
    let tenant = sign_in(&marketplace, "priya").await;

    let draft: PropertyDraft = serde_json::from_value(serde_json::json!({
        "title": "Sunny 1BHK in Aundh",
        "room_type": "one_bhk",
        "city": "Pune",
        "area_location": "Aundh",
        "monthly_rent": 12000,
        "furnishing_status": "semi_furnished",
        "amenities": ["wifi", "parking"]
    }))
    .expect("draft");
    let property = marketplace
        .catalog
        .create(&owner, draft)
        .await
        .expect("listing published");

    let visible = marketplace
        .catalog
        .list(&PropertyQuery {
            city: Some("pune".to_string()),
            ..PropertyQuery::default()
        })
        .await
        .expect("search");
    assert_eq!(visible.len(), 1);

    let created = marketplace
        .bookings
        .create(
            &tenant,
            property.id,
            BookingForm {
                message: "Can I visit on Saturday?".to_string(),
            },
        )
        .await
        .expect("booking request");
    assert!(created.notified);
    assert_eq!(created.booking.status, BookingStatus::Pending);

    let requests = marketplace
        .bookings
        .incoming_requests(&owner)
        .await
        .expect("owner inbox");
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].counterpart, "Priya Patil");

    let responded = marketplace
        .bookings
        .respond(
            &owner,
            created.booking.id,
            BookingResponseForm {
                status: BookingStatus::Accepted,
                owner_response: "Saturday works.".to_string(),
            },
        )
        .await
        .expect("owner accepts");
    assert!(!responded.property_available);
    assert_eq!(
        responded.booking.owner_response.as_deref(),
        Some("Saturday works.")
    );

    let hidden = marketplace
        .catalog
        .list(&PropertyQuery::default())
        .await
        .expect("search");
    assert!(hidden.is_empty());

    let mine = marketplace
        .bookings
        .tenant_bookings(&tenant)
        .await
        .expect("tenant list");
    assert_eq!(mine[0].booking.status, BookingStatus::Accepted);
    assert_eq!(mine[0].counterpart, "Sunil Patil");

    let subjects: Vec<_> = mailer
        .sent()
        .into_iter()
        .map(|message| (message.to, message.subject))
        .collect();
    assert_eq!(
        subjects,
        vec![
            (
                "priya@example.org".to_string(),
                "Booking Request Received".to_string()
            ),
            (
                "priya@example.org".to_string(),
                "Booking Request Update".to_string()
            ),
        ]
    );

    let again = marketplace
        .bookings
        .create(&tenant, property.id, BookingForm::default())
        .await
        .expect_err("listing no longer available");
    assert!(matches!(again, MarketplaceError::Validation(_)));
}
