use chrono::Duration;
use clap::Args;
use rental_hub::error::AppError;
use rental_hub::marketplace::accounts::{
    AccountFields, HomeownerRegistration, LoginForm, PasswordCost, TenantRegistration,
};
use rental_hub::marketplace::bookings::{BookingForm, BookingResponseForm, BookingStatus};
use rental_hub::marketplace::catalog::{PropertyDraft, PropertyQuery, RoomType};
use rental_hub::marketplace::{
    Marketplace, MarketplaceSettings, MemoryMailer, RequestContext, SqlStore,
};
use std::collections::BTreeSet;
use std::sync::Arc;

const DEMO_PASSWORD: &str = "demo-password";

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// City of the demo listing
    #[arg(long, default_value = "Pune")]
    pub(crate) city: String,
    /// Monthly rent of the demo listing
    #[arg(long, default_value_t = 5000)]
    pub(crate) rent: u32,
    /// Have the owner reject the request instead of accepting it
    #[arg(long)]
    pub(crate) reject: bool,
}

fn demo_settings() -> MarketplaceSettings {
    MarketplaceSettings {
        base_url: "http://localhost:3000".to_string(),
        from_address: "noreply@example.com".to_string(),
        maps_api_key: None,
        password_secret: "demo-secret".to_string(),
        password_cost: PasswordCost::Light,
        session_ttl: Duration::hours(1),
        password_reset_ttl_minutes: 60,
    }
}

fn account(username: &str, first_name: &str, last_name: &str) -> AccountFields {
    AccountFields {
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        username: username.to_string(),
        email: format!("{username}@example.com"),
        password: DEMO_PASSWORD.to_string(),
        password_confirm: DEMO_PASSWORD.to_string(),
    }
}

async fn sign_in(
    marketplace: &Marketplace<SqlStore, MemoryMailer>,
    username: &str,
) -> Result<RequestContext, AppError> {
    let grant = marketplace
        .accounts
        .login(LoginForm {
            username: username.to_string(),
            password: DEMO_PASSWORD.to_string(),
        })
        .await?;
    Ok(marketplace.accounts.resolve(Some(&grant.token)).await?)
}

fn demo_listing(city: &str, rent: u32) -> PropertyDraft {
    PropertyDraft {
        title: format!("Sunny single room in {city}"),
        room_type: RoomType::Single,
        flat_system: Default::default(),
        city: city.to_string(),
        area_location: String::new(),
        full_address: String::new(),
        monthly_rent: rent,
        security_deposit: rent * 2,
        maintenance_charges: 0,
        max_people: 1,
        per_person_rent: None,
        main_image: None,
        floor_number: None,
        total_floors: None,
        furnishing_status: Default::default(),
        latitude: None,
        longitude: None,
        neighbourhood: Default::default(),
        mess: Default::default(),
        house_rules: Default::default(),
        available_from: None,
        min_stay_months: None,
        description: "Quiet room close to the bus stop.".to_string(),
        amenities: BTreeSet::new(),
    }
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs { city, rent, reject } = args;

    let mailer = MemoryMailer::default();
    let marketplace = Marketplace::new(
        Arc::new(SqlStore::in_memory().await?),
        Arc::new(mailer.clone()),
        &demo_settings(),
    );

    println!("Rental marketplace demo");
    marketplace.accounts.register_homeowner(HomeownerRegistration {
        account: account("owner", "Ravi", "Kulkarni"),
        phone: "9123456780".to_string(),
    })
    .await?;
    marketplace.accounts.register_tenant(TenantRegistration {
        account: account("tenant", "Asha", "Deshmukh"),
        phone: "9876543210".to_string(),
        village: "Kothrud".to_string(),
        subdistrict: "Haveli".to_string(),
        district: city.clone(),
    })
    .await?;
    let owner = sign_in(&marketplace, "owner").await?;
    let tenant = sign_in(&marketplace, "tenant").await?;
    println!("- Registered homeowner 'owner' and tenant 'tenant'");

    let property = marketplace
        .catalog
        .create(&owner, demo_listing(&city, rent))
        .await?;
    println!(
        "- Listed #{} \"{}\" at {} per month",
        property.id.0,
        property.title(),
        property.details.monthly_rent
    );

    let found = marketplace
        .catalog
        .list(&PropertyQuery {
            city: Some(city.clone()),
            max_rent: Some(rent.to_string()),
            ..PropertyQuery::default()
        })
        .await?;
    println!("- Search for {city} up to {rent}: {} result(s)", found.len());

    let created = marketplace
        .bookings
        .create(
            &tenant,
            property.id,
            BookingForm {
                message: "Is the room available from next month?".to_string(),
            },
        )
        .await?;
    println!(
        "- Tenant sent booking request #{} ({})",
        created.booking.id.0,
        created.booking.status.label()
    );

    let decision = if reject {
        BookingStatus::Rejected
    } else {
        BookingStatus::Accepted
    };
    let responded = marketplace
        .bookings
        .respond(
            &owner,
            created.booking.id,
            BookingResponseForm {
                status: decision,
                owner_response: "Thanks for reaching out.".to_string(),
            },
        )
        .await?;
    println!(
        "- Owner {} the request; listing available: {}",
        responded.booking.status.label(),
        responded.property_available
    );

    let visible = marketplace.catalog.list(&PropertyQuery::default()).await?;
    println!("- Listings still shown to visitors: {}", visible.len());

    let outbox = mailer.sent();
    println!("\nEmails sent ({})", outbox.len());
    for message in outbox {
        println!("  - to {}: {}", message.to, message.subject);
    }

    Ok(())
}
