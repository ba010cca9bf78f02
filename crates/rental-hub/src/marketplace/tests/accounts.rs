use chrono::{Duration, Utc};

use super::common::*;
use crate::marketplace::accounts::{
    ForgotPasswordForm, LoginForm, ProfileSetup, ProfileUpdate, ResetPasswordForm, Session,
};
use crate::marketplace::authz::{Actor, RequestContext, Role};
use crate::marketplace::error::MarketplaceError;
use crate::marketplace::store::{AccountRepository, SessionRepository};

fn reset_token_from_outbox(fixture: &Fixture) -> String {
    let message = fixture.sent().pop().expect("reset email sent");
    let start = message
        .body
        .find("/reset-password/")
        .expect("link in body")
        + "/reset-password/".len();
    let rest = &message.body[start..];
    rest[..rest.find('/').expect("trailing slash")].to_string()
}

#[tokio::test]
async fn mismatched_passwords_create_no_user() {
    let fixture = Fixture::new().await;
    let mut form = tenant_form("asha");
    form.account.password = "abc123".to_string();
    form.account.password_confirm = "abc124".to_string();

    let err = fixture
        .marketplace
        .accounts
        .register_tenant(form)
        .await
        .expect_err("mismatch rejected");

    match err {
        MarketplaceError::Validation(errors) => {
            assert_eq!(errors.summary(), "Passwords do not match!")
        }
        other => panic!("expected validation error, got {other:?}"),
    }
    assert!(fixture.store.user_by_username("asha").await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_username_and_email_are_rejected() {
    let fixture = Fixture::new().await;
    fixture.tenant("asha").await;

    let err = fixture
        .marketplace
        .accounts
        .register_homeowner(homeowner_form("asha"))
        .await
        .expect_err("username taken");
    assert_eq!(err.to_string(), "Username already exists!");

    let mut form = homeowner_form("ravi");
    form.account.email = "ASHA@example.com".to_string();
    let err = fixture
        .marketplace
        .accounts
        .register_homeowner(form)
        .await
        .expect_err("email taken");
    assert_eq!(err.to_string(), "Email already exists!");
}

#[tokio::test]
async fn tenant_registration_requires_address_but_homeowner_does_not() {
    let fixture = Fixture::new().await;
    let mut tenant = tenant_form("asha");
    tenant.village.clear();
    tenant.district = "  ".to_string();

    match fixture.marketplace.accounts.register_tenant(tenant).await {
        Err(MarketplaceError::Validation(errors)) => {
            assert!(errors.has_field("village"));
            assert!(errors.has_field("district"));
            assert!(!errors.has_field("subdistrict"));
        }
        other => panic!("expected validation error, got {other:?}"),
    }

    let owner = fixture
        .marketplace
        .accounts
        .register_homeowner(homeowner_form("ravi"))
        .await
        .expect("homeowner registers");
    let profile = fixture.store.profile(owner.id).await.unwrap().expect("profile");
    assert_eq!(profile.role, Role::Homeowner);
    assert!(profile.address.is_none());
}

#[tokio::test]
async fn registration_validates_email_syntax() {
    let fixture = Fixture::new().await;
    let mut form = homeowner_form("ravi");
    form.account.email = "not-an-email".to_string();

    match fixture.marketplace.accounts.register_homeowner(form).await {
        Err(MarketplaceError::Validation(errors)) => assert!(errors.has_field("email")),
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[tokio::test]
async fn login_issues_sessions_and_rejects_bad_passwords() {
    let fixture = Fixture::new().await;
    fixture.tenant("asha").await;

    let err = fixture
        .marketplace
        .accounts
        .login(LoginForm {
            username: "asha".to_string(),
            password: "wrong".to_string(),
        })
        .await
        .expect_err("bad password");
    assert_eq!(err.to_string(), "Invalid username or password!");

    let ctx = fixture.context("asha").await;
    assert!(ctx.is_authenticated());
    assert_eq!(ctx.role().expect("role"), Role::Tenant);
}

#[tokio::test]
async fn logout_ends_the_session() {
    let fixture = Fixture::new().await;
    fixture.tenant("asha").await;
    let token = fixture.token("asha").await;
    let ctx = fixture.resolve(&token).await;

    fixture.marketplace.accounts.logout(&ctx).await.expect("logout");
    fixture.marketplace.accounts.logout(&ctx).await.expect("logout is idempotent");

    assert!(!fixture.resolve(&token).await.is_authenticated());
}

#[tokio::test]
async fn expired_sessions_resolve_to_anonymous() {
    let fixture = Fixture::new().await;
    let user = fixture
        .marketplace
        .accounts
        .register_tenant(tenant_form("asha"))
        .await
        .expect("registers");
    let now = Utc::now();
    fixture
        .store
        .insert_session(Session {
            token: "stale".to_string(),
            user_id: user.id,
            created_at: now - Duration::hours(5),
            expires_at: now - Duration::hours(1),
        })
        .await
        .expect("insert");

    assert!(!fixture.resolve("stale").await.is_authenticated());
    assert!(fixture.store.session("stale").await.unwrap().is_none());
    assert!(!fixture.resolve("never-issued").await.is_authenticated());
}

#[tokio::test]
async fn role_changes_apply_on_the_next_request() {
    let fixture = Fixture::new().await;
    let ctx = fixture.tenant("asha").await;
    let token = ctx.session_token().expect("token").to_string();
    let user_id = ctx.user_id().expect("user");

    let mut profile = fixture.store.profile(user_id).await.unwrap().expect("profile");
    profile.role = Role::Homeowner;
    fixture.store.save_profile(profile).await.expect("save");

    assert_eq!(fixture.resolve(&token).await.role().expect("role"), Role::Homeowner);
}

#[tokio::test]
async fn forgot_password_mails_a_single_use_link() {
    let fixture = Fixture::new().await;
    fixture.tenant("asha").await;

    fixture
        .marketplace
        .accounts
        .forgot_password(ForgotPasswordForm {
            email: "asha@example.com".to_string(),
        })
        .await
        .expect("reset requested");
    let sent = fixture.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "asha@example.com");
    assert!(sent[0].body.contains("http://rentals.test/reset-password/"));

    let token = reset_token_from_outbox(&fixture);
    let reset_form = || ResetPasswordForm {
        token: token.clone(),
        password: "brand-new-pass".to_string(),
        password_confirm: "brand-new-pass".to_string(),
    };
    fixture
        .marketplace
        .accounts
        .reset_password(reset_form())
        .await
        .expect("first reset succeeds");
    assert!(matches!(
        fixture.marketplace.accounts.reset_password(reset_form()).await,
        Err(MarketplaceError::Validation(_))
    ));

    fixture
        .marketplace
        .accounts
        .login(LoginForm {
            username: "asha".to_string(),
            password: "brand-new-pass".to_string(),
        })
        .await
        .expect("new password works");
}

#[tokio::test]
async fn password_reset_signs_out_existing_sessions() {
    let fixture = Fixture::new().await;
    fixture.tenant("asha").await;
    let token = fixture.token("asha").await;

    fixture
        .marketplace
        .accounts
        .forgot_password(ForgotPasswordForm {
            email: "asha@example.com".to_string(),
        })
        .await
        .expect("reset requested");
    fixture
        .marketplace
        .accounts
        .reset_password(ResetPasswordForm {
            token: reset_token_from_outbox(&fixture),
            password: "brand-new-pass".to_string(),
            password_confirm: "brand-new-pass".to_string(),
        })
        .await
        .expect("reset");

    assert!(!fixture.resolve(&token).await.is_authenticated());
}

#[tokio::test]
async fn forgot_password_is_silent_for_unknown_addresses() {
    let fixture = Fixture::new().await;

    fixture
        .marketplace
        .accounts
        .forgot_password(ForgotPasswordForm {
            email: "nobody@example.com".to_string(),
        })
        .await
        .expect("same response for unknown email");
    assert!(fixture.sent().is_empty());
}

#[tokio::test]
async fn reset_with_mismatched_passwords_keeps_the_token() {
    let fixture = Fixture::new().await;
    fixture.tenant("asha").await;
    fixture
        .marketplace
        .accounts
        .forgot_password(ForgotPasswordForm {
            email: "asha@example.com".to_string(),
        })
        .await
        .expect("reset requested");
    let token = reset_token_from_outbox(&fixture);

    let mismatch = fixture
        .marketplace
        .accounts
        .reset_password(ResetPasswordForm {
            token: token.clone(),
            password: "one".to_string(),
            password_confirm: "two".to_string(),
        })
        .await;
    assert!(matches!(mismatch, Err(MarketplaceError::Validation(_))));
    assert!(fixture.store.take_reset_token(&token).await.unwrap().is_some());
}

#[tokio::test]
async fn homeowners_cannot_set_address_fields() {
    let fixture = Fixture::new().await;
    let owner = fixture.homeowner("ravi").await;

    let err = fixture
        .marketplace
        .accounts
        .update_profile(
            &owner,
            ProfileUpdate {
                village: Some("Baner".to_string()),
                ..ProfileUpdate::default()
            },
        )
        .await
        .expect_err("address is tenant-only");
    assert!(matches!(err, MarketplaceError::Validation(_)));

    let view = fixture
        .marketplace
        .accounts
        .update_profile(
            &owner,
            ProfileUpdate {
                phone: Some("9000000000".to_string()),
                ..ProfileUpdate::default()
            },
        )
        .await
        .expect("phone update");
    assert_eq!(view.phone.as_deref(), Some("9000000000"));
}

#[tokio::test]
async fn tenants_update_address_piecewise() {
    let fixture = Fixture::new().await;
    let tenant = fixture.tenant("asha").await;

    let view = fixture
        .marketplace
        .accounts
        .update_profile(
            &tenant,
            ProfileUpdate {
                district: Some("Satara".to_string()),
                ..ProfileUpdate::default()
            },
        )
        .await
        .expect("update");
    let address = view.address.expect("address");
    assert_eq!(address.district, "Satara");
    assert_eq!(address.village, "Kothrud");
}

#[tokio::test]
async fn profile_setup_only_runs_once() {
    let fixture = Fixture::new().await;
    let tenant = fixture.tenant("asha").await;
    let user = tenant.actor().expect("actor").user.clone();
    let without_profile = RequestContext::authenticated(
        Actor {
            user: user.clone(),
            profile: None,
        },
        "token",
    );

    assert!(matches!(
        fixture
            .marketplace
            .accounts
            .update_profile(&without_profile, ProfileUpdate::default())
            .await,
        Err(MarketplaceError::IncompleteProfile)
    ));

    let view = fixture
        .marketplace
        .accounts
        .complete_profile(
            &without_profile,
            ProfileSetup {
                role: Role::Homeowner,
                phone: "9000000000".to_string(),
                village: String::new(),
                subdistrict: String::new(),
                district: String::new(),
            },
        )
        .await
        .expect("setup completes");
    assert_eq!(view.role, Some(Role::Homeowner));
    assert_eq!(
        fixture.store.profile(user.id).await.unwrap().map(|p| p.role),
        Some(Role::Homeowner)
    );

    let again = fixture.marketplace.accounts.complete_profile(
        &tenant,
        ProfileSetup {
            role: Role::Tenant,
            phone: "9000000000".to_string(),
            village: "a".to_string(),
            subdistrict: "b".to_string(),
            district: "c".to_string(),
        },
    ).await;
    assert!(matches!(again, Err(MarketplaceError::Validation(_))));
}
