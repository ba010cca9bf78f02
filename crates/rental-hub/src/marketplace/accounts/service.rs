use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use email_address::EmailAddress;
use serde::Serialize;
use tracing::{debug, info};

use super::domain::{
    AccountFields, AccountView, ContactDetails, ForgotPasswordForm, HomeownerRegistration,
    LoginForm, NewAccount, NewProfile, PasswordResetToken, ProfileSetup, ProfileUpdate,
    ResetPasswordForm, Session, TenantAddress, TenantRegistration, UserAccount, UserProfile,
};
use super::passwords::{generate_token, Passwords};
use crate::marketplace::authz::{Actor, RequestContext, Role};
use crate::marketplace::error::{MarketplaceError, ValidationError};
use crate::marketplace::notifications::{Mailer, Notifier};
use crate::marketplace::store::{AccountRepository, RepositoryError, SessionRepository};
use crate::marketplace::MarketplaceSettings;

const INVALID_CREDENTIALS: &str = "Invalid username or password!";
const INVALID_RESET_TOKEN: &str = "This password reset link is invalid or has expired.";

/// Issued on a successful login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionGrant {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub account: AccountView,
}

/// Registration, authentication and profile maintenance.
pub struct AccountService<S, M> {
    store: Arc<S>,
    notifier: Notifier<M>,
    passwords: Passwords,
    session_ttl: Duration,
    reset_ttl_minutes: u32,
    base_url: String,
}

impl<S, M> AccountService<S, M>
where
    S: AccountRepository + SessionRepository + 'static,
    M: Mailer + 'static,
{
    pub fn new(store: Arc<S>, notifier: Notifier<M>, settings: &MarketplaceSettings) -> Self {
        Self {
            store,
            notifier,
            passwords: Passwords::new(
                settings.password_secret.as_bytes(),
                settings.password_cost,
            ),
            session_ttl: settings.session_ttl,
            reset_ttl_minutes: settings.password_reset_ttl_minutes,
            base_url: settings.base_url.clone(),
        }
    }

    pub async fn register_tenant(
        &self,
        form: TenantRegistration,
    ) -> Result<UserAccount, MarketplaceError> {
        let mut errors = collect(form.account.validate());
        require(&mut errors, "phone", &form.phone, "Phone number is required.");
        let address = tenant_address(&mut errors, &form.village, &form.subdistrict, &form.district);
        errors.into_result()?;

        self.register(
            &form.account,
            NewProfile {
                role: Role::Tenant,
                contact: ContactDetails {
                    phone: form.phone.trim().to_string(),
                },
                address: Some(address),
            },
        )
        .await
    }

    pub async fn register_homeowner(
        &self,
        form: HomeownerRegistration,
    ) -> Result<UserAccount, MarketplaceError> {
        let mut errors = collect(form.account.validate());
        require(&mut errors, "phone", &form.phone, "Phone number is required.");
        errors.into_result()?;

        self.register(
            &form.account,
            NewProfile {
                role: Role::Homeowner,
                contact: ContactDetails {
                    phone: form.phone.trim().to_string(),
                },
                address: None,
            },
        )
        .await
    }

    async fn register(
        &self,
        fields: &AccountFields,
        profile: NewProfile,
    ) -> Result<UserAccount, MarketplaceError> {
        let username = fields.username.trim();
        let email = fields.email.trim();

        if self.store.user_by_username(username).await?.is_some() {
            return Err(ValidationError::field("username", "Username already exists!").into());
        }
        if self.store.user_by_email(email).await?.is_some() {
            return Err(ValidationError::field("email", "Email already exists!").into());
        }

        let password_hash = self
            .passwords
            .hash(&fields.password)
            .map_err(|err| MarketplaceError::Internal(err.to_string()))?;
        let role = profile.role;

        let account = NewAccount {
            username: username.to_string(),
            email: email.to_string(),
            first_name: fields.first_name.trim().to_string(),
            last_name: fields.last_name.trim().to_string(),
            password_hash,
            profile,
        };

        let user = match self.store.create_account(account, Utc::now()).await {
            Ok(user) => user,
            Err(RepositoryError::Conflict) => {
                return Err(MarketplaceError::validation(
                    "An account with this username or email already exists.",
                ))
            }
            Err(err) => return Err(err.into()),
        };

        info!(user_id = user.id.0, username = %user.username, role = role.label(), "account registered");
        Ok(user)
    }

    pub async fn login(&self, form: LoginForm) -> Result<SessionGrant, MarketplaceError> {
        let user = self
            .store
            .user_by_username(form.username.trim())
            .await?
            .filter(|user| self.passwords.verify(&form.password, &user.password_hash))
            .ok_or_else(|| MarketplaceError::validation(INVALID_CREDENTIALS))?;

        let now = Utc::now();
        let session = Session {
            token: generate_token(),
            user_id: user.id,
            created_at: now,
            expires_at: now + self.session_ttl,
        };
        self.store.insert_session(session.clone()).await?;

        let profile = self.store.profile(user.id).await?;
        info!(user_id = user.id.0, "user logged in");

        Ok(SessionGrant {
            token: session.token,
            expires_at: session.expires_at,
            account: AccountView::new(&user, profile.as_ref()),
        })
    }

    pub async fn logout(&self, ctx: &RequestContext) -> Result<(), MarketplaceError> {
        if let Some(token) = ctx.session_token() {
            self.store.delete_session(token).await?;
            debug!(user_id = ctx.user_id().map(|id| id.0), "session closed");
        }
        Ok(())
    }

    /// Builds the request context for a session token. Unknown or expired tokens resolve to an
    /// anonymous context; the profile is read fresh every time.
    pub async fn resolve(&self, token: Option<&str>) -> Result<RequestContext, MarketplaceError> {
        let Some(token) = token.filter(|token| !token.is_empty()) else {
            return Ok(RequestContext::anonymous());
        };
        let Some(session) = self.store.session(token).await? else {
            return Ok(RequestContext::anonymous());
        };
        if session.is_expired(Utc::now()) {
            self.store.delete_session(token).await?;
            return Ok(RequestContext::anonymous());
        }
        let Some(user) = self.store.user(session.user_id).await? else {
            return Ok(RequestContext::anonymous());
        };
        let profile = self.store.profile(user.id).await?;

        Ok(RequestContext::authenticated(Actor { user, profile }, token))
    }

    /// Mails a reset link when the address belongs to an account. Returns `Ok` either way.
    pub async fn forgot_password(&self, form: ForgotPasswordForm) -> Result<(), MarketplaceError> {
        let email = form.email.trim();
        if !EmailAddress::is_valid(email) {
            return Err(ValidationError::field("email", "Enter a valid email address.").into());
        }

        let Some(user) = self.store.user_by_email(email).await? else {
            debug!("password reset requested for an unknown address");
            return Ok(());
        };

        let token = PasswordResetToken {
            token: generate_token(),
            user_id: user.id,
            expires_at: Utc::now() + Duration::minutes(i64::from(self.reset_ttl_minutes)),
        };
        let link = format!("{}/reset-password/{}/", self.base_url, token.token);
        self.store.insert_reset_token(token).await?;

        self.notifier
            .password_reset(&user.email, &link, self.reset_ttl_minutes)
            .await;
        info!(user_id = user.id.0, "password reset link issued");
        Ok(())
    }

    pub async fn reset_password(&self, form: ResetPasswordForm) -> Result<(), MarketplaceError> {
        let mut errors = ValidationError::default();
        if form.password.is_empty() {
            errors.push("password", "Password is required.");
        }
        if form.password != form.password_confirm {
            errors.push_form("Passwords do not match!");
        }
        errors.into_result()?;

        let token = self
            .store
            .take_reset_token(form.token.trim())
            .await?
            .filter(|token| token.expires_at > Utc::now())
            .ok_or_else(|| MarketplaceError::validation(INVALID_RESET_TOKEN))?;

        let password_hash = self
            .passwords
            .hash(&form.password)
            .map_err(|err| MarketplaceError::Internal(err.to_string()))?;
        match self.store.set_password_hash(token.user_id, password_hash).await {
            Err(RepositoryError::NotFound) => {
                return Err(MarketplaceError::validation(INVALID_RESET_TOKEN))
            }
            other => other?,
        }
        self.store.delete_sessions_for(token.user_id).await?;

        info!(user_id = token.user_id.0, "password reset completed");
        Ok(())
    }

    pub async fn profile(&self, ctx: &RequestContext) -> Result<AccountView, MarketplaceError> {
        let actor = ctx.actor()?;
        Ok(AccountView::new(&actor.user, actor.profile.as_ref()))
    }

    pub async fn update_profile(
        &self,
        ctx: &RequestContext,
        update: ProfileUpdate,
    ) -> Result<AccountView, MarketplaceError> {
        let actor = ctx.actor()?;
        let mut profile = actor
            .profile
            .clone()
            .ok_or(MarketplaceError::IncompleteProfile)?;

        let mut errors = ValidationError::default();
        if profile.role == Role::Homeowner && update.touches_address() {
            errors.push_form("Address fields apply to tenant profiles only.");
        }
        if let Some(phone) = &update.phone {
            require(&mut errors, "phone", phone, "Phone number is required.");
        }
        errors.into_result()?;

        if let Some(phone) = update.phone {
            profile.contact.phone = phone.trim().to_string();
        }
        if profile.role == Role::Tenant {
            let address = profile.address.get_or_insert_with(TenantAddress::default);
            if let Some(village) = update.village {
                address.village = village.trim().to_string();
            }
            if let Some(subdistrict) = update.subdistrict {
                address.subdistrict = subdistrict.trim().to_string();
            }
            if let Some(district) = update.district {
                address.district = district.trim().to_string();
            }
        }

        self.store.save_profile(profile.clone()).await?;
        info!(user_id = actor.user.id.0, "profile updated");
        Ok(AccountView::new(&actor.user, Some(&profile)))
    }

    /// Creates the profile for an account that does not have one yet.
    pub async fn complete_profile(
        &self,
        ctx: &RequestContext,
        setup: ProfileSetup,
    ) -> Result<AccountView, MarketplaceError> {
        let actor = ctx.actor()?;
        if actor.profile.is_some() {
            return Err(MarketplaceError::validation("Your profile is already set up."));
        }

        let mut errors = ValidationError::default();
        require(&mut errors, "phone", &setup.phone, "Phone number is required.");
        let address = match setup.role {
            Role::Tenant => Some(tenant_address(
                &mut errors,
                &setup.village,
                &setup.subdistrict,
                &setup.district,
            )),
            Role::Homeowner => None,
        };
        errors.into_result()?;

        let profile = UserProfile {
            user_id: actor.user.id,
            role: setup.role,
            contact: ContactDetails {
                phone: setup.phone.trim().to_string(),
            },
            address,
        };
        self.store.save_profile(profile.clone()).await?;

        info!(user_id = actor.user.id.0, role = setup.role.label(), "profile setup completed");
        Ok(AccountView::new(&actor.user, Some(&profile)))
    }
}

fn collect(result: Result<(), ValidationError>) -> ValidationError {
    result.err().unwrap_or_default()
}

fn require(errors: &mut ValidationError, field: &'static str, value: &str, message: &str) {
    if value.trim().is_empty() {
        errors.push(field, message);
    }
}

fn tenant_address(
    errors: &mut ValidationError,
    village: &str,
    subdistrict: &str,
    district: &str,
) -> TenantAddress {
    require(errors, "village", village, "Village is required.");
    require(errors, "subdistrict", subdistrict, "Sub-district is required.");
    require(errors, "district", district, "District is required.");

    TenantAddress {
        village: village.trim().to_string(),
        subdistrict: subdistrict.trim().to_string(),
        district: district.trim().to_string(),
    }
}
