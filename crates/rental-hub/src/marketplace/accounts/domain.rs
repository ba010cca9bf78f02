use chrono::{DateTime, Utc};
use email_address::EmailAddress;
use serde::{Deserialize, Serialize};

use crate::marketplace::authz::Role;
use crate::marketplace::error::ValidationError;

const MAX_USERNAME_LEN: usize = 150;

/// Identifier assigned by the store when an account is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

/// Identity and credentials. The password hash never leaves the service layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    pub date_joined: DateTime<Utc>,
}

impl UserAccount {
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_string()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactDetails {
    pub phone: String,
}

/// Postal details collected from tenants only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantAddress {
    pub village: String,
    pub subdistrict: String,
    pub district: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: UserId,
    pub role: Role,
    pub contact: ContactDetails,
    pub address: Option<TenantAddress>,
}

/// Profile half of an account that is created together with its user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProfile {
    pub role: Role,
    pub contact: ContactDetails,
    pub address: Option<TenantAddress>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    pub profile: NewProfile,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordResetToken {
    pub token: String,
    pub user_id: UserId,
    pub expires_at: DateTime<Utc>,
}

/// Fields shared by both registration forms.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountFields {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub password_confirm: String,
}

impl AccountFields {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = ValidationError::default();

        let username = self.username.trim();
        if username.is_empty() {
            errors.push("username", "Username is required.");
        } else if username.chars().count() > MAX_USERNAME_LEN {
            errors.push("username", "Username must be at most 150 characters.");
        } else if !username
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
        {
            errors.push(
                "username",
                "Username may contain only letters, digits and @/./+/-/_ characters.",
            );
        }

        if self.email.trim().is_empty() {
            errors.push("email", "Email is required.");
        } else if !EmailAddress::is_valid(self.email.trim()) {
            errors.push("email", "Enter a valid email address.");
        }

        if self.password.is_empty() {
            errors.push("password", "Password is required.");
        }

        if self.password != self.password_confirm {
            errors.push_form("Passwords do not match!");
        }

        errors.into_result()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TenantRegistration {
    #[serde(flatten)]
    pub account: AccountFields,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub village: String,
    #[serde(default)]
    pub subdistrict: String,
    #[serde(default)]
    pub district: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HomeownerRegistration {
    #[serde(flatten)]
    pub account: AccountFields,
    #[serde(default)]
    pub phone: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForgotPasswordForm {
    pub email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResetPasswordForm {
    pub token: String,
    pub password: String,
    pub password_confirm: String,
}

/// Partial profile update; absent fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub phone: Option<String>,
    pub village: Option<String>,
    pub subdistrict: Option<String>,
    pub district: Option<String>,
}

impl ProfileUpdate {
    pub fn touches_address(&self) -> bool {
        self.village.is_some() || self.subdistrict.is_some() || self.district.is_some()
    }
}

/// Completes the setup of an account that has no profile yet.
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileSetup {
    pub role: Role,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub village: String,
    #[serde(default)]
    pub subdistrict: String,
    #[serde(default)]
    pub district: String,
}

/// What the API exposes about an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountView {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<TenantAddress>,
}

impl AccountView {
    pub fn new(user: &UserAccount, profile: Option<&UserProfile>) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            display_name: user.display_name(),
            role: profile.map(|profile| profile.role),
            phone: profile.map(|profile| profile.contact.phone.clone()),
            address: profile.and_then(|profile| profile.address.clone()),
        }
    }
}
