//! Users, profiles, sessions and password management.

pub mod domain;
pub mod passwords;
pub mod service;

pub use domain::{
    AccountFields, AccountView, ContactDetails, ForgotPasswordForm, HomeownerRegistration,
    LoginForm, NewAccount, NewProfile, PasswordResetToken, ProfileSetup, ProfileUpdate,
    ResetPasswordForm, Session, TenantAddress, TenantRegistration, UserAccount, UserId,
    UserProfile,
};
pub use passwords::{generate_token, PasswordCost, PasswordError, Passwords};
pub use service::{AccountService, SessionGrant};
