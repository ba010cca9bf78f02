use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version,
};
use rand::distributions::Alphanumeric;
use rand::Rng;

const TOKEN_LEN: usize = 43;

/// Argon2 cost presets. `Light` keeps hashing fast for tests and demos.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PasswordCost {
    #[default]
    Standard,
    Light,
}

impl PasswordCost {
    fn params(self) -> Result<Params, PasswordError> {
        match self {
            PasswordCost::Standard => Ok(Params::default()),
            PasswordCost::Light => Params::new(Params::MIN_M_COST.max(64), 1, 1, None)
                .map_err(|err| PasswordError(err.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("password hashing failed: {0}")]
pub struct PasswordError(String);

/// Argon2id hashing peppered with the configured secret key.
#[derive(Clone)]
pub struct Passwords {
    pepper: Vec<u8>,
    cost: PasswordCost,
}

impl std::fmt::Debug for Passwords {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Passwords")
            .field("pepper", &"<redacted>")
            .field("cost", &self.cost)
            .finish()
    }
}

impl Passwords {
    pub fn new(pepper: impl Into<Vec<u8>>, cost: PasswordCost) -> Self {
        Self {
            pepper: pepper.into(),
            cost,
        }
    }

    fn argon2(&self) -> Result<Argon2<'_>, PasswordError> {
        Argon2::new_with_secret(
            &self.pepper,
            Algorithm::Argon2id,
            Version::V0x13,
            self.cost.params()?,
        )
        .map_err(|err| PasswordError(err.to_string()))
    }

    /// Returns the PHC string for `password` under a fresh salt.
    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()?
            .hash_password(password.as_bytes(), &salt)
            .map_err(|err| PasswordError(err.to_string()))?;
        Ok(hash.to_string())
    }

    pub fn verify(&self, password: &str, stored_hash: &str) -> bool {
        let hash = match PasswordHash::new(stored_hash) {
            Ok(hash) => hash,
            Err(err) => {
                tracing::error!("failed to parse password hash: {}", err);
                return false;
            }
        };

        match self.argon2() {
            Ok(argon2) => argon2.verify_password(password.as_bytes(), &hash).is_ok(),
            Err(err) => {
                tracing::error!(%err, "argon2 unavailable");
                false
            }
        }
    }
}

/// Opaque URL-safe token for sessions and password resets.
pub fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect()
}
