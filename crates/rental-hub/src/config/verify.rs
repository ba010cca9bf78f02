//! Deploy-time verification that the environment carries every variable the service expects.

use std::path::Path;

use super::AppConfig;

/// Variables checked by [`verify_environment`], grouped the way operators think about them.
pub const REQUIRED_VARIABLES: &[(&str, &[&str])] = &[
    ("Application", &["APP_ENV", "SECRET_KEY", "APP_HOST", "APP_PORT", "APP_BASE_URL"]),
    ("Database", &["DB_ENGINE", "DB_NAME", "DB_USER", "DB_PASSWORD", "DB_HOST", "DB_PORT"]),
    (
        "Email",
        &[
            "EMAIL_BACKEND",
            "EMAIL_HOST",
            "EMAIL_PORT",
            "EMAIL_USE_TLS",
            "EMAIL_HOST_USER",
            "EMAIL_HOST_PASSWORD",
            "DEFAULT_FROM_EMAIL",
        ],
    ),
    ("APIs", &["GOOGLE_MAPS_API_KEY"]),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableStatus {
    pub name: &'static str,
    /// Display-safe value; `None` when the variable is unset.
    pub display_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableGroup {
    pub category: &'static str,
    pub variables: Vec<VariableStatus>,
}

impl VariableGroup {
    pub fn all_set(&self) -> bool {
        self.variables.iter().all(|var| var.display_value.is_some())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub name: &'static str,
    pub passed: bool,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationReport {
    pub checks: Vec<CheckResult>,
    pub groups: Vec<VariableGroup>,
}

impl VerificationReport {
    pub fn passed(&self) -> usize {
        self.checks.iter().filter(|check| check.passed).count()
    }

    pub fn total(&self) -> usize {
        self.checks.len()
    }

    pub fn all_passed(&self) -> bool {
        self.passed() == self.total()
    }
}

/// Masks values whose names suggest a credential, keeping only the first two characters.
pub fn display_value(name: &str, value: &str) -> String {
    if name.contains("PASSWORD") || name.contains("KEY") {
        let hidden = value.chars().count().saturating_sub(2);
        format!("****{}", "*".repeat(hidden))
    } else {
        value.to_string()
    }
}

pub fn verify_environment<F>(env_file: &Path, lookup: F) -> VerificationReport
where
    F: Fn(&str) -> Option<String>,
{
    let mut checks = Vec::new();

    let env_file_present = env_file.is_file();
    checks.push(CheckResult {
        name: ".env file existence",
        passed: env_file_present,
        detail: if env_file_present {
            format!("{} found", env_file.display())
        } else {
            format!("{} not found; copy .env.example to create it", env_file.display())
        },
    });

    let groups: Vec<VariableGroup> = REQUIRED_VARIABLES
        .iter()
        .map(|&(category, names)| VariableGroup {
            category,
            variables: names
                .iter()
                .map(|&name| VariableStatus {
                    name,
                    display_value: lookup(name)
                        .filter(|value| !value.is_empty())
                        .map(|value| display_value(name, &value)),
                })
                .collect(),
        })
        .collect();

    let unset: Vec<&str> = groups
        .iter()
        .flat_map(|group| group.variables.iter())
        .filter(|var| var.display_value.is_none())
        .map(|var| var.name)
        .collect();
    checks.push(CheckResult {
        name: "Environment variables",
        passed: unset.is_empty(),
        detail: if unset.is_empty() {
            "all required variables set".to_string()
        } else {
            format!("not set (defaults apply): {}", unset.join(", "))
        },
    });

    let config_check = match AppConfig::from_lookup(&lookup) {
        Ok(config) => CheckResult {
            name: "Configuration load",
            passed: true,
            detail: format!("{:?} configuration parsed", config.environment),
        },
        Err(err) => CheckResult {
            name: "Configuration load",
            passed: false,
            detail: err.to_string(),
        },
    };
    checks.push(config_check);

    VerificationReport { checks, groups }
}

/// Loads `env_file` (when present) into the process environment, then verifies it.
pub fn verify_env_file(env_file: &Path) -> VerificationReport {
    if env_file.is_file() {
        dotenvy::from_path(env_file).ok();
    }
    verify_environment(env_file, |key| std::env::var(key).ok())
}
