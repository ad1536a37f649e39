use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, Utc};
use rand_core::OsRng;

use crate::errors::AppError;

const MIN_PASSWORD_LENGTH: usize = 8;

pub fn hash_password(password: &str) -> Result<String, AppError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(AppError::bad_request(format!(
            "Password must be at least {} characters long",
            MIN_PASSWORD_LENGTH
        )));
    }

    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AppError::internal(format!("failed to hash password: {err}")))
}

pub fn verify_password(password: &str, password_hash: &str) -> Result<bool, AppError> {
    let parsed_hash = PasswordHash::new(password_hash)
        .map_err(|err| AppError::internal(format!("invalid password hash: {err}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

pub fn utc_now() -> DateTime<Utc> {
    Utc::now()
}

/// `"Service Desk Lead"` -> `"service_desk_lead"`
pub fn code_from_label(label: &str) -> String {
    label
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .to_lowercase()
}

/// Builds `<entity>.<action>` from an entity code such as `entity.requests`;
/// only the last dotted segment of the entity code is kept.
pub fn permission_code(entity_code: &str, action: &str) -> String {
    let entity = entity_code.rsplit('.').next().unwrap_or(entity_code);
    format!("{}.{}", entity, action).to_lowercase()
}

/// Loose `local@domain.tld` shape check, no whitespace anywhere.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }

    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }

    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}

/// Trimmed and upper-cased ISO-3 country code.
pub fn normalize_country(country: &str) -> Result<String, AppError> {
    let country = country.trim();
    if country.chars().count() != 3 || !country.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(AppError::bad_request("Country must be a 3-letter ISO code"));
    }
    Ok(country.to_ascii_uppercase())
}
