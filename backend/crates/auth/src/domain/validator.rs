//! Input validation
//!
//! Pure functions, no I/O. Password rules come from `platform::password`;
//! this module adds names and emails and aggregates the results.

use platform::password::{PasswordPolicyError, check_not_common, check_strength};

use crate::domain::value_object::Email;

pub const MIN_NAME_LENGTH: usize = 2;
pub const MAX_NAME_LENGTH: usize = 100;

/// Structural `local@domain.tld` check
pub fn validate_email_format(email: &str) -> bool {
    Email::is_valid_format(email.trim())
}

/// First violated strength rule, if any
pub fn validate_password_strength(password: &str) -> Result<(), PasswordPolicyError> {
    check_strength(password)
}

/// Deny-list check (case-insensitive)
pub fn validate_password_common(password: &str) -> Result<(), PasswordPolicyError> {
    check_not_common(password)
}

pub fn validate_name(name: &str) -> Result<(), String> {
    let len = name.trim().chars().count();
    if len < MIN_NAME_LENGTH || len > MAX_NAME_LENGTH {
        return Err(format!(
            "Name must be between {} and {} characters",
            MIN_NAME_LENGTH, MAX_NAME_LENGTH
        ));
    }
    Ok(())
}

/// Strength and deny-list together, both reasons reported
pub fn validate_new_password(password: &str) -> Result<(), Vec<String>> {
    let errors: Vec<String> = [
        validate_password_strength(password),
        validate_password_common(password),
    ]
    .into_iter()
    .filter_map(|r| r.err().map(|e| e.to_string()))
    .collect();

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

/// Every problem with a registration triple, not just the first
pub fn validate_user_data(name: &str, email: &str, password: &str) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    if let Err(e) = validate_name(name) {
        errors.push(e);
    }
    if !validate_email_format(email) {
        errors.push("Invalid email format".to_string());
    }
    if let Err(mut password_errors) = validate_new_password(password) {
        errors.append(&mut password_errors);
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}
