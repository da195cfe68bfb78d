//! Input checks run before the session manager sees a request.
//!
//! Every failing field is reported, not just the first one.

use regex::Regex;

use super::types::{LoginRequest, RegisterRequest, ResendVerificationRequest};
use crate::error::{AuthError, FieldError};

const MIN_PASSWORD_LENGTH: usize = 6;

const MSG_USERNAME_REQUIRED: &str = "Username is required";
const MSG_INVALID_EMAIL: &str = "Invalid email address";
const MSG_PASSWORD_TOO_SHORT: &str = "Password must be at least 6 characters long";

/// Basic email shape check; the value is trimmed first.
pub(super) fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email.trim()))
}

fn valid_password(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_LENGTH
}

fn check_email(email: &str, errors: &mut Vec<FieldError>) {
    if !valid_email(email) {
        errors.push(FieldError::new("email", MSG_INVALID_EMAIL));
    }
}

fn check_password(password: &str, errors: &mut Vec<FieldError>) {
    if !valid_password(password) {
        errors.push(FieldError::new("password", MSG_PASSWORD_TOO_SHORT));
    }
}

fn finish(errors: Vec<FieldError>) -> Result<(), AuthError> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AuthError::Validation(errors))
    }
}

pub(super) fn validate_register(request: &RegisterRequest) -> Result<(), AuthError> {
    let mut errors = Vec::new();
    if request.username.trim().is_empty() {
        errors.push(FieldError::new("username", MSG_USERNAME_REQUIRED));
    }
    check_email(&request.email, &mut errors);
    check_password(&request.password, &mut errors);
    finish(errors)
}

pub(super) fn validate_login(request: &LoginRequest) -> Result<(), AuthError> {
    let mut errors = Vec::new();
    check_email(&request.email, &mut errors);
    check_password(&request.password, &mut errors);
    finish(errors)
}

pub(super) fn validate_resend(request: &ResendVerificationRequest) -> Result<(), AuthError> {
    let mut errors = Vec::new();
    check_email(&request.email, &mut errors);
    finish(errors)
}
