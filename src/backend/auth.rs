// Sign-in / sign-up failure classification.
// The hosted service reports failures as free text; the front end only needs
// to tell a few cases apart.

use thiserror::Error;

use super::BackendError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthFailure {
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Please confirm your email address before signing in")]
    EmailNotConfirmed,
    #[error("Passwords do not match")]
    PasswordMismatch,
    #[error("Email and password are required")]
    MissingInput,
    #[error("{0}")]
    Other(String),
}

const GENERIC_SIGN_IN: &str = "Failed to sign in. Please try again.";

impl AuthFailure {
    /// Short text suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            AuthFailure::Other(message) if message.trim().is_empty() => GENERIC_SIGN_IN.to_string(),
            other => other.to_string(),
        }
    }

    pub fn from_message(message: &str) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("invalid login credentials") || lower.contains("invalid_grant") {
            AuthFailure::InvalidCredentials
        } else if lower.contains("email not confirmed") {
            AuthFailure::EmailNotConfirmed
        } else {
            AuthFailure::Other(message.to_string())
        }
    }
}

impl From<BackendError> for AuthFailure {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Api { message, .. } => AuthFailure::from_message(&message),
            other => AuthFailure::Other(other.to_string()),
        }
    }
}

/// Form checks done before any call is made.
pub fn validate_sign_in(email: &str, password: &str) -> Result<(), AuthFailure> {
    if email.trim().is_empty() || password.is_empty() {
        return Err(AuthFailure::MissingInput);
    }
    Ok(())
}

pub fn validate_sign_up(email: &str, password: &str, confirm_password: &str) -> Result<(), AuthFailure> {
    validate_sign_in(email, password)?;
    if password != confirm_password {
        return Err(AuthFailure::PasswordMismatch);
    }
    Ok(())
}
