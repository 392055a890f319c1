// Hosted auth/data service boundary
// Accounts, profiles, restaurants and reviews live in an external service.
// HostedBackend is the seam; BackendService makes sure no failure from it
// ever reaches the caller as anything worse than an empty result.

use async_trait::async_trait;
use log::{error, info, warn};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

pub mod auth;
pub mod models;
pub mod rest;

pub use auth::AuthFailure;
pub use models::{AuthSession, Profile, Restaurant, Review};
pub use rest::RestBackend;

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;

/// Errors that can occur when talking to the hosted service
#[derive(Debug, Error)]
pub enum BackendError {
    /// Transport failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with an error payload
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The call needs a signed-in user
    #[error("Not signed in")]
    NotAuthenticated,

    /// Rating outside 1..=5
    #[error("Invalid rating: {0}")]
    InvalidRating(u8),

    /// Unexpected response body
    #[error("Decoding error: {0}")]
    Decode(#[from] serde_json::Error),
}

impl BackendError {
    /// The service rejected the access token.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, BackendError::Api { status: 401, .. })
    }
}

pub type BackendResult<T> = std::result::Result<T, BackendError>;

pub fn check_rating(rating: u8) -> BackendResult<()> {
    if (MIN_RATING..=MAX_RATING).contains(&rating) {
        Ok(())
    } else {
        Err(BackendError::InvalidRating(rating))
    }
}

#[async_trait]
pub trait HostedBackend: Send + Sync {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        first_name: &str,
        last_name: &str,
    ) -> BackendResult<AuthSession>;
    async fn sign_in(&self, email: &str, password: &str) -> BackendResult<AuthSession>;
    async fn sign_out(&self) -> BackendResult<()>;
    /// Trade the refresh token for a new session.
    /// `Ok(false)` when there is nothing to refresh with.
    async fn refresh_session(&self) -> BackendResult<bool>;
    /// The session currently in use, if any.
    async fn session(&self) -> Option<AuthSession>;

    async fn current_profile(&self) -> BackendResult<Option<Profile>>;
    async fn update_profile(&self, first_name: &str, last_name: &str) -> BackendResult<Option<Profile>>;

    async fn restaurants(&self) -> BackendResult<Vec<Restaurant>>;
    async fn restaurant_with_reviews(&self, restaurant_id: &str) -> BackendResult<Option<Restaurant>>;

    async fn add_review(&self, restaurant_id: &str, rating: u8, review_text: &str) -> BackendResult<Review>;
    async fn update_review(&self, review_id: &str, rating: u8, review_text: &str) -> BackendResult<Review>;
    async fn delete_review(&self, review_id: &str) -> BackendResult<()>;
    async fn user_reviews(&self) -> BackendResult<Vec<Review>>;
}

/// Failure-tolerant front for a `HostedBackend`.
/// Every error is logged and turned into an empty/None/false result.
/// A call rejected with 401 is retried once after refreshing the session.
#[derive(Clone)]
pub struct BackendService {
    backend: Arc<dyn HostedBackend>,
}

impl BackendService {
    pub fn new(backend: Arc<dyn HostedBackend>) -> Self {
        Self { backend }
    }

    pub async fn session(&self) -> Option<AuthSession> {
        self.backend.session().await
    }

    async fn with_refresh<'a, T, F, Fut>(&'a self, call: F) -> BackendResult<T>
    where
        F: Fn(&'a dyn HostedBackend) -> Fut,
        Fut: Future<Output = BackendResult<T>>,
    {
        let backend = self.backend.as_ref();
        let rejected = match call(backend).await {
            Err(e) if e.is_unauthorized() => e,
            other => return other,
        };

        match backend.refresh_session().await {
            Ok(true) => {
                info!("Session refreshed, retrying");
                call(backend).await
            }
            Ok(false) => Err(rejected),
            Err(e) => {
                warn!("Session refresh failed: {}", e);
                Err(rejected)
            }
        }
    }

    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        confirm_password: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<AuthSession, AuthFailure> {
        auth::validate_sign_up(email, password, confirm_password)?;
        match self.backend.sign_up(email, password, first_name, last_name).await {
            Ok(session) => {
                info!("Registered account {}", session.user_id);
                Ok(session)
            }
            Err(e) => {
                error!("Registration error: {}", e);
                Err(AuthFailure::from(e))
            }
        }
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthFailure> {
        auth::validate_sign_in(email, password)?;
        match self.backend.sign_in(email, password).await {
            Ok(session) => {
                info!("Signed in as {}", session.user_id);
                Ok(session)
            }
            Err(e) => {
                error!("Sign in error: {}", e);
                Err(AuthFailure::from(e))
            }
        }
    }

    pub async fn sign_out(&self) -> bool {
        match self.backend.sign_out().await {
            Ok(()) => true,
            Err(e) => {
                error!("Error signing out: {}", e);
                false
            }
        }
    }

    pub async fn current_profile(&self) -> Option<Profile> {
        self.with_refresh(move |backend| backend.current_profile())
            .await
            .unwrap_or_else(|e| {
                error!("Error getting user profile: {}", e);
                None
            })
    }

    pub async fn update_profile(&self, first_name: &str, last_name: &str) -> Option<Profile> {
        self.with_refresh(move |backend| backend.update_profile(first_name, last_name))
            .await
            .unwrap_or_else(|e| {
                error!("Error updating profile: {}", e);
                None
            })
    }

    pub async fn restaurants(&self) -> Vec<Restaurant> {
        self.with_refresh(move |backend| backend.restaurants())
            .await
            .unwrap_or_else(|e| {
                error!("Error fetching restaurants: {}", e);
                Vec::new()
            })
    }

    pub async fn restaurant_with_reviews(&self, restaurant_id: &str) -> Option<Restaurant> {
        self.with_refresh(move |backend| backend.restaurant_with_reviews(restaurant_id))
            .await
            .unwrap_or_else(|e| {
                error!("Error fetching restaurant details: {}", e);
                None
            })
    }

    pub async fn add_review(&self, restaurant_id: &str, rating: u8, review_text: &str) -> Option<Review> {
        if let Err(e) = check_rating(rating) {
            warn!("Not adding review: {}", e);
            return None;
        }
        match self
            .with_refresh(move |backend| backend.add_review(restaurant_id, rating, review_text))
            .await
        {
            Ok(review) => Some(review),
            Err(e) => {
                error!("Error adding review: {}", e);
                None
            }
        }
    }

    pub async fn update_review(&self, review_id: &str, rating: u8, review_text: &str) -> Option<Review> {
        if let Err(e) = check_rating(rating) {
            warn!("Not updating review {}: {}", review_id, e);
            return None;
        }
        match self
            .with_refresh(move |backend| backend.update_review(review_id, rating, review_text))
            .await
        {
            Ok(review) => Some(review),
            Err(e) => {
                error!("Error updating review: {}", e);
                None
            }
        }
    }

    pub async fn delete_review(&self, review_id: &str) -> bool {
        match self.with_refresh(move |backend| backend.delete_review(review_id)).await {
            Ok(()) => true,
            Err(e) => {
                error!("Error deleting review: {}", e);
                false
            }
        }
    }

    pub async fn user_reviews(&self) -> Vec<Review> {
        self.with_refresh(move |backend| backend.user_reviews())
            .await
            .unwrap_or_else(|e| {
                error!("Error fetching user reviews: {}", e);
                Vec::new()
            })
    }
}
