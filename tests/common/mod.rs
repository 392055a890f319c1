// Common test utilities for integration tests
// This module contains shared code for all integration tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Once;

use async_trait::async_trait;
use log::LevelFilter;
use tokio::sync::mpsc;
use tokio::sync::Mutex as TokioMutex;

use verichat::backend::models::ReviewedRestaurant;
use verichat::backend::{AuthSession, BackendError, BackendResult, HostedBackend, Profile, Restaurant, Review};
use verichat::chat::{seed, ChatStore, ConversationStore, DeliveryTimings};
use verichat::models::CurrentUser;
use verichat::StoreEvent;

// Initialize logging once
static INIT_LOGGER: Once = Once::new();

/// Set up the logger for the tests
pub fn setup_logging() {
    INIT_LOGGER.call_once(|| {
        let _ = env_logger::Builder::new()
            .filter_level(LevelFilter::Debug)
            .is_test(true)
            .try_init();
    });
}

pub fn me() -> CurrentUser {
    CurrentUser::new("me", "Me")
}

/// Store with the demo data and the default 1s/2s delivery schedule.
pub fn demo_chat() -> (ChatStore, mpsc::Receiver<StoreEvent>) {
    setup_logging();
    ChatStore::new(seed::demo_store(&me()), DeliveryTimings::default())
}

/// Store with the demo contacts and no conversations.
pub fn empty_chat() -> (ChatStore, mpsc::Receiver<StoreEvent>) {
    setup_logging();
    ChatStore::new(ConversationStore::new(seed::contacts(), Vec::new()), DeliveryTimings::default())
}

/// Everything currently queued on the event channel.
pub fn drain_events(rx: &mut mpsc::Receiver<StoreEvent>) -> Vec<StoreEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

const STALE_TOKEN: &str = "stale";

/// In-memory stand-in for the hosted service.
/// With `failing` set every call returns an API error.
/// A session whose access token is "stale" is rejected with 401 until refreshed.
pub struct MockBackend {
    failing: bool,
    signed_in: TokioMutex<Option<AuthSession>>,
    reviews: TokioMutex<Vec<Review>>,
    refresh_rejected: bool,
    refreshes: AtomicUsize,
}

impl MockBackend {
    pub fn healthy() -> Self {
        MockBackend {
            failing: false,
            signed_in: TokioMutex::new(None),
            reviews: TokioMutex::new(Vec::new()),
            refresh_rejected: false,
            refreshes: AtomicUsize::new(0),
        }
    }

    /// Signed in as u1 from an earlier run, with an expired access token.
    pub fn with_expired_session(refresh_token: Option<&str>) -> Self {
        let backend = MockBackend::healthy();
        *backend.signed_in.try_lock().unwrap() = Some(AuthSession {
            user_id: "u1".to_string(),
            email: Some("ada@example.com".to_string()),
            access_token: Some(STALE_TOKEN.to_string()),
            refresh_token: refresh_token.map(str::to_string),
        });
        backend
    }

    /// Like `with_expired_session`, but the service also refuses the refresh token.
    pub fn with_revoked_session() -> Self {
        MockBackend {
            refresh_rejected: true,
            ..MockBackend::with_expired_session(Some("revoked"))
        }
    }

    pub fn refresh_count(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }

    pub fn failing() -> Self {
        MockBackend {
            failing: true,
            ..MockBackend::healthy()
        }
    }

    fn check(&self) -> BackendResult<()> {
        if self.failing {
            Err(BackendError::Api {
                status: 500,
                message: "service unavailable".to_string(),
            })
        } else {
            Ok(())
        }
    }

    /// The signed-in user id; 401 while the access token is stale.
    async fn authorized_user(&self) -> BackendResult<Option<String>> {
        self.check()?;
        match self.signed_in.lock().await.as_ref() {
            Some(s) if s.access_token.as_deref() == Some(STALE_TOKEN) => Err(BackendError::Api {
                status: 401,
                message: "JWT expired".to_string(),
            }),
            Some(s) => Ok(Some(s.user_id.clone())),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl HostedBackend for MockBackend {
    async fn sign_up(&self, email: &str, _password: &str, _first: &str, _last: &str) -> BackendResult<AuthSession> {
        self.check()?;
        Ok(AuthSession {
            user_id: "new-user".to_string(),
            email: Some(email.to_string()),
            access_token: None,
            refresh_token: None,
        })
    }

    async fn sign_in(&self, email: &str, password: &str) -> BackendResult<AuthSession> {
        self.check()?;
        match password {
            "correct" => {
                let session = AuthSession {
                    user_id: "u1".to_string(),
                    email: Some(email.to_string()),
                    access_token: Some("token".to_string()),
                    refresh_token: Some("refresh".to_string()),
                };
                *self.signed_in.lock().await = Some(session.clone());
                Ok(session)
            }
            "unconfirmed" => Err(BackendError::Api {
                status: 400,
                message: "Email not confirmed".to_string(),
            }),
            _ => Err(BackendError::Api {
                status: 400,
                message: "Invalid login credentials".to_string(),
            }),
        }
    }

    async fn sign_out(&self) -> BackendResult<()> {
        self.check()?;
        *self.signed_in.lock().await = None;
        Ok(())
    }

    async fn refresh_session(&self) -> BackendResult<bool> {
        self.check()?;
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        let mut signed_in = self.signed_in.lock().await;
        let Some(session) = signed_in.as_mut().filter(|s| s.refresh_token.is_some()) else {
            return Ok(false);
        };
        if self.refresh_rejected {
            return Err(BackendError::Api {
                status: 400,
                message: "Invalid Refresh Token".to_string(),
            });
        }
        session.access_token = Some("fresh".to_string());
        session.refresh_token = Some("rotated".to_string());
        Ok(true)
    }

    async fn session(&self) -> Option<AuthSession> {
        self.signed_in.lock().await.clone()
    }

    async fn current_profile(&self) -> BackendResult<Option<Profile>> {
        if self.authorized_user().await?.is_none() {
            return Ok(None);
        }
        Ok(self.signed_in.lock().await.as_ref().map(|s| Profile {
            id: s.user_id.clone(),
            email: s.email.clone(),
            first_name: Some("Ada".to_string()),
            last_name: Some("Lovelace".to_string()),
            created_at: None,
            updated_at: None,
        }))
    }

    async fn update_profile(&self, first_name: &str, last_name: &str) -> BackendResult<Option<Profile>> {
        let mut profile = self.current_profile().await?;
        if let Some(profile) = profile.as_mut() {
            profile.first_name = Some(first_name.to_string());
            profile.last_name = Some(last_name.to_string());
        }
        Ok(profile)
    }

    async fn restaurants(&self) -> BackendResult<Vec<Restaurant>> {
        self.check()?;
        Ok(vec![Restaurant {
            id: "rest1".to_string(),
            name: "Noodle Bar".to_string(),
            address: None,
            cuisine: Some("Japanese".to_string()),
            reviews: Vec::new(),
        }])
    }

    async fn restaurant_with_reviews(&self, restaurant_id: &str) -> BackendResult<Option<Restaurant>> {
        let reviews = self.reviews.lock().await.clone();
        Ok(self
            .restaurants()
            .await?
            .into_iter()
            .find(|r| r.id == restaurant_id)
            .map(|r| Restaurant { reviews, ..r }))
    }

    async fn add_review(&self, restaurant_id: &str, rating: u8, review_text: &str) -> BackendResult<Review> {
        let user_id = self.authorized_user().await?.ok_or(BackendError::NotAuthenticated)?;
        let mut reviews = self.reviews.lock().await;
        let review = Review {
            id: format!("review-{}", reviews.len() + 1),
            restaurant_id: Some(restaurant_id.to_string()),
            user_id,
            rating,
            review_text: review_text.to_string(),
            created_at: None,
            updated_at: None,
            author: None,
            restaurant: Some(ReviewedRestaurant {
                id: restaurant_id.to_string(),
                name: "Noodle Bar".to_string(),
            }),
        };
        reviews.push(review.clone());
        Ok(review)
    }

    async fn update_review(&self, review_id: &str, rating: u8, review_text: &str) -> BackendResult<Review> {
        self.check()?;
        let mut reviews = self.reviews.lock().await;
        let review = reviews
            .iter_mut()
            .find(|r| r.id == review_id)
            .ok_or_else(|| BackendError::Api {
                status: 404,
                message: format!("review {} not found", review_id),
            })?;
        review.rating = rating;
        review.review_text = review_text.to_string();
        Ok(review.clone())
    }

    async fn delete_review(&self, review_id: &str) -> BackendResult<()> {
        self.check()?;
        self.reviews.lock().await.retain(|r| r.id != review_id);
        Ok(())
    }

    async fn user_reviews(&self) -> BackendResult<Vec<Review>> {
        self.authorized_user().await?;
        Ok(self.reviews.lock().await.clone())
    }
}
