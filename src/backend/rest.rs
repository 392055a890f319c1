// REST client for the hosted service.
// Auth lives under /auth/v1, tables under /rest/v1/<table> with
// PostgREST-style filters (`id=eq.<value>`).

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, info, warn};
use reqwest::{Client as HttpClient, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::Mutex as TokioMutex;

use super::models::{AuthSession, Profile, Restaurant, Review};
use super::{check_rating, BackendError, BackendResult, HostedBackend};

const REVIEWS_WITH_AUTHORS: &str =
    "*,reviews(id,rating,review_text,created_at,user_id,users(first_name,last_name))";
const REVIEWS_WITH_RESTAURANT: &str = "*,restaurants(id,name)";

#[derive(Clone)]
pub struct RestBackend {
    http: HttpClient,
    base_url: String,
    anon_key: String,
    session: Arc<TokioMutex<Option<AuthSession>>>,
}

impl RestBackend {
    pub fn new(base_url: &str, anon_key: &str) -> Self {
        Self {
            http: HttpClient::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            session: Arc::new(TokioMutex::new(None)),
        }
    }

    /// Resume a session saved from an earlier run.
    pub fn with_session(self, session: AuthSession) -> Self {
        Self {
            session: Arc::new(TokioMutex::new(Some(session))),
            ..self
        }
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    async fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let token = self
            .session
            .lock()
            .await
            .as_ref()
            .and_then(|s| s.access_token.clone())
            .unwrap_or_else(|| self.anon_key.clone());

        self.http
            .request(method, url)
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", token))
    }

    async fn user_id(&self) -> Option<String> {
        self.session.lock().await.as_ref().map(|s| s.user_id.clone())
    }

    async fn check(resp: Response) -> BackendResult<Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(BackendError::Api {
            status: status.as_u16(),
            message: error_message(&body).unwrap_or_else(|| format!("HTTP {}", status)),
        })
    }

    async fn read_json<T: DeserializeOwned>(resp: Response) -> BackendResult<T> {
        let resp = Self::check(resp).await?;
        let body = resp.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn first_row<T: DeserializeOwned>(resp: Response) -> BackendResult<Option<T>> {
        let rows: Vec<T> = Self::read_json(resp).await?;
        Ok(rows.into_iter().next())
    }

    async fn store_session(&self, session: &AuthSession) {
        *self.session.lock().await = Some(session.clone());
    }

    async fn upsert_profile(&self, user_id: &str, email: &str, first_name: &str, last_name: &str) -> BackendResult<()> {
        let now = Utc::now();
        let body = json!({
            "id": user_id,
            "email": email,
            "first_name": first_name,
            "last_name": last_name,
            "created_at": now,
            "updated_at": now,
        });
        let resp = self
            .request(Method::POST, &self.rest_url("users"))
            .await
            .header("Prefer", "resolution=merge-duplicates")
            .json(&body)
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }
}

/// Pull a human-readable message out of an error body.
fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["error_description", "msg", "message", "error"]
        .iter()
        .find_map(|key| value.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}

/// Auth responses either wrap the user (`{"user": {...}, "access_token": ...}`)
/// or, when confirmation is pending, are the user object itself.
fn parse_auth_session(value: &Value) -> BackendResult<AuthSession> {
    let user = value.get("user").unwrap_or(value);
    let user_id = user
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| BackendError::Api {
            status: 200,
            message: "User creation failed".to_string(),
        })?;
    let text = |v: &Value, key: &str| v.get(key).and_then(Value::as_str).map(str::to_string);

    Ok(AuthSession {
        user_id: user_id.to_string(),
        email: text(user, "email"),
        access_token: text(value, "access_token"),
        refresh_token: text(value, "refresh_token"),
    })
}

#[async_trait]
impl HostedBackend for RestBackend {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        first_name: &str,
        last_name: &str,
    ) -> BackendResult<AuthSession> {
        let body = json!({
            "email": email,
            "password": password,
            "data": { "first_name": first_name, "last_name": last_name },
        });
        let resp = self
            .request(Method::POST, &self.auth_url("signup"))
            .await
            .json(&body)
            .send()
            .await?;
        let value: Value = Self::read_json(resp).await?;
        let session = parse_auth_session(&value)?;
        if session.access_token.is_some() {
            self.store_session(&session).await;
        }

        // The account exists at this point; a missing profile row is repaired later.
        if let Err(e) = self.upsert_profile(&session.user_id, email, first_name, last_name).await {
            warn!("Profile creation error: {}", e);
        }
        Ok(session)
    }

    async fn sign_in(&self, email: &str, password: &str) -> BackendResult<AuthSession> {
        let resp = self
            .request(Method::POST, &self.auth_url("token"))
            .await
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        let value: Value = Self::read_json(resp).await?;
        let session = parse_auth_session(&value)?;
        self.store_session(&session).await;
        Ok(session)
    }

    async fn sign_out(&self) -> BackendResult<()> {
        let resp = self.request(Method::POST, &self.auth_url("logout")).await.send().await;
        // The local session is dropped whatever the service says.
        *self.session.lock().await = None;
        Self::check(resp?).await?;
        info!("Signed out");
        Ok(())
    }

    async fn refresh_session(&self) -> BackendResult<bool> {
        let refresh_token = self
            .session
            .lock()
            .await
            .as_ref()
            .and_then(|s| s.refresh_token.clone());
        let Some(refresh_token) = refresh_token else {
            debug!("No refresh token; session cannot be renewed");
            return Ok(false);
        };

        // The expired access token must not be sent here; only the anon key.
        let resp = self
            .http
            .post(self.auth_url("token"))
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", self.anon_key))
            .query(&[("grant_type", "refresh_token")])
            .json(&json!({ "refresh_token": refresh_token }))
            .send()
            .await?;
        let value: Value = Self::read_json(resp).await?;
        let session = parse_auth_session(&value)?;
        info!("Refreshed session for {}", session.user_id);
        self.store_session(&session).await;
        Ok(true)
    }

    async fn session(&self) -> Option<AuthSession> {
        self.session.lock().await.clone()
    }

    async fn current_profile(&self) -> BackendResult<Option<Profile>> {
        let Some(user_id) = self.user_id().await else {
            return Ok(None);
        };
        let resp = self
            .request(Method::GET, &self.rest_url("users"))
            .await
            .query(&[("select", "*".to_string()), ("id", format!("eq.{}", user_id))])
            .send()
            .await?;
        Self::first_row(resp).await
    }

    async fn update_profile(&self, first_name: &str, last_name: &str) -> BackendResult<Option<Profile>> {
        let Some(user_id) = self.user_id().await else {
            return Ok(None);
        };
        let resp = self
            .request(Method::PATCH, &self.rest_url("users"))
            .await
            .query(&[("id", format!("eq.{}", user_id))])
            .header("Prefer", "return=representation")
            .json(&json!({
                "first_name": first_name,
                "last_name": last_name,
                "updated_at": Utc::now(),
            }))
            .send()
            .await?;
        Self::first_row(resp).await
    }

    async fn restaurants(&self) -> BackendResult<Vec<Restaurant>> {
        let resp = self
            .request(Method::GET, &self.rest_url("restaurants"))
            .await
            .query(&[("select", "*"), ("order", "name.asc")])
            .send()
            .await?;
        Self::read_json(resp).await
    }

    async fn restaurant_with_reviews(&self, restaurant_id: &str) -> BackendResult<Option<Restaurant>> {
        let resp = self
            .request(Method::GET, &self.rest_url("restaurants"))
            .await
            .query(&[
                ("select", REVIEWS_WITH_AUTHORS.to_string()),
                ("id", format!("eq.{}", restaurant_id)),
            ])
            .send()
            .await?;
        Self::first_row(resp).await
    }

    async fn add_review(&self, restaurant_id: &str, rating: u8, review_text: &str) -> BackendResult<Review> {
        check_rating(rating)?;
        let user_id = self.user_id().await.ok_or(BackendError::NotAuthenticated)?;
        let resp = self
            .request(Method::POST, &self.rest_url("reviews"))
            .await
            .header("Prefer", "return=representation")
            .json(&json!({
                "restaurant_id": restaurant_id,
                "user_id": user_id,
                "rating": rating,
                "review_text": review_text,
            }))
            .send()
            .await?;
        let review: Option<Review> = Self::first_row(resp).await?;
        review.ok_or_else(|| BackendError::Api {
            status: 200,
            message: "review insert returned no rows".to_string(),
        })
    }

    async fn update_review(&self, review_id: &str, rating: u8, review_text: &str) -> BackendResult<Review> {
        check_rating(rating)?;
        let resp = self
            .request(Method::PATCH, &self.rest_url("reviews"))
            .await
            .query(&[("id", format!("eq.{}", review_id))])
            .header("Prefer", "return=representation")
            .json(&json!({
                "rating": rating,
                "review_text": review_text,
                "updated_at": Utc::now(),
            }))
            .send()
            .await?;
        let review: Option<Review> = Self::first_row(resp).await?;
        review.ok_or_else(|| BackendError::Api {
            status: 404,
            message: format!("review {} not found", review_id),
        })
    }

    async fn delete_review(&self, review_id: &str) -> BackendResult<()> {
        let resp = self
            .request(Method::DELETE, &self.rest_url("reviews"))
            .await
            .query(&[("id", format!("eq.{}", review_id))])
            .send()
            .await?;
        Self::check(resp).await?;
        debug!("Deleted review {}", review_id);
        Ok(())
    }

    async fn user_reviews(&self) -> BackendResult<Vec<Review>> {
        let Some(user_id) = self.user_id().await else {
            return Ok(Vec::new());
        };
        let resp = self
            .request(Method::GET, &self.rest_url("reviews"))
            .await
            .query(&[
                ("select", REVIEWS_WITH_RESTAURANT.to_string()),
                ("user_id", format!("eq.{}", user_id)),
                ("order", "created_at.desc".to_string()),
            ])
            .send()
            .await?;
        Self::read_json(resp).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_prefers_description() {
        let body = r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#;
        assert_eq!(error_message(body).as_deref(), Some("Invalid login credentials"));
        assert_eq!(error_message(r#"{"msg":"Email not confirmed"}"#).as_deref(), Some("Email not confirmed"));
        assert_eq!(error_message("<html>bad gateway</html>"), None);
    }

    #[test]
    fn test_parse_wrapped_and_bare_user() {
        let wrapped = json!({
            "access_token": "tok",
            "refresh_token": "ref",
            "user": { "id": "u1", "email": "a@b.c" }
        });
        let session = parse_auth_session(&wrapped).unwrap();
        assert_eq!(session.user_id, "u1");
        assert_eq!(session.access_token.as_deref(), Some("tok"));

        let bare = json!({ "id": "u2", "email": "x@y.z" });
        let session = parse_auth_session(&bare).unwrap();
        assert_eq!(session.user_id, "u2");
        assert!(session.access_token.is_none());

        assert!(parse_auth_session(&json!({})).is_err());
    }

    #[tokio::test]
    async fn test_refresh_without_refresh_token_is_a_no_op() {
        let backend = RestBackend::new("https://example.test", "anon").with_session(AuthSession {
            user_id: "u1".to_string(),
            email: None,
            access_token: Some("expired".to_string()),
            refresh_token: None,
        });

        assert!(!backend.refresh_session().await.unwrap());
        let session = backend.session().await.unwrap();
        assert_eq!(session.access_token.as_deref(), Some("expired"));

        let signed_out = RestBackend::new("https://example.test", "anon");
        assert!(!signed_out.refresh_session().await.unwrap());
        assert!(signed_out.session().await.is_none());
    }

    #[test]
    fn test_urls_strip_trailing_slash() {
        let backend = RestBackend::new("https://example.test/", "anon");
        assert_eq!(backend.auth_url("signup"), "https://example.test/auth/v1/signup");
        assert_eq!(backend.rest_url("reviews"), "https://example.test/rest/v1/reviews");
    }
}
