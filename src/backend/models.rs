use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Result of a successful sign-in or sign-up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthSession {
    pub user_id: String,
    pub email: Option<String>,
    /// Absent when the account still needs email confirmation.
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Profile {
    pub fn display_name(&self) -> String {
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty())
            .collect();
        if parts.is_empty() {
            self.email.clone().unwrap_or_else(|| self.id.clone())
        } else {
            parts.join(" ")
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Restaurant {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub cuisine: Option<String>,
    /// Only populated by the "with reviews" query.
    #[serde(default)]
    pub reviews: Vec<Review>,
}

/// Reviewer name embedded by the "with reviews" query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewAuthor {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Restaurant id/name embedded by the "my reviews" query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewedRestaurant {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: String,
    #[serde(default)]
    pub restaurant_id: Option<String>,
    pub user_id: String,
    pub rating: u8,
    pub review_text: String,
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, rename = "users")]
    pub author: Option<ReviewAuthor>,
    #[serde(default, rename = "restaurants")]
    pub restaurant: Option<ReviewedRestaurant>,
}
