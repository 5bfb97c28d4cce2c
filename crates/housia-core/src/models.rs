use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Structured record returned by the scrape delegate for one listing page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapedListing {
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    /// Living area in square meters
    pub size: f64,
    pub city: String,
    pub post_code: String,
    pub rooms: i32,
    /// Energy performance class, a single letter
    pub dpe: Option<String>,
}

impl ScrapedListing {
    /// Attach the source url, normalizing fields the store constrains.
    pub fn into_new_listing(self, url: impl Into<String>) -> NewListing {
        let dpe = self
            .dpe
            .map(|d| d.trim().to_uppercase())
            .filter(|d| d.chars().count() == 1);

        NewListing {
            name: self.name,
            description: self.description,
            price: self.price,
            size: self.size,
            city: self.city,
            post_code: self.post_code,
            rooms: self.rooms,
            dpe,
            url: url.into(),
        }
    }
}

/// DTO for inserting a new listing. Unique by `url`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewListing {
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub size: f64,
    pub city: String,
    pub post_code: String,
    pub rooms: i32,
    pub dpe: Option<String>,
    pub url: String,
}

/// A persisted listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub size: f64,
    pub city: String,
    pub post_code: String,
    pub rooms: i32,
    pub dpe: Option<String>,
    pub url: String,
    pub is_favorite: bool,
    pub is_archived: bool,
    pub is_housia_picked: bool,
    pub is_user_picked: bool,
    pub created_at: DateTime<Utc>,
}
