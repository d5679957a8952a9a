//! Database row types. These map directly to SQLite rows and are kept
//! separate from the glimpse-types models so the store stays independent.

use chrono::{DateTime, NaiveDateTime, Utc};
use uuid::Uuid;

use glimpse_types::models::{Post, User};

use crate::error::{StoreError, StoreResult};

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub profile_image_url: Option<String>,
    pub is_verified: bool,
    pub created_at: String,
}

#[derive(Debug)]
pub struct PostRow {
    pub id: String,
    pub content: Option<String>,
    pub img_url: String,
    pub author_id: String,
    pub created_at: String,
    pub updated_at: String,
}

pub struct LikeRow {
    pub user_id: String,
    pub post_id: String,
}

/// Fields needed to insert a user.
pub struct NewUser<'a> {
    pub id: &'a str,
    pub username: &'a str,
    pub full_name: &'a str,
    pub email: &'a str,
    pub profile_image_url: Option<&'a str>,
    pub is_verified: bool,
}

impl UserRow {
    pub fn into_user(self) -> StoreResult<User> {
        Ok(User {
            id: parse_id(&self.id)?,
            username: self.username,
            full_name: self.full_name,
            email: self.email,
            profile_image_url: self.profile_image_url,
            is_verified: self.is_verified,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

impl PostRow {
    pub fn into_post(self) -> StoreResult<Post> {
        Ok(Post {
            id: parse_id(&self.id)?,
            content: self.content,
            img_url: self.img_url,
            author_id: parse_id(&self.author_id)?,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

fn parse_id(raw: &str) -> StoreResult<Uuid> {
    raw.parse()
        .map_err(|e| StoreError::Corrupt(format!("bad id '{}': {}", raw, e)))
}

fn parse_timestamp(raw: &str) -> StoreResult<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // Rows written by hand may use SQLite's datetime() format,
            // "YYYY-MM-DD HH:MM:SS" without a timezone. Treat as UTC.
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .map_err(|e| StoreError::Corrupt(format!("bad timestamp '{}': {}", raw, e)))
}
