use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;

// --- Core Application Schemas (Mapped to Database) ---

/// PrincipalKind
///
/// The two account variants. Structurally identical records, but stored in
/// separate tables and authenticated against separate signing domains.
/// Email uniqueness is per variant, so a learner and an admin may share an
/// email without conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrincipalKind {
    Learner,
    Admin,
}

impl PrincipalKind {
    /// The backing table for this variant.
    pub fn table(self) -> &'static str {
        match self {
            Self::Learner => "learners",
            Self::Admin => "admins",
        }
    }
}

/// AccountRecord
///
/// The canonical persisted principal row, learner or admin. Internal only:
/// this type carries the password hash and therefore deliberately does NOT
/// implement `Serialize`. Handlers convert to [`PrincipalProfile`] before
/// anything leaves the process.
#[derive(Debug, Clone, FromRow)]
pub struct AccountRecord {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// PrincipalProfile
///
/// The public-safe projection of an account: no hash, no token.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct PrincipalProfile {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

impl From<AccountRecord> for PrincipalProfile {
    fn from(record: AccountRecord) -> Self {
        Self {
            id: record.id,
            first_name: record.first_name,
            last_name: record.last_name,
            email: record.email,
        }
    }
}

/// CourseImage
///
/// Reference to the externally stored image asset bound 1:1 to a course.
/// The asset itself lives in object storage; the course row only carries
/// this reference.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct CourseImage {
    /// Object key in the asset store, used for replace/discard.
    #[sqlx(rename = "image_asset_id")]
    pub asset_id: String,
    /// Public URL served to clients.
    #[sqlx(rename = "image_url")]
    pub url: String,
}

/// Course
///
/// A course record from the `courses` table. `creator_id` references the
/// admin that created it; ownership is permanent and non-transferable, and
/// every mutation is scoped to `(id, creator_id)` at the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Course {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    /// Price in the smallest currency unit.
    pub price: i64,
    #[sqlx(flatten)]
    pub image: CourseImage,
    pub creator_id: Uuid,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// Purchase
///
/// A learner's acquisition of a course. Append-only: never mutated, never
/// deleted. At most one row exists per `(learner_id, course_id)` pair; the
/// unique constraint in the `purchases` table is the system's core
/// correctness guarantee.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Purchase {
    pub id: Uuid,
    pub learner_id: Uuid,
    pub course_id: Uuid,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

// --- Request Payloads (Input Schemas) ---

/// SignupRequest
///
/// Input payload for `POST /admin/signup` and `POST /user/signup`.
/// The password is hashed before storage and never persisted or logged
/// in plaintext.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct SignupRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
}

impl SignupRequest {
    /// validate
    ///
    /// Shape constraints shared by both variants: names at least 3 chars,
    /// plausible email, password at least 6 chars. Returns the first failure.
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.first_name.trim().len() < 3 {
            return Err(ApiError::Validation(
                "first name must be at least 3 characters long".to_string(),
            ));
        }
        if self.last_name.trim().len() < 3 {
            return Err(ApiError::Validation(
                "last name must be at least 3 characters long".to_string(),
            ));
        }
        if !is_valid_email(&self.email) {
            return Err(ApiError::Validation("invalid email address".to_string()));
        }
        if self.password.len() < 6 {
            return Err(ApiError::Validation(
                "password must be at least 6 characters long".to_string(),
            ));
        }
        Ok(())
    }
}

/// is_valid_email
///
/// Minimal structural check: one `@`, non-empty local part, and a domain
/// with at least one dot and no whitespace. Deliverability is not our
/// problem; shape is.
fn is_valid_email(email: &str) -> bool {
    let mut parts = email.splitn(2, '@');
    let (Some(local), Some(domain)) = (parts.next(), parts.next()) else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace)
}

/// LoginRequest
///
/// Input payload for `POST /admin/login` and `POST /user/login`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

// --- Response Payloads (Output Schemas) ---

/// LoginResponse
///
/// Successful login: the domain token (also set as the session cookie) and
/// the public-safe account projection.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LoginResponse {
    pub token: String,
    pub account: PrincipalProfile,
}

/// PurchaseWithCourse
///
/// One entry of a learner's purchase listing: the purchase record joined
/// with the course it refers to.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct PurchaseWithCourse {
    pub purchase: Purchase,
    pub course: Course,
}

/// Media types accepted for course images. Anything else is rejected with a
/// validation error before the asset store is touched.
pub const ALLOWED_IMAGE_TYPES: &[&str] = &["image/png", "image/jpeg"];
