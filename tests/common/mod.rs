#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use course_market::{
    AppConfig, AppState,
    models::{AccountRecord, Course, CourseImage, PrincipalKind, Purchase, PurchaseWithCourse},
    repository::{CourseChanges, NewAccount, NewCourse, Repository, StoreError},
    storage::MockAssetStore,
};
use jsonwebtoken::{EncodingKey, Header, encode};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

// --- In-Memory Repository ---

/// MemoryRepo
///
/// A full in-memory implementation of the `Repository` trait mirroring the
/// storage-layer semantics the handlers depend on: the per-variant unique
/// email index, ownership-scoped conditional writes, and the atomic
/// check-and-insert of the purchase uniqueness constraint (one mutex lock
/// spans the existence check and the push, just as the database constraint
/// resolves concurrent inserts).
#[derive(Default)]
pub struct MemoryRepo {
    accounts: Mutex<HashMap<(&'static str, String), AccountRecord>>,
    courses: Mutex<Vec<Course>>,
    purchases: Mutex<Vec<Purchase>>,
}

impl MemoryRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn purchase_count(&self, learner_id: Uuid, course_id: Uuid) -> usize {
        self.purchases
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.learner_id == learner_id && p.course_id == course_id)
            .count()
    }

    pub fn course_count(&self) -> usize {
        self.courses.lock().unwrap().len()
    }
}

#[async_trait]
impl Repository for MemoryRepo {
    async fn create_account(
        &self,
        kind: PrincipalKind,
        account: NewAccount,
    ) -> Result<AccountRecord, StoreError> {
        let mut accounts = self.accounts.lock().unwrap();
        let key = (kind.table(), account.email.clone());
        if accounts.contains_key(&key) {
            return Err(StoreError::Duplicate);
        }

        let record = AccountRecord {
            id: Uuid::new_v4(),
            first_name: account.first_name,
            last_name: account.last_name,
            email: account.email,
            password_hash: account.password_hash,
            created_at: Utc::now(),
        };
        accounts.insert(key, record.clone());
        Ok(record)
    }

    async fn find_account_by_email(
        &self,
        kind: PrincipalKind,
        email: &str,
    ) -> Result<Option<AccountRecord>, StoreError> {
        Ok(self
            .accounts
            .lock()
            .unwrap()
            .get(&(kind.table(), email.to_string()))
            .cloned())
    }

    async fn insert_course(&self, course: NewCourse) -> Result<Course, StoreError> {
        let now = Utc::now();
        let record = Course {
            id: Uuid::new_v4(),
            title: course.title,
            description: course.description,
            price: course.price,
            image: course.image,
            creator_id: course.creator_id,
            created_at: now,
            updated_at: now,
        };
        self.courses.lock().unwrap().push(record.clone());
        Ok(record)
    }

    async fn get_course(&self, id: Uuid) -> Result<Option<Course>, StoreError> {
        Ok(self
            .courses
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == id)
            .cloned())
    }

    async fn list_courses(&self) -> Result<Vec<Course>, StoreError> {
        Ok(self.courses.lock().unwrap().clone())
    }

    async fn update_course(
        &self,
        id: Uuid,
        creator_id: Uuid,
        changes: CourseChanges,
    ) -> Result<Option<Course>, StoreError> {
        let mut courses = self.courses.lock().unwrap();
        // Conditional match on (id, creator_id), like the SQL predicate.
        let Some(course) = courses
            .iter_mut()
            .find(|c| c.id == id && c.creator_id == creator_id)
        else {
            return Ok(None);
        };

        if let Some(title) = changes.title {
            course.title = title;
        }
        if let Some(description) = changes.description {
            course.description = description;
        }
        if let Some(price) = changes.price {
            course.price = price;
        }
        if let Some(image) = changes.image {
            course.image = image;
        }
        course.updated_at = Utc::now();
        Ok(Some(course.clone()))
    }

    async fn delete_course(
        &self,
        id: Uuid,
        creator_id: Uuid,
    ) -> Result<Option<CourseImage>, StoreError> {
        let mut courses = self.courses.lock().unwrap();
        let Some(pos) = courses
            .iter()
            .position(|c| c.id == id && c.creator_id == creator_id)
        else {
            return Ok(None);
        };
        Ok(Some(courses.remove(pos).image))
    }

    async fn find_purchase(
        &self,
        learner_id: Uuid,
        course_id: Uuid,
    ) -> Result<Option<Purchase>, StoreError> {
        Ok(self
            .purchases
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.learner_id == learner_id && p.course_id == course_id)
            .cloned())
    }

    async fn insert_purchase(
        &self,
        learner_id: Uuid,
        course_id: Uuid,
    ) -> Result<Option<Purchase>, StoreError> {
        // One lock spans check and insert: the in-memory equivalent of the
        // UNIQUE constraint resolving concurrent duplicates.
        let mut purchases = self.purchases.lock().unwrap();
        if purchases
            .iter()
            .any(|p| p.learner_id == learner_id && p.course_id == course_id)
        {
            return Ok(None);
        }

        let purchase = Purchase {
            id: Uuid::new_v4(),
            learner_id,
            course_id,
            created_at: Utc::now(),
        };
        purchases.push(purchase.clone());
        Ok(Some(purchase))
    }

    async fn purchases_for_learner(
        &self,
        learner_id: Uuid,
    ) -> Result<Vec<PurchaseWithCourse>, StoreError> {
        let courses = self.courses.lock().unwrap();
        Ok(self
            .purchases
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.learner_id == learner_id)
            .filter_map(|p| {
                courses
                    .iter()
                    .find(|c| c.id == p.course_id)
                    .map(|c| PurchaseWithCourse {
                        purchase: p.clone(),
                        course: c.clone(),
                    })
            })
            .collect())
    }
}

// --- State & Token Helpers ---

pub fn test_state(repo: &Arc<MemoryRepo>, assets: &Arc<MockAssetStore>) -> AppState {
    AppState {
        repo: repo.clone(),
        assets: assets.clone(),
        config: AppConfig::default(),
    }
}

/// Encodes a token with arbitrary issue/expiry offsets (seconds relative to
/// now), bypassing TokenService so tests can forge expired tokens.
pub fn forged_token(secret: &str, sub: Uuid, iat_offset: i64, exp_offset: i64) -> String {
    let now = Utc::now().timestamp();
    let claims = course_market::token::Claims {
        sub,
        iat: (now + iat_offset) as usize,
        exp: (now + exp_offset) as usize,
    };
    let key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::default(), &claims, &key).unwrap()
}

/// Seeds a course owned by `creator_id` straight through the repository.
pub async fn seed_course(repo: &Arc<MemoryRepo>, creator_id: Uuid, title: &str) -> Course {
    repo.insert_course(NewCourse {
        title: title.to_string(),
        description: "seeded course".to_string(),
        price: 4999,
        image: CourseImage {
            asset_id: format!("courses/seed-{title}.png"),
            url: format!("http://localhost:9000/mock-bucket/courses/seed-{title}.png"),
        },
        creator_id,
    })
    .await
    .unwrap()
}

// --- Multipart Helpers ---

pub const BOUNDARY: &str = "course-test-boundary";

/// Builds a `multipart/form-data` body with the given text fields and an
/// optional image part named "image".
pub fn multipart_body(
    fields: &[(&str, &str)],
    image: Option<(&str, &str, &[u8])>,
) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((filename, content_type, bytes)) = image {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn multipart_content_type() -> String {
    format!("multipart/form-data; boundary={BOUNDARY}")
}
