use crate::models::{
    AccountRecord, Course, CourseImage, PrincipalKind, Purchase, PurchaseWithCourse,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use std::sync::Arc;
use uuid::Uuid;

/// StoreError
///
/// Failures surfaced by the persistence layer. `Duplicate` is the mapped
/// unique-constraint violation (per-variant email index); everything else is
/// an unexpected database failure that the boundary degrades to a generic 500.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("duplicate record")]
    Duplicate,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// NewAccount
///
/// Insert payload for a principal record. The password arrives here already
/// hashed; plaintext never crosses the repository boundary.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
}

/// NewCourse
///
/// Insert payload for a course. The image reference has already been written
/// to the asset store by the time this reaches the repository. Asset before
/// record, always.
#[derive(Debug, Clone)]
pub struct NewCourse {
    pub title: String,
    pub description: String,
    pub price: i64,
    pub image: CourseImage,
    pub creator_id: Uuid,
}

/// CourseChanges
///
/// Partial update payload. `None` fields keep their current value (COALESCE
/// at the SQL layer, following the partial-update idiom used throughout).
#[derive(Debug, Clone, Default)]
pub struct CourseChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<i64>,
    pub image: Option<CourseImage>,
}

/// Repository Trait
///
/// The abstract contract for all persistence operations, allowing handlers to
/// interact with the data layer without knowing the implementation (Postgres,
/// in-memory test double, etc.).
///
/// **Send + Sync + async_trait** are required to make the trait object
/// (`Arc<dyn Repository>`) safely shareable across Axum's async task
/// boundaries.
///
/// Correctness-under-concurrency lives HERE, not in handlers: ownership is a
/// conditional-write predicate and purchase uniqueness a storage constraint,
/// because handlers are stateless and may run as multiple instances.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Accounts (Credential Store) ---

    /// Inserts a principal record into the variant's table. Returns
    /// `StoreError::Duplicate` when the email already exists in that variant.
    async fn create_account(
        &self,
        kind: PrincipalKind,
        account: NewAccount,
    ) -> Result<AccountRecord, StoreError>;

    /// Looks up a principal by email within one variant.
    async fn find_account_by_email(
        &self,
        kind: PrincipalKind,
        email: &str,
    ) -> Result<Option<AccountRecord>, StoreError>;

    // --- Courses ---

    async fn insert_course(&self, course: NewCourse) -> Result<Course, StoreError>;
    async fn get_course(&self, id: Uuid) -> Result<Option<Course>, StoreError>;
    async fn list_courses(&self) -> Result<Vec<Course>, StoreError>;

    /// Ownership-scoped conditional update: the write targets
    /// `(id, creator_id)` so the ownership check is atomic with the
    /// mutation. `None` means no row matched: absent course or foreign
    /// creator; the caller distinguishes via a prior existence read.
    async fn update_course(
        &self,
        id: Uuid,
        creator_id: Uuid,
        changes: CourseChanges,
    ) -> Result<Option<Course>, StoreError>;

    /// Ownership-scoped delete. Returns the bound image reference of the
    /// deleted row so the caller can discard the asset *after* the record
    /// delete has committed. `None` means absent or foreign-owned; the two
    /// are deliberately indistinguishable.
    async fn delete_course(
        &self,
        id: Uuid,
        creator_id: Uuid,
    ) -> Result<Option<CourseImage>, StoreError>;

    // --- Purchases (Purchase Ledger) ---

    /// Fast-path existence read for the friendly duplicate error. Not a
    /// correctness mechanism; that is `insert_purchase`'s constraint.
    async fn find_purchase(
        &self,
        learner_id: Uuid,
        course_id: Uuid,
    ) -> Result<Option<Purchase>, StoreError>;

    /// Inserts a purchase under the `(learner_id, course_id)` uniqueness
    /// constraint. Returns `None` when a conflicting row already exists,
    /// including when this insert lost a race against a concurrent duplicate.
    async fn insert_purchase(
        &self,
        learner_id: Uuid,
        course_id: Uuid,
    ) -> Result<Option<Purchase>, StoreError>;

    /// All purchases held by a learner, each joined with its course.
    /// Empty vector (not an error) when the learner holds none.
    async fn purchases_for_learner(
        &self,
        learner_id: Uuid,
    ) -> Result<Vec<PurchaseWithCourse>, StoreError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the
/// application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by PostgreSQL.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const COURSE_COLUMNS: &str =
    "id, title, description, price, image_asset_id, image_url, creator_id, created_at, updated_at";

/// Maps a unique-constraint violation to `StoreError::Duplicate`, everything
/// else to `Database`.
fn map_insert_error(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return StoreError::Duplicate;
        }
    }
    StoreError::Database(e)
}

/// Joined row for the learner purchase listing. Purchase columns are aliased
/// so the course columns keep their natural names for the nested decode.
#[derive(FromRow)]
struct PurchaseCourseRow {
    purchase_id: Uuid,
    learner_id: Uuid,
    course_id: Uuid,
    purchased_at: DateTime<Utc>,
    #[sqlx(flatten)]
    course: Course,
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn create_account(
        &self,
        kind: PrincipalKind,
        account: NewAccount,
    ) -> Result<AccountRecord, StoreError> {
        // Table name comes from PrincipalKind, never from user input.
        let sql = format!(
            "INSERT INTO {} (id, first_name, last_name, email, password_hash, created_at) \
             VALUES ($1, $2, $3, $4, $5, NOW()) \
             RETURNING id, first_name, last_name, email, password_hash, created_at",
            kind.table()
        );

        sqlx::query_as::<_, AccountRecord>(&sql)
            .bind(Uuid::new_v4())
            .bind(&account.first_name)
            .bind(&account.last_name)
            .bind(&account.email)
            .bind(&account.password_hash)
            .fetch_one(&self.pool)
            .await
            .map_err(map_insert_error)
    }

    async fn find_account_by_email(
        &self,
        kind: PrincipalKind,
        email: &str,
    ) -> Result<Option<AccountRecord>, StoreError> {
        let sql = format!(
            "SELECT id, first_name, last_name, email, password_hash, created_at \
             FROM {} WHERE email = $1",
            kind.table()
        );

        Ok(sqlx::query_as::<_, AccountRecord>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn insert_course(&self, course: NewCourse) -> Result<Course, StoreError> {
        let sql = format!(
            "INSERT INTO courses (id, title, description, price, image_asset_id, image_url, creator_id, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, NOW(), NOW()) \
             RETURNING {COURSE_COLUMNS}"
        );

        Ok(sqlx::query_as::<_, Course>(&sql)
            .bind(Uuid::new_v4())
            .bind(&course.title)
            .bind(&course.description)
            .bind(course.price)
            .bind(&course.image.asset_id)
            .bind(&course.image.url)
            .bind(course.creator_id)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn get_course(&self, id: Uuid) -> Result<Option<Course>, StoreError> {
        let sql = format!("SELECT {COURSE_COLUMNS} FROM courses WHERE id = $1");

        Ok(sqlx::query_as::<_, Course>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_courses(&self) -> Result<Vec<Course>, StoreError> {
        let sql = format!("SELECT {COURSE_COLUMNS} FROM courses ORDER BY created_at DESC");

        Ok(sqlx::query_as::<_, Course>(&sql)
            .fetch_all(&self.pool)
            .await?)
    }

    /// Conditional partial update. COALESCE keeps any column whose new value
    /// is NULL; the `(id, creator_id)` predicate makes the ownership check
    /// atomic with the write.
    async fn update_course(
        &self,
        id: Uuid,
        creator_id: Uuid,
        changes: CourseChanges,
    ) -> Result<Option<Course>, StoreError> {
        let (image_asset_id, image_url) = match changes.image {
            Some(image) => (Some(image.asset_id), Some(image.url)),
            None => (None, None),
        };

        let sql = format!(
            "UPDATE courses \
             SET title = COALESCE($3, title), \
                 description = COALESCE($4, description), \
                 price = COALESCE($5, price), \
                 image_asset_id = COALESCE($6, image_asset_id), \
                 image_url = COALESCE($7, image_url), \
                 updated_at = NOW() \
             WHERE id = $1 AND creator_id = $2 \
             RETURNING {COURSE_COLUMNS}"
        );

        Ok(sqlx::query_as::<_, Course>(&sql)
            .bind(id)
            .bind(creator_id)
            .bind(changes.title)
            .bind(changes.description)
            .bind(changes.price)
            .bind(image_asset_id)
            .bind(image_url)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn delete_course(
        &self,
        id: Uuid,
        creator_id: Uuid,
    ) -> Result<Option<CourseImage>, StoreError> {
        Ok(sqlx::query_as::<_, CourseImage>(
            "DELETE FROM courses WHERE id = $1 AND creator_id = $2 \
             RETURNING image_asset_id, image_url",
        )
        .bind(id)
        .bind(creator_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn find_purchase(
        &self,
        learner_id: Uuid,
        course_id: Uuid,
    ) -> Result<Option<Purchase>, StoreError> {
        Ok(sqlx::query_as::<_, Purchase>(
            "SELECT id, learner_id, course_id, created_at FROM purchases \
             WHERE learner_id = $1 AND course_id = $2",
        )
        .bind(learner_id)
        .bind(course_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    /// ON CONFLICT DO NOTHING against the `(learner_id, course_id)` unique
    /// constraint. A concurrent second insert loses the race cleanly: no row
    /// comes back and the caller reports the duplicate. Never a silent
    /// success, never a second record.
    async fn insert_purchase(
        &self,
        learner_id: Uuid,
        course_id: Uuid,
    ) -> Result<Option<Purchase>, StoreError> {
        Ok(sqlx::query_as::<_, Purchase>(
            "INSERT INTO purchases (id, learner_id, course_id, created_at) \
             VALUES ($1, $2, $3, NOW()) \
             ON CONFLICT (learner_id, course_id) DO NOTHING \
             RETURNING id, learner_id, course_id, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(learner_id)
        .bind(course_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn purchases_for_learner(
        &self,
        learner_id: Uuid,
    ) -> Result<Vec<PurchaseWithCourse>, StoreError> {
        let rows = sqlx::query_as::<_, PurchaseCourseRow>(
            "SELECT p.id AS purchase_id, p.learner_id, p.course_id, p.created_at AS purchased_at, \
                    c.id, c.title, c.description, c.price, c.image_asset_id, c.image_url, \
                    c.creator_id, c.created_at, c.updated_at \
             FROM purchases p \
             JOIN courses c ON c.id = p.course_id \
             WHERE p.learner_id = $1 \
             ORDER BY p.created_at DESC",
        )
        .bind(learner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| PurchaseWithCourse {
                purchase: Purchase {
                    id: row.purchase_id,
                    learner_id: row.learner_id,
                    course_id: row.course_id,
                    created_at: row.purchased_at,
                },
                course: row.course,
            })
            .collect())
    }
}
