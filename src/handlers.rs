use crate::{
    AppState,
    auth::{AdminAuth, LearnerAuth, SESSION_COOKIE},
    config::Env,
    error::ApiError,
    models::{
        ALLOWED_IMAGE_TYPES, Course, LoginRequest, LoginResponse, PrincipalKind,
        PrincipalProfile, Purchase, PurchaseWithCourse, SignupRequest,
    },
    repository::{CourseChanges, NewAccount, NewCourse},
    token::TokenService,
};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use uuid::Uuid;

// --- Password Hashing ---

/// hash_password
///
/// Argon2id with a fresh OS-random salt, serialized to the PHC string format.
/// The plaintext never leaves this function's scope and is never logged.
fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Internal(format!("password hashing failed: {e}")))
}

/// verify_password
///
/// Constant-time comparison against the stored PHC hash. An unparseable
/// stored hash verifies as false rather than erroring; the caller's answer
/// is the same either way.
fn verify_password(password: &str, stored_hash: &str) -> bool {
    PasswordHash::new(stored_hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

// --- Session Cookie ---

/// session_cookie
///
/// Builds the session cookie with lifetime matching the issued token:
/// httpOnly, SameSite=Strict, Secure outside local development.
fn session_cookie(token: String, ttl_secs: i64, env: &Env) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(*env == Env::Production)
        .same_site(SameSite::Strict)
        .max_age(time::Duration::seconds(ttl_secs))
        .build()
}

// --- Signup / Login / Logout (shared by both variants) ---

/// signup
///
/// Validates shape constraints, hashes the password, and inserts into the
/// variant's table. The pre-insert lookup gives the friendly duplicate
/// message; the per-variant unique email index remains the actual guarantee,
/// so a concurrent duplicate signup still maps to `DuplicateAccount`.
async fn signup(
    kind: PrincipalKind,
    state: &AppState,
    payload: SignupRequest,
) -> Result<(StatusCode, Json<PrincipalProfile>), ApiError> {
    payload.validate()?;

    if state
        .repo
        .find_account_by_email(kind, &payload.email)
        .await?
        .is_some()
    {
        return Err(ApiError::DuplicateAccount);
    }

    let password_hash = hash_password(&payload.password)?;

    let record = state
        .repo
        .create_account(
            kind,
            NewAccount {
                first_name: payload.first_name.trim().to_string(),
                last_name: payload.last_name.trim().to_string(),
                email: payload.email.trim().to_string(),
                password_hash,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(record.into())))
}

/// login
///
/// One rejection path for both "no such account" and "wrong password":
/// `ApiError::Unauthorized` carries a single message, preventing account
/// enumeration. Success issues the variant's domain token and mirrors it
/// into the session cookie.
async fn login(
    kind: PrincipalKind,
    state: &AppState,
    jar: CookieJar,
    payload: LoginRequest,
) -> Result<(CookieJar, Json<LoginResponse>), ApiError> {
    let account = state
        .repo
        .find_account_by_email(kind, &payload.email)
        .await?
        .ok_or(ApiError::Unauthorized)?;

    if !verify_password(&payload.password, &account.password_hash) {
        return Err(ApiError::Unauthorized);
    }

    let tokens = match kind {
        PrincipalKind::Learner => TokenService::learner(&state.config),
        PrincipalKind::Admin => TokenService::admin(&state.config),
    };
    let token = tokens.issue(account.id)?;

    let jar = jar.add(session_cookie(
        token.clone(),
        tokens.ttl_seconds(),
        &state.config.env,
    ));

    Ok((
        jar,
        Json(LoginResponse {
            token,
            account: account.into(),
        }),
    ))
}

/// logout
///
/// Requires an existing session cookie, then clears it. Tokens are stateless
/// and there is no revocation list, so this is client-side invalidation only:
/// a captured token stays valid until natural expiry.
async fn logout(jar: CookieJar) -> Result<(CookieJar, Json<serde_json::Value>), ApiError> {
    if jar.get(SESSION_COOKIE).is_none() {
        return Err(ApiError::Unauthorized);
    }

    let removal = Cookie::build((SESSION_COOKIE, "")).path("/").build();
    Ok((
        jar.remove(removal),
        Json(serde_json::json!({ "message": "logout successful" })),
    ))
}

// --- Admin Account Handlers ---

/// admin_signup
///
/// [Public Route] Registers a new admin account.
#[utoipa::path(
    post,
    path = "/admin/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Account created", body = PrincipalProfile),
        (status = 400, description = "Validation failure or duplicate email")
    )
)]
pub async fn admin_signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> Result<(StatusCode, Json<PrincipalProfile>), ApiError> {
    signup(PrincipalKind::Admin, &state, payload).await
}

/// admin_login
///
/// [Public Route] Authenticates an admin and issues an admin-domain token.
#[utoipa::path(
    post,
    path = "/admin/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn admin_login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>), ApiError> {
    login(PrincipalKind::Admin, &state, jar, payload).await
}

/// admin_logout
///
/// [Session Route] Clears the admin session cookie.
#[utoipa::path(
    post,
    path = "/admin/logout",
    responses(
        (status = 200, description = "Logged out"),
        (status = 401, description = "No active session")
    )
)]
pub async fn admin_logout(
    jar: CookieJar,
) -> Result<(CookieJar, Json<serde_json::Value>), ApiError> {
    logout(jar).await
}

// --- Learner Account Handlers ---

/// user_signup
///
/// [Public Route] Registers a new learner account.
#[utoipa::path(
    post,
    path = "/user/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Account created", body = PrincipalProfile),
        (status = 400, description = "Validation failure or duplicate email")
    )
)]
pub async fn user_signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> Result<(StatusCode, Json<PrincipalProfile>), ApiError> {
    signup(PrincipalKind::Learner, &state, payload).await
}

/// user_login
///
/// [Public Route] Authenticates a learner and issues a learner-domain token.
#[utoipa::path(
    post,
    path = "/user/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn user_login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>), ApiError> {
    login(PrincipalKind::Learner, &state, jar, payload).await
}

/// user_logout
///
/// [Session Route] Clears the learner session cookie.
#[utoipa::path(
    get,
    path = "/user/logout",
    responses(
        (status = 200, description = "Logged out"),
        (status = 401, description = "No active session")
    )
)]
pub async fn user_logout(jar: CookieJar) -> Result<(CookieJar, Json<serde_json::Value>), ApiError> {
    logout(jar).await
}

/// list_purchases
///
/// [Learner Route] Every purchase the learner holds, joined with its course.
/// An empty list is a successful response, not an error.
#[utoipa::path(
    get,
    path = "/user/purchases",
    responses((status = 200, description = "Purchase history", body = [PurchaseWithCourse]))
)]
pub async fn list_purchases(
    LearnerAuth(learner_id): LearnerAuth,
    State(state): State<AppState>,
) -> Result<Json<Vec<PurchaseWithCourse>>, ApiError> {
    Ok(Json(state.repo.purchases_for_learner(learner_id).await?))
}

// --- Course Upload Form ---

/// A parsed `multipart/form-data` course submission.
#[derive(Default)]
struct CourseForm {
    title: Option<String>,
    description: Option<String>,
    price: Option<i64>,
    image: Option<ImagePart>,
}

struct ImagePart {
    filename: String,
    content_type: String,
    bytes: Vec<u8>,
}

/// read_course_form
///
/// Drains the multipart stream into a [`CourseForm`]. Unknown fields are
/// ignored; malformed parts and a non-integer price are validation errors.
async fn read_course_form(mut multipart: Multipart) -> Result<CourseForm, ApiError> {
    let mut form = CourseForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("malformed multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "title" => form.title = Some(read_text(field).await?),
            "description" => form.description = Some(read_text(field).await?),
            "price" => {
                let raw = read_text(field).await?;
                let price = raw
                    .trim()
                    .parse::<i64>()
                    .map_err(|_| ApiError::Validation("price must be an integer".to_string()))?;
                if price < 0 {
                    return Err(ApiError::Validation("price must not be negative".to_string()));
                }
                form.price = Some(price);
            }
            "image" => {
                let filename = field.file_name().unwrap_or("upload.bin").to_string();
                let content_type = field.content_type().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::Validation(format!("failed to read image: {e}")))?
                    .to_vec();
                form.image = Some(ImagePart {
                    filename,
                    content_type,
                    bytes,
                });
            }
            _ => {}
        }
    }

    Ok(form)
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map_err(|e| ApiError::Validation(format!("malformed multipart field: {e}")))
}

/// check_image
///
/// Rejects anything that is not a non-empty PNG or JPEG before the asset
/// store is touched.
fn check_image(image: &ImagePart) -> Result<(), ApiError> {
    if !ALLOWED_IMAGE_TYPES.contains(&image.content_type.as_str()) {
        return Err(ApiError::Validation(
            "invalid file format, only PNG and JPG allowed".to_string(),
        ));
    }
    if image.bytes.is_empty() {
        return Err(ApiError::Validation("image file is empty".to_string()));
    }
    Ok(())
}

// --- Course Handlers ---

/// create_course
///
/// [Admin Route] Creates a course owned by the authenticated admin.
///
/// Ordering: the image asset is stored *before* the course row is written.
/// The two steps are not atomic: if the record write fails, the uploaded
/// asset is left orphaned (and logged). An orphaned object is the accepted
/// cheap leak; a course row pointing at a missing image is not.
#[utoipa::path(
    post,
    path = "/course/create",
    responses(
        (status = 200, description = "Course created", body = Course),
        (status = 400, description = "Missing field or invalid image"),
        (status = 502, description = "Asset store failure")
    )
)]
pub async fn create_course(
    AdminAuth(admin_id): AdminAuth,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<Course>, ApiError> {
    let form = read_course_form(multipart).await?;

    let (Some(title), Some(description), Some(price)) =
        (form.title, form.description, form.price)
    else {
        return Err(ApiError::Validation(
            "title, description and price are required".to_string(),
        ));
    };
    if title.trim().is_empty() || description.trim().is_empty() {
        return Err(ApiError::Validation(
            "title, description and price are required".to_string(),
        ));
    }

    let image = form
        .image
        .ok_or_else(|| ApiError::Validation("no image file uploaded".to_string()))?;
    check_image(&image)?;

    let image_ref = state
        .assets
        .store(&image.filename, &image.content_type, image.bytes)
        .await
        .map_err(|e| ApiError::Upload(e.to_string()))?;

    let course = state
        .repo
        .insert_course(NewCourse {
            title,
            description,
            price,
            image: image_ref.clone(),
            creator_id: admin_id,
        })
        .await
        .inspect_err(|_| {
            // Record write failed after the asset store succeeded.
            tracing::warn!(asset_id = %image_ref.asset_id, "course insert failed, asset left orphaned");
        })?;

    Ok(Json(course))
}

/// update_course
///
/// [Admin Route, ownership-checked] Partial update of a course's scalar
/// fields and optionally its image.
///
/// The creator pre-check gives the historical error message without touching
/// the asset store for a foreign course; the conditional UPDATE scoped to
/// `(id, creator_id)` remains the authoritative, race-free ownership guard.
///
/// Image replacement ordering: new asset stored first, record updated, old
/// asset discarded last (best-effort), so a failed upload can never leave the
/// course without a valid image.
#[utoipa::path(
    put,
    path = "/course/update/{course_id}",
    params(("course_id" = Uuid, Path, description = "Course ID")),
    responses(
        (status = 200, description = "Course updated", body = Course),
        (status = 404, description = "Not found or created by another admin")
    )
)]
pub async fn update_course(
    AdminAuth(admin_id): AdminAuth,
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
    multipart: Multipart,
) -> Result<Json<Course>, ApiError> {
    let form = read_course_form(multipart).await?;

    let existing = state
        .repo
        .get_course(course_id)
        .await?
        .ok_or(ApiError::NotFound("course"))?;
    if existing.creator_id != admin_id {
        return Err(ApiError::Ownership);
    }

    let new_image = match form.image {
        Some(image) => {
            check_image(&image)?;
            Some(
                state
                    .assets
                    .replace(
                        &existing.image.asset_id,
                        &image.filename,
                        &image.content_type,
                        image.bytes,
                    )
                    .await
                    .map_err(|e| ApiError::Upload(e.to_string()))?,
            )
        }
        None => None,
    };
    let replaced = new_image.is_some();

    let updated = state
        .repo
        .update_course(
            course_id,
            admin_id,
            CourseChanges {
                title: form.title,
                description: form.description,
                price: form.price,
                image: new_image.clone(),
            },
        )
        .await?;

    let Some(updated) = updated else {
        // The conditional write matched no row despite the pre-check.
        if let Some(image) = &new_image {
            tracing::warn!(asset_id = %image.asset_id, "course update lost ownership race, new asset left orphaned");
        }
        return Err(ApiError::Ownership);
    };

    if replaced {
        if let Err(e) = state.assets.discard(&existing.image.asset_id).await {
            tracing::warn!(asset_id = %existing.image.asset_id, error = %e, "failed to discard replaced course image");
        }
    }

    Ok(Json(updated))
}

/// delete_course
///
/// [Admin Route, ownership-checked] Deletes a course. Ownership is folded
/// into the existence check: a course owned by another admin reports plain
/// not-found, so its existence does not leak.
///
/// The bound asset is discarded only after the record delete commits, and a
/// discard failure never fails the request.
#[utoipa::path(
    delete,
    path = "/course/delete/{course_id}",
    params(("course_id" = Uuid, Path, description = "Course ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not found")
    )
)]
pub async fn delete_course(
    AdminAuth(admin_id): AdminAuth,
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let image = state
        .repo
        .delete_course(course_id, admin_id)
        .await?
        .ok_or(ApiError::NotFound("course"))?;

    if let Err(e) = state.assets.discard(&image.asset_id).await {
        tracing::warn!(asset_id = %image.asset_id, error = %e, "failed to discard deleted course image");
    }

    Ok(StatusCode::NO_CONTENT)
}

/// list_courses
///
/// [Public Route] All courses, newest first.
#[utoipa::path(
    get,
    path = "/course/courses",
    responses((status = 200, description = "All courses", body = [Course]))
)]
pub async fn list_courses(State(state): State<AppState>) -> Result<Json<Vec<Course>>, ApiError> {
    Ok(Json(state.repo.list_courses().await?))
}

/// course_details
///
/// [Public Route] A single course by id.
#[utoipa::path(
    get,
    path = "/course/{course_id}",
    params(("course_id" = Uuid, Path, description = "Course ID")),
    responses(
        (status = 200, description = "Found", body = Course),
        (status = 404, description = "Not found")
    )
)]
pub async fn course_details(
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
) -> Result<Json<Course>, ApiError> {
    state
        .repo
        .get_course(course_id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound("course"))
}

/// buy_course
///
/// [Learner Route] Records the learner's acquisition of a course, exactly
/// once for all time.
///
/// The existence read and the duplicate pre-check are fast paths for
/// friendly errors; the real guarantee is the `(learner_id, course_id)`
/// unique constraint behind `insert_purchase`. A concurrent duplicate that
/// loses the race comes back as no-row and is reported as
/// `DuplicatePurchase`, never silently absorbed.
#[utoipa::path(
    post,
    path = "/course/buy/{course_id}",
    params(("course_id" = Uuid, Path, description = "Course ID")),
    responses(
        (status = 200, description = "Purchased", body = Purchase),
        (status = 400, description = "Already purchased"),
        (status = 404, description = "No such course")
    )
)]
pub async fn buy_course(
    LearnerAuth(learner_id): LearnerAuth,
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
) -> Result<Json<Purchase>, ApiError> {
    state
        .repo
        .get_course(course_id)
        .await?
        .ok_or(ApiError::NotFound("course"))?;

    if state
        .repo
        .find_purchase(learner_id, course_id)
        .await?
        .is_some()
    {
        return Err(ApiError::DuplicatePurchase);
    }

    match state.repo.insert_purchase(learner_id, course_id).await? {
        Some(purchase) => Ok(Json(purchase)),
        None => Err(ApiError::DuplicatePurchase),
    }
}
