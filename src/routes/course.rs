use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, get, post, put},
};

/// Course Router
///
/// Catalog reads are public; mutations require an admin-domain token and are
/// additionally ownership-scoped at the repository layer; buying requires a
/// learner-domain token.
pub fn course_routes() -> Router<AppState> {
    Router::new()
        // POST /course/create
        // Admin-only multipart submission: title, description, price, and a
        // mandatory PNG/JPEG image. The image is stored before the record.
        .route("/create", post(handlers::create_course))
        // PUT /course/update/{course_id}
        // Admin-only partial update. The write is scoped to
        // (id, creator_id), so only the creating admin can ever match.
        .route("/update/{course_id}", put(handlers::update_course))
        // DELETE /course/delete/{course_id}
        // Admin-only, ownership folded into the existence check. The bound
        // asset is discarded after the record delete commits.
        .route("/delete/{course_id}", delete(handlers::delete_course))
        // GET /course/courses
        // Public catalog listing.
        .route("/courses", get(handlers::list_courses))
        // GET /course/{course_id}
        // Public course detail. The static "courses" segment above wins over
        // this capture for its own path.
        .route("/{course_id}", get(handlers::course_details))
        // POST /course/buy/{course_id}
        // Learner-only purchase. At most one purchase per (learner, course)
        // for all time, enforced by the storage-layer unique constraint.
        .route("/buy/{course_id}", post(handlers::buy_course))
}
