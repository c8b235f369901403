use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Learner Account Router
///
/// The learner-variant account lifecycle plus the learner's purchase
/// history. Only `/purchases` requires a verified learner identity; the
/// `LearnerAuth` extractor on its handler enforces that.
pub fn user_routes() -> Router<AppState> {
    Router::new()
        // POST /user/signup
        // Creates a learner account (7-day sessions once logged in).
        .route("/signup", post(handlers::user_signup))
        // POST /user/login
        // Verifies credentials and issues a learner-domain token, mirrored
        // into the session cookie learner clients rely on.
        .route("/login", post(handlers::user_login))
        // GET /user/logout
        // Clears the session cookie. Kept as GET for historical client
        // compatibility, unlike the admin variant.
        .route("/logout", get(handlers::user_logout))
        // GET /user/purchases
        // Lists the learner's purchases joined with their courses.
        .route("/purchases", get(handlers::list_purchases))
}
