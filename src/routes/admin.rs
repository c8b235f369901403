use crate::{AppState, handlers};
use axum::{Router, routing::post};

/// Admin Account Router
///
/// The admin-variant account lifecycle. Signup and login are public (they
/// are how an admin obtains credentials); logout only requires the session
/// cookie it is about to clear.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // POST /admin/signup
        // Creates an admin account. Email uniqueness is enforced within the
        // admin variant only; a learner may hold the same address.
        .route("/signup", post(handlers::admin_signup))
        // POST /admin/login
        // Verifies credentials and issues an admin-domain token (1-day
        // expiry), mirrored into the session cookie.
        .route("/login", post(handlers::admin_login))
        // POST /admin/logout
        // Clears the session cookie. Stateless tokens mean this is
        // client-side invalidation only.
        .route("/logout", post(handlers::admin_logout))
}
