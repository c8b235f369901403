/// Router Module Index
///
/// Organizes the application's routing logic by route family, mirroring the
/// three signing/access domains of the API surface. Access control is applied
/// per handler via the `LearnerAuth`/`AdminAuth` extractors, so each module
/// documents which domain its protected endpoints verify against.

/// `/admin/*`: admin account lifecycle (signup, login, logout).
pub mod admin;

/// `/user/*`: learner account lifecycle and purchase history.
pub mod user;

/// `/course/*`: public catalog reads, admin-domain mutations (ownership
/// checked downstream), and the learner-domain buy endpoint.
pub mod course;
