pub mod auth;
pub mod middleware;
pub mod protocol;
pub mod rest;
pub mod state;
pub mod step_task;

// Re-export the pieces the server binary wires together.
pub use middleware::require_auth;
pub use rest::ApiDoc;
