// Middleware modules for the MoodGPT backend

pub mod cors;
pub mod identity_middleware;

pub use cors::{dynamic_cors_middleware, CorsPolicy};
pub use identity_middleware::{identity_middleware, RequireUser};
