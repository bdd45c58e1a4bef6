//! Identity adapter: bearer token to principal

pub mod claims;
pub mod context;
pub mod middleware;
pub mod verifier;

pub use claims::Claims;
pub use context::AuthContext;
pub use middleware::RequireAuth;
pub use verifier::TokenVerifier;
