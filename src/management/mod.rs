mod auth;

pub use auth::AuthError;
pub use auth::TokenManager;
pub use auth::TokenSupplier;
