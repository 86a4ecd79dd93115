pub mod auth;
pub mod authentication;
pub mod ownership;
pub mod permissions;
pub mod user;

pub use auth::*;
pub use authentication::*;
pub use ownership::*;
pub use permissions::*;
pub use user::*;
