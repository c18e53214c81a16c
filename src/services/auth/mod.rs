pub mod identity;
pub mod role;
pub mod token;

pub use identity::IdentityLoader;
pub use role::{RoleGate, RoleGateError};
pub use token::TokenVerifier;
