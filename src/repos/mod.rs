pub mod account_repo;
pub mod error;
pub mod resource_repo;
