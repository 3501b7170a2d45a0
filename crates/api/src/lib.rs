pub mod auth;
pub mod departments;
pub mod employees;
pub mod error;
pub mod identity;
pub mod schema;
pub mod scope;
pub mod seed;
