pub mod api;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod lookup;
pub mod package;
pub mod session;
pub mod validate;
pub mod wizard;
