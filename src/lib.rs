pub mod config;
pub mod error;
pub mod fenced;
pub mod fields;
pub mod observability;
pub mod stream;
