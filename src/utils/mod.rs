pub mod error;
pub mod extract;
pub mod logger;
pub mod markdown;
pub mod validation;
