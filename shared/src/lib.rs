pub mod error;
pub mod models;
pub mod validation;

pub use error::ErrorCode;
pub use models::*;
pub use validation::*;

#[cfg(test)]
mod tests;
