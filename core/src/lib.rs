pub mod error;
pub mod mission;
