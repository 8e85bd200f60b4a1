pub mod health;
pub mod mission;
pub mod target;
