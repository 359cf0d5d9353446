pub mod health;
pub mod sessions;
pub mod tools;
pub mod wallet;
