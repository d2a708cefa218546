pub mod error;
pub mod runner;
pub mod traits;
