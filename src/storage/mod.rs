pub mod config;
pub mod downloads;
