pub mod best_effort;
pub mod config;
pub mod errors;
pub mod logging;
pub mod security;
