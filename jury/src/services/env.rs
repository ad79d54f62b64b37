//! Process environment access
//!
//! ## Configuration Sources
//! Values are looked up in:
//! 1. `.env` file in the current directory or parent directories (if present)
//! 2. System environment variables
//!
//! Variables already set in the environment take precedence over `.env`.

use std::sync::Once;

use crate::traits::EnvSource;

static LOAD_DOTENV: Once = Once::new();

/// Environment lookup backed by `std::env` after loading `.env`
#[derive(Debug, Clone, Copy)]
pub struct RealEnvSource;

impl RealEnvSource {
    pub fn new() -> Self {
        // A missing .env file is fine
        LOAD_DOTENV.call_once(|| {
            dotenv::dotenv().ok();
        });
        Self
    }
}

impl Default for RealEnvSource {
    fn default() -> Self {
        Self::new()
    }
}

impl EnvSource for RealEnvSource {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}
