//! # Runtime Configuration Module
//!
//! Environment-variable configuration for the coroutine runtime and router.
//!
//! ## Environment Variables
//!
//! ### `BRRTWEB_STACK_SIZE`
//!
//! Stack size for connection coroutines, decimal (`16384`) or hex (`0x4000`).
//! Handlers run on the connection coroutine, so deep handler call chains
//! need a larger stack. Default: `0x4000` (16 KB).
//!
//! ### `BRRTWEB_SLOW_MATCH_US`
//!
//! Route matches taking longer than this many microseconds are logged at
//! `warn`. Default: `1000`.
//!
//! ## Usage
//!
//! ```rust
//! use brrtweb::runtime_config::RuntimeConfig;
//!
//! let config = RuntimeConfig::from_env();
//! println!("Stack size: {} bytes", config.stack_size);
//! ```

use std::env;

const DEFAULT_STACK_SIZE: usize = 0x4000;
const DEFAULT_SLOW_MATCH_US: u64 = 1000;

/// Runtime configuration loaded from environment variables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Stack size for coroutines in bytes
    pub stack_size: usize,
    /// Slow route-match warning threshold in microseconds
    pub slow_match_us: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            stack_size: DEFAULT_STACK_SIZE,
            slow_match_us: DEFAULT_SLOW_MATCH_US,
        }
    }
}

fn parse_size(val: &str) -> Option<usize> {
    let val = val.trim();
    match val.strip_prefix("0x").or_else(|| val.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16).ok(),
        None => val.parse().ok(),
    }
}

impl RuntimeConfig {
    /// Load configuration from environment variables
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup; invalid values fall back to defaults
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            stack_size: lookup("BRRTWEB_STACK_SIZE")
                .and_then(|v| parse_size(&v))
                .unwrap_or(defaults.stack_size),
            slow_match_us: lookup("BRRTWEB_SLOW_MATCH_US")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.slow_match_us),
        }
    }

    /// Apply the stack size to the global `may` configuration
    pub fn apply(&self) {
        may::config().set_stack_size(self.stack_size);
    }
}
