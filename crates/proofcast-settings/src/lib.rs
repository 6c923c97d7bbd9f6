//! # proofcast-settings
//!
//! Configuration for the proofcast hub.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`ProofcastSettings::default()`]
//! 2. **Settings file**: `proofcast.json` or `--config <path>` (deep-merged over defaults)
//! 3. **Environment variables**: `PROOFCAST_*` overrides (highest priority)
//!
//! Call [`ProofcastSettings::validate`] after applying any final overrides.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, apply_overrides_with, deep_merge, load_settings,
    load_settings_from_path, settings_path,
};
pub use types::*;
