//! # huddle-settings
//!
//! Configuration with layered sources for the huddle hub.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`HuddleSettings::default()`]
//! 2. **User file**: `~/.huddle/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `HUDDLE_*` overrides (highest priority)
//!
//! Command-line flags in the `huddle` binary are applied on top of the
//! loaded value.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, apply_overrides, deep_merge, huddle_home, load_settings,
    load_settings_from_path, settings_path,
};
pub use types::*;
