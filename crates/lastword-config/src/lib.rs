// SPDX-FileCopyrightText: 2026 Lastword Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for the Lastword delivery engine.
//!
//! `lastword.toml` is layered from compiled defaults, the files in
//! [`loader::search_path`] and `LASTWORD_*` variables. Unknown sections and
//! keys are rejected; every failure comes back as a [`ConfigError`] that
//! renders through miette.

use std::path::Path;

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

pub use diagnostic::{ConfigError, render_errors};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::LastwordConfig;

/// Load from the search path plus environment and validate.
pub fn load_and_validate() -> Result<LastwordConfig, Vec<ConfigError>> {
    checked(loader::load_config(), loader::read_sources)
}

/// Load an inline document (no files, no environment) and validate.
pub fn load_and_validate_str(toml: &str) -> Result<LastwordConfig, Vec<ConfigError>> {
    checked(loader::load_config_from_str(toml), || {
        vec![("lastword.toml".to_string(), toml.to_string())]
    })
}

/// Load the file given with `--config` plus environment and validate.
pub fn load_and_validate_path(path: &Path) -> Result<LastwordConfig, Vec<ConfigError>> {
    checked(loader::load_config_from_path(path), || {
        std::fs::read_to_string(path)
            .map(|content| vec![(path.display().to_string(), content)])
            .unwrap_or_default()
    })
}

// Sources are read back only to attach spans to a failed extraction.
#[allow(clippy::result_large_err)]
fn checked(
    loaded: Result<LastwordConfig, figment::Error>,
    sources: impl FnOnce() -> Vec<(String, String)>,
) -> Result<LastwordConfig, Vec<ConfigError>> {
    let config = loaded.map_err(|err| diagnostic::from_figment(err, &sources()))?;
    validation::validate_config(&config)?;
    Ok(config)
}
