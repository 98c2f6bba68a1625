// SPDX-FileCopyrightText: 2026 Lastword Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered loading of `lastword.toml` with figment.

#![allow(clippy::result_large_err)] // figment::Error is returned as-is

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::diagnostic::section_names;
use crate::model::LastwordConfig;

/// Config files in merge order; later files override earlier ones.
pub fn search_path() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("/etc/lastword/lastword.toml")];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("lastword").join("lastword.toml"));
    }
    paths.push(PathBuf::from("lastword.toml"));
    paths
}

/// Defaults, then [`search_path`], then `LASTWORD_*` variables.
pub fn load_config() -> Result<LastwordConfig, figment::Error> {
    search_path()
        .into_iter()
        .fold(defaults(), |figment, path| figment.merge(Toml::file(path)))
        .merge(env_provider())
        .extract()
}

/// Defaults plus one inline document. Ignores files and the environment.
pub fn load_config_from_str(toml: &str) -> Result<LastwordConfig, figment::Error> {
    defaults().merge(Toml::string(toml)).extract()
}

/// Defaults, the given file, then `LASTWORD_*` variables.
pub fn load_config_from_path(path: &Path) -> Result<LastwordConfig, figment::Error> {
    defaults()
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Contents of every readable file on [`search_path`], keyed by the
/// absolute path figment records as the value's source.
pub fn read_sources() -> Vec<(String, String)> {
    search_path()
        .into_iter()
        .filter_map(|path| {
            let content = std::fs::read_to_string(&path).ok()?;
            let path = std::path::absolute(&path).unwrap_or(path);
            Some((path.display().to_string(), content))
        })
        .collect()
}

fn defaults() -> Figment {
    Figment::from(Serialized::defaults(LastwordConfig::default()))
}

/// `LASTWORD_<SECTION>_<KEY>` maps to `section.key`. Keys contain
/// underscores, so the section is matched by name rather than split.
fn env_provider() -> Env {
    Env::prefixed("LASTWORD_").map(|key| {
        let key = key.as_str().to_ascii_lowercase();
        section_names()
            .find_map(|section| {
                key.strip_prefix(section)
                    .and_then(|rest| rest.strip_prefix('_'))
                    .map(|field| format!("{section}.{field}"))
            })
            .unwrap_or(key)
            .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[serial_test::serial]
    fn env_overrides_map_to_sections() {
        // SAFETY: serialized test; no other thread reads the environment.
        unsafe {
            std::env::set_var("LASTWORD_SCHEDULER_MAX_RETRIES", "7");
            std::env::set_var("LASTWORD_PANIC_SELECTION_TTL_SECS", "90");
            std::env::set_var("LASTWORD_SMS_AUTH_TOKEN", "tok");
        }
        let config: LastwordConfig = defaults()
            .merge(env_provider())
            .extract()
            .expect("env config should load");
        unsafe {
            std::env::remove_var("LASTWORD_SCHEDULER_MAX_RETRIES");
            std::env::remove_var("LASTWORD_PANIC_SELECTION_TTL_SECS");
            std::env::remove_var("LASTWORD_SMS_AUTH_TOKEN");
        }
        assert_eq!(config.scheduler.max_retries, 7);
        assert_eq!(config.panic.selection_ttl_secs, 90);
        assert_eq!(config.sms.auth_token.as_deref(), Some("tok"));
    }

    #[test]
    fn search_path_ends_with_local_file() {
        let paths = search_path();
        assert_eq!(paths.first(), Some(&PathBuf::from("/etc/lastword/lastword.toml")));
        assert_eq!(paths.last(), Some(&PathBuf::from("lastword.toml")));
    }
}
