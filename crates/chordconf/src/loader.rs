//! Config file discovery, loading, and environment variable overlay.

use crate::{ChordConfig, ConfigError};
use std::env;
use std::path::{Path, PathBuf};

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// Discover config files, optionally with a CLI override path.
///
/// If `cli_path` is provided and exists, it replaces the local override.
/// Returns paths in load order (system, user, local/cli).
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/chordchain/config.toml");
    if system.exists() {
        files.push(system);
    }

    // User config (XDG_CONFIG_HOME or ~/.config)
    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("chordchain/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    // CLI override takes precedence over local
    if let Some(path) = cli_path {
        if path.exists() {
            files.push(path.to_path_buf());
            return files;
        }
    }

    let local = PathBuf::from("chordchain.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Merge `files` in order over the defaults.
pub fn load_files(files: &[PathBuf]) -> Result<(ChordConfig, ConfigSources), ConfigError> {
    let mut sources = ConfigSources::default();
    let mut merged = toml::Table::new();

    for path in files {
        let table = load_table(path)?;
        merge_tables(&mut merged, table);
        sources.files.push(path.clone());
    }

    let origin = files.last().cloned().unwrap_or_default();
    let mut config: ChordConfig =
        toml::Value::Table(merged)
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::Parse {
                path: origin,
                message: e.to_string(),
            })?;
    config.output.path = expand_path(&config.output.path.to_string_lossy());

    Ok((config, sources))
}

/// Read a TOML file as an untyped table.
pub fn load_table(path: &Path) -> Result<toml::Table, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    contents
        .parse()
        .map_err(|e: toml::de::Error| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

/// Deep-merge `overlay` into `base`. Nested tables merge key by key; any other
/// value in `overlay` replaces the one in `base`.
pub fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

/// Apply environment variable overrides to config.
pub fn apply_env_overrides(config: &mut ChordConfig, sources: &mut ConfigSources) {
    apply_overrides_from(config, sources, |key| env::var(key).ok());
}

/// Overrides from an arbitrary lookup. Unparseable values are skipped.
pub fn apply_overrides_from<F>(config: &mut ChordConfig, sources: &mut ConfigSources, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let mut apply = |key: &str, set: &mut dyn FnMut(String) -> bool| {
        if let Some(value) = lookup(key) {
            if set(value) {
                sources.env_overrides.push(key.to_string());
            }
        }
    };

    apply("CHORDCHAIN_ORDER", &mut |v| {
        v.parse().map(|order| config.model.order = order).is_ok()
    });
    apply("CHORDCHAIN_KEYING", &mut |v| {
        v.parse().map(|mode| config.model.keying = mode).is_ok()
    });
    apply("CHORDCHAIN_TRACK_MODE", &mut |v| {
        v.parse().map(|mode| config.model.track_mode = mode).is_ok()
    });
    apply("CHORDCHAIN_LENGTH", &mut |v| {
        v.parse().map(|length| config.generate.length = length).is_ok()
    });
    apply("CHORDCHAIN_SEED", &mut |v| {
        v.parse().map(|seed| config.generate.seed = Some(seed)).is_ok()
    });
    apply("CHORDCHAIN_POLICY", &mut |v| {
        v.parse().map(|policy| config.generate.policy = policy).is_ok()
    });
    apply("CHORDCHAIN_OUTPUT", &mut |v| {
        config.output.path = expand_path(&v);
        true
    });
    apply("CHORDCHAIN_LOG_LEVEL", &mut |v| {
        config.telemetry.log_level = v;
        true
    });
    // Also support RUST_LOG
    apply("RUST_LOG", &mut |v| {
        config.telemetry.log_level = v;
        true
    });
}

/// Expand ~ and environment variables in a path.
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
            return home.join(stripped);
        }
    } else if let Some(stripped) = path.strip_prefix('$') {
        // Handle $VAR/rest/of/path
        let (var_name, rest) = stripped.split_once('/').unwrap_or((stripped, ""));
        if let Ok(var_value) = env::var(var_name) {
            return PathBuf::from(var_value).join(rest);
        }
    }
    PathBuf::from(path)
}
