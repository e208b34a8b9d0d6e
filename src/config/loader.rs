//! Configuration file discovery and validation.

use std::path::{Path, PathBuf};

use super::{load_properties, Endpoint, Properties};

/// Name of the main configuration file.
pub const CONFIG_FILE_NAME: &str = "wakamiti.properties";

/// Key naming an additional properties file merged on top of the main one.
pub const EFFECTIVE_PROPERTIES_KEY: &str = "effective.properties";

pub const HOST_KEY: &str = "server.host";
pub const PORT_KEY: &str = "server.port";
pub const ORIGIN_KEY: &str = "server.auth.origin";

/// Configuration loader that searches multiple locations.
#[derive(Debug)]
pub struct ConfigLoader {
    /// Search paths in order of priority.
    search_paths: Vec<PathBuf>,
}

impl ConfigLoader {
    /// Create a new config loader with default search paths.
    #[must_use]
    pub fn new() -> Self {
        let mut search_paths = Vec::new();

        // 1. Current directory
        search_paths.push(PathBuf::from(CONFIG_FILE_NAME));

        // 2. Next to the executable
        if let Some(exe_dir) = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
        {
            search_paths.push(exe_dir.join(CONFIG_FILE_NAME));
        }

        Self { search_paths }
    }

    /// Create a config loader with a specific config file path.
    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            search_paths: vec![path],
        }
    }

    /// Create a config loader with an explicit search list.
    #[must_use]
    pub fn with_paths(search_paths: Vec<PathBuf>) -> Self {
        Self { search_paths }
    }

    /// Get the search paths for debugging.
    #[must_use]
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Load the endpoint from the first readable file in the search list.
    ///
    /// # Errors
    ///
    /// Returns an error if no file can be read, if a declared effective
    /// properties file cannot be read, or if a mandatory key is missing or
    /// malformed.
    pub fn load(&self) -> Result<Endpoint, ConfigError> {
        let (path, mut props) = self
            .search_paths
            .iter()
            .find_map(|path| match load_properties(path) {
                Ok(props) => Some((path.as_path(), props)),
                Err(e) => {
                    tracing::trace!(error = %e, "Skipping config candidate");
                    None
                }
            })
            .ok_or_else(|| ConfigError::NotFound {
                searched: self.search_paths.clone(),
            })?;

        tracing::debug!(path = %path.display(), "Loading config file");

        if let Some(effective) = props
            .get(EFFECTIVE_PROPERTIES_KEY)
            .filter(|value| !value.is_empty())
        {
            let effective_path = resolve_relative(path, Path::new(effective));
            let overrides = load_properties(&effective_path).map_err(|e| match e {
                ConfigError::ReadError { path, source } => {
                    ConfigError::EffectiveReadError { path, source }
                }
                other => other,
            })?;
            tracing::debug!(path = %effective_path.display(), "Merging effective properties");
            props.extend(overrides);
        }

        endpoint_from_properties(&props)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Build a validated endpoint from resolved properties.
///
/// # Errors
///
/// Returns `ConfigError::Invalid` if a mandatory key is missing or malformed.
pub fn endpoint_from_properties(props: &Properties) -> Result<Endpoint, ConfigError> {
    let value = |key: &str| props.get(key).map_or("", |v| v.trim());

    let host = value(HOST_KEY);
    if host.is_empty() {
        return Err(ConfigError::Invalid(format!("{HOST_KEY} is required")));
    }

    let port = value(PORT_KEY);
    if port.is_empty() {
        return Err(ConfigError::Invalid(format!("{PORT_KEY} is required")));
    }
    let port = port
        .parse::<u16>()
        .ok()
        .filter(|port| *port != 0)
        .ok_or_else(|| {
            ConfigError::Invalid(format!("{PORT_KEY} must be a valid TCP port (1-65535)"))
        })?;

    let origin = value(ORIGIN_KEY);
    if origin.is_empty() {
        return Err(ConfigError::Invalid(format!("{ORIGIN_KEY} is required")));
    }

    Ok(Endpoint::new(host, port, origin))
}

fn resolve_relative(declared_in: &Path, target: &Path) -> PathBuf {
    if target.is_absolute() {
        return target.to_path_buf();
    }
    declared_in
        .parent()
        .map_or_else(|| target.to_path_buf(), |dir| dir.join(target))
}

/// Errors that can occur during configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Could not find wakamiti.properties in any of: {searched:?}")]
    NotFound { searched: Vec<PathBuf> },

    #[error("Could not read effective properties file at {path}: {source}")]
    EffectiveReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_properties;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_config_loader_default_paths() {
        let loader = ConfigLoader::new();
        assert!(!loader.search_paths().is_empty());
        assert!(loader.search_paths()[0].ends_with(CONFIG_FILE_NAME));
    }

    #[test]
    fn test_load_merges_effective_properties() {
        let dir = tempfile::tempdir().unwrap();
        let effective = write(
            dir.path(),
            "effective.properties",
            "server.host=192.168.1.100\nserver.port=8080\nserver.auth.origin=test-origin\n",
        );
        let main = write(
            dir.path(),
            CONFIG_FILE_NAME,
            &format!("effective.properties={}\n", effective.display()),
        );

        let endpoint = ConfigLoader::with_path(main).load().unwrap();
        assert_eq!(endpoint, Endpoint::new("192.168.1.100", 8080, "test-origin"));
    }

    #[test]
    fn test_relative_effective_path_resolves_next_to_main_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("conf")).unwrap();
        write(
            &dir.path().join("conf"),
            "effective.properties",
            "server.port=9000\n",
        );
        let main = write(
            dir.path(),
            CONFIG_FILE_NAME,
            "server.host=localhost\nserver.port=1\nserver.auth.origin=cli\n\
             effective.properties=conf/effective.properties\n",
        );

        let endpoint = ConfigLoader::with_path(main).load().unwrap();
        assert_eq!(endpoint.port(), 9000);
        assert_eq!(endpoint.host(), "localhost");
    }

    #[test]
    fn test_first_readable_candidate_wins() {
        let dir = tempfile::tempdir().unwrap();
        let second = write(
            dir.path(),
            CONFIG_FILE_NAME,
            "server.host=h\nserver.port=7264\nserver.auth.origin=o\n",
        );
        let loader = ConfigLoader::with_paths(vec![dir.path().join("missing.properties"), second]);

        assert_eq!(loader.load().unwrap().port(), 7264);
    }

    #[test]
    fn test_missing_main_file() {
        let dir = tempfile::tempdir().unwrap();
        let loader = ConfigLoader::with_path(dir.path().join(CONFIG_FILE_NAME));

        let err = loader.load().unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
        assert!(err.to_string().contains(CONFIG_FILE_NAME));
    }

    #[test]
    fn test_missing_effective_file() {
        let dir = tempfile::tempdir().unwrap();
        let main = write(
            dir.path(),
            CONFIG_FILE_NAME,
            "effective.properties=non-existent.properties\n",
        );

        let err = ConfigLoader::with_path(main).load().unwrap_err();
        assert!(matches!(err, ConfigError::EffectiveReadError { .. }));
    }

    #[test]
    fn test_validation_messages() {
        let cases = [
            ("server.port=1\nserver.auth.origin=o", "server.host is required"),
            ("server.host=h\nserver.auth.origin=o", "server.port is required"),
            (
                "server.host=h\nserver.port=70000\nserver.auth.origin=o",
                "valid TCP port",
            ),
            (
                "server.host=h\nserver.port=0\nserver.auth.origin=o",
                "valid TCP port",
            ),
            ("server.host=h\nserver.port=80", "server.auth.origin is required"),
        ];

        for (content, expected) in cases {
            let err = endpoint_from_properties(&parse_properties(content)).unwrap_err();
            let message = err.to_string();
            assert!(message.starts_with("invalid configuration: "), "{message}");
            assert!(message.contains(expected), "{message}");
        }
    }

    #[test]
    fn test_port_with_surrounding_whitespace() {
        let mut props = parse_properties("server.host=h\nserver.auth.origin=o");
        props.insert(PORT_KEY.to_string(), " 7264 ".to_string());
        assert_eq!(endpoint_from_properties(&props).unwrap().port(), 7264);
    }
}
