//! Java-style `.properties` reader.
//!
//! Supports `#` comments, `key=value` pairs split on the first `=`, backslash
//! escapes for `:`, `=`, space, `\`, `#` and `!`, the `${user.home}` variable
//! and `${other.key}` references between entries.

use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::ConfigError;

/// Parsed key/value pairs.
pub type Properties = HashMap<String, String>;

/// Upper bound on reference resolution passes.
///
/// Cyclic references stop expanding once this many passes have run and are
/// left as literal text.
pub const MAX_SUBSTITUTION_ROUNDS: usize = 5;

const USER_HOME_PLACEHOLDER: &str = "${user.home}";

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("placeholder pattern is valid"));

/// Read and fully resolve a properties file.
///
/// # Errors
///
/// Returns `ConfigError::ReadError` if the file cannot be read.
pub fn load_properties(path: &Path) -> Result<Properties, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut props = parse_properties(&content);
    resolve_placeholders(&mut props, dirs::home_dir().as_deref());
    tracing::debug!(path = %path.display(), entries = props.len(), "Loaded properties");
    Ok(props)
}

/// Parse properties text without resolving any placeholder.
#[must_use]
pub fn parse_properties(content: &str) -> Properties {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim().to_string(), unescape_value(value.trim())))
        .collect()
}

/// Replace `${user.home}` and then `${key}` references to other entries.
///
/// References are expanded pass by pass until nothing changes or
/// [`MAX_SUBSTITUTION_ROUNDS`] passes have run. A reference is only replaced
/// once its target holds no placeholder itself, so cycles stay literal and a
/// value never grows from re-expanding itself. Unknown keys stay literal.
pub fn resolve_placeholders(props: &mut Properties, home: Option<&Path>) {
    if let Some(home) = home {
        let home = home.to_string_lossy();
        for value in props.values_mut() {
            if value.contains(USER_HOME_PLACEHOLDER) {
                *value = value.replace(USER_HOME_PLACEHOLDER, &home);
            }
        }
    }

    for round in 0..MAX_SUBSTITUTION_ROUNDS {
        let snapshot = props.clone();
        let mut changed = false;

        for value in props.values_mut() {
            let expanded = PLACEHOLDER.replace_all(value, |caps: &Captures<'_>| {
                snapshot
                    .get(&caps[1])
                    .filter(|target| !PLACEHOLDER.is_match(target))
                    .cloned()
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned();
            if expanded != *value {
                *value = expanded;
                changed = true;
            }
        }

        if !changed {
            tracing::trace!(rounds = round, "Property references resolved");
            return;
        }
    }

    tracing::debug!(
        rounds = MAX_SUBSTITUTION_ROUNDS,
        "Property reference resolution hit the round limit"
    );
}

fn unescape_value(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some(&next) if matches!(next, ':' | '=' | ' ' | '\\' | '#' | '!') => {
                out.push(next);
                chars.next();
            }
            _ => out.push('\\'),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_parse_skips_comments_and_blank_lines() {
        let props = parse_properties(
            "# comment\n\n  server.host = localhost  \nno separator here\nserver.port=7264\n",
        );
        assert_eq!(props.len(), 2);
        assert_eq!(props["server.host"], "localhost");
        assert_eq!(props["server.port"], "7264");
    }

    #[test]
    fn test_parse_splits_on_first_equals() {
        let props = parse_properties("jdbc.url=jdbc:h2:mem:test;MODE=Oracle");
        assert_eq!(props["jdbc.url"], "jdbc:h2:mem:test;MODE=Oracle");
    }

    #[test]
    fn test_unescape_known_sequences() {
        assert_eq!(unescape_value(r"C\:\\data\=x\ y\#z\!"), r"C:\data=x y#z!");
    }

    #[test]
    fn test_unescape_keeps_unknown_and_trailing_backslash() {
        assert_eq!(unescape_value(r"a\nb"), r"a\nb");
        assert_eq!(unescape_value(r"end\"), r"end\");
    }

    #[test]
    fn test_resolve_user_home() {
        let mut props = parse_properties("dir=${user.home}/wakamiti");
        resolve_placeholders(&mut props, Some(&PathBuf::from("/home/tester")));
        assert_eq!(props["dir"], "/home/tester/wakamiti");
    }

    #[test]
    fn test_resolve_chained_references() {
        let mut props = parse_properties("a=${b}/a\nb=${c}/b\nc=root");
        resolve_placeholders(&mut props, None);
        assert_eq!(props["a"], "root/b/a");
        assert_eq!(props["b"], "root/b");
    }

    #[test]
    fn test_unknown_reference_stays_literal() {
        let mut props = parse_properties("a=${missing}-x");
        resolve_placeholders(&mut props, None);
        assert_eq!(props["a"], "${missing}-x");
    }

    #[test]
    fn test_cyclic_references_terminate_as_literal_text() {
        let mut props = parse_properties("a=${b}\nb=${a}");
        resolve_placeholders(&mut props, None);
        assert!(props["a"].starts_with("${"));
        assert!(props["b"].starts_with("${"));
    }

    #[test]
    fn test_self_reference_stays_literal() {
        let mut props = parse_properties("a=x${a}");
        resolve_placeholders(&mut props, None);
        assert_eq!(props["a"], "x${a}");
    }

    #[test]
    fn test_doubling_self_reference_does_not_grow() {
        let mut props = parse_properties("a=${a}${a}\nb=${b}-${c}\nc=${b}${b}");
        resolve_placeholders(&mut props, None);
        assert_eq!(props["a"], "${a}${a}");
        assert_eq!(props["b"], "${b}-${c}");
        assert_eq!(props["c"], "${b}${b}");
    }

    #[test]
    fn test_resolved_target_is_shared_by_many_references() {
        let mut props = parse_properties("base=/opt\na=${base}/x:${base}/y\nb=${a};${a}");
        resolve_placeholders(&mut props, None);
        assert_eq!(props["a"], "/opt/x:/opt/y");
        assert_eq!(props["b"], "/opt/x:/opt/y;/opt/x:/opt/y");
    }

    #[test]
    fn test_load_properties_missing_file() {
        let result = load_properties(Path::new("/nonexistent/wakamiti.properties"));
        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }
}
