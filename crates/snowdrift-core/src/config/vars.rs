//! Environment variable interpolation for config files.
//!
//! Supported forms:
//! - `$VAR` or `${VAR}` - required, error if unset
//! - `${VAR:-default}` - default when VAR is unset or empty
//! - `${VAR-default}` - default only when VAR is unset
//! - `$$` - literal `$`

use regex::{Captures, Regex};
use std::env;
use std::sync::LazyLock;

use crate::error::{ConfigError, EnvInterpolationSnafu};

static ENV_VAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        \$
        (?:
            (\$)                                  # 1: escaped dollar
          | \{ ([A-Za-z_][A-Za-z0-9_]*)           # 2: braced name
               (?: (:?-) ([^}]*) )?               # 3: operator, 4: default
            \}
          | ([A-Za-z_][A-Za-z0-9_]*)              # 5: bare name
        )",
    )
    .expect("Invalid regex pattern")
});

/// What to substitute when a variable is missing.
enum Fallback<'a> {
    Required,
    IfUnset(&'a str),
    IfUnsetOrEmpty(&'a str),
}

fn resolve(name: &str, fallback: Fallback<'_>) -> Result<String, String> {
    match (env::var(name), fallback) {
        (Ok(value), _) if value.contains(['\n', '\r']) => Err(format!(
            "environment variable '{name}' contains newlines, which is not allowed"
        )),
        (Ok(value), Fallback::IfUnsetOrEmpty(default)) if value.is_empty() => {
            Ok(default.to_string())
        }
        (Ok(value), _) => Ok(value),
        (Err(_), Fallback::IfUnset(default) | Fallback::IfUnsetOrEmpty(default)) => {
            Ok(default.to_string())
        }
        (Err(_), Fallback::Required) => Err(format!("environment variable '{name}' is not set")),
    }
}

/// Interpolate environment variables in the given text.
///
/// Every unresolvable reference is reported, so a config with several missing
/// variables fails once with the full list.
pub fn interpolate(input: &str) -> Result<String, ConfigError> {
    let mut errors = Vec::new();

    let text = ENV_VAR_PATTERN
        .replace_all(input, |caps: &Captures| {
            if caps.get(1).is_some() {
                return "$".to_string();
            }

            let name = caps
                .get(2)
                .or_else(|| caps.get(5))
                .map_or("", |m| m.as_str());
            let fallback = match (caps.get(3).map(|m| m.as_str()), caps.get(4)) {
                (Some(":-"), Some(default)) => Fallback::IfUnsetOrEmpty(default.as_str()),
                (Some(_), Some(default)) => Fallback::IfUnset(default.as_str()),
                _ => Fallback::Required,
            };

            resolve(name, fallback).unwrap_or_else(|error| {
                errors.push(error);
                caps[0].to_string()
            })
        })
        .into_owned();

    if errors.is_empty() {
        Ok(text)
    } else {
        EnvInterpolationSnafu { errors }.fail()
    }
}
