//! YAML configuration loader with include and environment variable support
//!
//! Provides functionality to load YAML configuration files with:
//! - `$include` directives for file composition
//! - `${ENV:default}` for environment variable expansion
//! - Deep merging of configurations
//! - Validation and error handling

use crate::config::error::ConfigError;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use serde_yaml::Value as YamlValue;
use std::env;
use std::fs;
use std::path::Path;

/// Load and parse a YAML file with include support
///
/// # Arguments
///
/// * `path` - Path to the YAML file
///
/// # Returns
///
/// Parsed YAML value with includes resolved and variables expanded
pub fn load_yaml_file<P: AsRef<Path>>(path: P) -> Result<YamlValue, ConfigError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| {
        ConfigError::Io { path: path.display().to_string(), source: e }
    })?;

    let mut value: YamlValue = serde_yaml::from_str(&content).map_err(|e| {
        ConfigError::Parse { path: path.display().to_string(), source: e }
    })?;

    // Get the directory for resolving relative includes
    let base_dir = path
        .parent()
        .ok_or_else(|| ConfigError::Invalid("invalid file path".to_string()))?;

    // Process includes and expand variables
    process_includes(&mut value, base_dir)?;
    expand_variables(&mut value)?;

    Ok(value)
}

/// Load and deserialize a YAML file into a specific type
///
/// # Arguments
///
/// * `path` - Path to the YAML file
///
/// # Returns
///
/// Deserialized configuration object
pub fn load_yaml_config<T: DeserializeOwned, P: AsRef<Path>>(
    path: P,
) -> Result<T, ConfigError> {
    let yaml = load_yaml_file(path)?;

    // Convert YAML to JSON for easier deserialization
    let json = yaml_to_json(&yaml)?;

    serde_json::from_value(json).map_err(|e| {
        ConfigError::Invalid(format!("failed to deserialize configuration: {}", e))
    })
}

/// Process $include directives recursively
fn process_includes(value: &mut YamlValue, base_dir: &Path) -> Result<(), ConfigError> {
    match value {
        YamlValue::Mapping(map) => {
            // Check for $include directive
            if let Some(YamlValue::String(include_path)) = map.get(&YamlValue::String("$include".to_string())) {
                // Load the included file
                let include_full_path = base_dir.join(include_path);
                let included = load_yaml_file(&include_full_path)?;

                // Replace current value with included content
                *value = included;
                return Ok(());
            }

            // Recursively process all values in the mapping
            for (_, v) in map.iter_mut() {
                process_includes(v, base_dir)?;
            }
        }
        YamlValue::Sequence(seq) => {
            // Recursively process all items in sequence
            for item in seq.iter_mut() {
                process_includes(item, base_dir)?;
            }
        }
        _ => {}
    }

    Ok(())
}

/// Expand environment variables in the format ${ENV_VAR:default}
fn expand_variables(value: &mut YamlValue) -> Result<(), ConfigError> {
    match value {
        YamlValue::String(s) => {
            if let Some(expanded) = expand_env_in_string(s) {
                *s = expanded;
            }
        }
        YamlValue::Mapping(map) => {
            for (_, v) in map.iter_mut() {
                expand_variables(v)?;
            }
        }
        YamlValue::Sequence(seq) => {
            for item in seq.iter_mut() {
                expand_variables(item)?;
            }
        }
        _ => {}
    }

    Ok(())
}

/// Expand environment variables in a string
///
/// Supports syntax: ${ENV_VAR:default_value}
fn expand_env_in_string(s: &str) -> Option<String> {
    if !s.contains("${") {
        return None;
    }

    let mut result = s.to_string();
    let re = regex::Regex::new(r"\$\{([^:}]+)(?::([^}]*))?\}").ok()?;

    for cap in re.captures_iter(s) {
        let full_match = cap.get(0)?.as_str();
        let var_name = cap.get(1)?.as_str();
        let default_value = cap.get(2).map(|m| m.as_str()).unwrap_or("");

        let value = env::var(var_name).unwrap_or_else(|_| default_value.to_string());
        result = result.replace(full_match, &value);
    }

    Some(result)
}

/// Convert YAML value to JSON value for easier deserialization
fn yaml_to_json(yaml: &YamlValue) -> Result<JsonValue, ConfigError> {
    match yaml {
        YamlValue::Null => Ok(JsonValue::Null),
        YamlValue::Bool(b) => Ok(JsonValue::Bool(*b)),
        YamlValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(JsonValue::Number(i.into()))
            } else if let Some(u) = n.as_u64() {
                Ok(JsonValue::Number(u.into()))
            } else if let Some(f) = n.as_f64() {
                serde_json::Number::from_f64(f)
                    .map(JsonValue::Number)
                    .ok_or_else(|| {
                        ConfigError::Invalid(format!("invalid number: {}", f))
                    })
            } else {
                Err(ConfigError::Invalid("invalid number".to_string()))
            }
        }
        YamlValue::String(s) => Ok(JsonValue::String(s.clone())),
        YamlValue::Sequence(seq) => {
            let json_seq: Result<Vec<JsonValue>, _> = seq.iter().map(yaml_to_json).collect();
            Ok(JsonValue::Array(json_seq?))
        }
        YamlValue::Mapping(map) => {
            let mut json_map = serde_json::Map::new();
            for (k, v) in map {
                let key = match k {
                    YamlValue::String(s) => s.clone(),
                    _ => {
                        return Err(ConfigError::Invalid("map keys must be strings".to_string()))
                    }
                };
                json_map.insert(key, yaml_to_json(v)?);
            }
            Ok(JsonValue::Object(json_map))
        }
        YamlValue::Tagged(tagged) => {
            // Handle tagged values by converting the inner value
            yaml_to_json(&tagged.value)
        }
    }
}

/// Merge two YAML values deeply
///
/// For objects, merges keys recursively. For other types, `other` overrides `base`.
pub fn deep_merge(base: &mut YamlValue, other: &YamlValue) {
    match (base, other) {
        (YamlValue::Mapping(base_map), YamlValue::Mapping(other_map)) => {
            for (key, other_value) in other_map {
                if let Some(base_value) = base_map.get_mut(key) {
                    deep_merge(base_value, other_value);
                } else {
                    base_map.insert(key.clone(), other_value.clone());
                }
            }
        }
        (base, other) => {
            *base = other.clone();
        }
    }
}
