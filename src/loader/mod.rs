//! Generic loading of route, output and template definitions from YAML.
//!
//! Files may reference environment variables as `${NAME}`; they are expanded
//! before parsing so secrets such as webhook tokens stay out of the files.
//! `$${` produces a literal `${` (needed for Rhai string interpolation).

use std::{collections::HashSet, fs, path::PathBuf};

use config::{Config, File, FileFormat};
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum LoaderError {
    /// Error when reading the configuration file.
    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    /// Error when parsing the configuration file.
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] config::ConfigError),

    /// Error when the configuration format is unsupported.
    #[error("Unsupported configuration format")]
    UnsupportedFormat,

    /// A `${NAME}` reference points at an unset environment variable.
    #[error("Environment variable '{0}' referenced in configuration is not set")]
    MissingEnvVar(String),

    /// Two items in the same file share a name.
    #[error("Duplicate name '{0}' in configuration")]
    DuplicateName(String),
}

/// A generic loader for YAML files.
pub struct ConfigLoader {
    path: PathBuf,
}

impl ConfigLoader {
    /// Creates a new `ConfigLoader`.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Loads the list stored under the top-level `key` (e.g. "routes").
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>, LoaderError> {
        if !self.is_yaml_file() {
            return Err(LoaderError::UnsupportedFormat);
        }

        let raw = fs::read_to_string(&self.path)?;
        let expanded = expand_env_vars(&raw, |name| std::env::var(name).ok())?;

        let config =
            Config::builder().add_source(File::from_str(&expanded, FileFormat::Yaml)).build()?;

        Ok(config.get(key)?)
    }

    /// Checks if the file has a YAML extension.
    fn is_yaml_file(&self) -> bool {
        matches!(self.path.extension().and_then(|ext| ext.to_str()), Some("yaml") | Some("yml"))
    }
}

/// Replaces every `${NAME}` with the value returned by `lookup`.
fn expand_env_vars(
    input: &str,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<String, LoaderError> {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        if start > 0 && rest.as_bytes()[start - 1] == b'$' {
            out.push_str(&rest[..start - 1]);
            out.push_str("${");
            rest = &rest[start + 2..];
            continue;
        }
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return Ok(out);
        };
        let name = &after[..end];
        let value = lookup(name).ok_or_else(|| LoaderError::MissingEnvVar(name.to_string()))?;
        out.push_str(&value);
        rest = &after[end + 1..];
    }
    out.push_str(rest);

    Ok(out)
}

/// A trait for types that can be loaded from a configuration file.
pub trait Loadable: Sized + DeserializeOwned {
    /// The top-level key in the YAML file (e.g., "routes").
    const KEY: &'static str;

    /// The specific error type for this loadable item.
    type Error: From<LoaderError>;

    /// Name used to detect duplicates within one file.
    fn name(&self) -> &str;

    /// Post-deserialization validation.
    fn validate(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Loads and validates a vector of `Loadable` items from a configuration file.
pub fn load_config<T: Loadable>(path: PathBuf) -> Result<Vec<T>, T::Error> {
    let loader = ConfigLoader::new(path);
    let mut items: Vec<T> = loader.load(T::KEY)?;

    let mut seen = HashSet::new();
    for item in &mut items {
        item.validate()?;
        if !seen.insert(item.name().to_string()) {
            return Err(LoaderError::DuplicateName(item.name().to_string()).into());
        }
    }

    Ok(items)
}

/// Like [`load_config`], but a missing file yields an empty list.
pub fn load_optional_config<T: Loadable>(path: PathBuf) -> Result<Vec<T>, T::Error> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), key = T::KEY, "Optional configuration file not found.");
        return Ok(Vec::new());
    }
    load_config(path)
}
