//! `quarry.toml`: default document paths plus named profiles.
//!
//! ```toml
//! default_profile = "bears"
//!
//! [defaults]
//! schema = "schema.json"
//!
//! [profiles.bears]
//! graph = "bears.json"
//! tolerate_missing_refs = true
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Named set of document paths and store options.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Profile {
    #[serde(skip)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graph: Option<PathBuf>,
    #[serde(default)]
    pub tolerate_missing_refs: bool,
    #[serde(default = "enabled")]
    pub validate: bool,
}

fn enabled() -> bool {
    true
}

impl Profile {
    fn named(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            schema: None,
            graph: None,
            tolerate_missing_refs: false,
            validate: true,
        }
    }
}

/// Fields to overwrite on a profile; `None` keeps the stored value.
#[derive(Debug, Default)]
pub struct ProfileUpdate {
    pub schema: Option<PathBuf>,
    pub graph: Option<PathBuf>,
    pub tolerate_missing_refs: Option<bool>,
    pub validate: Option<bool>,
}

impl ProfileUpdate {
    fn apply(self, profile: &mut Profile) {
        profile.schema = self.schema.or(profile.schema.take());
        profile.graph = self.graph.or(profile.graph.take());
        profile.tolerate_missing_refs =
            self.tolerate_missing_refs.unwrap_or(profile.tolerate_missing_refs);
        profile.validate = self.validate.unwrap_or(profile.validate);
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct Document {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default_profile: Option<String>,
    #[serde(default)]
    defaults: Defaults,
    #[serde(default)]
    profiles: BTreeMap<String, Profile>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct Defaults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    schema: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    graph: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not {action} {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("could not encode config: {0}")]
    Encode(#[from] toml::ser::Error),
    #[error("no profile named '{0}'")]
    UnknownProfile(String),
    #[error("no config directory found; pass --config or set QUARRY_CONFIG")]
    NoConfigPath,
}

#[derive(Debug, Default)]
pub struct CliConfig {
    path: Option<PathBuf>,
    doc: Document,
}

impl CliConfig {
    /// Reads `explicit`, else the per-user file; a missing file is an empty config.
    pub fn load(explicit: Option<PathBuf>) -> Result<Self, ConfigError> {
        let path = explicit.or_else(default_config_path);
        let mut doc = match &path {
            Some(path) if path.exists() => parse(path)?,
            _ => Document::default(),
        };
        for (name, profile) in doc.profiles.iter_mut() {
            profile.name.clone_from(name);
        }
        if let Some(name) = &doc.default_profile {
            if !doc.profiles.contains_key(name) {
                return Err(ConfigError::UnknownProfile(name.clone()));
            }
        }
        Ok(Self { path, doc })
    }

    pub fn default_schema(&self) -> Option<&PathBuf> {
        self.doc.defaults.schema.as_ref()
    }

    pub fn default_graph(&self) -> Option<&PathBuf> {
        self.doc.defaults.graph.as_ref()
    }

    pub fn default_profile_name(&self) -> Option<&str> {
        self.doc.default_profile.as_deref()
    }

    pub fn profile(&self, name: &str) -> Result<&Profile, ConfigError> {
        self.doc
            .profiles
            .get(name)
            .ok_or_else(|| ConfigError::UnknownProfile(name.to_owned()))
    }

    /// The profile named on the command line, else the configured default.
    pub fn active_profile(&self, requested: Option<&str>) -> Result<Option<&Profile>, ConfigError> {
        requested
            .or(self.default_profile_name())
            .map(|name| self.profile(name))
            .transpose()
    }

    pub fn profiles(&self) -> impl Iterator<Item = &Profile> {
        self.doc.profiles.values()
    }

    pub fn set_default_profile(&mut self, name: Option<&str>) -> Result<(), ConfigError> {
        if let Some(name) = name {
            self.profile(name)?;
        }
        self.doc.default_profile = name.map(str::to_owned);
        Ok(())
    }

    pub fn upsert_profile(&mut self, name: &str, update: ProfileUpdate) -> Result<(), ConfigError> {
        let profile = self
            .doc
            .profiles
            .entry(name.to_owned())
            .or_insert_with(|| Profile::named(name));
        update.apply(profile);
        Ok(())
    }

    pub fn delete_profile(&mut self, name: &str) -> Result<(), ConfigError> {
        self.doc
            .profiles
            .remove(name)
            .ok_or_else(|| ConfigError::UnknownProfile(name.to_owned()))?;
        if self.default_profile_name() == Some(name) {
            self.doc.default_profile = None;
        }
        Ok(())
    }

    /// Writes the config back, creating parent directories; returns the path written.
    pub fn persist(&self) -> Result<PathBuf, ConfigError> {
        let path = self
            .path
            .clone()
            .or_else(default_config_path)
            .ok_or(ConfigError::NoConfigPath)?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
                action: "create",
                path: dir.to_path_buf(),
                source,
            })?;
        }
        let text = toml::to_string_pretty(&self.doc)?;
        fs::write(&path, text).map_err(|source| ConfigError::Io {
            action: "write",
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}

fn parse(path: &Path) -> Result<Document, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        action: "read",
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join("quarry").join("quarry.toml"))
}
