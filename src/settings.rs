use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const SETTINGS_FILE: &str = "kestrel.yaml";

lazy_static! {
    static ref VERSION: Regex =
        Regex::new(r"^\d+\.\d+\.\d+(-[0-9A-Za-z.-]+)?$").expect("Invalid version pattern");
}

/// Contents of `kestrel.yaml`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectSettings {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub output: Option<PathBuf>,
    /// Per-emitter overrides, passed through untouched.
    #[serde(default)]
    pub emitters: BTreeMap<String, BTreeMap<String, String>>,
}

fn default_version() -> String {
    "0.1.0".into()
}

impl ProjectSettings {
    pub fn parse(source: &str) -> Result<Self> {
        let settings: Self = serde_yaml::from_str(source)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let source = fs::read_to_string(path)
            .with_context(|| format!("Could not read settings {}", path.display()))?;
        Self::parse(&source).with_context(|| format!("Invalid settings {}", path.display()))
    }

    /// Loads `path`, or `kestrel.yaml` in `root` if it exists.
    pub fn discover(root: &Path, path: Option<&Path>) -> Result<Option<Self>> {
        if let Some(path) = path {
            return Self::load(path).map(Some);
        }
        let default = root.join(SETTINGS_FILE);
        if default.is_file() {
            Self::load(&default).map(Some)
        } else {
            Ok(None)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            bail!("Project name must not be empty");
        }
        validate_version(&self.version)
    }
}

/// `MAJOR.MINOR.PATCH` with an optional `-pre` suffix.
pub fn validate_version(version: &str) -> Result<()> {
    if !VERSION.is_match(version) {
        bail!("Invalid project version {version:?}, expected MAJOR.MINOR.PATCH[-pre]");
    }
    Ok(())
}
