//! YAML front-matter: file-level configuration and block-local overrides.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml::Value as YamlValue;

use crate::error::{FixtureError, Result};

/// Front-matter delimiter line.
const DELIMITER: &str = "---";

/// File-level configuration from the leading `---` block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrontMatter {
    /// Shared build command run once before any test
    #[serde(default)]
    pub build: String,
    /// Default exec command for table rows without a CLI column
    #[serde(default)]
    pub exec: String,
    /// Environment applied to every test in the file
    #[serde(default, deserialize_with = "deserialize_env")]
    pub env: BTreeMap<String, String>,
    /// Fenced-code languages eligible as `command:` block commands
    #[serde(default = "default_code_blocks")]
    pub code_blocks: Vec<String>,
    /// Glob that multiplies every fixture across matched files
    #[serde(default)]
    pub files: String,
    /// Working directory for every test in the file
    #[serde(default)]
    pub cwd: String,
}

fn default_code_blocks() -> Vec<String> {
    vec!["bash".to_owned()]
}

impl Default for FrontMatter {
    fn default() -> Self {
        Self {
            build: String::new(),
            exec: String::new(),
            env: BTreeMap::new(),
            code_blocks: default_code_blocks(),
            files: String::new(),
            cwd: String::new(),
        }
    }
}

impl FrontMatter {
    /// Parse a YAML document; an empty document yields the defaults.
    ///
    /// # Errors
    /// Returns `FixtureError::Yaml` if the document is malformed.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Whether `language` may supply a `command:` block's command.
    #[must_use]
    pub fn allows_language(&self, language: &str) -> bool {
        self.code_blocks
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(language))
    }
}

/// Overrides from a `frontmatter`/`yaml` fence inside a `command:` block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockFrontMatter {
    /// Working directory for this block only
    #[serde(default)]
    pub cwd: Option<String>,
    /// Expected exit code
    #[serde(default)]
    pub exit_code: Option<i32>,
    /// Environment merged over the file-level env
    #[serde(default, deserialize_with = "deserialize_env")]
    pub env: BTreeMap<String, String>,
    /// Per-test timeout such as `30s` or a bare number of seconds
    #[serde(default, deserialize_with = "deserialize_timeout")]
    pub timeout: Option<Duration>,
    /// Files the command writes, bound by name for validations
    #[serde(default)]
    pub temp_files: BTreeMap<String, String>,
}

impl BlockFrontMatter {
    /// Parse a block-local YAML document.
    ///
    /// # Errors
    /// Returns `FixtureError::Yaml` if the document is malformed.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }
}

/// Split a document into its front-matter and the remaining markdown body.
///
/// Documents without a leading `---` line get default front-matter and are
/// returned whole.
///
/// # Errors
/// Returns `UnterminatedFrontMatter` when the closing delimiter is missing, or
/// a YAML error when the header is malformed.
pub fn split_front_matter<'doc>(content: &'doc str, path: &Path) -> Result<(FrontMatter, &'doc str)> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let mut lines = content.split_inclusive('\n');

    let Some(first) = lines.next() else {
        return Ok((FrontMatter::default(), content));
    };
    if first.trim_end() != DELIMITER {
        return Ok((FrontMatter::default(), content));
    }

    let header_start = first.len();
    let mut offset = header_start;
    for line in lines {
        if line.trim_end() == DELIMITER {
            let yaml = &content[header_start..offset];
            let body = &content[offset + line.len()..];
            return Ok((FrontMatter::from_yaml(yaml)?, body));
        }
        offset += line.len();
    }

    Err(FixtureError::UnterminatedFrontMatter(path.to_path_buf()))
}

/// Parse `500ms`, `30s`, `2m`, `1h` or a bare number of seconds.
///
/// # Errors
/// Returns `FixtureError::InvalidDuration` for anything else.
pub fn parse_duration(text: &str) -> Result<Duration> {
    let trimmed = text.trim();
    let invalid = || FixtureError::InvalidDuration(text.to_owned());

    let (number, scale) = if let Some(millis) = trimmed.strip_suffix("ms") {
        (millis, 0.001)
    } else if let Some(secs) = trimmed.strip_suffix('s') {
        (secs, 1.0)
    } else if let Some(mins) = trimmed.strip_suffix('m') {
        (mins, 60.0)
    } else if let Some(hours) = trimmed.strip_suffix('h') {
        (hours, 3600.0)
    } else {
        (trimmed, 1.0)
    };

    let value: f64 = number.trim().parse().map_err(|_| invalid())?;
    if !value.is_finite() || value < 0.0 {
        return Err(invalid());
    }
    Ok(Duration::from_secs_f64(value * scale))
}

/// Render a YAML scalar the way a shell would see it.
fn yaml_to_env_value(value: YamlValue) -> String {
    match value {
        YamlValue::Null => String::new(),
        YamlValue::Bool(flag) => flag.to_string(),
        YamlValue::Number(number) => number.to_string(),
        YamlValue::String(text) => text,
        other => serde_yaml::to_string(&other)
            .map(|rendered| rendered.trim_end().to_owned())
            .unwrap_or_default(),
    }
}

fn deserialize_env<'de, D>(deserializer: D) -> core::result::Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<BTreeMap<String, YamlValue>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(|(key, value)| (key, yaml_to_env_value(value)))
        .collect())
}

fn deserialize_timeout<'de, D>(deserializer: D) -> core::result::Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error as _;

    let raw: Option<YamlValue> = Option::deserialize(deserializer)?;
    match raw {
        None | Some(YamlValue::Null) => Ok(None),
        Some(YamlValue::Number(number)) => number
            .as_f64()
            .filter(|secs| secs.is_finite() && *secs >= 0.0)
            .map(|secs| Some(Duration::from_secs_f64(secs)))
            .ok_or_else(|| D::Error::custom(format!("invalid timeout: {number}"))),
        Some(YamlValue::String(text)) => parse_duration(&text)
            .map(Some)
            .map_err(|err| D::Error::custom(err.to_string())),
        Some(_) => Err(D::Error::custom("timeout must be a number or duration string")),
    }
}
