//! # Calendar Module
//!
//! Maps capture dates onto named events (trips, holidays, parties) so the
//! planner can file them into an event subfolder.
//!
//! ## Rule File
//! ```json
//! { "events": [
//!     { "name": "Reunion", "start": "20230401", "end": 20230403 },
//!     { "name": "Summer",  "start": "2023-07-01", "end": "2023-08-31" }
//! ] }
//! ```
//! The same shape is accepted as YAML when the file ends in `.yaml` or
//! `.yml`:
//! ```yaml
//! events:
//!   - name: Reunion
//!     start: 20230401
//!     end: 20230403
//! ```
//! Dates accept `YYYYMMDD` or `YYYY-MM-DD`, as a string or an integer.
//! Ranges are inclusive on both ends. When ranges overlap, the rule listed
//! first wins.

use crate::error::ConfigError;
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Component, Path};

/// A named, inclusive date range
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRule {
    pub name: String,
    #[serde(deserialize_with = "flexible_date")]
    pub start: NaiveDate,
    #[serde(deserialize_with = "flexible_date")]
    pub end: NaiveDate,
}

impl EventRule {
    pub fn new(name: impl Into<String>, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            name: name.into(),
            start,
            end,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Validated, ordered list of event rules
#[derive(Debug, Clone, Default)]
pub struct EventCalendar {
    rules: Vec<EventRule>,
}

impl EventCalendar {
    /// Validate and freeze a rule list.
    ///
    /// Fails on a reversed range or on a name that is not a single plain
    /// folder name.
    pub fn new(rules: Vec<EventRule>) -> Result<Self, ConfigError> {
        for rule in &rules {
            if rule.start > rule.end {
                return Err(ConfigError::InvalidEventRange {
                    name: rule.name.clone(),
                    start: rule.start,
                    end: rule.end,
                });
            }
            if !is_single_component(&rule.name) {
                return Err(ConfigError::InvalidEventName {
                    name: rule.name.clone(),
                });
            }
        }
        Ok(Self { rules })
    }

    /// Name of the first rule containing `date`
    pub fn classify(&self, date: NaiveDate) -> Option<&str> {
        self.rules
            .iter()
            .find(|rule| rule.contains(date))
            .map(|rule| rule.name.as_str())
    }

    pub fn rules(&self) -> &[EventRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn is_single_component(name: &str) -> bool {
    if name.trim().is_empty() || name.contains(['/', '\\']) {
        return false;
    }
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

#[derive(Debug, Deserialize)]
struct RuleFile {
    #[serde(default)]
    events: Vec<EventRule>,
}

/// Encoding of an event rule file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleFormat {
    Json,
    Yaml,
}

impl RuleFormat {
    /// `.yaml` / `.yml` are YAML, anything else is JSON
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("yaml" | "yml") => RuleFormat::Yaml,
            _ => RuleFormat::Json,
        }
    }
}

/// Read and validate an event rule file, JSON or YAML by extension
pub fn load_rules(path: &Path) -> Result<EventCalendar, ConfigError> {
    let event_file_error = |reason: String| ConfigError::EventFile {
        path: path.to_path_buf(),
        reason,
    };

    let contents = std::fs::read_to_string(path).map_err(|e| event_file_error(e.to_string()))?;
    let parsed: Result<RuleFile, String> = match RuleFormat::from_path(path) {
        RuleFormat::Json => serde_json::from_str(&contents).map_err(|e| e.to_string()),
        RuleFormat::Yaml => serde_yaml::from_str(&contents).map_err(|e| e.to_string()),
    };
    let parsed = parsed.map_err(event_file_error)?;

    tracing::info!(path = %path.display(), rules = parsed.events.len(), "loaded event rules");
    EventCalendar::new(parsed.events)
}

/// Parse `YYYYMMDD` or `YYYY-MM-DD`
pub fn parse_event_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    NaiveDate::parse_from_str(text, "%Y%m%d")
        .or_else(|_| NaiveDate::parse_from_str(text, "%Y-%m-%d"))
        .ok()
}

fn flexible_date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    let text = match Raw::deserialize(deserializer)? {
        Raw::Number(n) => n.to_string(),
        Raw::Text(s) => s,
    };
    parse_event_date(&text)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid event date '{text}'")))
}
