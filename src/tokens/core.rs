use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::{PropMonitorError, Result};
use crate::logging::{LogLevel, Logger, TEMPLATE_TARGET, emit, json_str};

/// Token name to replacement text. Unordered.
pub type TemplateValues = HashMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayTemplate {
    text: String,
}

impl DisplayTemplate {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Replace every `{key}` with its value, case-sensitively.
    pub fn render(&self, values: &TemplateValues) -> String {
        let mut output = self.text.clone();
        for (key, value) in values {
            let token = format!("{{{key}}}");
            if output.contains(&token) {
                output = output.replace(&token, value);
            }
        }
        output
    }

    pub fn read(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        if text.trim().is_empty() {
            return Err(PropMonitorError::Template(format!(
                "template `{}` is empty",
                path.display()
            )));
        }
        Ok(Self::new(text))
    }
}

/// Load a template, logging and returning `None` when it is missing or
/// unusable so the widget can fall back to its literal text.
pub fn load_template(path: &Path, logger: Option<&Logger>) -> Option<DisplayTemplate> {
    match DisplayTemplate::read(path) {
        Ok(template) => Some(template),
        Err(err) => {
            emit(
                logger,
                LogLevel::Warn,
                TEMPLATE_TARGET,
                "template_unavailable",
                [
                    json_str("path", path.display().to_string()),
                    json_str("error", err.to_string()),
                ],
            );
            None
        }
    }
}

/// Load the optional JSON side-table of freeform replacements. Only string,
/// number, and boolean values are kept; anything unreadable yields an empty
/// table and a logged warning.
pub fn load_replacements(path: &Path, logger: Option<&Logger>) -> TemplateValues {
    match read_replacements(path) {
        Ok(values) => values,
        Err(err) => {
            emit(
                logger,
                LogLevel::Warn,
                TEMPLATE_TARGET,
                "replacements_unavailable",
                [
                    json_str("path", path.display().to_string()),
                    json_str("error", err.to_string()),
                ],
            );
            TemplateValues::new()
        }
    }
}

fn read_replacements(path: &Path) -> Result<TemplateValues> {
    let text = fs::read_to_string(path)?;
    let raw: HashMap<String, serde_json::Value> = serde_json::from_str(&text)?;
    Ok(raw
        .into_iter()
        .filter_map(|(key, value)| match value {
            serde_json::Value::String(s) => Some((key, s)),
            serde_json::Value::Number(n) => Some((key, n.to_string())),
            serde_json::Value::Bool(b) => Some((key, b.to_string())),
            _ => None,
        })
        .collect())
}
