//! `{placeholder}` substitution for stage commands and file names.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use std::collections::BTreeMap;

use super::error::StageError;

/// Named values substituted into `{name}` placeholders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateVars {
    values: BTreeMap<String, String>,
}

impl TemplateVars {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl ToString) -> &mut Self {
        self.values.insert(key.into(), value.to_string());
        self
    }

    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.set(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Replaces every `{name}` with its value. Unknown names are an error
    /// rather than being passed through to an external command.
    pub fn render(&self, template: &str) -> Result<String, StageError> {
        let re = &*PLACEHOLDER;

        for caps in re.captures_iter(template) {
            let name = &caps[1];
            if !self.values.contains_key(name) {
                return Err(StageError::UnknownPlaceholder {
                    name: name.to_string(),
                    template: template.to_string(),
                });
            }
        }

        Ok(re
            .replace_all(template, |caps: &regex_lite::Captures<'_>| {
                self.values.get(&caps[1]).cloned().unwrap_or_default()
            })
            .into_owned())
    }
}

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([a-z_][a-z0-9_]*)\}").expect("placeholder pattern"));
