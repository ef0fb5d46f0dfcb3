//! `server.properties` parsing and line-preserving rewrite.

use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Line {
    Entry { key: String, value: String },
    Verbatim(String),
}

/// In-memory copy of a properties file.
///
/// Comments, blank lines and lines without `=` are kept verbatim so a
/// rewrite only touches the entries that changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct PropertiesDocument {
    lines: Vec<Line>,
}

impl PropertiesDocument {
    pub(crate) fn parse(text: &str) -> Self {
        let lines = text
            .lines()
            .map(|line| {
                if line.starts_with('#') {
                    return Line::Verbatim(line.to_owned());
                }
                match line.split_once('=') {
                    Some((key, value)) => Line::Entry {
                        key: key.trim().to_owned(),
                        value: value.trim().to_owned(),
                    },
                    None => Line::Verbatim(line.to_owned()),
                }
            })
            .collect();
        Self { lines }
    }

    /// Key/value view; a repeated key keeps its last value.
    pub(crate) fn values(&self) -> BTreeMap<String, String> {
        self.lines
            .iter()
            .filter_map(|line| match line {
                Line::Entry { key, value } => Some((key.clone(), value.clone())),
                Line::Verbatim(_) => None,
            })
            .collect()
    }

    /// Sets `key`, rewriting every existing entry or appending a new one.
    pub(crate) fn set(&mut self, key: &str, new_value: &str) {
        let mut found = false;
        for line in &mut self.lines {
            if let Line::Entry { key: existing, value } = line
                && existing == key
            {
                new_value.clone_into(value);
                found = true;
            }
        }
        if !found {
            self.lines.push(Line::Entry {
                key: key.to_owned(),
                value: new_value.to_owned(),
            });
        }
    }

    pub(crate) fn render(&self) -> String {
        let mut text = String::new();
        for line in &self.lines {
            match line {
                Line::Entry { key, value } => {
                    text.push_str(key);
                    text.push('=');
                    text.push_str(value);
                }
                Line::Verbatim(raw) => text.push_str(raw),
            }
            text.push('\n');
        }
        text
    }
}
