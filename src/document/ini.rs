//! Sectioned key/value documents (`ansible.cfg`, `inventory.ini`).
//!
//! Reading follows the generic INI parser the deployment tooling uses: entries
//! split at the first `=` or `:`, flag-only keys allowed, keys case-sensitive.
//! Writing emits `key = value` with a blank line after every section, which is
//! what [`crate::postprocess`] expects to repair.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::fmt::Write as _;
use thiserror::Error;

static SECTION_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[(?P<header>.+)\]").expect("valid regex"));

static ENTRY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<key>.*?)\s*(?:(?P<delim>[=:])\s*(?P<value>.*))?$").expect("valid regex")
});

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IniError {
    #[error("line {line}: entry before any section header: {text:?}")]
    MissingSectionHeader { line: usize, text: String },

    #[error("line {line}: section [{section}] already exists")]
    DuplicateSection { line: usize, section: String },

    #[error("line {line}: key '{key}' already exists in section [{section}]")]
    DuplicateKey { line: usize, section: String, key: String },

    #[error("line {line}: entry has no key: {text:?}")]
    EmptyKey { line: usize, text: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: String,
    /// `None` for flag-only keys.
    pub value: Option<String>,
}

impl Entry {
    pub fn new(key: impl Into<String>, value: Option<String>) -> Self {
        Self { key: key.into(), value }
    }

    pub fn flag(key: impl Into<String>) -> Self {
        Self { key: key.into(), value: None }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    name: String,
    entries: Vec<Entry>,
}

impl Section {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), entries: Vec::new() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.key.as_str())
    }

    pub fn get(&self, key: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.key == key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Overwrites in place when `key` exists, appends otherwise.
    pub fn set(&mut self, key: &str, value: Option<String>) {
        match self.entries.iter_mut().find(|e| e.key == key) {
            Some(entry) => entry.value = value,
            None => self.entries.push(Entry::new(key, value)),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Entry> {
        let idx = self.entries.iter().position(|e| e.key == key)?;
        Some(self.entries.remove(idx))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn append_continuation(&mut self, key: &str, line: &str) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.key == key) {
            if let Some(value) = entry.value.as_mut() {
                value.push('\n');
                value.push_str(line);
            }
        }
    }
}

/// Ordered sections, each owning ordered, uniquely keyed entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionedDocument {
    sections: Vec<Section>,
}

impl SectionedDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn section_names(&self) -> Vec<String> {
        self.sections.iter().map(|s| s.name.clone()).collect()
    }

    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    pub fn section_mut(&mut self, name: &str) -> Option<&mut Section> {
        self.sections.iter_mut().find(|s| s.name == name)
    }

    pub fn has_section(&self, name: &str) -> bool {
        self.section(name).is_some()
    }

    /// Returns the named section, appending an empty one if absent.
    pub fn add_section(&mut self, name: &str) -> &mut Section {
        let idx = match self.sections.iter().position(|s| s.name == name) {
            Some(idx) => idx,
            None => {
                self.sections.push(Section::new(name));
                self.sections.len() - 1
            }
        };
        &mut self.sections[idx]
    }

    pub fn remove_section(&mut self, name: &str) -> Option<Section> {
        let idx = self.sections.iter().position(|s| s.name == name)?;
        Some(self.sections.remove(idx))
    }

    /// `Some(None)` means the key exists without a value.
    pub fn get(&self, section: &str, key: &str) -> Option<Option<&str>> {
        self.section(section)?.get(key).map(|e| e.value.as_deref())
    }

    pub fn set(&mut self, section: &str, key: &str, value: Option<String>) {
        self.add_section(section).set(key, value);
    }

    pub fn parse(text: &str, strict: bool) -> Result<Self, IniError> {
        Self::parse_with(text, strict, None)
    }

    /// Like [`SectionedDocument::parse`], but lines starting with `verbatim`
    /// are kept whole as flag keys and never split at `=` or `:`.
    pub fn parse_with(text: &str, strict: bool, verbatim: Option<&str>) -> Result<Self, IniError> {
        let mut doc = SectionedDocument::new();
        let mut seen_sections: HashSet<String> = HashSet::new();
        let mut seen_keys: HashSet<(usize, String)> = HashSet::new();
        let mut current: Option<usize> = None;
        // Last valued entry and its indentation, for continuation lines.
        let mut last: Option<(String, usize)> = None;

        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                last = None;
                continue;
            }
            if trimmed.starts_with('#') || trimmed.starts_with(';') {
                continue;
            }

            let whole_line = verbatim.is_some_and(|prefix| trimmed.starts_with(prefix));
            let indent = raw.len() - raw.trim_start().len();
            if whole_line {
                last = None;
            } else if let (Some(sec), Some((key, key_indent))) = (current, last.as_ref()) {
                if indent > *key_indent {
                    doc.sections[sec].append_continuation(key, trimmed);
                    continue;
                }
            }

            if let Some(caps) = SECTION_HEADER.captures(trimmed) {
                let name = caps["header"].to_string();
                if !seen_sections.insert(name.clone()) && strict {
                    return Err(IniError::DuplicateSection { line: line_no, section: name });
                }
                doc.add_section(&name);
                current = doc.sections.iter().position(|s| s.name == name);
                last = None;
                continue;
            }

            let Some(sec) = current else {
                return Err(IniError::MissingSectionHeader {
                    line: line_no,
                    text: trimmed.to_string(),
                });
            };

            let (key, value) = if whole_line { (trimmed, None) } else { split_entry(trimmed) };
            if key.is_empty() {
                return Err(IniError::EmptyKey { line: line_no, text: trimmed.to_string() });
            }
            if !seen_keys.insert((sec, key.to_string())) && strict {
                return Err(IniError::DuplicateKey {
                    line: line_no,
                    section: doc.sections[sec].name.clone(),
                    key: key.to_string(),
                });
            }

            last = value.as_ref().map(|_| (key.to_string(), indent));
            doc.sections[sec].set(key, value);
        }

        Ok(doc)
    }

    pub fn to_ini_string(&self) -> String {
        let mut out = String::new();
        for section in &self.sections {
            let _ = writeln!(out, "[{}]", section.name);
            for entry in &section.entries {
                match &entry.value {
                    None => {
                        let _ = writeln!(out, "{}", entry.key);
                    }
                    Some(value) => {
                        let _ = writeln!(out, "{} = {}", entry.key, value.replace('\n', "\n\t"));
                    }
                }
            }
            out.push('\n');
        }
        out
    }
}

/// Split an entry line at its first `=` or `:`.
fn split_entry(line: &str) -> (&str, Option<String>) {
    let Some(caps) = ENTRY.captures(line) else {
        return (line, None);
    };
    let key = caps.name("key").map_or("", |m| m.as_str().trim());
    let value = caps
        .name("delim")
        .map(|_| caps.name("value").map_or("", |m| m.as_str().trim()).to_string());
    (key, value)
}
