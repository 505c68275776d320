//! Hierarchical variables documents (`vars.yml`, `<tenant>_vars.yml`).
//!
//! A parsed document remembers the source text of each top-level entry. When
//! written back, untouched entries, comments and quoting come out as they were
//! read; only entries whose value changed are rendered again.

use serde_yaml::{Mapping, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VarsError {
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error("top-level value is a {0}, expected a mapping")]
    NotAMapping(&'static str),
}

/// Source text of one top-level entry.
#[derive(Debug, Clone, PartialEq)]
struct EntryText {
    key: Value,
    /// Column-0 comments and blank lines directly above the key line.
    lead: String,
    /// Key line plus every nested line.
    body: String,
    /// Value parsed from `body`.
    value: Value,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Layout {
    preamble: String,
    entries: Vec<EntryText>,
    epilogue: String,
}

impl Layout {
    /// Split `text` into per-entry chunks. `None` when the text cannot be
    /// matched line-for-line with `map`.
    fn scan(text: &str, map: &Mapping) -> Option<Layout> {
        let lines: Vec<&str> = text.split_inclusive('\n').collect();
        let key_lines: Vec<usize> =
            (0..lines.len()).filter(|&idx| is_key_line(lines[idx])).collect();
        if key_lines.len() != map.len() {
            return None;
        }

        let Some(&first) = key_lines.first() else {
            return Some(Layout { preamble: text.to_string(), ..Layout::default() });
        };

        let mut layout = Layout { preamble: lines[..first].concat(), ..Layout::default() };
        let mut lead = String::new();
        for (pos, (key, value)) in map.iter().enumerate() {
            let start = key_lines[pos];
            let next = key_lines.get(pos + 1).copied().unwrap_or(lines.len());
            let mut end = next;
            while end > start + 1 && is_trailer(lines[end - 1]) {
                end -= 1;
            }

            let body = lines[start..end].concat();
            let parsed: Mapping = serde_yaml::from_str(&body).ok()?;
            if parsed.len() != 1 || parsed.get(key) != Some(value) {
                return None;
            }

            layout.entries.push(EntryText {
                key: key.clone(),
                lead: std::mem::take(&mut lead),
                body,
                value: value.clone(),
            });
            lead = lines[end..next].concat();
        }
        layout.epilogue = lead;

        Some(layout)
    }
}

fn is_key_line(line: &str) -> bool {
    line.chars().next().is_some_and(|c| {
        !matches!(c, ' ' | '\t' | '\r' | '\n' | '#' | '-' | '.' | '%' | '?')
    })
}

fn is_trailer(line: &str) -> bool {
    line.trim().is_empty() || line.starts_with('#') || line.trim_end() == "..."
}

fn push_block(out: &mut String, block: &str) {
    out.push_str(block);
    if !block.is_empty() && !block.ends_with('\n') {
        out.push('\n');
    }
}

/// Order-preserving top-level mapping. Values keep whatever shape they have.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VarsDocument {
    map: Mapping,
    layout: Option<Layout>,
    /// Entry text copied from another document by [`VarsDocument::copy_entry`].
    carried: Vec<EntryText>,
}

impl VarsDocument {
    pub fn from_mapping(map: Mapping) -> Self {
        Self { map, ..Self::default() }
    }

    pub fn parse(text: &str) -> Result<Self, VarsError> {
        let map = if is_blank_document(text) {
            Mapping::new()
        } else {
            match serde_yaml::from_str::<Value>(text)? {
                Value::Mapping(map) => map,
                Value::Null => Mapping::new(),
                other => return Err(VarsError::NotAMapping(kind_name(&other))),
            }
        };
        let layout = Layout::scan(text, &map);
        if layout.is_none() {
            tracing::debug!("Top-level entries could not be located in the text; comments will not be kept.");
        }
        Ok(Self { map, layout, carried: Vec::new() })
    }

    /// Serialize with an explicit `---` document start, keeping the source
    /// layout when the document was parsed from text.
    pub fn to_yaml_string(&self) -> Result<String, VarsError> {
        if let Some(layout) = &self.layout {
            if let Some(text) = self.render_layout(layout)? {
                return Ok(text);
            }
            tracing::debug!("Re-rendered vars text did not read back identically; writing it plainly.");
        }
        Ok(format!("---\n{}", serde_yaml::to_string(&self.map)?))
    }

    fn render_layout(&self, layout: &Layout) -> Result<Option<String>, VarsError> {
        let mut out = String::new();
        if !layout.preamble.lines().any(|l| l.trim_start().starts_with("---")) {
            out.push_str("---\n");
        }
        out.push_str(&layout.preamble);

        for entry in &layout.entries {
            let Some(value) = self.map.get(&entry.key) else {
                continue;
            };
            out.push_str(&entry.lead);
            if value == &entry.value {
                push_block(&mut out, &entry.body);
            } else {
                push_block(&mut out, &self.render_entry(&entry.key, value)?);
            }
        }
        for (key, value) in &self.map {
            if !layout.entries.iter().any(|e| &e.key == key) {
                push_block(&mut out, &self.render_entry(key, value)?);
            }
        }
        out.push_str(&layout.epilogue);

        let reads_back = Self::parse(&out).is_ok_and(|doc| {
            doc.map == self.map && doc.map.keys().eq(self.map.keys())
        });
        Ok(reads_back.then_some(out))
    }

    fn render_entry(&self, key: &Value, value: &Value) -> Result<String, VarsError> {
        if let Some(text) = self.carried.iter().find(|e| &e.key == key && &e.value == value) {
            return Ok(text.body.clone());
        }
        let mut single = Mapping::new();
        single.insert(key.clone(), value.clone());
        Ok(serde_yaml::to_string(&single)?)
    }

    /// Take `key` and its value from `from`, keeping the entry's source text
    /// when `from` has it. Returns the value it replaced.
    pub fn copy_entry(&mut self, from: &VarsDocument, key: &Value) -> Option<Value> {
        let value = from.map.get(key)?.clone();
        self.carried.retain(|e| &e.key != key);
        if let Some(text) = from.layout.as_ref().and_then(|l| l.entries.iter().find(|e| &e.key == key)) {
            self.carried.push(EntryText { lead: String::new(), ..text.clone() });
        }
        self.map.insert(key.clone(), value)
    }

    pub fn mapping(&self) -> &Mapping {
        &self.map
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.map.get(key)
    }

    pub fn contains(&self, key: &Value) -> bool {
        self.map.contains_key(key)
    }

    /// Replaces in place when `key` exists, appends otherwise.
    pub fn insert(&mut self, key: Value, value: Value) -> Option<Value> {
        self.map.insert(key, value)
    }

    pub fn keys(&self) -> impl Iterator<Item = &Value> {
        self.map.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.map.iter()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Display form of a top-level key for logs.
pub fn key_label(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_else(|_| format!("{other:?}")),
    }
}

fn is_blank_document(text: &str) -> bool {
    text.lines().map(str::trim).all(|line| {
        line.is_empty() || line.starts_with('#') || line == "---" || line == "..."
    })
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}
