//! Component extraction
//!
//! Turns a breakdown (ordered `{token: category}` pairs) into a bucket of
//! tokens per fixed category, optionally back-filled from mask attributes.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{fields, Attributes};

/// Fixed token categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Brand,
    Model,
    FilterType,
    Size,
    Strap,
    Style,
    Color,
    Valved,
    Misc,
}

impl Category {
    pub const ALL: [Category; 9] = [
        Category::Brand,
        Category::Model,
        Category::FilterType,
        Category::Size,
        Category::Strap,
        Category::Style,
        Category::Color,
        Category::Valved,
        Category::Misc,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Brand => "brand",
            Category::Model => "model",
            Category::FilterType => "filter_type",
            Category::Size => "size",
            Category::Strap => "strap",
            Category::Style => "style",
            Category::Color => "color",
            Category::Valved => "valved",
            Category::Misc => "misc",
        }
    }

    /// Normalize a breakdown label; unrecognized labels land in `misc`
    pub fn from_label(label: &str) -> Category {
        match label.trim().to_lowercase().as_str() {
            "brand" => Category::Brand,
            "model" => Category::Model,
            "filter_type" | "filter" => Category::FilterType,
            "size" => Category::Size,
            "strap" | "strap_type" => Category::Strap,
            "style" => Category::Style,
            "color" | "colour" => Category::Color,
            "valved" | "valve" => Category::Valved,
            _ => Category::Misc,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `{token: label}` pair of a breakdown
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct BreakdownEntry {
    pub token: String,
    pub label: String,
}

impl BreakdownEntry {
    pub fn new(token: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            label: label.into(),
        }
    }
}

impl TryFrom<BTreeMap<String, String>> for BreakdownEntry {
    type Error = String;

    fn try_from(map: BTreeMap<String, String>) -> Result<Self, Self::Error> {
        if map.len() != 1 {
            return Err(format!("breakdown entry must have exactly one key, got {}", map.len()));
        }
        let (token, label) = map
            .into_iter()
            .next()
            .ok_or_else(|| "empty breakdown entry".to_string())?;
        Ok(Self { token, label })
    }
}

impl From<BreakdownEntry> for BTreeMap<String, String> {
    fn from(entry: BreakdownEntry) -> Self {
        BTreeMap::from([(entry.token, entry.label)])
    }
}

/// Ordered decomposition of a product name
pub type Breakdown = Vec<BreakdownEntry>;

/// Read a breakdown from stored JSON, ignoring malformed pairs
pub fn breakdown_from_value(value: &Value) -> Breakdown {
    value
        .as_array()
        .map(|entries| {
            entries
                .iter()
                .filter_map(Value::as_object)
                .flat_map(|pair| {
                    pair.iter().filter_map(|(token, label)| {
                        label.as_str().map(|label| BreakdownEntry::new(token.clone(), label))
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Tokens grouped by category; every category is always present
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentBucket(BTreeMap<Category, Vec<String>>);

impl Default for ComponentBucket {
    fn default() -> Self {
        Self(Category::ALL.iter().map(|c| (*c, Vec::new())).collect())
    }
}

impl ComponentBucket {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a bucket from a breakdown, skipping blank tokens and labels
    pub fn from_breakdown(breakdown: &[BreakdownEntry]) -> Self {
        let mut bucket = Self::new();
        for entry in breakdown {
            let token = entry.token.trim();
            if token.is_empty() || entry.label.trim().is_empty() {
                continue;
            }
            bucket.push(Category::from_label(&entry.label), token.to_string());
        }
        bucket
    }

    pub fn push(&mut self, category: Category, token: String) {
        self.0.entry(category).or_default().push(token);
    }

    pub fn tokens(&self, category: Category) -> &[String] {
        self.0.get(&category).map(Vec::as_slice).unwrap_or_default()
    }

    /// True when no category holds a token
    pub fn is_blank(&self) -> bool {
        self.0.values().all(Vec::is_empty)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Category, &[String])> {
        self.0.iter().map(|(category, tokens)| (*category, tokens.as_slice()))
    }

    /// Back-fill empty filter type, strap and style from mask attributes.
    ///
    /// Returns a new bucket; `self` is left as it was.
    pub fn enrich_with_mask_attributes(&self, attributes: &Attributes) -> Self {
        const BACKFILL: [(Category, &str); 3] = [
            (Category::FilterType, fields::FILTER_TYPE),
            (Category::Strap, fields::STRAP_TYPE),
            (Category::Style, fields::STYLE),
        ];

        let mut enriched = self.clone();
        for (category, field) in BACKFILL {
            if !enriched.tokens(category).is_empty() {
                continue;
            }
            let Some(value) = attributes.get(field).and_then(Value::as_str) else {
                continue;
            };
            for part in value.split(['/', ',']).map(str::trim).filter(|p| !p.is_empty()) {
                enriched.push(category, part.to_string());
            }
        }
        enriched
    }
}
