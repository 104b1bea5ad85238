//! Traffic classification for access log entries.
//!
//! Every entry is mapped to exactly one [`Category`] through an explicit
//! action code table. Codes missing from the table fall back to a configured
//! default category and are counted, never dropped.

use std::collections::BTreeMap;
use std::fmt;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::core::entry::LogEntry;
use crate::models::AnalyticsConfig;

/// Traffic category derived from the middleware decision
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Request was served normally
    Legitimate,
    /// Automated client that was challenged or allowed through
    Bot,
    /// Request was blocked
    Malicious,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Legitimate, Category::Bot, Category::Malicious];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Legitimate => "legitimate",
            Category::Bot => "bot",
            Category::Malicious => "malicious",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Built-in action code table.
///
/// Covers both the `allow`/`block_*` naming and the `legitimate`/`*_blocked`
/// naming written by the edge middleware.
pub const DEFAULT_ACTION_TABLE: &[(&str, Category)] = &[
    ("allow", Category::Legitimate),
    ("legitimate", Category::Legitimate),
    ("challenge", Category::Bot),
    ("bot_allowed", Category::Bot),
    ("block_geo", Category::Malicious),
    ("block_path", Category::Malicious),
    ("block_bot", Category::Malicious),
    ("block_rate", Category::Malicious),
    ("geo_blocked", Category::Malicious),
    ("path_blocked", Category::Malicious),
    ("bot_blocked", Category::Malicious),
    ("rate_limited", Category::Malicious),
];

/// Action code to category mapping with an explicit fallback
#[derive(Debug, Clone, PartialEq)]
pub struct ActionTable {
    mapping: BTreeMap<String, Category>,
    default_category: Category,
}

impl ActionTable {
    /// Table holding only the given entries
    pub fn new<I, S>(entries: I, default_category: Category) -> Self
    where
        I: IntoIterator<Item = (S, Category)>,
        S: AsRef<str>,
    {
        let mapping = entries
            .into_iter()
            .map(|(code, category)| (normalize(code.as_ref()), category))
            .collect();
        Self { mapping, default_category }
    }

    /// Built-in table with configured overrides applied on top
    pub fn from_config(config: &AnalyticsConfig) -> Self {
        let mut table = Self::new(DEFAULT_ACTION_TABLE.iter().copied(), config.default_category);
        for (code, category) in &config.action_mapping {
            table.mapping.insert(normalize(code), *category);
        }
        table
    }

    /// Mapped category, or `None` when the code is not in the table
    pub fn lookup(&self, action_code: &str) -> Option<Category> {
        self.mapping.get(&normalize(action_code)).copied()
    }

    pub fn default_category(&self) -> Category {
        self.default_category
    }

    /// All mapped codes in lexical order
    pub fn entries(&self) -> impl Iterator<Item = (&str, Category)> {
        self.mapping.iter().map(|(code, category)| (code.as_str(), *category))
    }
}

impl Default for ActionTable {
    fn default() -> Self {
        Self::from_config(&AnalyticsConfig::default())
    }
}

fn normalize(code: &str) -> String {
    code.trim().to_lowercase()
}

/// Stateful classifier that tracks unmapped action codes
#[derive(Debug, Clone)]
pub struct Classifier {
    table: ActionTable,
    unmapped: BTreeMap<String, u64>,
}

impl Classifier {
    pub fn new(table: ActionTable) -> Self {
        Self { table, unmapped: BTreeMap::new() }
    }

    /// Classify one entry, falling back to the default category
    pub fn classify(&mut self, entry: &LogEntry) -> Category {
        match self.table.lookup(&entry.action_code) {
            Some(category) => category,
            None => {
                let count = self.unmapped.entry(entry.action_code.clone()).or_insert(0);
                if *count == 0 {
                    warn!(
                        "Unmapped action code '{}', counting as {}",
                        entry.action_code, self.table.default_category
                    );
                }
                *count += 1;
                self.table.default_category
            }
        }
    }

    /// Total number of entries that hit the fallback
    pub fn unmapped_total(&self) -> u64 {
        self.unmapped.values().sum()
    }

    /// Fallback hits per unmapped code
    pub fn unmapped_codes(&self) -> &BTreeMap<String, u64> {
        &self.unmapped
    }

    pub fn table(&self) -> &ActionTable {
        &self.table
    }
}
