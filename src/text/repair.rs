//! Repairs for systematic defects in extracted Persian text.
//!
//! [`TextRepairer::repair`] applies, in order:
//!
//! 1. substitutions from a versioned [`RepairDictionary`],
//! 2. structural fixes: letters shattered by spurious spaces are rejoined, and
//!    the `می`/`نمی` prefix and the bound suffixes `ها`, `های`, `تر`, `ترین`
//!    are reattached with a zero-width non-joiner,
//! 3. formatting fixes for phone numbers, e-mail addresses and Persian
//!    punctuation spacing.
//!
//! Repairs never fail. When a rule is unsure it leaves the text alone.

use crate::error::{Error, Result};
use crate::text::script::{is_persian_letter, ZWNJ};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

const BUILTIN_DICTIONARY: &str = include_str!("../../data/repair_dictionary.json");

lazy_static! {
    static ref BUILTIN: RepairDictionary = RepairDictionary::from_json_str(BUILTIN_DICTIONARY)
        .unwrap_or_else(|e| {
            log::error!("Built-in repair dictionary is invalid: {}", e);
            RepairDictionary::empty()
        });

    static ref RE_PREFIX: Regex = Regex::new(
        r"(^|\s)(نمی|می)[ \t]+([\x{0621}-\x{063A}\x{0641}-\x{064A}\x{067E}\x{0686}\x{0698}\x{06A9}\x{06AF}\x{06CC}])"
    ).unwrap();
    static ref RE_SUFFIX: Regex = Regex::new(
        r"([\x{0621}-\x{063A}\x{0641}-\x{064A}\x{067E}\x{0686}\x{0698}\x{06A9}\x{06AF}\x{06CC}])[ \t]+(ترین|تر|های|ها)(\s|$|[.,:;!?،؛؟])"
    ).unwrap();
    static ref RE_PHONE: Regex = Regex::new(r"\b(\d{2,3})[ \t]+(\d{3,4})[ \t]+(\d{4})\b").unwrap();
    static ref RE_EMAIL: Regex = Regex::new(
        r"([A-Za-z0-9._%+-]+)[ \t]*@[ \t]*([A-Za-z0-9-]+)[ \t]*\.[ \t]*([A-Za-z]{2,})\b"
    ).unwrap();
    static ref RE_SPACE_BEFORE_PUNCT: Regex = Regex::new(r"[ \t]+([،؛؟])").unwrap();
    static ref RE_NO_SPACE_AFTER_PUNCT: Regex = Regex::new(r"([،؛؟])([^\s\d،؛؟.!:)\]»])").unwrap();
}

/// Fold the Arabic letter variants that extraction commonly emits onto the
/// Persian forms used in dictionary keys.
fn fold(c: char) -> char {
    match c {
        'ي' | 'ى' => 'ی',
        'ك' => 'ک',
        other => other,
    }
}

/// One dictionary substitution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairEntry {
    /// Defective form as it appears in extracted text
    pub from: String,
    /// Correct form
    pub to: String,
    /// Only replace when not adjacent to other Persian letters
    #[serde(default)]
    pub whole_word: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct DictionaryFile {
    version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    entries: Vec<RepairEntry>,
}

/// A versioned table of known defective substrings and their corrections.
///
/// Matching is a single left-to-right pass that prefers the longest entry at
/// each position and never rescans replaced text.
#[derive(Debug, Clone, Default)]
pub struct RepairDictionary {
    version: String,
    entries: Vec<RepairEntry>,
    // folded first char -> entry indices, longest `from` first
    index: HashMap<char, Vec<usize>>,
}

impl RepairDictionary {
    /// An empty table.
    pub fn empty() -> Self {
        Self {
            version: "empty".to_string(),
            ..Default::default()
        }
    }

    /// The table shipped with the crate.
    pub fn builtin() -> Self {
        BUILTIN.clone()
    }

    /// Parse a table from JSON: `{"version": "...", "entries": [{"from", "to", "whole_word"}]}`.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let file: DictionaryFile = serde_json::from_str(json)?;
        let mut dict = Self {
            version: file.version,
            ..Default::default()
        };
        for entry in file.entries {
            dict.push(entry)?;
        }
        dict.reindex();
        Ok(dict)
    }

    /// Load a table from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let dict = Self::from_json_str(&content)?;
        log::info!(
            "Loaded repair dictionary {} ({} entries) from {}",
            dict.version,
            dict.len(),
            path.as_ref().display()
        );
        Ok(dict)
    }

    /// Serialize the table back to JSON.
    pub fn to_json_string(&self) -> Result<String> {
        let file = DictionaryFile {
            version: self.version.clone(),
            description: None,
            entries: self.entries.clone(),
        };
        Ok(serde_json::to_string_pretty(&file)?)
    }

    /// Table version string.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries.
    pub fn entries(&self) -> &[RepairEntry] {
        &self.entries
    }

    /// Add or replace an entry.
    pub fn insert(&mut self, from: &str, to: &str, whole_word: bool) -> Result<()> {
        self.push(RepairEntry {
            from: from.to_string(),
            to: to.to_string(),
            whole_word,
        })?;
        self.reindex();
        Ok(())
    }

    /// Merge another table into this one; its entries win on conflict.
    pub fn extend(&mut self, other: &RepairDictionary) {
        for entry in &other.entries {
            self.entries.retain(|e| e.from != entry.from);
            self.entries.push(entry.clone());
        }
        self.version = format!("{}+{}", self.version, other.version);
        self.reindex();
    }

    fn push(&mut self, entry: RepairEntry) -> Result<()> {
        if entry.from.is_empty() {
            return Err(Error::Config("repair entry with empty `from`".to_string()));
        }
        self.entries.retain(|e| e.from != entry.from);
        self.entries.push(entry);
        Ok(())
    }

    fn reindex(&mut self) {
        self.index.clear();
        for (i, entry) in self.entries.iter().enumerate() {
            if let Some(first) = entry.from.chars().next() {
                self.index.entry(fold(first)).or_default().push(i);
            }
        }
        let entries = &self.entries;
        for indices in self.index.values_mut() {
            indices.sort_by(|&a, &b| {
                entries[b].from.chars().count().cmp(&entries[a].from.chars().count())
            });
        }
    }

    /// Apply the substitutions to `text`.
    ///
    /// # Examples
    ///
    /// ```
    /// use docsift::text::RepairDictionary;
    ///
    /// let dict = RepairDictionary::from_json_str(
    ///     r#"{"version": "t1", "entries": [{"from": "ab", "to": "X"}, {"from": "abc", "to": "Y"}]}"#,
    /// ).unwrap();
    /// assert_eq!(dict.apply("abcab"), "YX");
    /// ```
    pub fn apply(&self, text: &str) -> String {
        if self.entries.is_empty() {
            return text.to_string();
        }

        let chars: Vec<char> = text.chars().collect();
        let mut out = String::with_capacity(text.len());
        let mut i = 0;
        'outer: while i < chars.len() {
            if let Some(candidates) = self.index.get(&fold(chars[i])) {
                for &idx in candidates {
                    let entry = &self.entries[idx];
                    if let Some(len) = match_at(&chars, i, entry) {
                        out.push_str(&entry.to);
                        i += len;
                        continue 'outer;
                    }
                }
            }
            out.push(chars[i]);
            i += 1;
        }
        out
    }
}

/// Length in chars of `entry.from` matched at `chars[start..]`, honouring word boundaries.
fn match_at(chars: &[char], start: usize, entry: &RepairEntry) -> Option<usize> {
    let mut len = 0;
    for pattern in entry.from.chars() {
        let c = *chars.get(start + len)?;
        if fold(c) != fold(pattern) {
            return None;
        }
        len += 1;
    }
    if entry.whole_word {
        let before = start.checked_sub(1).and_then(|p| chars.get(p));
        let after = chars.get(start + len);
        if before.is_some_and(|&c| is_persian_letter(c) || c == ZWNJ)
            || after.is_some_and(|&c| is_persian_letter(c) || c == ZWNJ)
        {
            return None;
        }
    }
    Some(len)
}

/// Rejoin runs of three or more single-letter Persian tokens ("ق ر ا ر" -> "قرار").
fn collapse_shattered_letters(text: &str) -> String {
    let tokens: Vec<&str> = text.split(' ').collect();
    let single = |t: &str| {
        let mut chars = t.chars();
        matches!((chars.next(), chars.next()), (Some(c), None) if is_persian_letter(c))
    };

    let mut out: Vec<String> = Vec::with_capacity(tokens.len());
    let mut i = 0;
    while i < tokens.len() {
        if single(tokens[i]) {
            let mut j = i;
            while j < tokens.len() && single(tokens[j]) {
                j += 1;
            }
            if j - i >= 3 {
                out.push(tokens[i..j].concat());
            } else {
                out.extend(tokens[i..j].iter().map(|t| t.to_string()));
            }
            i = j;
        } else {
            out.push(tokens[i].to_string());
            i += 1;
        }
    }
    out.join(" ")
}

/// Applies dictionary, structural and formatting repairs.
#[derive(Debug, Clone)]
pub struct TextRepairer {
    dictionary: Arc<RepairDictionary>,
}

impl Default for TextRepairer {
    fn default() -> Self {
        Self::new(RepairDictionary::builtin())
    }
}

impl TextRepairer {
    /// Create a repairer around a dictionary.
    pub fn new(dictionary: RepairDictionary) -> Self {
        Self {
            dictionary: Arc::new(dictionary),
        }
    }

    /// Create a repairer sharing an already loaded dictionary.
    pub fn shared(dictionary: Arc<RepairDictionary>) -> Self {
        Self { dictionary }
    }

    /// The dictionary in use.
    pub fn dictionary(&self) -> &RepairDictionary {
        &self.dictionary
    }

    /// Repair `text`. Total: never fails, may under-repair.
    ///
    /// # Examples
    ///
    /// ```
    /// use docsift::text::{RepairDictionary, TextRepairer};
    ///
    /// let repairer = TextRepairer::new(RepairDictionary::empty());
    /// assert_eq!(repairer.repair("او می رود"), "او می\u{200C}رود");
    /// assert_eq!(repairer.repair("تماس 021 8888 1234"), "تماس 021-8888-1234");
    /// ```
    pub fn repair(&self, text: &str) -> String {
        if text.is_empty() {
            return String::new();
        }
        let substituted = self.dictionary.apply(text);
        let structural = repair_structure(&substituted);
        repair_formatting(&structural)
    }
}

fn repair_structure(text: &str) -> String {
    let collapsed = collapse_shattered_letters(text);
    let zwnj = ZWNJ.to_string();
    let prefixed = RE_PREFIX.replace_all(&collapsed, format!("${{1}}${{2}}{}${{3}}", zwnj));
    RE_SUFFIX
        .replace_all(&prefixed, format!("${{1}}{}${{2}}${{3}}", zwnj))
        .into_owned()
}

fn repair_formatting(text: &str) -> String {
    let phones = RE_PHONE.replace_all(text, "$1-$2-$3");
    let emails = RE_EMAIL.replace_all(&phones, "$1@$2.$3");
    let tight = RE_SPACE_BEFORE_PUNCT.replace_all(&emails, "$1");
    RE_NO_SPACE_AFTER_PUNCT.replace_all(&tight, "$1 $2").into_owned()
}
