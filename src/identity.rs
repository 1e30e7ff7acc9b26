//! Row identity resolution.
//!
//! Rows from each table are bucketed by an [`IdentityKey`] derived from a set
//! of key fields. The key fields come from the caller, from field-name hints,
//! from column uniqueness, or, failing all of those, from every common field
//! (a full-row content hash). Buckets live in a `BTreeMap` so iteration order
//! is the sorted key order and results are reproducible run to run.

use std::{
    collections::{BTreeMap, HashSet},
    fmt,
    str::FromStr,
};

use log::debug;
use serde::{Deserialize, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::{
    data::{Record, Table},
    error::Side,
    field_match::FieldPair,
    normalize::Normalizer,
};

/// Substrings that mark a field name as a likely identifier.
pub const KEY_HINTS: &[&str] = &["id", "key", "index", "code", "number"];

const MAX_AUTO_KEY_FIELDS: usize = 2;
const KEY_SEPARATOR: &str = "\u{1f}";
const MISSING_MARKER: &str = "\u{0}missing";

/// 128-bit digest over the normalized key values of one record.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IdentityKey([u8; 16]);

impl IdentityKey {
    pub fn from_parts<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut hasher = Sha256::new();
        for (idx, part) in parts.into_iter().enumerate() {
            if idx > 0 {
                hasher.update(KEY_SEPARATOR.as_bytes());
            }
            hasher.update(part.as_ref().as_bytes());
        }
        let digest = hasher.finalize();
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&digest[..16]);
        IdentityKey(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IdentityKey({self})")
    }
}

impl Serialize for IdentityKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A key column, named as it appears in each table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeyField {
    pub left: String,
    pub right: String,
}

impl KeyField {
    pub fn new(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self {
            left: left.into(),
            right: right.into(),
        }
    }

    pub fn same(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            left: name.clone(),
            right: name,
        }
    }

    pub fn name_on(&self, side: Side) -> &str {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }
}

impl From<&FieldPair> for KeyField {
    fn from(pair: &FieldPair) -> Self {
        KeyField::new(pair.left.clone(), pair.right.clone())
    }
}

impl From<&str> for KeyField {
    fn from(name: &str) -> Self {
        KeyField::same(name)
    }
}

impl From<(&str, &str)> for KeyField {
    fn from((left, right): (&str, &str)) -> Self {
        KeyField::new(left, right)
    }
}

/// Parses `left=right`, or a bare `name` used on both sides.
impl FromStr for KeyField {
    type Err = String;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let (left, right) = match text.split_once('=') {
            Some((l, r)) => (l.trim(), r.trim()),
            None => (text.trim(), text.trim()),
        };
        if left.is_empty() || right.is_empty() {
            return Err(format!("Invalid key field '{text}'; expected 'name' or 'left=right'"));
        }
        Ok(KeyField::new(left, right))
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", content = "fields", rename_all = "snake_case")]
pub enum KeyStrategy {
    Explicit(Vec<KeyField>),
    NameHint(Vec<KeyField>),
    Uniqueness(Vec<KeyField>),
    ContentHash(Vec<KeyField>),
    /// Ordered mode: rows are paired by position, no identity is computed.
    Positional,
}

impl KeyStrategy {
    pub fn fields(&self) -> &[KeyField] {
        match self {
            KeyStrategy::Explicit(fields)
            | KeyStrategy::NameHint(fields)
            | KeyStrategy::Uniqueness(fields)
            | KeyStrategy::ContentHash(fields) => fields,
            KeyStrategy::Positional => &[],
        }
    }

    pub fn is_content_hash(&self) -> bool {
        matches!(self, KeyStrategy::ContentHash(_))
    }

    pub fn describe(&self) -> &'static str {
        match self {
            KeyStrategy::Explicit(_) => "explicit key",
            KeyStrategy::NameHint(_) => "key detected by name",
            KeyStrategy::Uniqueness(_) => "key detected by uniqueness",
            KeyStrategy::ContentHash(_) => "full-row content hash",
            KeyStrategy::Positional => "row position",
        }
    }
}

/// Row indices per identity, in original table order within each bucket.
pub type Groups = BTreeMap<IdentityKey, Vec<usize>>;

#[derive(Debug, Clone)]
pub struct Resolution {
    pub strategy: KeyStrategy,
    pub left: Groups,
    pub right: Groups,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchedGroup<'a> {
    pub key: IdentityKey,
    pub left: &'a [usize],
    pub right: &'a [usize],
}

impl MatchedGroup<'_> {
    pub fn pair_count(&self) -> usize {
        self.left.len().min(self.right.len())
    }

    pub fn surplus_left(&self) -> usize {
        self.left.len() - self.pair_count()
    }

    pub fn surplus_right(&self) -> usize {
        self.right.len() - self.pair_count()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pairing<'a> {
    pub matched: Vec<MatchedGroup<'a>>,
    /// Row indices of identities found only in the left table, ascending.
    pub left_only: Vec<usize>,
    pub right_only: Vec<usize>,
}

impl Pairing<'_> {
    pub fn matched_pairs(&self) -> usize {
        self.matched.iter().map(MatchedGroup::pair_count).sum()
    }
}

impl Resolution {
    pub fn pair(&self) -> Pairing<'_> {
        let mut pairing = Pairing::default();
        for (key, left_rows) in &self.left {
            match self.right.get(key) {
                Some(right_rows) => pairing.matched.push(MatchedGroup {
                    key: *key,
                    left: left_rows,
                    right: right_rows,
                }),
                None => pairing.left_only.extend_from_slice(left_rows),
            }
        }
        for (key, right_rows) in &self.right {
            if !self.left.contains_key(key) {
                pairing.right_only.extend_from_slice(right_rows);
            }
        }
        pairing.left_only.sort_unstable();
        pairing.right_only.sort_unstable();
        pairing
    }
}

pub fn resolve(
    left: &Table,
    right: &Table,
    common: &[FieldPair],
    explicit: Option<&[KeyField]>,
    normalizer: &Normalizer,
) -> Resolution {
    let strategy = select_strategy(left, right, common, explicit, normalizer);
    debug!(
        "Resolving identities by {} over {:?}",
        strategy.describe(),
        strategy.fields().iter().map(|f| &f.left).collect::<Vec<_>>()
    );
    let fields = strategy.fields();
    Resolution {
        left: group_rows(left, Side::Left, fields, normalizer),
        right: group_rows(right, Side::Right, fields, normalizer),
        strategy,
    }
}

pub fn select_strategy(
    left: &Table,
    right: &Table,
    common: &[FieldPair],
    explicit: Option<&[KeyField]>,
    normalizer: &Normalizer,
) -> KeyStrategy {
    if let Some(fields) = explicit
        && !fields.is_empty()
    {
        return KeyStrategy::Explicit(fields.to_vec());
    }

    let hinted = common
        .iter()
        .filter(|pair| has_key_hint(&pair.left))
        .take(MAX_AUTO_KEY_FIELDS)
        .map(KeyField::from)
        .collect::<Vec<_>>();
    if !hinted.is_empty() {
        return KeyStrategy::NameHint(hinted);
    }

    let mut scored = common
        .iter()
        .map(|pair| {
            let score = (uniqueness_ratio(left, &pair.left, normalizer)
                + uniqueness_ratio(right, &pair.right, normalizer))
                / 2.0;
            (pair, score)
        })
        .filter(|(_, score)| *score > 0.0)
        .collect::<Vec<_>>();
    // Stable sort keeps field order among equal scores.
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    let unique = scored
        .into_iter()
        .take(MAX_AUTO_KEY_FIELDS)
        .map(|(pair, _)| KeyField::from(pair))
        .collect::<Vec<_>>();
    if !unique.is_empty() {
        return KeyStrategy::Uniqueness(unique);
    }

    KeyStrategy::ContentHash(common.iter().map(KeyField::from).collect())
}

pub fn has_key_hint(field: &str) -> bool {
    let lowered = field.to_lowercase();
    KEY_HINTS.iter().any(|hint| lowered.contains(hint))
}

/// Distinct non-empty normalized values divided by the row count.
pub fn uniqueness_ratio(table: &Table, field: &str, normalizer: &Normalizer) -> f64 {
    if table.is_empty() {
        return 0.0;
    }
    let distinct = table
        .records()
        .iter()
        .map(|record| normalizer.normalize_field(record.get(field)))
        .filter(|value| !value.is_empty())
        .map(|value| value.canonical())
        .collect::<HashSet<_>>()
        .len();
    distinct as f64 / table.len() as f64
}

/// Canonical per-field strings of `record` for the given field names.
pub fn key_parts<'a, I>(record: &Record, fields: I, normalizer: &Normalizer) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    fields
        .into_iter()
        .map(|field| match record.get(field) {
            Some(value) => normalizer.normalize(value).canonical(),
            None => MISSING_MARKER.to_string(),
        })
        .collect()
}

pub fn identity_key<'a, I>(record: &Record, fields: I, normalizer: &Normalizer) -> IdentityKey
where
    I: IntoIterator<Item = &'a str>,
{
    IdentityKey::from_parts(key_parts(record, fields, normalizer))
}

pub fn group_rows(
    table: &Table,
    side: Side,
    fields: &[KeyField],
    normalizer: &Normalizer,
) -> Groups {
    let mut groups = Groups::new();
    for (idx, record) in table.records().iter().enumerate() {
        let key = identity_key(record, fields.iter().map(|f| f.name_on(side)), normalizer);
        groups.entry(key).or_default().push(idx);
    }
    groups
}
