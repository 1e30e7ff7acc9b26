use serde::Serialize;

use crate::{
    data::Record,
    field_match::FieldPair,
    identity::IdentityKey,
    normalize::{NormalizedValue, Normalizer},
};

/// How a compared row was located: by identity key or by position.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RowIdentity {
    Key { key: IdentityKey, label: String },
    Position { index: usize },
}

impl std::fmt::Display for RowIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RowIdentity::Key { label, .. } => f.write_str(label),
            RowIdentity::Position { index } => write!(f, "row {}", index + 1),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FieldDiff {
    pub field: String,
    pub left: NormalizedValue,
    pub right: NormalizedValue,
    pub equal: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RowComparison {
    pub identity: RowIdentity,
    /// `None` when the row exists only in the other table.
    pub left_row: Option<usize>,
    pub right_row: Option<usize>,
    pub fields: Vec<FieldDiff>,
    pub equal_count: usize,
    pub compared_count: usize,
    pub similarity: f64,
    pub identical: bool,
}

impl RowComparison {
    pub fn is_one_sided(&self) -> bool {
        self.left_row.is_none() || self.right_row.is_none()
    }

    pub fn differences(&self) -> impl Iterator<Item = &FieldDiff> {
        self.fields.iter().filter(|d| !d.equal)
    }
}

/// One side of a row comparison: the row index and its record, if the row exists.
pub type RowSide<'a> = Option<(usize, &'a Record)>;

/// Compares two aligned rows over `fields`, named by their left field names.
///
/// A field absent from a record compares as `Empty` rather than being skipped,
/// so every comparison over the same field list has the same `compared_count`.
/// When a whole row is absent every field is reported as unequal.
pub fn diff_rows(
    identity: RowIdentity,
    left: RowSide<'_>,
    right: RowSide<'_>,
    fields: &[FieldPair],
    normalizer: &Normalizer,
) -> RowComparison {
    let one_sided = left.is_none() || right.is_none();
    let diffs = fields
        .iter()
        .map(|pair| {
            let left_value = normalizer.normalize_field(left.and_then(|(_, r)| r.get(&pair.left)));
            let right_value =
                normalizer.normalize_field(right.and_then(|(_, r)| r.get(&pair.right)));
            let equal = !one_sided && normalizer.equivalent(&left_value, &right_value);
            FieldDiff {
                field: pair.name().to_string(),
                left: left_value,
                right: right_value,
                equal,
            }
        })
        .collect::<Vec<_>>();

    let equal_count = diffs.iter().filter(|d| d.equal).count();
    let compared_count = diffs.len();
    let similarity = if one_sided {
        0.0
    } else if compared_count == 0 {
        1.0
    } else {
        equal_count as f64 / compared_count as f64
    };

    RowComparison {
        identity,
        left_row: left.map(|(idx, _)| idx),
        right_row: right.map(|(idx, _)| idx),
        fields: diffs,
        equal_count,
        compared_count,
        similarity,
        identical: similarity == 1.0,
    }
}
