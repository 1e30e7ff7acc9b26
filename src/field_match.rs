//! Schema alignment by field-name similarity.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use similar::TextDiff;

pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.6;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
#[value(rename_all = "kebab-case")]
pub enum FieldMatchStrategy {
    /// Walk left fields in order, each claiming its best unclaimed right field.
    #[default]
    Greedy,
    /// Assign the highest-scoring pairs first, independent of left field order.
    BestFirst,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldPair {
    pub left: String,
    pub right: String,
    pub score: f64,
}

impl FieldPair {
    /// Name used for the pair in results; always the left field name.
    pub fn name(&self) -> &str {
        &self.left
    }
}

/// Injective left → right field assignment.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct FieldMapping {
    pairs: Vec<FieldPair>,
}

impl FieldMapping {
    pub fn pairs(&self) -> &[FieldPair] {
        &self.pairs
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn right_for(&self, left: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|p| p.left == left)
            .map(|p| p.right.as_str())
    }

    pub fn left_for(&self, right: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|p| p.right == right)
            .map(|p| p.left.as_str())
    }

    pub fn pair_for_left(&self, left: &str) -> Option<&FieldPair> {
        self.pairs.iter().find(|p| p.left == left)
    }

    /// Pair whose left name is `name`, falling back to one whose right name is.
    pub fn pair_named(&self, name: &str) -> Option<&FieldPair> {
        self.pair_for_left(name)
            .or_else(|| self.pairs.iter().find(|p| p.right == name))
    }
}

pub fn normalize_field_name(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .collect()
}

/// Edit-based similarity ratio `2·M / (|a| + |b|)` over normalized names.
pub fn name_similarity(left: &str, right: &str) -> f64 {
    let left = normalize_field_name(left);
    let right = normalize_field_name(right);
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }
    if left == right {
        return 1.0;
    }
    f64::from(TextDiff::from_chars(left.as_str(), right.as_str()).ratio())
}

pub fn match_fields<L, R>(
    left: &[L],
    right: &[R],
    threshold: f64,
    strategy: FieldMatchStrategy,
) -> FieldMapping
where
    L: AsRef<str>,
    R: AsRef<str>,
{
    let pairs = match strategy {
        FieldMatchStrategy::Greedy => greedy_pairs(left, right, threshold),
        FieldMatchStrategy::BestFirst => best_first_pairs(left, right, threshold),
    };
    FieldMapping { pairs }
}

fn greedy_pairs<L, R>(left: &[L], right: &[R], threshold: f64) -> Vec<FieldPair>
where
    L: AsRef<str>,
    R: AsRef<str>,
{
    let mut claimed = vec![false; right.len()];
    let mut pairs = Vec::new();
    for l in left {
        let mut best: Option<(usize, f64)> = None;
        for (idx, r) in right.iter().enumerate() {
            if claimed[idx] {
                continue;
            }
            let score = name_similarity(l.as_ref(), r.as_ref());
            if score >= threshold && best.is_none_or(|(_, s)| score > s) {
                best = Some((idx, score));
            }
        }
        if let Some((idx, score)) = best {
            claimed[idx] = true;
            pairs.push(FieldPair {
                left: l.as_ref().to_string(),
                right: right[idx].as_ref().to_string(),
                score,
            });
        }
    }
    pairs
}

fn best_first_pairs<L, R>(left: &[L], right: &[R], threshold: f64) -> Vec<FieldPair>
where
    L: AsRef<str>,
    R: AsRef<str>,
{
    let mut candidates = Vec::new();
    for (li, l) in left.iter().enumerate() {
        for (ri, r) in right.iter().enumerate() {
            let score = name_similarity(l.as_ref(), r.as_ref());
            if score >= threshold {
                candidates.push((li, ri, score));
            }
        }
    }
    candidates.sort_by(|a, b| {
        b.2.total_cmp(&a.2)
            .then_with(|| a.0.cmp(&b.0))
            .then_with(|| a.1.cmp(&b.1))
    });

    let mut left_taken = HashSet::new();
    let mut right_taken = HashSet::new();
    let mut chosen = Vec::new();
    for (li, ri, score) in candidates {
        if left_taken.contains(&li) || right_taken.contains(&ri) {
            continue;
        }
        left_taken.insert(li);
        right_taken.insert(ri);
        chosen.push((li, ri, score));
    }
    // Report in left field order regardless of assignment order.
    chosen.sort_by_key(|(li, _, _)| *li);
    chosen
        .into_iter()
        .map(|(li, ri, score)| FieldPair {
            left: left[li].as_ref().to_string(),
            right: right[ri].as_ref().to_string(),
            score,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_field_name_strips_punctuation() {
        assert_eq!(normalize_field_name("  Order-ID "), "orderid");
        assert_eq!(normalize_field_name("first_name"), "first_name");
        assert_eq!(normalize_field_name("客户 名称"), "客户名称");
    }

    #[test]
    fn similarity_handles_case_and_empty_names() {
        assert_eq!(name_similarity("Name", " name "), 1.0);
        assert_eq!(name_similarity("", "name"), 0.0);
        assert_eq!(name_similarity("$$", "name"), 0.0);
        let amt = name_similarity("amount", "amt");
        assert!((amt - 2.0 / 3.0).abs() < 1e-6, "got {amt}");
    }

    #[test]
    fn greedy_matches_renamed_columns() {
        let mapping = match_fields(
            &["id", "Name", "amount"],
            &["amt", "NAME", "ID"],
            DEFAULT_SIMILARITY_THRESHOLD,
            FieldMatchStrategy::Greedy,
        );
        assert_eq!(mapping.len(), 3);
        assert_eq!(mapping.right_for("id"), Some("ID"));
        assert_eq!(mapping.right_for("Name"), Some("NAME"));
        assert_eq!(mapping.right_for("amount"), Some("amt"));
        assert_eq!(mapping.left_for("amt"), Some("amount"));
        assert_eq!(mapping.pair_named("NAME").map(|p| p.left.as_str()), Some("Name"));
        assert_eq!(mapping.pair_named("amount").map(|p| p.right.as_str()), Some("amt"));
        assert!(mapping.pair_named("missing").is_none());
    }

    #[test]
    fn greedy_never_reuses_a_claimed_field() {
        let mapping = match_fields(
            &["code", "code "],
            &["code"],
            DEFAULT_SIMILARITY_THRESHOLD,
            FieldMatchStrategy::Greedy,
        );
        assert_eq!(mapping.len(), 1);
        assert_eq!(mapping.pairs()[0].left, "code");
    }

    #[test]
    fn below_threshold_yields_empty_mapping() {
        let mapping = match_fields(
            &["alpha"],
            &["zzz"],
            DEFAULT_SIMILARITY_THRESHOLD,
            FieldMatchStrategy::Greedy,
        );
        assert!(mapping.is_empty());
    }

    #[test]
    fn ties_go_to_first_right_field() {
        let mapping = match_fields(&["ab"], &["ab_", "ab__"], 0.5, FieldMatchStrategy::Greedy);
        // "ab" vs "ab_" scores 0.8, vs "ab__" 0.667; no tie here, the better one wins.
        assert_eq!(mapping.right_for("ab"), Some("ab_"));
        let tied = match_fields(&["x"], &["X", "x"], 0.5, FieldMatchStrategy::Greedy);
        assert_eq!(tied.right_for("x"), Some("X"));
    }

    #[test]
    fn best_first_prefers_exact_match_over_field_order() {
        // "customer" comes first, so greedy hands it "customer_id".
        let left = ["customer", "customer_id"];
        let right = ["customer_id"];
        let greedy = match_fields(&left, &right, 0.6, FieldMatchStrategy::Greedy);
        assert_eq!(greedy.right_for("customer"), Some("customer_id"));
        assert_eq!(greedy.right_for("customer_id"), None);

        let best = match_fields(&left, &right, 0.6, FieldMatchStrategy::BestFirst);
        assert_eq!(best.right_for("customer_id"), Some("customer_id"));
        assert_eq!(best.right_for("customer"), None);
    }
}
