//! Bucket similarity scoring
//!
//! Weighted per-category soft overlap with brand/model gating. Token
//! alignment inside a category is greedy: each token on the left takes the
//! best unused token on the right, first best wins on ties.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::components::{Category, ComponentBucket};

/// Categories that contribute to the weighted average
pub const COMPONENT_WEIGHTS: [(Category, f64); 6] = [
    (Category::Brand, 0.45),
    (Category::Model, 0.30),
    (Category::FilterType, 0.08),
    (Category::Size, 0.08),
    (Category::Strap, 0.05),
    (Category::Style, 0.04),
];

/// Below this brand similarity the score is scaled by the brand similarity
const BRAND_GATE: f64 = 0.6;
/// Below this model similarity the score is scaled by `MODEL_PENALTY`
const MODEL_GATE: f64 = 0.5;
const MODEL_PENALTY: f64 = 0.85;
/// Applied when both sides declare disjoint age groups
const AGE_CONFLICT_PENALTY: f64 = 0.5;
/// Similarity of two model tokens equal up to a trailing numeric suffix
const MODEL_SUFFIX_SIMILARITY: f64 = 0.9;

const ADULT_WORDS: [&str; 2] = ["adult", "adults"];
const CHILD_WORDS: [&str; 7] = [
    "kid", "kids", "child", "children", "youth", "pediatric", "toddler",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum AgeGroup {
    Adult,
    Child,
}

/// Overall similarity and the per-category breakdown behind it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Score {
    pub score: f64,
    /// `None` marks a weightless category (no tokens on either side)
    pub component_scores: BTreeMap<Category, Option<f64>>,
}

/// Component weights keyed by category name
pub fn component_weights() -> BTreeMap<Category, f64> {
    COMPONENT_WEIGHTS.into_iter().collect()
}

/// Score two buckets against each other
pub fn score(left: &ComponentBucket, right: &ComponentBucket) -> Score {
    let mut component_scores = BTreeMap::new();
    let mut weighted_sum = 0.0;
    let mut total_weight = 0.0;

    for (category, weight) in COMPONENT_WEIGHTS {
        let a = normalize_all(left.tokens(category));
        let b = normalize_all(right.tokens(category));

        if a.is_empty() && b.is_empty() {
            component_scores.insert(category, None);
            continue;
        }

        let similarity = category_similarity(category, &a, &b);
        component_scores.insert(category, Some(similarity));
        weighted_sum += weight * similarity;
        total_weight += weight;
    }

    if total_weight == 0.0 {
        return Score {
            score: 0.0,
            component_scores,
        };
    }

    let mut overall = weighted_sum / total_weight;

    if let Some(Some(brand)) = component_scores.get(&Category::Brand) {
        if *brand > 0.0 && *brand < BRAND_GATE {
            overall *= brand;
        }
    }
    if let Some(Some(model)) = component_scores.get(&Category::Model) {
        if *model > 0.0 && *model < MODEL_GATE {
            overall *= MODEL_PENALTY;
        }
    }

    let left_ages = age_groups(left);
    let right_ages = age_groups(right);
    if !left_ages.is_empty() && !right_ages.is_empty() && left_ages.is_disjoint(&right_ages) {
        overall *= AGE_CONFLICT_PENALTY;
    }

    Score {
        score: overall.clamp(0.0, 1.0),
        component_scores,
    }
}

/// Lowercase, keep `[a-z0-9+-]` and whitespace, collapse whitespace
pub fn normalize_token(token: &str) -> String {
    let kept: String = token
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '+' | '-') || c.is_whitespace())
        .collect();
    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn normalize_all(tokens: &[String]) -> Vec<String> {
    tokens
        .iter()
        .map(|t| normalize_token(t))
        .filter(|t| !t.is_empty())
        .collect()
}

/// Soft overlap ratio of two normalized token lists
fn category_similarity(category: Category, a: &[String], b: &[String]) -> f64 {
    let denominator = a.len().max(b.len());
    if denominator == 0 {
        return 0.0;
    }

    let mut used = vec![false; b.len()];
    let mut matched = 0.0;

    for token in a {
        let mut best: Option<(usize, f64)> = None;
        for (j, candidate) in b.iter().enumerate() {
            if used[j] {
                continue;
            }
            let similarity = token_similarity(category, token, candidate);
            if best.map_or(true, |(_, current)| similarity > current) {
                best = Some((j, similarity));
            }
        }
        if let Some((j, similarity)) = best {
            used[j] = true;
            matched += similarity;
        }
    }

    (matched / denominator as f64).clamp(0.0, 1.0)
}

fn token_similarity(category: Category, a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    if category == Category::Model {
        let stripped_a = strip_numeric_suffix(a);
        let stripped_b = strip_numeric_suffix(b);
        if !stripped_a.is_empty() && stripped_a == stripped_b {
            return MODEL_SUFFIX_SIMILARITY;
        }
    }
    strsim::normalized_levenshtein(a, b)
}

/// `"aura 9205+"` -> `"aura"`, `"n95-2"` -> `"n95"`
fn strip_numeric_suffix(token: &str) -> &str {
    token
        .trim_end_matches(|c: char| c.is_ascii_digit() || c == '+')
        .trim_end_matches([' ', '-'])
}

fn age_groups(bucket: &ComponentBucket) -> BTreeSet<AgeGroup> {
    let mut groups = BTreeSet::new();
    for (_, tokens) in bucket.iter() {
        for token in tokens {
            let normalized = normalize_token(token);
            for word in normalized.split([' ', '-']) {
                if ADULT_WORDS.contains(&word) {
                    groups.insert(AgeGroup::Adult);
                } else if CHILD_WORDS.contains(&word) {
                    groups.insert(AgeGroup::Child);
                }
            }
        }
    }
    groups
}
