//! Lineage-based taxon exclusion (organelles, host, unassigned domains).

use crate::data::{Dataset, Lineage, Rank};
use crate::error::{PrepError, Result};
use log::info;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// A forbidden value at one rank.
///
/// `value` is compared exactly, ignoring ASCII case. When `pattern` is set it
/// is used instead, as a regular expression searched within the rank value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageRule {
    pub rank: Rank,
    #[serde(default)]
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

impl LineageRule {
    pub fn exact(rank: Rank, value: &str) -> Self {
        Self {
            rank,
            value: value.to_string(),
            pattern: None,
        }
    }

    pub fn pattern(rank: Rank, pattern: &str) -> Self {
        Self {
            rank,
            value: String::new(),
            pattern: Some(pattern.to_string()),
        }
    }

    /// Rules dropping mitochondria and chloroplasts, the usual host-organelle reads.
    pub fn organelles() -> Vec<Self> {
        vec![
            Self::exact(Rank::Family, "Mitochondria"),
            Self::exact(Rank::Class, "Chloroplast"),
            Self::exact(Rank::Order, "Chloroplast"),
        ]
    }
}

enum Matcher {
    Exact(Rank, String),
    Pattern(Rank, Regex),
}

impl Matcher {
    fn compile(rule: &LineageRule) -> Result<Self> {
        match &rule.pattern {
            Some(p) => Regex::new(p)
                .map(|re| Matcher::Pattern(rule.rank, re))
                .map_err(|e| PrepError::InvalidParameter(format!("bad lineage pattern '{}': {}", p, e))),
            None if rule.value.trim().is_empty() => Err(PrepError::InvalidParameter(format!(
                "lineage rule for {} needs a value or a pattern",
                rule.rank
            ))),
            None => Ok(Matcher::Exact(rule.rank, rule.value.trim().to_string())),
        }
    }

    fn matches(&self, lineage: &Lineage) -> bool {
        match self {
            Matcher::Exact(rank, value) => lineage
                .get(*rank)
                .is_some_and(|v| v.eq_ignore_ascii_case(value)),
            Matcher::Pattern(rank, re) => lineage.get(*rank).is_some_and(|v| re.is_match(v)),
        }
    }
}

/// Drop taxa whose lineage matches any rule. Unassigned ranks never match.
pub fn filter_lineage(ds: &Dataset, rules: &[LineageRule]) -> Result<Dataset> {
    let matchers = rules
        .iter()
        .map(Matcher::compile)
        .collect::<Result<Vec<_>>>()?;

    let keep: Vec<usize> = ds
        .taxonomy()
        .lineages()
        .iter()
        .enumerate()
        .filter(|(_, lineage)| !matchers.iter().any(|m| m.matches(lineage)))
        .map(|(i, _)| i)
        .collect();

    info!(
        "Lineage filter: removed {} of {} taxa",
        ds.n_taxa() - keep.len(),
        ds.n_taxa()
    );
    ds.subset_taxa(&keep)
}
