//! Taxonomic lineage table keyed by taxon identifier.

use crate::data::io::{is_missing, open_reader, open_writer};
use crate::error::{PrepError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// The seven fixed taxonomic ranks, in lineage order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Rank {
    Domain,
    Phylum,
    Class,
    Order,
    Family,
    Genus,
    Species,
}

impl Rank {
    /// All ranks, domain first.
    pub const ALL: [Rank; 7] = [
        Rank::Domain,
        Rank::Phylum,
        Rank::Class,
        Rank::Order,
        Rank::Family,
        Rank::Genus,
        Rank::Species,
    ];

    /// Position of the rank within a lineage.
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Rank::Domain => "Domain",
            Rank::Phylum => "Phylum",
            Rank::Class => "Class",
            Rank::Order => "Order",
            Rank::Family => "Family",
            Rank::Genus => "Genus",
            Rank::Species => "Species",
        }
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Rank {
    type Err = PrepError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "domain" | "kingdom" => Ok(Rank::Domain),
            "phylum" => Ok(Rank::Phylum),
            "class" => Ok(Rank::Class),
            "order" => Ok(Rank::Order),
            "family" => Ok(Rank::Family),
            "genus" => Ok(Rank::Genus),
            "species" => Ok(Rank::Species),
            other => Err(PrepError::InvalidParameter(format!(
                "Unknown taxonomic rank '{}'",
                other
            ))),
        }
    }
}

/// A 7-rank lineage; any rank may be unassigned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lineage {
    ranks: [Option<String>; 7],
}

impl Lineage {
    /// Build from up to seven values in rank order; missing cells become `None`.
    pub fn from_values<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut ranks: [Option<String>; 7] = Default::default();
        for (slot, value) in ranks.iter_mut().zip(values) {
            let value = value.as_ref();
            if !is_missing(value) {
                *slot = Some(value.trim().to_string());
            }
        }
        Self { ranks }
    }

    pub fn get(&self, rank: Rank) -> Option<&str> {
        self.ranks[rank.index()].as_deref()
    }

    /// Deepest assigned rank and its value.
    pub fn deepest(&self) -> Option<(Rank, &str)> {
        Rank::ALL
            .iter()
            .rev()
            .find_map(|&rank| self.get(rank).map(|v| (rank, v)))
    }

    /// Semicolon-joined lineage, blanks for unassigned ranks.
    pub fn to_semicolon_string(&self) -> String {
        self.ranks
            .iter()
            .map(|r| r.as_deref().unwrap_or(""))
            .collect::<Vec<_>>()
            .join(";")
    }
}

/// Lineages for a set of taxa, in row order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TaxonomyTable {
    taxon_ids: Vec<String>,
    lineages: Vec<Lineage>,
    index: HashMap<String, usize>,
}

impl TaxonomyTable {
    /// Create a table; identifiers must be unique.
    pub fn new(taxon_ids: Vec<String>, lineages: Vec<Lineage>) -> Result<Self> {
        if taxon_ids.len() != lineages.len() {
            return Err(PrepError::DimensionMismatch {
                expected: taxon_ids.len(),
                actual: lineages.len(),
            });
        }
        let mut index = HashMap::with_capacity(taxon_ids.len());
        let mut duplicates = Vec::new();
        for (i, id) in taxon_ids.iter().enumerate() {
            if index.insert(id.clone(), i).is_some() {
                duplicates.push(id.clone());
            }
        }
        if !duplicates.is_empty() {
            return Err(PrepError::schema_mismatch(
                "duplicate taxon identifiers in taxonomy",
                duplicates,
            ));
        }
        Ok(Self {
            taxon_ids,
            lineages,
            index,
        })
    }

    /// Load a lineage table from a delimited file.
    ///
    /// The first row is a header and is ignored; the first column holds taxon
    /// identifiers and up to seven rank columns follow in fixed order.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut reader = open_reader(path)?;
        let mut records = reader.records();

        records
            .next()
            .ok_or_else(|| PrepError::EmptyData("Empty taxonomy table".to_string()))??;

        let mut taxon_ids = Vec::new();
        let mut lineages = Vec::new();
        for record in records {
            let record = record?;
            let Some(id) = record.get(0) else {
                continue;
            };
            if id.is_empty() {
                continue;
            }
            taxon_ids.push(id.to_string());
            lineages.push(Lineage::from_values(record.iter().skip(1).take(7)));
        }

        if taxon_ids.is_empty() {
            return Err(PrepError::EmptyData("No taxa in taxonomy table".to_string()));
        }
        Self::new(taxon_ids, lineages)
    }

    /// Write the table as comma-delimited text with named rank columns.
    pub fn to_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = open_writer(path)?;
        let mut header = vec!["taxon_id"];
        header.extend(Rank::ALL.iter().map(|r| r.name()));
        writer.write_record(&header)?;

        for (id, lineage) in self.taxon_ids.iter().zip(&self.lineages) {
            let mut record = vec![id.as_str()];
            record.extend(Rank::ALL.iter().map(|&r| lineage.get(r).unwrap_or("")));
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn taxon_ids(&self) -> &[String] {
        &self.taxon_ids
    }

    pub fn lineages(&self) -> &[Lineage] {
        &self.lineages
    }

    pub fn n_taxa(&self) -> usize {
        self.taxon_ids.len()
    }

    pub fn contains(&self, taxon_id: &str) -> bool {
        self.index.contains_key(taxon_id)
    }

    /// Lineage for a taxon, if present.
    pub fn lineage(&self, taxon_id: &str) -> Option<&Lineage> {
        self.index.get(taxon_id).map(|&i| &self.lineages[i])
    }

    /// Reorder/subset to exactly the given identifiers.
    pub fn subset(&self, taxon_ids: &[String]) -> Result<Self> {
        let mut missing = Vec::new();
        let mut lineages = Vec::with_capacity(taxon_ids.len());
        for id in taxon_ids {
            match self.lineage(id) {
                Some(l) => lineages.push(l.clone()),
                None => missing.push(id.clone()),
            }
        }
        if !missing.is_empty() {
            return Err(PrepError::schema_mismatch(
                "taxa missing from taxonomy",
                missing,
            ));
        }
        Self::new(taxon_ids.to_vec(), lineages)
    }
}
