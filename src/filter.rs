//! Filter engine: five independent predicates AND-ed together, plus the
//! top-N cut that keeps the MACC legible.
//!
//! Both the main view and the what-if simulation go through [`apply`] and
//! [`truncate`]; they differ only in the [`FilterSpec`] they pass.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

use crate::buckets::{Bucket, BucketDimension};
use crate::data::{Project, Table};

/// Limits offered to the user for the top-N cut.
pub const ALLOWED_LIMITS: [usize; 3] = [10, 20, 30];

/// Sentinel accepted for "no restriction" in every dimension.
pub const ALL: &str = "All";

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum FilterError {
    UnknownBucket {
        dimension: BucketDimension,
        label: String,
    },
    InvalidLimit(usize),
}

impl fmt::Display for FilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterError::UnknownBucket { dimension, label } => {
                let options: Vec<&str> = dimension.table().labels().collect();
                write!(
                    f,
                    "unknown {} bucket {:?} (expected All or one of {:?})",
                    dimension.as_str(),
                    label,
                    options
                )
            }
            FilterError::InvalidLimit(n) => write!(f, "invalid top-N limit {}", n),
        }
    }
}

impl std::error::Error for FilterError {}

// =============================================================================
// Selections
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BucketChoice {
    All,
    Bucket(&'static Bucket),
}

impl BucketChoice {
    pub fn parse(dimension: BucketDimension, label: &str) -> Result<Self, FilterError> {
        let trimmed = label.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(ALL) {
            return Ok(BucketChoice::All);
        }
        dimension
            .table()
            .lookup(trimmed)
            .map(BucketChoice::Bucket)
            .ok_or_else(|| FilterError::UnknownBucket {
                dimension,
                label: trimmed.to_string(),
            })
    }

    pub fn holds(&self, v: f64) -> bool {
        match self {
            BucketChoice::All => true,
            BucketChoice::Bucket(b) => b.contains(v),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BucketChoice::All => ALL,
            BucketChoice::Bucket(b) => b.label,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeSelection {
    All,
    Only(BTreeSet<String>),
}

impl TypeSelection {
    /// Empty input or any `All` entry selects every category.
    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = BTreeSet::new();
        for label in labels {
            let label = label.as_ref().trim();
            if label.is_empty() {
                continue;
            }
            if label.eq_ignore_ascii_case(ALL) {
                return TypeSelection::All;
            }
            set.insert(label.to_string());
        }
        if set.is_empty() {
            TypeSelection::All
        } else {
            TypeSelection::Only(set)
        }
    }
}

/// Expands the select-all sentinel into the concrete category set of the
/// table. Every filter invocation resolves types through here.
pub fn expand_types(table: &Table, selection: &TypeSelection) -> BTreeSet<String> {
    match selection {
        TypeSelection::Only(set) if !set.is_empty() => set.clone(),
        _ => table.categories().into_iter().collect(),
    }
}

/// Raw selections as a UI hands them over: bucket labels and type names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selections {
    pub irr: String,
    pub types: Vec<String>,
    pub timeline: String,
    pub cost: String,
    pub emissions: String,
}

impl Default for Selections {
    fn default() -> Self {
        Self {
            irr: ALL.to_string(),
            types: vec![ALL.to_string()],
            timeline: ALL.to_string(),
            cost: ALL.to_string(),
            emissions: ALL.to_string(),
        }
    }
}

impl Selections {
    pub fn set_bucket(&mut self, dimension: BucketDimension, label: &str) {
        let slot = match dimension {
            BucketDimension::Irr => &mut self.irr,
            BucketDimension::Timeline => &mut self.timeline,
            BucketDimension::Cost => &mut self.cost,
            BucketDimension::Emissions => &mut self.emissions,
        };
        *slot = label.trim().to_string();
    }

    pub fn set_types(&mut self, csv: &str) {
        self.types = csv
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

// =============================================================================
// Filter specification
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct FilterSpec {
    pub irr: BucketChoice,
    pub types: TypeSelection,
    pub timeline: BucketChoice,
    pub cost: BucketChoice,
    pub emissions: BucketChoice,
}

impl FilterSpec {
    pub fn all() -> Self {
        Self {
            irr: BucketChoice::All,
            types: TypeSelection::All,
            timeline: BucketChoice::All,
            cost: BucketChoice::All,
            emissions: BucketChoice::All,
        }
    }

    pub fn from_selections(sel: &Selections) -> Result<Self, FilterError> {
        Ok(Self {
            irr: BucketChoice::parse(BucketDimension::Irr, &sel.irr)?,
            types: TypeSelection::from_labels(&sel.types),
            timeline: BucketChoice::parse(BucketDimension::Timeline, &sel.timeline)?,
            cost: BucketChoice::parse(BucketDimension::Cost, &sel.cost)?,
            emissions: BucketChoice::parse(BucketDimension::Emissions, &sel.emissions)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Irr,
    Type,
    Timeline,
    Cost,
    Emissions,
}

impl Dimension {
    pub const ALL: [Dimension; 5] = [
        Dimension::Irr,
        Dimension::Type,
        Dimension::Timeline,
        Dimension::Cost,
        Dimension::Emissions,
    ];
}

/// Single-dimension predicate. `types` must come from [`expand_types`].
pub fn passes(dim: Dimension, p: &Project, spec: &FilterSpec, types: &BTreeSet<String>) -> bool {
    match dim {
        Dimension::Irr => spec.irr.holds(p.irr),
        Dimension::Type => types.contains(&p.project_type),
        Dimension::Timeline => spec.timeline.holds(p.timeline),
        Dimension::Cost => spec.cost.holds(p.cost_per_tonne),
        Dimension::Emissions => spec.emissions.holds(p.emissions_saved),
    }
}

/// Projects passing every predicate, in table order.
pub fn apply(table: &Table, spec: &FilterSpec) -> Vec<Project> {
    let types = expand_types(table, &spec.types);
    table
        .rows()
        .iter()
        .filter(|p| Dimension::ALL.iter().all(|d| passes(*d, p, spec, &types)))
        .cloned()
        .collect()
}

// =============================================================================
// Truncation
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankField {
    EmissionsSaved,
    CostPerTonne,
    Irr,
    Timeline,
}

/// Truncation always ranks by abatement volume; the user does not pick it.
pub const DEFAULT_RANK: RankField = RankField::EmissionsSaved;

impl RankField {
    pub fn value(&self, p: &Project) -> f64 {
        match self {
            RankField::EmissionsSaved => p.emissions_saved,
            RankField::CostPerTonne => p.cost_per_tonne,
            RankField::Irr => p.irr,
            RankField::Timeline => p.timeline,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            RankField::EmissionsSaved => "Emissions Saved",
            RankField::CostPerTonne => "Cost per Tonne",
            RankField::Irr => "IRR",
            RankField::Timeline => "Timeline",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Truncated {
    pub rows: Vec<Project>,
    pub was_truncated: bool,
    pub limit: usize,
    /// Size of the subset before the cut.
    pub matched: usize,
}

/// Keeps the `limit` projects with the largest `rank` value, largest first.
/// Ties keep subset order. A subset already within the limit is returned as is.
pub fn truncate(
    subset: Vec<Project>,
    limit: usize,
    rank: RankField,
) -> Result<Truncated, FilterError> {
    if limit == 0 {
        return Err(FilterError::InvalidLimit(limit));
    }
    let matched = subset.len();
    if matched <= limit {
        return Ok(Truncated {
            rows: subset,
            was_truncated: false,
            limit,
            matched,
        });
    }
    let mut ranked = subset;
    // stable: equal values stay in table order
    // partial_cmp: -0.0 and 0.0 are a tie; values are finite after loading
    ranked.sort_by(|a, b| {
        rank.value(b)
            .partial_cmp(&rank.value(a))
            .unwrap_or(Ordering::Equal)
    });
    ranked.truncate(limit);
    Ok(Truncated {
        rows: ranked,
        was_truncated: true,
        limit,
        matched,
    })
}
