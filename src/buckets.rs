//! Named range partitions for the bucketed filter dimensions.
//!
//! Buckets are half-open: `lower <= v < upper`. The first bucket of each
//! table has no lower bound and the last has no upper bound, so every finite
//! value lands in exactly one bucket and a value sitting on a boundary belongs
//! to the bucket above it.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bucket {
    pub label: &'static str,
    pub lower: Option<f64>,
    pub upper: Option<f64>,
}

impl Bucket {
    const fn below(label: &'static str, upper: f64) -> Self {
        Self {
            label,
            lower: None,
            upper: Some(upper),
        }
    }

    const fn range(label: &'static str, lower: f64, upper: f64) -> Self {
        Self {
            label,
            lower: Some(lower),
            upper: Some(upper),
        }
    }

    const fn at_least(label: &'static str, lower: f64) -> Self {
        Self {
            label,
            lower: Some(lower),
            upper: None,
        }
    }

    pub fn contains(&self, v: f64) -> bool {
        if !v.is_finite() {
            return false;
        }
        self.lower.map_or(true, |lo| v >= lo) && self.upper.map_or(true, |hi| v < hi)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketDimension {
    Irr,
    Timeline,
    Cost,
    Emissions,
}

impl BucketDimension {
    pub const ALL: [BucketDimension; 4] = [
        BucketDimension::Irr,
        BucketDimension::Timeline,
        BucketDimension::Cost,
        BucketDimension::Emissions,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BucketDimension::Irr => "irr",
            BucketDimension::Timeline => "timeline",
            BucketDimension::Cost => "cost",
            BucketDimension::Emissions => "emissions",
        }
    }

    pub fn table(&self) -> &'static BucketTable {
        match self {
            BucketDimension::Irr => &IRR_BUCKETS,
            BucketDimension::Timeline => &TIMELINE_BUCKETS,
            BucketDimension::Cost => &COST_BUCKETS,
            BucketDimension::Emissions => &EMISSIONS_BUCKETS,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BucketTable {
    pub dimension: BucketDimension,
    pub title: &'static str,
    pub buckets: &'static [Bucket],
}

impl BucketTable {
    /// Finds a bucket by its display label. An ASCII hyphen is accepted in
    /// place of the en-dash used by the canonical labels.
    pub fn lookup(&self, label: &str) -> Option<&'static Bucket> {
        let wanted = canonical_label(label);
        self.buckets
            .iter()
            .find(|b| canonical_label(b.label) == wanted)
    }

    /// The single bucket a value falls in, `None` for NaN/infinite input.
    pub fn classify(&self, v: f64) -> Option<&'static Bucket> {
        self.buckets.iter().find(|b| b.contains(v))
    }

    pub fn labels(&self) -> impl Iterator<Item = &'static str> {
        self.buckets.iter().map(|b| b.label)
    }
}

fn canonical_label(label: &str) -> String {
    label
        .trim()
        .replace(['\u{2013}', '\u{2014}'], "-")
        .replace(' ', "")
        .to_lowercase()
}

pub static IRR_BUCKETS: BucketTable = BucketTable {
    dimension: BucketDimension::Irr,
    title: "IRR Range",
    buckets: &[
        Bucket::below("<10%", 10.0),
        Bucket::range("10–15%", 10.0, 15.0),
        Bucket::range("15–20%", 15.0, 20.0),
        Bucket::at_least(">20%", 20.0),
    ],
};

pub static TIMELINE_BUCKETS: BucketTable = BucketTable {
    dimension: BucketDimension::Timeline,
    title: "Timeline (years)",
    buckets: &[
        Bucket::below("<1 yr", 1.0),
        Bucket::range("1–2 yrs", 1.0, 2.0),
        Bucket::range("2–3 yrs", 2.0, 3.0),
        Bucket::at_least(">3 yrs", 3.0),
    ],
};

pub static COST_BUCKETS: BucketTable = BucketTable {
    dimension: BucketDimension::Cost,
    title: "Cost Range (₹/tCO₂e)",
    buckets: &[
        Bucket::below("<0", 0.0),
        Bucket::range("0–500", 0.0, 500.0),
        Bucket::range("500–1000", 500.0, 1000.0),
        Bucket::range("1000–1500", 1000.0, 1500.0),
        Bucket::at_least(">1500", 1500.0),
    ],
};

pub static EMISSIONS_BUCKETS: BucketTable = BucketTable {
    dimension: BucketDimension::Emissions,
    title: "Emissions Saved Range (tCO₂e)",
    buckets: &[
        Bucket::below("<1000", 1000.0),
        Bucket::range("1000–1500", 1000.0, 1500.0),
        Bucket::range("1500–2000", 1500.0, 2000.0),
        Bucket::range("2000–2500", 2000.0, 2500.0),
        Bucket::at_least(">2500", 2500.0),
    ],
};
