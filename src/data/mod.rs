//! Dataset loading: header normalization, schema mapping and the immutable
//! project table every filter invocation reads from.

pub mod sample;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::logging::{log_load, log_rejected_row, ts_now, ProfileScope};

// =============================================================================
// Schema
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    Name,
    ProjectType,
    Irr,
    Timeline,
    CostPerTonne,
    EmissionsSaved,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 6] = [
        CanonicalField::Name,
        CanonicalField::ProjectType,
        CanonicalField::Irr,
        CanonicalField::Timeline,
        CanonicalField::CostPerTonne,
        CanonicalField::EmissionsSaved,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalField::Name => "project_name",
            CanonicalField::ProjectType => "project_type",
            CanonicalField::Irr => "irr",
            CanonicalField::Timeline => "timeline_years",
            CanonicalField::CostPerTonne => "cost_per_tonne",
            CanonicalField::EmissionsSaved => "emissions_saved",
        }
    }

    /// Normalized header spellings accepted for this field besides the
    /// canonical identifier.
    fn aliases(&self) -> &'static [&'static str] {
        match self {
            CanonicalField::Name => &["project", "name"],
            CanonicalField::ProjectType => &["type"],
            CanonicalField::Irr => &["irr_pct", "irr_percent"],
            CanonicalField::Timeline => &["timeline", "timeline_yrs"],
            CanonicalField::CostPerTonne => &["cost_tco2e", "costtonne", "cost_per_tco2e", "cost"],
            CanonicalField::EmissionsSaved => &["emissions_saved_tco2e", "emissions"],
        }
    }

    pub fn matches(&self, normalized: &str) -> bool {
        normalized == self.as_str() || self.aliases().contains(&normalized)
    }

    fn is_numeric(&self) -> bool {
        !matches!(self, CanonicalField::Name | CanonicalField::ProjectType)
    }
}

/// Canonical form of a column label: punctuation dropped, trimmed,
/// lowercased, whitespace runs joined with `_`. Idempotent.
pub fn normalize_label(label: &str) -> String {
    let stripped: String = label
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect();
    stripped
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

// =============================================================================
// Records
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Position in the source, zero-based. Used for stable tie-breaks.
    pub row: usize,
    pub name: String,
    pub project_type: String,
    pub irr: f64,
    pub timeline: f64,
    pub cost_per_tonne: f64,
    pub emissions_saved: f64,
}

/// Immutable, cheaply clonable project table.
#[derive(Debug, Clone)]
pub struct Table {
    rows: Arc<[Project]>,
}

impl Table {
    pub fn new(rows: Vec<Project>) -> Self {
        Self { rows: rows.into() }
    }

    pub fn rows(&self) -> &[Project] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct project types in first-seen order.
    pub fn categories(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.rows
            .iter()
            .filter(|p| seen.insert(p.project_type.as_str()))
            .map(|p| p.project_type.clone())
            .collect()
    }
}

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug)]
pub enum LoadError {
    Io(std::io::Error),
    Csv(csv::Error),
    /// Required canonical fields absent after header normalization.
    Schema {
        missing: Vec<CanonicalField>,
        found: Vec<String>,
    },
    /// No header row at all.
    Empty,
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Io(e) => write!(f, "read failed: {}", e),
            LoadError::Csv(e) => write!(f, "malformed delimited text: {}", e),
            LoadError::Schema { missing, found } => {
                let missing: Vec<&str> = missing.iter().map(|m| m.as_str()).collect();
                write!(
                    f,
                    "schema mismatch: missing {:?}, normalized header was {:?}",
                    missing, found
                )
            }
            LoadError::Empty => write!(f, "source has no header row"),
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoadError::Io(e) => Some(e),
            LoadError::Csv(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for LoadError {
    fn from(e: std::io::Error) -> Self {
        LoadError::Io(e)
    }
}

impl From<csv::Error> for LoadError {
    fn from(e: csv::Error) -> Self {
        LoadError::Csv(e)
    }
}

// =============================================================================
// Manifest
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectedRow {
    /// 1-based line in the source (header is line 1).
    pub line: u64,
    pub field: String,
    pub value: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetManifest {
    pub source: String,
    pub hash_sha256: String,
    pub row_count: usize,
    pub rejected: Vec<RejectedRow>,
    /// canonical field -> header text as it appeared in the source
    pub columns: BTreeMap<String, String>,
    pub ignored_columns: Vec<String>,
    pub categories: Vec<String>,
    pub warnings: Vec<String>,
    pub generated_at: String,
}

#[derive(Debug, Clone)]
pub struct Loaded {
    pub table: Table,
    pub manifest: DatasetManifest,
}

pub enum Source<'a> {
    File(PathBuf),
    Reader {
        label: String,
        reader: Box<dyn Read + 'a>,
    },
    Sample {
        size: usize,
        seed: u64,
    },
}

impl<'a> Source<'a> {
    pub fn label(&self) -> String {
        match self {
            Source::File(p) => p.display().to_string(),
            Source::Reader { label, .. } => label.clone(),
            Source::Sample { size, seed } => format!("sample:{}:{}", size, seed),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LoadOptions {
    pub delimiter: u8,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self { delimiter: b',' }
    }
}

// =============================================================================
// Loading
// =============================================================================

pub fn load(source: Source<'_>, opts: LoadOptions) -> Result<Loaded, LoadError> {
    let label = source.label();
    let _scope = ProfileScope::with_context("load", &[("source", crate::logging::v_str(&label))]);
    let loaded = match source {
        Source::File(path) => {
            let bytes = fs::read(&path)?;
            parse_bytes(&label, &bytes, opts)?
        }
        Source::Reader { mut reader, .. } => {
            let mut bytes = Vec::new();
            reader.read_to_end(&mut bytes)?;
            parse_bytes(&label, &bytes, opts)?
        }
        Source::Sample { size, seed } => {
            let rows = sample::generate(size, seed);
            sample_loaded(&label, rows)
        }
    };
    log_load(
        &label,
        &loaded.manifest.hash_sha256,
        loaded.table.len(),
        loaded.manifest.rejected.len(),
    );
    Ok(loaded)
}

pub fn load_path(path: &Path, opts: LoadOptions) -> Result<Loaded, LoadError> {
    load(Source::File(path.to_path_buf()), opts)
}

/// Maps each canonical field to the first source column whose normalized
/// label matches it.
pub fn map_columns(headers: &[String]) -> Result<BTreeMap<CanonicalField, usize>, LoadError> {
    let normalized: Vec<String> = headers.iter().map(|h| normalize_label(h)).collect();
    let mut mapping = BTreeMap::new();
    for field in CanonicalField::ALL {
        if let Some(idx) = normalized.iter().position(|n| field.matches(n)) {
            mapping.insert(field, idx);
        }
    }
    let missing: Vec<CanonicalField> = CanonicalField::ALL
        .iter()
        .copied()
        .filter(|f| !mapping.contains_key(f))
        .collect();
    if !missing.is_empty() {
        return Err(LoadError::Schema {
            missing,
            found: normalized,
        });
    }
    Ok(mapping)
}

fn parse_bytes(label: &str, bytes: &[u8], opts: LoadOptions) -> Result<Loaded, LoadError> {
    let hash = sha256_hex(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(opts.delimiter)
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .byte_headers()?
        .iter()
        .map(|h| String::from_utf8_lossy(h).into_owned())
        .collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(LoadError::Empty);
    }
    let mapping = map_columns(&headers)?;

    let mut rows = Vec::new();
    let mut rejected = Vec::new();
    let mut warnings = Vec::new();
    let mut names = HashSet::new();

    // byte records: undecodable cells only matter in mapped columns
    for record in reader.byte_records() {
        let record = record?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        if record.iter().all(|f| f.is_empty()) {
            continue;
        }
        match parse_record(&record, &mapping, rows.len()) {
            Ok(project) => {
                if !names.insert(project.name.clone()) {
                    warnings.push(format!("duplicate_name: {} (line {})", project.name, line));
                }
                rows.push(project);
            }
            Err((field, value, reason)) => {
                log_rejected_row(line, field.as_str(), &value, &reason);
                rejected.push(RejectedRow {
                    line,
                    field: field.as_str().to_string(),
                    value,
                    reason,
                });
            }
        }
    }

    let mapped: HashSet<usize> = mapping.values().copied().collect();
    let ignored_columns = headers
        .iter()
        .enumerate()
        .filter(|(i, _)| !mapped.contains(i))
        .map(|(_, h)| h.clone())
        .collect();
    let columns = mapping
        .iter()
        .map(|(field, idx)| (field.as_str().to_string(), headers[*idx].clone()))
        .collect();

    let table = Table::new(rows);
    let manifest = DatasetManifest {
        source: label.to_string(),
        hash_sha256: hash,
        row_count: table.len(),
        rejected,
        columns,
        ignored_columns,
        categories: table.categories(),
        warnings,
        generated_at: ts_now(),
    };
    Ok(Loaded { table, manifest })
}

type FieldError = (CanonicalField, String, String);

fn parse_record(
    record: &csv::ByteRecord,
    mapping: &BTreeMap<CanonicalField, usize>,
    row: usize,
) -> Result<Project, FieldError> {
    let text = |field: CanonicalField| field_text(record, mapping, field);
    let number = |field: CanonicalField| -> Result<f64, FieldError> {
        debug_assert!(field.is_numeric());
        let raw = text(field)?;
        match raw.parse::<f64>() {
            // + 0.0 folds -0.0 into 0.0
            Ok(v) if v.is_finite() => Ok(v + 0.0),
            Ok(_) => Err((field, raw.to_string(), "non-finite number".to_string())),
            Err(e) => Err((field, raw.to_string(), e.to_string())),
        }
    };

    let name = text(CanonicalField::Name)?;
    if name.is_empty() {
        return Err((CanonicalField::Name, String::new(), "empty name".to_string()));
    }
    let project_type = text(CanonicalField::ProjectType)?;
    if project_type.is_empty() {
        return Err((
            CanonicalField::ProjectType,
            String::new(),
            "empty project type".to_string(),
        ));
    }

    Ok(Project {
        row,
        name: name.to_string(),
        project_type: project_type.to_string(),
        irr: number(CanonicalField::Irr)?,
        timeline: number(CanonicalField::Timeline)?,
        cost_per_tonne: number(CanonicalField::CostPerTonne)?,
        emissions_saved: number(CanonicalField::EmissionsSaved)?,
    })
}

fn field_text<'r>(
    record: &'r csv::ByteRecord,
    mapping: &BTreeMap<CanonicalField, usize>,
    field: CanonicalField,
) -> Result<&'r str, FieldError> {
    let raw = mapping
        .get(&field)
        .and_then(|idx| record.get(*idx))
        .unwrap_or(b"");
    std::str::from_utf8(raw).map_err(|_| {
        (
            field,
            String::from_utf8_lossy(raw).into_owned(),
            "invalid utf-8".to_string(),
        )
    })
}

fn sample_loaded(label: &str, rows: Vec<Project>) -> Loaded {
    let payload = serde_json::to_vec(&rows).unwrap_or_default();
    let table = Table::new(rows);
    let columns = CanonicalField::ALL
        .iter()
        .map(|f| (f.as_str().to_string(), f.as_str().to_string()))
        .collect();
    let manifest = DatasetManifest {
        source: label.to_string(),
        hash_sha256: sha256_hex(&payload),
        row_count: table.len(),
        rejected: Vec::new(),
        columns,
        ignored_columns: Vec::new(),
        categories: table.categories(),
        warnings: Vec::new(),
        generated_at: ts_now(),
    };
    Loaded { table, manifest }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

pub fn default_manifest_path(dataset_path: &Path) -> PathBuf {
    let mut p = dataset_path.to_path_buf();
    let fname = dataset_path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("dataset.csv");
    p.set_file_name(format!("{}.manifest.json", fname));
    p
}

pub fn write_manifest(path: &Path, manifest: &DatasetManifest) -> anyhow::Result<()> {
    fs::write(path, serde_json::to_string_pretty(manifest)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load_str(text: &str) -> Result<Loaded, LoadError> {
        load(
            Source::Reader {
                label: "inline".to_string(),
                reader: Box::new(text.as_bytes()),
            },
            LoadOptions::default(),
        )
    }

    #[test]
    fn normalize_basic_labels() {
        assert_eq!(normalize_label("Project Name"), "project_name");
        assert_eq!(normalize_label("Cost/Tonne (₹)"), "costtonne");
        assert_eq!(normalize_label("Cost (₹/tCO2e)"), "cost_tco2e");
        assert_eq!(normalize_label("  Emissions   Saved (tCO2e) "), "emissions_saved_tco2e");
        assert_eq!(normalize_label("IRR"), "irr");
    }

    #[test]
    fn normalize_is_idempotent() {
        for label in [
            "Project Name",
            "Cost/Tonne (₹)",
            " Timeline\t(Years) ",
            "__odd__ label__",
            "Émissions évitées",
            "",
        ] {
            let once = normalize_label(label);
            assert_eq!(normalize_label(&once), once, "label {:?}", label);
        }
    }

    #[test]
    fn original_script_headers_map() {
        let headers: Vec<String> = [
            "Project",
            "IRR",
            "Project Type",
            "Timeline",
            "Cost (₹/tCO2e)",
            "Emissions Saved (tCO2e)",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        let mapping = map_columns(&headers).unwrap();
        assert_eq!(mapping[&CanonicalField::Name], 0);
        assert_eq!(mapping[&CanonicalField::CostPerTonne], 4);
        assert_eq!(mapping[&CanonicalField::EmissionsSaved], 5);
    }

    #[test]
    fn missing_column_is_schema_error() {
        let err = load_str("Project,IRR,Project Type,Timeline\nA,12,Water,1\n").unwrap_err();
        match err {
            LoadError::Schema { missing, .. } => {
                assert_eq!(
                    missing,
                    vec![CanonicalField::CostPerTonne, CanonicalField::EmissionsSaved]
                );
            }
            other => panic!("expected schema error, got {}", other),
        }
    }

    #[test]
    fn column_order_and_extras_are_irrelevant() {
        let text = "notes,Emissions Saved,Cost per Tonne,Timeline Years,IRR,Project Type,Project Name\n\
                    x,1200,-50,2.5,12,Water,Alpha\n";
        let loaded = load_str(text).unwrap();
        let p = &loaded.table.rows()[0];
        assert_eq!(p.name, "Alpha");
        assert_eq!(p.cost_per_tonne, -50.0);
        assert_eq!(p.emissions_saved, 1200.0);
        assert_eq!(loaded.manifest.ignored_columns, vec!["notes".to_string()]);
    }

    #[test]
    fn non_numeric_rows_are_excluded_and_reported() {
        let text = "Project,IRR,Project Type,Timeline,Cost,Emissions\n\
                    A,12,Water,1,100,900\n\
                    B,n/a,Water,1,100,900\n\
                    C,12,Water,1,NaN,900\n\
                    D,8,Process,2,300,1500\n";
        let loaded = load_str(text).unwrap();
        let names: Vec<&str> = loaded.table.rows().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["A", "D"]);
        assert_eq!(loaded.manifest.rejected.len(), 2);
        assert_eq!(loaded.manifest.rejected[0].field, "irr");
        assert_eq!(loaded.manifest.rejected[0].line, 3);
        assert_eq!(loaded.manifest.rejected[1].field, "cost_per_tonne");
        // row index tracks table position, not source line
        assert_eq!(loaded.table.rows()[1].row, 1);
    }

    #[test]
    fn invalid_utf8_in_ignored_column_is_harmless() {
        let mut bytes = b"Project,IRR,Project Type,Timeline,Cost,Emissions,notes\n\
                          A,12,Water,1,100,900,ok\n\
                          B,12,Water,1,100,900,"
            .to_vec();
        bytes.extend_from_slice(&[0xFF, 0xFE]);
        bytes.extend_from_slice(b"\nC,14,Process,2,-30,1800,ok\n");
        let loaded = load(
            Source::Reader {
                label: "bytes".to_string(),
                reader: Box::new(std::io::Cursor::new(bytes)),
            },
            LoadOptions::default(),
        )
        .unwrap();
        let names: Vec<&str> = loaded.table.rows().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
        assert!(loaded.manifest.rejected.is_empty());
    }

    #[test]
    fn invalid_utf8_in_mapped_column_rejects_only_that_row() {
        let mut bytes = b"Project,IRR,Project Type,Timeline,Cost,Emissions\nA,12,".to_vec();
        bytes.push(0xFF);
        bytes.extend_from_slice(b",1,100,900\nB,14,Water,2,-30,1800\n");
        let loaded = load(
            Source::Reader {
                label: "bytes".to_string(),
                reader: Box::new(std::io::Cursor::new(bytes)),
            },
            LoadOptions::default(),
        )
        .unwrap();
        assert_eq!(loaded.table.len(), 1);
        assert_eq!(loaded.table.rows()[0].name, "B");
        assert_eq!(loaded.manifest.rejected.len(), 1);
        assert_eq!(loaded.manifest.rejected[0].field, "project_type");
        assert_eq!(loaded.manifest.rejected[0].reason, "invalid utf-8");
        assert_eq!(loaded.manifest.rejected[0].line, 2);
    }

    #[test]
    fn negative_zero_is_folded() {
        let text = "Project,IRR,Project Type,Timeline,Cost,Emissions\nA,1,Water,1,-0,-0\n";
        let loaded = load_str(text).unwrap();
        let p = &loaded.table.rows()[0];
        assert!(p.emissions_saved.is_sign_positive());
        assert!(p.cost_per_tonne.is_sign_positive());
    }

    #[test]
    fn quoted_fields_keep_commas() {
        let text = "Project Name,Project Type,IRR,Timeline,Cost/Tonne (₹),Emissions Saved\n\
                    \"Solar, rooftop\",Renewable,18,1.5,-20,2000\n";
        let loaded = load_str(text).unwrap();
        assert_eq!(loaded.table.rows()[0].name, "Solar, rooftop");
        assert_eq!(loaded.manifest.columns["cost_per_tonne"], "Cost/Tonne (₹)");
    }

    #[test]
    fn empty_source_has_no_header() {
        assert!(matches!(load_str(""), Err(LoadError::Empty)));
    }

    #[test]
    fn categories_in_first_seen_order() {
        let text = "Project,IRR,Project Type,Timeline,Cost,Emissions\n\
                    A,1,Water,1,1,1\nB,1,Renewable,1,1,1\nC,1,Water,1,1,1\n";
        let loaded = load_str(text).unwrap();
        assert_eq!(loaded.table.categories(), vec!["Water", "Renewable"]);
    }

    #[test]
    fn same_bytes_same_hash() {
        let text = "Project,IRR,Project Type,Timeline,Cost,Emissions\nA,1,Water,1,1,1\n";
        let a = load_str(text).unwrap();
        let b = load_str(text).unwrap();
        assert_eq!(a.manifest.hash_sha256, b.manifest.hash_sha256);
        assert_eq!(a.manifest.hash_sha256.len(), 64);
    }
}
