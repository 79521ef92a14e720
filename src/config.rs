use anyhow::{bail, Result};

use crate::data::sample::{DEFAULT_SAMPLE_SIZE, DEFAULT_SEED};
use crate::data::{LoadOptions, Source};
use crate::filter::{Selections, ALLOWED_LIMITS};

#[derive(Debug, Clone)]
pub struct Config {
    pub data_path: Option<String>,
    pub sample_size: usize,
    pub seed: u64,
    pub top_n: usize,
    pub delimiter: u8,
    pub out_dir: String,
    pub main: Selections,
    pub simulation: Selections,
    pub simulate: bool,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            data_path: std::env::var("MACC_DATA").ok().filter(|s| !s.trim().is_empty()),
            sample_size: std::env::var("MACC_SAMPLE_SIZE").ok().and_then(|v| v.parse().ok()).unwrap_or(DEFAULT_SAMPLE_SIZE),
            seed: std::env::var("MACC_SEED").ok().and_then(|v| v.parse().ok()).unwrap_or(DEFAULT_SEED),
            top_n: std::env::var("MACC_TOP_N").ok().and_then(|v| v.parse().ok()).unwrap_or(10),
            delimiter: std::env::var("MACC_DELIMITER").ok().and_then(|v| parse_delimiter(&v)).unwrap_or(b','),
            out_dir: std::env::var("MACC_OUT_DIR").unwrap_or_else(|_| "out/macc".to_string()),
            main: selections_from_env("MACC"),
            simulation: selections_from_env("SIM"),
            simulate: matches!(std::env::var("SIMULATE").as_deref(), Ok("1") | Ok("true") | Ok("yes")),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !ALLOWED_LIMITS.contains(&self.top_n) {
            bail!("MACC_TOP_N must be one of {:?}, got {}", ALLOWED_LIMITS, self.top_n);
        }
        if self.data_path.is_none() && self.sample_size == 0 {
            bail!("MACC_SAMPLE_SIZE must be positive");
        }
        Ok(())
    }

    pub fn source(&self) -> Source<'static> {
        match &self.data_path {
            Some(path) => Source::File(path.into()),
            None => Source::Sample {
                size: self.sample_size,
                seed: self.seed,
            },
        }
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            delimiter: self.delimiter,
        }
    }
}

fn selections_from_env(prefix: &str) -> Selections {
    let var = |name: &str| std::env::var(format!("{}_{}", prefix, name)).ok();
    let mut sel = Selections::default();
    if let Some(v) = var("IRR") {
        sel.irr = v;
    }
    if let Some(v) = var("TYPES") {
        sel.set_types(&v);
    }
    if let Some(v) = var("TIMELINE") {
        sel.timeline = v;
    }
    if let Some(v) = var("COST") {
        sel.cost = v;
    }
    if let Some(v) = var("EMISSIONS") {
        sel.emissions = v;
    }
    sel
}

fn parse_delimiter(v: &str) -> Option<u8> {
    match v {
        "\\t" | "tab" => Some(b'\t'),
        s if s.len() == 1 => s.bytes().next(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Config {
        Config {
            data_path: None,
            sample_size: 100,
            seed: 42,
            top_n: 10,
            delimiter: b',',
            out_dir: "out/macc".to_string(),
            main: Selections::default(),
            simulation: Selections::default(),
            simulate: false,
        }
    }

    #[test]
    fn validate_limits() {
        let mut cfg = base();
        assert!(cfg.validate().is_ok());
        cfg.top_n = 0;
        assert!(cfg.validate().is_err());
        cfg.top_n = 15;
        assert!(cfg.validate().is_err());
        cfg.top_n = 30;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn zero_sample_rejected_without_file() {
        let mut cfg = base();
        cfg.sample_size = 0;
        assert!(cfg.validate().is_err());
        cfg.data_path = Some("x.csv".to_string());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn delimiter_parsing() {
        assert_eq!(parse_delimiter(";"), Some(b';'));
        assert_eq!(parse_delimiter("tab"), Some(b'\t'));
        assert_eq!(parse_delimiter("::"), None);
    }

    #[test]
    fn source_falls_back_to_sample() {
        let cfg = base();
        assert!(matches!(cfg.source(), Source::Sample { size: 100, seed: 42 }));
    }
}
