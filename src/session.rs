//! Per-session state: the table loaded once, the current main selections and
//! the staged simulation selections. Views are recomputed from scratch on
//! every call; nothing carries over between recomputes.

use anyhow::Result;
use serde::Serialize;
use serde_json::json;

use crate::data::{load, DatasetManifest, LoadOptions, Loaded, Project, Source, Table};
use crate::filter::{
    apply, truncate, FilterError, FilterSpec, Selections, Truncated, ALLOWED_LIMITS, DEFAULT_RANK,
};
use crate::logging::{log, log_filter, log_truncation, obj, v_str, Domain, Level};
use crate::report::{macc_order, truncation_notice, NO_MATCHES};

#[derive(Debug, Clone, Serialize)]
pub struct MainView {
    pub selections: Selections,
    pub matched: usize,
    pub limit: usize,
    pub was_truncated: bool,
    /// Cheapest abatement first.
    pub shown: Vec<Project>,
    pub notice: Option<String>,
}

impl MainView {
    pub fn is_empty(&self) -> bool {
        self.shown.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationView {
    pub selections: Selections,
    /// Table order, no top-N cut.
    pub rows: Vec<Project>,
    pub notice: Option<String>,
}

pub struct Session {
    loaded: Loaded,
    main: Selections,
    simulation: Selections,
    limit: usize,
}

impl Session {
    pub fn open(source: Source<'_>, opts: LoadOptions, limit: usize) -> Result<Self> {
        check_limit(limit)?;
        let loaded = load(source, opts)?;
        Ok(Self::from_loaded(loaded, limit))
    }

    pub fn from_loaded(loaded: Loaded, limit: usize) -> Self {
        Self {
            loaded,
            main: Selections::default(),
            simulation: Selections::default(),
            limit,
        }
    }

    pub fn table(&self) -> &Table {
        &self.loaded.table
    }

    pub fn manifest(&self) -> &DatasetManifest {
        &self.loaded.manifest
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn main_selections(&self) -> &Selections {
        &self.main
    }

    pub fn staged_simulation(&self) -> &Selections {
        &self.simulation
    }

    pub fn set_limit(&mut self, limit: usize) -> Result<(), FilterError> {
        check_limit(limit)?;
        self.limit = limit;
        Ok(())
    }

    /// Replaces the main selections. Rejected selections leave the previous
    /// ones in place.
    pub fn set_main(&mut self, selections: Selections) -> Result<(), FilterError> {
        FilterSpec::from_selections(&selections)?;
        log(
            Level::Info,
            Domain::Session,
            "main_selections",
            obj(&[("selections", selections.to_json())]),
        );
        self.main = selections;
        Ok(())
    }

    /// Records simulation selections without computing anything.
    pub fn stage_simulation(&mut self, selections: Selections) -> Result<(), FilterError> {
        FilterSpec::from_selections(&selections)?;
        self.simulation = selections;
        Ok(())
    }

    pub fn recompute(&self) -> Result<MainView, FilterError> {
        main_view(self.table(), &self.main, self.limit)
    }

    pub fn simulate(&self) -> Result<SimulationView, FilterError> {
        log(
            Level::Info,
            Domain::Session,
            "simulate",
            obj(&[("selections", self.simulation.to_json())]),
        );
        simulation_view(self.table(), &self.simulation)
    }
}

fn check_limit(limit: usize) -> Result<(), FilterError> {
    if ALLOWED_LIMITS.contains(&limit) {
        Ok(())
    } else {
        Err(FilterError::InvalidLimit(limit))
    }
}

pub fn main_view(
    table: &Table,
    selections: &Selections,
    limit: usize,
) -> Result<MainView, FilterError> {
    let spec = FilterSpec::from_selections(selections)?;
    let subset = apply(table, &spec);
    log_filter("main", selections.to_json(), table.len(), subset.len());

    let Truncated {
        rows,
        was_truncated,
        limit,
        matched,
    } = truncate(subset, limit, DEFAULT_RANK)?;
    let notice = if matched == 0 {
        Some(NO_MATCHES.to_string())
    } else if was_truncated {
        log_truncation(matched, limit, DEFAULT_RANK.display_name());
        Some(truncation_notice(limit, DEFAULT_RANK))
    } else {
        None
    };

    Ok(MainView {
        selections: selections.clone(),
        matched,
        limit,
        was_truncated,
        shown: macc_order(rows),
        notice,
    })
}

pub fn simulation_view(
    table: &Table,
    selections: &Selections,
) -> Result<SimulationView, FilterError> {
    let spec = FilterSpec::from_selections(selections)?;
    let rows = apply(table, &spec);
    log_filter("simulation", selections.to_json(), table.len(), rows.len());
    let notice = rows.is_empty().then(|| NO_MATCHES.to_string());
    Ok(SimulationView {
        selections: selections.clone(),
        rows,
        notice,
    })
}

/// Compact summary used by the hosts when logging a finished recompute.
pub fn log_view_summary(view: &MainView) {
    log(
        Level::Info,
        Domain::Report,
        "main_view",
        obj(&[
            ("matched", json!(view.matched)),
            ("shown", json!(view.shown.len())),
            ("was_truncated", json!(view.was_truncated)),
            ("notice", view.notice.as_deref().map(v_str).unwrap_or(json!(null))),
        ]),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sample;

    fn session() -> Session {
        Session::open(
            Source::Sample {
                size: sample::DEFAULT_SAMPLE_SIZE,
                seed: sample::DEFAULT_SEED,
            },
            LoadOptions::default(),
            10,
        )
        .unwrap()
    }

    #[test]
    fn default_view_is_truncated_to_limit() {
        let s = session();
        let view = s.recompute().unwrap();
        assert_eq!(view.matched, 100);
        assert_eq!(view.shown.len(), 10);
        assert!(view.was_truncated);
        assert!(view.notice.unwrap().contains("Top 10"));
    }

    #[test]
    fn shown_rows_are_in_cost_order() {
        let s = session();
        let view = s.recompute().unwrap();
        for pair in view.shown.windows(2) {
            assert!(pair[0].cost_per_tonne <= pair[1].cost_per_tonne);
        }
    }

    #[test]
    fn simulation_is_independent_of_main() {
        let mut s = session();
        let mut main = Selections::default();
        main.cost = "<0".to_string();
        s.set_main(main).unwrap();
        let before = s.recompute().unwrap();

        let mut sim = Selections::default();
        sim.irr = ">20%".to_string();
        s.stage_simulation(sim).unwrap();
        let sim_view = s.simulate().unwrap();
        let after = s.recompute().unwrap();

        assert_eq!(before.shown, after.shown);
        assert!(sim_view.rows.iter().all(|p| p.irr >= 20.0));
        assert!(before.shown.iter().all(|p| p.cost_per_tonne < 0.0));
    }

    #[test]
    fn bad_selection_keeps_previous() {
        let mut s = session();
        let mut bad = Selections::default();
        bad.irr = "huge".to_string();
        assert!(s.set_main(bad).is_err());
        assert_eq!(s.main_selections(), &Selections::default());
    }

    #[test]
    fn limit_must_be_offered() {
        let mut s = session();
        assert_eq!(s.set_limit(0), Err(FilterError::InvalidLimit(0)));
        assert!(s.set_limit(20).is_ok());
        assert_eq!(s.recompute().unwrap().shown.len(), 20);
    }

    #[test]
    fn empty_result_has_no_matches_notice() {
        let table = Table::new(Vec::new());
        let view = main_view(&table, &Selections::default(), 10).unwrap();
        assert!(view.is_empty());
        assert!(!view.was_truncated);
        assert_eq!(view.notice.as_deref(), Some(NO_MATCHES));
    }
}
