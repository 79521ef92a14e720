//! End-to-end checks over the seeded sample portfolio: load once, run the
//! main and simulation filters, render.

use maccfx::buckets::BucketDimension;
use maccfx::data::{sample, LoadOptions, Source};
use maccfx::filter::{apply, truncate, FilterSpec, Selections, DEFAULT_RANK};
use maccfx::report::{render_html, render_table, NO_MATCHES};
use maccfx::session::Session;

fn open(limit: usize) -> Session {
    Session::open(
        Source::Sample {
            size: sample::DEFAULT_SAMPLE_SIZE,
            seed: sample::DEFAULT_SEED,
        },
        LoadOptions::default(),
        limit,
    )
    .unwrap()
}

#[test]
fn every_bucket_combination_partitions_the_table() {
    let session = open(10);
    let table = session.table();
    // one dimension at a time, the buckets split the table with no overlap
    for dim in BucketDimension::ALL {
        let mut total = 0;
        for label in dim.table().labels() {
            let mut sel = Selections::default();
            sel.set_bucket(dim, label);
            let spec = FilterSpec::from_selections(&sel).unwrap();
            total += apply(table, &spec).len();
        }
        assert_eq!(total, table.len(), "dimension {}", dim.as_str());
    }
}

#[test]
fn filter_output_preserves_table_order() {
    let session = open(10);
    let mut sel = Selections::default();
    sel.irr = "15-20%".to_string();
    let out = apply(session.table(), &FilterSpec::from_selections(&sel).unwrap());
    assert!(!out.is_empty());
    for pair in out.windows(2) {
        assert!(pair[0].row < pair[1].row);
    }
}

#[test]
fn main_view_equals_manual_pipeline() {
    let mut session = open(20);
    let mut sel = Selections::default();
    sel.cost = "0–500".to_string();
    sel.set_types("Renewable, Efficiency, Process");
    session.set_main(sel.clone()).unwrap();
    let view = session.recompute().unwrap();

    let subset = apply(session.table(), &FilterSpec::from_selections(&sel).unwrap());
    let cut = truncate(subset.clone(), 20, DEFAULT_RANK).unwrap();
    assert_eq!(view.matched, subset.len());
    assert_eq!(view.was_truncated, cut.was_truncated);

    let mut shown: Vec<usize> = view.shown.iter().map(|p| p.row).collect();
    let mut expected: Vec<usize> = cut.rows.iter().map(|p| p.row).collect();
    shown.sort();
    expected.sort();
    assert_eq!(shown, expected);
}

#[test]
fn simulation_only_runs_on_trigger() {
    let mut session = open(10);
    let mut sim = Selections::default();
    sim.emissions = ">2500".to_string();
    session.stage_simulation(sim.clone()).unwrap();
    // staging does not change the main view
    let main = session.recompute().unwrap();
    assert_eq!(main.selections, Selections::default());

    let view = session.simulate().unwrap();
    assert_eq!(view.selections, sim);
    assert!(view.rows.iter().all(|p| p.emissions_saved >= 2500.0));
    // untruncated, in table order
    for pair in view.rows.windows(2) {
        assert!(pair[0].row < pair[1].row);
    }
}

#[test]
fn empty_main_view_renders_no_chart() {
    let mut session = open(10);
    let mut sel = Selections::default();
    sel.set_types("Nonexistent");
    session.set_main(sel).unwrap();
    let view = session.recompute().unwrap();
    assert!(view.is_empty());
    assert_eq!(view.notice.as_deref(), Some(NO_MATCHES));
    assert_eq!(render_table(&view.shown).trim(), NO_MATCHES);

    let html = render_html(&view, None, session.manifest()).unwrap();
    assert!(html.contains("\"chart\":null"));
}

#[test]
fn html_report_embeds_truncation_notice() {
    let session = open(10);
    let view = session.recompute().unwrap();
    let html = render_html(&view, None, session.manifest()).unwrap();
    assert!(html.starts_with("<!DOCTYPE html>"));
    assert!(!html.contains("__MACC_DATA__"));
    assert!(html.contains("Showing Top 10 projects by Emissions Saved."));
}
