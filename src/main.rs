use anyhow::Result;
use maccfx::config::Config;
use maccfx::data::{default_manifest_path, write_manifest};
use maccfx::logging::{self, log, obj, v_str, Domain, Level};
use maccfx::report::{render_table, write_report};
use maccfx::session::{log_view_summary, Session};
use serde_json::json;
use std::path::Path;

fn main() -> Result<()> {
    logging::init("out/runs");
    let cfg = Config::from_env();
    cfg.validate()?;
    log(
        Level::Info,
        Domain::System,
        "startup",
        obj(&[
            ("source", v_str(cfg.data_path.as_deref().unwrap_or("sample"))),
            ("top_n", json!(cfg.top_n)),
            ("simulate", json!(cfg.simulate)),
        ]),
    );

    let mut session = match Session::open(cfg.source(), cfg.load_options(), cfg.top_n) {
        Ok(session) => session,
        Err(err) => {
            log(
                Level::Error,
                Domain::System,
                "load_failed",
                obj(&[("error", v_str(&format!("{:#}", err)))]),
            );
            return Err(err.context("loading project data"));
        }
    };
    let manifest = session.manifest();
    if !manifest.rejected.is_empty() {
        eprintln!(
            "warning: {} row(s) rejected (see manifest for details)",
            manifest.rejected.len()
        );
    }
    if let Some(path) = &cfg.data_path {
        let out = default_manifest_path(Path::new(path));
        if let Err(err) = write_manifest(&out, session.manifest()) {
            eprintln!("failed to write {}: {}", out.display(), err);
        }
    }

    session.set_main(cfg.main.clone())?;
    let main_view = session.recompute()?;
    log_view_summary(&main_view);

    println!("=== Marginal Abatement Cost Curve (MACC) ===");
    println!(
        "{} of {} projects matched",
        main_view.matched,
        session.table().len()
    );
    print!("{}", render_table(&main_view.shown));
    if let Some(notice) = main_view.notice.as_deref().filter(|_| !main_view.is_empty()) {
        println!("{}", notice);
    }

    let simulation = if cfg.simulate {
        session.stage_simulation(cfg.simulation.clone())?;
        let view = session.simulate()?;
        println!();
        println!("=== Projects Matching Simulation ===");
        print!("{}", render_table(&view.rows));
        Some(view)
    } else {
        None
    };

    let html = write_report(
        Path::new(&cfg.out_dir),
        &main_view,
        simulation.as_ref(),
        session.manifest(),
    )?;
    println!();
    println!("report written to {}", html.display());
    Ok(())
}
