//! Interactive session over stdin.
//!
//! Main-filter commands recompute the MACC view immediately. `sim ...`
//! commands only stage the simulation filters; `simulate` runs them.

use anyhow::Result;
use std::io::{self, BufRead, Write};
use std::path::Path;

use maccfx::buckets::BucketDimension;
use maccfx::config::Config;
use maccfx::filter::{Selections, ALLOWED_LIMITS};
use maccfx::logging::{self, log, obj, v_str, Domain, Level};
use maccfx::report::{render_table, write_report};
use maccfx::session::{MainView, Session, SimulationView};

const HELP: &str = "\
commands:
  irr|timeline|cost|emissions <label|All>   set a main filter bucket
  type <a,b,...|All>                       set main project types
  top <10|20|30>                           set the top-N limit
  sim <irr|type|timeline|cost|emissions> <value>
                                           stage a simulation filter
  simulate                                 run the staged simulation
  show                                     print the main view again
  buckets                                  list bucket labels
  report                                   write the HTML report
  reset                                    clear main and staged filters
  quit";

enum Command {
    Main(Selections),
    Top(usize),
    Stage(Selections),
    Simulate,
    Show,
    Buckets,
    Report,
    Reset,
    Help,
    Quit,
}

fn dimension(name: &str) -> Option<BucketDimension> {
    BucketDimension::ALL
        .into_iter()
        .find(|d| d.as_str().eq_ignore_ascii_case(name))
}

fn update(mut sel: Selections, dim: &str, value: &str) -> Result<Selections, String> {
    if dim.eq_ignore_ascii_case("type") || dim.eq_ignore_ascii_case("types") {
        sel.set_types(value);
        return Ok(sel);
    }
    match dimension(dim) {
        Some(d) => {
            sel.set_bucket(d, value);
            Ok(sel)
        }
        None => Err(format!("unknown dimension {:?}", dim)),
    }
}

fn parse(line: &str, session: &Session) -> Result<Command, String> {
    let line = line.trim();
    let (head, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();
    match head.to_lowercase().as_str() {
        "quit" | "exit" => Ok(Command::Quit),
        "help" | "?" => Ok(Command::Help),
        "show" => Ok(Command::Show),
        "buckets" => Ok(Command::Buckets),
        "report" => Ok(Command::Report),
        "reset" => Ok(Command::Reset),
        "simulate" => Ok(Command::Simulate),
        "top" => rest
            .parse::<usize>()
            .map(Command::Top)
            .map_err(|_| format!("top expects one of {:?}", ALLOWED_LIMITS)),
        "sim" => {
            let (dim, value) = rest
                .split_once(char::is_whitespace)
                .ok_or_else(|| "sim expects <dimension> <value>".to_string())?;
            update(session.staged_simulation().clone(), dim, value.trim()).map(Command::Stage)
        }
        other => update(session.main_selections().clone(), other, rest).map(Command::Main),
    }
}

fn print_main(view: &MainView, total: usize) {
    println!("{} of {} projects matched", view.matched, total);
    print!("{}", render_table(&view.shown));
    if let Some(notice) = view.notice.as_deref().filter(|_| !view.is_empty()) {
        println!("{}", notice);
    }
}

fn print_simulation(view: &SimulationView) {
    println!("Projects matching simulation: {}", view.rows.len());
    print!("{}", render_table(&view.rows));
}

fn run(
    cmd: Command,
    session: &mut Session,
    last_sim: &mut Option<SimulationView>,
    cfg: &Config,
) -> Result<bool> {
    match cmd {
        Command::Quit => return Ok(false),
        Command::Help => println!("{}", HELP),
        Command::Main(sel) => {
            session.set_main(sel)?;
            print_main(&session.recompute()?, session.table().len());
        }
        Command::Top(n) => {
            session.set_limit(n)?;
            print_main(&session.recompute()?, session.table().len());
        }
        Command::Stage(sel) => {
            session.stage_simulation(sel)?;
            println!("staged; run `simulate` to apply");
        }
        Command::Simulate => {
            let view = session.simulate()?;
            print_simulation(&view);
            *last_sim = Some(view);
        }
        Command::Show => print_main(&session.recompute()?, session.table().len()),
        Command::Buckets => {
            for dim in BucketDimension::ALL {
                let labels: Vec<&str> = dim.table().labels().collect();
                println!("{:<10} All, {}", dim.as_str(), labels.join(", "));
            }
            println!("{:<10} All, {}", "type", session.table().categories().join(", "));
        }
        Command::Report => {
            let view = session.recompute()?;
            let path = write_report(
                Path::new(&cfg.out_dir),
                &view,
                last_sim.as_ref(),
                session.manifest(),
            )?;
            println!("wrote {}", path.display());
        }
        Command::Reset => {
            session.set_main(Selections::default())?;
            session.stage_simulation(Selections::default())?;
            *last_sim = None;
            print_main(&session.recompute()?, session.table().len());
        }
    }
    Ok(true)
}

fn main() -> Result<()> {
    logging::init("out/runs");
    let cfg = Config::from_env();
    cfg.validate()?;
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
    let mut last_sim: Option<SimulationView> = None;

    println!(
        "loaded {} projects from {} ({} rejected). type `help` for commands.",
        session.table().len(),
        session.manifest().source,
        session.manifest().rejected.len()
    );
    print_main(&session.recompute()?, session.table().len());

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    loop {
        print!("macc> ");
        stdout.flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }
        let cmd = match parse(&line, &session) {
            Ok(cmd) => cmd,
            Err(msg) => {
                println!("error: {}", msg);
                continue;
            }
        };
        let outcome = run(cmd, &mut session, &mut last_sim, &cfg);
        match outcome {
            Ok(true) => {}
            Ok(false) => break,
            Err(err) => println!("error: {:#}", err),
        }
    }
    Ok(())
}
