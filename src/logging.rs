//! Structured logging for the MACC filter pipeline.
//!
//! Every record is one JSON object per line with a run id, a sequence number
//! and an RFC3339 timestamp, so a session can be replayed from its log:
//! which dataset was loaded, which selections were applied, how many projects
//! matched and whether the view was truncated.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};
use std::time::Instant;

// =============================================================================
// Log Levels
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
}

impl Level {
    pub fn from_env() -> Self {
        match std::env::var("LOG_LEVEL").as_deref() {
            Ok("trace") => Level::Trace,
            Ok("debug") => Level::Debug,
            Ok("info") => Level::Info,
            Ok("warn") => Level::Warn,
            Ok("error") => Level::Error,
            _ => Level::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
        }
    }
}

// =============================================================================
// Log Domains
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Data,    // Source loading, header mapping, rejected rows
    Filter,  // Predicate evaluation and truncation
    Report,  // Table/chart rendering and output files
    Session, // Selection changes, simulate triggers
    System,  // Startup, shutdown, configuration
    Profile, // Timing
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Data => "data",
            Domain::Filter => "filter",
            Domain::Report => "report",
            Domain::Session => "session",
            Domain::System => "system",
            Domain::Profile => "profile",
        }
    }

    pub fn is_enabled(&self) -> bool {
        // LOG_DOMAINS: comma-separated list or "all"
        match std::env::var("LOG_DOMAINS").as_deref() {
            Ok("all") | Err(_) => true,
            Ok(domains) => domains.split(',').any(|d| d.trim() == self.as_str()),
        }
    }
}

// =============================================================================
// Run context
// =============================================================================

static LOG_SEQ: AtomicU64 = AtomicU64::new(0);
static RUN_CONTEXT: OnceLock<RunContext> = OnceLock::new();
static DEFAULT_LOG_DIR: OnceLock<PathBuf> = OnceLock::new();

fn next_seq() -> u64 {
    LOG_SEQ.fetch_add(1, Ordering::SeqCst)
}

#[derive(Debug)]
struct RunContext {
    run_id: String,
    events: Option<Mutex<BufWriter<File>>>,
    trace: Option<Mutex<BufWriter<File>>>,
    echo: bool,
}

fn open_sink(path: PathBuf) -> Option<Mutex<BufWriter<File>>> {
    match File::create(&path) {
        Ok(f) => Some(Mutex::new(BufWriter::new(f))),
        Err(err) => {
            eprintln!("[log] failed to create {}: {}", path.display(), err);
            None
        }
    }
}

/// Enables run files under `default_dir` for this process. Hosts call this
/// before the first record; without it only `LOG_DIR` turns files on.
pub fn init(default_dir: impl Into<PathBuf>) {
    let _ = DEFAULT_LOG_DIR.set(default_dir.into());
}

/// `LOG_DIR` wins; `off` disables files even when a host default is set.
fn resolve_log_dir(env: Option<&str>, host_default: Option<&Path>) -> Option<PathBuf> {
    match env {
        Some("off") => None,
        Some(dir) if !dir.is_empty() => Some(PathBuf::from(dir)),
        _ => host_default.map(Path::to_path_buf),
    }
}

fn ensure_run_context() -> &'static RunContext {
    RUN_CONTEXT.get_or_init(|| {
        let run_id = std::env::var("RUN_ID")
            .unwrap_or_else(|_| format!("r-{}-{}", ts_epoch_ms(), process::id()));
        let echo = !matches!(std::env::var("LOG_ECHO").as_deref(), Ok("0") | Ok("off"));
        let env_dir = std::env::var("LOG_DIR").ok();
        let base = resolve_log_dir(
            env_dir.as_deref(),
            DEFAULT_LOG_DIR.get().map(PathBuf::as_path),
        );
        // no run dir: records only go to the stderr echo
        let Some(base) = base else {
            return RunContext {
                run_id,
                events: None,
                trace: None,
                echo,
            };
        };

        let mut run_dir = base;
        run_dir.push(&run_id);
        if let Err(err) = create_dir_all(&run_dir) {
            eprintln!("[log] failed to create run dir: {}", err);
        }
        let _ = std::fs::write(
            run_dir.join("manifest.json"),
            json!({
                "run_id": run_id,
                "ts": ts_now(),
                "pid": process::id(),
                "log_dir": run_dir.to_string_lossy(),
            })
            .to_string(),
        );

        RunContext {
            events: open_sink(run_dir.join("events.jsonl")),
            trace: open_sink(run_dir.join("trace.jsonl")),
            run_id,
            echo,
        }
    })
}

fn write_line(writer: &Option<Mutex<BufWriter<File>>>, line: &str) {
    if let Some(writer) = writer {
        if let Ok(mut w) = writer.lock() {
            let _ = writeln!(w, "{}", line);
            let _ = w.flush();
        }
    }
}

// =============================================================================
// Core logging functions
// =============================================================================

/// RFC3339 timestamp with milliseconds
pub fn ts_now() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

fn ts_epoch_ms() -> u64 {
    Utc::now().timestamp_millis() as u64
}

/// Emit a structured log entry
pub fn log(level: Level, domain: Domain, event: &str, fields: Map<String, Value>) {
    if level < Level::from_env() || !domain.is_enabled() {
        return;
    }
    emit_record(level, domain, event, fields);
}

fn emit_record(level: Level, domain: Domain, event: &str, mut fields: Map<String, Value>) {
    let ctx = ensure_run_context();
    let msg = fields.remove("msg").unwrap_or(Value::String(String::new()));

    let mut entry = Map::new();
    entry.insert("ts".to_string(), json!(ts_now()));
    entry.insert("run_id".to_string(), json!(ctx.run_id.clone()));
    entry.insert("seq".to_string(), json!(next_seq()));
    entry.insert("lvl".to_string(), json!(level.as_str().to_uppercase()));
    entry.insert("component".to_string(), json!(domain.as_str()));
    entry.insert("event".to_string(), json!(event));
    entry.insert("msg".to_string(), msg);
    entry.insert("data".to_string(), Value::Object(fields));

    let line = Value::Object(entry).to_string();
    match level {
        Level::Trace | Level::Debug => write_line(&ctx.trace, &line),
        _ => write_line(&ctx.events, &line),
    }
    if ctx.echo {
        // stdout belongs to the rendered tables
        eprintln!("{}", line);
    }
}

// =============================================================================
// Domain-specific helpers
// =============================================================================

pub fn log_load(source: &str, hash: &str, rows: usize, rejected: usize) {
    let level = if rejected > 0 { Level::Warn } else { Level::Info };
    log(
        level,
        Domain::Data,
        "dataset_loaded",
        obj(&[
            ("source", v_str(source)),
            ("hash_sha256", v_str(hash)),
            ("rows", json!(rows)),
            ("rejected", json!(rejected)),
        ]),
    );
}

pub fn log_rejected_row(line: u64, field: &str, value: &str, reason: &str) {
    log(
        Level::Warn,
        Domain::Data,
        "row_rejected",
        obj(&[
            ("line", json!(line)),
            ("field", v_str(field)),
            ("value", v_str(value)),
            ("reason", v_str(reason)),
        ]),
    );
}

pub fn log_filter(view: &str, selections: Value, scanned: usize, matched: usize) {
    log(
        Level::Debug,
        Domain::Filter,
        "filter_applied",
        obj(&[
            ("view", v_str(view)),
            ("selections", selections),
            ("scanned", json!(scanned)),
            ("matched", json!(matched)),
        ]),
    );
}

pub fn log_truncation(matched: usize, limit: usize, rank_field: &str) {
    log(
        Level::Info,
        Domain::Filter,
        "truncated",
        obj(&[
            ("matched", json!(matched)),
            ("limit", json!(limit)),
            ("rank_field", v_str(rank_field)),
        ]),
    );
}

// =============================================================================
// Utility Functions
// =============================================================================

pub fn obj(pairs: &[(&str, Value)]) -> Map<String, Value> {
    let mut map = Map::new();
    for (k, v) in pairs {
        map.insert((*k).to_string(), v.clone());
    }
    map
}

pub fn v_str(s: &str) -> Value {
    Value::String(s.to_string())
}

pub fn v_num(n: f64) -> Value {
    json!(n)
}

// =============================================================================
// Profiling Scope
// =============================================================================

/// Emits elapsed time for a labelled section when dropped.
pub struct ProfileScope {
    label: &'static str,
    context: Map<String, Value>,
    started: Instant,
}

impl ProfileScope {
    pub fn with_context(label: &'static str, fields: &[(&str, Value)]) -> Self {
        Self {
            label,
            context: obj(fields),
            started: Instant::now(),
        }
    }
}

impl Drop for ProfileScope {
    fn drop(&mut self) {
        let elapsed_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        let mut fields = std::mem::take(&mut self.context);
        fields.insert("label".to_string(), v_str(self.label));
        fields.insert("elapsed_ms".to_string(), v_num(elapsed_ms));
        log(Level::Trace, Domain::Profile, "profile", fields);
    }
}
