//! Presentation: MACC ordering, plain-text tables and the HTML report.
//!
//! Nothing here feeds back into filtering or truncation. The cost sort is
//! applied to rows that were already cut.

use anyhow::Result;
use serde::Serialize;
use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};

use crate::data::{DatasetManifest, Project};
use crate::filter::RankField;
use crate::logging::{log, obj, v_str, Domain, Level};
use crate::session::{MainView, SimulationView};

pub const NO_MATCHES: &str = "No projects found for selected filters.";

pub fn truncation_notice(limit: usize, rank: RankField) -> String {
    format!(
        "More than {limit} projects matched. Showing Top {limit} projects by {}.",
        rank.display_name()
    )
}

/// Cheapest tonne first. Stable, so equal costs keep their incoming order.
pub fn macc_order(mut rows: Vec<Project>) -> Vec<Project> {
    rows.sort_by(|a, b| {
        a.cost_per_tonne
            .partial_cmp(&b.cost_per_tonne)
            .unwrap_or(Ordering::Equal)
    });
    rows
}

// =============================================================================
// Chart model
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct MaccBar {
    pub name: String,
    pub project_type: String,
    pub irr: f64,
    pub timeline: f64,
    pub cost_per_tonne: f64,
    pub emissions_saved: f64,
    /// Cumulative abatement where this bar starts and ends.
    pub x_start: f64,
    pub x_end: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MaccChart {
    pub title: String,
    pub bars: Vec<MaccBar>,
    pub total_abatement: f64,
    pub categories: Vec<String>,
}

/// Bars laid out left to right in the order given, each as wide as its
/// abatement volume.
pub fn macc_chart(rows: &[Project]) -> MaccChart {
    let mut x = 0.0;
    let mut categories: Vec<String> = Vec::new();
    let bars = rows
        .iter()
        .map(|p| {
            if !categories.contains(&p.project_type) {
                categories.push(p.project_type.clone());
            }
            let start = x;
            x += p.emissions_saved.max(0.0);
            MaccBar {
                name: p.name.clone(),
                project_type: p.project_type.clone(),
                irr: p.irr,
                timeline: p.timeline,
                cost_per_tonne: p.cost_per_tonne,
                emissions_saved: p.emissions_saved,
                x_start: start,
                x_end: x,
            }
        })
        .collect();
    MaccChart {
        title: "MACC Curve".to_string(),
        bars,
        total_abatement: x,
        categories,
    }
}

// =============================================================================
// Text table
// =============================================================================

const HEADERS: [&str; 6] = [
    "Project",
    "Project Type",
    "IRR (%)",
    "Timeline (yrs)",
    "Cost (₹/tCO2e)",
    "Emissions Saved (tCO2e)",
];

pub fn render_table(rows: &[Project]) -> String {
    if rows.is_empty() {
        return format!("{}\n", NO_MATCHES);
    }
    let cells: Vec<[String; 6]> = rows
        .iter()
        .map(|p| {
            [
                p.name.clone(),
                p.project_type.clone(),
                format!("{:.2}", p.irr),
                format!("{:.2}", p.timeline),
                format!("{:.2}", p.cost_per_tonne),
                format!("{:.2}", p.emissions_saved),
            ]
        })
        .collect();

    let mut widths = HEADERS.map(|h| h.chars().count());
    for row in &cells {
        for (w, cell) in widths.iter_mut().zip(row.iter()) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    push_row(&mut out, HEADERS.iter().map(|h| h.to_string()), &widths);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    push_row(&mut out, rule.into_iter(), &widths);
    for row in cells {
        push_row(&mut out, row.into_iter(), &widths);
    }
    out
}

fn push_row(out: &mut String, cells: impl Iterator<Item = String>, widths: &[usize; 6]) {
    let parts: Vec<String> = cells
        .zip(widths.iter())
        .enumerate()
        .map(|(i, (cell, w))| {
            let pad = w.saturating_sub(cell.chars().count());
            // names and types left, numbers right
            if i < 2 {
                format!("{}{}", cell, " ".repeat(pad))
            } else {
                format!("{}{}", " ".repeat(pad), cell)
            }
        })
        .collect();
    out.push_str(parts.join(" | ").trim_end());
    out.push('\n');
}

// =============================================================================
// HTML
// =============================================================================

#[derive(Debug, Serialize)]
struct ReportData<'a> {
    generated: String,
    dataset: &'a DatasetManifest,
    main: &'a MainView,
    chart: Option<MaccChart>,
    simulation: Option<&'a SimulationView>,
}

/// Payload embedded in the HTML page and written alongside it.
pub fn report_json(
    main: &MainView,
    simulation: Option<&SimulationView>,
    dataset: &DatasetManifest,
) -> Result<String> {
    let data = ReportData {
        generated: chrono::Utc::now().to_rfc3339(),
        dataset,
        main,
        chart: (!main.is_empty()).then(|| macc_chart(&main.shown)),
        simulation,
    };
    Ok(serde_json::to_string(&data)?)
}

pub fn render_html(
    main: &MainView,
    simulation: Option<&SimulationView>,
    dataset: &DatasetManifest,
) -> Result<String> {
    let blob = report_json(main, simulation, dataset)?;
    // keep the blob from closing the script element early
    let blob = blob.replace("</", "<\\/");
    Ok(TEMPLATE.replace("__MACC_DATA__", &blob))
}

/// Writes `index.html` and `macc.json` into `out_dir`.
pub fn write_report(
    out_dir: &Path,
    main: &MainView,
    simulation: Option<&SimulationView>,
    dataset: &DatasetManifest,
) -> Result<PathBuf> {
    fs::create_dir_all(out_dir)?;
    let html = render_html(main, simulation, dataset)?;
    let json = report_json(main, simulation, dataset)?;
    let html_path = out_dir.join("index.html");
    fs::write(&html_path, &html)?;
    fs::write(out_dir.join("macc.json"), json)?;
    log(
        Level::Info,
        Domain::Report,
        "report_written",
        obj(&[
            ("path", v_str(&html_path.display().to_string())),
            ("bytes", serde_json::json!(html.len())),
        ]),
    );
    Ok(html_path)
}

const TEMPLATE: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>What-If Simulation on the basis of MACC</title>
  <style>
    :root {
      --bg: #0d1117; --bg-raised: #161b22;
      --fg: #c9d1d9; --fg-muted: #8b949e; --fg-bright: #f0f6fc;
      --accent: #58a6ff; --yellow: #d29922; --yellow-muted: #2d1f00;
      --border: #30363d;
      --mono: 'JetBrains Mono', 'Fira Code', 'SF Mono', monospace;
      --sans: -apple-system, BlinkMacSystemFont, 'Segoe UI', Helvetica, Arial, sans-serif;
      --radius: 8px;
    }
    *, *::before, *::after { box-sizing: border-box; margin: 0; padding: 0; }
    body { font-family: var(--sans); background: var(--bg); color: var(--fg); line-height: 1.6; }
    main { max-width: 1280px; margin: 0 auto; padding: 1.5rem; }
    h1 { color: var(--fg-bright); font-size: 1.5rem; margin-bottom: 0.2rem; }
    h2 { color: var(--fg-bright); font-size: 1.05rem; border-bottom: 1px solid var(--border); padding-bottom: 0.4rem; margin: 2rem 0 1rem; }
    .sub { color: var(--fg-muted); font-size: 0.8rem; font-family: var(--mono); }
    .notice { background: var(--yellow-muted); border: 1px solid var(--yellow); border-radius: var(--radius); padding: 0.6rem 0.9rem; margin: 1rem 0; font-size: 0.85rem; }
    .chips { display: flex; flex-wrap: wrap; gap: 0.4rem; margin: 0.6rem 0; }
    .chip { background: var(--bg-raised); border: 1px solid var(--border); border-radius: 999px; padding: 0.1rem 0.6rem; font-size: 0.72rem; font-family: var(--mono); }
    table { width: 100%; border-collapse: collapse; font-size: 0.8rem; font-family: var(--mono); }
    th, td { padding: 0.35rem 0.6rem; border-bottom: 1px solid var(--border); text-align: right; }
    th:nth-child(-n+2), td:nth-child(-n+2) { text-align: left; }
    th { color: var(--fg-muted); font-weight: 600; }
    svg { background: var(--bg-raised); border: 1px solid var(--border); border-radius: var(--radius); width: 100%; height: auto; }
    svg text { fill: var(--fg-muted); font-size: 11px; font-family: var(--mono); }
    .legend { display: flex; gap: 1rem; flex-wrap: wrap; font-size: 0.75rem; margin-top: 0.5rem; }
    .swatch { display: inline-block; width: 10px; height: 10px; border-radius: 2px; margin-right: 0.3rem; }
  </style>
</head>
<body>
<main>
  <h1>What-If Simulation on the basis of MACC</h1>
  <div class="sub" id="meta"></div>

  <h2>Marginal Abatement Cost Curve (MACC)</h2>
  <div class="chips" id="main-filters"></div>
  <div id="chart"></div>
  <div id="main-notice"></div>
  <div id="main-table"></div>

  <h2>What-If Simulation</h2>
  <div class="chips" id="sim-filters"></div>
  <div id="sim-notice"></div>
  <div id="sim-table"></div>
</main>
<script>
const DATA = __MACC_DATA__;
const PALETTE = ['#58a6ff', '#3fb950', '#d29922', '#f85149', '#bc8cff', '#39c5cf', '#ff9bce', '#8b949e'];

function esc(s) {
  return String(s).replace(/[&<>"']/g, c => ({'&': '&amp;', '<': '&lt;', '>': '&gt;', '"': '&quot;', "'": '&#39;'}[c]));
}

function chips(el, sel) {
  const parts = [
    ['IRR', sel.irr], ['Type', sel.types.length ? sel.types.join(', ') : 'All'],
    ['Timeline', sel.timeline], ['Cost', sel.cost], ['Emissions', sel.emissions],
  ];
  el.innerHTML = parts.map(([k, v]) => `<span class="chip">${esc(k)}: ${esc(v)}</span>`).join('');
}

function notice(el, text) {
  el.innerHTML = text ? `<div class="notice">${esc(text)}</div>` : '';
}

function table(el, rows) {
  if (!rows.length) { el.innerHTML = ''; return; }
  const head = ['Project', 'Project Type', 'IRR (%)', 'Timeline (yrs)', 'Cost (₹/tCO2e)', 'Emissions Saved (tCO2e)'];
  const body = rows.map(r => `<tr><td>${esc(r.name)}</td><td>${esc(r.project_type)}</td>` +
    `<td>${r.irr.toFixed(2)}</td><td>${r.timeline.toFixed(2)}</td>` +
    `<td>${r.cost_per_tonne.toFixed(2)}</td><td>${r.emissions_saved.toFixed(2)}</td></tr>`).join('');
  el.innerHTML = `<table><thead><tr>${head.map(h => `<th>${h}</th>`).join('')}</tr></thead><tbody>${body}</tbody></table>`;
}

function chart(el, c) {
  if (!c || !c.bars.length) { el.innerHTML = ''; return; }
  const W = 1200, H = 460, L = 70, R = 20, T = 30, B = 50;
  const costs = c.bars.map(b => b.cost_per_tonne);
  const yMax = Math.max(0, ...costs), yMin = Math.min(0, ...costs);
  const span = (yMax - yMin) || 1;
  const xs = v => L + (v / (c.total_abatement || 1)) * (W - L - R);
  const ys = v => T + (yMax - v) / span * (H - T - B);
  const color = t => PALETTE[c.categories.indexOf(t) % PALETTE.length];
  let svg = `<svg viewBox="0 0 ${W} ${H}" xmlns="http://www.w3.org/2000/svg">`;
  svg += `<line x1="${L}" x2="${W - R}" y1="${ys(0)}" y2="${ys(0)}" stroke="#484f58"/>`;
  for (const b of c.bars) {
    const y0 = ys(Math.max(0, b.cost_per_tonne)), y1 = ys(Math.min(0, b.cost_per_tonne));
    svg += `<rect x="${xs(b.x_start)}" y="${y0}" width="${Math.max(1, xs(b.x_end) - xs(b.x_start) - 1)}" height="${Math.max(1, y1 - y0)}" fill="${color(b.project_type)}">` +
      `<title>${esc(b.name)} | ${esc(b.project_type)} | IRR ${b.irr.toFixed(1)}% | ${b.timeline.toFixed(1)} yrs | ₹${b.cost_per_tonne.toFixed(0)}/t | ${b.emissions_saved.toFixed(0)} t</title></rect>`;
  }
  svg += `<text x="${L}" y="${T - 10}">${yMax.toFixed(0)} ₹/tCO2e</text>`;
  svg += `<text x="${L}" y="${H - B + 16}">${yMin.toFixed(0)}</text>`;
  svg += `<text x="${W - R - 260}" y="${H - 12}">cumulative emissions saved: ${c.total_abatement.toFixed(0)} tCO2e</text>`;
  svg += '</svg>';
  const legend = c.categories.map(t => `<span><span class="swatch" style="background:${color(t)}"></span>${esc(t)}</span>`).join('');
  el.innerHTML = `<h3 class="sub">${esc(c.title)}</h3>${svg}<div class="legend">${legend}</div>`;
}

document.getElementById('meta').textContent =
  `${DATA.dataset.source} · ${DATA.dataset.row_count} projects · sha256 ${DATA.dataset.hash_sha256.slice(0, 12)} · ${DATA.generated}`;
chips(document.getElementById('main-filters'), DATA.main.selections);
chart(document.getElementById('chart'), DATA.chart);
notice(document.getElementById('main-notice'), DATA.main.notice);
table(document.getElementById('main-table'), DATA.main.shown);
if (DATA.simulation) {
  chips(document.getElementById('sim-filters'), DATA.simulation.selections);
  notice(document.getElementById('sim-notice'), DATA.simulation.notice);
  table(document.getElementById('sim-table'), DATA.simulation.rows);
} else {
  notice(document.getElementById('sim-notice'), 'Simulation not run.');
}
</script>
</body>
</html>
"##;

#[cfg(test)]
mod tests {
    use super::*;

    fn p(name: &str, cost: f64, emissions: f64) -> Project {
        Project {
            row: 0,
            name: name.to_string(),
            project_type: "Water".to_string(),
            irr: 12.0,
            timeline: 1.0,
            cost_per_tonne: cost,
            emissions_saved: emissions,
        }
    }

    #[test]
    fn macc_order_is_cost_ascending_and_stable() {
        let rows = vec![p("a", 300.0, 1.0), p("b", -20.0, 1.0), p("c", 300.0, 1.0)];
        let names: Vec<String> = macc_order(rows).into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["b", "a", "c"]);
    }

    #[test]
    fn macc_order_keeps_signed_zeros_in_place() {
        let rows = vec![p("a", 0.0, 1.0), p("b", -0.0, 1.0), p("c", -5.0, 1.0)];
        let names: Vec<String> = macc_order(rows).into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["c", "a", "b"]);
    }

    #[test]
    fn chart_widths_accumulate() {
        let chart = macc_chart(&[p("a", -10.0, 100.0), p("b", 50.0, 250.0)]);
        assert_eq!(chart.bars[0].x_start, 0.0);
        assert_eq!(chart.bars[0].x_end, 100.0);
        assert_eq!(chart.bars[1].x_start, 100.0);
        assert_eq!(chart.total_abatement, 350.0);
        assert_eq!(chart.categories, vec!["Water"]);
    }

    #[test]
    fn table_has_header_and_rows() {
        let text = render_table(&[p("Solar", -20.0, 2000.0)]);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Project"));
        assert!(lines[2].contains("Solar"));
        assert!(lines[2].contains("-20.00"));
    }

    #[test]
    fn empty_table_says_no_matches() {
        assert_eq!(render_table(&[]).trim(), NO_MATCHES);
    }

    #[test]
    fn notice_names_the_limit() {
        let n = truncation_notice(20, RankField::EmissionsSaved);
        assert_eq!(
            n,
            "More than 20 projects matched. Showing Top 20 projects by Emissions Saved."
        );
    }
}
