//! HTML rendering of the status page

use crate::history::HistoryPoint;
use crate::models::{Stats, TrackedWorkload};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt::Write;

const CREDIT_URL: &str = "https://github.com/sentriz/compose-status";

/// Everything needed to render the page
pub struct PageView<'a> {
    pub title: &'a str,
    pub show_credit: bool,
    pub groups: &'a BTreeMap<String, Vec<TrackedWorkload>>,
    pub stats: &'a Stats,
    pub history: &'a [HistoryPoint],
    pub now: DateTime<Utc>,
}

/// Render the dashboard page
pub fn render_page(view: &PageView<'_>) -> String {
    let mut out = String::with_capacity(8 * 1024);
    write_page(&mut out, view).expect("Failed to write page into a String");
    out
}

fn write_page(out: &mut String, view: &PageView<'_>) -> std::fmt::Result {
    let title = escape_html(view.title);
    write!(
        out,
        "<!doctype html>\n<html>\n<head>\n\
         <meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1, user-scalable=no\">\n\
         <meta http-equiv=\"refresh\" content=\"10\" />\n\
         <title>{title}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n"
    )?;

    write_stats(out, &title, view.stats)?;
    write_history(out, view.history)?;

    for (group, members) in view.groups {
        writeln!(out, "<div class=\"group group-show\">")?;
        writeln!(out, "<div class=\"group-title\"><h4>{}</h4></div>", escape_html(group))?;
        writeln!(out, "<div class=\"group-items\"><div class=\"project\">")?;
        writeln!(out, "<table class=\"stat-table aligned-stat-table\">")?;
        for workload in members {
            write_workload(out, workload, view.now)?;
        }
        writeln!(out, "</table>\n</div></div>\n</div>")?;
    }

    if view.show_credit {
        writeln!(
            out,
            "<div class=\"group\"><div class=\"group-items light right\">\
             <i><a target=\"_blank\" href=\"{CREDIT_URL}\">compose status</a></i></div></div>"
        )?;
    }

    writeln!(out, "</body>\n</html>")
}

fn write_stats(out: &mut String, title: &str, stats: &Stats) -> std::fmt::Result {
    writeln!(out, "<div class=\"group\"><div class=\"group-title\"></div><div class=\"group-items\"><div class=\"project\">")?;
    if !title.is_empty() {
        writeln!(out, "<strong>{}</strong>", title)?;
    }
    writeln!(out, "<table class=\"stat-table\">")?;

    let temp = stats
        .cpu_temp
        .map(|t| format!(" {:.0}&deg;C", t))
        .unwrap_or_default();
    writeln!(out, "<tr><td>cpu</td><td>{:.2}%{}</td></tr>", stats.cpu_percent, temp)?;
    writeln!(
        out,
        "<tr><td>memory</td><td>{} / {}</td></tr>",
        human_bytes(stats.mem_used),
        human_bytes(stats.mem_total)
    )?;
    writeln!(
        out,
        "<tr><td>load</td><td>{:.2} {:.2} {:.2}</td></tr>",
        stats.load1, stats.load5, stats.load15
    )?;
    writeln!(
        out,
        "<tr><td>uptime</td><td>{}</td></tr>",
        human_duration(stats.uptime_secs)
    )?;
    writeln!(out, "</table>\n</div></div></div>")
}

/// Inline SVG sparkline of CPU usage (grey) and temperature (orange)
fn write_history(out: &mut String, history: &[HistoryPoint]) -> std::fmt::Result {
    if history.len() < 2 {
        return Ok(());
    }
    let cpu = polyline(history.iter().map(|p| Some(p.cpu_percent)), history.len());
    let temp = polyline(history.iter().map(|p| p.cpu_temp), history.len());

    writeln!(out, "<div class=\"group\"><div class=\"group-title\"></div><div class=\"group-items\">")?;
    writeln!(
        out,
        "<svg class=\"chart\" viewBox=\"0 0 100 100\" preserveAspectRatio=\"none\">"
    )?;
    if !temp.is_empty() {
        writeln!(out, "<polyline fill=\"none\" stroke=\"orange\" stroke-width=\"1\" vector-effect=\"non-scaling-stroke\" points=\"{}\" />", temp)?;
    }
    writeln!(out, "<polyline fill=\"none\" stroke=\"grey\" stroke-width=\"1\" vector-effect=\"non-scaling-stroke\" points=\"{}\" />", cpu)?;
    writeln!(out, "</svg>\n</div></div>")
}

/// SVG points for values in 0..=100, skipping missing ones
fn polyline(values: impl Iterator<Item = Option<f64>>, len: usize) -> String {
    let step = 100.0 / (len.saturating_sub(1).max(1)) as f64;
    values
        .enumerate()
        .filter_map(|(i, v)| v.map(|v| (i, v)))
        .map(|(i, v)| format!("{:.2},{:.2}", i as f64 * step, 100.0 - v.clamp(0.0, 100.0)))
        .collect::<Vec<_>>()
        .join(" ")
}

fn write_workload(
    out: &mut String,
    workload: &TrackedWorkload,
    now: DateTime<Utc>,
) -> std::fmt::Result {
    let class = if workload.is_down { "red" } else { "green" };
    let name = escape_html(&workload.name);
    writeln!(out, "<tr class=\"{}\">", class)?;
    if workload.link.is_empty() {
        writeln!(out, "<td>{}</td>", name)?;
    } else {
        writeln!(
            out,
            "<td><a href=\"//{}\" target=\"_blank\">{}</a></td>",
            escape_html(&workload.link),
            name
        )?;
    }
    if workload.is_down {
        writeln!(
            out,
            "<td>down, last seen {}</td>",
            human_since(workload.last_seen, now)
        )?;
    } else {
        writeln!(out, "<td>{}</td>", escape_html(&workload.status))?;
    }
    writeln!(out, "</tr>")
}

/// Escape text for use in HTML content and attribute values
pub fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// SI byte size, e.g. "1.2 GB"
pub fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 6] = ["B", "kB", "MB", "GB", "TB", "PB"];
    if bytes < 10 {
        return format!("{} B", bytes);
    }
    let exp = ((bytes as f64).log10() / 3.0).floor() as usize;
    let exp = exp.min(UNITS.len() - 1);
    let value = bytes as f64 / 1000f64.powi(exp as i32);
    if exp == 0 {
        format!("{} B", bytes)
    } else if value < 10.0 {
        format!("{:.1} {}", value, UNITS[exp])
    } else {
        format!("{:.0} {}", value, UNITS[exp])
    }
}

/// Coarse duration, e.g. "3 days", "5 hours", "42 seconds"
pub fn human_duration(secs: u64) -> String {
    const UNITS: [(u64, &str); 5] = [
        (7 * 24 * 3600, "week"),
        (24 * 3600, "day"),
        (3600, "hour"),
        (60, "minute"),
        (1, "second"),
    ];
    for (size, unit) in UNITS {
        if secs >= size {
            let count = secs / size;
            return format!("{} {}{}", count, unit, if count == 1 { "" } else { "s" });
        }
    }
    "now".to_string()
}

/// Relative time, e.g. "5 minutes ago"
pub fn human_since(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - then).num_seconds();
    if secs <= 0 {
        return "now".to_string();
    }
    format!("{} ago", human_duration(secs as u64))
}

const STYLE: &str = r#"
:root { --colour-main: #44475A; }
* { margin: 0; padding: 0; }
body { margin: 0 auto; max-width: 500px; font-family: monospace; background-color: #282A36; color: #F8F8F2; }
a { color: unset; text-decoration: none; }
a:hover { text-decoration: underline; }
.right { text-align: right; }
.light { opacity: 0.3; }
.red { color: #FF5555; }
.green { color: #50FA7B; }
.group { margin: 12px 0; }
.group-title h4 { padding: 4px 8px; color: #ddd; }
.group-items { background-color: var(--colour-main); border-radius: 4px; padding: 8px; }
.project + .project { margin-top: 8px; }
.stat-table { margin-left: auto; text-align: right; }
.aligned-stat-table { width: 100%; }
.aligned-stat-table tr td:first-child { text-align: left; }
.stat-table tr td:last-child { font-weight: bold; padding-left: 1ch; }
.chart { width: 100%; height: 80px; }
"#;
