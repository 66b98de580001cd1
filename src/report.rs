// flowwatch - network flow anomaly detector
// Copyright (C) 2025 Laurence Oberman <loberman@redhat.com>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Per-interval text log and SVG plots. Grounded on `graph.c::print_graph`/
//! `host.c::print_host` for the log content and on `analyze.rs`'s `plotters` usage
//! for the charting approach (replacing the original's gnuplot subprocess).

use std::io::{self, Write};

use chrono::{Local, TimeZone};
use plotters::prelude::*;

use crate::consts::{MODE_HOR_PORTSCAN, MODE_SYN_FLOODING, MODE_VER_PORTSCAN, REPORT_PADDING};
use crate::detect::IntervalReport;
use crate::graph::Graph;

/// Writes `name` followed by `value` right-justified in a field `REPORT_PADDING`
/// wide, matching the original's `fprintf(f, "Label: %*s\n", p, value)` calls
/// (`graph.c::print_graph`/`host.c::print_host`) where the label text is a fixed
/// literal and only the value is padded.
fn field(name: &str, value: impl std::fmt::Display) -> String {
    format!("{name}{value:>REPORT_PADDING$}")
}

fn format_time(epoch: u64) -> String {
    Local
        .timestamp_opt(epoch as i64, 0)
        .single()
        .map(|dt| dt.format("%a %b %d %Y %H:%M:%S").to_string())
        .unwrap_or_else(|| format!("t={epoch}"))
}

/// Writes the mandatory and verbosity-gated lines for one closed interval.
///
/// Reads `report`'s own snapshot fields (`host_rows`/`top_ports`) rather than
/// `graph` directly for anything `accesses`/`stat`/port-count related: by the time
/// this runs, `graph` has already gone through `reset_interval` for the next
/// interval (spec.md §4.6 emits the report, step 5, before the reset, step 6), so
/// `graph.hosts`/`graph.ports` no longer reflect the interval being reported.
/// `graph` is still read for `host.extra`'s longer-horizon per-port detail, which
/// survives a single interval's reset.
pub fn write_log<W: Write>(
    out: &mut W,
    report: &IntervalReport,
    graph: &Graph,
    level: u8,
) -> io::Result<()> {
    if level < 1 {
        return Ok(());
    }

    writeln!(out, "{}", field("Time:", format_time(report.interval_first)))?;
    writeln!(out, "{}", field("Number of active hosts:", report.active_hosts))?;

    if report.attack & MODE_VER_PORTSCAN == MODE_VER_PORTSCAN || report.ports_used.is_some() {
        if let Some(used) = report.ports_used {
            writeln!(out, "{}", field("Number of ports used:", used))?;
        }
    }
    if report.attack & MODE_HOR_PORTSCAN == MODE_HOR_PORTSCAN || report.max_port_access.is_some() {
        if let Some(max) = report.max_port_access {
            writeln!(out, "{}", field("Maximum port accesses:", max))?;
        }
    }

    if let Some(sizes) = &report.cluster_sizes {
        if report.window_cnt >= 1 {
            writeln!(out, "{}", field("Number of clusters:", sizes.len()))?;
            for (j, count) in sizes.iter().enumerate() {
                writeln!(out, "{}", field(&format!("* Hosts in cluster {j}:"), count))?;
            }
        }
    }

    if report.attack & MODE_SYN_FLOODING == MODE_SYN_FLOODING {
        writeln!(out, "{}", field("SYN flooding detected:", "yes"))?;
    }

    if level >= 2 {
        for row in &report.host_rows {
            writeln!(
                out,
                "{}",
                field(
                    &format!("  host {}:", std::net::Ipv4Addr::from(row.ip)),
                    format!("accesses={} peak={:.1} mean={:.1}", row.accesses, row.peak, row.mean)
                )
            )?;
        }
    }

    if level >= 5 {
        for host in &graph.hosts.hosts {
            let Some(extra) = &host.extra else { continue };
            if extra.accesses.is_empty() {
                continue;
            }
            let mut ports: Vec<(&u16, &u32)> = extra.accesses.iter().collect();
            ports.sort_by(|a, b| b.1.cmp(a.1));
            for (port, count) in ports.into_iter().take(10) {
                writeln!(
                    out,
                    "{}",
                    field(
                        &format!("    {}:{port}", std::net::Ipv4Addr::from(host.ip)),
                        count
                    )
                )?;
            }
        }
    }

    Ok(())
}

/// Plots each active host's SYN-packet series over the current window, one line
/// per host, highlighting whichever host has the highest peak (the worst offender).
///
/// Looks up each host's `intervals` via `report.host_rows`' IPs rather than
/// `graph.hosts.active_indices()`, since `stat` has already been cleared by the
/// time the report is written (see `write_log`'s doc comment); `intervals` itself
/// is untouched by a single interval's reset beyond one forward slot, so reading
/// it straight from `graph` at `report.active_offset`/`active_dimension` is safe.
pub fn plot_syn_flood(path: &str, graph: &Graph, report: &IntervalReport) -> Result<(), Box<dyn std::error::Error>> {
    let v = report.active_dimension;
    let offset = report.active_offset;
    if report.host_rows.is_empty() || v == 0 {
        return Ok(());
    }
    let series_for = |ip: u32| -> Option<Vec<f64>> {
        let host = graph.hosts.get(ip)?;
        Some((0..v).map(|m| host.intervals[(offset + m) % graph.intvl_max]).collect())
    };

    let mut y_max: f64 = 1.0;
    for row in &report.host_rows {
        if let Some(series) = series_for(row.ip) {
            for val in series {
                if val > y_max {
                    y_max = val;
                }
            }
        }
    }

    let worst_ip = report
        .host_rows
        .iter()
        .max_by(|a, b| a.peak.total_cmp(&b.peak))
        .map(|row| row.ip);

    let backend = SVGBackend::new(path, (900, 300));
    let root = backend.into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption("SYN packets per host", ("sans-serif", 22))
        .margin(12)
        .x_label_area_size(30)
        .y_label_area_size(60)
        .build_cartesian_2d(0..v.saturating_sub(1), 0.0..y_max)?;
    chart
        .configure_mesh()
        .x_desc("interval")
        .y_desc("SYN packets")
        .draw()?;

    for row in &report.host_rows {
        let Some(series) = series_for(row.ip) else { continue };
        let points: Vec<(usize, f64)> = series.into_iter().enumerate().collect();
        let color = if Some(row.ip) == worst_ip { RED.to_rgba() } else { BLUE.mix(0.3) };
        chart.draw_series(LineSeries::new(points, &color))?;
    }

    root.present()?;
    Ok(())
}

/// Plots the top port-access counts for the interval just closed, from the
/// report's own pre-reset snapshot (`graph.ports` has already been zeroed for the
/// next interval by the time this runs).
pub fn plot_port_scan(path: &str, report: &IntervalReport, top_n: usize) -> Result<(), Box<dyn std::error::Error>> {
    let top: Vec<_> = report.top_ports.iter().copied().take(top_n).collect();
    if top.is_empty() {
        return Ok(());
    }
    let y_max = top.iter().map(|s| s.accesses).max().unwrap_or(1) as f64;

    let backend = SVGBackend::new(path, (900, 300));
    let root = backend.into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption("Port accesses this interval", ("sans-serif", 22))
        .margin(12)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0..top.len(), 0.0..y_max.max(1.0))?;
    chart
        .configure_mesh()
        .x_labels(top.len())
        .x_label_formatter(&|idx| top.get(*idx).map(|s| s.port.to_string()).unwrap_or_default())
        .x_desc("port")
        .y_desc("accesses")
        .draw()?;
    chart.draw_series(
        top.iter()
            .enumerate()
            .map(|(i, s)| Rectangle::new([(i, 0.0), (i + 1, s.accesses as f64)], BLUE.filled())),
    )?;
    root.present()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Params;

    fn empty_report(active_hosts: usize) -> IntervalReport {
        IntervalReport {
            interval_first: 0,
            interval_last: 60,
            window_cnt: 0,
            active_hosts,
            attack: 0,
            ports_used: None,
            max_port_access: None,
            cluster_sizes: None,
            host_rows: Vec::new(),
            active_dimension: 0,
            active_offset: 0,
            top_ports: Vec::new(),
        }
    }

    #[test]
    fn log_contains_mandatory_fields() {
        let params = Params { interval: 60, time_window: 3600, intvl_max: 64, clusters: 2, ..Params::default() };
        let graph = Graph::new(&params, 0);
        let report = empty_report(3);
        let mut buf = Vec::new();
        write_log(&mut buf, &report, &graph, 1).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("Number of active hosts:"));
        assert!(text.contains('3'));
    }

    #[test]
    fn verbosity_zero_writes_nothing() {
        let params = Params { interval: 60, time_window: 3600, intvl_max: 64, clusters: 2, ..Params::default() };
        let graph = Graph::new(&params, 0);
        let report = empty_report(0);
        let mut buf = Vec::new();
        write_log(&mut buf, &report, &graph, 0).unwrap();
        assert!(buf.is_empty());
    }

    #[test]
    fn verbosity_two_lists_host_rows_from_snapshot_not_graph() {
        // host_rows is what must drive the per-host listing: graph.hosts is empty
        // here yet the row still appears, proving write_log doesn't depend on the
        // (already-reset-by-then) live graph state for this data.
        let params = Params { interval: 60, time_window: 3600, intvl_max: 64, clusters: 2, ..Params::default() };
        let graph = Graph::new(&params, 0);
        let mut report = empty_report(1);
        report.host_rows.push(HostRow { ip: u32::from(std::net::Ipv4Addr::new(10, 0, 0, 5)), accesses: 42, peak: 120.0, mean: 30.0 });
        let mut buf = Vec::new();
        write_log(&mut buf, &report, &graph, 2).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("10.0.0.5"));
        assert!(text.contains("accesses=42"));
    }
}
