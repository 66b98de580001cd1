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

//! # flowwatch main entry point
//!
//! Wires `Params::parse` -> `Detector` -> the input pump -> the reporter, mirroring
//! the original `main.c`'s `parse_params` -> `parse_data` -> cleanup shape and
//! `procstats_grab/src/main.rs`'s early-return-on-help convention.

mod cluster;
mod consts;
mod detect;
mod distributor;
mod error;
mod flow;
mod graph;
mod host;
mod input;
mod params;
mod porttable;
mod report;

use std::env;
use std::fs;
use std::io::{self, Write};
use std::process::ExitCode;

use chrono::{Local, TimeZone};

use detect::Detector;
use input::LineSource;
use params::Params;

/// Directory the per-interval log files and plots land in, matching the original
/// tool's hard-coded `res/` output directory.
const RESULTS_DIR: &str = "res";

fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();

    let params = match Params::parse(args) {
        Ok(params) => params,
        Err(err) => {
            eprintln!("Error: {err}");
            return ExitCode::FAILURE;
        }
    };

    if params.help {
        print!("{}", params::USAGE);
        return ExitCode::SUCCESS;
    }

    match run(params) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(params: Params) -> io::Result<()> {
    let path = params.file.clone().expect("Params::parse guarantees a file when help is unset");
    let mut source = LineSource::open(&path)?;

    if params.level > 0 {
        fs::create_dir_all(RESULTS_DIR)?;
    }

    let mut detector: Option<Detector> = None;
    let mut flows_seen: u64 = 0;

    while let Some(line) = source.read_line()? {
        let Some(parsed) = flow::parse_line(&line) else {
            continue;
        };
        let flow = match parsed {
            Ok(flow) => flow,
            Err(err) => {
                eprintln!("Warning: {err}");
                continue;
            }
        };

        let det = detector.get_or_insert_with(|| Detector::new(params.clone(), flow.time_first));

        let had_boundary = flow.time_first >= det.graph.interval_last;
        if had_boundary && params.progress > 0 {
            eprintln!();
        }

        let reports = det.process_flow(&flow);
        for report in &reports {
            emit_report(report, &det.graph, &params)?;
        }

        flows_seen += 1;
        if params.progress > 0 && flows_seen % params.progress == 0 {
            eprint!(".");
            io::stderr().flush()?;
        }
    }

    let Some(mut det) = detector else {
        eprintln!("Warning: no flow records were read, nothing to detect.");
        return Ok(());
    };

    if params.progress > 0 {
        eprintln!();
    }
    eprintln!("Info: All data have been successfully processed, processing residues.");

    let residue = det.finish();
    emit_report(&residue, &det.graph, &params)?;

    Ok(())
}

/// Writes the text log for one closed interval to `res/<timestamp>.log`, and, at
/// verbosity `VERBOSE_BASIC` (2) or above, the SYN-packet and port-access plots
/// alongside it.
fn emit_report(
    report: &detect::IntervalReport,
    graph: &graph::Graph,
    params: &Params,
) -> io::Result<()> {
    if params.level == 0 {
        return Ok(());
    }

    let Some(stamp) = Local.timestamp_opt(report.interval_first as i64, 0).single() else {
        eprintln!("Warning: Cannot convert UNIX timestamp, output omitted.");
        return Ok(());
    };
    let name = stamp.format("%Y-%m-%d_%H-%M-%S").to_string();
    let log_path = format!("{RESULTS_DIR}/{name}.log");

    let mut file = fs::File::create(&log_path)?;
    report::write_log(&mut file, report, graph, params.level)?;

    if params.level as u32 >= 2 {
        if params.mode_has(consts::MODE_SYN_FLOODING) {
            let svg_path = format!("{RESULTS_DIR}/{name}_syn.svg");
            if let Err(err) = report::plot_syn_flood(&svg_path, graph, report) {
                eprintln!("Warning: could not write SYN-flood plot: {err}");
            }
        }
        if params.mode_has(consts::MODE_HOR_PORTSCAN) || params.mode_has(consts::MODE_VER_PORTSCAN) {
            let svg_path = format!("{RESULTS_DIR}/{name}_ports.svg");
            if let Err(err) = report::plot_port_scan(&svg_path, report, 20) {
                eprintln!("Warning: could not write port-scan plot: {err}");
            }
        }
    }

    Ok(())
}
