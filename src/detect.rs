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

//! Detection orchestrator: drives the graph through interval and window
//! boundaries as flows arrive, and runs the cluster engine and port-scan tests
//! at each interval close. Grounded on `parser.c::parse_data`/`parse_detection`
//! and the top-level loop in `ddos_detection.c`.

use crate::cluster::{self, ClusterError};
use crate::consts::{CONVERGENCE, MODE_HOR_PORTSCAN, MODE_SYN_FLOODING, MODE_VER_PORTSCAN};
use crate::distributor;
use crate::flow::Flow;
use crate::graph::{Graph, WindowEvent};
use crate::params::Params;
use crate::porttable::PortSlot;

/// Per-host row captured for the report at the moment an interval closes, before
/// `reset_interval` clears `accesses`/`stat` for the next interval.
#[derive(Debug, Clone)]
pub struct HostRow {
    pub ip: u32,
    pub accesses: u32,
    pub peak: f64,
    pub mean: f64,
}

/// Everything the reporter needs about one closed interval. Captured before the
/// graph is reset for the next interval, since spec.md §4.6 emits the report
/// (step 5) before resetting (step 6) and both the port table and each host's
/// `accesses`/`stat` are gone by the time the next interval starts accumulating.
#[derive(Debug, Clone)]
pub struct IntervalReport {
    pub interval_first: u64,
    pub interval_last: u64,
    pub window_cnt: u32,
    pub active_hosts: usize,
    pub attack: u32,
    pub ports_used: Option<u32>,
    pub max_port_access: Option<u32>,
    pub cluster_sizes: Option<Vec<u32>>,
    /// Active hosts this interval, sorted by `accesses` descending.
    pub host_rows: Vec<HostRow>,
    /// Active dimension/offset used for the per-host series at detection time,
    /// for the SYN-flood plot to re-read `Host::intervals` consistently.
    pub active_dimension: usize,
    pub active_offset: usize,
    /// Non-well-known ports touched this interval, sorted by accesses descending.
    pub top_ports: Vec<PortSlot>,
}

pub struct Detector {
    pub graph: Graph,
    pub params: Params,
}

impl Detector {
    pub fn new(params: Params, first_time: u64) -> Self {
        let graph = Graph::new(&params, first_time);
        Detector { graph, params }
    }

    /// Feeds one flow through the detector. Returns any interval reports
    /// produced by boundaries the flow's timestamp crossed, oldest first.
    pub fn process_flow(&mut self, flow: &Flow) -> Vec<IntervalReport> {
        if flow.time_first < self.graph.interval_first {
            eprintln!(
                "Warning: dropping delayed flow for {} (time_first {} before interval start {})",
                std::net::Ipv4Addr::from(flow.dst_ip),
                flow.time_first,
                self.graph.interval_first
            );
            return Vec::new();
        }

        let mut reports = Vec::new();
        while flow.time_first >= self.graph.interval_last {
            reports.push(self.close_interval());
        }

        match self.graph.check_window(flow.time_first, self.params.flush_iter) {
            WindowEvent::ShouldFlush => {
                eprintln!("Info: Time window reached, flushing whole graph.");
                self.graph = Graph::new(&self.params, flow.time_first);
            }
            WindowEvent::Rotated | WindowEvent::None => {}
        }

        let mode_syn_only = self.params.mode == MODE_SYN_FLOODING;
        if mode_syn_only && flow.syn_flag != 1 {
            return reports;
        }

        let (idx, _created) = self.graph.get_or_insert_host(flow.dst_ip);
        self.graph.ports.record(flow.dst_port);

        if self.params.level == crate::consts::VERBOSITY_MAX
            && self.params.mode_has(MODE_VER_PORTSCAN)
        {
            self.graph.hosts.hosts[idx].promote_to_trace();
        }
        if let Some(extra) = self.graph.hosts.hosts[idx].extra.as_mut() {
            extra.record(flow.dst_port);
        }

        if flow.syn_flag == 1 {
            distributor::distribute(
                &mut self.graph.hosts.hosts[idx].intervals,
                self.graph.interval_idx,
                self.graph.interval,
                self.graph.interval_last,
                flow.time_first,
                flow.time_last,
                flow.packets,
            );
        }

        reports
    }

    /// Residual detection pass run once at EOF to flush the final partial interval.
    pub fn finish(&mut self) -> IntervalReport {
        self.close_interval()
    }

    fn close_interval(&mut self) -> IntervalReport {
        self.graph.advance_interval_idx();
        self.graph.attack = 0;

        let syn_enabled = self.params.mode_has(MODE_SYN_FLOODING);
        let ver_enabled = self.params.mode_has(MODE_VER_PORTSCAN);
        let hor_enabled = self.params.mode_has(MODE_HOR_PORTSCAN);

        let mut cluster_sizes = None;
        if syn_enabled && self.graph.interval_cnt > CONVERGENCE {
            let active = self.graph.hosts.active_indices();
            let offset = self.graph.active_offset();
            let v = self.graph.active_dimension();
            match cluster::batch_kmeans(
                &mut self.graph.hosts.hosts,
                &active,
                self.graph.clusters_k,
                offset,
                v,
                self.graph.intvl_max,
            ) {
                Ok(mut clusters) => {
                    let flagged = cluster::adjust_cluster(
                        &mut self.graph.hosts.hosts,
                        &active,
                        &mut clusters,
                        offset,
                        v,
                        self.graph.intvl_max,
                    );
                    if flagged {
                        self.graph.set_attack(MODE_SYN_FLOODING);
                    }
                    cluster_sizes = Some(clusters.iter().map(|c| c.hosts_cnt).collect());
                    self.graph.clusters = clusters;
                }
                Err(ClusterError::DataInsufficient) => {
                    eprintln!("Warning: not enough active hosts for clustering this interval");
                }
            }
        }

        let ports_used = if ver_enabled {
            let distinct = self.graph.ports.distinct_used();
            if distinct > self.params.ver_threshold {
                self.graph.set_attack(MODE_VER_PORTSCAN);
            }
            Some(distinct)
        } else {
            None
        };

        let max_port_access = if hor_enabled {
            let candidates = self.graph.ports.candidates_desc();
            let top = candidates.first();
            if let Some(slot) = top {
                if slot.accesses > self.params.hor_threshold {
                    self.graph.set_attack(MODE_HOR_PORTSCAN);
                }
            }
            Some(top.map(|s| s.accesses).unwrap_or(0))
        } else {
            None
        };

        let host_rows: Vec<HostRow> = self
            .graph
            .hosts
            .sorted_by_accesses_desc()
            .into_iter()
            .map(|idx| &self.graph.hosts.hosts[idx])
            .filter(|host| host.stat)
            .map(|host| HostRow { ip: host.ip, accesses: host.accesses, peak: host.peak, mean: host.mean })
            .collect();
        let top_ports = self.graph.ports.candidates_desc();

        let report = IntervalReport {
            interval_first: self.graph.interval_first,
            interval_last: self.graph.interval_last,
            window_cnt: self.graph.window_cnt,
            active_hosts: self.graph.hosts.active_count(),
            attack: self.graph.attack,
            ports_used,
            max_port_access,
            cluster_sizes,
            host_rows,
            active_dimension: self.graph.active_dimension(),
            active_offset: self.graph.active_offset(),
            top_ports,
        };

        self.graph.reset_interval(syn_enabled);
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::Flow;

    fn flow(dst_ip: u32, dst_port: u16, time_first: u64, time_last: u64, packets: u64, syn: u8) -> Flow {
        Flow {
            dst_ip,
            src_ip: 1,
            dst_port,
            src_port: 2,
            protocol: 6,
            time_first,
            time_last,
            bytes: packets * 60,
            packets,
            syn_flag: syn,
        }
    }

    fn params_for(mode: u32) -> Params {
        Params {
            mode,
            interval: 60,
            time_window: 3600,
            intvl_max: 3600 / 60 + crate::consts::ARRAY_EXTRA,
            clusters: 2,
            iter_max: 5,
            ver_threshold: 4096,
            hor_threshold: 4096,
            ..Params::default()
        }
    }

    #[test]
    fn vertical_port_scan_sets_bit() {
        let mut detector = Detector::new(params_for(MODE_VER_PORTSCAN), 0);
        for port in 0..5000u16 {
            let f = flow(0x0A000005, port, 10, 10, 1, 0);
            detector.process_flow(&f);
        }
        let report = detector.finish();
        assert!(report.attack & MODE_VER_PORTSCAN == MODE_VER_PORTSCAN);
        assert_eq!(report.ports_used, Some(5000));
    }

    #[test]
    fn horizontal_scan_on_well_known_port_not_flagged() {
        let mut detector = Detector::new(params_for(MODE_HOR_PORTSCAN), 0);
        for host in 0..2000u32 {
            let f = flow(host, 80, 10, 10, 1, 0);
            detector.process_flow(&f);
        }
        let report = detector.finish();
        assert_eq!(report.attack & MODE_HOR_PORTSCAN, 0);
    }

    #[test]
    fn horizontal_scan_on_unassigned_port_flagged() {
        let mut detector = Detector::new(params_for(MODE_HOR_PORTSCAN), 0);
        for host in 0..5000u32 {
            let f = flow(host, 31337, 10, 10, 1, 0);
            detector.process_flow(&f);
        }
        let report = detector.finish();
        assert!(report.attack & MODE_HOR_PORTSCAN == MODE_HOR_PORTSCAN);
    }

    #[test]
    fn delayed_flow_is_dropped() {
        let mut detector = Detector::new(params_for(MODE_SYN_FLOODING), 1_000);
        let first = flow(1, 80, 1_000, 1_000, 1, 1);
        detector.process_flow(&first);
        let delayed = flow(1, 80, 990, 990, 1, 1);
        let reports = detector.process_flow(&delayed);
        assert!(reports.is_empty());
        assert_eq!(detector.graph.hosts.hosts[0].accesses, 1);
    }

    #[test]
    fn flow_spanning_interval_boundary_emits_report_before_distribution() {
        let mut detector = Detector::new(params_for(MODE_SYN_FLOODING), 0);
        let crossing = flow(1, 80, 65, 65, 5, 1);
        let reports = detector.process_flow(&crossing);
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].interval_first, 0);
    }
}
