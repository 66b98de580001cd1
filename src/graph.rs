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

//! Graph: the container tying together the host index, port table, cluster state,
//! and interval/window bookkeeping. Grounded on `graph.c::create_graph`/`reset_graph`.

use crate::cluster::Cluster;
use crate::consts::ARRAY_EXTRA;
use crate::host::HostIndex;
use crate::params::Params;
use crate::porttable::PortTable;

/// Outcome of checking a flow's `time_first` against the current window boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowEvent {
    /// Still inside the current window.
    None,
    /// Window rotated in place (`window_last` extended, graph state kept).
    Rotated,
    /// `flush_iter` windows have elapsed; caller must discard this graph and build
    /// a fresh one seeded at the triggering flow's `time_first`.
    ShouldFlush,
}

pub struct Graph {
    pub hosts: HostIndex,
    pub ports: PortTable,
    pub clusters: Vec<Cluster>,
    pub interval_first: u64,
    pub interval_last: u64,
    pub window_first: u64,
    pub window_last: u64,
    pub interval_idx: usize,
    pub interval_cnt: u32,
    pub window_cnt: u32,
    pub flush_cnt: u32,
    /// Bitset of SYN_FLOODING / VER_PORTSCAN / HOR_PORTSCAN for the interval just closed.
    pub attack: u32,
    pub intvl_max: usize,
    pub interval: u64,
    pub time_window: u64,
    pub clusters_k: usize,
    /// Intervals elapsed since per-host port detail was last flushed (§4.7 PORT_WINDOW).
    port_iter_cnt: u64,
    iter_max: u64,
}

impl Graph {
    /// Builds a graph seeded so that the window covers `[first_time, first_time +
    /// time_window)` and the first interval covers `[first_time, first_time + interval)`.
    pub fn new(params: &Params, first_time: u64) -> Self {
        Graph {
            hosts: HostIndex::new(),
            ports: PortTable::new(),
            clusters: Vec::new(),
            interval_first: first_time,
            interval_last: first_time + params.interval,
            window_first: first_time,
            window_last: first_time + params.time_window,
            interval_idx: 0,
            interval_cnt: 0,
            window_cnt: 0,
            // Matches the original's `flush_cnt = 1` seed (`parser.c` graph setup)
            // compared with `==`: under the default `flush_iter = 0` ("never
            // flush") the first window boundary must rotate in place, not flush.
            flush_cnt: 1,
            attack: 0,
            intvl_max: params.intvl_max,
            interval: params.interval,
            time_window: params.time_window,
            clusters_k: params.clusters as usize,
            port_iter_cnt: 0,
            iter_max: params.iter_max,
        }
    }

    pub fn get_or_insert_host(&mut self, ip: u32) -> (usize, bool) {
        self.hosts.get_or_insert(ip, self.intvl_max, self.clusters_k)
    }

    pub fn set_attack(&mut self, bit: u32) {
        self.attack |= bit;
    }

    pub fn has_attack(&self, bit: u32) -> bool {
        self.attack & bit == bit
    }

    /// Checks a newly-parsed flow's `time_first` against the window boundary.
    /// Does not mutate window state for `ShouldFlush` — the caller rebuilds the
    /// graph and that replaces this instance entirely.
    pub fn check_window(&mut self, flow_time_first: u64, flush_iter: u32) -> WindowEvent {
        if flow_time_first < self.window_last {
            return WindowEvent::None;
        }
        self.window_cnt += 1;
        if self.flush_cnt == flush_iter {
            WindowEvent::ShouldFlush
        } else {
            self.flush_cnt += 1;
            self.window_last += self.time_window;
            WindowEvent::Rotated
        }
    }

    /// Advances `interval_idx`, returning the new value. Called first by the
    /// detection orchestrator at every interval boundary.
    pub fn advance_interval_idx(&mut self) -> usize {
        self.interval_idx = (self.interval_idx + 1) % self.intvl_max;
        self.interval_idx
    }

    /// Interval reset (§4.7): zeroes the port table, clears per-host `accesses` and
    /// `stat`, and — for SYN mode — clears the single circular slot that will next
    /// be written into. This is the commented "zero one specific slot" semantic the
    /// original's `memset(host->intervals, 0, array_max + 1)` byte-range bug was
    /// meant to express; this implementation clears exactly that one element.
    pub fn reset_interval(&mut self, syn_mode: bool) {
        self.ports.reset();
        let clear_slot = (self.interval_idx + ARRAY_EXTRA) % self.intvl_max;

        for host in self.hosts.hosts.iter_mut() {
            host.accesses = 0;
            host.stat = false;
            if syn_mode {
                host.intervals[clear_slot] = 0.0;
            }
        }

        self.interval_first += self.interval;
        self.interval_last += self.interval;
        if self.window_cnt > 0 {
            self.window_first += self.interval;
        }
        self.interval_cnt += 1;

        self.port_iter_cnt += 1;
        if self.iter_max > 0 && self.port_iter_cnt >= self.iter_max {
            for host in self.hosts.hosts.iter_mut() {
                if let Some(extra) = host.extra.as_mut() {
                    extra.flush();
                }
            }
            self.port_iter_cnt = 0;
        }
    }

    /// Active dimension for clustering: during the first window it is
    /// `interval_idx` (already advanced past the interval just closed by
    /// `advance_interval_idx`, so no further `+1`); afterwards it is the
    /// steady-state window size.
    pub fn active_dimension(&self) -> usize {
        if self.window_cnt == 0 {
            self.interval_idx
        } else {
            self.intvl_max - ARRAY_EXTRA
        }
    }

    /// Read offset into each host's circular buffer for the oldest slot in the
    /// active window.
    pub fn active_offset(&self) -> usize {
        if self.window_cnt == 0 {
            0
        } else {
            (self.interval_idx + ARRAY_EXTRA) % self.intvl_max
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_params() -> Params {
        Params {
            interval: 60,
            time_window: 3600,
            intvl_max: 3600 / 60 + ARRAY_EXTRA,
            clusters: 2,
            iter_max: 5,
            ..Params::default()
        }
    }

    #[test]
    fn window_stays_put_before_boundary() {
        let params = test_params();
        let mut graph = Graph::new(&params, 1_000);
        assert_eq!(graph.check_window(1_500, 0), WindowEvent::None);
    }

    #[test]
    fn window_rotates_then_flushes() {
        // flush_iter=2: flush_cnt starts at 1 (matching the original's seed), so the
        // first window boundary only rotates (1 != 2); the second one matches and
        // flushes.
        let params = test_params();
        let mut graph = Graph::new(&params, 0);
        let boundary = graph.window_last;
        assert_eq!(graph.check_window(boundary, 2), WindowEvent::Rotated);
        let next_boundary = graph.window_last;
        assert_eq!(graph.check_window(next_boundary, 2), WindowEvent::ShouldFlush);
    }

    #[test]
    fn default_flush_iter_never_flushes() {
        // flush_iter=0 (the documented default, "never flush") must never match
        // flush_cnt, which starts at 1 and only increments on rotation.
        let params = test_params();
        let mut graph = Graph::new(&params, 0);
        for _ in 0..5 {
            let boundary = graph.window_last;
            assert_eq!(graph.check_window(boundary, 0), WindowEvent::Rotated);
        }
    }

    #[test]
    fn flush_iter_one_flushes_every_window() {
        let params = test_params();
        let mut graph = Graph::new(&params, 0);
        let boundary = graph.window_last;
        assert_eq!(graph.check_window(boundary, 1), WindowEvent::ShouldFlush);
    }

    #[test]
    fn reset_interval_clears_accesses_and_stat() {
        let params = test_params();
        let mut graph = Graph::new(&params, 0);
        let (idx, _) = graph.get_or_insert_host(1);
        graph.hosts.hosts[idx].accesses = 5;
        graph.hosts.hosts[idx].stat = true;
        graph.reset_interval(true);
        assert_eq!(graph.hosts.hosts[idx].accesses, 0);
        assert!(!graph.hosts.hosts[idx].stat);
    }

    #[test]
    fn reset_interval_only_clears_one_slot() {
        let params = test_params();
        let mut graph = Graph::new(&params, 0);
        let (idx, _) = graph.get_or_insert_host(1);
        for slot in graph.hosts.hosts[idx].intervals.iter_mut() {
            *slot = 7.0;
        }
        graph.reset_interval(true);
        let cleared = graph.hosts.hosts[idx]
            .intervals
            .iter()
            .filter(|&&v| v == 0.0)
            .count();
        assert_eq!(cleared, 1);
    }
}
