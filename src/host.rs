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

//! Host index and per-destination host record.
//!
//! §9's design notes call the original's 32-level IPv4 binary trie pointless given
//! addresses are uniformly 32 bits; this is a `HashMap<u32, usize>` keyed directly by
//! the destination address, with a parallel `Vec<Host>` preserving insertion order (the
//! cluster engine depends on that order lining up with each pass over `hosts`).

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Trace,
}

/// Sparse per-port access counts recorded for a host once it is promoted to
/// `Level::Trace` (see SPEC_FULL.md §5 item 5 for the promotion rule).
#[derive(Debug, Clone, Default)]
pub struct HostPorts {
    pub accesses: HashMap<u16, u32>,
}

impl HostPorts {
    pub fn record(&mut self, port: u16) {
        *self.accesses.entry(port).or_insert(0) += 1;
    }

    pub fn flush(&mut self) {
        self.accesses.clear();
    }
}

#[derive(Debug, Clone)]
pub struct Host {
    pub ip: u32,
    /// Flows seen in the current interval; reset every interval.
    pub accesses: u32,
    /// "Touched in the current window" flag. ACTIVE when true, IDLE when false.
    pub stat: bool,
    pub level: Level,
    pub cluster: usize,
    pub previous_cluster: usize,
    /// Squared distance to each centroid; `distances[cluster]` is the active one.
    pub distances: Vec<f64>,
    pub peak: f64,
    pub mean: f64,
    /// Circular buffer of SYN packet counts per interval, length `intvl_max`.
    pub intervals: Vec<f64>,
    pub extra: Option<HostPorts>,
}

impl Host {
    fn new(ip: u32, intvl_max: usize, clusters: usize) -> Self {
        Host {
            ip,
            accesses: 1,
            stat: true,
            level: Level::Info,
            cluster: 0,
            previous_cluster: 0,
            distances: vec![0.0; clusters],
            peak: 0.0,
            mean: 0.0,
            intervals: vec![0.0; intvl_max],
            extra: None,
        }
    }

    /// Promotes a host to TRACE level, allocating its sparse port map if needed.
    pub fn promote_to_trace(&mut self) {
        if self.level != Level::Trace {
            self.level = Level::Trace;
        }
        if self.extra.is_none() {
            self.extra = Some(HostPorts::default());
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct HostIndex {
    by_ip: HashMap<u32, usize>,
    pub hosts: Vec<Host>,
}

impl HostIndex {
    pub fn new() -> Self {
        HostIndex::default()
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// Creates the host on first sight, or marks an existing one ACTIVE and bumps its
    /// access counter. Returns the host's stable index into `self.hosts` and whether it
    /// was just created.
    pub fn get_or_insert(&mut self, ip: u32, intvl_max: usize, clusters: usize) -> (usize, bool) {
        if let Some(&idx) = self.by_ip.get(&ip) {
            let host = &mut self.hosts[idx];
            host.stat = true;
            host.accesses += 1;
            (idx, false)
        } else {
            let idx = self.hosts.len();
            self.hosts.push(Host::new(ip, intvl_max, clusters));
            self.by_ip.insert(ip, idx);
            (idx, true)
        }
    }

    pub fn get(&self, ip: u32) -> Option<&Host> {
        self.by_ip.get(&ip).map(|&idx| &self.hosts[idx])
    }

    /// Indices of active (`stat != 0`) hosts, in insertion order.
    pub fn active_indices(&self) -> Vec<usize> {
        (0..self.hosts.len()).filter(|&i| self.hosts[i].stat).collect()
    }

    pub fn active_count(&self) -> usize {
        self.hosts.iter().filter(|h| h.stat).count()
    }

    /// Indices sorted by `accesses` descending, stable on ties (insertion order
    /// preserved among equal counts) — mirrors `host.c::compare_host` feeding `qsort`.
    pub fn sorted_by_accesses_desc(&self) -> Vec<usize> {
        let mut idx: Vec<usize> = (0..self.hosts.len()).collect();
        idx.sort_by(|&a, &b| self.hosts[b].accesses.cmp(&self.hosts[a].accesses));
        idx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_or_get_semantics() {
        let mut idx = HostIndex::new();
        let (a, created) = idx.get_or_insert(1, 64, 2);
        assert!(created);
        assert_eq!(idx.hosts[a].accesses, 1);
        assert!(idx.hosts[a].stat);

        let (a2, created2) = idx.get_or_insert(1, 64, 2);
        assert!(!created2);
        assert_eq!(a, a2);
        assert_eq!(idx.hosts[a2].accesses, 2);
    }

    #[test]
    fn insertion_order_preserved() {
        let mut idx = HostIndex::new();
        idx.get_or_insert(3, 64, 2);
        idx.get_or_insert(1, 64, 2);
        idx.get_or_insert(2, 64, 2);
        let ips: Vec<u32> = idx.hosts.iter().map(|h| h.ip).collect();
        assert_eq!(ips, vec![3, 1, 2]);
    }

    #[test]
    fn active_indices_reflect_stat() {
        let mut idx = HostIndex::new();
        idx.get_or_insert(1, 64, 2);
        idx.get_or_insert(2, 64, 2);
        idx.hosts[0].stat = false;
        assert_eq!(idx.active_indices(), vec![1]);
        assert_eq!(idx.active_count(), 1);
    }

    #[test]
    fn sorted_by_accesses() {
        let mut idx = HostIndex::new();
        idx.get_or_insert(1, 64, 2);
        idx.get_or_insert(2, 64, 2);
        idx.hosts[1].accesses = 10;
        idx.hosts[0].accesses = 3;
        assert_eq!(idx.sorted_by_accesses_desc(), vec![1, 0]);
    }
}
