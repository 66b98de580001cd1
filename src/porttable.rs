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

//! Fixed 65536-slot destination port access table, one slot per port, rebuilt
//! every interval (`reset_port` in the original). Feeds both port-scan tests:
//! vertical (how many distinct ports were touched at all) and horizontal (which
//! single port was touched the most).

use crate::consts::{ALL_PORTS, KNOWN_PORTS};

#[derive(Debug, Clone, Copy)]
pub struct PortSlot {
    pub port: u16,
    /// Flows seen addressed to this port in the current interval.
    pub accesses: u32,
}

pub struct PortTable {
    slots: Vec<PortSlot>,
}

impl PortTable {
    pub fn new() -> Self {
        let mut slots = Vec::with_capacity(ALL_PORTS);
        for port in 0..ALL_PORTS {
            slots.push(PortSlot { port: port as u16, accesses: 0 });
        }
        PortTable { slots }
    }

    /// Records one more flow addressed to `port` this interval.
    pub fn record(&mut self, port: u16) {
        self.slots[port as usize].accesses += 1;
    }

    pub fn accesses(&self, port: u16) -> u32 {
        self.slots[port as usize].accesses
    }

    /// Zeroes every slot's access count; called at each interval boundary.
    pub fn reset(&mut self) {
        for slot in &mut self.slots {
            slot.accesses = 0;
        }
    }

    pub fn is_known_port(port: u16) -> bool {
        KNOWN_PORTS.contains(&port)
    }

    /// Number of distinct ports touched at all this interval — the vertical
    /// port-scan signal.
    pub fn distinct_used(&self) -> u32 {
        self.slots.iter().filter(|s| s.accesses > 0).count() as u32
    }

    /// Ports sorted by access count descending, excluding well-known ports. The
    /// first entry, if its count exceeds the horizontal threshold, is the scan.
    pub fn candidates_desc(&self) -> Vec<PortSlot> {
        let mut hits: Vec<PortSlot> = self
            .slots
            .iter()
            .copied()
            .filter(|s| s.accesses > 0 && !Self::is_known_port(s.port))
            .collect();
        hits.sort_by(|a, b| b.accesses.cmp(&a.accesses));
        hits
    }
}

impl Default for PortTable {
    fn default() -> Self {
        PortTable::new()
    }
}
