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

//! Shared defaults and fixed constants lifted from the original DDoS detection tool.

/// Extra slots tacked onto the circular interval buffer beyond `time_window/interval`.
pub const ARRAY_EXTRA: usize = 4;
/// Minimum acceptable `intvl_max`; startup fails below this.
pub const ARRAY_MIN: usize = 32;

pub const INTERVAL_DEFAULT: u64 = 60;
pub const TIME_WINDOW_DEFAULT: u64 = 3600;
/// Window (seconds) after which per-host port-scan detail is flushed, independent
/// of the SYN-flood observation window.
pub const PORT_WINDOW_DEFAULT: u64 = 300;

pub const CLUSTERS_DEFAULT: u32 = 2;
pub const CLUSTERS_MIN: u32 = 2;
pub const CLUSTERS_MAX: u32 = 255;

/// Number of intervals of history required before SYN-flood clustering starts.
pub const CONVERGENCE: u32 = 5;

pub const SYN_THRESHOLD: f64 = 512.0;

pub const VER_THRESHOLD_DEFAULT: u32 = 8192;
pub const HOR_THRESHOLD_DEFAULT: u32 = 4096;

pub const FLUSH_ITER_DEFAULT: u32 = 0;

/// Number of addressable ports, 0..=65535.
pub const ALL_PORTS: usize = 65536;

pub const VERBOSITY_DEFAULT: u8 = 1;
pub const VERBOSITY_MAX: u8 = 5;

/// Detection mode bits, also used for the per-interval attack bitset.
pub const MODE_SYN_FLOODING: u32 = 0x01;
pub const MODE_VER_PORTSCAN: u32 = 0x02;
pub const MODE_HOR_PORTSCAN: u32 = 0x04;
pub const MODE_ALL: u32 = 0x07;

/// Fixed right-aligned field width used by the text report.
pub const REPORT_PADDING: usize = 16;

/// Ports exempt from the horizontal port-scan decision.
pub const KNOWN_PORTS: &[u16] = &[
    20, 21, 22, 23, 25, 53, 80, 110, 143, 161, 443, 3389, 4949, 5800, 5900, 10050,
];
