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

//! Splits a single flow's SYN-packet count across the interval slots it spans,
//! at a constant packet rate. Grounded on `host.c::get_host`'s diff/pps arithmetic.

/// Distributes `packets` SYN packets from a flow spanning `[time_first, time_last]`
/// into `intervals`, a circular buffer of length `intvl_max` whose current write head
/// is `interval_idx`. `interval_last` is the end of the interval currently being
/// accumulated and `interval` is its length in seconds.
pub fn distribute(
    intervals: &mut [f64],
    interval_idx: usize,
    interval: u64,
    interval_last: u64,
    time_first: u64,
    time_last: u64,
    packets: u64,
) {
    let intvl_max = intervals.len();

    if time_last < interval_last {
        intervals[interval_idx] += packets as f64;
        return;
    }

    let duration = time_last - time_first;
    if duration == 0 {
        intervals[interval_idx] += packets as f64;
        return;
    }

    let pps = packets as f64 / duration as f64;

    let s0 = interval_last.saturating_sub(time_first) as f64;
    intervals[interval_idx] += s0 * pps;

    let mut remaining = duration as f64 - s0;
    if remaining <= 0.0 {
        return;
    }

    let mut slot = (interval_idx + 1) % intvl_max;
    let mut hops = 1usize;
    while remaining > interval as f64 && hops < intvl_max {
        intervals[slot] += interval as f64 * pps;
        remaining -= interval as f64;
        slot = (slot + 1) % intvl_max;
        hops += 1;
    }
    intervals[slot] += remaining * pps;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entirely_within_current_interval() {
        let mut intervals = vec![0.0; 64];
        distribute(&mut intervals, 5, 60, 1060, 1000, 1010, 100);
        assert_eq!(intervals[5], 100.0);
        assert_eq!(intervals.iter().filter(|&&v| v != 0.0).count(), 1);
    }

    #[test]
    fn spans_two_intervals_single_residue_slot() {
        // S5 from spec: t=1000..1090, 90 packets, interval_last=1030 (interval=60).
        let mut intervals = vec![0.0; 64];
        distribute(&mut intervals, 5, 60, 1030, 1000, 1090, 90);
        assert_eq!(intervals[5], 30.0);
        assert_eq!(intervals[6], 60.0);
    }

    #[test]
    fn spans_several_full_slots_plus_residue() {
        let mut intervals = vec![0.0; 64];
        // duration=150s at pps=1.0; interval=60, interval_last - time_first = 30.
        distribute(&mut intervals, 0, 60, 1030, 1000, 1150, 150);
        assert_eq!(intervals[0], 30.0);
        assert_eq!(intervals[1], 60.0);
        assert_eq!(intervals[2], 60.0);
        let total: f64 = intervals.iter().sum();
        assert!((total - 150.0).abs() < 1e-9);
    }

    #[test]
    fn wraps_around_circular_buffer() {
        let mut intervals = vec![0.0; 4];
        distribute(&mut intervals, 2, 60, 1030, 1000, 1300, 300);
        let total: f64 = intervals.iter().sum();
        assert!((total - 300.0).abs() < 1e-6);
    }

    #[test]
    fn zero_duration_treated_as_instantaneous() {
        let mut intervals = vec![0.0; 16];
        distribute(&mut intervals, 3, 60, 1060, 1000, 1000, 42);
        assert_eq!(intervals[3], 42.0);
    }
}
