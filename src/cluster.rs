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

//! k-means clustering of per-host SYN-packet vectors, batch and online variants,
//! plus the `adjust_cluster` false-positive suppression pass. Grounded throughout
//! on `cluster.c`, with two deviations from the source documented in SPEC_FULL.md §5:
//! centroid initialization scans for `stat != 0` hosts rather than indexing by
//! cluster position, and the online update writes the losing cluster's centroid
//! before the winning one, before the host's `cluster` field changes.

use crate::consts::SYN_THRESHOLD;
use crate::host::Host;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterError {
    DataInsufficient,
}

#[derive(Debug, Clone)]
pub struct Cluster {
    pub hosts_cnt: u32,
    pub dev: f64,
    pub centroid: Vec<f64>,
}

impl Cluster {
    fn new(v: usize) -> Self {
        Cluster { hosts_cnt: 0, dev: 0.0, centroid: vec![0.0; v] }
    }
}

fn host_vector(host: &Host, offset: usize, v: usize, intvl_max: usize) -> Vec<f64> {
    (0..v).map(|m| host.intervals[(offset + m) % intvl_max]).collect()
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

/// Index of the nearest centroid, ties broken by lowest index.
fn nearest_cluster(vector: &[f64], clusters: &[Cluster]) -> (usize, f64) {
    let mut best = 0;
    let mut best_dist = squared_distance(vector, &clusters[0].centroid);
    for (j, cluster) in clusters.iter().enumerate().skip(1) {
        let dist = squared_distance(vector, &cluster.centroid);
        if dist < best_dist {
            best_dist = dist;
            best = j;
        }
    }
    (best, best_dist)
}

/// Seeds `k` centroids from the first `k` active hosts encountered in host-array
/// order, copying each host's vector verbatim (no perturbation).
fn init_centroids(
    hosts: &[Host],
    active: &[usize],
    k: usize,
    offset: usize,
    v: usize,
    intvl_max: usize,
) -> Vec<Cluster> {
    let mut clusters: Vec<Cluster> = (0..k).map(|_| Cluster::new(v)).collect();
    for (j, &idx) in active.iter().take(k).enumerate() {
        clusters[j].centroid = host_vector(&hosts[idx], offset, v, intvl_max);
    }
    clusters
}

fn recompute_centroids(
    hosts: &[Host],
    active: &[usize],
    clusters: &mut [Cluster],
    offset: usize,
    v: usize,
    intvl_max: usize,
) {
    for cluster in clusters.iter_mut() {
        cluster.hosts_cnt = 0;
        cluster.centroid.iter_mut().for_each(|x| *x = 0.0);
    }
    for &idx in active {
        clusters[hosts[idx].cluster].hosts_cnt += 1;
        let vector = host_vector(&hosts[idx], offset, v, intvl_max);
        for (c, x) in clusters[hosts[idx].cluster].centroid.iter_mut().zip(vector.iter()) {
            *c += x;
        }
    }
    let mut warned = false;
    for cluster in clusters.iter_mut() {
        if cluster.hosts_cnt > 0 {
            for c in cluster.centroid.iter_mut() {
                *c /= cluster.hosts_cnt as f64;
            }
        } else if !warned {
            eprintln!("Warning: empty cluster produced during centroid recompute");
            warned = true;
        }
    }
}

fn finalize_stats(hosts: &mut [Host], active: &[usize], offset: usize, v: usize, intvl_max: usize) {
    for &idx in active {
        let vector = host_vector(&hosts[idx], offset, v, intvl_max);
        let max = vector.iter().cloned().fold(f64::MIN, f64::max);
        let mean = vector.iter().sum::<f64>() / v as f64;
        hosts[idx].peak = max;
        hosts[idx].mean = mean;
    }
}

/// Lloyd's-algorithm batch k-means: full assignment + recompute each round until
/// no host changes cluster.
pub fn batch_kmeans(
    hosts: &mut [Host],
    active: &[usize],
    k: usize,
    offset: usize,
    v: usize,
    intvl_max: usize,
) -> Result<Vec<Cluster>, ClusterError> {
    if active.len() < k {
        return Err(ClusterError::DataInsufficient);
    }

    let mut clusters = init_centroids(hosts, active, k, offset, v, intvl_max);

    loop {
        let mut moves = 0usize;
        for &idx in active {
            let vector = host_vector(&hosts[idx], offset, v, intvl_max);
            let (best, _) = nearest_cluster(&vector, &clusters);
            let previous = hosts[idx].cluster;
            if best != previous {
                moves += 1;
            }
            hosts[idx].previous_cluster = previous;
            hosts[idx].cluster = best;
        }
        recompute_centroids(hosts, active, &mut clusters, offset, v, intvl_max);
        if moves == 0 {
            break;
        }
    }

    for cluster in clusters.iter_mut() {
        cluster.dev = 0.0;
    }
    for &idx in active {
        let vector = host_vector(&hosts[idx], offset, v, intvl_max);
        for j in 0..clusters.len() {
            hosts[idx].distances[j] = squared_distance(&vector, &clusters[j].centroid);
        }
        let own = hosts[idx].cluster;
        clusters[own].dev += hosts[idx].distances[own];
    }
    finalize_stats(hosts, active, offset, v, intvl_max);

    Ok(clusters)
}

/// Online (incremental) k-means: one pass to seed assignments and centroids, then
/// single-host reassignment moves until a full pass performs none.
pub fn online_kmeans(
    hosts: &mut [Host],
    active: &[usize],
    k: usize,
    offset: usize,
    v: usize,
    intvl_max: usize,
) -> Result<Vec<Cluster>, ClusterError> {
    if active.len() < k {
        return Err(ClusterError::DataInsufficient);
    }

    let mut clusters = init_centroids(hosts, active, k, offset, v, intvl_max);

    for &idx in active {
        let vector = host_vector(&hosts[idx], offset, v, intvl_max);
        let (best, _) = nearest_cluster(&vector, &clusters);
        hosts[idx].previous_cluster = hosts[idx].cluster;
        hosts[idx].cluster = best;
    }
    recompute_centroids(hosts, active, &mut clusters, offset, v, intvl_max);
    own_distances_and_dev(hosts, active, &mut clusters, offset, v, intvl_max);

    loop {
        let mut moved_any = false;
        for &idx in active {
            let vector = host_vector(&hosts[idx], offset, v, intvl_max);
            let q = hosts[idx].cluster;
            let h_q = clusters[q].hosts_cnt;
            if h_q <= 1 {
                // Moving the last member out of its own cluster is disallowed.
                continue;
            }

            let mut best_p = None;
            let mut best_y = hosts[idx].distances[q];
            for (p, cluster) in clusters.iter().enumerate() {
                if p == q {
                    continue;
                }
                let h_p = cluster.hosts_cnt as f64;
                let y = squared_distance(&vector, &cluster.centroid) * (h_p / (h_p + 1.0));
                if y < best_y {
                    best_y = y;
                    best_p = Some(p);
                }
            }

            if let Some(p) = best_p {
                let h_q = clusters[q].hosts_cnt as f64;
                for (c, x) in clusters[q].centroid.iter_mut().zip(vector.iter()) {
                    *c = (*c * h_q - x) / (h_q - 1.0);
                }
                clusters[q].hosts_cnt -= 1;

                let h_p = clusters[p].hosts_cnt as f64;
                for (c, x) in clusters[p].centroid.iter_mut().zip(vector.iter()) {
                    *c = (*c * h_p + x) / (h_p + 1.0);
                }
                clusters[p].hosts_cnt += 1;

                hosts[idx].previous_cluster = q;
                hosts[idx].cluster = p;
                moved_any = true;
            }
        }

        own_distances_and_dev(hosts, active, &mut clusters, offset, v, intvl_max);

        if !moved_any {
            break;
        }
    }

    finalize_stats(hosts, active, offset, v, intvl_max);
    Ok(clusters)
}

/// Recomputes each active host's distance to its own centroid (with the `h/(h-1)`
/// bias correction) and rebuilds each cluster's `dev`.
fn own_distances_and_dev(
    hosts: &mut [Host],
    active: &[usize],
    clusters: &mut [Cluster],
    offset: usize,
    v: usize,
    intvl_max: usize,
) {
    for cluster in clusters.iter_mut() {
        cluster.dev = 0.0;
    }
    for &idx in active {
        let vector = host_vector(&hosts[idx], offset, v, intvl_max);
        let own = hosts[idx].cluster;
        let h = clusters[own].hosts_cnt;
        let mut d = squared_distance(&vector, &clusters[own].centroid);
        if h > 1 {
            d *= h as f64 / (h as f64 - 1.0);
        }
        hosts[idx].distances[own] = d;
        clusters[own].dev += d;
    }
}

/// Reclassifies the smallest cluster's suspect hosts into the safe cluster when
/// their own time-series looks too flat or too small to be a real attack. Returns
/// whether the attack cluster still has members after suppression (SYN_FLOODING
/// should be raised).
pub fn adjust_cluster(
    hosts: &mut [Host],
    active: &[usize],
    clusters: &mut [Cluster],
    offset: usize,
    v: usize,
    intvl_max: usize,
) -> bool {
    let min_count = clusters.iter().map(|c| c.hosts_cnt).min().unwrap_or(0);
    let smallest: Vec<usize> =
        (0..clusters.len()).filter(|&j| clusters[j].hosts_cnt == min_count).collect();
    if min_count == 0 && smallest.len() > 1 {
        eprintln!("Warning: multiple empty clusters tie for smallest, skipping false-positive suppression");
        return false;
    }

    let attack_idx = smallest[0];
    let safe_idx = if attack_idx > 0 { 0 } else { 1 };

    for &idx in active {
        if hosts[idx].cluster != attack_idx {
            continue;
        }
        let vector = host_vector(&hosts[idx], offset, v, intvl_max);
        let max = hosts[idx].peak;
        let mean_full = hosts[idx].mean;
        let std = if v > 1 {
            (vector.iter().map(|x| (x - mean_full).powi(2)).sum::<f64>() / (v as f64 - 1.0)).sqrt()
        } else {
            0.0
        };

        if std < 2.0 * mean_full || max < SYN_THRESHOLD {
            clusters[attack_idx].hosts_cnt -= 1;
            clusters[safe_idx].hosts_cnt += 1;
            hosts[idx].previous_cluster = attack_idx;
            hosts[idx].cluster = safe_idx;
        }
    }

    let flagged = clusters[attack_idx].hosts_cnt > 0;
    if flagged {
        eprintln!(
            "Warning: SYN flooding cluster survived false-positive suppression ({} hosts)",
            clusters[attack_idx].hosts_cnt
        );
    }
    flagged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HostIndex;

    fn host_with_series(idx: &mut HostIndex, ip: u32, series: &[f64], intvl_max: usize) -> usize {
        let (i, _) = idx.get_or_insert(ip, intvl_max, 2);
        for (slot, value) in idx.hosts[i].intervals.iter_mut().zip(series.iter()) {
            *slot = *value;
        }
        i
    }

    #[test]
    fn batch_kmeans_isolates_flood_victim() {
        let intvl_max = 16;
        let mut idx = HostIndex::new();
        let mut series = vec![2.0; 10];
        host_with_series(&mut idx, 1, &series, intvl_max);
        for ip in 2..12u32 {
            host_with_series(&mut idx, ip, &series, intvl_max);
        }
        series = vec![2000.0; 10];
        host_with_series(&mut idx, 999, &series, intvl_max);

        let active: Vec<usize> = (0..idx.hosts.len()).collect();
        let clusters = batch_kmeans(&mut idx.hosts, &active, 2, 0, 10, intvl_max).unwrap();
        assert_eq!(clusters.len(), 2);

        let victim_idx = idx.hosts.iter().position(|h| h.ip == 999).unwrap();
        let victim_cluster = idx.hosts[victim_idx].cluster;
        let victim_cluster_size =
            idx.hosts.iter().filter(|h| h.cluster == victim_cluster).count();
        assert_eq!(victim_cluster_size, 1);
    }

    #[test]
    fn batch_kmeans_requires_enough_hosts() {
        let intvl_max = 16;
        let mut idx = HostIndex::new();
        host_with_series(&mut idx, 1, &[1.0; 4], intvl_max);
        let active: Vec<usize> = (0..idx.hosts.len()).collect();
        let err = batch_kmeans(&mut idx.hosts, &active, 2, 0, 4, intvl_max).unwrap_err();
        assert_eq!(err, ClusterError::DataInsufficient);
    }

    #[test]
    fn online_and_batch_agree_on_obvious_partition() {
        let intvl_max = 16;
        let mut idx_a = HostIndex::new();
        let mut idx_b = HostIndex::new();
        for ip in 1..6u32 {
            host_with_series(&mut idx_a, ip, &[1.0, 1.0, 1.0, 1.0], intvl_max);
            host_with_series(&mut idx_b, ip, &[1.0, 1.0, 1.0, 1.0], intvl_max);
        }
        host_with_series(&mut idx_a, 100, &[900.0, 900.0, 900.0, 900.0], intvl_max);
        host_with_series(&mut idx_b, 100, &[900.0, 900.0, 900.0, 900.0], intvl_max);

        let active_a: Vec<usize> = (0..idx_a.hosts.len()).collect();
        let active_b: Vec<usize> = (0..idx_b.hosts.len()).collect();
        batch_kmeans(&mut idx_a.hosts, &active_a, 2, 0, 4, intvl_max).unwrap();
        online_kmeans(&mut idx_b.hosts, &active_b, 2, 0, 4, intvl_max).unwrap();

        let victim_a = idx_a.hosts.iter().position(|h| h.ip == 100).unwrap();
        let victim_b = idx_b.hosts.iter().position(|h| h.ip == 100).unwrap();
        let size_a = idx_a.hosts.iter().filter(|h| h.cluster == idx_a.hosts[victim_a].cluster).count();
        let size_b = idx_b.hosts.iter().filter(|h| h.cluster == idx_b.hosts[victim_b].cluster).count();
        assert_eq!(size_a, 1);
        assert_eq!(size_b, 1);
    }

    #[test]
    fn adjust_cluster_suppresses_low_variance_small_cluster() {
        let intvl_max = 16;
        let mut idx = HostIndex::new();
        for ip in 1..6u32 {
            host_with_series(&mut idx, ip, &[2.0, 2.0, 2.0, 2.0], intvl_max);
        }
        // Small cluster of one host whose series is flat and below SYN_THRESHOLD.
        host_with_series(&mut idx, 100, &[5.0, 5.0, 5.0, 5.0], intvl_max);

        let active: Vec<usize> = (0..idx.hosts.len()).collect();
        let mut clusters = batch_kmeans(&mut idx.hosts, &active, 2, 0, 4, intvl_max).unwrap();
        let flagged = adjust_cluster(&mut idx.hosts, &active, &mut clusters, 0, 4, intvl_max);
        assert!(!flagged);
    }

    #[test]
    fn adjust_cluster_keeps_real_flood() {
        let intvl_max = 16;
        let mut idx = HostIndex::new();
        for ip in 1..6u32 {
            host_with_series(&mut idx, ip, &[2.0, 2.0, 2.0, 2.0], intvl_max);
        }
        // High-variance, high-peak series should survive suppression.
        host_with_series(&mut idx, 100, &[0.0, 4000.0, 0.0, 4000.0], intvl_max);

        let active: Vec<usize> = (0..idx.hosts.len()).collect();
        let mut clusters = batch_kmeans(&mut idx.hosts, &active, 2, 0, 4, intvl_max).unwrap();
        let flagged = adjust_cluster(&mut idx.hosts, &active, &mut clusters, 0, 4, intvl_max);
        assert!(flagged);
    }
}
