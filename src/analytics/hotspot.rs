//! Geographic hotspots of urgent bins.
//!
//! Positions and importance are standardized separately, importance is
//! down-weighted, and the resulting 3-D points are partitioned with seeded
//! k-means (k-means++ seeding, several restarts, lowest inertia kept).

use crate::state::{BinId, HotspotCluster, ScoredBin};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cmp::Ordering;
use thiserror::Error;

/// Scale applied to standardized importance so position dominates grouping.
pub const IMPORTANCE_WEIGHT: f64 = 0.5;
pub const BINS_PER_CLUSTER: usize = 5;
pub const MAX_CLUSTERS: usize = 8;
pub const RESTARTS: usize = 10;
pub const MAX_ITERATIONS: usize = 300;
pub const CLUSTER_SEED: u64 = 42;
pub const TOP_EXAMPLES: usize = 3;

type Point = [f64; 3];

#[derive(Debug, Error, PartialEq)]
pub enum ClusterError {
    #[error("non-finite {field} for bin {bin_id}")]
    NonFinite { bin_id: BinId, field: &'static str },
}

#[derive(Debug, Clone, PartialEq)]
pub struct HotspotCandidate {
    pub bin_id: BinId,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub importance: f64,
}

impl From<&ScoredBin> for HotspotCandidate {
    fn from(scored: &ScoredBin) -> Self {
        Self {
            bin_id: scored.bin_id.clone(),
            latitude: scored.latitude,
            longitude: scored.longitude,
            importance: scored.importance,
        }
    }
}

struct Eligible<'a> {
    bin_id: &'a str,
    latitude: f64,
    longitude: f64,
    importance: f64,
}

pub fn cluster_count(eligible: usize) -> usize {
    (eligible / BINS_PER_CLUSTER).clamp(1, MAX_CLUSTERS)
}

/// Clusters candidates with positive importance and known coordinates.
///
/// Fewer than two such bins yields no clusters. Output is ordered by
/// descending average importance.
pub fn find_hotspots(candidates: &[HotspotCandidate]) -> Result<Vec<HotspotCluster>, ClusterError> {
    let eligible = eligible(candidates)?;
    if eligible.len() < 2 {
        return Ok(Vec::new());
    }

    let points = weighted_features(&eligible);
    let k = cluster_count(eligible.len());
    let mut rng = StdRng::seed_from_u64(CLUSTER_SEED);
    let partition = best_partition(&points, k, &mut rng);

    let mut clusters: Vec<HotspotCluster> = (0..k)
        .filter_map(|cluster_id| summarize(cluster_id, &eligible, &partition.labels))
        .collect();
    clusters.sort_by(|a, b| {
        b.average_importance
            .total_cmp(&a.average_importance)
            .then(a.cluster_id.cmp(&b.cluster_id))
    });
    Ok(clusters)
}

fn eligible(candidates: &[HotspotCandidate]) -> Result<Vec<Eligible<'_>>, ClusterError> {
    let mut eligible = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let (Some(latitude), Some(longitude)) = (candidate.latitude, candidate.longitude) else {
            continue;
        };
        if candidate.importance.is_nan() {
            return Err(non_finite(candidate, "importance"));
        }
        if candidate.importance <= 0.0 {
            continue;
        }
        if !candidate.importance.is_finite() {
            return Err(non_finite(candidate, "importance"));
        }
        if !latitude.is_finite() {
            return Err(non_finite(candidate, "latitude"));
        }
        if !longitude.is_finite() {
            return Err(non_finite(candidate, "longitude"));
        }
        eligible.push(Eligible {
            bin_id: &candidate.bin_id,
            latitude,
            longitude,
            importance: candidate.importance,
        });
    }
    Ok(eligible)
}

fn non_finite(candidate: &HotspotCandidate, field: &'static str) -> ClusterError {
    ClusterError::NonFinite {
        bin_id: candidate.bin_id.clone(),
        field,
    }
}

fn weighted_features(eligible: &[Eligible<'_>]) -> Vec<Point> {
    let lat = standardize(eligible.iter().map(|e| e.latitude));
    let lon = standardize(eligible.iter().map(|e| e.longitude));
    let importance = standardize(eligible.iter().map(|e| e.importance));

    (0..eligible.len())
        .map(|i| [lat[i], lon[i], importance[i] * IMPORTANCE_WEIGHT])
        .collect()
}

/// Zero mean, unit (population) variance. Constant columns map to zero.
fn standardize(values: impl Iterator<Item = f64> + Clone) -> Vec<f64> {
    let n = values.clone().count() as f64;
    let mean = values.clone().sum::<f64>() / n;
    let variance = values.clone().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    let scale = if variance > 0.0 { variance.sqrt() } else { 1.0 };
    values.map(|v| (v - mean) / scale).collect()
}

struct Partition {
    labels: Vec<usize>,
    inertia: f64,
}

fn best_partition(points: &[Point], k: usize, rng: &mut StdRng) -> Partition {
    let mut best: Option<Partition> = None;
    for _ in 0..RESTARTS {
        let seeds = seed_centroids(points, k, rng);
        let run = lloyd(points, seeds);
        if best.as_ref().is_none_or(|b| run.inertia < b.inertia) {
            best = Some(run);
        }
    }
    best.unwrap_or_else(|| lloyd(points, seed_centroids(points, k, rng)))
}

/// k-means++ seeding: each next centroid is drawn with probability
/// proportional to its squared distance from the nearest chosen one.
fn seed_centroids(points: &[Point], k: usize, rng: &mut StdRng) -> Vec<Point> {
    let n = points.len();
    let mut centroids = Vec::with_capacity(k);
    centroids.push(points[rng.gen_range(0..n)]);
    let mut nearest: Vec<f64> = points
        .iter()
        .map(|p| squared_distance(p, &centroids[0]))
        .collect();

    while centroids.len() < k {
        let total: f64 = nearest.iter().sum();
        let next = if total > 0.0 {
            let target = rng.gen_range(0.0..total);
            let mut acc = 0.0;
            let mut pick = n - 1;
            for (i, d) in nearest.iter().enumerate() {
                acc += d;
                if acc > target {
                    pick = i;
                    break;
                }
            }
            pick
        } else {
            rng.gen_range(0..n)
        };
        let chosen = points[next];
        centroids.push(chosen);
        for (d, p) in nearest.iter_mut().zip(points) {
            *d = d.min(squared_distance(p, &chosen));
        }
    }
    centroids
}

fn lloyd(points: &[Point], mut centroids: Vec<Point>) -> Partition {
    let mut labels = vec![usize::MAX; points.len()];

    for _ in 0..MAX_ITERATIONS {
        let mut changed = false;
        for (label, point) in labels.iter_mut().zip(points) {
            let nearest = nearest_centroid(point, &centroids);
            if *label != nearest {
                *label = nearest;
                changed = true;
            }
        }
        if !changed {
            break;
        }

        let mut sums = vec![[0.0; 3]; centroids.len()];
        let mut counts = vec![0usize; centroids.len()];
        for (label, point) in labels.iter().zip(points) {
            counts[*label] += 1;
            for (s, v) in sums[*label].iter_mut().zip(point) {
                *s += v;
            }
        }
        // An empty cluster keeps its previous centroid.
        for ((centroid, sum), count) in centroids.iter_mut().zip(&sums).zip(&counts) {
            if *count > 0 {
                for (c, s) in centroid.iter_mut().zip(sum) {
                    *c = s / *count as f64;
                }
            }
        }
    }

    let inertia = labels
        .iter()
        .zip(points)
        .map(|(label, point)| squared_distance(point, &centroids[*label]))
        .sum();
    Partition { labels, inertia }
}

/// Index of the closest centroid; ties go to the lowest index.
fn nearest_centroid(point: &Point, centroids: &[Point]) -> usize {
    let mut best = 0;
    let mut best_distance = f64::INFINITY;
    for (index, centroid) in centroids.iter().enumerate() {
        let distance = squared_distance(point, centroid);
        if distance < best_distance {
            best = index;
            best_distance = distance;
        }
    }
    best
}

fn squared_distance(a: &Point, b: &Point) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn summarize(
    cluster_id: usize,
    eligible: &[Eligible<'_>],
    labels: &[usize],
) -> Option<HotspotCluster> {
    let members: Vec<&Eligible<'_>> = eligible
        .iter()
        .zip(labels)
        .filter(|(_, label)| **label == cluster_id)
        .map(|(e, _)| e)
        .collect();
    if members.is_empty() {
        return None;
    }

    let n = members.len() as f64;
    let latitude = members.iter().map(|m| m.latitude).sum::<f64>() / n;
    let longitude = members.iter().map(|m| m.longitude).sum::<f64>() / n;
    let average_importance = members.iter().map(|m| m.importance).sum::<f64>() / n;

    let mut ranked = members.clone();
    ranked.sort_by(|a, b| {
        b.importance
            .partial_cmp(&a.importance)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.bin_id.cmp(b.bin_id))
    });

    Some(HotspotCluster {
        cluster_id,
        latitude,
        longitude,
        average_importance,
        member_bin_ids: members.iter().map(|m| m.bin_id.to_string()).collect(),
        top_examples: ranked
            .iter()
            .take(TOP_EXAMPLES)
            .map(|m| m.bin_id.to_string())
            .collect(),
    })
}
