//! k-nearest-neighbor location classifier over the fingerprint map.
//!
//! A pure, stateless function from a snapshot of stored samples and a
//! live RSSI query vector to a location prediction. The calling
//! application takes the snapshot (via the store trait), so prediction
//! never holds a lock while computing and never observes a torn write.
//!
//! # Algorithm
//!
//! 1. Fail with [`EngineError::InsufficientData`] when the snapshot is empty.
//! 2. Compute Euclidean distance from the query to every sample.
//! 3. Sort ascending by distance; ties go to the earlier `created_at`,
//!    then to the earlier sample in insertion order.
//! 4. Keep the `k` closest (all of them when fewer than `k` exist).
//! 5. `nearest_spot` = the rank-0 sample's spot.
//! 6. `predicted_location` = the unique plurality location among the
//!    kept neighbors; with no unique plurality (all distinct, or an
//!    even split) the rank-0 neighbor's location wins.
//! 7. Return the neighbor list closest-first for caller transparency.
//!
//! Every step is deterministic: repeated calls over the same snapshot
//! and query produce identical results.

use std::collections::HashMap;

use serde::Serialize;

use crate::error::EngineError;
use crate::models::{FingerprintSample, RssiVector};

/// Default neighbor count; overridable through application config.
pub const DEFAULT_K: usize = 3;

/// One ranked neighbor in a prediction, closest first.
#[derive(Debug, Clone, Serialize)]
pub struct Neighbor {
    pub spot_name: String,
    pub location_name: String,
    pub distance: f64,
}

/// Result of a single prediction. Transient: computed per request,
/// never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct Prediction {
    pub predicted_location: String,
    pub nearest_spot: String,
    pub neighbors: Vec<Neighbor>,
}

/// Predict the location for a live RSSI vector from a sample snapshot.
///
/// `samples` must be in insertion order (the order `list_samples`
/// returns); insertion rank is the final tie-break. The query's
/// dimensionality is the caller's contract — the store rejects
/// mismatched samples on the way in, and the application validates
/// query vectors at its boundary.
pub fn predict(
    samples: &[FingerprintSample],
    query: &RssiVector,
    k: usize,
) -> Result<Prediction, EngineError> {
    if samples.is_empty() {
        return Err(EngineError::InsufficientData);
    }

    let mut ranked: Vec<(usize, f64)> = samples
        .iter()
        .enumerate()
        .map(|(i, s)| (i, query.distance(&s.rssi)))
        .collect();

    ranked.sort_by(|(ia, da), (ib, db)| {
        da.partial_cmp(db)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(samples[*ia].created_at.cmp(&samples[*ib].created_at))
            .then(ia.cmp(ib))
    });

    let k_used = k.max(1).min(ranked.len());
    let neighbors: Vec<Neighbor> = ranked[..k_used]
        .iter()
        .map(|(i, d)| Neighbor {
            spot_name: samples[*i].spot_name.clone(),
            location_name: samples[*i].location_name.clone(),
            distance: *d,
        })
        .collect();

    let predicted_location = vote(&neighbors);
    let nearest_spot = neighbors[0].spot_name.clone();

    Ok(Prediction {
        predicted_location,
        nearest_spot,
        neighbors,
    })
}

/// Plurality vote among neighbors; rank 0 breaks voting ties.
fn vote(neighbors: &[Neighbor]) -> String {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for n in neighbors {
        *counts.entry(n.location_name.as_str()).or_insert(0) += 1;
    }
    let best = counts.values().copied().max().unwrap_or(0);
    let leaders = counts.values().filter(|&&c| c == best).count();
    if leaders == 1 {
        counts
            .into_iter()
            .find(|(_, c)| *c == best)
            .map(|(loc, _)| loc.to_string())
            .unwrap_or_else(|| neighbors[0].location_name.clone())
    } else {
        neighbors[0].location_name.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(spot: &str, location: &str, rssi: Vec<i32>, created_at: i64) -> FingerprintSample {
        FingerprintSample {
            id: format!("fp-{}", spot),
            spot_name: spot.to_string(),
            location_name: location.to_string(),
            rssi: RssiVector::new(rssi),
            created_at,
        }
    }

    #[test]
    fn test_empty_store_is_insufficient_data() {
        let result = predict(&[], &RssiVector::new(vec![-75, -85]), 3);
        assert_eq!(result.unwrap_err(), EngineError::InsufficientData);
    }

    #[test]
    fn test_exact_match_has_zero_distance_and_wins() {
        let samples = vec![
            sample("Near Window", "Workshop", vec![-75, -85], 1),
            sample("By Door", "Meeting Room", vec![-92, -68], 2),
        ];
        let p = predict(&samples, &RssiVector::new(vec![-75, -85]), 3).unwrap();
        assert_eq!(p.nearest_spot, "Near Window");
        assert_eq!(p.neighbors[0].distance, 0.0);
    }

    #[test]
    fn test_majority_rule() {
        // Neighbors resolve to [A, A, B]; A must win.
        let samples = vec![
            sample("a1", "A", vec![-70, -90], 1),
            sample("a2", "A", vec![-72, -91], 2),
            sample("b1", "B", vec![-90, -70], 3),
        ];
        let p = predict(&samples, &RssiVector::new(vec![-71, -90]), 3).unwrap();
        assert_eq!(p.predicted_location, "A");
    }

    #[test]
    fn test_no_majority_falls_back_to_closest() {
        // Three distinct locations: the rank-0 neighbor's location wins.
        let samples = vec![
            sample("a1", "A", vec![-70, -90], 1),
            sample("b1", "B", vec![-80, -80], 2),
            sample("c1", "C", vec![-90, -70], 3),
        ];
        let p = predict(&samples, &RssiVector::new(vec![-71, -89]), 3).unwrap();
        assert_eq!(p.neighbors[0].location_name, "A");
        assert_eq!(p.predicted_location, "A");
    }

    #[test]
    fn test_even_split_falls_back_to_closest() {
        let samples = vec![
            sample("a1", "A", vec![-70, -90], 1),
            sample("a2", "A", vec![-71, -90], 2),
            sample("b1", "B", vec![-72, -90], 3),
            sample("b2", "B", vec![-73, -90], 4),
        ];
        let p = predict(&samples, &RssiVector::new(vec![-70, -90]), 4).unwrap();
        assert_eq!(p.predicted_location, "A");
    }

    #[test]
    fn test_distance_tie_broken_by_earlier_created_at() {
        // Both samples are equidistant from the query; the one trained
        // earlier must rank first.
        let samples = vec![
            sample("later", "B", vec![-74, -86], 20),
            sample("earlier", "A", vec![-76, -84], 10),
        ];
        let p = predict(&samples, &RssiVector::new(vec![-75, -85]), 1).unwrap();
        assert_eq!(p.nearest_spot, "earlier");
        assert_eq!(p.predicted_location, "A");
    }

    #[test]
    fn test_fewer_samples_than_k_uses_all() {
        let samples = vec![sample("only", "A", vec![-70, -90], 1)];
        let p = predict(&samples, &RssiVector::new(vec![-75, -85]), 3).unwrap();
        assert_eq!(p.neighbors.len(), 1);
        assert_eq!(p.predicted_location, "A");
    }

    #[test]
    fn test_deterministic_across_calls() {
        let samples = vec![
            sample("a1", "A", vec![-70, -95], 1),
            sample("a2", "A", vec![-78, -90], 2),
            sample("b1", "B", vec![-92, -68], 3),
        ];
        let query = RssiVector::new(vec![-74, -93]);
        let first = predict(&samples, &query, 3).unwrap();
        for _ in 0..10 {
            let again = predict(&samples, &query, 3).unwrap();
            assert_eq!(again.predicted_location, first.predicted_location);
            assert_eq!(again.nearest_spot, first.nearest_spot);
            let dists: Vec<f64> = again.neighbors.iter().map(|n| n.distance).collect();
            let first_dists: Vec<f64> = first.neighbors.iter().map(|n| n.distance).collect();
            assert_eq!(dists, first_dists);
        }
    }

    #[test]
    fn test_neighbors_sorted_closest_first() {
        let samples = vec![
            sample("far", "B", vec![-95, -60], 1),
            sample("near", "A", vec![-74, -86], 2),
            sample("mid", "A", vec![-80, -80], 3),
        ];
        let p = predict(&samples, &RssiVector::new(vec![-75, -85]), 3).unwrap();
        assert!(p.neighbors[0].distance <= p.neighbors[1].distance);
        assert!(p.neighbors[1].distance <= p.neighbors[2].distance);
        assert_eq!(p.neighbors[0].spot_name, "near");
    }

    #[test]
    fn test_end_to_end_workshop_scenario() {
        // Train three spots across two rooms, then query a point near
        // the window: two of the three neighbors are workshop spots, so
        // the workshop wins the vote.
        let samples = vec![
            sample("Near Window", "Workshop First Floor", vec![-70, -95], 1),
            sample("Center", "Workshop First Floor", vec![-78, -90], 2),
            sample(
                "By Door",
                "Meeting Room Second Floor",
                vec![-92, -68],
                3,
            ),
        ];
        let p = predict(&samples, &RssiVector::new(vec![-74, -93]), 3).unwrap();
        assert_eq!(p.nearest_spot, "Near Window");
        assert_eq!(p.predicted_location, "Workshop First Floor");
        assert_eq!(p.neighbors.len(), 3);
    }
}
