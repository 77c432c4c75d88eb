//! Tour Orderer - greedy nearest-neighbor sequencing of waypoints.
//!
//! Starting from the anchor (usually the drone) or the first waypoint, the
//! closest unvisited waypoint is flown next. Ties go to the waypoint that
//! appears first in the input, so callers control tie-breaks through input
//! order (the orchestrator feeds priority order).
//!
//! This is the classic O(n²) heuristic, not a shortest-tour solver. Missions
//! carry a handful of points, where the difference rarely matters.

use nalgebra::Vector3;

use crate::surface_snap::Waypoint;

/// Flight-order view over a waypoint slice.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedRoute<'a> {
    stops: Vec<&'a Waypoint>,
    indices: Vec<usize>,
}

impl<'a> OrderedRoute<'a> {
    /// Keeps the input order unchanged.
    pub fn as_given(waypoints: &'a [Waypoint]) -> Self {
        Self {
            stops: waypoints.iter().collect(),
            indices: (0..waypoints.len()).collect(),
        }
    }

    /// Waypoints in flight order.
    pub fn stops(&self) -> &[&'a Waypoint] {
        &self.stops
    }

    /// Input index of each stop, in flight order.
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Positions in flight order.
    pub fn positions(&self) -> Vec<Vector3<f64>> {
        self.stops.iter().map(|w| w.position).collect()
    }

    pub fn len(&self) -> usize {
        self.stops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }

    /// Total path length, including the leg from `anchor` if given.
    pub fn length(&self, anchor: Option<Vector3<f64>>) -> f64 {
        let mut total = 0.0;
        let mut current = anchor.or_else(|| self.stops.first().map(|w| w.position));
        for stop in &self.stops {
            if let Some(prev) = current {
                total += (stop.position - prev).norm();
            }
            current = Some(stop.position);
        }
        total
    }
}

/// Orders waypoints by repeatedly visiting the nearest remaining one.
pub fn order(waypoints: &[Waypoint], anchor: Option<Vector3<f64>>) -> OrderedRoute<'_> {
    let mut remaining: Vec<usize> = (0..waypoints.len()).collect();
    let mut indices = Vec::with_capacity(waypoints.len());

    let Some(first) = waypoints.first() else {
        return OrderedRoute {
            stops: Vec::new(),
            indices,
        };
    };
    let mut current = anchor.unwrap_or(first.position);

    while !remaining.is_empty() {
        let mut best_dist = f64::INFINITY;
        let mut best_slot = 0;

        for (slot, &idx) in remaining.iter().enumerate() {
            let dist = (waypoints[idx].position - current).norm();
            // Strict comparison keeps the earliest input on ties
            if dist < best_dist {
                best_dist = dist;
                best_slot = slot;
            }
        }

        let chosen = remaining.remove(best_slot);
        current = waypoints[chosen].position;
        indices.push(chosen);
    }

    OrderedRoute {
        stops: indices.iter().map(|&i| &waypoints[i]).collect(),
        indices,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn wp(name: &str, x: f64, y: f64, z: f64) -> Waypoint {
        Waypoint::new(name, Vector3::new(x, y, z))
    }

    fn names<'a>(route: &OrderedRoute<'a>) -> Vec<&'a str> {
        route.stops().iter().map(|w| w.name.as_str()).collect()
    }

    #[test]
    fn test_empty_input() {
        let route = order(&[], Some(Vector3::zeros()));
        assert!(route.is_empty());
        assert_eq!(route.length(None), 0.0);
    }

    #[test]
    fn test_anchor_picks_nearest_first() {
        let points = vec![
            wp("far", 10.0, 0.0, 0.0),
            wp("near", 1.0, 0.0, 0.0),
            wp("mid", 5.0, 0.0, 0.0),
        ];

        let route = order(&points, Some(Vector3::zeros()));

        assert_eq!(names(&route), vec!["near", "mid", "far"]);
        assert_eq!(route.indices(), &[1, 2, 0]);
    }

    #[test]
    fn test_without_anchor_starts_at_first() {
        let points = vec![
            wp("start", 10.0, 0.0, 0.0),
            wp("a", 0.0, 0.0, 0.0),
            wp("b", 9.0, 0.0, 0.0),
        ];

        let route = order(&points, None);
        assert_eq!(names(&route), vec!["start", "b", "a"]);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let points = vec![
            wp("left", -2.0, 0.0, 0.0),
            wp("right", 2.0, 0.0, 0.0),
        ];

        let route = order(&points, Some(Vector3::zeros()));
        assert_eq!(names(&route), vec!["left", "right"]);
    }

    #[test]
    fn test_route_length_with_anchor() {
        let points = vec![wp("a", 3.0, 0.0, 0.0), wp("b", 3.0, 4.0, 0.0)];
        let route = OrderedRoute::as_given(&points);

        assert!((route.length(Some(Vector3::zeros())) - 7.0).abs() < 1e-12);
        assert!((route.length(None) - 4.0).abs() < 1e-12);
    }

    fn arb_points() -> impl Strategy<Value = Vec<(f64, f64, f64)>> {
        prop::collection::vec((-20.0..20.0f64, -5.0..5.0f64, -20.0..20.0f64), 0..8)
    }

    proptest! {
        #[test]
        fn prop_output_is_permutation(raw in arb_points(), anchor in (-20.0..20.0f64, -5.0..5.0f64, -20.0..20.0f64)) {
            let points: Vec<Waypoint> = raw
                .iter()
                .enumerate()
                .map(|(i, &(x, y, z))| wp(&format!("p{}", i), x, y, z))
                .collect();

            let route = order(&points, Some(Vector3::new(anchor.0, anchor.1, anchor.2)));

            prop_assert_eq!(route.len(), points.len());
            let mut seen = route.indices().to_vec();
            seen.sort_unstable();
            prop_assert_eq!(seen, (0..points.len()).collect::<Vec<_>>());
        }

        #[test]
        fn prop_each_step_is_brute_force_minimum(raw in arb_points(), anchor in (-20.0..20.0f64, -5.0..5.0f64, -20.0..20.0f64)) {
            let points: Vec<Waypoint> = raw
                .iter()
                .enumerate()
                .map(|(i, &(x, y, z))| wp(&format!("p{}", i), x, y, z))
                .collect();
            let anchor = Vector3::new(anchor.0, anchor.1, anchor.2);

            let route = order(&points, Some(anchor));

            let mut current = anchor;
            let mut remaining: Vec<usize> = (0..points.len()).collect();
            for &chosen in route.indices() {
                let chosen_dist = (points[chosen].position - current).norm();
                let min_dist = remaining
                    .iter()
                    .map(|&i| (points[i].position - current).norm())
                    .fold(f64::INFINITY, f64::min);
                prop_assert!(chosen_dist <= min_dist);

                // First-encountered wins among exact ties
                let first_min = remaining
                    .iter()
                    .copied()
                    .find(|&i| (points[i].position - current).norm() == min_dist);
                prop_assert_eq!(Some(chosen), first_min);

                remaining.retain(|&i| i != chosen);
                current = points[chosen].position;
            }
        }
    }
}
