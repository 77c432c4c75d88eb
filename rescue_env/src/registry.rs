//! Shared landmark registry abstraction.

use nalgebra::Vector3;

/// Named points of interest known to the host (scene landmarks plus
/// generated mission waypoints).
///
/// The mission pipeline appends its waypoints at the end and rolls them back
/// with [`remove_generated_since`](LandmarkRegistry::remove_generated_since),
/// so implementations must keep insertion order.
pub trait LandmarkRegistry: Send {
    /// Appends a landmark.
    fn add(&mut self, name: &str, position: Vector3<f64>);

    /// Number of landmarks currently registered.
    fn len(&self) -> usize;

    /// Returns true if nothing is registered.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every landmark at index `mark` and beyond.
    ///
    /// Returns the number removed; a mark at or past the end removes nothing.
    fn remove_generated_since(&mut self, mark: usize) -> usize;

    /// Removes every landmark.
    fn clear(&mut self);
}
