//! Placement coordinates for plant slots inside a container.

use serde::{Deserialize, Serialize};

/// Spacing between neighbouring plant slots, in world units (cm).
pub const SLOT_SPACING: f32 = 30.0;

/// Position of a plant slot relative to its container origin.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SlotLocation {
    /// X offset
    pub x: f32,
    /// Y offset
    pub y: f32,
    /// Z offset
    pub z: f32,
}

impl SlotLocation {
    /// Creates a new slot location.
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Location of slot `index` when `capacity` slots are laid out in a
    /// square-ish grid of `ceil(sqrt(capacity))` columns around the origin.
    #[must_use]
    pub fn grid(index: usize, capacity: usize) -> Self {
        if capacity == 0 {
            return Self::default();
        }
        let per_row = (capacity as f32).sqrt().ceil().max(1.0) as usize;
        let row = index / per_row;
        let col = index % per_row;
        // Row count uses integer division, matching the layout the level
        // designers placed containers against.
        let rows = (capacity / per_row) as f32;

        Self {
            x: (col as f32 - per_row as f32 / 2.0) * SLOT_SPACING,
            y: (row as f32 - rows / 2.0) * SLOT_SPACING,
            z: 0.0,
        }
    }

    /// Offsets this location by a container origin.
    #[must_use]
    pub fn offset_by(self, origin: Self) -> Self {
        Self::new(self.x + origin.x, self.y + origin.y, self.z + origin.z)
    }
}
