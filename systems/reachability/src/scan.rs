//! Scene collision scanner that extracts walkable cells from a plane.

use std::collections::HashSet;

use tile_collector_core::{CollisionView, PackedCoord, TerrainView};

/// Collects every local cell that has terrain and is not fully blocked.
///
/// Cells without terrain geometry are skipped even when their flags are
/// clear, and cells the collision grid has no data for are skipped too.
#[must_use]
pub fn walkable_coords(
    collision: CollisionView<'_>,
    terrain: TerrainView<'_>,
) -> HashSet<PackedCoord> {
    let (width, height) = terrain.dimensions();
    let width = i32::try_from(width).unwrap_or(i32::MAX);
    let height = i32::try_from(height).unwrap_or(i32::MAX);

    let mut walkable = HashSet::new();
    for x in 0..width {
        for y in 0..height {
            if !terrain.has_terrain(x, y) {
                continue;
            }

            let Some(flags) = collision.flags_at(x, y) else {
                continue;
            };

            if !flags.is_full_block() {
                let _ = walkable.insert(PackedCoord::encode(x, y));
            }
        }
    }
    walkable
}
