//! Breadth-first reachability search over walkable scene cells.

use std::collections::{HashSet, VecDeque};

use tile_collector_core::{CollisionView, Direction, EdgeRule, PackedCoord};

/// Returns the connected component of `start` within `walkable`.
///
/// Expansion follows the four cardinal edges permitted by [`EdgeRule`];
/// there are no diagonal edges. An empty set is returned when `start` itself
/// is not walkable.
#[must_use]
pub fn reachable_from(
    start: PackedCoord,
    walkable: &HashSet<PackedCoord>,
    collision: CollisionView<'_>,
) -> HashSet<PackedCoord> {
    let mut reachable = HashSet::new();
    if !walkable.contains(&start) {
        return reachable;
    }

    let mut queue = VecDeque::new();
    let _ = reachable.insert(start);
    queue.push_back(start);

    while let Some(current) = queue.pop_front() {
        let Some(current_flags) = collision.flags_at(current.x(), current.y()) else {
            continue;
        };

        for direction in Direction::ALL {
            let neighbor = current.step(direction);
            if reachable.contains(&neighbor) || !walkable.contains(&neighbor) {
                continue;
            }

            let Some(neighbor_flags) = collision.flags_at(neighbor.x(), neighbor.y()) else {
                continue;
            };

            if EdgeRule::for_direction(direction).permits(current_flags, neighbor_flags) {
                let _ = reachable.insert(neighbor);
                queue.push_back(neighbor);
            }
        }
    }

    reachable
}
