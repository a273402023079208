#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative tile collection state.
//!
//! The world owns every long-lived tile set. Systems never mutate it
//! directly: they submit [`Command`] values to [`apply`] and read state back
//! through the [`query`] module.

use std::collections::HashSet;

use tile_collector_core::{Command, Event, SceneOrigin, ScanTracker, WorldPoint};

/// Represents the authoritative tile collection state.
#[derive(Debug, Default)]
pub struct World {
    visited: HashSet<WorldPoint>,
    walkable: HashSet<WorldPoint>,
    reachable: HashSet<WorldPoint>,
    accumulated: HashSet<WorldPoint>,
    tracker: ScanTracker,
}

impl World {
    /// Creates an empty world.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn clear_scene(&mut self) {
        self.accumulated.clear();
        self.reachable.clear();
    }

    fn merge_scan(
        &mut self,
        origin: SceneOrigin,
        position: WorldPoint,
        tiles: Vec<WorldPoint>,
    ) -> usize {
        if self.tracker.last_origin != Some(origin) {
            self.clear_scene();
        }

        let mut newly_reachable = 0;
        for tile in tiles {
            if self.accumulated.insert(tile) {
                newly_reachable += 1;
            }
            let _ = self.walkable.insert(tile);
        }

        self.reachable.clone_from(&self.accumulated);
        self.tracker = ScanTracker {
            last_origin: Some(origin),
            last_scan_position: Some(position),
        };
        newly_reachable
    }
}

/// Applies the provided command to the world.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::MarkVisited { tiles } => {
            let newly_visited = tiles
                .into_iter()
                .filter(|tile| world.visited.insert(*tile))
                .count();
            if newly_visited > 0 {
                out_events.push(Event::TilesVisited {
                    newly_visited,
                    total: world.visited.len(),
                });
            }
        }
        Command::RestoreVisited { tiles } => {
            world.visited = tiles.into_iter().collect();
            out_events.push(Event::VisitedRestored {
                total: world.visited.len(),
            });
        }
        Command::ResetVisited => {
            world.visited.clear();
            out_events.push(Event::VisitedReset);
        }
        Command::InvalidateScene { origin } => {
            world.clear_scene();
            world.tracker = ScanTracker {
                last_origin: Some(origin),
                last_scan_position: None,
            };
            out_events.push(Event::SceneInvalidated { origin });
        }
        Command::MergeScan {
            origin,
            position,
            tiles,
        } => {
            let newly_reachable = world.merge_scan(origin, position, tiles);
            out_events.push(Event::ReachabilityMerged {
                origin,
                newly_reachable,
                total: world.reachable.len(),
            });
        }
        Command::ClearAll => {
            world.visited.clear();
            world.walkable.clear();
            world.clear_scene();
            world.tracker = ScanTracker::default();
            out_events.push(Event::StateCleared);
        }
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use tile_collector_core::{ScanTracker, TileSetView, WorldPoint};

    use super::World;

    /// Every tile the agent has legitimately occupied.
    #[must_use]
    pub fn visited(world: &World) -> TileSetView<'_> {
        TileSetView::new(&world.visited)
    }

    /// Tiles reachable from the agent within the current scene.
    #[must_use]
    pub fn reachable(world: &World) -> TileSetView<'_> {
        TileSetView::new(&world.reachable)
    }

    /// Every tile found walkable by any scan, across scenes.
    #[must_use]
    pub fn walkable(world: &World) -> TileSetView<'_> {
        TileSetView::new(&world.walkable)
    }

    /// Scene and position the last scan ran from.
    #[must_use]
    pub fn scan_tracker(world: &World) -> ScanTracker {
        world.tracker
    }

    /// Percentage of known walkable tiles that have been visited.
    ///
    /// Returns `0.0` when no walkable tiles are known yet.
    #[must_use]
    pub fn exploration_percentage(world: &World) -> f64 {
        if world.walkable.is_empty() {
            return 0.0;
        }

        let visited_walkable = world
            .walkable
            .iter()
            .filter(|tile| world.visited.contains(tile))
            .count();
        visited_walkable as f64 * 100.0 / world.walkable.len() as f64
    }

    /// Filter applied when listing reachable tiles that still await a visit.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct UnvisitedFilter {
        /// Restricts results to this plane when set.
        pub plane: Option<u8>,
        /// Centre and maximum step distance; a distance of zero is unlimited.
        pub within: Option<(WorldPoint, u32)>,
    }

    /// Reachable tiles that have not been visited, narrowed by `filter`.
    #[must_use]
    pub fn unvisited_reachable(world: &World, filter: UnvisitedFilter) -> Vec<WorldPoint> {
        world
            .reachable
            .iter()
            .copied()
            .filter(|tile| !world.visited.contains(tile))
            .filter(|tile| filter.plane.map_or(true, |plane| tile.plane() == plane))
            .filter(|tile| {
                filter.within.map_or(true, |(centre, distance)| {
                    distance == 0 || tile.distance_to(centre) <= distance
                })
            })
            .collect()
    }
}
