#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Tile Collector engine.
//!
//! This crate defines the message surface that connects the host adapter,
//! the authoritative world, and the pure systems. Systems inspect immutable
//! views of the world and respond with [`Command`] values, the world executes
//! those commands via its `apply` entry point, and then reports [`Event`]
//! values describing what changed.

mod collision;
mod scene;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use collision::{CollisionFlags, Direction, EdgeRule, EDGE_RULES};
pub use scene::{CollisionView, SceneGrid, ScenePlane, SceneSnapshot, TerrainView};

/// Configuration namespace the persisted keys live under.
pub const CONFIG_NAMESPACE: &str = "tilecollector";

/// Absolute grid position of a tile in the world.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct WorldPoint {
    x: i32,
    y: i32,
    plane: u8,
}

impl WorldPoint {
    /// Creates a new world point.
    #[must_use]
    pub const fn new(x: i32, y: i32, plane: u8) -> Self {
        Self { x, y, plane }
    }

    /// World-absolute column.
    #[must_use]
    pub const fn x(&self) -> i32 {
        self.x
    }

    /// World-absolute row; north is increasing `y`.
    #[must_use]
    pub const fn y(&self) -> i32 {
        self.y
    }

    /// Elevation layer the tile belongs to.
    #[must_use]
    pub const fn plane(&self) -> u8 {
        self.plane
    }

    /// Chebyshev step distance to `other`, ignoring the plane.
    #[must_use]
    pub fn distance_to(self, other: WorldPoint) -> u32 {
        self.x.abs_diff(other.x).max(self.y.abs_diff(other.y))
    }
}

/// Origin of the loaded scene together with the elevation plane in use.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SceneOrigin {
    base_x: i32,
    base_y: i32,
    plane: u8,
}

impl SceneOrigin {
    /// Creates a new scene origin.
    #[must_use]
    pub const fn new(base_x: i32, base_y: i32, plane: u8) -> Self {
        Self {
            base_x,
            base_y,
            plane,
        }
    }

    /// World column of the scene's local `x = 0`.
    #[must_use]
    pub const fn base_x(&self) -> i32 {
        self.base_x
    }

    /// World row of the scene's local `y = 0`.
    #[must_use]
    pub const fn base_y(&self) -> i32 {
        self.base_y
    }

    /// Elevation plane the scene is scanned on.
    #[must_use]
    pub const fn plane(&self) -> u8 {
        self.plane
    }

    /// Converts a world point into scene-local coordinates.
    #[must_use]
    pub fn to_local(&self, point: WorldPoint) -> PackedCoord {
        PackedCoord::encode(
            point.x().wrapping_sub(self.base_x),
            point.y().wrapping_sub(self.base_y),
        )
    }

    /// Converts scene-local coordinates back into a world point on this plane.
    #[must_use]
    pub fn to_world(&self, local: PackedCoord) -> WorldPoint {
        WorldPoint::new(
            self.base_x.wrapping_add(local.x()),
            self.base_y.wrapping_add(local.y()),
            self.plane,
        )
    }
}

/// Scene-local coordinate packed into a single integer key.
///
/// `x` occupies the high 32 bits and `y` the low 32 bits, both signed, so
/// negative offsets produced while a fill probes past the scene edge decode
/// back to the same values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackedCoord(i64);

impl PackedCoord {
    /// Packs a local coordinate pair.
    #[must_use]
    pub const fn encode(x: i32, y: i32) -> Self {
        Self(((x as i64) << 32) | (y as u32 as i64))
    }

    /// Local column.
    #[must_use]
    pub const fn x(self) -> i32 {
        (self.0 >> 32) as i32
    }

    /// Local row.
    #[must_use]
    pub const fn y(self) -> i32 {
        self.0 as i32
    }

    /// Neighbouring coordinate one step away in `direction`.
    #[must_use]
    pub const fn step(self, direction: Direction) -> Self {
        let (dx, dy) = direction.offset();
        Self::encode(self.x().wrapping_add(dx), self.y().wrapping_add(dy))
    }
}

/// Read-only view over one of the world's tile sets.
#[derive(Clone, Copy, Debug)]
pub struct TileSetView<'a> {
    tiles: &'a HashSet<WorldPoint>,
}

impl<'a> TileSetView<'a> {
    /// Captures a view over the provided set.
    #[must_use]
    pub fn new(tiles: &'a HashSet<WorldPoint>) -> Self {
        Self { tiles }
    }

    /// Reports whether the tile is a member of the set.
    #[must_use]
    pub fn contains(&self, tile: WorldPoint) -> bool {
        self.tiles.contains(&tile)
    }

    /// Number of tiles in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    /// Reports whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Iterator over the tiles in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = WorldPoint> + 'a {
        self.tiles.iter().copied()
    }

    /// Point-in-time copy of the set's contents.
    #[must_use]
    pub fn snapshot(&self) -> Vec<WorldPoint> {
        self.tiles.iter().copied().collect()
    }
}

/// Where and from which position reachability was last computed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScanTracker {
    /// Scene origin recorded by the most recent scan or invalidation.
    pub last_origin: Option<SceneOrigin>,
    /// Agent position the most recent scan within `last_origin` ran from.
    pub last_scan_position: Option<WorldPoint>,
}

/// Lifecycle states reported by the host environment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HostState {
    /// The agent is present in a fully loaded scene.
    LoggedIn,
    /// A new region is being loaded.
    Loading,
    /// The host is switching worlds.
    Hopping,
}

/// Per-tick notification delivered by the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TickFrame {
    /// Agent's world position, or `None` when no agent is present.
    pub position: Option<WorldPoint>,
    /// World column of the loaded scene's origin.
    pub base_x: i32,
    /// World row of the loaded scene's origin.
    pub base_y: i32,
}

impl TickFrame {
    /// Scene origin implied by the frame, using the agent's plane.
    #[must_use]
    pub fn origin(&self) -> Option<SceneOrigin> {
        self.position
            .map(|position| SceneOrigin::new(self.base_x, self.base_y, position.plane()))
    }
}

/// Commands that express all permissible world mutations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Adds tiles to the visited set.
    MarkVisited {
        /// Tiles the agent legitimately occupied this tick.
        tiles: Vec<WorldPoint>,
    },
    /// Replaces the visited set wholesale with data restored from storage.
    RestoreVisited {
        /// Tiles recovered from persistence.
        tiles: Vec<WorldPoint>,
    },
    /// Clears the visited set.
    ResetVisited,
    /// Drops all scene-scoped reachability data after the scene origin changed.
    InvalidateScene {
        /// Origin of the scene that is now loaded.
        origin: SceneOrigin,
    },
    /// Folds the results of a completed scan into the accumulated reachable set.
    MergeScan {
        /// Origin of the scene the scan ran in.
        origin: SceneOrigin,
        /// Agent position the scan started from.
        position: WorldPoint,
        /// World tiles found reachable by the scan.
        tiles: Vec<WorldPoint>,
    },
    /// Clears every set and the scan tracker at teardown.
    ClearAll,
}

/// Events reported by the world after processing commands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// Confirms that the visited set grew.
    TilesVisited {
        /// Number of tiles that were not previously visited.
        newly_visited: usize,
        /// Size of the visited set after the command.
        total: usize,
    },
    /// Confirms that persisted tiles replaced the visited set.
    VisitedRestored {
        /// Size of the restored set.
        total: usize,
    },
    /// Confirms that the visited set was cleared.
    VisitedReset,
    /// Confirms that scene-scoped reachability data was dropped.
    SceneInvalidated {
        /// Origin of the scene that is now loaded.
        origin: SceneOrigin,
    },
    /// Confirms that a scan was merged into the accumulated reachable set.
    ReachabilityMerged {
        /// Origin of the scene the scan ran in.
        origin: SceneOrigin,
        /// Number of tiles the scan added to the accumulated set.
        newly_reachable: usize,
        /// Size of the reachable set after the merge.
        total: usize,
    },
    /// Confirms that all state was cleared.
    StateCleared,
}

/// How the visit validator treats a report that jumps too far in one tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JumpPolicy {
    /// The destination is marked visited without any interpolated path.
    #[default]
    RecordDestination,
    /// The report is not marked visited.
    Reject,
}

/// Tunables for the per-tick visit validator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisitConfig {
    /// Largest step distance accepted between consecutive reports.
    pub max_movement_per_tick: u32,
    /// Upper bound on tiles marked visited by a single tick.
    pub max_tiles_per_tick: u32,
    /// Treatment of reports exceeding `max_movement_per_tick`.
    pub jump_policy: JumpPolicy,
}

impl Default for VisitConfig {
    fn default() -> Self {
        Self {
            max_movement_per_tick: 2,
            max_tiles_per_tick: 3,
            jump_policy: JumpPolicy::RecordDestination,
        }
    }
}

/// Tunables for the accumulation state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReachabilityConfig {
    /// Step distance from the last scan position that triggers a rescan.
    pub rescan_distance: u32,
}

impl Default for ReachabilityConfig {
    fn default() -> Self {
        Self {
            rescan_distance: 20,
        }
    }
}

/// Tunables for the periodic persistence flush.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutosaveConfig {
    /// Ticks with an agent present after which a save is attempted.
    pub interval_ticks: u32,
    /// Newly visited tiles after which a save is attempted.
    pub new_tile_threshold: usize,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            interval_ticks: 50,
            new_tile_threshold: 10,
        }
    }
}

/// Complete configuration of a tile collector session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Accumulation state machine settings.
    pub reachability: ReachabilityConfig,
    /// Visit validator settings.
    pub visitation: VisitConfig,
    /// Autosave policy settings.
    pub autosave: AutosaveConfig,
    /// Delay granted to the store after the final flush, in milliseconds.
    pub shutdown_grace_ms: u64,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            reachability: ReachabilityConfig::default(),
            visitation: VisitConfig::default(),
            autosave: AutosaveConfig::default(),
            shutdown_grace_ms: 50,
        }
    }
}

/// Failure reported by a key-value store backend.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The backend could not complete the operation.
    #[error("store backend failed: {0}")]
    Backend(String),
}

/// String key-value store scoped to the tile collector.
///
/// No transactions or atomic multi-key writes are assumed.
pub trait KeyValueStore {
    /// Reads the value stored under `key`.
    fn get(&self, key: &str) -> Option<String>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Removes the value stored under `key`, if any.
    fn unset(&mut self, key: &str) -> Result<(), StoreError>;
}
