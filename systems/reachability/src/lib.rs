#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Reachability accumulation system.
//!
//! Decides when the reachable-tile set is stale, scans the loaded scene for
//! walkable cells, flood-fills from the agent's position, and asks the world
//! to fold the result into its accumulated set.

pub mod flood_fill;
pub mod scan;

use tile_collector_core::{
    Command, ReachabilityConfig, ScanTracker, SceneOrigin, SceneSnapshot, WorldPoint,
};
use tracing::debug;

/// Agent state observed on a tick, as seen by the accumulation state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Observation {
    /// Agent's current world position.
    pub position: WorldPoint,
    /// Scene origin the position was reported in.
    pub origin: SceneOrigin,
    /// Agent stands outside a non-empty reachable set.
    pub gate_anomaly: bool,
    /// Host requested a scan regardless of staleness.
    pub forced: bool,
}

impl Observation {
    /// Observation of `position` inside the scene rooted at `(base_x, base_y)`.
    #[must_use]
    pub const fn new(position: WorldPoint, base_x: i32, base_y: i32) -> Self {
        Self {
            position,
            origin: SceneOrigin::new(base_x, base_y, position.plane()),
            gate_anomaly: false,
            forced: false,
        }
    }

    /// Records whether the agent was found outside the reachable set.
    #[must_use]
    pub const fn with_gate_anomaly(mut self, gate_anomaly: bool) -> Self {
        self.gate_anomaly = gate_anomaly;
        self
    }

    /// Marks the observation as a forced rescan request.
    #[must_use]
    pub const fn forced(mut self) -> Self {
        self.forced = true;
        self
    }
}

/// Why the reachable set has to be recomputed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RescanReason {
    /// Scene origin or plane differs from the last recorded one.
    SceneChanged,
    /// The host asked for a scan.
    Forced,
    /// No scan has run in the current scene yet.
    FirstScan,
    /// The agent stands on a tile the accumulated set does not know about.
    GateAnomaly,
    /// The agent moved far from where the last scan ran.
    DistanceExceeded {
        /// Step distance from the last scan position.
        distance: u32,
    },
}

/// Transition function of the accumulation state machine.
///
/// Returns `None` when the accumulated reachable set is still current.
#[must_use]
pub fn rescan_reason(
    config: &ReachabilityConfig,
    tracker: ScanTracker,
    observation: &Observation,
) -> Option<RescanReason> {
    if tracker.last_origin != Some(observation.origin) {
        return Some(RescanReason::SceneChanged);
    }

    if observation.forced {
        return Some(RescanReason::Forced);
    }

    let Some(last_scan_position) = tracker.last_scan_position else {
        return Some(RescanReason::FirstScan);
    };

    if observation.gate_anomaly {
        return Some(RescanReason::GateAnomaly);
    }

    let distance = observation.position.distance_to(last_scan_position);
    (distance >= config.rescan_distance).then_some(RescanReason::DistanceExceeded { distance })
}

/// Scans `scene` on the origin's plane and flood-fills from `position`.
///
/// Returns `None` when the host has no collision or terrain data for the
/// plane, and an empty list when the agent stands off the walkable mesh.
#[must_use]
pub fn scan_reachable(
    scene: &dyn SceneSnapshot,
    origin: SceneOrigin,
    position: WorldPoint,
) -> Option<Vec<WorldPoint>> {
    let collision = scene.collision(origin.plane())?;
    let terrain = scene.terrain(origin.plane())?;

    let walkable = scan::walkable_coords(collision, terrain);
    let start = origin.to_local(position);
    let reachable = flood_fill::reachable_from(start, &walkable, collision);

    Some(
        reachable
            .into_iter()
            .map(|local| origin.to_world(local))
            .collect(),
    )
}

/// Pure system that keeps the world's reachable set current.
#[derive(Debug, Default)]
pub struct Reachability {
    config: ReachabilityConfig,
}

impl Reachability {
    /// Creates the system with the provided tunables.
    #[must_use]
    pub const fn new(config: ReachabilityConfig) -> Self {
        Self { config }
    }

    /// Evaluates the observation and emits the commands a rescan requires.
    ///
    /// A scene change always emits [`Command::InvalidateScene`] first, even
    /// when the scan itself has to be skipped because `scene` is missing.
    pub fn handle(
        &self,
        tracker: ScanTracker,
        observation: &Observation,
        scene: Option<&dyn SceneSnapshot>,
        out: &mut Vec<Command>,
    ) -> Option<RescanReason> {
        let reason = rescan_reason(&self.config, tracker, observation)?;
        debug!(?reason, position = ?observation.position, "reachability rescan");

        if reason == RescanReason::SceneChanged {
            out.push(Command::InvalidateScene {
                origin: observation.origin,
            });
        }

        let tiles = scene.and_then(|scene| {
            scan_reachable(scene, observation.origin, observation.position)
        });
        match tiles {
            Some(tiles) => out.push(Command::MergeScan {
                origin: observation.origin,
                position: observation.position,
                tiles,
            }),
            None => debug!(
                plane = observation.origin.plane(),
                "scene data unavailable, scan skipped"
            ),
        }

        Some(reason)
    }
}
