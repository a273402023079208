#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Tile collector session that drives the per-tick pipeline.
//!
//! A session owns the authoritative world behind a shared lock, the
//! persistence vault, and the visitation and reachability systems. Each
//! tick validates the reported position, refreshes reachability when the
//! accumulation state machine asks for it, and autosaves on a tick or tile
//! budget. An [`EmergencyFlush`] handle lets a termination hook persist a
//! point-in-time snapshot from another thread without interleaving with
//! the tick-driven save sequence.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    thread,
    time::Duration,
};

use tile_collector_core::{
    CollectorConfig, Command, Event, HostState, KeyValueStore, SceneSnapshot, TickFrame,
    WorldPoint,
};
use tile_collector_system_persistence::{LoadOutcome, PersistError, SaveOutcome, Vault};
use tile_collector_system_reachability::{Observation, Reachability, RescanReason};
use tile_collector_system_visitation::{VisitReport, Visitation};
use tile_collector_world::{self as world, query, World};
use tracing::{debug, error, info};

/// Summary of a processed tick.
#[derive(Clone, Debug, PartialEq)]
pub struct TickReport {
    /// Position reported by the host for this tick.
    pub position: WorldPoint,
    /// Outcome of visit validation.
    pub visit: VisitReport,
    /// Why reachability was refreshed, if it was.
    pub rescan: Option<RescanReason>,
    /// Result of the autosave attempted this tick, if one was due.
    pub autosave: Option<Result<SaveOutcome, PersistError>>,
}

#[derive(Clone, Copy, Debug, Default)]
struct AutosaveTracker {
    ticks_since_save: u32,
    visited_at_last_save: usize,
}

/// Stateful tile collector bound to a key-value store.
pub struct TileCollector<S> {
    config: CollectorConfig,
    world: Arc<Mutex<World>>,
    vault: Arc<Vault<S>>,
    armed: Arc<AtomicBool>,
    visitation: Visitation,
    reachability: Reachability,
    autosave: AutosaveTracker,
    force_rescan: bool,
    running: bool,
}

impl<S: KeyValueStore> TileCollector<S> {
    /// Creates a stopped session persisting into `store`.
    #[must_use]
    pub fn new(config: CollectorConfig, store: S) -> Self {
        Self {
            config,
            world: Arc::new(Mutex::new(World::new())),
            vault: Arc::new(Vault::new(store)),
            armed: Arc::new(AtomicBool::new(false)),
            visitation: Visitation::new(config.visitation),
            reachability: Reachability::new(config.reachability),
            autosave: AutosaveTracker::default(),
            force_rescan: false,
            running: false,
        }
    }

    /// Loads the persisted visited set and scans the scene when an agent is present.
    ///
    /// Load failures are logged and treated as an empty store.
    pub fn start(
        &mut self,
        frame: Option<&TickFrame>,
        scene: Option<&dyn SceneSnapshot>,
    ) -> LoadOutcome {
        info!("tile collector starting");
        let outcome = self.vault.load().unwrap_or_else(|err| {
            error!(%err, "failed to load visited tiles");
            LoadOutcome::Empty
        });
        let tiles: Vec<WorldPoint> = outcome.clone().into_tiles().into_iter().collect();
        let restored = tiles.len();

        {
            let mut world = lock_world(&self.world);
            let mut commands = vec![Command::RestoreVisited { tiles }];
            apply_all(&mut world, &mut commands);

            if let Some(observation) = frame.and_then(observe) {
                let _ = self.reachability.handle(
                    query::scan_tracker(&world),
                    &observation.forced(),
                    scene,
                    &mut commands,
                );
                apply_all(&mut world, &mut commands);
            }
        }

        self.visitation.reset();
        self.autosave = AutosaveTracker {
            ticks_since_save: 0,
            visited_at_last_save: restored,
        };
        self.force_rescan = false;
        self.armed.store(true, Ordering::Release);
        self.running = true;
        info!(restored, "tile collector started");
        outcome
    }

    /// Runs the per-tick pipeline for `frame`.
    ///
    /// Returns `None` when the session is stopped or no agent is present;
    /// such ticks do not count towards the autosave interval.
    pub fn tick(
        &mut self,
        frame: &TickFrame,
        scene: Option<&dyn SceneSnapshot>,
    ) -> Option<TickReport> {
        if !self.running {
            return None;
        }
        let observation = observe(frame)?;
        let position = observation.position;
        self.autosave.ticks_since_save = self.autosave.ticks_since_save.saturating_add(1);

        let (visit, rescan, visited) = {
            let mut world = lock_world(&self.world);
            let mut commands = Vec::new();

            let visit = self
                .visitation
                .handle(position, query::reachable(&world), &mut commands);
            apply_all(&mut world, &mut commands);

            let mut observation = observation.with_gate_anomaly(visit.gate_anomaly);
            if std::mem::take(&mut self.force_rescan) {
                observation = observation.forced();
            }
            let rescan = self.reachability.handle(
                query::scan_tracker(&world),
                &observation,
                scene,
                &mut commands,
            );
            apply_all(&mut world, &mut commands);

            (visit, rescan, query::visited(&world).len())
        };

        let autosave = self
            .autosave_due(visited)
            .then(|| self.save_visited("autosave"));

        Some(TickReport {
            position,
            visit,
            rescan,
            autosave,
        })
    }

    /// Reacts to a host lifecycle transition.
    ///
    /// Returns the result of the save attempted before a region load or
    /// world hop, if any.
    pub fn on_host_state(
        &mut self,
        state: HostState,
    ) -> Option<Result<SaveOutcome, PersistError>> {
        if !self.running {
            return None;
        }

        match state {
            HostState::LoggedIn => {
                debug!("agent logged in, forcing rescan");
                self.force_rescan = true;
                None
            }
            HostState::Loading | HostState::Hopping => {
                debug!(?state, "saving before scene transition");
                Some(self.save_visited("scene transition"))
            }
        }
    }

    /// Clears the visited set and erases its persisted keys.
    pub fn reset_visited(&mut self) -> Result<(), PersistError> {
        {
            let mut world = lock_world(&self.world);
            let mut commands = vec![Command::ResetVisited];
            apply_all(&mut world, &mut commands);
        }
        self.autosave = AutosaveTracker::default();

        let result = self.vault.erase();
        match &result {
            Ok(()) => info!("visited tiles reset"),
            Err(err) => error!(%err, "failed to erase persisted tiles"),
        }
        result
    }

    /// Flushes the visited set and clears all in-memory state.
    ///
    /// Disarms outstanding [`EmergencyFlush`] handles first. After a
    /// successful write the store is granted the configured grace delay.
    pub fn stop(&mut self) -> Result<SaveOutcome, PersistError> {
        if !self.running {
            return Ok(SaveOutcome::Skipped);
        }

        info!("tile collector stopping");
        self.armed.store(false, Ordering::Release);
        let result = self.save_visited("shutdown");
        if matches!(result, Ok(SaveOutcome::Written { .. })) && self.config.shutdown_grace_ms > 0 {
            thread::sleep(Duration::from_millis(self.config.shutdown_grace_ms));
        }

        {
            let mut world = lock_world(&self.world);
            let mut commands = vec![Command::ClearAll];
            apply_all(&mut world, &mut commands);
        }
        self.visitation.reset();
        self.autosave = AutosaveTracker::default();
        self.force_rescan = false;
        self.running = false;
        info!("tile collector stopped");
        result
    }

    /// Handle that can persist the visited set from another thread.
    #[must_use]
    pub fn emergency_flush_handle(&self) -> EmergencyFlush<S> {
        EmergencyFlush {
            world: Arc::clone(&self.world),
            vault: Arc::clone(&self.vault),
            armed: Arc::clone(&self.armed),
        }
    }

    /// Reports whether the session has been started and not yet stopped.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.running
    }

    /// Configuration the session was created with.
    #[must_use]
    pub const fn config(&self) -> &CollectorConfig {
        &self.config
    }

    /// Runs `f` with a read-only view of the world.
    pub fn with_world<R>(&self, f: impl FnOnce(&World) -> R) -> R {
        f(&*lock_world(&self.world))
    }

    /// Share of walkable tiles that have been visited, as a percentage.
    #[must_use]
    pub fn exploration_percentage(&self) -> f64 {
        self.with_world(query::exploration_percentage)
    }

    /// Persistence vault backing the session.
    #[must_use]
    pub fn vault(&self) -> &Vault<S> {
        &self.vault
    }

    fn autosave_due(&self, visited: usize) -> bool {
        let new_tiles = visited.saturating_sub(self.autosave.visited_at_last_save);
        self.autosave.ticks_since_save >= self.config.autosave.interval_ticks
            || new_tiles >= self.config.autosave.new_tile_threshold
    }

    fn save_visited(&mut self, trigger: &'static str) -> Result<SaveOutcome, PersistError> {
        let snapshot = snapshot_visited(&self.world);
        let result = self.vault.save(&snapshot);
        match &result {
            Ok(outcome) => {
                debug!(trigger, ?outcome, "visited tiles flushed");
                self.autosave = AutosaveTracker {
                    ticks_since_save: 0,
                    visited_at_last_save: snapshot.len(),
                };
            }
            Err(err) => error!(%err, trigger, "failed to save visited tiles"),
        }
        result
    }
}

/// Cloneable handle that persists a snapshot of the visited set.
///
/// Intended for termination hooks that run outside the tick loop. The
/// snapshot is taken under the world lock, which is released before the
/// vault's write sequence begins.
pub struct EmergencyFlush<S> {
    world: Arc<Mutex<World>>,
    vault: Arc<Vault<S>>,
    armed: Arc<AtomicBool>,
}

impl<S> Clone for EmergencyFlush<S> {
    fn clone(&self) -> Self {
        Self {
            world: Arc::clone(&self.world),
            vault: Arc::clone(&self.vault),
            armed: Arc::clone(&self.armed),
        }
    }
}

impl<S: KeyValueStore> EmergencyFlush<S> {
    /// Persists the visited set unless the session has stopped cleanly.
    pub fn flush(&self) -> Result<SaveOutcome, PersistError> {
        if !self.armed.load(Ordering::Acquire) {
            debug!("emergency flush disarmed");
            return Ok(SaveOutcome::Skipped);
        }

        info!("emergency flush requested");
        let snapshot = snapshot_visited(&self.world);
        let result = self.vault.save(&snapshot);
        match &result {
            Ok(outcome) => info!(?outcome, "emergency flush completed"),
            Err(err) => error!(%err, "emergency flush failed"),
        }
        result
    }
}

fn observe(frame: &TickFrame) -> Option<Observation> {
    frame
        .position
        .map(|position| Observation::new(position, frame.base_x, frame.base_y))
}

fn lock_world(world: &Mutex<World>) -> MutexGuard<'_, World> {
    world.lock().unwrap_or_else(PoisonError::into_inner)
}

fn snapshot_visited(world: &Mutex<World>) -> Vec<WorldPoint> {
    query::visited(&lock_world(world)).snapshot()
}

fn apply_all(world: &mut World, commands: &mut Vec<Command>) {
    let mut events = Vec::new();
    for command in commands.drain(..) {
        world::apply(world, command, &mut events);
    }

    for event in events {
        match event {
            Event::ReachabilityMerged {
                origin,
                newly_reachable,
                total,
            } => debug!(?origin, newly_reachable, total, "reachability merged"),
            Event::SceneInvalidated { origin } => debug!(?origin, "scene invalidated"),
            _ => {}
        }
    }
}
