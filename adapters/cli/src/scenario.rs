//! Recorded sessions replayed through the collector.
//!
//! A scenario pins one scene origin and plane, draws the scene's collision
//! grid as text rows, and lists what the host reported on each tick.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tile_collector_core::{
    CollisionFlags, HostState, SceneGrid, ScenePlane, TickFrame, WorldPoint,
};

/// Scene and tick script loaded from TOML.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct Scenario {
    /// World column of the scene origin.
    pub base_x: i32,
    /// World row of the scene origin.
    pub base_y: i32,
    /// Plane every reported position lies on.
    #[serde(default)]
    pub plane: u8,
    /// Collision rows, northmost first.
    pub rows: Vec<String>,
    /// Host reports in tick order.
    #[serde(default)]
    pub ticks: Vec<ScenarioTick>,
}

/// One tick worth of host reports.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ScenarioTick {
    /// Agent position as `[x, y]`; absent when no agent is present.
    #[serde(default)]
    pub at: Option<[i32; 2]>,
    /// Lifecycle transition reported before the tick runs.
    #[serde(default)]
    pub host: Option<HostEvent>,
}

/// Serialisable mirror of [`HostState`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum HostEvent {
    LoggedIn,
    Loading,
    Hopping,
}

impl From<HostEvent> for HostState {
    fn from(event: HostEvent) -> Self {
        match event {
            HostEvent::LoggedIn => Self::LoggedIn,
            HostEvent::Loading => Self::Loading,
            HostEvent::Hopping => Self::Hopping,
        }
    }
}

impl Scenario {
    /// Parses a scenario from TOML text.
    pub(crate) fn from_toml(contents: &str) -> Result<Self> {
        let scenario: Self = toml::from_str(contents).context("failed to parse scenario toml")?;
        if scenario.rows.is_empty() {
            bail!("scenario must describe at least one scene row");
        }
        Ok(scenario)
    }

    /// Builds the scene snapshot drawn by `rows`.
    ///
    /// `.` is open ground, `#` is fully blocked, a space has no terrain, and
    /// `^`, `>`, `v`, `<` set the north, east, south, or west flag.
    pub(crate) fn scene(&self) -> Result<SceneGrid> {
        let height = self.rows.len();
        let width = self
            .rows
            .iter()
            .map(|row| row.chars().count())
            .max()
            .unwrap_or(0);
        let mut plane = ScenePlane::open(
            u32::try_from(width).context("scene too wide")?,
            u32::try_from(height).context("scene too tall")?,
        );

        for (row_index, row) in self.rows.iter().enumerate() {
            let y = i32::try_from(height - 1 - row_index).context("scene too tall")?;
            let mut cells = row.chars();
            for x in 0..width {
                let x_local = i32::try_from(x).context("scene too wide")?;
                let Some(cell) = cells.next() else {
                    plane.set_terrain(x_local, y, false);
                    continue;
                };
                match cell {
                    '.' => {}
                    ' ' => plane.set_terrain(x_local, y, false),
                    '#' => plane.set_flags(x_local, y, CollisionFlags::OBJECT),
                    '^' => plane.set_flags(x_local, y, CollisionFlags::NORTH),
                    '>' => plane.set_flags(x_local, y, CollisionFlags::EAST),
                    'v' => plane.set_flags(x_local, y, CollisionFlags::SOUTH),
                    '<' => plane.set_flags(x_local, y, CollisionFlags::WEST),
                    other => bail!("unknown scene cell `{other}` in row {row_index}"),
                }
            }
        }

        Ok(SceneGrid::new().with_plane(self.plane, plane))
    }

    /// Frame delivered by the host for `tick`.
    pub(crate) fn frame(&self, tick: &ScenarioTick) -> TickFrame {
        TickFrame {
            position: tick
                .at
                .map(|[x, y]| WorldPoint::new(x, y, self.plane)),
            base_x: self.base_x,
            base_y: self.base_y,
        }
    }
}
