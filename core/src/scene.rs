//! Scene snapshot contracts consumed by the reachability scanner.

use crate::CollisionFlags;

/// Read-only view into one plane's collision-flag grid.
///
/// Cells are stored in row-major order with `y` selecting the row. Lookups
/// outside the grid report `None` so callers can treat them as absent.
#[derive(Clone, Copy, Debug)]
pub struct CollisionView<'a> {
    flags: &'a [CollisionFlags],
    width: u32,
    height: u32,
}

impl<'a> CollisionView<'a> {
    /// Captures a view over `flags` laid out as `width` columns by `height` rows.
    #[must_use]
    pub fn new(flags: &'a [CollisionFlags], width: u32, height: u32) -> Self {
        Self {
            flags,
            width,
            height,
        }
    }

    /// Flags recorded for the cell, if it lies within the grid.
    #[must_use]
    pub fn flags_at(&self, x: i32, y: i32) -> Option<CollisionFlags> {
        index(self.width, self.height, x, y).and_then(|offset| self.flags.get(offset).copied())
    }

    /// Dimensions of the grid as `(width, height)`.
    #[must_use]
    pub const fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Read-only view reporting which cells carry terrain geometry.
#[derive(Clone, Copy, Debug)]
pub struct TerrainView<'a> {
    present: &'a [bool],
    width: u32,
    height: u32,
}

impl<'a> TerrainView<'a> {
    /// Captures a view over `present` laid out as `width` columns by `height` rows.
    #[must_use]
    pub fn new(present: &'a [bool], width: u32, height: u32) -> Self {
        Self {
            present,
            width,
            height,
        }
    }

    /// Reports whether the cell has any terrain; cells outside the grid have none.
    #[must_use]
    pub fn has_terrain(&self, x: i32, y: i32) -> bool {
        index(self.width, self.height, x, y)
            .and_then(|offset| self.present.get(offset).copied())
            .unwrap_or(false)
    }

    /// Dimensions of the grid as `(width, height)`.
    #[must_use]
    pub const fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Host-provided snapshot of the loaded scene.
///
/// Either accessor may return `None` when the host has no data for the
/// plane (scene still loading, plane out of range); the scan is then
/// skipped for that tick.
pub trait SceneSnapshot {
    /// Collision flags for the requested elevation plane.
    fn collision(&self, plane: u8) -> Option<CollisionView<'_>>;

    /// Terrain presence for the requested elevation plane.
    fn terrain(&self, plane: u8) -> Option<TerrainView<'_>>;
}

/// Owned collision and terrain data for a single plane.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScenePlane {
    width: u32,
    height: u32,
    flags: Vec<CollisionFlags>,
    terrain: Vec<bool>,
}

impl ScenePlane {
    /// Creates a plane where every cell has terrain and no blocking flags.
    #[must_use]
    pub fn open(width: u32, height: u32) -> Self {
        let cell_count = usize::try_from(u64::from(width) * u64::from(height)).unwrap_or(0);
        Self {
            width,
            height,
            flags: vec![CollisionFlags::EMPTY; cell_count],
            terrain: vec![true; cell_count],
        }
    }

    /// Replaces the flags stored for a cell. Out-of-range cells are ignored.
    pub fn set_flags(&mut self, x: i32, y: i32, flags: CollisionFlags) {
        if let Some(slot) =
            index(self.width, self.height, x, y).and_then(|offset| self.flags.get_mut(offset))
        {
            *slot = flags;
        }
    }

    /// Adds flags to those already stored for a cell. Out-of-range cells are ignored.
    pub fn insert_flags(&mut self, x: i32, y: i32, flags: CollisionFlags) {
        if let Some(slot) =
            index(self.width, self.height, x, y).and_then(|offset| self.flags.get_mut(offset))
        {
            *slot = *slot | flags;
        }
    }

    /// Marks whether a cell carries terrain geometry. Out-of-range cells are ignored.
    pub fn set_terrain(&mut self, x: i32, y: i32, present: bool) {
        if let Some(slot) =
            index(self.width, self.height, x, y).and_then(|offset| self.terrain.get_mut(offset))
        {
            *slot = present;
        }
    }

    /// Dimensions of the plane as `(width, height)`.
    #[must_use]
    pub const fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Owned scene snapshot holding zero or more planes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SceneGrid {
    planes: Vec<Option<ScenePlane>>,
}

impl SceneGrid {
    /// Creates a scene without any loaded planes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `data` as the contents of `plane`, returning the updated scene.
    #[must_use]
    pub fn with_plane(mut self, plane: u8, data: ScenePlane) -> Self {
        let slot = usize::from(plane);
        if self.planes.len() <= slot {
            self.planes.resize(slot + 1, None);
        }
        self.planes[slot] = Some(data);
        self
    }

    fn plane(&self, plane: u8) -> Option<&ScenePlane> {
        self.planes.get(usize::from(plane)).and_then(Option::as_ref)
    }
}

impl SceneSnapshot for SceneGrid {
    fn collision(&self, plane: u8) -> Option<CollisionView<'_>> {
        self.plane(plane)
            .map(|data| CollisionView::new(&data.flags, data.width, data.height))
    }

    fn terrain(&self, plane: u8) -> Option<TerrainView<'_>> {
        self.plane(plane)
            .map(|data| TerrainView::new(&data.terrain, data.width, data.height))
    }
}

fn index(width: u32, height: u32, x: i32, y: i32) -> Option<usize> {
    let column = u32::try_from(x).ok()?;
    let row = u32::try_from(y).ok()?;
    if column >= width || row >= height {
        return None;
    }

    let column = usize::try_from(column).ok()?;
    let row = usize::try_from(row).ok()?;
    let width = usize::try_from(width).ok()?;
    row.checked_mul(width)?.checked_add(column)
}
