#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Visit tracking system that validates per-tick position reports.
//!
//! Each report is compared with the one delivered on the previous tick.
//! Plausible reports are folded into the world's visited set together with
//! the cells along the straight line walked since the last report; reports
//! that jump too far or change plane are treated as potential spoofs.

use tile_collector_core::{Command, JumpPolicy, TileSetView, VisitConfig, WorldPoint};
use tracing::warn;

/// Reason a position report failed validation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Rejection {
    /// The report is on a different plane than the previous one.
    PlaneChanged,
    /// The report is further from the previous one than a single tick allows.
    Jump {
        /// Step distance between the two reports.
        distance: u32,
    },
}

/// Outcome of validating a single position report.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Verdict {
    /// The report was marked visited along with `interpolated` path cells.
    Recorded {
        /// Intermediate cells marked between the previous and current report.
        interpolated: usize,
    },
    /// The report failed validation but its destination was still recorded.
    Jumped {
        /// Why the report counts as a jump.
        reason: Rejection,
    },
    /// The report failed validation and nothing was marked.
    Rejected {
        /// Why the report was refused.
        reason: Rejection,
    },
}

/// Result of processing a position report.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VisitReport {
    /// Validation outcome.
    pub verdict: Verdict,
    /// The agent stands outside a non-empty reachable set and a rescan is due.
    pub gate_anomaly: bool,
}

#[derive(Clone, Copy, Debug)]
struct PreviousReport {
    position: WorldPoint,
    recorded: bool,
}

/// Pure system that converts position reports into visit commands.
#[derive(Debug, Default)]
pub struct Visitation {
    config: VisitConfig,
    previous: Option<PreviousReport>,
}

impl Visitation {
    /// Creates the system with the provided tunables.
    #[must_use]
    pub const fn new(config: VisitConfig) -> Self {
        Self {
            config,
            previous: None,
        }
    }

    /// Forgets the previous report so the next one is judged on its own.
    pub fn reset(&mut self) {
        self.previous = None;
    }

    /// Validates `position` against the previous report and emits visit commands.
    pub fn handle(
        &mut self,
        position: WorldPoint,
        reachable: TileSetView<'_>,
        out: &mut Vec<Command>,
    ) -> VisitReport {
        let gate_anomaly = !reachable.is_empty() && !reachable.contains(position);
        let verdict = self.validate(position, out);
        let recorded = !matches!(verdict, Verdict::Rejected { .. });
        self.previous = Some(PreviousReport { position, recorded });

        VisitReport {
            verdict,
            gate_anomaly,
        }
    }

    fn validate(&self, position: WorldPoint, out: &mut Vec<Command>) -> Verdict {
        let Some(previous) = self.previous else {
            out.push(Command::MarkVisited {
                tiles: vec![position],
            });
            return Verdict::Recorded { interpolated: 0 };
        };

        if let Some(reason) = self.rejection(previous.position, position) {
            warn!(
                ?reason,
                reported = ?position,
                previous = ?previous.position,
                "potential position spoof"
            );
            return match self.config.jump_policy {
                JumpPolicy::Reject => Verdict::Rejected { reason },
                JumpPolicy::RecordDestination => {
                    out.push(Command::MarkVisited {
                        tiles: vec![position],
                    });
                    Verdict::Jumped { reason }
                }
            };
        }

        let mut tiles = vec![position];
        if previous.recorded && previous.position != position {
            let limit = usize::try_from(self.config.max_tiles_per_tick)
                .unwrap_or(usize::MAX)
                .saturating_sub(1);
            tiles.extend(
                line_between(previous.position, position)
                    .take_while(|cell| *cell != position)
                    .take(limit),
            );
        }

        let interpolated = tiles.len() - 1;
        out.push(Command::MarkVisited { tiles });
        Verdict::Recorded { interpolated }
    }

    fn rejection(&self, previous: WorldPoint, current: WorldPoint) -> Option<Rejection> {
        if previous.plane() != current.plane() {
            return Some(Rejection::PlaneChanged);
        }

        let distance = previous.distance_to(current);
        (distance > self.config.max_movement_per_tick).then_some(Rejection::Jump { distance })
    }
}

/// Cells on the Bresenham line from `from` (exclusive) to `to` (inclusive).
///
/// Steps may be diagonal; the line only describes a plausible walked path.
/// Cells are produced lazily, so callers that need a prefix pay only for it.
#[must_use]
pub fn line_between(from: WorldPoint, to: WorldPoint) -> Line {
    let dx = (i64::from(to.x()) - i64::from(from.x())).abs();
    let dy = (i64::from(to.y()) - i64::from(from.y())).abs();
    Line {
        x: from.x(),
        y: from.y(),
        to,
        dx,
        dy,
        sx: if from.x() < to.x() { 1 } else { -1 },
        sy: if from.y() < to.y() { 1 } else { -1 },
        err: dx - dy,
    }
}

/// Iterator over the cells of a Bresenham line, see [`line_between`].
#[derive(Clone, Debug)]
pub struct Line {
    x: i32,
    y: i32,
    to: WorldPoint,
    dx: i64,
    dy: i64,
    sx: i32,
    sy: i32,
    err: i64,
}

impl Iterator for Line {
    type Item = WorldPoint;

    fn next(&mut self) -> Option<WorldPoint> {
        if (self.x, self.y) == (self.to.x(), self.to.y()) {
            return None;
        }

        let doubled = 2 * self.err;
        if doubled > -self.dy {
            self.err -= self.dy;
            self.x += self.sx;
        }
        if doubled < self.dx {
            self.err += self.dx;
            self.y += self.sy;
        }
        Some(WorldPoint::new(self.x, self.y, self.to.plane()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn straight_line_visits_every_cell() {
        let path: Vec<_> = line_between(WorldPoint::new(0, 0, 0), WorldPoint::new(0, 3, 0)).collect();
        assert_eq!(
            path,
            vec![
                WorldPoint::new(0, 1, 0),
                WorldPoint::new(0, 2, 0),
                WorldPoint::new(0, 3, 0),
            ]
        );
    }

    #[test]
    fn shallow_diagonal_steps_along_the_major_axis_first() {
        let path: Vec<_> = line_between(WorldPoint::new(0, 0, 1), WorldPoint::new(2, 1, 1)).collect();
        assert_eq!(path, vec![WorldPoint::new(1, 0, 1), WorldPoint::new(2, 1, 1)]);
    }

    #[test]
    fn pure_diagonal_moves_on_both_axes() {
        let path: Vec<_> = line_between(WorldPoint::new(5, 5, 0), WorldPoint::new(3, 3, 0)).collect();
        assert_eq!(path, vec![WorldPoint::new(4, 4, 0), WorldPoint::new(3, 3, 0)]);
    }

    #[test]
    fn identical_points_produce_no_path() {
        let point = WorldPoint::new(7, 7, 0);
        assert_eq!(line_between(point, point).next(), None);
    }

    #[test]
    fn long_lines_can_be_consumed_partially() {
        let mut line = line_between(WorldPoint::new(0, 0, 0), WorldPoint::new(i32::MAX - 1, 0, 0));

        assert_eq!(line.next(), Some(WorldPoint::new(1, 0, 0)));
        assert_eq!(line.next(), Some(WorldPoint::new(2, 0, 0)));
    }
}
