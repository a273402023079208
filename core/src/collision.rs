//! Directional collision model shared by the scanner and the flood fill.

use std::ops::BitOr;

/// Movement-blocking flags recorded for a single scene cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct CollisionFlags(u32);

impl CollisionFlags {
    /// No blocking flags set.
    pub const EMPTY: Self = Self(0);
    /// A solid object occupies the cell.
    pub const OBJECT: Self = Self(0x100);
    /// A blocking floor decoration occupies the cell.
    pub const FLOOR_DECORATION: Self = Self(0x40000);
    /// The floor itself cannot be stood on.
    pub const FLOOR: Self = Self(0x20_0000);
    /// Union of the occupancy flags; the cell is impassable from every side.
    pub const FULL_BLOCK: Self =
        Self(Self::OBJECT.0 | Self::FLOOR_DECORATION.0 | Self::FLOOR.0);
    /// Movement crossing the cell's northern edge is blocked.
    pub const NORTH: Self = Self(0x2);
    /// Movement crossing the cell's eastern edge is blocked.
    pub const EAST: Self = Self(0x8);
    /// Movement crossing the cell's southern edge is blocked.
    pub const SOUTH: Self = Self(0x20);
    /// Movement crossing the cell's western edge is blocked.
    pub const WEST: Self = Self(0x80);

    /// Reports whether any bit of `other` is set on these flags.
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Reports whether the cell is impassable regardless of direction.
    #[must_use]
    pub const fn is_full_block(self) -> bool {
        self.intersects(Self::FULL_BLOCK)
    }
}

impl BitOr for CollisionFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Cardinal travel directions in world space; north increases `y`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Travel toward increasing `y`.
    North,
    /// Travel toward increasing `x`.
    East,
    /// Travel toward decreasing `y`.
    South,
    /// Travel toward decreasing `x`.
    West,
}

impl Direction {
    /// All cardinal directions in expansion order.
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
    ];

    /// Coordinate delta applied when stepping in this direction.
    #[must_use]
    pub const fn offset(self) -> (i32, i32) {
        match self {
            Self::North => (0, 1),
            Self::East => (1, 0),
            Self::South => (0, -1),
            Self::West => (-1, 0),
        }
    }

    /// Direction pointing the other way.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::North => Self::South,
            Self::East => Self::West,
            Self::South => Self::North,
            Self::West => Self::East,
        }
    }
}

/// Flags that must be clear for a single cardinal step to be legal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EdgeRule {
    /// Direction of travel the rule applies to.
    pub direction: Direction,
    /// Flag checked on the cell being left.
    pub leave: CollisionFlags,
    /// Flag checked on the cell being entered.
    pub enter: CollisionFlags,
}

/// Pairing table: the source is checked with the travel direction's flag,
/// the destination with the flag of the side it is entered from.
pub const EDGE_RULES: [EdgeRule; 4] = [
    EdgeRule {
        direction: Direction::North,
        leave: CollisionFlags::NORTH,
        enter: CollisionFlags::SOUTH,
    },
    EdgeRule {
        direction: Direction::South,
        leave: CollisionFlags::SOUTH,
        enter: CollisionFlags::NORTH,
    },
    EdgeRule {
        direction: Direction::East,
        leave: CollisionFlags::EAST,
        enter: CollisionFlags::WEST,
    },
    EdgeRule {
        direction: Direction::West,
        leave: CollisionFlags::WEST,
        enter: CollisionFlags::EAST,
    },
];

impl EdgeRule {
    /// Looks up the rule governing travel in `direction`.
    #[must_use]
    pub const fn for_direction(direction: Direction) -> Self {
        match direction {
            Direction::North => EDGE_RULES[0],
            Direction::South => EDGE_RULES[1],
            Direction::East => EDGE_RULES[2],
            Direction::West => EDGE_RULES[3],
        }
    }

    /// Reports whether a mover may step from `source` into `destination`.
    #[must_use]
    pub const fn permits(&self, source: CollisionFlags, destination: CollisionFlags) -> bool {
        !source.intersects(self.leave)
            && !destination.is_full_block()
            && !destination.intersects(self.enter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_block_combines_occupancy_flags() {
        assert!(CollisionFlags::OBJECT.is_full_block());
        assert!(CollisionFlags::FLOOR_DECORATION.is_full_block());
        assert!(CollisionFlags::FLOOR.is_full_block());
        assert!(!(CollisionFlags::NORTH | CollisionFlags::WEST).is_full_block());
    }

    #[test]
    fn edge_rules_pair_leave_flag_with_opposite_enter_flag() {
        for direction in Direction::ALL {
            let rule = EdgeRule::for_direction(direction);
            assert_eq!(rule.direction, direction);
            let opposite = EdgeRule::for_direction(direction.opposite());
            assert_eq!(rule.leave, opposite.enter);
            assert_eq!(rule.enter, opposite.leave);
        }
    }

    #[test]
    fn northward_step_blocked_by_destination_south_flag_only() {
        let rule = EdgeRule::for_direction(Direction::North);

        assert!(rule.permits(CollisionFlags::EMPTY, CollisionFlags::EMPTY));
        assert!(!rule.permits(CollisionFlags::EMPTY, CollisionFlags::SOUTH));
        assert!(rule.permits(CollisionFlags::EMPTY, CollisionFlags::NORTH));
        assert!(!rule.permits(CollisionFlags::NORTH, CollisionFlags::EMPTY));
        assert!(rule.permits(CollisionFlags::SOUTH, CollisionFlags::EMPTY));
    }

    #[test]
    fn full_block_destination_is_never_entered() {
        for direction in Direction::ALL {
            let rule = EdgeRule::for_direction(direction);
            assert!(!rule.permits(CollisionFlags::EMPTY, CollisionFlags::OBJECT));
        }
    }
}
