use std::collections::HashSet;

use tile_collector_core::{
    CollisionFlags, Command, Direction, EdgeRule, Event, PackedCoord, ReachabilityConfig,
    ScanTracker, SceneGrid, SceneOrigin, ScenePlane, SceneSnapshot, WorldPoint,
};
use tile_collector_system_reachability::{
    flood_fill::reachable_from, rescan_reason, scan::walkable_coords, scan_reachable,
    Observation, Reachability, RescanReason,
};
use tile_collector_world::{self as world, query, World};

fn fill(scene: &SceneGrid, start: (i32, i32)) -> HashSet<PackedCoord> {
    let collision = scene.collision(0).expect("collision");
    let walkable = walkable_coords(collision, scene.terrain(0).expect("terrain"));
    reachable_from(PackedCoord::encode(start.0, start.1), &walkable, collision)
}

fn coords(points: &[(i32, i32)]) -> HashSet<PackedCoord> {
    points
        .iter()
        .map(|&(x, y)| PackedCoord::encode(x, y))
        .collect()
}

#[test]
fn open_four_by_four_scene_is_fully_reachable() {
    let scene = SceneGrid::new().with_plane(0, ScenePlane::open(4, 4));

    let reachable = fill(&scene, (1, 1));

    assert_eq!(reachable.len(), 16);
}

#[test]
fn fully_blocked_cell_is_routed_around() {
    let mut plane = ScenePlane::open(4, 4);
    plane.set_flags(2, 1, CollisionFlags::OBJECT);
    let scene = SceneGrid::new().with_plane(0, plane);

    let reachable = fill(&scene, (1, 1));

    assert_eq!(reachable.len(), 15);
    assert!(!reachable.contains(&PackedCoord::encode(2, 1)));
    assert!(reachable.contains(&PackedCoord::encode(3, 1)));
}

#[test]
fn blocked_column_with_single_gap_only_connects_through_the_gap() {
    let mut plane = ScenePlane::open(4, 4);
    for y in [1, 2, 3] {
        plane.set_flags(2, y, CollisionFlags::FLOOR_DECORATION);
    }
    let scene = SceneGrid::new().with_plane(0, plane);

    let reachable = fill(&scene, (1, 1));
    assert_eq!(reachable.len(), 13);

    let mut sealed = ScenePlane::open(4, 4);
    for y in 0..4 {
        sealed.set_flags(2, y, CollisionFlags::FLOOR_DECORATION);
    }
    let sealed_scene = SceneGrid::new().with_plane(0, sealed);
    let reachable = fill(&sealed_scene, (1, 1));
    assert_eq!(reachable.len(), 8);
    assert!(!reachable.contains(&PackedCoord::encode(3, 1)));
}

#[test]
fn destination_entry_flag_blocks_northward_step() {
    let mut plane = ScenePlane::open(1, 3);
    plane.set_flags(0, 1, CollisionFlags::SOUTH);
    let scene = SceneGrid::new().with_plane(0, plane);

    assert_eq!(fill(&scene, (0, 0)), coords(&[(0, 0)]));
    assert_eq!(fill(&scene, (0, 1)), coords(&[(0, 1), (0, 2)]));
    assert_eq!(fill(&scene, (0, 2)), coords(&[(0, 1), (0, 2)]));
}

#[test]
fn source_leave_flag_blocks_the_matching_direction_only() {
    let mut plane = ScenePlane::open(3, 1);
    plane.set_flags(1, 0, CollisionFlags::EAST);
    let scene = SceneGrid::new().with_plane(0, plane);

    assert_eq!(fill(&scene, (1, 0)), coords(&[(0, 0), (1, 0)]));
    assert_eq!(fill(&scene, (2, 0)), coords(&[(2, 0)]));
    assert_eq!(fill(&scene, (0, 0)), coords(&[(0, 0), (1, 0)]));
}

#[test]
fn off_mesh_start_yields_nothing() {
    let mut plane = ScenePlane::open(3, 3);
    plane.set_terrain(1, 1, false);
    let scene = SceneGrid::new().with_plane(0, plane);

    assert!(fill(&scene, (1, 1)).is_empty());
    assert!(fill(&scene, (-1, 0)).is_empty());
    assert!(fill(&scene, (7, 7)).is_empty());
}

#[test]
fn flood_fill_matches_fixed_point_connectivity() {
    const SIZE: i32 = 12;
    const FLAG_CHOICES: [CollisionFlags; 6] = [
        CollisionFlags::EMPTY,
        CollisionFlags::OBJECT,
        CollisionFlags::NORTH,
        CollisionFlags::EAST,
        CollisionFlags::SOUTH,
        CollisionFlags::WEST,
    ];

    let mut state: u64 = 0x9e37_79b9_7f4a_7c15;
    for _ in 0..8 {
        let mut plane = ScenePlane::open(SIZE as u32, SIZE as u32);
        for x in 0..SIZE {
            for y in 0..SIZE {
                state = state
                    .wrapping_mul(6_364_136_223_846_793_005)
                    .wrapping_add(1_442_695_040_888_963_407);
                let roll = (state >> 33) % 10;
                let choice = usize::try_from(roll).expect("small roll");
                if let Some(flags) = FLAG_CHOICES.get(choice) {
                    plane.set_flags(x, y, *flags);
                }
            }
        }
        plane.set_flags(SIZE / 2, SIZE / 2, CollisionFlags::EMPTY);
        let scene = SceneGrid::new().with_plane(0, plane);
        let collision = scene.collision(0).expect("collision");
        let walkable = walkable_coords(collision, scene.terrain(0).expect("terrain"));
        let start = PackedCoord::encode(SIZE / 2, SIZE / 2);

        let mut expected = HashSet::from([start]);
        loop {
            let mut grown = expected.clone();
            for cell in &expected {
                for direction in Direction::ALL {
                    let neighbor = cell.step(direction);
                    if !walkable.contains(&neighbor) {
                        continue;
                    }
                    let from = collision.flags_at(cell.x(), cell.y()).expect("in grid");
                    let to = collision.flags_at(neighbor.x(), neighbor.y()).expect("in grid");
                    if EdgeRule::for_direction(direction).permits(from, to) {
                        let _ = grown.insert(neighbor);
                    }
                }
            }
            if grown.len() == expected.len() {
                break;
            }
            expected = grown;
        }

        assert_eq!(reachable_from(start, &walkable, collision), expected);
    }
}

#[test]
fn scan_reachable_converts_to_world_points_on_the_origin_plane() {
    let scene = SceneGrid::new().with_plane(1, ScenePlane::open(2, 2));
    let origin = SceneOrigin::new(3200, 3100, 1);

    let mut tiles = scan_reachable(&scene, origin, WorldPoint::new(3201, 3101, 1))
        .expect("plane 1 loaded");
    tiles.sort();

    assert_eq!(
        tiles,
        vec![
            WorldPoint::new(3200, 3100, 1),
            WorldPoint::new(3200, 3101, 1),
            WorldPoint::new(3201, 3100, 1),
            WorldPoint::new(3201, 3101, 1),
        ]
    );

    let unloaded = SceneOrigin::new(3200, 3100, 0);
    assert!(scan_reachable(&scene, unloaded, WorldPoint::new(3201, 3101, 0)).is_none());
}

#[test]
fn rescan_of_unchanged_scene_is_idempotent() {
    let mut plane = ScenePlane::open(6, 6);
    plane.set_flags(3, 3, CollisionFlags::OBJECT);
    let scene = SceneGrid::new().with_plane(0, plane);
    let origin = SceneOrigin::new(0, 0, 0);
    let position = WorldPoint::new(1, 1, 0);

    let first = scan_reachable(&scene, origin, position).expect("scene loaded");
    let second = scan_reachable(&scene, origin, position).expect("scene loaded");
    assert_eq!(
        first.iter().collect::<HashSet<_>>(),
        second.iter().collect::<HashSet<_>>()
    );

    let mut world = World::new();
    let mut events = Vec::new();
    for tiles in [first, second] {
        world::apply(
            &mut world,
            Command::MergeScan {
                origin,
                position,
                tiles,
            },
            &mut events,
        );
    }

    assert_eq!(
        events.last(),
        Some(&Event::ReachabilityMerged {
            origin,
            newly_reachable: 0,
            total: 35,
        })
    );
}

#[test]
fn transition_prioritises_scene_change() {
    let config = ReachabilityConfig::default();
    let position = WorldPoint::new(10, 10, 0);
    let observation = Observation::new(position, 0, 0).with_gate_anomaly(true);

    assert_eq!(
        rescan_reason(&config, ScanTracker::default(), &observation),
        Some(RescanReason::SceneChanged)
    );

    let moved_scene = ScanTracker {
        last_origin: Some(SceneOrigin::new(8, 0, 0)),
        last_scan_position: Some(position),
    };
    assert_eq!(
        rescan_reason(&config, moved_scene, &observation),
        Some(RescanReason::SceneChanged)
    );

    let other_plane = ScanTracker {
        last_origin: Some(SceneOrigin::new(0, 0, 1)),
        last_scan_position: Some(position),
    };
    assert_eq!(
        rescan_reason(&config, other_plane, &observation),
        Some(RescanReason::SceneChanged)
    );
}

#[test]
fn transition_covers_first_scan_gate_and_distance() {
    let config = ReachabilityConfig::default();
    let origin = SceneOrigin::new(0, 0, 0);
    let scanned_from = WorldPoint::new(10, 10, 0);
    let tracker = ScanTracker {
        last_origin: Some(origin),
        last_scan_position: Some(scanned_from),
    };

    let unscanned = ScanTracker {
        last_origin: Some(origin),
        last_scan_position: None,
    };
    assert_eq!(
        rescan_reason(&config, unscanned, &Observation::new(scanned_from, 0, 0)),
        Some(RescanReason::FirstScan)
    );

    assert_eq!(
        rescan_reason(&config, tracker, &Observation::new(WorldPoint::new(29, 10, 0), 0, 0)),
        None
    );
    assert_eq!(
        rescan_reason(&config, tracker, &Observation::new(WorldPoint::new(30, 12, 0), 0, 0)),
        Some(RescanReason::DistanceExceeded { distance: 20 })
    );
    assert_eq!(
        rescan_reason(
            &config,
            tracker,
            &Observation::new(WorldPoint::new(11, 10, 0), 0, 0).with_gate_anomaly(true)
        ),
        Some(RescanReason::GateAnomaly)
    );
    assert_eq!(
        rescan_reason(&config, tracker, &Observation::new(scanned_from, 0, 0).forced()),
        Some(RescanReason::Forced)
    );

    let tight = ReachabilityConfig { rescan_distance: 3 };
    assert_eq!(
        rescan_reason(&tight, tracker, &Observation::new(WorldPoint::new(13, 10, 0), 0, 0)),
        Some(RescanReason::DistanceExceeded { distance: 3 })
    );
}

#[test]
fn scene_change_invalidates_before_merging() {
    let system = Reachability::default();
    let scene = SceneGrid::new().with_plane(0, ScenePlane::open(3, 3));
    let position = WorldPoint::new(101, 101, 0);
    let observation = Observation::new(position, 100, 100);
    let mut commands = Vec::new();

    let reason = system.handle(
        ScanTracker::default(),
        &observation,
        Some(&scene),
        &mut commands,
    );

    assert_eq!(reason, Some(RescanReason::SceneChanged));
    assert_eq!(commands.len(), 2);
    assert_eq!(
        commands[0],
        Command::InvalidateScene {
            origin: SceneOrigin::new(100, 100, 0),
        }
    );
    assert!(matches!(
        &commands[1],
        Command::MergeScan { tiles, position: scanned, .. }
            if tiles.len() == 9 && *scanned == position
    ));
}

#[test]
fn missing_scene_data_skips_the_scan_but_still_invalidates() {
    let system = Reachability::default();
    let observation = Observation::new(WorldPoint::new(5, 5, 2), 0, 0);
    let scene = SceneGrid::new().with_plane(0, ScenePlane::open(8, 8));
    let mut commands = Vec::new();

    let reason = system.handle(ScanTracker::default(), &observation, None, &mut commands);
    assert_eq!(reason, Some(RescanReason::SceneChanged));
    assert_eq!(
        commands,
        vec![Command::InvalidateScene {
            origin: SceneOrigin::new(0, 0, 2),
        }]
    );

    let mut world = World::new();
    let mut events = Vec::new();
    for command in commands.drain(..) {
        world::apply(&mut world, command, &mut events);
    }

    let reason = system.handle(
        query::scan_tracker(&world),
        &observation,
        Some(&scene),
        &mut commands,
    );
    assert_eq!(reason, Some(RescanReason::FirstScan));
    assert!(commands.is_empty());
}

#[test]
fn accumulation_grows_monotonically_across_scans_in_one_scene() {
    let system = Reachability::new(ReachabilityConfig { rescan_distance: 2 });
    let mut plane = ScenePlane::open(5, 1);
    plane.set_flags(2, 0, CollisionFlags::EAST);
    let scene = SceneGrid::new().with_plane(0, plane);
    let mut world = World::new();
    let mut sizes = Vec::new();

    for x in [0, 4] {
        let observation = Observation::new(WorldPoint::new(x, 0, 0), 0, 0);
        let mut commands = Vec::new();
        let _ = system.handle(
            query::scan_tracker(&world),
            &observation,
            Some(&scene),
            &mut commands,
        );
        let mut events = Vec::new();
        for command in commands {
            world::apply(&mut world, command, &mut events);
        }
        sizes.push(query::reachable(&world).len());
    }

    assert_eq!(sizes, vec![3, 5]);
}
