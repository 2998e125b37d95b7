use bevy::math::Vec3;
use ordered_float::OrderedFloat;
use pathfinding::prelude::dijkstra;
use pursuit::ai::perception::TargetView;
use pursuit::ai::steering::{self, Pose};
use pursuit::ai::tuning::{NoPathFallback, PursuitTuning};
use pursuit::ai::{AgentState, PursuitAgent, TickContext, TickOutput};
use pursuit::error::NavError;
use pursuit::nav::{
    BoxGeometry, FloorSampler, FloorScanConfig, NavGraph, NodeHandle, PathFinder, SearchStrategy,
    SpawnRules, SpawnSampler,
};
use pursuit::plugins::level::LevelBlueprint;
use rand::SeedableRng;
use rand::rngs::StdRng;

const ARENA: &str = include_str!("../assets/levels/arena.txt");

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// One floor slab covering `size` x `size` cells, top face at y = 0.
fn open_floor(size: u32) -> BoxGeometry {
    let half = size as f32 / 2.0;
    let mut geometry = BoxGeometry::new();
    geometry.add_box(
        Vec3::new(half, -0.1, half),
        Vec3::new(half, 0.1, half),
        "Floor",
        0,
    );
    geometry
}

fn square_sampler(size: u32) -> FloorSampler {
    FloorSampler::new(FloorScanConfig {
        width: size,
        height: size,
        ..Default::default()
    })
    .unwrap()
}

fn arena() -> (LevelBlueprint, NavGraph) {
    let blueprint = LevelBlueprint::parse(ARENA, 1.0).unwrap();
    let geometry = blueprint.build_geometry();
    let sampler = FloorSampler::new(blueprint.scan_config(Default::default())).unwrap();
    let graph = sampler.build(&geometry, 0).unwrap();
    (blueprint, graph)
}

/// Reference shortest-path cost over the same edges.
fn oracle_cost(graph: &NavGraph, start: NodeHandle, goal: NodeHandle) -> Option<f32> {
    dijkstra(
        &start,
        |h| {
            let from = graph.position(*h).unwrap();
            graph
                .neighbors(*h)
                .iter()
                .map(|n| (*n, OrderedFloat(from.distance(graph.position(*n).unwrap()))))
                .collect::<Vec<_>>()
        },
        |h| *h == goal,
    )
    .map(|(_, cost)| cost.0)
}

/// Tick the agent and move it with the reference mover.
fn step(
    agent: &mut PursuitAgent,
    pose: &mut Pose,
    target: &TargetView,
    ctx: &TickContext<'_, BoxGeometry>,
    dt: f32,
) -> TickOutput {
    let out = agent.tick(dt, pose, Some(target), ctx);
    *pose = steering::apply(*pose, &out.steering, agent.tuning.turn_rate, dt);
    out
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn sampled_floor_chase_ends_in_attack() {
    let geometry = open_floor(5);
    let graph = square_sampler(5).build(&geometry, 0).unwrap();
    assert_eq!(graph.valid_count(), 25);

    let ctx = TickContext {
        graph: &graph,
        geometry: &geometry,
    };
    let mut agent = PursuitAgent::new(PursuitTuning::default(), Vec3::new(0.5, 0.0, 0.5));
    let mut pose = Pose::new(Vec3::new(0.5, 0.0, 0.5), Vec3::X);
    let target = TargetView::at(Vec3::new(4.5, 0.0, 4.5));

    let mut states = Vec::new();
    let mut strikes = 0;
    for _ in 0..400 {
        let out = step(&mut agent, &mut pose, &target, &ctx, 0.05);
        if states.last() != Some(&out.state) {
            states.push(out.state);
        }
        if out.damage.is_some() {
            strikes += 1;
        }
        if out.state == AgentState::Attack {
            break;
        }
    }

    assert_eq!(states, vec![AgentState::Chase, AgentState::Attack]);
    assert_eq!(strikes, 1, "first strike lands on entering attack");
    assert!(pose.position.distance(target.position) <= agent.tuning.attack_radius + 1e-3);
}

#[test]
fn wall_between_agent_and_target_blocks_the_strike() {
    let mut geometry = open_floor(5);
    geometry.add_box(
        Vec3::new(1.2, 1.0, 2.5),
        Vec3::new(0.05, 1.0, 0.5),
        "Wall",
        1,
    );
    let graph = square_sampler(5).build(&geometry, 0).unwrap();
    let ctx = TickContext {
        graph: &graph,
        geometry: &geometry,
    };
    let mut agent = PursuitAgent::new(PursuitTuning::default(), Vec3::ZERO);
    let pose = Pose::new(Vec3::new(0.5, 0.0, 2.5), Vec3::X);
    let target = TargetView::at(Vec3::new(1.9, 0.0, 2.5));

    for _ in 0..20 {
        let out = agent.tick(0.1, &pose, Some(&target), &ctx);
        assert_eq!(out.state, AgentState::Chase);
        assert_eq!(out.damage, None);
    }
}

#[test]
fn level_without_floor_yields_empty_graph() {
    let mut geometry = BoxGeometry::new();
    geometry.add_box(Vec3::new(2.5, 1.0, 2.5), Vec3::new(2.5, 1.0, 2.5), "Wall", 1);
    let sampler = square_sampler(5);

    let err = sampler.build(&geometry, 0).unwrap_err();
    assert!(matches!(err, NavError::EmptyGraph { scanned: 25 }));

    let (graph, report) = sampler.scan(&geometry, 0);
    assert_eq!(report.valid, 0);
    assert_eq!(graph.valid_count(), 0);
    let mut rng = StdRng::seed_from_u64(3);
    assert_eq!(graph.random_valid_position(&mut rng, 1.0), None);
    let mut spawns = SpawnSampler::new(&graph, SpawnRules::default());
    assert_eq!(spawns.sample(&mut rng, 0.0, None), None);

    // An agent on an empty graph still perceives, but holds or seeks directly.
    let ctx = TickContext {
        graph: &graph,
        geometry: &BoxGeometry::new(),
    };
    let pose = Pose::new(Vec3::ZERO, Vec3::Z);
    let target = TargetView::at(Vec3::new(0.0, 0.0, 5.0));

    let mut holder = PursuitAgent::new(PursuitTuning::default(), Vec3::ZERO);
    let out = holder.tick(0.1, &pose, Some(&target), &ctx);
    assert_eq!(out.state, AgentState::Chase);
    assert!(!out.steering.is_moving());

    let tuning = PursuitTuning {
        fallback: NoPathFallback::DirectSeek,
        ..Default::default()
    };
    let mut seeker = PursuitAgent::new(tuning, Vec3::ZERO);
    let out = seeker.tick(0.1, &pose, Some(&target), &ctx);
    assert_eq!(out.steering.destination, Some(target.position));
}

#[test]
fn strikes_respect_the_cooldown() {
    let geometry = open_floor(5);
    let graph = square_sampler(5).build(&geometry, 0).unwrap();
    let ctx = TickContext {
        graph: &graph,
        geometry: &geometry,
    };
    let mut agent = PursuitAgent::new(PursuitTuning::default(), Vec3::ZERO);
    let pose = Pose::new(Vec3::new(2.5, 0.0, 1.5), Vec3::Z);
    let target = TargetView::at(Vec3::new(2.5, 0.0, 2.5));

    let dt = 1.0 / 64.0;
    let mut strikes = 0;
    for _ in 0..(7 * 64) {
        let out = agent.tick(dt, &pose, Some(&target), &ctx);
        assert_eq!(out.state, AgentState::Attack);
        if let Some(amount) = out.damage {
            assert_eq!(amount, 20);
            strikes += 1;
        }
    }
    // t = 0, 2, 4 and 6 seconds.
    assert_eq!(strikes, 4);
}

#[test]
fn arena_adjacency_is_symmetric_and_cardinal() {
    let (blueprint, graph) = arena();
    assert!(graph.valid_count() > 0);

    for (handle, node) in graph.walkable_nodes() {
        let (x, z) = graph.cell_of(handle).unwrap();
        assert!(blueprint.tile(x, z).unwrap().has_floor());
        for neighbor in node.neighbors() {
            assert!(
                graph.neighbors(*neighbor).contains(&handle),
                "edge {:?} -> {:?} has no reverse",
                handle,
                neighbor
            );
            let (nx, nz) = graph.cell_of(*neighbor).unwrap();
            assert_eq!(x.abs_diff(nx) + z.abs_diff(nz), 1);
        }
    }
}

#[test]
fn paths_are_valid_and_shortest() {
    let (blueprint, graph) = arena();
    let mut starts = vec![blueprint.target_spawn];
    starts.extend(blueprint.enemy_spawns.iter().copied());

    let finders = [
        PathFinder::new(SearchStrategy::LinearScan),
        PathFinder::new(SearchStrategy::BinaryHeap),
        PathFinder::new(SearchStrategy::AStar),
    ];
    let goals: Vec<NodeHandle> = graph.walkable_nodes().map(|(h, _)| h).collect();

    for (sx, sz) in starts {
        let start = graph.handle_at(sx, sz).unwrap();
        for goal in &goals {
            let expected = oracle_cost(&graph, start, *goal);
            for finder in &finders {
                let path = finder.find_path(&graph, start, *goal);
                match expected {
                    None => assert!(path.is_empty(), "{:?} found a path to an island", finder),
                    Some(cost) => {
                        assert_eq!(path.nodes().first(), Some(&start));
                        assert_eq!(path.nodes().last(), Some(goal));
                        for pair in path.nodes().windows(2) {
                            assert!(graph.neighbors(pair[0]).contains(&pair[1]));
                        }
                        assert!(
                            (path.length() - cost).abs() < 1e-3,
                            "{:?}: length {} vs optimal {}",
                            finder,
                            path.length(),
                            cost
                        );
                    }
                }
            }
        }
    }
}

#[test]
fn walled_off_goal_has_no_path() {
    let blueprint = LevelBlueprint::parse("P.#.G", 1.0).unwrap();
    let geometry = blueprint.build_geometry();
    let sampler = FloorSampler::new(blueprint.scan_config(Default::default())).unwrap();
    let graph = sampler.build(&geometry, 0).unwrap();
    assert_eq!(graph.valid_count(), 4);

    let start = graph.handle_at(0, 0).unwrap();
    let goal = graph.handle_at(4, 0).unwrap();
    for strategy in [
        SearchStrategy::LinearScan,
        SearchStrategy::BinaryHeap,
        SearchStrategy::AStar,
    ] {
        assert!(PathFinder::new(strategy).find_path(&graph, start, goal).is_empty());
    }
}

#[test]
fn identical_inputs_give_identical_runs() {
    let (_, graph) = arena();
    let geometry = LevelBlueprint::parse(ARENA, 1.0).unwrap().build_geometry();
    let ctx = TickContext {
        graph: &graph,
        geometry: &geometry,
    };

    let run = || {
        let start = Vec3::new(13.5, 0.0, 1.5);
        let mut agent = PursuitAgent::new(PursuitTuning::default(), start);
        let mut pose = Pose::new(start, Vec3::NEG_Z);
        let target = TargetView::at(Vec3::new(9.5, 0.0, 3.5));
        (0..200)
            .map(|_| step(&mut agent, &mut pose, &target, &ctx, 1.0 / 64.0))
            .collect::<Vec<_>>()
    };
    assert_eq!(run(), run());

    let scatter = |seed| {
        let mut rng = StdRng::seed_from_u64(seed);
        SpawnSampler::new(&graph, SpawnRules::default())
            .scatter(&mut rng, 4, 0.0, None)
            .placed
    };
    assert_eq!(scatter(11), scatter(11));
}

#[test]
fn scattered_spawns_stay_on_the_floor() {
    let (blueprint, graph) = arena();
    let (px, pz) = blueprint.target_spawn;
    let avoid = blueprint.floor_point(px, pz);
    let rules = SpawnRules {
        min_separation: 2.0,
        min_distance_from_avoid: 4.0,
        ..Default::default()
    };
    let mut rng = StdRng::seed_from_u64(5);
    let mut sampler = SpawnSampler::new(&graph, rules.clone());
    let scatter = sampler.scatter(&mut rng, 6, 0.5, Some(avoid));

    assert_eq!(scatter.placed.len() + scatter.shortfall, 6);
    for (i, point) in scatter.placed.iter().enumerate() {
        let floor = *point - Vec3::Y * 0.5;
        assert!(graph.is_walkable(floor));
        assert!(floor.distance(avoid) >= rules.min_distance_from_avoid);
        for other in &scatter.placed[i + 1..] {
            assert!(point.distance(*other) >= rules.min_separation);
        }
    }
}
