//! Bevy plugin that keeps chunk grids in sync with the world and moves agents along their paths.
use std::marker::PhantomData;

use bevy::{log, prelude::*};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::{
    chunk::{chunks_overlapping, Chunk, ChunkId, ChunkState},
    error::PathError,
    follower::{FollowerState, PathFollower},
    lifecycle::ChunkGrids,
    neighbor::Neighborhood,
    obstacle::StaticObstacle,
    path::PathStatus,
    request::{PathRequests, RequestHandle},
    settings::NavSettings,
};

/// Adds chunk grid management, path requests and path following to an app.
///
/// `N` decides how agents move between cells, see [`crate::neighbor::CardinalNeighborhood`]
/// and [`crate::neighbor::OrdinalNeighborhood`].
#[derive(Default)]
pub struct ChunkNavPlugin<N: Neighborhood> {
    settings: NavSettings,
    _neighborhood: PhantomData<N>,
}

impl<N: Neighborhood> ChunkNavPlugin<N> {
    pub fn new(settings: NavSettings) -> Self {
        ChunkNavPlugin {
            settings,
            _neighborhood: PhantomData,
        }
    }
}

impl<N: 'static + Neighborhood> Plugin for ChunkNavPlugin<N> {
    fn build(&self, app: &mut App) {
        app.configure_sets(
            Update,
            (NavSet::Grids, NavSet::Requests, NavSet::Movement).chain(),
        )
        .add_systems(
            Update,
            (release_chunk_grids, track_obstacles, build_chunk_grids)
                .chain()
                .in_set(NavSet::Grids),
        )
        .add_systems(
            Update,
            (submit_path_goals, resolve_path_requests::<N>, hand_off_paths)
                .chain()
                .in_set(NavSet::Requests),
        )
        .add_systems(Update, tick_followers.in_set(NavSet::Movement))
        .insert_resource(self.settings.clone())
        .init_resource::<ChunkGrids>()
        .init_resource::<PathRequests>()
        .init_resource::<ObstacleFootprints>()
        .init_resource::<AgentRequests>()
        .add_event::<PathFailed>()
        .add_event::<FollowerEvent>();
    }
}

/// Phases of a navigation tick, run in this order.
///
/// Grids are only built and released in [`NavSet::Grids`], so every search in
/// [`NavSet::Requests`] sees a complete, unchanging set of grids.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum NavSet {
    Grids,
    Requests,
    Movement,
}

/// World position of an agent.
#[derive(Component, Clone, Copy, Debug, Default, PartialEq)]
pub struct AgentPosition(pub Vec2);

/// Movement parameters of an agent. Agents without one use the [`NavSettings`] defaults.
#[derive(Component, Clone, Copy, Debug, PartialEq)]
#[require(AgentPosition)]
pub struct NavAgent {
    pub speed: f32,
    pub arrival_threshold: f32,
}

impl NavAgent {
    pub fn from_settings(settings: &NavSettings) -> Self {
        NavAgent {
            speed: settings.speed(),
            arrival_threshold: settings.arrival_threshold(),
        }
    }
}

/// Where an agent wants to go. Inserting or changing it queues a path request, removing
/// it drops the request.
#[derive(Component, Clone, Copy, Debug, PartialEq)]
pub struct PathGoal {
    pub target: Vec2,
    /// Longest raw cell path accepted.
    pub max_length: usize,
}

impl PathGoal {
    pub fn new(target: Vec2, max_length: usize) -> Self {
        PathGoal { target, max_length }
    }
}

/// Sent when an agent's path request fails or times out.
#[derive(Event, Clone, Debug, PartialEq)]
pub struct PathFailed {
    pub entity: Entity,
    pub status: PathStatus,
    pub error: Option<PathError>,
}

/// Sent when a follower completes its path or gets stuck. The follower is removed
/// from the agent in the same tick.
#[derive(Event, Clone, Copy, Debug, PartialEq)]
pub struct FollowerEvent {
    pub entity: Entity,
    pub state: FollowerState,
}

// Chunks each obstacle was last rasterized into.
#[derive(Resource, Default)]
struct ObstacleFootprints(FxHashMap<Entity, SmallVec<[ChunkId; 4]>>);

// Request in flight for each agent.
#[derive(Resource, Default)]
struct AgentRequests(FxHashMap<Entity, RequestHandle>);

fn release_chunk_grids(
    mut grids: ResMut<ChunkGrids>,
    mut removed: RemovedComponents<Chunk>,
    mut chunks: Query<(Entity, &mut Chunk), Changed<Chunk>>,
) {
    for entity in removed.read() {
        drop(grids.release_owner(entity));
    }

    for (entity, mut chunk) in &mut chunks {
        let owned = grids.owner_of(entity);

        if !chunk.state.is_navigable() || owned.is_some_and(|id| id != chunk.id()) {
            drop(grids.release_owner(entity));
            continue;
        }

        if chunk.state == ChunkState::Dirty {
            grids.mark_dirty(chunk.id());
            // Rebuilt below, nothing else has to react to this write.
            chunk.bypass_change_detection().state = ChunkState::Loaded;
        }
    }
}

fn track_obstacles(
    mut footprints: ResMut<ObstacleFootprints>,
    mut grids: ResMut<ChunkGrids>,
    settings: Res<NavSettings>,
    obstacles: Query<(Entity, &StaticObstacle), Changed<StaticObstacle>>,
    mut removed: RemovedComponents<StaticObstacle>,
) {
    for entity in removed.read() {
        if let Some(footprint) = footprints.0.remove(&entity) {
            footprint.into_iter().for_each(|chunk| grids.mark_dirty(chunk));
        }
    }

    for (entity, obstacle) in &obstacles {
        let footprint: SmallVec<[ChunkId; 4]> = chunks_overlapping(
            obstacle.position(),
            obstacle.radius(),
            settings.obstacle_margin(),
            settings.chunk_size(),
        )
        .collect();

        let previous = footprints.0.insert(entity, footprint.clone());
        previous
            .into_iter()
            .flatten()
            .chain(footprint)
            .for_each(|chunk| grids.mark_dirty(chunk));
    }
}

fn build_chunk_grids(
    mut grids: ResMut<ChunkGrids>,
    settings: Res<NavSettings>,
    chunks: Query<(Entity, &Chunk)>,
    obstacles: Query<&StaticObstacle>,
) {
    for (entity, chunk) in &chunks {
        if !chunk.state.is_navigable() {
            continue;
        }

        let id = chunk.id();
        if grids.owner_of(entity) == Some(id) && !grids.is_dirty(id) {
            continue;
        }

        grids.build_owned(entity, id, &obstacles, &settings);
    }
}

fn submit_path_goals(
    mut requests: ResMut<PathRequests>,
    mut in_flight: ResMut<AgentRequests>,
    time: Res<Time<Real>>,
    goals: Query<(Entity, &AgentPosition, &PathGoal), Changed<PathGoal>>,
    mut removed: RemovedComponents<PathGoal>,
) {
    for entity in removed.read() {
        if let Some(handle) = in_flight.0.remove(&entity) {
            let _ = requests.discard(handle);
        }
    }

    for (entity, position, goal) in &goals {
        log::debug!("Pathfinding for entity: {:?}", entity);

        let handle = requests.submit(position.0, goal.target, goal.max_length, time.elapsed());
        if let Some(replaced) = in_flight.0.insert(entity, handle) {
            let _ = requests.discard(replaced);
        }
    }
}

fn resolve_path_requests<N: Neighborhood>(
    mut requests: ResMut<PathRequests>,
    grids: Res<ChunkGrids>,
    settings: Res<NavSettings>,
    time: Res<Time<Real>>,
) {
    if requests.pending() == 0 {
        return;
    }

    requests.resolve(&N::default(), &grids, &settings, time.elapsed());
}

fn hand_off_paths(
    mut commands: Commands,
    mut requests: ResMut<PathRequests>,
    mut in_flight: ResMut<AgentRequests>,
    settings: Res<NavSettings>,
    agents: Query<Option<&NavAgent>>,
    mut failed: EventWriter<PathFailed>,
) {
    in_flight.0.retain(|&entity, &mut handle| {
        let resolved = match requests.take(handle) {
            Ok(Some(resolved)) => resolved,
            Ok(None) => return true,
            Err(error) => {
                log::warn!("Dropping request for {:?}: {}", entity, error);
                return false;
            }
        };

        let Ok(agent) = agents.get(entity) else {
            return false;
        };

        if !resolved.result.is_valid() {
            failed.write(PathFailed {
                entity,
                status: resolved.result.status,
                error: resolved.error,
            });
            return false;
        }

        let agent = agent.copied().unwrap_or_else(|| NavAgent::from_settings(&settings));
        let mut follower = PathFollower::new(agent.speed, agent.arrival_threshold, &settings);
        follower.set_path(resolved.waypoints);

        commands.entity(entity).try_insert(follower);
        false
    });
}

fn tick_followers(
    mut commands: Commands,
    time: Res<Time>,
    mut agents: Query<(Entity, &mut AgentPosition, &mut PathFollower)>,
    mut events: EventWriter<FollowerEvent>,
) {
    let delta = time.delta_secs();

    for (entity, mut position, mut follower) in &mut agents {
        let tick = follower.tick(position.0, delta);
        if tick.position != position.0 {
            position.0 = tick.position;
        }

        let Some(state) = tick.transition else {
            continue;
        };

        if state == FollowerState::Stuck {
            log::debug!("Entity {:?} is stuck at {}", entity, position.0);
        }

        events.write(FollowerEvent { entity, state });

        if state.is_finished() {
            commands.entity(entity).try_remove::<PathFollower>();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bevy::ecs::event::Events;

    use super::*;
    use crate::{
        error::Endpoint,
        neighbor::OrdinalNeighborhood,
        obstacle::ObstacleKind,
        settings::{DEFAULT_ARRIVAL_THRESHOLD, DEFAULT_CHUNK_SIZE},
    };

    fn app() -> App {
        let mut app = App::new();
        app.add_plugins(ChunkNavPlugin::<OrdinalNeighborhood>::default())
            .insert_resource(Time::<()>::default())
            .insert_resource(Time::<Real>::default());
        app
    }

    fn step(app: &mut App, seconds: f32) {
        let delta = Duration::from_secs_f32(seconds);
        app.world_mut().resource_mut::<Time>().advance_by(delta);
        app.world_mut().resource_mut::<Time<Real>>().advance_by(delta);
        app.update();
    }

    fn drain<E: Event>(app: &mut App) -> Vec<E> {
        app.world_mut().resource_mut::<Events<E>>().drain().collect()
    }

    fn spawn_chunk(app: &mut App, id: IVec2) -> Entity {
        app.world_mut()
            .spawn(Chunk::loaded(id, DEFAULT_CHUNK_SIZE))
            .id()
    }

    fn spawn_agent(app: &mut App, position: Vec2, target: Vec2) -> Entity {
        app.world_mut()
            .spawn((
                AgentPosition(position),
                PathGoal::new(target, 1024),
            ))
            .id()
    }

    #[test]
    fn test_loaded_chunks_get_grids() {
        let mut app = app();
        spawn_chunk(&mut app, IVec2::ZERO);
        app.world_mut()
            .spawn(Chunk::new(IVec2::X, DEFAULT_CHUNK_SIZE, ChunkState::Generating));

        step(&mut app, 0.1);

        let grids = app.world().resource::<ChunkGrids>();
        assert!(grids.contains(IVec2::ZERO));
        assert!(!grids.contains(IVec2::X));
        assert_eq!(grids.lifecycle().built, 1);
    }

    #[test]
    fn test_despawned_chunk_releases_grid_once() {
        let mut app = app();
        let chunk = spawn_chunk(&mut app, IVec2::ZERO);
        step(&mut app, 0.1);

        app.world_mut().despawn(chunk);
        step(&mut app, 0.1);
        step(&mut app, 0.1);

        let grids = app.world().resource::<ChunkGrids>();
        assert!(grids.is_empty());
        assert_eq!(grids.lifecycle().released, 1);
        assert_eq!(grids.lifecycle().live(), 0);
    }

    #[test]
    fn test_replacement_chunk_keeps_grid() {
        let mut app = app();
        let old = spawn_chunk(&mut app, IVec2::ZERO);
        step(&mut app, 0.1);

        // The new entity for the same chunk shows up before the old one goes away.
        spawn_chunk(&mut app, IVec2::ZERO);
        step(&mut app, 0.1);
        app.world_mut().despawn(old);
        step(&mut app, 0.1);
        step(&mut app, 0.1);

        let grids = app.world().resource::<ChunkGrids>();
        assert!(grids.contains(IVec2::ZERO));
        assert_eq!(grids.lifecycle().live(), 1);
    }

    #[test]
    fn test_stalled_frames_age_requests_in_real_time() {
        let mut app = app();
        spawn_chunk(&mut app, IVec2::ZERO);
        step(&mut app, 0.1);

        let handle = app.world_mut().resource_mut::<PathRequests>().submit(
            Vec2::new(10.0, 10.0),
            Vec2::new(90.0, 90.0),
            256,
            Duration::ZERO,
        );
        // Virtual time barely moves during a long stall, the real clock does.
        app.world_mut()
            .resource_mut::<Time<Real>>()
            .advance_by(Duration::from_secs(10));
        step(&mut app, 0.1);

        let requests = app.world().resource::<PathRequests>();
        assert_eq!(requests.status(handle), Ok(PathStatus::Timeout));
    }

    #[test]
    fn test_unloading_chunk_releases_grid() {
        let mut app = app();
        let chunk = spawn_chunk(&mut app, IVec2::ZERO);
        step(&mut app, 0.1);

        app.world_mut().get_mut::<Chunk>(chunk).unwrap().state = ChunkState::Unloading;
        step(&mut app, 0.1);

        let grids = app.world().resource::<ChunkGrids>();
        assert!(!grids.contains(IVec2::ZERO));
        assert_eq!(grids.lifecycle().live(), 0);
    }

    #[test]
    fn test_obstacle_changes_rebuild_only_touched_chunks() {
        let mut app = app();
        spawn_chunk(&mut app, IVec2::ZERO);
        spawn_chunk(&mut app, IVec2::new(2, 0));
        step(&mut app, 0.1);

        let rock = StaticObstacle::new(Vec2::new(50.0, 50.0), 5.0, ObstacleKind::Rock).unwrap();
        let obstacle = app.world_mut().spawn(rock).id();
        step(&mut app, 0.1);

        {
            let grids = app.world().resource::<ChunkGrids>();
            assert_eq!(grids.get(IVec2::ZERO).map(|grid| grid.generation()), Some(1));
            assert_eq!(grids.get(IVec2::new(2, 0)).map(|grid| grid.generation()), Some(0));
            assert!(grids.get(IVec2::ZERO).unwrap().stats().blocked > 0);
        }

        app.world_mut().despawn(obstacle);
        step(&mut app, 0.1);

        let grids = app.world().resource::<ChunkGrids>();
        let grid = grids.get(IVec2::ZERO).unwrap();
        assert_eq!(grid.generation(), 2);
        assert_eq!(grid.stats().blocked, 0);
        assert_eq!(grids.lifecycle().live(), 2);
    }

    #[test]
    fn test_dirty_chunk_is_rebuilt() {
        let mut app = app();
        let chunk = spawn_chunk(&mut app, IVec2::ZERO);
        step(&mut app, 0.1);

        app.world_mut().get_mut::<Chunk>(chunk).unwrap().state = ChunkState::Dirty;
        step(&mut app, 0.1);

        let grids = app.world().resource::<ChunkGrids>();
        assert_eq!(grids.get(IVec2::ZERO).map(|grid| grid.generation()), Some(1));
        assert!(!grids.is_dirty(IVec2::ZERO));
        assert_eq!(
            app.world().get::<Chunk>(chunk).map(|chunk| chunk.state),
            Some(ChunkState::Loaded)
        );
    }

    #[test]
    fn test_agent_walks_to_goal() {
        let mut app = app();
        spawn_chunk(&mut app, IVec2::ZERO);
        let target = Vec2::new(90.0, 90.0);
        let agent = spawn_agent(&mut app, Vec2::new(10.0, 10.0), target);

        step(&mut app, 0.1);
        assert!(app.world().get::<PathFollower>(agent).is_some());

        let mut events = Vec::new();
        for _ in 0..300 {
            step(&mut app, 0.1);
            events.extend(drain::<FollowerEvent>(&mut app));
        }

        assert_eq!(
            events,
            vec![FollowerEvent {
                entity: agent,
                state: FollowerState::Completed
            }]
        );
        assert!(app.world().get::<PathFollower>(agent).is_none());
        let position = app.world().get::<AgentPosition>(agent).unwrap().0;
        assert!(position.distance(target) <= DEFAULT_ARRIVAL_THRESHOLD);
        assert!(app.world().resource::<PathRequests>().is_empty());
    }

    #[test]
    fn test_unreachable_goal_sends_failure() {
        let mut app = app();
        spawn_chunk(&mut app, IVec2::ZERO);
        let agent = spawn_agent(&mut app, Vec2::new(10.0, 10.0), Vec2::new(450.0, 10.0));

        step(&mut app, 0.1);

        let failures = drain::<PathFailed>(&mut app);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].entity, agent);
        assert_eq!(failures[0].status, PathStatus::Failed);
        assert!(matches!(
            failures[0].error,
            Some(PathError::Unreachable {
                endpoint: Endpoint::Target,
                ..
            })
        ));
        assert!(app.world().get::<PathFollower>(agent).is_none());
    }

    #[test]
    fn test_pinned_agent_gets_stuck() {
        let mut app = app();
        spawn_chunk(&mut app, IVec2::ZERO);
        let start = Vec2::new(10.0, 10.0);
        let agent = spawn_agent(&mut app, start, Vec2::new(90.0, 10.0));

        step(&mut app, 0.1);
        assert!(app.world().get::<PathFollower>(agent).is_some());

        let mut events = Vec::new();
        for _ in 0..40 {
            // Something outside navigation keeps pushing the agent back.
            app.world_mut().get_mut::<AgentPosition>(agent).unwrap().0 = start;
            step(&mut app, 0.1);
            events.extend(drain::<FollowerEvent>(&mut app));
        }

        assert_eq!(
            events,
            vec![FollowerEvent {
                entity: agent,
                state: FollowerState::Stuck
            }]
        );
        assert!(app.world().get::<PathFollower>(agent).is_none());
    }

    #[test]
    fn test_new_goal_replaces_path() {
        let mut app = app();
        spawn_chunk(&mut app, IVec2::ZERO);
        let agent = spawn_agent(&mut app, Vec2::new(10.0, 10.0), Vec2::new(90.0, 10.0));

        for _ in 0..10 {
            step(&mut app, 0.1);
        }
        let target = Vec2::new(10.0, 90.0);
        app.world_mut().get_mut::<PathGoal>(agent).unwrap().target = target;

        let mut events = Vec::new();
        for _ in 0..300 {
            step(&mut app, 0.1);
            events.extend(drain::<FollowerEvent>(&mut app));
        }

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].state, FollowerState::Completed);
        let position = app.world().get::<AgentPosition>(agent).unwrap().0;
        assert!(position.distance(target) <= DEFAULT_ARRIVAL_THRESHOLD);
    }

    #[test]
    fn test_removed_goal_is_never_requested() {
        let mut app = app();
        // No grids, so the request fails as soon as it is searched.
        let agent = spawn_agent(&mut app, Vec2::new(10.0, 10.0), Vec2::new(90.0, 90.0));
        app.world_mut()
            .resource_mut::<PathRequests>()
            .submit(Vec2::ZERO, Vec2::ONE, 16, Duration::ZERO);

        app.world_mut().entity_mut(agent).remove::<PathGoal>();
        step(&mut app, 0.1);

        // Only the request submitted directly is left, resolved and waiting to be taken.
        let requests = app.world().resource::<PathRequests>();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests.pending(), 0);
        assert!(drain::<PathFailed>(&mut app).is_empty());
    }
}
