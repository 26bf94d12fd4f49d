//! End-to-end runs of the simulator against in-memory clouds.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use skyscale_cloud::{CloudCollection, sim_clouds};
use skyscale_core::config::SkyscaleConfig;
use skyscale_core::{CloudState, CloudTag, InstanceState, InstanceType, Job, JobState};
use skyscale_scheduler::{AlgorithmInput, CostAwareScheduler, PassthroughScheduler};
use skyscale_sim::{SimError, SimulationSettings, Simulator, TickSnapshot};
use skyscale_state::StateStore;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2018, 5, 23, 19, 40, 0).unwrap()
}

fn settings(iterations: u32) -> SimulationSettings {
    SimulationSettings {
        iterations,
        timestep: Duration::minutes(30),
    }
}

fn single_cloud(store: &StateStore, limit: usize, price: f64) -> CloudCollection {
    let state = CloudState {
        name: "stallo".to_string(),
        limit,
        accept_tag: CloudTag::Metapipe,
        default_type: "default".to_string(),
        types: BTreeMap::from([(
            "default".to_string(),
            InstanceType {
                name: "default".to_string(),
                price_increment: price,
            },
        )]),
        active_instances: Vec::new(),
        cost_limit: 100.0,
        money_used: 0.0,
    };
    sim_clouds(BTreeMap::from([(CloudTag::Metapipe, state)]), store)
}

fn job(id: &str, tag: Option<CloudTag>, minutes: i64, created: DateTime<Utc>) -> Job {
    Job {
        id: id.to_string(),
        tag,
        parameters: BTreeMap::new(),
        state: JobState::Queued,
        priority: 1,
        execution_time: CloudTag::ALL.iter().map(|t| (*t, minutes * 60_000)).collect(),
        deadline: None,
        created,
        started: None,
        instance_flavour: None,
    }
}

fn run_sim(
    simulator: &Simulator,
    store: &StateStore,
    clouds: &mut CloudCollection,
    backlog: Vec<Job>,
) -> (u64, Vec<TickSnapshot>) {
    let run = store.create_run(simulator.algorithm_name(), t0()).unwrap();
    let snapshots = simulator
        .simulate(
            run,
            backlog,
            AlgorithmInput {
                job_queue: Vec::new(),
                clouds,
            },
            t0(),
        )
        .unwrap();
    (run, snapshots)
}

fn cost_aware(store: &StateStore, iterations: u32) -> Simulator {
    Simulator::new(Arc::new(CostAwareScheduler), store.clone(), settings(iterations))
}

#[test]
fn scenario_c_job_finishes_after_its_estimate() {
    let store = StateStore::open_in_memory().unwrap();
    let mut clouds = single_cloud(&store, 2, 0.0);
    let simulator = cost_aware(&store, 3);
    let backlog = vec![job("j1", Some(CloudTag::Metapipe), 30, t0() - Duration::minutes(1))];

    let (_, snapshots) = run_sim(&simulator, &store, &mut clouds, backlog);

    let queue = |tick: usize| &snapshots[tick].queues[&CloudTag::Metapipe];
    assert_eq!(queue(0)[0].state, JobState::Running);
    assert_eq!(queue(0)[0].started, Some(t0()));
    // finishes at exactly t0+30m, which is not yet past
    assert_eq!(queue(1)[0].state, JobState::Running);
    assert!(queue(2).is_empty());

    let fleet = &snapshots[2].fleets[&CloudTag::Metapipe];
    assert_eq!(fleet.len(), 1);
    assert_eq!(fleet[0].state, InstanceState::Inactive);
}

#[test]
fn backlog_release_is_strictly_after_creation() {
    let store = StateStore::open_in_memory().unwrap();
    let mut clouds = single_cloud(&store, 2, 0.0);
    let simulator = Simulator::new(Arc::new(PassthroughScheduler), store.clone(), settings(2));
    let backlog = vec![job("j1", Some(CloudTag::Metapipe), 60, t0())];

    let (_, snapshots) = run_sim(&simulator, &store, &mut clouds, backlog);

    assert!(snapshots[0].queues[&CloudTag::Metapipe].is_empty());
    assert_eq!(snapshots[1].queues[&CloudTag::Metapipe].len(), 1);
    assert_eq!(snapshots[1].timestamp, t0() + Duration::minutes(30));
}

#[test]
fn passthrough_never_starts_jobs_without_a_fleet() {
    let store = StateStore::open_in_memory().unwrap();
    let mut clouds = single_cloud(&store, 2, 0.0);
    let simulator = Simulator::new(Arc::new(PassthroughScheduler), store.clone(), settings(4));
    let backlog = vec![
        job("j1", Some(CloudTag::Metapipe), 10, t0() - Duration::minutes(5)),
        job("j2", Some(CloudTag::Metapipe), 10, t0() - Duration::minutes(5)),
    ];

    let (run, snapshots) = run_sim(&simulator, &store, &mut clouds, backlog);

    for snapshot in &snapshots {
        let queue = &snapshot.queues[&CloudTag::Metapipe];
        assert_eq!(queue.len(), 2);
        assert!(queue.iter().all(|j| j.state == JobState::Queued));
        assert!(snapshot.fleets[&CloudTag::Metapipe].is_empty());
    }
    assert!(store.list_fleet_events(run).unwrap().is_empty());
}

#[test]
fn empty_backlog_runs_every_tick_and_ends_the_run() {
    let store = StateStore::open_in_memory().unwrap();
    let config = SkyscaleConfig::scaffold();
    let mut clouds = sim_clouds(config.cloud_states(), &store);
    let simulator = cost_aware(&store, 4);

    let (run, snapshots) = run_sim(&simulator, &store, &mut clouds, Vec::new());

    assert_eq!(snapshots.len(), 4);
    let ticks: Vec<u32> = snapshots.iter().map(|s| s.tick).collect();
    assert_eq!(ticks, vec![0, 1, 2, 3]);

    let events = store.list_scheduler_events(run).unwrap();
    assert_eq!(events.len(), 4 * 3);
    assert!(events.iter().all(|e| e.queue_duration_ms == 0 && e.cost_after == 0.0));

    let record = store.get_run(run).unwrap().unwrap();
    assert!(record.is_finished());
}

#[test]
fn failed_tick_leaves_the_run_open() {
    let store = StateStore::open_in_memory().unwrap();
    let mut states = BTreeMap::new();
    states.insert(
        CloudTag::Csc,
        CloudState {
            name: "cpouta".to_string(),
            limit: 2,
            accept_tag: CloudTag::Csc,
            default_type: "missing".to_string(),
            types: BTreeMap::new(),
            active_instances: Vec::new(),
            cost_limit: 0.0,
            money_used: 0.0,
        },
    );
    let mut clouds = sim_clouds(states, &store);
    let simulator = cost_aware(&store, 3);
    let run = store.create_run("broken", t0()).unwrap();

    let result = simulator.simulate(
        run,
        Vec::new(),
        AlgorithmInput {
            job_queue: vec![job("j1", Some(CloudTag::Csc), 30, t0())],
            clouds: &mut clouds,
        },
        t0(),
    );

    assert!(result.is_err());
    assert!(!store.get_run(run).unwrap().unwrap().is_finished());
}

#[test]
fn unconfigured_cloud_in_backlog_is_rejected_up_front() {
    let store = StateStore::open_in_memory().unwrap();
    let mut clouds = single_cloud(&store, 2, 0.0);
    let simulator = cost_aware(&store, 2);
    let run = store.create_run("bad-backlog", t0()).unwrap();

    let err = simulator
        .simulate(
            run,
            vec![job("j1", Some(CloudTag::Aws), 30, t0())],
            AlgorithmInput {
                job_queue: Vec::new(),
                clouds: &mut clouds,
            },
            t0(),
        )
        .unwrap_err();

    assert!(matches!(err, SimError::UnknownCloud { tag: CloudTag::Aws, .. }));
    assert!(store.list_scheduler_events(run).unwrap().is_empty());
}

#[test]
fn active_instances_accrue_cost_each_tick() {
    let store = StateStore::open_in_memory().unwrap();
    let mut clouds = single_cloud(&store, 1, 1.0);
    let simulator = cost_aware(&store, 2);
    let backlog = vec![job("j1", Some(CloudTag::Metapipe), 120, t0() - Duration::minutes(1))];

    let (run, _) = run_sim(&simulator, &store, &mut clouds, backlog);

    let events = store.list_scheduler_events(run).unwrap();
    assert_eq!(events.len(), 2);
    assert!((events[0].money_used - 0.5).abs() < 1e-9);
    assert!((events[1].money_used - 1.0).abs() < 1e-9);
    assert!(events[1].cost_before > 0.0);
}

#[test]
fn busy_run_keeps_fleets_bounded_and_job_states_monotonic() {
    let store = StateStore::open_in_memory().unwrap();
    let config = SkyscaleConfig::scaffold();
    let limits: BTreeMap<CloudTag, usize> =
        config.clouds.iter().map(|c| (c.tag, c.limit)).collect();
    let mut clouds = sim_clouds(config.cloud_states(), &store);
    let simulator = cost_aware(&store, 10);

    let backlog: Vec<Job> = (0..16)
        .map(|i| {
            let created = t0() + Duration::minutes(20 * i) - Duration::minutes(1);
            let tag = (i % 4 == 0).then_some(CloudTag::Metapipe);
            job(&format!("j{i}"), tag, 45 + 15 * (i % 3), created)
        })
        .collect();

    let (_, snapshots) = run_sim(&simulator, &store, &mut clouds, backlog);

    let mut last_state: HashMap<String, JobState> = HashMap::new();
    let mut finished: Vec<String> = Vec::new();
    for snapshot in &snapshots {
        for (tag, fleet) in &snapshot.fleets {
            assert!(fleet.len() <= limits[tag], "fleet of {tag} over limit");
        }
        let present: Vec<&Job> = snapshot.queues.values().flatten().collect();
        for job in &present {
            assert!(!finished.contains(&job.id), "{} came back", job.id);
            if last_state.get(&job.id) == Some(&JobState::Running) {
                assert_eq!(job.state, JobState::Running);
            }
            assert!(job.tag.is_some());
        }
        for (id, state) in last_state.iter() {
            if !present.iter().any(|j| &j.id == id) {
                assert_eq!(*state, JobState::Running, "{id} left without running");
                finished.push(id.clone());
            }
        }
        last_state = present.iter().map(|j| (j.id.clone(), j.state)).collect();
    }
    assert!(!finished.is_empty());
}

#[test]
fn snapshots_serialize_to_json() {
    let store = StateStore::open_in_memory().unwrap();
    let mut clouds = single_cloud(&store, 2, 0.0);
    let simulator = cost_aware(&store, 1);
    let backlog = vec![job("j1", Some(CloudTag::Metapipe), 30, t0() - Duration::minutes(1))];

    let (_, snapshots) = run_sim(&simulator, &store, &mut clouds, backlog);

    let value = serde_json::to_value(&snapshots[0]).unwrap();
    assert_eq!(value["queues"]["metapipe"][0]["state"], "RUNNING");
    assert_eq!(value["fleets"]["metapipe"][0]["type"], "default");
}

#[test]
fn unassigned_jobs_stay_visible_in_snapshots() {
    let store = StateStore::open_in_memory().unwrap();
    let mut clouds = single_cloud(&store, 2, 0.0);
    let simulator = Simulator::new(Arc::new(PassthroughScheduler), store.clone(), settings(3));
    let backlog = vec![job("free", None, 30, t0() - Duration::minutes(1))];

    let (_, snapshots) = run_sim(&simulator, &store, &mut clouds, backlog);

    for snapshot in &snapshots {
        assert_eq!(snapshot.unassigned.len(), 1);
        assert_eq!(snapshot.unassigned[0].state, JobState::Queued);
        assert!(snapshot.queues[&CloudTag::Metapipe].is_empty());
    }
}

#[test]
fn clock_overflow_fails_the_run_without_ending_it() {
    let store = StateStore::open_in_memory().unwrap();
    let mut clouds = single_cloud(&store, 2, 0.0);
    let simulator = Simulator::new(
        Arc::new(CostAwareScheduler),
        store.clone(),
        SimulationSettings {
            iterations: 40,
            timestep: Duration::minutes(i64::from(u32::MAX)),
        },
    );
    let run = store.create_run("far-future", t0()).unwrap();

    let err = simulator
        .simulate(
            run,
            Vec::new(),
            AlgorithmInput {
                job_queue: Vec::new(),
                clouds: &mut clouds,
            },
            t0(),
        )
        .unwrap_err();

    assert!(matches!(err, SimError::ClockOverflow { .. }));
    assert!(!store.get_run(run).unwrap().unwrap().is_finished());
}

#[test]
fn job_with_unbounded_estimate_keeps_running() {
    let store = StateStore::open_in_memory().unwrap();
    let mut clouds = single_cloud(&store, 2, 0.0);
    let simulator = cost_aware(&store, 3);
    let mut endless = job("endless", Some(CloudTag::Metapipe), 0, t0() - Duration::minutes(1));
    endless.execution_time.insert(CloudTag::Metapipe, i64::MAX);

    let (run, snapshots) = run_sim(&simulator, &store, &mut clouds, vec![endless]);

    let queue = &snapshots[2].queues[&CloudTag::Metapipe];
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0].state, JobState::Running);
    assert!(store.get_run(run).unwrap().unwrap().is_finished());
}
