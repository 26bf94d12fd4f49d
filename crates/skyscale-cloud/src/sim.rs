//! Simulated cloud backend.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use skyscale_core::{CloudState, CloudTag, Instance, InstanceState, InstanceType, millis_to_hours};
use skyscale_state::{FleetEvent, FleetEventType, RunId, StateStore};
use tracing::{debug, info};

use crate::cloud::{Cloud, CloudCollection};
use crate::error::{CloudError, CloudResult};

/// A cloud whose fleet exists only in memory. Fleet mutations are recorded
/// as events of the attached run.
pub struct SimCloud {
    state: CloudState,
    store: StateStore,
    run_id: Option<RunId>,
    next_id: u64,
}

/// Build one `SimCloud` per configured cloud, all writing to `store`.
pub fn sim_clouds(states: BTreeMap<CloudTag, CloudState>, store: &StateStore) -> CloudCollection {
    states
        .into_iter()
        .map(|(tag, state)| {
            let cloud: Box<dyn Cloud> = Box::new(SimCloud::new(state, store.clone()));
            (tag, cloud)
        })
        .collect()
}

impl SimCloud {
    pub fn new(state: CloudState, store: StateStore) -> Self {
        Self {
            state,
            store,
            run_id: None,
            next_id: 0,
        }
    }

    fn lookup_type(&self, name: &str) -> CloudResult<InstanceType> {
        self.state
            .types
            .get(name)
            .cloned()
            .ok_or_else(|| CloudError::UnknownInstanceType {
                cloud: self.state.name.clone(),
                instance_type: name.to_string(),
            })
    }

    /// `{cloud name}_{n}`, skipping ids already in the fleet.
    fn fresh_id(&mut self) -> String {
        loop {
            self.next_id += 1;
            let id = format!("{}_{}", self.state.name, self.next_id);
            if !self.state.active_instances.iter().any(|i| i.id == id) {
                return id;
            }
        }
    }

    fn record(
        &self,
        instance: &Instance,
        event_type: FleetEventType,
        now: DateTime<Utc>,
    ) -> CloudResult<()> {
        let run_id = self
            .run_id
            .ok_or_else(|| CloudError::NoRun(self.state.name.clone()))?;
        self.store.record_fleet_event(&FleetEvent {
            run_id,
            timestamp: now,
            instance: instance.clone(),
            instance_type: self.lookup_type(&instance.instance_type)?,
            event_type,
            cloud_name: self.state.name.clone(),
        })?;
        Ok(())
    }
}

impl Cloud for SimCloud {
    fn name(&self) -> &str {
        &self.state.name
    }

    fn tag(&self) -> CloudTag {
        self.state.accept_tag
    }

    fn attach_run(&mut self, run_id: RunId) {
        self.run_id = Some(run_id);
    }

    fn instances(&self) -> CloudResult<Vec<Instance>> {
        Ok(self.state.active_instances.clone())
    }

    fn instance_types(&self) -> CloudResult<BTreeMap<String, InstanceType>> {
        Ok(self.state.types.clone())
    }

    fn instance_limit(&self) -> usize {
        self.state.limit
    }

    fn default_instance_type(&self) -> &str {
        &self.state.default_type
    }

    fn add_instance(&mut self, instance: &mut Instance, now: DateTime<Utc>) -> CloudResult<String> {
        self.lookup_type(&instance.instance_type)?;

        let reusable = self
            .state
            .active_instances
            .iter()
            .position(|i| i.is_inactive() && i.instance_type == instance.instance_type);

        match reusable {
            Some(index) => {
                instance.id = self.state.active_instances[index].id.clone();
                instance.state = InstanceState::Active;
                self.record(instance, FleetEventType::Reused, now)?;
                self.state.active_instances[index] = instance.clone();
                debug!(cloud = %self.state.name, instance = %instance.id, "instance reused");
            }
            None => {
                if self.state.active_instances.len() >= self.state.limit {
                    return Err(CloudError::LimitReached {
                        cloud: self.state.name.clone(),
                        limit: self.state.limit,
                    });
                }
                instance.id = self.fresh_id();
                instance.state = InstanceState::Active;
                self.record(instance, FleetEventType::Created, now)?;
                self.state.active_instances.push(instance.clone());
                info!(
                    cloud = %self.state.name,
                    instance = %instance.id,
                    instance_type = %instance.instance_type,
                    "instance created"
                );
            }
        }
        Ok(instance.id.clone())
    }

    fn delete_instance(&mut self, id: &str, now: DateTime<Utc>) -> CloudResult<()> {
        let Some(index) = self.state.active_instances.iter().position(|i| i.id == id) else {
            debug!(cloud = %self.state.name, instance = %id, "delete of unknown instance ignored");
            return Ok(());
        };
        self.record(&self.state.active_instances[index], FleetEventType::Deleted, now)?;
        self.state.active_instances.remove(index);
        info!(cloud = %self.state.name, instance = %id, "instance deleted");
        Ok(())
    }

    fn release_instance(&mut self, flavour: Option<&str>) -> CloudResult<Option<String>> {
        let fleet = &mut self.state.active_instances;
        let preferred = flavour.and_then(|f| {
            fleet
                .iter()
                .position(|i| i.is_active() && i.instance_type == f)
        });
        let Some(index) = preferred.or_else(|| fleet.iter().position(Instance::is_active)) else {
            return Ok(None);
        };
        fleet[index].state = InstanceState::Inactive;
        Ok(Some(fleet[index].id.clone()))
    }

    fn accrue_usage(&mut self, elapsed: chrono::Duration) -> CloudResult<f64> {
        let hours = millis_to_hours(elapsed.num_milliseconds());
        let mut charged = 0.0;
        for instance in self.state.active_instances.iter().filter(|i| i.is_active()) {
            charged += self.lookup_type(&instance.instance_type)?.price_increment * hours;
        }
        self.state.money_used += charged;
        debug!(
            cloud = %self.state.name,
            charged,
            money_used = self.state.money_used,
            "usage accrued"
        );
        Ok(charged)
    }

    fn cost_limit(&self) -> f64 {
        self.state.cost_limit
    }

    fn money_used(&self) -> f64 {
        self.state.money_used
    }

    fn snapshot(&self) -> CloudState {
        self.state.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use skyscale_core::{Job, JobState};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2018, 5, 23, 19, 40, 0).unwrap()
    }

    fn test_state(limit: usize) -> CloudState {
        let types = [("default", 0.5), ("large", 2.0)]
            .into_iter()
            .map(|(name, price)| {
                (
                    name.to_string(),
                    InstanceType {
                        name: name.to_string(),
                        price_increment: price,
                    },
                )
            })
            .collect();
        CloudState {
            name: "cpouta".to_string(),
            limit,
            accept_tag: CloudTag::Csc,
            default_type: "default".to_string(),
            types,
            active_instances: Vec::new(),
            cost_limit: 100.0,
            money_used: 0.0,
        }
    }

    fn test_cloud(limit: usize) -> (SimCloud, StateStore, RunId) {
        let store = StateStore::open_in_memory().unwrap();
        let run = store.create_run("test", t0()).unwrap();
        let mut cloud = SimCloud::new(test_state(limit), store.clone());
        cloud.attach_run(run);
        (cloud, store, run)
    }

    fn test_job(hours: i64, flavour: Option<&str>) -> Job {
        Job {
            id: format!("job-{hours}"),
            tag: Some(CloudTag::Csc),
            parameters: BTreeMap::new(),
            state: JobState::Queued,
            priority: 1,
            execution_time: BTreeMap::from([(CloudTag::Csc, hours * 3_600_000)]),
            deadline: None,
            created: t0(),
            started: None,
            instance_flavour: flavour.map(str::to_string),
        }
    }

    fn event_types(store: &StateStore, run: RunId) -> Vec<FleetEventType> {
        store
            .list_fleet_events(run)
            .unwrap()
            .into_iter()
            .map(|e| e.event_type)
            .collect()
    }

    // ── Fleet mutation ─────────────────────────────────────────────

    #[test]
    fn add_creates_active_instance_with_fresh_id() {
        let (mut cloud, store, run) = test_cloud(3);
        let mut req = Instance::request("default");
        let id = cloud.add_instance(&mut req, t0()).unwrap();

        assert_eq!(id, "cpouta_1");
        assert_eq!(req.id, id);
        assert_eq!(req.state, InstanceState::Active);
        assert_eq!(cloud.instances().unwrap(), vec![req]);
        assert_eq!(event_types(&store, run), vec![FleetEventType::Created]);
    }

    #[test]
    fn reuse_keeps_existing_id() {
        let (mut cloud, store, run) = test_cloud(3);
        let first = cloud.add_instance(&mut Instance::request("default"), t0()).unwrap();
        assert_eq!(cloud.release_instance(None).unwrap(), Some(first.clone()));

        let again = cloud.add_instance(&mut Instance::request("default"), t0()).unwrap();
        assert_eq!(again, first);
        assert_eq!(cloud.instances().unwrap().len(), 1);
        assert!(cloud.instances().unwrap()[0].is_active());
        assert_eq!(
            event_types(&store, run),
            vec![FleetEventType::Created, FleetEventType::Reused]
        );
    }

    #[test]
    fn reuse_requires_matching_type() {
        let (mut cloud, _, _) = test_cloud(3);
        cloud.add_instance(&mut Instance::request("large"), t0()).unwrap();
        cloud.release_instance(None).unwrap();

        let id = cloud.add_instance(&mut Instance::request("default"), t0()).unwrap();
        assert_eq!(id, "cpouta_2");
        assert_eq!(cloud.instances().unwrap().len(), 2);
    }

    #[test]
    fn fresh_ids_skip_seeded_ids() {
        let store = StateStore::open_in_memory().unwrap();
        let run = store.create_run("test", t0()).unwrap();
        let mut state = test_state(3);
        state.active_instances.push(Instance {
            id: "cpouta_1".to_string(),
            instance_type: "large".to_string(),
            state: InstanceState::Active,
        });
        let mut cloud = SimCloud::new(state, store);
        cloud.attach_run(run);

        let id = cloud.add_instance(&mut Instance::request("default"), t0()).unwrap();
        assert_eq!(id, "cpouta_2");
    }

    #[test]
    fn create_beyond_limit_is_rejected() {
        let (mut cloud, _, _) = test_cloud(1);
        cloud.add_instance(&mut Instance::request("default"), t0()).unwrap();
        let err = cloud
            .add_instance(&mut Instance::request("default"), t0())
            .unwrap_err();
        assert!(matches!(err, CloudError::LimitReached { limit: 1, .. }));
        assert_eq!(cloud.instances().unwrap().len(), 1);
    }

    #[test]
    fn unknown_type_is_rejected() {
        let (mut cloud, _, _) = test_cloud(3);
        let err = cloud
            .add_instance(&mut Instance::request("gpu"), t0())
            .unwrap_err();
        assert!(matches!(err, CloudError::UnknownInstanceType { .. }));
    }

    #[test]
    fn add_without_run_fails_and_leaves_fleet_untouched() {
        let store = StateStore::open_in_memory().unwrap();
        let mut cloud = SimCloud::new(test_state(3), store);
        let err = cloud
            .add_instance(&mut Instance::request("default"), t0())
            .unwrap_err();
        assert!(matches!(err, CloudError::NoRun(_)));
        assert!(cloud.instances().unwrap().is_empty());
    }

    #[test]
    fn delete_unknown_id_is_a_no_op() {
        let (mut cloud, store, run) = test_cloud(3);
        cloud.add_instance(&mut Instance::request("default"), t0()).unwrap();
        cloud.delete_instance("cpouta_99", t0()).unwrap();

        assert_eq!(cloud.instances().unwrap().len(), 1);
        assert_eq!(event_types(&store, run), vec![FleetEventType::Created]);
    }

    #[test]
    fn delete_records_event() {
        let (mut cloud, store, run) = test_cloud(3);
        let id = cloud.add_instance(&mut Instance::request("default"), t0()).unwrap();
        cloud.delete_instance(&id, t0()).unwrap();

        assert!(cloud.instances().unwrap().is_empty());
        let events = store.list_fleet_events(run).unwrap();
        assert_eq!(events[1].event_type, FleetEventType::Deleted);
        assert_eq!(events[1].instance.id, id);
        assert_eq!(events[1].cloud_name, "cpouta");
    }

    #[test]
    fn release_prefers_flavour() {
        let (mut cloud, _, _) = test_cloud(3);
        cloud.add_instance(&mut Instance::request("default"), t0()).unwrap();
        let large = cloud.add_instance(&mut Instance::request("large"), t0()).unwrap();

        assert_eq!(cloud.release_instance(Some("large")).unwrap(), Some(large));
        assert_eq!(cloud.release_instance(Some("large")).unwrap(), Some("cpouta_1".to_string()));
        assert_eq!(cloud.release_instance(None).unwrap(), None);
    }

    // ── Cost and duration ──────────────────────────────────────────

    #[test]
    fn expected_cost_uses_remaining_time() {
        let (cloud, _, _) = test_cloud(3);
        let mut job = test_job(3, None);
        assert_eq!(cloud.expected_job_cost(&job, "default", t0()).unwrap(), 1.5);

        job.state = JobState::Running;
        job.started = Some(t0());
        let later = t0() + chrono::Duration::hours(1);
        assert_eq!(cloud.expected_job_cost(&job, "large", later).unwrap(), 4.0);
        assert!(cloud.expected_job_cost(&job, "gpu", later).is_err());
    }

    #[test]
    fn total_cost_uses_flavour_or_default() {
        let (cloud, _, _) = test_cloud(3);
        let queue = vec![test_job(2, None), test_job(1, Some("large"))];
        assert_eq!(cloud.total_cost(&queue, t0()).unwrap(), 3.0);
        assert_eq!(cloud.total_cost(&[], t0()).unwrap(), 0.0);
    }

    #[test]
    fn total_duration_with_no_active_instances_uses_one_lane() {
        let (cloud, _, _) = test_cloud(3);
        let queue = vec![test_job(3, None), test_job(1, None), test_job(2, None)];
        assert_eq!(cloud.total_duration(&queue, t0()).unwrap(), 6 * 3_600_000);
        assert_eq!(cloud.total_duration(&[], t0()).unwrap(), 0);
    }

    #[test]
    fn total_duration_deals_round_robin_in_queue_order() {
        let (mut cloud, _, _) = test_cloud(3);
        cloud.add_instance(&mut Instance::request("default"), t0()).unwrap();
        cloud.add_instance(&mut Instance::request("default"), t0()).unwrap();

        // Lanes: [3h + 2h, 1h].
        let queue = vec![test_job(3, None), test_job(1, None), test_job(2, None)];
        assert_eq!(cloud.total_duration(&queue, t0()).unwrap(), 5 * 3_600_000);
    }

    #[test]
    fn total_duration_saturates_instead_of_overflowing() {
        let (cloud, _, _) = test_cloud(3);
        let mut long = test_job(1, None);
        long.execution_time.insert(CloudTag::Csc, i64::MAX / 2 + 1);
        let queue = vec![long.clone(), long];
        assert_eq!(cloud.total_duration(&queue, t0()).unwrap(), i64::MAX);
    }

    // ── Budget ─────────────────────────────────────────────────────

    #[test]
    fn usage_accrues_for_active_instances_only() {
        let (mut cloud, _, _) = test_cloud(3);
        cloud.add_instance(&mut Instance::request("default"), t0()).unwrap();
        cloud.add_instance(&mut Instance::request("large"), t0()).unwrap();
        cloud.release_instance(Some("large")).unwrap();

        let charged = cloud.accrue_usage(chrono::Duration::minutes(30)).unwrap();
        assert_eq!(charged, 0.25);
        assert_eq!(cloud.money_used(), 0.25);
        assert_eq!(cloud.available_funds(), 99.75);
        assert_eq!(cloud.snapshot().money_used, 0.25);
    }

    #[test]
    fn sim_clouds_builds_one_per_tag() {
        let store = StateStore::open_in_memory().unwrap();
        let mut aws = test_state(2);
        aws.name = "aws".to_string();
        aws.accept_tag = CloudTag::Aws;
        let states = BTreeMap::from([(CloudTag::Csc, test_state(3)), (CloudTag::Aws, aws)]);

        let clouds = sim_clouds(states, &store);
        let names: Vec<&str> = clouds.values().map(|c| c.name()).collect();
        assert_eq!(names, vec!["aws", "cpouta"]);
    }
}
