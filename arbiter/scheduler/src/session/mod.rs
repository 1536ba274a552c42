// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! A scheduling session: a bounded, single-threaded scheduling attempt over
//! an immutable snapshot of cluster state.
//!
//! The session owns deep copies of the snapshot's jobs and nodes; actions
//! mutate these copies freely and only the accepted bindings leave the
//! session when it closes. Cache state is never touched until the external
//! writer has accepted a binding and the scheduling loop commits it.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use log::{debug, error, warn};

use arbiter_core::models::{
    DisruptionBudget, JobInfo, NodeInfo, SchedulingSpec, TaskInfo, TaskStatus,
};
use arbiter_core::resource::Resource;
use arbiter_core::{ArbiterError, Result};

use crate::actions::Action;
use crate::binder::{Binding, TaskBinder};
use crate::cache::Snapshot;
use crate::config::{NodeOrderPolicy, SchedulerConfig};
use crate::plugins::Plugin;

pub struct Session {
    pub jobs: HashMap<String, JobInfo>,
    pub nodes: HashMap<String, NodeInfo>,
    pub scheduling_specs: HashMap<String, SchedulingSpec>,
    pub disruption_budgets: HashMap<String, DisruptionBudget>,
    /// Sum of node allocatable at session open; the denominator for share
    /// computations.
    pub cluster_capacity: Resource,
    pub node_order_policy: NodeOrderPolicy,
    plugins: Vec<Box<dyn Plugin>>,
    bindings: Vec<Binding>,
    deadline: Option<Instant>,
}

impl Session {
    pub fn open(
        snapshot: Snapshot,
        config: &SchedulerConfig,
        plugins: Vec<Box<dyn Plugin>>,
        deadline: Option<Instant>,
    ) -> Self {
        let mut cluster_capacity = Resource::default();
        for node in snapshot.nodes.values() {
            cluster_capacity.add(&node.allocatable);
        }
        Self {
            jobs: snapshot.jobs,
            nodes: snapshot.nodes,
            scheduling_specs: snapshot.scheduling_specs,
            disruption_budgets: snapshot.disruption_budgets,
            cluster_capacity,
            node_order_policy: config.node_order_policy,
            plugins,
            bindings: Vec::new(),
            deadline,
        }
    }

    /// Initialize plugin per-job state. Invoked by the decorate action after
    /// it has joined the side tables onto the jobs.
    pub fn initialize_plugins(&mut self) {
        let capacity = self.cluster_capacity.clone();
        for plugin in &mut self.plugins {
            plugin.on_session_open(&self.jobs, &capacity);
        }
    }

    /// Composed job ordering: lexicographic over the plugins declaring the
    /// capability, in registration order. A plugin's verdict dominates unless
    /// it is Equal; the final tie break is job id, for determinism.
    pub fn job_order(&self, a: &JobInfo, b: &JobInfo) -> Ordering {
        for plugin in &self.plugins {
            if plugin.capabilities().job_order {
                match plugin.compare_jobs(a, b) {
                    Ordering::Equal => continue,
                    ordering => return ordering,
                }
            }
        }
        a.id.cmp(&b.id)
    }

    /// Composed task ordering within a job, same composition rule.
    pub fn task_order(&self, a: &TaskInfo, b: &TaskInfo) -> Ordering {
        for plugin in &self.plugins {
            if plugin.capabilities().task_order {
                match plugin.compare_tasks(a, b) {
                    Ordering::Equal => continue,
                    ordering => return ordering,
                }
            }
        }
        a.name.cmp(&b.name).then_with(|| a.uid.cmp(&b.uid))
    }

    /// Whether the job's gang floor is satisfied in this session, pending
    /// allocations included. Plugins may override the built-in check.
    pub fn job_ready(&self, job: &JobInfo) -> bool {
        for plugin in &self.plugins {
            if plugin.capabilities().job_ready {
                if let Some(ready) = plugin.job_ready(job) {
                    return ready;
                }
            }
        }
        job.is_ready()
    }

    /// Accept a placement: validate fit, charge the node, mark the task
    /// Allocated on the session copy, buffer the binding, and fire the
    /// share-update hooks.
    pub fn allocate(&mut self, job_id: &str, task_uid: &str, node_name: &str) -> Result<()> {
        let request = self
            .jobs
            .get(job_id)
            .ok_or_else(|| ArbiterError::JobNotFound(job_id.to_owned()))?
            .tasks
            .get(task_uid)
            .ok_or_else(|| ArbiterError::TaskNotFound(task_uid.to_owned()))?
            .request
            .clone();

        let node = self
            .nodes
            .get_mut(node_name)
            .ok_or_else(|| ArbiterError::NodeNotFound(node_name.to_owned()))?;
        if !node.fits(&request) {
            return Err(ArbiterError::InsufficientResources {
                task_uid: task_uid.to_owned(),
                node_name: node_name.to_owned(),
            });
        }

        let job = self
            .jobs
            .get_mut(job_id)
            .expect("job presence checked above");
        let mut task = job
            .remove_task(task_uid)
            .expect("task presence checked above");
        task.status = TaskStatus::Allocated;
        task.node_name = node_name.to_owned();
        job.add_task(task.clone());
        node.add_task(task.clone());

        self.bindings.push(Binding {
            task_uid: task_uid.to_owned(),
            job_id: job_id.to_owned(),
            node_name: node_name.to_owned(),
        });

        let job = &self.jobs[job_id];
        for plugin in &mut self.plugins {
            if plugin.capabilities().share_update {
                plugin.on_allocation(job, &task, &self.cluster_capacity);
            }
        }
        Ok(())
    }

    /// Current idle resources per node, name-ordered. Actions use this as a
    /// scratch view for tentative placement.
    pub fn idle_view(&self) -> BTreeMap<String, Resource> {
        self.nodes
            .iter()
            .map(|(name, node)| (name.clone(), node.idle.clone()))
            .collect()
    }

    pub fn pending_bindings(&self) -> &[Binding] {
        &self.bindings
    }

    pub fn deadline_expired(&self) -> bool {
        self.deadline
            .map(|deadline| Instant::now() >= deadline)
            .unwrap_or(false)
    }

    /// Run the actions in order, passing the session. The first action error
    /// aborts the pipeline; bindings buffered so far are kept and will still
    /// be flushed on close.
    pub fn run_pipeline(&mut self, actions: &[Box<dyn Action>]) -> Result<()> {
        for action in actions {
            debug!("Running action {}", action.name());
            action.execute(self)?;
        }
        Ok(())
    }

    /// Drain the bindings buffer through the external writer. Only accepted
    /// bindings are returned for the cache commit; a retryable failure leaves
    /// the task Pending in the cache so the next session re-places it, a
    /// fatal failure is logged and dropped.
    pub async fn close(self, binder: &dyn TaskBinder) -> Vec<Binding> {
        let mut flushed = Vec::with_capacity(self.bindings.len());
        for binding in &self.bindings {
            match binder.bind(binding).await {
                Ok(()) => flushed.push(binding.clone()),
                Err(ArbiterError::BindFailure {
                    retryable: true,
                    message,
                }) => {
                    warn!(
                        "Retryable bind failure for task {}: {}; retrying next cycle",
                        binding.task_uid, message
                    );
                }
                Err(e) => {
                    error!("Dropping binding for task {}: {}", binding.task_uid, e);
                }
            }
        }
        flushed
    }
}

#[cfg(test)]
mod test {
    use std::time::{Duration, Instant};

    use super::Session;
    use crate::cache::SchedulerCache;
    use crate::config::SchedulerConfig;
    use crate::plugins::lookup_plugin;
    use crate::test_utils::{test_node, test_pod, FailingBinder, RecordingBinder, GI};
    use arbiter_core::models::TaskStatus;
    use arbiter_core::resource::Resource;
    use arbiter_core::ArbiterError;

    fn test_session(cache: &SchedulerCache) -> Session {
        let config = SchedulerConfig::default();
        let plugins = vec![lookup_plugin("drf").unwrap()];
        Session::open(cache.snapshot(), &config, plugins, None)
    }

    fn seeded_cache() -> SchedulerCache {
        let cache = SchedulerCache::default();
        cache.add_node(&test_node("n1", 4000, 8 * GI));
        cache.add_pod(&test_pod("t1", "j1", 1000, GI));
        cache
    }

    #[tokio::test]
    async fn test_allocate_accepts_fitting_task() -> arbiter_core::Result<()> {
        let cache = seeded_cache();
        let mut session = test_session(&cache);

        session.allocate("j1", "t1", "n1")?;

        assert_eq!(session.nodes["n1"].idle, Resource::new(3000, 7 * GI));
        assert_eq!(
            session.jobs["j1"].tasks["t1"].status,
            TaskStatus::Allocated
        );
        assert_eq!(session.pending_bindings().len(), 1);
        // The cache is untouched until commit.
        assert_eq!(
            cache.snapshot().jobs["j1"].tasks["t1"].status,
            TaskStatus::Pending
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_allocate_rejects_oversized_task() {
        let cache = SchedulerCache::default();
        cache.add_node(&test_node("n1", 500, 8 * GI));
        cache.add_pod(&test_pod("t1", "j1", 1000, GI));
        let mut session = test_session(&cache);

        let result = session.allocate("j1", "t1", "n1");
        assert!(matches!(
            result,
            Err(ArbiterError::InsufficientResources { .. })
        ));
        assert_eq!(session.nodes["n1"].idle, Resource::new(500, 8 * GI));
        assert!(session.pending_bindings().is_empty());
    }

    #[tokio::test]
    async fn test_idle_conservation_across_allocations() -> arbiter_core::Result<()> {
        let cache = SchedulerCache::default();
        cache.add_node(&test_node("n1", 4000, 8 * GI));
        cache.add_pod(&test_pod("t1", "j1", 1000, GI));
        cache.add_pod(&test_pod("t2", "j1", 2000, 2 * GI));
        let mut session = test_session(&cache);

        let before = session.nodes["n1"].idle.clone();
        session.allocate("j1", "t1", "n1")?;
        let mid = session.nodes["n1"].idle.clone();
        session.allocate("j1", "t2", "n1")?;
        let after = session.nodes["n1"].idle.clone();

        // Idle is monotonically non-increasing within a session.
        assert!(after.fits_in(&mid) && mid.fits_in(&before));
        // idle + used == allocatable after every accepted placement.
        let node = &session.nodes["n1"];
        let mut sum = node.idle.clone();
        sum.add(&node.used);
        assert_eq!(sum, node.allocatable);
        Ok(())
    }

    #[tokio::test]
    async fn test_job_ready_reflects_pending_allocations() -> arbiter_core::Result<()> {
        let cache = seeded_cache();
        let mut session = test_session(&cache);

        assert!(!session.job_ready(&session.jobs["j1"]));
        session.allocate("j1", "t1", "n1")?;
        assert!(session.job_ready(&session.jobs["j1"]));
        Ok(())
    }

    #[tokio::test]
    async fn test_close_flushes_accepted_bindings_only() -> arbiter_core::Result<()> {
        let cache = SchedulerCache::default();
        cache.add_node(&test_node("n1", 4000, 8 * GI));
        cache.add_pod(&test_pod("t1", "j1", 1000, GI));
        cache.add_pod(&test_pod("t2", "j1", 1000, GI));
        let mut session = test_session(&cache);
        session.allocate("j1", "t1", "n1")?;
        session.allocate("j1", "t2", "n1")?;

        let binder = FailingBinder::retryable_for("t2");
        let flushed = session.close(&binder).await;

        assert_eq!(flushed.len(), 1);
        assert_eq!(flushed[0].task_uid, "t1");
        Ok(())
    }

    #[tokio::test]
    async fn test_close_flushes_in_acceptance_order() -> arbiter_core::Result<()> {
        let cache = SchedulerCache::default();
        cache.add_node(&test_node("n1", 4000, 8 * GI));
        cache.add_pod(&test_pod("t1", "j1", 1000, GI));
        cache.add_pod(&test_pod("t2", "j1", 1000, GI));
        let mut session = test_session(&cache);
        session.allocate("j1", "t2", "n1")?;
        session.allocate("j1", "t1", "n1")?;

        let binder = RecordingBinder::default();
        session.close(&binder).await;

        let bound: Vec<String> = binder.bound().iter().map(|b| b.task_uid.clone()).collect();
        assert_eq!(bound, vec!["t2".to_owned(), "t1".to_owned()]);
        Ok(())
    }

    #[tokio::test]
    async fn test_deadline_expiry() {
        let cache = seeded_cache();
        let config = SchedulerConfig::default();

        let expired = Session::open(
            cache.snapshot(),
            &config,
            vec![],
            Some(Instant::now() - Duration::from_millis(1)),
        );
        assert!(expired.deadline_expired());

        let open_ended = Session::open(cache.snapshot(), &config, vec![], None);
        assert!(!open_ended.deadline_expired());
    }
}
