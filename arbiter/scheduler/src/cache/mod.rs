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

//! The scheduler cache: a concurrent, event-driven snapshot of cluster state.
//!
//! Event sinks reconcile the four inbound streams (pods, nodes, scheduling
//! specs, disruption budgets) into jobs and nodes. Every sink is idempotent
//! against duplicate and out-of-order deliveries: a second Add replaces the
//! first, an Update for an unknown pod is promoted to an Add, and a Delete
//! for a missing key is a warning rather than an error. Malformed or
//! unplaceable payloads are logged and dropped; they never poison the cache.
//!
//! All sinks serialize on a single cache-wide mutex and perform no I/O, so
//! they complete in bounded time. `snapshot` produces the deep copy a
//! scheduling session runs against; `commit` applies the bindings accepted by
//! the external writer back into cache state so the next cycle does not place
//! the same task twice.

use std::collections::HashMap;

use log::{debug, warn};
use parking_lot::Mutex;

use arbiter_core::event::{ClusterEvent, Deleted, ResourceEvent};
use arbiter_core::models::{
    DisruptionBudget, JobInfo, NodeDescriptor, NodeInfo, PodDescriptor, SchedulingSpec, TaskInfo,
    TaskStatus,
};
use arbiter_core::{ArbiterError, Result};

use crate::binder::Binding;
use crate::config::SpecRemovalPolicy;

/// A deep, internally consistent copy of cache state, safe for read-only
/// iteration while the cache continues to mutate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub jobs: HashMap<String, JobInfo>,
    pub nodes: HashMap<String, NodeInfo>,
    pub scheduling_specs: HashMap<String, SchedulingSpec>,
    pub disruption_budgets: HashMap<String, DisruptionBudget>,
}

#[derive(Default)]
struct CacheState {
    jobs: HashMap<String, JobInfo>,
    nodes: HashMap<String, NodeInfo>,
    // Side tables keyed by controller UID, joined onto jobs during decorate.
    scheduling_specs: HashMap<String, SchedulingSpec>,
    disruption_budgets: HashMap<String, DisruptionBudget>,
}

pub struct SchedulerCache {
    spec_removal_policy: SpecRemovalPolicy,
    state: Mutex<CacheState>,
}

impl Default for SchedulerCache {
    fn default() -> Self {
        Self::new(SpecRemovalPolicy::Retain)
    }
}

impl SchedulerCache {
    pub fn new(spec_removal_policy: SpecRemovalPolicy) -> Self {
        Self {
            spec_removal_policy,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Apply one event from the ingest channel to the matching sink.
    pub fn apply(&self, event: ClusterEvent) {
        match event {
            ClusterEvent::Pod(ResourceEvent::Added(pod)) => self.add_pod(&pod),
            ClusterEvent::Pod(ResourceEvent::Updated { old, new }) => self.update_pod(&old, &new),
            ClusterEvent::Pod(ResourceEvent::Deleted(deleted)) => self.delete_pod(&deleted),
            ClusterEvent::Node(ResourceEvent::Added(node)) => self.add_node(&node),
            ClusterEvent::Node(ResourceEvent::Updated { old, new }) => {
                // update_node logs the failure; the sink boundary swallows it.
                let _ = self.update_node(&old, &new);
            }
            ClusterEvent::Node(ResourceEvent::Deleted(deleted)) => self.delete_node(&deleted),
            ClusterEvent::SchedulingSpec(ResourceEvent::Added(spec)) => {
                self.add_scheduling_spec(&spec)
            }
            ClusterEvent::SchedulingSpec(ResourceEvent::Updated { old, new }) => {
                self.update_scheduling_spec(&old, &new)
            }
            ClusterEvent::SchedulingSpec(ResourceEvent::Deleted(deleted)) => {
                self.delete_scheduling_spec(&deleted)
            }
            ClusterEvent::DisruptionBudget(ResourceEvent::Added(budget)) => {
                self.add_disruption_budget(&budget)
            }
            ClusterEvent::DisruptionBudget(ResourceEvent::Updated { old, new }) => {
                self.update_disruption_budget(&old, &new)
            }
            ClusterEvent::DisruptionBudget(ResourceEvent::Deleted(deleted)) => {
                self.delete_disruption_budget(&deleted)
            }
        }
    }

    pub fn add_pod(&self, pod: &PodDescriptor) {
        let task = TaskInfo::new(pod);
        if task.job_id.is_empty() {
            warn!(
                "Dropping pod {}/{} ({}): no owning controller, cannot schedule",
                pod.namespace, pod.name, pod.uid
            );
            return;
        }
        let mut state = self.state.lock();
        state.upsert_task(task);
    }

    pub fn update_pod(&self, old: &PodDescriptor, new: &PodDescriptor) {
        if old.uid != new.uid {
            warn!(
                "Pod update changed UID from {} to {}; applying as delete then add",
                old.uid, new.uid
            );
        }
        let mut state = self.state.lock();
        // Remove under the old identity first; the owning controller may have
        // changed between old and new. A missing old instance degrades to an
        // add.
        if !old.controller_uid.is_empty() {
            state.remove_task(&old.controller_uid, &old.uid);
            if old.controller_uid != new.controller_uid {
                state.maybe_collect_job(&old.controller_uid);
            }
        }

        let task = TaskInfo::new(new);
        if task.job_id.is_empty() {
            warn!(
                "Dropping pod {}/{} ({}): no owning controller, cannot schedule",
                new.namespace, new.name, new.uid
            );
            return;
        }
        state.upsert_task(task);
    }

    pub fn delete_pod(&self, deleted: &Deleted<PodDescriptor>) {
        let pod = deleted.as_inner();
        let task = TaskInfo::new(pod);
        if task.job_id.is_empty() {
            warn!(
                "Ignoring delete for pod {}/{} ({}): no owning controller",
                pod.namespace, pod.name, pod.uid
            );
            return;
        }
        let mut state = self.state.lock();
        if state.remove_task(&task.job_id, &task.uid).is_none() {
            warn!("Delete for unknown task {}: ignoring", task.uid);
            return;
        }
        state.maybe_collect_job(&task.job_id);
    }

    pub fn add_node(&self, descriptor: &NodeDescriptor) {
        let mut state = self.state.lock();
        // The entry may be a placeholder created from a task reference.
        state
            .nodes
            .entry(descriptor.name.clone())
            .and_modify(|node| node.set_node(descriptor))
            .or_insert_with(|| NodeInfo::new(descriptor));
    }

    /// Node updates mutate in place so task entries survive. An update for an
    /// unknown node is an error, not an add: the node must come from its own
    /// stream, otherwise stream ordering bugs would be masked.
    pub fn update_node(&self, old: &NodeDescriptor, new: &NodeDescriptor) -> Result<()> {
        if old.name != new.name {
            warn!(
                "Node update changed name from {} to {}; applying to {}",
                old.name, new.name, new.name
            );
        }
        let mut state = self.state.lock();
        match state.nodes.get_mut(&new.name) {
            Some(node) => {
                node.set_node(new);
                Ok(())
            }
            None => {
                warn!("Update for unknown node {}: not promoted to add", new.name);
                Err(ArbiterError::NodeNotFound(new.name.clone()))
            }
        }
    }

    pub fn delete_node(&self, deleted: &Deleted<NodeDescriptor>) {
        let descriptor = deleted.as_inner();
        let mut state = self.state.lock();
        if state.nodes.remove(&descriptor.name).is_none() {
            warn!("Delete for unknown node {}: ignoring", descriptor.name);
        }
    }

    pub fn add_scheduling_spec(&self, spec: &SchedulingSpec) {
        let mut state = self.state.lock();
        state.ensure_job(&spec.controller_uid);
        state
            .scheduling_specs
            .insert(spec.controller_uid.clone(), spec.clone());
    }

    pub fn update_scheduling_spec(&self, _old: &SchedulingSpec, new: &SchedulingSpec) {
        self.add_scheduling_spec(new);
    }

    pub fn delete_scheduling_spec(&self, deleted: &Deleted<SchedulingSpec>) {
        let spec = deleted.as_inner();
        match self.spec_removal_policy {
            SpecRemovalPolicy::Retain => {
                debug!(
                    "Retaining scheduling spec for job {} on delete",
                    spec.controller_uid
                );
            }
            SpecRemovalPolicy::Revert => {
                let mut state = self.state.lock();
                if state.scheduling_specs.remove(&spec.controller_uid).is_none() {
                    warn!(
                        "Delete for unknown scheduling spec {}: ignoring",
                        spec.controller_uid
                    );
                    return;
                }
                state.maybe_collect_job(&spec.controller_uid);
            }
        }
    }

    pub fn add_disruption_budget(&self, budget: &DisruptionBudget) {
        let mut state = self.state.lock();
        state.ensure_job(&budget.controller_uid);
        state
            .disruption_budgets
            .insert(budget.controller_uid.clone(), budget.clone());
    }

    pub fn update_disruption_budget(&self, _old: &DisruptionBudget, new: &DisruptionBudget) {
        self.add_disruption_budget(new);
    }

    pub fn delete_disruption_budget(&self, deleted: &Deleted<DisruptionBudget>) {
        let budget = deleted.as_inner();
        match self.spec_removal_policy {
            SpecRemovalPolicy::Retain => {
                debug!(
                    "Retaining disruption budget for job {} on delete",
                    budget.controller_uid
                );
            }
            SpecRemovalPolicy::Revert => {
                let mut state = self.state.lock();
                if state
                    .disruption_budgets
                    .remove(&budget.controller_uid)
                    .is_none()
                {
                    warn!(
                        "Delete for unknown disruption budget {}: ignoring",
                        budget.controller_uid
                    );
                    return;
                }
                state.maybe_collect_job(&budget.controller_uid);
            }
        }
    }

    /// Deep-copy the cache under the lock. The copy is released to the caller
    /// with no locks held.
    pub fn snapshot(&self) -> Snapshot {
        let state = self.state.lock();
        Snapshot {
            jobs: state.jobs.clone(),
            nodes: state.nodes.clone(),
            scheduling_specs: state.scheduling_specs.clone(),
            disruption_budgets: state.disruption_budgets.clone(),
        }
    }

    /// Apply accepted bindings back to cache state: the task becomes
    /// Allocated on its node and the node's idle shrinks accordingly. Unknown
    /// tasks are skipped with a warning; the next pod event reconciles them.
    pub fn commit(&self, bindings: &[Binding]) {
        let mut state = self.state.lock();
        for binding in bindings {
            let Some(job) = state.jobs.get_mut(&binding.job_id) else {
                warn!(
                    "Cannot commit binding for task {}: job {} not in cache",
                    binding.task_uid, binding.job_id
                );
                continue;
            };
            let Some(mut task) = job.remove_task(&binding.task_uid) else {
                warn!(
                    "Cannot commit binding for task {}: not in job {}",
                    binding.task_uid, binding.job_id
                );
                continue;
            };
            task.status = TaskStatus::Allocated;
            task.node_name = binding.node_name.clone();
            job.add_task(task.clone());

            let node = state
                .nodes
                .entry(binding.node_name.clone())
                .or_insert_with(|| NodeInfo::placeholder(binding.node_name.clone()));
            node.remove_task(&binding.task_uid);
            node.add_task(task);
        }
    }
}

impl CacheState {
    fn ensure_job(&mut self, job_id: &str) -> &mut JobInfo {
        self.jobs
            .entry(job_id.to_owned())
            .or_insert_with(|| JobInfo::new(job_id))
    }

    /// Insert a task, replacing any stored prior instance first so duplicate
    /// deliveries never double-count against the job or the node.
    fn upsert_task(&mut self, task: TaskInfo) {
        self.remove_task(&task.job_id, &task.uid);

        let job = self.ensure_job(&task.job_id);
        job.add_task(task.clone());

        if !task.node_name.is_empty() {
            // The node event may not have arrived yet; track the assignment
            // on a placeholder until it does.
            let node = self
                .nodes
                .entry(task.node_name.clone())
                .or_insert_with(|| NodeInfo::placeholder(task.node_name.clone()));
            node.add_task(task);
        }
    }

    /// Remove the stored instance of a task from its job and, if assigned,
    /// from its node. The stored instance's node assignment is authoritative;
    /// the event payload may be stale.
    fn remove_task(&mut self, job_id: &str, uid: &str) -> Option<TaskInfo> {
        let removed = self.jobs.get_mut(job_id)?.remove_task(uid)?;
        if !removed.node_name.is_empty() {
            if let Some(node) = self.nodes.get_mut(&removed.node_name) {
                node.remove_task(uid);
            }
        }
        Some(removed)
    }

    /// A job is collected once nothing references it: no tasks, no spec, no
    /// budget.
    fn maybe_collect_job(&mut self, job_id: &str) {
        let collectable = self
            .jobs
            .get(job_id)
            .map(|job| job.is_empty())
            .unwrap_or(false);
        if collectable
            && !self.scheduling_specs.contains_key(job_id)
            && !self.disruption_budgets.contains_key(job_id)
        {
            debug!("Collecting empty job {}", job_id);
            self.jobs.remove(job_id);
        }
    }
}
