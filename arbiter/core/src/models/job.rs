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

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::task::TaskInfo;
use crate::resource::Resource;

/// Gang scheduling requirements for a job, delivered on its own event stream
/// and keyed by the controller UID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulingSpec {
    pub controller_uid: String,
    /// The gang floor: the minimum number of simultaneously scheduled tasks
    /// for the job to make progress.
    pub min_available: usize,
    pub queue: String,
}

/// Disruption budget attached to a job. The scheduler only tracks its
/// presence; enforcement happens outside the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisruptionBudget {
    pub controller_uid: String,
    pub name: String,
    pub min_available: Option<usize>,
    pub max_unavailable: Option<usize>,
}

/// A logical group of tasks belonging to the same controller.
#[derive(Debug, Clone, PartialEq)]
pub struct JobInfo {
    pub id: String,
    pub tasks: HashMap<String, TaskInfo>,
    pub scheduling_spec: Option<SchedulingSpec>,
    pub disruption_budget: Option<DisruptionBudget>,
    /// Sum of the requests of all non-terminal tasks.
    pub total_request: Resource,
    /// Sum of the requests of all scheduled, non-terminal tasks.
    pub allocated: Resource,
}

impl JobInfo {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tasks: HashMap::new(),
            scheduling_spec: None,
            disruption_budget: None,
            total_request: Resource::default(),
            allocated: Resource::default(),
        }
    }

    /// Insert a task, keeping the derived aggregates in step. The caller is
    /// responsible for removing any prior instance first; the cache's
    /// delete-then-add discipline guarantees replacement semantics.
    pub fn add_task(&mut self, task: TaskInfo) {
        if !task.status.is_terminal() {
            self.total_request.add(&task.request);
            if task.status.is_scheduled() {
                self.allocated.add(&task.request);
            }
        }
        self.tasks.insert(task.uid.clone(), task);
    }

    /// Remove a task by UID. Returns the removed task, or `None` when the UID
    /// was not present.
    pub fn remove_task(&mut self, uid: &str) -> Option<TaskInfo> {
        let task = self.tasks.remove(uid)?;
        if !task.status.is_terminal() {
            self.total_request.sub(&task.request);
            if task.status.is_scheduled() {
                self.allocated.sub(&task.request);
            }
        }
        Some(task)
    }

    /// Rebuild the derived aggregates from the task table. Incremental
    /// maintenance in `add_task`/`remove_task` keeps them current; this is
    /// the idempotent form used when a session normalizes its copies.
    pub fn recompute_aggregates(&mut self) {
        let mut total_request = Resource::default();
        let mut allocated = Resource::default();
        for task in self.tasks.values() {
            if !task.status.is_terminal() {
                total_request.add(&task.request);
                if task.status.is_scheduled() {
                    allocated.add(&task.request);
                }
            }
        }
        self.total_request = total_request;
        self.allocated = allocated;
    }

    pub fn set_scheduling_spec(&mut self, spec: SchedulingSpec) {
        self.scheduling_spec = Some(spec);
    }

    pub fn set_disruption_budget(&mut self, budget: DisruptionBudget) {
        self.disruption_budget = Some(budget);
    }

    /// The gang floor. A job without a scheduling spec is all-or-nothing:
    /// every task must be schedulable together.
    pub fn min_available(&self) -> usize {
        self.scheduling_spec
            .as_ref()
            .map(|spec| spec.min_available)
            .unwrap_or_else(|| self.tasks.len())
    }

    /// Count of non-terminal tasks at Allocated or better.
    pub fn ready_task_count(&self) -> usize {
        self.tasks
            .values()
            .filter(|t| t.status.is_scheduled())
            .count()
    }

    /// The gang invariant: the job is runnable iff enough of its tasks are
    /// scheduled simultaneously.
    pub fn is_ready(&self) -> bool {
        self.ready_task_count() >= self.min_available()
    }

    /// A job with no tasks, no spec, and no budget holds no state worth
    /// keeping and may be collected.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty() && self.scheduling_spec.is_none() && self.disruption_budget.is_none()
    }
}
