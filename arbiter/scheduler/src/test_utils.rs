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

//! Shared constructors and doubles for scheduler tests.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use arbiter_core::models::{DisruptionBudget, NodeDescriptor, PodDescriptor, PodPhase, SchedulingSpec};
use arbiter_core::resource::Resource;
use arbiter_core::{ArbiterError, Result};

use crate::binder::{Binding, TaskBinder};
use crate::metrics::SchedulerMetricsCollector;

pub const GI: u64 = 1024 * 1024 * 1024;

/// A pending, unassigned pod owned by `job_id`. Pass an empty `job_id` for an
/// untracked pod.
pub fn test_pod(uid: &str, job_id: &str, milli_cpu: u64, memory: u64) -> PodDescriptor {
    PodDescriptor {
        uid: uid.to_owned(),
        name: uid.to_owned(),
        namespace: "default".to_owned(),
        controller_uid: job_id.to_owned(),
        node_name: String::new(),
        phase: PodPhase::Pending,
        request: Resource::new(milli_cpu, memory),
    }
}

pub fn test_node(name: &str, milli_cpu: u64, memory: u64) -> NodeDescriptor {
    NodeDescriptor {
        name: name.to_owned(),
        capacity: Resource::new(milli_cpu, memory),
        allocatable: Resource::new(milli_cpu, memory),
    }
}

pub fn test_spec(job_id: &str, min_available: usize) -> SchedulingSpec {
    SchedulingSpec {
        controller_uid: job_id.to_owned(),
        min_available,
        queue: "default".to_owned(),
    }
}

pub fn test_budget(job_id: &str) -> DisruptionBudget {
    DisruptionBudget {
        controller_uid: job_id.to_owned(),
        name: format!("{job_id}-budget"),
        min_available: Some(1),
        max_unavailable: None,
    }
}

/// Binder that accepts everything and records the bindings it saw, in order.
#[derive(Debug, Default)]
pub struct RecordingBinder {
    bound: Mutex<Vec<Binding>>,
}

impl RecordingBinder {
    pub fn bound(&self) -> Vec<Binding> {
        self.bound.lock().clone()
    }
}

#[async_trait]
impl TaskBinder for RecordingBinder {
    async fn bind(&self, binding: &Binding) -> Result<()> {
        self.bound.lock().push(binding.clone());
        Ok(())
    }
}

/// Binder that fails for one specific task and accepts everything else.
#[derive(Debug)]
pub struct FailingBinder {
    task_uid: String,
    retryable: bool,
}

impl FailingBinder {
    pub fn retryable_for(task_uid: &str) -> Self {
        Self {
            task_uid: task_uid.to_owned(),
            retryable: true,
        }
    }

    pub fn fatal_for(task_uid: &str) -> Self {
        Self {
            task_uid: task_uid.to_owned(),
            retryable: false,
        }
    }
}

#[async_trait]
impl TaskBinder for FailingBinder {
    async fn bind(&self, binding: &Binding) -> Result<()> {
        if binding.task_uid == self.task_uid {
            Err(ArbiterError::BindFailure {
                retryable: self.retryable,
                message: format!("injected failure for task {}", binding.task_uid),
            })
        } else {
            Ok(())
        }
    }
}

/// Counting metrics collector for asserting on loop behavior.
#[derive(Debug, Default)]
pub struct TestMetricsCollector {
    cycles_completed: AtomicUsize,
    cycles_failed: AtomicUsize,
    bindings_total: AtomicUsize,
}

impl TestMetricsCollector {
    pub fn cycles_completed(&self) -> usize {
        self.cycles_completed.load(Ordering::SeqCst)
    }

    pub fn cycles_failed(&self) -> usize {
        self.cycles_failed.load(Ordering::SeqCst)
    }

    pub fn bindings_total(&self) -> usize {
        self.bindings_total.load(Ordering::SeqCst)
    }
}

impl SchedulerMetricsCollector for TestMetricsCollector {
    fn record_cycle_completed(&self, bindings: usize, _duration: Duration) {
        self.cycles_completed.fetch_add(1, Ordering::SeqCst);
        self.bindings_total.fetch_add(bindings, Ordering::SeqCst);
    }

    fn record_cycle_failed(&self) {
        self.cycles_failed.fetch_add(1, Ordering::SeqCst);
    }

    fn record_pending_tasks(&self, _count: usize) {}
}

/// Utility for running some async check multiple times to verify a condition.
/// It will run the check at the specified interval up to a maximum of the
/// specified iterations.
pub async fn await_condition<Fut: Future<Output = Result<bool>>, F: Fn() -> Fut>(
    interval: Duration,
    iterations: usize,
    cond: F,
) -> Result<bool> {
    let mut iteration = 0;

    while iteration < iterations {
        let check = cond().await?;

        if check {
            return Ok(true);
        } else {
            iteration += 1;
            tokio::time::sleep(interval).await;
        }
    }

    Ok(false)
}
