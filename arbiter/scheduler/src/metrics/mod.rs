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

//! Scheduler observability seam. Concrete exporters live outside the core;
//! the scheduling loop reports through this trait.

use std::sync::Arc;
use std::time::Duration;

pub trait SchedulerMetricsCollector: Send + Sync {
    /// A scheduling cycle completed, producing `bindings` accepted bindings.
    fn record_cycle_completed(&self, bindings: usize, duration: Duration);

    /// A scheduling cycle aborted with an error.
    fn record_cycle_failed(&self);

    /// Pending task count observed at the start of a cycle.
    fn record_pending_tasks(&self, count: usize);
}

/// Collector that ignores every observation.
#[derive(Debug, Default)]
pub struct NoopMetricsCollector;

impl SchedulerMetricsCollector for NoopMetricsCollector {
    fn record_cycle_completed(&self, _bindings: usize, _duration: Duration) {}

    fn record_cycle_failed(&self) {}

    fn record_pending_tasks(&self, _count: usize) {}
}

pub fn default_metrics_collector() -> Arc<dyn SchedulerMetricsCollector> {
    Arc::new(NoopMetricsCollector)
}
