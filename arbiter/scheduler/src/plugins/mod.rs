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

//! Scheduling plugins and the process-wide plugin registry.
//!
//! A plugin is a named unit declaring a subset of the four capabilities; the
//! session queries `capabilities` at open and only consults a plugin for the
//! hooks it declares. Enabling a plugin for a session is configuration, not
//! code: sessions instantiate plugins by name through [`lookup_plugin`].

pub mod drf;

use std::cmp::Ordering;
use std::collections::HashMap;

use dashmap::DashMap;
use once_cell::sync::Lazy;

use arbiter_core::models::{JobInfo, TaskInfo};
use arbiter_core::resource::Resource;

/// The hooks a plugin participates in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub job_order: bool,
    pub task_order: bool,
    pub job_ready: bool,
    pub share_update: bool,
}

pub trait Plugin: Send {
    fn name(&self) -> &str;

    fn capabilities(&self) -> Capabilities;

    /// Initialize per-job state from the session's jobs and the cluster
    /// capacity. Called by the decorate action; must be idempotent.
    fn on_session_open(&mut self, _jobs: &HashMap<String, JobInfo>, _cluster_capacity: &Resource) {}

    /// Job ordering contribution. `Ordering::Less` schedules `a` before `b`;
    /// `Equal` defers to the next plugin in registration order.
    fn compare_jobs(&self, _a: &JobInfo, _b: &JobInfo) -> Ordering {
        Ordering::Equal
    }

    /// Task ordering contribution within a job, same composition rule as
    /// `compare_jobs`.
    fn compare_tasks(&self, _a: &TaskInfo, _b: &TaskInfo) -> Ordering {
        Ordering::Equal
    }

    /// Gang-readiness override. `None` defers to the built-in gang check.
    fn job_ready(&self, _job: &JobInfo) -> Option<bool> {
        None
    }

    /// Fired after every accepted allocation for the affected job, with the
    /// job's aggregates already updated.
    fn on_allocation(&mut self, _job: &JobInfo, _task: &TaskInfo, _cluster_capacity: &Resource) {}
}

pub type PluginFactory = fn() -> Box<dyn Plugin>;

static REGISTRY: Lazy<DashMap<String, PluginFactory>> = Lazy::new(|| {
    let registry: DashMap<String, PluginFactory> = DashMap::new();
    registry.insert("drf".to_owned(), drf::new_boxed as PluginFactory);
    registry
});

/// Register a plugin constructor under a name. The registry is append-only:
/// re-registering an existing name is ignored.
pub fn register_plugin(name: impl Into<String>, factory: PluginFactory) {
    REGISTRY.entry(name.into()).or_insert(factory);
}

/// Instantiate a registered plugin by name.
pub fn lookup_plugin(name: &str) -> Option<Box<dyn Plugin>> {
    REGISTRY.get(name).map(|factory| (*factory)())
}
