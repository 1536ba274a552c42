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

//! Dominant Resource Fairness.
//!
//! Each job's dominant share is the maximum, over resource dimensions with
//! non-zero cluster capacity, of the job's allocation divided by that
//! capacity. Jobs with a smaller dominant share order first, so allocation
//! interleaves across jobs and drives their shares toward equality.

use std::cmp::Ordering;
use std::collections::HashMap;

use arbiter_core::models::{JobInfo, TaskInfo};
use arbiter_core::resource::Resource;

use crate::plugins::{Capabilities, Plugin};

#[derive(Debug, Default)]
pub struct DrfPlugin {
    shares: HashMap<String, f64>,
}

pub fn new_boxed() -> Box<dyn Plugin> {
    Box::new(DrfPlugin::default())
}

impl DrfPlugin {
    pub fn share(&self, job_id: &str) -> f64 {
        self.shares.get(job_id).copied().unwrap_or(0.0)
    }
}

impl Plugin for DrfPlugin {
    fn name(&self) -> &str {
        "drf"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            job_order: true,
            task_order: false,
            job_ready: false,
            share_update: true,
        }
    }

    fn on_session_open(&mut self, jobs: &HashMap<String, JobInfo>, cluster_capacity: &Resource) {
        self.shares = jobs
            .iter()
            .map(|(id, job)| (id.clone(), job.allocated.dominant_ratio(cluster_capacity)))
            .collect();
    }

    fn compare_jobs(&self, a: &JobInfo, b: &JobInfo) -> Ordering {
        match self
            .share(&a.id)
            .partial_cmp(&self.share(&b.id))
            .unwrap_or(Ordering::Equal)
        {
            // Deterministic tie break by job id.
            Ordering::Equal => a.id.cmp(&b.id),
            ordering => ordering,
        }
    }

    fn on_allocation(&mut self, job: &JobInfo, _task: &TaskInfo, cluster_capacity: &Resource) {
        self.shares.insert(
            job.id.clone(),
            job.allocated.dominant_ratio(cluster_capacity),
        );
    }
}

#[cfg(test)]
mod test {
    use std::cmp::Ordering;
    use std::collections::HashMap;

    use super::DrfPlugin;
    use crate::plugins::Plugin;
    use crate::test_utils::GI;
    use arbiter_core::models::{JobInfo, PodDescriptor, PodPhase, TaskInfo};
    use arbiter_core::resource::Resource;

    fn job_with_allocation(id: &str, milli_cpu: u64, memory: u64) -> JobInfo {
        let mut job = JobInfo::new(id);
        job.add_task(TaskInfo::new(&PodDescriptor {
            uid: format!("{id}-t1"),
            name: format!("{id}-t1"),
            namespace: "default".to_owned(),
            controller_uid: id.to_owned(),
            node_name: "n1".to_owned(),
            phase: PodPhase::Running,
            request: Resource::new(milli_cpu, memory),
        }));
        job
    }

    #[test]
    fn test_share_is_dominant_dimension() {
        let mut drf = DrfPlugin::default();
        let capacity = Resource::new(8000, 8 * GI);

        let jobs: HashMap<String, JobInfo> = [
            ("j1".to_owned(), job_with_allocation("j1", 4000, GI)),
            ("j2".to_owned(), job_with_allocation("j2", 1000, 6 * GI)),
        ]
        .into();
        drf.on_session_open(&jobs, &capacity);

        assert!((drf.share("j1") - 0.5).abs() < f64::EPSILON);
        assert!((drf.share("j2") - 0.75).abs() < f64::EPSILON);
        assert_eq!(drf.share("unknown"), 0.0);
    }

    #[test]
    fn test_smaller_share_orders_first() {
        let mut drf = DrfPlugin::default();
        let capacity = Resource::new(8000, 8 * GI);

        let j1 = job_with_allocation("j1", 4000, GI);
        let j2 = job_with_allocation("j2", 1000, 6 * GI);
        let jobs: HashMap<String, JobInfo> =
            [("j1".to_owned(), j1.clone()), ("j2".to_owned(), j2.clone())].into();
        drf.on_session_open(&jobs, &capacity);

        assert_eq!(drf.compare_jobs(&j1, &j2), Ordering::Less);
        assert_eq!(drf.compare_jobs(&j2, &j1), Ordering::Greater);
    }

    #[test]
    fn test_tie_breaks_by_job_id() {
        let drf = DrfPlugin::default();
        let j1 = JobInfo::new("j1");
        let j2 = JobInfo::new("j2");
        assert_eq!(drf.compare_jobs(&j1, &j2), Ordering::Less);
        assert_eq!(drf.compare_jobs(&j2, &j1), Ordering::Greater);
    }

    #[test]
    fn test_allocation_updates_only_affected_job() {
        let mut drf = DrfPlugin::default();
        let capacity = Resource::new(8000, 8 * GI);

        let jobs: HashMap<String, JobInfo> = [
            ("j1".to_owned(), JobInfo::new("j1")),
            ("j2".to_owned(), JobInfo::new("j2")),
        ]
        .into();
        drf.on_session_open(&jobs, &capacity);
        assert_eq!(drf.share("j1"), 0.0);

        let j1 = job_with_allocation("j1", 2000, GI);
        let task = j1.tasks.values().next().unwrap().clone();
        drf.on_allocation(&j1, &task, &capacity);

        assert!((drf.share("j1") - 0.25).abs() < f64::EPSILON);
        assert_eq!(drf.share("j2"), 0.0);
    }
}
