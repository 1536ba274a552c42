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

use std::collections::{HashMap, VecDeque};

use log::{debug, info};

use arbiter_core::models::TaskInfo;
use arbiter_core::resource::Resource;
use arbiter_core::Result;

use crate::actions::{select_node, Action};
use crate::session::Session;

/// Fair-share allocation over gang-safe jobs.
///
/// One task is placed per round, always from the job that is minimal under
/// the composed job order; the share update after each binding can hand the
/// next round to a different job, which is what interleaves allocation under
/// DRF. Jobs whose gang floor is unsatisfied never allocate here; tasks that
/// fit nowhere stay Pending for the next cycle.
pub struct Allocate;

impl Action for Allocate {
    fn name(&self) -> &'static str {
        "allocate"
    }

    fn execute(&self, session: &mut Session) -> Result<()> {
        // Per-job queues of pending tasks, in task order.
        let mut queues: HashMap<String, VecDeque<(String, Resource)>> = HashMap::new();
        for (job_id, job) in &session.jobs {
            let mut pending: Vec<&TaskInfo> =
                job.tasks.values().filter(|task| task.is_pending()).collect();
            if pending.is_empty() {
                continue;
            }
            pending.sort_by(|a, b| session.task_order(a, b));
            queues.insert(
                job_id.clone(),
                pending
                    .into_iter()
                    .map(|task| (task.uid.clone(), task.request.clone()))
                    .collect(),
            );
        }

        let mut idle = session.idle_view();
        loop {
            if session.deadline_expired() {
                info!("Allocate stopping early: session deadline expired");
                break;
            }

            let next = session
                .jobs
                .values()
                .filter(|job| {
                    queues
                        .get(&job.id)
                        .map(|queue| !queue.is_empty())
                        .unwrap_or(false)
                        && session.job_ready(job)
                })
                .min_by(|a, b| session.job_order(a, b))
                .map(|job| job.id.clone());
            let Some(job_id) = next else {
                break;
            };

            let (task_uid, request) = queues
                .get_mut(&job_id)
                .expect("queue presence checked in filter")
                .pop_front()
                .expect("queue non-empty checked in filter");

            match select_node(session.node_order_policy, &request, &idle) {
                Some(node_name) => match session.allocate(&job_id, &task_uid, &node_name) {
                    Ok(()) => {
                        idle.get_mut(&node_name)
                            .expect("node selected from the view")
                            .sub(&request);
                    }
                    Err(e) if e.is_retryable() => {
                        debug!("Task {} of job {} stays pending: {}", task_uid, job_id, e);
                    }
                    Err(e) => return Err(e),
                },
                None => {
                    debug!(
                        "Task {} of job {} does not fit on any node this cycle",
                        task_uid, job_id
                    );
                }
            }
        }
        Ok(())
    }
}
