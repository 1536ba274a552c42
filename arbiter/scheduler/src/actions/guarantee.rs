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

use itertools::Itertools;
use log::{debug, info};

use arbiter_core::models::TaskInfo;
use arbiter_core::{ArbiterError, Result};

use crate::actions::{select_node, Action};
use crate::session::Session;

/// Reserve gang capacity: for every job short of its gang floor, place
/// enough tasks to reach `min_available`, all together or not at all. The
/// candidate set is chosen against a scratch idle view first so a job that
/// cannot assemble its gang leaves the session untouched. Downstream
/// allocation then only ever sees gang-safe jobs.
pub struct Guarantee;

impl Action for Guarantee {
    fn name(&self) -> &'static str {
        "guarantee"
    }

    fn execute(&self, session: &mut Session) -> Result<()> {
        // Job id order for stable reservation across cycles.
        let job_ids: Vec<String> = session.jobs.keys().sorted().cloned().collect();
        for job_id in job_ids {
            if session.deadline_expired() {
                info!("Guarantee stopping early: session deadline expired");
                break;
            }

            let (needed, mut pending) = {
                let job = &session.jobs[&job_id];
                let min_available = job.min_available();
                if min_available == 0 {
                    continue;
                }
                let needed = min_available.saturating_sub(job.ready_task_count());
                if needed == 0 {
                    continue;
                }
                let pending: Vec<TaskInfo> = job
                    .tasks
                    .values()
                    .filter(|task| task.is_pending())
                    .cloned()
                    .collect();
                (needed, pending)
            };
            pending.sort_by(|a, b| session.task_order(a, b));

            // Tentative placement against a scratch idle view.
            let mut scratch = session.idle_view();
            let mut placements: Vec<(String, String)> = Vec::with_capacity(needed);
            for task in &pending {
                if placements.len() == needed {
                    break;
                }
                if let Some(node_name) =
                    select_node(session.node_order_policy, &task.request, &scratch)
                {
                    scratch
                        .get_mut(&node_name)
                        .expect("node selected from the view")
                        .sub(&task.request);
                    placements.push((task.uid.clone(), node_name));
                }
            }

            if placements.len() < needed {
                let skip = ArbiterError::GangUnsatisfiable {
                    job_id: job_id.clone(),
                    required: needed,
                    matched: placements.len(),
                };
                debug!("Skipping job this cycle: {}", skip);
                continue;
            }

            // The scratch fit guarantees these succeed, so the gang commits
            // as a unit.
            for (task_uid, node_name) in placements {
                session.allocate(&job_id, &task_uid, &node_name)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::Guarantee;
    use crate::actions::{Action, Decorate};
    use crate::cache::SchedulerCache;
    use crate::config::SchedulerConfig;
    use crate::plugins::lookup_plugin;
    use crate::session::Session;
    use crate::test_utils::{test_node, test_pod, test_spec, GI};

    fn run_guarantee(cache: &SchedulerCache) -> arbiter_core::Result<Session> {
        let config = SchedulerConfig::default();
        let plugins = vec![lookup_plugin("drf").unwrap()];
        let mut session = Session::open(cache.snapshot(), &config, plugins, None);
        Decorate.execute(&mut session)?;
        Guarantee.execute(&mut session)?;
        Ok(session)
    }

    #[test]
    fn test_gang_reserved_across_nodes() -> arbiter_core::Result<()> {
        let cache = SchedulerCache::default();
        cache.add_node(&test_node("n1", 1000, 4 * GI));
        cache.add_node(&test_node("n2", 1000, 4 * GI));
        for uid in ["t1", "t2"] {
            cache.add_pod(&test_pod(uid, "j1", 1000, GI));
        }
        cache.add_scheduling_spec(&test_spec("j1", 2));

        let session = run_guarantee(&cache)?;
        assert_eq!(session.pending_bindings().len(), 2);
        assert!(session.job_ready(&session.jobs["j1"]));
        Ok(())
    }

    #[test]
    fn test_all_or_nothing_per_job() -> arbiter_core::Result<()> {
        let cache = SchedulerCache::default();
        cache.add_node(&test_node("n1", 3000, 8 * GI));
        // j1's gang of three cannot fit together, j2's gang of two can.
        for uid in ["a1", "a2", "a3"] {
            cache.add_pod(&test_pod(uid, "j1", 2000, GI));
        }
        cache.add_scheduling_spec(&test_spec("j1", 3));
        for uid in ["b1", "b2"] {
            cache.add_pod(&test_pod(uid, "j2", 1000, GI));
        }
        cache.add_scheduling_spec(&test_spec("j2", 2));

        let session = run_guarantee(&cache)?;

        let bound_jobs: Vec<&str> = session
            .pending_bindings()
            .iter()
            .map(|binding| binding.job_id.as_str())
            .collect();
        assert_eq!(bound_jobs, vec!["j2", "j2"]);
        assert!(session.jobs["j1"].tasks.values().all(|t| t.is_pending()));
        Ok(())
    }

    #[test]
    fn test_partially_running_gang_only_tops_up() -> arbiter_core::Result<()> {
        let cache = SchedulerCache::default();
        cache.add_node(&test_node("n1", 4000, 8 * GI));
        let mut running = test_pod("t1", "j1", 1000, GI);
        running.node_name = "n1".to_owned();
        running.phase = arbiter_core::models::PodPhase::Running;
        cache.add_pod(&running);
        cache.add_pod(&test_pod("t2", "j1", 1000, GI));
        cache.add_pod(&test_pod("t3", "j1", 1000, GI));
        cache.add_scheduling_spec(&test_spec("j1", 2));

        let session = run_guarantee(&cache)?;

        // One task is already running, so the gang needs exactly one more.
        assert_eq!(session.pending_bindings().len(), 1);
        assert_eq!(session.pending_bindings()[0].task_uid, "t2");
        Ok(())
    }

    #[test]
    fn test_no_spec_means_every_task_or_none() -> arbiter_core::Result<()> {
        let cache = SchedulerCache::default();
        cache.add_node(&test_node("n1", 1000, 8 * GI));
        cache.add_pod(&test_pod("t1", "j1", 1000, GI));
        cache.add_pod(&test_pod("t2", "j1", 1000, GI));

        let session = run_guarantee(&cache)?;

        // min_available defaults to the task count and both do not fit.
        assert!(session.pending_bindings().is_empty());
        Ok(())
    }
}
