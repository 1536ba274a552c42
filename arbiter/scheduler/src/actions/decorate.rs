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

use arbiter_core::Result;

use crate::actions::Action;
use crate::session::Session;

/// Normalize every job's cross-entity joins: attach the scheduling spec and
/// disruption budget from the side tables, rebuild the derived aggregates,
/// and initialize plugin per-job state. Produces no bindings; idempotent.
pub struct Decorate;

impl Action for Decorate {
    fn name(&self) -> &'static str {
        "decorate"
    }

    fn execute(&self, session: &mut Session) -> Result<()> {
        for (job_id, job) in session.jobs.iter_mut() {
            if let Some(spec) = session.scheduling_specs.get(job_id) {
                job.set_scheduling_spec(spec.clone());
            }
            if let Some(budget) = session.disruption_budgets.get(job_id) {
                job.set_disruption_budget(budget.clone());
            }
            job.recompute_aggregates();
        }
        session.initialize_plugins();
        Ok(())
    }
}
