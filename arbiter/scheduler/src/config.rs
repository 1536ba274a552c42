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
//

//! Arbiter scheduler specific configuration

use clap::ArgEnum;
use std::time::Duration;

/// Configurations for the arbiter scheduler of scheduling jobs and tasks
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Interval between scheduling cycles in milliseconds
    pub schedule_interval_ms: u64,
    /// Deadline for a single scheduling session in milliseconds. Actions stop
    /// cleanly when the deadline expires; buffered bindings are kept.
    pub session_timeout_ms: u64,
    /// The ingest channel buffer size. For a system of high event throughput, a larger value like 1000000 is recommended
    pub event_channel_buffer_size: u32,
    /// The node ordering policy used when placing a task
    pub node_order_policy: NodeOrderPolicy,
    /// What happens to a job's gang floor when its scheduling spec (or
    /// disruption budget) is deleted
    pub spec_removal_policy: SpecRemovalPolicy,
    /// Names of the plugins enabled for every session, in registration order
    pub plugins: Vec<String>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            schedule_interval_ms: 1000,
            session_timeout_ms: 5000,
            event_channel_buffer_size: 10000,
            node_order_policy: NodeOrderPolicy::NameAscending,
            spec_removal_policy: SpecRemovalPolicy::Retain,
            plugins: vec!["drf".to_owned()],
        }
    }
}

impl SchedulerConfig {
    pub fn schedule_interval(&self) -> Duration {
        Duration::from_millis(self.schedule_interval_ms)
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_millis(self.session_timeout_ms)
    }

    pub fn with_schedule_interval_ms(mut self, interval_ms: u64) -> Self {
        self.schedule_interval_ms = interval_ms;
        self
    }

    pub fn with_session_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.session_timeout_ms = timeout_ms;
        self
    }

    pub fn with_event_channel_buffer_size(mut self, buffer_size: u32) -> Self {
        self.event_channel_buffer_size = buffer_size;
        self
    }

    pub fn with_node_order_policy(mut self, policy: NodeOrderPolicy) -> Self {
        self.node_order_policy = policy;
        self
    }

    pub fn with_spec_removal_policy(mut self, policy: SpecRemovalPolicy) -> Self {
        self.spec_removal_policy = policy;
        self
    }

    pub fn with_plugins(mut self, plugins: Vec<String>) -> Self {
        self.plugins = plugins;
        self
    }
}

// an enum used to configure the node ordering policy
#[derive(Clone, ArgEnum, Copy, Debug, PartialEq, Eq, serde::Deserialize)]
pub enum NodeOrderPolicy {
    /// Deterministic first fit in node-name order
    NameAscending,
    /// Among fitting nodes, pick the one with the least idle left over
    BestFit,
}

impl std::str::FromStr for NodeOrderPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        ArgEnum::from_str(s, true)
    }
}

// an enum used to configure what a scheduling spec delete does to the job.
// The upstream source treats the delete as a no-op, which leaves a stale gang
// floor in place; Revert makes the job fall back to min_available = task count.
#[derive(Clone, ArgEnum, Copy, Debug, PartialEq, Eq, serde::Deserialize)]
pub enum SpecRemovalPolicy {
    Retain,
    Revert,
}

impl std::str::FromStr for SpecRemovalPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        ArgEnum::from_str(s, true)
    }
}

#[cfg(test)]
mod test {
    use super::{NodeOrderPolicy, SchedulerConfig, SpecRemovalPolicy};

    #[test]
    fn test_builder() {
        let config = SchedulerConfig::default()
            .with_schedule_interval_ms(250)
            .with_node_order_policy(NodeOrderPolicy::BestFit)
            .with_spec_removal_policy(SpecRemovalPolicy::Revert)
            .with_plugins(vec!["drf".to_owned()]);

        assert_eq!(config.schedule_interval().as_millis(), 250);
        assert_eq!(config.node_order_policy, NodeOrderPolicy::BestFit);
        assert_eq!(config.spec_removal_policy, SpecRemovalPolicy::Revert);
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!(
            "best-fit".parse::<NodeOrderPolicy>().unwrap(),
            NodeOrderPolicy::BestFit
        );
        assert_eq!(
            "retain".parse::<SpecRemovalPolicy>().unwrap(),
            SpecRemovalPolicy::Retain
        );
        assert!("bogus".parse::<NodeOrderPolicy>().is_err());
    }
}
