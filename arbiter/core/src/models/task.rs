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

use serde::{Deserialize, Serialize};

use crate::resource::Resource;

/// The lifecycle phase reported by the upstream pod source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

/// A pod-like object as delivered on the task event stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodDescriptor {
    /// Stable UID assigned by the upstream API.
    pub uid: String,
    pub name: String,
    pub namespace: String,
    /// UID of the owning controller. Empty when the pod is untracked, in
    /// which case the scheduler will never place it.
    pub controller_uid: String,
    /// Name of the node the pod is assigned to, empty until placed.
    pub node_name: String,
    pub phase: PodPhase,
    pub request: Resource,
}

/// Scheduler-internal task status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Pending,
    /// Accepted by the scheduler but not yet written to the API.
    Allocated,
    /// Written to the API but not yet started.
    Bound,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Succeeded | TaskStatus::Failed)
    }

    /// True for Allocated and everything past it in the non-terminal
    /// lifecycle. These are the statuses that count toward a job's gang floor.
    pub fn is_scheduled(&self) -> bool {
        matches!(
            self,
            TaskStatus::Allocated | TaskStatus::Bound | TaskStatus::Running
        )
    }

    /// Derive the scheduler-internal status from the upstream phase. This is
    /// the single place the cache interprets external status; the mapping is
    /// total.
    pub fn from_phase(phase: PodPhase, node_name: &str) -> TaskStatus {
        match phase {
            PodPhase::Succeeded => TaskStatus::Succeeded,
            PodPhase::Failed => TaskStatus::Failed,
            PodPhase::Running => {
                if node_name.is_empty() {
                    // A running pod without a node is an upstream
                    // inconsistency; don't guess.
                    TaskStatus::Unknown
                } else {
                    TaskStatus::Running
                }
            }
            PodPhase::Pending => {
                if node_name.is_empty() {
                    TaskStatus::Pending
                } else {
                    TaskStatus::Bound
                }
            }
            PodPhase::Unknown => TaskStatus::Unknown,
        }
    }
}

/// A unit of work requesting resources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskInfo {
    pub uid: String,
    pub name: String,
    pub namespace: String,
    /// UID of the owning job, empty for untracked tasks.
    pub job_id: String,
    /// Assigned node, empty until placed.
    pub node_name: String,
    pub status: TaskStatus,
    pub request: Resource,
}

impl TaskInfo {
    pub fn new(pod: &PodDescriptor) -> Self {
        Self {
            uid: pod.uid.clone(),
            name: pod.name.clone(),
            namespace: pod.namespace.clone(),
            job_id: pod.controller_uid.clone(),
            node_name: pod.node_name.clone(),
            status: TaskStatus::from_phase(pod.phase, &pod.node_name),
            request: pod.request.clone(),
        }
    }

    /// Whether this task occupies resources on its node: it has been placed
    /// and has not reached a terminal status.
    pub fn occupies_node(&self) -> bool {
        !self.node_name.is_empty() && !self.status.is_terminal()
    }

    pub fn is_pending(&self) -> bool {
        self.status == TaskStatus::Pending
    }
}

#[cfg(test)]
mod test {
    use super::{PodDescriptor, PodPhase, TaskInfo, TaskStatus};
    use crate::resource::Resource;

    fn test_pod(phase: PodPhase, node_name: &str) -> PodDescriptor {
        PodDescriptor {
            uid: "task-1".to_owned(),
            name: "worker-0".to_owned(),
            namespace: "default".to_owned(),
            controller_uid: "job-1".to_owned(),
            node_name: node_name.to_owned(),
            phase,
            request: Resource::new(1000, 1024),
        }
    }

    #[test]
    fn test_status_derivation_is_total() {
        let cases = [
            (PodPhase::Pending, "", TaskStatus::Pending),
            (PodPhase::Pending, "n1", TaskStatus::Bound),
            (PodPhase::Running, "n1", TaskStatus::Running),
            (PodPhase::Running, "", TaskStatus::Unknown),
            (PodPhase::Succeeded, "n1", TaskStatus::Succeeded),
            (PodPhase::Failed, "", TaskStatus::Failed),
            (PodPhase::Unknown, "n1", TaskStatus::Unknown),
        ];
        for (phase, node, expected) in cases {
            assert_eq!(TaskStatus::from_phase(phase, node), expected);
        }
    }

    #[test]
    fn test_occupies_node() {
        assert!(TaskInfo::new(&test_pod(PodPhase::Running, "n1")).occupies_node());
        assert!(TaskInfo::new(&test_pod(PodPhase::Pending, "n1")).occupies_node());
        assert!(!TaskInfo::new(&test_pod(PodPhase::Pending, "")).occupies_node());
        assert!(!TaskInfo::new(&test_pod(PodPhase::Succeeded, "n1")).occupies_node());
    }
}
