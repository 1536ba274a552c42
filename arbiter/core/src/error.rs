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

//! Arbiter error types

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::result;

pub type Result<T> = result::Result<T, ArbiterError>;

/// Arbiter error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArbiterError {
    Internal(String),
    /// An update event referenced a node the cache has never seen. Node
    /// updates are not promoted to adds; the node must come from its own
    /// event stream.
    NodeNotFound(String),
    JobNotFound(String),
    TaskNotFound(String),
    /// The task request does not fit into the node's idle resources.
    InsufficientResources {
        task_uid: String,
        node_name: String,
    },
    /// The gang floor for a job could not be assembled this cycle.
    GangUnsatisfiable {
        job_id: String,
        required: usize,
        matched: usize,
    },
    /// The external binding writer rejected a binding.
    BindFailure {
        retryable: bool,
        message: String,
    },
}

impl ArbiterError {
    /// Whether the operation that produced this error may succeed if retried
    /// on a later scheduling cycle.
    pub fn is_retryable(&self) -> bool {
        match self {
            ArbiterError::InsufficientResources { .. } => true,
            ArbiterError::GangUnsatisfiable { .. } => true,
            ArbiterError::BindFailure { retryable, .. } => *retryable,
            _ => false,
        }
    }
}

impl Display for ArbiterError {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            ArbiterError::Internal(desc) => write!(f, "Internal error: {}", desc),
            ArbiterError::NodeNotFound(name) => {
                write!(f, "Node {} not found in cache", name)
            }
            ArbiterError::JobNotFound(id) => write!(f, "Job {} not found", id),
            ArbiterError::TaskNotFound(uid) => write!(f, "Task {} not found", uid),
            ArbiterError::InsufficientResources {
                task_uid,
                node_name,
            } => write!(
                f,
                "Task {} does not fit on node {}: insufficient resources",
                task_uid, node_name
            ),
            ArbiterError::GangUnsatisfiable {
                job_id,
                required,
                matched,
            } => write!(
                f,
                "Job {} gang unsatisfiable: requires {} tasks, matched {}",
                job_id, required, matched
            ),
            ArbiterError::BindFailure { retryable, message } => write!(
                f,
                "Bind failure ({}): {}",
                if *retryable { "retryable" } else { "fatal" },
                message
            ),
        }
    }
}

impl Error for ArbiterError {}

#[cfg(test)]
mod test {
    use super::ArbiterError;

    #[test]
    fn test_retryable_classification() {
        assert!(ArbiterError::InsufficientResources {
            task_uid: "t1".to_owned(),
            node_name: "n1".to_owned(),
        }
        .is_retryable());

        assert!(ArbiterError::BindFailure {
            retryable: true,
            message: "timeout".to_owned(),
        }
        .is_retryable());

        assert!(!ArbiterError::BindFailure {
            retryable: false,
            message: "no such task".to_owned(),
        }
        .is_retryable());

        assert!(!ArbiterError::NodeNotFound("n1".to_owned()).is_retryable());
    }
}
