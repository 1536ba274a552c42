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

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::task::TaskInfo;
use crate::resource::Resource;

/// A compute host as delivered on the node event stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDescriptor {
    pub name: String,
    pub capacity: Resource,
    pub allocatable: Resource,
}

/// A compute host tracked by the scheduler cache.
///
/// The invariant `idle + used == allocatable` holds after every mutation;
/// `used` is the sum of the requests of the assigned non-terminal tasks.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeInfo {
    pub name: String,
    pub capacity: Resource,
    pub allocatable: Resource,
    pub used: Resource,
    pub idle: Resource,
    pub tasks: HashMap<String, TaskInfo>,
    /// False for placeholder entries created because a task referenced a node
    /// before the node's own add event arrived.
    pub synced: bool,
}

impl NodeInfo {
    /// A placeholder node created from a task reference. It carries no
    /// capacity until the real node event arrives.
    pub fn placeholder(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            capacity: Resource::default(),
            allocatable: Resource::default(),
            used: Resource::default(),
            idle: Resource::default(),
            tasks: HashMap::new(),
            synced: false,
        }
    }

    pub fn new(descriptor: &NodeDescriptor) -> Self {
        let mut node = Self::placeholder(descriptor.name.clone());
        node.set_node(descriptor);
        node
    }

    /// Apply a node event in place so existing task entries survive.
    pub fn set_node(&mut self, descriptor: &NodeDescriptor) {
        self.name = descriptor.name.clone();
        self.capacity = descriptor.capacity.clone();
        self.allocatable = descriptor.allocatable.clone();
        self.synced = true;
        self.recompute_idle();
    }

    fn recompute_idle(&mut self) {
        let mut idle = self.allocatable.clone();
        idle.sub(&self.used);
        self.idle = idle;
    }

    /// Insert an assigned task and charge its request against the node.
    /// Terminal tasks never enter the task set.
    pub fn add_task(&mut self, task: TaskInfo) {
        if task.status.is_terminal() {
            return;
        }
        self.used.add(&task.request);
        self.recompute_idle();
        self.tasks.insert(task.uid.clone(), task);
    }

    /// Remove a task by UID and release its request. Returns the removed
    /// task, or `None` when the UID was not present.
    pub fn remove_task(&mut self, uid: &str) -> Option<TaskInfo> {
        let task = self.tasks.remove(uid)?;
        self.used.sub(&task.request);
        self.recompute_idle();
        Some(task)
    }

    /// Whether a request fits into the node's current idle resources.
    pub fn fits(&self, request: &Resource) -> bool {
        request.fits_in(&self.idle)
    }
}
