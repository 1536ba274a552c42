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

//! Typed event envelopes for the four inbound resource streams.

use crate::models::{DisruptionBudget, NodeDescriptor, PodDescriptor, SchedulingSpec};

/// Payload of a delete event. When the watch client has already lost the live
/// object it delivers a tombstone carrying the last-known state; the cache
/// treats both forms identically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Deleted<T> {
    Live(T),
    Tombstone(T),
}

impl<T> Deleted<T> {
    pub fn as_inner(&self) -> &T {
        match self {
            Deleted::Live(obj) => obj,
            Deleted::Tombstone(obj) => obj,
        }
    }
}

/// A single event on one resource stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceEvent<T> {
    Added(T),
    Updated { old: T, new: T },
    Deleted(Deleted<T>),
}

/// Union of the four inbound streams, as consumed by the scheduler's ingest
/// channel. Events from a single stream arrive in delivery order; streams are
/// unordered relative to each other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterEvent {
    Pod(ResourceEvent<PodDescriptor>),
    Node(ResourceEvent<NodeDescriptor>),
    SchedulingSpec(ResourceEvent<SchedulingSpec>),
    DisruptionBudget(ResourceEvent<DisruptionBudget>),
}
