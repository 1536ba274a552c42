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

//! The action pipeline: decorate → guarantee → allocate.
//!
//! Each action is a pure function over the session: it either appends to the
//! bindings buffer or leaves the session unchanged, and never performs I/O.
//! A preempt action would slot in between guarantee and allocate; the
//! pipeline is an ordered list precisely so that insertion stays cheap.

mod allocate;
mod decorate;
mod guarantee;

use std::collections::BTreeMap;

pub use allocate::Allocate;
pub use decorate::Decorate;
pub use guarantee::Guarantee;

use arbiter_core::resource::Resource;
use arbiter_core::Result;

use crate::config::NodeOrderPolicy;
use crate::session::Session;

pub trait Action: Send + Sync {
    fn name(&self) -> &'static str;

    fn execute(&self, session: &mut Session) -> Result<()>;
}

/// The fixed pipeline, in its fixed order.
pub fn default_pipeline() -> Vec<Box<dyn Action>> {
    vec![
        Box::new(Decorate),
        Box::new(Guarantee),
        Box::new(Allocate),
    ]
}

/// Pick a node for `request` from an idle view, honoring the configured
/// policy. Name-ascending takes the first fit in name order; best-fit takes
/// the fitting node with the least idle left over (CPU first, then memory),
/// ties by name.
pub(crate) fn select_node(
    policy: NodeOrderPolicy,
    request: &Resource,
    idle_by_node: &BTreeMap<String, Resource>,
) -> Option<String> {
    match policy {
        NodeOrderPolicy::NameAscending => idle_by_node
            .iter()
            .find(|(_, idle)| request.fits_in(idle))
            .map(|(name, _)| name.clone()),
        NodeOrderPolicy::BestFit => idle_by_node
            .iter()
            .filter(|(_, idle)| request.fits_in(idle))
            .min_by_key(|(name, idle)| {
                (
                    idle.milli_cpu - request.milli_cpu,
                    idle.memory - request.memory,
                    (*name).clone(),
                )
            })
            .map(|(name, _)| name.clone()),
    }
}
