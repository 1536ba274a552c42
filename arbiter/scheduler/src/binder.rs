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

//! The outbound boundary: accepted placements and the writer that
//! materializes them.

use async_trait::async_trait;
use log::info;

use arbiter_core::Result;

/// An accepted (task, node) pair awaiting materialization at the external
/// boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub task_uid: String,
    pub job_id: String,
    pub node_name: String,
}

/// The external binding writer. Session close flushes its buffered bindings
/// through this trait one at a time; a failure is classified retryable or
/// fatal via [`ArbiterError::BindFailure`](arbiter_core::ArbiterError).
///
/// The writer is the commit point: only bindings it accepts are applied back
/// to the scheduler cache.
#[async_trait]
pub trait TaskBinder: Send + Sync {
    async fn bind(&self, binding: &Binding) -> Result<()>;
}

/// A binder that accepts every placement and logs it. Useful as a default in
/// dry runs and examples.
#[derive(Debug, Default)]
pub struct LoggingBinder;

#[async_trait]
impl TaskBinder for LoggingBinder {
    async fn bind(&self, binding: &Binding) -> Result<()> {
        info!(
            "Binding task {} of job {} to node {}",
            binding.task_uid, binding.job_id, binding.node_name
        );
        Ok(())
    }
}
