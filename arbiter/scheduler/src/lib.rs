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

//! Arbiter scheduling engine: an event-driven cluster cache plus a
//! session-based scheduling pipeline with gang semantics and DRF fair share.

pub mod actions;
pub mod binder;
pub mod cache;
pub mod config;
pub mod metrics;
pub mod plugins;
pub mod server;
pub mod session;
pub mod test_utils;
