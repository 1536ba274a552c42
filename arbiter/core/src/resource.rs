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

//! Resource vectors and componentwise arithmetic.
//!
//! A [`Resource`] always carries CPU (millicores) and memory (bytes) and may
//! carry additional named scalar dimensions (e.g. GPUs). All arithmetic is
//! componentwise; subtraction saturates at zero so that a cache reflecting an
//! overcommitted node never goes negative.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    /// CPU in millicores.
    pub milli_cpu: u64,
    /// Memory in bytes.
    pub memory: u64,
    /// Extended scalar dimensions keyed by resource name. A dimension absent
    /// from the map is zero.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub scalars: BTreeMap<String, u64>,
}

impl Resource {
    pub fn new(milli_cpu: u64, memory: u64) -> Self {
        Self {
            milli_cpu,
            memory,
            scalars: BTreeMap::new(),
        }
    }

    pub fn with_scalar(mut self, name: impl Into<String>, quantity: u64) -> Self {
        self.scalars.insert(name.into(), quantity);
        self
    }

    /// Componentwise addition in place.
    pub fn add(&mut self, other: &Resource) {
        self.milli_cpu += other.milli_cpu;
        self.memory += other.memory;
        for (name, quantity) in &other.scalars {
            *self.scalars.entry(name.clone()).or_insert(0) += quantity;
        }
    }

    /// Componentwise subtraction in place, saturating at zero.
    pub fn sub(&mut self, other: &Resource) {
        self.milli_cpu = self.milli_cpu.saturating_sub(other.milli_cpu);
        self.memory = self.memory.saturating_sub(other.memory);
        for (name, quantity) in &other.scalars {
            if let Some(current) = self.scalars.get_mut(name) {
                *current = current.saturating_sub(*quantity);
            }
        }
    }

    /// True iff every component of `self` is less than or equal to the
    /// corresponding component of `capacity`. This is a partial order: two
    /// resources can each fail to fit in the other.
    pub fn fits_in(&self, capacity: &Resource) -> bool {
        if self.milli_cpu > capacity.milli_cpu || self.memory > capacity.memory {
            return false;
        }
        self.scalars
            .iter()
            .all(|(name, quantity)| *quantity <= capacity.scalars.get(name).copied().unwrap_or(0))
    }

    /// The dominant share of `self` relative to `capacity`: the maximum over
    /// resource dimensions with non-zero capacity of `self_d / capacity_d`.
    /// Returns 0.0 when the capacity is zero in every dimension.
    pub fn dominant_ratio(&self, capacity: &Resource) -> f64 {
        let mut share: f64 = 0.0;
        if capacity.milli_cpu > 0 {
            share = share.max(self.milli_cpu as f64 / capacity.milli_cpu as f64);
        }
        if capacity.memory > 0 {
            share = share.max(self.memory as f64 / capacity.memory as f64);
        }
        for (name, quantity) in &capacity.scalars {
            if *quantity > 0 {
                let used = self.scalars.get(name).copied().unwrap_or(0);
                share = share.max(used as f64 / *quantity as f64);
            }
        }
        share
    }
}

#[cfg(test)]
mod test {
    use super::Resource;

    const GI: u64 = 1024 * 1024 * 1024;

    #[test]
    fn test_add_sub() {
        let mut res = Resource::new(4000, 8 * GI);
        res.sub(&Resource::new(1000, GI));
        assert_eq!(res, Resource::new(3000, 7 * GI));

        res.add(&Resource::new(1000, GI));
        assert_eq!(res, Resource::new(4000, 8 * GI));
    }

    #[test]
    fn test_sub_saturates_at_zero() {
        let mut res = Resource::new(1000, GI);
        res.sub(&Resource::new(4000, 8 * GI));
        assert_eq!(res, Resource::new(0, 0));
    }

    #[test]
    fn test_fits_is_partial() {
        let a = Resource::new(1000, 8 * GI);
        let b = Resource::new(4000, GI);
        assert!(!a.fits_in(&b));
        assert!(!b.fits_in(&a));
        assert!(a.fits_in(&Resource::new(1000, 8 * GI)));
    }

    #[test]
    fn test_fits_scalar_dimensions() {
        let req = Resource::new(1000, GI).with_scalar("gpu", 2);
        let with_gpus = Resource::new(4000, 8 * GI).with_scalar("gpu", 4);
        let without_gpus = Resource::new(4000, 8 * GI);

        assert!(req.fits_in(&with_gpus));
        // A missing scalar dimension on the capacity side is zero.
        assert!(!req.fits_in(&without_gpus));
    }

    #[test]
    fn test_zero_capacity_rejects_everything() {
        let cap = Resource::default();
        assert!(!Resource::new(1, 0).fits_in(&cap));
        assert!(Resource::default().fits_in(&cap));
    }

    #[test]
    fn test_dominant_ratio() {
        let capacity = Resource::new(8000, 8 * GI);

        let cpu_heavy = Resource::new(4000, GI);
        assert!((cpu_heavy.dominant_ratio(&capacity) - 0.5).abs() < f64::EPSILON);

        let mem_heavy = Resource::new(1000, 6 * GI);
        assert!((mem_heavy.dominant_ratio(&capacity) - 0.75).abs() < f64::EPSILON);

        // Dimensions with zero capacity are ignored.
        let capacity = Resource::new(8000, 0);
        assert!((mem_heavy.dominant_ratio(&capacity) - 0.125).abs() < f64::EPSILON);
        assert_eq!(Resource::default().dominant_ratio(&Resource::default()), 0.0);
    }
}
