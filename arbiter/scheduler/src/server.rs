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

//! The scheduling loop: periodically freezes a cache snapshot into a session,
//! runs the action pipeline, flushes accepted bindings through the external
//! writer, and commits them back to the cache.

use std::sync::Arc;
use std::time::Instant;

use log::{error, info, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use arbiter_core::event::ClusterEvent;
use arbiter_core::Result;

use crate::actions::default_pipeline;
use crate::binder::TaskBinder;
use crate::cache::SchedulerCache;
use crate::config::SchedulerConfig;
use crate::metrics::{default_metrics_collector, SchedulerMetricsCollector};
use crate::plugins::{lookup_plugin, Plugin};
use crate::session::Session;

pub struct Scheduler {
    cache: Arc<SchedulerCache>,
    binder: Arc<dyn TaskBinder>,
    config: SchedulerConfig,
    metrics_collector: Arc<dyn SchedulerMetricsCollector>,
}

impl Scheduler {
    pub fn new(
        cache: Arc<SchedulerCache>,
        binder: Arc<dyn TaskBinder>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            cache,
            binder,
            config,
            metrics_collector: default_metrics_collector(),
        }
    }

    pub fn with_metrics_collector(
        mut self,
        metrics_collector: Arc<dyn SchedulerMetricsCollector>,
    ) -> Self {
        self.metrics_collector = metrics_collector;
        self
    }

    pub fn cache(&self) -> Arc<SchedulerCache> {
        self.cache.clone()
    }

    fn session_plugins(&self) -> Vec<Box<dyn Plugin>> {
        self.config
            .plugins
            .iter()
            .filter_map(|name| {
                let plugin = lookup_plugin(name);
                if plugin.is_none() {
                    warn!("Plugin {} is not registered; skipping", name);
                }
                plugin
            })
            .collect()
    }

    /// Run one scheduling cycle: snapshot, pipeline, flush, commit.
    pub async fn run_once(&self) -> Result<usize> {
        let start = Instant::now();
        let snapshot = self.cache.snapshot();

        let pending: usize = snapshot
            .jobs
            .values()
            .map(|job| job.tasks.values().filter(|t| t.is_pending()).count())
            .sum();
        self.metrics_collector.record_pending_tasks(pending);

        let deadline = Instant::now() + self.config.session_timeout();
        let mut session = Session::open(
            snapshot,
            &self.config,
            self.session_plugins(),
            Some(deadline),
        );
        session.run_pipeline(&default_pipeline())?;

        // The writer is the commit point: only bindings it accepted are
        // applied back to the cache.
        let flushed = session.close(self.binder.as_ref()).await;
        self.cache.commit(&flushed);

        let elapsed = start.elapsed();
        self.metrics_collector
            .record_cycle_completed(flushed.len(), elapsed);
        info!(
            "Scheduling cycle produced {} bindings in {:?}",
            flushed.len(),
            elapsed
        );
        Ok(flushed.len())
    }

    /// Spawn the periodic scheduling loop. Cycle errors are logged; the loop
    /// never dies.
    pub fn start(self: Arc<Self>) -> JoinHandle<()> {
        tokio::task::spawn(async move {
            let mut interval = tokio::time::interval(self.config.schedule_interval());
            loop {
                interval.tick().await;
                if let Err(e) = self.run_once().await {
                    self.metrics_collector.record_cycle_failed();
                    error!("Scheduling cycle failed: {}", e);
                }
            }
        })
    }

    /// Spawn the ingest drain and hand out its sender. Watch clients push
    /// [`ClusterEvent`]s in delivery order; the drain applies them to the
    /// cache sinks.
    pub fn start_ingest(&self) -> mpsc::Sender<ClusterEvent> {
        let (sender, mut receiver) =
            mpsc::channel(self.config.event_channel_buffer_size as usize);
        let cache = self.cache.clone();
        tokio::task::spawn(async move {
            while let Some(event) = receiver.recv().await {
                cache.apply(event);
            }
        });
        sender
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;
    use std::time::Duration;

    use super::Scheduler;
    use crate::binder::TaskBinder;
    use crate::cache::SchedulerCache;
    use crate::config::SchedulerConfig;
    use crate::test_utils::{
        await_condition, test_node, test_pod, test_spec, FailingBinder, RecordingBinder,
        TestMetricsCollector, GI,
    };
    use arbiter_core::event::{ClusterEvent, ResourceEvent};
    use arbiter_core::models::TaskStatus;
    use arbiter_core::resource::Resource;
    use arbiter_core::Result;

    fn seeded_cache() -> Arc<SchedulerCache> {
        let cache = Arc::new(SchedulerCache::default());
        cache.add_node(&test_node("n1", 4000, 8 * GI));
        cache.add_scheduling_spec(&test_spec("j1", 1));
        cache.add_pod(&test_pod("t1", "j1", 1000, GI));
        cache
    }

    #[tokio::test]
    async fn test_run_once_binds_and_commits() -> Result<()> {
        let cache = seeded_cache();
        let binder = Arc::new(RecordingBinder::default());
        let metrics = Arc::new(TestMetricsCollector::default());
        let scheduler = Scheduler::new(
            cache.clone(),
            binder.clone(),
            SchedulerConfig::default(),
        )
        .with_metrics_collector(metrics.clone());

        let bound = scheduler.run_once().await?;
        assert_eq!(bound, 1);
        assert_eq!(binder.bound().len(), 1);
        assert_eq!(binder.bound()[0].node_name, "n1");

        let snapshot = cache.snapshot();
        assert_eq!(
            snapshot.jobs["j1"].tasks["t1"].status,
            TaskStatus::Allocated
        );
        assert_eq!(snapshot.nodes["n1"].idle, Resource::new(3000, 7 * GI));

        // The committed placement is not re-placed next cycle.
        let bound = scheduler.run_once().await?;
        assert_eq!(bound, 0);
        assert_eq!(binder.bound().len(), 1);

        assert_eq!(metrics.cycles_completed(), 2);
        assert_eq!(metrics.bindings_total(), 1);
        assert_eq!(metrics.cycles_failed(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_retryable_bind_failure_redelivers_next_cycle() -> Result<()> {
        let cache = seeded_cache();

        let failing: Arc<dyn TaskBinder> = Arc::new(FailingBinder::retryable_for("t1"));
        let scheduler =
            Scheduler::new(cache.clone(), failing, SchedulerConfig::default());
        let bound = scheduler.run_once().await?;
        assert_eq!(bound, 0);

        // Nothing was committed, so the task is still Pending in the cache.
        let snapshot = cache.snapshot();
        assert_eq!(snapshot.jobs["j1"].tasks["t1"].status, TaskStatus::Pending);
        assert_eq!(snapshot.nodes["n1"].idle, Resource::new(4000, 8 * GI));

        // A healthy writer picks the binding up on the next session.
        let recording = Arc::new(RecordingBinder::default());
        let scheduler = Scheduler::new(
            cache.clone(),
            recording.clone(),
            SchedulerConfig::default(),
        );
        let bound = scheduler.run_once().await?;
        assert_eq!(bound, 1);
        assert_eq!(recording.bound()[0].task_uid, "t1");
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_session_is_noop_on_cache() -> Result<()> {
        let cache = Arc::new(SchedulerCache::default());
        cache.add_node(&test_node("n1", 4000, 8 * GI));

        let before = cache.snapshot();
        let scheduler = Scheduler::new(
            cache.clone(),
            Arc::new(RecordingBinder::default()),
            SchedulerConfig::default(),
        );
        scheduler.run_once().await?;
        assert_eq!(cache.snapshot(), before);
        Ok(())
    }

    #[tokio::test]
    async fn test_ingest_channel_feeds_cache() -> Result<()> {
        let cache = Arc::new(SchedulerCache::default());
        let scheduler = Scheduler::new(
            cache.clone(),
            Arc::new(RecordingBinder::default()),
            SchedulerConfig::default(),
        );

        let sender = scheduler.start_ingest();
        sender
            .send(ClusterEvent::Node(ResourceEvent::Added(test_node(
                "n1",
                4000,
                8 * GI,
            ))))
            .await
            .unwrap();
        sender
            .send(ClusterEvent::Pod(ResourceEvent::Added(test_pod(
                "t1", "j1", 1000, GI,
            ))))
            .await
            .unwrap();

        let applied = await_condition(Duration::from_millis(10), 100, || {
            let cache = cache.clone();
            async move { Ok(cache.snapshot().jobs.contains_key("j1")) }
        })
        .await?;
        assert!(applied);

        let bound = scheduler.run_once().await?;
        assert_eq!(bound, 1);
        Ok(())
    }
}
