use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::SystemTime;

use crate::capture::ScreenCapturer;
use crate::config::ConfigStore;
use crate::events::{EventBus, IterationReport, RegionReading};
use crate::matching::MatchEngine;
use crate::notify::Notifier;
use crate::policy;
use crate::status::{DetectionStatus, StatusHandle};
use crate::templates::{Category, TemplateLibrary};

/// Drives the capture → match → alert cycle on a background thread.
///
/// Lifecycle is `stopped` ⇄ `running`; `start` on a running runner and
/// `stop` on a stopped one are no-ops. `stop` is synchronous: it signals
/// the worker, waits for the in-flight iteration to finish, and joins the
/// thread, so no further reports are published once it returns.
pub struct DetectionRunner {
    config: ConfigStore,
    library: Arc<TemplateLibrary>,
    notifiers: Arc<Vec<Box<dyn Notifier>>>,
    status: StatusHandle,
    bus: EventBus,
    worker: Option<Worker>,
}

struct Worker {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

impl DetectionRunner {
    pub fn new(
        config: ConfigStore,
        library: Arc<TemplateLibrary>,
        notifiers: Vec<Box<dyn Notifier>>,
    ) -> Self {
        Self {
            config,
            library,
            notifiers: Arc::new(notifiers),
            status: StatusHandle::new(),
            bus: EventBus::new(),
            worker: None,
        }
    }

    /// Handle observers use to read the latest detection flags.
    pub fn status(&self) -> StatusHandle {
        self.status.clone()
    }

    /// Subscribe to per-iteration reports.
    pub fn subscribe(&self) -> Receiver<IterationReport> {
        self.bus.subscribe().0
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Spawn the polling thread. No-op if already running.
    pub fn start(&mut self) {
        if self.worker.is_some() {
            tracing::debug!("detection loop already running");
            return;
        }

        let (stop_tx, stop_rx) = bounded(1);
        let ctx = LoopContext {
            config: self.config.clone(),
            library: Arc::clone(&self.library),
            notifiers: Arc::clone(&self.notifiers),
            status: self.status.clone(),
            bus: self.bus.clone(),
        };

        let handle = thread::spawn(move || run_loop(ctx, stop_rx));
        self.worker = Some(Worker {
            stop: stop_tx,
            handle,
        });
        tracing::info!("detection loop started");
    }

    /// Signal the worker and wait for it to exit. No-op if stopped.
    pub fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };

        let _ = worker.stop.send(());
        let _ = worker.handle.join();
        tracing::info!("detection loop stopped");
    }
}

impl Drop for DetectionRunner {
    fn drop(&mut self) {
        self.stop();
    }
}

struct LoopContext {
    config: ConfigStore,
    library: Arc<TemplateLibrary>,
    notifiers: Arc<Vec<Box<dyn Notifier>>>,
    status: StatusHandle,
    bus: EventBus,
}

fn run_loop(ctx: LoopContext, stop: Receiver<()>) {
    let engine = MatchEngine::default();
    let mut capturer = ScreenCapturer::new();

    loop {
        // Fresh snapshot every cycle so config edits apply without restart.
        let cfg = ctx.config.snapshot();
        capturer.set_debug_captures(cfg.debug_captures);

        let local = scan_region(
            &engine,
            &mut capturer,
            &ctx,
            Category::Local,
            cfg.regions.local.as_ref(),
            cfg.thresholds.hostile,
        );
        let overview = scan_region(
            &engine,
            &mut capturer,
            &ctx,
            Category::Overview,
            cfg.regions.overview.as_ref(),
            cfg.thresholds.hostile,
        );
        let monster = scan_region(
            &engine,
            &mut capturer,
            &ctx,
            Category::Monster,
            cfg.regions.monster.as_ref(),
            cfg.thresholds.monster,
        );

        ctx.status.set(DetectionStatus {
            local: local.detected,
            overview: overview.detected,
            monster: monster.detected,
        });

        let alert = policy::decide(local.detected, overview.detected, monster.detected);
        let report = IterationReport {
            timestamp: SystemTime::now(),
            local,
            overview,
            monster,
            alert,
        };

        tracing::info!("{}", report.status_line());
        ctx.bus.publish(report);

        if alert.is_active() {
            for notifier in ctx.notifiers.iter() {
                notifier.notify(alert);
            }
        }

        // Sleep the policy backoff; a stop signal (or a dropped runner)
        // wakes us immediately.
        match stop.recv_timeout(policy::backoff(alert)) {
            Err(RecvTimeoutError::Timeout) => continue,
            _ => break,
        }
    }
}

fn scan_region(
    engine: &MatchEngine,
    capturer: &mut ScreenCapturer,
    ctx: &LoopContext,
    category: Category,
    region: Option<&crate::config::Region>,
    threshold: f32,
) -> RegionReading {
    let frame = capturer.capture(region, category.label());
    let outcome = engine.evaluate(
        frame.as_ref(),
        capturer.last_error(),
        ctx.library.category(category),
        threshold,
    );
    outcome.into()
}
