use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use icon_sentry::capture::ScreenCapturer;
use icon_sentry::config::{Config, ConfigStore};
use icon_sentry::error::AppResult;
use icon_sentry::matching::MatchEngine;
use icon_sentry::notify::{AudioNotifier, Notifier, WebhookNotifier};
use icon_sentry::runner::DetectionRunner;
use icon_sentry::templates::{Category, TemplateLibrary};

fn main() -> AppResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    println!("===========================================");
    println!("  icon-sentry - Visual Threat Detector");
    println!("===========================================\n");

    let config = Config::load()?;
    tracing::info!("Config path: {}", Config::config_dir_display());

    let base_dir = std::env::current_dir()?;
    let library = Arc::new(TemplateLibrary::load(&base_dir));
    if library.is_empty() {
        tracing::warn!("No templates found; drop icons into the assets/ subdirectories");
    }

    let args: Vec<String> = std::env::args().collect();
    if args.len() > 1 && args[1] == "--probe" {
        run_probe(&config, &library);
        return Ok(());
    }

    let store = ConfigStore::new(config);
    let notifiers: Vec<Box<dyn Notifier>> = vec![
        Box::new(WebhookNotifier::new(store.clone())),
        Box::new(AudioNotifier::preload(&store.snapshot().audio_paths)),
    ];

    let mut runner = DetectionRunner::new(store, library, notifiers);
    runner.start();

    println!("Detection running. Press Ctrl+C to quit.\n");

    let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);
    ctrlc::set_handler(move || {
        let _ = shutdown_tx.send(());
    })?;

    let _ = shutdown_rx.recv();
    println!("\nShutting down...");
    runner.stop();

    Ok(())
}

/// One capture+match pass per region, printed with raw scores. Meant for
/// tuning regions and thresholds without starting the loop.
fn run_probe(config: &Config, library: &TemplateLibrary) {
    println!("=== Probe ===");

    let engine = MatchEngine::default();
    let mut capturer = ScreenCapturer::new();

    let passes = [
        ("local", Category::Local, config.regions.local, config.thresholds.hostile),
        (
            "overview",
            Category::Overview,
            config.regions.overview,
            config.thresholds.hostile,
        ),
        (
            "monster",
            Category::Monster,
            config.regions.monster,
            config.thresholds.monster,
        ),
    ];

    for (name, category, region, threshold) in passes {
        let frame = capturer.capture(region.as_ref(), name);
        let outcome = engine.evaluate(
            frame.as_ref(),
            capturer.last_error(),
            library.category(category),
            threshold,
        );
        println!(
            "  {:<8} detected={} score={}",
            name,
            outcome.detected(),
            outcome
        );
    }
}
