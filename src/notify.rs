use rodio::{Decoder, OutputStream, Sink};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::config::{AudioPaths, ConfigStore};
use crate::policy::Alert;

/// Alert sinks.
///
/// Dispatch is fire-and-forget: every implementation hands the work to a
/// detached thread so a slow sound device or a failing network call never
/// delays the next polling iteration. Failures are logged at debug level
/// and otherwise swallowed; the loop neither observes nor retries them.

pub trait Notifier: Send + Sync {
    fn notify(&self, alert: Alert);
}

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(5);

/// POSTs `{"alert": "<category>"}` to the configured webhook URL.
///
/// The URL is re-read from the config store on every dispatch so edits take
/// effect without a restart. An empty URL disables delivery.
pub struct WebhookNotifier {
    config: ConfigStore,
}

impl WebhookNotifier {
    pub fn new(config: ConfigStore) -> Self {
        Self { config }
    }
}

impl Notifier for WebhookNotifier {
    fn notify(&self, alert: Alert) {
        let url = self.config.snapshot().webhook_url;
        if url.trim().is_empty() {
            return;
        }

        thread::spawn(move || {
            let result = ureq::post(&url)
                .timeout(WEBHOOK_TIMEOUT)
                .send_json(serde_json::json!({ "alert": alert.wire_name() }));

            if let Err(e) = result {
                tracing::debug!("webhook delivery failed: {}", e);
            }
        });
    }
}

/// Plays a preloaded per-alert sound.
///
/// Sounds are read fully into memory at startup; a missing or unreadable
/// file silences that alert and is reported once in the startup log.
pub struct AudioNotifier {
    sounds: HashMap<Alert, Arc<Vec<u8>>>,
}

impl AudioNotifier {
    pub fn preload(paths: &AudioPaths) -> Self {
        let mut sounds = HashMap::new();

        for (alert, path) in [
            (Alert::Local, &paths.local),
            (Alert::Overview, &paths.overview),
            (Alert::Monster, &paths.monster),
            (Alert::Mixed, &paths.mixed),
        ] {
            if path.trim().is_empty() {
                continue;
            }
            match std::fs::read(path) {
                Ok(data) => {
                    tracing::info!(
                        "Preloaded alert sound for '{}': {} ({} bytes)",
                        alert,
                        path,
                        data.len()
                    );
                    sounds.insert(alert, Arc::new(data));
                }
                Err(e) => {
                    tracing::warn!("alert sound for '{}' unreadable ({}): {}", alert, path, e);
                }
            }
        }

        Self { sounds }
    }

    pub fn loaded_count(&self) -> usize {
        self.sounds.len()
    }
}

impl Notifier for AudioNotifier {
    fn notify(&self, alert: Alert) {
        let Some(data) = self.sounds.get(&alert).cloned() else {
            return;
        };

        thread::spawn(move || {
            // The output stream must outlive playback, so the whole
            // lifetime stays on this thread.
            let Ok((_stream, handle)) = OutputStream::try_default() else {
                tracing::debug!("no audio output stream available");
                return;
            };
            let Ok(sink) = Sink::try_new(&handle) else {
                return;
            };
            // rodio's Decoder requires owned data with 'static lifetime.
            let Ok(decoder) = Decoder::new(Cursor::new((*data).clone())) else {
                tracing::debug!("alert sound failed to decode");
                return;
            };

            sink.append(decoder);
            sink.sleep_until_end();
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_webhook_disabled_without_url_does_not_panic() {
        let notifier = WebhookNotifier::new(ConfigStore::default());
        notifier.notify(Alert::Mixed);
    }

    #[test]
    fn test_audio_preload_skips_empty_and_missing_paths() {
        let paths = AudioPaths {
            local: String::new(),
            overview: "/definitely/not/a/real/file.mp3".to_string(),
            monster: String::new(),
            mixed: String::new(),
        };

        let notifier = AudioNotifier::preload(&paths);
        assert_eq!(notifier.loaded_count(), 0);

        // Alerts without a sound are silent no-ops.
        notifier.notify(Alert::Overview);
    }
}
