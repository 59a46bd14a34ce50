use std::fmt;
use std::time::Duration;

/// Alert decision.
///
/// Pure mapping from the three per-region detection flags to the alert
/// category and the pause before the next polling cycle.

/// Prioritized outcome of one detection cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Alert {
    None,
    Local,
    Overview,
    Mixed,
    Monster,
}

impl Alert {
    pub fn is_active(self) -> bool {
        self != Alert::None
    }

    /// Stable lowercase name used on the wire (webhook JSON body).
    pub fn wire_name(self) -> &'static str {
        match self {
            Alert::None => "none",
            Alert::Local => "local",
            Alert::Overview => "overview",
            Alert::Mixed => "mixed",
            Alert::Monster => "monster",
        }
    }
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Pause after an alert, long enough for a human/audio response cycle.
pub const ALERT_BACKOFF: Duration = Duration::from_millis(2000);
/// Pause between uneventful cycles.
pub const IDLE_BACKOFF: Duration = Duration::from_millis(500);

/// Decide the alert category. First matching rule wins:
/// a simultaneous proximity threat and active engagement outranks
/// everything, then the wide-area view, then the local early warning, then
/// the ambient monster state.
pub fn decide(local: bool, overview: bool, monster: bool) -> Alert {
    if (local || overview) && monster {
        Alert::Mixed
    } else if overview {
        Alert::Overview
    } else if local {
        Alert::Local
    } else if monster {
        Alert::Monster
    } else {
        Alert::None
    }
}

/// Backoff before the next polling cycle for a decided alert.
pub fn backoff(alert: Alert) -> Duration {
    if alert.is_active() {
        ALERT_BACKOFF
    } else {
        IDLE_BACKOFF
    }
}
