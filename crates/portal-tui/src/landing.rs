//! Landing page content and its timers.

use std::time::Duration;
use tokio::time::Instant;

/// Delay between revealing consecutive feature cards.
pub const FEATURE_REVEAL_STEP: Duration = Duration::from_millis(250);
pub const STAT_INTERVAL: Duration = Duration::from_secs(4);

pub const TAGLINE: &str = "Next Generation Voice AI";
pub const HEADLINE: &str = "Conversational AI";
pub const HEADLINE_ACCENT: &str = "Redefined";
pub const INTRO: &str = "Enterprise-grade voice technology with human-like natural language \
understanding. Deploy sophisticated AI conversations at scale with millisecond responsiveness.";

pub struct Feature {
    pub title: &'static str,
    pub description: &'static str,
}

pub const FEATURES: [Feature; 3] = [
    Feature {
        title: "Avatar Integration",
        description: "Combine voice with expressive avatars to create human-like digital \
assistants for customer service and enterprise communication.",
    },
    Feature {
        title: "Low-Latency Streaming",
        description: "Real-time infrastructure for ultra-fast bi-directional audio and event \
streaming under 300ms.",
    },
    Feature {
        title: "Scalable Multi-User Sessions",
        description: "Handle thousands of simultaneous interactions effortlessly with \
distributed and scalable agent architecture.",
    },
];

pub struct Stat {
    pub value: &'static str,
    pub label: &'static str,
    pub sublabel: &'static str,
}

pub const STATS: [Stat; 4] = [
    Stat {
        value: "300ms",
        label: "Response Time",
        sublabel: "Instant, natural replies",
    },
    Stat {
        value: "Realistic",
        label: "Human-Friendly Avatar",
        sublabel: "Engages users with lifelike interaction",
    },
    Stat {
        value: "1-Click",
        label: "Easy Access",
        sublabel: "Seamless voice connection anytime",
    },
    Stat {
        value: "99.9%",
        label: "Accuracy",
        sublabel: "Fast and precise AI responses",
    },
];

#[derive(Debug, Clone)]
pub struct Landing {
    shown_at: Instant,
    stat_index: usize,
    last_advance: Instant,
}

impl Landing {
    pub fn new(now: Instant) -> Self {
        Self {
            shown_at: now,
            stat_index: 0,
            last_advance: now,
        }
    }

    /// Start the reveal animation and the carousel over.
    pub fn restart(&mut self, now: Instant) {
        *self = Self::new(now);
    }

    /// Number of feature cards revealed at `now`. Card `i` appears
    /// `i * FEATURE_REVEAL_STEP` after the page is shown.
    pub fn visible_features(&self, now: Instant) -> usize {
        let elapsed = now.saturating_duration_since(self.shown_at);
        let steps = (elapsed.as_millis() / FEATURE_REVEAL_STEP.as_millis()) as usize;
        (steps + 1).min(FEATURES.len())
    }

    /// Advance the stats carousel for every full interval that passed.
    pub fn tick(&mut self, now: Instant) {
        while now.saturating_duration_since(self.last_advance) >= STAT_INTERVAL {
            self.last_advance += STAT_INTERVAL;
            self.stat_index = (self.stat_index + 1) % STATS.len();
        }
    }

    pub fn stat_index(&self) -> usize {
        self.stat_index
    }

    pub fn current_stat(&self) -> &'static Stat {
        &STATS[self.stat_index]
    }

    /// Jump to a stat. The interval restarts from here.
    pub fn select_stat(&mut self, index: usize, now: Instant) {
        self.stat_index = index % STATS.len();
        self.last_advance = now;
    }

    pub fn next_stat(&mut self, now: Instant) {
        self.select_stat(self.stat_index + 1, now);
    }

    pub fn prev_stat(&mut self, now: Instant) {
        self.select_stat(self.stat_index + STATS.len() - 1, now);
    }
}
