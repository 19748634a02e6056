//! Explicit run context shared by every component of the engine.

use std::collections::BTreeMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::constants::TAI_EPOCH_OFFSET;
use crate::desync::DesyncHistory;
use crate::directory::NodeDirectory;
use crate::error::ExpandError;
use crate::placeholder::PlaceholderRegistry;
use crate::store::GlobalStore;

/// Source of the current wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub enum Clock {
    #[default]
    System,
    /// A fixed instant, as a duration since the Unix epoch.
    Frozen(Duration),
}

impl Clock {
    pub fn since_epoch(&self) -> Duration {
        match self {
            Clock::System => SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default(),
            Clock::Frozen(d) => *d,
        }
    }
}

/// State that lives for the whole script run.
///
/// The store, the node directory and the desync history are never reset
/// between lines.
#[derive(Debug, Default)]
pub struct ScriptContext {
    pub store: GlobalStore,
    pub nodes: NodeDirectory,
    pub desync: DesyncHistory,
    /// Repetition index of the outbound loop currently being expanded.
    pub loop_index: u32,
    pub clock: Clock,
    exports: BTreeMap<String, String>,
    placeholders: PlaceholderRegistry,
}

impl ScriptContext {
    pub fn new(nodes: NodeDirectory, exports: BTreeMap<String, String>) -> Self {
        let mut placeholders = PlaceholderRegistry::new();
        for name in exports.keys() {
            placeholders.register_export(name);
        }
        Self {
            nodes,
            exports,
            placeholders,
            ..Self::default()
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn export(&self, name: &str) -> Option<&str> {
        self.exports.get(name).map(String::as_str)
    }

    /// Expand every `{command params}` placeholder in `text`.
    pub fn expand(&self, text: &str) -> Result<String, ExpandError> {
        self.placeholders.expand(text, self)
    }

    /// Current Unix seconds.
    pub fn now_secs(&self) -> i64 {
        self.clock.since_epoch().as_secs() as i64
    }

    /// `,<seconds>,<microseconds>` suffix appended to outbound messages.
    pub fn timestamp_suffix(&self) -> String {
        let now = self.clock.since_epoch();
        format!(
            ",{:04},{:04}",
            now.as_secs() as i64 + TAI_EPOCH_OFFSET,
            now.subsec_micros() & 0x00FF_FFFF
        )
    }

    /// Record the desync carried by a received message.
    pub fn observe_desync(&mut self, message: &str) -> Option<i64> {
        let now = self.now_secs();
        self.desync.observe(message, now)
    }
}
