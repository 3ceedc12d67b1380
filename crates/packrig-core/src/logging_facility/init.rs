//! Subscriber installation

use std::sync::Once;

use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Where and how log events are rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// Human-readable lines on stderr, `packrig=debug`
    Development,
    /// One JSON object per event on stderr, `packrig=info`
    Production,
    /// No output; tests install `init_test_capture()` instead
    Test,
}

impl Profile {
    /// Filter used when `RUST_LOG` is unset
    pub fn default_directive(self) -> Option<&'static str> {
        match self {
            Profile::Development => Some("packrig=debug"),
            Profile::Production => Some("packrig=info"),
            Profile::Test => None,
        }
    }

    fn filter(self) -> EnvFilter {
        let fallback = self.default_directive().unwrap_or("off");
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
    }
}

static INIT: Once = Once::new();

/// Install the global subscriber for `profile`
///
/// Only the first call has an effect. A subscriber installed elsewhere
/// beforehand (such as the test capture) is left in place.
pub fn init(profile: Profile) {
    INIT.call_once(|| {
        let installed = match profile {
            Profile::Development => tracing_subscriber::fmt()
                .with_writer(std::io::stderr)
                .with_env_filter(profile.filter())
                .finish()
                .try_init(),
            Profile::Production => tracing_subscriber::fmt()
                .json()
                .with_writer(std::io::stderr)
                .with_env_filter(profile.filter())
                .finish()
                .try_init(),
            Profile::Test => tracing_subscriber::registry().try_init(),
        };
        installed.ok();
    });
}
