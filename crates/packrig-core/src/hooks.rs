//! Named lifecycle hooks
//!
//! Hooks are synchronous and take no arguments. Listeners run in registration
//! order; there is no cancellation, but a failing listener stops the call and
//! its error is returned.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::errors::{PackrigError, Result};

pub const ENVIRONMENT: &str = "environment";
pub const AFTER_ENVIRONMENT: &str = "afterEnvironment";
pub const ENTRY_OPTION: &str = "entryOption";
pub const AFTER_PLUGINS: &str = "afterPlugins";
pub const AFTER_RESOLVERS: &str = "afterResolvers";
pub const BEFORE_RUN: &str = "beforeRun";
pub const RUN: &str = "run";
pub const WATCH_RUN: &str = "watchRun";
pub const DONE: &str = "done";
pub const FAILED: &str = "failed";
pub const WATCH_CLOSE: &str = "watchClose";

type Listener = Arc<dyn Fn() -> anyhow::Result<()> + Send + Sync>;

#[derive(Clone)]
struct Tap {
    name: String,
    listener: Listener,
}

/// Registry of named hooks and their listeners
///
/// Cloning shares the listeners, so a watch session can keep firing the
/// per-cycle hooks of the pipeline it was started from.
#[derive(Clone, Default)]
pub struct HookRegistry {
    hooks: BTreeMap<String, Vec<Tap>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener on `hook` under the name `name`
    pub fn tap<F>(&mut self, hook: &str, name: impl Into<String>, listener: F)
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.hooks.entry(hook.to_string()).or_default().push(Tap {
            name: name.into(),
            listener: Arc::new(listener),
        });
    }

    /// Invoke every listener of `hook` in registration order
    ///
    /// Returns the number of listeners invoked. Firing a hook nobody tapped
    /// is a no-op.
    pub fn call(&self, hook: &str) -> Result<usize> {
        let Some(taps) = self.hooks.get(hook) else {
            tracing::trace!(hook, "hook has no listeners");
            return Ok(0);
        };

        for tap in taps {
            tracing::trace!(hook, listener = %tap.name, "invoking hook listener");
            (tap.listener)().map_err(|source| PackrigError::HookFailed {
                hook: hook.to_string(),
                listener: tap.name.clone(),
                source,
            })?;
        }
        Ok(taps.len())
    }

    /// Names of the listeners on `hook`, in registration order
    pub fn listener_names(&self, hook: &str) -> Vec<&str> {
        self.hooks
            .get(hook)
            .map(|taps| taps.iter().map(|t| t.name.as_str()).collect())
            .unwrap_or_default()
    }

    pub fn is_tapped(&self, hook: &str) -> bool {
        self.hooks.get(hook).is_some_and(|taps| !taps.is_empty())
    }
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for (hook, taps) in &self.hooks {
            let names: Vec<&str> = taps.iter().map(|t| t.name.as_str()).collect();
            map.entry(hook, &names);
        }
        map.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_listeners_run_in_registration_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut hooks = HookRegistry::new();
        for name in ["first", "second", "third"] {
            let seen = seen.clone();
            hooks.tap(ENVIRONMENT, name, move || {
                seen.lock().unwrap().push(name);
                Ok(())
            });
        }

        assert_eq!(hooks.call(ENVIRONMENT).unwrap(), 3);
        assert_eq!(*seen.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_untapped_hook_is_noop() {
        let hooks = HookRegistry::new();
        assert_eq!(hooks.call(AFTER_ENVIRONMENT).unwrap(), 0);
        assert!(!hooks.is_tapped(AFTER_ENVIRONMENT));
    }

    #[test]
    fn test_failing_listener_stops_call() {
        let seen = Arc::new(Mutex::new(0));
        let mut hooks = HookRegistry::new();
        hooks.tap(DONE, "broken", || Err(anyhow::anyhow!("listener exploded")));
        let counter = seen.clone();
        hooks.tap(DONE, "never", move || {
            *counter.lock().unwrap() += 1;
            Ok(())
        });

        let err = hooks.call(DONE).unwrap_err();
        assert!(matches!(err, PackrigError::HookFailed { ref listener, .. } if listener == "broken"));
        assert_eq!(*seen.lock().unwrap(), 0);
    }
}
