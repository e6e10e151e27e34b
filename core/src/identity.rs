//! Pod identity: the `origin_pod_id` stamped onto every event.
//!
//! Resolution walks a fallback chain of environment variables set by
//! whichever orchestrator the pod runs under, falling through to
//! `"localhost"` for bare local runs rather than failing startup.

/// Environment variables consulted by [`resolve`], in priority order.
pub const POD_ID_ENV_VARS: &[&str] = &["POD_NAME", "HOSTNAME", "COMPUTERNAME", "MACHINE_NAME"];

/// Fallback identity when none of [`POD_ID_ENV_VARS`] is set.
pub const DEFAULT_POD_ID: &str = "localhost";

/// Source of a pod's own identity.
pub trait PodIdentity: Send + Sync {
    /// This pod's identifier, stamped as `origin_pod_id` on every event it
    /// produces.
    fn pod_id(&self) -> &str;
}

/// A [`PodIdentity`] holding a fixed string, constructed once at startup.
#[derive(Clone, Debug)]
pub struct StaticPodIdentity(String);

impl StaticPodIdentity {
    /// Wrap an already-known pod id.
    #[must_use]
    pub fn new(pod_id: impl Into<String>) -> Self {
        Self(pod_id.into())
    }
}

impl PodIdentity for StaticPodIdentity {
    fn pod_id(&self) -> &str {
        &self.0
    }
}

/// Resolve this pod's identity by walking `POD_NAME` → `HOSTNAME` →
/// `COMPUTERNAME` → `MACHINE_NAME`, falling back to `"localhost"` if none
/// are set or all are empty.
#[must_use]
pub fn resolve() -> StaticPodIdentity {
    StaticPodIdentity::new(resolve_with(|var| std::env::var(var).ok()))
}

/// Core of [`resolve`], parameterized over the lookup function so the
/// fallback chain can be tested without touching real process environment.
fn resolve_with(lookup: impl Fn(&str) -> Option<String>) -> String {
    for var in POD_ID_ENV_VARS {
        if let Some(value) = lookup(var) {
            if !value.trim().is_empty() {
                return value;
            }
        }
    }
    DEFAULT_POD_ID.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn static_identity_returns_wrapped_value() {
        let identity = StaticPodIdentity::new("pod-7");
        assert_eq!(identity.pod_id(), "pod-7");
    }

    #[test]
    fn resolve_falls_back_to_localhost_when_nothing_set() {
        assert_eq!(resolve_with(|_| None), DEFAULT_POD_ID);
    }

    #[test]
    fn resolve_prefers_pod_name_over_hostname() {
        let mut env = HashMap::new();
        env.insert("POD_NAME", "pod-a".to_string());
        env.insert("HOSTNAME", "host-b".to_string());
        assert_eq!(resolve_with(|var| env.get(var).cloned()), "pod-a");
    }

    #[test]
    fn resolve_falls_through_empty_values() {
        let mut env = HashMap::new();
        env.insert("POD_NAME", String::new());
        env.insert("HOSTNAME", "host-b".to_string());
        assert_eq!(resolve_with(|var| env.get(var).cloned()), "host-b");
    }

    #[test]
    fn resolve_walks_full_chain_to_machine_name() {
        let mut env = HashMap::new();
        env.insert("MACHINE_NAME", "box-c".to_string());
        assert_eq!(resolve_with(|var| env.get(var).cloned()), "box-c");
    }
}
