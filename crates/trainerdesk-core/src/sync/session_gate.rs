//! One-shot auto-fetch guard per session establishment.
//!
//! A UI re-renders many times while a session is being restored; only the
//! first time a given identity becomes available should a bulk refresh start
//! on its own. Manual refreshes do not go through the gate.

/// Auto-fetch progress for the current identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AutoFetch {
    #[default]
    NotStarted,
    InFlight,
    Done,
}

#[derive(Debug, Clone, Default)]
pub struct SessionGate {
    identity: Option<String>,
    phase: AutoFetch,
}

impl SessionGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> AutoFetch {
        self.phase
    }

    /// Track the identity currently signed in. A different identity (or
    /// none) rearms the gate.
    pub fn observe(&mut self, identity: Option<&str>) {
        if self.identity.as_deref() != identity {
            self.identity = identity.map(str::to_string);
            self.phase = AutoFetch::NotStarted;
        }
    }

    /// Claim the auto-fetch for the observed identity. Returns false when
    /// there is no identity or the fetch was already claimed.
    pub fn try_begin(&mut self) -> bool {
        if self.identity.is_none() || self.phase != AutoFetch::NotStarted {
            return false;
        }
        self.phase = AutoFetch::InFlight;
        true
    }

    /// Mark the claimed fetch finished, whatever its outcome. Ignored when
    /// the identity changed in the meantime.
    pub fn finish(&mut self, identity: &str) {
        if self.phase == AutoFetch::InFlight && self.identity.as_deref() == Some(identity) {
            self.phase = AutoFetch::Done;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_fires_once_per_identity() {
        let mut gate = SessionGate::new();
        assert!(!gate.try_begin());

        gate.observe(Some("u1"));
        assert!(gate.try_begin());
        assert!(!gate.try_begin());
        gate.finish("u1");
        assert_eq!(gate.phase(), AutoFetch::Done);

        // Re-observing the same identity does not rearm
        gate.observe(Some("u1"));
        assert!(!gate.try_begin());
    }

    #[test]
    fn test_identity_change_rearms() {
        let mut gate = SessionGate::new();
        gate.observe(Some("u1"));
        assert!(gate.try_begin());

        gate.observe(Some("u2"));
        assert_eq!(gate.phase(), AutoFetch::NotStarted);
        // A late finish for the previous identity is ignored
        gate.finish("u1");
        assert_eq!(gate.phase(), AutoFetch::NotStarted);
        assert!(gate.try_begin());

        gate.observe(None);
        assert!(!gate.try_begin());
    }
}
