//! Audit entry construction.
//!
//! Entries are stamped from the injected [`Clock`] and handed to the
//! entity store, which appends them in the same statement as the change
//! (update) or immediately before it (delete). Nothing here ever edits or
//! removes an entry.

use relief_types::{AuditAction, AuditEntry, GUEST_ACTOR};

use crate::clock::Clock;

/// Builds timestamped [`AuditEntry`] values.
#[derive(Debug, Clone, Default)]
pub struct AuditRecorder {
    clock: Clock,
}

impl AuditRecorder {
    /// Stamp entries with `clock`.
    pub const fn new(clock: Clock) -> Self {
        Self { clock }
    }

    /// Entry for `action` performed by `actor` now.
    pub fn entry(&self, action: AuditAction, actor: &str) -> AuditEntry {
        AuditEntry::new(action, actor, self.clock.now())
    }
}

/// Owner of a new incident: the explicit owner if present, otherwise the
/// actor of the first audit entry, otherwise the guest identity.
pub fn resolve_owner(explicit: Option<&str>, first_entry: Option<&AuditEntry>) -> String {
    explicit
        .map(str::trim)
        .filter(|owner| !owner.is_empty())
        .or_else(|| first_entry.map(|entry| entry.user_id.as_str()))
        .unwrap_or(GUEST_ACTOR)
        .to_owned()
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    #[test]
    fn entry_uses_injected_clock() {
        let at = Utc
            .with_ymd_and_hms(2026, 5, 4, 8, 30, 0)
            .single()
            .unwrap_or_default();
        let recorder = AuditRecorder::new(Clock::manual(at));
        let entry = recorder.entry(AuditAction::Update, "reliefAdmin");
        assert_eq!(entry.timestamp, at);
        assert_eq!(entry.user_id, "reliefAdmin");
        assert_eq!(entry.action, AuditAction::Update);
    }

    #[test]
    fn owner_falls_back_to_first_actor_then_guest() {
        let entry = AuditEntry::new(AuditAction::Create, "citizen1", Utc::now());
        assert_eq!(resolve_owner(Some("helperNY"), Some(&entry)), "helperNY");
        assert_eq!(resolve_owner(Some("  "), Some(&entry)), "citizen1");
        assert_eq!(resolve_owner(None, Some(&entry)), "citizen1");
        assert_eq!(resolve_owner(None, None), GUEST_ACTOR);
    }
}
