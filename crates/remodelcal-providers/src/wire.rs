//! Tagged union of the vendor event schemas.
//!
//! This is the only place the Google, Outlook and Apple payloads meet.
//! Everything above the adapters works on [`RemoteEvent`].

use remodelcal_core::{LocalEvent, ProviderKind};

use crate::apple::AppleEvent;
use crate::google::GoogleEvent;
use crate::outlook::OutlookEvent;
use crate::remote_event::RemoteEvent;

/// A vendor event in its native schema.
#[derive(Debug, Clone, PartialEq)]
pub enum WireEvent {
    Google(GoogleEvent),
    Outlook(OutlookEvent),
    Apple(AppleEvent),
}

impl WireEvent {
    /// Returns the provider whose schema this is.
    pub fn provider(&self) -> ProviderKind {
        match self {
            Self::Google(_) => ProviderKind::Google,
            Self::Outlook(_) => ProviderKind::Outlook,
            Self::Apple(_) => ProviderKind::Apple,
        }
    }

    /// Converts to the canonical form.
    ///
    /// Returns `None` for cancelled events and events missing an id or a
    /// parseable start time.
    pub fn into_remote(self) -> Option<RemoteEvent> {
        match self {
            Self::Google(event) => event.into_remote(),
            Self::Outlook(event) => event.into_remote(),
            Self::Apple(event) => event.into_remote(),
        }
    }

    /// Builds the vendor payload for a local appointment.
    ///
    /// `remote_id` is only used by Apple, where the client picks the UID; a
    /// fresh UUID is generated when it is `None`.
    pub fn from_local(provider: ProviderKind, event: &LocalEvent, remote_id: Option<&str>) -> Self {
        match provider {
            ProviderKind::Google => Self::Google(GoogleEvent::from_local(event)),
            ProviderKind::Outlook => Self::Outlook(OutlookEvent::from_local(event)),
            ProviderKind::Apple => {
                let uid = remote_id
                    .map(str::to_string)
                    .unwrap_or_else(|| uuid::Uuid::new_v4().to_string().to_uppercase());
                Self::Apple(AppleEvent::from_local(uid, event))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn local() -> LocalEvent {
        let start = Utc.with_ymd_and_hms(2025, 6, 1, 15, 0, 0).unwrap();
        LocalEvent::new("user-1", "Consult", start, start + Duration::hours(1))
    }

    #[test]
    fn from_local_picks_the_vendor_schema() {
        for kind in ProviderKind::ALL {
            let wire = WireEvent::from_local(kind, &local(), None);
            assert_eq!(wire.provider(), kind);
        }
    }

    #[test]
    fn apple_payload_gets_a_uid() {
        let WireEvent::Apple(event) = WireEvent::from_local(ProviderKind::Apple, &local(), None) else {
            panic!("expected an Apple payload");
        };
        assert_eq!(event.uid.len(), 36);

        let WireEvent::Apple(event) =
            WireEvent::from_local(ProviderKind::Apple, &local(), Some("KNOWN-UID"))
        else {
            panic!("expected an Apple payload");
        };
        assert_eq!(event.uid, "KNOWN-UID");
    }

    #[test]
    fn apple_payload_round_trips_to_canonical() {
        let local = local();
        let remote = WireEvent::from_local(ProviderKind::Apple, &local, Some("uid-1"))
            .into_remote()
            .unwrap();
        assert_eq!(remote.provider, ProviderKind::Apple);
        assert_eq!(remote.id, "uid-1");
        assert!(remote.conflicting_fields(&local).is_empty());
    }
}
