//! # Registry Data Types
//!
//! State tracked per live connection, plus the entries the waiting pool and
//! match table keep about participants.
//!
//! ## Ownership:
//! The registry's `Participant` exclusively owns the connection handle for
//! the participant's lifetime. The waiting pool and match table only hold
//! back-references (participant id plus a cloned handle for sending), so
//! removing a participant from the registry must also purge them there;
//! the disconnect path in the service does exactly that.

use crate::matching::profile::Profile;
use actix_web::web::Bytes;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

/// Outbound side of a participant's connection.
///
/// Implementations must be non-blocking and best-effort: a closed or slow
/// peer is treated as absent, never retried and never allowed to stall the
/// caller. The WebSocket implementation lives in the transport layer; tests
/// use a capturing mock.
pub trait Connection: Send + Sync {
    /// Send a JSON-encoded control message.
    fn send_text(&self, payload: String);

    /// Forward an opaque binary audio frame.
    fn send_binary(&self, payload: Bytes);
}

/// Where a participant is in the session state machine.
///
/// Exactly one of these holds at any time; disconnect removes the
/// participant from the registry entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticipantStatus {
    /// Connected, not searching and not matched.
    Connected,
    /// Has an entry in the waiting pool.
    Waiting,
    /// Member of a live match.
    Matched,
}

/// Registry entry for one live connection.
pub struct Participant {
    /// Connection handle, exclusively owned here.
    pub conn: Arc<dyn Connection>,

    /// Declared profile; set on the first search request.
    pub profile: Option<Profile>,

    pub status: ParticipantStatus,

    /// Live match this participant belongs to, if any. Invariant:
    /// `Some` if and only if `status == Matched` and the id references an
    /// entry in the match table.
    pub match_id: Option<Uuid>,
}

impl Participant {
    pub fn new(conn: Arc<dyn Connection>) -> Self {
        Self {
            conn,
            profile: None,
            status: ParticipantStatus::Connected,
            match_id: None,
        }
    }
}

/// Waiting pool entry for one searching participant.
///
/// The profile is a snapshot taken at enqueue time, not a live link.
pub struct WaitingEntry {
    pub participant_id: Uuid,
    pub profile: Profile,
    pub enqueued_at: DateTime<Utc>,

    /// Whether the first "no matches yet" notice went out.
    pub notified: bool,
    pub last_notified: Option<DateTime<Utc>>,
}

impl WaitingEntry {
    pub fn new(participant_id: Uuid, profile: Profile, now: DateTime<Utc>) -> Self {
        Self {
            participant_id,
            profile,
            enqueued_at: now,
            notified: false,
            last_notified: None,
        }
    }
}

/// One side of a live match.
pub struct MatchMember {
    pub participant_id: Uuid,
    pub conn: Arc<dyn Connection>,
    pub profile: Profile,
}

/// A live pairing between exactly two participants, keyed by match id in
/// the match table.
pub struct ActiveMatch {
    pub members: [MatchMember; 2],
    pub created_at: DateTime<Utc>,
}

impl ActiveMatch {
    /// The member that is not `id`, or `None` if `id` is not a member.
    ///
    /// Returning `None` for non-members is what keeps relayed audio from
    /// ever being echoed or misdelivered.
    pub fn partner_of(&self, id: Uuid) -> Option<&MatchMember> {
        if self.members[0].participant_id == id {
            Some(&self.members[1])
        } else if self.members[1].participant_id == id {
            Some(&self.members[0])
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::profile::{Gender, Preference};

    struct NullConnection;

    impl Connection for NullConnection {
        fn send_text(&self, _payload: String) {}
        fn send_binary(&self, _payload: Bytes) {}
    }

    fn profile(name: &str) -> Profile {
        Profile {
            name: name.to_string(),
            age: 30,
            gender: Gender::Other,
            looking_for: Preference::Any,
            location: String::new(),
        }
    }

    #[test]
    fn test_partner_lookup() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let m = ActiveMatch {
            members: [
                MatchMember {
                    participant_id: a,
                    conn: Arc::new(NullConnection),
                    profile: profile("a"),
                },
                MatchMember {
                    participant_id: b,
                    conn: Arc::new(NullConnection),
                    profile: profile("b"),
                },
            ],
            created_at: Utc::now(),
        };

        assert_eq!(m.partner_of(a).unwrap().participant_id, b);
        assert_eq!(m.partner_of(b).unwrap().participant_id, a);
        assert!(m.partner_of(Uuid::new_v4()).is_none());
    }

    #[test]
    fn test_new_participant_starts_connected() {
        let p = Participant::new(Arc::new(NullConnection));
        assert_eq!(p.status, ParticipantStatus::Connected);
        assert!(p.profile.is_none());
        assert!(p.match_id.is_none());
    }
}
