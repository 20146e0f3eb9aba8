//! # Wire Protocol Messages
//!
//! Control frames exchanged with clients over the WebSocket connection.
//! Text frames carry JSON messages with a `type` discriminant; binary frames
//! carry opaque audio payloads and never pass through this module.
//!
//! ## Message Flow:
//! - **Client to server**: `ClientMessage` (find_match, next_match,
//!   end_match, end_session). Anything else is a decode failure and is
//!   dropped by the transport layer.
//! - **Server to client**: `ServerMessage`, the lifecycle notifications plus
//!   the periodic `stats_update` broadcast.

use crate::matching::profile::{Gender, Profile};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Control messages a client can send.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Start searching with the given profile.
    #[serde(rename = "find_match")]
    FindMatch { profile: Profile },

    /// End the current match (if any) and immediately search again.
    #[serde(rename = "next_match")]
    NextMatch { profile: Profile },

    /// End the current match and go back to idle.
    #[serde(rename = "end_match")]
    EndMatch,

    /// Close the session; treated exactly like a connection close.
    #[serde(rename = "end_session")]
    EndSession,
}

/// Notifications the server sends to clients.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Welcome message right after the connection is registered.
    #[serde(rename = "connected")]
    Connected { message: String },

    /// Search accepted, participant is now in the waiting pool.
    #[serde(rename = "searching")]
    Searching { message: String },

    /// Still waiting, nothing compatible available yet.
    #[serde(rename = "no_matches")]
    NoMatches { message: String },

    /// A match was created; includes the partner's public profile only,
    /// never connection identifiers.
    #[serde(rename = "match_found")]
    MatchFound {
        #[serde(rename = "matchId")]
        match_id: Uuid,
        partner: PartnerInfo,
    },

    /// The current match was dissolved (by the partner or by timeout).
    #[serde(rename = "match_ended")]
    MatchEnded { reason: String },

    /// The partner's connection dropped.
    #[serde(rename = "partner_disconnected")]
    PartnerDisconnected { message: String },

    /// The search aged out of the waiting pool.
    #[serde(rename = "search_timeout")]
    SearchTimeout { message: String },

    /// Aggregate counters, broadcast after every lifecycle change.
    #[serde(rename = "stats_update")]
    StatsUpdate { stats: StatsSnapshot },
}

/// The subset of a partner's profile disclosed in `match_found`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartnerInfo {
    pub name: String,
    pub age: u8,
    pub gender: Gender,
    pub location: String,
}

impl From<&Profile> for PartnerInfo {
    fn from(profile: &Profile) -> Self {
        Self {
            name: profile.name.clone(),
            age: profile.age,
            gender: profile.gender,
            location: profile.location.clone(),
        }
    }
}

/// Aggregate counters derived from the live collections.
///
/// `total_matches` is monotonic for the lifetime of the process; the other
/// three are recomputed from the registry, waiting pool and match table.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub users_online: usize,
    pub waiting_users: usize,
    pub active_matches: usize,
    pub total_matches: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::profile::Preference;

    #[test]
    fn test_client_message_parsing() {
        let json = r#"{"type":"find_match","profile":{"name":"Ana","age":25,"gender":"female","lookingFor":"male","location":"Lisbon"}}"#;
        match serde_json::from_str::<ClientMessage>(json).unwrap() {
            ClientMessage::FindMatch { profile } => {
                assert_eq!(profile.name, "Ana");
                assert_eq!(profile.looking_for, Preference::Male);
            }
            other => panic!("wrong variant: {:?}", other),
        }
    }

    #[test]
    fn test_bare_control_messages_parse() {
        assert!(matches!(
            serde_json::from_str::<ClientMessage>(r#"{"type":"end_match"}"#).unwrap(),
            ClientMessage::EndMatch
        ));
        assert!(matches!(
            serde_json::from_str::<ClientMessage>(r#"{"type":"end_session"}"#).unwrap(),
            ClientMessage::EndSession
        ));
    }

    #[test]
    fn test_unknown_type_is_a_decode_failure() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"dance"}"#).is_err());
        assert!(serde_json::from_str::<ClientMessage>("not json at all").is_err());
    }

    #[test]
    fn test_match_found_wire_shape() {
        let msg = ServerMessage::MatchFound {
            match_id: Uuid::nil(),
            partner: PartnerInfo {
                name: "Ben".to_string(),
                age: 30,
                gender: Gender::Male,
                location: "Porto".to_string(),
            },
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""type":"match_found""#));
        assert!(json.contains(r#""matchId""#));
        assert!(json.contains(r#""gender":"male""#));
        // Connection identifiers must never appear next to partner data.
        assert!(!json.contains("conn"));
    }

    #[test]
    fn test_stats_update_uses_camel_case() {
        let msg = ServerMessage::StatsUpdate {
            stats: StatsSnapshot {
                users_online: 4,
                waiting_users: 1,
                active_matches: 1,
                total_matches: 7,
            },
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""usersOnline":4"#));
        assert!(json.contains(r#""waitingUsers":1"#));
        assert!(json.contains(r#""activeMatches":1"#));
        assert!(json.contains(r#""totalMatches":7"#));
    }
}
