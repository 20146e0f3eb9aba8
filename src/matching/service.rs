//! # Matchmaking Service
//!
//! The session/matchmaking engine: one owned service struct holding the
//! participant registry, the waiting pool and the match table, plus every
//! operation that mutates them.
//!
//! ## Concurrency Model:
//! All three collections live behind a single `RwLock`. Every lifecycle
//! operation (connect, disconnect, find/next/end match, the matching pass,
//! the reaper sweeps) takes the write lock and runs to completion, so the
//! cross-collection invariants are never observed half-updated. Audio relay
//! only reads the current match lookup and takes the read lock, so it can
//! run alongside other relays without queueing behind lifecycle changes.
//!
//! Outbound sends happen while the lock is held but are fire-and-forget
//! (`Connection` implementations never block), so a slow peer cannot stall
//! the engine.
//!
//! ## Timing:
//! The periodic entry points exist in `*_at(now)` form taking an explicit
//! timestamp, with `Utc::now()` wrappers for the timer tasks. Threshold
//! behavior is tested by passing shifted timestamps instead of sleeping.

use crate::config::{AppConfig, CleanupConfig, MatchingConfig};
use crate::matching::messages::{PartnerInfo, ServerMessage, StatsSnapshot};
use crate::matching::profile::{compatible, Profile};
use crate::matching::registry::{
    ActiveMatch, Connection, MatchMember, Participant, ParticipantStatus, WaitingEntry,
};
use actix_web::web::Bytes;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

/// The three shared collections plus the lifetime match counter, guarded
/// together by one lock.
struct Inner {
    /// Registry: every live connection, keyed by participant id.
    participants: HashMap<Uuid, Participant>,

    /// Waiting pool in insertion order.
    waiting: Vec<WaitingEntry>,

    /// Match table, keyed by match id.
    matches: HashMap<Uuid, ActiveMatch>,

    /// Monotonic count of matches ever created; never decremented.
    total_matches: u64,
}

impl Inner {
    fn new() -> Self {
        Self {
            participants: HashMap::new(),
            waiting: Vec::new(),
            matches: HashMap::new(),
            total_matches: 0,
        }
    }

    fn stats(&self) -> StatsSnapshot {
        StatsSnapshot {
            users_online: self.participants.len(),
            waiting_users: self.waiting.len(),
            active_matches: self.matches.len(),
            total_matches: self.total_matches,
        }
    }

    fn remove_from_waiting(&mut self, id: Uuid) {
        self.waiting.retain(|entry| entry.participant_id != id);
    }

    fn waiting_position(&self, id: Uuid) -> Option<usize> {
        self.waiting.iter().position(|entry| entry.participant_id == id)
    }
}

/// Owned service struct injected into the transport layer and the timer
/// jobs. Thresholds are read from the shared config on every pass, so
/// runtime config updates take effect on the next tick.
pub struct MatchmakingService {
    inner: RwLock<Inner>,
    config: Arc<RwLock<AppConfig>>,
}

impl MatchmakingService {
    pub fn new(config: Arc<RwLock<AppConfig>>) -> Self {
        Self {
            inner: RwLock::new(Inner::new()),
            config,
        }
    }

    fn matching_cfg(&self) -> MatchingConfig {
        self.config.read().unwrap().matching.clone()
    }

    fn cleanup_cfg(&self) -> CleanupConfig {
        self.config.read().unwrap().cleanup.clone()
    }

    // -- Lifecycle operations ------------------------------------------------

    /// Register a new connection. Allocates the participant id, sends the
    /// welcome message and broadcasts updated stats.
    pub fn connect(&self, conn: Arc<dyn Connection>) -> Uuid {
        let id = Uuid::new_v4();
        let mut inner = self.inner.write().unwrap();
        inner.participants.insert(id, Participant::new(conn.clone()));

        info!("participant {} connected", id);

        send_message(
            &conn,
            &ServerMessage::Connected {
                message: "Welcome! You are connected to the voice match server.".to_string(),
            },
        );
        self.broadcast_stats_locked(&inner);
        id
    }

    /// Tear down all state for a participant. Idempotent: a second call for
    /// an already-removed id is a no-op.
    pub fn disconnect(&self, id: Uuid) {
        let mut inner = self.inner.write().unwrap();
        let Some(participant) = inner.participants.remove(&id) else {
            return;
        };

        info!("participant {} disconnected", id);
        inner.remove_from_waiting(id);

        if let Some(match_id) = participant.match_id {
            if let Some(ended) = inner.matches.remove(&match_id) {
                if let Some(partner) = ended.partner_of(id) {
                    send_message(
                        &partner.conn,
                        &ServerMessage::PartnerDisconnected {
                            message: "Your partner disconnected".to_string(),
                        },
                    );
                    if let Some(p) = inner.participants.get_mut(&partner.participant_id) {
                        p.match_id = None;
                        p.status = ParticipantStatus::Connected;
                    }
                }
            }
        }

        self.broadcast_stats_locked(&inner);
    }

    /// Start searching. Ends any current match (without re-enqueuing the
    /// partner side of this participant), replaces any stale waiting entry,
    /// stores the profile and runs one eager matching pass.
    pub fn find_match(&self, id: Uuid, profile: Profile) {
        let cfg = self.matching_cfg();
        let now = Utc::now();
        let mut inner = self.inner.write().unwrap();
        self.find_match_locked(&mut inner, id, profile, now, &cfg);
    }

    /// End the current match and search again with a fresh profile. The
    /// partner of the ended match is notified strictly before the new
    /// search is announced.
    pub fn next_match(&self, id: Uuid, profile: Profile) {
        let cfg = self.matching_cfg();
        let now = Utc::now();
        let mut inner = self.inner.write().unwrap();
        info!("participant {} requested next match", id);
        self.end_match_locked(&mut inner, id, false, now);
        self.find_match_locked(&mut inner, id, profile, now, &cfg);
    }

    /// End the participant's current match, if any. With `re_enqueue` the
    /// participant goes straight back into the waiting pool (profile
    /// permitting); otherwise they return to idle.
    pub fn end_match(&self, id: Uuid, re_enqueue: bool) {
        let now = Utc::now();
        let mut inner = self.inner.write().unwrap();
        self.end_match_locked(&mut inner, id, re_enqueue, now);
    }

    /// Forward an audio frame to the sender's current match partner.
    ///
    /// Read-only: takes the read lock and never mutates membership. Missing
    /// participant, missing match or a closed partner connection all mean
    /// the frame is silently dropped; stale audio has no value.
    pub fn relay_audio(&self, sender: Uuid, payload: Bytes) {
        let inner = self.inner.read().unwrap();
        let Some(participant) = inner.participants.get(&sender) else {
            return;
        };
        let Some(match_id) = participant.match_id else {
            return;
        };
        let Some(active) = inner.matches.get(&match_id) else {
            return;
        };
        if let Some(partner) = active.partner_of(sender) {
            debug!("relaying {} bytes in match {}", payload.len(), match_id);
            partner.conn.send_binary(payload);
        }
    }

    // -- Periodic jobs -------------------------------------------------------

    /// One matchmaking pass at the current time; the timer tick entry point.
    pub fn run_matching_pass(&self) {
        let cfg = self.matching_cfg();
        let mut inner = self.inner.write().unwrap();
        self.matching_pass_locked(&mut inner, Utc::now(), &cfg);
    }

    /// One matchmaking pass at an explicit timestamp.
    pub fn run_matching_pass_at(&self, now: DateTime<Utc>) {
        let cfg = self.matching_cfg();
        let mut inner = self.inner.write().unwrap();
        self.matching_pass_locked(&mut inner, now, &cfg);
    }

    /// Evict waiting entries older than the configured timeout.
    pub fn sweep_waiting(&self) {
        self.sweep_waiting_at(Utc::now());
    }

    pub fn sweep_waiting_at(&self, now: DateTime<Utc>) {
        let timeout = Duration::seconds(self.cleanup_cfg().waiting_timeout_seconds as i64);
        let mut inner = self.inner.write().unwrap();

        let expired: Vec<Uuid> = inner
            .waiting
            .iter()
            .filter(|entry| now - entry.enqueued_at > timeout)
            .map(|entry| entry.participant_id)
            .collect();
        if expired.is_empty() {
            return;
        }

        inner.waiting.retain(|entry| now - entry.enqueued_at <= timeout);
        for id in expired {
            info!("search timed out for participant {}", id);
            if let Some(p) = inner.participants.get_mut(&id) {
                p.status = ParticipantStatus::Connected;
                let conn = p.conn.clone();
                send_message(
                    &conn,
                    &ServerMessage::SearchTimeout {
                        message: "Search timed out. Please try again.".to_string(),
                    },
                );
            }
        }
    }

    /// Evict matches older than the configured inactivity timeout.
    pub fn sweep_matches(&self) {
        self.sweep_matches_at(Utc::now());
    }

    pub fn sweep_matches_at(&self, now: DateTime<Utc>) {
        let timeout = Duration::seconds(self.cleanup_cfg().match_timeout_seconds as i64);
        let mut inner = self.inner.write().unwrap();

        let expired: Vec<Uuid> = inner
            .matches
            .iter()
            .filter(|(_, m)| now - m.created_at > timeout)
            .map(|(id, _)| *id)
            .collect();

        for match_id in expired {
            let Some(ended) = inner.matches.remove(&match_id) else {
                continue;
            };
            info!(
                "match {} between {} and {} timed out due to inactivity",
                match_id, ended.members[0].profile.name, ended.members[1].profile.name
            );
            for member in &ended.members {
                send_message(
                    &member.conn,
                    &ServerMessage::MatchEnded {
                        reason: "Match timed out due to inactivity".to_string(),
                    },
                );
                if let Some(p) = inner.participants.get_mut(&member.participant_id) {
                    p.match_id = None;
                    p.status = ParticipantStatus::Connected;
                }
            }
        }
    }

    /// Current aggregate counters; the pull-style stats query.
    pub fn stats(&self) -> StatsSnapshot {
        self.inner.read().unwrap().stats()
    }

    // -- Internals (caller holds the write lock) -----------------------------

    fn find_match_locked(
        &self,
        inner: &mut Inner,
        id: Uuid,
        profile: Profile,
        now: DateTime<Utc>,
        cfg: &MatchingConfig,
    ) {
        // A matched participant starting a new search implicitly ends the
        // current match, without re-enqueuing themselves through that path.
        self.end_match_locked(inner, id, false, now);
        inner.remove_from_waiting(id);

        let conn = {
            let Some(participant) = inner.participants.get_mut(&id) else {
                return;
            };
            participant.profile = Some(profile.clone());
            participant.status = ParticipantStatus::Waiting;
            participant.conn.clone()
        };

        info!(
            "participant {} searching: {} ({}, {:?}) looking for {:?}",
            id, profile.name, profile.age, profile.gender, profile.looking_for
        );
        inner.waiting.push(WaitingEntry::new(id, profile, now));

        self.broadcast_stats_locked(inner);
        send_message(
            &conn,
            &ServerMessage::Searching {
                message: "Looking for a compatible partner...".to_string(),
            },
        );

        // Eager pass so pairing latency is not bounded by the timer tick.
        self.matching_pass_locked(inner, now, cfg);
    }

    fn end_match_locked(&self, inner: &mut Inner, id: Uuid, re_enqueue: bool, now: DateTime<Utc>) {
        let Some(match_id) = inner.participants.get(&id).and_then(|p| p.match_id) else {
            return;
        };

        let Some(ended) = inner.matches.remove(&match_id) else {
            // Stale reference left over from a race; just clear it.
            if let Some(p) = inner.participants.get_mut(&id) {
                p.match_id = None;
                p.status = ParticipantStatus::Connected;
            }
            return;
        };

        info!("participant {} ended match {}", id, match_id);

        if let Some(partner) = ended.partner_of(id) {
            send_message(
                &partner.conn,
                &ServerMessage::MatchEnded {
                    reason: "Your partner ended the match".to_string(),
                },
            );
            if let Some(p) = inner.participants.get_mut(&partner.participant_id) {
                p.match_id = None;
                p.status = ParticipantStatus::Connected;
            }
        }

        let mut re_enqueue_profile = None;
        if let Some(p) = inner.participants.get_mut(&id) {
            p.match_id = None;
            match (re_enqueue, p.profile.clone()) {
                (true, Some(profile)) => {
                    p.status = ParticipantStatus::Waiting;
                    re_enqueue_profile = Some(profile);
                }
                _ => p.status = ParticipantStatus::Connected,
            }
        }
        if let Some(profile) = re_enqueue_profile {
            inner.waiting.push(WaitingEntry::new(id, profile, now));
        }

        self.broadcast_stats_locked(inner);
    }

    /// One sweep over the waiting pool: pair the first compatible couple
    /// found, or send "still searching" notices if nothing pairs up.
    ///
    /// At most one match is created per pass; the periodic tick picks up
    /// remaining candidates on the next rounds.
    fn matching_pass_locked(&self, inner: &mut Inner, now: DateTime<Utc>, cfg: &MatchingConfig) {
        let snapshot: Vec<Uuid> = inner.waiting.iter().map(|e| e.participant_id).collect();

        for i in 0..snapshot.len() {
            for j in (i + 1)..snapshot.len() {
                // Entries can disappear between snapshot and test (disconnect,
                // or the pair created earlier in this pass); re-validate both.
                let (Some(a_pos), Some(b_pos)) = (
                    inner.waiting_position(snapshot[i]),
                    inner.waiting_position(snapshot[j]),
                ) else {
                    continue;
                };

                let a = &inner.waiting[a_pos];
                let b = &inner.waiting[b_pos];
                if compatible(&a.profile, &b.profile, cfg.max_age_gap) {
                    self.create_match_locked(inner, snapshot[i], snapshot[j], now);
                    return;
                }
            }
        }

        self.notify_unmatched_locked(inner, now, cfg);
    }

    fn create_match_locked(&self, inner: &mut Inner, a: Uuid, b: Uuid, now: DateTime<Utc>) {
        let Some(conn_a) = inner.participants.get(&a).map(|p| p.conn.clone()) else {
            return;
        };
        let Some(conn_b) = inner.participants.get(&b).map(|p| p.conn.clone()) else {
            return;
        };
        let (Some(a_pos), Some(b_pos)) = (inner.waiting_position(a), inner.waiting_position(b))
        else {
            return;
        };

        // Pull both entries out of the pool atomically; higher index first so
        // the lower one does not shift.
        let (first, second) = if a_pos > b_pos { (a_pos, b_pos) } else { (b_pos, a_pos) };
        let entry_one = inner.waiting.remove(first);
        let entry_two = inner.waiting.remove(second);
        let (entry_a, entry_b) = if entry_one.participant_id == a {
            (entry_one, entry_two)
        } else {
            (entry_two, entry_one)
        };

        let match_id = Uuid::new_v4();
        info!(
            "created match {}: {} <-> {}",
            match_id, entry_a.profile.name, entry_b.profile.name
        );

        send_message(
            &conn_a,
            &ServerMessage::MatchFound {
                match_id,
                partner: PartnerInfo::from(&entry_b.profile),
            },
        );
        send_message(
            &conn_b,
            &ServerMessage::MatchFound {
                match_id,
                partner: PartnerInfo::from(&entry_a.profile),
            },
        );

        inner.matches.insert(
            match_id,
            ActiveMatch {
                members: [
                    MatchMember {
                        participant_id: a,
                        conn: conn_a,
                        profile: entry_a.profile,
                    },
                    MatchMember {
                        participant_id: b,
                        conn: conn_b,
                        profile: entry_b.profile,
                    },
                ],
                created_at: now,
            },
        );

        for id in [a, b] {
            if let Some(p) = inner.participants.get_mut(&id) {
                p.match_id = Some(match_id);
                p.status = ParticipantStatus::Matched;
            }
        }

        inner.total_matches += 1;
        self.broadcast_stats_locked(inner);
    }

    /// Tell long-waiting participants that nothing is available yet: a first
    /// notice once the wait exceeds the notice threshold, then follow-ups
    /// spaced by the repeat threshold. Runs even for a lone waiter.
    fn notify_unmatched_locked(&self, inner: &mut Inner, now: DateTime<Utc>, cfg: &MatchingConfig) {
        let notice_after = Duration::seconds(cfg.no_match_notice_seconds as i64);
        let repeat_after = Duration::seconds(cfg.no_match_repeat_seconds as i64);

        let Inner {
            ref mut waiting,
            ref participants,
            ..
        } = *inner;

        for entry in waiting.iter_mut() {
            let Some(participant) = participants.get(&entry.participant_id) else {
                continue;
            };
            if !entry.notified && now - entry.enqueued_at > notice_after {
                send_message(
                    &participant.conn,
                    &ServerMessage::NoMatches {
                        message: "Still looking for compatible partners...".to_string(),
                    },
                );
                entry.notified = true;
                entry.last_notified = Some(now);
                debug!("no-match notice sent to {}", entry.participant_id);
            } else if entry.notified
                && entry.last_notified.is_some_and(|last| now - last > repeat_after)
            {
                send_message(
                    &participant.conn,
                    &ServerMessage::NoMatches {
                        message: "Expanding the search, hang tight...".to_string(),
                    },
                );
                entry.last_notified = Some(now);
                debug!("no-match follow-up sent to {}", entry.participant_id);
            }
        }
    }

    fn broadcast_stats_locked(&self, inner: &Inner) {
        let message = ServerMessage::StatsUpdate {
            stats: inner.stats(),
        };
        if let Ok(json) = serde_json::to_string(&message) {
            for participant in inner.participants.values() {
                participant.conn.send_text(json.clone());
            }
        }
    }
}

fn send_message(conn: &Arc<dyn Connection>, message: &ServerMessage) {
    if let Ok(json) = serde_json::to_string(message) {
        conn.send_text(json);
    }
}
