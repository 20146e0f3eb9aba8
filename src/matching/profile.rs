//! # Profiles and Compatibility
//!
//! A participant declares a profile when they start searching. The profile is
//! snapshotted into the waiting pool entry at enqueue time, so a later edit
//! never changes an in-flight search.
//!
//! ## Compatibility rules:
//! - **Mutual preference**: each side's `lookingFor` must be `any` or equal
//!   to the other side's gender.
//! - **Age gap**: the absolute age difference must not exceed the configured
//!   maximum (15 years by default).

use serde::{Deserialize, Serialize};

/// Gender category a participant declares about themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

/// Partner category a participant is searching for.
///
/// `Any` is the wildcard: it accepts every gender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preference {
    Any,
    Male,
    Female,
    Other,
}

impl Preference {
    /// Whether this preference accepts a partner of the given gender.
    pub fn accepts(self, gender: Gender) -> bool {
        match self {
            Preference::Any => true,
            Preference::Male => gender == Gender::Male,
            Preference::Female => gender == Gender::Female,
            Preference::Other => gender == Gender::Other,
        }
    }
}

/// Profile a participant submits with a find_match / next_match request.
///
/// Field names follow the wire format used by the clients (`lookingFor`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    pub age: u8,
    pub gender: Gender,
    #[serde(rename = "lookingFor")]
    pub looking_for: Preference,
    pub location: String,
}

impl Profile {
    /// Absolute age difference between two profiles.
    pub fn age_gap(&self, other: &Profile) -> u8 {
        (self.age as i16 - other.age as i16).unsigned_abs() as u8
    }
}

/// Whether two profiles can be paired.
///
/// The check is symmetric: `compatible(a, b, g) == compatible(b, a, g)`.
pub fn compatible(a: &Profile, b: &Profile, max_age_gap: u8) -> bool {
    a.looking_for.accepts(b.gender)
        && b.looking_for.accepts(a.gender)
        && a.age_gap(b) <= max_age_gap
}
