//! Shared primitive IDs and regatta-related enums.

use serde::{Deserialize, Serialize};

/// Monotonic entry identifier.
pub type EntryId = u64;
/// Monotonic operation sequence number.
pub type OpSeq = u64;
/// Race (regatta instance) identifier.
pub type RaceId = u64;

/// Lifecycle state of a race entry.
///
/// Only [`EntryStatus::Entered`] participates in clash detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryStatus {
    /// Still being drafted by the coach.
    InProgress,
    /// Complete but not yet submitted.
    Ready,
    /// Submitted and confirmed into the race.
    Entered,
    /// Withdrawn after submission.
    Withdrawn,
    /// Rejected by the organizers.
    Rejected,
}

/// Canonical boat-class code recognized in event text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BoatClass {
    /// Coxed octuple scull (`8x+`).
    Octuple,
    /// Coxed eight (`8+`).
    Eight,
    /// Coxed quad scull (`4x+`).
    CoxedQuad,
    /// Coxless quad scull (`4x-`).
    CoxlessQuad,
    /// Quad scull (`4x`).
    Quad,
    /// Coxed four (`4+`).
    CoxedFour,
    /// Coxless four (`4-`).
    CoxlessFour,
    /// Coxless double scull (`2x-`).
    CoxlessDouble,
    /// Double scull (`2x`).
    Double,
    /// Coxless pair (`2-`).
    Pair,
    /// Coxless single scull (`1x-`).
    CoxlessSingle,
    /// Single scull (`1x`).
    Single,
}

impl BoatClass {
    /// Canonical code string for this class.
    pub fn code(self) -> &'static str {
        match self {
            Self::Octuple => "8x+",
            Self::Eight => "8+",
            Self::CoxedQuad => "4x+",
            Self::CoxlessQuad => "4x-",
            Self::Quad => "4x",
            Self::CoxedFour => "4+",
            Self::CoxlessFour => "4-",
            Self::CoxlessDouble => "2x-",
            Self::Double => "2x",
            Self::Pair => "2-",
            Self::CoxlessSingle => "1x-",
            Self::Single => "1x",
        }
    }

    /// Number of individual oars this class requires, not oarsmen-pairs.
    pub fn blade_count(self) -> u32 {
        match self {
            Self::Octuple => 16,
            Self::Eight | Self::CoxedQuad | Self::CoxlessQuad | Self::Quad => 8,
            Self::CoxedFour | Self::CoxlessFour | Self::CoxlessDouble | Self::Double => 4,
            Self::Pair | Self::CoxlessSingle | Self::Single => 2,
        }
    }
}
