use std::collections::BTreeMap;
use std::ops::{AddAssign, Sub};

use serde::{Deserialize, Serialize};

/// Keys compared between the two sources, in output order.
pub const VOTE_TOTAL_KEYS: [&str; 4] = ["TBJ", "BC", "Und", "Ovr"];
/// Keys reported by the audit: the compared keys plus the write-in counts.
pub const AUDIT_KEYS: [&str; 6] = ["TBJ", "BC", "Und", "Ovr", "InvW", "ValW"];

/// County name -> official totals.
pub type OfficialTotals = BTreeMap<String, VoteTotals>;
/// County name -> audit totals.
pub type AuditTotalsByCounty = BTreeMap<String, AuditTotals>;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteTotals {
    /// Trump + Biden + Jorgensen.
    #[serde(rename = "TBJ")]
    pub candidates: i64,
    #[serde(rename = "BC")]
    pub ballots_cast: i64,
    #[serde(rename = "Und")]
    pub undervotes: i64,
    #[serde(rename = "Ovr")]
    pub overvotes: i64,
}

impl VoteTotals {
    /// Values in `VOTE_TOTAL_KEYS` order.
    pub fn values(&self) -> [i64; 4] {
        [
            self.candidates,
            self.ballots_cast,
            self.undervotes,
            self.overvotes,
        ]
    }
}

impl AddAssign for VoteTotals {
    fn add_assign(&mut self, rhs: Self) {
        self.candidates += rhs.candidates;
        self.ballots_cast += rhs.ballots_cast;
        self.undervotes += rhs.undervotes;
        self.overvotes += rhs.overvotes;
    }
}

impl Sub for VoteTotals {
    type Output = VoteTotals;

    fn sub(self, rhs: Self) -> Self::Output {
        VoteTotals {
            candidates: self.candidates - rhs.candidates,
            ballots_cast: self.ballots_cast - rhs.ballots_cast,
            undervotes: self.undervotes - rhs.undervotes,
            overvotes: self.overvotes - rhs.overvotes,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditTotals {
    #[serde(flatten)]
    pub votes: VoteTotals,
    #[serde(rename = "InvW")]
    pub invalid_write_ins: i64,
    #[serde(rename = "ValW")]
    pub valid_write_ins: i64,
}

impl AuditTotals {
    /// Values in `AUDIT_KEYS` order.
    pub fn values(&self) -> [i64; 6] {
        let [tbj, bc, und, ovr] = self.votes.values();
        [
            tbj,
            bc,
            und,
            ovr,
            self.invalid_write_ins,
            self.valid_write_ins,
        ]
    }
}

impl AddAssign for AuditTotals {
    fn add_assign(&mut self, rhs: Self) {
        self.votes += rhs.votes;
        self.invalid_write_ins += rhs.invalid_write_ins;
        self.valid_write_ins += rhs.valid_write_ins;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_is_signed() {
        let official = VoteTotals {
            candidates: 10,
            ballots_cast: 12,
            undervotes: 1,
            overvotes: 1,
        };
        let audit = VoteTotals {
            candidates: 9,
            ballots_cast: 15,
            undervotes: 5,
            overvotes: 1,
        };
        assert_eq!((audit - official).values(), [-1, 3, 4, 0]);
    }

    #[test]
    fn audit_totals_serialize_flat_with_short_keys() {
        let totals = AuditTotals {
            votes: VoteTotals {
                candidates: 1,
                ballots_cast: 2,
                undervotes: 3,
                overvotes: 4,
            },
            invalid_write_ins: 5,
            valid_write_ins: 6,
        };
        let value = serde_json::to_value(totals).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"TBJ": 1, "BC": 2, "Und": 3, "Ovr": 4, "InvW": 5, "ValW": 6})
        );
        let back: AuditTotals = serde_json::from_value(value).unwrap();
        assert_eq!(back, totals);
    }
}
