use std::cmp::Reverse;
use std::fmt;
use std::str::FromStr;

use tracing::{info, warn};

use crate::totals::{AuditTotals, AuditTotalsByCounty, OfficialTotals, VoteTotals};
use crate::{Error, Result};

/// Name of the row summing all the matched counties.
pub const ALL_ROW_NAME: &str = "ALL";

/// A known discrepancy corrected before comparing: `amount` is subtracted from a county's
/// audited ballots cast and undervotes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Adjustment {
    pub county: String,
    pub amount: i64,
}

impl FromStr for Adjustment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let syntax = || Error::AdjustmentSyntax(s.to_string());
        let (county, amount) = s.rsplit_once('=').ok_or_else(syntax)?;
        let county = county.trim();
        if county.is_empty() {
            return Err(syntax());
        }
        let amount = amount.trim().parse().map_err(|_| syntax())?;
        Ok(Adjustment {
            county: county.to_string(),
            amount,
        })
    }
}

impl fmt::Display for Adjustment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.county, self.amount)
    }
}

pub fn apply_adjustments(audit: &mut AuditTotalsByCounty, adjustments: &[Adjustment]) -> Result<()> {
    for adjustment in adjustments {
        let totals = audit
            .get_mut(&adjustment.county)
            .ok_or_else(|| Error::UnknownAdjustmentCounty(adjustment.county.clone()))?;
        totals.votes.ballots_cast -= adjustment.amount;
        totals.votes.undervotes -= adjustment.amount;
        info!("adjusted audit totals: {adjustment}");
    }
    Ok(())
}

/// One line of the comparison table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconRow {
    pub name: String,
    pub official: VoteTotals,
    pub audit: AuditTotals,
    /// Audit minus official.
    pub delta: VoteTotals,
}

impl ReconRow {
    fn new(name: String, official: VoteTotals, audit: AuditTotals) -> Self {
        ReconRow {
            name,
            official,
            audit,
            delta: audit.votes - official,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// The `ALL` row first, then by descending ballots cast discrepancy, then by name.
    pub rows: Vec<ReconRow>,
    pub official_only: Vec<String>,
    pub audit_only: Vec<String>,
    /// County names in the audit report that aren't in the county list.
    pub unknown_audit_names: Vec<String>,
}

impl Reconciliation {
    /// Whether both sources reported the same set of counties.
    pub fn is_complete(&self) -> bool {
        self.official_only.is_empty()
            && self.audit_only.is_empty()
            && self.unknown_audit_names.is_empty()
    }

    /// Number of county rows, not counting `ALL`.
    pub fn county_count(&self) -> usize {
        self.rows.len().saturating_sub(1)
    }

    /// One line per unmatched county, plus one if the county count isn't `expected`.
    pub fn unmatched_warnings(&self, expected: Option<usize>) -> Vec<String> {
        let mut warnings = Vec::new();
        for name in &self.official_only {
            warnings.push(format!("county {name:?} has official totals but no audit totals"));
        }
        for name in &self.audit_only {
            warnings.push(format!("county {name:?} has audit totals but no official totals"));
        }
        for name in &self.unknown_audit_names {
            warnings.push(format!("audit report names an unknown county: {name:?}"));
        }
        if let Some(expected) = expected {
            if self.county_count() != expected {
                warnings.push(format!(
                    "reconciled {} counties, expected {expected}",
                    self.county_count()
                ));
            }
        }
        warnings
    }

    pub fn report_unmatched(&self, expected: Option<usize>) {
        for warning in self.unmatched_warnings(expected) {
            warn!("{warning}");
        }
    }
}

/// Joins the two sources on county name. Only counties in both produce a row.
pub fn reconcile(official: &OfficialTotals, audit: &AuditTotalsByCounty) -> Reconciliation {
    let mut rows = Vec::with_capacity(official.len() + 1);
    let mut official_only = Vec::new();
    let mut all_official = VoteTotals::default();
    let mut all_audit = AuditTotals::default();

    for (name, &official_totals) in official {
        let Some(&audit_totals) = audit.get(name) else {
            official_only.push(name.clone());
            continue;
        };
        all_official += official_totals;
        all_audit += audit_totals;
        rows.push(ReconRow::new(name.clone(), official_totals, audit_totals));
    }

    let audit_only = audit
        .keys()
        .filter(|name| !official.contains_key(*name))
        .cloned()
        .collect();

    rows.push(ReconRow::new(
        ALL_ROW_NAME.to_string(),
        all_official,
        all_audit,
    ));
    rows.sort_by(|a, b| {
        (a.name != ALL_ROW_NAME, Reverse(a.delta.ballots_cast.abs()), &a.name).cmp(&(
            b.name != ALL_ROW_NAME,
            Reverse(b.delta.ballots_cast.abs()),
            &b.name,
        ))
    });

    Reconciliation {
        rows,
        official_only,
        audit_only,
        unknown_audit_names: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn official(candidates: i64, ballots_cast: i64, undervotes: i64, overvotes: i64) -> VoteTotals {
        VoteTotals {
            candidates,
            ballots_cast,
            undervotes,
            overvotes,
        }
    }

    fn audit(votes: VoteTotals) -> AuditTotals {
        AuditTotals {
            votes,
            invalid_write_ins: 1,
            valid_write_ins: 2,
        }
    }

    #[test]
    fn parses_adjustment() {
        assert_eq!(
            "Gwinnett=119461".parse::<Adjustment>().unwrap(),
            Adjustment {
                county: "Gwinnett".into(),
                amount: 119461,
            }
        );
        assert_eq!(
            "Jeff Davis = -3".parse::<Adjustment>().unwrap().amount,
            -3
        );
        assert!("Gwinnett".parse::<Adjustment>().is_err());
        assert!("=5".parse::<Adjustment>().is_err());
        assert!("Gwinnett=lots".parse::<Adjustment>().is_err());
    }

    #[test]
    fn adjusts_ballots_cast_and_undervotes() {
        let mut totals = AuditTotalsByCounty::new();
        totals.insert("Gwinnett".into(), audit(official(400, 500, 150, 0)));
        let adjustment = Adjustment {
            county: "Gwinnett".into(),
            amount: 100,
        };

        apply_adjustments(&mut totals, &[adjustment]).unwrap();
        assert_eq!(totals["Gwinnett"].votes, official(400, 400, 50, 0));

        let unknown = Adjustment {
            county: "Fulton".into(),
            amount: 1,
        };
        assert!(matches!(
            apply_adjustments(&mut totals, &[unknown]).unwrap_err(),
            Error::UnknownAdjustmentCounty(name) if name == "Fulton"
        ));
    }

    #[test]
    fn orders_all_first_then_by_discrepancy() {
        let mut ofc = OfficialTotals::new();
        ofc.insert("Appling".into(), official(90, 100, 5, 0));
        ofc.insert("Bacon".into(), official(190, 200, 5, 0));
        ofc.insert("Coffee".into(), official(290, 300, 5, 0));
        ofc.insert("Dodge".into(), official(10, 10, 0, 0));

        let mut rla = AuditTotalsByCounty::new();
        rla.insert("Appling".into(), audit(official(90, 97, 5, 0)));
        rla.insert("Bacon".into(), audit(official(190, 210, 15, 0)));
        rla.insert("Coffee".into(), audit(official(290, 303, 8, 0)));
        rla.insert("Echols".into(), audit(official(1, 1, 0, 0)));

        let recon = reconcile(&ofc, &rla);
        let names: Vec<_> = recon.rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["ALL", "Bacon", "Appling", "Coffee"]);

        let all = &recon.rows[0];
        assert_eq!(all.official, official(570, 600, 15, 0));
        assert_eq!(all.audit.votes, official(570, 610, 28, 0));
        assert_eq!(all.audit.valid_write_ins, 6);
        assert_eq!(all.delta, official(0, 10, 13, 0));

        assert_eq!(recon.rows[2].delta.ballots_cast, -3);
        assert_eq!(recon.official_only, ["Dodge"]);
        assert_eq!(recon.audit_only, ["Echols"]);
        assert!(!recon.is_complete());
        assert_eq!(recon.county_count(), 3);
    }

    #[test]
    fn empty_sources_still_have_all_row() {
        let recon = reconcile(&OfficialTotals::new(), &AuditTotalsByCounty::new());
        assert_eq!(recon.rows.len(), 1);
        assert_eq!(recon.rows[0].delta, VoteTotals::default());
        assert!(recon.is_complete());
        assert_eq!(recon.county_count(), 0);
    }

    #[test]
    fn warns_about_every_unmatched_county() {
        let mut ofc = OfficialTotals::new();
        ofc.insert("Appling".into(), official(1, 1, 0, 0));
        ofc.insert("Dodge".into(), official(1, 1, 0, 0));
        let mut rla = AuditTotalsByCounty::new();
        rla.insert("Appling".into(), audit(official(1, 1, 0, 0)));
        rla.insert("Echols".into(), audit(official(1, 1, 0, 0)));

        let mut recon = reconcile(&ofc, &rla);
        recon.unknown_audit_names.push("DEKALB".into());

        assert_eq!(
            recon.unmatched_warnings(Some(159)),
            [
                r#"county "Dodge" has official totals but no audit totals"#,
                r#"county "Echols" has audit totals but no official totals"#,
                r#"audit report names an unknown county: "DEKALB""#,
                "reconciled 1 counties, expected 159",
            ]
        );
        assert_eq!(recon.unmatched_warnings(Some(1)).len(), 3);
        assert_eq!(recon.unmatched_warnings(None).len(), 3);
    }

    #[test]
    fn no_warnings_when_sources_agree() {
        let mut ofc = OfficialTotals::new();
        ofc.insert("Appling".into(), official(1, 1, 0, 0));
        let mut rla = AuditTotalsByCounty::new();
        rla.insert("Appling".into(), audit(official(1, 1, 0, 0)));

        let recon = reconcile(&ofc, &rla);
        assert!(recon.is_complete());
        assert!(recon.unmatched_warnings(Some(1)).is_empty());
    }
}
