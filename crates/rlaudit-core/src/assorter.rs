//! Assort and overstatement model.
//!
//! An assorter maps one ballot record to a bounded score in `[0, u]` such
//! that the reported winner really won iff the population mean of the scores
//! exceeds 1/2. Comparison audits wrap an assorter in a [`ClcaAssorter`],
//! which scores a (paper record, cast vote record) pair by how far the CVR
//! overstates the winner.
//!
//! ## Key Invariants
//!
//! 1. `0 <= assort(cvr) <= upper_bound()` for every record.
//! 2. `0 <= bassort(mvr, cvr) <= 2 * noerror` and agreement scores exactly
//!    `noerror`.
//! 3. A comparison audit only runs when the reported mean exceeds 1/2, which
//!    is equivalent to `noerror > 1/2`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{AuditError, Result, require};
use crate::numeric::{margin_to_mean, mean_to_margin};

/// Cast vote record or manual vote record for one ballot card.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Cvr {
    pub id: String,
    /// contest id -> candidate ids marked on this card.
    pub votes: BTreeMap<u32, Vec<u32>>,
    pub phantom: bool,
}

impl Cvr {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Placeholder for a card that should exist but could not be found.
    #[must_use]
    pub fn phantom(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            votes: BTreeMap::new(),
            phantom: true,
        }
    }

    /// Record the marks for one contest.
    #[must_use]
    pub fn with_votes(mut self, contest: u32, candidates: &[u32]) -> Self {
        self.votes.insert(contest, candidates.to_vec());
        self
    }

    #[must_use]
    pub fn has_contest(&self, contest: u32) -> bool {
        self.votes.contains_key(&contest)
    }

    /// 1 if `candidate` is marked in `contest`, else 0.
    #[must_use]
    pub fn has_mark_for(&self, contest: u32, candidate: u32) -> u8 {
        u8::from(
            self.votes
                .get(&contest)
                .is_some_and(|marks| marks.contains(&candidate)),
        )
    }

    #[must_use]
    pub fn votes_for(&self, contest: u32) -> Option<&[u32]> {
        self.votes.get(&contest).map(Vec::as_slice)
    }
}

/// Scores one record for one assertion.
pub trait Assorter {
    /// Score in `[0, upper_bound()]`. With `use_phantoms`, a phantom record
    /// scores 0.
    fn assort(&self, cvr: &Cvr, use_phantoms: bool) -> f64;

    fn upper_bound(&self) -> f64;

    fn contest(&self) -> u32;

    fn winner(&self) -> u32;

    /// Reported loser, `None` when the assertion is against a threshold.
    fn loser(&self) -> Option<u32>;

    /// Reported mean of the assort values over all cards.
    fn diluted_mean(&self) -> f64;

    fn diluted_margin(&self) -> f64 {
        mean_to_margin(self.diluted_mean())
    }

    /// bassort value of a CVR that matches its paper record.
    fn noerror(&self) -> f64 {
        1.0 / (2.0 - self.diluted_margin() / self.upper_bound())
    }

    fn desc(&self) -> String;
}

/// Pairwise plurality assertion: `winner` beat `loser`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluralityAssorter {
    contest: u32,
    winner: u32,
    loser: u32,
    diluted_mean: f64,
}

impl PluralityAssorter {
    pub fn new(contest: u32, winner: u32, loser: u32, diluted_mean: f64) -> Result<Self> {
        require(winner != loser, "loser", f64::from(loser), "must differ from winner")?;
        require(
            (0.0..=1.0).contains(&diluted_mean),
            "diluted_mean",
            diluted_mean,
            "must lie in [0, 1]",
        )?;
        Ok(Self {
            contest,
            winner,
            loser,
            diluted_mean,
        })
    }

    /// Build from reported vote totals over `ncards` ballot cards.
    pub fn from_votes(
        contest: u32,
        winner: u32,
        loser: u32,
        votes: &BTreeMap<u32, u64>,
        ncards: u64,
    ) -> Result<Self> {
        if ncards == 0 {
            return Err(AuditError::EmptyPopulation);
        }
        let w = votes.get(&winner).copied().unwrap_or(0) as f64;
        let l = votes.get(&loser).copied().unwrap_or(0) as f64;
        Self::new(contest, winner, loser, margin_to_mean((w - l) / ncards as f64))
    }
}

impl Assorter for PluralityAssorter {
    fn assort(&self, cvr: &Cvr, use_phantoms: bool) -> f64 {
        if !cvr.has_contest(self.contest) {
            return 0.5;
        }
        if use_phantoms && cvr.phantom {
            return 0.0;
        }
        let w = f64::from(cvr.has_mark_for(self.contest, self.winner));
        let l = f64::from(cvr.has_mark_for(self.contest, self.loser));
        (w - l + 1.0) * 0.5
    }

    fn upper_bound(&self) -> f64 {
        1.0
    }

    fn contest(&self) -> u32 {
        self.contest
    }

    fn winner(&self) -> u32 {
        self.winner
    }

    fn loser(&self) -> Option<u32> {
        Some(self.loser)
    }

    fn diluted_mean(&self) -> f64 {
        self.diluted_mean
    }

    fn desc(&self) -> String {
        format!(
            "Plurality contest={} winner={} loser={} dilutedMean={:.6}",
            self.contest, self.winner, self.loser, self.diluted_mean
        )
    }
}

/// Supermajority assertion: `winner` holds more than `min_fraction` of the
/// valid votes.
///
/// With `g = 1 - t` for a sole mark for the winner and `g = -t` for a sole
/// mark for anyone else, the score is `g / 2t + 1/2`; other cards score 1/2.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AboveThresholdAssorter {
    contest: u32,
    winner: u32,
    min_fraction: f64,
    diluted_mean: f64,
}

impl AboveThresholdAssorter {
    pub fn new(contest: u32, winner: u32, min_fraction: f64, diluted_mean: f64) -> Result<Self> {
        if !(min_fraction > 0.0 && min_fraction < 1.0) {
            return Err(AuditError::InvalidMinFraction(min_fraction));
        }
        Ok(Self {
            contest,
            winner,
            min_fraction,
            diluted_mean,
        })
    }

    #[must_use]
    pub fn min_fraction(&self) -> f64 {
        self.min_fraction
    }

    fn h(&self, g: f64) -> f64 {
        g / (2.0 * self.min_fraction) + 0.5
    }
}

impl Assorter for AboveThresholdAssorter {
    fn assort(&self, cvr: &Cvr, use_phantoms: bool) -> f64 {
        if !cvr.has_contest(self.contest) {
            return 0.5;
        }
        if use_phantoms && cvr.phantom {
            return 0.0;
        }
        match cvr.votes_for(self.contest) {
            Some([only]) if *only == self.winner => self.h(1.0 - self.min_fraction),
            Some([_]) => self.h(-self.min_fraction),
            _ => 0.5,
        }
    }

    fn upper_bound(&self) -> f64 {
        1.0 / (2.0 * self.min_fraction)
    }

    fn contest(&self) -> u32 {
        self.contest
    }

    fn winner(&self) -> u32 {
        self.winner
    }

    fn loser(&self) -> Option<u32> {
        None
    }

    fn diluted_mean(&self) -> f64 {
        self.diluted_mean
    }

    fn desc(&self) -> String {
        format!(
            "AboveThreshold contest={} winner={} t={} dilutedMean={:.6}",
            self.contest, self.winner, self.min_fraction, self.diluted_mean
        )
    }
}

/// The assorters a comparison audit can wrap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AssorterKind {
    Plurality(PluralityAssorter),
    AboveThreshold(AboveThresholdAssorter),
}

impl AssorterKind {
    fn inner(&self) -> &dyn Assorter {
        match self {
            Self::Plurality(a) => a,
            Self::AboveThreshold(a) => a,
        }
    }
}

impl From<PluralityAssorter> for AssorterKind {
    fn from(a: PluralityAssorter) -> Self {
        Self::Plurality(a)
    }
}

impl From<AboveThresholdAssorter> for AssorterKind {
    fn from(a: AboveThresholdAssorter) -> Self {
        Self::AboveThreshold(a)
    }
}

impl Assorter for AssorterKind {
    fn assort(&self, cvr: &Cvr, use_phantoms: bool) -> f64 {
        self.inner().assort(cvr, use_phantoms)
    }

    fn upper_bound(&self) -> f64 {
        self.inner().upper_bound()
    }

    fn contest(&self) -> u32 {
        self.inner().contest()
    }

    fn winner(&self) -> u32 {
        self.inner().winner()
    }

    fn loser(&self) -> Option<u32> {
        self.inner().loser()
    }

    fn diluted_mean(&self) -> f64 {
        self.inner().diluted_mean()
    }

    fn desc(&self) -> String {
        self.inner().desc()
    }
}

/// Comparison (card-level) assorter built on top of a primitive assorter.
///
/// `bassort(mvr, cvr) = (1 - ω/u) · noerror` where ω is the overstatement
/// `assort(cvr) - assort(mvr)` and `noerror = 1 / (2 - v/u)` for diluted
/// margin `v`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClcaAssorter {
    assorter: AssorterKind,
    /// Card style information is known: a CVR always carries the contests
    /// printed on its card.
    has_style: bool,
    noerror: f64,
    upper_bound: f64,
}

impl ClcaAssorter {
    /// Reject assertions whose reported mean does not exceed 1/2.
    pub fn new(assorter: impl Into<AssorterKind>, has_style: bool) -> Result<Self> {
        let clca = Self::new_unchecked(assorter, has_style);
        let mean = clca.assorter.diluted_mean();
        if mean <= 0.5 {
            return Err(AuditError::InvalidReportedMean(mean));
        }
        if clca.noerror <= 0.5 {
            return Err(AuditError::InvalidNoerror(clca.noerror));
        }
        Ok(clca)
    }

    /// Skip the reported-mean check; used to simulate audits of outcomes
    /// that are known to be wrong. Check [`Self::is_valid_audit`] before
    /// relying on the result.
    #[must_use]
    pub fn new_unchecked(assorter: impl Into<AssorterKind>, has_style: bool) -> Self {
        let assorter = assorter.into();
        let noerror = assorter.noerror();
        Self {
            assorter,
            has_style,
            noerror,
            upper_bound: 2.0 * noerror,
        }
    }

    #[must_use]
    pub fn is_valid_audit(&self) -> bool {
        self.assorter.diluted_mean() > 0.5 && self.noerror > 0.5
    }

    #[must_use]
    pub fn noerror(&self) -> f64 {
        self.noerror
    }

    /// Upper bound of the bassort values, `2 * noerror`.
    #[must_use]
    pub fn upper_bound(&self) -> f64 {
        self.upper_bound
    }

    #[must_use]
    pub fn contest(&self) -> u32 {
        self.assorter.contest()
    }

    #[must_use]
    pub fn assorter(&self) -> &AssorterKind {
        &self.assorter
    }

    /// Comparison score of a paper record `mvr` against its CVR.
    pub fn bassort(&self, mvr: &Cvr, cvr: &Cvr) -> Result<f64> {
        let contest = self.assorter.contest();
        if self.has_style && !cvr.has_contest(contest) {
            return Err(AuditError::MissingContest {
                cvr_id: cvr.id.clone(),
                contest,
            });
        }
        let overstatement = self.overstatement_error(mvr, cvr);
        let tau = 1.0 - overstatement / self.assorter.upper_bound();
        Ok(tau * self.noerror)
    }

    /// `assort(cvr) - assort(mvr)` with the worst case taken for phantoms.
    #[must_use]
    pub fn overstatement_error(&self, mvr: &Cvr, cvr: &Cvr) -> f64 {
        let contest = self.assorter.contest();
        let mvr_assort = if mvr.phantom || (self.has_style && !mvr.has_contest(contest)) {
            0.0
        } else {
            self.assorter.assort(mvr, false)
        };
        let cvr_assort = if cvr.phantom {
            0.5
        } else {
            self.assorter.assort(cvr, false)
        };
        cvr_assort - mvr_assort
    }
}
