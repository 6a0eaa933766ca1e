//! End-to-end audits through the public API.

use rlaudit_core::betting::{AdaptiveComparison, OracleComparison};
use rlaudit_core::estim::ShrinkTruncEstimator;
use rlaudit_core::{
    AlphaMart, Assorter, BettingFn, BettingMart, BettingStrategy, ClcaAssorter, ClcaErrorCounts, Cvr,
    ErrorRates, PluralityAssorter, SampleFromList, SampleTracker, TestConfig, TestH0Status,
    TraceMode,
};

const CONTEST: u32 = 1;
const WINNER: u32 = 10;
const LOSER: u32 = 20;
const OTHER: u32 = 30;

/// `n` cards cycling through `pattern`.
fn cards(n: usize, pattern: &[u32]) -> Vec<Cvr> {
    (0..n)
        .map(|i| Cvr::new(format!("card-{i}")).with_votes(CONTEST, &[pattern[i % pattern.len()]]))
        .collect()
}

fn low_priors() -> ErrorRates {
    ErrorRates::new(1.0e-4, 1.0e-3, 1.0e-3, 1.0e-4).expect("valid")
}

#[test]
fn polling_audit_confirms_clear_winner() {
    let population = cards(10_000, &[WINNER, WINNER, LOSER, WINNER, OTHER]);
    let assorter = PluralityAssorter::new(CONTEST, WINNER, LOSER, 0.7).expect("valid");
    let values: Vec<f64> = population.iter().map(|c| assorter.assort(c, false)).collect();

    let config = TestConfig::new(0.05, values.len(), true, assorter.upper_bound()).expect("valid");
    let estimator = ShrinkTruncEstimator::new(values.len(), true, 1.0, 1.0e-6, 0.7, 0.1, 100, 0.0)
        .expect("valid");
    let mut mart = AlphaMart::new(estimator, config).expect("valid");
    let mut source = SampleFromList::new(values);
    let result = mart.test_h0_from(10_000, true, &mut source).expect("runs");

    assert_eq!(result.status, TestH0Status::StatRejectNull);
    assert!(result.sample_count < 100, "sample_count={}", result.sample_count);
    assert!(result.pvalue_last() < 0.05);
}

#[test]
fn clean_comparison_audit_rejects() {
    let cvrs = cards(10_000, &[WINNER, WINNER, LOSER, OTHER]);
    let assorter = PluralityAssorter::new(CONTEST, WINNER, LOSER, 0.55).expect("valid");
    let clca = ClcaAssorter::new(assorter, true).expect("valid");
    let values: Vec<f64> = cvrs
        .iter()
        .map(|cvr| clca.bassort(cvr, cvr))
        .collect::<Result<_, _>>()
        .expect("bassort");
    assert!(values.iter().all(|v| *v == clca.noerror()));

    let strategy = AdaptiveComparison::with_rates(cvrs.len(), true, clca.noerror(), 100, low_priors())
        .expect("valid");
    let config = TestConfig::new(0.05, cvrs.len(), true, clca.upper_bound()).expect("valid");
    let mut mart = BettingMart::new(BettingStrategy::AdaptiveComparison(strategy), config)
        .expect("valid")
        .with_trace_mode(TraceMode::Sequences);
    let mut source = SampleFromList::new(values);
    let result = mart.test_h0_from(cvrs.len(), true, &mut source).expect("runs");

    assert_eq!(result.status, TestH0Status::StatRejectNull);
    assert!(result.sample_count < 200, "sample_count={}", result.sample_count);
    assert!(result.auxiliary.iter().all(|lam| *lam > 0.0 && *lam <= 2.0));
    let trace = mart.trace().expect("traced");
    assert_eq!(trace.len(), result.sample_count);
}

#[test]
fn flipped_votes_keep_audit_open() {
    let cvrs = cards(10_000, &[WINNER, WINNER, LOSER, WINNER, OTHER]);
    let clca = ClcaAssorter::new(
        PluralityAssorter::new(CONTEST, WINNER, LOSER, 0.55).expect("valid"),
        true,
    )
    .expect("valid");
    // one paper record in 20 shows the loser where the CVR shows the winner
    let values: Vec<f64> = cvrs
        .iter()
        .enumerate()
        .map(|(i, cvr)| {
            if i % 20 == 18 {
                assert_eq!(cvr.votes_for(CONTEST), Some(&[WINNER][..]));
                let mvr = Cvr::new(cvr.id.clone()).with_votes(CONTEST, &[LOSER]);
                clca.bassort(&mvr, cvr).expect("bassort")
            } else {
                clca.bassort(cvr, cvr).expect("bassort")
            }
        })
        .collect();
    assert_eq!(values[18], 0.0);

    let strategy = AdaptiveComparison::with_rates(cvrs.len(), true, clca.noerror(), 100, low_priors())
        .expect("valid");
    let config = TestConfig::new(0.05, cvrs.len(), true, clca.upper_bound()).expect("valid");
    let mut mart = BettingMart::new(BettingStrategy::AdaptiveComparison(strategy), config).expect("valid");
    let mut source = SampleFromList::new(values);
    let result = mart.test_h0_from(2000, true, &mut source).expect("runs");

    assert_eq!(result.status, TestH0Status::LimitReached);
    assert!(result.status.is_fail());
    assert_eq!(result.sample_count, 2000);
}

#[test]
fn oracle_and_adaptive_agree_without_errors() {
    let a = 1.0 / (2.0 - 0.1);
    let mut oracle = BettingStrategy::Oracle(
        OracleComparison::new(10_000, false, a, low_priors()).expect("valid"),
    );
    let mut adaptive = BettingStrategy::AdaptiveComparison(
        AdaptiveComparison::with_rates(10_000, false, a, 100, low_priors()).expect("valid"),
    );
    let tracker = SampleTracker::with_error_tally(a, 1.0);
    let lo = oracle.bet(&tracker);
    let la = adaptive.bet(&tracker);
    assert!((lo - la).abs() < 1e-9, "oracle={lo} adaptive={la}");
}

#[test]
fn plurality_rates_round_trip() {
    let rates = ErrorRates::new(0.001, 0.01, 0.005, 0.0005).expect("valid");
    for n in [2_000, 10_000, 100_000] {
        let counts = ClcaErrorCounts::from_plurality_error_rates(&rates, 1.0 / 1.9, n);
        let back = counts.to_plurality_error_rates();
        let tolerance = 1.0 / n as f64;
        for (got, want) in back.to_list().iter().zip(rates.to_list()) {
            assert!((got - want).abs() <= tolerance, "n={n}: {got} vs {want}");
        }
    }
}
