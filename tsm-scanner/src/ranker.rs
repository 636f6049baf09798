//! Ordering and truncation of scan output.

use std::cmp::Ordering;

use crate::scanner::ScanResult;
use crate::storm::StormResult;

/// Keep results with `score >= min_score`, highest raw score first, at most
/// `max_results`. Ties break on symbol so output is stable.
pub fn rank_scan_results(
    mut results: Vec<ScanResult>,
    min_score: u32,
    max_results: usize,
) -> Vec<ScanResult> {
    results.retain(|r| r.score >= min_score);
    results.sort_by(|a, b| {
        b.raw_score
            .cmp(&a.raw_score)
            .then_with(|| a.symbol.cmp(&b.symbol))
    });
    results.truncate(max_results);
    results
}

/// Most recent trigger first (to the second), then largest change, then
/// symbol. Unparseable trigger times sort last.
pub fn rank_storm_results(mut results: Vec<StormResult>) -> Vec<StormResult> {
    results.sort_by(|a, b| {
        b.trigger_seconds()
            .cmp(&a.trigger_seconds())
            .then_with(|| {
                b.change_percent
                    .partial_cmp(&a.change_percent)
                    .unwrap_or(Ordering::Equal)
            })
            .then_with(|| a.symbol.cmp(&b.symbol))
    });
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Symbol;
    use crate::scanner::{RiskTier, ScanTechnicals, SessionTag};
    use crate::storm::Direction;
    use chrono::Utc;

    fn scan(symbol: &str, score: u32) -> ScanResult {
        ScanResult {
            symbol: Symbol::new(symbol).unwrap(),
            score: score.min(100),
            raw_score: score,
            signals: vec![],
            technicals: ScanTechnicals {
                ltp: 100.0,
                change_percent: 1.0,
                relative_volume: 1.0,
                rsi: 50.0,
                breakout_type: None,
                target: None,
                stop_loss: None,
            },
            reasoning: String::new(),
            risk: RiskTier::Medium,
            timeframe: SessionTag::Morning,
        }
    }

    fn storm(symbol: &str, trigger: &str, change: f64) -> StormResult {
        StormResult {
            symbol: Symbol::new(symbol).unwrap(),
            start_time: "09:15".into(),
            trigger_time: trigger.into(),
            start_pcr: 0.4,
            changed_pcr: 0.5,
            change_percent: change,
            direction: Direction::Increase,
            detected_at: Utc::now(),
        }
    }

    fn names<T>(items: &[T], f: impl Fn(&T) -> &Symbol) -> Vec<String> {
        items.iter().map(|i| f(i).to_string()).collect()
    }

    #[test]
    fn test_scan_rank_truncates_with_unique_max_first() {
        let ranked = rank_scan_results(vec![scan("A", 40), scan("B", 90), scan("C", 40)], 0, 2);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].symbol.as_str(), "B");
        assert_eq!(ranked[1].raw_score, 40);
    }

    #[test]
    fn test_scan_rank_min_score_and_tie_break() {
        let ranked = rank_scan_results(
            vec![scan("TCS", 70), scan("INFY", 65), scan("ACC", 70), scan("SBIN", 85)],
            70,
            10,
        );
        assert_eq!(names(&ranked, |r| &r.symbol), vec!["SBIN", "ACC", "TCS"]);
    }

    #[test]
    fn test_scan_rank_uses_raw_score_above_cap() {
        let ranked = rank_scan_results(vec![scan("A", 105), scan("B", 120)], 70, 5);
        assert_eq!(ranked[0].symbol.as_str(), "B");
        assert_eq!(ranked[0].score, ranked[1].score);
    }

    #[test]
    fn test_storm_rank_recent_then_strongest() {
        let ranked = rank_storm_results(vec![
            storm("A", "09:30", 12.0),
            storm("B", "09:45", 11.0),
            storm("C", "09:45", 30.0),
            storm("D", "9:50", 10.5),
        ]);
        assert_eq!(names(&ranked, |r| &r.symbol), vec!["D", "C", "B", "A"]);
    }

    #[test]
    fn test_storm_rank_orders_by_seconds() {
        let ranked = rank_storm_results(vec![
            storm("EARLY", "09:30:10", 30.0),
            storm("LATE", "09:30:45", 11.0),
            storm("MINUTE", "09:30", 50.0),
        ]);
        assert_eq!(names(&ranked, |r| &r.symbol), vec!["LATE", "EARLY", "MINUTE"]);
    }

    #[test]
    fn test_storm_rank_unparseable_trigger_last() {
        let ranked = rank_storm_results(vec![storm("BAD", "late", 90.0), storm("OK", "09:16", 5.0)]);
        assert_eq!(names(&ranked, |r| &r.symbol), vec!["OK", "BAD"]);
    }
}
