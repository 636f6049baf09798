//! Point-based scoring over a technical snapshot.
//!
//! Rules are additive and evaluated in a fixed order:
//! volume, momentum, breakout proximity, RSI reversal, moving-average
//! alignment. The result is a pure function of the snapshot, the scoring
//! config, the scan type and the injected time of day.

use chrono::NaiveTime;

use super::config::ScoringConfig;
use super::types::{
    BreakoutType, RiskTier, ScanResult, ScanTechnicals, ScanType, SessionTag, SignalTag,
};
use crate::data::TechnicalSnapshot;
use crate::util::round_to;

/// Accumulates points, tags and reasoning clauses.
#[derive(Debug, Default)]
struct Tally {
    points: u32,
    signals: Vec<SignalTag>,
    clauses: Vec<String>,
}

impl Tally {
    fn add(&mut self, points: u32, tag: SignalTag, clause: impl Into<String>) {
        self.points += points;
        self.signals.push(tag);
        self.clauses.push(clause.into());
    }
}

struct Breakout {
    kind: BreakoutType,
    target: f64,
    stop_loss: f64,
}

/// Scoring engine for the intraday scanner.
#[derive(Debug, Clone, Default)]
pub struct ScoringEngine {
    config: ScoringConfig,
}

impl ScoringEngine {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Score one snapshot. `None` means the symbol did not qualify for this
    /// scan type or scored below the minimum.
    pub fn score(
        &self,
        snapshot: &TechnicalSnapshot,
        scan_type: ScanType,
        now: NaiveTime,
    ) -> Option<ScanResult> {
        let cfg = &self.config;
        let change = snapshot.change_percent;
        let rvol = snapshot.relative_volume;
        let mut tally = Tally::default();

        // 1. Volume
        if rvol > cfg.volume.high_threshold {
            tally.add(
                cfg.volume.high_points,
                SignalTag::HighVolume,
                "Exceptional volume surge (>2x average).",
            );
        } else if rvol > cfg.volume.elevated_threshold {
            tally.add(
                cfg.volume.elevated_points,
                SignalTag::ElevatedVolume,
                "Elevated volume activity.",
            );
        }

        // 2. Momentum
        if change.abs() > cfg.momentum.strong_threshold {
            let side = if change > 0.0 { "bullish" } else { "bearish" };
            tally.add(
                cfg.momentum.strong_points,
                SignalTag::StrongMomentum,
                format!("Strong {} momentum.", side),
            );
        } else if change.abs() > cfg.momentum.moderate_threshold {
            tally.add(
                cfg.momentum.moderate_points,
                SignalTag::ModerateMomentum,
                "Building momentum.",
            );
        }

        // 3. Breakout proximity
        let breakout = self.breakout(snapshot, &mut tally);

        // 4. RSI reversal
        if snapshot.rsi < cfg.rsi.oversold && change > 0.0 {
            tally.add(
                cfg.rsi.reversal_points,
                SignalTag::RsiReversal,
                "RSI oversold with bullish reversal.",
            );
        } else if snapshot.rsi > cfg.rsi.overbought && change < 0.0 {
            tally.add(
                cfg.rsi.reversal_points,
                SignalTag::RsiReversal,
                "RSI overbought with bearish reversal.",
            );
        }

        // 5. Moving-average alignment
        if snapshot.ema9 > snapshot.ema21 && snapshot.ltp > snapshot.ema9 {
            tally.add(
                cfg.moving_average.alignment_points,
                SignalTag::MaBullish,
                "Above rising moving averages.",
            );
        } else if snapshot.ema9 < snapshot.ema21 && snapshot.ltp < snapshot.ema9 {
            tally.add(
                cfg.moving_average.alignment_points,
                SignalTag::MaBearish,
                "Below falling moving averages.",
            );
        }

        if !self.passes_filter(snapshot, scan_type, &tally.signals) {
            return None;
        }
        if tally.points < cfg.filters.min_points {
            return None;
        }

        Some(ScanResult {
            symbol: snapshot.symbol.clone(),
            score: tally.points.min(cfg.max_display_score),
            raw_score: tally.points,
            technicals: ScanTechnicals {
                ltp: round_to(snapshot.ltp, 2),
                change_percent: round_to(change, 2),
                relative_volume: round_to(rvol, 2),
                rsi: round_to(snapshot.rsi, 1),
                breakout_type: breakout.as_ref().map(|b| b.kind),
                target: breakout.as_ref().map(|b| round_to(b.target, 2)),
                stop_loss: breakout.as_ref().map(|b| round_to(b.stop_loss, 2)),
            },
            signals: tally.signals,
            reasoning: tally.clauses.join(" "),
            risk: self.risk(snapshot),
            timeframe: SessionTag::at(now),
        })
    }

    fn breakout(&self, snapshot: &TechnicalSnapshot, tally: &mut Tally) -> Option<Breakout> {
        let cfg = &self.config.breakout;
        let ltp = snapshot.ltp;
        if ltp <= 0.0 {
            return None;
        }

        let to_resistance = (snapshot.resistance - ltp) / ltp * 100.0;
        let to_support = (ltp - snapshot.support) / ltp * 100.0;

        if to_resistance < cfg.proximity_percent && snapshot.change_percent > 0.0 {
            tally.add(
                cfg.breakout_points,
                SignalTag::ResistanceBreakout,
                "Near resistance breakout with bullish momentum.",
            );
            Some(Breakout {
                kind: BreakoutType::BullishBreakout,
                target: snapshot.resistance * (1.0 + cfg.target_extension),
                stop_loss: snapshot.support,
            })
        } else if to_support < cfg.proximity_percent && snapshot.change_percent < 0.0 {
            tally.add(
                cfg.breakdown_points,
                SignalTag::SupportBreakdown,
                "Near support breakdown with bearish momentum.",
            );
            Some(Breakout {
                kind: BreakoutType::BearishBreakdown,
                target: snapshot.support * (1.0 - cfg.target_extension),
                stop_loss: snapshot.resistance,
            })
        } else {
            None
        }
    }

    fn risk(&self, snapshot: &TechnicalSnapshot) -> RiskTier {
        let cfg = &self.config.risk;
        let move_abs = snapshot.change_percent.abs();

        if snapshot.relative_volume > cfg.high_relative_volume || move_abs > cfg.high_change_percent {
            RiskTier::High
        } else if snapshot.relative_volume < cfg.low_relative_volume
            && move_abs < cfg.low_change_percent
        {
            RiskTier::Low
        } else {
            RiskTier::Medium
        }
    }

    fn passes_filter(
        &self,
        snapshot: &TechnicalSnapshot,
        scan_type: ScanType,
        signals: &[SignalTag],
    ) -> bool {
        let cfg = &self.config.filters;
        match scan_type {
            ScanType::Breakout => signals.iter().any(SignalTag::is_breakout),
            ScanType::HighVolume => snapshot.relative_volume >= cfg.high_volume_min_relative_volume,
            ScanType::Momentum => snapshot.change_percent.abs() >= cfg.momentum_min_change_percent,
        }
    }
}
