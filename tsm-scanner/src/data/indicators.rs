//! Technical indicators over daily bars.
//!
//! Everything here is pure: a slice of closes or candles in, numbers out.

use super::{Candle, FetchError, Symbol, TechnicalSnapshot};

/// Bars used for average volume and support/resistance.
pub const LOOKBACK: usize = 20;

/// RSI period.
pub const RSI_PERIOD: usize = 14;

/// Fewest bars a snapshot can be computed from: the lookback, the current
/// bar, and one more for a previous close.
pub const MIN_BARS: usize = LOOKBACK + 2;

/// Simple moving average of the last `period` values.
pub fn sma(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    let window = &values[values.len() - period..];
    Some(window.iter().sum::<f64>() / period as f64)
}

/// Exponential moving average, seeded with the SMA of the first `period`
/// values.
pub fn ema(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    let k = 2.0 / (period as f64 + 1.0);
    let seed = values[..period].iter().sum::<f64>() / period as f64;
    Some(
        values[period..]
            .iter()
            .fold(seed, |prev, value| value * k + prev * (1.0 - k)),
    )
}

/// Relative strength index with Wilder smoothing.
///
/// Returns 100 when there were no losses over the window, 50 when the
/// series is flat.
pub fn rsi(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() <= period {
        return None;
    }

    let deltas: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
    let (mut avg_gain, mut avg_loss) = deltas[..period].iter().fold((0.0, 0.0), |(g, l), d| {
        if *d > 0.0 {
            (g + d, l)
        } else {
            (g, l - d)
        }
    });
    avg_gain /= period as f64;
    avg_loss /= period as f64;

    let n = period as f64;
    for d in &deltas[period..] {
        let (gain, loss) = if *d > 0.0 { (*d, 0.0) } else { (0.0, -d) };
        avg_gain = (avg_gain * (n - 1.0) + gain) / n;
        avg_loss = (avg_loss * (n - 1.0) + loss) / n;
    }

    if avg_loss == 0.0 {
        return Some(if avg_gain == 0.0 { 50.0 } else { 100.0 });
    }
    let rs = avg_gain / avg_loss;
    Some(100.0 - 100.0 / (1.0 + rs))
}

/// Reduce daily bars (oldest first) to a technical snapshot.
///
/// The last bar is the current session. Average volume, resistance and
/// support come from the [`LOOKBACK`] bars before it.
pub fn snapshot_from_candles(symbol: Symbol, candles: &[Candle]) -> Result<TechnicalSnapshot, FetchError> {
    if candles.len() < MIN_BARS {
        return Err(FetchError::NotAvailable(format!(
            "{}: {} bars, need {}",
            symbol,
            candles.len(),
            MIN_BARS
        )));
    }

    let last = &candles[candles.len() - 1];
    let prev = &candles[candles.len() - 2];
    let lookback = &candles[candles.len() - 1 - LOOKBACK..candles.len() - 1];
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();

    let change = last.close - prev.close;
    let change_percent = if prev.close != 0.0 {
        change / prev.close * 100.0
    } else {
        0.0
    };

    let avg_volume_20 = lookback.iter().map(|c| c.volume).sum::<f64>() / LOOKBACK as f64;
    let relative_volume = if avg_volume_20 > 0.0 {
        last.volume / avg_volume_20
    } else {
        0.0
    };

    let resistance = lookback.iter().map(|c| c.high).fold(f64::MIN, f64::max);
    let support = lookback.iter().map(|c| c.low).fold(f64::MAX, f64::min);

    let missing = |name: &str| FetchError::NotAvailable(format!("{}: cannot compute {}", symbol, name));
    let rsi = rsi(&closes, RSI_PERIOD).ok_or_else(|| missing("RSI"))?;
    let ema9 = ema(&closes, 9).ok_or_else(|| missing("EMA9"))?;
    let ema21 = ema(&closes, 21).ok_or_else(|| missing("EMA21"))?;

    let snapshot = TechnicalSnapshot {
        symbol,
        ltp: last.close,
        change,
        change_percent,
        volume: last.volume,
        avg_volume_20,
        relative_volume,
        high: last.high,
        low: last.low,
        open: last.open,
        close: last.close,
        rsi,
        ema9,
        ema21,
        resistance,
        support,
    };

    if snapshot.is_well_formed() {
        Ok(snapshot)
    } else {
        Err(FetchError::Parse(format!(
            "{}: bars produced a malformed snapshot",
            snapshot.symbol
        )))
    }
}
