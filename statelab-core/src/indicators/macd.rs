//! MACD (12/26/9) and histogram trajectory analysis.
//!
//! line = EMA(fast) - EMA(slow); signal = EMA(signal) of the line;
//! histogram = line - signal. Lookback: slow + signal - 2.

use serde::{Deserialize, Serialize};

use super::ema::{ema_after_warmup, ema_of_series};
use super::{finite_values, tail, Indicator};
use crate::domain::{Bar, Bias, Direction};

#[derive(Debug, Clone)]
pub struct Macd {
    fast: usize,
    slow: usize,
    signal: usize,
    name: String,
}

/// The three MACD series, each the same length as the input.
#[derive(Debug, Clone)]
pub struct MacdLines {
    pub line: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

impl Macd {
    pub fn new(fast: usize, slow: usize, signal: usize) -> Self {
        assert!(fast >= 1 && signal >= 1, "MACD periods must be >= 1");
        assert!(fast < slow, "MACD fast period must be below slow period");
        Self {
            fast,
            slow,
            signal,
            name: format!("macd_{fast}_{slow}_{signal}"),
        }
    }

    pub fn standard() -> Self {
        Self::new(12, 26, 9)
    }

    pub fn lines(&self, bars: &[Bar]) -> MacdLines {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let fast = ema_of_series(&closes, self.fast);
        let slow = ema_of_series(&closes, self.slow);
        let line: Vec<f64> = fast.iter().zip(&slow).map(|(f, s)| f - s).collect();
        let signal = ema_after_warmup(&line, self.signal);
        let histogram = line.iter().zip(&signal).map(|(l, s)| l - s).collect();
        MacdLines {
            line,
            signal,
            histogram,
        }
    }
}

impl Indicator for Macd {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.slow + self.signal - 2
    }

    /// The histogram series.
    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        self.lines(bars).histogram
    }
}

/// Slope of the last `lookback` finite histogram values.
///
/// Rising/falling when the end-to-end change exceeds 10% of the window's
/// absolute mean. `None` with fewer than two values.
pub fn histogram_slope(histogram: &[f64], lookback: usize) -> Option<Direction> {
    let finite = finite_values(histogram);
    let recent = tail(&finite, lookback);
    if recent.len() < 2 {
        return None;
    }
    let diff = recent[recent.len() - 1] - recent[0];
    let mean = recent.iter().sum::<f64>() / recent.len() as f64;
    let threshold = mean.abs() * 0.1;
    Some(if diff > threshold {
        Direction::Rising
    } else if diff < -threshold {
        Direction::Falling
    } else {
        Direction::Flat
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistogramStatus {
    ExpandingBullish,
    ContractingBullish,
    ExpandingBearish,
    ContractingBearish,
}

/// Most recent MACD/signal cross within the scan window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Crossover {
    pub direction: Bias,
    pub bars_since: usize,
}

/// MACD trajectory summary with an actionable label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacdMomentum {
    pub line: f64,
    pub signal_line: f64,
    pub histogram: f64,
    pub histogram_change: f64,
    pub histogram_status: HistogramStatus,
    pub above_zero: bool,
    pub crossover: Option<Crossover>,
    pub signal: String,
    pub bias: Bias,
}

/// Crossovers this recent or fresher produce buy/sell labels.
const FRESH_CROSS_BARS: usize = 3;

/// Scan the last `lookback` bars for a sign flip of (line - signal).
///
/// `bars_since` is 1 when the cross happened on the latest bar.
pub fn find_crossover(line: &[f64], signal: &[f64], lookback: usize) -> Option<Crossover> {
    let n = line.len().min(signal.len());
    for i in 1..=lookback {
        if i + 1 > n {
            break;
        }
        let (pl, ps) = (line[n - i - 1], signal[n - i - 1]);
        let (cl, cs) = (line[n - i], signal[n - i]);
        if ![pl, ps, cl, cs].iter().all(|v| v.is_finite()) {
            break;
        }
        if pl <= ps && cl > cs {
            return Some(Crossover {
                direction: Bias::Bullish,
                bars_since: i,
            });
        }
        if pl >= ps && cl < cs {
            return Some(Crossover {
                direction: Bias::Bearish,
                bars_since: i,
            });
        }
    }
    None
}

/// Analyze MACD over the last `lookback` bars.
///
/// Returns `None` until the histogram has `lookback + 1` finite values.
pub fn analyze_macd_momentum(lines: &MacdLines, lookback: usize) -> Option<MacdMomentum> {
    let hist = finite_values(&lines.histogram);
    if lookback == 0 || hist.len() < lookback + 1 {
        return None;
    }
    let line = *lines.line.last()?;
    let signal_line = *lines.signal.last()?;
    let histogram = hist[hist.len() - 1];
    let histogram_change = histogram - hist[hist.len() - lookback];

    let histogram_status = match (histogram > 0.0, histogram_change) {
        (true, c) if c > 0.0 => HistogramStatus::ExpandingBullish,
        (true, _) => HistogramStatus::ContractingBullish,
        (false, c) if c < 0.0 => HistogramStatus::ExpandingBearish,
        (false, _) => HistogramStatus::ContractingBearish,
    };
    let above_zero = line > 0.0;
    let crossover = find_crossover(&lines.line, &lines.signal, lookback);

    let (signal, bias) = match crossover {
        Some(c) if c.bars_since <= FRESH_CROSS_BARS => match (c.direction, above_zero) {
            (Bias::Bullish, true) => (
                "STRONG BUY - Fresh bullish crossover above zero line",
                Bias::Bullish,
            ),
            (Bias::Bullish, false) => (
                "BUY SIGNAL - Bullish crossover, momentum turning",
                Bias::Bullish,
            ),
            (_, false) => (
                "STRONG SELL - Fresh bearish crossover below zero line",
                Bias::Bearish,
            ),
            (_, true) => (
                "SELL SIGNAL - Bearish crossover, momentum fading",
                Bias::Bearish,
            ),
        },
        _ => match histogram_status {
            HistogramStatus::ExpandingBullish => (
                "BULLISH - Histogram expanding, momentum building",
                Bias::Bullish,
            ),
            HistogramStatus::ExpandingBearish => (
                "BEARISH - Histogram expanding downward, selling pressure",
                Bias::Bearish,
            ),
            HistogramStatus::ContractingBullish => (
                "CAUTION - Bullish momentum fading, watch for reversal",
                Bias::Neutral,
            ),
            HistogramStatus::ContractingBearish => (
                "IMPROVING - Bearish momentum fading, potential bottom",
                Bias::Neutral,
            ),
        },
    };

    Some(MacdMomentum {
        line,
        signal_line,
        histogram,
        histogram_change,
        histogram_status,
        above_zero,
        crossover,
        signal: signal.to_string(),
        bias,
    })
}
