//! Indicator snapshot: every indicator value the classifier needs, computed
//! from bars up to and including one date.
//!
//! Fields are `Option`: `None` means "not enough history", never zero.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{closes, volumes, Bar, Direction, TrendAlignment};
use crate::indicators::extremes::{extremes, Extremes};
use crate::indicators::macd::{analyze_macd_momentum, histogram_slope, MacdMomentum};
use crate::indicators::obv::{analyze_obv_momentum, obv_slope, ObvMomentum};
use crate::indicators::rsi::{analyze_rsi_momentum, RsiMomentum};
use crate::indicators::sma::sma_of_series;
use crate::indicators::swing::{
    detect_divergence, Divergence, DEFAULT_DIVERGENCE_WINDOW, DEFAULT_SWING_LOOKBACK,
};
use crate::indicators::trend::{classify_alignment, ma_slope};
use crate::indicators::volume::{up_down_volume_ratio, volume_vs_average, UpDownVolume, VolumeVsAverage};
use crate::indicators::{
    directional_index, last_finite, Atr, Ema, Indicator, Macd, Obv, Rsi, Sma,
};

#[derive(Debug, Error, PartialEq)]
pub enum IndicatorError {
    #[error("no history: cannot compute indicators from an empty series")]
    NoHistory,

    #[error("bar on {date} has non-finite or inconsistent prices")]
    InvalidBar { date: NaiveDate },
}

/// Periods and windows for every indicator in the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    pub rsi_period: usize,
    /// Bars used for RSI and MACD trajectory analysis.
    pub momentum_lookback: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub histogram_slope_lookback: usize,
    pub adx_period: usize,
    pub atr_period: usize,
    pub sma_slope_lookback: usize,
    pub obv_sma_period: usize,
    pub obv_slope_window: usize,
    pub obv_momentum_lookback: usize,
    pub up_down_lookback: usize,
    pub volume_average_window: usize,
    pub swing_lookback: usize,
    pub divergence_window: usize,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            momentum_lookback: 5,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            histogram_slope_lookback: 3,
            adx_period: 14,
            atr_period: 14,
            sma_slope_lookback: 20,
            obv_sma_period: 20,
            obv_slope_window: 10,
            obv_momentum_lookback: 10,
            up_down_lookback: 10,
            volume_average_window: 20,
            swing_lookback: DEFAULT_SWING_LOOKBACK,
            divergence_window: DEFAULT_DIVERGENCE_WINDOW,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacdSnapshot {
    pub line: f64,
    pub signal: f64,
    pub histogram: f64,
    pub histogram_slope: Option<Direction>,
    pub momentum: Option<MacdMomentum>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdxSnapshot {
    pub adx: f64,
    pub plus_di: f64,
    pub minus_di: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObvSnapshot {
    pub value: f64,
    pub sma: Option<f64>,
    /// Percent change over the slope window, relative to |start|.
    pub slope: Option<f64>,
    /// Price against OBV over the divergence window, swing to swing.
    pub divergence: Option<Divergence>,
    pub momentum: Option<ObvMomentum>,
}

impl ObvSnapshot {
    /// OBV above its moving average; `None` while the average is warming up.
    pub fn above_sma(&self) -> Option<bool> {
        self.sma.map(|sma| self.value > sma)
    }
}

/// Point-in-time indicator values as of `date`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub date: NaiveDate,
    pub close: f64,
    /// Number of bars the snapshot was computed from.
    pub history_len: usize,
    pub sma_20: Option<f64>,
    pub sma_50: Option<f64>,
    pub sma_200: Option<f64>,
    pub ema_20: Option<f64>,
    pub ema_50: Option<f64>,
    pub ema_200: Option<f64>,
    pub atr: Option<f64>,
    pub rsi: Option<f64>,
    pub rsi_momentum: Option<RsiMomentum>,
    pub macd: Option<MacdSnapshot>,
    pub adx: Option<AdxSnapshot>,
    pub obv: Option<ObvSnapshot>,
    pub volume: Option<VolumeVsAverage>,
    pub up_down_volume: Option<UpDownVolume>,
    pub extremes: Option<Extremes>,
    /// Percent change of the 50-bar SMA over `sma_slope_lookback` bars.
    pub sma_50_slope: Option<f64>,
    pub rsi_divergence: Option<Divergence>,
    pub trend: TrendAlignment,
}

impl IndicatorSnapshot {
    /// Percent distance of the close from the 200-bar SMA.
    pub fn pct_vs_sma_200(&self) -> Option<f64> {
        self.sma_200
            .filter(|s| *s != 0.0)
            .map(|s| (self.close - s) / s * 100.0)
    }
}

/// Compute every indicator from `bars`, which must end at the as-of date.
///
/// Deterministic: identical input yields an identical snapshot. Nothing past
/// the last bar is read, so truncating the series is the only thing needed
/// for point-in-time correctness.
pub fn compute_snapshot(
    bars: &[Bar],
    cfg: &SnapshotConfig,
) -> Result<IndicatorSnapshot, IndicatorError> {
    let last = bars.last().ok_or(IndicatorError::NoHistory)?;
    if last.is_void() {
        return Err(IndicatorError::InvalidBar { date: last.date });
    }

    let close_series = closes(bars);
    let volume_series = volumes(bars);
    let close = last.close;

    let sma_20 = last_finite(&Sma::new(20).compute(bars));
    let sma_50_series = Sma::new(50).compute(bars);
    let sma_50 = last_finite(&sma_50_series);
    let sma_200 = last_finite(&Sma::new(200).compute(bars));

    let rsi_series = Rsi::new(cfg.rsi_period).compute(bars);
    let rsi = last_finite(&rsi_series);
    let rsi_momentum = if rsi_series.iter().filter(|v| v.is_finite()).count() >= cfg.momentum_lookback {
        analyze_rsi_momentum(&rsi_series, cfg.momentum_lookback)
    } else {
        None
    };

    let macd = {
        let lines = Macd::new(cfg.macd_fast, cfg.macd_slow, cfg.macd_signal).lines(bars);
        match (
            last_finite(&lines.line),
            last_finite(&lines.signal),
            last_finite(&lines.histogram),
        ) {
            (Some(line), Some(signal), Some(histogram)) => Some(MacdSnapshot {
                line,
                signal,
                histogram,
                histogram_slope: histogram_slope(&lines.histogram, cfg.histogram_slope_lookback),
                momentum: analyze_macd_momentum(&lines, cfg.momentum_lookback),
            }),
            _ => None,
        }
    };

    let adx = {
        let di = directional_index(bars, cfg.adx_period);
        match (
            last_finite(&di.adx),
            last_finite(&di.plus_di),
            last_finite(&di.minus_di),
        ) {
            (Some(adx), Some(plus_di), Some(minus_di)) => Some(AdxSnapshot {
                adx,
                plus_di,
                minus_di,
            }),
            _ => None,
        }
    };

    let has_volume = volume_series.iter().any(|v| *v > 0.0);
    let obv = has_volume.then(|| {
        let obv_series = Obv.compute(bars);
        let divergence = detect_divergence(
            &close_series,
            &obv_series,
            cfg.divergence_window,
            cfg.swing_lookback,
        );
        ObvSnapshot {
            value: obv_series[obv_series.len() - 1],
            sma: last_finite(&sma_of_series(&obv_series, cfg.obv_sma_period)),
            slope: obv_slope(&obv_series, cfg.obv_slope_window),
            divergence,
            momentum: analyze_obv_momentum(
                &close_series,
                &obv_series,
                cfg.obv_momentum_lookback,
                divergence.map(|d| d.kind),
            ),
        }
    });
    let volume = if has_volume {
        volume_vs_average(&volume_series, cfg.volume_average_window)
    } else {
        None
    };

    let sma_50_slope = ma_slope(&sma_50_series, cfg.sma_slope_lookback);

    Ok(IndicatorSnapshot {
        date: last.date,
        close,
        history_len: bars.len(),
        sma_20,
        sma_50,
        sma_200,
        ema_20: last_finite(&Ema::new(20).compute(bars)),
        ema_50: last_finite(&Ema::new(50).compute(bars)),
        ema_200: last_finite(&Ema::new(200).compute(bars)),
        atr: last_finite(&Atr::new(cfg.atr_period).compute(bars)),
        rsi,
        rsi_momentum,
        macd,
        adx,
        obv,
        volume,
        up_down_volume: up_down_volume_ratio(&close_series, &volume_series, cfg.up_down_lookback),
        extremes: extremes(&close_series, close),
        sma_50_slope,
        rsi_divergence: detect_divergence(
            &close_series,
            &rsi_series,
            cfg.divergence_window,
            cfg.swing_lookback,
        ),
        trend: classify_alignment(close, sma_20, sma_50, sma_200),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DivergenceType;
    use crate::indicators::{make_bars, make_bars_with_volume};

    fn rising(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 + i as f64 * 0.5).collect()
    }

    #[test]
    fn empty_series_is_no_history() {
        let err = compute_snapshot(&[], &SnapshotConfig::default()).unwrap_err();
        assert_eq!(err, IndicatorError::NoHistory);
    }

    #[test]
    fn void_last_bar_is_rejected() {
        let mut bars = make_bars(&rising(30));
        bars.last_mut().unwrap().close = f64::NAN;
        let err = compute_snapshot(&bars, &SnapshotConfig::default()).unwrap_err();
        assert!(matches!(err, IndicatorError::InvalidBar { .. }));
    }

    #[test]
    fn short_history_leaves_long_indicators_unset() {
        let bars = make_bars(&rising(60));
        let snap = compute_snapshot(&bars, &SnapshotConfig::default()).unwrap();
        assert!(snap.sma_20.is_some());
        assert!(snap.sma_50.is_some());
        assert!(snap.sma_200.is_none());
        assert!(snap.ema_200.is_none());
        assert!(snap.sma_50_slope.is_none());
        assert_eq!(snap.trend, TrendAlignment::Unknown);
        assert_eq!(snap.history_len, 60);
    }

    #[test]
    fn full_history_populates_everything() {
        let bars = make_bars(&rising(260));
        let snap = compute_snapshot(&bars, &SnapshotConfig::default()).unwrap();
        assert!(snap.sma_200.is_some());
        assert!(snap.rsi.is_some());
        assert!(snap.rsi_momentum.is_some());
        assert!(snap.macd.as_ref().and_then(|m| m.momentum.as_ref()).is_some());
        assert!(snap.adx.is_some());
        assert!(snap.obv.is_some());
        assert!(snap.up_down_volume.is_some());
        assert!(snap.sma_50_slope.unwrap() > 0.0);
        assert_eq!(snap.trend, TrendAlignment::Uptrend);
        assert!(snap.pct_vs_sma_200().unwrap() > 0.0);
    }

    #[test]
    fn zero_volume_series_has_no_volume_indicators() {
        let closes = rising(80);
        let bars = make_bars_with_volume(&closes, &vec![0.0; closes.len()]);
        let snap = compute_snapshot(&bars, &SnapshotConfig::default()).unwrap();
        assert!(snap.obv.is_none());
        assert!(snap.volume.is_none());
        assert!(snap.up_down_volume.is_none());
        assert!(snap.sma_50.is_some());
    }

    #[test]
    fn obv_divergence_compares_swing_highs() {
        // Drift up, then two rallies: the second tops higher on thin volume,
        // so price makes a higher swing high while OBV makes a lower one.
        let mut closes: Vec<f64> = (0..40).map(|i| 100.0 + i as f64 * 0.1).collect();
        let mut volumes = vec![100.0; 40];
        for (step, n, volume) in [(1.0, 4, 100.0), (-1.0, 4, 100.0), (1.5, 4, 30.0), (-1.0, 4, 100.0)] {
            for _ in 0..n {
                let last = closes[closes.len() - 1];
                closes.push(last + step);
                volumes.push(volume);
            }
        }
        let bars = make_bars_with_volume(&closes, &volumes);
        let snap = compute_snapshot(&bars, &SnapshotConfig::default()).unwrap();

        let obv = snap.obv.unwrap();
        let divergence = obv.divergence.unwrap();
        assert_eq!(divergence.kind, DivergenceType::Bearish);
        assert!(divergence.price.1 > divergence.price.0);
        assert!(divergence.indicator.1 < divergence.indicator.0);
        let momentum = obv.momentum.unwrap();
        assert_eq!(momentum.divergence, Some(DivergenceType::Bearish));
    }

    #[test]
    fn steady_rise_has_no_obv_divergence() {
        let bars = make_bars(&rising(120));
        let obv = compute_snapshot(&bars, &SnapshotConfig::default()).unwrap().obv.unwrap();
        assert!(obv.divergence.is_none());
        assert_eq!(obv.momentum.unwrap().divergence, None);
    }

    #[test]
    fn snapshot_is_deterministic() {
        let closes: Vec<f64> = (0..250)
            .map(|i| 100.0 + (i as f64 * 0.37).sin() * 8.0 + i as f64 * 0.05)
            .collect();
        let bars = make_bars(&closes);
        let cfg = SnapshotConfig::default();
        assert_eq!(
            compute_snapshot(&bars, &cfg).unwrap(),
            compute_snapshot(&bars, &cfg).unwrap()
        );
    }
}
