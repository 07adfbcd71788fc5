//! Volume analysis: up-day vs down-day volume and volume vs its average.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeFlow {
    StrongBuying,
    Buying,
    Neutral,
    Selling,
    StrongSelling,
}

impl VolumeFlow {
    pub fn of_ratio(ratio: f64) -> Self {
        if ratio > 1.3 {
            VolumeFlow::StrongBuying
        } else if ratio > 1.1 {
            VolumeFlow::Buying
        } else if ratio < 0.7 {
            VolumeFlow::StrongSelling
        } else if ratio < 0.9 {
            VolumeFlow::Selling
        } else {
            VolumeFlow::Neutral
        }
    }

    pub fn is_buying(self) -> bool {
        matches!(self, VolumeFlow::Buying | VolumeFlow::StrongBuying)
    }

    pub fn is_selling(self) -> bool {
        matches!(self, VolumeFlow::Selling | VolumeFlow::StrongSelling)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpDownVolume {
    pub up_days: usize,
    pub down_days: usize,
    pub avg_up_volume: f64,
    pub avg_down_volume: f64,
    /// Average up-day volume over average down-day volume.
    pub ratio: f64,
    pub flow: VolumeFlow,
}

/// Average volume on positive-return days against negative-return days over
/// the trailing `lookback` bars.
///
/// `None` when there are fewer than `lookback + 1` closes or the window has
/// no volume at all (a zero-filled series carries no participation signal).
/// With no down-day volume the ratio is 2.0 if there was up-day volume.
pub fn up_down_volume_ratio(closes: &[f64], volumes: &[f64], lookback: usize) -> Option<UpDownVolume> {
    let n = closes.len();
    if lookback == 0 || n < lookback + 1 || volumes.len() != n {
        return None;
    }
    let window_volume: f64 = volumes[n - lookback..].iter().sum();
    if !window_volume.is_finite() || window_volume <= 0.0 {
        return None;
    }

    let (mut up_vol, mut down_vol) = (0.0, 0.0);
    let (mut up_days, mut down_days) = (0usize, 0usize);
    for i in n - lookback..n {
        let prev = closes[i - 1];
        if prev == 0.0 {
            continue;
        }
        let ret = (closes[i] - prev) / prev;
        if ret > 0.0 {
            up_vol += volumes[i];
            up_days += 1;
        } else if ret < 0.0 {
            down_vol += volumes[i];
            down_days += 1;
        }
    }

    let avg_up_volume = if up_days > 0 { up_vol / up_days as f64 } else { 0.0 };
    let avg_down_volume = if down_days > 0 {
        down_vol / down_days as f64
    } else {
        0.0
    };
    let ratio = if avg_down_volume > 0.0 {
        avg_up_volume / avg_down_volume
    } else if avg_up_volume > 0.0 {
        2.0
    } else {
        1.0
    };

    Some(UpDownVolume {
        up_days,
        down_days,
        avg_up_volume,
        avg_down_volume,
        ratio,
        flow: VolumeFlow::of_ratio(ratio),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeLevel {
    High,
    AboveAverage,
    BelowAverage,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeVsAverage {
    pub current: f64,
    pub average: f64,
    pub ratio: f64,
    pub level: VolumeLevel,
}

/// Latest volume against its trailing `window` mean.
pub fn volume_vs_average(volumes: &[f64], window: usize) -> Option<VolumeVsAverage> {
    let n = volumes.len();
    if window == 0 || n < window {
        return None;
    }
    let current = volumes[n - 1];
    let average = volumes[n - window..].iter().sum::<f64>() / window as f64;
    let ratio = if average == 0.0 { 0.0 } else { current / average };
    let level = if ratio > 1.5 {
        VolumeLevel::High
    } else if ratio > 1.0 {
        VolumeLevel::AboveAverage
    } else if ratio > 0.5 {
        VolumeLevel::BelowAverage
    } else {
        VolumeLevel::Low
    };
    Some(VolumeVsAverage {
        current,
        average,
        ratio,
        level,
    })
}
