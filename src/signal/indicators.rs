// Technical indicators: RSI, EMA, ATR

/// One OHLC candle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candle {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Candle {
    pub fn new(open: f64, high: f64, low: f64, close: f64) -> Self {
        Self { open, high, low, close }
    }
}

/// Latest RSI over `closes` using Wilder's smoothing
///
/// The first delta counts as zero, so at least `period` closes are needed.
/// Returns 100 when there were no losses at all.
pub fn rsi(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period {
        return None;
    }

    let alpha = 1.0 / period as f64;
    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;

    for (i, window) in std::iter::once(None)
        .chain(closes.windows(2).map(Some))
        .enumerate()
    {
        let change = window.map(|w| w[1] - w[0]).unwrap_or(0.0);
        let gain = change.max(0.0);
        let loss = (-change).max(0.0);

        if i == 0 {
            avg_gain = gain;
            avg_loss = loss;
        } else {
            avg_gain = alpha * gain + (1.0 - alpha) * avg_gain;
            avg_loss = alpha * loss + (1.0 - alpha) * avg_loss;
        }
    }

    if avg_loss == 0.0 {
        return Some(100.0);
    }
    let rs = avg_gain / avg_loss;
    Some(100.0 - 100.0 / (1.0 + rs))
}

/// Latest exponential moving average, seeded with the first close
pub fn ema(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period {
        return None;
    }

    let alpha = 2.0 / (period as f64 + 1.0);
    let mut iter = closes.iter();
    let first = *iter.next()?;
    Some(iter.fold(first, |ema, close| alpha * close + (1.0 - alpha) * ema))
}

/// True range of each candle; the first one has no previous close
pub fn true_ranges(candles: &[Candle]) -> Vec<f64> {
    candles
        .iter()
        .enumerate()
        .map(|(i, candle)| {
            let range = candle.high - candle.low;
            match i.checked_sub(1).map(|prev| candles[prev].close) {
                Some(prev_close) => range
                    .max((candle.high - prev_close).abs())
                    .max((candle.low - prev_close).abs()),
                None => range,
            }
        })
        .collect()
}

/// Latest average true range
///
/// Seeded with the mean of the first `period` true ranges, then
/// Wilder-smoothed over the rest.
pub fn average_true_range(candles: &[Candle], period: usize) -> Option<f64> {
    if period == 0 || candles.len() < period {
        return None;
    }

    let ranges = true_ranges(candles);
    let seed = ranges[..period].iter().sum::<f64>() / period as f64;
    let n = period as f64;
    Some(
        ranges[period..]
            .iter()
            .fold(seed, |atr, tr| (atr * (n - 1.0) + tr) / n),
    )
}
