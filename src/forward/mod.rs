//! Implied calendar forward rates from two futures legs.
//!
//! For legs `i ∈ {1, 2}` with price `F_i`, days to settlement `T_i`, expected
//! dividends `D_i` and a short rate `r` (decimal), all on Actual/360:
//!
//! - dividends are assumed to fall halfway through the leg on average and are
//!   carried forward at the short rate:
//!   `Dc_i = D_i * (1 + r * (T_i / 2) / 360)`
//! - implied forward over the span between the two settlements:
//!   `raw = (F_2 + Dc_2) / (F_1 + Dc_1) - 1`,
//!   `fwd = 100 * raw * 360 / (T_2 - T_1)`
//! - short-rate forward over the same span (simple interest):
//!   `ois_raw = (1 + r T_2 / 360) / (1 + r T_1 / 360) - 1`,
//!   `ois_fwd = 100 * ois_raw * 360 / (T_2 - T_1)`
//! - `spread = fwd - ois_fwd`, in percentage points
//!
//! Both rates are undefined unless `T_2 > T_1`.

pub mod index;

pub use index::*;

/// Actual/360 year basis.
pub const DAY_BASIS: f64 = 360.0;

/// Per-row inputs, already joined and validated for presence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForwardInputs {
    pub term1_price: f64,
    pub term2_price: f64,
    pub term1_ttm: i64,
    pub term2_ttm: i64,
    /// Decimal short rate.
    pub short_rate: f64,
    pub div_sum1: f64,
    pub div_sum2: f64,
}

/// Per-row outputs of the forward computation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForwardQuote {
    pub div_sum1_comp: f64,
    pub div_sum2_comp: f64,
    pub implied_forward_raw: f64,
    /// Percent, annualized.
    pub implied_forward_rate: f64,
    pub short_rate_forward_raw: f64,
    /// Percent, annualized.
    pub short_rate_forward: f64,
    /// `implied_forward_rate - short_rate_forward`, percentage points.
    pub spread_pct: f64,
}

/// Carry a dividend sum to the mid-point of a leg at the short rate.
pub fn compound_dividends(div_sum: f64, short_rate: f64, ttm_days: i64) -> f64 {
    div_sum * (1.0 + short_rate * (ttm_days as f64 / 2.0) / DAY_BASIS)
}

/// Annualize a per-period forward return over the span between the two legs.
///
/// Returns `None` when the legs are not strictly ordered (`ttm2 <= ttm1`)
/// or the span does not fit in an `i64`.
pub fn annualize_span(raw: f64, ttm1: i64, ttm2: i64) -> Option<f64> {
    let span = ttm2.checked_sub(ttm1)?;
    if span <= 0 {
        return None;
    }
    Some(100.0 * raw * DAY_BASIS / span as f64)
}

/// Simple-interest growth ratio between the two legs, minus one.
pub fn short_rate_forward_raw(short_rate: f64, ttm1: i64, ttm2: i64) -> f64 {
    (1.0 + short_rate * ttm2 as f64 / DAY_BASIS) / (1.0 + short_rate * ttm1 as f64 / DAY_BASIS) - 1.0
}

/// Compute the forward quote for one row, or `None` if it is undefined.
pub fn compute_forward(inputs: &ForwardInputs) -> Option<ForwardQuote> {
    let div_sum1_comp = compound_dividends(inputs.div_sum1, inputs.short_rate, inputs.term1_ttm);
    let div_sum2_comp = compound_dividends(inputs.div_sum2, inputs.short_rate, inputs.term2_ttm);

    let implied_forward_raw = (inputs.term2_price + div_sum2_comp) / (inputs.term1_price + div_sum1_comp) - 1.0;
    let implied_forward_rate = annualize_span(implied_forward_raw, inputs.term1_ttm, inputs.term2_ttm)?;

    let ois_raw = short_rate_forward_raw(inputs.short_rate, inputs.term1_ttm, inputs.term2_ttm);
    let short_rate_forward = annualize_span(ois_raw, inputs.term1_ttm, inputs.term2_ttm)?;

    let spread_pct = implied_forward_rate - short_rate_forward;
    if !(implied_forward_rate.is_finite() && short_rate_forward.is_finite()) {
        return None;
    }

    Some(ForwardQuote {
        div_sum1_comp,
        div_sum2_comp,
        implied_forward_raw,
        implied_forward_rate,
        short_rate_forward_raw: ois_raw,
        short_rate_forward,
        spread_pct,
    })
}
