//! Black-Scholes pricing and implied volatility.

use crate::symbol::OptionType;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};

/// Upper bound of the volatility search bracket.
pub const MAX_VOLATILITY: f64 = 10.0;
/// Stop once price or bracket width is within this tolerance.
pub const TOLERANCE: f64 = 1e-4;
/// Bisection gives up after this many steps.
pub const MAX_ITERATIONS: u32 = 1000;

/// Market expiry: 15:30 IST, i.e. 10:00 UTC.
const EXPIRY_UTC_HOUR: u32 = 10;
const MS_PER_DAY: i64 = 24 * 60 * 60 * 1000;
const DAYS_PER_YEAR: f64 = 365.0;

/// Inputs to the pricing model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptionParams {
    pub underlying: f64,
    pub strike: f64,
    /// Continuously compounded risk-free rate.
    pub rate: f64,
    /// Time to maturity in years.
    pub years: f64,
    pub option_type: OptionType,
}

impl OptionParams {
    fn is_valid(&self) -> bool {
        self.underlying > 0.0
            && self.strike > 0.0
            && self.years > 0.0
            && self.rate.is_finite()
            && self.underlying.is_finite()
            && self.strike.is_finite()
            && self.years.is_finite()
    }
}

/// Standard normal CDF (Abramowitz & Stegun 7.1.26, |error| < 1.5e-7).
fn norm_cdf(x: f64) -> f64 {
    const A1: f64 = 0.254_829_592;
    const A2: f64 = -0.284_496_736;
    const A3: f64 = 1.421_413_741;
    const A4: f64 = -1.453_152_027;
    const A5: f64 = 1.061_405_429;
    const P: f64 = 0.327_591_1;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let z = x.abs() / std::f64::consts::SQRT_2;
    let t = 1.0 / (1.0 + P * z);
    let poly = ((((A5 * t + A4) * t + A3) * t + A2) * t + A1) * t;
    let erf = 1.0 - poly * (-z * z).exp();
    0.5 * (1.0 + sign * erf)
}

/// Option price for volatility `sigma`.
///
/// Both legs are discounted at `rate`; the put follows from put-call parity.
pub fn black_scholes_price(params: &OptionParams, sigma: f64) -> f64 {
    let sqrt_t = params.years.sqrt();
    let d1 = ((params.underlying / params.strike).ln()
        + (params.rate + sigma * sigma / 2.0) * params.years)
        / (sigma * sqrt_t);
    let d2 = d1 - sigma * sqrt_t;
    let discount = (-params.rate * params.years).exp();

    let call = params.underlying * discount * norm_cdf(d1)
        - params.strike * discount * norm_cdf(d2);
    match params.option_type {
        OptionType::Call => call,
        OptionType::Put => call - params.underlying + params.strike * discount,
    }
}

/// Solve for the volatility that reproduces `option_price`.
///
/// Returns `None` for invalid inputs, for a price outside what any volatility
/// in `(0, MAX_VOLATILITY]` can produce, or when bisection does not converge.
pub fn implied_volatility(params: &OptionParams, option_price: f64) -> Option<f64> {
    if !params.is_valid() || option_price.is_nan() || option_price <= 0.0 {
        return None;
    }
    if black_scholes_price(params, MAX_VOLATILITY) < option_price
        || black_scholes_price(params, TOLERANCE) > option_price
    {
        return None;
    }

    let mut low = 0.0;
    let mut high = MAX_VOLATILITY;
    let mut mid = (low + high) / 2.0;
    let mut iterations = 0;

    while high - low > TOLERANCE {
        iterations += 1;
        if iterations > MAX_ITERATIONS {
            return None;
        }

        mid = (low + high) / 2.0;
        let price = black_scholes_price(params, mid);
        if (price - option_price).abs() < TOLERANCE {
            return Some(mid);
        }
        if price > option_price {
            high = mid;
        } else {
            low = mid;
        }
    }

    Some(mid)
}

/// Years from `now` to the 15:30 IST close on `expiry`, counted in whole days
/// rounded up. `None` once the expiry has passed.
pub fn years_to_expiry(now: DateTime<Utc>, expiry: NaiveDate) -> Option<f64> {
    let close = NaiveTime::from_hms_opt(EXPIRY_UTC_HOUR, 0, 0)?;
    let expiry_at = Utc.from_utc_datetime(&expiry.and_time(close));
    let remaining_ms = (expiry_at - now).num_milliseconds();
    if remaining_ms <= 0 {
        return None;
    }
    let days = (remaining_ms + MS_PER_DAY - 1) / MS_PER_DAY;
    Some(days as f64 / DAYS_PER_YEAR)
}
