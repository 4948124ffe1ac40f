//! Read-only projections over view model records.
//!
//! Every projection works on the parsed `symbol` field. Records without a
//! symbol that follows the option grammar are left out, never an error.

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use tick_core::{
    implied_volatility, parse_symbol, years_to_expiry, Expiry, OptionParams, OptionSymbol,
    OptionType, Record,
};

/// Feed field names used by the option chain.
pub mod fields {
    pub const LAST_TRADED_PRICE: &str = "LTP";
    pub const LAST_TRADED_QUANTITY: &str = "LTQ";
    pub const TOTAL_TRADED_VOLUME: &str = "totalTradedVolume";
    pub const BEST_BID: &str = "bestBid";
    pub const BEST_ASK: &str = "bestAsk";
    pub const OPEN_INTEREST: &str = "openInterest";
    pub const PREV_CLOSE_PRICE: &str = "prevClosePrice";
    pub const PREV_OPEN_INTEREST: &str = "prevOpenInterest";
}

fn option_symbol(record: &Record) -> Option<OptionSymbol> {
    record.symbol().and_then(|s| parse_symbol(s).ok())
}

/// Records whose instrument class is `class`.
pub fn filter_by_class<'a, I>(records: I, class: &str) -> Vec<&'a Record>
where
    I: IntoIterator<Item = &'a Record>,
{
    records
        .into_iter()
        .filter(|r| option_symbol(r).is_some_and(|s| s.class.as_str() == class))
        .collect()
}

/// `(calls, puts)`, each in input order.
pub fn split_by_option_type<'a, I>(records: I) -> (Vec<&'a Record>, Vec<&'a Record>)
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut calls = Vec::new();
    let mut puts = Vec::new();
    for record in records {
        match option_symbol(record).map(|s| s.option_type) {
            Some(OptionType::Call) => calls.push(record),
            Some(OptionType::Put) => puts.push(record),
            None => {}
        }
    }
    (calls, puts)
}

/// Distinct expiries, sorted.
pub fn unique_expiries<'a, I>(records: I) -> Vec<Expiry>
where
    I: IntoIterator<Item = &'a Record>,
{
    records
        .into_iter()
        .filter_map(option_symbol)
        .map(|s| s.expiry)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Distinct strikes, ascending.
pub fn unique_strikes<'a, I>(records: I) -> Vec<u32>
where
    I: IntoIterator<Item = &'a Record>,
{
    records
        .into_iter()
        .filter_map(option_symbol)
        .map(|s| s.strike)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Records matching both filters. `None` matches anything; with both `None`
/// every record with an option symbol is kept.
pub fn filter_by_expiry_and_strike<'a, I>(
    records: I,
    expiry: Option<&Expiry>,
    strike: Option<u32>,
) -> Vec<&'a Record>
where
    I: IntoIterator<Item = &'a Record>,
{
    records
        .into_iter()
        .filter(|r| {
            option_symbol(r).is_some_and(|s| {
                expiry.map_or(true, |e| &s.expiry == e) && strike.map_or(true, |k| s.strike == k)
            })
        })
        .collect()
}

/// Whole-percent change from `previous` to `current`, rounded down.
/// 0 when undefined (e.g. `previous` is 0).
pub fn percent_change(current: f64, previous: f64) -> i64 {
    let change = ((current - previous) / previous * 100.0).floor();
    if change.is_finite() {
        change as i64
    } else {
        0
    }
}

/// Call strikes below spot and put strikes above spot are in the money.
pub fn is_in_the_money(option_type: OptionType, strike: u32, spot: f64) -> bool {
    let strike = f64::from(strike);
    match option_type {
        OptionType::Call => spot > strike,
        OptionType::Put => spot < strike,
    }
}

/// Inputs shared by every row of one option chain render.
#[derive(Debug, Clone, Copy)]
pub struct PricingContext {
    pub now: DateTime<Utc>,
    pub risk_free_rate: f64,
    pub itm_reference: Option<f64>,
}

/// One option chain line.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainRow {
    pub symbol: OptionSymbol,
    pub ltp: Option<f64>,
    pub ltq: Option<f64>,
    pub volume: Option<f64>,
    pub best_bid: Option<f64>,
    pub best_ask: Option<f64>,
    pub open_interest: Option<f64>,
    pub change_pct: i64,
    pub change_in_oi_pct: i64,
    pub implied_volatility: Option<f64>,
    pub in_the_money: bool,
}

impl ChainRow {
    /// `None` when the record has no option symbol.
    pub fn from_record(record: &Record, ctx: &PricingContext) -> Option<Self> {
        let symbol = option_symbol(record)?;
        let ltp = record.get_f64(fields::LAST_TRADED_PRICE);
        let open_interest = record.get_f64(fields::OPEN_INTEREST);

        let change_pct = match (ltp, record.get_f64(fields::PREV_CLOSE_PRICE)) {
            (Some(ltp), Some(prev)) => percent_change(ltp, prev),
            _ => 0,
        };
        let change_in_oi_pct = match (open_interest, record.get_f64(fields::PREV_OPEN_INTEREST)) {
            (Some(oi), Some(prev)) => percent_change(oi, prev),
            _ => 0,
        };

        let implied_volatility = ltp.and_then(|price| row_iv(&symbol, price, ctx));
        let in_the_money = ctx
            .itm_reference
            .is_some_and(|spot| is_in_the_money(symbol.option_type, symbol.strike, spot));

        Some(Self {
            ltp,
            ltq: record.get_f64(fields::LAST_TRADED_QUANTITY),
            volume: record.get_f64(fields::TOTAL_TRADED_VOLUME),
            best_bid: record.get_f64(fields::BEST_BID),
            best_ask: record.get_f64(fields::BEST_ASK),
            open_interest,
            change_pct,
            change_in_oi_pct,
            implied_volatility,
            in_the_money,
            symbol,
        })
    }
}

/// IV needs a calendar expiry and a known underlying.
fn row_iv(symbol: &OptionSymbol, price: f64, ctx: &PricingContext) -> Option<f64> {
    let years = years_to_expiry(ctx.now, symbol.expiry.date()?)?;
    let params = OptionParams {
        underlying: symbol.class.underlying_price()?,
        strike: f64::from(symbol.strike),
        rate: ctx.risk_free_rate,
        years,
        option_type: symbol.option_type,
    };
    implied_volatility(&params, price)
}

/// Chain rows for `records`, split into `(calls, puts)`.
pub fn option_chain<'a, I>(records: I, ctx: &PricingContext) -> (Vec<ChainRow>, Vec<ChainRow>)
where
    I: IntoIterator<Item = &'a Record>,
{
    let (calls, puts) = split_by_option_type(records);
    let rows = |records: Vec<&'a Record>| -> Vec<ChainRow> {
        records
            .into_iter()
            .filter_map(|r| ChainRow::from_record(r, ctx))
            .collect()
    };
    (rows(calls), rows(puts))
}
