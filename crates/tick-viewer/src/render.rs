//! Terminal option chain.

use crate::config::ViewerConfig;
use crate::model::ViewModel;
use crate::projection::{
    filter_by_class, filter_by_expiry_and_strike, option_chain, unique_expiries, unique_strikes,
    ChainRow, PricingContext,
};
use chrono::Utc;
use tick_core::{Expiry, Record};
use std::io::{self, Write};
use tracing::warn;

/// Receives the view model whenever it changed.
pub trait RenderSink: Send {
    fn render(&mut self, model: &ViewModel);

    /// Hub connection went up or down.
    fn connection_changed(&mut self, _connected: bool) {}
}

/// Renders the call and put tables as plain text.
pub struct TerminalSink<W: Write + Send> {
    out: W,
    class: Option<String>,
    expiry: Option<Expiry>,
    strike: Option<u32>,
    risk_free_rate: f64,
    itm_reference: Option<f64>,
    clear_screen: bool,
    connected: bool,
}

impl TerminalSink<io::Stdout> {
    pub fn stdout(config: &ViewerConfig) -> Self {
        Self::new(io::stdout(), config, true)
    }
}

impl<W: Write + Send> TerminalSink<W> {
    pub fn new(out: W, config: &ViewerConfig, clear_screen: bool) -> Self {
        Self {
            out,
            class: config.class().map(str::to_string),
            expiry: config.expiry(),
            strike: config.strike_filter,
            risk_free_rate: config.risk_free_rate,
            itm_reference: config.itm_reference,
            clear_screen,
            connected: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn draw(&mut self, model: &ViewModel) -> io::Result<()> {
        let ctx = PricingContext {
            now: Utc::now(),
            risk_free_rate: self.risk_free_rate,
            itm_reference: self.itm_reference,
        };
        let scoped: Vec<&Record> = match &self.class {
            Some(class) => filter_by_class(model.iter(), class),
            None => model.iter().collect(),
        };
        let expiries = unique_expiries(scoped.iter().copied());
        let strikes = unique_strikes(scoped.iter().copied());
        let shown = filter_by_expiry_and_strike(
            scoped.iter().copied(),
            self.expiry.as_ref(),
            self.strike,
        );
        let (calls, puts) = option_chain(shown, &ctx);

        if self.clear_screen {
            write!(self.out, "\x1b[2J\x1b[H")?;
        }
        writeln!(
            self.out,
            "Option chain [{}]  records={}  {}",
            self.class.as_deref().unwrap_or("ALL"),
            model.len(),
            if self.connected { "live" } else { "disconnected" },
        )?;
        writeln!(
            self.out,
            "Expiry {}  Strike {}",
            self.expiry.as_ref().map_or_else(|| "ALL".to_string(), Expiry::to_string),
            self.strike.map_or_else(|| "ALL".to_string(), |k| k.to_string()),
        )?;
        writeln!(
            self.out,
            "Expiries: {}",
            join(expiries.iter().map(Expiry::to_string))
        )?;
        writeln!(self.out, "Strikes: {}", join(strikes.iter().map(u32::to_string)))?;
        write_table(&mut self.out, "CALLS", &calls)?;
        write_table(&mut self.out, "PUTS", &puts)?;
        self.out.flush()
    }
}

impl<W: Write + Send> RenderSink for TerminalSink<W> {
    fn render(&mut self, model: &ViewModel) {
        if let Err(e) = self.draw(model) {
            warn!(error = %e, "Failed to render option chain");
        }
    }

    fn connection_changed(&mut self, connected: bool) {
        self.connected = connected;
    }
}

fn write_table(out: &mut impl Write, title: &str, rows: &[ChainRow]) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{title}")?;
    writeln!(
        out,
        "{:<26} {:>10} {:>8} {:>10} {:>10} {:>10} {:>10} {:>6} {:>7} {:>8} {:>3}",
        "SYMBOL", "LTP", "LTQ", "VOLUME", "BID", "ASK", "OI", "CHNG", "CHNG OI", "IV", "ITM"
    )?;
    for row in rows {
        writeln!(
            out,
            "{:<26} {:>10} {:>8} {:>10} {:>10} {:>10} {:>10} {:>5}% {:>6}% {:>8} {:>3}",
            format!("{}{}{}{}", row.symbol.class, row.symbol.expiry, row.symbol.strike, row.symbol.option_type),
            cell(row.ltp),
            cell(row.ltq),
            cell(row.volume),
            cell(row.best_bid),
            cell(row.best_ask),
            cell(row.open_interest),
            row.change_pct,
            row.change_in_oi_pct,
            row.implied_volatility
                .map_or_else(|| "-".to_string(), |iv| format!("{:.2}%", iv * 100.0)),
            if row.in_the_money { "*" } else { "" },
        )?;
    }
    Ok(())
}

fn join(items: impl Iterator<Item = String>) -> String {
    items.collect::<Vec<_>>().join(" ")
}

fn cell(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}
