//! Option symbol grammar.
//!
//! ```text
//! symbol  := class body type
//! class   := 1*UPPER                      e.g. MAINIDX, FINANCIALS
//! body    := DD MMM YY strike             e.g. 11JUL24 19000
//!          | compact strike               e.g. 24071 19000
//! strike  := 1*DIGIT (compact form: exactly the last five digits)
//! type    := "CE" | "PE"
//! ```
//!
//! The compact form is ambiguous by construction; the last five digits are
//! taken as the strike and whatever precedes them is kept verbatim.

use crate::error::SymbolError;
use chrono::NaiveDate;
use std::fmt;

/// Number of trailing digits treated as the strike in a compact symbol.
pub const COMPACT_STRIKE_DIGITS: usize = 5;

/// Length of a `DDMMMYY` expiry.
const CALENDAR_EXPIRY_LEN: usize = 7;

/// Call or put.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptionType {
    Call,
    Put,
}

impl OptionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Call => "CE",
            Self::Put => "PE",
        }
    }
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Underlying instrument family, taken from the symbol prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum InstrumentClass {
    MainIdx,
    Financials,
    AllBanks,
    MidCaps,
    Other(String),
}

impl InstrumentClass {
    /// The four classes the dashboard offers in its selector.
    pub const KNOWN: [InstrumentClass; 4] = [
        InstrumentClass::MainIdx,
        InstrumentClass::Financials,
        InstrumentClass::AllBanks,
        InstrumentClass::MidCaps,
    ];

    pub fn from_prefix(prefix: &str) -> Self {
        match prefix {
            "MAINIDX" => Self::MainIdx,
            "FINANCIALS" => Self::Financials,
            "ALLBANKS" => Self::AllBanks,
            "MIDCAPS" => Self::MidCaps,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::MainIdx => "MAINIDX",
            Self::Financials => "FINANCIALS",
            Self::AllBanks => "ALLBANKS",
            Self::MidCaps => "MIDCAPS",
            Self::Other(s) => s,
        }
    }

    /// Reference underlying price used by the IV calculator, in feed price units.
    pub fn underlying_price(&self) -> Option<f64> {
        match self {
            Self::MainIdx => Some(1_854_880.0),
            Self::Financials => Some(1_940_360.0),
            Self::AllBanks => Some(4_398_250.0),
            Self::MidCaps => Some(785_650.0),
            Self::Other(_) => None,
        }
    }
}

impl fmt::Display for InstrumentClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Expiry part of the symbol.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Expiry {
    /// `DDMMMYY`, e.g. `11JUL24`.
    Calendar(NaiveDate),
    /// All-digit expiry, kept as written.
    Compact(String),
}

impl Expiry {
    /// Parse an expiry on its own: `DDMMMYY` (any case) or a run of digits.
    pub fn parse(s: &str) -> Option<Self> {
        if s.len() == CALENDAR_EXPIRY_LEN && is_calendar_prefix(s) {
            parse_calendar(s).map(Self::Calendar)
        } else if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
            Some(Self::Compact(s.to_string()))
        } else {
            None
        }
    }

    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            Self::Calendar(d) => Some(*d),
            Self::Compact(_) => None,
        }
    }
}

impl fmt::Display for Expiry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Calendar(d) => write!(f, "{}", d.format("%d%b%y").to_string().to_uppercase()),
            Self::Compact(s) => f.write_str(s),
        }
    }
}

/// Decomposed option symbol.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OptionSymbol {
    pub class: InstrumentClass,
    pub expiry: Expiry,
    pub strike: u32,
    pub option_type: OptionType,
}

/// Parse an option symbol such as `MAINIDX11JUL2419000CE`.
pub fn parse_symbol(symbol: &str) -> Result<OptionSymbol, SymbolError> {
    let (body, option_type) = if let Some(body) = symbol.strip_suffix("CE") {
        (body, OptionType::Call)
    } else if let Some(body) = symbol.strip_suffix("PE") {
        (body, OptionType::Put)
    } else {
        return Err(SymbolError::NotAnOption(symbol.to_string()));
    };

    let class_len = body
        .bytes()
        .take_while(|b| b.is_ascii_uppercase())
        .count();
    if class_len == 0 {
        return Err(SymbolError::MissingClass(symbol.to_string()));
    }
    let class = InstrumentClass::from_prefix(&body[..class_len]);
    let rest = &body[class_len..];
    if rest.is_empty() {
        return Err(SymbolError::MissingStrike(symbol.to_string()));
    }

    let (expiry, strike_digits) = if is_calendar_prefix(rest) {
        let date = parse_calendar(&rest[..CALENDAR_EXPIRY_LEN])
            .ok_or_else(|| SymbolError::InvalidExpiry(symbol.to_string()))?;
        (Expiry::Calendar(date), &rest[CALENDAR_EXPIRY_LEN..])
    } else if rest.bytes().all(|b| b.is_ascii_digit()) {
        if rest.len() <= COMPACT_STRIKE_DIGITS {
            return Err(SymbolError::InvalidExpiry(symbol.to_string()));
        }
        let split = rest.len() - COMPACT_STRIKE_DIGITS;
        (Expiry::Compact(rest[..split].to_string()), &rest[split..])
    } else {
        return Err(SymbolError::InvalidExpiry(symbol.to_string()));
    };

    if strike_digits.is_empty() || !strike_digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(SymbolError::MissingStrike(symbol.to_string()));
    }
    let strike = strike_digits
        .parse::<u32>()
        .map_err(|_| SymbolError::MissingStrike(symbol.to_string()))?;

    Ok(OptionSymbol {
        class,
        expiry,
        strike,
        option_type,
    })
}

/// `DD` + three letters + `YY` at the start of `s`.
fn is_calendar_prefix(s: &str) -> bool {
    let b = s.as_bytes();
    b.len() >= CALENDAR_EXPIRY_LEN
        && b[..2].iter().all(u8::is_ascii_digit)
        && b[2..5].iter().all(u8::is_ascii_alphabetic)
        && b[5..7].iter().all(u8::is_ascii_digit)
}

fn parse_calendar(s: &str) -> Option<NaiveDate> {
    // chrono expects month abbreviations in title case ("Jul").
    let mut normalized = String::with_capacity(s.len());
    normalized.push_str(&s[..2]);
    normalized.push_str(&s[2..3].to_ascii_uppercase());
    normalized.push_str(&s[3..5].to_ascii_lowercase());
    normalized.push_str(&s[5..]);
    NaiveDate::parse_from_str(&normalized, "%d%b%y").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calendar_symbol() {
        let sym = parse_symbol("MAINIDX11JUL2419000CE").unwrap();
        assert_eq!(sym.class, InstrumentClass::MainIdx);
        assert_eq!(
            sym.expiry,
            Expiry::Calendar(NaiveDate::from_ymd_opt(2024, 7, 11).unwrap())
        );
        assert_eq!(sym.strike, 19000);
        assert_eq!(sym.option_type, OptionType::Call);
        assert_eq!(sym.expiry.to_string(), "11JUL24");
    }

    #[test]
    fn test_compact_symbol_uses_five_digit_strike() {
        let sym = parse_symbol("FINANCIALS2407119000CE").unwrap();
        assert_eq!(sym.class, InstrumentClass::Financials);
        assert_eq!(sym.expiry, Expiry::Compact("24071".to_string()));
        assert_eq!(sym.strike, 19000);
        assert_eq!(sym.expiry.date(), None);
    }

    #[test]
    fn test_expiry_parse() {
        assert_eq!(
            Expiry::parse("18jul24"),
            Some(Expiry::Calendar(NaiveDate::from_ymd_opt(2024, 7, 18).unwrap()))
        );
        assert_eq!(Expiry::parse("24071"), Some(Expiry::Compact("24071".to_string())));
        assert_eq!(Expiry::parse("31FEB24"), None);
        assert_eq!(Expiry::parse("JUL"), None);
        assert_eq!(Expiry::parse(""), None);
    }

    #[test]
    fn test_put_and_unknown_class() {
        let sym = parse_symbol("SMALLCAPS25DEC2404500PE").unwrap();
        assert_eq!(sym.class, InstrumentClass::Other("SMALLCAPS".to_string()));
        assert_eq!(sym.class.underlying_price(), None);
        assert_eq!(sym.strike, 4500);
        assert_eq!(sym.option_type, OptionType::Put);
    }

    #[test]
    fn test_rejections() {
        assert!(matches!(
            parse_symbol("MAINIDX24JULFUT"),
            Err(SymbolError::NotAnOption(_))
        ));
        assert!(matches!(
            parse_symbol("1234519000CE"),
            Err(SymbolError::MissingClass(_))
        ));
        assert!(matches!(
            parse_symbol("MAINIDXCE"),
            Err(SymbolError::MissingStrike(_))
        ));
        assert!(matches!(
            parse_symbol("MAINIDX11JUL24CE"),
            Err(SymbolError::MissingStrike(_))
        ));
        assert!(matches!(
            parse_symbol("MAINIDX32XYZ2419000CE"),
            Err(SymbolError::InvalidExpiry(_))
        ));
        assert!(matches!(
            parse_symbol("MAINIDX19000CE"),
            Err(SymbolError::InvalidExpiry(_))
        ));
    }

    #[test]
    fn test_known_classes_have_reference_prices() {
        for class in InstrumentClass::KNOWN {
            assert!(class.underlying_price().is_some(), "{class}");
            assert_eq!(InstrumentClass::from_prefix(class.as_str()), class);
        }
    }
}
