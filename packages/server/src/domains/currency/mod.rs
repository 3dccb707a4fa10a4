// Currency domain - display currency, fixed exchange rates, amount formatting

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Usd,
    Eur,
    Gbp,
}

impl Currency {
    pub const ALL: [Currency; 3] = [Currency::Usd, Currency::Eur, Currency::Gbp];

    pub fn code(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Gbp => "GBP",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::Usd => "$",
            Currency::Eur => "€",
            Currency::Gbp => "£",
        }
    }

    /// Units of this currency per one USD.
    pub fn rate(&self) -> Decimal {
        match self {
            Currency::Usd => Decimal::ONE,
            Currency::Eur => Decimal::new(85, 2),
            Currency::Gbp => Decimal::new(73, 2),
        }
    }

    /// Convert through USD as the base currency. `None` on overflow.
    pub fn convert(amount: Decimal, from: Currency, to: Currency) -> Option<Decimal> {
        if from == to {
            return Some(amount);
        }
        amount.checked_div(from.rate())?.checked_mul(to.rate())
    }

    /// `$1,234.50` style: symbol, thousands separators, two decimals.
    pub fn format(&self, amount: Decimal) -> String {
        let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
            "-"
        } else {
            ""
        };
        let digits = format!("{:.2}", rounded.abs());
        let (whole, cents) = digits.split_once('.').unwrap_or((digits.as_str(), "00"));
        format!("{}{}{}.{}", sign, self.symbol(), group_thousands(whole), cents)
    }
}

fn group_thousands(whole: &str) -> String {
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "USD" => Ok(Currency::Usd),
            "EUR" => Ok(Currency::Eur),
            "GBP" => Ok(Currency::Gbp),
            other => Err(format!("unsupported currency '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_format_groups_thousands() {
        assert_eq!(Currency::Usd.format(dec("1234.5")), "$1,234.50");
        assert_eq!(Currency::Eur.format(dec("1000000")), "€1,000,000.00");
        assert_eq!(Currency::Gbp.format(dec("999.999")), "£1,000.00");
        assert_eq!(Currency::Usd.format(dec("0")), "$0.00");
    }

    #[test]
    fn test_format_negative_amounts() {
        assert_eq!(Currency::Usd.format(dec("-42.1")), "-$42.10");
        assert_eq!(Currency::Usd.format(dec("-0.001")), "$0.00");
    }

    #[test]
    fn test_convert_goes_through_usd() {
        assert_eq!(
            Currency::convert(dec("100"), Currency::Usd, Currency::Eur),
            Some(dec("85"))
        );
        assert_eq!(
            Currency::convert(dec("85"), Currency::Eur, Currency::Usd),
            Some(dec("100"))
        );
        let gbp = Currency::convert(dec("85"), Currency::Eur, Currency::Gbp).unwrap();
        assert_eq!(Currency::Gbp.format(gbp), "£73.00");
    }

    #[test]
    fn test_convert_reports_overflow() {
        assert_eq!(
            Currency::convert(Decimal::MAX, Currency::Gbp, Currency::Usd),
            None
        );
        assert_eq!(
            Currency::convert(Decimal::MAX, Currency::Usd, Currency::Usd),
            Some(Decimal::MAX)
        );
    }

    #[test]
    fn test_parse_codes() {
        assert_eq!("eur".parse::<Currency>(), Ok(Currency::Eur));
        assert!("JPY".parse::<Currency>().is_err());
        assert_eq!(serde_json::to_value(Currency::Gbp).unwrap(), "GBP");
    }
}
