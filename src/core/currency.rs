use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Currencies a restaurant can bill in, with their minor-unit precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// Indian Rupee (2 decimal places)
    #[default]
    INR,
    /// US Dollar (2 decimal places)
    USD,
    /// Malaysian Ringgit (2 decimal places)
    MYR,
    /// Indonesian Rupiah (no decimal places)
    IDR,
}

impl Currency {
    /// Returns the minor-unit scale for this currency
    pub fn scale(&self) -> u32 {
        match self {
            Currency::IDR => 0,
            Currency::INR | Currency::USD | Currency::MYR => 2,
        }
    }

    /// Rounds to the minor unit, half away from zero (2.345 -> 2.35)
    pub fn round(&self, amount: Decimal) -> Decimal {
        amount.round_dp_with_strategy(self.scale(), RoundingStrategy::MidpointAwayFromZero)
    }

    /// Formats an amount for display with the correct decimal places
    pub fn format_amount(&self, amount: Decimal) -> String {
        let scale = self.scale();
        if scale == 0 {
            format!("{} {}", self, self.round(amount))
        } else {
            format!("{} {:.width$}", self, self.round(amount), width = scale as usize)
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Currency::INR => write!(f, "INR"),
            Currency::USD => write!(f, "USD"),
            Currency::MYR => write!(f, "MYR"),
            Currency::IDR => write!(f, "IDR"),
        }
    }
}

impl std::str::FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "INR" => Ok(Currency::INR),
            "USD" => Ok(Currency::USD),
            "MYR" => Ok(Currency::MYR),
            "IDR" => Ok(Currency::IDR),
            _ => Err(format!("Invalid currency: {}", s)),
        }
    }
}
