use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use crate::error::{Error, Result};

/// Currencies returned by the sources' locale profiles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Eur,
    Usd,
    Gbp,
    Mxn,
    Cop,
    Brl,
}

impl Currency {
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Eur => "EUR",
            Currency::Usd => "USD",
            Currency::Gbp => "GBP",
            Currency::Mxn => "MXN",
            Currency::Cop => "COP",
            Currency::Brl => "BRL",
        }
    }

    /// Number of decimal digits in one major unit.
    pub fn minor_digits(&self) -> u32 {
        2
    }
}

impl FromStr for Currency {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "EUR" | "€" => Ok(Currency::Eur),
            "USD" => Ok(Currency::Usd),
            "GBP" | "£" => Ok(Currency::Gbp),
            "MXN" => Ok(Currency::Mxn),
            "COP" => Ok(Currency::Cop),
            "BRL" | "R$" => Ok(Currency::Brl),
            _ => Err(Error::UnrecognizedCurrency(s.to_string())),
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
