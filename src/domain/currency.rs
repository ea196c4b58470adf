use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, ErrorCode};

/// ISO 4217 currency code, restricted to the supported allowlist.
///
/// Compared by value and immutable after construction. Stored inline as a
/// 3-byte ASCII code so `Currency` stays `Copy`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency([u8; 3]);

const SUPPORTED: [&str; 7] = ["ARS", "USD", "EUR", "BRL", "MXN", "CLP", "COP"];

impl Currency {
    pub const ARS: Currency = Currency(*b"ARS");
    pub const USD: Currency = Currency(*b"USD");
    pub const EUR: Currency = Currency(*b"EUR");
    pub const BRL: Currency = Currency(*b"BRL");
    pub const MXN: Currency = Currency(*b"MXN");
    pub const CLP: Currency = Currency(*b"CLP");
    pub const COP: Currency = Currency(*b"COP");

    /// Parse a currency code. Input is trimmed and uppercased; anything
    /// outside the allowlist is rejected.
    pub fn new(code: &str) -> Result<Self, DomainError> {
        let code = code.trim().to_ascii_uppercase();

        if code.is_empty() {
            return Err(DomainError::new(
                ErrorCode::InvalidCurrency,
                "currency code cannot be empty",
            ));
        }
        if code.len() != 3 {
            return Err(DomainError::new(
                ErrorCode::InvalidCurrency,
                "currency code must be 3 characters",
            )
            .with_detail("code", &code));
        }
        if !SUPPORTED.contains(&code.as_str()) {
            return Err(DomainError::new(
                ErrorCode::InvalidCurrency,
                format!("unsupported currency: {}", code),
            )
            .with_detail("code", &code));
        }

        let bytes = code.as_bytes();
        Ok(Currency([bytes[0], bytes[1], bytes[2]]))
    }

    pub fn code(&self) -> &str {
        // Constructed only from validated ASCII.
        std::str::from_utf8(&self.0).unwrap_or("???")
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl fmt::Debug for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Currency({})", self.code())
    }
}

impl TryFrom<String> for Currency {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Currency::new(&value)
    }
}

impl From<Currency> for String {
    fn from(currency: Currency) -> Self {
        currency.code().to_string()
    }
}
