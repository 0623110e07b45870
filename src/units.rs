use crate::errors::QuoteError;
use ethers::types::U256;
use ethers::utils::format_units;

/// Fixed-point exponent of every quoted amount (native asset / stablecoin denomination).
pub const QUOTE_DECIMALS: u32 = 18;

/// One whole token in smallest units.
pub fn one_unit() -> U256 {
    U256::exp10(QUOTE_DECIMALS as usize)
}

/// Converts a smallest-unit integer into decimal units: `raw / 10^QUOTE_DECIMALS`.
pub fn to_decimal(raw: U256) -> Result<f64, QuoteError> {
    let text = format_units(raw, QUOTE_DECIMALS).map_err(|e| QuoteError::Conversion {
        reason: e.to_string(),
    })?;
    text.parse::<f64>().map_err(|e| QuoteError::Conversion {
        reason: format!("{text}: {e}"),
    })
}
