//! Parsing utilities for CLI arguments.

use crate::config::Preset;
use crate::error::{FanControlError, Result};

// =============================================================================
// Preset Parsing
// =============================================================================

/// Parse a preset name into a [`Preset`].
///
/// # Example
/// ```
/// use gpu_fan_control::config::Preset;
/// use gpu_fan_control::utils::parsing::parse_preset;
///
/// assert_eq!(parse_preset("Quiet").unwrap(), Preset::Quiet);
/// assert!(parse_preset("turbo").is_err());
/// ```
pub fn parse_preset(name: &str) -> Result<Preset> {
    match name.to_lowercase().as_str() {
        "quiet" => Ok(Preset::Quiet),
        "conservative" => Ok(Preset::Conservative),
        _ => Err(FanControlError::InvalidInput(format!(
            "Unknown preset '{}'. Use: quiet or conservative",
            name
        ))),
    }
}

// =============================================================================
// Zone Parsing
// =============================================================================

/// Parse a single fan zone id, decimal or `0x` hex.
pub fn parse_zone(text: &str) -> Result<u8> {
    let text = text.trim();
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => text.parse(),
    };
    parsed.map_err(|_| FanControlError::InvalidInput(format!("Invalid fan zone '{}'", text)))
}

/// Parse a comma separated zone list such as `0,1` or `0x00,0x02`.
///
/// # Example
/// ```
/// use gpu_fan_control::utils::parsing::parse_zone_list;
///
/// assert_eq!(parse_zone_list("0x00, 1,0x02").unwrap(), vec![0, 1, 2]);
/// ```
pub fn parse_zone_list(list: &str) -> Result<Vec<u8>> {
    let zones = list
        .split(',')
        .filter(|s| !s.trim().is_empty())
        .map(parse_zone)
        .collect::<Result<Vec<u8>>>()?;

    if zones.is_empty() {
        return Err(FanControlError::InvalidInput(
            "Zone list is empty".into(),
        ));
    }
    Ok(zones)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_preset() {
        assert_eq!(parse_preset("quiet").unwrap(), Preset::Quiet);
        assert_eq!(parse_preset("CONSERVATIVE").unwrap(), Preset::Conservative);
        assert!(parse_preset("silent").is_err());
    }

    #[test]
    fn test_parse_zone() {
        assert_eq!(parse_zone("2").unwrap(), 2);
        assert_eq!(parse_zone("0x10").unwrap(), 16);
        assert_eq!(parse_zone(" 0X0a ").unwrap(), 10);
        assert!(parse_zone("300").is_err());
        assert!(parse_zone("zone1").is_err());
    }

    #[test]
    fn test_parse_zone_list() {
        assert_eq!(parse_zone_list("0,1").unwrap(), vec![0, 1]);
        assert_eq!(parse_zone_list("0x02").unwrap(), vec![2]);
        assert!(parse_zone_list("").is_err());
        assert!(parse_zone_list("0,x").is_err());
    }
}
