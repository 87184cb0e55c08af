//! Supermicro OEM IPMI fan commands.
//!
//! X11-generation boards (e.g. SYS-4029GP-TRT) take a raw OEM request to
//! set a zone's duty cycle:
//!
//! ```text
//! ipmitool raw 0x30 0x70 0x66 0x01 <zone> <duty>
//! ```
//!
//! where `<duty>` is a percentage in 0x00-0x64. The same request with
//! `0x00` in place of `0x01` reads the zone's current duty back.

// =============================================================================
// Constants
// =============================================================================

/// Supermicro OEM network function.
pub const NETFN_OEM: u8 = 0x30;

/// OEM fan control command.
pub const CMD_FAN_CONTROL: u8 = 0x70;

/// Fan duty sub-command.
pub const SUBCMD_FAN_DUTY: u8 = 0x66;

/// Read the zone's duty cycle.
pub const OP_GET: u8 = 0x00;

/// Write the zone's duty cycle.
pub const OP_SET: u8 = 0x01;

/// 100% duty.
pub const MAX_DUTY_RAW: u8 = 0x64;

// =============================================================================
// Builders
// =============================================================================

/// Convert a duty percentage to the raw byte, rounded and bounded to 0x00-0x64.
pub fn duty_to_raw(percent: f32) -> u8 {
    if percent.is_nan() {
        return MAX_DUTY_RAW;
    }
    percent.round().clamp(0.0, MAX_DUTY_RAW as f32) as u8
}

/// Build the raw "set zone duty" request.
pub fn build_set_duty_cmd(zone: u8, duty: u8) -> [u8; 6] {
    [
        NETFN_OEM,
        CMD_FAN_CONTROL,
        SUBCMD_FAN_DUTY,
        OP_SET,
        zone,
        duty.min(MAX_DUTY_RAW),
    ]
}

/// Build the raw "get zone duty" request.
pub fn build_get_duty_cmd(zone: u8) -> [u8; 5] {
    [NETFN_OEM, CMD_FAN_CONTROL, SUBCMD_FAN_DUTY, OP_GET, zone]
}

/// Render a raw request as `ipmitool` arguments: `raw 0x30 0x70 ...`.
pub fn raw_args(request: &[u8]) -> Vec<String> {
    std::iter::once("raw".to_string())
        .chain(request.iter().map(|b| format!("0x{:02x}", b)))
        .collect()
}

// =============================================================================
// Response Parsing
// =============================================================================

/// Parse the response to a "get zone duty" request.
///
/// `ipmitool raw` prints response bytes as space separated hex without a
/// prefix, e.g. ` 20` for 32%.
pub fn parse_duty_response(output: &str) -> Option<u8> {
    let token = output.split_whitespace().next()?;
    let token = token.trim_start_matches("0x");
    u8::from_str_radix(token, 16)
        .ok()
        .filter(|d| *d <= MAX_DUTY_RAW)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duty_to_raw_rounds_and_bounds() {
        assert_eq!(duty_to_raw(32.5), 33);
        assert_eq!(duty_to_raw(32.4), 32);
        assert_eq!(duty_to_raw(-5.0), 0);
        assert_eq!(duty_to_raw(250.0), 100);
        assert_eq!(duty_to_raw(f32::NAN), MAX_DUTY_RAW);
    }

    #[test]
    fn test_set_duty_cmd_layout() {
        assert_eq!(
            build_set_duty_cmd(0x02, 0x32),
            [0x30, 0x70, 0x66, 0x01, 0x02, 0x32]
        );
        // duty above 100% is capped
        assert_eq!(build_set_duty_cmd(0x00, 0xFF)[5], MAX_DUTY_RAW);
    }

    #[test]
    fn test_raw_args_formatting() {
        let args = raw_args(&build_set_duty_cmd(0x02, 18));
        assert_eq!(
            args,
            vec!["raw", "0x30", "0x70", "0x66", "0x01", "0x02", "0x12"]
        );
    }

    #[test]
    fn test_get_duty_cmd_layout() {
        assert_eq!(build_get_duty_cmd(0x01), [0x30, 0x70, 0x66, 0x00, 0x01]);
    }

    #[test]
    fn test_parse_duty_response() {
        assert_eq!(parse_duty_response(" 20\n"), Some(32));
        assert_eq!(parse_duty_response("64"), Some(100));
        assert_eq!(parse_duty_response("ff"), None);
        assert_eq!(parse_duty_response(""), None);
        assert_eq!(parse_duty_response("zz"), None);
    }
}
