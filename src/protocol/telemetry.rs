//! Parsers for GPU telemetry tool output.
//!
//! Each parser turns the tool's stdout into one [`GpuReading`] per
//! detected GPU, or reports why nothing usable was found.

use serde_json::Value;

use crate::error::SensorError;

pub const ROCM_SMI: &str = "rocm-smi";
pub const NVIDIA_SMI: &str = "nvidia-smi";

/// Arguments for the JSON temperature listing.
pub const ROCM_JSON_ARGS: [&str; 2] = ["--showtemp", "--json"];

/// Arguments for the plain-text temperature listing.
pub const ROCM_TEXT_ARGS: [&str; 1] = ["--showtemp"];

/// Label fragment marking the edge sensor in the text listing.
const ROCM_EDGE_LABEL: &str = "(Sensor edge)";

pub const NVIDIA_ARGS: [&str; 2] = [
    "--query-gpu=index,temperature.gpu",
    "--format=csv,noheader,nounits",
];

/// One GPU's temperature as reported by a tool.
#[derive(Debug, Clone, PartialEq)]
pub struct GpuReading {
    pub device_id: String,
    pub celsius: f32,
}

fn parse_error(tool: &str, detail: impl Into<String>) -> SensorError {
    SensorError::ParseError {
        tool: tool.to_string(),
        detail: detail.into(),
    }
}

fn parse_celsius(value: &Value) -> Option<f32> {
    let celsius = match value {
        Value::String(s) => s.trim().parse::<f32>().ok()?,
        Value::Number(n) => n.as_f64()? as f32,
        _ => return None,
    };
    celsius.is_finite().then_some(celsius)
}

/// Numeric suffix of `card12` / `GPU[12]`, used for stable ordering.
fn card_index(id: &str) -> u32 {
    id.trim_start_matches(|c: char| !c.is_ascii_digit())
        .trim_end_matches(|c: char| !c.is_ascii_digit())
        .parse()
        .unwrap_or(u32::MAX)
}

// =============================================================================
// rocm-smi
// =============================================================================

/// Parse `rocm-smi --showtemp --json`.
///
/// ```text
/// {"card0": {"Temperature (Sensor edge) (C)": "45.0", ...}, "card1": {...}}
/// ```
///
/// Cards without a numeric value under `key` are skipped. Fails if the
/// text is not JSON or no card has a usable temperature.
pub fn parse_rocm_json(output: &str, key: &str) -> Result<Vec<GpuReading>, SensorError> {
    let root: Value = serde_json::from_str(output)
        .map_err(|e| parse_error(ROCM_SMI, format!("invalid JSON: {}", e)))?;
    let cards = root
        .as_object()
        .ok_or_else(|| parse_error(ROCM_SMI, "top-level JSON is not an object"))?;

    let mut readings: Vec<GpuReading> = cards
        .iter()
        .filter(|(id, _)| id.starts_with("card"))
        .filter_map(|(id, data)| {
            let celsius = parse_celsius(data.get(key)?)?;
            Some(GpuReading {
                device_id: id.clone(),
                celsius,
            })
        })
        .collect();

    if readings.is_empty() {
        return Err(parse_error(
            ROCM_SMI,
            format!("no card reported a numeric '{}'", key),
        ));
    }
    readings.sort_by_key(|r| card_index(&r.device_id));
    Ok(readings)
}

/// Parse the plain-text `rocm-smi --showtemp` listing.
///
/// ```text
/// GPU[0]          : Temperature (Sensor edge) (C): 45.0
/// GPU[0]          : Temperature (Sensor junction) (C): 48.0
/// ```
///
/// Only edge sensor lines are used. Device ids are reported as `cardN`
/// so they line up with the JSON form.
pub fn parse_rocm_text(output: &str) -> Result<Vec<GpuReading>, SensorError> {
    let mut readings: Vec<GpuReading> = output
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with("GPU[") && line.contains(ROCM_EDGE_LABEL))
        .filter_map(|line| {
            let (gpu, _) = line.split_once(']')?;
            let index: u32 = gpu.trim_start_matches("GPU[").parse().ok()?;
            let (_, value) = line.rsplit_once(':')?;
            let celsius = value.trim().parse::<f32>().ok().filter(|c| c.is_finite())?;
            Some(GpuReading {
                device_id: format!("card{}", index),
                celsius,
            })
        })
        .collect();

    if readings.is_empty() {
        return Err(parse_error(ROCM_SMI, "no edge temperature lines in output"));
    }
    readings.sort_by_key(|r| card_index(&r.device_id));
    readings.dedup_by(|a, b| a.device_id == b.device_id);
    Ok(readings)
}

// =============================================================================
// nvidia-smi
// =============================================================================

/// Parse `nvidia-smi --query-gpu=index,temperature.gpu --format=csv,noheader,nounits`.
///
/// ```text
/// 0, 45
/// 1, 47
/// ```
///
/// Rows reporting `[N/A]` are skipped.
pub fn parse_nvidia_csv(output: &str) -> Result<Vec<GpuReading>, SensorError> {
    let readings: Vec<GpuReading> = output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let (index, temp) = line.split_once(',')?;
            let index: u32 = index.trim().parse().ok()?;
            let celsius = temp.trim().parse::<f32>().ok().filter(|c| c.is_finite())?;
            Some(GpuReading {
                device_id: format!("gpu{}", index),
                celsius,
            })
        })
        .collect();

    if readings.is_empty() {
        return Err(parse_error(NVIDIA_SMI, "no numeric temperature rows"));
    }
    Ok(readings)
}
