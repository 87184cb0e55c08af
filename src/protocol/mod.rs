//! Wire formats of the external tools.
//!
//! `ipmi` encodes Supermicro OEM fan requests for `ipmitool raw`;
//! `telemetry` decodes GPU temperature listings from `rocm-smi` and
//! `nvidia-smi`.

pub mod ipmi;
pub mod telemetry;

pub use telemetry::GpuReading;
