//! Compute device selection.
//!
//! The device is chosen once at startup. [`DevicePreference::Auto`] prefers
//! CUDA, then Metal, then CPU. Accelerators are only reachable when the
//! matching cargo feature (`cuda`, `metal`) is enabled.

use std::fmt;
use std::str::FromStr;

use candle_core::{DType, Device};

/// Physical device a model runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    Cpu,
    Cuda,
    Metal,
}

impl DeviceKind {
    /// Weight dtype for this device: half precision on CUDA, full elsewhere.
    pub fn dtype(self) -> DType {
        match self {
            DeviceKind::Cuda => DType::F16,
            DeviceKind::Cpu | DeviceKind::Metal => DType::F32,
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceKind::Cpu => write!(f, "cpu"),
            DeviceKind::Cuda => write!(f, "cuda"),
            DeviceKind::Metal => write!(f, "metal"),
        }
    }
}

/// What the operator asked for on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DevicePreference {
    #[default]
    Auto,
    Cpu,
    Cuda,
    Metal,
}

impl FromStr for DevicePreference {
    type Err = DeviceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(DevicePreference::Auto),
            "cpu" => Ok(DevicePreference::Cpu),
            "cuda" | "gpu" => Ok(DevicePreference::Cuda),
            "metal" => Ok(DevicePreference::Metal),
            other => Err(DeviceError::UnknownPreference(other.to_string())),
        }
    }
}

impl fmt::Display for DevicePreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DevicePreference::Auto => write!(f, "auto"),
            DevicePreference::Cpu => write!(f, "cpu"),
            DevicePreference::Cuda => write!(f, "cuda"),
            DevicePreference::Metal => write!(f, "metal"),
        }
    }
}

/// Errors from device selection.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("unknown device `{0}` (expected auto, cpu, cuda or metal)")]
    UnknownPreference(String),
    #[error("{kind} device unavailable: {reason}")]
    Unavailable { kind: DeviceKind, reason: String },
}

/// The device picked at startup together with its weight dtype.
#[derive(Debug, Clone)]
pub struct SelectedDevice {
    pub kind: DeviceKind,
    pub device: Device,
    pub dtype: DType,
}

impl SelectedDevice {
    fn cpu() -> Self {
        Self {
            kind: DeviceKind::Cpu,
            device: Device::Cpu,
            dtype: DeviceKind::Cpu.dtype(),
        }
    }

    fn open(kind: DeviceKind) -> Result<Self, DeviceError> {
        let device = match kind {
            DeviceKind::Cpu => return Ok(Self::cpu()),
            DeviceKind::Cuda => Device::new_cuda(0),
            DeviceKind::Metal => Device::new_metal(0),
        }
        .map_err(|e| DeviceError::Unavailable {
            kind,
            reason: e.to_string(),
        })?;

        Ok(Self {
            kind,
            device,
            dtype: kind.dtype(),
        })
    }
}

/// Resolve a preference into a concrete device.
///
/// An explicit accelerator request fails if the accelerator cannot be opened.
/// `Auto` falls back to CPU instead.
pub fn select_device(preference: DevicePreference) -> Result<SelectedDevice, DeviceError> {
    match preference {
        DevicePreference::Cpu => Ok(SelectedDevice::cpu()),
        DevicePreference::Cuda => SelectedDevice::open(DeviceKind::Cuda),
        DevicePreference::Metal => SelectedDevice::open(DeviceKind::Metal),
        DevicePreference::Auto => {
            if candle_core::utils::cuda_is_available() {
                match SelectedDevice::open(DeviceKind::Cuda) {
                    Ok(selected) => return Ok(selected),
                    Err(e) => tracing::warn!("cuda compiled in but not usable: {e}"),
                }
            }
            if candle_core::utils::metal_is_available() {
                match SelectedDevice::open(DeviceKind::Metal) {
                    Ok(selected) => return Ok(selected),
                    Err(e) => tracing::warn!("metal compiled in but not usable: {e}"),
                }
            }
            Ok(SelectedDevice::cpu())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preference_parses_case_insensitively() {
        assert_eq!("AUTO".parse::<DevicePreference>().unwrap(), DevicePreference::Auto);
        assert_eq!(" cpu ".parse::<DevicePreference>().unwrap(), DevicePreference::Cpu);
        assert_eq!("gpu".parse::<DevicePreference>().unwrap(), DevicePreference::Cuda);
        assert_eq!("Metal".parse::<DevicePreference>().unwrap(), DevicePreference::Metal);
    }

    #[test]
    fn unknown_preference_is_rejected() {
        let err = "tpu".parse::<DevicePreference>().unwrap_err();
        assert!(err.to_string().contains("tpu"));
    }

    #[test]
    fn cpu_selection_always_succeeds() {
        let selected = select_device(DevicePreference::Cpu).unwrap();
        assert_eq!(selected.kind, DeviceKind::Cpu);
        assert_eq!(selected.dtype, DType::F32);
        assert!(selected.device.is_cpu());
    }

    #[test]
    fn auto_selects_a_usable_device() {
        let selected = select_device(DevicePreference::Auto).unwrap();
        if !candle_core::utils::cuda_is_available() && !candle_core::utils::metal_is_available() {
            assert_eq!(selected.kind, DeviceKind::Cpu);
        }
    }

    #[test]
    fn cuda_uses_half_precision() {
        assert_eq!(DeviceKind::Cuda.dtype(), DType::F16);
        assert_eq!(DeviceKind::Metal.dtype(), DType::F32);
    }

    #[test]
    fn display_round_trips_through_parse() {
        for pref in [
            DevicePreference::Auto,
            DevicePreference::Cpu,
            DevicePreference::Cuda,
            DevicePreference::Metal,
        ] {
            assert_eq!(pref.to_string().parse::<DevicePreference>().unwrap(), pref);
        }
    }
}
