//! Compute device selection for ML inference

use crate::error::Result;
use candle_core::Device;
use serde::{Deserialize, Serialize};

/// Device types supported for ML inference
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum DeviceType {
    /// CPU inference
    Cpu,
    /// CUDA GPU inference
    Cuda(usize),
    /// Metal GPU inference (macOS)
    Metal,
}

impl DeviceType {
    /// Resolve to a candle device
    pub fn to_device(&self) -> Result<Device> {
        match self {
            DeviceType::Cpu => Ok(Device::Cpu),
            DeviceType::Cuda(ordinal) => Ok(Device::cuda_if_available(*ordinal)?),
            DeviceType::Metal => {
                #[cfg(feature = "metal")]
                {
                    Ok(Device::new_metal(0)?)
                }
                #[cfg(not(feature = "metal"))]
                {
                    log::warn!("Metal support not compiled in, falling back to CPU");
                    Ok(Device::Cpu)
                }
            }
        }
    }
}

/// Select the best available device
pub fn select_device() -> DeviceType {
    #[cfg(feature = "metal")]
    {
        if Device::new_metal(0).is_ok() {
            log::info!("Selected Metal GPU for inference");
            return DeviceType::Metal;
        }
    }

    #[cfg(feature = "cuda")]
    {
        if let Ok(device) = Device::cuda_if_available(0) {
            if !device.is_cpu() {
                log::info!("Selected CUDA GPU 0 for inference");
                return DeviceType::Cuda(0);
            }
        }
    }

    log::info!("Selected CPU for inference");
    DeviceType::Cpu
}
