use alloc::string::String;

pub type DeviceResult<T> = Result<T, DeviceError>;

/// Errors reported by drivers and device subsystems
///
/// Each variant corresponds to the kernel errno that would be handed back to whoever triggered
/// the failing operation, see [`DeviceError::errno`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    #[error("out of memory")]
    OutOfMemory,
    #[error("invalid argument")]
    InvalidArgument,
    /// The device doesn't expose a memory mapped register window
    #[error("pci{slot}: no memory mapped I/O region")]
    NoIoRegion { slot: String },
    /// The register window is smaller than the registers the driver uses
    #[error("pci{slot}: I/O region of {len:#x} bytes is too small, need {needed:#x}")]
    RegionTooSmall { slot: String, len: u64, needed: u64 },
    #[error("no such device")]
    NoDevice,
    #[error("device or resource busy")]
    Busy,
    #[error("not found")]
    NotFound,
}

impl DeviceError {
    pub const ENOENT: i32 = 2;
    pub const ENXIO: i32 = 6;
    pub const ENOMEM: i32 = 12;
    pub const EBUSY: i32 = 16;
    pub const ENODEV: i32 = 19;
    pub const EINVAL: i32 = 22;

    /// The (negative) errno for this error
    pub fn errno(&self) -> i32 {
        -match self {
            DeviceError::OutOfMemory => Self::ENOMEM,
            DeviceError::InvalidArgument => Self::EINVAL,
            DeviceError::NoIoRegion { .. } | DeviceError::RegionTooSmall { .. } => Self::ENXIO,
            DeviceError::NoDevice => Self::ENODEV,
            DeviceError::Busy => Self::EBUSY,
            DeviceError::NotFound => Self::ENOENT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn errno_values() {
        assert_eq!(DeviceError::OutOfMemory.errno(), -12);
        assert_eq!(DeviceError::InvalidArgument.errno(), -22);
        assert_eq!(DeviceError::NoDevice.errno(), -19);
    }

    #[test]
    fn missing_region_names_the_slot() {
        let err = DeviceError::NoIoRegion { slot: "00:0d.0".into() };
        assert_eq!(err.to_string(), "pci00:0d.0: no memory mapped I/O region");
    }

    #[test]
    fn short_region_reports_sizes() {
        let err = DeviceError::RegionTooSmall {
            slot: "00:06.0".into(),
            len: 0x1000,
            needed: 0x1101e,
        };
        assert_eq!(err.to_string(), "pci00:06.0: I/O region of 0x1000 bytes is too small, need 0x1101e");
        assert_eq!(err.errno(), -6);
    }
}
