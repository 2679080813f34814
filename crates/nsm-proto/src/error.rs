//! Codec-level failure modes (§4.1 "Failure modes", §7 Taxonomy: codec-level).

use core::fmt;

use crate::types::InvalidEnumValueError;

/// Errors a codec function can return. These are not translated into rich errors
/// here; upper layers (transport/device manager) map them, per spec §4.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NsmCodecError {
    /// A required buffer or pointer-equivalent slice was empty where data was expected.
    Null,
    /// The PDU is shorter than the minimum length for its type.
    Length,
    /// The declared data-size field is too small for the payload actually present,
    /// or a value read from the payload does not fit its declared width.
    Data,
    /// The response carried a non-success completion code; `reason_code` is the
    /// 2-byte LE reason code that followed it.
    CommandFail { reason_code: u16 },
}

impl fmt::Display for NsmCodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NsmCodecError::Null => write!(f, "null buffer or pointer"),
            NsmCodecError::Length => write!(f, "PDU shorter than minimum length"),
            NsmCodecError::Data => write!(f, "declared data size too small or malformed field"),
            NsmCodecError::CommandFail { reason_code } => {
                write!(f, "command failed, reason code {:#06x}", reason_code)
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for NsmCodecError {}

impl From<InvalidEnumValueError> for NsmCodecError {
    fn from(_: InvalidEnumValueError) -> Self {
        NsmCodecError::Data
    }
}

impl From<core::array::TryFromSliceError> for NsmCodecError {
    fn from(_: core::array::TryFromSliceError) -> Self {
        NsmCodecError::Length
    }
}
