//! Pure encode/decode functions for every NSM command family (§4.1 Codec library).
//!
//! Each command has an `encode_<cmd>_req`, `decode_<cmd>_req` (test/mockup use),
//! `encode_<cmd>_resp`, `decode_<cmd>_resp` quartet. Functions mutate caller-provided
//! buffers and never allocate; they are reentrant across distinct buffers.

pub mod aggregate;
pub mod diagnostics;
pub mod discovery;
pub mod event;
pub mod firmware;
pub mod network_port;
pub mod pci_link;
pub mod platform_env;

/// A strict `>=` length check used throughout the codec for header-before-variable
/// payload checks, per §4.1 "Length checks are ... >= checks for headers-before-
/// variable-length payloads."
#[inline]
pub(crate) fn require_len(buffer: &[u8], min_len: usize) -> Result<(), crate::NsmCodecError> {
    if buffer.len() < min_len {
        Err(crate::NsmCodecError::Length)
    } else {
        Ok(())
    }
}

/// A strict equality length check for fixed-size responses, per §4.1.
#[inline]
pub(crate) fn require_exact_len(buffer: &[u8], len: usize) -> Result<(), crate::NsmCodecError> {
    if buffer.len() != len {
        Err(crate::NsmCodecError::Length)
    } else {
        Ok(())
    }
}
