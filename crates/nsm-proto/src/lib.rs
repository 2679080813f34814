//! Pure NSM wire-format types and codec (§1 "nsm-proto is a pure codec crate,
//! no I/O, no allocation beyond what callers provide").
//!
//! Built `no_std` by default so it can be reused by embedded ERoT-side tooling;
//! the `std` feature only turns on `std::error::Error` impls.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod codec;
pub mod error;
pub mod header;
pub mod model;
pub mod types;

pub use error::NsmCodecError;
pub use header::{
    decode_response_envelope, encode_request_header, encode_response_failure,
    encode_response_success, NsmHeader, ResponseEnvelope, HEADER_LEN, REASON_CODE_LEN,
    RESPONSE_ENVELOPE_LEN,
};
pub use types::*;
