//! Aggregate response frame decoder/encoder (§4.1 "Aggregate responses", §6
//! "Aggregate response frame"): header + 1-byte count + N samples of
//! `(tag:u8, len:u8, data:[len])`. Tag 0xFE carries a UUID, 0xFF a little-endian
//! u64 timestamp, all other tags (0..=0xFD) identify a sub-sensor.

use alloc::vec::Vec;

use crate::codec::require_len;
use crate::header::{decode_response_envelope, encode_response_success};
use crate::model::{AggregateSample, AGGREGATE_TAG_TIMESTAMP, AGGREGATE_TAG_UUID};
use crate::InstanceId;
use crate::NsmCodecError;

/// One not-yet-interpreted sample as it appears on the wire, before the
/// UUID/timestamp/sub-sensor tag split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawSample<'a> {
    pub tag: u8,
    pub data: &'a [u8],
}

/// Encodes a success aggregate response: header + envelope + 1-byte count + samples.
pub fn encode_aggregate_resp(
    instance_id: InstanceId,
    nvidia_message_type: u8,
    command: u8,
    samples: &[RawSample<'_>],
    buffer: &mut [u8],
) -> Result<usize, NsmCodecError> {
    let payload_len: usize = 1 + samples.iter().map(|s| 2 + s.data.len()).sum::<usize>();
    let offset =
        encode_response_success(buffer, instance_id, nvidia_message_type, command, payload_len as u16)?;
    require_len(buffer, offset + payload_len)?;
    buffer[offset] = samples.len() as u8;
    let mut cursor = offset + 1;
    for sample in samples {
        buffer[cursor] = sample.tag;
        buffer[cursor + 1] = sample.data.len() as u8;
        cursor += 2;
        buffer[cursor..cursor + sample.data.len()].copy_from_slice(sample.data);
        cursor += sample.data.len();
    }
    Ok(cursor)
}

/// Decodes the raw `(tag, data)` samples from an aggregate response body. Malformed
/// samples (declared length running past the buffer) stop the walk and are reported
/// as `Data`, but every sample decoded before the malformed one is still returned to
/// the caller, per §4.1 "continues past decodable ones".
pub fn decode_aggregate_resp_raw<'a>(
    buffer: &'a [u8],
) -> (Vec<RawSample<'a>>, Option<NsmCodecError>) {
    let mut samples = Vec::new();
    let env = match decode_response_envelope(buffer) {
        Ok(env) => env,
        Err(err) => return (samples, Some(err)),
    };
    if let Some(reason_code) = env.reason_code {
        return (samples, Some(NsmCodecError::CommandFail { reason_code }));
    }
    if buffer.len() <= env.payload_offset {
        return (samples, Some(NsmCodecError::Length));
    }
    let count = buffer[env.payload_offset] as usize;
    let mut cursor = env.payload_offset + 1;
    for _ in 0..count {
        if cursor + 2 > buffer.len() {
            return (samples, Some(NsmCodecError::Data));
        }
        let tag = buffer[cursor];
        let len = buffer[cursor + 1] as usize;
        cursor += 2;
        if cursor + len > buffer.len() {
            return (samples, Some(NsmCodecError::Data));
        }
        samples.push(RawSample {
            tag,
            data: &buffer[cursor..cursor + len],
        });
        cursor += len;
    }
    (samples, None)
}

/// Interprets a raw sample per the tag convention (§6 "Aggregate response frame").
pub fn interpret_sample<'a>(sample: RawSample<'a>) -> Result<AggregateSample<'a>, NsmCodecError> {
    match sample.tag {
        AGGREGATE_TAG_UUID => Ok(AggregateSample::Uuid(sample.data)),
        AGGREGATE_TAG_TIMESTAMP => {
            if sample.data.len() != 8 {
                return Err(NsmCodecError::Data);
            }
            let raw: [u8; 8] = sample.data.try_into()?;
            Ok(AggregateSample::Timestamp(u64::from_le_bytes(raw)))
        }
        tag => Ok(AggregateSample::SubSensor {
            tag,
            data: sample.data,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_round_trip_preserves_order_and_count() {
        let s0 = 46.189f32.to_le_bytes();
        let s1 = (-0.343878f32).to_le_bytes();
        let samples = [
            RawSample { tag: 0, data: &s0 },
            RawSample { tag: 39, data: &s1 },
        ];
        let mut buf = [0u8; 64];
        let n = encode_aggregate_resp(1, 0x03, 0x12, &samples, &mut buf).unwrap();
        let (decoded, err) = decode_aggregate_resp_raw(&buf[..n]);
        assert!(err.is_none());
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].tag, 0);
        assert_eq!(decoded[1].tag, 39);

        let reading0 = match interpret_sample(decoded[0]).unwrap() {
            AggregateSample::SubSensor { data, .. } => f32::from_le_bytes(data.try_into().unwrap()),
            _ => panic!("expected sub-sensor sample"),
        };
        assert!((reading0 - 46.189).abs() < 0.01);
    }

    #[test]
    fn aggregate_decodes_uuid_and_timestamp_tags() {
        let uuid = [0xAAu8; 16];
        let ts = 123_456_789u64.to_le_bytes();
        let samples = [
            RawSample { tag: 0xFE, data: &uuid },
            RawSample { tag: 0xFF, data: &ts },
        ];
        let mut buf = [0u8; 64];
        let n = encode_aggregate_resp(1, 0x03, 0x12, &samples, &mut buf).unwrap();
        let (decoded, err) = decode_aggregate_resp_raw(&buf[..n]);
        assert!(err.is_none());
        assert_eq!(interpret_sample(decoded[0]).unwrap(), AggregateSample::Uuid(&uuid));
        assert_eq!(
            interpret_sample(decoded[1]).unwrap(),
            AggregateSample::Timestamp(123_456_789)
        );
    }

    #[test]
    fn aggregate_reports_malformed_sample_but_keeps_prior_ones() {
        let mut buf = [0u8; 32];
        let s0 = [1u8, 2, 3];
        let samples = [RawSample { tag: 0, data: &s0 }];
        let n = encode_aggregate_resp(1, 0x03, 0x12, &samples, &mut buf).unwrap();
        // Corrupt the sample-count byte to claim a second sample that isn't there.
        let count_offset = n - (2 + s0.len());
        buf[count_offset - 1] = 2;
        let (decoded, err) = decode_aggregate_resp_raw(&buf[..n]);
        assert_eq!(decoded.len(), 1);
        assert_eq!(err, Some(NsmCodecError::Data));
    }
}
