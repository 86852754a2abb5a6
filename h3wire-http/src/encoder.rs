//! HTTP/3 frame serialization.
//!
//! DATA and HEADERS are written as headers only; the caller sends the
//! payload after them. Every other frame is written whole.

use bytes::{Bytes, BytesMut};
use h3wire_buf::{varint, ByteWriter, Error, Result};

use crate::frame::{
    CancelPushFrame, FrameType, GoAwayFrame, MaxPushIdFrame, PriorityUpdateFrame, SettingsFrame,
};

/// Serializes HTTP/3 frames.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpEncoder;

impl HttpEncoder {
    /// Type and length of a DATA frame with `payload_length` bytes of
    /// payload.
    pub fn serialize_data_frame_header(payload_length: u64) -> Result<Bytes> {
        serialize_frame_header(FrameType::DATA, payload_length)
    }

    pub fn serialize_headers_frame_header(payload_length: u64) -> Result<Bytes> {
        serialize_frame_header(FrameType::HEADERS, payload_length)
    }

    pub fn serialize_settings_frame(frame: &SettingsFrame) -> Result<Bytes> {
        let mut payload_length = 0;
        for (&id, &value) in &frame.values {
            payload_length += checked_len(id)? + checked_len(value)?;
        }

        serialize_frame(FrameType::SETTINGS, payload_length, |writer| {
            for (&id, &value) in &frame.values {
                writer.write_var_int62(id)?;
                writer.write_var_int62(value)?;
            }
            Ok(())
        })
    }

    pub fn serialize_goaway_frame(frame: &GoAwayFrame) -> Result<Bytes> {
        serialize_single_varint_frame(FrameType::GOAWAY, frame.id)
    }

    pub fn serialize_max_push_id_frame(frame: &MaxPushIdFrame) -> Result<Bytes> {
        serialize_single_varint_frame(FrameType::MAX_PUSH_ID, frame.push_id)
    }

    pub fn serialize_cancel_push_frame(frame: &CancelPushFrame) -> Result<Bytes> {
        serialize_single_varint_frame(FrameType::CANCEL_PUSH, frame.push_id)
    }

    /// Type, length and push id of a PUSH_PROMISE frame whose encoded
    /// field section of `field_section_length` bytes follows.
    pub fn serialize_push_promise_frame_with_only_push_id(
        push_id: u64,
        field_section_length: u64,
    ) -> Result<Bytes> {
        let push_id_length = checked_len(push_id)?;
        let payload_length = (push_id_length as u64)
            .checked_add(field_section_length)
            .ok_or(Error::VarIntOutOfRange(u64::MAX))?;

        let header_length = varint::encoded_len(FrameType::PUSH_PROMISE)
            + checked_len(payload_length)?
            + push_id_length;
        let mut buf = BytesMut::zeroed(header_length);
        let mut writer = ByteWriter::new(&mut buf);
        writer.write_var_int62(FrameType::PUSH_PROMISE)?;
        writer.write_var_int62(payload_length)?;
        writer.write_var_int62(push_id)?;
        Ok(buf.freeze())
    }

    pub fn serialize_priority_update_frame(frame: &PriorityUpdateFrame) -> Result<Bytes> {
        let value = frame.priority_field_value.as_bytes();
        let payload_length = 1 + checked_len(frame.prioritized_element_id)? + value.len();

        serialize_frame(FrameType::PRIORITY_UPDATE, payload_length, |writer| {
            writer.write_u8(frame.prioritized_element_type as u8)?;
            writer.write_var_int62(frame.prioritized_element_id)?;
            writer.write_bytes(value)
        })
    }
}

fn checked_len(value: u64) -> Result<usize> {
    match varint::encoded_len(value) {
        0 => Err(Error::VarIntOutOfRange(value)),
        len => Ok(len),
    }
}

fn serialize_frame_header(frame_type: u64, payload_length: u64) -> Result<Bytes> {
    let mut buf = BytesMut::zeroed(checked_len(frame_type)? + checked_len(payload_length)?);
    let mut writer = ByteWriter::new(&mut buf);
    writer.write_var_int62(frame_type)?;
    writer.write_var_int62(payload_length)?;
    Ok(buf.freeze())
}

/// Writes a complete frame whose payload `write_payload` fills with
/// exactly `payload_length` bytes.
fn serialize_frame<F>(frame_type: u64, payload_length: usize, write_payload: F) -> Result<Bytes>
where
    F: FnOnce(&mut ByteWriter<'_>) -> Result<()>,
{
    let length = payload_length as u64;
    let total = checked_len(frame_type)? + checked_len(length)? + payload_length;
    let mut buf = BytesMut::zeroed(total);
    let mut writer = ByteWriter::new(&mut buf);
    writer.write_var_int62(frame_type)?;
    writer.write_var_int62(length)?;
    write_payload(&mut writer)?;
    debug_assert_eq!(writer.remaining(), 0);
    Ok(buf.freeze())
}

fn serialize_single_varint_frame(frame_type: u64, value: u64) -> Result<Bytes> {
    serialize_frame(frame_type, checked_len(value)?, |writer| {
        writer.write_var_int62(value)
    })
}
