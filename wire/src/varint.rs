//! Little-endian base-128 integers.
//!
//! Each byte carries 7 payload bits. The high bit is set on the *last* byte of a sequence and
//! clear on every byte before it, so `0` encodes as the single byte `0x80`.

use crate::error::{Result, WireError};
use crate::stream::{WireRead, WireWrite};

pub const MAX_VARINT_LEN: usize = 10;

const TERMINAL_BIT: u8 = 0x80;
const PAYLOAD_MASK: u8 = 0x7f;

pub fn encode_varint(mut value: u64, buf: &mut Vec<u8>) {
    loop {
        let payload = (value & u64::from(PAYLOAD_MASK)) as u8;
        value >>= 7;
        if value == 0 {
            buf.push(payload | TERMINAL_BIT);
            return;
        }
        buf.push(payload);
    }
}

pub async fn write_varint(out: &mut dyn WireWrite, value: u64) -> Result<()> {
    let mut buf = Vec::with_capacity(MAX_VARINT_LEN);
    encode_varint(value, &mut buf);
    out.write_all(&buf).await
}

pub async fn read_varint(input: &mut dyn WireRead) -> Result<u64> {
    let mut value = 0u64;
    for index in 0..MAX_VARINT_LEN {
        let byte = input.read_u8().await?;
        let payload = u64::from(byte & PAYLOAD_MASK);
        // the tenth byte holds only the top bit of a u64
        if index == MAX_VARINT_LEN - 1 && payload > 1 {
            break;
        }
        value |= payload << (7 * index);
        if byte & TERMINAL_BIT != 0 {
            return Ok(value);
        }
    }
    Err(WireError::NumberOutOfRange {
        target: "a 64-bit varint",
    })
}

pub fn zigzag_encode(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

pub fn zigzag_decode(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}
