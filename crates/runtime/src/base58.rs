//! Base58 and Base58Check codecs
//!
//! # API
//!
//! ```text
//! "2NEpo7TZRRrLZSi2U" B58->          # ( STRING -- BYTES )
//! encoded prefix B58C->             # ( STRING BYTES -- BYTES ) payload only
//! bytes ->B58                       # ( BYTES|STRING -- STRING )
//! payload prefix ->B58C             # ( BYTES|STRING BYTES -- STRING )
//! ```
//!
//! Leading `1` symbols map to leading zero bytes and are preserved exactly.
//! Base58Check appends the first 4 bytes of the double SHA-256 of
//! `prefix || payload`.

use sha2::{Digest, Sha256};
use tempo_core::{Operator, Result, ScriptError, Stack, Value};
use thiserror::Error;

const ALPHABET: &[u8; 58] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";
const CHECKSUM_LEN: usize = 4;

/// Reverse lookup table: ASCII code -> digit value (0xFF = not in alphabet)
const DIGITS: [u8; 128] = {
    let mut table = [0xFFu8; 128];
    let mut i = 0;
    while i < ALPHABET.len() {
        table[ALPHABET[i] as usize] = i as u8;
        i += 1;
    }
    table
};

/// Decoding failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Base58Error {
    #[error("Invalid input '{ch}' at position {position}.")]
    InvalidCharacter { ch: char, position: usize },
    #[error("Invalid length.")]
    InvalidLength,
    #[error("Invalid prefix.")]
    InvalidPrefix,
    #[error("Invalid checksum.")]
    InvalidChecksum,
}

fn digit(ch: char) -> Option<u8> {
    let code = ch as u32;
    if code >= 128 {
        return None;
    }
    match DIGITS[code as usize] {
        0xFF => None,
        d => Some(d),
    }
}

/// Decode Base58 text into bytes
///
/// `""` decodes to no bytes and `"1"` to a single zero byte. Positions in
/// errors count characters from the start of the input.
pub fn decode(encoded: &str) -> std::result::Result<Vec<u8>, Base58Error> {
    let zeros = encoded.chars().take_while(|&c| c == '1').count();

    // Little-endian magnitude of the base-58 number, always minimal
    let mut magnitude: Vec<u8> = Vec::with_capacity(encoded.len());
    for (position, ch) in encoded.chars().enumerate().skip(zeros) {
        let mut carry = digit(ch).ok_or(Base58Error::InvalidCharacter { ch, position })? as u32;
        for byte in magnitude.iter_mut() {
            carry += (*byte as u32) * 58;
            *byte = (carry & 0xFF) as u8;
            carry >>= 8;
        }
        while carry > 0 {
            magnitude.push((carry & 0xFF) as u8);
            carry >>= 8;
        }
    }

    let mut decoded = vec![0u8; zeros];
    decoded.extend(magnitude.iter().rev());
    Ok(decoded)
}

/// Encode bytes as Base58 text
pub fn encode(data: &[u8]) -> String {
    let zeros = data.iter().take_while(|&&b| b == 0).count();

    // Little-endian base-58 digits
    let mut digits: Vec<u8> = Vec::with_capacity(data.len() * 138 / 100 + 1);
    for &byte in &data[zeros..] {
        let mut carry = byte as u32;
        for d in digits.iter_mut() {
            carry += (*d as u32) << 8;
            *d = (carry % 58) as u8;
            carry /= 58;
        }
        while carry > 0 {
            digits.push((carry % 58) as u8);
            carry /= 58;
        }
    }

    let mut encoded = String::with_capacity(zeros + digits.len());
    encoded.extend(std::iter::repeat_n('1', zeros));
    encoded.extend(digits.iter().rev().map(|&d| ALPHABET[d as usize] as char));
    encoded
}

fn checksum(data: &[u8]) -> [u8; CHECKSUM_LEN] {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    let mut out = [0u8; CHECKSUM_LEN];
    out.copy_from_slice(&second[..CHECKSUM_LEN]);
    out
}

/// Encode `prefix || payload || checksum` as Base58
pub fn encode_check(prefix: &[u8], payload: &[u8]) -> String {
    let mut data = Vec::with_capacity(prefix.len() + payload.len() + CHECKSUM_LEN);
    data.extend_from_slice(prefix);
    data.extend_from_slice(payload);
    let sum = checksum(&data);
    data.extend_from_slice(&sum);
    encode(&data)
}

/// Decode Base58Check text, verify prefix and checksum, return the payload
pub fn decode_check(encoded: &str, prefix: &[u8]) -> std::result::Result<Vec<u8>, Base58Error> {
    let decoded = decode(encoded)?;

    if decoded.len() < prefix.len() + CHECKSUM_LEN {
        return Err(Base58Error::InvalidLength);
    }
    if !decoded.starts_with(prefix) {
        return Err(Base58Error::InvalidPrefix);
    }

    let (body, trailer) = decoded.split_at(decoded.len() - CHECKSUM_LEN);
    if checksum(body) != trailer {
        return Err(Base58Error::InvalidChecksum);
    }

    Ok(body[prefix.len()..].to_vec())
}

/// Base58 / Base58Check decoder
///
/// Stack effect: ( STRING -- BYTES ) or, with checksum,
/// ( STRING BYTES -- BYTES ) where the byte array on top is the expected prefix.
pub struct B58To {
    name: String,
    check: bool,
}

impl B58To {
    pub fn new(name: impl Into<String>, check: bool) -> Self {
        Self {
            name: name.into(),
            check,
        }
    }
}

impl Operator for B58To {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, stack: &mut Stack) -> Result<()> {
        let arity = if self.check { 2 } else { 1 };
        stack.require(&self.name, arity)?;

        if self.check && !matches!(stack.get(0)?, Value::Bytes(_)) {
            return Err(ScriptError::type_error(
                &self.name,
                "expects a byte array prefix.",
            ));
        }
        let encoded_at = if self.check { 1 } else { 0 };
        if !matches!(stack.get(encoded_at)?, Value::String(_)) {
            return Err(ScriptError::type_error(&self.name, "operates on a STRING."));
        }

        let prefix = if self.check {
            match stack.pop()? {
                Value::Bytes(prefix) => Some(prefix),
                _ => None,
            }
        } else {
            None
        };
        let encoded = match stack.pop()? {
            Value::String(s) => s,
            other => {
                return Err(ScriptError::type_error(
                    &self.name,
                    format!("operates on a STRING, got {}.", other.type_name()),
                ));
            }
        };

        let decoded = match &prefix {
            Some(prefix) => decode_check(&encoded, prefix),
            None => decode(&encoded),
        }
        .map_err(|e| ScriptError::value_error(&self.name, e.to_string()))?;

        stack.push(Value::bytes(decoded));
        Ok(())
    }
}

/// Base58 / Base58Check encoder
///
/// Stack effect: ( BYTES|STRING -- STRING ) or, with checksum,
/// ( BYTES|STRING BYTES -- STRING ) where the byte array on top is the prefix.
pub struct ToB58 {
    name: String,
    check: bool,
}

impl ToB58 {
    pub fn new(name: impl Into<String>, check: bool) -> Self {
        Self {
            name: name.into(),
            check,
        }
    }
}

fn payload_bytes(value: &Value) -> Option<&[u8]> {
    match value {
        Value::Bytes(b) => Some(&b[..]),
        Value::String(s) => Some(s.as_bytes()),
        _ => None,
    }
}

impl Operator for ToB58 {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, stack: &mut Stack) -> Result<()> {
        let arity = if self.check { 2 } else { 1 };
        stack.require(&self.name, arity)?;

        if self.check && !matches!(stack.get(0)?, Value::Bytes(_)) {
            return Err(ScriptError::type_error(
                &self.name,
                "expects a byte array prefix.",
            ));
        }
        let payload_at = if self.check { 1 } else { 0 };
        if payload_bytes(stack.get(payload_at)?).is_none() {
            return Err(ScriptError::type_error(
                &self.name,
                "operates on a byte array or a STRING.",
            ));
        }

        let prefix = if self.check { Some(stack.pop()?) } else { None };
        let payload = stack.pop()?;
        let data = payload_bytes(&payload).unwrap_or_default();

        let encoded = match prefix {
            Some(Value::Bytes(prefix)) => encode_check(&prefix, data),
            _ => encode(data),
        };
        stack.push(Value::from(encoded));
        Ok(())
    }
}
