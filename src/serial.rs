use std::fmt;

use rand::Rng;

use crate::error::{CaError, Result};

/// A 128-bit certificate serial number.
///
/// Rendered as 32 lowercase hex digits, zero padded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SerialNumber(u128);

impl SerialNumber {
    pub fn new(value: u128) -> Self {
        SerialNumber(value)
    }

    pub fn value(&self) -> u128 {
        self.0
    }

    pub fn to_hex(&self) -> String {
        format!("{:032x}", self.0)
    }

    pub fn from_hex(hex: &str) -> Result<Self> {
        if hex.is_empty() || hex.len() > 32 {
            return Err(CaError::InvalidInput(format!(
                "serial must be 1 to 32 hex digits, got {}",
                hex.len()
            )));
        }
        u128::from_str_radix(hex, 16)
            .map(SerialNumber)
            .map_err(|e| CaError::InvalidInput(format!("serial `{hex}`: {e}")))
    }

    /// Big-endian magnitude without leading zero octets, as carried in DER.
    pub fn to_bytes(&self) -> Vec<u8> {
        let bytes = self.0.to_be_bytes();
        let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len() - 1);
        bytes[first..].to_vec()
    }

    /// Inverse of [`SerialNumber::to_bytes`]. A leading sign octet is tolerated.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
        let magnitude = &bytes[first..];
        if magnitude.len() > 16 {
            return Err(CaError::DecodingError(format!(
                "serial of {} octets does not fit in 128 bits",
                magnitude.len()
            )));
        }
        let mut buf = [0u8; 16];
        buf[16 - magnitude.len()..].copy_from_slice(magnitude);
        Ok(SerialNumber(u128::from_be_bytes(buf)))
    }
}

impl fmt::Display for SerialNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

/// Draws unpredictable serial numbers.
///
/// Uniqueness is probabilistic: each serial is four independent 32-bit draws
/// from the thread-local CSPRNG, and no registry of issued serials is kept.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialNumberGenerator;

impl SerialNumberGenerator {
    pub fn new() -> Self {
        SerialNumberGenerator
    }

    pub fn next_serial(&self) -> SerialNumber {
        let mut rng = rand::rng();
        let value = (0..4).fold(0u128, |acc, _| (acc << 32) | u128::from(rng.random::<u32>()));
        SerialNumber(value)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_serial_is_32_hex_digits() {
        let serial = SerialNumberGenerator::new().next_serial();
        let hex = serial.to_hex();
        assert_eq!(hex.len(), 32);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_small_values_are_zero_padded() {
        assert_eq!(SerialNumber::new(0xab).to_hex(), format!("{}ab", "0".repeat(30)));
        assert_eq!(
            SerialNumber::from_hex("00000000000000000000000000000abc").unwrap(),
            SerialNumber::new(0xabc)
        );
    }

    #[test]
    fn test_ten_thousand_serials_are_distinct() {
        let generator = SerialNumberGenerator::new();
        let serials: HashSet<String> = (0..10_000).map(|_| generator.next_serial().to_hex()).collect();
        assert_eq!(serials.len(), 10_000);
    }

    #[test]
    fn test_der_magnitude_strips_leading_zeros() {
        let serial = SerialNumber::new(0x0000_0001_0203);
        assert_eq!(serial.to_bytes(), vec![0x01, 0x02, 0x03]);
        assert_eq!(SerialNumber::from_bytes(&[0x00, 0x01, 0x02, 0x03]).unwrap(), serial);
        assert_eq!(SerialNumber::new(0).to_bytes(), vec![0]);

        let high = SerialNumber::new(u128::MAX);
        let mut signed = vec![0x00];
        signed.extend(high.to_bytes());
        assert_eq!(SerialNumber::from_bytes(&signed).unwrap(), high);
    }

    #[test]
    fn test_rejects_oversized_input() {
        assert!(SerialNumber::from_hex(&"f".repeat(33)).is_err());
        assert!(SerialNumber::from_hex("xyz").is_err());
        assert!(SerialNumber::from_bytes(&[1u8; 17]).is_err());
    }
}
