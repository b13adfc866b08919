use alloy_primitives::FixedBytes;
use safe_arith::SafeArith;

pub type Hash256 = alloy_primitives::B256;

pub trait FixedBytesExtended {
    fn from_low_u64_be(value: u64) -> Self;
    fn from_low_u64_le(value: u64) -> Self;
    fn to_low_u64_le(&self) -> u64;
    fn zero() -> Self;
}

impl<const N: usize> FixedBytesExtended for FixedBytes<N> {
    fn from_low_u64_be(value: u64) -> Self {
        let value_bytes = value.to_be_bytes();
        let mut buffer = [0x0; N];
        let bytes_to_copy = value_bytes.len().min(buffer.len());
        // `bytes_to_copy <= buffer.len()` so neither fallback is ever taken.
        let start_index = buffer.len().safe_sub(bytes_to_copy).unwrap_or(0);
        if let (Some(dst), Some(src)) = (
            buffer.get_mut(start_index..),
            value_bytes.get(value_bytes.len() - bytes_to_copy..),
        ) {
            dst.copy_from_slice(src);
        }
        Self::from(buffer)
    }

    fn from_low_u64_le(value: u64) -> Self {
        let value_bytes = value.to_le_bytes();
        let mut buffer = [0x0; N];
        let bytes_to_copy = value_bytes.len().min(buffer.len());
        if let (Some(dst), Some(src)) = (
            buffer.get_mut(..bytes_to_copy),
            value_bytes.get(..bytes_to_copy),
        ) {
            dst.copy_from_slice(src);
        }
        Self::from(buffer)
    }

    fn zero() -> Self {
        Self::ZERO
    }

    /// Trims FixedBytes<N> to its first 8 bytes and converts to u64
    fn to_low_u64_le(&self) -> u64 {
        let mut result = [0u8; 8];
        let bytes = self.as_slice();
        let len = bytes.len().min(8);
        result[..len].copy_from_slice(&bytes[..len]);
        u64::from_le_bytes(result)
    }
}
