use crate::error::{GeneratorError, Result};
use crate::Generator;

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

const BASE62_ALPHABET: &[u8; 62] =
    b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Derives ids by hashing the input with 32-bit FNV-1a and encoding the
/// result in base62.
///
/// The hash is laid out little-endian in the high half of a big-endian u64
/// before encoding, which keeps ids compatible with the ones already issued
/// by earlier deployments (`https://yandex.ru` → `9vnMM4Hf4Os`).
#[derive(Debug, Clone, Copy, Default)]
pub struct HashGenerator;

impl HashGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl Generator for HashGenerator {
    fn generate_id(&self, input: &str) -> Result<String> {
        if input.is_empty() {
            return Err(GeneratorError::EmptyInput);
        }

        let hash = fnv1a_32(input.as_bytes());
        let le = hash.to_le_bytes();
        let value = u64::from_be_bytes([le[0], le[1], le[2], le[3], 0, 0, 0, 0]);
        Ok(to_base62(value))
    }
}

fn fnv1a_32(bytes: &[u8]) -> u32 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, &byte| {
        (hash ^ u32::from(byte)).wrapping_mul(FNV_PRIME)
    })
}

fn to_base62(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }

    let mut digits = Vec::with_capacity(11);
    while value > 0 {
        digits.push(BASE62_ALPHABET[(value % 62) as usize]);
        value /= 62;
    }
    digits.reverse();

    // the alphabet is ASCII
    digits.into_iter().map(char::from).collect()
}
