use aes::cipher::{generic_array::GenericArray, BlockEncrypt, KeyInit};
use aes::Aes256;
use cfb8::cipher::{AsyncStreamCipher as Cfb8StreamCipher, KeyIvInit};
use cfb8::Decryptor as Cfb8Decryptor;
use std::io::{self, Cursor, Read, Seek};

/// PSARC TOC key, AES-256 CFB-8 (1-byte feedback), zero IV.
pub const PSARC_KEY: [u8; 32] = [
    0xC5, 0x3D, 0xB2, 0x38, 0x70, 0xA1, 0xA2, 0xF7, 0x1C, 0xAE, 0x64, 0x06, 0x1F, 0xDD, 0x0E, 0x11,
    0x57, 0x30, 0x9D, 0xC8, 0x52, 0x04, 0xD4, 0xC5, 0xBF, 0xDF, 0x25, 0x09, 0x0D, 0xF2, 0x57, 0x2C,
];

/// For PSARC decryption, the IV is all zero.
pub const PSARC_IV: [u8; 16] = [0; 16];

/// SNG platform keys, AES-256 counter-stepped CFB-128.
pub const SNG_PC_KEY: [u8; 32] = [
    0xCB, 0x64, 0x8D, 0xF3, 0xD1, 0x2A, 0x16, 0xBF, 0x71, 0x70, 0x14, 0x14, 0xE6, 0x96, 0x19, 0xEC,
    0x17, 0x1C, 0xCA, 0x5D, 0x2A, 0x14, 0x2E, 0x3E, 0x59, 0xDE, 0x7A, 0xDD, 0xA1, 0x8A, 0x3A, 0x30,
];

pub const SNG_MAC_KEY: [u8; 32] = [
    0x98, 0x21, 0x33, 0x0E, 0x34, 0xB9, 0x1F, 0x70, 0xD0, 0xA4, 0x8C, 0xBD, 0x62, 0x59, 0x93, 0x12,
    0x69, 0x70, 0xCE, 0xA0, 0x91, 0x92, 0xC0, 0xE6, 0xCD, 0xA6, 0x76, 0xCC, 0x98, 0x38, 0x28, 0x9D,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SngPlatform {
    Pc,
    Mac,
}

impl SngPlatform {
    fn key(self) -> &'static [u8; 32] {
        match self {
            SngPlatform::Pc => &SNG_PC_KEY,
            SngPlatform::Mac => &SNG_MAC_KEY,
        }
    }
}

/// A DecryptStream holding decrypted data in memory, read back via a `Cursor`.
pub struct DecryptStream {
    pub reader: Cursor<Vec<u8>>,
}

impl DecryptStream {
    /// Creates a new DecryptStream for PSARC TOC mode: AES-256 CFB-8 (one byte
    /// of feedback per step), zero IV, fixed key.
    ///
    /// * `input` - the input stream, positioned at the start of the encrypted TOC
    /// * `length` - the number of encrypted bytes to read
    pub fn new_psarc<R: Read + Seek>(mut input: R, length: usize) -> io::Result<Self> {
        let mut data = vec![0u8; length];
        input.read_exact(&mut data)?;

        let key = GenericArray::from_slice(&PSARC_KEY);
        let iv = GenericArray::from_slice(&PSARC_IV);
        let cipher = Cfb8Decryptor::<Aes256>::new(key, iv);
        cipher.decrypt(&mut data);

        Ok(DecryptStream {
            reader: Cursor::new(data),
        })
    }

    /// Creates a new DecryptStream for SNG mode: the non-standard
    /// counter-stepped CFB-128 of the SNG envelope.
    pub fn new_sng<R: Read>(mut input: R, iv: [u8; 16], platform: SngPlatform) -> io::Result<Self> {
        let mut payload = Vec::new();
        input.read_to_end(&mut payload)?;
        decrypt_sng_counter_cfb(&mut payload, iv, platform);
        Ok(DecryptStream {
            reader: Cursor::new(payload),
        })
    }
}

/// Each 16-byte block is XORed with `AES_ECB(iv_k)` under the platform key;
/// `iv_{k+1}` is `iv_k` treated as a big-endian 128-bit integer plus one. This
/// is not RustCrypto's `cfb-mode` (which chains the *ciphertext* block through
/// the cipher) nor CTR (which splits the block into a fixed nonce and a
/// narrow incrementing counter) — it increments the whole 128-bit IV and
/// re-encrypts it fresh for every block. Encryption and decryption are the
/// same operation since both only ever XOR against a keystream.
pub fn decrypt_sng_counter_cfb(data: &mut [u8], iv: [u8; 16], platform: SngPlatform) {
    let key = GenericArray::from_slice(platform.key());
    let cipher = Aes256::new(key);
    let mut counter = iv;

    for chunk in data.chunks_mut(16) {
        let mut keystream = GenericArray::clone_from_slice(&counter);
        cipher.encrypt_block(&mut keystream);
        for (b, k) in chunk.iter_mut().zip(keystream.iter()) {
            *b ^= k;
        }
        increment_be(&mut counter);
    }
}

fn increment_be(counter: &mut [u8; 16]) {
    for byte in counter.iter_mut().rev() {
        *byte = byte.wrapping_add(1);
        if *byte != 0 {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sng_round_trip() {
        let iv = [0u8; 16];
        let mut data = b"a quick brown fox jumps over a lazy dog, over and over".to_vec();
        let original = data.clone();
        decrypt_sng_counter_cfb(&mut data, iv, SngPlatform::Pc);
        assert_ne!(data, original);
        decrypt_sng_counter_cfb(&mut data, iv, SngPlatform::Pc);
        assert_eq!(data, original);
    }

    #[test]
    fn counter_steps_by_one_per_block() {
        let mut counter = [0u8; 16];
        for _ in 0..300 {
            increment_be(&mut counter);
        }
        let expected = 300u128.to_be_bytes();
        assert_eq!(counter, expected);
    }

    #[test]
    fn counter_carries_across_byte_boundary() {
        let mut counter = [0u8; 16];
        counter[15] = 0xFF;
        increment_be(&mut counter);
        assert_eq!(counter[15], 0);
        assert_eq!(counter[14], 1);
    }

    #[test]
    fn psarc_toc_decryption_matches_known_vector() {
        // The known plaintext "PSARC TOC test vector" (zero-padded to 16 bytes),
        // encrypted with the spec's PSARC key and a zero IV under CFB-8.
        let plain = b"PSARC TOC test \x00";
        let key = GenericArray::from_slice(&PSARC_KEY);
        let iv = GenericArray::from_slice(&PSARC_IV);
        let mut buf = plain.to_vec();
        {
            let cipher = cfb8::Encryptor::<Aes256>::new(key, iv);
            cfb8::cipher::AsyncStreamCipher::encrypt(cipher, &mut buf);
        }
        let mut stream = DecryptStream::new_psarc(Cursor::new(buf), 16).unwrap();
        let mut out = Vec::new();
        stream.reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, plain);
    }
}
