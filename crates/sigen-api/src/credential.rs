// Password codec for the Sigenergy login endpoints.
//
// The backend compares the encoded password byte-for-byte, so the
// transform is fixed: AES-128-CBC with a published key/IV, PKCS#7
// padding, standard base64.

use aes::Aes128;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockEncryptMut, KeyIvInit};

type PasswordCipher = cbc::Encryptor<Aes128>;

/// AES key shared with the backend.
const PASSWORD_KEY: &[u8; 16] = b"sigensigensigenp";

/// CBC initialisation vector shared with the backend.
const PASSWORD_IV: &[u8; 16] = b"sigensigensigenp";

/// Encode a plaintext password into the opaque string the login endpoints expect.
///
/// Deterministic: the same input always yields the same output.
pub fn encode_password(plaintext: &str) -> String {
    let ciphertext = PasswordCipher::new(PASSWORD_KEY.into(), PASSWORD_IV.into())
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());
    STANDARD.encode(ciphertext)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn matches_backend_ciphertext() {
        assert_eq!(encode_password("password123"), "D+QWVyAg8eWCTUU0C5w5BQ==");
        assert_eq!(
            encode_password("sixteen-chars-xx"),
            "zN+YJgO9HLcNfKF/zI87FZdkqIP2gVyFNhCPoJ+XAEQ="
        );
    }

    #[test]
    fn empty_input_encodes_one_padding_block() {
        assert_eq!(encode_password(""), "JjDTYVWIc/9ig0AL9GprTQ==");
    }

    #[test]
    fn encoding_is_deterministic() {
        let a = encode_password("hunter2 with spaces ✓");
        let b = encode_password("hunter2 with spaces ✓");
        assert_eq!(a, b);
    }

    #[test]
    fn aligned_input_gains_a_full_padding_block() {
        let decoded = STANDARD.decode(encode_password("sixteen-chars-xx")).unwrap();
        assert_eq!(decoded.len(), 32);
        assert_eq!(STANDARD.decode(encode_password("abc")).unwrap().len(), 16);
    }
}
