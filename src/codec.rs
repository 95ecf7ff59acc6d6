//! Token envelope codec.
//!
//! Every data request to the portal carries its JSON arguments in the `t3`
//! query parameter as an envelope:
//!
//! JSON bytes → AES-128-CBC (PKCS#7) → base64 → percent-encoding
//!
//! The JSON is compact and ASCII-only: non-ASCII characters go out as
//! `\uXXXX` escapes, matching what the portal's own pages send.
//!
//! The key and IV are fixed by the portal; they are compiled in and never
//! read from configuration.

use std::io;

use aes::Aes128;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use serde::Serialize;
use serde_json::Value;
use serde_json::ser::Formatter;
use thiserror::Error;

/// Query parameter name carrying the envelope
pub const TOKEN_PARAM: &str = "t3";

/// AES block size in bytes
pub const BLOCK_SIZE: usize = 16;

/// Portal key (`preimpresoCorrec`)
const KEY: [u8; 16] = *b"preimpresoCorrec";

/// Portal IV (`PParsetime17s2w3`)
const IV: [u8; 16] = *b"PParsetime17s2w3";

/// Characters left unescaped in a query value: alphanumerics, `-._~` and `/`
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'.').remove(b'_').remove(b'~').remove(b'/');

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;

/// Errors raised while decoding an envelope
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed percent-encoding: {0}")]
    PercentEncoding(String),

    #[error("malformed base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("ciphertext length {0} is not a positive multiple of {BLOCK_SIZE}")]
    BlockLength(usize),

    #[error("invalid padding after decryption")]
    Padding,

    #[error("decrypted payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Encode a JSON document into an envelope ready for a query string
pub fn encode(value: &Value) -> Result<String, CodecError> {
    Ok(seal(&to_ascii_json(value)?))
}

/// Encode raw JSON text into an envelope
///
/// The text is encrypted as-is, so callers control the exact bytes sent.
pub fn encode_str(json: &str) -> String {
    seal(json.as_bytes())
}

fn seal(plaintext: &[u8]) -> String {
    let ciphertext = Aes128CbcEnc::new(&KEY.into(), &IV.into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext);
    let b64 = STANDARD.encode(ciphertext);
    utf8_percent_encode(&b64, QUERY_VALUE).to_string()
}

/// Compact JSON with every non-ASCII character escaped
fn to_ascii_json(value: &Value) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::new();
    value.serialize(&mut serde_json::Serializer::with_formatter(&mut out, AsciiFormatter))?;
    Ok(out)
}

/// Compact formatter writing non-ASCII as lower-case `\uXXXX` UTF-16 units
struct AsciiFormatter;

impl Formatter for AsciiFormatter {
    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let mut units = [0u16; 2];
        for ch in fragment.chars() {
            if ch.is_ascii() {
                writer.write_all(&[ch as u8])?;
            } else {
                for unit in ch.encode_utf16(&mut units) {
                    write!(writer, "\\u{:04x}", unit)?;
                }
            }
        }
        Ok(())
    }
}

/// Decode an envelope back into its JSON document
pub fn decode(envelope: &str) -> Result<Value, CodecError> {
    let plaintext = decrypt(envelope)?;
    Ok(serde_json::from_slice(&plaintext)?)
}

/// Build the `t3=<envelope>` query fragment for a JSON document
pub fn token_query(value: &Value) -> Result<String, CodecError> {
    Ok(format!("{}={}", TOKEN_PARAM, encode(value)?))
}

fn decrypt(envelope: &str) -> Result<Vec<u8>, CodecError> {
    check_percent_escapes(envelope)?;
    let b64 = percent_decode_str(envelope)
        .decode_utf8()
        .map_err(|e| CodecError::PercentEncoding(e.to_string()))?;

    let ciphertext = STANDARD.decode(b64.as_bytes())?;
    if ciphertext.is_empty() || ciphertext.len() % BLOCK_SIZE != 0 {
        return Err(CodecError::BlockLength(ciphertext.len()));
    }

    Aes128CbcDec::new(&KEY.into(), &IV.into())
        .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
        .map_err(|_| CodecError::Padding)
}

/// `percent_decode_str` passes stray `%` through untouched; reject them instead.
fn check_percent_escapes(envelope: &str) -> Result<(), CodecError> {
    let bytes = envelope.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let valid = bytes.len() > i + 2 && bytes[i + 1].is_ascii_hexdigit() && bytes[i + 2].is_ascii_hexdigit();
            if !valid {
                return Err(CodecError::PercentEncoding(format!("bad escape at offset {}", i)));
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // Envelopes captured from the portal's own token format.
    const EMPTY_OBJECT_ENVELOPE: &str = "YPsVrj/0QvTY9O%2BPMQ9EFA%3D%3D";
    const RECOVER_ENVELOPE: &str = "OzAuPOuuEv30UTSr7Amx1ggIUbU13j0oIY8K0inO4bP%2BOclKATsY9wtSipmfJY4%2B";
    const TALON_ENVELOPE: &str = "6TGWm6%2Br9JafMo4iNXTOwGBYKhGOcnufMs1Y05EVG6fJKuwBF72l%2BpRt04sNZ9o0";

    #[test]
    fn test_protocol_constants() {
        assert_eq!(&KEY, b"preimpresoCorrec");
        assert_eq!(&IV, b"PParsetime17s2w3");
        assert_eq!(TOKEN_PARAM, "t3");
    }

    #[test]
    fn test_encode_empty_object_matches_fixture() {
        assert_eq!(encode(&json!({})).unwrap(), EMPTY_OBJECT_ENVELOPE);
    }

    #[test]
    fn test_decode_empty_object_fixture() {
        assert_eq!(decode(EMPTY_OBJECT_ENVELOPE).unwrap(), json!({}));
    }

    #[test]
    fn test_fixture_preserves_key_order() {
        let value = json!({"ruc": "4567890", "categoria": "EDICION"});
        assert_eq!(encode(&value).unwrap(), RECOVER_ENVELOPE);
        assert_eq!(decode(RECOVER_ENVELOPE).unwrap(), value);
    }

    #[test]
    fn test_fixture_with_numbers() {
        let value = json!({"periodo": 202409, "formulario": 241});
        assert_eq!(encode(&value).unwrap(), TALON_ENVELOPE);
        assert_eq!(decode(TALON_ENVELOPE).unwrap(), value);
    }

    #[test]
    fn test_roundtrip_nested_document() {
        let value = json!({
            "ruc": "80000000",
            "dv": "1",
            "periodo": "202409",
            "fechaDiferida": null,
            "captura": {"domicilioDepartamento": 1, "nombre": "Peña Ñandutí"},
            "lista": [1, 2.5, true, "x"]
        });
        let envelope = encode(&value).unwrap();
        assert_eq!(decode(&envelope).unwrap(), value);
    }

    #[test]
    fn test_non_ascii_is_escaped_before_encryption() {
        let value = json!({"nombre": "PEÑA", "clave": "𝄞"});
        let plaintext = decrypt(&encode(&value).unwrap()).unwrap();
        assert_eq!(
            String::from_utf8(plaintext).unwrap(),
            r#"{"nombre":"PE\u00d1A","clave":"\ud834\udd1e"}"#
        );
        assert_eq!(
            encode(&value).unwrap(),
            encode_str(r#"{"nombre":"PE\u00d1A","clave":"\ud834\udd1e"}"#)
        );
    }

    #[test]
    fn test_escaping_keeps_json_escapes() {
        let value = json!({"texto": "línea \"uno\"\n"});
        let plaintext = decrypt(&encode(&value).unwrap()).unwrap();
        assert_eq!(
            String::from_utf8(plaintext).unwrap(),
            r#"{"texto":"l\u00ednea \"uno\"\n"}"#
        );
    }

    #[test]
    fn test_envelope_is_query_safe() {
        let envelope = encode(&json!({"ruc": "80000000", "categoria": "PORCENTAJES_ACTIVIDAD"})).unwrap();
        assert!(!envelope.contains('+'));
        assert!(!envelope.contains('='));
        assert!(!envelope.contains('&'));
    }

    #[test]
    fn test_decode_accepts_unescaped_base64() {
        assert_eq!(decode("YPsVrj/0QvTY9O+PMQ9EFA==").unwrap(), json!({}));
    }

    #[test]
    fn test_token_query() {
        assert_eq!(token_query(&json!({})).unwrap(), format!("t3={}", EMPTY_OBJECT_ENVELOPE));
    }

    #[test]
    fn test_decode_rejects_bad_percent_escape() {
        assert!(matches!(decode("YPsVrj%2"), Err(CodecError::PercentEncoding(_))));
        assert!(matches!(decode("%ZZabc"), Err(CodecError::PercentEncoding(_))));
    }

    #[test]
    fn test_decode_rejects_bad_base64() {
        assert!(matches!(decode("not*base64"), Err(CodecError::Base64(_))));
    }

    #[test]
    fn test_decode_rejects_partial_block() {
        // 8 bytes of ciphertext
        assert!(matches!(decode("AAAAAAAAAAA%3D"), Err(CodecError::BlockLength(8))));
        assert!(matches!(decode(""), Err(CodecError::BlockLength(0))));
    }

    #[test]
    fn test_decode_rejects_bad_padding() {
        // A zero block decrypts to a final byte of 0x1f, which is not valid PKCS#7
        let zero_block = STANDARD.encode([0u8; 16]);
        assert!(matches!(decode(&zero_block), Err(CodecError::Padding)));
    }

    #[test]
    fn test_decode_rejects_non_json_plaintext() {
        let envelope = encode_str("not json at all");
        assert!(matches!(decode(&envelope), Err(CodecError::Json(_))));
    }
}
