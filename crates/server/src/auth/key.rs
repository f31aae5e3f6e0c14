//! Decoding of the configured RSA public key material.

use jsonwebtoken::DecodingKey;
use thiserror::Error;

/// Delimiter used in place of newlines when the PEM is stored in a
/// single-line environment variable.
pub const NEWLINE_DELIMITER: &str = "||";

/// Errors produced while turning key material into a verification key.
#[derive(Debug, Error)]
pub enum KeyError {
    /// The material is not a PEM-encoded RSA public key.
    #[error("invalid RSA public key: {0}")]
    InvalidRsaPem(#[from] jsonwebtoken::errors::Error),
}

/// Restore the newlines of a PEM document stored with [`NEWLINE_DELIMITER`].
pub fn restore_newlines(material: &str) -> String {
    material.replace(NEWLINE_DELIMITER, "\n")
}

/// Parse delimiter-encoded key material into a [`DecodingKey`].
///
/// Both PKCS#1 (`BEGIN RSA PUBLIC KEY`) and SubjectPublicKeyInfo
/// (`BEGIN PUBLIC KEY`) encodings are accepted.
///
/// # Errors
///
/// Returns [`KeyError::InvalidRsaPem`] if the restored PEM does not contain an
/// RSA public key.
pub fn parse_public_key(material: &str) -> Result<DecodingKey, KeyError> {
    let pem = restore_newlines(material);
    Ok(DecodingKey::from_rsa_pem(pem.as_bytes())?)
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! RSA key pairs used to mint tokens in tests.

    pub const PUBLIC_PEM: &str = include_str!("../../testdata/jwt_rsa_public.pem");
    pub const PRIVATE_PEM: &str = include_str!("../../testdata/jwt_rsa_private.pem");
    pub const OTHER_PRIVATE_PEM: &str = include_str!("../../testdata/other_rsa_private.pem");

    /// The public key flattened the way it is stored in `JWT_PUBLIC_KEY`.
    pub fn public_key_material() -> String {
        PUBLIC_PEM.trim_end().replace('\n', super::NEWLINE_DELIMITER)
    }

    /// Sign `claims` with RS256 using the given PEM private key.
    pub fn mint_with(private_pem: &str, claims: serde_json::Value) -> String {
        let key = jsonwebtoken::EncodingKey::from_rsa_pem(private_pem.as_bytes()).unwrap();
        jsonwebtoken::encode(
            &jsonwebtoken::Header::new(jsonwebtoken::Algorithm::RS256),
            &claims,
            &key,
        )
        .unwrap()
    }

    /// Sign `claims` with the key matching [`PUBLIC_PEM`].
    pub fn mint(claims: serde_json::Value) -> String {
        mint_with(PRIVATE_PEM, claims)
    }

    /// A token for `sub = "user-1"` that expires in an hour.
    pub fn valid_token() -> String {
        let exp = jsonwebtoken::get_current_timestamp() + 3600;
        mint(serde_json::json!({ "sub": "user-1", "exp": exp }))
    }
}
