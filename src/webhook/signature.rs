//! GitHub `X-Hub-Signature-256` verification

use constant_time_eq::constant_time_eq;
use ring::hmac;
use tracing::debug;

/// Header carrying `sha256=<hex digest>`
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

const SIGNATURE_PREFIX: &str = "sha256=";

/// Check `signature` against HMAC-SHA256(`secret`, `body`)
///
/// Returns false for an empty secret, a missing header, a missing `sha256=`
/// prefix, or a digest that is not valid hex of the right length.
pub fn verify_signature(body: &[u8], signature: Option<&str>, secret: &[u8]) -> bool {
    if secret.is_empty() {
        debug!("Refusing to verify with an empty secret");
        return false;
    }

    let Some(signature) = signature else {
        debug!("Missing signature header");
        return false;
    };

    let Some(provided_hex) = signature.strip_prefix(SIGNATURE_PREFIX) else {
        debug!("Invalid signature format - missing 'sha256=' prefix");
        return false;
    };

    let provided = match hex::decode(provided_hex) {
        Ok(bytes) => bytes,
        Err(_) => {
            debug!("Invalid signature format - failed to decode hex");
            return false;
        }
    };

    let key = hmac::Key::new(hmac::HMAC_SHA256, secret);
    let expected = hmac::sign(&key, body);

    // constant_time_eq returns false on length mismatch without leaking more
    constant_time_eq(expected.as_ref(), &provided)
}

/// Header value GitHub would send for `body`
#[cfg(test)]
pub fn sign(body: &[u8], secret: &[u8]) -> String {
    let key = hmac::Key::new(hmac::HMAC_SHA256, secret);
    let tag = hmac::sign(&key, body);
    format!("{}{}", SIGNATURE_PREFIX, hex::encode(tag.as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"It's a Secret to Everybody";

    #[test]
    fn test_github_reference_vector() {
        // Published in GitHub's webhook validation docs
        let body = b"Hello, World!";
        let signature =
            "sha256=757107ea0eb2509fc211221cce984b8a37570b6d7586c22c46f4379c8b043e17";
        assert_eq!(sign(body, SECRET), signature);
        assert!(verify_signature(body, Some(signature), SECRET));
    }

    #[test]
    fn test_valid_signature() {
        let body = br#"{"ref":"refs/heads/main"}"#;
        let signature = sign(body, SECRET);
        assert_eq!(signature.len(), 71);
        assert!(verify_signature(body, Some(&signature), SECRET));
    }

    #[test]
    fn test_uppercase_hex_is_accepted() {
        let body = b"payload";
        let signature = sign(body, SECRET);
        let upper = format!("sha256={}", signature[7..].to_uppercase());
        assert!(verify_signature(body, Some(&upper), SECRET));
    }

    #[test]
    fn test_any_body_byte_mutation_fails() {
        let body = br#"{"ref":"refs/heads/main","after":"abc"}"#.to_vec();
        let signature = sign(&body, SECRET);

        for i in 0..body.len() {
            let mut mutated = body.clone();
            mutated[i] ^= 0x01;
            assert!(
                !verify_signature(&mutated, Some(&signature), SECRET),
                "mutation at byte {} was accepted",
                i
            );
        }
    }

    #[test]
    fn test_any_signature_char_mutation_fails() {
        let body = b"payload";
        let signature = sign(body, SECRET);

        for i in 7..signature.len() {
            let mut chars: Vec<char> = signature.chars().collect();
            chars[i] = if chars[i] == '0' { '1' } else { '0' };
            let mutated: String = chars.into_iter().collect();
            assert!(!verify_signature(body, Some(&mutated), SECRET));
        }
    }

    #[test]
    fn test_empty_secret_always_fails() {
        let body = b"payload";
        let signature = sign(body, b"");
        assert!(!verify_signature(body, Some(&signature), b""));
    }

    #[test]
    fn test_wrong_secret_fails() {
        let body = b"payload";
        let signature = sign(body, b"another secret");
        assert!(!verify_signature(body, Some(&signature), SECRET));
    }

    #[test]
    fn test_malformed_headers_fail() {
        let body = b"payload";
        let digest = &sign(body, SECRET)[7..];

        assert!(!verify_signature(body, None, SECRET));
        assert!(!verify_signature(body, Some(""), SECRET));
        assert!(!verify_signature(body, Some(digest), SECRET));
        assert!(!verify_signature(body, Some(&format!("sha1={}", digest)), SECRET));
        assert!(!verify_signature(body, Some("sha256=not_valid_hex!@#"), SECRET));
        assert!(!verify_signature(body, Some(&format!("sha256={}", &digest[..62])), SECRET));
        assert!(!verify_signature(body, Some(&format!("sha256={}00", digest)), SECRET));
        assert!(!verify_signature(body, Some("sha256="), SECRET));
    }
}
