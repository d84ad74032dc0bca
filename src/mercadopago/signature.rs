use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Webhook signature policy. Mercado Pago only signs notifications when a
/// webhook secret has been issued for the integration, so a deployment
/// without one runs unauthenticated. That permissive mode is deliberate and
/// carried here as an explicit variant instead of an absent config value.
#[derive(Debug, Clone)]
pub enum VerificationMode {
    /// Accept every webhook without checking `x-signature`.
    Disabled,
    /// Validate `x-signature` against the shared secret.
    Secret(String),
}

impl VerificationMode {
    /// Check an incoming webhook. `Disabled` accepts anything, including
    /// requests with no signature header at all.
    pub fn verify(&self, signature: Option<&str>, request_id: Option<&str>, data_id: &str) -> bool {
        match self {
            VerificationMode::Disabled => true,
            VerificationMode::Secret(secret) => match (signature, request_id) {
                (Some(signature), Some(request_id)) => {
                    validate_signature(signature, request_id, data_id, secret)
                }
                _ => false,
            },
        }
    }

    pub fn is_disabled(&self) -> bool {
        matches!(self, VerificationMode::Disabled)
    }
}

/// Structured form of the `x-signature` header, a comma-separated list of
/// `key=value` pairs of which `ts` and `v1` matter.
#[derive(Debug, PartialEq, Eq)]
pub struct SignatureParts {
    pub timestamp: String,
    pub v1_hash: String,
}

pub fn parse_signature_header(header: &str) -> Option<SignatureParts> {
    let mut timestamp = None;
    let mut v1_hash = None;

    for part in header.split(',') {
        let mut kv = part.splitn(2, '=');
        match (kv.next().map(str::trim), kv.next().map(str::trim)) {
            (Some("ts"), Some(value)) => timestamp = Some(value.to_string()),
            (Some("v1"), Some(value)) => v1_hash = Some(value.to_string()),
            _ => {}
        }
    }

    Some(SignatureParts {
        timestamp: timestamp?,
        v1_hash: v1_hash?,
    })
}

/// Recompute the gateway's manifest HMAC and compare it to the `v1`
/// component of the signature header. Malformed input is reported as
/// invalid, never as an error.
pub fn validate_signature(
    signature_header: &str,
    request_id: &str,
    data_id: &str,
    secret: &str,
) -> bool {
    let Some(parts) = parse_signature_header(signature_header) else {
        return false;
    };

    let manifest = format!(
        "id:{data_id};request-id:{request_id};ts:{ts};",
        ts = parts.timestamp
    );

    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(manifest.as_bytes());
    let expected = hex::encode(mac.finalize().into_bytes());

    constant_time_eq(&expected, &parts.v1_hash)
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test_secret";
    const DATA_ID: &str = "12345";
    const REQUEST_ID: &str = "req-abc";
    const TS: &str = "1704908010";
    // HMAC-SHA256 of "id:12345;request-id:req-abc;ts:1704908010;" keyed by
    // "test_secret".
    const V1: &str = "96ed2008cdb5ea870b7518436b1a3e20ecac9c98607f6246c3b44ee09596dd7b";

    fn header() -> String {
        format!("ts={TS},v1={V1}")
    }

    #[test]
    fn parses_header_into_parts() {
        let parts = parse_signature_header("ts=1704908010,v1=abcdef").unwrap();
        assert_eq!(parts.timestamp, "1704908010");
        assert_eq!(parts.v1_hash, "abcdef");
    }

    #[test]
    fn parses_header_with_spaces_and_extra_keys() {
        let parts = parse_signature_header("a=b, ts=7, v1=deadbeef").unwrap();
        assert_eq!(parts.timestamp, "7");
        assert_eq!(parts.v1_hash, "deadbeef");
    }

    #[test]
    fn rejects_header_missing_components() {
        assert!(parse_signature_header("ts=1704908010").is_none());
        assert!(parse_signature_header("v1=abcdef").is_none());
        assert!(parse_signature_header("").is_none());
    }

    #[test]
    fn accepts_known_good_signature() {
        assert!(validate_signature(&header(), REQUEST_ID, DATA_ID, SECRET));
    }

    #[test]
    fn rejects_tampered_inputs() {
        // Each of the four inputs flipped individually must fail.
        assert!(!validate_signature(&header(), REQUEST_ID, "12346", SECRET));
        assert!(!validate_signature(&header(), "req-xyz", DATA_ID, SECRET));
        assert!(!validate_signature(
            &format!("ts=1704908011,v1={V1}"),
            REQUEST_ID,
            DATA_ID,
            SECRET
        ));
        assert!(!validate_signature(&header(), REQUEST_ID, DATA_ID, "other"));
    }

    #[test]
    fn rejects_garbage_without_panicking() {
        assert!(!validate_signature(";;;,==,ts=", REQUEST_ID, DATA_ID, SECRET));
    }

    #[test]
    fn disabled_mode_accepts_unsigned_requests() {
        let mode = VerificationMode::Disabled;
        assert!(mode.verify(None, None, DATA_ID));
    }

    #[test]
    fn secret_mode_requires_both_headers() {
        let mode = VerificationMode::Secret(SECRET.to_string());
        assert!(mode.verify(Some(&header()), Some(REQUEST_ID), DATA_ID));
        assert!(!mode.verify(None, Some(REQUEST_ID), DATA_ID));
        assert!(!mode.verify(Some(&header()), None, DATA_ID));
    }
}
