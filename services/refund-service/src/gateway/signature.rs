use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Generate signature HMAC-SHA256 (hex) untuk payload tertentu
pub fn sign(secret: &str, payload: &[u8]) -> String {
    // HMAC menerima key dengan panjang berapa pun
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time comparison of a hex signature against the expected HMAC.
pub fn verify(secret: &str, payload: &[u8], signature: &str) -> bool {
    let Ok(provided) = hex::decode(signature.trim()) else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(payload);
    mac.verify_slice(&provided).is_ok()
}

/// Verify webhook dari gateway: HMAC atas raw body dengan webhook secret
pub fn verify_webhook_signature(webhook_secret: &str, body: &[u8], signature: &str) -> bool {
    verify(webhook_secret, body, signature)
}

/// Verify payment signature: HMAC atas `order_id|payment_id` dengan key secret
pub fn verify_payment_signature(
    key_secret: &str,
    order_id: &str,
    payment_id: &str,
    signature: &str,
) -> bool {
    let payload = format!("{}|{}", order_id, payment_id);
    verify(key_secret, payload.as_bytes(), signature)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test123secret456";

    #[test]
    fn test_valid_webhook_signature() {
        let body = br#"{"event":"refund.processed"}"#;
        let signature = sign(SECRET, body);
        assert!(verify_webhook_signature(SECRET, body, &signature));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let body = br#"{"event":"refund.processed"}"#;
        let signature = sign("wrong_secret", body);
        assert!(!verify_webhook_signature(SECRET, body, &signature));
    }

    #[test]
    fn test_modified_payload_rejected() {
        let original = br#"{"event":"refund.processed"}"#;
        let modified = br#"{"event":"refund.processed","hacked":true}"#;
        let signature = sign(SECRET, original);
        assert!(!verify_webhook_signature(SECRET, modified, &signature));
    }

    #[test]
    fn test_malformed_signature_rejected() {
        let body = b"{}";
        assert!(!verify_webhook_signature(SECRET, body, "not-hex"));
        assert!(!verify_webhook_signature(SECRET, body, ""));
        assert!(!verify_webhook_signature(SECRET, body, "abcd"));
    }

    #[test]
    fn test_payment_signature() {
        let signature = sign("key_secret", b"order_9A33XWu170gUtm|pay_29QQoUBi66xm2f");
        assert!(verify_payment_signature(
            "key_secret",
            "order_9A33XWu170gUtm",
            "pay_29QQoUBi66xm2f",
            &signature
        ));
        assert!(!verify_payment_signature(
            "key_secret",
            "order_9A33XWu170gUtm",
            "pay_other",
            &signature
        ));
    }

    #[test]
    fn test_known_vector() {
        // RFC 4231 test case 2
        assert_eq!(
            sign("Jefe", b"what do ya want for nothing?"),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }
}
