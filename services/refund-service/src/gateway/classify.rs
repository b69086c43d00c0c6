// Klasifikasi error gateway ke taxonomy internal.
//
// Gateway tidak menjamin teks error stabil, jadi matching berbasis pola dan
// best-effort. Apa pun yang tidak dikenali jatuh ke `Unknown`.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum GatewayErrorKind {
    StalePayment,
    InsufficientBalance,
    InvalidAmount,
    TestModeRestricted,
    Unknown,
}

impl GatewayErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GatewayErrorKind::StalePayment => "stale-payment",
            GatewayErrorKind::InsufficientBalance => "insufficient-balance",
            GatewayErrorKind::InvalidAmount => "invalid-amount",
            GatewayErrorKind::TestModeRestricted => "test-mode-restricted",
            GatewayErrorKind::Unknown => "unknown",
        }
    }

    /// Actionable message for callers; raw gateway text is never exposed.
    pub fn user_message(&self) -> &'static str {
        match self {
            GatewayErrorKind::StalePayment => {
                "This payment is too old to be refunded through the payment gateway. Process the refund manually."
            }
            GatewayErrorKind::InsufficientBalance => {
                "The merchant account balance is too low to cover this refund. Top up the gateway balance and retry."
            }
            GatewayErrorKind::InvalidAmount => {
                "The payment gateway rejected the refund amount. Check it against the payment's refundable balance."
            }
            GatewayErrorKind::TestModeRestricted => {
                "Refunds are not supported in test mode for payments made with a real bank instrument."
            }
            GatewayErrorKind::Unknown => "The payment gateway rejected the refund request.",
        }
    }
}

impl std::fmt::Display for GatewayErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

lazy_static! {
    // Urutan penting: pola yang lebih spesifik dicek lebih dulu
    static ref RULES: Vec<(GatewayErrorKind, Regex)> = vec![
        (
            GatewayErrorKind::TestModeRestricted,
            Regex::new(r"(?i)test[\s_-]?mode|sandbox|real (bank|payment)|not (supported|allowed) (for|in) test")
                .expect("valid regex"),
        ),
        (
            GatewayErrorKind::StalePayment,
            Regex::new(r"(?i)older than \w+ (months?|days)|(more|beyond) (than )?\w+ (months?|days)|refund window|too old|expired for refund")
                .expect("valid regex"),
        ),
        (
            GatewayErrorKind::InsufficientBalance,
            Regex::new(r"(?i)insufficient[\s_](balance|funds)|(not|n't) have (enough|sufficient) balance|low balance")
                .expect("valid regex"),
        ),
        (
            GatewayErrorKind::InvalidAmount,
            Regex::new(r"(?i)invalid[\s_]amount|amount.{0,40}(greater|less|more|exceeds?|invalid|minimum|maximum|at ?least)|(minimum|maximum) (refund )?amount")
                .expect("valid regex"),
        ),
    ];

    static ref NOT_FOUND: Regex =
        Regex::new(r"(?i)does not exist|not found|no such|invalid (payment|refund) id").expect("valid regex");
}

/// Classify a gateway error from its code and description.
pub fn classify(code: &str, description: &str) -> GatewayErrorKind {
    let haystack = format!("{} {}", code, description);

    RULES
        .iter()
        .find(|(_, pattern)| pattern.is_match(&haystack))
        .map(|(kind, _)| *kind)
        .unwrap_or(GatewayErrorKind::Unknown)
}

/// Gateway melaporkan id yang tidak ada sebagai BAD_REQUEST, bukan 404
pub fn is_not_found(description: &str) -> bool {
    NOT_FOUND.is_match(description)
}
