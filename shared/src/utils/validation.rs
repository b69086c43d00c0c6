use regex::Regex;

// Batas atas amount dalam minor unit (100 miliar paise)
pub const MAX_AMOUNT_MINOR: i64 = 10_000_000_000_000;

// Validate gateway identifier (format: pay_xxx, rfnd_xxx, order_xxx)
pub fn is_valid_gateway_id(id: &str, prefix: &str) -> bool {
    let pattern = format!(r"^{}_[A-Za-z0-9]{{6,32}}$", regex::escape(prefix));
    match Regex::new(&pattern) {
        Ok(re) => re.is_match(id),
        Err(_) => false,
    }
}

// Validate amount dalam minor unit (harus positif, max 100 miliar)
pub fn is_valid_amount(amount_minor: i64) -> bool {
    amount_minor > 0 && amount_minor <= MAX_AMOUNT_MINOR
}

// Normalisasi free-text (trim + whitespace berulang jadi satu spasi)
pub fn normalize_text(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

// Sanitize string untuk prevent XSS
pub fn sanitize_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}
