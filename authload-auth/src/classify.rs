use authload_http::HttpResponse;
use serde_json::Value;

/// Application-level result code fields, checked in order.
const CODE_FIELDS: [&str; 3] = ["resultCode", "code", "status"];

/// Decides whether a response counts as accepted.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseClassifier {
    /// A result code mismatch rejects the response instead of only being logged.
    pub strict: bool,
    /// Log result code mismatches.
    pub debug: bool,
}

impl ResponseClassifier {
    /// Accepted iff the status is 2xx and, in strict mode, the result code matches `expected`.
    /// An empty `expected` disables the code check.
    pub fn accepts(&self, res: &HttpResponse, expected: &str) -> bool {
        if !res.is_success() {
            return false;
        }
        if expected.is_empty() || !(self.strict || self.debug) {
            return true;
        }

        let code = result_code(&res.body);
        if code.as_deref() == Some(expected) {
            return true;
        }
        if self.debug {
            tracing::warn!(
                expected,
                got = code.as_deref().unwrap_or("unknown"),
                status = res.status,
                "unexpected result code"
            );
        }
        !self.strict
    }
}

/// First non-empty of `resultCode`, `code`, `status` in a JSON object body.
pub fn result_code(body: &[u8]) -> Option<String> {
    let v: Value = serde_json::from_slice(body).ok()?;
    CODE_FIELDS.iter().find_map(|field| match v.get(field)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(true) => Some("true".to_string()),
        _ => None,
    })
}
