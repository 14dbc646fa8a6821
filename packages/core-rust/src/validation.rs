//! Field validation rules for inventory objects.
//!
//! Rules are hard caps. A [`Validator`] collects every violation of a payload
//! so the caller receives one error listing all failing rules, not just the
//! first one.

use std::sync::LazyLock;

use regex::Regex;

use crate::types::Extensions;

pub const MAX_NAME_CHARS: usize = 255;
pub const MAX_DESCRIPTION_CHARS: usize = 1000;
pub const MAX_GLOBAL_ASSET_ID_CHARS: usize = 256;
pub const MAX_EXTENSION_KEYS: usize = 100;
pub const MAX_EXTENSION_KEY_CHARS: usize = 256;
pub const MAX_EXTENSION_VALUE_BYTES: usize = 4096;
pub const MAX_EXTENSIONS_TOTAL_BYTES: usize = 50_000;
pub const MAX_ID_CHARS: usize = 256;
const MAX_DNS_LABEL_CHARS: usize = 63;

/// `urn:<nid>:<nss>`; nid is 2-32 alphanumerics or hyphens, not leading with a hyphen.
static URN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?i:urn):[A-Za-z0-9][A-Za-z0-9-]{1,31}:.+$").expect("static URN pattern")
});

static DNS_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").expect("static DNS label pattern")
});

/// Result of validating a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    /// The payload satisfies every rule.
    Valid,
    /// The payload violates one or more rules.
    Invalid {
        /// Human-readable descriptions of each violation, in check order.
        errors: Vec<String>,
    },
}

impl ValidationResult {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

/// Accumulates rule violations across all fields of a payload.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<String>,
}

impl Validator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an arbitrary violation.
    pub fn reject(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    /// Requires `value` to be present and non-blank.
    pub fn require(&mut self, field: &str, value: Option<&str>) {
        if value.is_none_or(|v| v.trim().is_empty()) {
            self.reject(format!("{field} is required"));
        }
    }

    /// Caps `value` at `max` characters (not bytes).
    pub fn max_chars(&mut self, field: &str, value: &str, max: usize) {
        let len = value.chars().count();
        if len > max {
            self.reject(format!("{field} must not exceed {max} characters (got {len})"));
        }
    }

    /// Checks a global asset id: URN syntax and length.
    pub fn global_asset_id(&mut self, value: &str) {
        self.max_chars("globalAssetId", value, MAX_GLOBAL_ASSET_ID_CHARS);
        if !is_valid_urn(value) {
            self.reject("globalAssetId must be a URN of the form urn:<nid>:<nss>");
        }
    }

    /// Applies the key count, key length, per-value and total size caps.
    ///
    /// Value sizes are measured on the JSON encoding; the total counts key
    /// bytes plus encoded value bytes.
    pub fn extensions(&mut self, extensions: &Extensions) {
        if extensions.len() > MAX_EXTENSION_KEYS {
            self.reject(format!(
                "extensions must not exceed {MAX_EXTENSION_KEYS} keys (got {})",
                extensions.len()
            ));
        }

        let mut total = 0usize;
        for (key, value) in extensions {
            if key.chars().count() > MAX_EXTENSION_KEY_CHARS {
                self.reject(format!(
                    "extension key '{}...' exceeds {MAX_EXTENSION_KEY_CHARS} characters",
                    key.chars().take(32).collect::<String>()
                ));
            }
            let encoded = serde_json::to_vec(value).map_or(usize::MAX, |b| b.len());
            if encoded > MAX_EXTENSION_VALUE_BYTES {
                self.reject(format!(
                    "extension value for key '{key}' exceeds {MAX_EXTENSION_VALUE_BYTES} bytes"
                ));
            }
            total = total.saturating_add(key.len()).saturating_add(encoded);
        }

        if total > MAX_EXTENSIONS_TOTAL_BYTES {
            self.reject(format!(
                "extensions total size must not exceed {MAX_EXTENSIONS_TOTAL_BYTES} bytes (got {total})"
            ));
        }
    }

    /// Checks a client-supplied identifier: 1-256 characters of
    /// `[A-Za-z0-9._:-]`, not made of dots alone.
    pub fn identifier(&mut self, field: &str, value: &str) {
        let safe = value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | ':' | '-'));
        if value.is_empty()
            || value.chars().count() > MAX_ID_CHARS
            || !safe
            || value.chars().all(|c| c == '.')
        {
            self.reject(format!(
                "{field} must be 1-{MAX_ID_CHARS} characters of [A-Za-z0-9._:-]"
            ));
        }
    }

    /// Checks a Kubernetes-style DNS-1123 label (namespaces).
    pub fn dns_label(&mut self, field: &str, value: &str) {
        if value.len() > MAX_DNS_LABEL_CHARS || !DNS_LABEL.is_match(value) {
            self.reject(format!(
                "{field} must be a lowercase DNS label of at most {MAX_DNS_LABEL_CHARS} characters"
            ));
        }
    }

    #[must_use]
    pub fn finish(self) -> ValidationResult {
        if self.errors.is_empty() {
            ValidationResult::Valid
        } else {
            ValidationResult::Invalid {
                errors: self.errors,
            }
        }
    }
}

/// Returns `true` if `value` is a syntactically valid URN.
#[must_use]
pub fn is_valid_urn(value: &str) -> bool {
    URN.is_match(value)
}

/// Reduces attacker-controlled text to a safe id fragment.
///
/// Spaces and slashes become hyphens, every other character outside
/// `[A-Za-z0-9_-]` is dropped, and the result is lower-cased.
#[must_use]
pub fn sanitize_id_component(raw: &str) -> String {
    raw.chars()
        .filter_map(|c| match c {
            ' ' | '/' => Some('-'),
            c if c.is_ascii_alphanumeric() || c == '_' || c == '-' => Some(c.to_ascii_lowercase()),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde_json::json;

    use super::*;

    fn errors_of(v: Validator) -> Vec<String> {
        match v.finish() {
            ValidationResult::Valid => Vec::new(),
            ValidationResult::Invalid { errors } => errors,
        }
    }

    fn small_extensions(n: usize) -> Extensions {
        (0..n).map(|i| (format!("key-{i}"), json!(i))).collect()
    }

    #[test]
    fn urn_examples() {
        assert!(is_valid_urn("urn:o-ran:resource:node-001"));
        assert!(is_valid_urn("URN:isbn:0451450523"));
        assert!(!is_valid_urn("invalid-not-urn"));
        assert!(!is_valid_urn("urn:-bad:thing"));
        assert!(!is_valid_urn("urn:x:thing"));
        assert!(!is_valid_urn("urn:o-ran:"));
        assert!(!is_valid_urn(&format!("urn:{}:nss", "a".repeat(33))));
    }

    #[test]
    fn global_asset_id_rejects_non_urn() {
        let mut v = Validator::new();
        v.global_asset_id("invalid-not-urn");
        let errors = errors_of(v);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("URN"));
    }

    #[test]
    fn exactly_max_extension_keys_is_valid() {
        let mut v = Validator::new();
        v.extensions(&small_extensions(100));
        assert!(v.finish().is_valid());
    }

    #[test]
    fn too_many_extension_keys_is_rejected() {
        let mut v = Validator::new();
        v.extensions(&small_extensions(101));
        let errors = errors_of(v);
        assert!(errors.iter().any(|e| e.contains("must not exceed 100 keys")));
    }

    #[test]
    fn oversized_extension_value_is_rejected() {
        let mut ext = Extensions::new();
        ext.insert("blob".into(), json!("x".repeat(4100)));
        let mut v = Validator::new();
        v.extensions(&ext);
        let errors = errors_of(v);
        assert!(errors.iter().any(|e| e.contains("exceeds 4096 bytes")));
    }

    #[test]
    fn total_extension_size_is_capped() {
        let ext: Extensions = (0..26)
            .map(|i| (format!("k{i}"), json!("y".repeat(2000))))
            .collect();
        let mut v = Validator::new();
        v.extensions(&ext);
        let errors = errors_of(v);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("total size"));
    }

    #[test]
    fn long_extension_key_is_rejected() {
        let mut ext = Extensions::new();
        ext.insert("k".repeat(257), json!(1));
        let mut v = Validator::new();
        v.extensions(&ext);
        assert!(errors_of(v)[0].contains("exceeds 256 characters"));
    }

    #[test]
    fn violations_aggregate() {
        let mut v = Validator::new();
        v.require("resourceTypeId", None);
        v.require("resourcePoolId", Some("  "));
        v.max_chars("description", &"d".repeat(1001), MAX_DESCRIPTION_CHARS);
        v.global_asset_id("nope");
        assert_eq!(errors_of(v).len(), 4);
    }

    #[test]
    fn identifiers() {
        for ok in ["node-001", "urn:x:1", "a.b_c"] {
            let mut v = Validator::new();
            v.identifier("resourceId", ok);
            assert!(v.finish().is_valid(), "{ok} should be accepted");
        }
        for bad in ["", "..", "a/b", "a b", "x%2f"] {
            let mut v = Validator::new();
            v.identifier("resourceId", bad);
            assert!(!v.finish().is_valid(), "{bad} should be rejected");
        }
    }

    #[test]
    fn dns_labels() {
        let mut ok = Validator::new();
        ok.dns_label("namespace", "ran-workloads");
        assert!(ok.finish().is_valid());

        for bad in ["Ran", "-lead", "trail-", "under_score", ""] {
            let mut v = Validator::new();
            v.dns_label("namespace", bad);
            assert!(!v.finish().is_valid(), "{bad} should be rejected");
        }
    }

    #[test]
    fn sanitize_maps_separators_and_strips_the_rest() {
        assert_eq!(sanitize_id_component("Compute Node/Gen2"), "compute-node-gen2");
        assert_eq!(sanitize_id_component("../../etc/passwd"), "--etc-passwd");
        assert_eq!(sanitize_id_component("x;rm -rf"), "xrm--rf");
        assert_eq!(sanitize_id_component("%00"), "00");
    }

    proptest! {
        #[test]
        fn sanitized_ids_use_safe_alphabet(raw in ".{0,64}") {
            let out = sanitize_id_component(&raw);
            prop_assert!(out
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-'));
        }
    }
}
