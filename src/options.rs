//! Decode/encode options, resource limits, and the predefined presets.
//!
//! Split into two structs rather than one flat bag so a preset can override
//! validation behavior without also having an opinion on resource limits,
//! and vice versa. Same "small composable piece" preference the teacher
//! applies to its newtypes (`AnyUInt`, `PositiveCoin`, `Set<T>`) rather
//! than one monolithic options struct.

use std::fmt;
use std::sync::Arc;

/// Policy applied when a map key is seen more than once during decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DupMapKeyPolicy {
    /// Keep the last value for the key; no error, no warning.
    #[default]
    Allow,
    /// Keep the last value, but notify the configured observer.
    Warn,
    /// Fail decoding at the second occurrence.
    Reject,
}

/// Injected sink for non-fatal duplicate-key notifications.
///
/// Spec note (§9): a process-wide logger is replaced by an explicit
/// collaborator so the decoder holds no global state.
pub trait DuplicateKeyObserver {
    fn warn(&self, offset: usize, path: &str);
}

struct NoopObserver;

impl DuplicateKeyObserver for NoopObserver {
    fn warn(&self, _offset: usize, _path: &str) {}
}

/// Behavioral switches for [`crate::decoder::Decoder`] and
/// [`crate::encoder::Encoder`].
#[derive(Clone)]
pub struct Options {
    pub validate_canonical: bool,
    pub allow_indefinite: bool,
    pub dup_map_key: DupMapKeyPolicy,
    pub validate_utf8_strict: bool,
    pub validate_set_uniqueness: bool,
    pub validate_tag_semantics: bool,
    pub validate_plutus_semantics: bool,
    pub reject_duplicate_keys: bool,
    pub observer: Arc<dyn DuplicateKeyObserver + Send + Sync>,
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("validate_canonical", &self.validate_canonical)
            .field("allow_indefinite", &self.allow_indefinite)
            .field("dup_map_key", &self.dup_map_key)
            .field("validate_utf8_strict", &self.validate_utf8_strict)
            .field("validate_set_uniqueness", &self.validate_set_uniqueness)
            .field("validate_tag_semantics", &self.validate_tag_semantics)
            .field(
                "validate_plutus_semantics",
                &self.validate_plutus_semantics,
            )
            .field("reject_duplicate_keys", &self.reject_duplicate_keys)
            .finish_non_exhaustive()
    }
}

impl Default for Options {
    fn default() -> Self {
        Self {
            validate_canonical: false,
            allow_indefinite: true,
            dup_map_key: DupMapKeyPolicy::Allow,
            // RFC 8949 §2.2 makes well-formed UTF-8 mandatory for a text
            // string regardless of canonical-mode; `permissive()` leaves
            // this on rather than letting `Value::Text` hold non-UTF-8
            // bytes, which would violate the Text payload invariant.
            validate_utf8_strict: true,
            validate_set_uniqueness: false,
            validate_tag_semantics: false,
            validate_plutus_semantics: false,
            reject_duplicate_keys: false,
            observer: Arc::new(NoopObserver),
        }
    }
}

impl Options {
    /// The `strict` preset from spec.md §4.2: canonical form required,
    /// indefinite length forbidden, duplicate keys rejected.
    pub fn strict() -> Self {
        Self {
            validate_canonical: true,
            allow_indefinite: false,
            dup_map_key: DupMapKeyPolicy::Reject,
            validate_utf8_strict: true,
            validate_set_uniqueness: true,
            validate_tag_semantics: true,
            validate_plutus_semantics: true,
            reject_duplicate_keys: true,
            ..Self::default()
        }
    }

    /// `strict` defaults plus mandatory Plutus constructor validation:
    /// the baseline a Cardano-aware caller wants.
    pub fn cardano() -> Self {
        Self {
            validate_plutus_semantics: true,
            ..Self::strict()
        }
    }

    /// All validation disabled except the UTF-8 invariant noted above.
    pub fn permissive() -> Self {
        Self {
            validate_canonical: false,
            allow_indefinite: true,
            dup_map_key: DupMapKeyPolicy::Allow,
            validate_utf8_strict: true,
            validate_set_uniqueness: false,
            validate_tag_semantics: false,
            validate_plutus_semantics: false,
            reject_duplicate_keys: false,
            ..Self::default()
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn DuplicateKeyObserver + Send + Sync>) -> Self {
        self.observer = observer;
        self
    }
}

/// Resource ceilings enforced by the decoder before any unbounded
/// allocation. See spec.md §4.2 "Limits" and §5 "Allocation discipline".
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub max_input_size: usize,
    pub max_output_size: usize,
    pub max_string_length: usize,
    pub max_array_length: usize,
    pub max_map_size: usize,
    pub max_depth: usize,
    pub max_tag_depth: usize,
    pub max_bignum_bytes: usize,
    pub max_parse_time_ms: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_input_size: 64 * 1024 * 1024,
            max_output_size: 64 * 1024 * 1024,
            max_string_length: 16 * 1024 * 1024,
            max_array_length: 4 * 1024 * 1024,
            max_map_size: 4 * 1024 * 1024,
            max_depth: 512,
            max_tag_depth: 512,
            max_bignum_bytes: 4096,
            max_parse_time_ms: 10_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder;
    use std::sync::Mutex;

    #[test]
    fn strict_preset_enables_every_validation_switch() {
        let o = Options::strict();
        assert!(o.validate_canonical);
        assert!(!o.allow_indefinite);
        assert_eq!(o.dup_map_key, DupMapKeyPolicy::Reject);
        assert!(o.validate_utf8_strict);
        assert!(o.validate_set_uniqueness);
        assert!(o.validate_tag_semantics);
        assert!(o.validate_plutus_semantics);
    }

    #[test]
    fn cardano_preset_is_strict_plus_plutus() {
        let o = Options::cardano();
        assert!(o.validate_canonical);
        assert!(o.validate_plutus_semantics);
    }

    #[test]
    fn permissive_preset_disables_validation_but_keeps_utf8() {
        let o = Options::permissive();
        assert!(!o.validate_canonical);
        assert!(o.allow_indefinite);
        assert_eq!(o.dup_map_key, DupMapKeyPolicy::Allow);
        assert!(o.validate_utf8_strict);
        assert!(!o.validate_set_uniqueness);
        assert!(!o.validate_tag_semantics);
        assert!(!o.validate_plutus_semantics);
    }

    struct CollectingObserver {
        warnings: Mutex<Vec<(usize, String)>>,
    }

    impl DuplicateKeyObserver for CollectingObserver {
        fn warn(&self, offset: usize, path: &str) {
            self.warnings.lock().unwrap().push((offset, path.to_string()));
        }
    }

    #[test]
    fn warn_policy_reports_duplicates_through_injected_observer_not_a_global_logger() {
        let observer = std::sync::Arc::new(CollectingObserver {
            warnings: Mutex::new(Vec::new()),
        });
        let options = Options {
            dup_map_key: DupMapKeyPolicy::Warn,
            ..Options::default()
        }
        .with_observer(observer.clone());

        let bytes = hex::decode("a2616101616102").unwrap();
        let (value, _) = decoder::parse(&bytes, &options, &Limits::default()).unwrap();
        match value {
            crate::value::Value::Map(m) => assert_eq!(m.all_entries.len(), 2),
            other => panic!("unexpected {other:?}"),
        }

        let seen = observer.warnings.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, 4);
    }
}
