//! Entry naming: mapping an entity type and key to a storage name.
//!
//! A container stores each value under `folder + "/" + name`, where both
//! parts come from a [`NamingStrategy`]. Keys are rendered through
//! [`AtomicKey`] and checked by [`validate_key_text`] before use.
//!
//! Valid key text:
//! - Must be non-empty
//! - Must not contain control characters or `\`
//! - Must not contain `..`
//! - Must not start or end with `/`

use crate::error::{AtomicError, Result};

/// Maps an entity type and key to a stable folder and name.
///
/// Implementations must be deterministic and injective for a fixed
/// entity/key type pair: two distinct keys never produce the same name.
pub trait NamingStrategy: Send + Sync {
    /// Folder shared by all entries of `entity_type` keyed by `key_type`.
    fn folder(&self, entity_type: &str, key_type: &str) -> String;

    /// Name of one entry inside its folder.
    fn name(&self, entity_type: &str, key: &str) -> String;
}

/// Folder `atomic-<entity>` and name `<key>.<extension>`.
///
/// The entity part is the lowercased short type name with every
/// non-alphanumeric run collapsed to `-`.
#[derive(Clone, Debug)]
pub struct DefaultNamingStrategy {
    extension: String,
}

impl DefaultNamingStrategy {
    pub fn new() -> Self {
        Self::with_extension("bin")
    }

    pub fn with_extension(extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
        }
    }
}

impl Default for DefaultNamingStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl NamingStrategy for DefaultNamingStrategy {
    fn folder(&self, entity_type: &str, _key_type: &str) -> String {
        let mut slug = String::with_capacity(entity_type.len());
        for ch in entity_type.chars() {
            if ch.is_ascii_alphanumeric() {
                slug.push(ch.to_ascii_lowercase());
            } else if !slug.ends_with('-') {
                slug.push('-');
            }
        }
        format!("atomic-{}", slug.trim_matches('-'))
    }

    fn name(&self, _entity_type: &str, key: &str) -> String {
        if self.extension.is_empty() {
            key.to_string()
        } else {
            format!("{key}.{}", self.extension)
        }
    }
}

/// A key that renders to storage text.
///
/// Rendering must be injective: distinct keys produce distinct text.
pub trait AtomicKey {
    fn storage_key(&self) -> String;
}

impl AtomicKey for str {
    fn storage_key(&self) -> String {
        self.to_string()
    }
}

impl AtomicKey for String {
    fn storage_key(&self) -> String {
        self.clone()
    }
}

impl AtomicKey for uuid::Uuid {
    fn storage_key(&self) -> String {
        self.to_string()
    }
}

/// Singleton key: one entry per entity type.
impl AtomicKey for () {
    fn storage_key(&self) -> String {
        "default".into()
    }
}

macro_rules! integer_keys {
    ($($t:ty),*) => {
        $(impl AtomicKey for $t {
            fn storage_key(&self) -> String {
                self.to_string()
            }
        })*
    };
}

integer_keys!(u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize);

/// Short name of `T`: `std::any::type_name` with module paths removed, also
/// inside generic arguments (`a::Foo<b::Bar>` becomes `Foo<Bar>`).
pub fn short_type_name<T: ?Sized>() -> String {
    let full = std::any::type_name::<T>();
    let mut out = String::with_capacity(full.len());
    let mut segment_start = 0;
    let mut chars = full.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == ':' && chars.peek() == Some(&':') {
            chars.next();
            out.truncate(segment_start);
        } else {
            out.push(ch);
            if !(ch.is_alphanumeric() || ch == '_') {
                segment_start = out.len();
            }
        }
    }
    out
}

/// Validate rendered key text, returning `Ok(())` if it can be used as an
/// entry name.
pub fn validate_key_text(key: &str) -> Result<()> {
    let invalid = |reason: &str| AtomicError::InvalidKey {
        key: key.to_string(),
        reason: reason.to_string(),
    };

    if key.is_empty() {
        return Err(invalid("key must not be empty"));
    }
    if key.chars().any(|ch| ch.is_control() || ch == '\\') {
        return Err(invalid("contains a control character or '\\'"));
    }
    if key.contains("..") {
        return Err(invalid("must not contain '..'"));
    }
    if key.starts_with('/') || key.ends_with('/') {
        return Err(invalid("must not start or end with '/'"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    mod outer {
        pub struct Wrapper<T>(pub T);
        pub mod inner {
            pub struct Counter;
        }
    }

    #[test]
    fn short_names_strip_paths() {
        assert_eq!(short_type_name::<outer::inner::Counter>(), "Counter");
        assert_eq!(
            short_type_name::<outer::Wrapper<outer::inner::Counter>>(),
            "Wrapper<Counter>"
        );
        assert_eq!(short_type_name::<u64>(), "u64");
    }

    #[test]
    fn default_folder_is_slugged() {
        let naming = DefaultNamingStrategy::new();
        assert_eq!(naming.folder("Counter", "String"), "atomic-counter");
        assert_eq!(
            naming.folder("Wrapper<Counter>", "u64"),
            "atomic-wrapper-counter"
        );
    }

    #[test]
    fn default_name_appends_extension() {
        assert_eq!(DefaultNamingStrategy::new().name("Counter", "42"), "42.bin");
        assert_eq!(
            DefaultNamingStrategy::with_extension("json").name("Counter", "a"),
            "a.json"
        );
        assert_eq!(DefaultNamingStrategy::with_extension("").name("Counter", "a"), "a");
    }

    #[test]
    fn keys_render_injectively() {
        assert_eq!(42u64.storage_key(), "42");
        assert_eq!((-7i32).storage_key(), "-7");
        assert_eq!("abc".storage_key(), "abc");
        assert_eq!(().storage_key(), "default");
        let id = uuid::Uuid::nil();
        assert_eq!(id.storage_key(), "00000000-0000-0000-0000-000000000000");
    }

    #[test]
    fn valid_keys() {
        for key in ["main", "tenant/42", "a.b", "ünïcode"] {
            assert!(validate_key_text(key).is_ok(), "{key} should be valid");
        }
    }

    #[test]
    fn invalid_keys() {
        for key in ["", "a..b", "/abs", "trailing/", "tab\there", "back\\slash"] {
            let err = validate_key_text(key).unwrap_err();
            assert!(
                matches!(err, AtomicError::InvalidKey { .. }),
                "{key:?} should be rejected, got {err}"
            );
        }
    }
}
