//! A wrapper that keeps merchant credentials out of logs.

use std::{
    fmt,
    fmt::{Debug, Display},
};

/// Holds a sensitive value (a gateway hash key or IV) and redacts it from every `Debug` and `Display` rendering,
/// so a logged configuration struct cannot leak it. The wrapped value is only reachable through
/// [`Secret::reveal`], which keeps uses of the raw credential easy to audit.
#[derive(Clone, Default)]
pub struct Secret<T>
where T: Clone + Default
{
    value: T,
}

impl<T: Clone + Default> Secret<T> {
    pub fn new(value: T) -> Self {
        Self { value }
    }

    /// Access the wrapped credential. Deliberately not a `Deref` impl; call sites must spell it out.
    pub fn reveal(&self) -> &T {
        &self.value
    }
}

impl<T: Clone + Default> From<T> for Secret<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T: Clone + Default> Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("****")
    }
}

impl<T: Clone + Default> Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("****")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn debug_and_display_are_redacted() {
        let key = Secret::new("5294y06JbISpM5x9".to_string());
        assert_eq!(format!("{key}"), "****");
        assert_eq!(format!("{key:?}"), "****");
    }

    #[test]
    fn reveal_returns_the_wrapped_value() {
        let key: Secret<String> = "v77hoKGq4kWxNNIS".to_string().into();
        assert_eq!(key.reveal(), "v77hoKGq4kWxNNIS");
    }

    #[test]
    fn a_struct_holding_a_secret_does_not_leak_it() {
        #[derive(Debug)]
        #[allow(dead_code)]
        struct Config {
            merchant_id: String,
            hash_key: Secret<String>,
        }
        let config = Config { merchant_id: "2000132".to_string(), hash_key: Secret::new("topsecret".to_string()) };
        let rendered = format!("{config:?}");
        assert!(rendered.contains("2000132"));
        assert!(!rendered.contains("topsecret"));
    }
}
