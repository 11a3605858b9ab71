//! Test-only utilities for safely mutating process-global state in tests.
//!
//! # Usage
//!
//! ```rust
//! use chatstream_rs::test_support::EnvGuard;
//! use serial_test::serial;
//!
//! #[test]
//! #[serial(env)]
//! fn example() {
//!     let _env = EnvGuard::set("CHATSTREAM_USER_ID", "u1");
//!     // ... test body ...
//! }
//! ```

/// RAII guard for temporarily setting an environment variable.
///
/// The variable is restored to its previous state (or removed if it was not
/// set) when the guard is dropped.
pub struct EnvGuard {
    key: &'static str,
    prev: Option<String>,
}

impl EnvGuard {
    /// Set an environment variable until the guard drops.
    ///
    /// # Safety
    ///
    /// `std::env::set_var` races with concurrent environment access. Callers
    /// serialize through `#[serial(env)]`.
    #[must_use]
    pub fn set(key: &'static str, val: &str) -> Self {
        let prev = std::env::var(key).ok();
        // SAFETY: env-mutating tests run under `#[serial(env)]`.
        unsafe { std::env::set_var(key, val) };
        Self { key, prev }
    }

    /// Remove an environment variable until the guard drops.
    ///
    /// # Safety
    ///
    /// Same constraint as [`EnvGuard::set`].
    #[must_use]
    pub fn remove(key: &'static str) -> Self {
        let prev = std::env::var(key).ok();
        // SAFETY: env-mutating tests run under `#[serial(env)]`.
        unsafe { std::env::remove_var(key) };
        Self { key, prev }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        // SAFETY: the guard lives inside a `#[serial(env)]` test.
        match &self.prev {
            Some(v) => unsafe { std::env::set_var(self.key, v) },
            None => unsafe { std::env::remove_var(self.key) },
        }
    }
}
