//! Shared test utilities for the NATS worker
//!
//! - `TestNats`: NATS container with JetStream and automatic cleanup
//! - `TestSubjects`: deterministic, per-test subject and stream names
//!
//! # Usage
//!
//! ```rust,no_run
//! use test_utils::{TestNats, TestSubjects};
//!
//! #[tokio::test]
//! #[ignore] // Requires Docker
//! async fn my_nats_test() {
//!     let nats = TestNats::new().await;
//!     let names = TestSubjects::from_test_name("my_nats_test");
//!
//!     let subject = names.subject("tasks");
//!     let client = nats.client();
//! }
//! ```

mod nats;

pub use nats::{StreamExt, TestNats};

/// Builder for subject, stream and consumer names that stay stable for a
/// given test but differ between tests sharing one server.
pub struct TestSubjects {
    seed: u64,
}

impl TestSubjects {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Create from test name (seed is the hash of the name)
    ///
    /// # Example
    ///
    /// ```
    /// use test_utils::TestSubjects;
    ///
    /// let names = TestSubjects::from_test_name("test_standard_reply");
    /// assert!(names.subject("tasks").starts_with("test.tasks."));
    /// ```
    pub fn from_test_name(name: &str) -> Self {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        Self::new(hasher.finish())
    }

    /// Dot-separated subject, e.g. `test.tasks.12345`
    pub fn subject(&self, prefix: &str) -> String {
        format!("test.{}.{}", prefix, self.seed)
    }

    /// Stream names may not contain dots.
    pub fn stream_name(&self, prefix: &str) -> String {
        format!("{}_{}", prefix.to_uppercase(), self.seed)
    }

    pub fn durable_name(&self, prefix: &str) -> String {
        format!("{}-{}", prefix, self.seed)
    }
}
