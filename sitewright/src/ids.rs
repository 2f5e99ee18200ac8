//! Short opaque identifiers for versions, messages and published sites.

use rapidhash::RapidHasher;
use std::hash::{Hash, Hasher};

const ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Hands out identifiers that never repeat within one generator.
///
/// Each id is the base-36 rendering of a rapidhash over a running counter,
/// the wall clock and a per-generator salt, so ids from different stores
/// are unlikely to collide as well.
#[derive(Debug, Clone)]
pub struct IdGenerator {
    counter: u64,
    salt: u64,
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator {
    pub fn new() -> Self {
        let now = chrono::Utc::now();
        Self::with_salt(now.timestamp_nanos_opt().unwrap_or_else(|| now.timestamp_micros()) as u64)
    }

    /// A generator whose sequence depends only on `salt` and the clock.
    pub fn with_salt(salt: u64) -> Self {
        Self { counter: 0, salt }
    }

    /// Next identifier, exactly `len` characters long.
    pub fn next_id(&mut self, len: usize) -> String {
        let mut out = String::with_capacity(len);
        while out.len() < len {
            self.counter += 1;
            let mut hasher = RapidHasher::default();
            self.salt.hash(&mut hasher);
            self.counter.hash(&mut hasher);
            chrono::Utc::now().timestamp_millis().hash(&mut hasher);
            let remaining = len - out.len();
            push_base36(&mut out, hasher.finish(), remaining);
        }
        out
    }
}

fn push_base36(out: &mut String, mut value: u64, max: usize) {
    // 12 digits carry ~62 bits, close to a full u64
    for _ in 0..max.min(12) {
        out.push(ALPHABET[(value % 36) as usize] as char);
        value /= 36;
    }
}
