//! Credential hashing and bearer sessions.
//!
//! Password hashes are stored as `pbkdf2:sha256:<iterations>$<salt>$<digest>` with
//! hex-encoded salt and digest, so the iteration count can be raised without
//! invalidating existing accounts.

use chrono::{DateTime, Duration, Utc};
use constant_time_eq::constant_time_eq;
use dashmap::DashMap;
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;
use tokio::task::JoinError;
use uuid::Uuid;

const SCHEME: &str = "pbkdf2:sha256";
const SALT_LEN: usize = 16;
const DIGEST_LEN: usize = 32;

pub const DEFAULT_ITERATIONS: u32 = 600_000;
pub const DEFAULT_SESSION_TTL_SECS: i64 = 24 * 60 * 60;

#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    iterations: u32,
}

impl PasswordHasher {
    pub fn new(iterations: u32) -> Self {
        Self {
            iterations: iterations.max(1),
        }
    }

    pub fn hash(&self, password: &str) -> String {
        let mut salt = [0u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt);
        let digest = derive(password, &salt, self.iterations);
        format!(
            "{SCHEME}:{}${}${}",
            self.iterations,
            hex::encode(salt),
            hex::encode(digest)
        )
    }

    /// Recomputes the digest with the salt and iteration count recorded in `stored`.
    /// Malformed hashes never verify.
    pub fn verify(&self, password: &str, stored: &str) -> bool {
        let Some(rest) = stored
            .strip_prefix(SCHEME)
            .and_then(|r| r.strip_prefix(':'))
        else {
            return false;
        };
        let mut parts = rest.splitn(3, '$');
        let (Some(iterations), Some(salt), Some(expected)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return false;
        };
        let (Ok(iterations), Ok(salt), Ok(expected)) = (
            iterations.parse::<u32>(),
            hex::decode(salt),
            hex::decode(expected),
        ) else {
            return false;
        };
        if iterations == 0 {
            return false;
        }
        let digest = derive(password, &salt, iterations);
        constant_time_eq(&digest, &expected)
    }
}

impl PasswordHasher {
    /// [`hash`](Self::hash) on the blocking pool, off the request task.
    pub async fn hash_blocking(&self, password: &str) -> Result<String, JoinError> {
        let hasher = *self;
        let password = password.to_string();
        tokio::task::spawn_blocking(move || hasher.hash(&password)).await
    }

    /// [`verify`](Self::verify) on the blocking pool, off the request task.
    pub async fn verify_blocking(&self, password: &str, stored: &str) -> Result<bool, JoinError> {
        let hasher = *self;
        let (password, stored) = (password.to_string(), stored.to_string());
        tokio::task::spawn_blocking(move || hasher.verify(&password, &stored)).await
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(DEFAULT_ITERATIONS)
    }
}

fn derive(password: &str, salt: &[u8], iterations: u32) -> [u8; DIGEST_LEN] {
    let mut out = [0u8; DIGEST_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut out);
    out
}

#[derive(Debug, Clone, Copy)]
struct SessionEntry {
    account_id: i32,
    expires_at: DateTime<Utc>,
}

/// In-process registry of logged-in sessions, keyed by an opaque token.
/// Sessions lapse after a fixed lifetime; lapsed ones are dropped on lookup and
/// whenever a new session opens.
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: DashMap<Uuid, SessionEntry>,
    ttl: Duration,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::with_ttl(Duration::seconds(DEFAULT_SESSION_TTL_SECS))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl,
        }
    }

    pub fn open(&self, account_id: i32) -> Uuid {
        self.open_at(account_id, Utc::now())
    }

    fn open_at(&self, account_id: i32, now: DateTime<Utc>) -> Uuid {
        self.sessions.retain(|_, entry| entry.expires_at > now);
        let token = Uuid::new_v4();
        self.sessions.insert(
            token,
            SessionEntry {
                account_id,
                expires_at: now + self.ttl,
            },
        );
        token
    }

    pub fn resolve(&self, token: &Uuid) -> Option<i32> {
        self.resolve_at(token, Utc::now())
    }

    fn resolve_at(&self, token: &Uuid, now: DateTime<Utc>) -> Option<i32> {
        let entry = *self.sessions.get(token)?;
        if entry.expires_at <= now {
            self.sessions.remove(token);
            return None;
        }
        Some(entry.account_id)
    }

    pub fn close(&self, token: &Uuid) -> bool {
        self.sessions.remove(token).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
