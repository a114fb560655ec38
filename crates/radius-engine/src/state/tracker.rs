use super::{SessionConfig, StateError};
use radius_proto::Attribute;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::debug;

pub const TOKEN_LENGTH: usize = 16;

const TRIES_OFFSET: usize = 0;
const SERVER_ID_OFFSET: usize = 3;
const HASH_RANGE: std::ops::Range<usize> = 4..8;

/// What an open exchange carries into its next round.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExchangeContext {
    /// Attributes parked by the previous round
    pub session_state: Vec<Attribute>,
    /// Number of rounds so far
    pub tries: u8,
}

#[derive(Debug)]
struct Entry {
    context: ExchangeContext,
    seq: u64,
    expires: Instant,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<[u8; TOKEN_LENGTH], Entry>,
    /// Insertion order; with a single timeout it is also expiry order
    order: BTreeMap<u64, [u8; TOKEN_LENGTH]>,
    next_seq: u64,
}

impl Inner {
    fn sweep(&mut self, now: Instant) {
        while let Some((&seq, token)) = self.order.first_key_value() {
            let expired = self
                .entries
                .get(token)
                .map_or(true, |entry| entry.expires <= now);
            if !expired {
                break;
            }
            if let Some(token) = self.order.remove(&seq) {
                self.entries.remove(&token);
            }
        }
    }

    fn remove(&mut self, token: &[u8; TOKEN_LENGTH]) -> Option<Entry> {
        let entry = self.entries.remove(token)?;
        self.order.remove(&entry.seq);
        Some(entry)
    }

    fn evict_oldest(&mut self) -> Option<[u8; TOKEN_LENGTH]> {
        let (_, token) = self.order.pop_first()?;
        self.entries.remove(&token);
        Some(token)
    }
}

/// Bounded, expiring map from State token to exchange context.
///
/// One tracker exists per virtual server. All operations take a single
/// lock, never await, and first reap expired entries.
#[derive(Debug)]
pub struct SessionTracker {
    inner: Mutex<Inner>,
    timeout: Duration,
    max: usize,
    server_id: u8,
    server_hash: u32,
}

/// FNV-1a, 32 bit.
fn hash_name(name: &str) -> u32 {
    name.bytes().fold(0x811c_9dc5u32, |hash, byte| {
        (hash ^ byte as u32).wrapping_mul(0x0100_0193)
    })
}

impl SessionTracker {
    pub fn new(config: &SessionConfig, server_name: &str) -> Self {
        SessionTracker {
            inner: Mutex::new(Inner::default()),
            timeout: config.timeout(),
            max: config.max,
            server_id: config.state_server_id,
            server_hash: hash_name(server_name),
        }
    }

    /// Override the session lifetime.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn carries_identity(&self, token: &[u8]) -> bool {
        token.len() >= HASH_RANGE.end
            && token[SERVER_ID_OFFSET] == self.server_id
            && token[HASH_RANGE] == self.server_hash.to_be_bytes()
    }

    /// Turn 16 seed bytes into a token issued by this tracker.
    pub fn stamp(&self, seed: [u8; TOKEN_LENGTH], tries: u8) -> [u8; TOKEN_LENGTH] {
        let mut token = seed;
        token[TRIES_OFFSET] = tries;
        token[SERVER_ID_OFFSET] = self.server_id;
        token[HASH_RANGE].copy_from_slice(&self.server_hash.to_be_bytes());
        token
    }

    /// Park an exchange under `token`, evicting the oldest entries when full.
    pub fn store(&self, token: &[u8], context: ExchangeContext) -> Result<(), StateError> {
        let key: [u8; TOKEN_LENGTH] = token.try_into().map_err(|_| StateError::ForeignToken)?;
        if !self.carries_identity(&key) {
            return Err(StateError::ForeignToken);
        }
        if self.max == 0 {
            return Err(StateError::Full);
        }

        let now = Instant::now();
        let mut inner = self.lock();
        inner.sweep(now);

        if inner.entries.contains_key(&key) {
            return Err(StateError::Duplicate);
        }
        while inner.entries.len() >= self.max {
            let Some(evicted) = inner.evict_oldest() else {
                break;
            };
            debug!(token = ?evicted, "evicted oldest session");
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.order.insert(seq, key);
        inner.entries.insert(
            key,
            Entry {
                context,
                seq,
                expires: now + self.timeout,
            },
        );
        Ok(())
    }

    /// Take the exchange parked under `token`.
    ///
    /// `Ok(None)` when the token is not ours, expired or unknown; an error
    /// only when the token is ours but cannot be valid.
    pub fn resolve(&self, token: &[u8]) -> Result<Option<ExchangeContext>, StateError> {
        if !self.carries_identity(token) {
            return Ok(None);
        }
        let key: [u8; TOKEN_LENGTH] = token
            .try_into()
            .map_err(|_| StateError::Malformed(token.len()))?;

        let mut inner = self.lock();
        inner.sweep(Instant::now());
        Ok(inner.remove(&key).map(|entry| entry.context))
    }

    /// Drop the exchange parked under `token`, if any.
    pub fn discard(&self, token: &[u8]) {
        let Ok(key) = <[u8; TOKEN_LENGTH]>::try_from(token) else {
            return;
        };
        let mut inner = self.lock();
        inner.sweep(Instant::now());
        inner.remove(&key);
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        let mut inner = self.lock();
        inner.sweep(Instant::now());
        inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    fn tracker(max: usize) -> SessionTracker {
        let config = SessionConfig {
            max,
            state_server_id: 7,
            ..Default::default()
        };
        SessionTracker::new(&config, "default")
    }

    fn token(tracker: &SessionTracker, n: u8) -> [u8; TOKEN_LENGTH] {
        tracker.stamp([n; TOKEN_LENGTH], 1)
    }

    fn context(tries: u8) -> ExchangeContext {
        ExchangeContext {
            session_state: vec![Attribute::string(18, "parked").unwrap()],
            tries,
        }
    }

    #[test]
    fn test_stamp_layout() {
        let t = tracker(4);
        let token = t.stamp([0xee; 16], 3);
        assert_eq!(token[0], 3);
        assert_eq!(token[3], 7);
        assert_eq!(&token[4..8], &hash_name("default").to_be_bytes());
        assert_eq!(&token[8..], &[0xee; 8]);
    }

    #[test]
    fn test_store_resolve_consumes() {
        let t = tracker(4);
        let tok = token(&t, 1);
        t.store(&tok, context(1)).unwrap();
        assert_eq!(t.len(), 1);
        assert_eq!(t.resolve(&tok).unwrap(), Some(context(1)));
        assert_eq!(t.resolve(&tok).unwrap(), None);
        assert!(t.is_empty());
    }

    #[test]
    fn test_capacity_evicts_exactly_the_oldest() {
        let t = tracker(3);
        let tokens: Vec<_> = (1..=4).map(|n| token(&t, n)).collect();
        for (i, tok) in tokens.iter().enumerate() {
            t.store(tok, context(i as u8)).unwrap();
        }
        assert_eq!(t.len(), 3);
        assert_eq!(t.resolve(&tokens[0]).unwrap(), None);
        for tok in &tokens[1..] {
            assert!(t.resolve(tok).unwrap().is_some());
        }
    }

    #[test]
    fn test_expired_entries_resolve_to_none() {
        let t = tracker(4).with_timeout(Duration::from_millis(20));
        let tok = token(&t, 1);
        t.store(&tok, context(1)).unwrap();
        sleep(Duration::from_millis(40));
        assert_eq!(t.resolve(&tok).unwrap(), None);
        assert_eq!(t.len(), 0);
    }

    #[test]
    fn test_foreign_and_malformed_tokens() {
        let ours = tracker(4);
        let other = SessionTracker::new(&SessionConfig::default(), "inner-tunnel");

        let theirs = other.stamp([1; 16], 1);
        assert_eq!(ours.resolve(&theirs).unwrap(), None);
        assert_eq!(ours.resolve(b"short").unwrap(), None);
        assert_eq!(ours.store(&theirs, context(1)), Err(StateError::ForeignToken));

        let tok = token(&ours, 2);
        let mut long = tok.to_vec();
        long.push(0);
        assert_eq!(ours.resolve(&long), Err(StateError::Malformed(17)));
        assert_eq!(ours.store(&long, context(1)), Err(StateError::ForeignToken));
    }

    #[test]
    fn test_duplicate_and_zero_capacity() {
        let t = tracker(4);
        let tok = token(&t, 1);
        t.store(&tok, context(1)).unwrap();
        assert_eq!(t.store(&tok, context(2)), Err(StateError::Duplicate));

        let empty = tracker(0);
        let tok = token(&empty, 1);
        assert_eq!(empty.store(&tok, context(1)), Err(StateError::Full));
    }

    #[test]
    fn test_discard() {
        let t = tracker(4);
        let tok = token(&t, 9);
        t.store(&tok, context(1)).unwrap();
        t.discard(b"not a token");
        assert_eq!(t.len(), 1);
        t.discard(&tok);
        assert!(t.is_empty());
    }
}
