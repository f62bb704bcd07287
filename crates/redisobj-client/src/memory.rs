//! In-memory key-value store for tests, demos and benchmarks.
//!
//! [`InMemoryClient`] keeps every key in a `HashMap` behind a `RwLock`. It
//! models the parts of the store's semantics redisobj depends on: typed values
//! (`WRONGTYPE`), per-key expiry, conditional `SET`, `SET ... GET`, sorted-set
//! ordering and `ZRANGE` index normalization. Time only moves when
//! [`InMemoryClient::advance`] is called, which keeps TTL assertions exact.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;
use std::time::Duration;

use tracing::debug;

use crate::command::{Command, Reply, SetCondition};
use crate::context::Context;
use crate::error::{ClientError, ClientResult};
use crate::traits::KvClient;

type CommandMatcher = Box<dyn Fn(&Command) -> bool + Send + Sync>;

#[derive(Clone, Debug, PartialEq)]
enum Value {
    Str(String),
    Hash(BTreeMap<String, String>),
    SortedSet(BTreeMap<String, f64>),
}

#[derive(Clone, Debug)]
struct Entry {
    value: Value,
    expires_at: Option<Duration>,
}

struct FailureRule {
    matcher: CommandMatcher,
    reason: String,
}

#[derive(Default)]
struct State {
    entries: HashMap<String, Entry>,
    now: Duration,
    log: Vec<Command>,
    log_disabled: bool,
    round_trips: u64,
    failures: Vec<FailureRule>,
    fail_next_round_trip: Option<ClientError>,
}

impl State {
    /// Look up a live entry, dropping it first if it has expired.
    fn live(&mut self, key: &str) -> Option<&mut Entry> {
        let now = self.now;
        let expired = matches!(
            self.entries.get(key),
            Some(Entry { expires_at: Some(at), .. }) if *at <= now
        );
        if expired {
            self.entries.remove(key);
        }
        self.entries.get_mut(key)
    }

    fn purge_expired(&mut self) {
        let now = self.now;
        self.entries
            .retain(|_, e| e.expires_at.map_or(true, |at| at > now));
    }

    fn apply(&mut self, command: &Command) -> ClientResult<Reply> {
        match command {
            Command::Get { key } => match self.live(key) {
                None => Ok(Reply::Nil),
                Some(Entry { value: Value::Str(s), .. }) => Ok(Reply::Bulk(s.clone())),
                Some(_) => Err(wrong_type(key)),
            },

            Command::Set {
                key,
                value,
                expiry,
                condition,
                get,
            } => {
                if *expiry == Some(Duration::ZERO) {
                    return Err(ClientError::InvalidArgument {
                        command: "SET",
                        reason: "invalid expire time".into(),
                    });
                }
                let now = self.now;
                let previous = match self.live(key) {
                    None => None,
                    Some(Entry { value: Value::Str(s), .. }) => Some(s.clone()),
                    Some(_) if *get => return Err(wrong_type(key)),
                    Some(_) => Some(String::new()),
                };
                let exists = previous.is_some();
                let allowed = match condition {
                    SetCondition::Always => true,
                    SetCondition::IfNotExists => !exists,
                    SetCondition::IfExists => exists,
                };
                if allowed {
                    self.entries.insert(
                        key.clone(),
                        Entry {
                            value: Value::Str(value.clone()),
                            expires_at: expiry.map(|ttl| now + ttl),
                        },
                    );
                }
                match (get, allowed) {
                    (true, _) => Ok(previous.map_or(Reply::Nil, Reply::Bulk)),
                    (false, true) => Ok(Reply::Ok),
                    (false, false) => Ok(Reply::Nil),
                }
            }

            Command::HGet { key, field } => match self.live(key) {
                None => Ok(Reply::Nil),
                Some(Entry { value: Value::Hash(h), .. }) => {
                    Ok(h.get(field).cloned().map_or(Reply::Nil, Reply::Bulk))
                }
                Some(_) => Err(wrong_type(key)),
            },

            Command::HSet { key, fields } => {
                if fields.is_empty() {
                    return Err(ClientError::InvalidArgument {
                        command: "HSET",
                        reason: "wrong number of arguments".into(),
                    });
                }
                if self.live(key).is_none() {
                    self.entries.insert(
                        key.clone(),
                        Entry {
                            value: Value::Hash(BTreeMap::new()),
                            expires_at: None,
                        },
                    );
                }
                match self.entries.get_mut(key) {
                    Some(Entry { value: Value::Hash(h), .. }) => {
                        let mut added = 0;
                        for (field, value) in fields {
                            if h.insert(field.clone(), value.clone()).is_none() {
                                added += 1;
                            }
                        }
                        Ok(Reply::Integer(added))
                    }
                    _ => Err(wrong_type(key)),
                }
            }

            Command::HGetAll { key } => match self.live(key) {
                None => Ok(Reply::Map(Vec::new())),
                Some(Entry { value: Value::Hash(h), .. }) => Ok(Reply::Map(
                    h.iter().map(|(f, v)| (f.clone(), v.clone())).collect(),
                )),
                Some(_) => Err(wrong_type(key)),
            },

            Command::ZAdd { key, members } => {
                if members.is_empty() {
                    return Err(ClientError::InvalidArgument {
                        command: "ZADD",
                        reason: "wrong number of arguments".into(),
                    });
                }
                if members.iter().any(|(score, _)| score.is_nan()) {
                    return Err(ClientError::InvalidArgument {
                        command: "ZADD",
                        reason: "score is not a valid float".into(),
                    });
                }
                if self.live(key).is_none() {
                    self.entries.insert(
                        key.clone(),
                        Entry {
                            value: Value::SortedSet(BTreeMap::new()),
                            expires_at: None,
                        },
                    );
                }
                match self.entries.get_mut(key) {
                    Some(Entry { value: Value::SortedSet(z), .. }) => {
                        let mut added = 0;
                        for (score, member) in members {
                            if z.insert(member.clone(), *score).is_none() {
                                added += 1;
                            }
                        }
                        Ok(Reply::Integer(added))
                    }
                    _ => Err(wrong_type(key)),
                }
            }

            Command::ZRange { key, start, stop } => match self.live(key) {
                None => Ok(Reply::Array(Vec::new())),
                Some(Entry { value: Value::SortedSet(z), .. }) => {
                    let mut members: Vec<(&String, &f64)> = z.iter().collect();
                    members.sort_by(|(ma, sa), (mb, sb)| sa.total_cmp(sb).then_with(|| ma.cmp(mb)));
                    let (from, to) = match normalize_range(members.len(), *start, *stop) {
                        Some(range) => range,
                        None => return Ok(Reply::Array(Vec::new())),
                    };
                    Ok(Reply::Array(
                        members[from..=to].iter().map(|(m, _)| (*m).clone()).collect(),
                    ))
                }
                Some(_) => Err(wrong_type(key)),
            },

            Command::Del { keys } => {
                if keys.is_empty() {
                    return Err(ClientError::InvalidArgument {
                        command: "DEL",
                        reason: "wrong number of arguments".into(),
                    });
                }
                let mut removed = 0;
                for key in keys {
                    if self.live(key).is_some() {
                        self.entries.remove(key);
                        removed += 1;
                    }
                }
                Ok(Reply::Integer(removed))
            }

            Command::Expire { key, ttl } => {
                let now = self.now;
                if self.live(key).is_none() {
                    return Ok(Reply::Integer(0));
                }
                if ttl.is_zero() {
                    self.entries.remove(key);
                } else if let Some(entry) = self.entries.get_mut(key) {
                    entry.expires_at = Some(now + *ttl);
                }
                Ok(Reply::Integer(1))
            }

            Command::Persist { key } => match self.live(key) {
                Some(entry) if entry.expires_at.is_some() => {
                    entry.expires_at = None;
                    Ok(Reply::Integer(1))
                }
                _ => Ok(Reply::Integer(0)),
            },

            Command::Ttl { key } => {
                let now = self.now;
                match self.live(key) {
                    None => Ok(Reply::Integer(-2)),
                    Some(Entry { expires_at: None, .. }) => Ok(Reply::Integer(-1)),
                    Some(Entry { expires_at: Some(at), .. }) => {
                        Ok(Reply::Integer((*at - now).as_millis() as i64))
                    }
                }
            }
        }
    }
}

fn wrong_type(key: &str) -> ClientError {
    ClientError::WrongType {
        key: key.to_string(),
    }
}

/// Resolve `ZRANGE` indices (negative counts from the end) to an inclusive
/// range, or `None` when the range is empty.
fn normalize_range(len: usize, start: i64, stop: i64) -> Option<(usize, usize)> {
    let len = len as i64;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if len == 0 || start > stop || start >= len || stop < 0 {
        return None;
    }
    Some((start as usize, stop as usize))
}

/// In-memory, `HashMap`-based key-value store.
///
/// Every [`KvClient::execute`] call counts as one round trip and holds the
/// write lock for the whole pipeline, so pipelines never interleave.
pub struct InMemoryClient {
    state: RwLock<State>,
}

impl InMemoryClient {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::default()),
        }
    }

    /// Move the store clock forward, expiring keys whose TTL has elapsed.
    pub fn advance(&self, by: Duration) {
        let mut state = self.state.write().expect("lock poisoned");
        state.now += by;
        state.purge_expired();
    }

    /// Remove every key. The command log and counters are kept.
    pub fn flush_all(&self) {
        self.state.write().expect("lock poisoned").entries.clear();
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        let mut state = self.state.write().expect("lock poisoned");
        state.purge_expired();
        state.entries.len()
    }

    /// Returns `true` if no live keys exist.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sorted list of live keys.
    pub fn keys(&self) -> Vec<String> {
        let mut state = self.state.write().expect("lock poisoned");
        state.purge_expired();
        let mut keys: Vec<String> = state.entries.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Returns `true` if `key` is live.
    pub fn contains_key(&self, key: &str) -> bool {
        self.state.write().expect("lock poisoned").live(key).is_some()
    }

    /// The string stored at `key`, if `key` holds a string.
    pub fn string(&self, key: &str) -> Option<String> {
        match self.state.write().expect("lock poisoned").live(key) {
            Some(Entry { value: Value::Str(s), .. }) => Some(s.clone()),
            _ => None,
        }
    }

    /// The hash stored at `key`, if `key` holds a hash.
    pub fn hash(&self, key: &str) -> Option<BTreeMap<String, String>> {
        match self.state.write().expect("lock poisoned").live(key) {
            Some(Entry { value: Value::Hash(h), .. }) => Some(h.clone()),
            _ => None,
        }
    }

    /// Members of the sorted set at `key` in score order, if `key` holds one.
    pub fn sorted_set(&self, key: &str) -> Option<Vec<String>> {
        match self.state.write().expect("lock poisoned").live(key) {
            Some(Entry { value: Value::SortedSet(z), .. }) => {
                let mut members: Vec<(&String, &f64)> = z.iter().collect();
                members.sort_by(|(ma, sa), (mb, sb)| sa.total_cmp(sb).then_with(|| ma.cmp(mb)));
                Some(members.into_iter().map(|(m, _)| m.clone()).collect())
            }
            _ => None,
        }
    }

    /// Remaining TTL of `key`; `None` if the key is absent or never expires.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let mut state = self.state.write().expect("lock poisoned");
        let now = state.now;
        state
            .live(key)
            .and_then(|e| e.expires_at)
            .map(|at| at - now)
    }

    /// Stop recording commands. Used by benchmarks, where the log would
    /// grow without bound.
    pub fn disable_log(&self) {
        let mut state = self.state.write().expect("lock poisoned");
        state.log_disabled = true;
        state.log.clear();
    }

    /// Every command executed so far, in execution order.
    pub fn command_log(&self) -> Vec<Command> {
        self.state.read().expect("lock poisoned").log.clone()
    }

    /// Forget the command log.
    pub fn clear_log(&self) {
        self.state.write().expect("lock poisoned").log.clear();
    }

    /// Number of round trips executed so far.
    pub fn round_trips(&self) -> u64 {
        self.state.read().expect("lock poisoned").round_trips
    }

    /// Make every future command matching `matcher` fail with `reason`.
    ///
    /// Matching commands are logged but not applied.
    pub fn fail_commands<F>(&self, matcher: F, reason: impl Into<String>)
    where
        F: Fn(&Command) -> bool + Send + Sync + 'static,
    {
        self.state
            .write()
            .expect("lock poisoned")
            .failures
            .push(FailureRule {
                matcher: Box::new(matcher),
                reason: reason.into(),
            });
    }

    /// Fail the next round trip as a whole with `error`.
    pub fn fail_next_round_trip(&self, error: ClientError) {
        self.state.write().expect("lock poisoned").fail_next_round_trip = Some(error);
    }

    /// Remove all injected failures.
    pub fn clear_failures(&self) {
        let mut state = self.state.write().expect("lock poisoned");
        state.failures.clear();
        state.fail_next_round_trip = None;
    }
}

impl Default for InMemoryClient {
    fn default() -> Self {
        Self::new()
    }
}

impl KvClient for InMemoryClient {
    fn execute(
        &self,
        ctx: &Context,
        commands: &[Command],
    ) -> ClientResult<Vec<ClientResult<Reply>>> {
        ctx.check()?;
        let mut state = self.state.write().expect("lock poisoned");
        if let Some(error) = state.fail_next_round_trip.take() {
            return Err(error);
        }
        state.round_trips += 1;
        debug!(commands = commands.len(), "in-memory round trip");

        let replies = commands
            .iter()
            .map(|command| {
                if !state.log_disabled {
                    state.log.push(command.clone());
                }
                let injected = state
                    .failures
                    .iter()
                    .find(|rule| (rule.matcher)(command))
                    .map(|rule| rule.reason.clone());
                match injected {
                    Some(reason) => Err(ClientError::Command {
                        command: command.name(),
                        reason,
                    }),
                    None => state.apply(command),
                }
            })
            .collect();
        Ok(replies)
    }
}

impl std::fmt::Debug for InMemoryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read().expect("lock poisoned");
        f.debug_struct("InMemoryClient")
            .field("key_count", &state.entries.len())
            .field("round_trips", &state.round_trips)
            .finish()
    }
}
