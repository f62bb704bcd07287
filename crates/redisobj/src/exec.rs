//! Batch emission and reply resolution.
//!
//! A write walks the plan tree and queues every command on one pipeline. A
//! read does the same, but pairs each queued command with a
//! [`ResultConsumer`] that knows how to apply that command's reply to the
//! destination object. Commands and consumers are only ever appended
//! together, so the Nth reply always reaches the Nth consumer.

use std::sync::Arc;
use std::time::Duration;

use redisobj_client::{ClientError, ClientResult, Command, Pipeline, Reply};
use redisobj_codec::CodecResult;
use tracing::trace;

use crate::digest::ContentHasher;
use crate::error::{Error, Result};
use crate::gate::{FreshnessGate, GateMode};
use crate::key::{self, Placement};
use crate::plan::RecordPlan;
use crate::record::Record;

type ApplyScalar<R> = Box<dyn FnOnce(&mut R, &str) -> CodecResult<()> + Send>;
type ApplyList<R> = Box<dyn FnOnce(&mut R, Vec<String>) -> CodecResult<()> + Send>;
type ApplyMap<R> = Box<dyn FnOnce(&mut R, Vec<(String, String)>) -> CodecResult<()> + Send>;

/// Applies one reply to a destination object of type `R`.
pub enum ResultConsumer<R> {
    /// Consumes an `HGET` reply.
    Scalar {
        key: String,
        field: &'static str,
        identity: bool,
        apply: ApplyScalar<R>,
    },
    /// Consumes a `ZRANGE` reply.
    List {
        key: String,
        field: &'static str,
        apply: ApplyList<R>,
    },
    /// Consumes an `HGETALL` reply.
    Map {
        key: String,
        field: &'static str,
        apply: ApplyMap<R>,
    },
}

/// Outcome of applying one reply.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Consumed {
    Applied,
    /// An identity field came back empty.
    Missing { key: String },
}

impl<R: 'static> ResultConsumer<R> {
    /// Name of the command whose reply this consumer expects.
    pub fn expects(&self) -> &'static str {
        match self {
            Self::Scalar { .. } => "HGET",
            Self::List { .. } => "ZRANGE",
            Self::Map { .. } => "HGETALL",
        }
    }

    /// Key of the command this consumer belongs to.
    pub fn key(&self) -> &str {
        match self {
            Self::Scalar { key, .. } | Self::List { key, .. } | Self::Map { key, .. } => key,
        }
    }

    /// Re-target the consumer at the parent object that owns this one.
    pub fn lift<P: 'static>(self, get_mut: fn(&mut P) -> &mut R) -> ResultConsumer<P> {
        match self {
            Self::Scalar {
                key,
                field,
                identity,
                apply,
            } => ResultConsumer::Scalar {
                key,
                field,
                identity,
                apply: Box::new(move |parent: &mut P, wire: &str| apply(get_mut(parent), wire)),
            },
            Self::List { key, field, apply } => ResultConsumer::List {
                key,
                field,
                apply: Box::new(move |parent: &mut P, items: Vec<String>| {
                    apply(get_mut(parent), items)
                }),
            },
            Self::Map { key, field, apply } => ResultConsumer::Map {
                key,
                field,
                apply: Box::new(move |parent: &mut P, entries: Vec<(String, String)>| {
                    apply(get_mut(parent), entries)
                }),
            },
        }
    }

    /// Apply `reply` to `target`.
    ///
    /// A missing field decodes as the empty string (the field's zero value),
    /// except for identity fields, which are left untouched and reported as
    /// [`Consumed::Missing`]. A reply of the wrong shape is an error.
    pub(crate) fn consume(self, target: &mut R, reply: Reply) -> Result<Consumed> {
        let expects = self.expects();
        match (self, reply) {
            (Self::Scalar { identity: true, key, .. }, Reply::Nil) => Ok(Consumed::Missing { key }),
            (Self::Scalar { key, field, apply, .. }, Reply::Nil) => {
                apply(target, "").map_err(|e| Error::field_type(&key, field, e))?;
                Ok(Consumed::Applied)
            }
            (Self::Scalar { key, field, apply, .. }, Reply::Bulk(wire)) => {
                apply(target, &wire).map_err(|e| Error::field_type(&key, field, e))?;
                Ok(Consumed::Applied)
            }
            (Self::List { key, field, apply }, Reply::Array(items)) => {
                apply(target, items).map_err(|e| Error::field_type(&key, field, e))?;
                Ok(Consumed::Applied)
            }
            (Self::Map { key, field, apply }, Reply::Map(entries)) => {
                apply(target, entries).map_err(|e| Error::field_type(&key, field, e))?;
                Ok(Consumed::Applied)
            }
            (consumer, reply) => Err(Error::RedisCommand(ClientError::Protocol(format!(
                "{expects} at {} received a {} reply",
                consumer.key(),
                reply.shape()
            )))),
        }
    }
}

/// Commands paired one-to-one with the consumers of their replies.
pub struct Emission<R> {
    commands: Vec<Command>,
    consumers: Vec<ResultConsumer<R>>,
}

impl<R: 'static> Emission<R> {
    pub fn new() -> Self {
        Self {
            commands: Vec::new(),
            consumers: Vec::new(),
        }
    }

    /// Append a command and the consumer of its reply.
    pub fn push(&mut self, command: Command, consumer: ResultConsumer<R>) {
        self.commands.push(command);
        self.consumers.push(consumer);
    }

    /// Append another emission for the same object.
    pub fn append(&mut self, other: Emission<R>) {
        self.commands.extend(other.commands);
        self.consumers.extend(other.consumers);
    }

    /// Re-target every consumer at the parent object.
    pub fn lift<P: 'static>(self, get_mut: fn(&mut P) -> &mut R) -> Emission<P> {
        Emission {
            commands: self.commands,
            consumers: self
                .consumers
                .into_iter()
                .map(|c| c.lift(get_mut))
                .collect(),
        }
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub(crate) fn into_parts(self) -> (Vec<Command>, Vec<ResultConsumer<R>>) {
        (self.commands, self.consumers)
    }
}

impl<R: 'static> Default for Emission<R> {
    fn default() -> Self {
        Self::new()
    }
}

/// State shared by one write call across the whole plan tree.
pub(crate) struct WriteBatch<'a> {
    pub(crate) root_prefix: &'a str,
    pub(crate) ttl: Option<Duration>,
    pub(crate) gate: &'a dyn FreshnessGate,
    pub(crate) hasher: &'a ContentHasher,
    pub(crate) pipeline: Pipeline,
    /// Freshness keys published by the gate during this call.
    pub(crate) published: Vec<String>,
    pub(crate) boundaries: usize,
    pub(crate) fresh: usize,
}

impl<'a> WriteBatch<'a> {
    pub(crate) fn new(
        root_prefix: &'a str,
        ttl: Option<Duration>,
        gate: &'a dyn FreshnessGate,
        hasher: &'a ContentHasher,
    ) -> Self {
        Self {
            root_prefix,
            ttl,
            gate,
            hasher,
            pipeline: Pipeline::new(),
            published: Vec::new(),
            boundaries: 0,
            fresh: 0,
        }
    }

    fn queue(&mut self, command: Command) {
        self.pipeline.queue(command);
    }

    /// Expire a freshly written key with the write's TTL, if any.
    fn expire(&mut self, key: &str) {
        if let Some(ttl) = self.ttl {
            self.queue(Command::expire(key, ttl));
        }
    }

    /// Align an existing key's expiry with the write's TTL. Without a TTL,
    /// clear any expiry left by an earlier write.
    fn refresh(&mut self, key: &str) {
        match self.ttl {
            Some(ttl) => self.queue(Command::expire(key, ttl)),
            None => self.queue(Command::persist(key)),
        }
    }
}

/// State shared by one read call across the whole plan tree.
pub(crate) struct ReadBatch<'a> {
    pub(crate) root_prefix: &'a str,
    pub(crate) gate: &'a dyn FreshnessGate,
    pub(crate) hasher: &'a ContentHasher,
    pub(crate) boundaries: usize,
    pub(crate) fresh: usize,
}

impl<'a> ReadBatch<'a> {
    pub(crate) fn new(
        root_prefix: &'a str,
        gate: &'a dyn FreshnessGate,
        hasher: &'a ContentHasher,
    ) -> Self {
        Self {
            root_prefix,
            gate,
            hasher,
            boundaries: 0,
            fresh: 0,
        }
    }
}

fn gate_check<R: Record>(
    plan: &RecordPlan<R>,
    obj: &R,
    key: &str,
    gate: &dyn FreshnessGate,
    hasher: &ContentHasher,
    mode: GateMode,
) -> Result<bool> {
    if !gate.is_enabled() {
        return Ok(false);
    }
    let digest = hasher
        .digest(plan, obj)
        .map_err(|e| Error::cache(key, e))?;
    gate.check(key, &digest, mode)
}

/// Queue the writes for `obj` and everything nested in it.
///
/// Per record: `DEL` of the record key, then the children, then one `HSET`
/// per scalar, then a `DEL` plus `ZADD`/`HSET` per list and map field. A
/// record whose digest is current skips its own field writes and only
/// re-aligns expiries.
pub(crate) fn write_record<R: Record>(
    plan: &RecordPlan<R>,
    obj: &R,
    placement: Placement<'_>,
    inherited_fresh: bool,
    batch: &mut WriteBatch<'_>,
) -> Result<()> {
    let key = key::record_key(plan, obj, placement, batch.root_prefix);
    let boundary = placement.is_boundary(plan.is_keyed());

    let fresh = if boundary {
        batch.boundaries += 1;
        let mode = GateMode::Write { ttl: batch.ttl };
        let fresh = gate_check(plan, obj, &key, batch.gate, batch.hasher, mode)?;
        if batch.gate.is_enabled() {
            batch.published.push(key::freshness_key(&key));
        }
        if fresh {
            batch.fresh += 1;
        }
        fresh
    } else {
        inherited_fresh
    };

    if fresh {
        trace!(key = %key, "record is current, skipping field writes");
    } else {
        let mut stale = vec![key.clone()];
        if boundary && !batch.gate.is_enabled() {
            stale.push(key::freshness_key(&key));
        }
        batch.queue(Command::Del { keys: stale });
    }

    for child in plan.nested_fields() {
        child.plan.write(obj, &key, fresh, batch)?;
    }

    if fresh {
        refresh_expiry(plan, &key, batch);
        return Ok(());
    }

    for field in plan.scalar_fields() {
        let value = field
            .encode(obj)
            .map_err(|e| Error::field_type(&key, field.name(), e))?;
        batch.queue(Command::hset(&key, field.name(), value));
    }
    if !plan.scalar_fields().is_empty() {
        batch.expire(&key);
    }

    for field in plan.list_fields() {
        let leaf = key::leaf_key(&key, field.name());
        let items = field
            .encode(obj)
            .map_err(|e| Error::field_type(&key, field.name(), e))?;
        batch.queue(Command::del(&leaf));
        if items.is_empty() {
            continue;
        }
        let members = items
            .into_iter()
            .enumerate()
            .map(|(index, item)| (index as f64, item))
            .collect();
        batch.queue(Command::ZAdd {
            key: leaf.clone(),
            members,
        });
        batch.expire(&leaf);
    }

    for field in plan.map_fields() {
        let leaf = key::leaf_key(&key, field.name());
        let entries = field
            .encode(obj)
            .map_err(|e| Error::field_type(&key, field.name(), e))?;
        batch.queue(Command::del(&leaf));
        if entries.is_empty() {
            continue;
        }
        batch.queue(Command::HSet {
            key: leaf.clone(),
            fields: entries,
        });
        batch.expire(&leaf);
    }

    Ok(())
}

/// Keep a current record's data keys expiring with its freshness key.
fn refresh_expiry<R>(plan: &RecordPlan<R>, key: &str, batch: &mut WriteBatch<'_>) {
    if !plan.scalar_fields().is_empty() {
        batch.refresh(key);
    }
    for field in plan.list_fields() {
        batch.refresh(&key::leaf_key(key, field.name()));
    }
    for field in plan.map_fields() {
        batch.refresh(&key::leaf_key(key, field.name()));
    }
}

/// Build the read commands and reply consumers for `obj` and everything
/// nested in it, children first.
pub(crate) fn read_record<R: Record>(
    plan: &Arc<RecordPlan<R>>,
    obj: &R,
    placement: Placement<'_>,
    inherited_fresh: bool,
    batch: &mut ReadBatch<'_>,
) -> Result<Emission<R>> {
    let key = key::record_key(plan, obj, placement, batch.root_prefix);
    let boundary = placement.is_boundary(plan.is_keyed());

    let fresh = if boundary {
        batch.boundaries += 1;
        let fresh = gate_check(plan, obj, &key, batch.gate, batch.hasher, GateMode::Read)?;
        if fresh {
            batch.fresh += 1;
        }
        fresh
    } else {
        inherited_fresh
    };

    let mut emission = Emission::new();
    for child in plan.nested_fields() {
        emission.append(child.plan.read(obj, &key, fresh, batch)?);
    }
    if fresh {
        trace!(key = %key, "destination is current, skipping field reads");
        return Ok(emission);
    }

    for (index, field) in plan.scalar_fields().iter().enumerate() {
        let fields = Arc::clone(plan);
        emission.push(
            Command::hget(&key, field.name()),
            ResultConsumer::Scalar {
                key: key.clone(),
                field: field.name(),
                identity: field.is_identity(),
                apply: Box::new(move |obj: &mut R, wire: &str| {
                    fields.scalar_fields()[index].decode(obj, wire)
                }),
            },
        );
    }

    for (index, field) in plan.list_fields().iter().enumerate() {
        let leaf = key::leaf_key(&key, field.name());
        let fields = Arc::clone(plan);
        emission.push(
            Command::zrange_all(&leaf),
            ResultConsumer::List {
                key: leaf,
                field: field.name(),
                apply: Box::new(move |obj: &mut R, items: Vec<String>| {
                    fields.list_fields()[index].decode(obj, items)
                }),
            },
        );
    }

    for (index, field) in plan.map_fields().iter().enumerate() {
        let leaf = key::leaf_key(&key, field.name());
        let fields = Arc::clone(plan);
        emission.push(
            Command::hgetall(&leaf),
            ResultConsumer::Map {
                key: leaf,
                field: field.name(),
                apply: Box::new(move |obj: &mut R, entries: Vec<(String, String)>| {
                    fields.map_fields()[index].decode(obj, entries)
                }),
            },
        );
    }

    Ok(emission)
}

/// Apply `replies` to `target`, in order.
///
/// The first command error or decode failure aborts. A missing identity
/// does not: every reply is applied first, then the first missing record is
/// reported as [`Error::ObjectNotFound`].
pub(crate) fn resolve<R: 'static>(
    target: &mut R,
    consumers: Vec<ResultConsumer<R>>,
    replies: Vec<ClientResult<Reply>>,
) -> Result<()> {
    if consumers.len() != replies.len() {
        return Err(Error::RedisCommand(ClientError::Protocol(format!(
            "{} replies for {} queued reads",
            replies.len(),
            consumers.len()
        ))));
    }

    let mut missing: Option<String> = None;
    for (consumer, reply) in consumers.into_iter().zip(replies) {
        match consumer.consume(target, reply?)? {
            Consumed::Applied => {}
            Consumed::Missing { key } => {
                missing.get_or_insert(key);
            }
        }
    }

    match missing {
        Some(key) => Err(Error::ObjectNotFound { key }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::DisabledGate;
    use crate::schema::Schema;

    #[derive(Default, Debug, PartialEq)]
    struct Badge {
        label: String,
    }

    impl Record for Badge {
        const TYPE_NAME: &'static str = "Badge";

        fn schema(schema: &mut Schema<Self>) {
            schema.scalar("Label", |b| &b.label, |b| &mut b.label);
        }
    }

    #[derive(Default, Debug, PartialEq)]
    struct Player {
        id: String,
        level: u8,
        items: Vec<String>,
        badge: Badge,
    }

    impl Record for Player {
        const TYPE_NAME: &'static str = "Player";

        fn schema(schema: &mut Schema<Self>) {
            schema
                .key("Id", |p| &p.id, |p| &mut p.id)
                .scalar("Level", |p| &p.level, |p| &mut p.level)
                .list("Items", |p| &p.items, |p| &mut p.items)
                .nested("Badge", |p| &p.badge, |p| &mut p.badge);
        }
    }

    fn plan() -> Arc<RecordPlan<Player>> {
        Arc::new(RecordPlan::<Player>::compile().unwrap())
    }

    fn player() -> Player {
        Player {
            id: "p1".into(),
            level: 3,
            items: vec!["sword".into(), "shield".into()],
            badge: Badge {
                label: "gold".into(),
            },
        }
    }

    fn emit_write(player: &Player, ttl: Option<Duration>) -> Vec<Command> {
        let gate = DisabledGate;
        let hasher = ContentHasher::RECORD;
        let mut batch = WriteBatch::new("redisobj", ttl, &gate, &hasher);
        write_record(&plan(), player, Placement::Root, false, &mut batch).unwrap();
        batch.pipeline.commands().to_vec()
    }

    fn emit_read(player: &Player) -> Emission<Player> {
        let gate = DisabledGate;
        let hasher = ContentHasher::RECORD;
        let mut batch = ReadBatch::new("redisobj", &gate, &hasher);
        read_record(&plan(), player, Placement::Root, false, &mut batch).unwrap()
    }

    // ---- write emission ----

    #[test]
    fn write_order_is_del_children_scalars_lists() {
        let names: Vec<_> = emit_write(&player(), None)
            .iter()
            .map(|c| c.to_string())
            .collect();
        assert_eq!(
            names,
            [
                "DEL {redisobj:Player:p1} {redisobj:Player:p1}.__HASH__",
                "DEL {redisobj:Player:p1}:Badge",
                "HSET {redisobj:Player:p1}:Badge Label \"gold\"",
                "HSET {redisobj:Player:p1} Id \"p1\"",
                "HSET {redisobj:Player:p1} Level \"3\"",
                "DEL {redisobj:Player:p1}.Items",
                "ZADD {redisobj:Player:p1}.Items",
            ]
        );
    }

    #[test]
    fn ttl_adds_expire_after_each_data_key() {
        let ttl = Duration::from_secs(60);
        let expires: Vec<_> = emit_write(&player(), Some(ttl))
            .into_iter()
            .filter_map(|c| match c {
                Command::Expire { key, ttl: t } => {
                    assert_eq!(t, ttl);
                    Some(key)
                }
                _ => None,
            })
            .collect();
        assert_eq!(
            expires,
            [
                "{redisobj:Player:p1}:Badge",
                "{redisobj:Player:p1}",
                "{redisobj:Player:p1}.Items",
            ]
        );
    }

    #[test]
    fn empty_list_is_deleted_but_not_added() {
        let mut p = player();
        p.items.clear();
        let commands = emit_write(&p, Some(Duration::from_secs(5)));
        assert!(commands.contains(&Command::del("{redisobj:Player:p1}.Items")));
        assert!(!commands.iter().any(|c| matches!(c, Command::ZAdd { .. })));
        assert!(!commands.contains(&Command::expire(
            "{redisobj:Player:p1}.Items",
            Duration::from_secs(5)
        )));
    }

    #[test]
    fn list_scores_are_indices() {
        let commands = emit_write(&player(), None);
        let zadd = commands
            .iter()
            .find_map(|c| match c {
                Command::ZAdd { members, .. } => Some(members.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(zadd, vec![(0.0, "sword".to_string()), (1.0, "shield".to_string())]);
    }

    // ---- read emission ----

    #[test]
    fn read_pairs_each_command_with_a_consumer() {
        let emission = emit_read(&player());
        assert_eq!(emission.len(), 4);
        let (commands, consumers) = emission.into_parts();
        for (command, consumer) in commands.iter().zip(&consumers) {
            assert_eq!(command.name(), consumer.expects());
            assert_eq!(command.keys(), vec![consumer.key()]);
        }
        assert_eq!(commands[0], Command::hget("{redisobj:Player:p1}:Badge", "Label"));
    }

    #[test]
    fn resolve_applies_replies_through_lifted_consumers() {
        let emission = emit_read(&player());
        let (_, consumers) = emission.into_parts();
        let replies = vec![
            Ok(Reply::Bulk("silver".into())),
            Ok(Reply::Bulk("p1".into())),
            Ok(Reply::Bulk("9".into())),
            Ok(Reply::Array(vec!["bow".into()])),
        ];
        let mut target = Player {
            id: "p1".into(),
            ..Default::default()
        };
        resolve(&mut target, consumers, replies).unwrap();
        assert_eq!(target.badge.label, "silver");
        assert_eq!(target.level, 9);
        assert_eq!(target.items, ["bow"]);
    }

    #[test]
    fn missing_identity_applies_everything_then_reports() {
        let (_, consumers) = emit_read(&player()).into_parts();
        let replies = vec![Ok(Reply::Nil), Ok(Reply::Nil), Ok(Reply::Nil), Ok(Reply::Array(vec![]))];
        let mut target = player();
        let err = resolve(&mut target, consumers, replies).unwrap_err();
        assert!(matches!(err, Error::ObjectNotFound { ref key } if key == "{redisobj:Player:p1}"));
        assert_eq!(target.id, "p1");
        assert_eq!(target.level, 0);
        assert!(target.items.is_empty());
        assert_eq!(target.badge.label, "");
    }

    #[test]
    fn decode_failure_aborts() {
        let (_, consumers) = emit_read(&player()).into_parts();
        let replies = vec![
            Ok(Reply::Bulk("x".into())),
            Ok(Reply::Bulk("p1".into())),
            Ok(Reply::Bulk("300".into())),
            Ok(Reply::Array(vec!["never".into()])),
        ];
        let mut target = Player::default();
        let err = resolve(&mut target, consumers, replies).unwrap_err();
        assert!(matches!(err, Error::InvalidFieldType { ref field, .. } if field.ends_with("/Level")));
        assert!(target.items.is_empty());
    }

    #[test]
    fn command_error_propagates() {
        let (_, consumers) = emit_read(&player()).into_parts();
        let replies = vec![
            Ok(Reply::Nil),
            Err(ClientError::WrongType { key: "k".into() }),
            Ok(Reply::Nil),
            Ok(Reply::Array(vec![])),
        ];
        let err = resolve(&mut Player::default(), consumers, replies).unwrap_err();
        assert!(matches!(err, Error::RedisCommand(ClientError::WrongType { .. })));
    }

    #[test]
    fn wrong_reply_shape_is_rejected() {
        let (_, consumers) = emit_read(&player()).into_parts();
        let replies = vec![
            Ok(Reply::Integer(1)),
            Ok(Reply::Nil),
            Ok(Reply::Nil),
            Ok(Reply::Array(vec![])),
        ];
        let err = resolve(&mut Player::default(), consumers, replies).unwrap_err();
        assert!(matches!(err, Error::RedisCommand(ClientError::Protocol(_))));
    }

    #[test]
    fn reply_count_mismatch_is_rejected() {
        let (_, consumers) = emit_read(&player()).into_parts();
        let err = resolve(&mut Player::default(), consumers, vec![Ok(Reply::Nil)]).unwrap_err();
        assert!(matches!(err, Error::RedisCommand(ClientError::Protocol(_))));
    }
}
