#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use redisobj::{Record, Schema};
use redisobj_client::{ClientResult, Command, Context, InMemoryClient, KvClient, Reply};

// ---- scenario records ----

#[derive(Clone, Debug, Default, PartialEq)]
pub struct NestedWithOwnKey {
    pub id: String,
    pub label: String,
    pub weight: f64,
}

impl Record for NestedWithOwnKey {
    const TYPE_NAME: &'static str = "NestedWithOwnKey";

    fn schema(schema: &mut Schema<Self>) {
        schema
            .key("Id", |n| &n.id, |n| &mut n.id)
            .scalar("Label", |n| &n.label, |n| &mut n.label)
            .scalar("Weight", |n| &n.weight, |n| &mut n.weight);
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Root {
    pub id: String,
    pub name: String,
    pub tags: Vec<String>,
    pub scores: HashMap<String, i64>,
    pub child: NestedWithOwnKey,
}

impl Record for Root {
    const TYPE_NAME: &'static str = "Root";

    fn schema(schema: &mut Schema<Self>) {
        schema
            .key("Id", |r| &r.id, |r| &mut r.id)
            .scalar("Name", |r| &r.name, |r| &mut r.name)
            .list("Tags", |r| &r.tags, |r| &mut r.tags)
            .map("Scores", |r| &r.scores, |r| &mut r.scores)
            .nested("Child", |r| &r.child, |r| &mut r.child);
    }
}

pub fn root() -> Root {
    Root {
        id: "u1".into(),
        name: "alice".into(),
        tags: vec!["a".into(), "b".into()],
        scores: HashMap::from([("x".to_string(), 1)]),
        child: NestedWithOwnKey {
            id: "c1".into(),
            label: "first".into(),
            weight: 0.25,
        },
    }
}

/// A destination with only the identities populated.
pub fn root_stub() -> Root {
    Root {
        id: "u1".into(),
        child: NestedWithOwnKey {
            id: "c1".into(),
            ..Default::default()
        },
        ..Default::default()
    }
}

pub const ROOT_KEY: &str = "{redisobj:Root:u1}";
pub const CHILD_KEY: &str = "{redisobj:NestedWithOwnKey:c1}";

// ---- deep nesting ----

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Leaf {
    pub code: u16,
    pub flags: Vec<bool>,
}

impl Record for Leaf {
    const TYPE_NAME: &'static str = "Leaf";

    fn schema(schema: &mut Schema<Self>) {
        schema
            .scalar("Code", |l| &l.code, |l| &mut l.code)
            .list("Flags", |l| &l.flags, |l| &mut l.flags);
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Branch {
    pub id: u64,
    pub leaf: Leaf,
    pub weights: BTreeMap<i32, f32>,
}

impl Record for Branch {
    const TYPE_NAME: &'static str = "Branch";

    fn schema(schema: &mut Schema<Self>) {
        schema
            .key("Id", |b| &b.id, |b| &mut b.id)
            .nested("Leaf", |b| &b.leaf, |b| &mut b.leaf)
            .map("Weights", |b| &b.weights, |b| &mut b.weights);
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Trunk {
    pub title: String,
    pub branch: Branch,
    pub leaf: Leaf,
}

impl Record for Trunk {
    const TYPE_NAME: &'static str = "Trunk";

    fn schema(schema: &mut Schema<Self>) {
        schema
            .scalar("Title", |t| &t.title, |t| &mut t.title)
            .nested("Branch", |t| &t.branch, |t| &mut t.branch)
            .nested("Leaf", |t| &t.leaf, |t| &mut t.leaf);
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Tree {
    pub id: String,
    pub height: i128,
    pub initial: char,
    pub active: bool,
    pub trunk: Trunk,
    pub notes: Vec<String>,
}

impl Record for Tree {
    const TYPE_NAME: &'static str = "Tree";

    fn schema(schema: &mut Schema<Self>) {
        schema
            .key("Id", |t| &t.id, |t| &mut t.id)
            .scalar("Height", |t| &t.height, |t| &mut t.height)
            .scalar("Initial", |t| &t.initial, |t| &mut t.initial)
            .scalar("Active", |t| &t.active, |t| &mut t.active)
            .nested("Trunk", |t| &t.trunk, |t| &mut t.trunk)
            .list("Notes", |t| &t.notes, |t| &mut t.notes);
    }
}

pub fn tree() -> Tree {
    Tree {
        id: "oak".into(),
        height: i128::MIN + 7,
        initial: 'Ω',
        active: true,
        trunk: Trunk {
            title: "main trunk".into(),
            branch: Branch {
                id: 7,
                leaf: Leaf {
                    code: 404,
                    flags: vec![true, false],
                },
                weights: BTreeMap::from([(-1, 0.5), (3, 1.25)]),
            },
            leaf: Leaf {
                code: 200,
                flags: vec![false, true],
            },
        },
        notes: vec!["planted".into(), "pruned".into(), "grown".into()],
    }
}

pub fn tree_stub() -> Tree {
    Tree {
        id: "oak".into(),
        trunk: Trunk {
            branch: Branch {
                id: 7,
                ..Default::default()
            },
            ..Default::default()
        },
        ..Default::default()
    }
}

// ---- recording client ----

/// Wraps an [`InMemoryClient`] and records every round trip.
#[derive(Default)]
pub struct RecordingClient {
    pub inner: InMemoryClient,
    trips: Mutex<Vec<(Vec<Command>, Vec<ClientResult<Reply>>)>>,
}

impl RecordingClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trips(&self) -> Vec<(Vec<Command>, Vec<ClientResult<Reply>>)> {
        self.trips.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.trips.lock().unwrap().clear();
    }
}

impl KvClient for RecordingClient {
    fn execute(
        &self,
        ctx: &Context,
        commands: &[Command],
    ) -> ClientResult<Vec<ClientResult<Reply>>> {
        let replies = self.inner.execute(ctx, commands)?;
        self.trips
            .lock()
            .unwrap()
            .push((commands.to_vec(), replies.clone()));
        Ok(replies)
    }
}

/// Commands from the client's log, rendered for compact assertions.
pub fn rendered(log: &[Command]) -> Vec<String> {
    log.iter().map(ToString::to_string).collect()
}

pub fn is_field_write(command: &Command) -> bool {
    matches!(
        command,
        Command::HSet { .. } | Command::ZAdd { .. } | Command::Del { .. }
    )
}
