//! Records exercised by the `plan`, `keys` and `demo` commands.

use std::collections::{BTreeMap, HashMap};

use redisobj::{Record, Schema};

/// A record with a ready-made sample value and the stub a reader starts from.
pub trait Sample: Record + Default + PartialEq + std::fmt::Debug {
    fn sample() -> Self;

    /// Identity fields only; everything else is left for the read to fill.
    fn stub(&self) -> Self;
}

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

impl Sample for Root {
    fn sample() -> Self {
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

    fn stub(&self) -> Self {
        Root {
            id: self.id.clone(),
            child: NestedWithOwnKey {
                id: self.child.id.clone(),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Shipping {
    pub street: String,
    pub city: String,
    pub postcode: String,
}

impl Record for Shipping {
    const TYPE_NAME: &'static str = "Shipping";

    fn schema(schema: &mut Schema<Self>) {
        schema
            .scalar("Street", |s| &s.street, |s| &mut s.street)
            .scalar("City", |s| &s.city, |s| &mut s.city)
            .scalar("Postcode", |s| &s.postcode, |s| &mut s.postcode);
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Order {
    pub number: u64,
    pub paid: bool,
    pub total_cents: i64,
    pub items: Vec<String>,
    pub quantities: BTreeMap<String, u32>,
    pub shipping: Shipping,
}

impl Record for Order {
    const TYPE_NAME: &'static str = "Order";

    fn schema(schema: &mut Schema<Self>) {
        schema
            .key("Number", |o| &o.number, |o| &mut o.number)
            .scalar("Paid", |o| &o.paid, |o| &mut o.paid)
            .scalar("TotalCents", |o| &o.total_cents, |o| &mut o.total_cents)
            .list("Items", |o| &o.items, |o| &mut o.items)
            .map("Quantities", |o| &o.quantities, |o| &mut o.quantities)
            .nested("Shipping", |o| &o.shipping, |o| &mut o.shipping);
    }
}

impl Sample for Order {
    fn sample() -> Self {
        Order {
            number: 1001,
            paid: true,
            total_cents: 4250,
            items: vec!["kettle".into(), "mug".into()],
            quantities: BTreeMap::from([("kettle".to_string(), 1), ("mug".to_string(), 4)]),
            shipping: Shipping {
                street: "1 Harbour Row".into(),
                city: "Leith".into(),
                postcode: "EH6 6QT".into(),
            },
        }
    }

    fn stub(&self) -> Self {
        Order {
            number: self.number,
            ..Default::default()
        }
    }
}
