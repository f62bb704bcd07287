//! Compiled record plans.
//!
//! A [`RecordPlan`] is the per-type mapping between a record's fields and
//! store keys. It is built once from the record's [`Schema`] declaration and
//! is immutable afterwards, so one plan is shared by every concurrent call.

use std::cell::RefCell;
use std::fmt;
use std::sync::Arc;

use redisobj_codec::{CodecResult, ScalarKind};
use serde::Serialize;

use crate::digest::DigestBuilder;
use crate::error::{Result, SchemaError};
use crate::exec::{self, Emission, ReadBatch, WriteBatch};
use crate::key::{KeyLayout, Placement};
use crate::record::Record;
use crate::schema::Schema;

pub(crate) type EncodeScalar<R> = Box<dyn Fn(&R) -> CodecResult<String> + Send + Sync>;
pub(crate) type DecodeScalar<R> = Box<dyn Fn(&mut R, &str) -> CodecResult<()> + Send + Sync>;
pub(crate) type EncodeList<R> = Box<dyn Fn(&R) -> CodecResult<Vec<String>> + Send + Sync>;
pub(crate) type DecodeList<R> = Box<dyn Fn(&mut R, Vec<String>) -> CodecResult<()> + Send + Sync>;
pub(crate) type EncodeMap<R> = Box<dyn Fn(&R) -> CodecResult<Vec<(String, String)>> + Send + Sync>;
pub(crate) type DecodeMap<R> =
    Box<dyn Fn(&mut R, Vec<(String, String)>) -> CodecResult<()> + Send + Sync>;

/// A field stored in the record's hash.
pub struct ScalarField<R> {
    pub(crate) name: &'static str,
    pub(crate) position: usize,
    pub(crate) kind: ScalarKind,
    pub(crate) identity: bool,
    pub(crate) encode: EncodeScalar<R>,
    pub(crate) decode: DecodeScalar<R>,
}

impl<R> ScalarField<R> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Declaration index within the record.
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn kind(&self) -> ScalarKind {
        self.kind
    }

    /// Returns `true` for the identity field.
    pub fn is_identity(&self) -> bool {
        self.identity
    }

    pub(crate) fn encode(&self, obj: &R) -> CodecResult<String> {
        (self.encode)(obj)
    }

    pub(crate) fn decode(&self, obj: &mut R, wire: &str) -> CodecResult<()> {
        (self.decode)(obj, wire)
    }
}

/// A sequence field stored as a sorted set scored by index.
pub struct ListField<R> {
    pub(crate) name: &'static str,
    pub(crate) position: usize,
    pub(crate) element: ScalarKind,
    pub(crate) encode: EncodeList<R>,
    pub(crate) decode: DecodeList<R>,
}

impl<R> ListField<R> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn element(&self) -> ScalarKind {
        self.element
    }

    pub(crate) fn encode(&self, obj: &R) -> CodecResult<Vec<String>> {
        (self.encode)(obj)
    }

    pub(crate) fn decode(&self, obj: &mut R, items: Vec<String>) -> CodecResult<()> {
        (self.decode)(obj, items)
    }
}

/// A map field stored as a hash at its own leaf key.
pub struct MapField<R> {
    pub(crate) name: &'static str,
    pub(crate) position: usize,
    pub(crate) key: ScalarKind,
    pub(crate) value: ScalarKind,
    pub(crate) encode: EncodeMap<R>,
    pub(crate) decode: DecodeMap<R>,
}

impl<R> MapField<R> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn key_kind(&self) -> ScalarKind {
        self.key
    }

    pub fn value_kind(&self) -> ScalarKind {
        self.value
    }

    /// Entries sorted by encoded key.
    pub(crate) fn encode(&self, obj: &R) -> CodecResult<Vec<(String, String)>> {
        let mut entries = (self.encode)(obj)?;
        entries.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        Ok(entries)
    }

    pub(crate) fn decode(&self, obj: &mut R, entries: Vec<(String, String)>) -> CodecResult<()> {
        (self.decode)(obj, entries)
    }
}

/// Type-erased access to a nested record's plan from its parent.
pub(crate) trait NestedPlan<R>: Send + Sync {
    fn type_name(&self) -> &'static str;

    fn is_keyed(&self) -> bool;

    fn summary(&self) -> PlanSummary;

    fn write(
        &self,
        parent: &R,
        parent_key: &str,
        inherited_fresh: bool,
        batch: &mut WriteBatch<'_>,
    ) -> Result<()>;

    fn read(
        &self,
        parent: &R,
        parent_key: &str,
        inherited_fresh: bool,
        batch: &mut ReadBatch<'_>,
    ) -> Result<Emission<R>>;

    /// Feed an embedded child into the parent's digest. Keyed children are
    /// hashed on their own and contribute nothing.
    fn digest(&self, parent: &R, builder: &mut DigestBuilder) -> Result<()>;

    fn layout(&self, parent: &R, parent_key: &str, root_prefix: &str, out: &mut KeyLayout);
}

struct Child<R, C: Record> {
    plan: Arc<RecordPlan<C>>,
    get: fn(&R) -> &C,
    get_mut: fn(&mut R) -> &mut C,
}

impl<R: Record, C: Record> NestedPlan<R> for Child<R, C> {
    fn type_name(&self) -> &'static str {
        C::TYPE_NAME
    }

    fn is_keyed(&self) -> bool {
        self.plan.is_keyed()
    }

    fn summary(&self) -> PlanSummary {
        self.plan.summary()
    }

    fn write(
        &self,
        parent: &R,
        parent_key: &str,
        inherited_fresh: bool,
        batch: &mut WriteBatch<'_>,
    ) -> Result<()> {
        let placement = Placement::Nested { parent_key };
        exec::write_record(&self.plan, (self.get)(parent), placement, inherited_fresh, batch)
    }

    fn read(
        &self,
        parent: &R,
        parent_key: &str,
        inherited_fresh: bool,
        batch: &mut ReadBatch<'_>,
    ) -> Result<Emission<R>> {
        let placement = Placement::Nested { parent_key };
        let emission =
            exec::read_record(&self.plan, (self.get)(parent), placement, inherited_fresh, batch)?;
        Ok(emission.lift(self.get_mut))
    }

    fn digest(&self, parent: &R, builder: &mut DigestBuilder) -> Result<()> {
        if self.plan.is_keyed() {
            return Ok(());
        }
        crate::digest::feed_record(&self.plan, (self.get)(parent), builder)
    }

    fn layout(&self, parent: &R, parent_key: &str, root_prefix: &str, out: &mut KeyLayout) {
        let placement = Placement::Nested { parent_key };
        crate::key::layout_record(&self.plan, (self.get)(parent), placement, root_prefix, out);
    }
}

/// A field holding another record.
pub struct NestedField<R> {
    pub(crate) name: &'static str,
    pub(crate) position: usize,
    pub(crate) plan: Box<dyn NestedPlan<R>>,
}

impl<R: Record> NestedField<R> {
    pub(crate) fn new<C: Record>(
        name: &'static str,
        position: usize,
        plan: Arc<RecordPlan<C>>,
        get: fn(&R) -> &C,
        get_mut: fn(&mut R) -> &mut C,
    ) -> Self {
        Self {
            name,
            position,
            plan: Box::new(Child { plan, get, get_mut }),
        }
    }
}

impl<R> NestedField<R> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// Type name of the nested record.
    pub fn type_name(&self) -> &'static str {
        self.plan.type_name()
    }

    /// Returns `true` when the nested record has its own identity and is
    /// stored under its own root-level key.
    pub fn is_keyed(&self) -> bool {
        self.plan.is_keyed()
    }
}

/// The compiled mapping for one record type.
pub struct RecordPlan<R> {
    pub(crate) type_name: &'static str,
    pub(crate) key_field_index: Option<usize>,
    pub(crate) identity: Option<usize>,
    pub(crate) scalars: Vec<ScalarField<R>>,
    pub(crate) lists: Vec<ListField<R>>,
    pub(crate) maps: Vec<MapField<R>>,
    pub(crate) nested: Vec<NestedField<R>>,
}

thread_local! {
    static COMPILING: RefCell<Vec<&'static str>> = const { RefCell::new(Vec::new()) };
}

/// Pops the compile stack on every exit path.
struct CompileFrame;

impl Drop for CompileFrame {
    fn drop(&mut self) {
        COMPILING.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

impl<R: Record> RecordPlan<R> {
    /// Compile `R`'s declaration. Nested record types are compiled
    /// recursively; a type that (transitively) contains itself is rejected.
    pub fn compile() -> std::result::Result<Self, SchemaError> {
        let recursive = COMPILING.with(|stack| {
            let mut stack = stack.borrow_mut();
            if stack.contains(&R::TYPE_NAME) {
                return true;
            }
            stack.push(R::TYPE_NAME);
            false
        });
        if recursive {
            return Err(SchemaError::RecursiveType {
                type_name: R::TYPE_NAME.to_string(),
            });
        }
        let _frame = CompileFrame;

        let mut schema = Schema::new(R::TYPE_NAME);
        R::schema(&mut schema);
        schema.finish()
    }

    /// The identity value, or `None` when there is no identity field or its
    /// value encodes to the empty string.
    pub fn identity_of(&self, obj: &R) -> Option<String> {
        let field = &self.scalars[self.identity?];
        match field.encode(obj) {
            Ok(value) if !value.is_empty() => Some(value),
            _ => None,
        }
    }
}

impl<R> RecordPlan<R> {
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Declaration index of the identity field.
    pub fn key_field_index(&self) -> Option<usize> {
        self.key_field_index
    }

    /// Returns `true` when the record has an identity field.
    pub fn is_keyed(&self) -> bool {
        self.identity.is_some()
    }

    /// The identity field, if any.
    pub fn key_field(&self) -> Option<&ScalarField<R>> {
        self.identity.map(|i| &self.scalars[i])
    }

    pub fn scalar_fields(&self) -> &[ScalarField<R>] {
        &self.scalars
    }

    pub fn list_fields(&self) -> &[ListField<R>] {
        &self.lists
    }

    pub fn map_fields(&self) -> &[MapField<R>] {
        &self.maps
    }

    pub fn nested_fields(&self) -> &[NestedField<R>] {
        &self.nested
    }

    /// Total number of declared fields.
    pub fn field_count(&self) -> usize {
        self.scalars.len() + self.lists.len() + self.maps.len() + self.nested.len()
    }

    /// A serializable description of the plan, fields in declaration order.
    pub fn summary(&self) -> PlanSummary {
        let mut fields: Vec<FieldSummary> = Vec::with_capacity(self.field_count());
        fields.extend(self.scalars.iter().map(|f| FieldSummary {
            name: f.name,
            position: f.position,
            shape: FieldShape::Scalar {
                kind: f.kind,
                identity: f.identity,
            },
        }));
        fields.extend(self.lists.iter().map(|f| FieldSummary {
            name: f.name,
            position: f.position,
            shape: FieldShape::List { element: f.element },
        }));
        fields.extend(self.maps.iter().map(|f| FieldSummary {
            name: f.name,
            position: f.position,
            shape: FieldShape::Map {
                key: f.key,
                value: f.value,
            },
        }));
        fields.extend(self.nested.iter().map(|f| FieldSummary {
            name: f.name,
            position: f.position,
            shape: FieldShape::Nested {
                plan: Box::new(f.plan.summary()),
            },
        }));
        fields.sort_by_key(|f| f.position);

        PlanSummary {
            type_name: self.type_name,
            keyed: self.is_keyed(),
            key_field: self.key_field().map(|f| f.name),
            fields,
        }
    }
}

impl<R> fmt::Debug for RecordPlan<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordPlan")
            .field("type_name", &self.type_name)
            .field("key_field_index", &self.key_field_index)
            .field("scalars", &self.scalars.len())
            .field("lists", &self.lists.len())
            .field("maps", &self.maps.len())
            .field("nested", &self.nested.len())
            .finish()
    }
}

/// Serializable shape of a compiled plan.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PlanSummary {
    pub type_name: &'static str,
    pub keyed: bool,
    pub key_field: Option<&'static str>,
    pub fields: Vec<FieldSummary>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FieldSummary {
    pub name: &'static str,
    pub position: usize,
    #[serde(flatten)]
    pub shape: FieldShape,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "shape", rename_all = "lowercase")]
pub enum FieldShape {
    Scalar { kind: ScalarKind, identity: bool },
    List { element: ScalarKind },
    Map { key: ScalarKind, value: ScalarKind },
    Nested { plan: Box<PlanSummary> },
}

impl PlanSummary {
    fn render(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let indent = "  ".repeat(depth);
        let keyed = match self.key_field {
            Some(field) => format!(" (keyed by {field})"),
            None => " (embedded)".to_string(),
        };
        writeln!(f, "{indent}{}{keyed}", self.type_name)?;
        for field in &self.fields {
            match &field.shape {
                FieldShape::Scalar { kind, identity } => {
                    let marker = if *identity { " [identity]" } else { "" };
                    writeln!(f, "{indent}  {}: {kind}{marker}", field.name)?;
                }
                FieldShape::List { element } => {
                    writeln!(f, "{indent}  {}: list<{element}>", field.name)?;
                }
                FieldShape::Map { key, value } => {
                    writeln!(f, "{indent}  {}: map<{key}, {value}>", field.name)?;
                }
                FieldShape::Nested { plan } => {
                    writeln!(f, "{indent}  {}:", field.name)?;
                    plan.render(f, depth + 2)?;
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.render(f, 0)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[derive(Default)]
    struct Address {
        city: String,
        zip: u32,
    }

    impl Record for Address {
        const TYPE_NAME: &'static str = "Address";

        fn schema(schema: &mut Schema<Self>) {
            schema
                .scalar("City", |a| &a.city, |a| &mut a.city)
                .scalar("Zip", |a| &a.zip, |a| &mut a.zip);
        }
    }

    #[derive(Default)]
    struct Account {
        id: u64,
        owner: String,
        address: Address,
        tags: Vec<String>,
        limits: HashMap<String, i64>,
    }

    impl Record for Account {
        const TYPE_NAME: &'static str = "Account";

        fn schema(schema: &mut Schema<Self>) {
            schema
                .key("Id", |a| &a.id, |a| &mut a.id)
                .scalar("Owner", |a| &a.owner, |a| &mut a.owner)
                .nested("Address", |a| &a.address, |a| &mut a.address)
                .list("Tags", |a| &a.tags, |a| &mut a.tags)
                .map("Limits", |a| &a.limits, |a| &mut a.limits);
        }
    }

    #[test]
    fn compile_classifies_fields() {
        let plan = RecordPlan::<Account>::compile().unwrap();
        assert_eq!(plan.type_name(), "Account");
        assert!(plan.is_keyed());
        assert_eq!(plan.key_field_index(), Some(0));
        assert_eq!(plan.key_field().unwrap().name(), "Id");
        assert_eq!(plan.scalar_fields().len(), 2);
        assert_eq!(plan.list_fields()[0].element(), ScalarKind::String);
        assert_eq!(plan.map_fields()[0].value_kind(), ScalarKind::I64);
        assert_eq!(plan.nested_fields()[0].type_name(), "Address");
        assert!(!plan.nested_fields()[0].is_keyed());
        assert_eq!(plan.field_count(), 5);
    }

    #[test]
    fn identity_of_skips_empty_values() {
        let plan = RecordPlan::<Account>::compile().unwrap();
        let account = Account {
            id: 7,
            ..Default::default()
        };
        assert_eq!(plan.identity_of(&account).as_deref(), Some("7"));

        let address = RecordPlan::<Address>::compile().unwrap();
        assert_eq!(address.identity_of(&Address::default()), None);
    }

    #[test]
    fn summary_is_in_declaration_order() {
        let summary = RecordPlan::<Account>::compile().unwrap().summary();
        let names: Vec<_> = summary.fields.iter().map(|f| f.name).collect();
        assert_eq!(names, ["Id", "Owner", "Address", "Tags", "Limits"]);
        assert_eq!(summary.key_field, Some("Id"));

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["fields"][3]["shape"], "list");
        assert_eq!(json["fields"][2]["plan"]["type_name"], "Address");
    }

    #[test]
    fn summary_renders_as_tree() {
        let text = RecordPlan::<Account>::compile().unwrap().summary().to_string();
        assert!(text.starts_with("Account (keyed by Id)\n"));
        assert!(text.contains("  Id: u64 [identity]\n"));
        assert!(text.contains("  Tags: list<string>\n"));
        assert!(text.contains("  Limits: map<string, i64>\n"));
        assert!(text.contains("    Address (embedded)\n"));
        assert!(text.contains("      Zip: u32\n"));
    }

    #[test]
    fn map_entries_are_sorted_by_encoded_key() {
        let plan = RecordPlan::<Account>::compile().unwrap();
        let mut account = Account::default();
        account.limits.insert("b".into(), 2);
        account.limits.insert("a".into(), 1);
        account.limits.insert("c".into(), 3);
        let entries = plan.map_fields()[0].encode(&account).unwrap();
        let keys: Vec<_> = entries.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["a", "b", "c"]);
    }
}
