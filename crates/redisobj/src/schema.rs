use std::collections::HashSet;
use std::sync::Arc;

use redisobj_codec::{CodecResult, Scalar};

use crate::error::SchemaError;
use crate::key::HASH_FIELD;
use crate::plan::{ListField, MapField, NestedField, RecordPlan, ScalarField};
use crate::record::{Record, ScalarMap};

/// Field declarations for one record type.
///
/// Fields are declared in struct order through accessor function pairs.
/// Names become hash fields and key segments, so they must be non-empty and
/// may not contain whitespace, `{`, `}`, `:` or `.`.
///
/// Errors are collected while declaring and reported together when the
/// declaration is compiled.
pub struct Schema<R> {
    type_name: &'static str,
    names: Vec<&'static str>,
    scalars: Vec<ScalarField<R>>,
    lists: Vec<ListField<R>>,
    maps: Vec<MapField<R>>,
    nested: Vec<NestedField<R>>,
    errors: Vec<SchemaError>,
}

impl<R: Record> Schema<R> {
    pub(crate) fn new(type_name: &'static str) -> Self {
        Self {
            type_name,
            names: Vec::new(),
            scalars: Vec::new(),
            lists: Vec::new(),
            maps: Vec::new(),
            nested: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Declare the identity field. Its value becomes part of the record's
    /// key, so a record with an identity field is stored under its own
    /// root-level key wherever it appears.
    pub fn key<T: Scalar>(
        &mut self,
        name: &'static str,
        get: fn(&R) -> &T,
        get_mut: fn(&mut R) -> &mut T,
    ) -> &mut Self {
        self.push_scalar(name, get, get_mut, true)
    }

    /// Declare a scalar field stored in the record's hash.
    pub fn scalar<T: Scalar>(
        &mut self,
        name: &'static str,
        get: fn(&R) -> &T,
        get_mut: fn(&mut R) -> &mut T,
    ) -> &mut Self {
        self.push_scalar(name, get, get_mut, false)
    }

    /// Declare a list field stored as a sorted set scored by index.
    ///
    /// Sorted-set members are unique: equal elements collapse into the last
    /// one written.
    pub fn list<T: Scalar>(
        &mut self,
        name: &'static str,
        get: fn(&R) -> &Vec<T>,
        get_mut: fn(&mut R) -> &mut Vec<T>,
    ) -> &mut Self {
        let position = self.declare(name);
        self.lists.push(ListField {
            name,
            position,
            element: T::KIND,
            encode: Box::new(move |obj: &R| -> CodecResult<Vec<String>> {
                get(obj).iter().map(Scalar::encode).collect()
            }),
            decode: Box::new(move |obj: &mut R, items: Vec<String>| -> CodecResult<()> {
                let decoded = items
                    .iter()
                    .map(|item| T::decode(item))
                    .collect::<CodecResult<Vec<T>>>()?;
                *get_mut(obj) = decoded;
                Ok(())
            }),
        });
        self
    }

    /// Declare a map field stored as a hash at its own key.
    pub fn map<M: ScalarMap>(
        &mut self,
        name: &'static str,
        get: fn(&R) -> &M,
        get_mut: fn(&mut R) -> &mut M,
    ) -> &mut Self {
        let position = self.declare(name);
        self.maps.push(MapField {
            name,
            position,
            key: M::Key::KIND,
            value: M::Value::KIND,
            encode: Box::new(move |obj: &R| get(obj).encode_entries()),
            decode: Box::new(move |obj: &mut R, entries: Vec<(String, String)>| -> CodecResult<()> {
                let mut decoded = M::default();
                for (k, v) in &entries {
                    decoded.insert_entry(M::Key::decode(k)?, M::Value::decode(v)?);
                }
                *get_mut(obj) = decoded;
                Ok(())
            }),
        });
        self
    }

    /// Declare a nested record.
    ///
    /// A nested record without an identity field is embedded under the
    /// parent's key; one with an identity field gets its own key.
    pub fn nested<C: Record>(
        &mut self,
        name: &'static str,
        get: fn(&R) -> &C,
        get_mut: fn(&mut R) -> &mut C,
    ) -> &mut Self {
        let position = self.declare(name);
        match RecordPlan::<C>::compile() {
            Ok(plan) => {
                self.nested
                    .push(NestedField::new(name, position, Arc::new(plan), get, get_mut));
            }
            Err(err) => self.errors.push(err),
        }
        self
    }

    fn push_scalar<T: Scalar>(
        &mut self,
        name: &'static str,
        get: fn(&R) -> &T,
        get_mut: fn(&mut R) -> &mut T,
        identity: bool,
    ) -> &mut Self {
        let position = self.declare(name);
        self.scalars.push(ScalarField {
            name,
            position,
            kind: T::KIND,
            identity,
            encode: Box::new(move |obj: &R| get(obj).encode()),
            decode: Box::new(move |obj: &mut R, wire: &str| -> CodecResult<()> {
                *get_mut(obj) = T::decode(wire)?;
                Ok(())
            }),
        });
        self
    }

    fn declare(&mut self, name: &'static str) -> usize {
        self.names.push(name);
        self.names.len() - 1
    }

    /// Validate the declarations and build the plan.
    pub(crate) fn finish(self) -> Result<RecordPlan<R>, SchemaError> {
        validate_name(self.type_name, self.type_name)?;
        if let Some(err) = self.errors.into_iter().next() {
            return Err(err);
        }

        let mut seen = HashSet::new();
        for name in &self.names {
            validate_name(self.type_name, name)?;
            if !seen.insert(*name) {
                return Err(SchemaError::DuplicateField {
                    type_name: self.type_name.to_string(),
                    field: name.to_string(),
                });
            }
        }

        let mut identities = self.scalars.iter().enumerate().filter(|(_, f)| f.identity);
        let identity = identities.next();
        if let (Some((_, first)), Some((_, second))) = (identity, identities.next()) {
            return Err(SchemaError::DuplicateIdentity {
                type_name: self.type_name.to_string(),
                first: first.name.to_string(),
                second: second.name.to_string(),
            });
        }
        let identity = identity.map(|(index, _)| index);

        let mut embedded = HashSet::new();
        for child in self.nested.iter().filter(|c| !c.is_keyed()) {
            if !embedded.insert(child.type_name()) {
                return Err(SchemaError::DuplicateEmbeddedType {
                    type_name: self.type_name.to_string(),
                    nested_type: child.type_name().to_string(),
                });
            }
        }

        Ok(RecordPlan {
            type_name: self.type_name,
            key_field_index: identity.map(|i| self.scalars[i].position),
            identity,
            scalars: self.scalars,
            lists: self.lists,
            maps: self.maps,
            nested: self.nested,
        })
    }
}

fn validate_name(type_name: &str, name: &str) -> Result<(), SchemaError> {
    let reason = if name.is_empty() {
        Some("name is empty")
    } else if name.chars().any(|c| c.is_whitespace() || matches!(c, '{' | '}' | ':' | '.')) {
        Some("name contains a reserved character")
    } else if name == HASH_FIELD {
        Some("name is reserved for the freshness digest")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(SchemaError::InvalidName {
            type_name: type_name.to_string(),
            name: name.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}
