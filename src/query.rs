use std::cmp::Ordering;
use std::ops::Index;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::manager::Manager;
use crate::model::Instance;
use crate::schema::Schema;
use crate::value::{Input, Key, Value};

/// Sort direction for [`Query::order_by`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

/// A chainable, read-only view over a manager's collection.
///
/// The collection is snapshotted (ascending by pk) when the query is
/// built; later manager mutations are not visible. Filters are
/// conjunctive — each `filter` call narrows the previous result — and
/// every combinator returns a new query, never mutating the manager or
/// its instances.
#[derive(Debug, Clone)]
pub struct Query {
    schema: Arc<Schema>,
    items: Vec<Instance>,
}

impl Query {
    pub(crate) fn new(manager: &Manager) -> Self {
        Query {
            schema: Arc::clone(manager.schema()),
            items: manager.instances(),
        }
    }

    /// Keep instances whose `field` equals `input`, after casting `input`
    /// through the field. Foreign-key filters compare by referenced pk, so
    /// a raw pk value and an instance reference match the same rows.
    /// `"pk"` filters on the derived primary key.
    pub fn filter(mut self, field: &str, input: impl Into<Input>) -> Result<Query> {
        let input = input.into();

        if field == "pk" {
            let target = self.pk_key(input)?;
            self.items.retain(|instance| instance.pk() == target);
            return Ok(self);
        }

        let descriptor = self
            .schema
            .field(field)
            .ok_or_else(|| Error::UnknownField {
                model: self.schema.name().to_string(),
                field: field.to_string(),
            })?;
        let target = descriptor.cast(field, input)?;

        self.items.retain(|instance| {
            instance.get(field).unwrap_or(&Value::None) == &target
        });
        Ok(self)
    }

    fn pk_key(&self, input: Input) -> Result<Key> {
        match input {
            Input::Reference(key) => Ok(key),
            Input::Value(value) => match self.schema.pk_fields() {
                [name] => {
                    let field = self.schema.field(name).ok_or_else(|| Error::UnknownField {
                        model: self.schema.name().to_string(),
                        field: name.clone(),
                    })?;
                    Ok(Key::single(field.cast(name, Input::Value(value))?))
                }
                _ => Err(Error::Cast {
                    field: "pk".to_string(),
                    expected: "composite key",
                    given: value.to_string(),
                }),
            },
        }
    }

    /// Stable sort by the named field(s), `"pk"` included. `Order::Desc`
    /// reverses the whole ordering.
    pub fn order_by(mut self, fields: &[&str], order: Order) -> Result<Query> {
        for field in fields {
            if *field != "pk" && self.schema.field(field).is_none() {
                return Err(Error::UnknownField {
                    model: self.schema.name().to_string(),
                    field: field.to_string(),
                });
            }
        }

        self.items.sort_by(|a, b| {
            for field in fields {
                let ordering = if *field == "pk" {
                    a.pk().cmp(&b.pk())
                } else {
                    a.get(field)
                        .unwrap_or(&Value::None)
                        .cmp(b.get(field).unwrap_or(&Value::None))
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });

        if order == Order::Desc {
            self.items.reverse();
        }
        Ok(self)
    }

    /// The materialized, ordered result.
    pub fn instances(&self) -> &[Instance] {
        &self.items
    }

    pub fn count(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Instance> {
        self.items.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Instance> {
        self.items.iter()
    }

    /// Exactly one result, or a lookup error: [`Error::NotFound`] on zero
    /// matches, [`Error::MultipleResults`] on more than one.
    pub fn one(mut self) -> Result<Instance> {
        match self.items.len() {
            1 => Ok(self.items.remove(0)),
            0 => Err(Error::NotFound {
                model: self.schema.name().to_string(),
            }),
            count => Err(Error::MultipleResults {
                model: self.schema.name().to_string(),
                count,
            }),
        }
    }
}

impl Index<usize> for Query {
    type Output = Instance;

    fn index(&self, index: usize) -> &Instance {
        &self.items[index]
    }
}

impl IntoIterator for Query {
    type Item = Instance;
    type IntoIter = std::vec::IntoIter<Instance>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a Query {
    type Item = &'a Instance;
    type IntoIter = std::slice::Iter<'a, Instance>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
