//! Account storage.
//!
//! Values live in per-(address, domain) maps while a program runs. Only
//! [`InMemoryStorage::commit`] turns them into [`StoredValue`] snapshots in
//! the [`Ledger`], and it writes keys in sorted order so that two runs
//! with the same effects produce the same write log.
//!
//! Reads hand out shared handles, so a value read from a domain may change
//! in place without another write. Commit therefore snapshots every cached
//! domain and writes the keys whose snapshot differs from the ledger.

use crate::{
    language::{
        ast::{CompositeKind, PathDomain},
        location::Address,
    },
    runtime::{
        error::{RuntimeError, RuntimeResult},
        value::{ArrayValue, CompositeValue, DictionaryValue, PathValue, Value},
    },
    sema::ty::{CompositeType, PrimitiveType, Type},
};
use indexmap::IndexMap;
use num_bigint::BigInt;
use std::{collections::BTreeMap, fmt, sync::Arc};
use tracing::{debug, trace};

/// Collaborator the interpreter reads and writes account storage through.
pub trait Storage {
    fn read_stored(&mut self, address: Address, domain: PathDomain, identifier: &str) -> RuntimeResult<Option<Value>>;

    /// `None` removes the value.
    fn write_value(
        &mut self,
        address: Address,
        domain: PathDomain,
        identifier: &str,
        value: Option<Value>,
    ) -> RuntimeResult<()>;
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StorageKey {
    pub address: Address,
    pub domain: PathDomain,
    pub identifier: String,
}

impl StorageKey {
    pub fn new(address: Address, domain: PathDomain, identifier: impl Into<String>) -> Self {
        Self {
            address,
            domain,
            identifier: identifier.into(),
        }
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.address, self.domain.identifier(), self.identifier)
    }
}

/// Owned, handle-free snapshot of a storable value.
#[derive(Clone, Debug, PartialEq)]
pub enum StoredValue {
    Void,
    Nil,
    Some(Box<StoredValue>),
    Bool(bool),
    String(String),
    Character(String),
    Address(Address),
    Path(PathValue),
    Integer { ty: PrimitiveType, value: BigInt },
    Fixed { ty: PrimitiveType, value: i128 },
    Array { ty: Type, elements: Vec<StoredValue> },
    Dictionary { ty: Type, entries: Vec<(StoredValue, StoredValue)> },
    Composite { ty: Arc<CompositeType>, fields: IndexMap<String, StoredValue> },
}

impl StoredValue {
    /// Snapshots `value`. References, functions and moved-out slots cannot
    /// be stored.
    pub fn capture(value: &Value) -> RuntimeResult<StoredValue> {
        Ok(match value {
            Value::Void => StoredValue::Void,
            Value::Nil => StoredValue::Nil,
            Value::Some(inner) => StoredValue::Some(Box::new(StoredValue::capture(inner)?)),
            Value::Bool(value) => StoredValue::Bool(*value),
            Value::String(value) => StoredValue::String(value.clone()),
            Value::Character(value) => StoredValue::Character(value.clone()),
            Value::Address(address) => StoredValue::Address(*address),
            Value::Path(path) => StoredValue::Path(path.clone()),
            Value::Integer { ty, value } => StoredValue::Integer {
                ty: *ty,
                value: value.clone(),
            },
            Value::Fixed { ty, value } => StoredValue::Fixed { ty: *ty, value: *value },
            Value::Array(array) => {
                let data = array.borrow();
                StoredValue::Array {
                    ty: data.ty.clone(),
                    elements: data
                        .elements
                        .iter()
                        .map(StoredValue::capture)
                        .collect::<RuntimeResult<_>>()?,
                }
            }
            Value::Dictionary(dictionary) => {
                let data = dictionary.borrow();
                StoredValue::Dictionary {
                    ty: data.ty.clone(),
                    entries: data
                        .entries
                        .values()
                        .map(|(key, value)| Ok((StoredValue::capture(key)?, StoredValue::capture(value)?)))
                        .collect::<RuntimeResult<_>>()?,
                }
            }
            Value::Composite(composite) => {
                let data = composite.borrow();
                if data.ty.kind == CompositeKind::Contract {
                    return Err(RuntimeError::NonStorableValue {
                        ty: Type::Composite(Arc::clone(&data.ty)),
                    });
                }
                StoredValue::Composite {
                    ty: Arc::clone(&data.ty),
                    fields: data
                        .fields
                        .iter()
                        .map(|(name, value)| Ok((name.clone(), StoredValue::capture(value)?)))
                        .collect::<RuntimeResult<_>>()?,
                }
            }
            Value::Reference(_) | Value::Function(_) | Value::Moved => {
                return Err(RuntimeError::NonStorableValue {
                    ty: value.dynamic_type(),
                })
            }
        })
    }

    /// Materializes a fresh value with its own handles.
    pub fn restore(&self) -> Value {
        match self {
            StoredValue::Void => Value::Void,
            StoredValue::Nil => Value::Nil,
            StoredValue::Some(inner) => Value::some(inner.restore()),
            StoredValue::Bool(value) => Value::Bool(*value),
            StoredValue::String(value) => Value::String(value.clone()),
            StoredValue::Character(value) => Value::Character(value.clone()),
            StoredValue::Address(address) => Value::Address(*address),
            StoredValue::Path(path) => Value::Path(path.clone()),
            StoredValue::Integer { ty, value } => Value::Integer {
                ty: *ty,
                value: value.clone(),
            },
            StoredValue::Fixed { ty, value } => Value::Fixed { ty: *ty, value: *value },
            StoredValue::Array { ty, elements } => Value::Array(ArrayValue::new(
                ty.clone(),
                elements.iter().map(StoredValue::restore).collect(),
            )),
            StoredValue::Dictionary { ty, entries } => {
                let entries = entries
                    .iter()
                    .filter_map(|(key, value)| {
                        let key = key.restore();
                        Some((key.dictionary_key()?, (key, value.restore())))
                    })
                    .collect();
                Value::Dictionary(DictionaryValue::new(ty.clone(), entries))
            }
            StoredValue::Composite { ty, fields } => Value::Composite(CompositeValue::new(
                Arc::clone(ty),
                fields
                    .iter()
                    .map(|(name, value)| (name.clone(), value.restore()))
                    .collect(),
            )),
        }
    }

    pub fn type_id(&self) -> Option<String> {
        match self {
            StoredValue::Composite { ty, .. } => Some(ty.id()),
            _ => None,
        }
    }
}

/// Whether `value` could be written to storage.
pub fn check_storable(value: &Value) -> RuntimeResult<()> {
    StoredValue::capture(value).map(|_| ())
}

/// Durable key-value store of committed values.
#[derive(Clone, Debug, Default)]
pub struct Ledger {
    entries: BTreeMap<StorageKey, StoredValue>,
    write_log: Vec<StorageKey>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &StorageKey) -> Option<&StoredValue> {
        self.entries.get(key)
    }

    pub fn set(&mut self, key: StorageKey, value: Option<StoredValue>) {
        match value {
            Some(value) => {
                self.entries.insert(key.clone(), value);
            }
            None => {
                self.entries.remove(&key);
            }
        }
        self.write_log.push(key);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &StorageKey> {
        self.entries.keys()
    }

    /// Every key written so far, in write order.
    pub fn write_log(&self) -> &[StorageKey] {
        &self.write_log
    }

    fn domain(&self, address: Address, domain: PathDomain) -> impl Iterator<Item = (&StorageKey, &StoredValue)> {
        self.entries
            .iter()
            .filter(move |(key, _)| key.address == address && key.domain == domain)
    }
}

#[derive(Debug, Default)]
struct DomainMap {
    values: BTreeMap<String, Value>,
}

/// [`Storage`] over a [`Ledger`], caching one map per (address, domain).
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    ledger: Ledger,
    domains: BTreeMap<(Address, PathDomain), DomainMap>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ledger(ledger: Ledger) -> Self {
        Self {
            ledger,
            domains: BTreeMap::new(),
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn into_ledger(self) -> Ledger {
        self.ledger
    }

    fn domain_map(&mut self, address: Address, domain: PathDomain) -> &mut DomainMap {
        let ledger = &self.ledger;
        self.domains.entry((address, domain)).or_insert_with(|| {
            let values = ledger
                .domain(address, domain)
                .map(|(key, stored)| (key.identifier.clone(), stored.restore()))
                .collect();
            DomainMap { values }
        })
    }

    /// Writes every cached value that differs from the ledger, in key
    /// order. Returns the keys written.
    pub fn commit(&mut self) -> RuntimeResult<Vec<StorageKey>> {
        let mut writes: BTreeMap<StorageKey, Option<StoredValue>> = BTreeMap::new();
        for ((address, domain), map) in &self.domains {
            for (key, _) in self.ledger.domain(*address, *domain) {
                if !map.values.contains_key(&key.identifier) {
                    writes.insert(key.clone(), None);
                }
            }
            for (identifier, value) in &map.values {
                let key = StorageKey::new(*address, *domain, identifier.clone());
                let snapshot = StoredValue::capture(value)?;
                if self.ledger.get(&key) != Some(&snapshot) {
                    writes.insert(key, Some(snapshot));
                }
            }
        }

        let keys: Vec<StorageKey> = writes.keys().cloned().collect();
        for (key, value) in writes {
            self.ledger.set(key, value);
        }
        debug!(writes = keys.len(), "committed storage");
        Ok(keys)
    }
}

impl Storage for InMemoryStorage {
    fn read_stored(&mut self, address: Address, domain: PathDomain, identifier: &str) -> RuntimeResult<Option<Value>> {
        let value = self.domain_map(address, domain).values.get(identifier).cloned();
        trace!(%address, domain = domain.identifier(), identifier, found = value.is_some(), "storage read");
        Ok(value)
    }

    fn write_value(
        &mut self,
        address: Address,
        domain: PathDomain,
        identifier: &str,
        value: Option<Value>,
    ) -> RuntimeResult<()> {
        if let Some(value) = &value {
            check_storable(value)?;
        }
        let map = self.domain_map(address, domain);
        match value {
            Some(value) => {
                map.values.insert(identifier.to_string(), value);
            }
            None => {
                map.values.remove(identifier);
            }
        }
        Ok(())
    }
}
