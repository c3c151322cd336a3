//! Ephemeral and storage references.
//!
//! An ephemeral reference points at a value in memory and becomes invalid
//! once that value is moved or destroyed. A storage reference names an
//! account storage slot and looks the value up again on every access.

use crate::{
    language::location::Address,
    runtime::{
        error::{RuntimeError, RuntimeResult},
        storage::Storage,
        value::{PathValue, Value},
    },
    sema::{access::Authorization, ty::Type},
};
use std::fmt;
use tracing::trace;

#[derive(Clone, Debug)]
pub struct EphemeralReference {
    pub authorization: Authorization,
    pub borrowed_type: Type,
    target: Box<Value>,
    generation: Option<u64>,
}

impl EphemeralReference {
    pub fn new(authorization: Authorization, borrowed_type: Type, target: Value) -> Self {
        let generation = target.generation();
        Self {
            authorization,
            borrowed_type,
            target: Box::new(target),
            generation,
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.target.is_destroyed() && self.target.generation() == self.generation
    }

    pub fn dereference(&self) -> RuntimeResult<Value> {
        if !self.is_valid() {
            return Err(RuntimeError::InvalidatedResourceReference);
        }
        Ok((*self.target).clone())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageReference {
    pub authorization: Authorization,
    pub borrowed_type: Type,
    pub address: Address,
    pub path: PathValue,
}

impl StorageReference {
    /// Reads the slot. `Ok(None)` when it is empty; a stored value that no
    /// longer conforms to the borrowed type is an error.
    pub fn dereference(&self, storage: &mut dyn Storage) -> RuntimeResult<Option<Value>> {
        let Some(value) = storage.read_stored(self.address, self.path.domain, &self.path.identifier)? else {
            trace!(address = %self.address, path = %self.path, "storage reference target is empty");
            return Ok(None);
        };
        let actual = value.dynamic_type();
        if !actual.is_subtype_of(&self.borrowed_type) {
            let cause = RuntimeError::ForceCastTypeMismatch {
                expected: self.borrowed_type.clone(),
                actual,
            };
            return Err(RuntimeError::Dereference {
                address: self.address,
                path: self.path.clone(),
                cause: Some(Box::new(cause)),
            });
        }
        Ok(Some(value))
    }

    /// Like [`StorageReference::dereference`], for positions that need a value.
    pub fn dereference_required(&self, storage: &mut dyn Storage) -> RuntimeResult<Value> {
        self.dereference(storage)?.ok_or_else(|| RuntimeError::Dereference {
            address: self.address,
            path: self.path.clone(),
            cause: None,
        })
    }
}

#[derive(Clone, Debug)]
pub enum ReferenceValue {
    Ephemeral(EphemeralReference),
    Storage(StorageReference),
}

impl ReferenceValue {
    pub fn authorization(&self) -> &Authorization {
        match self {
            ReferenceValue::Ephemeral(reference) => &reference.authorization,
            ReferenceValue::Storage(reference) => &reference.authorization,
        }
    }

    pub fn borrowed_type(&self) -> &Type {
        match self {
            ReferenceValue::Ephemeral(reference) => &reference.borrowed_type,
            ReferenceValue::Storage(reference) => &reference.borrowed_type,
        }
    }

    pub fn static_type(&self) -> Type {
        Type::reference(self.authorization().clone(), self.borrowed_type().clone())
    }

    pub fn same_target(&self, other: &ReferenceValue) -> bool {
        match (self, other) {
            (ReferenceValue::Ephemeral(left), ReferenceValue::Ephemeral(right)) => {
                left.target.equals(&right.target)
            }
            (ReferenceValue::Storage(left), ReferenceValue::Storage(right)) => {
                left.address == right.address && left.path == right.path
            }
            _ => false,
        }
    }
}

impl fmt::Display for ReferenceValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReferenceValue::Ephemeral(reference) => write!(f, "&{}", reference.target),
            ReferenceValue::Storage(reference) => {
                write!(f, "StorageReference({}, {})", reference.address, reference.path)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        language::{ast::CompositeKind, location::Location},
        runtime::{storage::InMemoryStorage, value::CompositeValue},
        sema::ty::CompositeType,
    };
    use indexmap::IndexMap;
    use std::{error::Error as _, sync::Arc};

    fn resource() -> Value {
        let ty = CompositeType::new(Location::script("test"), "R", CompositeKind::Resource);
        Value::Composite(CompositeValue::new(Arc::new(ty), IndexMap::new()))
    }

    #[test]
    fn moving_the_referent_invalidates_the_reference() {
        let value = resource();
        let reference = EphemeralReference::new(Authorization::Unauthorized, value.dynamic_type(), value.clone());
        assert!(reference.dereference().is_ok());

        let _moved = value.transfer();
        assert_eq!(
            reference.dereference().unwrap_err(),
            RuntimeError::InvalidatedResourceReference
        );
    }

    #[test]
    fn destroying_the_referent_invalidates_the_reference() {
        let value = resource();
        let reference = EphemeralReference::new(Authorization::Unauthorized, value.dynamic_type(), value.clone());
        value.destroy();
        assert!(!reference.is_valid());
    }

    #[test]
    fn references_to_plain_values_stay_valid() {
        let reference = EphemeralReference::new(Authorization::Unauthorized, Type::INT, Value::int(3));
        assert_eq!(reference.dereference().unwrap().to_string(), "3");
    }

    #[test]
    fn storage_reference_reports_a_changed_type_with_its_cause() {
        let value = resource();
        let reference = StorageReference {
            authorization: Authorization::Unauthorized,
            borrowed_type: value.dynamic_type(),
            address: Address::from_u64(1),
            path: PathValue::storage("r"),
        };
        let mut storage = InMemoryStorage::new();
        storage
            .write_value(reference.address, reference.path.domain, "r", Some(Value::int(3)))
            .unwrap();

        let error = reference.dereference(&mut storage).unwrap_err();
        assert_eq!(
            error.to_string(),
            "failed to dereference /storage/r in account 0x0000000000000001: stored value changed type"
        );
        let RuntimeError::Dereference { cause: Some(cause), .. } = &error else {
            panic!("expected a dereference error with a cause, got {error:?}");
        };
        assert!(matches!(
            &**cause,
            RuntimeError::ForceCastTypeMismatch { expected, actual } if expected.id() == "S.test.R" && actual.id() == "Int"
        ));
        assert!(error.source().is_some());
    }

    #[test]
    fn empty_slot_has_no_cause() {
        let reference = StorageReference {
            authorization: Authorization::Unauthorized,
            borrowed_type: Type::INT,
            address: Address::from_u64(1),
            path: PathValue::storage("missing"),
        };
        let mut storage = InMemoryStorage::new();
        assert!(reference.dereference(&mut storage).unwrap().is_none());
        let error = reference.dereference_required(&mut storage).unwrap_err();
        assert!(matches!(error, RuntimeError::Dereference { cause: None, .. }));
        assert!(error.source().is_none());
    }
}
