//! Builtin entitlements and the members of builtin container types.
//!
//! These are process-wide and immutable; checker and interpreter instances
//! on different threads share them.

use crate::sema::{
    access::{Access, Authorization, EntitlementSetAccess, EntitlementType},
    ty::{PrimitiveType, Type},
};
use std::sync::LazyLock;

pub static MUTATE: LazyLock<EntitlementType> = LazyLock::new(|| EntitlementType::builtin("Mutate"));
pub static INSERT: LazyLock<EntitlementType> = LazyLock::new(|| EntitlementType::builtin("Insert"));
pub static REMOVE: LazyLock<EntitlementType> = LazyLock::new(|| EntitlementType::builtin("Remove"));

static MUTATE_OR_INSERT: LazyLock<Access> = LazyLock::new(|| {
    Access::EntitlementSet(EntitlementSetAccess::disjunction([
        MUTATE.clone(),
        INSERT.clone(),
    ]))
});

static MUTATE_OR_REMOVE: LazyLock<Access> = LazyLock::new(|| {
    Access::EntitlementSet(EntitlementSetAccess::disjunction([
        MUTATE.clone(),
        REMOVE.clone(),
    ]))
});

pub fn builtin_entitlement(name: &str) -> Option<EntitlementType> {
    match name {
        "Mutate" => Some(MUTATE.clone()),
        "Insert" => Some(INSERT.clone()),
        "Remove" => Some(REMOVE.clone()),
        _ => None,
    }
}

/// `Mutate`, or both `Insert` and `Remove`: what index assignment through a
/// reference needs.
pub fn permits_index_assignment(authorization: &Authorization) -> bool {
    authorization.grants(&Authorization::conjunction([MUTATE.clone()]))
        || authorization.grants(&Authorization::conjunction([INSERT.clone(), REMOVE.clone()]))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuiltinMemberKind {
    Field,
    Function,
}

#[derive(Clone, Debug)]
pub struct BuiltinMember {
    pub kind: BuiltinMemberKind,
    pub ty: Type,
    pub access: Access,
}

impl BuiltinMember {
    fn field(ty: Type) -> Self {
        Self {
            kind: BuiltinMemberKind::Field,
            ty,
            access: Access::ALL,
        }
    }

    fn function(params: Vec<Type>, return_type: Type) -> Self {
        Self {
            kind: BuiltinMemberKind::Function,
            ty: Type::function(params, return_type),
            access: Access::ALL,
        }
    }

    fn requiring(mut self, access: &Access) -> Self {
        self.access = access.clone();
        self
    }
}

/// Members of `[T]` and `[T; N]`.
pub fn array_member(array: &Type, name: &str) -> Option<BuiltinMember> {
    let element = array.element_type()?.clone();
    let variable_sized = matches!(array, Type::VariableSized(_));

    let member = match name {
        "length" => BuiltinMember::field(Type::INT),
        "contains" => BuiltinMember::function(vec![element], Type::BOOL),
        "firstIndex" => BuiltinMember::function(vec![element], Type::optional(Type::INT)),
        "concat" if variable_sized => {
            BuiltinMember::function(vec![array.clone()], array.clone())
        }
        "append" if variable_sized => {
            BuiltinMember::function(vec![element], Type::VOID).requiring(&MUTATE_OR_INSERT)
        }
        "appendAll" if variable_sized => {
            BuiltinMember::function(vec![array.clone()], Type::VOID).requiring(&MUTATE_OR_INSERT)
        }
        "insert" if variable_sized => {
            BuiltinMember::function(vec![Type::INT, element], Type::VOID).requiring(&MUTATE_OR_INSERT)
        }
        "remove" if variable_sized => {
            BuiltinMember::function(vec![Type::INT], element).requiring(&MUTATE_OR_REMOVE)
        }
        "removeFirst" | "removeLast" if variable_sized => {
            BuiltinMember::function(vec![], element).requiring(&MUTATE_OR_REMOVE)
        }
        _ => return None,
    };
    Some(member)
}

/// Array functions that compare elements.
pub fn requires_equatable_element(name: &str) -> bool {
    matches!(name, "contains" | "firstIndex")
}

/// Array and dictionary members that would copy or compare resources.
pub fn invalid_for_resource_containers(name: &str) -> bool {
    matches!(name, "contains" | "firstIndex" | "concat" | "appendAll" | "values")
}

/// Members of `{K: V}`.
pub fn dictionary_member(dictionary: &Type, name: &str) -> Option<BuiltinMember> {
    let Type::Dictionary { key, value } = dictionary else {
        return None;
    };
    let (key, value) = ((**key).clone(), (**value).clone());

    let member = match name {
        "length" => BuiltinMember::field(Type::INT),
        "keys" => BuiltinMember::field(Type::array(key)),
        "values" => BuiltinMember::field(Type::array(value)),
        "containsKey" => BuiltinMember::function(vec![key], Type::BOOL),
        "insert" => BuiltinMember::function(vec![key, value.clone()], Type::optional(value))
            .requiring(&MUTATE_OR_INSERT),
        "remove" => BuiltinMember::function(vec![key], Type::optional(value))
            .requiring(&MUTATE_OR_REMOVE),
        _ => return None,
    };
    Some(member)
}

pub fn string_member(name: &str) -> Option<BuiltinMember> {
    match name {
        "length" => Some(BuiltinMember::field(Type::INT)),
        "concat" => Some(BuiltinMember::function(vec![Type::STRING], Type::STRING)),
        _ => None,
    }
}

/// Numeric conversion functions such as `UInt8(x)`.
pub fn conversion_function(name: &str) -> Option<PrimitiveType> {
    PrimitiveType::from_name(name).filter(|primitive| {
        primitive.is_numeric() && !primitive.is_abstract_numeric()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mutating_array_members_require_entitlements() {
        let array = Type::array(Type::INT);
        let append = array_member(&array, "append").unwrap();
        assert!(append.access.is_entitled());
        assert!(Authorization::conjunction([INSERT.clone()]).permits(&append.access));
        assert!(Authorization::conjunction([MUTATE.clone()]).permits(&append.access));
        assert!(!Authorization::conjunction([REMOVE.clone()]).permits(&append.access));

        let remove_last = array_member(&array, "removeLast").unwrap();
        assert!(Authorization::conjunction([REMOVE.clone()]).permits(&remove_last.access));
        assert!(!Authorization::Unauthorized.permits(&remove_last.access));

        assert!(Authorization::Unauthorized.permits(&array_member(&array, "contains").unwrap().access));
    }

    #[test]
    fn resource_container_members() {
        assert!(invalid_for_resource_containers("concat"));
        assert!(!invalid_for_resource_containers("append"));
        assert!(requires_equatable_element("firstIndex"));
    }

    #[test]
    fn constant_sized_arrays_cannot_grow() {
        let array = Type::constant_array(Type::INT, 2);
        assert!(array_member(&array, "append").is_none());
        assert!(array_member(&array, "length").is_some());
    }

    #[test]
    fn index_assignment_authorization() {
        assert!(permits_index_assignment(&Authorization::conjunction([MUTATE.clone()])));
        assert!(permits_index_assignment(&Authorization::conjunction([
            INSERT.clone(),
            REMOVE.clone()
        ])));
        assert!(!permits_index_assignment(&Authorization::conjunction([INSERT.clone()])));
        assert!(!permits_index_assignment(&Authorization::Unauthorized));
    }

    #[test]
    fn conversion_functions_are_concrete_numbers() {
        assert_eq!(conversion_function("UInt"), Some(PrimitiveType::UInt));
        assert_eq!(conversion_function("Integer"), None);
        assert_eq!(conversion_function("String"), None);
    }
}
