//! Least common supertype of the operand types of heterogeneous literals
//! and conditional expressions.

use crate::sema::ty::{InterfaceType, PrimitiveType, Type};
use std::sync::Arc;

/// Computes the least common supertype of `types`.
///
/// `None` means there is no acceptable supertype and the program needs an
/// explicit type annotation: resource and non-resource operands are mixed,
/// or composite operands share no interface.
pub fn least_common_supertype(types: &[Type]) -> Option<Type> {
    if types.iter().any(|ty| matches!(ty, Type::Invalid)) {
        return Some(Type::Invalid);
    }

    let operands: Vec<&Type> = types.iter().filter(|ty| !ty.is_never()).collect();
    let Some(first) = operands.first() else {
        return Some(Type::NEVER);
    };
    if operands.iter().all(|ty| *ty == *first) {
        return Some((*first).clone());
    }

    let resource = first.is_resource();
    if operands.iter().any(|ty| ty.is_resource() != resource) {
        return None;
    }

    // One of the operands already covers all the others.
    if let Some(covering) = operands
        .iter()
        .find(|candidate| operands.iter().all(|ty| ty.is_subtype_of(candidate)))
    {
        return Some((*covering).clone());
    }

    if operands.iter().any(|ty| matches!(ty, Type::Optional(_))) {
        let unwrapped: Vec<Type> = operands
            .iter()
            .map(|ty| match ty {
                Type::Optional(inner) => (**inner).clone(),
                other => (*other).clone(),
            })
            .collect();
        return least_common_supertype(&unwrapped).map(Type::optional);
    }

    if let Some(numeric) = numeric_supertype(&operands) {
        return Some(numeric);
    }

    if operands.iter().all(|ty| is_nominal(ty)) {
        return common_interfaces(&operands).map(Type::intersection);
    }

    if let Some(container) = container_supertype(&operands, resource) {
        return container;
    }

    if resource {
        return Some(Type::ANY_RESOURCE);
    }
    if operands.iter().all(|ty| ty.is_hashable()) {
        return Some(Type::HASHABLE_STRUCT);
    }
    Some(Type::ANY_STRUCT)
}

fn numeric_supertype(operands: &[&Type]) -> Option<Type> {
    let primitives: Vec<PrimitiveType> = operands
        .iter()
        .map(|ty| ty.primitive().filter(|primitive| primitive.is_numeric()))
        .collect::<Option<_>>()?;

    let all = |predicate: fn(PrimitiveType) -> bool| primitives.iter().all(|p| predicate(*p));

    let supertype = if all(PrimitiveType::is_signed_integer) {
        PrimitiveType::Int
    } else if all(PrimitiveType::is_unsigned_integer) {
        PrimitiveType::UInt
    } else if all(PrimitiveType::is_integer) {
        PrimitiveType::Integer
    } else if all(PrimitiveType::is_fixed_point) {
        PrimitiveType::FixedPoint
    } else if all(|p| PrimitiveType::SignedNumber.contains(p)) {
        PrimitiveType::SignedNumber
    } else {
        PrimitiveType::Number
    };
    Some(Type::Primitive(supertype))
}

fn is_nominal(ty: &Type) -> bool {
    matches!(
        ty,
        Type::Composite(_) | Type::Interface(_) | Type::Intersection(_)
    )
}

fn conformance_set(ty: &Type) -> Vec<Arc<InterfaceType>> {
    match ty {
        Type::Composite(composite) => composite.effective_conformances(),
        Type::Interface(interface) => interface.self_and_ancestors(),
        Type::Intersection(intersection) => intersection.effective_interfaces(),
        _ => Vec::new(),
    }
}

/// Interfaces every operand conforms to, without those implied by another
/// member of the result.
fn common_interfaces(operands: &[&Type]) -> Option<Vec<Arc<InterfaceType>>> {
    let (first, rest) = operands.split_first()?;
    let rest_sets: Vec<Vec<String>> = rest
        .iter()
        .map(|ty| conformance_set(ty).iter().map(|interface| interface.id()).collect())
        .collect();

    let common: Vec<Arc<InterfaceType>> = conformance_set(first)
        .into_iter()
        .filter(|interface| {
            let id = interface.id();
            rest_sets.iter().all(|set| set.contains(&id))
        })
        .collect();

    let minimal: Vec<Arc<InterfaceType>> = common
        .iter()
        .filter(|candidate| {
            let id = candidate.id();
            !common.iter().any(|other| {
                other.id() != id
                    && other
                        .self_and_ancestors()
                        .iter()
                        .any(|ancestor| ancestor.id() == id)
            })
        })
        .cloned()
        .collect();

    (!minimal.is_empty()).then_some(minimal)
}

/// `Some(None)` when the operands are all containers of one shape but their
/// elements have no supertype; `None` when they are not all containers of
/// one shape.
fn container_supertype(operands: &[&Type], resource: bool) -> Option<Option<Type>> {
    if operands.iter().all(|ty| matches!(ty, Type::VariableSized(_))) {
        let elements: Vec<Type> = operands
            .iter()
            .filter_map(|ty| ty.element_type().cloned())
            .collect();
        return Some(least_common_supertype(&elements).map(Type::array));
    }

    if operands
        .iter()
        .all(|ty| matches!(ty, Type::ConstantSized { .. }))
    {
        let sizes: Vec<u64> = operands
            .iter()
            .filter_map(|ty| match ty {
                Type::ConstantSized { size, .. } => Some(*size),
                _ => None,
            })
            .collect();
        if sizes.windows(2).any(|pair| pair[0] != pair[1]) {
            return Some(Some(Type::top_for(resource)));
        }
        let elements: Vec<Type> = operands
            .iter()
            .filter_map(|ty| ty.element_type().cloned())
            .collect();
        let size = sizes.first().copied().unwrap_or_default();
        return Some(least_common_supertype(&elements).map(|element| Type::constant_array(element, size)));
    }

    if operands
        .iter()
        .all(|ty| matches!(ty, Type::Dictionary { .. }))
    {
        let mut keys = Vec::new();
        let mut values = Vec::new();
        for ty in operands {
            if let Type::Dictionary { key, value } = ty {
                keys.push((**key).clone());
                values.push((**value).clone());
            }
        }
        let key = least_common_supertype(&keys);
        let value = least_common_supertype(&values);
        return Some(key.zip(value).map(|(key, value)| Type::dictionary(key, value)));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        language::{ast::CompositeKind, location::Location},
        sema::ty::CompositeType,
    };

    fn location() -> Location {
        Location::script("test")
    }

    fn interface(name: &str, parents: Vec<Arc<InterfaceType>>) -> Arc<InterfaceType> {
        let interface = Arc::new(InterfaceType::new(location(), name, CompositeKind::Structure));
        interface.set_conformances(parents);
        interface
    }

    fn composite(name: &str, kind: CompositeKind, interfaces: Vec<Arc<InterfaceType>>) -> Type {
        let composite = Arc::new(CompositeType::new(location(), name, kind));
        composite.set_conformances(interfaces);
        Type::Composite(composite)
    }

    fn primitive(primitive: PrimitiveType) -> Type {
        Type::Primitive(primitive)
    }

    #[test]
    fn mixed_simple_values() {
        assert_eq!(
            least_common_supertype(&[Type::INT, Type::BOOL]),
            Some(Type::HASHABLE_STRUCT)
        );
    }

    #[test]
    fn integers() {
        assert_eq!(least_common_supertype(&[Type::INT, Type::INT]), Some(Type::INT));
        assert_eq!(
            least_common_supertype(&[Type::UINT, Type::INT, Type::INT]),
            Some(Type::INTEGER)
        );
        assert_eq!(
            least_common_supertype(&[primitive(PrimitiveType::Int8), primitive(PrimitiveType::Int64)]),
            Some(Type::INT)
        );
        assert_eq!(
            least_common_supertype(&[primitive(PrimitiveType::UInt8), primitive(PrimitiveType::Word64)]),
            Some(Type::UINT)
        );
        assert_eq!(
            least_common_supertype(&[Type::FIX64, primitive(PrimitiveType::UFix64)]),
            Some(primitive(PrimitiveType::FixedPoint))
        );
        assert_eq!(
            least_common_supertype(&[Type::UINT, primitive(PrimitiveType::UFix64)]),
            Some(primitive(PrimitiveType::Number))
        );
    }

    #[test]
    fn values_with_nil() {
        assert_eq!(
            least_common_supertype(&[Type::STRING, Type::nil(), Type::nil()]),
            Some(Type::optional(Type::STRING))
        );
    }

    #[test]
    fn common_interface_values() {
        let i1 = interface("I1", vec![]);
        let i2 = interface("I2", vec![]);
        let i3 = interface("I3", vec![]);
        let foo = composite("Foo", CompositeKind::Structure, vec![i1.clone(), i2.clone()]);
        let bar = composite("Bar", CompositeKind::Structure, vec![i2.clone(), i3.clone()]);
        let baz = composite("Baz", CompositeKind::Structure, vec![i1, i2.clone(), i3]);
        let supertype = least_common_supertype(&[foo, bar, baz]).expect("supertype");
        assert_eq!(supertype.id(), Type::intersection(vec![i2]).id());
    }

    #[test]
    fn common_inherited_interface() {
        let i1 = interface("I1", vec![]);
        let i2 = interface("I2", vec![i1.clone()]);
        let i3 = interface("I3", vec![i1.clone()]);
        let foo = composite("Foo", CompositeKind::Structure, vec![i2]);
        let bar = composite("Bar", CompositeKind::Structure, vec![i3]);
        assert_eq!(
            least_common_supertype(&[foo, bar]),
            Some(Type::intersection(vec![i1]))
        );
    }

    #[test]
    fn redundant_ancestors_are_dropped() {
        let i1 = interface("I1", vec![]);
        let i2 = interface("I2", vec![i1]);
        let foo = composite("Foo", CompositeKind::Structure, vec![i2.clone()]);
        let bar = composite("Bar", CompositeKind::Structure, vec![i2.clone()]);
        assert_eq!(least_common_supertype(&[foo, bar]), Some(Type::intersection(vec![i2])));
    }

    #[test]
    fn implicit_covariance_one_level() {
        let foo = interface("Foo", vec![]);
        let bar = composite("Bar", CompositeKind::Structure, vec![foo.clone()]);
        let baz = composite("Baz", CompositeKind::Structure, vec![foo.clone()]);
        assert_eq!(
            least_common_supertype(&[Type::array(bar), Type::array(baz)]),
            Some(Type::array(Type::intersection(vec![foo])))
        );
    }

    #[test]
    fn nested_containers() {
        let nested = |inner: Type| Type::array(Type::array(inner));
        assert_eq!(
            least_common_supertype(&[
                nested(Type::INT),
                nested(Type::STRING),
                nested(primitive(PrimitiveType::UFix64)),
            ]),
            Some(nested(Type::HASHABLE_STRUCT))
        );

        let sized = |inner: Type, size| Type::array(Type::constant_array(inner, size));
        assert_eq!(
            least_common_supertype(&[sized(Type::INT, 2), sized(Type::STRING, 2), sized(Type::FIX64, 2)]),
            Some(sized(Type::HASHABLE_STRUCT, 2))
        );
        assert_eq!(
            least_common_supertype(&[sized(Type::INT, 2), sized(Type::STRING, 3), sized(Type::FIX64, 2)]),
            Some(Type::array(Type::ANY_STRUCT))
        );
    }

    #[test]
    fn dictionary_keys() {
        assert_eq!(
            least_common_supertype(&[
                Type::dictionary(Type::INT, Type::INT),
                Type::dictionary(Type::STRING, Type::INT),
            ]),
            Some(Type::dictionary(Type::HASHABLE_STRUCT, Type::INT))
        );
    }

    #[test]
    fn no_supertype() {
        let resource = composite("Foo", CompositeKind::Resource, vec![]);
        let structure = composite("Bar", CompositeKind::Structure, vec![]);
        assert_eq!(least_common_supertype(&[resource.clone(), structure.clone()]), None);
        assert_eq!(
            least_common_supertype(&[structure, composite("Baz", CompositeKind::Structure, vec![])]),
            None
        );
        assert_eq!(
            least_common_supertype(&[
                Type::dictionary(Type::INT, resource),
                Type::dictionary(Type::INT, Type::INT),
            ]),
            None
        );
    }

    #[test]
    fn covering_operand_and_never() {
        let foo = interface("Foo", vec![]);
        let bar = composite("Bar", CompositeKind::Structure, vec![foo.clone()]);
        let intersection = Type::intersection(vec![foo]);
        assert_eq!(
            least_common_supertype(&[intersection.clone(), bar]),
            Some(intersection.clone())
        );
        assert_eq!(
            least_common_supertype(&[intersection.clone(), Type::nil()]),
            Some(Type::optional(intersection))
        );
        assert_eq!(least_common_supertype(&[Type::NEVER, Type::STRING]), Some(Type::STRING));
        assert_eq!(least_common_supertype(&[]), Some(Type::NEVER));
    }
}
