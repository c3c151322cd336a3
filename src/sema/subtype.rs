use crate::sema::ty::{PrimitiveType, Type};

impl Type {
    /// Whether a value of type `self` may be used where `other` is expected.
    pub fn is_subtype_of(&self, other: &Type) -> bool {
        if matches!(self, Type::Invalid) || matches!(other, Type::Invalid) {
            return true;
        }
        if self.is_never() {
            return true;
        }

        match other {
            Type::Primitive(PrimitiveType::AnyStruct) => return !self.is_resource(),
            Type::Primitive(PrimitiveType::AnyResource) => return self.is_resource(),
            Type::Primitive(PrimitiveType::HashableStruct) => return self.is_hashable(),
            _ => {}
        }

        match (self, other) {
            (Type::Primitive(sub), Type::Primitive(sup)) => sup.contains(*sub),

            (Type::Optional(sub), Type::Optional(sup)) => sub.is_subtype_of(sup),
            (sub, Type::Optional(sup)) => sub.is_subtype_of(sup),

            (Type::VariableSized(sub), Type::VariableSized(sup)) => sub.is_subtype_of(sup),
            (
                Type::ConstantSized { element: sub, size: sub_size },
                Type::ConstantSized { element: sup, size: sup_size },
            ) => sub_size == sup_size && sub.is_subtype_of(sup),
            (
                Type::Dictionary { key: sub_key, value: sub_value },
                Type::Dictionary { key: sup_key, value: sup_value },
            ) => sub_key.is_subtype_of(sup_key) && sub_value.is_subtype_of(sup_value),

            (Type::Reference(sub), Type::Reference(sup)) => {
                sub.authorization.grants(&sup.authorization) && sub.ty.is_subtype_of(&sup.ty)
            }

            (Type::Function(sub), Type::Function(sup)) => {
                sub.params.len() == sup.params.len()
                    && sup
                        .params
                        .iter()
                        .zip(&sub.params)
                        .all(|(sup_param, sub_param)| sup_param.is_subtype_of(sub_param))
                    && sub.return_type.is_subtype_of(&sup.return_type)
            }

            (Type::Composite(sub), Type::Composite(sup)) => sub == sup,
            (Type::Composite(sub), Type::Interface(sup)) => {
                sub.kind == sup.kind && sub.conforms_to(sup)
            }
            (Type::Composite(sub), Type::Intersection(sup)) => sup
                .interfaces()
                .iter()
                .all(|interface| sub.kind == interface.kind && sub.conforms_to(interface)),

            (Type::Interface(sub), Type::Interface(sup)) => sub
                .self_and_ancestors()
                .iter()
                .any(|ancestor| ancestor.id() == sup.id()),
            (Type::Interface(sub), Type::Intersection(sup)) => {
                let available = sub.self_and_ancestors();
                sup.interfaces()
                    .iter()
                    .all(|needed| available.iter().any(|have| have.id() == needed.id()))
            }
            (Type::Intersection(sub), Type::Interface(sup)) => sub
                .effective_interfaces()
                .iter()
                .any(|have| have.id() == sup.id()),
            (Type::Intersection(sub), Type::Intersection(sup)) => {
                let available = sub.effective_interfaces();
                sup.interfaces()
                    .iter()
                    .all(|needed| available.iter().any(|have| have.id() == needed.id()))
            }

            (Type::Generic(sub), Type::Generic(sup)) => sub.name == sup.name,
            (Type::Generic(sub), sup) => sub.bound.as_ref().is_some_and(|bound| bound.is_subtype_of(sup)),

            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        language::{ast::CompositeKind, location::Location},
        sema::{
            access::{Authorization, EntitlementType},
            ty::{CompositeType, InterfaceType, PrimitiveType, Type},
        },
    };
    use std::sync::Arc;

    fn location() -> Location {
        Location::script("test")
    }

    fn interface(name: &str, parents: Vec<Arc<InterfaceType>>) -> Arc<InterfaceType> {
        let interface = Arc::new(InterfaceType::new(location(), name, CompositeKind::Structure));
        interface.set_conformances(parents);
        interface
    }

    fn entitlement(name: &str) -> EntitlementType {
        EntitlementType::new(location(), name)
    }

    #[test]
    fn numeric_types_are_not_implicitly_widened() {
        let int8 = Type::Primitive(PrimitiveType::Int8);
        assert!(!int8.is_subtype_of(&Type::INT));
        assert!(int8.is_subtype_of(&Type::INTEGER));
        assert!(Type::UINT.is_subtype_of(&Type::INTEGER));
        assert!(!Type::UINT.is_subtype_of(&Type::Primitive(PrimitiveType::SignedInteger)));
    }

    #[test]
    fn optionals_and_never() {
        assert!(Type::INT.is_subtype_of(&Type::optional(Type::INT)));
        assert!(Type::nil().is_subtype_of(&Type::optional(Type::STRING)));
        assert!(!Type::optional(Type::INT).is_subtype_of(&Type::INT));
        assert!(Type::NEVER.is_subtype_of(&Type::STRING));
    }

    #[test]
    fn resources_and_structs_do_not_mix() {
        let resource = Type::Composite(Arc::new(CompositeType::new(
            location(),
            "R",
            CompositeKind::Resource,
        )));
        assert!(resource.is_subtype_of(&Type::ANY_RESOURCE));
        assert!(!resource.is_subtype_of(&Type::ANY_STRUCT));
        assert!(!Type::INT.is_subtype_of(&Type::ANY_RESOURCE));
        assert!(Type::reference(Authorization::Unauthorized, resource).is_subtype_of(&Type::ANY_STRUCT));
    }

    #[test]
    fn composites_conform_transitively() {
        let i1 = interface("I1", vec![]);
        let i2 = interface("I2", vec![i1.clone()]);
        let foo = Arc::new(CompositeType::new(location(), "Foo", CompositeKind::Structure));
        foo.set_conformances(vec![i2.clone()]);
        let foo = Type::Composite(foo);

        assert!(foo.is_subtype_of(&Type::intersection(vec![i1.clone()])));
        assert!(foo.is_subtype_of(&Type::intersection(vec![i1.clone(), i2.clone()])));
        assert!(Type::intersection(vec![i2]).is_subtype_of(&Type::intersection(vec![i1.clone()])));
        assert!(!Type::intersection(vec![i1]).is_subtype_of(&foo));
    }

    #[test]
    fn references_narrow_authorization() {
        let e1 = entitlement("E1");
        let e2 = entitlement("E2");
        let strong = Type::reference(
            Authorization::conjunction([e1.clone(), e2.clone()]),
            Type::array(Type::INT),
        );
        let weak = Type::reference(Authorization::conjunction([e1]), Type::array(Type::INT));
        let unauthorized = Type::reference(Authorization::Unauthorized, Type::array(Type::INT));

        assert!(strong.is_subtype_of(&weak));
        assert!(weak.is_subtype_of(&unauthorized));
        assert!(!weak.is_subtype_of(&strong));
        assert!(!unauthorized.is_subtype_of(&weak));
    }

    #[test]
    fn constant_sized_arrays_need_equal_size() {
        let two = Type::constant_array(Type::INT, 2);
        let three = Type::constant_array(Type::INT, 3);
        assert!(!two.is_subtype_of(&three));
        assert!(two.is_subtype_of(&Type::constant_array(Type::INTEGER, 2)));
    }

    #[test]
    fn functions_are_contravariant_in_parameters() {
        let takes_integer = Type::function(vec![Type::INTEGER], Type::INT);
        let takes_int = Type::function(vec![Type::INT], Type::INTEGER);
        assert!(takes_integer.is_subtype_of(&takes_int));
        assert!(!takes_int.is_subtype_of(&takes_integer));
    }
}
