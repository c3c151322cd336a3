use crate::{
    language::{
        ast::{NodeId, VariableKind},
        span::Span,
    },
    sema::{
        access::{Access, Authorization, EntitlementType},
        conformance::{ConformanceResolver, DeclaredFunction, FunctionDeclarations, FunctionResolution, ResolutionError},
        ty::{CompositeType, FunctionType, InterfaceType, Type},
    },
};
use indexmap::IndexMap;
use std::{collections::HashMap, sync::Arc};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemberKind {
    Field(VariableKind),
    Function,
}

#[derive(Clone, Debug)]
pub struct MemberInfo {
    pub name: String,
    pub access: Access,
    pub kind: MemberKind,
    pub ty: Type,
    /// ID of the composite or interface that declares the member.
    pub declared_in: String,
    pub span: Span,
}

impl MemberInfo {
    pub fn is_field(&self) -> bool {
        matches!(self.kind, MemberKind::Field(_))
    }
}

#[derive(Debug)]
pub struct CompositeInfo {
    pub ty: Arc<CompositeType>,
    pub members: IndexMap<String, MemberInfo>,
    pub initializer: Option<Arc<FunctionType>>,
    pub enum_cases: Vec<String>,
}

#[derive(Debug)]
pub struct InterfaceInfo {
    pub ty: Arc<InterfaceType>,
    pub members: IndexMap<String, MemberInfo>,
}

/// Everything the checker learned about a program.
///
/// Composite and interface tables are keyed by type ID.
#[derive(Debug, Default)]
pub struct Elaboration {
    expression_types: HashMap<NodeId, Type>,
    global_types: IndexMap<String, Type>,
    composites: IndexMap<String, CompositeInfo>,
    interfaces: IndexMap<String, InterfaceInfo>,
    entitlements: IndexMap<String, EntitlementType>,
    declared_functions: HashMap<(String, String), DeclaredFunction>,
    required_entitlements: IndexMap<(String, String), Authorization>,
    resolver: ConformanceResolver,
}

impl Elaboration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_expression_type(&mut self, id: NodeId, ty: Type) {
        self.expression_types.insert(id, ty);
    }

    pub fn expression_type(&self, id: NodeId) -> Option<&Type> {
        self.expression_types.get(&id)
    }

    pub fn set_global_type(&mut self, name: impl Into<String>, ty: Type) {
        self.global_types.insert(name.into(), ty);
    }

    pub fn global_type(&self, name: &str) -> Option<&Type> {
        self.global_types.get(name)
    }

    pub fn add_composite(&mut self, info: CompositeInfo) {
        self.composites.insert(info.ty.id(), info);
    }

    pub fn composite(&self, type_id: &str) -> Option<&CompositeInfo> {
        self.composites.get(type_id)
    }

    pub(crate) fn composite_mut(&mut self, type_id: &str) -> Option<&mut CompositeInfo> {
        self.composites.get_mut(type_id)
    }

    pub fn composites(&self) -> impl Iterator<Item = &CompositeInfo> {
        self.composites.values()
    }

    pub fn add_interface(&mut self, info: InterfaceInfo) {
        self.interfaces.insert(info.ty.id(), info);
    }

    pub fn interface(&self, type_id: &str) -> Option<&InterfaceInfo> {
        self.interfaces.get(type_id)
    }

    pub(crate) fn interface_mut(&mut self, type_id: &str) -> Option<&mut InterfaceInfo> {
        self.interfaces.get_mut(type_id)
    }

    pub fn add_entitlement(&mut self, entitlement: EntitlementType) {
        self.entitlements.insert(entitlement.id(), entitlement);
    }

    pub fn entitlement(&self, type_id: &str) -> Option<&EntitlementType> {
        self.entitlements.get(type_id)
    }

    pub fn declare_function(&mut self, type_id: &str, function: &str, declared: DeclaredFunction) {
        self.declared_functions
            .insert((type_id.to_string(), function.to_string()), declared);
    }

    /// Order of conditions and the implementation of `function` on `composite`.
    pub fn resolve_function(
        &self,
        composite: &CompositeType,
        function: &str,
    ) -> Result<Arc<FunctionResolution>, ResolutionError> {
        self.resolver
            .resolve(&composite.id(), composite.conformances(), function, self)
    }

    pub fn set_required_entitlements(&mut self, function: &str, parameter: &str, authorization: Authorization) {
        self.required_entitlements
            .insert((function.to_string(), parameter.to_string()), authorization);
    }

    /// Authorization a reference argument needs for the accesses the function
    /// performs on parameter `parameter`.
    pub fn required_entitlements(&self, function: &str, parameter: &str) -> Option<&Authorization> {
        self.required_entitlements
            .get(&(function.to_string(), parameter.to_string()))
    }

    /// Looks up a field or function on a nominal type. Interface and
    /// intersection types search their ancestors too.
    pub fn member(&self, ty: &Type, name: &str) -> Option<&MemberInfo> {
        match ty {
            Type::Composite(composite) => self.composite(&composite.id())?.members.get(name),
            Type::Interface(interface) => interface
                .self_and_ancestors()
                .iter()
                .find_map(|candidate| self.interface(&candidate.id())?.members.get(name)),
            Type::Intersection(intersection) => intersection
                .effective_interfaces()
                .iter()
                .find_map(|candidate| self.interface(&candidate.id())?.members.get(name)),
            _ => None,
        }
    }
}

impl FunctionDeclarations for Elaboration {
    fn declared_function(&self, type_id: &str, function: &str) -> Option<DeclaredFunction> {
        self.declared_functions
            .get(&(type_id.to_string(), function.to_string()))
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::{ast::CompositeKind, location::Location};

    #[test]
    fn interface_members_are_found_through_ancestors() {
        let location = Location::script("test");
        let parent = Arc::new(InterfaceType::new(location.clone(), "P", CompositeKind::Structure));
        parent.set_conformances(vec![]);
        let child = Arc::new(InterfaceType::new(location, "C", CompositeKind::Structure));
        child.set_conformances(vec![parent.clone()]);

        let mut elaboration = Elaboration::new();
        let mut members = IndexMap::new();
        members.insert(
            "name".to_string(),
            MemberInfo {
                name: "name".into(),
                access: Access::ALL,
                kind: MemberKind::Field(VariableKind::Constant),
                ty: Type::STRING,
                declared_in: parent.id(),
                span: Span::default(),
            },
        );
        elaboration.add_interface(InterfaceInfo {
            ty: parent.clone(),
            members,
        });
        elaboration.add_interface(InterfaceInfo {
            ty: child.clone(),
            members: IndexMap::new(),
        });

        let member = elaboration.member(&Type::Interface(child), "name").unwrap();
        assert_eq!(member.ty, Type::STRING);
        assert_eq!(member.declared_in, "S.test.P");
        assert!(elaboration.member(&Type::Interface(parent), "missing").is_none());
    }
}
