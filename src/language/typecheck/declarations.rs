use super::{
    checker::{Checker, CompositeContext, FunctionContext, Variable},
    elaboration::{CompositeInfo, InterfaceInfo, MemberInfo, MemberKind},
    errors::CheckerErrorKind,
};
use crate::{
    language::{
        ast::{
            CompositeDecl, CompositeKind, Condition, Declaration, FunctionBlock, FunctionDecl, InterfaceDecl,
            Members, Parameter, VariableKind,
        },
        span::Span,
    },
    sema::{
        access::{Access, EntitlementType},
        conformance::{find_cycle, DeclaredFunction},
        entitlement_set::EntitlementSet,
        ty::{CompositeType, FunctionType, InterfaceType, PrimitiveType, Type},
    },
};
use indexmap::IndexMap;
use std::{collections::HashMap, sync::Arc};

/// Signature of a function as checked in its body.
pub(super) struct Signature<'d> {
    pub name: String,
    pub params: &'d [Parameter],
    pub param_types: Vec<Type>,
    pub return_type: Type,
    pub is_initializer: bool,
}

impl Checker<'_> {
    pub(super) fn check_declarations(&mut self, declarations: &[Declaration]) {
        self.declare_types(declarations);
        self.resolve_conformances(declarations);
        self.declare_members(declarations);
        self.declare_global_functions(declarations);
        self.check_conformances(declarations);

        for declaration in declarations {
            if self.should_stop() {
                return;
            }
            if let Declaration::Variable(variable) = declaration {
                self.check_variable_declaration(variable, true);
            }
        }
        self.check_bodies(declarations);
    }

    fn with_nested<F>(&mut self, name: &str, f: F)
    where
        F: FnOnce(&mut Self),
    {
        self.type_prefix.push(name.to_string());
        f(self);
        self.type_prefix.pop();
    }

    fn is_type_declared(&self, type_id: &str) -> bool {
        self.elaboration.composite(type_id).is_some()
            || self.elaboration.interface(type_id).is_some()
            || self.elaboration.entitlement(type_id).is_some()
    }

    fn report_redeclaration(&mut self, name: &str, span: Span) -> bool {
        let type_id = self.location.type_id(&self.qualified(name));
        if self.is_type_declared(&type_id) {
            self.report(
                CheckerErrorKind::Redeclaration {
                    name: name.to_string(),
                },
                span,
            );
            return true;
        }
        false
    }

    // Types

    fn declare_types(&mut self, declarations: &[Declaration]) {
        for declaration in declarations {
            match declaration {
                Declaration::Composite(composite) => {
                    if self.report_redeclaration(&composite.name, composite.span) {
                        continue;
                    }
                    let mut ty = CompositeType::new(
                        self.location.clone(),
                        self.qualified(&composite.name),
                        composite.kind,
                    );
                    if composite.kind == CompositeKind::Enum {
                        ty = ty.with_enum_raw_type(self.enum_raw_type(composite));
                    }
                    self.elaboration.add_composite(CompositeInfo {
                        ty: Arc::new(ty),
                        members: IndexMap::new(),
                        initializer: None,
                        enum_cases: composite.members.enum_cases.iter().map(|case| case.name.clone()).collect(),
                    });
                    self.with_nested(&composite.name, |checker| {
                        checker.declare_types(&composite.members.nested)
                    });
                }
                Declaration::Interface(interface) => {
                    if self.report_redeclaration(&interface.name, interface.span) {
                        continue;
                    }
                    let ty = InterfaceType::new(
                        self.location.clone(),
                        self.qualified(&interface.name),
                        interface.kind,
                    );
                    self.elaboration.add_interface(InterfaceInfo {
                        ty: Arc::new(ty),
                        members: IndexMap::new(),
                    });
                    self.with_nested(&interface.name, |checker| {
                        checker.declare_types(&interface.members.nested)
                    });
                }
                Declaration::Entitlement(entitlement) => {
                    if self.report_redeclaration(&entitlement.name, entitlement.span) {
                        continue;
                    }
                    let entitlement = EntitlementType::new(self.location.clone(), self.qualified(&entitlement.name));
                    self.elaboration.add_entitlement(entitlement);
                }
                Declaration::Function(_) | Declaration::Variable(_) => {}
            }
        }
    }

    fn enum_raw_type(&mut self, composite: &CompositeDecl) -> PrimitiveType {
        let Some(raw) = &composite.enum_raw_type else {
            return PrimitiveType::Int;
        };
        match self.resolve_type(raw, composite.span) {
            Type::Primitive(primitive) if primitive.is_signed_integer() || primitive.is_unsigned_integer() => {
                primitive
            }
            Type::Invalid => PrimitiveType::Int,
            other => {
                self.report(CheckerErrorKind::InvalidEnumRawType { ty: other }, composite.span);
                PrimitiveType::Int
            }
        }
    }

    // Conformances

    fn resolve_conformances(&mut self, declarations: &[Declaration]) {
        let mut interface_parents = HashMap::new();
        self.collect_interface_parents(declarations, &mut interface_parents);

        let graph: HashMap<String, Vec<String>> = interface_parents
            .iter()
            .map(|(id, parents): (&String, &Vec<Arc<InterfaceType>>)| {
                (id.clone(), parents.iter().map(|parent| parent.id()).collect())
            })
            .collect();

        let mut ids: Vec<&String> = interface_parents.keys().collect();
        ids.sort();
        for id in ids {
            let Some(info) = self.elaboration.interface(id) else {
                continue;
            };
            let interface = info.ty.clone();
            let cycle = find_cycle(id, |current| graph.get(current).cloned().unwrap_or_default());
            match cycle {
                Some(cycle) => {
                    let cycle = cycle.iter().map(|id| self.display_name(id)).collect();
                    self.report(
                        CheckerErrorKind::CyclicConformance {
                            interface: interface.qualified_identifier.to_string(),
                            cycle,
                        },
                        Span::default(),
                    );
                    interface.set_conformances(Vec::new());
                }
                None => interface.set_conformances(interface_parents[id].clone()),
            }
        }

        self.attach_composite_conformances(declarations);
    }

    fn collect_interface_parents(
        &mut self,
        declarations: &[Declaration],
        parents: &mut HashMap<String, Vec<Arc<InterfaceType>>>,
    ) {
        for declaration in declarations {
            match declaration {
                Declaration::Interface(interface) => {
                    let id = self.location.type_id(&self.qualified(&interface.name));
                    if !parents.contains_key(&id) {
                        let resolved = self.resolve_conformance_names(&interface.conformances, interface.span);
                        let compatible = resolved
                            .into_iter()
                            .filter(|parent| {
                                self.check_conformance_kind(&interface.name, interface.kind, parent, interface.span)
                            })
                            .collect();
                        parents.insert(id, compatible);
                    }
                    self.with_nested(&interface.name, |checker| {
                        checker.collect_interface_parents(&interface.members.nested, parents)
                    });
                }
                Declaration::Composite(composite) => {
                    self.with_nested(&composite.name, |checker| {
                        checker.collect_interface_parents(&composite.members.nested, parents)
                    });
                }
                _ => {}
            }
        }
    }

    fn attach_composite_conformances(&mut self, declarations: &[Declaration]) {
        for declaration in declarations {
            match declaration {
                Declaration::Composite(composite) => {
                    let id = self.location.type_id(&self.qualified(&composite.name));
                    let resolved = self.resolve_conformance_names(&composite.conformances, composite.span);
                    let compatible: Vec<Arc<InterfaceType>> = resolved
                        .into_iter()
                        .filter(|interface| {
                            self.check_conformance_kind(&composite.name, composite.kind, interface, composite.span)
                        })
                        .collect();
                    if let Some(info) = self.elaboration.composite(&id) {
                        info.ty.set_conformances(compatible);
                    }
                    self.with_nested(&composite.name, |checker| {
                        checker.attach_composite_conformances(&composite.members.nested)
                    });
                }
                Declaration::Interface(interface) => {
                    self.with_nested(&interface.name, |checker| {
                        checker.attach_composite_conformances(&interface.members.nested)
                    });
                }
                _ => {}
            }
        }
    }

    fn resolve_conformance_names(&mut self, names: &[String], span: Span) -> Vec<Arc<InterfaceType>> {
        let mut resolved = Vec::with_capacity(names.len());
        for name in names {
            match self.lookup_nominal_type(name) {
                Some(Type::Interface(interface)) => resolved.push(interface),
                Some(_) => self.report(CheckerErrorKind::InvalidConformance { name: name.clone() }, span),
                None => self.report(
                    CheckerErrorKind::NotDeclared {
                        name: name.clone(),
                        kind: "type",
                    },
                    span,
                ),
            }
        }
        resolved
    }

    fn check_conformance_kind(
        &mut self,
        name: &str,
        kind: CompositeKind,
        interface: &InterfaceType,
        span: Span,
    ) -> bool {
        if interface.kind == kind {
            return true;
        }
        self.report(
            CheckerErrorKind::CompositeKindMismatch {
                type_name: self.qualified(name),
                interface: interface.qualified_identifier.to_string(),
                expected: interface.kind,
                actual: kind,
            },
            span,
        );
        false
    }

    pub(super) fn display_name(&self, type_id: &str) -> String {
        let prefix = format!("{}.", self.location.type_id_prefix());
        type_id.strip_prefix(&prefix).unwrap_or(type_id).to_string()
    }

    // Members

    fn declare_members(&mut self, declarations: &[Declaration]) {
        for declaration in declarations {
            match declaration {
                Declaration::Composite(composite) => {
                    let type_id = self.location.type_id(&self.qualified(&composite.name));
                    self.declare_composite_members(composite, &type_id);
                    self.with_nested(&composite.name, |checker| {
                        checker.declare_members(&composite.members.nested)
                    });
                }
                Declaration::Interface(interface) => {
                    let type_id = self.location.type_id(&self.qualified(&interface.name));
                    self.declare_interface_members(interface, &type_id);
                    self.with_nested(&interface.name, |checker| {
                        checker.declare_members(&interface.members.nested)
                    });
                }
                Declaration::Entitlement(entitlement) => {
                    self.resolve_access(&entitlement.access, entitlement.span, false, "entitlement declarations");
                }
                _ => {}
            }
        }
    }

    fn declare_composite_members(&mut self, composite: &CompositeDecl, type_id: &str) {
        let Some(info) = self.elaboration.composite(type_id) else {
            return;
        };
        let ty = info.ty.clone();
        self.resolve_access(&composite.access, composite.span, false, "composite declarations");

        // Members are resolved inside the composite, so nested types are visible.
        self.type_prefix.push(composite.name.clone());
        let entitled = matches!(composite.kind, CompositeKind::Structure | CompositeKind::Resource);
        let mut members = self.resolve_members(&composite.members, type_id, entitled, Some(composite.kind));
        if let Some(raw_type) = ty.enum_raw_type {
            members.insert(
                "rawValue".to_string(),
                MemberInfo {
                    name: "rawValue".into(),
                    access: Access::ALL,
                    kind: MemberKind::Field(VariableKind::Constant),
                    ty: Type::Primitive(raw_type),
                    declared_in: type_id.to_string(),
                    span: composite.span,
                },
            );
        }
        let initializer = composite.members.initializer.as_ref().map(|init| {
            self.resolve_access(&init.access, init.span, false, "initializers");
            let params = init.params.iter().map(|param| self.resolve_annotation(&param.ty)).collect();
            Arc::new(FunctionType::new(params, Type::Composite(ty.clone())))
        });
        self.type_prefix.pop();

        for function in &composite.members.functions {
            self.elaboration.declare_function(
                type_id,
                &function.name,
                DeclaredFunction {
                    has_pre_conditions: !function.pre_conditions().is_empty(),
                    has_post_conditions: !function.post_conditions().is_empty(),
                    has_implementation: function.has_implementation(),
                },
            );
        }
        if let Some(info) = self.elaboration.composite_mut(type_id) {
            info.members = members;
            info.initializer = initializer;
        }
    }

    fn declare_interface_members(&mut self, interface: &InterfaceDecl, type_id: &str) {
        self.resolve_access(&interface.access, interface.span, false, "interface declarations");
        self.type_prefix.push(interface.name.clone());
        let entitled = interface.kind != CompositeKind::Contract;
        let members = self.resolve_members(&interface.members, type_id, entitled, None);
        self.type_prefix.pop();

        for function in &interface.members.functions {
            self.elaboration.declare_function(
                type_id,
                &function.name,
                DeclaredFunction {
                    has_pre_conditions: !function.pre_conditions().is_empty(),
                    has_post_conditions: !function.post_conditions().is_empty(),
                    has_implementation: function.has_implementation(),
                },
            );
        }
        if let Some(info) = self.elaboration.interface_mut(type_id) {
            info.members = members;
        }
    }

    fn resolve_members(
        &mut self,
        members: &Members,
        type_id: &str,
        entitled: bool,
        composite_kind: Option<CompositeKind>,
    ) -> IndexMap<String, MemberInfo> {
        let mut resolved: IndexMap<String, MemberInfo> = IndexMap::new();
        let declaration = if entitled { "" } else { "contract members" };

        for field in &members.fields {
            let ty = self.resolve_annotation(&field.ty);
            if let Some(kind @ (CompositeKind::Structure | CompositeKind::Enum)) = composite_kind {
                if ty.is_resource() {
                    self.report(
                        CheckerErrorKind::InvalidResourceField {
                            name: field.name.clone(),
                            kind: kind.keyword(),
                            ty: ty.clone(),
                        },
                        field.span,
                    );
                }
            }
            let access = self.resolve_access(&field.access, field.span, entitled, declaration);
            self.insert_member(
                &mut resolved,
                MemberInfo {
                    name: field.name.clone(),
                    access,
                    kind: MemberKind::Field(field.kind),
                    ty,
                    declared_in: type_id.to_string(),
                    span: field.span,
                },
            );
        }

        for function in &members.functions {
            let ty = Type::Function(self.resolve_function_type(function));
            let access = self.resolve_access(&function.access, function.span, entitled, declaration);
            self.insert_member(
                &mut resolved,
                MemberInfo {
                    name: function.name.clone(),
                    access,
                    kind: MemberKind::Function,
                    ty,
                    declared_in: type_id.to_string(),
                    span: function.span,
                },
            );
        }
        resolved
    }

    fn insert_member(&mut self, members: &mut IndexMap<String, MemberInfo>, member: MemberInfo) {
        if members.contains_key(&member.name) {
            self.report(
                CheckerErrorKind::Redeclaration {
                    name: member.name.clone(),
                },
                member.span,
            );
            return;
        }
        members.insert(member.name.clone(), member);
    }

    pub(super) fn resolve_function_type(&mut self, function: &FunctionDecl) -> Arc<FunctionType> {
        let params = function
            .params
            .iter()
            .map(|param| self.resolve_annotation(&param.ty))
            .collect();
        let return_type = match &function.return_type {
            Some(annotation) => self.resolve_annotation(annotation),
            None => Type::VOID,
        };
        Arc::new(FunctionType::new(params, return_type))
    }

    fn declare_global_functions(&mut self, declarations: &[Declaration]) {
        for declaration in declarations {
            if let Declaration::Function(function) = declaration {
                self.resolve_access(&function.access, function.span, false, "top-level functions");
                let ty = Type::Function(self.resolve_function_type(function));
                self.declare_variable(&function.name, ty.clone(), VariableKind::Constant, function.span);
                self.elaboration.set_global_type(function.name.clone(), ty);
            }
        }
    }

    // Conformance checking

    fn check_conformances(&mut self, declarations: &[Declaration]) {
        for declaration in declarations {
            match declaration {
                Declaration::Composite(composite) => {
                    let type_id = self.location.type_id(&self.qualified(&composite.name));
                    self.check_composite_conformance(&type_id, composite.span);
                    self.with_nested(&composite.name, |checker| {
                        checker.check_conformances(&composite.members.nested)
                    });
                }
                Declaration::Interface(interface) => {
                    self.with_nested(&interface.name, |checker| {
                        checker.check_conformances(&interface.members.nested)
                    });
                }
                _ => {}
            }
        }
    }

    fn check_composite_conformance(&mut self, type_id: &str, span: Span) {
        let Some(info) = self.elaboration.composite(type_id) else {
            return;
        };
        let composite = info.ty.clone();
        let own_members = info.members.clone();
        let type_name = composite.qualified_identifier.to_string();
        let mut inherited_functions: Vec<String> = Vec::new();

        for interface in composite.effective_conformances() {
            let Some(interface_info) = self.elaboration.interface(&interface.id()) else {
                continue;
            };
            let required: Vec<MemberInfo> = interface_info.members.values().cloned().collect();
            let mut missing = Vec::new();

            for requirement in required {
                match own_members.get(&requirement.name) {
                    Some(own) => {
                        if own.is_field() != requirement.is_field() || own.ty != requirement.ty {
                            missing.push(format!("`{}`", requirement.name));
                            continue;
                        }
                        if own.access != requirement.access {
                            self.report(
                                CheckerErrorKind::ConformanceAccessMismatch {
                                    type_name: type_name.clone(),
                                    member: requirement.name.clone(),
                                    expected: requirement.access.clone(),
                                    actual: own.access.clone(),
                                },
                                own.span,
                            );
                        }
                    }
                    None if requirement.is_field() => missing.push(format!("`{}`", requirement.name)),
                    None => {
                        if !inherited_functions.contains(&requirement.name) {
                            inherited_functions.push(requirement.name.clone());
                        }
                        match self.elaboration.resolve_function(&composite, &requirement.name) {
                            Ok(resolution) if resolution.implementation.is_some() => {}
                            Ok(_) => missing.push(format!("`{}`", requirement.name)),
                            Err(error) => self.report(error.into(), span),
                        }
                    }
                }
            }

            if !missing.is_empty() {
                self.report(
                    CheckerErrorKind::Conformance {
                        type_name: type_name.clone(),
                        interface: interface.qualified_identifier.to_string(),
                        missing,
                    },
                    span,
                );
            }
        }

        for function in inherited_functions {
            let Ok(resolution) = self.elaboration.resolve_function(&composite, &function) else {
                continue;
            };
            if resolution.conflicting_defaults.is_empty() {
                continue;
            }
            let interfaces = resolution
                .implementation
                .iter()
                .chain(resolution.conflicting_defaults.iter())
                .map(|id| self.display_name(id))
                .collect();
            self.report(
                CheckerErrorKind::DefaultFunctionConflict {
                    type_name: type_name.clone(),
                    function,
                    interfaces,
                },
                span,
            );
        }
    }

    // Bodies

    fn check_bodies(&mut self, declarations: &[Declaration]) {
        for declaration in declarations {
            if self.should_stop() {
                return;
            }
            match declaration {
                Declaration::Composite(composite) => self.check_composite_bodies(composite),
                Declaration::Interface(interface) => self.check_interface_bodies(interface),
                Declaration::Function(function) => {
                    let Some(Type::Function(ty)) = self.elaboration.global_type(&function.name).cloned() else {
                        continue;
                    };
                    let signature = Signature {
                        name: self.qualified(&function.name),
                        params: &function.params,
                        param_types: ty.params.clone(),
                        return_type: ty.return_type.clone(),
                        is_initializer: false,
                    };
                    self.check_function(&signature, function.body.as_ref(), function.span, None);
                }
                Declaration::Entitlement(_) | Declaration::Variable(_) => {}
            }
        }
    }

    fn check_composite_bodies(&mut self, composite: &CompositeDecl) {
        let type_id = self.location.type_id(&self.qualified(&composite.name));
        let Some(info) = self.elaboration.composite(&type_id) else {
            return;
        };
        let self_type = Type::Composite(info.ty.clone());
        let initializer = info.initializer.clone();
        let members = info.members.clone();

        self.composites.push(CompositeContext {
            type_id: type_id.clone(),
            self_type: self_type.clone(),
        });
        self.type_prefix.push(composite.name.clone());

        if let (Some(init), Some(ty)) = (&composite.members.initializer, initializer) {
            let signature = Signature {
                name: self.qualified("init"),
                params: &init.params,
                param_types: ty.params.clone(),
                return_type: Type::VOID,
                is_initializer: true,
            };
            self.check_function(&signature, init.body.as_ref(), init.span, Some(self_type.clone()));
        }
        for function in &composite.members.functions {
            let Some(Type::Function(ty)) = members.get(&function.name).map(|member| member.ty.clone()) else {
                continue;
            };
            let signature = Signature {
                name: self.qualified(&function.name),
                params: &function.params,
                param_types: ty.params.clone(),
                return_type: ty.return_type.clone(),
                is_initializer: false,
            };
            self.check_function(&signature, function.body.as_ref(), function.span, Some(self_type.clone()));
        }
        self.check_bodies(&composite.members.nested);

        self.type_prefix.pop();
        self.composites.pop();
    }

    fn check_interface_bodies(&mut self, interface: &InterfaceDecl) {
        let type_id = self.location.type_id(&self.qualified(&interface.name));
        let Some(info) = self.elaboration.interface(&type_id) else {
            return;
        };
        let self_type = Type::Interface(info.ty.clone());
        let members = info.members.clone();

        self.composites.push(CompositeContext {
            type_id: type_id.clone(),
            self_type: self_type.clone(),
        });
        self.type_prefix.push(interface.name.clone());
        for function in &interface.members.functions {
            let Some(Type::Function(ty)) = members.get(&function.name).map(|member| member.ty.clone()) else {
                continue;
            };
            let signature = Signature {
                name: self.qualified(&function.name),
                params: &function.params,
                param_types: ty.params.clone(),
                return_type: ty.return_type.clone(),
                is_initializer: false,
            };
            self.check_function(&signature, function.body.as_ref(), function.span, Some(self_type.clone()));
        }
        self.check_bodies(&interface.members.nested);
        self.type_prefix.pop();
        self.composites.pop();
    }

    /// Checks conditions and statements of a function, binding `self` when
    /// it is a member.
    pub(super) fn check_function(
        &mut self,
        signature: &Signature<'_>,
        body: Option<&FunctionBlock>,
        span: Span,
        self_type: Option<Type>,
    ) {
        let requirements = signature
            .params
            .iter()
            .zip(&signature.param_types)
            .filter(|(_, ty)| matches!(ty.unwrap_optional(), Type::Reference(_)))
            .map(|(param, _)| (param.name.clone(), EntitlementSet::new()))
            .collect();
        self.functions.push(FunctionContext {
            name: signature.name.clone(),
            return_type: signature.return_type.clone(),
            scope_base: self.scopes.len(),
            loop_depth: 0,
            is_initializer: signature.is_initializer,
            requirements,
        });
        self.push_scope();

        if let Some(self_type) = self_type {
            self.declare_untracked("self", self_type);
        }
        for (param, ty) in signature.params.iter().zip(&signature.param_types) {
            self.declare_variable(&param.name, ty.clone(), VariableKind::Constant, param.span);
        }

        let mut exits = true;
        if let Some(body) = body {
            for condition in &body.pre_conditions {
                self.check_condition(condition);
            }
            if let Some(block) = &body.statements {
                exits = self.check_statements(&block.statements);
                let returns_value = !signature.return_type.is_primitive(PrimitiveType::Void)
                    && !signature.return_type.is_never()
                    && !signature.return_type.is_invalid();
                if returns_value && !exits {
                    self.report(CheckerErrorKind::MissingReturnStatement, span);
                }
            }
            if !body.post_conditions.is_empty() {
                self.push_scope();
                if !signature.return_type.is_primitive(PrimitiveType::Void) {
                    self.declare_untracked("result", signature.return_type.clone());
                }
                for condition in &body.post_conditions {
                    self.check_condition(condition);
                }
                self.pop_scope(true);
            }
        }

        self.pop_scope(exits);
        if let Some(context) = self.functions.pop() {
            if self.config.required_entitlements_inference_enabled {
                for (param, mut set) in context.requirements {
                    let authorization = set.access();
                    self.elaboration
                        .set_required_entitlements(&context.name, &param, authorization);
                }
            }
        }
    }

    pub(super) fn declare_untracked(&mut self, name: &str, ty: Type) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(
                name.to_string(),
                Variable {
                    ty,
                    kind: VariableKind::Constant,
                    span: Span::default(),
                    resource: None,
                },
            );
        }
    }

    fn check_condition(&mut self, condition: &Condition) {
        self.expect_expression(&condition.test, &Type::BOOL);
        if let Some(message) = &condition.message {
            self.expect_expression(message, &Type::STRING);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::language::{
        ast::{CompositeDecl, Expr, FieldDecl, FunctionDecl, InterfaceDecl, Program, Statement},
        location::Location,
        types::TypeExpr,
        typecheck::{check_program, CheckerErrorKind},
    };

    fn program() -> Program {
        Program::new(Location::script("test"))
    }

    #[test]
    fn cyclic_interfaces_are_rejected() {
        let program = program()
            .declare(InterfaceDecl::structure("A").conforming(["B"]))
            .declare(InterfaceDecl::structure("B").conforming(["A"]));
        let errors = check_program(&program).unwrap_err();
        let cycles: Vec<_> = errors
            .kinds()
            .filter(|kind| matches!(kind, CheckerErrorKind::CyclicConformance { .. }))
            .collect();
        assert_eq!(cycles.len(), 2);
    }

    #[test]
    fn missing_members_are_reported_per_interface() {
        let program = program()
            .declare(
                InterfaceDecl::structure("I")
                    .field(FieldDecl::constant("x", TypeExpr::named("Int")))
                    .function(FunctionDecl::new("test")),
            )
            .declare(CompositeDecl::structure("S").conforming(["I"]));
        let errors = check_program(&program).unwrap_err();
        assert_eq!(errors.len(), 1);
        match &errors.errors[0].kind {
            CheckerErrorKind::Conformance { missing, interface, .. } => {
                assert_eq!(interface, "I");
                assert_eq!(missing, &vec!["`x`".to_string(), "`test`".to_string()]);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn default_implementation_satisfies_requirement() {
        let program = program()
            .declare(
                InterfaceDecl::structure("I").function(
                    FunctionDecl::new("test")
                        .returns(TypeExpr::named("Int"))
                        .body(vec![Statement::ret(Expr::int(1))]),
                ),
            )
            .declare(CompositeDecl::structure("S").conforming(["I"]));
        assert!(check_program(&program).is_ok());
    }

    #[test]
    fn unrelated_defaults_conflict() {
        let default = || FunctionDecl::new("test").body(vec![]);
        let program = program()
            .declare(InterfaceDecl::structure("A").function(default()))
            .declare(InterfaceDecl::structure("B").function(default()))
            .declare(CompositeDecl::structure("S").conforming(["A", "B"]));
        let errors = check_program(&program).unwrap_err();
        assert!(errors.kinds().any(|kind| matches!(
            kind,
            CheckerErrorKind::DefaultFunctionConflict { function, interfaces, .. }
                if function == "test" && interfaces == &vec!["A".to_string(), "B".to_string()]
        )));
    }

    #[test]
    fn resource_cannot_conform_to_struct_interface() {
        let program = program()
            .declare(InterfaceDecl::structure("I"))
            .declare(CompositeDecl::resource("R").conforming(["I"]));
        let errors = check_program(&program).unwrap_err();
        assert!(matches!(
            errors.errors[0].kind,
            CheckerErrorKind::CompositeKindMismatch { .. }
        ));
    }

    #[test]
    fn struct_fields_cannot_hold_resources() {
        let program = program()
            .declare(CompositeDecl::resource("R"))
            .declare(CompositeDecl::structure("S").field(FieldDecl::constant(
                "r",
                crate::language::types::TypeAnnotation::resource(TypeExpr::named("R")),
            )));
        let errors = check_program(&program).unwrap_err();
        assert!(matches!(
            &errors.errors[0].kind,
            CheckerErrorKind::InvalidResourceField { name, kind: "struct", .. } if name == "r"
        ));
    }

    #[test]
    fn missing_return_is_reported() {
        let program = program().declare(
            FunctionDecl::new("test")
                .returns(TypeExpr::named("Int"))
                .body(vec![Statement::let_("x", Expr::int(1))]),
        );
        let errors = check_program(&program).unwrap_err();
        assert!(matches!(
            errors.errors[0].kind,
            CheckerErrorKind::MissingReturnStatement
        ));
    }
}
