use super::{
    checker::Checker,
    elaboration::{MemberInfo, MemberKind},
    errors::CheckerErrorKind,
};
use crate::{
    language::{
        ast::{CompositeKind, Expr, ExprKind, VariableKind},
        span::Span,
    },
    sema::{
        access::{Access, Authorization, EntitlementSetAccess, PrimitiveAccess},
        builtins::{
            array_member, dictionary_member, invalid_for_resource_containers, permits_index_assignment,
            requires_equatable_element, string_member, BuiltinMember, BuiltinMemberKind,
        },
        ty::{PrimitiveType, Type},
    },
};

/// Splits off the authorization of a reference type.
fn split_reference(ty: &Type) -> (Option<Authorization>, Type) {
    match ty {
        Type::Reference(reference) => (Some(reference.authorization.clone()), reference.ty.clone()),
        other => (None, other.clone()),
    }
}

/// Containers reached through a reference stay behind a reference with the
/// same authorization.
fn through_reference(authorization: Option<&Authorization>, ty: Type) -> Type {
    let Some(authorization) = authorization else {
        return ty;
    };
    match ty {
        Type::Optional(inner) if inner.is_container() || inner.is_resource() => {
            Type::optional(Type::reference(authorization.clone(), *inner))
        }
        ty if ty.is_container() || ty.is_resource() => Type::reference(authorization.clone(), ty),
        ty => ty,
    }
}

fn builtin_info(name: &str, member: BuiltinMember) -> MemberInfo {
    MemberInfo {
        name: name.to_string(),
        access: member.access,
        kind: match member.kind {
            BuiltinMemberKind::Field => MemberKind::Field(VariableKind::Constant),
            BuiltinMemberKind::Function => MemberKind::Function,
        },
        ty: member.ty,
        declared_in: String::new(),
        span: Span::default(),
    }
}

impl Checker<'_> {
    pub(super) fn check_member(&mut self, receiver: &Expr, name: &str, optional: bool, span: Span) -> Type {
        if let Some(ty) = self.check_enum_case(receiver, name, span) {
            return ty;
        }

        let receiver_type = self.check_expression(receiver, None);
        let (base, chained) = match receiver_type {
            Type::Optional(inner) if optional => (*inner, true),
            other => (other, false),
        };
        let (authorization, target) = split_reference(&base);
        if target.is_invalid() {
            return Type::Invalid;
        }

        let Some(member) = self.lookup_member(&target, name, span) else {
            self.report(
                CheckerErrorKind::NotDeclaredMember {
                    ty: target,
                    name: name.to_string(),
                },
                span,
            );
            return Type::Invalid;
        };
        self.check_member_access(&member, authorization.as_ref(), receiver, span);

        let ty = if member.is_field() {
            through_reference(authorization.as_ref(), member.ty)
        } else {
            member.ty
        };
        match ty {
            Type::Optional(_) if chained => ty,
            ty if chained => Type::optional(ty),
            ty => ty,
        }
    }

    /// `E.case` on an enum type name.
    fn check_enum_case(&mut self, receiver: &Expr, name: &str, span: Span) -> Option<Type> {
        let ExprKind::Identifier(type_name) = &receiver.kind else {
            return None;
        };
        if self.lookup_variable(type_name).is_some() {
            return None;
        }
        let Some(Type::Composite(composite)) = self.lookup_nominal_type(type_name) else {
            return None;
        };
        if composite.kind != CompositeKind::Enum {
            return None;
        }
        let ty = Type::Composite(composite.clone());
        self.record(receiver.id, ty.clone());
        let declared = self
            .elaboration
            .composite(&composite.id())
            .is_some_and(|info| info.enum_cases.iter().any(|case| case == name));
        if !declared {
            self.report(
                CheckerErrorKind::NotDeclaredMember {
                    ty,
                    name: name.to_string(),
                },
                span,
            );
            return Some(Type::Invalid);
        }
        Some(ty)
    }

    /// Finds a member of a nominal or built-in type, reporting container
    /// members that are unavailable for the element type.
    fn lookup_member(&mut self, target: &Type, name: &str, span: Span) -> Option<MemberInfo> {
        match target {
            Type::Composite(_) | Type::Interface(_) | Type::Intersection(_) => {
                self.elaboration.member(target, name).cloned()
            }
            Type::VariableSized(element) | Type::ConstantSized { element, .. } => {
                let member = array_member(target, name)?;
                if element.is_resource() && invalid_for_resource_containers(name) {
                    self.report(
                        CheckerErrorKind::InvalidResourceArrayMember {
                            ty: target.clone(),
                            name: name.to_string(),
                        },
                        span,
                    );
                } else if requires_equatable_element(name) && !element.is_equatable() {
                    self.report(CheckerErrorKind::NotEquatableType { ty: (**element).clone() }, span);
                }
                Some(builtin_info(name, member))
            }
            Type::Dictionary { value, .. } => {
                let member = dictionary_member(target, name)?;
                if value.is_resource() && invalid_for_resource_containers(name) {
                    self.report(
                        CheckerErrorKind::InvalidResourceArrayMember {
                            ty: target.clone(),
                            name: name.to_string(),
                        },
                        span,
                    );
                }
                Some(builtin_info(name, member))
            }
            Type::Primitive(PrimitiveType::String) => string_member(name).map(|member| builtin_info(name, member)),
            _ => None,
        }
    }

    /// Whether the checker is inside the body of `type_id`, or of a
    /// composite conforming to it.
    fn inside_type(&self, type_id: &str) -> bool {
        self.composites.iter().any(|context| {
            context.type_id == type_id
                || matches!(&context.self_type, Type::Composite(composite)
                    if composite.effective_conformances().iter().any(|interface| interface.id() == type_id))
        })
    }

    /// Whether the checker is inside the contract that (transitively)
    /// declares `type_id`.
    fn inside_contract_of(&self, type_id: &str) -> bool {
        let prefix = format!("{}.", self.location.type_id_prefix());
        let top_level = |id: &str| -> Option<String> {
            let qualified = id.strip_prefix(&prefix)?;
            Some(qualified.split('.').next().unwrap_or(qualified).to_string())
        };
        let Some(contract) = top_level(type_id) else {
            return false;
        };
        self.composites
            .iter()
            .any(|context| top_level(&context.type_id).as_deref() == Some(contract.as_str()))
    }

    fn check_member_access(
        &mut self,
        member: &MemberInfo,
        authorization: Option<&Authorization>,
        receiver: &Expr,
        span: Span,
    ) {
        let denied = match &member.access {
            Access::Primitive(PrimitiveAccess::SelfOnly) => {
                (!self.inside_type(&member.declared_in)).then(|| "access from outside the declaring type".to_string())
            }
            Access::Primitive(PrimitiveAccess::Contract) => (!self.inside_contract_of(&member.declared_in))
                .then(|| "access from outside the declaring contract".to_string()),
            Access::Primitive(_) => None,
            Access::EntitlementSet(required) => {
                let Some(authorization) = authorization else {
                    return;
                };
                self.record_requirement(receiver, required);
                (!authorization.permits(&member.access)).then(|| authorization.describe_reference())
            }
        };
        if let Some(found) = denied {
            self.report(
                CheckerErrorKind::InvalidAccess {
                    member: member.name.clone(),
                    access: member.access.clone(),
                    found,
                },
                span,
            );
        }
    }

    /// Adds an entitled access on a reference-typed parameter to the
    /// function's inferred requirements.
    fn record_requirement(&mut self, receiver: &Expr, required: &EntitlementSetAccess) {
        let ExprKind::Identifier(name) = &receiver.kind else {
            return;
        };
        if let Some(function) = self.functions.last_mut() {
            if let Some(set) = function.requirements.get_mut(name) {
                set.add_requirement(required);
            }
        }
    }

    pub(super) fn check_index(&mut self, target: &Expr, index: &Expr, span: Span) -> Type {
        let target_type = self.check_expression(target, None);
        let (authorization, base) = split_reference(&target_type);
        let element = match &base {
            Type::VariableSized(element) | Type::ConstantSized { element, .. } => {
                self.check_array_index(index);
                (**element).clone()
            }
            Type::Dictionary { key, value } => {
                self.expect_expression(index, key);
                Type::optional((**value).clone())
            }
            Type::Invalid => {
                self.check_expression(index, None);
                return Type::Invalid;
            }
            other => {
                self.check_expression(index, None);
                self.report(CheckerErrorKind::NotIndexable { ty: other.clone() }, span);
                return Type::Invalid;
            }
        };
        through_reference(authorization.as_ref(), element)
    }

    fn check_array_index(&mut self, index: &Expr) {
        let ty = self.check_expression(index, Some(&Type::INT));
        let integer = ty.primitive().is_some_and(|primitive| primitive.is_integer());
        if !ty.is_invalid() && !integer {
            self.report(
                CheckerErrorKind::TypeMismatch {
                    expected: Type::INTEGER,
                    actual: ty,
                },
                index.span,
            );
        }
    }

    /// Checks the left-hand side of an assignment and returns the type of
    /// the slot being written.
    pub(super) fn check_assignment_target(&mut self, target: &Expr) -> Type {
        let ty = match &target.kind {
            ExprKind::Identifier(name) => match self.lookup_variable(name).cloned() {
                Some(variable) => {
                    if variable.kind == VariableKind::Constant {
                        self.report(CheckerErrorKind::AssignmentToConstant { name: name.clone() }, target.span);
                    }
                    variable.ty
                }
                None => {
                    self.report(
                        CheckerErrorKind::NotDeclared {
                            name: name.clone(),
                            kind: "variable",
                        },
                        target.span,
                    );
                    Type::Invalid
                }
            },
            ExprKind::Member {
                expr: receiver,
                name,
                optional: false,
            } => self.check_member_assignment(receiver, name, target.span),
            ExprKind::Index { expr: container, index } => {
                let container_type = self.check_expression(container, None);
                if let Type::Reference(reference) = &container_type {
                    if !permits_index_assignment(&reference.authorization) {
                        self.report(
                            CheckerErrorKind::UnauthorizedReferenceAssignment {
                                found: reference.authorization.describe_reference(),
                            },
                            target.span,
                        );
                    }
                }
                let (_, base) = split_reference(&container_type);
                match &base {
                    Type::VariableSized(element) | Type::ConstantSized { element, .. } => {
                        self.check_array_index(index);
                        (**element).clone()
                    }
                    Type::Dictionary { key, value } => {
                        self.expect_expression(index, key);
                        Type::optional((**value).clone())
                    }
                    Type::Invalid => Type::Invalid,
                    other => {
                        self.report(CheckerErrorKind::NotIndexable { ty: other.clone() }, target.span);
                        Type::Invalid
                    }
                }
            }
            _ => {
                self.check_expression(target, None);
                self.report(CheckerErrorKind::InvalidAssignmentTarget, target.span);
                Type::Invalid
            }
        };
        self.record(target.id, ty)
    }

    fn check_member_assignment(&mut self, receiver: &Expr, name: &str, span: Span) -> Type {
        let receiver_type = self.check_expression(receiver, None);
        let (_, base) = split_reference(&receiver_type);
        if base.is_invalid() {
            return Type::Invalid;
        }
        let member = match self.lookup_member(&base, name, span) {
            Some(member) if member.is_field() => member,
            Some(_) => {
                self.report(CheckerErrorKind::InvalidAssignmentTarget, span);
                return Type::Invalid;
            }
            None => {
                self.report(
                    CheckerErrorKind::NotDeclaredMember {
                        ty: base,
                        name: name.to_string(),
                    },
                    span,
                );
                return Type::Invalid;
            }
        };

        let in_initializer = self.functions.last().is_some_and(|function| function.is_initializer)
            && matches!(&receiver.kind, ExprKind::Identifier(name) if name == "self");
        if member.kind == MemberKind::Field(VariableKind::Constant) && !in_initializer {
            self.report(CheckerErrorKind::AssignmentToConstantMember { name: name.to_string() }, span);
        } else if member.declared_in.is_empty() || !self.inside_type(&member.declared_in) {
            self.report(CheckerErrorKind::InvalidAssignmentAccess { member: name.to_string() }, span);
        }
        member.ty
    }
}
