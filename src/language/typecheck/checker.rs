use super::{
    elaboration::Elaboration,
    errors::{CheckerError, CheckerErrorKind, CheckerErrors},
    resources::{ResourceId, ResourceTracker},
    Config,
};
use crate::{
    language::{
        ast::{AccessModifier, NodeId, Program, VariableKind},
        location::Location,
        span::Span,
        types::{AuthorizationExpr, SizeLiteralError, TypeAnnotation, TypeExpr},
    },
    sema::{
        access::{Access, Authorization, EntitlementSetAccess, EntitlementType, PrimitiveAccess, SetKind},
        builtins::builtin_entitlement,
        entitlement_set::EntitlementSet,
        ty::{PrimitiveType, Type},
    },
};
use indexmap::IndexMap;
use tracing::debug;

pub fn check_program(program: &Program) -> Result<Elaboration, CheckerErrors> {
    check_program_with_config(program, &Config::default())
}

pub fn check_program_with_config(program: &Program, config: &Config) -> Result<Elaboration, CheckerErrors> {
    let mut checker = Checker::new(program.location.clone(), config);
    checker.check(program);
    let (elaboration, errors) = checker.finish();
    if errors.is_empty() {
        Ok(elaboration)
    } else {
        Err(CheckerErrors::new(errors))
    }
}

#[derive(Clone, Debug)]
pub(super) struct Variable {
    pub ty: Type,
    pub kind: VariableKind,
    pub span: Span,
    pub resource: Option<ResourceId>,
}

#[derive(Debug)]
pub(super) struct FunctionContext {
    /// Qualified name, used to key inferred entitlements.
    pub name: String,
    pub return_type: Type,
    pub scope_base: usize,
    pub loop_depth: usize,
    pub is_initializer: bool,
    /// Requirements accumulated for reference-typed parameters.
    pub requirements: IndexMap<String, EntitlementSet>,
}

#[derive(Clone, Debug)]
pub(super) struct CompositeContext {
    pub type_id: String,
    pub self_type: Type,
}

pub struct Checker<'a> {
    pub(super) config: &'a Config,
    pub(super) location: Location,
    pub(super) elaboration: Elaboration,
    pub(super) errors: Vec<CheckerError>,
    pub(super) scopes: Vec<IndexMap<String, Variable>>,
    pub(super) functions: Vec<FunctionContext>,
    pub(super) composites: Vec<CompositeContext>,
    /// Names of the enclosing declarations, outermost first.
    pub(super) type_prefix: Vec<String>,
    pub(super) resources: ResourceTracker,
    depth: usize,
    depth_exceeded: bool,
}

impl<'a> Checker<'a> {
    pub fn new(location: Location, config: &'a Config) -> Self {
        let mut globals = IndexMap::new();
        for (name, ty) in config.base_value_activation(&location).iter() {
            globals.insert(
                name.to_string(),
                Variable {
                    ty: ty.clone(),
                    kind: VariableKind::Constant,
                    span: Span::default(),
                    resource: None,
                },
            );
        }
        Self {
            config,
            location,
            elaboration: Elaboration::new(),
            errors: Vec::new(),
            scopes: vec![globals, IndexMap::new()],
            functions: Vec::new(),
            composites: Vec::new(),
            type_prefix: Vec::new(),
            resources: ResourceTracker::default(),
            depth: 0,
            depth_exceeded: false,
        }
    }

    pub fn check(&mut self, program: &Program) {
        debug!(location = %self.location, declarations = program.declarations.len(), "checking program");
        self.check_declarations(&program.declarations);
        debug!(location = %self.location, errors = self.errors.len(), "checked program");
    }

    pub fn finish(self) -> (Elaboration, Vec<CheckerError>) {
        (self.elaboration, self.errors)
    }

    pub fn errors(&self) -> &[CheckerError] {
        &self.errors
    }

    pub(super) fn report(&mut self, kind: CheckerErrorKind, span: Span) {
        self.report_error(CheckerError::new(kind, span));
    }

    pub(super) fn report_error(&mut self, error: CheckerError) {
        if self.should_stop() {
            return;
        }
        self.errors.push(error);
    }

    pub(super) fn should_stop(&self) -> bool {
        self.config.error_short_circuiting_enabled && !self.errors.is_empty()
    }

    pub(super) fn record(&mut self, id: NodeId, ty: Type) -> Type {
        self.elaboration.set_expression_type(id, ty.clone());
        ty
    }

    /// Tracks expression nesting; `false` once the configured depth is exceeded.
    pub(super) fn enter_expression(&mut self, span: Span) -> bool {
        self.depth += 1;
        if self.depth > self.config.max_nesting_depth {
            if !self.depth_exceeded {
                self.depth_exceeded = true;
                self.report(
                    CheckerErrorKind::MaxNestingDepthExceeded {
                        max: self.config.max_nesting_depth,
                    },
                    span,
                );
            }
            return false;
        }
        true
    }

    pub(super) fn exit_expression(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    // Scopes

    pub(super) fn push_scope(&mut self) {
        self.scopes.push(IndexMap::new());
    }

    /// Pops the innermost scope. Resources still valid at a reachable scope
    /// end are lost.
    pub(super) fn pop_scope(&mut self, exits: bool) {
        let Some(scope) = self.scopes.pop() else {
            return;
        };
        for (name, variable) in scope {
            let Some(id) = variable.resource else {
                continue;
            };
            let lost = !self.resources.is_invalidated(id);
            self.resources.release(id);
            if lost && !exits {
                self.report(CheckerErrorKind::ResourceLoss { name: Some(name) }, variable.span);
            }
        }
    }

    pub(super) fn declare_variable(
        &mut self,
        name: &str,
        ty: Type,
        kind: VariableKind,
        span: Span,
    ) -> Option<ResourceId> {
        if self
            .scopes
            .last()
            .is_some_and(|scope| scope.contains_key(name))
        {
            self.report(
                CheckerErrorKind::Redeclaration {
                    name: name.to_string(),
                },
                span,
            );
        }
        let resource = (ty.is_resource() && !self.functions.is_empty())
            .then(|| self.resources.track(name, span));
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(
                name.to_string(),
                Variable {
                    ty,
                    kind,
                    span,
                    resource,
                },
            );
        }
        resource
    }

    pub(super) fn lookup_variable(&self, name: &str) -> Option<&Variable> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    /// Resources declared inside the current function that are still valid.
    pub(super) fn live_function_resources(&self) -> Vec<(String, Span)> {
        let base = self.functions.last().map(|function| function.scope_base).unwrap_or(0);
        self.scopes[base.min(self.scopes.len())..]
            .iter()
            .flat_map(|scope| scope.iter())
            .filter_map(|(name, variable)| {
                let id = variable.resource?;
                (!self.resources.is_invalidated(id)).then(|| (name.clone(), variable.span))
            })
            .collect()
    }

    // Names

    pub(super) fn qualified(&self, name: &str) -> String {
        if self.type_prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}.{name}", self.type_prefix.join("."))
        }
    }

    /// Resolves a possibly qualified nominal type name from the innermost
    /// enclosing declaration outwards.
    pub(super) fn lookup_nominal_type(&self, name: &str) -> Option<Type> {
        (0..=self.type_prefix.len()).rev().find_map(|depth| {
            let qualified = if depth == 0 {
                name.to_string()
            } else {
                format!("{}.{name}", self.type_prefix[..depth].join("."))
            };
            let type_id = self.location.type_id(&qualified);
            if let Some(composite) = self.elaboration.composite(&type_id) {
                return Some(Type::Composite(composite.ty.clone()));
            }
            self.elaboration
                .interface(&type_id)
                .map(|interface| Type::Interface(interface.ty.clone()))
        })
    }

    fn lookup_entitlement(&self, name: &str) -> Option<EntitlementType> {
        (0..=self.type_prefix.len()).rev().find_map(|depth| {
            let qualified = if depth == 0 {
                name.to_string()
            } else {
                format!("{}.{name}", self.type_prefix[..depth].join("."))
            };
            self.elaboration
                .entitlement(&self.location.type_id(&qualified))
                .cloned()
        })
    }

    // Types

    pub(super) fn resolve_annotation(&mut self, annotation: &TypeAnnotation) -> Type {
        let ty = self.resolve_type(&annotation.ty, annotation.span);
        if ty.is_invalid() {
            return ty;
        }
        match (annotation.is_resource, ty.is_resource()) {
            (false, true) => self.report(
                CheckerErrorKind::MissingResourceAnnotation { ty: ty.clone() },
                annotation.span,
            ),
            (true, false) => self.report(
                CheckerErrorKind::InvalidResourceAnnotation { ty: ty.clone() },
                annotation.span,
            ),
            _ => {}
        }
        ty
    }

    pub(super) fn resolve_type(&mut self, expr: &TypeExpr, span: Span) -> Type {
        match expr {
            TypeExpr::Named(name) => {
                if let Some(primitive) = PrimitiveType::from_name(name) {
                    return Type::Primitive(primitive);
                }
                match self.lookup_nominal_type(name) {
                    Some(ty) => ty,
                    None => {
                        self.report(
                            CheckerErrorKind::NotDeclared {
                                name: name.clone(),
                                kind: "type",
                            },
                            span,
                        );
                        Type::Invalid
                    }
                }
            }
            TypeExpr::Optional(inner) => Type::optional(self.resolve_type(inner, span)),
            TypeExpr::VariableSized(element) => Type::array(self.resolve_type(element, span)),
            TypeExpr::ConstantSized { size, ty } => {
                let element = self.resolve_type(ty, span);
                let size = match size.value() {
                    Ok(size) => size,
                    Err(SizeLiteralError::InvalidBase(base)) => {
                        self.report(CheckerErrorKind::InvalidConstantSizedTypeBase { base }, span);
                        let digits: String = size.text.chars().skip(2).filter(|c| *c != '_').collect();
                        u64::from_str_radix(&digits, base).unwrap_or(u64::MAX)
                    }
                    Err(SizeLiteralError::OutOfRange) => {
                        self.report(
                            CheckerErrorKind::InvalidConstantSizedTypeSize {
                                size: size.text.clone(),
                            },
                            span,
                        );
                        u64::MAX
                    }
                };
                Type::constant_array(element, size)
            }
            TypeExpr::Dictionary { key, value } => {
                let key = self.resolve_type(key, span);
                let value = self.resolve_type(value, span);
                if !key.is_hashable() {
                    self.report(CheckerErrorKind::InvalidDictionaryKeyType { ty: key.clone() }, span);
                }
                Type::dictionary(key, value)
            }
            TypeExpr::Reference { authorization, ty } => {
                let referenced = self.resolve_type(ty, span);
                if matches!(referenced, Type::Reference(_)) {
                    self.report(CheckerErrorKind::NestedReference { ty: referenced.clone() }, span);
                }
                let authorization = match authorization {
                    Some(expr) => self.resolve_authorization(expr, span),
                    None => Authorization::Unauthorized,
                };
                Type::reference(authorization, referenced)
            }
            TypeExpr::Intersection(names) => {
                let mut interfaces = Vec::with_capacity(names.len());
                for name in names {
                    match self.lookup_nominal_type(name) {
                        Some(Type::Interface(interface)) => interfaces.push(interface),
                        Some(_) => {
                            self.report(CheckerErrorKind::InvalidConformance { name: name.clone() }, span);
                            return Type::Invalid;
                        }
                        None => {
                            self.report(
                                CheckerErrorKind::NotDeclared {
                                    name: name.clone(),
                                    kind: "type",
                                },
                                span,
                            );
                            return Type::Invalid;
                        }
                    }
                }
                Type::intersection(interfaces)
            }
            TypeExpr::Function { params, ret } => {
                let params = params
                    .iter()
                    .map(|param| self.resolve_annotation(param))
                    .collect();
                let ret = self.resolve_annotation(ret);
                Type::function(params, ret)
            }
        }
    }

    // Access

    pub(super) fn resolve_entitlement(&mut self, name: &str, span: Span) -> Option<EntitlementType> {
        if let Some(entitlement) = builtin_entitlement(name).or_else(|| self.lookup_entitlement(name)) {
            return Some(entitlement);
        }
        let kind = if self.lookup_nominal_type(name).is_some() || PrimitiveType::from_name(name).is_some() {
            CheckerErrorKind::InvalidNonEntitlementAccess {
                name: name.to_string(),
            }
        } else {
            CheckerErrorKind::NotDeclared {
                name: name.to_string(),
                kind: "entitlement",
            }
        };
        self.report(kind, span);
        None
    }

    fn resolve_entitlement_set(&mut self, expr: &AuthorizationExpr, span: Span) -> Option<EntitlementSetAccess> {
        let mut entitlements = Vec::with_capacity(expr.names().len());
        for name in expr.names() {
            entitlements.push(self.resolve_entitlement(name, span)?);
        }
        let kind = match expr {
            AuthorizationExpr::Conjunction(_) => SetKind::Conjunction,
            AuthorizationExpr::Disjunction(_) => SetKind::Disjunction,
        };
        Some(EntitlementSetAccess::new(entitlements, kind))
    }

    pub(super) fn resolve_authorization(&mut self, expr: &AuthorizationExpr, span: Span) -> Authorization {
        match self.resolve_entitlement_set(expr, span) {
            Some(set) => Authorization::EntitlementSet(set),
            None => Authorization::Unauthorized,
        }
    }

    /// Resolves a declaration's access modifier. `declaration` names the
    /// declaration in the error for positions that cannot be entitled.
    pub(super) fn resolve_access(
        &mut self,
        modifier: &AccessModifier,
        span: Span,
        entitlements_allowed: bool,
        declaration: &str,
    ) -> Access {
        match modifier {
            AccessModifier::NotSpecified | AccessModifier::All => Access::ALL,
            AccessModifier::SelfOnly => Access::Primitive(PrimitiveAccess::SelfOnly),
            AccessModifier::Contract => Access::Primitive(PrimitiveAccess::Contract),
            AccessModifier::Account => Access::Primitive(PrimitiveAccess::Account),
            AccessModifier::Entitlements(expr) => {
                if !entitlements_allowed {
                    self.report(
                        CheckerErrorKind::InvalidEntitlementAccess {
                            declaration: declaration.to_string(),
                        },
                        span,
                    );
                    return Access::ALL;
                }
                match self.resolve_entitlement_set(expr, span) {
                    Some(set) => Access::EntitlementSet(set),
                    None => Access::ALL,
                }
            }
        }
    }
}
