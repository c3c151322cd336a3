use super::{checker::Checker, errors::CheckerErrorKind};
use crate::{
    language::{
        ast::{Block, Expr, ExprKind, IfCondition, Statement, Transfer, VariableDecl, VariableKind},
        span::Span,
    },
    sema::ty::Type,
};

impl Checker<'_> {
    /// Checks a block in its own scope. Returns whether control definitely
    /// leaves the block.
    pub(super) fn check_block(&mut self, block: &Block) -> bool {
        self.push_scope();
        let exits = self.check_statements(&block.statements);
        self.pop_scope(exits);
        exits
    }

    pub(super) fn check_statements(&mut self, statements: &[Statement]) -> bool {
        let mut exits = false;
        for statement in statements {
            if self.should_stop() {
                break;
            }
            exits |= self.check_statement(statement);
        }
        exits
    }

    fn check_statement(&mut self, statement: &Statement) -> bool {
        match statement {
            Statement::Variable(declaration) => {
                self.check_variable_declaration(declaration, false);
                false
            }
            Statement::Assignment {
                target,
                transfer,
                value,
                span,
            } => {
                self.check_assignment(target, *transfer, value, *span);
                false
            }
            Statement::Expression(expr) => {
                let ty = self.check_expression(expr, None);
                if ty.is_resource() {
                    self.report(CheckerErrorKind::ResourceLoss { name: None }, expr.span);
                }
                ty.is_never()
            }
            Statement::Return { value, span } => {
                self.check_return(value.as_ref(), *span);
                true
            }
            Statement::If {
                condition,
                then_branch,
                else_branch,
                span,
            } => self.check_if(condition, then_branch, else_branch.as_ref(), *span),
            Statement::While { condition, body, .. } => {
                self.expect_expression(condition, &Type::BOOL);
                self.check_loop_body(body, None);
                false
            }
            Statement::For {
                variable,
                iterable,
                body,
                span,
            } => {
                let element = self.iteration_element(iterable, *span);
                self.check_loop_body(body, Some((variable, element, *span)));
                false
            }
            Statement::Break(span) => {
                self.check_loop_control("break", *span);
                true
            }
            Statement::Continue(span) => {
                self.check_loop_control("continue", *span);
                true
            }
        }
    }

    pub(super) fn check_variable_declaration(&mut self, declaration: &VariableDecl, global: bool) {
        if global {
            self.resolve_access(&declaration.access, declaration.span, false, "variable declarations");
        }
        let annotated = declaration
            .ty
            .as_ref()
            .map(|annotation| self.resolve_annotation(annotation));

        let value_type = match &annotated {
            Some(expected) => self.expect_expression(&declaration.value, expected),
            None => self.check_expression(&declaration.value, None),
        };
        self.check_transfer(declaration.transfer, &value_type, declaration.span);
        if declaration.transfer == Transfer::Move {
            self.consume(&declaration.value);
        }

        let ty = annotated.unwrap_or(value_type);
        self.declare_variable(&declaration.name, ty.clone(), declaration.kind, declaration.span);
        if global {
            self.elaboration.set_global_type(declaration.name.clone(), ty);
        }
    }

    /// Resources must be moved with `<-`, everything else copied with `=`.
    pub(super) fn check_transfer(&mut self, transfer: Transfer, ty: &Type, span: Span) {
        if ty.is_invalid() || ty.is_never() {
            return;
        }
        match (transfer, ty.is_resource()) {
            (Transfer::Copy, true) => self.report(CheckerErrorKind::MissingMoveOperation { ty: ty.clone() }, span),
            (Transfer::Move, false) => self.report(CheckerErrorKind::InvalidMoveOperation { ty: ty.clone() }, span),
            _ => {}
        }
    }

    /// Marks the resource variable an expression moves out of as invalidated.
    pub(super) fn consume(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Identifier(name) => {
                if let Some(id) = self.lookup_variable(name).and_then(|variable| variable.resource) {
                    self.resources.invalidate(id, expr.span);
                }
            }
            ExprKind::Move(inner) | ExprKind::ForceUnwrap(inner) | ExprKind::Cast { expr: inner, .. } => {
                self.consume(inner)
            }
            _ => {}
        }
    }

    fn check_assignment(&mut self, target: &Expr, transfer: Transfer, value: &Expr, span: Span) {
        let target_type = self.check_assignment_target(target);
        let value_type = self.expect_expression(value, &target_type);
        self.check_transfer(transfer, &value_type, span);
        if transfer == Transfer::Move {
            self.consume(value);
        }

        if let ExprKind::Identifier(name) = &target.kind {
            if let Some(id) = self.lookup_variable(name).and_then(|variable| variable.resource) {
                if !self.resources.is_invalidated(id) && target_type.is_resource() {
                    self.report(
                        CheckerErrorKind::ResourceLoss {
                            name: Some(name.clone()),
                        },
                        span,
                    );
                }
                self.resources.revalidate(id);
            }
        }
    }

    fn check_return(&mut self, value: Option<&Expr>, span: Span) {
        let return_type = self
            .functions
            .last()
            .map(|function| function.return_type.clone())
            .unwrap_or(Type::VOID);

        match value {
            Some(value) => {
                let ty = self.expect_expression(value, &return_type);
                self.check_transfer_position(value, &ty);
            }
            None => {
                if !Type::VOID.is_subtype_of(&return_type) && !return_type.is_invalid() {
                    self.report(
                        CheckerErrorKind::TypeMismatch {
                            expected: return_type,
                            actual: Type::VOID,
                        },
                        span,
                    );
                }
            }
        }

        for (name, declared) in self.live_function_resources() {
            self.report(CheckerErrorKind::ResourceLoss { name: Some(name) }, declared);
        }
    }

    /// Argument, element and return positions take resources only through `<-`.
    pub(super) fn check_transfer_position(&mut self, expr: &Expr, ty: &Type) {
        if ty.is_resource() && !matches!(expr.kind, ExprKind::Move(_)) {
            self.report(CheckerErrorKind::MissingMoveOperation { ty: ty.clone() }, expr.span);
        }
    }

    fn check_if(
        &mut self,
        condition: &IfCondition,
        then_branch: &Block,
        else_branch: Option<&Block>,
        span: Span,
    ) -> bool {
        let binding = match condition {
            IfCondition::Expr(test) => {
                self.expect_expression(test, &Type::BOOL);
                None
            }
            IfCondition::Let { name, transfer, value } => {
                let ty = self.check_expression(value, None);
                let inner = match &ty {
                    Type::Optional(inner) => (**inner).clone(),
                    Type::Invalid => Type::Invalid,
                    other => {
                        self.report(CheckerErrorKind::InvalidOptionalBinding { ty: other.clone() }, value.span);
                        other.clone()
                    }
                };
                self.check_transfer(*transfer, &ty, span);
                if *transfer == Transfer::Move {
                    self.consume(value);
                }
                Some((name, inner))
            }
        };

        let before = self.resources.clone();
        let then_exits = match binding {
            Some((name, ty)) => {
                self.push_scope();
                self.declare_variable(name, ty, VariableKind::Constant, span);
                let exits = self.check_statements(&then_branch.statements);
                self.pop_scope(exits);
                exits
            }
            None => self.check_block(then_branch),
        };

        let then_state = self.resources.clone();
        self.resources.adopt(before);
        let else_exits = else_branch.is_some_and(|block| self.check_block(block));

        match (then_exits, else_exits) {
            (true, _) => {}
            (false, true) => self.resources.adopt(then_state),
            (false, false) => self.resources.join(&then_state),
        }
        then_exits && else_exits
    }

    fn iteration_element(&mut self, iterable: &Expr, span: Span) -> Type {
        let ty = self.check_expression(iterable, None);
        let (authorization, target) = match &ty {
            Type::Reference(reference) => (Some(reference.authorization.clone()), reference.ty.clone()),
            other => (None, other.clone()),
        };
        let element = match &target {
            Type::VariableSized(element) | Type::ConstantSized { element, .. } => (**element).clone(),
            Type::Dictionary { key, .. } => (**key).clone(),
            Type::Invalid => return Type::Invalid,
            other => {
                self.report(CheckerErrorKind::NotIterable { ty: other.clone() }, span);
                return Type::Invalid;
            }
        };
        match authorization {
            Some(authorization) if element.is_container() || element.is_resource() => {
                Type::reference(authorization, element)
            }
            Some(_) => element,
            None if element.is_resource() => {
                self.report(CheckerErrorKind::NotIterable { ty }, span);
                Type::Invalid
            }
            None => element,
        }
    }

    fn check_loop_body(&mut self, body: &Block, variable: Option<(&String, Type, Span)>) {
        let before = self.resources.clone();
        if let Some(function) = self.functions.last_mut() {
            function.loop_depth += 1;
        }

        self.push_scope();
        if let Some((name, ty, span)) = variable {
            self.declare_variable(name, ty, VariableKind::Constant, span);
        }
        let exits = self.check_statements(&body.statements);
        self.pop_scope(exits);

        if let Some(function) = self.functions.last_mut() {
            function.loop_depth -= 1;
        }
        for (_, resource) in self.resources.newly_invalidated(&before) {
            let at = resource.invalidated.unwrap_or(resource.declared);
            self.report(CheckerErrorKind::ResourceUseAfterInvalidation { name: resource.name }, at);
        }
        self.resources.join(&before);
    }

    fn check_loop_control(&mut self, statement: &'static str, span: Span) {
        let in_loop = self.functions.last().is_some_and(|function| function.loop_depth > 0);
        if !in_loop {
            self.report(CheckerErrorKind::ControlStatementOutsideLoop { statement }, span);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::language::{
        ast::{BinaryOp, CompositeDecl, Expr, FunctionDecl, Program, Statement},
        location::Location,
        typecheck::{check_program, CheckerErrorKind},
        types::{TypeAnnotation, TypeExpr},
    };

    fn check(function: FunctionDecl) -> Vec<CheckerErrorKind> {
        let program = Program::new(Location::script("test"))
            .declare(CompositeDecl::resource("R"))
            .declare(function);
        match check_program(&program) {
            Ok(_) => Vec::new(),
            Err(errors) => errors.kinds().cloned().collect(),
        }
    }

    fn resource() -> TypeAnnotation {
        TypeAnnotation::resource(TypeExpr::named("R"))
    }

    #[test]
    fn moved_resource_cannot_be_used() {
        let errors = check(FunctionDecl::new("test").body(vec![
            Statement::let_move("r", Expr::create("R", vec![])),
            Statement::let_move("s", Expr::ident("r")),
            Statement::expr(Expr::destroy(Expr::ident("s"))),
            Statement::expr(Expr::destroy(Expr::ident("r"))),
        ]));
        assert_eq!(errors.len(), 1);
        assert!(matches!(&errors[0], CheckerErrorKind::ResourceUseAfterInvalidation { name } if name == "r"));
    }

    #[test]
    fn unused_resource_is_lost() {
        let errors = check(FunctionDecl::new("test").body(vec![Statement::let_move(
            "r",
            Expr::create("R", vec![]),
        )]));
        assert!(matches!(&errors[..], [CheckerErrorKind::ResourceLoss { name: Some(name) }] if name == "r"));
    }

    #[test]
    fn resource_destroyed_in_one_branch_only_is_invalidated() {
        let errors = check(FunctionDecl::new("test").param("flag", TypeExpr::named("Bool")).body(vec![
            Statement::let_move("r", Expr::create("R", vec![])),
            Statement::if_(
                Expr::ident("flag"),
                vec![Statement::expr(Expr::destroy(Expr::ident("r")))],
                None,
            ),
            Statement::expr(Expr::destroy(Expr::ident("r"))),
        ]));
        assert!(matches!(&errors[..], [CheckerErrorKind::ResourceUseAfterInvalidation { .. }]));
    }

    #[test]
    fn returning_branch_does_not_invalidate() {
        let errors = check(
            FunctionDecl::new("test")
                .param("flag", TypeExpr::named("Bool"))
                .param("r", resource())
                .body(vec![
                    Statement::if_(
                        Expr::ident("flag"),
                        vec![Statement::expr(Expr::destroy(Expr::ident("r"))), Statement::ret_void()],
                        None,
                    ),
                    Statement::expr(Expr::destroy(Expr::ident("r"))),
                ]),
        );
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn resource_moved_inside_loop() {
        let errors = check(
            FunctionDecl::new("test")
                .param("r", resource())
                .body(vec![
                    Statement::while_(
                        Expr::bool(true),
                        vec![Statement::expr(Expr::destroy(Expr::ident("r")))],
                    ),
                ]),
        );
        assert!(matches!(&errors[..], [CheckerErrorKind::ResourceUseAfterInvalidation { name }] if name == "r"));
    }

    #[test]
    fn copy_of_resource_requires_move() {
        let errors = check(FunctionDecl::new("test").param("r", resource()).body(vec![
            Statement::let_("s", Expr::ident("r")),
        ]));
        assert!(matches!(errors[0], CheckerErrorKind::MissingMoveOperation { .. }));
    }

    #[test]
    fn break_outside_loop() {
        let errors = check(FunctionDecl::new("test").body(vec![Statement::Break(Default::default())]));
        assert!(matches!(
            errors[0],
            CheckerErrorKind::ControlStatementOutsideLoop { statement: "break" }
        ));
    }

    #[test]
    fn constant_cannot_be_reassigned() {
        let errors = check(FunctionDecl::new("test").body(vec![
            Statement::let_("x", Expr::int(1)),
            Statement::assign(Expr::ident("x"), Expr::binary(BinaryOp::Add, Expr::ident("x"), Expr::int(1))),
        ]));
        assert!(matches!(&errors[..], [CheckerErrorKind::AssignmentToConstant { name }] if name == "x"));
    }
}
