use crate::language::{
    location::{Address, Location},
    span::Span,
    types::{AuthorizationExpr, TypeAnnotation, TypeExpr},
};
use num_bigint::BigInt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of an expression node, used to key the elaboration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    pub fn fresh() -> Self {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Clone, Debug)]
pub struct Program {
    pub location: Location,
    pub declarations: Vec<Declaration>,
}

impl Program {
    pub fn new(location: Location) -> Self {
        Self {
            location,
            declarations: Vec::new(),
        }
    }

    pub fn declare(mut self, declaration: impl Into<Declaration>) -> Self {
        self.declarations.push(declaration.into());
        self
    }
}

#[derive(Clone, Debug)]
pub enum Declaration {
    Composite(CompositeDecl),
    Interface(InterfaceDecl),
    Entitlement(EntitlementDecl),
    Function(FunctionDecl),
    Variable(VariableDecl),
}

impl Declaration {
    pub fn name(&self) -> &str {
        match self {
            Declaration::Composite(decl) => &decl.name,
            Declaration::Interface(decl) => &decl.name,
            Declaration::Entitlement(decl) => &decl.name,
            Declaration::Function(decl) => &decl.name,
            Declaration::Variable(decl) => &decl.name,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Declaration::Composite(decl) => decl.span,
            Declaration::Interface(decl) => decl.span,
            Declaration::Entitlement(decl) => decl.span,
            Declaration::Function(decl) => decl.span,
            Declaration::Variable(decl) => decl.span,
        }
    }
}

impl From<CompositeDecl> for Declaration {
    fn from(decl: CompositeDecl) -> Self {
        Declaration::Composite(decl)
    }
}

impl From<InterfaceDecl> for Declaration {
    fn from(decl: InterfaceDecl) -> Self {
        Declaration::Interface(decl)
    }
}

impl From<EntitlementDecl> for Declaration {
    fn from(decl: EntitlementDecl) -> Self {
        Declaration::Entitlement(decl)
    }
}

impl From<FunctionDecl> for Declaration {
    fn from(decl: FunctionDecl) -> Self {
        Declaration::Function(decl)
    }
}

impl From<VariableDecl> for Declaration {
    fn from(decl: VariableDecl) -> Self {
        Declaration::Variable(decl)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompositeKind {
    Structure,
    Resource,
    Contract,
    Enum,
}

impl CompositeKind {
    pub fn keyword(self) -> &'static str {
        match self {
            CompositeKind::Structure => "struct",
            CompositeKind::Resource => "resource",
            CompositeKind::Contract => "contract",
            CompositeKind::Enum => "enum",
        }
    }

    pub fn is_resource(self) -> bool {
        matches!(self, CompositeKind::Resource)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum AccessModifier {
    #[default]
    NotSpecified,
    All,
    SelfOnly,
    Contract,
    Account,
    Entitlements(AuthorizationExpr),
}

#[derive(Clone, Debug, Default)]
pub struct Members {
    pub fields: Vec<FieldDecl>,
    pub initializer: Option<FunctionDecl>,
    pub functions: Vec<FunctionDecl>,
    pub enum_cases: Vec<EnumCaseDecl>,
    pub nested: Vec<Declaration>,
}

impl Members {
    pub fn function(&self, name: &str) -> Option<&FunctionDecl> {
        self.functions.iter().find(|function| function.name == name)
    }

    pub fn field(&self, name: &str) -> Option<&FieldDecl> {
        self.fields.iter().find(|field| field.name == name)
    }
}

#[derive(Clone, Debug)]
pub struct CompositeDecl {
    pub access: AccessModifier,
    pub kind: CompositeKind,
    pub name: String,
    pub conformances: Vec<String>,
    pub enum_raw_type: Option<TypeExpr>,
    pub members: Members,
    pub span: Span,
}

impl CompositeDecl {
    pub fn new(kind: CompositeKind, name: impl Into<String>) -> Self {
        Self {
            access: AccessModifier::All,
            kind,
            name: name.into(),
            conformances: Vec::new(),
            enum_raw_type: None,
            members: Members::default(),
            span: Span::default(),
        }
    }

    pub fn structure(name: impl Into<String>) -> Self {
        Self::new(CompositeKind::Structure, name)
    }

    pub fn resource(name: impl Into<String>) -> Self {
        Self::new(CompositeKind::Resource, name)
    }

    pub fn contract(name: impl Into<String>) -> Self {
        Self::new(CompositeKind::Contract, name)
    }

    pub fn enumeration(name: impl Into<String>, raw_type: TypeExpr) -> Self {
        let mut decl = Self::new(CompositeKind::Enum, name);
        decl.enum_raw_type = Some(raw_type);
        decl
    }

    pub fn conforming<I, S>(mut self, interfaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.conformances = interfaces.into_iter().map(Into::into).collect();
        self
    }

    pub fn field(mut self, field: FieldDecl) -> Self {
        self.members.fields.push(field);
        self
    }

    pub fn init(mut self, initializer: FunctionDecl) -> Self {
        self.members.initializer = Some(initializer);
        self
    }

    pub fn function(mut self, function: FunctionDecl) -> Self {
        self.members.functions.push(function);
        self
    }

    pub fn case(mut self, name: impl Into<String>) -> Self {
        self.members.enum_cases.push(EnumCaseDecl {
            name: name.into(),
            span: Span::default(),
        });
        self
    }

    pub fn nested(mut self, declaration: impl Into<Declaration>) -> Self {
        self.members.nested.push(declaration.into());
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }
}

#[derive(Clone, Debug)]
pub struct InterfaceDecl {
    pub access: AccessModifier,
    pub kind: CompositeKind,
    pub name: String,
    pub conformances: Vec<String>,
    pub members: Members,
    pub span: Span,
}

impl InterfaceDecl {
    pub fn new(kind: CompositeKind, name: impl Into<String>) -> Self {
        Self {
            access: AccessModifier::All,
            kind,
            name: name.into(),
            conformances: Vec::new(),
            members: Members::default(),
            span: Span::default(),
        }
    }

    pub fn structure(name: impl Into<String>) -> Self {
        Self::new(CompositeKind::Structure, name)
    }

    pub fn resource(name: impl Into<String>) -> Self {
        Self::new(CompositeKind::Resource, name)
    }

    pub fn contract(name: impl Into<String>) -> Self {
        Self::new(CompositeKind::Contract, name)
    }

    pub fn conforming<I, S>(mut self, interfaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.conformances = interfaces.into_iter().map(Into::into).collect();
        self
    }

    pub fn field(mut self, field: FieldDecl) -> Self {
        self.members.fields.push(field);
        self
    }

    pub fn function(mut self, function: FunctionDecl) -> Self {
        self.members.functions.push(function);
        self
    }

    pub fn nested(mut self, declaration: impl Into<Declaration>) -> Self {
        self.members.nested.push(declaration.into());
        self
    }
}

#[derive(Clone, Debug)]
pub struct EntitlementDecl {
    pub access: AccessModifier,
    pub name: String,
    pub span: Span,
}

impl EntitlementDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            access: AccessModifier::All,
            name: name.into(),
            span: Span::default(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct EnumCaseDecl {
    pub name: String,
    pub span: Span,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VariableKind {
    Constant,
    Variable,
}

#[derive(Clone, Debug)]
pub struct FieldDecl {
    pub access: AccessModifier,
    pub kind: VariableKind,
    pub name: String,
    pub ty: TypeAnnotation,
    pub span: Span,
}

impl FieldDecl {
    pub fn constant(name: impl Into<String>, ty: impl Into<TypeAnnotation>) -> Self {
        Self {
            access: AccessModifier::All,
            kind: VariableKind::Constant,
            name: name.into(),
            ty: ty.into(),
            span: Span::default(),
        }
    }

    pub fn variable(name: impl Into<String>, ty: impl Into<TypeAnnotation>) -> Self {
        Self {
            kind: VariableKind::Variable,
            ..Self::constant(name, ty)
        }
    }

    pub fn with_access(mut self, access: AccessModifier) -> Self {
        self.access = access;
        self
    }
}

#[derive(Clone, Debug)]
pub struct Parameter {
    pub name: String,
    pub ty: TypeAnnotation,
    pub span: Span,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConditionKind {
    Pre,
    Post,
}

impl ConditionKind {
    pub fn name(self) -> &'static str {
        match self {
            ConditionKind::Pre => "pre-condition",
            ConditionKind::Post => "post-condition",
        }
    }
}

#[derive(Clone, Debug)]
pub struct Condition {
    pub kind: ConditionKind,
    pub test: Expr,
    pub message: Option<Expr>,
    pub span: Span,
}

/// Function body: conditions plus optional statements.
///
/// Interface functions may declare conditions without statements; only a
/// block with statements counts as an implementation.
#[derive(Clone, Debug, Default)]
pub struct FunctionBlock {
    pub pre_conditions: Vec<Condition>,
    pub post_conditions: Vec<Condition>,
    pub statements: Option<Block>,
}

impl FunctionBlock {
    pub fn has_statements(&self) -> bool {
        self.statements.is_some()
    }
}

#[derive(Clone, Debug)]
pub struct FunctionDecl {
    pub access: AccessModifier,
    pub name: String,
    pub params: Vec<Parameter>,
    pub return_type: Option<TypeAnnotation>,
    pub body: Option<FunctionBlock>,
    pub span: Span,
}

impl FunctionDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            access: AccessModifier::All,
            name: name.into(),
            params: Vec::new(),
            return_type: None,
            body: None,
            span: Span::default(),
        }
    }

    pub fn initializer() -> Self {
        Self {
            access: AccessModifier::NotSpecified,
            ..Self::new("init")
        }
    }

    pub fn with_access(mut self, access: AccessModifier) -> Self {
        self.access = access;
        self
    }

    pub fn param(mut self, name: impl Into<String>, ty: impl Into<TypeAnnotation>) -> Self {
        self.params.push(Parameter {
            name: name.into(),
            ty: ty.into(),
            span: Span::default(),
        });
        self
    }

    pub fn returns(mut self, ty: impl Into<TypeAnnotation>) -> Self {
        self.return_type = Some(ty.into());
        self
    }

    pub fn body(mut self, statements: Vec<Statement>) -> Self {
        self.body.get_or_insert_with(FunctionBlock::default).statements = Some(Block::new(statements));
        self
    }

    pub fn pre(mut self, test: Expr) -> Self {
        self.push_condition(ConditionKind::Pre, test, None);
        self
    }

    pub fn pre_with_message(mut self, test: Expr, message: Expr) -> Self {
        self.push_condition(ConditionKind::Pre, test, Some(message));
        self
    }

    pub fn post(mut self, test: Expr) -> Self {
        self.push_condition(ConditionKind::Post, test, None);
        self
    }

    pub fn post_with_message(mut self, test: Expr, message: Expr) -> Self {
        self.push_condition(ConditionKind::Post, test, Some(message));
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    fn push_condition(&mut self, kind: ConditionKind, test: Expr, message: Option<Expr>) {
        let span = test.span;
        let condition = Condition {
            kind,
            test,
            message,
            span,
        };
        let body = self.body.get_or_insert_with(FunctionBlock::default);
        match kind {
            ConditionKind::Pre => body.pre_conditions.push(condition),
            ConditionKind::Post => body.post_conditions.push(condition),
        }
    }

    pub fn has_implementation(&self) -> bool {
        self.body
            .as_ref()
            .map(FunctionBlock::has_statements)
            .unwrap_or(false)
    }

    pub fn pre_conditions(&self) -> &[Condition] {
        self.body
            .as_ref()
            .map(|body| body.pre_conditions.as_slice())
            .unwrap_or(&[])
    }

    pub fn post_conditions(&self) -> &[Condition] {
        self.body
            .as_ref()
            .map(|body| body.post_conditions.as_slice())
            .unwrap_or(&[])
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transfer {
    Copy,
    Move,
}

impl Transfer {
    pub fn operator(self) -> &'static str {
        match self {
            Transfer::Copy => "=",
            Transfer::Move => "<-",
        }
    }
}

#[derive(Clone, Debug)]
pub struct VariableDecl {
    pub access: AccessModifier,
    pub kind: VariableKind,
    pub name: String,
    pub ty: Option<TypeAnnotation>,
    pub transfer: Transfer,
    pub value: Expr,
    pub span: Span,
}

impl VariableDecl {
    pub fn new(kind: VariableKind, name: impl Into<String>, value: Expr) -> Self {
        Self {
            access: AccessModifier::NotSpecified,
            kind,
            name: name.into(),
            ty: None,
            transfer: Transfer::Copy,
            span: value.span,
            value,
        }
    }

    pub fn with_type(mut self, ty: impl Into<TypeAnnotation>) -> Self {
        self.ty = Some(ty.into());
        self
    }

    pub fn moving(mut self) -> Self {
        self.transfer = Transfer::Move;
        self
    }
}

#[derive(Clone, Debug, Default)]
pub struct Block {
    pub statements: Vec<Statement>,
    pub span: Span,
}

impl Block {
    pub fn new(statements: Vec<Statement>) -> Self {
        Self {
            statements,
            span: Span::default(),
        }
    }
}

#[derive(Clone, Debug)]
pub enum IfCondition {
    Expr(Expr),
    /// `if let name = optional`
    Let {
        name: String,
        transfer: Transfer,
        value: Expr,
    },
}

#[derive(Clone, Debug)]
pub enum Statement {
    Variable(VariableDecl),
    Assignment {
        target: Expr,
        transfer: Transfer,
        value: Expr,
        span: Span,
    },
    Expression(Expr),
    Return {
        value: Option<Expr>,
        span: Span,
    },
    If {
        condition: IfCondition,
        then_branch: Block,
        else_branch: Option<Block>,
        span: Span,
    },
    While {
        condition: Expr,
        body: Block,
        span: Span,
    },
    For {
        variable: String,
        iterable: Expr,
        body: Block,
        span: Span,
    },
    Break(Span),
    Continue(Span),
}

impl Statement {
    pub fn let_(name: impl Into<String>, value: Expr) -> Self {
        Statement::Variable(VariableDecl::new(VariableKind::Constant, name, value))
    }

    pub fn let_typed(name: impl Into<String>, ty: impl Into<TypeAnnotation>, value: Expr) -> Self {
        Statement::Variable(VariableDecl::new(VariableKind::Constant, name, value).with_type(ty))
    }

    pub fn let_move(name: impl Into<String>, value: Expr) -> Self {
        Statement::Variable(VariableDecl::new(VariableKind::Constant, name, value).moving())
    }

    pub fn var(name: impl Into<String>, value: Expr) -> Self {
        Statement::Variable(VariableDecl::new(VariableKind::Variable, name, value))
    }

    pub fn var_typed(name: impl Into<String>, ty: impl Into<TypeAnnotation>, value: Expr) -> Self {
        Statement::Variable(VariableDecl::new(VariableKind::Variable, name, value).with_type(ty))
    }

    pub fn assign(target: Expr, value: Expr) -> Self {
        let span = target.span.join(value.span);
        Statement::Assignment {
            target,
            transfer: Transfer::Copy,
            value,
            span,
        }
    }

    pub fn assign_move(target: Expr, value: Expr) -> Self {
        let span = target.span.join(value.span);
        Statement::Assignment {
            target,
            transfer: Transfer::Move,
            value,
            span,
        }
    }

    pub fn expr(expr: Expr) -> Self {
        Statement::Expression(expr)
    }

    pub fn ret(value: Expr) -> Self {
        let span = value.span;
        Statement::Return {
            value: Some(value),
            span,
        }
    }

    pub fn ret_void() -> Self {
        Statement::Return {
            value: None,
            span: Span::default(),
        }
    }

    pub fn if_(condition: Expr, then_branch: Vec<Statement>, else_branch: Option<Vec<Statement>>) -> Self {
        Statement::If {
            span: condition.span,
            condition: IfCondition::Expr(condition),
            then_branch: Block::new(then_branch),
            else_branch: else_branch.map(Block::new),
        }
    }

    pub fn if_let(
        name: impl Into<String>,
        value: Expr,
        then_branch: Vec<Statement>,
        else_branch: Option<Vec<Statement>>,
    ) -> Self {
        Statement::If {
            span: value.span,
            condition: IfCondition::Let {
                name: name.into(),
                transfer: Transfer::Copy,
                value,
            },
            then_branch: Block::new(then_branch),
            else_branch: else_branch.map(Block::new),
        }
    }

    pub fn while_(condition: Expr, body: Vec<Statement>) -> Self {
        Statement::While {
            span: condition.span,
            condition,
            body: Block::new(body),
        }
    }

    pub fn for_in(variable: impl Into<String>, iterable: Expr, body: Vec<Statement>) -> Self {
        Statement::For {
            variable: variable.into(),
            span: iterable.span,
            iterable,
            body: Block::new(body),
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Statement::Variable(decl) => decl.span,
            Statement::Assignment { span, .. }
            | Statement::Return { span, .. }
            | Statement::If { span, .. }
            | Statement::While { span, .. }
            | Statement::For { span, .. } => *span,
            Statement::Expression(expr) => expr.span,
            Statement::Break(span) | Statement::Continue(span) => *span,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathDomain {
    Storage,
    Public,
}

impl PathDomain {
    pub fn identifier(self) -> &'static str {
        match self {
            PathDomain::Storage => "storage",
            PathDomain::Public => "public",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Negate,
    Not,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    And,
    Or,
    NilCoalescing,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::Less => "<",
            BinaryOp::LessEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEqual => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::NilCoalescing => "??",
        }
    }

    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            BinaryOp::Add | BinaryOp::Subtract | BinaryOp::Multiply | BinaryOp::Divide | BinaryOp::Modulo
        )
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Less | BinaryOp::LessEqual | BinaryOp::Greater | BinaryOp::GreaterEqual
        )
    }

    pub fn is_equality(self) -> bool {
        matches!(self, BinaryOp::Equal | BinaryOp::NotEqual)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CastKind {
    /// `as`
    Static,
    /// `as?`
    Failable,
    /// `as!`
    Force,
}

#[derive(Clone, Debug)]
pub struct FunctionExpr {
    pub params: Vec<Parameter>,
    pub return_type: Option<TypeAnnotation>,
    pub body: FunctionBlock,
}

#[derive(Clone, Debug)]
pub struct Expr {
    pub id: NodeId,
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub enum ExprKind {
    Bool(bool),
    Nil,
    Integer(BigInt),
    /// Decimal fixed-point literal as written, e.g. `5.3`.
    FixedPoint(String),
    String(String),
    Address(Address),
    Path {
        domain: PathDomain,
        identifier: String,
    },
    Identifier(String),
    Array(Vec<Expr>),
    Dictionary(Vec<(Expr, Expr)>),
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Conditional {
        test: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Member {
        expr: Box<Expr>,
        name: String,
        optional: bool,
    },
    Index {
        expr: Box<Expr>,
        index: Box<Expr>,
    },
    Invocation {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Create(Box<Expr>),
    Destroy(Box<Expr>),
    Move(Box<Expr>),
    Reference {
        expr: Box<Expr>,
        ty: TypeAnnotation,
    },
    Cast {
        expr: Box<Expr>,
        kind: CastKind,
        ty: TypeAnnotation,
    },
    ForceUnwrap(Box<Expr>),
    Function(Box<FunctionExpr>),
}

impl Expr {
    pub fn new(kind: ExprKind) -> Self {
        Self {
            id: NodeId::fresh(),
            kind,
            span: Span::default(),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn int(value: impl Into<BigInt>) -> Self {
        Expr::new(ExprKind::Integer(value.into()))
    }

    pub fn fixed(literal: impl Into<String>) -> Self {
        Expr::new(ExprKind::FixedPoint(literal.into()))
    }

    pub fn bool(value: bool) -> Self {
        Expr::new(ExprKind::Bool(value))
    }

    pub fn nil() -> Self {
        Expr::new(ExprKind::Nil)
    }

    pub fn string(value: impl Into<String>) -> Self {
        Expr::new(ExprKind::String(value.into()))
    }

    pub fn address(address: Address) -> Self {
        Expr::new(ExprKind::Address(address))
    }

    pub fn storage_path(identifier: impl Into<String>) -> Self {
        Expr::new(ExprKind::Path {
            domain: PathDomain::Storage,
            identifier: identifier.into(),
        })
    }

    pub fn ident(name: impl Into<String>) -> Self {
        Expr::new(ExprKind::Identifier(name.into()))
    }

    pub fn array(elements: Vec<Expr>) -> Self {
        Expr::new(ExprKind::Array(elements))
    }

    pub fn dictionary(entries: Vec<(Expr, Expr)>) -> Self {
        Expr::new(ExprKind::Dictionary(entries))
    }

    pub fn not(expr: Expr) -> Self {
        Expr::new(ExprKind::Unary {
            op: UnaryOp::Not,
            expr: Box::new(expr),
        })
    }

    pub fn negate(expr: Expr) -> Self {
        Expr::new(ExprKind::Unary {
            op: UnaryOp::Negate,
            expr: Box::new(expr),
        })
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        let span = left.span.join(right.span);
        Expr::new(ExprKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
        .with_span(span)
    }

    pub fn conditional(test: Expr, then: Expr, otherwise: Expr) -> Self {
        Expr::new(ExprKind::Conditional {
            test: Box::new(test),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        })
    }

    pub fn member(expr: Expr, name: impl Into<String>) -> Self {
        Expr::new(ExprKind::Member {
            expr: Box::new(expr),
            name: name.into(),
            optional: false,
        })
    }

    pub fn optional_member(expr: Expr, name: impl Into<String>) -> Self {
        Expr::new(ExprKind::Member {
            expr: Box::new(expr),
            name: name.into(),
            optional: true,
        })
    }

    pub fn index(expr: Expr, index: Expr) -> Self {
        Expr::new(ExprKind::Index {
            expr: Box::new(expr),
            index: Box::new(index),
        })
    }

    pub fn call(callee: Expr, args: Vec<Expr>) -> Self {
        Expr::new(ExprKind::Invocation {
            callee: Box::new(callee),
            args,
        })
    }

    pub fn method(receiver: Expr, name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::call(Expr::member(receiver, name), args)
    }

    pub fn create(type_name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::new(ExprKind::Create(Box::new(Expr::call(
            Expr::ident(type_name),
            args,
        ))))
    }

    pub fn destroy(expr: Expr) -> Self {
        Expr::new(ExprKind::Destroy(Box::new(expr)))
    }

    pub fn moved(expr: Expr) -> Self {
        Expr::new(ExprKind::Move(Box::new(expr)))
    }

    pub fn reference(expr: Expr, ty: TypeExpr) -> Self {
        Expr::new(ExprKind::Reference {
            expr: Box::new(expr),
            ty: TypeAnnotation::new(ty),
        })
    }

    pub fn cast(expr: Expr, kind: CastKind, ty: impl Into<TypeAnnotation>) -> Self {
        Expr::new(ExprKind::Cast {
            expr: Box::new(expr),
            kind,
            ty: ty.into(),
        })
    }

    pub fn force(expr: Expr) -> Self {
        Expr::new(ExprKind::ForceUnwrap(Box::new(expr)))
    }

    pub fn function(function: FunctionExpr) -> Self {
        Expr::new(ExprKind::Function(Box::new(function)))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self.kind, ExprKind::Nil)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_ids_are_unique() {
        let first = Expr::int(1);
        let second = Expr::int(1);
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn conditions_without_statements_are_not_implementations() {
        let function = FunctionDecl::new("test").pre(Expr::bool(true));
        assert!(!function.has_implementation());
        assert_eq!(function.pre_conditions().len(), 1);

        let function = function.body(Vec::new());
        assert!(function.has_implementation());
    }

    #[test]
    fn declaration_names() {
        let decl: Declaration = CompositeDecl::resource("R").conforming(["I"]).into();
        assert_eq!(decl.name(), "R");
        match decl {
            Declaration::Composite(composite) => {
                assert!(composite.kind.is_resource());
                assert_eq!(composite.conformances, vec!["I".to_string()]);
            }
            other => panic!("unexpected declaration {other:?}"),
        }
    }
}
