use crate::language::span::Span;

/// Type as written in source, before name resolution.
#[derive(Clone, Debug, PartialEq)]
pub enum TypeExpr {
    /// Possibly qualified name, e.g. `Int` or `C.R`.
    Named(String),
    Optional(Box<TypeExpr>),
    VariableSized(Box<TypeExpr>),
    ConstantSized {
        size: SizeLiteral,
        ty: Box<TypeExpr>,
    },
    Dictionary {
        key: Box<TypeExpr>,
        value: Box<TypeExpr>,
    },
    Reference {
        authorization: Option<AuthorizationExpr>,
        ty: Box<TypeExpr>,
    },
    Intersection(Vec<String>),
    Function {
        params: Vec<TypeAnnotation>,
        ret: Box<TypeAnnotation>,
    },
}

impl TypeExpr {
    pub fn named(name: impl Into<String>) -> Self {
        TypeExpr::Named(name.into())
    }

    pub fn optional(inner: TypeExpr) -> Self {
        TypeExpr::Optional(Box::new(inner))
    }

    pub fn array(element: TypeExpr) -> Self {
        TypeExpr::VariableSized(Box::new(element))
    }

    pub fn constant_array(element: TypeExpr, size: impl Into<String>) -> Self {
        TypeExpr::ConstantSized {
            size: SizeLiteral::new(size),
            ty: Box::new(element),
        }
    }

    pub fn dictionary(key: TypeExpr, value: TypeExpr) -> Self {
        TypeExpr::Dictionary {
            key: Box::new(key),
            value: Box::new(value),
        }
    }

    pub fn reference(ty: TypeExpr) -> Self {
        TypeExpr::Reference {
            authorization: None,
            ty: Box::new(ty),
        }
    }

    pub fn auth_reference(authorization: AuthorizationExpr, ty: TypeExpr) -> Self {
        TypeExpr::Reference {
            authorization: Some(authorization),
            ty: Box::new(ty),
        }
    }

    pub fn intersection<I, S>(interfaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        TypeExpr::Intersection(interfaces.into_iter().map(Into::into).collect())
    }

    pub fn canonical_name(&self) -> String {
        match self {
            TypeExpr::Named(name) => name.clone(),
            TypeExpr::Optional(inner) => format!("{}?", inner.canonical_name()),
            TypeExpr::VariableSized(inner) => format!("[{}]", inner.canonical_name()),
            TypeExpr::ConstantSized { size, ty } => {
                format!("[{}; {}]", ty.canonical_name(), size.text)
            }
            TypeExpr::Dictionary { key, value } => {
                format!("{{{}: {}}}", key.canonical_name(), value.canonical_name())
            }
            TypeExpr::Reference { authorization, ty } => match authorization {
                Some(auth) => format!("auth({}) &{}", auth.render(), ty.canonical_name()),
                None => format!("&{}", ty.canonical_name()),
            },
            TypeExpr::Intersection(names) => format!("{{{}}}", names.join(", ")),
            TypeExpr::Function { params, ret } => {
                let rendered: Vec<String> = params.iter().map(|p| p.canonical_name()).collect();
                format!("fun({}): {}", rendered.join(", "), ret.canonical_name())
            }
        }
    }
}

/// The `N` of `[T; N]`, kept as written so range and base can be diagnosed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SizeLiteral {
    pub text: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SizeLiteralError {
    InvalidBase(u32),
    OutOfRange,
}

impl SizeLiteral {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn base(&self) -> u32 {
        let digits = self.text.trim_start_matches('-');
        match digits.get(..2) {
            Some("0x") => 16,
            Some("0o") => 8,
            Some("0b") => 2,
            _ => 10,
        }
    }

    pub fn value(&self) -> Result<u64, SizeLiteralError> {
        let base = self.base();
        if base != 10 {
            return Err(SizeLiteralError::InvalidBase(base));
        }
        let digits: String = self.text.chars().filter(|c| *c != '_').collect();
        if digits.starts_with('-') {
            return Err(SizeLiteralError::OutOfRange);
        }
        digits
            .parse::<u64>()
            .map_err(|_| SizeLiteralError::OutOfRange)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthorizationExpr {
    Conjunction(Vec<String>),
    Disjunction(Vec<String>),
}

impl AuthorizationExpr {
    pub fn all<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        AuthorizationExpr::Conjunction(names.into_iter().map(Into::into).collect())
    }

    pub fn any<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        AuthorizationExpr::Disjunction(names.into_iter().map(Into::into).collect())
    }

    pub fn names(&self) -> &[String] {
        match self {
            AuthorizationExpr::Conjunction(names) | AuthorizationExpr::Disjunction(names) => names,
        }
    }

    pub fn render(&self) -> String {
        match self {
            AuthorizationExpr::Conjunction(names) => names.join(", "),
            AuthorizationExpr::Disjunction(names) => names.join(" | "),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TypeAnnotation {
    /// Whether the annotation carries the resource marker `@`.
    pub is_resource: bool,
    pub ty: TypeExpr,
    pub span: Span,
}

impl TypeAnnotation {
    pub fn new(ty: TypeExpr) -> Self {
        Self {
            is_resource: false,
            ty,
            span: Span::default(),
        }
    }

    pub fn resource(ty: TypeExpr) -> Self {
        Self {
            is_resource: true,
            ty,
            span: Span::default(),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn canonical_name(&self) -> String {
        if self.is_resource {
            format!("@{}", self.ty.canonical_name())
        } else {
            self.ty.canonical_name()
        }
    }
}

impl From<TypeExpr> for TypeAnnotation {
    fn from(ty: TypeExpr) -> Self {
        TypeAnnotation::new(ty)
    }
}
