use crate::language::location::Location;
use indexmap::IndexSet;
use std::{fmt, sync::Arc};

/// A declared entitlement, the atom that authorizations are built from.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EntitlementType {
    /// `None` for the builtin entitlements.
    pub location: Option<Location>,
    pub qualified_identifier: Arc<str>,
}

impl EntitlementType {
    pub fn new(location: Location, qualified_identifier: impl AsRef<str>) -> Self {
        Self {
            location: Some(location),
            qualified_identifier: Arc::from(qualified_identifier.as_ref()),
        }
    }

    pub fn builtin(identifier: &str) -> Self {
        Self {
            location: None,
            qualified_identifier: Arc::from(identifier),
        }
    }

    pub fn id(&self) -> String {
        match &self.location {
            Some(location) => location.type_id(&self.qualified_identifier),
            None => self.qualified_identifier.to_string(),
        }
    }
}

impl fmt::Display for EntitlementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.qualified_identifier)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SetKind {
    Conjunction,
    Disjunction,
}

impl SetKind {
    fn separator(self) -> &'static str {
        match self {
            SetKind::Conjunction => ", ",
            SetKind::Disjunction => " | ",
        }
    }

    fn id_separator(self) -> &'static str {
        match self {
            SetKind::Conjunction => ",",
            SetKind::Disjunction => "|",
        }
    }
}

/// `access(E1, E2)` or `access(E1 | E2)`.
///
/// Equality ignores the order of entitlements.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntitlementSetAccess {
    pub entitlements: IndexSet<EntitlementType>,
    pub kind: SetKind,
}

impl EntitlementSetAccess {
    pub fn new<I>(entitlements: I, kind: SetKind) -> Self
    where
        I: IntoIterator<Item = EntitlementType>,
    {
        Self {
            entitlements: entitlements.into_iter().collect(),
            kind,
        }
    }

    pub fn conjunction<I>(entitlements: I) -> Self
    where
        I: IntoIterator<Item = EntitlementType>,
    {
        Self::new(entitlements, SetKind::Conjunction)
    }

    pub fn disjunction<I>(entitlements: I) -> Self
    where
        I: IntoIterator<Item = EntitlementType>,
    {
        Self::new(entitlements, SetKind::Disjunction)
    }

    pub fn contains(&self, entitlement: &EntitlementType) -> bool {
        self.entitlements.contains(entitlement)
    }

    /// Whether holding `self` grants what `required` asks for.
    pub fn grants(&self, required: &EntitlementSetAccess) -> bool {
        match (self.kind, required.kind) {
            (SetKind::Conjunction, SetKind::Conjunction) => required
                .entitlements
                .iter()
                .all(|entitlement| self.contains(entitlement)),
            (SetKind::Conjunction, SetKind::Disjunction) => required
                .entitlements
                .iter()
                .any(|entitlement| self.contains(entitlement)),
            // The holder only has one of its entitlements, so each of them
            // must satisfy the requirement alone.
            (SetKind::Disjunction, SetKind::Conjunction) => {
                self.entitlements.iter().all(|held| {
                    required
                        .entitlements
                        .iter()
                        .all(|needed| needed == held)
                })
            }
            (SetKind::Disjunction, SetKind::Disjunction) => self
                .entitlements
                .iter()
                .all(|entitlement| required.contains(entitlement)),
        }
    }

    pub fn id(&self) -> String {
        let mut ids: Vec<String> = self.entitlements.iter().map(EntitlementType::id).collect();
        ids.sort();
        ids.join(self.kind.id_separator())
    }
}

impl fmt::Display for EntitlementSetAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.entitlements.iter().map(ToString::to_string).collect();
        f.write_str(&rendered.join(self.kind.separator()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PrimitiveAccess {
    NotSpecified,
    SelfOnly,
    Contract,
    Account,
    All,
}

impl PrimitiveAccess {
    pub fn keyword(self) -> &'static str {
        match self {
            PrimitiveAccess::NotSpecified => "",
            PrimitiveAccess::SelfOnly => "access(self)",
            PrimitiveAccess::Contract => "access(contract)",
            PrimitiveAccess::Account => "access(account)",
            PrimitiveAccess::All => "access(all)",
        }
    }
}

/// Access modifier of a declared member.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Access {
    Primitive(PrimitiveAccess),
    EntitlementSet(EntitlementSetAccess),
}

impl Access {
    pub const ALL: Access = Access::Primitive(PrimitiveAccess::All);

    pub fn is_entitled(&self) -> bool {
        matches!(self, Access::EntitlementSet(_))
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Access::Primitive(primitive) => f.write_str(primitive.keyword()),
            Access::EntitlementSet(set) => write!(f, "access({set})"),
        }
    }
}

/// Authorization held by a reference.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum Authorization {
    #[default]
    Unauthorized,
    EntitlementSet(EntitlementSetAccess),
}

impl Authorization {
    pub fn conjunction<I>(entitlements: I) -> Self
    where
        I: IntoIterator<Item = EntitlementType>,
    {
        Authorization::EntitlementSet(EntitlementSetAccess::conjunction(entitlements))
    }

    pub fn disjunction<I>(entitlements: I) -> Self
    where
        I: IntoIterator<Item = EntitlementType>,
    {
        Authorization::EntitlementSet(EntitlementSetAccess::disjunction(entitlements))
    }

    /// `auth(self) &T` may be used where `auth(required) &T` is expected.
    pub fn grants(&self, required: &Authorization) -> bool {
        match (self, required) {
            (_, Authorization::Unauthorized) => true,
            (Authorization::Unauthorized, Authorization::EntitlementSet(_)) => false,
            (Authorization::EntitlementSet(held), Authorization::EntitlementSet(needed)) => {
                held.grants(needed)
            }
        }
    }

    /// Whether a member declared with `access` can be reached through a
    /// reference holding this authorization. Non-`all` primitive access is
    /// decided by declaration scope, not by the reference.
    pub fn permits(&self, access: &Access) -> bool {
        match access {
            Access::Primitive(primitive) => *primitive == PrimitiveAccess::All,
            Access::EntitlementSet(required) => match self {
                Authorization::Unauthorized => false,
                Authorization::EntitlementSet(held) => held.grants(required),
            },
        }
    }

    pub fn id(&self) -> Option<String> {
        match self {
            Authorization::Unauthorized => None,
            Authorization::EntitlementSet(set) => Some(set.id()),
        }
    }

    /// Human description used in diagnostics, e.g. `a (Insert) reference`.
    pub fn describe_reference(&self) -> String {
        match self {
            Authorization::Unauthorized => "a non-auth reference".into(),
            Authorization::EntitlementSet(set) => format!("a ({set}) reference"),
        }
    }
}

impl fmt::Display for Authorization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Authorization::Unauthorized => Ok(()),
            Authorization::EntitlementSet(set) => write!(f, "auth({set}) "),
        }
    }
}

impl From<Authorization> for Access {
    fn from(authorization: Authorization) -> Self {
        match authorization {
            Authorization::Unauthorized => Access::ALL,
            Authorization::EntitlementSet(set) => Access::EntitlementSet(set),
        }
    }
}
