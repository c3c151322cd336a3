//! Static checking.
//!
//! The checker walks a [`Program`](crate::language::ast::Program) once,
//! records the type of every expression node in an [`Elaboration`], and
//! collects every error it finds instead of stopping at the first one
//! (unless [`Config::error_short_circuiting_enabled`] is set).

mod checker;
mod declarations;
pub mod elaboration;
pub mod errors;
mod expressions;
mod members;
mod resources;
mod statements;

pub use checker::{check_program, check_program_with_config, Checker};
pub use elaboration::{CompositeInfo, Elaboration, InterfaceInfo, MemberInfo, MemberKind};
pub use errors::{CheckerError, CheckerErrorKind, CheckerErrors};

use crate::{
    config::{self, ConfigError},
    language::location::Location,
    sema::ty::Type,
};
use indexmap::IndexMap;
use serde::Deserialize;
use std::{fmt, path::Path, sync::Arc};

/// Values predeclared for every program checked in a location.
#[derive(Clone, Debug, Default)]
pub struct ValueActivation {
    values: IndexMap<String, Type>,
}

impl ValueActivation {
    pub fn new() -> Self {
        Self::default()
    }

    /// `panic` and `log`.
    pub fn standard() -> Self {
        Self::new()
            .with("panic", Type::function(vec![Type::STRING], Type::NEVER))
            .with("log", Type::function(vec![Type::ANY_STRUCT], Type::VOID))
    }

    pub fn with(mut self, name: impl Into<String>, ty: Type) -> Self {
        self.declare(name, ty);
        self
    }

    pub fn declare(&mut self, name: impl Into<String>, ty: Type) {
        self.values.insert(name.into(), ty);
    }

    pub fn get(&self, name: &str) -> Option<&Type> {
        self.values.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Type)> {
        self.values.iter().map(|(name, ty)| (name.as_str(), ty))
    }
}

pub type ValueActivationHandler = Arc<dyn Fn(&Location) -> ValueActivation + Send + Sync>;

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(skip)]
    pub base_value_activation_handler: Option<ValueActivationHandler>,
    pub max_nesting_depth: usize,
    pub error_short_circuiting_enabled: bool,
    pub required_entitlements_inference_enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_value_activation_handler: None,
            max_nesting_depth: 256,
            error_short_circuiting_enabled: false,
            required_entitlements_inference_enabled: true,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field(
                "base_value_activation_handler",
                &self.base_value_activation_handler.as_ref().map(|_| "<handler>"),
            )
            .field("max_nesting_depth", &self.max_nesting_depth)
            .field(
                "error_short_circuiting_enabled",
                &self.error_short_circuiting_enabled,
            )
            .field(
                "required_entitlements_inference_enabled",
                &self.required_entitlements_inference_enabled,
            )
            .finish()
    }
}

impl Config {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        config::from_toml_str(source)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        config::load_toml(path)
    }

    pub fn with_base_value_activation_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Location) -> ValueActivation + Send + Sync + 'static,
    {
        self.base_value_activation_handler = Some(Arc::new(handler));
        self
    }

    pub fn base_value_activation(&self, location: &Location) -> ValueActivation {
        match &self.base_value_activation_handler {
            Some(handler) => handler(location),
            None => ValueActivation::standard(),
        }
    }
}
