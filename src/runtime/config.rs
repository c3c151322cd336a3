use crate::{
    config::{self, ConfigError},
    language::location::Location,
    runtime::{
        error::RuntimeError,
        value::{HostFunction, Value},
    },
    sema::ty::Type,
};
use indexmap::IndexMap;
use serde::Deserialize;
use std::{fmt, path::Path, sync::Arc};
use tracing::info;

/// Host functions predeclared for every program run in a location.
#[derive(Clone, Debug, Default)]
pub struct HostActivation {
    functions: IndexMap<String, HostFunction>,
}

impl HostActivation {
    pub fn new() -> Self {
        Self::default()
    }

    /// `panic` and `log`, matching the checker's standard activation.
    pub fn standard() -> Self {
        Self::new()
            .with(HostFunction::new(
                "panic",
                Type::function(vec![Type::STRING], Type::NEVER),
                |_, arguments| {
                    let message = match arguments.first() {
                        Some(Value::String(message)) => message.clone(),
                        Some(other) => other.to_string(),
                        None => String::new(),
                    };
                    Err(RuntimeError::Panic { message })
                },
            ))
            .with(HostFunction::new(
                "log",
                Type::function(vec![Type::ANY_STRUCT], Type::VOID),
                |_, arguments| {
                    for argument in &arguments {
                        info!(target: "sable::log", "{argument}");
                    }
                    Ok(Value::Void)
                },
            ))
    }

    pub fn with(mut self, function: HostFunction) -> Self {
        self.declare(function);
        self
    }

    pub fn declare(&mut self, function: HostFunction) {
        self.functions.insert(function.name.clone(), function);
    }

    pub fn get(&self, name: &str) -> Option<&HostFunction> {
        self.functions.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &HostFunction> {
        self.functions.values()
    }
}

pub type ActivationHandler = Arc<dyn Fn(&Location) -> HostActivation + Send + Sync>;

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(skip)]
    pub base_activation_handler: Option<ActivationHandler>,
    /// Deepest call nesting before `CallStackLimitExceeded`.
    pub stack_depth_limit: usize,
    /// Wraps every invocation in a tracing span.
    pub tracing_enabled: bool,
    /// Whether a successful execution writes storage back to the ledger.
    pub storage_commit_enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_activation_handler: None,
            stack_depth_limit: 1024,
            tracing_enabled: false,
            storage_commit_enabled: true,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field(
                "base_activation_handler",
                &self.base_activation_handler.as_ref().map(|_| "<handler>"),
            )
            .field("stack_depth_limit", &self.stack_depth_limit)
            .field("tracing_enabled", &self.tracing_enabled)
            .field("storage_commit_enabled", &self.storage_commit_enabled)
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

    pub fn with_base_activation_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Location) -> HostActivation + Send + Sync + 'static,
    {
        self.base_activation_handler = Some(Arc::new(handler));
        self
    }

    pub fn base_activation(&self, location: &Location) -> HostActivation {
        match &self.base_activation_handler {
            Some(handler) => handler(location),
            None => HostActivation::standard(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_loads_from_toml() {
        let config = Config::from_toml_str(
            r#"
                stack_depth_limit = 16
                tracing_enabled = true
            "#,
        )
        .unwrap();
        assert_eq!(config.stack_depth_limit, 16);
        assert!(config.tracing_enabled);
        assert!(config.storage_commit_enabled);
    }

    #[test]
    fn standard_activation_declares_panic_and_log() {
        let activation = Config::default().base_activation(&Location::script("test"));
        let names: Vec<&str> = activation.iter().map(|function| function.name.as_str()).collect();
        assert_eq!(names, ["panic", "log"]);
    }
}
