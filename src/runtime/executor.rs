//! Staged execution of one function against a ledger.
//!
//! `preprocess` checks the program, `execute` runs it and `result` reports
//! the outcome. Each stage runs at most once; asking again returns the
//! cached outcome. Storage writes reach the ledger only when the whole
//! execution succeeds.

use crate::{
    language::{
        ast::Program,
        typecheck::{self, check_program_with_config, CheckerErrors, Elaboration},
    },
    runtime::{
        config::Config,
        error::Error,
        interpreter::Interpreter,
        metering::MeterGauge,
        storage::{InMemoryStorage, Ledger},
        value::Value,
    },
};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Clone, Debug, Error)]
pub enum ExecutionError {
    #[error(transparent)]
    Checking(#[from] CheckerErrors),
    #[error(transparent)]
    Runtime(#[from] Error),
    #[error("function has not been executed yet")]
    NotExecuted,
}

pub struct FunctionExecutor<'p> {
    program: &'p Program,
    function: String,
    arguments: Vec<Value>,
    checker_config: typecheck::Config,
    config: Config,
    elaboration: Option<Result<Elaboration, ExecutionError>>,
    outcome: Option<Result<Value, ExecutionError>>,
}

impl<'p> FunctionExecutor<'p> {
    pub fn new(program: &'p Program, function: impl Into<String>, arguments: Vec<Value>) -> Self {
        Self {
            program,
            function: function.into(),
            arguments,
            checker_config: typecheck::Config::default(),
            config: Config::default(),
            elaboration: None,
            outcome: None,
        }
    }

    pub fn with_checker_config(mut self, config: typecheck::Config) -> Self {
        self.checker_config = config;
        self
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Checks the program.
    pub fn preprocess(&mut self) -> Result<(), ExecutionError> {
        if self.elaboration.is_none() {
            debug!(location = %self.program.location, "checking program");
            let checked = check_program_with_config(self.program, &self.checker_config).map_err(ExecutionError::from);
            self.elaboration = Some(checked);
        }
        match &self.elaboration {
            Some(Ok(_)) => Ok(()),
            Some(Err(error)) => Err(error.clone()),
            None => Err(ExecutionError::NotExecuted),
        }
    }

    /// Runs the function against a working copy of `ledger` and commits the
    /// copy back if it succeeded.
    pub fn execute(&mut self, ledger: &mut Ledger, gauge: &mut dyn MeterGauge) -> Result<(), ExecutionError> {
        if self.outcome.is_none() {
            let outcome = self.run(ledger, gauge);
            self.outcome = Some(outcome);
        }
        self.result().map(|_| ())
    }

    /// The checked program, once `preprocess` has succeeded.
    pub fn elaboration(&self) -> Option<&Elaboration> {
        self.elaboration.as_ref().and_then(|checked| checked.as_ref().ok())
    }

    pub fn result(&self) -> Result<Value, ExecutionError> {
        match &self.outcome {
            Some(outcome) => outcome.clone(),
            None => Err(ExecutionError::NotExecuted),
        }
    }

    fn run(&mut self, ledger: &mut Ledger, gauge: &mut dyn MeterGauge) -> Result<Value, ExecutionError> {
        self.preprocess()?;
        let Some(Ok(elaboration)) = &self.elaboration else {
            return Err(ExecutionError::NotExecuted);
        };

        let mut storage = InMemoryStorage::with_ledger(ledger.clone());
        let arguments = std::mem::take(&mut self.arguments);
        let value = {
            let mut interpreter = Interpreter::new(self.program, elaboration, &self.config, &mut storage, gauge)?;
            interpreter.invoke(&self.function, arguments)?
        };

        if self.config.storage_commit_enabled {
            let written = storage
                .commit()
                .map_err(|cause| Error::new(cause, self.program.location.clone()))?;
            info!(function = %self.function, writes = written.len(), "committed storage");
            *ledger = storage.into_ledger();
        }
        Ok(value)
    }
}
