//! End-to-end tests: programs built from the AST, checked, then run.

mod conditions;
mod execution;
mod references;
mod resources;

use crate::{
    language::{
        ast::{Expr, Program},
        location::Location,
        typecheck::{check_program, Elaboration},
    },
    runtime::{Config, Error, InMemoryStorage, Interpreter, Unmetered, Value},
};
use std::sync::OnceLock;

/// Routes crate logs to the test harness output, once per process.
fn init_tracing() {
    static INITIALISED: OnceLock<()> = OnceLock::new();
    INITIALISED.get_or_init(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::TRACE)
            .try_init();
    });
}

fn program() -> Program {
    Program::new(Location::script("test"))
}

fn check(program: &Program) -> Elaboration {
    check_program(program).unwrap_or_else(|errors| panic!("program should check: {errors:?}"))
}

fn call(name: &str, args: Vec<Expr>) -> Expr {
    Expr::call(Expr::ident(name), args)
}

/// Checks `program` and invokes `function` on a fresh interpreter.
fn run(program: &Program, function: &str, arguments: Vec<Value>) -> Result<Value, Error> {
    run_with(program, &Config::default(), function, arguments)
}

fn run_with(program: &Program, config: &Config, function: &str, arguments: Vec<Value>) -> Result<Value, Error> {
    let elaboration = check(program);
    let mut storage = InMemoryStorage::new();
    let mut gauge = Unmetered;
    let mut interpreter = Interpreter::new(program, &elaboration, config, &mut storage, &mut gauge)?;
    interpreter.invoke(function, arguments)
}
