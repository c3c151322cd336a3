use super::{call, program, run};
use crate::{
    language::{
        ast::{BinaryOp, CompositeDecl, Expr, FunctionDecl, InterfaceDecl, Program, Statement},
        typecheck::{Config as CheckerConfig, ValueActivation},
        types::TypeExpr,
    },
    runtime::{
        Config, ExecutionError, FunctionExecutor, HostActivation, HostFunction, Ledger, RuntimeError, Unmetered, Value,
    },
    sema::ty::Type,
};
use std::sync::{Arc, Mutex};

fn record(label: &str) -> Expr {
    call("record", vec![Expr::string(label)])
}

fn logged(name: &str) -> FunctionDecl {
    FunctionDecl::new("test")
        .pre(record(&format!("pre {name}")))
        .post(record(&format!("post {name}")))
}

/// F, E, D: F, C: E, F, B: C, D and the concrete A: B.
fn diamond() -> Program {
    program()
        .declare(InterfaceDecl::structure("F").function(logged("F")))
        .declare(InterfaceDecl::structure("E").function(logged("E")))
        .declare(InterfaceDecl::structure("D").conforming(["F"]).function(logged("D")))
        .declare(InterfaceDecl::structure("C").conforming(["E", "F"]).function(logged("C")))
        .declare(InterfaceDecl::structure("B").conforming(["C", "D"]).function(logged("B")))
        .declare(
            CompositeDecl::structure("A")
                .conforming(["B"])
                .function(logged("A").body(vec![Statement::expr(record("body"))])),
        )
        .declare(FunctionDecl::new("main").body(vec![Statement::expr(Expr::method(
            call("A", vec![]),
            "test",
            vec![],
        ))]))
}

#[test]
fn inherited_conditions_wind_and_unwind_around_the_body() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let host_log = log.clone();
    let config = Config::default().with_base_activation_handler(move |_| {
        let log = host_log.clone();
        HostActivation::standard().with(HostFunction::new(
            "record",
            Type::function(vec![Type::STRING], Type::BOOL),
            move |_, arguments| {
                if let Some(Value::String(label)) = arguments.first() {
                    log.lock().unwrap().push(label.clone());
                }
                Ok(Value::Bool(true))
            },
        ))
    });
    let checker_config = CheckerConfig::default().with_base_value_activation_handler(|_| {
        ValueActivation::standard().with("record", Type::function(vec![Type::STRING], Type::BOOL))
    });

    let program = diamond();
    let mut executor = FunctionExecutor::new(&program, "main", vec![])
        .with_checker_config(checker_config)
        .with_config(config);
    executor.execute(&mut Ledger::new(), &mut Unmetered).unwrap();

    let log = log.lock().unwrap();
    assert_eq!(
        *log,
        [
            "pre B", "pre C", "pre E", "pre F", "pre D", "pre A", "body", "post A", "post D", "post F", "post E",
            "post C", "post B",
        ]
    );
}

/// An interface condition sees the interface's parameter names, not the
/// implementation's.
fn account() -> Program {
    program()
        .declare(
            InterfaceDecl::structure("Account").function(
                FunctionDecl::new("withdraw")
                    .param("amount", TypeExpr::named("Int"))
                    .returns(TypeExpr::named("Int"))
                    .pre_with_message(
                        Expr::binary(BinaryOp::Greater, Expr::ident("amount"), Expr::int(0)),
                        Expr::string("amount must be positive"),
                    )
                    .post_with_message(
                        Expr::binary(BinaryOp::Less, Expr::ident("result"), Expr::int(100)),
                        Expr::string("withdrawal too large"),
                    ),
            ),
        )
        .declare(
            CompositeDecl::structure("Wallet").conforming(["Account"]).function(
                FunctionDecl::new("withdraw")
                    .param("value", TypeExpr::named("Int"))
                    .returns(TypeExpr::named("Int"))
                    .body(vec![Statement::ret(Expr::binary(
                        BinaryOp::Multiply,
                        Expr::ident("value"),
                        Expr::int(2),
                    ))]),
            ),
        )
        .declare(
            FunctionDecl::new("main")
                .param("amount", TypeExpr::named("Int"))
                .returns(TypeExpr::named("Int"))
                .body(vec![Statement::ret(Expr::method(
                    call("Wallet", vec![]),
                    "withdraw",
                    vec![Expr::ident("amount")],
                ))]),
        )
}

#[test]
fn interface_conditions_guard_the_implementation() {
    let program = account();
    assert_eq!(run(&program, "main", vec![Value::int(10)]).unwrap().to_string(), "20");

    let error = run(&program, "main", vec![Value::int(0)]).unwrap_err();
    assert!(matches!(
        &error.cause,
        RuntimeError::PreCondition { message } if message == "amount must be positive"
    ));

    let error = run(&program, "main", vec![Value::int(60)]).unwrap_err();
    assert!(matches!(
        &error.cause,
        RuntimeError::PostCondition { message } if message == "withdrawal too large"
    ));
    assert_eq!(error.to_string(), "post-condition failed: withdrawal too large");
}

#[test]
fn failed_checking_is_cached_by_the_executor() {
    let program = program().declare(
        FunctionDecl::new("main")
            .returns(TypeExpr::named("Int"))
            .body(vec![Statement::ret(Expr::bool(true))]),
    );
    let mut executor = FunctionExecutor::new(&program, "main", vec![]);
    assert!(matches!(executor.preprocess(), Err(ExecutionError::Checking(_))));
    let error = executor.execute(&mut Ledger::new(), &mut Unmetered).unwrap_err();
    assert!(matches!(error, ExecutionError::Checking(_)));
    assert!(matches!(executor.result(), Err(ExecutionError::Checking(_))));
}
