use super::{call, check, init_tracing, program, run, run_with};
use crate::{
    language::{
        ast::{
            AccessModifier, BinaryOp, Block, CastKind, CompositeDecl, EntitlementDecl, Expr, FieldDecl, FunctionBlock,
            FunctionDecl, FunctionExpr, Parameter, Program, Statement,
        },
        location::Address,
        span::Span,
        typecheck::{check_program, CheckerErrorKind, Config as CheckerConfig, ValueActivation},
        types::{AuthorizationExpr, TypeExpr},
    },
    runtime::{
        ComputationKind, Config, ExecutionError, FunctionExecutor, HostActivation, HostFunction, InMemoryStorage,
        Interpreter, Ledger, MemoryUsage, MeterGauge, MeteringError, PathValue, RuntimeError, Unmetered, Value,
    },
    sema::ty::{PrimitiveType, Type},
};

#[test]
fn recursion_stops_at_the_stack_limit() {
    let program = program().declare(
        FunctionDecl::new("descend")
            .param("depth", TypeExpr::named("Int"))
            .returns(TypeExpr::named("Int"))
            .body(vec![Statement::ret(call(
                "descend",
                vec![Expr::binary(BinaryOp::Add, Expr::ident("depth"), Expr::int(1))],
            ))]),
    );
    let config = Config {
        stack_depth_limit: 8,
        ..Config::default()
    };
    let error = run_with(&program, &config, "descend", vec![Value::int(0)]).unwrap_err();
    assert!(matches!(error.cause, RuntimeError::CallStackLimitExceeded { limit: 8 }));
    assert_eq!(error.stack_trace.len(), 8);
}

#[test]
fn traced_invocations_return_their_value() {
    init_tracing();
    let program = program().declare(
        FunctionDecl::new("main")
            .returns(TypeExpr::named("String"))
            .body(vec![Statement::ret(Expr::method(
                Expr::string("sa"),
                "concat",
                vec![Expr::string("ble")],
            ))]),
    );
    let config = Config {
        tracing_enabled: true,
        ..Config::default()
    };
    let value = run_with(&program, &config, "main", vec![]).unwrap();
    assert_eq!(value.to_string(), "\"sable\"");
}

struct StatementBudget {
    remaining: u64,
}

impl MeterGauge for StatementBudget {
    fn meter_computation(&mut self, kind: ComputationKind, intensity: u64) -> Result<(), MeteringError> {
        if kind != ComputationKind::Statement {
            return Ok(());
        }
        self.remaining = self
            .remaining
            .checked_sub(intensity)
            .ok_or_else(|| MeteringError::new("statement budget exhausted"))?;
        Ok(())
    }

    fn meter_memory(&mut self, _usage: MemoryUsage) -> Result<(), MeteringError> {
        Ok(())
    }
}

#[test]
fn gauge_errors_abort_the_invocation() {
    let program = program().declare(FunctionDecl::new("main").body(vec![
        Statement::var("i", Expr::int(0)),
        Statement::while_(
            Expr::bool(true),
            vec![Statement::assign(
                Expr::ident("i"),
                Expr::binary(BinaryOp::Add, Expr::ident("i"), Expr::int(1)),
            )],
        ),
    ]));
    let elaboration = check(&program);
    let config = Config::default();
    let mut storage = InMemoryStorage::new();
    let mut gauge = StatementBudget { remaining: 100 };
    let mut interpreter = Interpreter::new(&program, &elaboration, &config, &mut storage, &mut gauge).unwrap();
    let error = interpreter.invoke("main", vec![]).unwrap_err();
    assert!(matches!(error.cause, RuntimeError::Metering(_)));
    assert_eq!(error.to_string(), "metering failed: statement budget exhausted");
}

#[test]
fn enum_cases_and_raw_values() {
    let program = program()
        .declare(
            CompositeDecl::enumeration("Color", TypeExpr::named("UInt8"))
                .case("red")
                .case("green"),
        )
        .declare(
            FunctionDecl::new("green")
                .returns(TypeExpr::named("UInt8"))
                .body(vec![Statement::ret(Expr::member(
                    Expr::member(Expr::ident("Color"), "green"),
                    "rawValue",
                ))]),
        )
        .declare(
            FunctionDecl::new("pick")
                .param("raw", TypeExpr::named("UInt8"))
                .returns(TypeExpr::optional(TypeExpr::named("Color")))
                .body(vec![Statement::ret(call("Color", vec![Expr::ident("raw")]))]),
        );
    assert_eq!(run(&program, "green", vec![]).unwrap().to_string(), "1");

    let missing = Value::integer(PrimitiveType::UInt8, 7);
    assert_eq!(run(&program, "pick", vec![missing]).unwrap().to_string(), "nil");
    let red = Value::integer(PrimitiveType::UInt8, 0);
    let picked = run(&program, "pick", vec![red]).unwrap();
    let case = picked.into_present().and_then(|value| value.as_composite().cloned()).unwrap();
    assert_eq!(case.field("rawValue").unwrap().to_string(), "0");
}

#[test]
fn contracts_are_instantiated_before_invocation() {
    let program = program()
        .declare(
            CompositeDecl::contract("Bank")
                .field(FieldDecl::constant("reserve", TypeExpr::named("Int")))
                .init(FunctionDecl::initializer().body(vec![Statement::assign(
                    Expr::member(Expr::ident("self"), "reserve"),
                    Expr::int(42),
                )]))
                .function(
                    FunctionDecl::new("total")
                        .returns(TypeExpr::named("Int"))
                        .body(vec![Statement::ret(Expr::member(Expr::ident("self"), "reserve"))]),
                ),
        )
        .declare(
            FunctionDecl::new("main")
                .returns(TypeExpr::named("Int"))
                .body(vec![Statement::ret(Expr::method(Expr::ident("Bank"), "total", vec![]))]),
        );
    assert_eq!(run(&program, "main", vec![]).unwrap().to_string(), "42");
}

#[test]
fn closures_capture_their_scope() {
    let adder = FunctionExpr {
        params: vec![Parameter {
            name: "x".into(),
            ty: TypeExpr::named("Int").into(),
            span: Span::default(),
        }],
        return_type: Some(TypeExpr::named("Int").into()),
        body: FunctionBlock {
            statements: Some(Block::new(vec![Statement::ret(Expr::binary(
                BinaryOp::Add,
                Expr::ident("x"),
                Expr::ident("base"),
            ))])),
            ..Default::default()
        },
    };
    let program = program().declare(FunctionDecl::new("main").returns(TypeExpr::named("Int")).body(vec![
        Statement::let_("base", Expr::int(10)),
        Statement::let_("add", Expr::function(adder)),
        Statement::ret(call("add", vec![Expr::int(5)])),
    ]));
    assert_eq!(run(&program, "main", vec![]).unwrap().to_string(), "15");
}

#[test]
fn casts_check_the_dynamic_type() {
    let program = program()
        .declare(
            FunctionDecl::new("failable")
                .returns(TypeExpr::named("Int"))
                .body(vec![
                    Statement::let_typed("x", TypeExpr::named("AnyStruct"), Expr::int(1)),
                    Statement::ret(Expr::binary(
                        BinaryOp::NilCoalescing,
                        Expr::cast(Expr::ident("x"), CastKind::Failable, TypeExpr::named("Int")),
                        Expr::int(0),
                    )),
                ]),
        )
        .declare(
            FunctionDecl::new("forced")
                .returns(TypeExpr::named("String"))
                .body(vec![
                    Statement::let_typed("x", TypeExpr::named("AnyStruct"), Expr::int(1)),
                    Statement::ret(Expr::cast(Expr::ident("x"), CastKind::Force, TypeExpr::named("String"))),
                ]),
        );
    assert_eq!(run(&program, "failable", vec![]).unwrap().to_string(), "1");
    let error = run(&program, "forced", vec![]).unwrap_err();
    assert!(matches!(
        &error.cause,
        RuntimeError::ForceCastTypeMismatch { expected, actual } if expected.id() == "String" && actual.id() == "Int"
    ));
}

#[test]
fn oversized_constant_array_reports_both_errors() {
    let program = program().declare(FunctionDecl::new("main").body(vec![Statement::let_typed(
        "xs",
        TypeExpr::constant_array(TypeExpr::named("Int"), "18446744073709551616"),
        Expr::array(vec![Expr::int(1)]),
    )]));
    let errors = check_program(&program).unwrap_err();
    let kinds: Vec<&CheckerErrorKind> = errors.kinds().collect();
    assert_eq!(kinds.len(), 2, "{kinds:?}");
    assert!(matches!(kinds[0], CheckerErrorKind::InvalidConstantSizedTypeSize { .. }));
    assert!(matches!(kinds[1], CheckerErrorKind::ConstantSizedArrayLiteralSize { actual: 1, .. }));
}

fn storing_program() -> Program {
    program().declare(
        FunctionDecl::new("main").param("n", TypeExpr::named("Int")).body(vec![
            Statement::expr(call("store", vec![Expr::ident("n")])),
            Statement::if_(
                Expr::binary(BinaryOp::Less, Expr::ident("n"), Expr::int(0)),
                vec![Statement::expr(call("panic", vec![Expr::string("negative")]))],
                None,
            ),
        ]),
    )
}

fn store_signature() -> Type {
    Type::function(vec![Type::INT], Type::VOID)
}

fn executor(program: &Program, n: i64, commit: bool) -> FunctionExecutor<'_> {
    let config = Config {
        storage_commit_enabled: commit,
        ..Config::default()
    }
    .with_base_activation_handler(|_| {
        HostActivation::standard().with(HostFunction::new("store", store_signature(), |interpreter, arguments| {
            let value = arguments.into_iter().next().unwrap_or(Value::Void);
            interpreter.save(Address::from_u64(1), &PathValue::storage("counter"), value)?;
            Ok(Value::Void)
        }))
    });
    let checker_config = CheckerConfig::default()
        .with_base_value_activation_handler(|_| ValueActivation::standard().with("store", store_signature()));
    FunctionExecutor::new(program, "main", vec![Value::int(n)])
        .with_checker_config(checker_config)
        .with_config(config)
}

#[test]
fn storage_is_committed_only_after_success() {
    let program = storing_program();

    let mut ledger = Ledger::new();
    executor(&program, 3, true).execute(&mut ledger, &mut Unmetered).unwrap();
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger.write_log().len(), 1);

    let mut ledger = Ledger::new();
    let mut failing = executor(&program, -1, true);
    let error = failing.execute(&mut ledger, &mut Unmetered).unwrap_err();
    assert!(matches!(
        &error,
        ExecutionError::Runtime(error) if matches!(&error.cause, RuntimeError::Panic { message } if message == "negative")
    ));
    assert!(ledger.is_empty());
    assert!(failing.result().is_err());

    let mut ledger = Ledger::new();
    executor(&program, 3, false).execute(&mut ledger, &mut Unmetered).unwrap();
    assert!(ledger.is_empty());
}

#[test]
fn inferred_fallback_authorization_is_enough_to_run() {
    let field = |name: &str, access: AuthorizationExpr| {
        FieldDecl::constant(name, TypeExpr::named("Int")).with_access(AccessModifier::Entitlements(access))
    };
    let all = || AuthorizationExpr::all(["E1", "E2", "E3"]);
    let program = program()
        .declare(EntitlementDecl::new("E1"))
        .declare(EntitlementDecl::new("E2"))
        .declare(EntitlementDecl::new("E3"))
        .declare(
            CompositeDecl::structure("Safe")
                .field(field("either", AuthorizationExpr::any(["E1", "E2"])))
                .field(field("third", AuthorizationExpr::all(["E3"])))
                .init(FunctionDecl::initializer().body(vec![
                    Statement::assign(Expr::member(Expr::ident("self"), "either"), Expr::int(1)),
                    Statement::assign(Expr::member(Expr::ident("self"), "third"), Expr::int(2)),
                ])),
        )
        .declare(
            FunctionDecl::new("total")
                .param("safe", TypeExpr::auth_reference(all(), TypeExpr::named("Safe")))
                .returns(TypeExpr::named("Int"))
                .body(vec![Statement::ret(Expr::binary(
                    BinaryOp::Add,
                    Expr::member(Expr::ident("safe"), "either"),
                    Expr::member(Expr::ident("safe"), "third"),
                ))]),
        )
        .declare(FunctionDecl::new("main").returns(TypeExpr::named("Int")).body(vec![
            Statement::let_("safe", call("Safe", vec![])),
            Statement::let_(
                "view",
                Expr::reference(Expr::ident("safe"), TypeExpr::auth_reference(all(), TypeExpr::named("Safe"))),
            ),
            Statement::ret(call("total", vec![Expr::ident("view")])),
        ]));

    let mut executor = FunctionExecutor::new(&program, "main", vec![]);
    executor.preprocess().unwrap();
    let required = executor
        .elaboration()
        .and_then(|elaboration| elaboration.required_entitlements("total", "safe"))
        .and_then(|authorization| authorization.id());
    assert_eq!(required.as_deref(), Some("S.test.E1,S.test.E2,S.test.E3"));

    executor.execute(&mut Ledger::new(), &mut Unmetered).unwrap();
    assert_eq!(executor.result().unwrap().to_string(), "3");
}
