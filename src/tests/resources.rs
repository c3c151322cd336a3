use super::{call, program, run};
use crate::{
    language::{
        ast::{BinaryOp, CompositeDecl, Expr, FieldDecl, FunctionDecl, Program, Statement},
        types::{TypeAnnotation, TypeExpr},
    },
    runtime::{RuntimeError, Value},
};

fn vault() -> CompositeDecl {
    CompositeDecl::resource("Vault")
        .field(FieldDecl::variable("balance", TypeExpr::named("Int")))
        .init(
            FunctionDecl::initializer()
                .param("balance", TypeExpr::named("Int"))
                .body(vec![Statement::assign(
                    Expr::member(Expr::ident("self"), "balance"),
                    Expr::ident("balance"),
                )]),
        )
        .function(
            FunctionDecl::new("deposit")
                .param("from", TypeAnnotation::resource(TypeExpr::named("Vault")))
                .body(vec![
                    Statement::assign(
                        Expr::member(Expr::ident("self"), "balance"),
                        Expr::binary(
                            BinaryOp::Add,
                            Expr::member(Expr::ident("self"), "balance"),
                            Expr::member(Expr::ident("from"), "balance"),
                        ),
                    ),
                    Statement::expr(Expr::destroy(Expr::ident("from"))),
                ]),
        )
}

fn with_vault(main: FunctionDecl) -> Program {
    program().declare(vault()).declare(main)
}

#[test]
fn moved_resources_keep_their_state() {
    let program = with_vault(FunctionDecl::new("main").returns(TypeExpr::named("Int")).body(vec![
        Statement::let_move("a", Expr::create("Vault", vec![Expr::int(10)])),
        Statement::let_move("b", Expr::create("Vault", vec![Expr::int(5)])),
        Statement::expr(Expr::method(Expr::ident("a"), "deposit", vec![Expr::moved(Expr::ident("b"))])),
        Statement::let_move("c", Expr::ident("a")),
        Statement::let_("total", Expr::member(Expr::ident("c"), "balance")),
        Statement::expr(Expr::destroy(Expr::ident("c"))),
        Statement::ret(Expr::ident("total")),
    ]));
    assert_eq!(run(&program, "main", vec![]).unwrap().to_string(), "15");
}

#[test]
fn overwriting_a_dictionary_resource_is_a_loss() {
    let program = with_vault(FunctionDecl::new("main").body(vec![
        Statement::let_move(
            "vaults",
            Expr::dictionary(vec![(
                Expr::string("a"),
                Expr::moved(Expr::create("Vault", vec![Expr::int(1)])),
            )]),
        ),
        Statement::assign_move(
            Expr::index(Expr::ident("vaults"), Expr::string("a")),
            Expr::moved(Expr::create("Vault", vec![Expr::int(2)])),
        ),
        Statement::expr(Expr::destroy(Expr::ident("vaults"))),
    ]));
    let error = run(&program, "main", vec![]).unwrap_err();
    assert!(matches!(&error.cause, RuntimeError::ResourceLoss { ty } if ty.id() == "S.test.Vault"));
}

#[test]
fn integer_overflow_is_reported_with_its_type() {
    let program = program().declare(
        FunctionDecl::new("main")
            .param("x", TypeExpr::named("UInt8"))
            .returns(TypeExpr::named("UInt8"))
            .body(vec![Statement::ret(Expr::binary(BinaryOp::Add, Expr::ident("x"), Expr::ident("x")))]),
    );
    let value = Value::integer(crate::sema::ty::PrimitiveType::UInt8, 100);
    assert_eq!(run(&program, "main", vec![value]).unwrap().to_string(), "200");

    let value = Value::integer(crate::sema::ty::PrimitiveType::UInt8, 200);
    let error = run(&program, "main", vec![value]).unwrap_err();
    assert!(matches!(&error.cause, RuntimeError::Overflow { ty } if ty.id() == "UInt8"));
}

#[test]
fn division_by_zero() {
    let program = program().declare(
        FunctionDecl::new("main")
            .param("divisor", TypeExpr::named("Int"))
            .returns(TypeExpr::named("Int"))
            .body(vec![Statement::ret(Expr::binary(
                BinaryOp::Divide,
                Expr::int(10),
                Expr::ident("divisor"),
            ))]),
    );
    let error = run(&program, "main", vec![Value::int(0)]).unwrap_err();
    assert!(matches!(error.cause, RuntimeError::DivisionByZero));
}

#[test]
fn constant_sized_arrays_are_bounds_checked() {
    let program = program().declare(FunctionDecl::new("main").returns(TypeExpr::named("Int")).body(vec![
        Statement::let_typed(
            "xs",
            TypeExpr::constant_array(TypeExpr::named("Int"), "2"),
            Expr::array(vec![Expr::int(1), Expr::int(2)]),
        ),
        Statement::ret(Expr::index(Expr::ident("xs"), Expr::int(2))),
    ]));
    let error = run(&program, "main", vec![]).unwrap_err();
    assert!(matches!(
        &error.cause,
        RuntimeError::ArrayIndexOutOfBounds { index, size: 2 } if index == "2"
    ));
}

#[test]
fn forcing_nil_fails() {
    let program = program().declare(FunctionDecl::new("main").returns(TypeExpr::named("Int")).body(vec![
        Statement::let_typed("x", TypeExpr::optional(TypeExpr::named("Int")), Expr::nil()),
        Statement::ret(Expr::force(Expr::ident("x"))),
    ]));
    let error = run(&program, "main", vec![]).unwrap_err();
    assert!(matches!(error.cause, RuntimeError::ForceNil));
}

#[test]
fn panics_carry_their_message() {
    let program = program().declare(
        FunctionDecl::new("main").body(vec![Statement::expr(call("panic", vec![Expr::string("halt")]))]),
    );
    let error = run(&program, "main", vec![]).unwrap_err();
    assert!(matches!(&error.cause, RuntimeError::Panic { message } if message == "halt"));
    assert_eq!(error.stack_trace.len(), 2);
}
