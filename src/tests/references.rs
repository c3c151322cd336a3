use super::{check, program, run};
use crate::{
    language::{
        ast::{BinaryOp, CompositeDecl, Expr, FieldDecl, FunctionDecl, Program, Statement},
        location::Address,
        types::{TypeAnnotation, TypeExpr},
    },
    runtime::{Config, InMemoryStorage, Interpreter, PathValue, RuntimeError, Unmetered, Value},
    sema::access::Authorization,
};

fn resource() -> TypeAnnotation {
    TypeAnnotation::resource(TypeExpr::named("R"))
}

fn with_resource(program: Program) -> Program {
    program
        .declare(
            CompositeDecl::resource("R")
                .field(FieldDecl::constant("id", TypeExpr::named("Int")))
                .init(FunctionDecl::initializer().param("id", TypeExpr::named("Int")).body(vec![
                    Statement::assign(Expr::member(Expr::ident("self"), "id"), Expr::ident("id")),
                ])),
        )
        .declare(
            FunctionDecl::new("make")
                .param("id", TypeExpr::named("Int"))
                .returns(resource())
                .body(vec![Statement::ret(Expr::moved(Expr::create("R", vec![Expr::ident("id")])))]),
        )
        .declare(
            FunctionDecl::new("read")
                .param("r", TypeExpr::reference(TypeExpr::named("R")))
                .returns(TypeExpr::named("Int"))
                .body(vec![Statement::ret(Expr::member(Expr::ident("r"), "id"))]),
        )
}

fn borrow_r() -> Statement {
    Statement::let_(
        "view",
        Expr::reference(Expr::ident("r"), TypeExpr::reference(TypeExpr::named("R"))),
    )
}

#[test]
fn moving_the_referent_invalidates_an_ephemeral_reference() {
    let program = with_resource(program()).declare(
        FunctionDecl::new("main").returns(TypeExpr::named("Int")).body(vec![
            Statement::let_move("r", Expr::create("R", vec![Expr::int(1)])),
            borrow_r(),
            Statement::let_move("moved", Expr::ident("r")),
            Statement::let_("id", Expr::member(Expr::ident("view"), "id")),
            Statement::expr(Expr::destroy(Expr::ident("moved"))),
            Statement::ret(Expr::ident("id")),
        ]),
    );
    let error = run(&program, "main", vec![]).unwrap_err();
    assert!(matches!(error.cause, RuntimeError::InvalidatedResourceReference));
    assert_eq!(error.stack_trace.last().map(|frame| frame.function.as_str()), Some("main"));
}

#[test]
fn destroying_the_referent_invalidates_an_ephemeral_reference() {
    let program = with_resource(program()).declare(
        FunctionDecl::new("main").returns(TypeExpr::named("Int")).body(vec![
            Statement::let_move("r", Expr::create("R", vec![Expr::int(1)])),
            borrow_r(),
            Statement::expr(Expr::destroy(Expr::ident("r"))),
            Statement::ret(Expr::call(Expr::ident("read"), vec![Expr::ident("view")])),
        ]),
    );
    let error = run(&program, "main", vec![]).unwrap_err();
    assert!(matches!(error.cause, RuntimeError::InvalidatedResourceReference));
}

#[test]
fn reference_reads_the_live_referent() {
    let program = with_resource(program()).declare(
        FunctionDecl::new("main").returns(TypeExpr::named("Int")).body(vec![
            Statement::let_move("r", Expr::create("R", vec![Expr::int(7)])),
            borrow_r(),
            Statement::let_("id", Expr::call(Expr::ident("read"), vec![Expr::ident("view")])),
            Statement::expr(Expr::destroy(Expr::ident("r"))),
            Statement::ret(Expr::ident("id")),
        ]),
    );
    assert_eq!(run(&program, "main", vec![]).unwrap().to_string(), "7");
}

#[test]
fn storage_reference_follows_the_slot() {
    let program = with_resource(program());
    let elaboration = check(&program);
    let config = Config::default();
    let mut storage = InMemoryStorage::new();
    let mut gauge = Unmetered;
    let mut interpreter = Interpreter::new(&program, &elaboration, &config, &mut storage, &mut gauge).unwrap();

    let address = Address::from_u64(1);
    let path = PathValue::storage("r");
    let first = interpreter.invoke("make", vec![Value::int(1)]).unwrap();
    let borrowed_type = first.dynamic_type();
    interpreter.save(address, &path, first).unwrap();
    let reference = interpreter.borrow(address, &path, Authorization::Unauthorized, borrowed_type);
    let read = |interpreter: &mut Interpreter<'_>| interpreter.invoke("read", vec![reference.clone()]);
    assert_eq!(read(&mut interpreter).unwrap().to_string(), "1");

    let replaced = interpreter.load(address, &path).unwrap();
    assert!(replaced.is_some());
    let second = interpreter.invoke("make", vec![Value::int(2)]).unwrap();
    interpreter.save(address, &path, second).unwrap();
    assert_eq!(read(&mut interpreter).unwrap().to_string(), "2");

    interpreter.load(address, &path).unwrap();
    let error = read(&mut interpreter).unwrap_err();
    assert!(matches!(&error.cause, RuntimeError::Dereference { cause: None, .. }));

    interpreter.save(address, &path, Value::int(3)).unwrap();
    let error = read(&mut interpreter).unwrap_err();
    let RuntimeError::Dereference {
        address: at,
        path: slot,
        cause: Some(cause),
    } = &error.cause
    else {
        panic!("expected a changed-type dereference error, got {:?}", error.cause);
    };
    assert_eq!((*at, slot), (address, &path));
    assert!(matches!(
        &**cause,
        RuntimeError::ForceCastTypeMismatch { expected, actual } if expected.id() == "S.test.R" && actual.id() == "Int"
    ));
}

#[test]
fn saving_over_a_stored_resource_is_refused() {
    let program = with_resource(program());
    let elaboration = check(&program);
    let config = Config::default();
    let mut storage = InMemoryStorage::new();
    let mut gauge = Unmetered;
    let mut interpreter = Interpreter::new(&program, &elaboration, &config, &mut storage, &mut gauge).unwrap();

    let address = Address::from_u64(1);
    let path = PathValue::storage("r");
    let first = interpreter.invoke("make", vec![Value::int(1)]).unwrap();
    interpreter.save(address, &path, first).unwrap();
    let second = interpreter.invoke("make", vec![Value::int(2)]).unwrap();
    let error = interpreter.save(address, &path, second).unwrap_err();
    assert!(matches!(error, RuntimeError::ResourceLoss { .. }));

    let path = PathValue::storage("count");
    interpreter.save(address, &path, Value::int(1)).unwrap();
    interpreter.save(address, &path, Value::int(2)).unwrap();
    assert_eq!(interpreter.load(address, &path).unwrap().unwrap().to_string(), "2");
}

#[test]
fn stored_composites_keep_fields_and_type_across_commits() {
    let program = with_resource(program());
    let elaboration = check(&program);
    let config = Config::default();
    let address = Address::from_u64(1);
    let path = PathValue::storage("r");

    let mut storage = InMemoryStorage::new();
    {
        let mut gauge = Unmetered;
        let mut interpreter = Interpreter::new(&program, &elaboration, &config, &mut storage, &mut gauge).unwrap();
        let value = interpreter.invoke("make", vec![Value::int(5)]).unwrap();
        interpreter.save(address, &path, value).unwrap();
    }
    storage.commit().unwrap();

    let mut reopened = InMemoryStorage::with_ledger(storage.into_ledger());
    let mut gauge = Unmetered;
    let mut interpreter = Interpreter::new(&program, &elaboration, &config, &mut reopened, &mut gauge).unwrap();
    let stored = interpreter.load(address, &path).unwrap().unwrap();
    let composite = stored.as_composite().unwrap();
    assert_eq!(composite.ty().id(), "S.test.R");
    let fields: Vec<String> = composite.borrow().fields.keys().cloned().collect();
    assert_eq!(fields, ["id"]);

    interpreter.save(address, &path, stored.clone()).unwrap();
    let reference = interpreter.borrow(address, &path, Authorization::Unauthorized, stored.dynamic_type());
    assert_eq!(interpreter.invoke("read", vec![reference]).unwrap().to_string(), "5");
}

fn with_counter() -> Program {
    program()
        .declare(
            CompositeDecl::resource("Counter")
                .field(FieldDecl::variable("count", TypeExpr::named("Int")))
                .init(FunctionDecl::initializer().param("count", TypeExpr::named("Int")).body(vec![
                    Statement::assign(Expr::member(Expr::ident("self"), "count"), Expr::ident("count")),
                ]))
                .function(FunctionDecl::new("bump").body(vec![Statement::assign(
                    Expr::member(Expr::ident("self"), "count"),
                    Expr::binary(
                        BinaryOp::Add,
                        Expr::member(Expr::ident("self"), "count"),
                        Expr::int(1),
                    ),
                )])),
        )
        .declare(
            FunctionDecl::new("make")
                .param("count", TypeExpr::named("Int"))
                .returns(TypeAnnotation::resource(TypeExpr::named("Counter")))
                .body(vec![Statement::ret(Expr::moved(Expr::create(
                    "Counter",
                    vec![Expr::ident("count")],
                )))]),
        )
        .declare(
            FunctionDecl::new("increment")
                .param("counter", TypeExpr::reference(TypeExpr::named("Counter")))
                .body(vec![Statement::expr(Expr::method(Expr::ident("counter"), "bump", vec![]))]),
        )
        .declare(
            FunctionDecl::new("count")
                .param("counter", TypeExpr::reference(TypeExpr::named("Counter")))
                .returns(TypeExpr::named("Int"))
                .body(vec![Statement::ret(Expr::member(Expr::ident("counter"), "count"))]),
        )
}

#[test]
fn changes_through_a_storage_reference_are_committed() {
    let program = with_counter();
    let elaboration = check(&program);
    let config = Config::default();
    let address = Address::from_u64(1);
    let path = PathValue::storage("counter");

    let mut storage = InMemoryStorage::new();
    let counter_type = {
        let mut gauge = Unmetered;
        let mut interpreter = Interpreter::new(&program, &elaboration, &config, &mut storage, &mut gauge).unwrap();
        let counter = interpreter.invoke("make", vec![Value::int(1)]).unwrap();
        let ty = counter.dynamic_type();
        interpreter.save(address, &path, counter).unwrap();
        ty
    };
    storage.commit().unwrap();

    // Only reads and in-place changes happen here, no writes to the slot.
    let mut reopened = InMemoryStorage::with_ledger(storage.into_ledger());
    {
        let mut gauge = Unmetered;
        let mut interpreter = Interpreter::new(&program, &elaboration, &config, &mut reopened, &mut gauge).unwrap();
        let reference = interpreter.borrow(address, &path, Authorization::Unauthorized, counter_type);
        interpreter.invoke("increment", vec![reference.clone()]).unwrap();
        assert_eq!(interpreter.invoke("count", vec![reference]).unwrap().to_string(), "2");
    }
    let written: Vec<String> = reopened.commit().unwrap().iter().map(ToString::to_string).collect();
    assert_eq!(written, ["0x0000000000000001/storage/counter"]);

    let mut again = InMemoryStorage::with_ledger(reopened.into_ledger());
    let mut gauge = Unmetered;
    let mut interpreter = Interpreter::new(&program, &elaboration, &config, &mut again, &mut gauge).unwrap();
    let stored = interpreter.load(address, &path).unwrap().unwrap();
    assert_eq!(stored.as_composite().unwrap().field("count").unwrap().to_string(), "2");
}

#[test]
fn containers_reached_through_a_reference_stay_references() {
    let program = program().declare(FunctionDecl::new("main").returns(TypeExpr::named("Int")).body(vec![
        Statement::let_(
            "rows",
            Expr::array(vec![
                Expr::array(vec![Expr::int(1), Expr::int(2)]),
                Expr::array(vec![Expr::int(3)]),
            ]),
        ),
        Statement::let_(
            "view",
            Expr::reference(
                Expr::ident("rows"),
                TypeExpr::reference(TypeExpr::array(TypeExpr::array(TypeExpr::named("Int")))),
            ),
        ),
        Statement::var("total", Expr::int(0)),
        Statement::for_in(
            "row",
            Expr::ident("view"),
            vec![Statement::assign(
                Expr::ident("total"),
                Expr::binary(BinaryOp::Add, Expr::ident("total"), Expr::member(Expr::ident("row"), "length")),
            )],
        ),
        Statement::let_("first", Expr::index(Expr::ident("view"), Expr::int(0))),
        Statement::ret(Expr::binary(
            BinaryOp::Add,
            Expr::binary(BinaryOp::Multiply, Expr::ident("total"), Expr::int(10)),
            Expr::member(Expr::ident("first"), "length"),
        )),
    ]));
    assert_eq!(run(&program, "main", vec![]).unwrap().to_string(), "32");
}
