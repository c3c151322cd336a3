//! Built-in functions of arrays, dictionaries and strings.

use crate::{
    runtime::{
        error::{RuntimeError, RuntimeResult},
        interpreter::{array_index, int_value, Interpreter},
        metering::MemoryKind,
        value::{ArrayValue, DictionaryValue, Value},
    },
    sema::ty::Type,
};

fn argument(arguments: &[Value], position: usize) -> RuntimeResult<&Value> {
    arguments.get(position).ok_or(RuntimeError::ArgumentCount {
        expected: position + 1,
        actual: arguments.len(),
    })
}

fn unknown(receiver: &Value, name: &str) -> RuntimeError {
    RuntimeError::MemberAccessType {
        member: name.to_string(),
        actual: receiver.dynamic_type(),
    }
}

impl Interpreter<'_> {
    pub(super) fn call_builtin(&mut self, receiver: &Value, name: &str, arguments: Vec<Value>) -> RuntimeResult<Value> {
        if receiver.is_destroyed() {
            return Err(RuntimeError::DestroyedResource);
        }
        match receiver {
            Value::Array(array) => self.call_array_builtin(array, name, arguments),
            Value::Dictionary(dictionary) => call_dictionary_builtin(dictionary, name, arguments),
            Value::String(text) => match name {
                "concat" => match argument(&arguments, 0)? {
                    Value::String(other) => {
                        self.meter_memory(MemoryKind::String, text.len() + other.len())?;
                        Ok(Value::String(format!("{text}{other}")))
                    }
                    other => Err(RuntimeError::TypeMismatch {
                        expected: Type::STRING,
                        actual: other.dynamic_type(),
                    }),
                },
                _ => Err(unknown(receiver, name)),
            },
            other => Err(unknown(other, name)),
        }
    }

    fn call_array_builtin(&mut self, array: &ArrayValue, name: &str, arguments: Vec<Value>) -> RuntimeResult<Value> {
        match name {
            "append" => {
                let element = argument(&arguments, 0)?.clone();
                self.meter_memory(MemoryKind::Array, 1)?;
                array.borrow_mut().elements.push(element);
                Ok(Value::Void)
            }
            "appendAll" => {
                let Value::Array(other) = argument(&arguments, 0)? else {
                    return Err(array_mismatch(array, &arguments[0]));
                };
                let elements: Vec<Value> = other.elements().iter().map(Value::deep_copy).collect();
                self.meter_memory(MemoryKind::Array, elements.len())?;
                array.borrow_mut().elements.extend(elements);
                Ok(Value::Void)
            }
            "concat" => {
                let Value::Array(other) = argument(&arguments, 0)? else {
                    return Err(array_mismatch(array, &arguments[0]));
                };
                let elements: Vec<Value> = array
                    .elements()
                    .iter()
                    .chain(other.elements().iter())
                    .map(Value::deep_copy)
                    .collect();
                self.meter_memory(MemoryKind::Array, elements.len())?;
                Ok(Value::Array(ArrayValue::new(array.ty(), elements)))
            }
            "insert" => {
                let size = array.len();
                // Inserting at the end is allowed.
                let position = array_index(argument(&arguments, 0)?, size + 1)?;
                let element = argument(&arguments, 1)?.clone();
                self.meter_memory(MemoryKind::Array, 1)?;
                array.borrow_mut().elements.insert(position, element);
                Ok(Value::Void)
            }
            "remove" => {
                let position = array_index(argument(&arguments, 0)?, array.len())?;
                Ok(array.borrow_mut().elements.remove(position))
            }
            "removeFirst" => {
                if array.is_empty() {
                    return Err(RuntimeError::ArrayIndexOutOfBounds {
                        index: "0".to_string(),
                        size: 0,
                    });
                }
                Ok(array.borrow_mut().elements.remove(0))
            }
            "removeLast" => array
                .borrow_mut()
                .elements
                .pop()
                .ok_or_else(|| RuntimeError::ArrayIndexOutOfBounds {
                    index: "-1".to_string(),
                    size: 0,
                }),
            "contains" => {
                let needle = argument(&arguments, 0)?;
                let found = array.borrow().elements.iter().any(|element| element.equals(needle));
                Ok(Value::Bool(found))
            }
            "firstIndex" => {
                let needle = argument(&arguments, 0)?;
                let position = array.borrow().elements.iter().position(|element| element.equals(needle));
                Ok(Value::optional(position.map(int_value)))
            }
            _ => Err(unknown(&Value::Array(array.clone()), name)),
        }
    }
}

fn call_dictionary_builtin(dictionary: &DictionaryValue, name: &str, arguments: Vec<Value>) -> RuntimeResult<Value> {
    let key = argument(&arguments, 0)?;
    let hash = key
        .dictionary_key()
        .ok_or_else(|| RuntimeError::unreachable(format!("`{}` is not hashable", key.dynamic_type())))?;
    match name {
        "containsKey" => Ok(Value::Bool(dictionary.get(&hash).is_some())),
        "insert" => {
            let value = argument(&arguments, 1)?.clone();
            let previous = dictionary
                .borrow_mut()
                .entries
                .insert(hash, (key.clone(), value))
                .map(|(_, previous)| previous);
            Ok(Value::optional(previous))
        }
        "remove" => {
            let removed = dictionary
                .borrow_mut()
                .entries
                .shift_remove(&hash)
                .map(|(_, removed)| removed);
            Ok(Value::optional(removed))
        }
        _ => Err(unknown(&Value::Dictionary(dictionary.clone()), name)),
    }
}

fn array_mismatch(array: &ArrayValue, actual: &Value) -> RuntimeError {
    RuntimeError::TypeMismatch {
        expected: array.ty(),
        actual: actual.dynamic_type(),
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        language::{
            ast::{Expr, FunctionDecl, Program, Statement},
            location::Location,
            types::TypeExpr,
        },
        runtime::{
            config::Config,
            interpreter::Interpreter,
            metering::Unmetered,
            storage::InMemoryStorage,
            value::Value,
        },
    };

    fn run(statements: Vec<Statement>, returns: TypeExpr) -> String {
        let program = Program::new(Location::script("test"))
            .declare(FunctionDecl::new("main").returns(returns).body(statements));
        let elaboration = crate::language::typecheck::check_program(&program).unwrap();
        let config = Config::default();
        let mut storage = InMemoryStorage::new();
        let mut gauge = Unmetered;
        let mut interpreter = Interpreter::new(&program, &elaboration, &config, &mut storage, &mut gauge).unwrap();
        interpreter.invoke("main", Vec::new()).unwrap().to_string()
    }

    #[test]
    fn arrays_grow_and_shrink() {
        let result = run(
            vec![
                Statement::var("numbers", Expr::array(vec![Expr::int(1), Expr::int(2)])),
                Statement::expr(Expr::call(Expr::member(Expr::ident("numbers"), "append"), vec![Expr::int(3)])),
                Statement::expr(Expr::call(
                    Expr::member(Expr::ident("numbers"), "insert"),
                    vec![Expr::int(0), Expr::int(0)],
                )),
                Statement::expr(Expr::call(Expr::member(Expr::ident("numbers"), "removeLast"), vec![])),
                Statement::ret(Expr::ident("numbers")),
            ],
            TypeExpr::array(TypeExpr::named("Int")),
        );
        assert_eq!(result, "[0, 1, 2]");
    }

    #[test]
    fn dictionary_insert_returns_the_previous_value() {
        let result = run(
            vec![
                Statement::var(
                    "scores",
                    Expr::dictionary(vec![(Expr::string("a"), Expr::int(1))]),
                ),
                Statement::ret(Expr::call(
                    Expr::member(Expr::ident("scores"), "insert"),
                    vec![Expr::string("a"), Expr::int(2)],
                )),
            ],
            TypeExpr::optional(TypeExpr::named("Int")),
        );
        assert_eq!(result, "1");
    }
}
