//! Bytecode compiler and stack virtual machine: the core of the
//! interpreter toolchain. Consumes a parsed AST, compiles it to a
//! `Bytecode` bundle `{instructions, constants}`, and runs that bundle
//! to completion on a `Vm`, exposing the value of the program's final
//! expression statement.

pub mod chunk;
pub mod compiler;
pub mod error;
pub mod frame;
pub mod opcode;
pub mod symbol_table;
pub mod value;
pub mod vm;

pub use chunk::Bytecode;
pub use compiler::Compiler;
pub use error::{VmError, VmResult};
pub use symbol_table::SymbolTable;
pub use value::Value;
pub use vm::Vm;

/// Compiles and runs `source` in one shot: parse, compile, execute.
/// Used by tests and non-interactive callers; the REPL instead keeps a
/// `Compiler`/`Vm` pair alive across rounds to share globals, constants,
/// and the symbol table.
pub fn run(source: &str) -> VmResult<Value> {
    let (program, lex_errors, parse_errors) = vellum_parser::parse(source);
    if let Some(e) = lex_errors.into_iter().next() {
        return Err(VmError::UnknownOperator(e.to_string()));
    }
    if let Some(e) = parse_errors.into_iter().next() {
        return Err(VmError::UnknownOperator(e.to_string()));
    }
    let mut compiler = Compiler::new();
    compiler.compile(&program)?;
    let mut vm = Vm::new(compiler.bytecode());
    vm.run()?;
    Ok(vm.last_popped_stack_elem().clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(src: &str) -> Value {
        match run(src) {
            Ok(v) => v,
            Err(e) => panic!("VmError: {}", e),
        }
    }

    fn r_err(src: &str) -> VmError {
        match run(src) {
            Err(e) => e,
            Ok(v) => panic!("expected an error, got {:?}", v),
        }
    }

    // Scenarios from §8: end-to-end input → `LastPoppedStackElem`.

    #[test]
    fn scenario_one_plus_two() {
        assert!(matches!(r("1 + 2"), Value::Integer(3)));
    }

    #[test]
    fn scenario_let_bindings_sum_to_three() {
        assert!(matches!(r("let one = 1; let two = 2; one + two"), Value::Integer(3)));
    }

    #[test]
    fn scenario_if_else_takes_consequence() {
        assert!(matches!(r("if (true) { 10 } else { 20 }"), Value::Integer(10)));
    }

    #[test]
    fn scenario_array_literal_indexing() {
        assert!(matches!(r("[1, 2, 3][1]"), Value::Integer(2)));
    }

    #[test]
    fn scenario_hash_literal_indexing() {
        assert!(matches!(r("{1: 2, 3: 4}[3]"), Value::Integer(4)));
        assert!(matches!(r("{1:2}[99]"), Value::Null));
    }

    #[test]
    fn scenario_zero_argument_function_call() {
        assert!(matches!(r("let add = fn() { 5 + 5 }; add()"), Value::Integer(10)));
    }

    #[test]
    fn scenario_prefix_operators() {
        assert!(matches!(r("-5"), Value::Integer(-5)));
        assert!(matches!(r("!true"), Value::Boolean(false)));
        assert!(matches!(r("!!5"), Value::Boolean(true)));
        assert!(matches!(r("!(if (false) { 5 })"), Value::Boolean(true)));
    }

    #[test]
    fn runtime_errors_propagate_through_run() {
        assert_eq!(r_err("1 + true").to_string(), "leftType:INTEGER and rightType:BOOLEAN not equal");
    }
}
