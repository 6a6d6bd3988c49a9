//! The stack virtual machine: fetch/decode/execute loop over a frame
//! stack, a fixed-capacity operand stack, and a fixed-capacity globals
//! array.

use std::rc::Rc;

use crate::chunk::Bytecode;
use crate::error::{VmError, VmResult};
use crate::frame::Frame;
use crate::opcode::{read_u16, Op};
use crate::value::{CompiledFunction, HashMapT, Value};

/// Operand stack depth never exceeds this.
pub const STACK_SIZE: usize = 2048;
/// Frame stack depth never exceeds this.
pub const MAX_FRAMES: usize = 1024;
/// Capacity of the fixed-size globals array.
pub const GLOBALS_SIZE: usize = 65_536;

pub struct Vm {
    constants: Vec<Value>,
    stack: Vec<Value>,
    sp: usize,
    globals: Vec<Value>,
    frames: Vec<Frame>,
}

impl Vm {
    /// Builds a fresh globals array and runs with it.
    pub fn new(bytecode: Bytecode) -> Self {
        Self::new_with_globals(bytecode, vec![Value::Null; GLOBALS_SIZE])
    }

    /// Injects an externally owned globals array so state survives
    /// across REPL invocations.
    pub fn new_with_globals(bytecode: Bytecode, globals: Vec<Value>) -> Self {
        let main_fn = Rc::new(CompiledFunction { instructions: bytecode.instructions });
        Vm {
            constants: bytecode.constants,
            stack: vec![Value::Null; STACK_SIZE],
            sp: 0,
            globals,
            frames: vec![Frame::new(main_fn)],
        }
    }

    /// Hands the globals array back to the caller, for the next REPL
    /// round to inject into a fresh VM.
    pub fn into_globals(self) -> Vec<Value> {
        self.globals
    }

    /// The cell the most recent Pop just vacated — the REPL's
    /// observation window onto the program's final expression value.
    /// Valid only between `run` completions, never during execution.
    pub fn last_popped_stack_elem(&self) -> &Value {
        &self.stack[self.sp]
    }

    fn current_frame(&self) -> &Frame {
        self.frames.last().expect("frame stack is never empty during run")
    }

    fn current_frame_mut(&mut self) -> &mut Frame {
        self.frames.last_mut().expect("frame stack is never empty during run")
    }

    pub fn run(&mut self) -> VmResult<()> {
        while (self.current_frame().ip as isize) < self.current_frame().instructions().len() as isize - 1 {
            self.current_frame_mut().ip += 1;
            let ip = self.current_frame().ip as usize;
            let function = Rc::clone(&self.current_frame().function);
            let instructions = &function.instructions;
            let op_byte = instructions[ip];
            let op = Op::from_u8(op_byte).ok_or(VmError::UnknownOpcode(op_byte))?;

            match op {
                Op::Constant => {
                    let idx = read_u16(&instructions[ip + 1..]) as usize;
                    self.current_frame_mut().ip += 2;
                    self.push(self.constants[idx].clone())?;
                }
                Op::Pop => {
                    self.pop();
                }
                Op::Add | Op::Sub | Op::Mul | Op::Div => self.execute_binary_op(op)?,
                Op::True => self.push(Value::Boolean(true))?,
                Op::False => self.push(Value::Boolean(false))?,
                Op::Null => self.push(Value::Null)?,
                Op::Equal | Op::NotEqual | Op::GreaterThan => self.execute_comparison(op)?,
                Op::Minus => self.execute_minus()?,
                Op::Bang => self.execute_bang()?,
                Op::JumpNotTruthy => {
                    let target = read_u16(&instructions[ip + 1..]) as usize;
                    self.current_frame_mut().ip += 2;
                    let condition = self.pop();
                    if !condition.is_truthy() {
                        self.current_frame_mut().ip = target as isize - 1;
                    }
                }
                Op::Jump => {
                    let target = read_u16(&instructions[ip + 1..]) as usize;
                    self.current_frame_mut().ip = target as isize - 1;
                }
                Op::SetGlobal => {
                    let idx = read_u16(&instructions[ip + 1..]) as usize;
                    self.current_frame_mut().ip += 2;
                    let value = self.pop();
                    self.globals[idx] = value;
                }
                Op::GetGlobal => {
                    let idx = read_u16(&instructions[ip + 1..]) as usize;
                    self.current_frame_mut().ip += 2;
                    self.push(self.globals[idx].clone())?;
                }
                Op::Array => {
                    let n = read_u16(&instructions[ip + 1..]) as usize;
                    self.current_frame_mut().ip += 2;
                    let elements = self.stack[self.sp - n..self.sp].to_vec();
                    self.sp -= n;
                    self.push(Value::Array(Rc::new(elements)))?;
                }
                Op::Hash => {
                    let n = read_u16(&instructions[ip + 1..]) as usize;
                    self.current_frame_mut().ip += 2;
                    let start = self.sp - n;
                    let mut map = HashMapT::default();
                    let mut i = start;
                    while i < self.sp {
                        let key = self.stack[i].clone();
                        let value = self.stack[i + 1].clone();
                        let hash_key = key.hash_key().map_err(VmError::UnhashableKey)?;
                        map.insert(hash_key, (key, value));
                        i += 2;
                    }
                    self.sp = start;
                    self.push(Value::Hash(Rc::new(map)))?;
                }
                Op::Index => {
                    let index = self.pop();
                    let container = self.pop();
                    self.execute_index(container, index)?;
                }
                Op::Call => {
                    let callee = self.peek(0)?.clone();
                    match callee {
                        Value::CompiledFunction(f) => {
                            if self.frames.len() >= MAX_FRAMES {
                                return Err(VmError::StackOverflow);
                            }
                            self.frames.push(Frame::new(f));
                        }
                        _ => return Err(VmError::NonCallable),
                    }
                }
                Op::ReturnValue => {
                    let return_value = self.pop();
                    self.frames.pop();
                    self.pop(); // discard the function value sitting beneath Call
                    self.push(return_value)?;
                }
                Op::Return => {
                    self.frames.pop();
                    self.pop();
                    self.push(Value::Null)?;
                }
            }
        }
        Ok(())
    }

    // ── Stack helpers ───────────────────────────────────────────────────

    fn push(&mut self, value: Value) -> VmResult<()> {
        if self.sp >= STACK_SIZE {
            return Err(VmError::StackOverflow);
        }
        self.stack[self.sp] = value;
        self.sp += 1;
        Ok(())
    }

    /// Decrements `sp` and returns a clone of the vacated cell, leaving
    /// the original value in place so `last_popped_stack_elem` can still
    /// read it.
    fn pop(&mut self) -> Value {
        self.sp -= 1;
        self.stack[self.sp].clone()
    }

    fn peek(&self, distance: usize) -> VmResult<&Value> {
        let idx = self.sp.checked_sub(1 + distance).ok_or(VmError::StackOverflow)?;
        Ok(&self.stack[idx])
    }

    // ── Dispatch helpers ────────────────────────────────────────────────

    fn execute_binary_op(&mut self, op: Op) -> VmResult<()> {
        let right = self.pop();
        let left = self.pop();
        match (&left, &right) {
            (Value::Integer(l), Value::Integer(r)) => {
                let result = match op {
                    Op::Add => l + r,
                    Op::Sub => l - r,
                    Op::Mul => l * r,
                    Op::Div => l / r,
                    _ => unreachable!("execute_binary_op called with non-arithmetic opcode"),
                };
                self.push(Value::Integer(result))
            }
            (Value::String(l), Value::String(r)) => {
                if op == Op::Add {
                    self.push(Value::str(format!("{}{}", l, r)))
                } else {
                    Err(VmError::UnknownStringOperator)
                }
            }
            _ if left.type_tag() != right.type_tag() => Err(VmError::TypeMismatch {
                left: left.type_tag().to_string(),
                right: right.type_tag().to_string(),
            }),
            _ => Err(VmError::UnsupportedBinaryOperation),
        }
    }

    fn execute_comparison(&mut self, op: Op) -> VmResult<()> {
        let right = self.pop();
        let left = self.pop();
        match op {
            Op::Equal => self.push(Value::Boolean(values_equal(&left, &right))),
            Op::NotEqual => self.push(Value::Boolean(!values_equal(&left, &right))),
            Op::GreaterThan => match (&left, &right) {
                (Value::Integer(l), Value::Integer(r)) => self.push(Value::Boolean(l > r)),
                _ => Err(VmError::UnknownOperator(">".to_string())),
            },
            _ => unreachable!("execute_comparison called with non-comparison opcode"),
        }
    }

    fn execute_minus(&mut self) -> VmResult<()> {
        let operand = self.pop();
        match operand {
            Value::Integer(i) => self.push(Value::Integer(-i)),
            other => Err(VmError::UnsupportedType { op: "negation", ty: other.type_tag().to_string() }),
        }
    }

    fn execute_bang(&mut self) -> VmResult<()> {
        let operand = self.pop();
        self.push(Value::Boolean(!operand.is_truthy()))
    }

    fn execute_index(&mut self, container: Value, index: Value) -> VmResult<()> {
        match (&container, &index) {
            (Value::Array(elements), Value::Integer(i)) => {
                if *i < 0 || *i as usize >= elements.len() {
                    self.push(Value::Null)
                } else {
                    self.push(elements[*i as usize].clone())
                }
            }
            (Value::Hash(map), key) => {
                let hash_key = key.hash_key().map_err(VmError::UnhashableKey)?;
                match map.get(&hash_key) {
                    Some((_, value)) => self.push(value.clone()),
                    None => self.push(Value::Null),
                }
            }
            _ => Err(VmError::UnsupportedIndex(container.type_tag().to_string())),
        }
    }
}

/// Equal/NotEqual compare Integer by value; every other pair compares by
/// identity. Boolean and Null have no pointer to compare (they aren't
/// heap-allocated here), so tag equality stands in for it — every
/// `Boolean(true)` is indistinguishable from any other, exactly as if
/// they were the same reused sentinel. String/Array/Hash/CompiledFunction
/// are Rc-backed, so their identity comparison is a real pointer
/// comparison: two distinct strings built with the same contents are
/// *not* equal under this opcode, matching the source's well-known quirk.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => x == y,
        (Value::Boolean(x), Value::Boolean(y)) => x == y,
        (Value::Null, Value::Null) => true,
        (Value::String(x), Value::String(y)) => Rc::ptr_eq(x, y),
        (Value::Array(x), Value::Array(y)) => Rc::ptr_eq(x, y),
        (Value::Hash(x), Value::Hash(y)) => Rc::ptr_eq(x, y),
        (Value::CompiledFunction(x), Value::CompiledFunction(y)) => Rc::ptr_eq(x, y),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::Compiler;

    fn run(src: &str) -> Value {
        let (program, lex_errors, parse_errors) = vellum_parser::parse(src);
        assert!(lex_errors.is_empty(), "lex errors: {:?}", lex_errors);
        assert!(parse_errors.is_empty(), "parse errors: {:?}", parse_errors);
        let mut compiler = Compiler::new();
        compiler.compile(&program).expect("compile failed");
        let mut vm = Vm::new(compiler.bytecode());
        vm.run().expect("run failed");
        vm.last_popped_stack_elem().clone()
    }

    fn run_err(src: &str) -> VmError {
        let (program, lex_errors, parse_errors) = vellum_parser::parse(src);
        assert!(lex_errors.is_empty());
        assert!(parse_errors.is_empty());
        let mut compiler = Compiler::new();
        compiler.compile(&program).expect("compile failed");
        let mut vm = Vm::new(compiler.bytecode());
        vm.run().expect_err("expected a runtime error")
    }

    #[test]
    fn integer_addition() {
        assert!(matches!(run("1 + 2"), Value::Integer(3)));
    }

    #[test]
    fn arithmetic_all_four_operators() {
        assert!(matches!(run("2 - 1"), Value::Integer(1)));
        assert!(matches!(run("4 * 5"), Value::Integer(20)));
        assert!(matches!(run("10 / 2"), Value::Integer(5)));
    }

    #[test]
    fn string_concatenation() {
        match run(r#""foo" + "bar""#) {
            Value::String(s) => assert_eq!(s.as_str(), "foobar"),
            other => panic!("expected String, got {:?}", other),
        }
    }

    #[test]
    fn string_subtraction_is_unknown_operator() {
        assert_eq!(run_err(r#""a" - "b""#).to_string(), "unknown string operator");
    }

    #[test]
    fn mismatched_types_report_both_type_tags() {
        assert_eq!(run_err("1 + true").to_string(), "leftType:INTEGER and rightType:BOOLEAN not equal");
    }

    #[test]
    fn same_unsupported_type_on_both_sides() {
        assert_eq!(run_err("true + false").to_string(), "unsupported types for binary operation");
    }

    #[test]
    fn let_bindings_and_global_lookup() {
        assert!(matches!(run("let one = 1; let two = 2; one + two"), Value::Integer(3)));
    }

    #[test]
    fn if_else_takes_consequence_branch() {
        assert!(matches!(run("if (true) { 10 } else { 20 }"), Value::Integer(10)));
    }

    #[test]
    fn if_else_takes_alternative_branch() {
        assert!(matches!(run("if (false) { 10 } else { 20 }"), Value::Integer(20)));
    }

    #[test]
    fn if_without_alternative_and_falsy_condition_yields_null() {
        assert!(matches!(run("if (false) { 10 }"), Value::Null));
    }

    #[test]
    fn array_indexing() {
        assert!(matches!(run("[1, 2, 3][1]"), Value::Integer(2)));
    }

    #[test]
    fn array_index_out_of_range_is_null_not_an_error() {
        assert!(matches!(run("[1, 2, 3][99]"), Value::Null));
        assert!(matches!(run("[1, 2, 3][-1]"), Value::Null));
    }

    #[test]
    fn hash_indexing() {
        assert!(matches!(run("{1: 2, 3: 4}[3]"), Value::Integer(4)));
    }

    #[test]
    fn hash_missing_key_is_null_not_an_error() {
        assert!(matches!(run("{1: 2}[99]"), Value::Null));
    }

    #[test]
    fn hash_with_unhashable_key_is_a_runtime_error() {
        assert_eq!(
            run_err("{1: 2}[[1,2]]").to_string(),
            "unusable as hash key: ARRAY"
        );
    }

    #[test]
    fn indexing_an_integer_is_unsupported() {
        assert_eq!(run_err("5[0]").to_string(), "index operator not supported: INTEGER");
    }

    #[test]
    fn calling_a_zero_argument_function() {
        assert!(matches!(run("let add = fn() { 5 + 5 }; add()"), Value::Integer(10)));
    }

    #[test]
    fn calling_a_non_function_is_an_error() {
        assert_eq!(run_err("let x = 5; x()").to_string(), "calling non-function");
    }

    #[test]
    fn negation() {
        assert!(matches!(run("-5"), Value::Integer(-5)));
    }

    #[test]
    fn negating_a_non_integer_is_an_error() {
        assert_eq!(run_err("-true").to_string(), "unsupported type for negation: BOOLEAN");
    }

    #[test]
    fn bang_truth_table() {
        assert!(matches!(run("!true"), Value::Boolean(false)));
        assert!(matches!(run("!false"), Value::Boolean(true)));
        assert!(matches!(run("!5"), Value::Boolean(false)));
        assert!(matches!(run("!!5"), Value::Boolean(true)));
    }

    #[test]
    fn bang_of_absent_alternative_null_is_true() {
        assert!(matches!(run("!(if (false) { 5 })"), Value::Boolean(true)));
    }

    #[test]
    fn integer_equality_compares_by_value() {
        assert!(matches!(run("1 == 1"), Value::Boolean(true)));
        assert!(matches!(run("1 == 2"), Value::Boolean(false)));
        assert!(matches!(run("1 != 2"), Value::Boolean(true)));
    }

    #[test]
    fn boolean_equality() {
        assert!(matches!(run("true == true"), Value::Boolean(true)));
        assert!(matches!(run("true == false"), Value::Boolean(false)));
    }

    #[test]
    fn two_distinct_equal_strings_are_not_equal_by_identity() {
        // Matches the classic bytecode-VM quirk: strings compare by
        // pointer identity under ==, not by contents, since there is no
        // dedicated string-equality opcode.
        assert!(matches!(run(r#""mono" + "" == "mono" + """#), Value::Boolean(false)));
    }

    #[test]
    fn greater_than_on_non_integers_is_unknown_operator() {
        assert_eq!(run_err("true > false").to_string(), "unknown operator: >");
    }

    #[test]
    fn deep_recursion_overflows_the_frame_stack() {
        let src = "let countdown = fn() { countdown() }; countdown()";
        assert!(matches!(run_err(src), VmError::StackOverflow));
    }

    #[test]
    fn last_popped_stack_elem_survives_after_run_completes() {
        let (program, _, _) = vellum_parser::parse("1; 2; 3;");
        let mut compiler = Compiler::new();
        compiler.compile(&program).unwrap();
        let mut vm = Vm::new(compiler.bytecode());
        vm.run().unwrap();
        assert!(matches!(vm.last_popped_stack_elem(), Value::Integer(3)));
    }

    #[test]
    fn globals_survive_across_repl_style_rounds() {
        let (program1, _, _) = vellum_parser::parse("let counter = 1;");
        let mut compiler1 = Compiler::new();
        compiler1.compile(&program1).unwrap();
        let bytecode1 = compiler1.bytecode();
        let (symbol_table, constants) = compiler1.into_state();

        let mut vm1 = Vm::new(bytecode1);
        vm1.run().unwrap();
        let globals = vm1.into_globals();

        let (program2, _, _) = vellum_parser::parse("counter + 41;");
        let mut compiler2 = Compiler::new_with_state(symbol_table, constants);
        compiler2.compile(&program2).unwrap();
        let mut vm2 = Vm::new_with_globals(compiler2.bytecode(), globals);
        vm2.run().unwrap();
        assert!(matches!(vm2.last_popped_stack_elem(), Value::Integer(42)));
    }
}
