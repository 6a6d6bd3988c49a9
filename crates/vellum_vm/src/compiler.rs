//! AST walk → instruction stream + constant pool + lexical scopes.
//!
//! The compiler holds a stack of `CompilationScope`s (one per function
//! literal currently being compiled, plus the outermost "main" scope) and
//! a `SymbolTable` that grows/shrinks in lockstep as scopes are entered
//! and left. Peephole helpers (`emit`, `last_instruction_is`,
//! `remove_last_pop`, `replace_instruction`, `change_operand`) let
//! jump-patching and the if-expression Pop rewrite happen without
//! rescanning the instruction stream.

use std::rc::Rc;

use vellum_parser::ast::{BlockStatement, Expr, ExprKind, Program, Stmt, StmtKind};

use crate::chunk::Bytecode;
use crate::error::{VmError, VmResult};
use crate::opcode::{make, Op};
use crate::symbol_table::SymbolTable;
use crate::value::{CompiledFunction, Value};

#[derive(Debug, Clone, Copy)]
struct EmittedInstruction {
    opcode: Op,
    position: usize,
}

/// Per-function compilation context: the instructions emitted so far in
/// this scope, plus the last two emitted instructions for peephole
/// rewrites. Entering a function literal pushes a new scope; leaving it
/// pops the scope and hands its instructions to the caller.
#[derive(Default)]
struct CompilationScope {
    instructions: Vec<u8>,
    last_instruction: Option<EmittedInstruction>,
    previous_instruction: Option<EmittedInstruction>,
}

pub struct Compiler {
    constants: Vec<Value>,
    symbol_table: SymbolTable,
    scopes: Vec<CompilationScope>,
    scope_index: usize,
}

impl Compiler {
    /// Fresh compiler with one (main) compilation scope and a fresh
    /// global symbol table.
    pub fn new() -> Self {
        Self::new_with_state(SymbolTable::new(), Vec::new())
    }

    /// Carries REPL state forward so successive inputs share globals and
    /// the constant pool.
    pub fn new_with_state(symbol_table: SymbolTable, constants: Vec<Value>) -> Self {
        Compiler {
            constants,
            symbol_table,
            scopes: vec![CompilationScope::default()],
            scope_index: 0,
        }
    }

    /// Hands the symbol table and constant pool back to the caller so a
    /// REPL can thread them into the next round's compiler.
    pub fn into_state(self) -> (SymbolTable, Vec<Value>) {
        (self.symbol_table, self.constants)
    }

    pub fn bytecode(&self) -> Bytecode {
        Bytecode {
            instructions: self.current_instructions().clone(),
            constants: self.constants.clone(),
        }
    }

    pub fn compile(&mut self, program: &Program) -> VmResult<()> {
        for stmt in &program.stmts {
            self.compile_stmt(stmt)?;
        }
        Ok(())
    }

    // ── Statements ──────────────────────────────────────────────────────

    fn compile_stmt(&mut self, stmt: &Stmt) -> VmResult<()> {
        match &stmt.inner {
            StmtKind::Expr(expr) => {
                self.compile_expr(expr)?;
                self.emit(Op::Pop, &[]);
            }
            StmtKind::Let { name, value } => {
                self.compile_expr(value)?;
                let symbol = self.symbol_table.define(name);
                // Local storage is not wired up in this core (§9): every
                // binding, global or local, lands in a global slot.
                self.emit(Op::SetGlobal, &[symbol.index]);
            }
            StmtKind::Return(expr) => {
                self.compile_expr(expr)?;
                self.emit(Op::ReturnValue, &[]);
            }
        }
        Ok(())
    }

    fn compile_block(&mut self, block: &BlockStatement) -> VmResult<()> {
        for stmt in &block.stmts {
            self.compile_stmt(stmt)?;
        }
        Ok(())
    }

    // ── Expressions ─────────────────────────────────────────────────────

    fn compile_expr(&mut self, expr: &Expr) -> VmResult<()> {
        match &expr.inner {
            ExprKind::Int(i) => {
                let idx = self.add_constant(Value::Integer(*i));
                self.emit(Op::Constant, &[idx]);
            }
            ExprKind::Str(s) => {
                let idx = self.add_constant(Value::str(s.clone()));
                self.emit(Op::Constant, &[idx]);
            }
            ExprKind::Bool(b) => {
                self.emit(if *b { Op::True } else { Op::False }, &[]);
            }
            ExprKind::Ident(name) => match self.symbol_table.resolve(name) {
                Some(symbol) => {
                    self.emit(Op::GetGlobal, &[symbol.index]);
                }
                None => return Err(VmError::UndefinedName(name.clone())),
            },
            ExprKind::Prefix { operator, operand } => {
                self.compile_expr(operand)?;
                match operator.as_str() {
                    "-" => self.emit(Op::Minus, &[]),
                    "!" => self.emit(Op::Bang, &[]),
                    other => return Err(VmError::UnknownOperator(other.to_string())),
                };
            }
            ExprKind::Infix { operator, left, right } => {
                if operator == "<" {
                    // No dedicated less-than opcode: swap operand order
                    // and reuse GreaterThan.
                    self.compile_expr(right)?;
                    self.compile_expr(left)?;
                    self.emit(Op::GreaterThan, &[]);
                } else {
                    self.compile_expr(left)?;
                    self.compile_expr(right)?;
                    let op = match operator.as_str() {
                        "+" => Op::Add,
                        "-" => Op::Sub,
                        "*" => Op::Mul,
                        "/" => Op::Div,
                        ">" => Op::GreaterThan,
                        "==" => Op::Equal,
                        "!=" => Op::NotEqual,
                        other => return Err(VmError::UnknownOperator(other.to_string())),
                    };
                    self.emit(op, &[]);
                }
            }
            ExprKind::If { condition, consequence, alternative } => {
                self.compile_expr(condition)?;
                let jump_not_truthy_pos = self.emit(Op::JumpNotTruthy, &[9999]);

                self.compile_block(consequence)?;
                if self.last_instruction_is(Op::Pop) {
                    self.remove_last_pop();
                }

                let jump_pos = self.emit(Op::Jump, &[9999]);
                let after_consequence = self.current_instructions().len();
                self.change_operand(jump_not_truthy_pos, after_consequence);

                match alternative {
                    None => {
                        self.emit(Op::Null, &[]);
                    }
                    Some(block) => {
                        self.compile_block(block)?;
                        if self.last_instruction_is(Op::Pop) {
                            self.remove_last_pop();
                        }
                    }
                }

                let after_alternative = self.current_instructions().len();
                self.change_operand(jump_pos, after_alternative);
            }
            ExprKind::FunctionLiteral { body, .. } => {
                self.enter_scope();

                self.compile_block(body)?;
                if self.last_instruction_is(Op::Pop) {
                    self.replace_last_pop_with_return();
                }
                if !self.last_instruction_is(Op::ReturnValue) {
                    self.emit(Op::Return, &[]);
                }

                let instructions = self.leave_scope();
                let compiled = Value::CompiledFunction(Rc::new(CompiledFunction { instructions }));
                let idx = self.add_constant(compiled);
                self.emit(Op::Constant, &[idx]);
            }
            ExprKind::Call { function, arguments } => {
                if !arguments.is_empty() {
                    return Err(VmError::UnknownOperator(
                        "calling function with arguments is not supported".to_string(),
                    ));
                }
                self.compile_expr(function)?;
                self.emit(Op::Call, &[]);
            }
            ExprKind::Array(elements) => {
                for element in elements {
                    self.compile_expr(element)?;
                }
                self.emit(Op::Array, &[elements.len()]);
            }
            ExprKind::Hash(pairs) => {
                // Sort by the key expression's stringified form so that
                // bytecode emitted for a hash literal is deterministic.
                let mut sorted: Vec<&(Expr, Expr)> = pairs.iter().collect();
                sorted.sort_by_key(|(key, _)| format!("{:?}", key.inner));
                for (key, value) in sorted {
                    self.compile_expr(key)?;
                    self.compile_expr(value)?;
                }
                self.emit(Op::Hash, &[pairs.len() * 2]);
            }
            ExprKind::Index { object, index } => {
                self.compile_expr(object)?;
                self.compile_expr(index)?;
                self.emit(Op::Index, &[]);
            }
            ExprKind::Error => unreachable!("compiler invoked on a parse-error AST node"),
        }
        Ok(())
    }

    // ── Constant pool ───────────────────────────────────────────────────

    fn add_constant(&mut self, value: Value) -> usize {
        self.constants.push(value);
        self.constants.len() - 1
    }

    // ── Scopes ──────────────────────────────────────────────────────────

    fn enter_scope(&mut self) {
        self.scopes.push(CompilationScope::default());
        self.scope_index += 1;
        let outer = std::mem::take(&mut self.symbol_table);
        self.symbol_table = outer.enclose();
    }

    fn leave_scope(&mut self) -> Vec<u8> {
        let scope = self.scopes.pop().expect("compiler scope stack underflow");
        self.scope_index -= 1;
        let inner = std::mem::take(&mut self.symbol_table);
        self.symbol_table = inner.leave();
        scope.instructions
    }

    fn current_instructions(&self) -> &Vec<u8> {
        &self.scopes[self.scope_index].instructions
    }

    fn current_instructions_mut(&mut self) -> &mut Vec<u8> {
        &mut self.scopes[self.scope_index].instructions
    }

    // ── Emission / peephole helpers ─────────────────────────────────────

    fn emit(&mut self, op: Op, operands: &[usize]) -> usize {
        let instruction = make(op, operands);
        let position = self.add_instruction(instruction);
        self.set_last_instruction(op, position);
        position
    }

    fn add_instruction(&mut self, instruction: Vec<u8>) -> usize {
        let position = self.current_instructions().len();
        self.current_instructions_mut().extend(instruction);
        position
    }

    fn set_last_instruction(&mut self, opcode: Op, position: usize) {
        let scope = &mut self.scopes[self.scope_index];
        scope.previous_instruction = scope.last_instruction.take();
        scope.last_instruction = Some(EmittedInstruction { opcode, position });
    }

    fn last_instruction_is(&self, op: Op) -> bool {
        match self.scopes[self.scope_index].last_instruction {
            Some(emitted) => emitted.opcode == op,
            None => false,
        }
    }

    fn remove_last_pop(&mut self) {
        let scope = &self.scopes[self.scope_index];
        let last = scope.last_instruction.expect("remove_last_pop with no last instruction");
        let previous = scope.previous_instruction;
        self.current_instructions_mut().truncate(last.position);
        self.scopes[self.scope_index].last_instruction = previous;
    }

    fn replace_instruction(&mut self, position: usize, new_instruction: Vec<u8>) {
        let instructions = self.current_instructions_mut();
        for (i, byte) in new_instruction.into_iter().enumerate() {
            instructions[position + i] = byte;
        }
    }

    fn change_operand(&mut self, position: usize, operand: usize) {
        let op = Op::from_u8(self.current_instructions()[position])
            .expect("patched position does not point at an opcode");
        let new_instruction = make(op, &[operand]);
        self.replace_instruction(position, new_instruction);
    }

    fn replace_last_pop_with_return(&mut self) {
        let last = self.scopes[self.scope_index]
            .last_instruction
            .expect("replace_last_pop_with_return with no last instruction");
        self.replace_instruction(last.position, make(Op::ReturnValue, &[]));
        self.scopes[self.scope_index].last_instruction = Some(EmittedInstruction {
            opcode: Op::ReturnValue,
            position: last.position,
        });
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}
