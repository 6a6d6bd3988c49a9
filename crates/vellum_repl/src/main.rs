//! The read-eval-print loop: drives the lex → parse → compile → run
//! pipeline one line at a time, carrying the symbol table, constant
//! pool, and globals array forward across rounds so later input can
//! reference earlier `let` bindings.

use std::io::{self, BufRead, Write};

use vellum_vm::vm::GLOBALS_SIZE;
use vellum_vm::{Compiler, SymbolTable, Value, Vm};

const PROMPT: &str = ">> ";

const FACE: &str = r#"            __,__
   .--.  .-"     "-.  .--.
  / .. \/  .-. .-.  \/ .. \
 | |  '|  /   Y   \  |'  | |
 | \   \  \ 0 | 0 /  /   / |
  \ '- ,\.-"""""""-./, -' /
   ''-' /_   ^ ^   _\ '-''
       |  \._   _./  |
       \   \ '~' /   /
        '._ '-=-' _.'
           '-----'
"#;

fn main() {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    let mut symbol_table = SymbolTable::new();
    let mut constants: Vec<Value> = Vec::new();
    let mut globals: Vec<Value> = vec![Value::Null; GLOBALS_SIZE];

    loop {
        print!("{}", PROMPT);
        if stdout.flush().is_err() {
            break;
        }

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break, // EOF
            Ok(_) => {}
            Err(_) => break,
        }

        let (program, lex_errors, parse_errors) = vellum_parser::parse(&line);
        if !lex_errors.is_empty() || !parse_errors.is_empty() {
            print_parse_errors(&lex_errors, &parse_errors);
            continue;
        }

        let mut compiler = Compiler::new_with_state(
            std::mem::take(&mut symbol_table),
            std::mem::take(&mut constants),
        );
        if let Err(e) = compiler.compile(&program) {
            println!("Woops! Compilation failed, error: {}", e);
            let (table, consts) = compiler.into_state();
            symbol_table = table;
            constants = consts;
            continue;
        }

        let bytecode = compiler.bytecode();
        let (table, consts) = compiler.into_state();
        symbol_table = table;
        constants = consts;

        let mut machine = Vm::new_with_globals(bytecode, std::mem::take(&mut globals));
        if let Err(e) = machine.run() {
            println!("Woops! Executing bytecode failed, error: {}", e);
            globals = machine.into_globals();
            continue;
        }

        println!("{}", machine.last_popped_stack_elem().inspect());
        globals = machine.into_globals();
    }
}

fn print_parse_errors(
    lex_errors: &[vellum_lexer::LexError],
    parse_errors: &[vellum_parser::ParseError],
) {
    print!("{}", FACE);
    println!("Woops! We ran into some monkey business here!");
    println!(" parser errors:");
    for e in lex_errors {
        println!("\t{}", e);
    }
    for e in parse_errors {
        println!("\t{}", e);
    }
}
