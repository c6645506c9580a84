use std::env;
use std::fs;
use std::io;
use std::process;

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use tuff::{InterpretResult, Vm};

fn main() {
    let args: Vec<String> = env::args().collect();
    match args.len() {
        1 => repl(),
        2 => run_file(&args[1]),
        _ => {
            eprintln!("Usage: tuff [path]");
            process::exit(64);
        }
    }
}

fn repl() {
    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(readline_err) => {
            eprintln!("Could not start the line editor: {}", readline_err);
            process::exit(74);
        }
    };

    let mut out = io::stdout();
    let mut err = io::stderr();
    // one VM for the whole session, so definitions carry across lines
    let mut vm = Vm::new(&mut out, &mut err);

    loop {
        match editor.readline("> ") {
            Ok(line) => {
                let _ = editor.add_history_entry(line.as_str());
                vm.interpret(&line);
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(readline_err) => {
                eprintln!("{}", readline_err);
                break;
            }
        }
    }
}

fn run_file(path: &str) {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(_) => {
            eprintln!("Could not open file \"{}\".", path);
            process::exit(74);
        }
    };

    let mut out = io::stdout();
    let mut err = io::stderr();
    let mut vm = Vm::new(&mut out, &mut err);
    match vm.interpret(&source) {
        InterpretResult::Ok => {}
        InterpretResult::CompileError => process::exit(65),
        InterpretResult::RuntimeError => process::exit(70),
    }
}
