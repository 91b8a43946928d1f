// ABOUTME: Command-line front end: REPL, script runner, IR emission

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser as ClapParser, Subcommand};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use sqale::arena::Arena;
use sqale::codegen::{self, CodegenOpts};
use sqale::config;
use sqale::eval::Vm;
use sqale::gc::Roots;
use sqale::modules;
use sqale::value::{render_repl, Value};

/// A statically typed, bracket-delimited Lisp.
#[derive(ClapParser, Debug)]
#[command(name = "sqale")]
#[command(version = config::VERSION)]
#[command(about = "SQALE interpreter and IR emitter")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interactive read-eval-print loop
    Repl,
    /// Type-check and evaluate a script; a `main` closure's Int result is
    /// the exit code
    Run {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Type-check a script and emit textual LLVM IR for the typed subset
    EmitIr {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(short, long, default_value = "out.ll")]
        output: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli.command {
        Command::Repl => cmd_repl(),
        Command::Run { file } => cmd_run(&file),
        Command::EmitIr { file, output } => cmd_emit_ir(&file, &output),
    }
}

fn cmd_run(file: &std::path::Path) -> ExitCode {
    let src = match std::fs::read_to_string(file) {
        Ok(src) => src,
        Err(e) => {
            eprintln!("failed to read {}: {}", file.display(), e);
            return ExitCode::FAILURE;
        }
    };
    let arena = Arena::new().leak();
    let program = modules::parse_and_expand(arena, &src);
    let vm = Vm::new();
    let mut roots = Roots::new();
    if vm.run_program(&mut roots, program).is_err() {
        return ExitCode::FAILURE;
    }
    match vm.call_main(&mut roots) {
        Some(code) => ExitCode::from((code & 0xff) as u8),
        None => ExitCode::SUCCESS,
    }
}

fn cmd_emit_ir(file: &std::path::Path, output: &std::path::Path) -> ExitCode {
    let src = match std::fs::read_to_string(file) {
        Ok(src) => src,
        Err(e) => {
            eprintln!("failed to read {}: {}", file.display(), e);
            return ExitCode::FAILURE;
        }
    };
    let arena = Arena::new().leak();
    let program = modules::parse_and_expand(arena, &src);
    let vm = Vm::new();
    let mut roots = Roots::new();
    if vm.check_program(&mut roots, program).is_err() {
        return ExitCode::FAILURE;
    }
    let opts = CodegenOpts { module_name: file.display().to_string(), for_exe: true };
    let ir = codegen::emit_ir(program, &opts);
    if let Err(e) = std::fs::write(output, ir) {
        eprintln!("failed to write {}: {}", output.display(), e);
        return ExitCode::FAILURE;
    }
    println!(
        "IR emitted to {}. Compile with: clang {} -O2 -o a.out",
        output.display(),
        output.display()
    );
    ExitCode::SUCCESS
}

fn cmd_repl() -> ExitCode {
    let mut editor = match DefaultEditor::new() {
        Ok(e) => e,
        Err(e) => {
            eprintln!("failed to start line editor: {}", e);
            return ExitCode::FAILURE;
        }
    };
    println!("{}", config::REPL_BANNER);
    // One arena and one VM persist across the whole session.
    let arena = Arena::new().leak();
    let vm = Vm::new();
    let mut roots = Roots::new();
    loop {
        match editor.readline(config::REPL_PROMPT) {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(&line);
                let program = modules::parse_and_expand(arena, &line);
                for &form in program.as_list().unwrap_or(&[]) {
                    match vm.eval_form(&mut roots, form) {
                        Ok(Value::Unit) => {}
                        Ok(v) => println!("{}", vm.with_heap(|h| render_repl(h, v))),
                        Err(_) => break,
                    }
                }
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("readline error: {}", e);
                break;
            }
        }
    }
    ExitCode::SUCCESS
}
