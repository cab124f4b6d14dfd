use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::Parser as ClapParser;

use lisplet::interpreter::Interpreter;
use lisplet::{lexer, parser};

#[derive(Debug, ClapParser)]
#[command(
    name = "lisplet",
    about = "Evaluates a lisplet source file, or standard input.",
    version
)]
struct Args {
    /// Path to the source file; standard input when omitted.
    input: Option<PathBuf>,

    /// Dump the expression tree before and after evaluation.
    #[arg(long)]
    print_ast: bool,
}

fn main() {
    let args = Args::parse();

    let source = match read_input(args.input.as_deref()) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("{err:#}");
            println!("failure reading input file");
            process::exit(-1);
        }
    };

    if source.is_empty() {
        return;
    }

    let tokens = match lexer::lex(&source) {
        Ok(tokens) => tokens,
        Err(err) => {
            eprintln!("{err}");
            println!("failure");
            process::exit(-1);
        }
    };

    let tree = match parser::parse(&tokens) {
        Ok(tree) => tree,
        Err(err) => {
            eprintln!("{err}");
            println!("failure");
            process::exit(-1);
        }
    };

    if args.print_ast {
        print!("{tree}");
    }
    println!("success");

    let stdin = io::stdin();
    let mut interpreter = Interpreter::new(tree, stdin.lock(), io::stdout());
    match interpreter.run() {
        Ok(value) => {
            println!("{}", value.scalar);
            if args.print_ast {
                print!("{}", interpreter.tree());
            }
        }
        Err(err) => {
            eprintln!("runtime error: {err}");
            process::exit(-1);
        }
    }
}

fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display())),
        None => {
            let mut source = String::new();
            io::stdin()
                .read_to_string(&mut source)
                .context("failed to read standard input")?;
            Ok(source)
        }
    }
}
