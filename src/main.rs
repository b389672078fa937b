use std::env;
use std::process;

use exprcc::{CompileError, CompileResult, generate_assembly};
use tracing::debug;
use tracing_subscriber::EnvFilter;

fn run(args: &[String]) -> CompileResult<String> {
  match args {
    [_, expr] => generate_assembly(expr),
    _ => {
      let program = args.first().map(String::as_str).unwrap_or("exprcc");
      Err(CompileError::Usage {
        program: program.to_string(),
      })
    }
  }
}

fn main() {
  // stdout carries the assembly, so logs go to stderr.
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(EnvFilter::from_default_env())
    .init();

  let args: Vec<String> = env::args().collect();
  match run(&args) {
    Ok(asm) => print!("{asm}"),
    Err(err) => {
      debug!(loc = ?err.loc(), message = %err.message(), "compilation failed");
      eprintln!("{err}");
      process::exit(1);
    }
  }
}
