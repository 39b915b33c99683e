use clap::Parser;
use mamba_sema::cli::{Cli, Commands, FileArgs};
use mamba_sema::limits::CompilerLimits;
use mamba_sema::semantic::errors::SemanticError;
use mamba_sema::{run_pipeline, FrontendError};

fn main() {
    std::process::exit(match run() {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    });
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check(args) => check_command(args)?,
    }

    Ok(())
}

fn load_limits() -> Result<CompilerLimits, Box<dyn std::error::Error>> {
    match CompilerLimits::from_project_toml("project.toml") {
        Ok(l) => {
            l.validate()?;
            Ok(l)
        }
        Err(_) => Ok(CompilerLimits::default()),
    }
}

fn read_source(args: &FileArgs, limits: &CompilerLimits) -> Result<String, Box<dyn std::error::Error>> {
    let source = std::fs::read_to_string(&args.file)
        .map_err(|e| format!("Failed to read '{}': {}", args.file, e))?;

    if source.len() > limits.max_input_size {
        return Err(format!(
            "Input too large: {} bytes (max: {})",
            source.len(),
            limits.max_input_size
        )
        .into());
    }

    Ok(source)
}

/// Renders `source`'s offending line with a caret underneath the range's start
/// column (SPEC_FULL.md §6, "shows the offending line with a caret underline").
fn print_snippet(source: &str, error: &SemanticError) {
    let start = error.range().start;
    if let Some(line) = source.lines().nth(start.line.saturating_sub(1)) {
        println!("  {}", line);
        let caret_column = start.column.saturating_sub(1);
        println!("  {}^", " ".repeat(caret_column));
    }
}

/// Lexes, parses and runs the four semantic passes over `args.file`, then
/// prints every collected diagnostic with a caret-underlined source snippet,
/// or the first solution's resolved declaration types, noting how many other
/// solutions exist (SPEC_FULL.md §6/§10, "Output from the core").
fn check_command(args: FileArgs) -> Result<(), Box<dyn std::error::Error>> {
    let limits = load_limits()?;
    let source = read_source(&args, &limits)?;

    let mut pipeline = match run_pipeline(&source, &limits) {
        Ok(p) => p,
        Err(FrontendError::Empty) => {
            println!("empty module");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    for error in &pipeline.result.errors {
        println!("{}", error);
        print_snippet(&source, error);
    }

    let total = pipeline.result.solutions.len();
    match pipeline.result.solutions.iter().position(Result::is_ok) {
        Some(index) => {
            let symbols: Vec<_> = pipeline
                .result
                .annotations
                .declaration_symbol
                .values()
                .copied()
                .collect();
            let solution = pipeline.result.solutions[index].as_ref().unwrap().clone();
            for symbol in symbols {
                let symbol_ty = pipeline.scopes.symbol(symbol).type_id;
                let resolved = solution.deep_resolve(&mut pipeline.types, symbol_ty);
                let name = pipeline.scopes.symbol(symbol).name.clone();
                println!("{}: {}", name, pipeline.types.describe(resolved));
            }
            if total > 1 {
                println!("({} other solution(s) not shown)", total - 1);
            }
        }
        None if total > 0 => {
            for (i, solution) in pipeline.result.solutions.iter().enumerate() {
                if let Err(e) = solution {
                    println!("solution {} failed: {}", i, e);
                }
            }
        }
        None => println!("no solutions"),
    }

    if pipeline.result.errors.is_empty() && pipeline.result.solutions.iter().all(Result::is_err) {
        std::process::exit(1);
    }

    Ok(())
}
