//! FOOL command-line interface
//!
//! Compiles FOOL programs to SVM assembly and runs them.

mod logger;

use anyhow::Context;
use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use fool_compiler::{CompileError, Compilation, Compiler, CompilerOptions, print};
use fool_svm::{MEMSIZE, VmConfig};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;

/// Largest memory the machine may be given, in cells
const MAX_MEMORY_CELLS: i64 = 1 << 24;

fn cli() -> Command {
    let file = Arg::new("file")
        .value_name("FILE")
        .help("FOOL source file")
        .required(true)
        .value_parser(value_parser!(PathBuf));
    let print_ast = Arg::new("print-ast")
        .long("print-ast")
        .help("Print the enriched AST")
        .action(ArgAction::SetTrue);

    Command::new("fool")
        .version(env!("CARGO_PKG_VERSION"))
        .about("FOOL compiler and stack virtual machine")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("memory-size")
                .long("memory-size")
                .value_name("CELLS")
                .help("Number of memory cells of the virtual machine, at most 16777216 [default: 10000]")
                .value_parser(value_parser!(u32).range(1..=MAX_MEMORY_CELLS))
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Log compiler and machine activity")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(
            Command::new("compile")
                .about("Compile a FOOL program to SVM assembly")
                .arg(file.clone())
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .value_name("OUT")
                        .help("Assembly file to write (default: FILE.asm)")
                        .value_parser(value_parser!(PathBuf)),
                )
                .arg(print_ast.clone()),
        )
        .subcommand(
            Command::new("run")
                .about("Compile a FOOL program and execute it")
                .arg(file)
                .arg(print_ast),
        )
        .subcommand(
            Command::new("exec")
                .about("Assemble and execute an SVM assembly file")
                .arg(
                    Arg::new("file")
                        .value_name("ASM")
                        .help("SVM assembly file")
                        .required(true)
                        .value_parser(value_parser!(PathBuf)),
                ),
        )
}

fn main() {
    let matches = cli().get_matches();
    logger::init_cli_logger(matches.get_flag("verbose"));

    if let Err(err) = dispatch(&matches) {
        report(&err);
        process::exit(1);
    }
}

fn dispatch(matches: &ArgMatches) -> anyhow::Result<()> {
    let options = CompilerOptions {
        vm: VmConfig {
            memory_size: matches
                .get_one::<u32>("memory-size")
                .map_or(MEMSIZE, |&cells| cells as usize),
            ..VmConfig::default()
        },
    };
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match matches.subcommand() {
        Some(("compile", sub)) => {
            let file = required_path(sub)?;
            let output = sub.get_one::<PathBuf>("output").cloned();
            let written = compile_file(
                file,
                output.as_deref(),
                sub.get_flag("print-ast"),
                options,
                &mut out,
            )?;
            eprintln!("Assembly written to {}", written.display());
            Ok(())
        }
        Some(("run", sub)) => run_file(required_path(sub)?, sub.get_flag("print-ast"), options, &mut out),
        Some(("exec", sub)) => exec_file(required_path(sub)?, options.vm, &mut out),
        _ => anyhow::bail!("no subcommand given"),
    }
}

fn required_path(matches: &ArgMatches) -> anyhow::Result<&Path> {
    matches
        .get_one::<PathBuf>("file")
        .map(PathBuf::as_path)
        .context("missing input file")
}

fn report(err: &anyhow::Error) {
    if let Some(CompileError::FrontEnd { errors }) = err.downcast_ref::<CompileError>() {
        for diagnostic in errors {
            eprintln!("{diagnostic}");
        }
        eprintln!("You had {} front-end error(s).", errors.len());
    } else {
        eprintln!("{err:#}");
    }
}

fn compile_source<W: Write>(
    path: &Path,
    print_ast: bool,
    options: CompilerOptions,
    out: &mut W,
) -> anyhow::Result<Compilation> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let compilation = Compiler::with_options(options).compile(&source, &path.display().to_string())?;
    if print_ast {
        write!(out, "{}", print::render(&compilation.program))?;
    }
    tracing::info!(ty = %compilation.program_type, "compiled {}", path.display());
    Ok(compilation)
}

/// Compile `path` and write the assembly; returns the path written
fn compile_file<W: Write>(
    path: &Path,
    output: Option<&Path>,
    print_ast: bool,
    options: CompilerOptions,
    out: &mut W,
) -> anyhow::Result<PathBuf> {
    let compilation = compile_source(path, print_ast, options, out)?;
    let target = output.map_or_else(
        || {
            let mut name = path.as_os_str().to_owned();
            name.push(".asm");
            PathBuf::from(name)
        },
        Path::to_path_buf,
    );
    std::fs::write(&target, &compilation.assembly)
        .with_context(|| format!("failed to write {}", target.display()))?;
    Ok(target)
}

fn run_file<W: Write>(
    path: &Path,
    print_ast: bool,
    options: CompilerOptions,
    out: &mut W,
) -> anyhow::Result<()> {
    let compilation = compile_source(path, print_ast, options, out)?;
    fool_compiler::execute(&compilation.assembly, options.vm, out)?;
    Ok(())
}

fn exec_file<W: Write>(path: &Path, config: VmConfig, out: &mut W) -> anyhow::Result<()> {
    let assembly = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    fool_compiler::execute(&assembly, config, out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::{NamedTempFile, TempDir};

    fn source_file(contents: &str) -> NamedTempFile {
        let file = NamedTempFile::new().unwrap();
        fs::write(&file, contents).unwrap();
        file
    }

    #[test]
    fn test_cli_definition() {
        cli().debug_assert();
    }

    #[test]
    fn test_parse_arguments() {
        let matches = cli()
            .try_get_matches_from(["fool", "--memory-size", "500", "compile", "a.fool", "-o", "a.s"])
            .unwrap();
        assert_eq!(matches.get_one::<u32>("memory-size"), Some(&500));
        let (name, sub) = matches.subcommand().unwrap();
        assert_eq!(name, "compile");
        assert_eq!(sub.get_one::<PathBuf>("output"), Some(&PathBuf::from("a.s")));
    }

    #[test]
    fn test_memory_size_bounds() {
        let parse = |cells: &str| {
            cli().try_get_matches_from(["fool", "--memory-size", cells, "run", "a.fool"])
        };
        assert!(parse("0").is_err());
        assert!(parse("-3").is_err());
        assert!(parse("2000000000").is_err());
        assert!(parse("16777217").is_err());
        let matches = parse("16777216").unwrap();
        assert_eq!(matches.get_one::<u32>("memory-size"), Some(&16_777_216));
    }

    #[test]
    fn test_run_file() {
        let file = source_file("let var x: int := 20; in print(x + 22);");
        let mut out = Vec::new();
        run_file(file.path(), false, CompilerOptions::default(), &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "42\n");
    }

    #[test]
    fn test_run_file_print_ast() {
        let file = source_file("print(1);");
        let mut out = Vec::new();
        run_file(file.path(), true, CompilerOptions::default(), &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "Prog\n  Print\n    Int: 1\n1\n");
    }

    #[test]
    fn test_compile_file_default_output() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prog.fool");
        fs::write(&path, "print(3);").unwrap();

        let written = compile_file(&path, None, false, CompilerOptions::default(), &mut Vec::new())
            .unwrap();
        assert_eq!(written, dir.path().join("prog.fool.asm"));
        assert_eq!(fs::read_to_string(written).unwrap(), "push 3\nprint\nhalt\n");
    }

    #[test]
    fn test_exec_file() {
        let file = source_file("push 5\npush 4\nmult\nprint\nhalt\n");
        let mut out = Vec::new();
        exec_file(file.path(), VmConfig::default(), &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "20\n");
    }

    #[test]
    fn test_front_end_errors_surface_as_compile_error() {
        let file = source_file("let var x: int := y; in x;");
        let err = run_file(file.path(), false, CompilerOptions::default(), &mut Vec::new())
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CompileError>(),
            Some(CompileError::FrontEnd { errors }) if errors.len() == 1
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = run_file(
            Path::new("definitely_missing.fool"),
            false,
            CompilerOptions::default(),
            &mut Vec::new(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("definitely_missing.fool"));
    }
}
