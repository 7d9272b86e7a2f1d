// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Kestrel - developer tool for inspecting compiled bytecode
//!
//! Loads a JSON-encoded AST, compiles it into one compilation unit,
//! checks its stack discipline and prints a listing.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use kestrel_bytecode::ast::{Expression, Program};
use kestrel_bytecode::{Arena, CompilationUnit, CompileError, UnitConfig};
use owo_colors::OwoColorize;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "kestrel")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compile a JSON AST and print the bytecode listing
    Disasm(DisasmArgs),
}

#[derive(Args, Debug)]
struct DisasmArgs {
    /// Path to the JSON-encoded program (or expression)
    input: PathBuf,

    /// The input is a single expression instead of a program
    #[arg(long)]
    expression: bool,

    /// Compile only the first statement instead of the whole body as a block
    #[arg(long)]
    no_block: bool,

    /// Report statements without a bytecode mapping instead of escaping them
    #[arg(long)]
    no_escape: bool,

    /// Treat more than this many instructions as out of memory
    #[arg(long, value_name = "N")]
    max_instructions: Option<usize>,

    /// Byte limit for the literal arena
    #[arg(long, value_name = "BYTES")]
    arena_limit: Option<usize>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let result = match &cli.command {
        Commands::Disasm(args) => run_disasm(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {:#}", "Error".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn unit_config(args: &DisasmArgs) -> UnitConfig {
    let mut config = UnitConfig::new().with_escape(!args.no_escape);
    if let Some(limit) = args.max_instructions {
        config = config.with_max_instructions(limit);
    }
    if let Some(bytes) = args.arena_limit {
        config = config.with_arena_limit(bytes);
    }
    config
}

/// The parsed input; compilation borrows from it.
enum Source {
    Program(Program),
    Expression(Expression),
}

fn load(path: &Path, expression: bool) -> anyhow::Result<Source> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read '{}'", path.display()))?;
    let source = if expression {
        Source::Expression(
            serde_json::from_str(&text)
                .with_context(|| format!("'{}' is not a JSON expression", path.display()))?,
        )
    } else {
        Source::Program(
            serde_json::from_str(&text)
                .with_context(|| format!("'{}' is not a JSON program", path.display()))?,
        )
    };
    Ok(source)
}

fn run_disasm(args: &DisasmArgs) -> anyhow::Result<()> {
    let source = load(&args.input, args.expression)?;
    let config = unit_config(args);
    debug!(?config, input = %args.input.display(), "compiling");

    let arena = config.arena();
    let mut unit = CompilationUnit::with_config(&arena, config);
    let compiled = match &source {
        Source::Expression(expr) => unit.compile_expression(expr),
        Source::Program(program) if args.no_block => unit.compile_statement(&program.body, false),
        Source::Program(program) => unit.compile_program(program),
    };

    let start = match compiled {
        Ok(start) => start,
        Err(CompileError::TreeWalkRequired) => {
            println!(
                "{} the input needs the tree-walking evaluator",
                "note:".yellow().bold()
            );
            return Ok(());
        }
        Err(e) => return Err(e).context("compilation failed"),
    };

    print_listing(&unit);

    let report = unit
        .verify(start)
        .context("emitted bytecode failed verification")?;
    println!(
        "{} {} instructions, max stack depth {}, {} reachable",
        "ok:".green().bold(),
        unit.len(),
        report.max_depth,
        report.reachable
    );
    Ok(())
}

fn print_listing(unit: &CompilationUnit<'_>) {
    for line in unit.listing().to_string().lines() {
        let Some((offset, rest)) = line.trim_start().split_once("  ") else {
            println!("{line}");
            continue;
        };
        let rest = rest.trim_end();
        let (mnemonic, operands) = rest.split_once(' ').unwrap_or((rest, ""));
        println!(
            "{:>4}  {}{}",
            offset.dimmed(),
            format!("{mnemonic:<22}").cyan(),
            operands.trim_start()
        );
    }
}
