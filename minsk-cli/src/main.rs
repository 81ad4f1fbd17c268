//! Command-line front end: reads a loader-format program from stdin, runs
//! it to completion, and writes printer output plus a final status block
//! to stdout.

use std::io::{self, Write};
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use colored::*;
use minsk_core::{loader, Engine, EngineConfig, Memory, Trap, Word};

/// Minsk-2 / Minsk-22 CPU emulator.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Trace level: 0 silent, 1 per-instruction, 2 also registers, 3 also memory access.
    #[arg(long, value_name = "0-3", default_value_t = 0)]
    trace: u8,

    /// Maximum instructions to execute before stopping with "CPU quota exceeded".
    #[arg(long, value_name = "N")]
    cpu_quota: Option<u32>,

    /// Maximum printer lines before stopping with "Out of paper".
    #[arg(long, value_name = "N")]
    print_quota: Option<u32>,

    /// Use English status/error messages instead of Russian.
    #[arg(long)]
    english: bool,

    /// Minsk-22 mode: two memory banks, address-extension field live.
    #[arg(long)]
    upgrade: bool,

    /// Pre-seed memory with the historical "set password" trivia payload.
    #[arg(long)]
    set_password: bool,
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();

    if args.trace > 0 {
        tracing_subscriber::fmt()
            .with_max_level(trace_level_filter(args.trace))
            .without_time()
            .init();
    }

    let config = EngineConfig {
        trace_level: args.trace,
        cpu_quota: args.cpu_quota,
        print_quota: args.print_quota,
        english: args.english,
        upgrade: args.upgrade,
        set_password: args.set_password,
    };

    let mut memory = if config.set_password {
        Memory::new_with_password_seed(config.bank_count())
    } else {
        Memory::new(config.bank_count())
    };

    let stdin = io::stdin();
    let mut input = stdin.lock();
    if let Err(err) = loader::load(&mut input, &mut memory) {
        let message = if config.english {
            err.english()
        } else {
            err.russian()
        };
        println!("{message}");
        return Ok(ExitCode::SUCCESS);
    }

    let mut engine = Engine::new(memory, config);
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let trap = engine.run(&mut out);
    out.flush()?;

    print_status_block(&engine, trap, args.english);
    Ok(ExitCode::SUCCESS)
}

fn trace_level_filter(trace: u8) -> tracing::Level {
    match trace {
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    }
}

fn print_status_block(engine: &Engine, trap: Trap, english: bool) {
    let reason = if english { trap.english() } else { trap.russian() };
    println!("{}", format!("Machine stopped -- {reason}").bold());
    println!(
        "IP:{:04o} ACC:{} R1:{} R2:{}",
        engine.prev_ip,
        format_word(engine.acc),
        format_word(engine.r1),
        format_word(engine.r2),
    );
}

fn format_word(w: Word) -> String {
    format!(
        "{}{:012o}",
        if w.sign() < 0 { '-' } else { '+' },
        w.magnitude()
    )
}
