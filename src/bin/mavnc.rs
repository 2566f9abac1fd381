//! MAVN compiler driver.
//!
//! ```bash
//! mavnc simple.mavn                  # writes simple.s
//! mavnc simple.mavn -o out.s --registers 6 -vv
//! mavnc loop.mavn --reg-names s0,s1,s2 --globl
//! ```

use clap::{ArgAction, Parser};
use log::LevelFilter;
use mavn::core::emit::EmitOptions;
use mavn::{CompileResult, InterferenceRule, PipelineConfig, RegisterPalette, Session};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "mavnc")]
#[command(version)]
#[command(about = "Register allocator and MIPS emitter for MAVN assembly", long_about = None)]
struct Cli {
    /// Input MAVN source file
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Output file (defaults to <input>.s)
    #[arg(short, long, value_name = "OUTPUT")]
    output: Option<PathBuf>,

    /// Number of physical registers, named t0..t{N-1}
    #[arg(long, value_name = "N", conflicts_with = "reg_names")]
    registers: Option<usize>,

    /// Explicit physical register names
    #[arg(long, value_name = "NAMES", value_delimiter = ',')]
    reg_names: Option<Vec<String>>,

    /// Liveness sweep cap
    #[arg(long, value_name = "N", default_value_t = mavn::core::liveness::DEFAULT_MAX_SWEEPS)]
    max_sweeps: usize,

    /// Fail when liveness does not converge within the sweep cap
    #[arg(long)]
    strict_liveness: bool,

    /// Emit a `.globl <entry>` header
    #[arg(long)]
    globl: bool,

    /// Let every variable live across an instruction interfere
    #[arg(long)]
    all_live: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn palette(&self) -> CompileResult<RegisterPalette> {
        match (&self.reg_names, self.registers) {
            (Some(names), _) => RegisterPalette::new(names.iter().map(|n| n.trim().to_string())),
            (None, Some(k)) => RegisterPalette::with_size(k),
            (None, None) => Ok(RegisterPalette::default()),
        }
    }

    fn config(&self) -> CompileResult<PipelineConfig> {
        let rule = if self.all_live {
            InterferenceRule::AllLive
        } else {
            InterferenceRule::DefLiveOut
        };
        Ok(PipelineConfig::default()
            .with_palette(self.palette()?)
            .with_max_sweeps(self.max_sweeps)
            .strict(self.strict_liveness)
            .with_rule(rule)
            .with_emit(EmitOptions { globl: self.globl }))
    }

    fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| self.input.with_extension("s"))
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn run(cli: &Cli) -> CompileResult<bool> {
    let source = fs::read_to_string(&cli.input)?;
    let mut session = Session::from_source(&source, cli.config()?)?;

    if let Some(err) = session.allocate()?.error().cloned() {
        eprintln!("Error: register allocation failed: {err}");
        log::info!("{}", session.stats());
        return Ok(false);
    }

    let output = cli.output_path();
    session.write_output(&output)?;
    log::info!("{}", session.stats());
    Ok(true)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {}: {e}", cli.input.display());
            ExitCode::FAILURE
        }
    }
}
