use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use xsym::formula::{self, RenderStyle};
use xsym::trace::Instruction;
use xsym::{InterpreterConfig, Session};

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct XsymParams {
    #[command(subcommand)]
    pub command: Commands,
    /// Additional mnemonics to skip, saved to the stored configuration
    #[arg(long, global = true)]
    pub skip: Vec<String>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Replay a trace and print every register and memory formula
    Run {
        trace: PathBuf,
        /// List the pieces of partially known words
        #[arg(long)]
        debug: bool,
    },
    /// Write the solver term for one register after replaying a trace
    Cvc {
        trace: PathBuf,
        register: String,
        #[arg(short, long, default_value = "formula.cvc")]
        output: PathBuf,
    },
    /// Write a query checking two registers from two traces for equivalence
    Chkeq {
        first_trace: PathBuf,
        first_register: String,
        second_trace: PathBuf,
        second_register: String,
        /// Symbol id pairs `a:b` asserted equal
        #[arg(long = "pair", value_parser = parse_pair)]
        pairs: Vec<(u32, u32)>,
        #[arg(short, long, default_value = "ChkEq.cvc")]
        output: PathBuf,
    },
}

fn parse_pair(s: &str) -> Result<(u32, u32), String> {
    let (a, b) = s
        .split_once(':')
        .ok_or_else(|| format!("expected a:b, got {s}"))?;
    let a = a.parse().map_err(|e| format!("{a}: {e}"))?;
    let b = b.parse().map_err(|e| format!("{b}: {e}"))?;
    Ok((a, b))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    let params: XsymParams = XsymParams::parse();
    let config = update_config(&params)?;
    match params.command {
        Commands::Run { trace, debug } => run(config, &trace, debug),
        Commands::Cvc {
            trace,
            register,
            output,
        } => cvc(config, &trace, &register, &output),
        Commands::Chkeq {
            first_trace,
            first_register,
            second_trace,
            second_register,
            pairs,
            output,
        } => chkeq(
            config,
            (&first_trace, &first_register),
            (&second_trace, &second_register),
            &pairs,
            &output,
        ),
    }
}

fn update_config(params: &XsymParams) -> anyhow::Result<InterpreterConfig> {
    let stored: InterpreterConfig = confy::load("xsym", None)?;
    let mut updated = stored.clone();
    updated.skip.extend(params.skip.iter().cloned());
    if stored != updated {
        confy::store("xsym", None, updated.clone())?;
    }
    Ok(updated)
}

fn load_trace(path: &Path) -> anyhow::Result<Vec<Instruction>> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let mut trace: Vec<Instruction> =
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    for (i, insn) in trace.iter_mut().enumerate() {
        insn.id = i;
    }
    Ok(trace)
}

fn replay(config: InterpreterConfig, path: &Path) -> anyhow::Result<Session> {
    let trace = load_trace(path)?;
    let mut session = Session::with_config(config);
    session.run(&trace)?;
    Ok(session)
}

fn run(config: InterpreterConfig, trace: &Path, debug: bool) -> anyhow::Result<()> {
    let session = replay(config, trace)?;
    let style = match debug {
        true => RenderStyle::Debug,
        false => RenderStyle::Plain,
    };
    print!("{}", session.register_dump(style));
    print!("{}", session.memory_dump(style));
    println!("{}", session.memory_inputs());
    Ok(())
}

fn cvc(
    config: InterpreterConfig,
    trace: &Path,
    register: &str,
    output: &Path,
) -> anyhow::Result<()> {
    let mut session = replay(config, trace)?;
    let value = session.read_register(register)?;
    let text = formula::dump(session.arena(), value)?;
    fs::write(output, text)?;
    Ok(())
}

fn chkeq(
    config: InterpreterConfig,
    first: (&Path, &str),
    second: (&Path, &str),
    pairs: &[(u32, u32)],
    output: &Path,
) -> anyhow::Result<()> {
    let mut a = replay(config.clone(), first.0)?;
    let mut b = replay(config, second.0)?;
    let fa = a.read_register(first.1)?;
    let fb = b.read_register(second.1)?;
    if pairs.is_empty() {
        return Err(anyhow!("at least one --pair is needed to relate the two formulas"));
    }
    let query = formula::equivalence_query((a.arena(), fa), (b.arena(), fb), pairs)?;
    fs::write(output, query)?;
    Ok(())
}
