use anyhow::Result;
use clap::{Parser, Subcommand};

use asm65::{
    assembler::{assemble, AssemblyArgs},
    disassembler::{disassemble, DisassemblyArgs},
    instrumentation,
};

#[derive(Parser)]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    #[clap(long)]
    #[clap(help = "Enable chrome tracing")]
    #[clap(long_help = "Enable chrome tracing which on program exit will generate
a json file to be opened with a chrome tracing compatible
viewer.")]
    trace: bool,
    #[clap(short, long, action = clap::ArgAction::Count, global = true)]
    #[clap(help = "Log more, repeat for more detail")]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[clap(about = "Assemble a program")]
    #[clap(aliases = &["a", "asm"])]
    Assemble(AssemblyArgs),
    #[clap(about = "Disassemble a binary file")]
    #[clap(aliases = &["d", "dis"])]
    Disassemble(DisassemblyArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _trace_guard = instrumentation::init(cli.verbose, cli.trace);

    match &cli.command {
        Command::Assemble(args) => assemble(args),
        Command::Disassemble(args) => disassemble(args),
    }
}
