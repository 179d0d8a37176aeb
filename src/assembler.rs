use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context as _, Result};
use clap::Args;

use crate::{
    assembler::{
        codegen::{
            opcode::{Cpu, OpcodeTable},
            Assembler, Stats,
        },
        diagnostics::Diagnostics,
        environment::Environment,
        parser::{Frontend, Program},
        passes::{Context, Stage},
    },
    ir::{Expr, Node, NodeKind},
};

/// Lexes code into tokens.
///
/// Converts a string into tokens. For example, the string `LDA #$10` would be
/// converted into the following tokens:
///
/// ```text
/// [
///     Token { token: TokenType::Identifier, literal: "lda", position: 1:1 },
///     Token { token: TokenType::Hash, literal: "#", position: 1:5 },
///     Token { token: TokenType::Hex, literal: "10", position: 1:6 },
///     Token { token: TokenType::Eof, literal: "", position: 1:9 },
/// ]
/// ```
pub mod lexer;

/// Parses tokens into the IR.
pub mod parser;

/// Errors and warnings collected during assembly.
pub mod diagnostics;

/// Label bindings, scopes and program counters.
pub mod environment;

/// Macro definitions and expansion.
pub mod macros;

/// Passes that resolve labels and addressing modes.
pub mod passes;

/// Generates machine code from the resolved IR.
pub mod codegen;

/// Default output file when neither `-o` nor `.outfile` names one.
pub const DEFAULT_OUTPUT: &str = "a.bin";

/// Settings of one assembly run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    pub cpu: Cpu,
    /// Rewrite out of range branches instead of reporting them
    pub branch_extend: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            cpu: Cpu::Mos6502,
            branch_extend: true,
        }
    }
}

/// Result of running the whole pipeline.
///
/// `bytes` is only meaningful when `diagnostics` holds no errors.
#[derive(Debug)]
pub struct Assembly {
    pub bytes: Vec<u8>,
    pub stats: Stats,
    pub diagnostics: Diagnostics,
    /// Final label values
    pub environment: Environment,
    pub outfile: Option<String>,
}

/// Runs every pass over a parsed program and encodes it.
#[tracing::instrument(skip(program))]
pub fn assemble_program(program: Program, options: &Options) -> Assembly {
    let Program {
        mut ir,
        diagnostics,
        outfile,
    } = program;
    let mut cx = Context::new(OpcodeTable::for_cpu(options.cpu), diagnostics);

    for stage in passes::pipeline(options.branch_extend).iter_mut() {
        stage.go(&mut ir, &mut cx);
    }
    let mut assembler = Assembler::new();
    assembler.go(&mut ir, &mut cx);

    Assembly {
        stats: assembler.stats(),
        bytes: assembler.into_output(),
        diagnostics: cx.diagnostics,
        environment: cx.env,
        outfile,
    }
}

/// Parses and assembles source held in memory.
pub fn assemble_source(name: &str, source: &str, options: &Options) -> Assembly {
    let program = parser::parse_source(name, source, OpcodeTable::for_cpu(options.cpu));
    assemble_program(program, options)
}

#[derive(Debug, thiserror::Error)]
pub enum AssemblerError {
    #[error("Assembly failed:\n{0}")]
    Failed(Diagnostics),
}

/// Utility function for generating machine code from an assembly program.
#[tracing::instrument]
pub fn compile_code(input: &str, program_start: u16) -> Result<Vec<u8>, AssemblerError> {
    let options = Options::default();
    let mut program = parser::parse_source("<input>", input, OpcodeTable::for_cpu(options.cpu));

    let origin = program.ir.push(Node::from(NodeKind::SetPc(Expr::constant(
        program_start as i64,
    ))));
    let root = program.ir.root();
    if let NodeKind::Sequence(children) = &mut program.ir[root].kind {
        children.insert(0, origin);
    }

    let assembly = assemble_program(program, &options);
    if assembly.diagnostics.has_errors() {
        return Err(AssemblerError::Failed(assembly.diagnostics));
    }
    Ok(assembly.bytes)
}

/// Mutually exclusive instruction set extensions.
#[derive(Args, Debug, Clone, Copy, Default)]
pub struct CpuArgs {
    #[clap(short = 'u', long = "undoc")]
    #[clap(help = "Enable undocumented 6502 opcodes")]
    undoc: bool,
    #[clap(short = 'c', long = "65c02", conflicts_with_all = ["undoc", "csg4502"])]
    #[clap(help = "Enable 65C02 extensions")]
    wdc65c02: bool,
    #[clap(long = "4502", conflicts_with = "undoc")]
    #[clap(help = "Enable 4502 extensions")]
    csg4502: bool,
}

impl CpuArgs {
    pub fn cpu(&self) -> Cpu {
        if self.undoc {
            Cpu::Undocumented
        } else if self.wdc65c02 {
            Cpu::Wdc65C02
        } else if self.csg4502 {
            Cpu::Csg4502
        } else {
            Cpu::Mos6502
        }
    }
}

#[derive(Args, Debug)]
pub struct AssemblyArgs {
    #[clap(required = true)]
    #[clap(help = "Source files, - reads standard input")]
    files: Vec<PathBuf>,
    #[clap(short, long)]
    #[clap(help = "Output file, - writes to standard output")]
    output: Option<PathBuf>,
    #[command(flatten)]
    cpu: CpuArgs,
    #[clap(long)]
    #[clap(help = "Report out of range branches instead of rewriting them")]
    no_branch_extend: bool,
    #[clap(long)]
    #[clap(help = "Do not print warnings")]
    no_warn: bool,
    #[clap(short, long)]
    #[clap(help = "Only print errors")]
    quiet: bool,
}

impl AssemblyArgs {
    fn options(&self) -> Options {
        Options {
            cpu: self.cpu.cpu(),
            branch_extend: !self.no_branch_extend,
        }
    }

    fn output_path(&self, outfile: Option<&str>) -> PathBuf {
        self.output
            .clone()
            .or_else(|| outfile.map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT))
    }
}

fn write_output(path: &Path, bytes: &[u8]) -> Result<()> {
    if path == Path::new("-") {
        std::io::stdout()
            .write_all(bytes)
            .with_context(|| "Unable to write to standard output")
    } else {
        fs::write(path, bytes).with_context(|| format!("Unable to write {}", path.display()))
    }
}

/// Assembles the files named on the command line.
#[tracing::instrument]
pub fn assemble(args: &AssemblyArgs) -> Result<()> {
    let options = args.options();
    let mut frontend = Frontend::new(OpcodeTable::for_cpu(options.cpu));
    for file in &args.files {
        frontend.add_file(file);
    }
    let assembly = assemble_program(frontend.finish(), &options);

    if !args.no_warn {
        for warning in assembly.diagnostics.warnings() {
            eprintln!("Warning: {}", warning);
        }
    }
    for error in assembly.diagnostics.errors() {
        eprintln!("{}", error);
    }
    if assembly.diagnostics.has_errors() {
        anyhow::bail!("{}", assembly.diagnostics.report());
    }

    let output = args.output_path(assembly.outfile.as_deref());
    write_output(&output, &assembly.bytes)?;
    if !args.quiet {
        eprintln!("Assembly complete: {}", assembly.stats);
        if output != Path::new("-") {
            eprintln!("Wrote {}", output.display());
        }
    }

    Ok(())
}
