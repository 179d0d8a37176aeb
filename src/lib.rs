/// Program representation shared by the assembler passes.
///
/// A program is an arena of [`ir::Node`]s. Parsing builds the tree, every pass after that
/// rewrites node kinds in place until all addressing modes and label values are final.
pub mod ir;

/// Transforms 6502 assembly code to machine code.
///
/// The steps are:
/// 1. **Lexing** - converting a string into tokens
/// 2. **Parsing** - converting tokens into the IR, reading included files along the way
/// 3. **Passes** - expanding macros, resolving labels and choosing addressing modes until
///    nothing changes any more
/// 4. **Code generation** - encoding the resolved IR into bytes
pub mod assembler;

/// Turns machine code back into instructions.
pub mod disassembler;

/// Logging and tracing setup.
pub mod instrumentation;
