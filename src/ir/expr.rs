use std::fmt;

use thiserror::Error;

/// A label name together with the scope it is looked up in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Symbol {
    /// Visible everywhere.
    Global(String),
    /// Visible only inside the scope it was defined in. Written with a leading `_`.
    Local(String),
}

impl Symbol {
    /// Names starting with `_` are local to the innermost scope.
    pub fn parse(name: &str) -> Self {
        match name.strip_prefix('_') {
            Some(local) => Symbol::Local(local.to_owned()),
            None => Symbol::Global(name.to_owned()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Symbol::Global(name) | Symbol::Local(name) => name,
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Symbol::Local(_))
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Symbol::Global(name) => write!(f, "{}", name),
            Symbol::Local(name) => write!(f, "_{}", name),
        }
    }
}

/// Read access to symbol bindings and the program counter.
pub trait SymbolLookup {
    fn lookup(&self, symbol: &Symbol) -> Option<i64>;
    fn pc(&self) -> i64;
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    #[error("Unknown label '{0}'")]
    UnknownLabel(Symbol),
    #[error("Division by zero")]
    DivisionByZero,
}

/// Binary operators of an expression chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Multiply,
    Divide,
    Add,
    Subtract,
    And,
    Or,
    Xor,
}

impl Operator {
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '*' => Some(Operator::Multiply),
            '/' => Some(Operator::Divide),
            '+' => Some(Operator::Add),
            '-' => Some(Operator::Subtract),
            '&' => Some(Operator::And),
            '|' => Some(Operator::Or),
            '^' => Some(Operator::Xor),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Operator::Multiply => '*',
            Operator::Divide => '/',
            Operator::Add => '+',
            Operator::Subtract => '-',
            Operator::And => '&',
            Operator::Or => '|',
            Operator::Xor => '^',
        }
    }

    fn apply(self, lhs: i64, rhs: i64) -> Result<i64, EvalError> {
        Ok(match self {
            Operator::Multiply => lhs.wrapping_mul(rhs),
            Operator::Divide => floor_div(lhs, rhs)?,
            Operator::Add => lhs.wrapping_add(rhs),
            Operator::Subtract => lhs.wrapping_sub(rhs),
            Operator::And => lhs & rhs,
            Operator::Or => lhs | rhs,
            Operator::Xor => lhs ^ rhs,
        })
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

fn floor_div(lhs: i64, rhs: i64) -> Result<i64, EvalError> {
    if rhs == 0 {
        return Err(EvalError::DivisionByZero);
    }
    let quotient = lhs.wrapping_div(rhs);
    if lhs.wrapping_rem(rhs) != 0 && ((lhs < 0) != (rhs < 0)) {
        Ok(quotient - 1)
    } else {
        Ok(quotient)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Constant(i64),
    Symbol(Symbol),
    /// `^`, the address of the current instruction.
    ProgramCounter,
    /// `>e`
    HighByte(Box<Expr>),
    /// `<e`
    LowByte(Box<Expr>),
    /// Evaluated strictly left to right, operator precedence is encoded by nesting.
    Chain {
        first: Box<Expr>,
        rest: Vec<(Operator, Expr)>,
    },
}

/// An arithmetic expression that may depend on labels and the program counter.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    kind: ExprKind,
    hardcoded: bool,
}

impl Expr {
    pub fn new(kind: ExprKind) -> Self {
        let hardcoded = match &kind {
            ExprKind::Constant(_) => true,
            ExprKind::Symbol(_) | ExprKind::ProgramCounter => false,
            ExprKind::HighByte(expr) | ExprKind::LowByte(expr) => expr.hardcoded,
            ExprKind::Chain { first, rest } => {
                first.hardcoded && rest.iter().all(|(_, expr)| expr.hardcoded)
            }
        };
        Self { kind, hardcoded }
    }

    pub fn constant(value: i64) -> Self {
        Self::new(ExprKind::Constant(value))
    }

    pub fn symbol(symbol: Symbol) -> Self {
        Self::new(ExprKind::Symbol(symbol))
    }

    pub fn label(name: &str) -> Self {
        Self::symbol(Symbol::parse(name))
    }

    pub fn program_counter() -> Self {
        Self::new(ExprKind::ProgramCounter)
    }

    pub fn high_byte(expr: Expr) -> Self {
        Self::new(ExprKind::HighByte(Box::new(expr)))
    }

    pub fn low_byte(expr: Expr) -> Self {
        Self::new(ExprKind::LowByte(Box::new(expr)))
    }

    /// Builds a chain, or returns `first` unchanged when there are no operations.
    pub fn chain(first: Expr, rest: Vec<(Operator, Expr)>) -> Self {
        if rest.is_empty() {
            return first;
        }
        Self::new(ExprKind::Chain {
            first: Box::new(first),
            rest,
        })
    }

    pub fn kind(&self) -> &ExprKind {
        &self.kind
    }

    /// True if the value cannot depend on labels or the program counter.
    pub fn is_hardcoded(&self) -> bool {
        self.hardcoded
    }

    /// True if every symbol is bound and, when the program counter is used, `pc_known` holds.
    pub fn is_valid<E: SymbolLookup + ?Sized>(&self, env: &E, pc_known: bool) -> bool {
        if self.hardcoded {
            return true;
        }
        match &self.kind {
            ExprKind::Constant(_) => true,
            ExprKind::Symbol(symbol) => env.lookup(symbol).is_some(),
            ExprKind::ProgramCounter => pc_known,
            ExprKind::HighByte(expr) | ExprKind::LowByte(expr) => expr.is_valid(env, pc_known),
            ExprKind::Chain { first, rest } => {
                first.is_valid(env, pc_known)
                    && rest.iter().all(|(_, expr)| expr.is_valid(env, pc_known))
            }
        }
    }

    pub fn evaluate<E: SymbolLookup + ?Sized>(&self, env: &E) -> Result<i64, EvalError> {
        match &self.kind {
            ExprKind::Constant(value) => Ok(*value),
            ExprKind::Symbol(symbol) => env
                .lookup(symbol)
                .ok_or_else(|| EvalError::UnknownLabel(symbol.clone())),
            ExprKind::ProgramCounter => Ok(env.pc()),
            ExprKind::HighByte(expr) => Ok((expr.evaluate(env)? >> 8) & 0xff),
            ExprKind::LowByte(expr) => Ok(expr.evaluate(env)? & 0xff),
            ExprKind::Chain { first, rest } => {
                rest.iter().try_fold(first.evaluate(env)?, |acc, (op, expr)| {
                    op.apply(acc, expr.evaluate(env)?)
                })
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Constant(value) => write!(f, "{}", value),
            ExprKind::Symbol(symbol) => write!(f, "{}", symbol),
            ExprKind::ProgramCounter => write!(f, "^"),
            ExprKind::HighByte(expr) => write!(f, ">{}", expr),
            ExprKind::LowByte(expr) => write!(f, "<{}", expr),
            ExprKind::Chain { first, rest } => {
                write!(f, "[{}", first)?;
                for (op, expr) in rest {
                    write!(f, " {} {}", op, expr)?;
                }
                write!(f, "]")
            }
        }
    }
}
