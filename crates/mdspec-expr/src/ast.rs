//! Expression syntax tree.

use serde_json::Value;

/// Binary operators, loosest binding first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// `||`
    Or,
    /// `&&`
    And,
    /// `==`
    Eq,
    /// `!=`
    NotEq,
    /// `<`
    Lt,
    /// `<=`
    LtEq,
    /// `>`
    Gt,
    /// `>=`
    GtEq,
    /// `in`
    In,
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Rem,
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `!`
    Not,
    /// `-`
    Neg,
}

/// Parsed expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Literal scalar
    Literal(Value),
    /// Variable reference
    Ident(String),
    /// `[a, b, c]`
    List(Vec<Expr>),
    /// `{k: v}`
    Map(Vec<(Expr, Expr)>),
    /// `target.field`
    Member {
        /// Receiver
        target: Box<Expr>,
        /// Field name
        field: String,
    },
    /// `target[index]`
    Index {
        /// Receiver
        target: Box<Expr>,
        /// Index or key
        index: Box<Expr>,
    },
    /// `name(args)`
    Call {
        /// Function name
        function: String,
        /// Arguments
        args: Vec<Expr>,
    },
    /// `target.method(args)`
    Method {
        /// Receiver
        target: Box<Expr>,
        /// Method name
        method: String,
        /// Arguments
        args: Vec<Expr>,
    },
    /// `list.exists(var, predicate)` and friends
    Comprehension {
        /// Receiver list or map
        target: Box<Expr>,
        /// Macro kind
        kind: MacroKind,
        /// Loop variable
        var: String,
        /// Body evaluated per element
        body: Box<Expr>,
    },
    /// Unary operation
    Unary {
        /// Operator
        op: UnaryOp,
        /// Operand
        operand: Box<Expr>,
    },
    /// Binary operation
    Binary {
        /// Operator
        op: BinaryOp,
        /// Left operand
        left: Box<Expr>,
        /// Right operand
        right: Box<Expr>,
    },
    /// `cond ? then : otherwise`
    Conditional {
        /// Condition
        cond: Box<Expr>,
        /// Value when true
        then: Box<Expr>,
        /// Value when false
        otherwise: Box<Expr>,
    },
}

/// List macros that bind a loop variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacroKind {
    /// True if any element satisfies the predicate
    Exists,
    /// True if every element satisfies the predicate
    All,
    /// Elements satisfying the predicate
    Filter,
    /// Body applied to every element
    Map,
}

impl MacroKind {
    /// Resolve a method name to a macro.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "exists" => Some(Self::Exists),
            "all" => Some(Self::All),
            "filter" => Some(Self::Filter),
            "map" => Some(Self::Map),
            _ => None,
        }
    }
}
