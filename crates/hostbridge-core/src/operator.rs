//! Operator hooks a bridged class can implement.
//!
//! Binding code registers one handler per operator on a class; the dispatch
//! adapter resolves it on the first operand's dispatch chain.

use std::fmt;

/// Binary operators routed through a bridged object's type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// `+` addition
    Add,
    /// `-` subtraction
    Sub,
    /// `*` multiplication
    Mul,
    /// `/` division
    Div,
    /// `<` less than
    Lt,
    /// `<=` less or equal
    Le,
    /// `==` equality
    Eq,
}

impl Operator {
    /// All operators, in hook registration order.
    pub const ALL: [Operator; 7] = [
        Operator::Add,
        Operator::Sub,
        Operator::Mul,
        Operator::Div,
        Operator::Lt,
        Operator::Le,
        Operator::Eq,
    ];

    /// Name binding code uses for the handler in a class members table.
    pub const fn member_name(&self) -> &'static str {
        match self {
            Operator::Add => ".add",
            Operator::Sub => ".sub",
            Operator::Mul => ".mul",
            Operator::Div => ".div",
            Operator::Lt => ".lt",
            Operator::Le => ".le",
            Operator::Eq => ".eq",
        }
    }

    /// Source symbol, for diagnostics.
    pub const fn symbol(&self) -> &'static str {
        match self {
            Operator::Add => "+",
            Operator::Sub => "-",
            Operator::Mul => "*",
            Operator::Div => "/",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Eq => "==",
        }
    }

    /// Whether a missing handler is tolerated.
    ///
    /// Equality must be total over every value, so a missing `==` handler
    /// means "not equal" instead of an error.
    pub const fn is_total(&self) -> bool {
        matches!(self, Operator::Eq)
    }

    /// Parse a member name such as `".add"`.
    pub fn from_member_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.member_name() == name)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}
