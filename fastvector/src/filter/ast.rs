//! Filter predicate tree.
//!
//! A closed set of node kinds produced by the parser and consumed once by
//! the renderer. Attribute names are kept as written, on either side of a
//! comparison; they are resolved against the column allowlist only at
//! render time.

use crate::query::SqlValue;

pub use super::lexer::{ArithmeticOp, CompareOp};

/// Constant operand, always bound as a query parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
}

impl From<Literal> for SqlValue {
    fn from(literal: Literal) -> Self {
        match literal {
            Literal::Int(v) => SqlValue::Int(v),
            Literal::Float(v) => SqlValue::Float(v),
            Literal::Text(v) => SqlValue::Text(v),
            Literal::Bool(v) => SqlValue::Bool(v),
        }
    }
}

/// Value expression on either side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Attribute(String),
    Literal(Literal),
    Arithmetic {
        op: ArithmeticOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

impl Expr {
    pub fn attribute(name: impl Into<String>) -> Self {
        Self::Attribute(name.into())
    }

    pub fn arithmetic(op: ArithmeticOp, left: Expr, right: Expr) -> Self {
        Self::Arithmetic {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }
}

impl From<Literal> for Expr {
    fn from(literal: Literal) -> Self {
        Self::Literal(literal)
    }
}

/// What a comparison node tests its subject against.
#[derive(Debug, Clone, PartialEq)]
pub enum ComparisonTest {
    Compare { op: CompareOp, value: Expr },
    Like {
        pattern: String,
        case_insensitive: bool,
        negated: bool,
    },
    Between {
        low: Expr,
        high: Expr,
        negated: bool,
    },
    In { values: Vec<Expr>, negated: bool },
    IsNull { negated: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub subject: Expr,
    pub test: ComparisonTest,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Logical {
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

/// Binary spatial relationships, each a PostGIS function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpatialOp {
    Intersects,
    Disjoint,
    Contains,
    Within,
    Touches,
    Crosses,
    Overlaps,
    Equals,
}

impl SpatialOp {
    pub fn from_keyword(word: &str) -> Option<Self> {
        let op = match word.to_ascii_uppercase().as_str() {
            "INTERSECTS" => SpatialOp::Intersects,
            "DISJOINT" => SpatialOp::Disjoint,
            "CONTAINS" => SpatialOp::Contains,
            "WITHIN" => SpatialOp::Within,
            "TOUCHES" => SpatialOp::Touches,
            "CROSSES" => SpatialOp::Crosses,
            "OVERLAPS" => SpatialOp::Overlaps,
            "EQUALS" => SpatialOp::Equals,
            _ => return None,
        };
        Some(op)
    }

    pub fn function(self) -> &'static str {
        match self {
            SpatialOp::Intersects => "ST_Intersects",
            SpatialOp::Disjoint => "ST_Disjoint",
            SpatialOp::Contains => "ST_Contains",
            SpatialOp::Within => "ST_Within",
            SpatialOp::Touches => "ST_Touches",
            SpatialOp::Crosses => "ST_Crosses",
            SpatialOp::Overlaps => "ST_Overlaps",
            SpatialOp::Equals => "ST_Equals",
        }
    }
}

/// Right-hand side of a spatial predicate, in EPSG:4326.
#[derive(Debug, Clone, PartialEq)]
pub enum SpatialOperand {
    /// Canonical WKT rebuilt from tokens.
    Geometry(String),
    /// `[min_x, min_y, max_x, max_y]` from `BBOX` or an `ENVELOPE` literal.
    Envelope([f64; 4]),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Spatial {
    pub op: SpatialOp,
    pub attribute: String,
    pub operand: SpatialOperand,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Comparison(Comparison),
    Logical(Logical),
    Spatial(Spatial),
}

impl Predicate {
    pub fn compare(left: impl Into<Expr>, op: CompareOp, right: impl Into<Expr>) -> Self {
        Self::Comparison(Comparison {
            subject: left.into(),
            test: ComparisonTest::Compare {
                op,
                value: right.into(),
            },
        })
    }

    pub fn and(predicates: Vec<Self>) -> Self {
        Self::Logical(Logical::And(predicates))
    }

    pub fn or(predicates: Vec<Self>) -> Self {
        Self::Logical(Logical::Or(predicates))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(predicate: Self) -> Self {
        Self::Logical(Logical::Not(Box::new(predicate)))
    }
}
