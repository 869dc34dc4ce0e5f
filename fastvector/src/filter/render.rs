//! Render a predicate tree as a SQL boolean expression.
//!
//! One render function per node kind. Attribute names are emitted only as
//! the allowlisted, quoted column; every literal becomes a placeholder.
//! Arithmetic is parenthesized so the tree's grouping survives in SQL.

use crate::catalog::ColumnSet;
use crate::query::{placeholder, SqlFragment, SqlValue, TABLE_ALIAS};

use super::ast::{
    Comparison, ComparisonTest, Expr, Literal, Logical, Predicate, Spatial, SpatialOperand,
};
use super::FilterError;

/// Render `predicate` against `columns`; placeholders are numbered from `$1`.
pub fn render(predicate: &Predicate, columns: &ColumnSet) -> Result<SqlFragment, FilterError> {
    let mut renderer = Renderer {
        columns,
        params: Vec::new(),
    };
    let sql = renderer.predicate(predicate)?;
    Ok(SqlFragment {
        sql,
        params: renderer.params,
    })
}

struct Renderer<'a> {
    columns: &'a ColumnSet,
    params: Vec<SqlValue>,
}

impl Renderer<'_> {
    fn predicate(&mut self, predicate: &Predicate) -> Result<String, FilterError> {
        match predicate {
            Predicate::Comparison(comparison) => self.comparison(comparison),
            Predicate::Logical(logical) => self.logical(logical),
            Predicate::Spatial(spatial) => self.spatial(spatial),
        }
    }

    fn comparison(&mut self, comparison: &Comparison) -> Result<String, FilterError> {
        let subject = self.expr(&comparison.subject)?;
        let not = |negated: bool| if negated { "NOT " } else { "" };

        let sql = match &comparison.test {
            ComparisonTest::Compare { op, value } => {
                format!("{subject} {} {}", op.as_sql(), self.expr(value)?)
            }
            ComparisonTest::Like {
                pattern,
                case_insensitive,
                negated,
            } => {
                let keyword = if *case_insensitive { "ILIKE" } else { "LIKE" };
                let value = self.bind(SqlValue::Text(pattern.clone()));
                format!("{subject} {}{keyword} {value}", not(*negated))
            }
            ComparisonTest::Between { low, high, negated } => {
                let low = self.expr(low)?;
                let high = self.expr(high)?;
                format!("{subject} {}BETWEEN {low} AND {high}", not(*negated))
            }
            ComparisonTest::In { values, negated } => {
                let list = values
                    .iter()
                    .map(|v| self.expr(v))
                    .collect::<Result<Vec<_>, _>>()?;
                format!("{subject} {}IN ({})", not(*negated), list.join(", "))
            }
            ComparisonTest::IsNull { negated } => {
                format!("{subject} IS {}NULL", not(*negated))
            }
        };
        Ok(sql)
    }

    fn expr(&mut self, expr: &Expr) -> Result<String, FilterError> {
        match expr {
            Expr::Attribute(name) => self.column(name),
            Expr::Literal(literal) => Ok(self.bind_literal(literal)),
            Expr::Arithmetic { op, left, right } => {
                let left = self.expr(left)?;
                let right = self.expr(right)?;
                Ok(format!("({left} {} {right})", op.as_sql()))
            }
        }
    }

    fn logical(&mut self, logical: &Logical) -> Result<String, FilterError> {
        match logical {
            Logical::And(terms) => self.join(terms, " AND "),
            Logical::Or(terms) => self.join(terms, " OR "),
            Logical::Not(inner) => Ok(format!("NOT ({})", self.predicate(inner)?)),
        }
    }

    fn join(&mut self, terms: &[Predicate], separator: &str) -> Result<String, FilterError> {
        let mut parts = Vec::with_capacity(terms.len());
        for term in terms {
            parts.push(format!("({})", self.predicate(term)?));
        }
        Ok(parts.join(separator))
    }

    fn spatial(&mut self, spatial: &Spatial) -> Result<String, FilterError> {
        let geometry = self.columns.geometry_column();
        if spatial.attribute != geometry.as_str() {
            return Err(FilterError::UnknownField(spatial.attribute.clone()));
        }
        let column = format!("ST_Transform({}.{}, 4326)", TABLE_ALIAS, geometry.quoted());

        let operand = match &spatial.operand {
            SpatialOperand::Geometry(wkt) => {
                format!("ST_GeomFromText({}, 4326)", self.bind(SqlValue::Text(wkt.clone())))
            }
            SpatialOperand::Envelope(bounds) => {
                let corners: Vec<String> = bounds
                    .iter()
                    .map(|v| self.bind(SqlValue::Float(*v)))
                    .collect();
                format!("ST_MakeEnvelope({}, 4326)", corners.join(", "))
            }
        };

        Ok(format!("{}({column}, {operand})", spatial.op.function()))
    }

    fn column(&self, attribute: &str) -> Result<String, FilterError> {
        self.columns
            .get(attribute)
            .map(|c| format!("{}.{}", TABLE_ALIAS, c.quoted()))
            .ok_or_else(|| FilterError::UnknownField(attribute.to_string()))
    }

    fn bind_literal(&mut self, literal: &Literal) -> String {
        self.bind(literal.clone().into())
    }

    fn bind(&mut self, value: SqlValue) -> String {
        let rendered = placeholder(self.params.len() + 1, &value);
        self.params.push(value);
        rendered
    }
}
