//! Recursive-descent parser for filter expressions.
//!
//! ```text
//! expr      := or
//! or        := and ( OR and )*
//! and       := not ( AND not )*
//! not       := NOT not | primary
//! primary   := '(' expr ')' | spatial | predicate
//! predicate := operand cmp operand
//!            | operand [NOT] LIKE string | operand [NOT] ILIKE string
//!            | operand [NOT] BETWEEN operand AND operand
//!            | operand [NOT] IN '(' operand ( ',' operand )* ')'
//!            | operand IS [NOT] NULL
//! operand   := product ( ('+' | '-') product )*
//! product   := factor ( ('*' | '/') factor )*
//! factor    := '(' operand ')' | attr | value
//! spatial   := SPATIALOP '(' attr ',' ( wkt | envelope ) ')'
//!            | BBOX '(' attr ',' num ',' num ',' num ',' num [ ',' string ] ')'
//! envelope  := ENVELOPE '(' num [','] num [','] num [','] num ')'
//! ```
//!
//! A parenthesis at the start of a predicate opens an operand when the
//! token after its closing parenthesis continues a comparison, as in
//! `(a + b) > 3`; otherwise it groups predicates.

use super::ast::{
    ArithmeticOp, Comparison, ComparisonTest, Expr, Literal, Predicate, Spatial, SpatialOp,
    SpatialOperand,
};
use super::lexer::{tokenize, Token, TokenKind};
use super::FilterError;

/// Nesting limit for parentheses, `NOT` chains, arithmetic and geometry rings.
pub const MAX_DEPTH: usize = 64;

const GEOMETRY_TYPES: &[&str] = &[
    "POINT",
    "LINESTRING",
    "POLYGON",
    "MULTIPOINT",
    "MULTILINESTRING",
    "MULTIPOLYGON",
    "GEOMETRYCOLLECTION",
];

/// Keywords that never name an attribute in operand position.
const RESERVED: &[&str] = &["AND", "OR", "NOT"];

/// Keywords that may follow the subject of a predicate.
const PREDICATE_KEYWORDS: &[&str] = &["IS", "NOT", "LIKE", "ILIKE", "BETWEEN", "IN"];

/// Parse `input` into a predicate tree.
pub fn parse(input: &str) -> Result<Predicate, FilterError> {
    let mut parser = Parser {
        tokens: tokenize(input)?,
        pos: 0,
        depth: 0,
    };
    let predicate = parser.or()?;
    let trailing = parser.peek();
    if trailing.kind != TokenKind::Eof {
        return Err(FilterError::syntax(
            trailing.position,
            "unexpected trailing input",
        ));
    }
    Ok(predicate)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        // The token list always ends with Eof and `advance` never moves past it.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_next(&self) -> &Token {
        &self.tokens[(self.pos + 1).min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.peek().is_keyword(keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), FilterError> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(self.error(format!("expected {keyword}")))
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<(), FilterError> {
        if self.peek().kind == kind {
            self.advance();
            Ok(())
        } else {
            Err(self.error(format!("expected {what}")))
        }
    }

    fn error(&self, message: impl Into<String>) -> FilterError {
        FilterError::syntax(self.peek().position, message)
    }

    fn enter(&mut self) -> Result<(), FilterError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(self.error("expression nested too deeply"));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn or(&mut self) -> Result<Predicate, FilterError> {
        let mut terms = vec![self.and()?];
        while self.eat_keyword("OR") {
            terms.push(self.and()?);
        }
        Ok(collapse(terms, Predicate::or))
    }

    fn and(&mut self) -> Result<Predicate, FilterError> {
        let mut terms = vec![self.not()?];
        while self.eat_keyword("AND") {
            terms.push(self.not()?);
        }
        Ok(collapse(terms, Predicate::and))
    }

    fn not(&mut self) -> Result<Predicate, FilterError> {
        if self.eat_keyword("NOT") {
            self.enter()?;
            let inner = self.not()?;
            self.leave();
            return Ok(Predicate::not(inner));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Predicate, FilterError> {
        if self.peek().kind == TokenKind::LParen && !self.opens_operand() {
            self.advance();
            self.enter()?;
            let inner = self.or()?;
            self.leave();
            self.expect(TokenKind::RParen, "')'")?;
            return Ok(inner);
        }

        // A word directly followed by '(' is a function; otherwise an attribute.
        if let TokenKind::Word(word) = &self.peek().kind {
            if self.peek_next().kind == TokenKind::LParen {
                if word.eq_ignore_ascii_case("BBOX") {
                    return self.bbox();
                }
                if let Some(op) = SpatialOp::from_keyword(word) {
                    return self.spatial(op);
                }
                return Err(self.error(format!("unknown function '{word}'")));
            }
        }

        self.predicate()
    }

    /// Whether the parenthesis at the cursor is closed by one that is
    /// followed by an operator or a predicate keyword.
    fn opens_operand(&self) -> bool {
        let mut open = 0usize;
        for (index, token) in self.tokens.iter().enumerate().skip(self.pos) {
            match token.kind {
                TokenKind::LParen => open += 1,
                TokenKind::RParen => {
                    open -= 1;
                    if open == 0 {
                        return self.tokens.get(index + 1).is_some_and(|next| {
                            matches!(next.kind, TokenKind::Op(_) | TokenKind::Arith(_))
                                || PREDICATE_KEYWORDS.iter().any(|k| next.is_keyword(k))
                        });
                    }
                }
                TokenKind::Eof => break,
                _ => {}
            }
        }
        false
    }

    fn attribute(&mut self) -> Result<String, FilterError> {
        let token = self.advance();
        match token.kind {
            TokenKind::Word(name) | TokenKind::QuotedIdent(name) => Ok(name),
            _ => Err(FilterError::syntax(token.position, "expected attribute name")),
        }
    }

    fn predicate(&mut self) -> Result<Predicate, FilterError> {
        let subject = self.operand()?;

        if let TokenKind::Op(op) = self.peek().kind {
            self.advance();
            let value = self.operand()?;
            return Ok(comparison(subject, ComparisonTest::Compare { op, value }));
        }

        if self.eat_keyword("IS") {
            let negated = self.eat_keyword("NOT");
            self.expect_keyword("NULL")?;
            return Ok(comparison(subject, ComparisonTest::IsNull { negated }));
        }

        let negated = self.eat_keyword("NOT");
        let test = if self.eat_keyword("LIKE") {
            ComparisonTest::Like {
                pattern: self.string()?,
                case_insensitive: false,
                negated,
            }
        } else if self.eat_keyword("ILIKE") {
            ComparisonTest::Like {
                pattern: self.string()?,
                case_insensitive: true,
                negated,
            }
        } else if self.eat_keyword("BETWEEN") {
            let low = self.operand()?;
            self.expect_keyword("AND")?;
            let high = self.operand()?;
            ComparisonTest::Between { low, high, negated }
        } else if self.eat_keyword("IN") {
            self.expect(TokenKind::LParen, "'('")?;
            let mut values = vec![self.operand()?];
            while self.peek().kind == TokenKind::Comma {
                self.advance();
                values.push(self.operand()?);
            }
            self.expect(TokenKind::RParen, "')'")?;
            ComparisonTest::In { values, negated }
        } else if negated {
            return Err(self.error("expected LIKE, ILIKE, BETWEEN or IN after NOT"));
        } else {
            return Err(self.error("expected comparison operator"));
        };

        Ok(comparison(subject, test))
    }

    fn operand(&mut self) -> Result<Expr, FilterError> {
        self.chain(
            |op| matches!(op, ArithmeticOp::Add | ArithmeticOp::Sub),
            Self::product,
        )
    }

    fn product(&mut self) -> Result<Expr, FilterError> {
        self.chain(
            |op| matches!(op, ArithmeticOp::Mul | ArithmeticOp::Div),
            Self::factor,
        )
    }

    /// Left-associative run of `next` joined by operators `accepts` allows.
    /// Each operator adds a level of nesting to the tree.
    fn chain(
        &mut self,
        accepts: fn(ArithmeticOp) -> bool,
        next: fn(&mut Self) -> Result<Expr, FilterError>,
    ) -> Result<Expr, FilterError> {
        let base = self.depth;
        let mut left = next(self)?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Arith(op) if accepts(op) => op,
                _ => break,
            };
            self.advance();
            self.enter()?;
            let right = next(self)?;
            left = Expr::arithmetic(op, left, right);
        }
        self.depth = base;
        Ok(left)
    }

    fn factor(&mut self) -> Result<Expr, FilterError> {
        match &self.peek().kind {
            TokenKind::LParen => {
                self.advance();
                self.enter()?;
                let inner = self.operand()?;
                self.leave();
                self.expect(TokenKind::RParen, "')'")?;
                Ok(inner)
            }
            TokenKind::Word(word)
                if !is_bool(word) && !RESERVED.iter().any(|k| word.eq_ignore_ascii_case(k)) =>
            {
                self.attribute().map(Expr::Attribute)
            }
            TokenKind::QuotedIdent(_) => self.attribute().map(Expr::Attribute),
            _ => self.literal().map(Expr::Literal),
        }
    }

    fn literal(&mut self) -> Result<Literal, FilterError> {
        if let Some((text, position)) = self.number() {
            return number_literal(&text, position);
        }
        let token = self.advance();
        match token.kind {
            TokenKind::Str(text) => Ok(Literal::Text(text)),
            TokenKind::Word(word) if word.eq_ignore_ascii_case("TRUE") => Ok(Literal::Bool(true)),
            TokenKind::Word(word) if word.eq_ignore_ascii_case("FALSE") => {
                Ok(Literal::Bool(false))
            }
            _ => Err(FilterError::syntax(token.position, "expected a value")),
        }
    }

    /// Consume `[+|-] number`, returning its signed text and position.
    fn number(&mut self) -> Option<(String, usize)> {
        let position = self.peek().position;
        let sign = match &self.peek().kind {
            TokenKind::Number(text) => {
                let text = text.clone();
                self.advance();
                return Some((text, position));
            }
            TokenKind::Arith(ArithmeticOp::Sub) => "-",
            TokenKind::Arith(ArithmeticOp::Add) => "",
            _ => return None,
        };
        let TokenKind::Number(digits) = self.peek_next().kind.clone() else {
            return None;
        };
        self.pos += 2;
        Some((format!("{sign}{digits}"), position))
    }

    fn at_number(&self) -> bool {
        match self.peek().kind {
            TokenKind::Number(_) => true,
            TokenKind::Arith(ArithmeticOp::Add | ArithmeticOp::Sub) => {
                matches!(self.peek_next().kind, TokenKind::Number(_))
            }
            _ => false,
        }
    }

    fn string(&mut self) -> Result<String, FilterError> {
        let token = self.advance();
        match token.kind {
            TokenKind::Str(text) => Ok(text),
            _ => Err(FilterError::syntax(token.position, "expected a quoted string")),
        }
    }

    fn float(&mut self) -> Result<f64, FilterError> {
        match self.number() {
            Some((text, position)) => parse_finite(&text, position),
            None => Err(self.error("expected a number")),
        }
    }

    fn spatial(&mut self, op: SpatialOp) -> Result<Predicate, FilterError> {
        self.advance();
        self.expect(TokenKind::LParen, "'('")?;
        let attribute = self.attribute()?;
        self.expect(TokenKind::Comma, "','")?;
        let operand = if self.peek().is_keyword("ENVELOPE") {
            self.envelope()?
        } else {
            SpatialOperand::Geometry(self.geometry()?)
        };
        self.expect(TokenKind::RParen, "')'")?;
        Ok(Predicate::Spatial(Spatial {
            op,
            attribute,
            operand,
        }))
    }

    /// `ENVELOPE(west, east, north, south)`; the commas are optional.
    /// Corners are normalized so either latitude order works.
    fn envelope(&mut self) -> Result<SpatialOperand, FilterError> {
        self.advance();
        self.expect(TokenKind::LParen, "'('")?;
        let mut edges = [0.0; 4];
        for (index, slot) in edges.iter_mut().enumerate() {
            if index > 0 && self.peek().kind == TokenKind::Comma {
                self.advance();
            }
            *slot = self.float()?;
        }
        self.expect(TokenKind::RParen, "')'")?;
        let [x1, x2, y1, y2] = edges;
        Ok(SpatialOperand::Envelope([
            x1.min(x2),
            y1.min(y2),
            x1.max(x2),
            y1.max(y2),
        ]))
    }

    fn bbox(&mut self) -> Result<Predicate, FilterError> {
        self.advance();
        self.expect(TokenKind::LParen, "'('")?;
        let attribute = self.attribute()?;
        let mut envelope = [0.0; 4];
        for slot in &mut envelope {
            self.expect(TokenKind::Comma, "','")?;
            *slot = self.float()?;
        }
        // Optional CRS; coordinates are always taken as EPSG:4326.
        if self.peek().kind == TokenKind::Comma {
            self.advance();
            self.string()?;
        }
        self.expect(TokenKind::RParen, "')'")?;
        Ok(Predicate::Spatial(Spatial {
            op: SpatialOp::Intersects,
            attribute,
            operand: SpatialOperand::Envelope(envelope),
        }))
    }

    /// Parse a WKT geometry and return it re-serialized.
    fn geometry(&mut self) -> Result<String, FilterError> {
        let token = self.advance();
        let tag = match &token.kind {
            TokenKind::Word(word) => word.to_ascii_uppercase(),
            _ => return Err(FilterError::syntax(token.position, "expected WKT geometry")),
        };
        if !GEOMETRY_TYPES.contains(&tag.as_str()) {
            return Err(FilterError::syntax(
                token.position,
                format!("unsupported geometry type '{tag}'"),
            ));
        }

        let mut wkt = tag.clone();
        for dims in ["ZM", "Z", "M"] {
            if self.eat_keyword(dims) {
                wkt.push(' ');
                wkt.push_str(dims);
                break;
            }
        }

        if self.eat_keyword("EMPTY") {
            wkt.push_str(" EMPTY");
            return Ok(wkt);
        }

        self.enter()?;
        if tag == "GEOMETRYCOLLECTION" {
            self.expect(TokenKind::LParen, "'('")?;
            wkt.push('(');
            wkt.push_str(&self.geometry()?);
            while self.peek().kind == TokenKind::Comma {
                self.advance();
                wkt.push(',');
                wkt.push_str(&self.geometry()?);
            }
            self.expect(TokenKind::RParen, "')'")?;
            wkt.push(')');
        } else {
            self.coordinate_group(&mut wkt)?;
        }
        self.leave();
        Ok(wkt)
    }

    /// `'(' (group | coordinate) (',' (group | coordinate))* ')'`
    fn coordinate_group(&mut self, out: &mut String) -> Result<(), FilterError> {
        self.expect(TokenKind::LParen, "'('")?;
        out.push('(');
        loop {
            if self.peek().kind == TokenKind::LParen {
                self.enter()?;
                self.coordinate_group(out)?;
                self.leave();
            } else {
                self.coordinate(out)?;
            }
            if self.peek().kind != TokenKind::Comma {
                break;
            }
            self.advance();
            out.push(',');
        }
        self.expect(TokenKind::RParen, "')'")?;
        out.push(')');
        Ok(())
    }

    /// Two to four ordinates separated by whitespace.
    fn coordinate(&mut self, out: &mut String) -> Result<(), FilterError> {
        let mut count = 0;
        while self.at_number() {
            let value = self.float()?;
            if count > 0 {
                out.push(' ');
            }
            out.push_str(&value.to_string());
            count += 1;
        }
        if !(2..=4).contains(&count) {
            return Err(self.error("expected a coordinate of 2 to 4 numbers"));
        }
        Ok(())
    }
}

fn comparison(subject: Expr, test: ComparisonTest) -> Predicate {
    Predicate::Comparison(Comparison { subject, test })
}

fn is_bool(word: &str) -> bool {
    word.eq_ignore_ascii_case("TRUE") || word.eq_ignore_ascii_case("FALSE")
}

/// A single term stays as is; several are joined by `combine`.
fn collapse(mut terms: Vec<Predicate>, combine: fn(Vec<Predicate>) -> Predicate) -> Predicate {
    if terms.len() == 1 {
        terms.remove(0)
    } else {
        combine(terms)
    }
}

fn number_literal(text: &str, position: usize) -> Result<Literal, FilterError> {
    if text.contains(['.', 'e', 'E']) {
        return parse_finite(text, position).map(Literal::Float);
    }
    text.parse::<i64>()
        .map(Literal::Int)
        .map_err(|_| FilterError::syntax(position, "integer out of range"))
}

fn parse_finite(text: &str, position: usize) -> Result<f64, FilterError> {
    match text.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(FilterError::syntax(position, "number out of range")),
    }
}
