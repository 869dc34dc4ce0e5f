//! Filter expression translation.
//!
//! Translates a CQL-style filter (the `cql_filter` query parameter) into a
//! SQL boolean expression that is AND-ed onto the tile query:
//!
//! ```text
//! "pop > 1000 AND name LIKE 'A%'"
//!     -> (t."pop" > $1::bigint) AND (t."name" LIKE $2::text)
//!        params: [Int(1000), Text("A%")]
//! ```
//!
//! Either side of a comparison may be an attribute, a literal or an
//! arithmetic expression of both, so `1000 < pop` and `pop / area > 100`
//! translate as written.
//!
//! Column names must appear in the table's [`ColumnSet`]; spatial
//! predicates must target its geometry column. Anything else is
//! [`FilterError::UnknownField`] and no SQL is produced.

pub mod ast;
mod error;
mod lexer;
mod parser;
mod render;

pub use error::FilterError;
pub use parser::{parse, MAX_DEPTH};
pub use render::render;

use crate::catalog::ColumnSet;
use crate::query::SqlFragment;

/// Translate `expression` into a SQL fragment.
///
/// A blank expression yields `None`: there is nothing to AND onto the
/// query. Placeholders in the fragment are numbered from `$1`.
pub fn translate(
    expression: &str,
    columns: &ColumnSet,
) -> Result<Option<SqlFragment>, FilterError> {
    if expression.trim().is_empty() {
        return Ok(None);
    }
    let predicate = parse(expression)?;
    render(&predicate, columns).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::SqlValue;
    use crate::tile::Identifier;
    use proptest::prelude::*;

    fn columns() -> ColumnSet {
        let names = ["id", "name", "pop", "area", "kind"];
        ColumnSet::new(
            Identifier::parse("geom").unwrap(),
            names.iter().map(|n| Identifier::parse(n).unwrap()).collect(),
        )
    }

    fn translate_ok(expression: &str) -> SqlFragment {
        translate(expression, &columns()).unwrap().unwrap()
    }

    #[test]
    fn test_blank_expression_yields_nothing() {
        assert_eq!(translate("", &columns()).unwrap(), None);
        assert_eq!(translate("  \t ", &columns()).unwrap(), None);
    }

    #[test]
    fn test_comparison() {
        let fragment = translate_ok("pop > 1000");
        assert_eq!(fragment.sql, "t.\"pop\" > $1::bigint");
        assert_eq!(fragment.params, vec![SqlValue::Int(1000)]);
    }

    #[test]
    fn test_logical_combination() {
        let fragment = translate_ok("pop > 1000 AND NOT name LIKE 'A%' OR kind IS NULL");
        assert_eq!(
            fragment.sql,
            "((t.\"pop\" > $1::bigint) AND (NOT (t.\"name\" LIKE $2::text))) OR (t.\"kind\" IS NULL)"
        );
        assert_eq!(
            fragment.params,
            vec![SqlValue::Int(1000), SqlValue::Text("A%".into())]
        );
    }

    #[test]
    fn test_between_and_in() {
        let fragment = translate_ok("pop NOT BETWEEN 1 AND 2.5 AND kind IN ('a', 'b')");
        assert_eq!(
            fragment.sql,
            "(t.\"pop\" NOT BETWEEN $1::bigint AND $2::double precision) AND (t.\"kind\" IN ($3::text, $4::text))"
        );
        assert_eq!(fragment.params.len(), 4);
    }

    #[test]
    fn test_quoted_attribute_resolves_to_column() {
        let fragment = translate_ok("\"name\" ILIKE 'park%'");
        assert_eq!(fragment.sql, "t.\"name\" ILIKE $1::text");
    }

    #[test]
    fn test_spatial_predicate() {
        let fragment = translate_ok("INTERSECTS(geom, POINT(1 2))");
        assert_eq!(
            fragment.sql,
            "ST_Intersects(ST_Transform(t.\"geom\", 4326), ST_GeomFromText($1::text, 4326))"
        );
        assert_eq!(fragment.params, vec![SqlValue::Text("POINT(1 2)".into())]);
    }

    #[test]
    fn test_bbox() {
        let fragment = translate_ok("BBOX(geom, -1, -2, 3, 4)");
        assert_eq!(
            fragment.sql,
            "ST_Intersects(ST_Transform(t.\"geom\", 4326), ST_MakeEnvelope($1::double precision, $2::double precision, $3::double precision, $4::double precision, 4326))"
        );
        assert_eq!(
            fragment.params,
            vec![
                SqlValue::Float(-1.0),
                SqlValue::Float(-2.0),
                SqlValue::Float(3.0),
                SqlValue::Float(4.0)
            ]
        );
    }

    #[test]
    fn test_attribute_to_attribute() {
        let fragment = translate_ok("name = kind");
        assert_eq!(fragment.sql, "t.\"name\" = t.\"kind\"");
        assert!(fragment.params.is_empty());
    }

    #[test]
    fn test_literal_before_attribute() {
        let fragment = translate_ok("1000 < pop");
        assert_eq!(fragment.sql, "$1::bigint < t.\"pop\"");
        assert_eq!(fragment.params, vec![SqlValue::Int(1000)]);
    }

    #[test]
    fn test_arithmetic() {
        let fragment = translate_ok("pop / area > 100");
        assert_eq!(fragment.sql, "(t.\"pop\" / t.\"area\") > $1::bigint");
        assert_eq!(fragment.params, vec![SqlValue::Int(100)]);

        let fragment = translate_ok("pop BETWEEN area * 2 AND area * 2.5 - 1");
        assert_eq!(
            fragment.sql,
            "t.\"pop\" BETWEEN (t.\"area\" * $1::bigint) AND ((t.\"area\" * $2::double precision) - $3::bigint)"
        );
        assert_eq!(
            fragment.params,
            vec![SqlValue::Int(2), SqlValue::Float(2.5), SqlValue::Int(1)]
        );
    }

    #[test]
    fn test_envelope() {
        let fragment = translate_ok("INTERSECTS(geom, ENVELOPE(-1, 3, 4, -2))");
        assert_eq!(
            fragment.sql,
            "ST_Intersects(ST_Transform(t.\"geom\", 4326), ST_MakeEnvelope($1::double precision, $2::double precision, $3::double precision, $4::double precision, 4326))"
        );
        assert_eq!(
            fragment.params,
            vec![
                SqlValue::Float(-1.0),
                SqlValue::Float(-2.0),
                SqlValue::Float(3.0),
                SqlValue::Float(4.0)
            ]
        );
    }

    #[test]
    fn test_unknown_field() {
        assert_eq!(
            translate("secret = 1", &columns()).unwrap_err(),
            FilterError::UnknownField("secret".into())
        );
        // Case matters: the catalog name is "name".
        assert_eq!(
            translate("NAME = 'x'", &columns()).unwrap_err(),
            FilterError::UnknownField("NAME".into())
        );
        assert_eq!(
            translate("pop > secret * 2", &columns()).unwrap_err(),
            FilterError::UnknownField("secret".into())
        );
    }

    #[test]
    fn test_spatial_on_non_geometry_column() {
        assert_eq!(
            translate("WITHIN(name, POINT(0 0))", &columns()).unwrap_err(),
            FilterError::UnknownField("name".into())
        );
    }

    #[test]
    fn test_geometry_column_is_not_comparable() {
        assert_eq!(
            translate("geom IS NULL", &columns()).unwrap_err(),
            FilterError::UnknownField("geom".into())
        );
    }

    #[test]
    fn test_injection_stays_in_parameter() {
        let payload = "x'); DROP TABLE parks; --";
        let expression = format!("name = '{}'", payload.replace('\'', "''"));
        let fragment = translate_ok(&expression);
        assert_eq!(fragment.sql, "t.\"name\" = $1::text");
        assert_eq!(fragment.params, vec![SqlValue::Text(payload.into())]);
    }

    #[test]
    fn test_quoted_identifier_injection_is_unknown_field() {
        let err = translate("\"name\"\" = 1; --\" = 1", &columns()).unwrap_err();
        assert!(matches!(err, FilterError::UnknownField(_)));
    }

    #[test]
    fn test_syntax_error() {
        let err = translate("pop >> 3", &columns()).unwrap_err();
        assert!(matches!(err, FilterError::InvalidSyntax { position: 5, .. }));
    }

    proptest! {
        #[test]
        fn prop_unknown_field_never_yields_sql(
            name in "[a-z_][a-z0-9_]{0,20}",
            value in any::<i32>(),
        ) {
            prop_assume!(!columns().contains(&name) && name != "geom");
            prop_assume!(!["and", "or", "not", "true", "false", "bbox"].contains(&name.as_str()));
            let result = translate(&format!("{name} = {value}"), &columns());
            prop_assert_eq!(result, Err(FilterError::UnknownField(name.clone())));
            let result = translate(&format!("{value} = {name}"), &columns());
            prop_assert_eq!(result, Err(FilterError::UnknownField(name)));
        }

        #[test]
        fn prop_string_literals_never_reach_sql(text in "[^\u{0}]{0,40}") {
            let expression = format!("name = '{}'", text.replace('\'', "''"));
            let fragment = translate(&expression, &columns()).unwrap().unwrap();
            prop_assert_eq!(fragment.sql, "t.\"name\" = $1::text");
            prop_assert_eq!(fragment.params, vec![SqlValue::Text(text)]);
        }
    }
}
