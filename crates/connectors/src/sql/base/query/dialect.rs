//! Database-specific SQL syntax.

use model::core::data_type::ColumnType;

pub trait Dialect: Send + Sync {
    /// Wraps an identifier (like a table or column name) in the correct
    /// quotation marks for the dialect, escaping embedded quotes.
    fn quote_identifier(&self, ident: &str) -> String;

    /// Returns the placeholder for the zero-based parameter `index`.
    fn get_placeholder(&self, index: usize) -> String;

    /// Renders a column type as the dialect's SQL type name.
    fn render_column_type(&self, column_type: ColumnType) -> String;

    /// Returns the name of the dialect (e.g., "PostgreSQL").
    fn name(&self) -> String;
}

#[derive(Debug, Clone, Default)]
pub struct Postgres;

impl Dialect for Postgres {
    fn quote_identifier(&self, ident: &str) -> String {
        format!(r#""{}""#, ident.replace('"', r#""""#))
    }

    fn get_placeholder(&self, index: usize) -> String {
        // PostgreSQL uses $1, $2, etc.
        format!("${}", index + 1)
    }

    fn render_column_type(&self, column_type: ColumnType) -> String {
        column_type.postgres_name().to_string()
    }

    fn name(&self) -> String {
        "PostgreSQL".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_postgres_quoting_and_placeholders() {
        let dialect = Postgres;
        assert_eq!(dialect.quote_identifier("updated_at"), r#""updated_at""#);
        assert_eq!(dialect.quote_identifier(r#"we"ird"#), r#""we""ird""#);
        assert_eq!(dialect.get_placeholder(0), "$1");
        assert_eq!(dialect.get_placeholder(9), "$10");
        assert_eq!(dialect.render_column_type(ColumnType::Range), "TSRANGE");
    }
}
