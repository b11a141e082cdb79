use crate::sql::base::{
    query::dialect::Dialect,
    requests::{ColumnDef, FetchRowsRequest, UpsertStatement},
};
use model::{core::value::Value, pagination::cursor::Watermark};

pub const COUNT_ALIAS: &str = "__count";
pub const MAX_ALIAS: &str = "__max";

/// Renders every statement the SQL connector issues. All table references
/// are qualified with the connector's schema.
pub struct QueryGenerator<'a> {
    dialect: &'a dyn Dialect,
    schema: &'a str,
}

impl<'a> QueryGenerator<'a> {
    pub fn new(dialect: &'a dyn Dialect, schema: &'a str) -> Self {
        Self { dialect, schema }
    }

    fn ident(&self, name: &str) -> String {
        self.dialect.quote_identifier(name)
    }

    fn table_ref(&self, table: &str) -> String {
        format!("{}.{}", self.ident(self.schema), self.ident(table))
    }

    fn watermark_filter(&self, watermark: Option<&Watermark>) -> (String, Vec<Value>) {
        match watermark {
            Some(wm) => (
                format!(
                    " WHERE {} >= {}",
                    self.ident(&wm.column),
                    self.dialect.get_placeholder(0)
                ),
                vec![wm.value.clone()],
            ),
            None => (String::new(), Vec::new()),
        }
    }

    pub fn create_table(&self, table: &str) -> String {
        format!("CREATE TABLE IF NOT EXISTS {} ()", self.table_ref(table))
    }

    pub fn drop_table(&self, table: &str) -> String {
        format!("DROP TABLE IF EXISTS {}", self.table_ref(table))
    }

    pub fn add_column(&self, table: &str, column: &ColumnDef) -> String {
        let mut sql = format!(
            "ALTER TABLE {} ADD COLUMN {} {}",
            self.table_ref(table),
            self.ident(&column.name),
            self.dialect.render_column_type(column.column_type)
        );
        if column.primary_key {
            sql.push_str(" PRIMARY KEY");
        }
        sql
    }

    /// Changes a column's type in place, converting existing values.
    pub fn alter_column_type(&self, table: &str, column: &ColumnDef) -> String {
        let col = self.ident(&column.name);
        let ty = self.dialect.render_column_type(column.column_type);
        format!(
            "ALTER TABLE {} ALTER COLUMN {col} TYPE {ty} USING {col}::{ty}",
            self.table_ref(table)
        )
    }

    pub fn count(&self, table: &str, watermark: Option<&Watermark>) -> (String, Vec<Value>) {
        let (filter, params) = self.watermark_filter(watermark);
        let sql = format!(
            "SELECT COUNT(*) AS {COUNT_ALIAS} FROM {}{filter}",
            self.table_ref(table)
        );
        (sql, params)
    }

    pub fn max(&self, table: &str, column: &str) -> String {
        format!(
            "SELECT MAX({}) AS {MAX_ALIAS} FROM {}",
            self.ident(column),
            self.table_ref(table)
        )
    }

    /// Generates a windowed SELECT statement and its parameters.
    pub fn select(&self, request: &FetchRowsRequest) -> (String, Vec<Value>) {
        let (filter, params) = self.watermark_filter(request.watermark.as_ref());
        let mut sql = format!("SELECT * FROM {}{filter}", self.table_ref(&request.table));
        if let Some(order_by) = &request.order_by {
            sql.push_str(&format!(" ORDER BY {}", self.ident(order_by)));
        }
        sql.push_str(&format!(" LIMIT {} OFFSET {}", request.limit, request.offset));
        (sql, params)
    }

    /// `INSERT .. ON CONFLICT (pk) DO UPDATE` over exactly `columns`.
    ///
    /// Without the conflict key in `columns` there is nothing to conflict on
    /// and the statement is a plain insert.
    pub fn upsert(&self, table: &str, columns: &[String], conflict_key: &str) -> UpsertStatement {
        let names = columns
            .iter()
            .map(|c| self.ident(c))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = (0..columns.len())
            .map(|i| self.dialect.get_placeholder(i))
            .collect::<Vec<_>>()
            .join(", ");

        let mut sql = format!(
            "INSERT INTO {} ({names}) VALUES ({placeholders})",
            self.table_ref(table)
        );

        if columns.iter().any(|c| c == conflict_key) {
            let updates = columns
                .iter()
                .filter(|c| *c != conflict_key)
                .map(|c| format!("{0} = EXCLUDED.{0}", self.ident(c)))
                .collect::<Vec<_>>();

            if updates.is_empty() {
                sql.push_str(&format!(" ON CONFLICT ({}) DO NOTHING", self.ident(conflict_key)));
            } else {
                sql.push_str(&format!(
                    " ON CONFLICT ({}) DO UPDATE SET {}",
                    self.ident(conflict_key),
                    updates.join(", ")
                ));
            }
        }

        UpsertStatement {
            table: table.to_string(),
            columns: columns.to_vec(),
            sql,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::base::{query::dialect::Postgres, requests::FetchRowsRequestBuilder};
    use model::core::data_type::ColumnType;

    fn generator() -> QueryGenerator<'static> {
        static DIALECT: Postgres = Postgres;
        QueryGenerator::new(&DIALECT, "public")
    }

    #[test]
    fn test_ddl_statements() {
        let generator = generator();
        assert_eq!(
            generator.create_table("fish"),
            r#"CREATE TABLE IF NOT EXISTS "public"."fish" ()"#
        );
        assert_eq!(
            generator.drop_table("fish"),
            r#"DROP TABLE IF EXISTS "public"."fish""#
        );
        assert_eq!(
            generator.add_column("fish", &ColumnDef::new("id", ColumnType::Integer, true)),
            r#"ALTER TABLE "public"."fish" ADD COLUMN "id" BIGINT PRIMARY KEY"#
        );
        assert_eq!(
            generator.add_column("fish", &ColumnDef::new("span", ColumnType::Range, false)),
            r#"ALTER TABLE "public"."fish" ADD COLUMN "span" TSRANGE"#
        );
        assert_eq!(
            generator.alter_column_type("fish", &ColumnDef::new("weight", ColumnType::Float, false)),
            r#"ALTER TABLE "public"."fish" ALTER COLUMN "weight" TYPE FLOAT USING "weight"::FLOAT"#
        );
    }

    #[test]
    fn test_count_and_max() {
        let generator = generator();
        let (sql, params) = generator.count("carts", None);
        assert_eq!(sql, r#"SELECT COUNT(*) AS __count FROM "public"."carts""#);
        assert!(params.is_empty());

        let wm = Watermark::new("updated_at", Value::Int(7));
        let (sql, params) = generator.count("carts", Some(&wm));
        assert_eq!(
            sql,
            r#"SELECT COUNT(*) AS __count FROM "public"."carts" WHERE "updated_at" >= $1"#
        );
        assert_eq!(params, vec![Value::Int(7)]);

        assert_eq!(
            generator.max("carts", "updated_at"),
            r#"SELECT MAX("updated_at") AS __max FROM "public"."carts""#
        );
    }

    #[test]
    fn test_windowed_select() {
        let request = FetchRowsRequestBuilder::new("carts")
            .order_by(Some("id".into()))
            .watermark(Some(Watermark::new("updated_at", Value::Int(2))))
            .limit(2)
            .offset(4)
            .build();
        let (sql, params) = generator().select(&request);
        assert_eq!(
            sql,
            r#"SELECT * FROM "public"."carts" WHERE "updated_at" >= $1 ORDER BY "id" LIMIT 2 OFFSET 4"#
        );
        assert_eq!(params.len(), 1);

        let unordered = FetchRowsRequestBuilder::new("logs").limit(10).build();
        let (sql, _) = generator().select(&unordered);
        assert_eq!(sql, r#"SELECT * FROM "public"."logs" LIMIT 10 OFFSET 0"#);
    }

    #[test]
    fn test_upsert_variants() {
        let generator = generator();
        let columns = vec!["id".to_string(), "name".to_string(), "weight".to_string()];
        let stmt = generator.upsert("fish", &columns, "id");
        assert_eq!(
            stmt.sql,
            r#"INSERT INTO "public"."fish" ("id", "name", "weight") VALUES ($1, $2, $3) ON CONFLICT ("id") DO UPDATE SET "name" = EXCLUDED."name", "weight" = EXCLUDED."weight""#
        );
        assert_eq!(stmt.columns, columns);

        let only_key = generator.upsert("fish", &["id".to_string()], "id");
        assert!(only_key.sql.ends_with(r#"ON CONFLICT ("id") DO NOTHING"#));

        let keyless = generator.upsert("logs", &["message".to_string()], "id");
        assert_eq!(
            keyless.sql,
            r#"INSERT INTO "public"."logs" ("message") VALUES ($1)"#
        );
    }
}
