use model::{core::data_type::ColumnType, pagination::cursor::Watermark};

/// One window of a table read.
#[derive(Debug, Clone)]
pub struct FetchRowsRequest {
    pub table: String,
    pub order_by: Option<String>,
    pub watermark: Option<Watermark>,
    pub limit: usize,
    pub offset: usize,
}

pub struct FetchRowsRequestBuilder {
    table: String,
    order_by: Option<String>,
    watermark: Option<Watermark>,
    limit: usize,
    offset: usize,
}

impl FetchRowsRequestBuilder {
    pub fn new(table: &str) -> Self {
        FetchRowsRequestBuilder {
            table: table.to_string(),
            order_by: None,
            watermark: None,
            limit: 0,
            offset: 0,
        }
    }

    pub fn order_by(mut self, column: Option<String>) -> Self {
        self.order_by = column;
        self
    }

    pub fn watermark(mut self, watermark: Option<Watermark>) -> Self {
        self.watermark = watermark;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn build(self) -> FetchRowsRequest {
        FetchRowsRequest {
            table: self.table,
            order_by: self.order_by,
            watermark: self.watermark,
            limit: self.limit,
            offset: self.offset,
        }
    }
}

/// A column to be added to an existing table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub column_type: ColumnType,
    pub primary_key: bool,
}

impl ColumnDef {
    pub fn new(name: &str, column_type: ColumnType, primary_key: bool) -> Self {
        ColumnDef {
            name: name.to_string(),
            column_type,
            primary_key,
        }
    }
}

/// A rendered `INSERT .. ON CONFLICT` statement for a fixed column list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertStatement {
    pub table: String,
    pub columns: Vec<String>,
    pub sql: String,
}
