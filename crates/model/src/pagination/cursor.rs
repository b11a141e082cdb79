use crate::core::value::Value;
use serde::{Deserialize, Serialize};

/// Lower bound on a watermark column: rows with `column >= value`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Watermark {
    pub column: String,
    pub value: Value,
}

impl Watermark {
    pub fn new(column: &str, value: Value) -> Self {
        Watermark {
            column: column.to_string(),
            value,
        }
    }
}

/// Limit/offset pagination state for a single read.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Cursor {
    pub limit: usize,
    pub offset: usize,
    pub watermark: Option<Watermark>,
}

impl Cursor {
    /// A fresh cursor at offset zero. A zero limit is raised to one.
    pub fn new(limit: usize) -> Self {
        Cursor {
            limit: limit.max(1),
            offset: 0,
            watermark: None,
        }
    }

    pub fn with_watermark(mut self, watermark: Watermark) -> Self {
        self.watermark = Some(watermark);
        self
    }

    /// Moves the window forward by one page.
    pub fn advance(&mut self) {
        self.offset += self.limit;
    }

    pub fn is_incremental(&self) -> bool {
        self.watermark.is_some()
    }
}
