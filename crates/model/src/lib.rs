pub mod core {
    pub mod data_type;
    pub mod value;
}

pub mod events;

pub mod pagination {
    pub mod cursor;
}

pub mod records {
    pub mod batch;
    pub mod row;
}
