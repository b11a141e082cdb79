pub mod adapter;
pub mod connector;
pub mod error;
pub mod events;
pub mod settings;

pub mod file {
    pub mod csv {
        pub mod adapter;
        pub mod cast;
        pub mod connector;
        pub mod error;
    }
}

pub mod sql {
    pub mod base {
        pub mod adapter;
        pub mod connector;
        pub mod error;
        pub mod reader;
        pub mod requests;
        pub mod writer;

        pub mod metadata {
            pub mod column;
        }

        pub mod query {
            pub mod dialect;
            pub mod generator;
        }

        pub mod schema {
            pub mod inference;
            pub mod registry;
        }
    }

    pub mod memory {
        pub mod adapter;
    }

    pub mod postgres {
        pub mod adapter;
        pub mod params;
        pub mod range;
        pub mod row;
        pub mod utils;
    }
}
