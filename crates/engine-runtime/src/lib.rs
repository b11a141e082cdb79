pub mod error;
pub mod settings;

pub mod execution {
    pub mod executor;
    pub mod observer;
    pub mod task;
}
