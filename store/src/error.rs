use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    /// The storage engine rejected or failed the operation.
    #[error("persistence error: {0}")]
    Persistence(#[from] sqlx::Error),

    #[error("corrupt value in column {column}: {value:?}")]
    Decode { column: &'static str, value: String },

    #[error("no subscriber registered")]
    NoSubscriber,
}
