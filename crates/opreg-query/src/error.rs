#[derive(thiserror::Error, Debug)]
pub enum QueryError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Graph(#[from] opreg_graph::GraphError),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Ambiguous(String),

    #[error("stored record for {0} is malformed: {1}")]
    Corrupt(String, String),
}

pub type Result<T> = std::result::Result<T, QueryError>;
