use opreg_model::{ChannelName, PackageName};

#[derive(thiserror::Error, Debug)]
pub enum GraphError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error("package {package}, channel {channel}: no depth-0 entry found, violating the single-head invariant")]
    NoHeadEntry {
        package: PackageName,
        channel: ChannelName,
    },
}
