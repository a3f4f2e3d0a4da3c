use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Local persistence failed. Only writes and deletes surface this; read
/// failures are mapped to "no session".
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("failed to write `{key}` to secure storage: {source}")]
    Write {
        key: &'static str,
        #[source]
        source: BoxError,
    },

    #[error("failed to delete `{key}` from secure storage: {source}")]
    Delete {
        key: &'static str,
        #[source]
        source: BoxError,
    },

    #[error("failed to serialize `{key}`: {source}")]
    Serialize {
        key: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl StorageError {
    pub fn write(key: &'static str, err: anyhow::Error) -> Self {
        Self::Write {
            key,
            source: err.into(),
        }
    }

    pub fn delete(key: &'static str, err: anyhow::Error) -> Self {
        Self::Delete {
            key,
            source: err.into(),
        }
    }
}
