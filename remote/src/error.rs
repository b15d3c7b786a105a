#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] tcproxy_core::Error),

    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),
}
