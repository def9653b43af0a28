// Errors surfaced by the collector.

use thiserror::Error;

use crate::models::{Domain, UnknownAction};
use crate::parse::ParseError;
use crate::probe::ProbeError;

#[derive(Debug, Error)]
pub enum CollectError {
    #[error(transparent)]
    Probe(#[from] ProbeError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("host metrics: {0:#}")]
    Host(anyhow::Error),

    #[error("service {0:?} not found")]
    NotFound(String),

    #[error("invalid action {0:?}; expected start, stop or restart")]
    InvalidAction(String),

    /// A refresh failed and there is no earlier snapshot to fall back on.
    #[error("{domain} data unavailable: {source}")]
    Unavailable {
        domain: Domain,
        #[source]
        source: Box<CollectError>,
    },
}

impl CollectError {
    pub fn unavailable(domain: Domain, source: CollectError) -> Self {
        CollectError::Unavailable {
            domain,
            source: Box::new(source),
        }
    }
}

impl From<UnknownAction> for CollectError {
    fn from(e: UnknownAction) -> Self {
        CollectError::InvalidAction(e.0)
    }
}
