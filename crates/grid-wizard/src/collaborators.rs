//! Interfaces of the remote services the wizard depends on.

use crate::error::UpstreamError;
use crate::payload::CreationPayload;
use async_trait::async_trait;
use grid_core::ZoneClass;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Zone lookup result for a position.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneInfo {
    pub irradiation_class: Option<ZoneClass>,
    pub nearest_city: Option<String>,
}

/// Failure of the location service. Always recovered by degrading.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CollaboratorError {
    #[error("location service unavailable: {0}")]
    Unavailable(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Geographic lookups.
#[async_trait]
pub trait LocationService: Send + Sync {
    async fn resolve_zone(&self, lat: f64, lng: f64) -> Result<ZoneInfo, CollaboratorError>;

    async fn estimate_population(&self, lat: f64, lng: f64) -> Result<u64, CollaboratorError>;
}

/// Identifier of a created establishment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EstablishmentId(pub i64);

impl fmt::Display for EstablishmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Creates the establishment from a finished draft.
#[async_trait]
pub trait EstablishmentService: Send + Sync {
    async fn create_establishment(
        &self,
        payload: &CreationPayload,
    ) -> Result<EstablishmentId, UpstreamError>;
}
