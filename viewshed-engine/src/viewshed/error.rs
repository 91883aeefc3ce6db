use thiserror::Error;

use super::entity::ViewshedId;

#[derive(Debug, Error)]
pub enum ViewshedError {
    #[error("invalid position: expected [longitude, latitude, height], got {0}")]
    InvalidPosition(String),
    #[error("unknown viewshed kind: {0}")]
    UnknownKind(String),
    #[error("surface {0} has no renderable context")]
    NoRenderContext(u64),
    #[error("unknown viewshed {0}")]
    UnknownViewshed(ViewshedId),
    #[error("no viewshed is current")]
    NoCurrentViewshed,
    #[error("pointer on surface {0} is held by another interaction")]
    PointerBusy(u64),
    #[error("viewshed is still being placed")]
    PlacementInProgress,
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("terrain query failed: {0}")]
    Terrain(String),
    #[error("bad schema: {0}")]
    Schema(String),
    #[error("serialisation failed")]
    Serde(#[from] serde_json::Error),
}
