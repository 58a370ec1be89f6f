//! Authorize handler

use serde_json::Value;
use tracing::info;

use super::{HandlerContext, HandlerError, HandlerResult};
use crate::domain::messages::{AuthorizeRequest, AuthorizeResponse};

pub(super) async fn handle(ctx: &HandlerContext, payload: &Value) -> HandlerResult {
    let req: AuthorizeRequest = serde_json::from_value(payload.clone())
        .map_err(|e| HandlerError::Formation(format!("Invalid Authorize: {}", e)))?;

    let id_tag_info = ctx.storage.validate_id_tag(&req.id_tag).await?;

    info!(
        charge_point_id = ctx.charge_point_id(),
        id_tag = req.id_tag.as_str(),
        status = %id_tag_info.status,
        "Authorize"
    );

    serde_json::to_value(AuthorizeResponse { id_tag_info })
        .map_err(|e| HandlerError::Internal(format!("serialize Authorize response: {}", e)))
}
