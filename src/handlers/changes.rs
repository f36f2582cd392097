// src/handlers/changes.rs

use std::convert::Infallible;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{self, Stream};

use crate::{
    config::AppState,
    middleware::auth::AuthenticatedUser,
    models::shipment::ShipmentScope,
};

/// Feed de mudanças em Server-Sent Events, já filtrado pelo papel do usuário.
/// O nome do evento é `INSERT`, `UPDATE` ou `DELETE`.
#[utoipa::path(
    get,
    path = "/api/shipments/changes",
    tag = "Shipments",
    responses(
        (status = 200, description = "Stream SSE de ChangeEvent", body = String, content_type = "text/event-stream")
    ),
    security(("api_jwt" = []))
)]
pub async fn stream_changes(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscription = app_state
        .change_feed
        .subscribe(ShipmentScope::for_user(user.id, user.role));
    tracing::debug!("📡 Usuário {} assinou o feed de mudanças", user.id);

    let events = stream::unfold(subscription, |mut subscription| async move {
        loop {
            let change = subscription.next().await?;
            match Event::default().event(change.kind()).json_data(&change) {
                Ok(event) => return Some((Ok(event), subscription)),
                Err(e) => tracing::warn!("⚠️ Mudança {} não serializada: {}", change.shipment_id(), e),
            }
        }
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}
