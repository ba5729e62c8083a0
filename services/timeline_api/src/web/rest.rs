//! services/timeline_api/src/web/rest.rs
//!
//! Contains the Axum handlers for the timeline endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::{
    protocol::{
        to_record_refs, MountTimelineRequest, TimelineRow, TimelineView, UpdateRecordsRequest,
        WidgetInfo,
    },
    state::AppState,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use medical_timeline_core::{FieldType, PortError};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::OpenApi;
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        list_widgets_handler,
        mount_timeline_handler,
        get_timeline_handler,
        update_records_handler,
        unmount_timeline_handler,
        toggle_row_handler,
        open_row_handler,
    ),
    components(
        schemas(WidgetInfo, MountTimelineRequest, UpdateRecordsRequest, TimelineView, TimelineRow)
    ),
    tags(
        (name = "Medical Timeline API", description = "Mount and drive medical timeline widgets.")
    )
)]
pub struct ApiDoc;

type HandlerError = (StatusCode, String);

fn store_failure(context: &str, e: PortError) -> HandlerError {
    error!("{}: {:?}", context, e);
    (StatusCode::BAD_GATEWAY, format!("{}: {}", context, e))
}

fn widget_not_found(widget_id: Uuid) -> HandlerError {
    (
        StatusCode::NOT_FOUND,
        format!("No timeline is mounted under {}", widget_id),
    )
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// List the field widgets registered with this service.
#[utoipa::path(
    get,
    path = "/widgets",
    responses((status = 200, description = "Registered field widgets", body = [WidgetInfo]))
)]
pub async fn list_widgets_handler(State(app_state): State<Arc<AppState>>) -> Json<Vec<WidgetInfo>> {
    Json(
        app_state
            .registry
            .iter()
            .map(|(key, descriptor)| WidgetInfo::new(key, descriptor))
            .collect(),
    )
}

/// Mount a timeline widget on a one2many field and load it.
#[utoipa::path(
    post,
    path = "/timelines",
    request_body = MountTimelineRequest,
    responses(
        (status = 201, description = "Timeline mounted and loaded", body = TimelineView),
        (status = 404, description = "Unknown field widget"),
        (status = 502, description = "The record store failed")
    )
)]
pub async fn mount_timeline_handler(
    State(app_state): State<Arc<AppState>>,
    Json(request): Json<MountTimelineRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let supported = app_state
        .registry
        .get(&request.widget)
        .is_some_and(|d| d.supports(FieldType::One2many));
    if !supported {
        return Err((
            StatusCode::NOT_FOUND,
            format!("No one2many field widget registered as '{}'", request.widget),
        ));
    }

    let session = Arc::new(app_state.new_widget(to_record_refs(request.record_ids)));
    session
        .load()
        .await
        .map_err(|e| store_failure("Failed to load timeline", e))?;

    let widget_id = Uuid::new_v4();
    let view = TimelineView::render(widget_id, &*session.widget.lock().await);
    app_state.widgets.write().await.insert(widget_id, session);
    info!("Mounted timeline {} with {} rows.", widget_id, view.rows.len());

    Ok((StatusCode::CREATED, Json(view)))
}

/// The current state of a mounted timeline.
#[utoipa::path(
    get,
    path = "/timelines/{widget_id}",
    params(("widget_id" = Uuid, Path, description = "The mounted timeline.")),
    responses(
        (status = 200, description = "Current timeline", body = TimelineView),
        (status = 404, description = "No such timeline")
    )
)]
pub async fn get_timeline_handler(
    State(app_state): State<Arc<AppState>>,
    Path(widget_id): Path<Uuid>,
) -> Result<Json<TimelineView>, HandlerError> {
    let session = app_state
        .widget(widget_id)
        .await
        .ok_or_else(|| widget_not_found(widget_id))?;
    let widget = session.widget.lock().await;
    Ok(Json(TimelineView::render(widget_id, &widget)))
}

/// The bound field changed on the host record; reload if its rows differ.
#[utoipa::path(
    put,
    path = "/timelines/{widget_id}/records",
    request_body = UpdateRecordsRequest,
    params(("widget_id" = Uuid, Path, description = "The mounted timeline.")),
    responses(
        (status = 200, description = "Timeline after the update", body = TimelineView),
        (status = 404, description = "No such timeline"),
        (status = 502, description = "The record store failed; the previous rows are kept")
    )
)]
pub async fn update_records_handler(
    State(app_state): State<Arc<AppState>>,
    Path(widget_id): Path<Uuid>,
    Json(request): Json<UpdateRecordsRequest>,
) -> Result<Json<TimelineView>, HandlerError> {
    let session = app_state
        .widget(widget_id)
        .await
        .ok_or_else(|| widget_not_found(widget_id))?;
    session
        .update_props(to_record_refs(request.record_ids))
        .await
        .map_err(|e| store_failure("Failed to reload timeline", e))?;

    let widget = session.widget.lock().await;
    Ok(Json(TimelineView::render(widget_id, &widget)))
}

/// Unmount a timeline, cancelling any load still in flight.
#[utoipa::path(
    delete,
    path = "/timelines/{widget_id}",
    params(("widget_id" = Uuid, Path, description = "The mounted timeline.")),
    responses(
        (status = 204, description = "Timeline unmounted"),
        (status = 404, description = "No such timeline")
    )
)]
pub async fn unmount_timeline_handler(
    State(app_state): State<Arc<AppState>>,
    Path(widget_id): Path<Uuid>,
) -> Result<StatusCode, HandlerError> {
    let session = app_state
        .widgets
        .write()
        .await
        .remove(&widget_id)
        .ok_or_else(|| widget_not_found(widget_id))?;
    session.cancel();
    info!("Unmounted timeline {}.", widget_id);
    Ok(StatusCode::NO_CONTENT)
}

/// Header click on a row: expand or collapse it.
#[utoipa::path(
    post,
    path = "/timelines/{widget_id}/rows/{record_id}/toggle",
    params(
        ("widget_id" = Uuid, Path, description = "The mounted timeline."),
        ("record_id" = String, Path, description = "The row's record id as rendered.")
    ),
    responses(
        (status = 200, description = "Timeline after the click", body = TimelineView),
        (status = 404, description = "No such timeline")
    )
)]
pub async fn toggle_row_handler(
    State(app_state): State<Arc<AppState>>,
    Path((widget_id, record_id)): Path<(Uuid, String)>,
) -> Result<Json<TimelineView>, HandlerError> {
    let session = app_state
        .widget(widget_id)
        .await
        .ok_or_else(|| widget_not_found(widget_id))?;
    let mut widget = session.widget.lock().await;
    widget.on_header_click(&record_id);
    Ok(Json(TimelineView::render(widget_id, &widget)))
}

/// Open button on a row: ask the host to show the note's form view.
#[utoipa::path(
    post,
    path = "/timelines/{widget_id}/rows/{record_id}/open",
    params(
        ("widget_id" = Uuid, Path, description = "The mounted timeline."),
        ("record_id" = String, Path, description = "The row's record id as rendered.")
    ),
    responses(
        (status = 202, description = "Navigation requested"),
        (status = 404, description = "No such timeline")
    )
)]
pub async fn open_row_handler(
    State(app_state): State<Arc<AppState>>,
    Path((widget_id, record_id)): Path<(Uuid, String)>,
) -> Result<StatusCode, HandlerError> {
    let session = app_state
        .widget(widget_id)
        .await
        .ok_or_else(|| widget_not_found(widget_id))?;
    session.widget.lock().await.on_open_record(&record_id);
    Ok(StatusCode::ACCEPTED)
}
