pub mod navigation_task;
pub mod protocol;
pub mod rest;
pub mod session_reaper_task;
pub mod state;

pub use navigation_task::navigation_process;
pub use session_reaper_task::session_reaper_process;
pub use rest::{
    list_widgets_handler, mount_timeline_handler, get_timeline_handler, open_row_handler,
    toggle_row_handler, unmount_timeline_handler, update_records_handler,
};

use axum::{
    routing::{get, post, put},
    Router,
};
use state::AppState;
use std::sync::Arc;

/// Builds the timeline routes on top of the shared state.
pub fn build_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/widgets", get(list_widgets_handler))
        .route("/timelines", post(mount_timeline_handler))
        .route(
            "/timelines/{widget_id}",
            get(get_timeline_handler).delete(unmount_timeline_handler),
        )
        .route("/timelines/{widget_id}/records", put(update_records_handler))
        .route(
            "/timelines/{widget_id}/rows/{record_id}/toggle",
            post(toggle_row_handler),
        )
        .route(
            "/timelines/{widget_id}/rows/{record_id}/open",
            post(open_row_handler),
        )
        .with_state(app_state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{ChannelDispatcher, MemoryStore};
    use crate::config::Config;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use medical_timeline_core::{
        registry::{medical_timeline_descriptor, MEDICAL_TIMELINE_KEY},
        FieldWidgetRegistry, NoteRecord, NoteType, RecordLoader, Reference, WindowAction,
    };
    use serde_json::{json, Value};
    use tokio::sync::mpsc;
    use tower::ServiceExt;

    struct TestApp {
        router: Router,
        state: Arc<AppState>,
        store: Arc<MemoryStore>,
        navigation: mpsc::UnboundedReceiver<WindowAction>,
    }

    fn note(id: i64, date: &str, note_type: NoteType) -> NoteRecord {
        let mut record = NoteRecord::new(id);
        record.name = Some(format!("Note {}", id));
        record.date = Some(date.to_string());
        record.patient = Reference::labeled(5, "Rex");
        record.author = Reference::labeled(2, "Dr. Vega");
        record.note_type = note_type;
        record
    }

    fn test_app() -> TestApp {
        let config = Config::from_lookup(|name| match name {
            "VIEWER_UTC_OFFSET_MINUTES" => Some("0".to_string()),
            "VIEWER_HOUR_CYCLE" => Some("h23".to_string()),
            _ => None,
        })
        .unwrap();

        let store = Arc::new(MemoryStore::new());
        store.upsert_note(note(1, "2024-01-01 08:00:00", NoteType::Soap));
        store.upsert_note(note(2, "2024-03-01 08:00:00", NoteType::Other("xray".into())));
        store.upsert_note(note(3, "2024-02-01 08:00:00", NoteType::Report));
        store.upsert_patient(5, Reference::labeled(40, "Alice Moreau"));

        let (dispatcher, navigation) = ChannelDispatcher::channel();
        let mut registry = FieldWidgetRegistry::new();
        registry
            .register(MEDICAL_TIMELINE_KEY, medical_timeline_descriptor())
            .unwrap();

        let config = Arc::new(config);
        let loader = RecordLoader::new(store.clone(), store.clone(), config.loader_options());
        let app_state = Arc::new(AppState::new(
            config,
            loader,
            Arc::new(dispatcher),
            registry,
        ));

        TestApp {
            router: build_router(app_state.clone()),
            state: app_state,
            store,
            navigation,
        }
    }

    async fn send(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn mount(app: &TestApp, ids: Value) -> (String, Value) {
        let (status, view) = send(
            &app.router,
            "POST",
            "/timelines",
            Some(json!({ "widget": "medical_timeline", "record_ids": ids })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        (view["widget_id"].as_str().unwrap().to_string(), view)
    }

    fn row_ids(view: &Value) -> Vec<i64> {
        view["rows"]
            .as_array()
            .unwrap()
            .iter()
            .map(|row| row["id"].as_i64().unwrap())
            .collect()
    }

    #[tokio::test]
    async fn lists_registered_widgets() {
        let app = test_app();

        let (status, body) = send(&app.router, "GET", "/widgets", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["key"], "medical_timeline");
        assert_eq!(body[0]["display_name"], "Medical Timeline");
    }

    #[tokio::test]
    async fn mount_renders_sorted_display_ready_rows() {
        let app = test_app();

        let (_, view) = mount(&app, json!([1, 2, 3])).await;

        assert_eq!(row_ids(&view), vec![2, 3, 1]);
        let newest = &view["rows"][0];
        assert_eq!(newest["date_display"], "Mar 1, 2024, 08:00");
        assert_eq!(newest["note_type"], "xray");
        assert_eq!(newest["note_type_label"], "xray");
        assert_eq!(newest["patient"], "Rex");
        assert_eq!(newest["owner"], "Alice Moreau");
        assert_eq!(newest["booking"], "");
        assert_eq!(newest["author"], "Dr. Vega");
        assert_eq!(newest["expanded"], false);
        assert_eq!(view["rows"][2]["note_type_label"], "SOAP Note");
        // One owner lookup per note.
        assert_eq!(app.store.owner_reads(), 3);
    }

    #[tokio::test]
    async fn empty_field_mounts_without_store_calls() {
        let app = test_app();

        let (_, view) = mount(&app, json!([])).await;
        let (_, unsaved) = mount(&app, json!([null])).await;

        assert!(row_ids(&view).is_empty());
        assert!(row_ids(&unsaved).is_empty());
        assert_eq!(app.store.note_reads(), 0);
    }

    #[tokio::test]
    async fn unknown_widget_is_rejected() {
        let app = test_app();

        let (status, _) = send(
            &app.router,
            "POST",
            "/timelines",
            Some(json!({ "widget": "kanban", "record_ids": [1] })),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn toggle_expands_and_collapses_a_row() {
        let app = test_app();
        let (widget_id, _) = mount(&app, json!([1, 2])).await;
        let uri = format!("/timelines/{}/rows/1/toggle", widget_id);

        let (status, view) = send(&app.router, "POST", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["rows"][1]["id"], 1);
        assert_eq!(view["rows"][1]["expanded"], true);
        assert_eq!(view["rows"][0]["expanded"], false);

        let (_, view) = send(&app.router, "POST", &uri, None).await;
        assert_eq!(view["rows"][1]["expanded"], false);
    }

    #[tokio::test]
    async fn update_reloads_only_when_rows_change() {
        let app = test_app();
        let (widget_id, _) = mount(&app, json!([1])).await;
        let uri = format!("/timelines/{}/records", widget_id);

        send(&app.router, "PUT", &uri, Some(json!({ "record_ids": [1] }))).await;
        assert_eq!(app.store.note_reads(), 1);

        let (status, view) =
            send(&app.router, "PUT", &uri, Some(json!({ "record_ids": [1, 3] }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(row_ids(&view), vec![3, 1]);
        assert_eq!(app.store.note_reads(), 2);
    }

    #[tokio::test]
    async fn failed_reload_keeps_previous_rows() {
        let app = test_app();
        let (widget_id, _) = mount(&app, json!([1, 2])).await;

        let (status, _) = send(
            &app.router,
            "PUT",
            &format!("/timelines/{}/records", widget_id),
            Some(json!({ "record_ids": [1, 99] })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);

        let (_, view) = send(&app.router, "GET", &format!("/timelines/{}", widget_id), None).await;
        assert_eq!(row_ids(&view), vec![2, 1]);
    }

    #[tokio::test]
    async fn identical_update_retries_after_a_failed_reload() {
        let app = test_app();
        let (widget_id, _) = mount(&app, json!([1, 2])).await;
        let uri = format!("/timelines/{}/records", widget_id);

        let (status, _) = send(&app.router, "PUT", &uri, Some(json!({ "record_ids": [1, 99] }))).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);

        app.store
            .upsert_note(note(99, "2024-04-01 08:00:00", NoteType::Internal));
        let (status, view) =
            send(&app.router, "PUT", &uri, Some(json!({ "record_ids": [1, 99] }))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(row_ids(&view), vec![99, 1]);
        assert_eq!(app.store.note_reads(), 3);
    }

    #[tokio::test]
    async fn idle_widgets_are_unmounted() {
        let app = test_app();
        let (widget_id, _) = mount(&app, json!([1])).await;
        let uri = format!("/timelines/{}", widget_id);

        let later = std::time::Instant::now() + std::time::Duration::from_secs(3600);
        assert_eq!(app.state.evict_idle(later).await, 1);

        let (status, _) = send(&app.router, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn open_requests_navigation() {
        let mut app = test_app();
        let (widget_id, _) = mount(&app, json!([3])).await;

        let (status, _) = send(
            &app.router,
            "POST",
            &format!("/timelines/{}/rows/3/open", widget_id),
            None,
        )
        .await;

        assert_eq!(status, StatusCode::ACCEPTED);
        let action = app.navigation.recv().await.unwrap();
        assert_eq!(action, WindowAction::open_note(3));
    }

    #[tokio::test]
    async fn unmount_forgets_the_widget() {
        let app = test_app();
        let (widget_id, _) = mount(&app, json!([1])).await;
        let uri = format!("/timelines/{}", widget_id);

        let (status, _) = send(&app.router, "DELETE", &uri, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = send(&app.router, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
