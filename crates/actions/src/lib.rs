//! Action dispatch and the domain version-counter store (§4.8).
//!
//! The engine has no bulk-data store of its own opinion about UI
//! freshness; SQLite (via `aperture-db`) is the source of truth for
//! data. This crate is the source of truth for *which* data changed and
//! when, so callers can decide whether to re-query instead of polling.

mod action;
mod state;
mod store;

pub use action::{Action, ActionMeta};
pub use state::{JobSnapshot, ProjectState};
pub use store::{init_with_defaults, Store, Subscriber, SubscriptionId};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn project_selected_bumps_domain_versions_but_not_ui_epoch() {
        let store = Store::new(ProjectState::new());
        let meta = store.make_meta("test");
        store.dispatch(Action::ProjectSelected { meta, project_id: 7 });

        let state = store.state();
        assert_eq!(state.project_id, Some(7));
        assert_eq!(state.media_v, 1);
        assert_eq!(state.ui_epoch, 0);
    }

    #[test]
    fn shutdown_bumps_ui_epoch_and_sets_closing() {
        let store = Store::new(ProjectState::new());
        let meta = store.make_meta("test");
        store.dispatch(Action::ShutdownRequested { meta, reason: "quit".into() });

        let state = store.state();
        assert!(state.closing);
        assert_eq!(state.ui_epoch, 1);
    }

    #[test]
    fn dead_subscriber_is_pruned_without_panicking() {
        let store = Store::new(ProjectState::new());
        let handler: Arc<Subscriber> = Arc::new(|_, _| {});
        let _id = store.subscribe(Arc::downgrade(&handler));
        drop(handler);

        let meta = store.make_meta("test");
        store.dispatch(Action::SettingsChanged { meta, key: "theme".into() });
        assert_eq!(store.state().settings_v, 1);
    }

    #[test]
    fn live_subscriber_observes_dispatch() {
        let store = Store::new(ProjectState::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let handler: Arc<Subscriber> = Arc::new(move |_state, action| {
            seen_clone.lock().unwrap().push(action.name().to_string());
        });
        store.subscribe(Arc::downgrade(&handler));

        let meta = store.make_meta("test");
        store.dispatch(Action::TagsChanged { meta, photo_ids: vec![1, 2] });

        assert_eq!(seen.lock().unwrap().as_slice(), ["TagsChanged"]);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let store = Store::new(ProjectState::new());
        let calls = Arc::new(Mutex::new(0u32));
        let calls_clone = calls.clone();
        let handler: Arc<Subscriber> = Arc::new(move |_, _| {
            *calls_clone.lock().unwrap() += 1;
        });
        let id = store.subscribe(Arc::downgrade(&handler));
        store.unsubscribe(id);

        let meta = store.make_meta("test");
        store.dispatch(Action::TagsChanged { meta, photo_ids: vec![] });
        assert_eq!(*calls.lock().unwrap(), 0);
    }
}
