use super::*;

fn all_actions(entity: &Entity) -> Vec<SessionAction> {
    vec![
        SessionAction::StartCreate,
        SessionAction::StartUpdate(entity.clone()),
        SessionAction::Close,
    ]
}

fn assert_target_matches_mode(session: &EditSession) {
    assert_eq!(
        session.target().is_some(),
        session.mode() == EditMode::Editing,
        "target must be present exactly when editing: {session:?}"
    );
}

#[test]
fn starts_idle_without_target() {
    let store = SessionStore::new();
    let session = store.current();
    assert_eq!(session.mode(), EditMode::Idle);
    assert!(session.target().is_none());
    assert!(!session.is_open());
}

#[test]
fn target_present_iff_editing_for_every_short_sequence() {
    let entity = Entity::with_id("42").with_attribute("name", "Khoa");
    let actions = all_actions(&entity);

    // Exhaustive over all sequences of up to four transitions.
    for len in 0..=4u32 {
        for code in 0..actions.len().pow(len) {
            let store = SessionStore::new();
            let mut remaining = code;
            for _ in 0..len {
                let session = store.dispatch(actions[remaining % actions.len()].clone());
                remaining /= actions.len();
                assert_target_matches_mode(&session);
            }
        }
    }
}

#[test]
fn update_then_close_then_create_ends_creating_without_target() {
    let store = SessionStore::new();
    let entity_x = Entity::with_id("x").with_attribute("name", "X");

    store.dispatch(SessionAction::StartUpdate(entity_x.clone()));
    assert_eq!(store.current().target(), Some(&entity_x));
    store.dispatch(SessionAction::Close);
    let session = store.dispatch(SessionAction::StartCreate);

    assert_eq!(session, EditSession::Creating);
    assert!(session.target().is_none());
}

#[test]
fn start_update_replaces_previous_target() {
    let first = Entity::with_id("1");
    let second = Entity::with_id("2");
    let session = EditSession::Editing(first)
        .reduce(SessionAction::StartUpdate(second.clone()));
    assert_eq!(session.target(), Some(&second));
}

#[tokio::test]
async fn subscribers_observe_transitions() {
    let store = SessionStore::new();
    let mut receiver = store.subscribe();

    store.dispatch(SessionAction::StartCreate);

    receiver.changed().await.expect("sender alive");
    assert_eq!(receiver.borrow().mode(), EditMode::Creating);
}
