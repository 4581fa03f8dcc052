use board::Checklist;
use domain::{Scope, UserId};
use infrastructure::MemoryStore;
use std::sync::Arc;

fn uid(id: &str) -> UserId {
    UserId::from_string(id.to_string()).unwrap()
}

#[tokio::test]
async fn test_checklist_add_toggle_delete() {
    let store = Arc::new(MemoryStore::new());
    let mut checklist = Checklist::load(store, Scope::Personal(uid("u1")), uid("u1"))
        .await
        .unwrap();
    assert!(checklist.todos().is_empty());

    assert!(checklist.add("   ").await.is_err());

    let id = checklist.add("  Buy milk ").await.unwrap();
    assert_eq!(checklist.todos().len(), 1);
    assert_eq!(checklist.todos()[0].title, "Buy milk");
    assert_eq!(checklist.todos()[0].status, None);

    checklist.toggle(&id).await.unwrap();
    assert!(checklist.todos()[0].completed);
    checklist.toggle(&id).await.unwrap();
    assert!(!checklist.todos()[0].completed);

    checklist.delete(&id).await.unwrap();
    assert!(checklist.todos().is_empty());
}

#[tokio::test]
async fn test_checklist_failure_leaves_list_unchanged() {
    let store = Arc::new(MemoryStore::new());
    let mut checklist = Checklist::load(Arc::clone(&store), Scope::Personal(uid("u1")), uid("u1"))
        .await
        .unwrap();
    let id = checklist.add("Call Alex").await.unwrap();

    store.inject_write_failures(true);
    let err = checklist.toggle(&id).await.unwrap_err();
    assert!(err.is_transient());
    assert!(!checklist.todos()[0].completed);
}
