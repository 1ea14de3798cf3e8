use temba_migrate_core::EntityType;

use crate::StorageBackend;
use crate::traits::ContextStore;

#[tokio::test]
async fn test_memory_backend_dispatches() {
    let backend = StorageBackend::new_memory();
    assert_eq!(backend.name(), "memory");
    let scope = backend.load_context().await.unwrap();
    assert_eq!(backend.count(EntityType::Org).await.unwrap(), 1);
    assert_eq!(backend.flush(scope).await.unwrap(), 0);
}
