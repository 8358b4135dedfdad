use kvdump_store::{
    FsStore, KeySpec, MemoryStore, RecordKey, Store, StoreError, StoreResult, TransactionMode,
    Value,
};

fn color(id: i64, name: &str) -> Value {
    Value::object([("id", Value::from(id)), ("name", Value::from(name))])
}

async fn read_all<T: Store>(store: &T, container: &str) -> StoreResult<Vec<Value>> {
    let tx = store
        .transaction(&[container.to_string()], TransactionMode::ReadOnly)
        .await?;
    let mut cursor = tx.open_cursor(container).await?;
    let mut out = Vec::new();
    while let Some(record) = cursor.next().await? {
        out.push(record);
    }
    tx.commit().await?;
    Ok(out)
}

async fn exercise_key_order<T: Store>(store: &T) -> StoreResult<()> {
    let scope = vec!["colors".to_string()];
    let tx = store.transaction(&scope, TransactionMode::ReadWrite).await?;
    tx.add("colors", color(3, "blue")).await?;
    tx.add("colors", color(1, "red")).await?;
    tx.add("colors", color(2, "green")).await?;
    tx.commit().await?;

    let names: Vec<Value> = read_all(store, "colors")
        .await?
        .into_iter()
        .filter_map(|record| record.get("name").cloned())
        .collect();
    assert_eq!(
        names,
        vec![Value::from("red"), Value::from("green"), Value::from("blue")]
    );
    Ok(())
}

async fn exercise_compound_keys<T: Store>(store: &T) -> StoreResult<()> {
    let scope = vec!["color_shape".to_string()];
    let tx = store.transaction(&scope, TransactionMode::ReadWrite).await?;
    let record = Value::object([
        ("shape", Value::from("circle")),
        ("color", Value::from("red")),
    ]);
    let key = tx.add("color_shape", record.clone()).await?;
    assert_eq!(
        key,
        RecordKey::Array(vec![
            RecordKey::String("circle".to_string()),
            RecordKey::String("red".to_string()),
        ])
    );
    let duplicate = tx.add("color_shape", record).await;
    assert!(matches!(duplicate, Err(StoreError::Constraint(_))));
    tx.commit().await?;
    Ok(())
}

async fn exercise_clear<T: Store>(store: &T) -> StoreResult<()> {
    let scope = vec!["colors".to_string()];
    let tx = store.transaction(&scope, TransactionMode::ReadWrite).await?;
    tx.clear("colors").await?;
    tx.commit().await?;

    assert!(read_all(store, "colors").await?.is_empty());
    Ok(())
}

fn prepare_memory() -> MemoryStore {
    let store = MemoryStore::new();
    store
        .create_container("colors", KeySpec::auto_increment("id"))
        .expect("colors should be created");
    store
        .create_container("color_shape", KeySpec::compound(["shape", "color"]))
        .expect("color_shape should be created");
    store
}

fn prepare_fs(root: &std::path::Path) -> FsStore {
    let store = FsStore::new(root).expect("fs store should initialize");
    store
        .create_container("colors", KeySpec::auto_increment("id"))
        .expect("colors should be created");
    store
        .create_container("color_shape", KeySpec::compound(["shape", "color"]))
        .expect("color_shape should be created");
    store
}

#[tokio::test(flavor = "current_thread")]
async fn memory_and_fs_key_order_expected_same_behavior() {
    let memory = prepare_memory();
    exercise_key_order(&memory)
        .await
        .expect("memory key order should hold");

    let tmp = tempfile::tempdir().expect("tempdir should be created");
    let fs = prepare_fs(tmp.path());
    exercise_key_order(&fs).await.expect("fs key order should hold");
}

#[tokio::test(flavor = "current_thread")]
async fn memory_and_fs_compound_keys_expected_same_behavior() {
    let memory = prepare_memory();
    exercise_compound_keys(&memory)
        .await
        .expect("memory compound keys should work");

    let tmp = tempfile::tempdir().expect("tempdir should be created");
    let fs = prepare_fs(tmp.path());
    exercise_compound_keys(&fs)
        .await
        .expect("fs compound keys should work");
}

#[tokio::test(flavor = "current_thread")]
async fn memory_and_fs_clear_expected_same_behavior() {
    let memory = prepare_memory();
    exercise_key_order(&memory).await.expect("seed should succeed");
    exercise_clear(&memory).await.expect("memory clear should succeed");

    let tmp = tempfile::tempdir().expect("tempdir should be created");
    let fs = prepare_fs(tmp.path());
    exercise_key_order(&fs).await.expect("seed should succeed");
    exercise_clear(&fs).await.expect("fs clear should succeed");

    let reopened = FsStore::new(tmp.path()).expect("fs store should reopen");
    assert!(
        read_all(&reopened, "colors")
            .await
            .expect("read should succeed")
            .is_empty()
    );
}

#[tokio::test(flavor = "current_thread")]
async fn create_container_twice_expected_constraint_error() {
    let store = prepare_memory();
    let error = store
        .create_container("colors", KeySpec::out_of_line())
        .expect_err("second create should fail");
    assert!(matches!(error, StoreError::Constraint(_)));
}
