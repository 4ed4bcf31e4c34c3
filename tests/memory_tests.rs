use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use unistore::options::{self, gcp_writer_options, memory_storage, operation_ctx, reader_options, writer_options};
use unistore::{
    new_storage, Backend, CancellationToken, ListQuery, OperationContext, ReaderOptions,
    SignedUrlOptions, Storage, StorageError, WriterOptions,
};

async fn memory() -> Arc<dyn Storage> {
    match new_storage(Backend::Memory, &[memory_storage(OperationContext::background())]).await {
        Ok(storage) => storage,
        Err(e) => panic!("memory backend failed to start: {e}"),
    }
}

async fn put(storage: &dyn Storage, path: &str, data: &[u8]) {
    let mut writer = storage.write(path, &[]).await.unwrap();
    writer.write_all(data).await.unwrap();
    writer.shutdown().await.unwrap();
}

async fn get(storage: &dyn Storage, path: &str, opts: &[unistore::StorageOption]) -> Vec<u8> {
    let mut reader = storage.read(path, opts).await.unwrap();
    let mut body = Vec::new();
    reader.read_to_end(&mut body).await.unwrap();
    body
}

#[tokio::test]
async fn write_then_exists() {
    let storage = memory().await;

    assert!(!storage.is_exists("test/key1", &[]).await.unwrap());
    put(storage.as_ref(), "test/key1", b"abc").await;
    assert!(storage.is_exists("test/key1", &[]).await.unwrap());
}

#[tokio::test]
async fn round_trip_preserves_bytes() {
    let storage = memory().await;
    let data: Vec<u8> = (0..300_000u32).map(|i| (i % 251) as u8).collect();

    put(storage.as_ref(), "k", &data).await;
    assert_eq!(get(storage.as_ref(), "k", &[]).await, data);
}

#[tokio::test]
async fn write_overwrites_existing_object() {
    let storage = memory().await;

    put(storage.as_ref(), "doc.txt", b"first").await;
    put(storage.as_ref(), "doc.txt", b"second").await;
    assert_eq!(get(storage.as_ref(), "doc.txt", &[]).await, b"second");
}

#[tokio::test]
async fn dropped_writer_commits_nothing() {
    let storage = memory().await;

    let mut writer = storage.write("draft", &[]).await.unwrap();
    writer.write_all(b"unfinished").await.unwrap();
    drop(writer);

    assert!(!storage.is_exists("draft", &[]).await.unwrap());
}

#[tokio::test]
async fn read_missing_object_is_not_found() {
    let storage = memory().await;

    let err = storage.read("nope", &[]).await.unwrap_err();
    assert!(err.is_not_found(), "unexpected error: {err}");
}

#[tokio::test]
async fn read_with_expired_deadline_fails_before_data() {
    let storage = memory().await;
    put(storage.as_ref(), "slow", b"payload").await;

    let ctx = OperationContext::with_timeout(Duration::ZERO);
    let err = storage.read("slow", &[operation_ctx(ctx)]).await.unwrap_err();
    assert!(matches!(err, StorageError::DeadlineExceeded));
}

#[tokio::test]
async fn cancelled_context_fails_operations() {
    let storage = memory().await;
    put(storage.as_ref(), "c", b"x").await;

    let token = CancellationToken::new();
    token.cancel();
    let opts = [operation_ctx(OperationContext::with_cancellation(token))];

    assert!(matches!(storage.read("c", &opts).await.unwrap_err(), StorageError::Cancelled));
    assert!(matches!(storage.is_exists("c", &opts).await.unwrap_err(), StorageError::Cancelled));
    assert!(matches!(storage.write("c", &opts).await.unwrap_err(), StorageError::Cancelled));
    assert!(matches!(
        storage.list_object(&ListQuery::default(), &opts).await.unwrap_err(),
        StorageError::Cancelled
    ));
}

#[tokio::test]
async fn writer_fails_once_context_ends() {
    let storage = memory().await;
    let token = CancellationToken::new();
    let opts = [operation_ctx(OperationContext::with_cancellation(token.clone()))];

    let mut writer = storage.write("w", &opts).await.unwrap();
    writer.write_all(b"part one").await.unwrap();
    token.cancel();

    let err = writer.shutdown().await.unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::Interrupted);
    assert!(!storage.is_exists("w", &[]).await.unwrap());
}

#[tokio::test]
async fn generous_deadline_does_not_interfere() {
    let storage = memory().await;
    put(storage.as_ref(), "ok", b"fine").await;

    let opts = [operation_ctx(OperationContext::with_timeout(Duration::from_secs(30)))];
    assert_eq!(get(storage.as_ref(), "ok", &opts).await, b"fine");
    assert!(storage.is_exists("ok", &opts).await.unwrap());
}

#[tokio::test]
async fn list_by_prefix_returns_exact_set() {
    let storage = memory().await;
    for key in ["a/1", "a/2", "a/sub/3", "ab/4", "b/5"] {
        put(storage.as_ref(), key, b"-").await;
    }

    let a: HashSet<String> = storage
        .list_object(&ListQuery::prefix("a/"), &[])
        .await
        .unwrap()
        .into_iter()
        .collect();
    let b = storage.list_object(&ListQuery::prefix("b/"), &[]).await.unwrap();
    let a_again: HashSet<String> = storage
        .list_object(&ListQuery::prefix("a/"), &[])
        .await
        .unwrap()
        .into_iter()
        .collect();

    let expected: HashSet<String> = ["a/1", "a/2", "a/sub/3"].iter().map(|s| s.to_string()).collect();
    assert_eq!(a, expected);
    assert_eq!(a_again, expected);
    assert_eq!(b, vec!["b/5".to_string()]);
}

#[tokio::test]
async fn list_with_partial_segment_prefix() {
    let storage = memory().await;
    for key in ["logs/app-1", "logs/app-2", "logs/db-1"] {
        put(storage.as_ref(), key, b"-").await;
    }

    let mut names = storage.list_object(&ListQuery::prefix("logs/app"), &[]).await.unwrap();
    names.sort();
    assert_eq!(names, vec!["logs/app-1".to_string(), "logs/app-2".to_string()]);
}

#[tokio::test]
async fn list_with_delimiter_collapses_directories() {
    let storage = memory().await;
    for key in ["root.txt", "docs/a.md", "docs/b.md", "img/x/y.png"] {
        put(storage.as_ref(), key, b"-").await;
    }

    let mut names = storage.list_object(&ListQuery::new("", "/"), &[]).await.unwrap();
    names.sort();
    assert_eq!(
        names,
        vec!["docs/".to_string(), "img/".to_string(), "root.txt".to_string()]
    );
}

#[tokio::test]
async fn list_with_delimiter_under_partial_prefix() {
    let storage = memory().await;
    for key in ["a/b1.txt", "a/b/deep/1", "a/b/2", "a/bc/3", "a/c.txt", "z"] {
        put(storage.as_ref(), key, b"-").await;
    }

    let names = storage.list_object(&ListQuery::new("a/b", "/"), &[]).await.unwrap();
    assert_eq!(
        names,
        vec!["a/b/".to_string(), "a/b1.txt".to_string(), "a/bc/".to_string()]
    );
}

#[tokio::test]
async fn listed_names_are_usable_keys() {
    let storage = memory().await;
    let key = "docs/résumé 2024 #1.pdf";
    put(storage.as_ref(), key, b"%PDF").await;

    let names = storage.list_object(&ListQuery::prefix("docs/"), &[]).await.unwrap();
    assert_eq!(names, vec![key.to_string()]);
    assert!(storage.is_exists(&names[0], &[]).await.unwrap());
    assert_eq!(get(storage.as_ref(), &names[0], &[]).await, b"%PDF");

    let names = storage.list_object(&ListQuery::prefix("docs/ré"), &[]).await.unwrap();
    assert_eq!(names, vec![key.to_string()]);
    let names = storage.list_object(&ListQuery::new("docs/", "/"), &[]).await.unwrap();
    assert_eq!(names, vec![key.to_string()]);

    let reader = storage.read(key, &[]).await.unwrap();
    assert_eq!(reader.meta().location.to_string(), key);
    assert_eq!(reader.content_type(), Some("application/pdf"));
}

#[tokio::test]
async fn keys_that_would_be_rewritten_are_rejected() {
    let storage = memory().await;

    for key in ["r//double", "r/dir/", "/abs", ""] {
        let err = storage.write(key, &[]).await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidPath { .. }), "{key:?} gave {err}");
        let err = storage.is_exists(key, &[]).await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidPath { .. }), "{key:?} gave {err}");
        let err = storage.read(key, &[]).await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidPath { .. }), "{key:?} gave {err}");
    }
    assert!(storage.list_object(&ListQuery::default(), &[]).await.unwrap().is_empty());
}

#[tokio::test]
async fn list_of_empty_store_is_empty() {
    let storage = memory().await;
    assert!(storage.list_object(&ListQuery::default(), &[]).await.unwrap().is_empty());
}

#[tokio::test]
async fn range_read_returns_slice() {
    let storage = memory().await;
    put(storage.as_ref(), "digits", b"0123456789").await;

    let opts = [reader_options(
        Backend::Memory,
        ReaderOptions {
            range: Some(2..6),
            ..Default::default()
        },
    )];
    assert_eq!(get(storage.as_ref(), "digits", &opts).await, b"2345");
}

#[tokio::test]
async fn tuning_for_other_backends_is_ignored() {
    let storage = memory().await;
    put(storage.as_ref(), "digits", b"0123456789").await;

    let opts = [options::gcp_reader_options(ReaderOptions {
        range: Some(0..1),
        ..Default::default()
    })];
    assert_eq!(get(storage.as_ref(), "digits", &opts).await, b"0123456789");
}

#[tokio::test]
async fn writer_sets_content_type() {
    let storage = memory().await;

    put(storage.as_ref(), "page.html", b"<p>hi</p>").await;
    let reader = storage.read("page.html", &[]).await.unwrap();
    assert_eq!(reader.content_type(), Some("text/html"));

    let opts = [
        writer_options(
            Backend::Memory,
            WriterOptions {
                content_type: Some("application/x-custom".to_string()),
                ..Default::default()
            },
        ),
        gcp_writer_options(WriterOptions {
            content_type: Some("text/plain".to_string()),
            ..Default::default()
        }),
    ];
    let mut writer = storage.write("page.html", &opts).await.unwrap();
    writer.write_all(b"<p>bye</p>").await.unwrap();
    writer.shutdown().await.unwrap();

    let reader = storage.read("page.html", &[]).await.unwrap();
    assert_eq!(reader.content_type(), Some("application/x-custom"));
    assert_eq!(reader.meta().size, 10);
}

#[tokio::test]
async fn signed_url_requires_options() {
    let storage = memory().await;

    let err = storage.get_signed_url("k", None).await.unwrap_err();
    assert!(matches!(err, StorageError::MissingSignedUrlOptions));
    assert_eq!(err.to_string(), "must specify signed URL options");

    let opts = SignedUrlOptions::new(http::Method::GET, Utc::now() + chrono::Duration::minutes(10));
    let err = storage.get_signed_url("k", Some(&opts)).await.unwrap_err();
    assert!(matches!(err, StorageError::NotSupported { .. }));
}

#[tokio::test]
async fn close_is_idempotent_and_final() {
    let storage = memory().await;
    put(storage.as_ref(), "k", b"v").await;

    storage.close().await.unwrap();
    storage.close().await.unwrap();

    assert!(matches!(storage.read("k", &[]).await.unwrap_err(), StorageError::Closed));
    assert!(matches!(storage.write("k", &[]).await.unwrap_err(), StorageError::Closed));
    assert!(matches!(storage.is_exists("k", &[]).await.unwrap_err(), StorageError::Closed));
    assert!(matches!(
        storage.list_object(&ListQuery::default(), &[]).await.unwrap_err(),
        StorageError::Closed
    ));
    assert!(matches!(
        storage.get_signed_url("k", None).await.unwrap_err(),
        StorageError::MissingSignedUrlOptions
    ));
}

#[tokio::test]
async fn open_reader_survives_close() {
    let storage = memory().await;
    put(storage.as_ref(), "k", b"still here").await;

    let mut reader = storage.read("k", &[]).await.unwrap();
    storage.close().await.unwrap();

    let mut body = Vec::new();
    reader.read_to_end(&mut body).await.unwrap();
    assert_eq!(body, b"still here");
}

#[tokio::test]
async fn expired_init_context_fails_construction() {
    let opts = [memory_storage(OperationContext::with_timeout(Duration::ZERO))];
    let result = new_storage(Backend::Memory, &opts).await;
    assert!(matches!(result, Err(StorageError::DeadlineExceeded)));
}

#[tokio::test]
async fn adapter_is_shareable_across_tasks() {
    let storage = memory().await;

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let storage = storage.clone();
            tokio::spawn(async move {
                let key = format!("parallel/{i}");
                put(storage.as_ref(), &key, key.as_bytes()).await;
                get(storage.as_ref(), &key, &[]).await
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.await.unwrap(), format!("parallel/{i}").into_bytes());
    }
    assert_eq!(
        storage.list_object(&ListQuery::prefix("parallel/"), &[]).await.unwrap().len(),
        8
    );
}
