//! Browser session integration tests
//!
//! NIST 800-53: AC-3 (Access Enforcement), AU-2 (Audit Events)
//! Implementation: Drives sessions against an in-memory object store and
//! checks that tree, index and store stay in step

use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, PutPayload};
use std::io::Read;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::io::AsyncReadExt;
use treeport_core::{DirectoryMapping, StaticMappings, TreeProjector, UploadConfig};
use treeport_transfer::{
    AuditLogger, BrowserSession, Error, MemoryAuditSink, ObjectLister, S3Transport,
    TempUpload,
};

const USER: u64 = 10;

struct Fixture {
    session: BrowserSession,
    store: Arc<InMemory>,
    audit: MemoryAuditSink,
    _dir: TempDir,
}

async fn fixture(objects: &[(&str, &str)]) -> Fixture {
    let store = Arc::new(InMemory::new());
    for (key, body) in objects {
        store
            .put(&ObjectPath::from(*key), PutPayload::from(body.as_bytes().to_vec()))
            .await
            .unwrap();
    }

    let audit = MemoryAuditSink::new();
    let transport = Arc::new(S3Transport::with_store(
        store.clone(),
        "bucket",
        UploadConfig::default(),
        AuditLogger::new("s", Arc::new(audit.clone())),
    ));
    let mappings = StaticMappings::new([
        DirectoryMapping::new(1, USER, "/personal", "/bucket/alice", true),
        DirectoryMapping::new(2, USER, "/shared", "/bucket/shared", false),
        DirectoryMapping::new(3, 99, "/other", "/bucket/bob", true),
    ]);

    let (session, report) = BrowserSession::open(
        USER,
        &mappings,
        TreeProjector::new("bucket"),
        transport.clone(),
        transport,
    )
    .await;
    assert!(report.is_complete());

    Fixture {
        session,
        store,
        audit,
        _dir: TempDir::new().unwrap(),
    }
}

fn stage(dir: &TempDir, name: &str, body: &str) -> TempUpload {
    let path = dir.path().join(format!("staged-{}", name));
    std::fs::write(&path, body).unwrap();
    TempUpload::new(path, name)
}

async fn stored_keys(store: &Arc<InMemory>, prefix: &str) -> Vec<String> {
    let lister = S3Transport::with_store(
        store.clone(),
        "bucket",
        UploadConfig::default(),
        AuditLogger::disabled(),
    );
    let mut keys: Vec<_> = lister.list(prefix).await.unwrap().into_iter().map(|o| o.key).collect();
    keys.sort();
    keys
}

#[tokio::test]
async fn test_open_builds_one_root_per_mapping() {
    let f = fixture(&[
        ("alice/a.txt", "a"),
        ("alice/sub/b.txt", "bb"),
        ("shared/policy.pdf", "p"),
        ("bob/private.txt", "x"),
    ])
    .await;

    let roots = f.session.roots().await;
    let labels: Vec<_> = roots.iter().map(|r| r.label.as_str()).collect();
    assert_eq!(labels, vec!["/personal", "/shared"]);

    let files = f.session.files(1, "alice/").await.unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].label, "a.txt");
    assert_eq!(files[0].size_bytes, Some(1));

    let folders = f.session.folders(1, "alice/").await.unwrap();
    assert_eq!(folders.len(), 1);
    assert_eq!(folders[0].key, "alice/sub");
    assert_eq!(folders[0].size_bytes, None);

    // Other users' mappings are never projected
    assert!(f.session.files(3, "bob/").await.is_err());
}

#[tokio::test]
async fn test_download_streams_and_audits() {
    let f = fixture(&[("alice/sub/b.txt", "hello")]).await;

    let mut stream = f.session.download(1, "alice/sub/b.txt").await.unwrap();
    let mut body = String::new();
    stream.read_to_string(&mut body).await.unwrap();
    drop(stream);

    assert_eq!(body, "hello");
    assert_eq!(
        f.audit.lines(),
        vec![
            "s OPEN Path=/bucket/alice/sub/b.txt Mode=Read Interface=Web".to_string(),
            "s CLOSE Path=/bucket/alice/sub/b.txt BytesOut=5 Interface=Web".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_download_of_folder_is_rejected() {
    let f = fixture(&[("alice/sub/b.txt", "hello")]).await;
    assert!(f.session.download(1, "alice/sub").await.is_err());
    assert!(matches!(
        f.session.download(1, "alice/none.txt").await.err().unwrap(),
        Error::NotFound(_)
    ));
}

#[tokio::test]
async fn test_upload_updates_tree_and_index() {
    let f = fixture(&[("alice/sub/b.txt", "b")]).await;
    let temp = stage(&f._dir, "report.csv", "1,2,3\n");

    let key = f.session.upload(1, "alice/sub", &temp, false, None).await.unwrap();
    assert_eq!(key, "alice/sub/report.csv");

    let files = f.session.files(1, "alice/sub").await.unwrap();
    let labels: Vec<_> = files.iter().map(|e| e.label.as_str()).collect();
    assert_eq!(labels, vec!["b.txt", "report.csv"]);
    assert_eq!(files[1].size_bytes, Some(6));

    assert_eq!(
        stored_keys(&f.store, "alice/").await,
        vec!["alice/sub/b.txt".to_string(), "alice/sub/report.csv".to_string()]
    );
    assert_eq!(f.session.consistency_errors().await, 0);
}

#[tokio::test]
async fn test_upload_requires_consent_to_overwrite() {
    let f = fixture(&[("alice/a.txt", "old")]).await;

    let temp = stage(&f._dir, "a.txt", "new");
    let err = f.session.upload(1, "alice/", &temp, false, None).await.unwrap_err();
    assert!(matches!(err, Error::AlreadyExists(k) if k == "alice/a.txt"));

    f.session.upload(1, "alice/", &temp, true, None).await.unwrap();
    let body = f
        .store
        .get(&ObjectPath::from("alice/a.txt"))
        .await
        .unwrap()
        .bytes()
        .await
        .unwrap();
    assert_eq!(&body[..], b"new");
}

#[tokio::test]
async fn test_special_characters_survive_refresh() {
    let f = fixture(&[("alice/a.txt", "a")]).await;
    let name = "Report #1 50%.pdf";
    let temp = stage(&f._dir, "report", "q3");

    let key = f
        .session
        .upload(1, "alice/", &TempUpload::new(temp.path(), name), false, None)
        .await
        .unwrap();
    assert_eq!(key, "alice/Report #1 50%.pdf");
    assert_eq!(stored_keys(&f.store, "alice/").await, vec![key.clone(), "alice/a.txt".to_string()]);

    let report = f.session.refresh().await;
    assert!(report.is_complete());
    let labels: Vec<_> = f
        .session
        .files(1, "alice/")
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.label)
        .collect();
    assert_eq!(labels, vec![name.to_string(), "a.txt".to_string()]);

    let mut stream = f.session.download(1, &key).await.unwrap();
    let mut body = String::new();
    stream.read_to_string(&mut body).await.unwrap();
    assert_eq!(body, "q3");
}

#[tokio::test]
async fn test_upload_cannot_shadow_folder() {
    let f = fixture(&[("alice/sub/b.txt", "b")]).await;
    let temp = stage(&f._dir, "sub", "x");

    for overwrite in [false, true] {
        let err = f.session.upload(1, "alice/", &temp, overwrite, None).await.unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(k) if k == "alice/sub"));
    }
    assert_eq!(stored_keys(&f.store, "alice/").await, vec!["alice/sub/b.txt".to_string()]);
    assert!(f.audit.lines().is_empty());
}

#[tokio::test]
async fn test_rename_cannot_shadow_folder() {
    let f = fixture(&[("alice/a.txt", "a"), ("alice/sub/b.txt", "b")]).await;

    let err = f.session.rename(1, "alice/a.txt", "sub").await.unwrap_err();
    assert!(matches!(err, Error::AlreadyExists(k) if k == "alice/sub"));
    assert_eq!(
        stored_keys(&f.store, "alice/").await,
        vec!["alice/a.txt".to_string(), "alice/sub/b.txt".to_string()]
    );
    assert_eq!(f.session.files(1, "alice/").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_read_only_mapping_rejects_mutations() {
    let f = fixture(&[("shared/policy.pdf", "p")]).await;
    let temp = stage(&f._dir, "x.txt", "x");

    assert!(matches!(
        f.session.upload(2, "shared/", &temp, false, None).await.unwrap_err(),
        Error::PermissionDenied(_)
    ));
    assert!(matches!(
        f.session.delete(2, "shared/policy.pdf").await.unwrap_err(),
        Error::PermissionDenied(_)
    ));
    assert!(matches!(
        f.session.rename(2, "shared/policy.pdf", "p2.pdf").await.unwrap_err(),
        Error::PermissionDenied(_)
    ));

    // Nothing reached the store
    assert_eq!(stored_keys(&f.store, "shared/").await, vec!["shared/policy.pdf".to_string()]);
    assert!(f.audit.lines().is_empty());
}

#[tokio::test]
async fn test_delete_removes_from_tree_store_and_index() {
    let f = fixture(&[("alice/a.txt", "a"), ("alice/sub/b.txt", "b")]).await;

    f.session.delete(1, "alice/sub/b.txt").await.unwrap();

    assert!(f.session.files(1, "alice/sub").await.unwrap().is_empty());
    assert_eq!(stored_keys(&f.store, "alice/").await, vec!["alice/a.txt".to_string()]);
    assert_eq!(f.audit.lines(), vec!["s DELETE Path=alice/sub/b.txt Interface=Web".to_string()]);

    // The node is gone, so a second delete cannot resolve it
    assert!(matches!(
        f.session.delete(1, "alice/sub/b.txt").await.unwrap_err(),
        Error::NotFound(_)
    ));
}

#[tokio::test]
async fn test_rename_moves_node_and_keeps_size() {
    let f = fixture(&[("alice/a.txt", "abc")]).await;

    let new_key = f.session.rename(1, "alice/a.txt", "z.txt").await.unwrap();
    assert_eq!(new_key, "alice/z.txt");

    let files = f.session.files(1, "alice/").await.unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].label, "z.txt");
    assert_eq!(files[0].size_bytes, Some(3));
    assert_eq!(stored_keys(&f.store, "alice/").await, vec!["alice/z.txt".to_string()]);
}

#[tokio::test]
async fn test_rename_rejects_path_separators() {
    let f = fixture(&[("alice/a.txt", "abc")]).await;
    assert!(f.session.rename(1, "alice/a.txt", "../b.txt").await.is_err());
    assert_eq!(stored_keys(&f.store, "alice/").await, vec!["alice/a.txt".to_string()]);
}

#[tokio::test]
async fn test_zip_names_entries_by_full_key() {
    let f = fixture(&[("alice/a.txt", "first"), ("alice/sub/b.txt", "second")]).await;

    let archive = f
        .session
        .zip(1, &["alice/a.txt".to_string(), "alice/sub/b.txt".to_string()])
        .await
        .unwrap();

    let mut zip = zip::ZipArchive::new(std::io::Cursor::new(archive)).unwrap();
    assert_eq!(zip.len(), 2);

    let mut body = String::new();
    zip.by_name("alice/sub/b.txt").unwrap().read_to_string(&mut body).unwrap();
    assert_eq!(body, "second");

    // One OPEN and one CLOSE per entry
    assert_eq!(f.audit.lines().len(), 4);
}

#[tokio::test]
async fn test_zip_fails_fast_on_missing_object() {
    let f = fixture(&[("alice/a.txt", "first"), ("alice/b.txt", "second")]).await;
    f.store.delete(&ObjectPath::from("alice/b.txt")).await.unwrap();

    let result = f
        .session
        .zip(1, &["alice/a.txt".to_string(), "alice/b.txt".to_string()])
        .await;
    assert!(matches!(result, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn test_refresh_picks_up_external_changes() {
    let f = fixture(&[("alice/a.txt", "a")]).await;
    f.store
        .put(&ObjectPath::from("alice/new/c.txt"), PutPayload::from(b"cc".to_vec()))
        .await
        .unwrap();

    assert!(f.session.folders(1, "alice/").await.unwrap().is_empty());
    let report = f.session.refresh().await;
    assert_eq!(report.mappings, 2);
    assert_eq!(report.objects, 2);

    let folders = f.session.folders(1, "alice/").await.unwrap();
    assert_eq!(folders[0].label, "new");
}

#[tokio::test]
async fn test_render_lists_every_mapping() {
    let f = fixture(&[("alice/sub/b.txt", "b"), ("shared/p.pdf", "p")]).await;
    assert_eq!(
        f.session.render().await,
        "/personal/\n  sub/\n    b.txt\n/shared/\n  p.pdf\n"
    );
}
