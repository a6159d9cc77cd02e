//! End-to-end tests over a fake rule service, on-disk storage, and the
//! bundled adblock engine.

use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use tempfile::TempDir;

use rulegate::{
    all_rulesets, AdTrackerBlockerClient, BlockingException, CheckUrlResult, ClientConfig, Error,
    FileStorageProvider, FilterEngineStatus, ObjectInfo, ObjectStore, RulesetType, StorageProvider,
    StoreError,
};

const ADS_RULES: &str = "||ad.doubleclick.net^\n||doubleclick.net^\n";
const PRIVACY_RULES: &str = "/ptracking?\n";
const SOCIAL_RULES: &str = "||facebook.com/plugins/^\n";

const BLOCKED_URL: &str = "http://ad.doubleclick.net";
const ALLOWED_URL: &str = "http://anonyome.com/about.js";
const SOURCE_URL: &str = "http://somehost.eu/contact";

/// Fake remote service publishing the three filter lists.
struct FakeRuleService {
    downloads: AtomicUsize,
}

impl FakeRuleService {
    fn new() -> Self {
        Self {
            downloads: AtomicUsize::new(0),
        }
    }

    fn object(key: &str, e_tag: &str, category: &str) -> ObjectInfo {
        let mut user_metadata = HashMap::new();
        user_metadata.insert(
            "serviceblob".to_string(),
            format!(r#"{{"categoryEnum":"{category}"}}"#),
        );
        ObjectInfo {
            key: key.to_string(),
            e_tag: e_tag.to_string(),
            last_modified: SystemTime::UNIX_EPOCH,
            user_metadata,
        }
    }
}

#[async_trait]
impl ObjectStore for FakeRuleService {
    async fn list(&self, _path: &str) -> Result<Vec<ObjectInfo>, StoreError> {
        Ok(vec![
            Self::object("ads", "etag-ads-1", "AD"),
            Self::object("privacy", "etag-privacy-1", "PRIVACY"),
            Self::object("social", "etag-social-1", "SOCIAL"),
        ])
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>, StoreError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        if path.ends_with("adblock-plus/AD/easylist.txt") {
            Ok(ADS_RULES.as_bytes().to_vec())
        } else if path.ends_with("adblock-plus/PRIVACY/easyprivacy.txt") {
            Ok(PRIVACY_RULES.as_bytes().to_vec())
        } else if path.ends_with("adblock-plus/SOCIAL/fanboy-social.txt") {
            Ok(SOCIAL_RULES.as_bytes().to_vec())
        } else {
            Err(StoreError::NotFound(path.to_string()))
        }
    }
}

struct Fixture {
    client: AdTrackerBlockerClient,
    service: Arc<FakeRuleService>,
    storage: Arc<FileStorageProvider>,
    _dir: TempDir,
}

fn fixture() -> Fixture {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = tempfile::tempdir().unwrap();
    let service = Arc::new(FakeRuleService::new());
    let storage = Arc::new(FileStorageProvider::new(dir.path()));
    let client = AdTrackerBlockerClient::new(ClientConfig {
        object_store: Some(service.clone()),
        storage: Some(storage.clone()),
        ..ClientConfig::default()
    })
    .unwrap();
    Fixture {
        client,
        service,
        storage,
        _dir: dir,
    }
}

async fn await_settled(client: &AdTrackerBlockerClient) -> FilterEngineStatus {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let status = client.status();
        if status != FilterEngineStatus::Preparing {
            return status;
        }
        if tokio::time::Instant::now() >= deadline {
            return status;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

/// Download everything and make all three categories active.
async fn activate_all(fixture: &Fixture) {
    fixture.client.update_rulesets(&all_rulesets()).await.unwrap();
    fixture
        .client
        .set_active_rulesets(&all_rulesets())
        .await
        .unwrap();
    assert_eq!(fixture.client.status(), FilterEngineStatus::Ready);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_list_rulesets_reflects_the_service() {
    let fixture = fixture();
    let rulesets = fixture.client.list_rulesets().await.unwrap();

    assert_eq!(rulesets.len(), 3);
    let kinds: HashSet<RulesetType> = rulesets.iter().map(|r| r.kind).collect();
    assert_eq!(
        kinds,
        HashSet::from([
            RulesetType::AdBlocking,
            RulesetType::Privacy,
            RulesetType::Social,
        ])
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_active_rulesets_roundtrip_as_a_set() {
    let fixture = fixture();
    await_settled(&fixture.client).await;
    activate_all(&fixture).await;

    let active: HashSet<RulesetType> = fixture
        .client
        .get_active_rulesets()
        .await
        .unwrap()
        .into_iter()
        .collect();
    assert_eq!(
        active,
        HashSet::from([
            RulesetType::AdBlocking,
            RulesetType::Privacy,
            RulesetType::Social,
        ])
    );

    // Narrowing the set replaces it, UNKNOWN is discarded
    fixture
        .client
        .set_active_rulesets(&[RulesetType::Privacy, RulesetType::Unknown])
        .await
        .unwrap();
    let active = fixture.client.get_active_rulesets().await.unwrap();
    assert_eq!(active, vec![RulesetType::Privacy]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_update_rulesets_skips_unchanged_etags() {
    let fixture = fixture();
    await_settled(&fixture.client).await;

    fixture.client.update_rulesets(&all_rulesets()).await.unwrap();
    assert_eq!(fixture.service.downloads.load(Ordering::SeqCst), 3);

    // ETags unchanged, nothing is fetched again
    fixture.client.update_rulesets(&all_rulesets()).await.unwrap();
    assert_eq!(fixture.service.downloads.load(Ordering::SeqCst), 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_check_url_blocks_and_allows() {
    let fixture = fixture();
    await_settled(&fixture.client).await;
    activate_all(&fixture).await;

    assert_eq!(
        fixture
            .client
            .check_url(BLOCKED_URL, Some(SOURCE_URL), None)
            .await
            .unwrap(),
        CheckUrlResult::Blocked
    );
    assert_eq!(
        fixture
            .client
            .check_url(ALLOWED_URL, Some(SOURCE_URL), None)
            .await
            .unwrap(),
        CheckUrlResult::Allowed
    );
    assert_eq!(
        fixture
            .client
            .check_url(
                "http://youtube.com/ptracking?html5=1",
                Some("http://youtube.com"),
                None,
            )
            .await
            .unwrap(),
        CheckUrlResult::Blocked
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_host_exception_overrides_blocking() {
    let fixture = fixture();
    await_settled(&fixture.client).await;
    activate_all(&fixture).await;

    fixture
        .client
        .add_exceptions(&[BlockingException::for_host("somehost.eu").unwrap()])
        .await
        .unwrap();

    // The same blocked request is now allowed for that source page
    assert_eq!(
        fixture
            .client
            .check_url(BLOCKED_URL, Some(SOURCE_URL), None)
            .await
            .unwrap(),
        CheckUrlResult::Allowed
    );

    // Without a source page the exception does not apply
    assert_eq!(
        fixture
            .client
            .check_url(BLOCKED_URL, None, None)
            .await
            .unwrap(),
        CheckUrlResult::Blocked
    );
    assert_eq!(
        fixture
            .client
            .check_url(BLOCKED_URL, Some(""), None)
            .await
            .unwrap(),
        CheckUrlResult::Blocked
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_page_exception_covers_only_that_page() {
    let fixture = fixture();
    await_settled(&fixture.client).await;
    activate_all(&fixture).await;

    fixture
        .client
        .add_exceptions(&[BlockingException::for_page("http://somehost.eu/contact").unwrap()])
        .await
        .unwrap();

    assert_eq!(
        fixture
            .client
            .check_url(BLOCKED_URL, Some("http://somehost.eu/contact"), None)
            .await
            .unwrap(),
        CheckUrlResult::Allowed
    );
    assert_eq!(
        fixture
            .client
            .check_url(BLOCKED_URL, Some("http://somehost.eu/news"), None)
            .await
            .unwrap(),
        CheckUrlResult::Blocked
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_adding_the_same_exception_twice_is_idempotent() {
    let fixture = fixture();
    await_settled(&fixture.client).await;

    let exception = BlockingException::for_host("somehost.eu").unwrap();
    fixture
        .client
        .add_exceptions(&[exception.clone()])
        .await
        .unwrap();
    fixture.client.add_exceptions(&[exception]).await.unwrap();

    assert_eq!(fixture.client.get_exceptions().await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_remove_exceptions_restores_blocking() {
    let fixture = fixture();
    await_settled(&fixture.client).await;
    activate_all(&fixture).await;

    let exception = BlockingException::for_host("somehost.eu").unwrap();
    fixture
        .client
        .add_exceptions(&[exception.clone()])
        .await
        .unwrap();
    fixture
        .client
        .remove_exceptions(&[exception])
        .await
        .unwrap();

    assert!(fixture.client.get_exceptions().await.unwrap().is_empty());
    assert_eq!(
        fixture
            .client
            .check_url(BLOCKED_URL, Some(SOURCE_URL), None)
            .await
            .unwrap(),
        CheckUrlResult::Blocked
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_remove_all_exceptions() {
    let fixture = fixture();
    await_settled(&fixture.client).await;

    fixture
        .client
        .add_exceptions(&[
            BlockingException::for_host("somehost.eu").unwrap(),
            BlockingException::for_page("other.org/news").unwrap(),
        ])
        .await
        .unwrap();
    assert_eq!(fixture.client.get_exceptions().await.unwrap().len(), 2);

    fixture.client.remove_all_exceptions().await.unwrap();
    assert!(fixture.client.get_exceptions().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_update_does_not_rebuild_but_activation_does() {
    let fixture = fixture();
    await_settled(&fixture.client).await;
    activate_all(&fixture).await;

    assert_eq!(
        fixture
            .client
            .check_url(BLOCKED_URL, Some(SOURCE_URL), None)
            .await
            .unwrap(),
        CheckUrlResult::Blocked
    );

    // Deactivate everything: the engine compiles zero matchers and the
    // client is permissive by default
    fixture.client.set_active_rulesets(&[]).await.unwrap();
    assert_eq!(fixture.client.status(), FilterEngineStatus::Ready);
    assert_eq!(
        fixture
            .client
            .check_url(BLOCKED_URL, Some(SOURCE_URL), None)
            .await
            .unwrap(),
        CheckUrlResult::Allowed
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_clear_storage_resets_everything() {
    let fixture = fixture();
    await_settled(&fixture.client).await;
    activate_all(&fixture).await;

    fixture
        .client
        .add_exceptions(&[BlockingException::for_host("somehost.eu").unwrap()])
        .await
        .unwrap();

    fixture.client.clear_storage().await.unwrap();

    assert!(fixture.client.get_active_rulesets().await.unwrap().is_empty());
    assert!(fixture.storage.list_files().unwrap().is_empty());
    assert_eq!(
        fixture.storage.read_file_etag("easylist.txt").unwrap(),
        None
    );
}

/// Storage wrapper that stalls the first preference read so the initial
/// rebuild stays in PREPARING long enough to observe it.
struct SlowStorage {
    inner: FileStorageProvider,
    delay: Duration,
}

impl StorageProvider for SlowStorage {
    fn read(&self, file_name: &str) -> io::Result<Option<Vec<u8>>> {
        self.inner.read(file_name)
    }
    fn write(&self, file_name: &str, data: &[u8]) -> io::Result<()> {
        self.inner.write(file_name, data)
    }
    fn delete(&self, file_name: &str) -> io::Result<bool> {
        self.inner.delete(file_name)
    }
    fn delete_files(&self) -> io::Result<()> {
        self.inner.delete_files()
    }
    fn list_files(&self) -> io::Result<Vec<String>> {
        self.inner.list_files()
    }
    fn read_file_etag(&self, file_name: &str) -> io::Result<Option<String>> {
        self.inner.read_file_etag(file_name)
    }
    fn write_file_etag(&self, file_name: &str, e_tag: &str) -> io::Result<()> {
        self.inner.write_file_etag(file_name, e_tag)
    }
    fn delete_file_etag(&self, file_name: &str) -> io::Result<bool> {
        self.inner.delete_file_etag(file_name)
    }
    fn delete_file_etags(&self) -> io::Result<()> {
        self.inner.delete_file_etags()
    }
    fn read_preferences(&self) -> io::Result<HashMap<String, String>> {
        std::thread::sleep(self.delay);
        self.inner.read_preferences()
    }
    fn write_preferences(&self, preferences: &HashMap<String, String>) -> io::Result<()> {
        self.inner.write_preferences(preferences)
    }
    fn delete_preferences(&self) -> io::Result<()> {
        self.inner.delete_preferences()
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_check_url_rejects_while_preparing() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(SlowStorage {
        inner: FileStorageProvider::new(dir.path()),
        delay: Duration::from_millis(500),
    });
    let client = AdTrackerBlockerClient::new(ClientConfig {
        object_store: Some(Arc::new(FakeRuleService::new())),
        storage: Some(storage),
        ..ClientConfig::default()
    })
    .unwrap();

    assert_eq!(client.status(), FilterEngineStatus::Preparing);
    let denied = client.check_url(BLOCKED_URL, None, None).await;
    match denied {
        Err(Error::FilterEngineNotReady(status)) => {
            assert_eq!(status, FilterEngineStatus::Preparing)
        }
        other => panic!("expected FilterEngineNotReady, got {other:?}"),
    }

    assert_eq!(await_settled(&client).await, FilterEngineStatus::Ready);
}
