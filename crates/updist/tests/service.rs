use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use updist::cdk::{AcceptAll, CdkError, CdkValidator, CdkVerdict};
use updist::config::Settings;
use updist::{App, Error, Release, UpdateKind, UpdateQuery, UpdateService};
use updist_resource::{Arch, Channel, Os, Platform};
use updist_task::TaskStatus;

const PLATFORM: Platform = Platform {
    os:   Os::Windows,
    arch: Arch::X64,
};

struct RejectAll;

#[async_trait]
impl CdkValidator for RejectAll {
    async fn validate(&self, _cdk: &str, _resource_id: &str, _ip: Option<&str>) -> Result<CdkVerdict, CdkError> {
        Ok(CdkVerdict::Rejected("subscription expired".into()))
    }
}

struct Harness {
    root:     TempDir,
    _staging: TempDir,
    app:      App,
    service:  Arc<UpdateService>,
}

impl Harness {
    fn new(daily_limit: u64, validator: Arc<dyn CdkValidator>) -> Self {
        let root = tempfile::tempdir().unwrap();
        let staging = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.storage.root = root.path().to_path_buf();
        settings.storage.staging = Some(staging.path().to_path_buf());
        settings.task.retry_base_ms = 1;
        settings.distribute.daily_limit = daily_limit;
        settings.distribute.cdn.base_url = "https://cdn.example.com".into();
        settings.distribute.cdn.secret = "secret".into();
        let settings = settings.validate().unwrap();

        let app = App::build_with(&settings, validator).unwrap();
        let service = app.service();
        Self {
            root,
            _staging: staging,
            app,
            service,
        }
    }

    fn upload(&self, name: &str, files: &[(&str, &str)]) -> String {
        let rel = format!("uploads/{name}");
        for (path, body) in files {
            let dest = self.root.path().join(&rel).join(path);
            std::fs::create_dir_all(dest.parent().unwrap()).unwrap();
            std::fs::write(dest, body).unwrap();
        }
        rel
    }

    async fn release(&self, name: &str, channel: Channel, files: &[(&str, &str)]) {
        let published = self
            .service
            .publish(Release {
                resource_id:  "app".into(),
                channel,
                name:         name.into(),
                release_note: Some(format!("notes for {name}")),
                custom_data:  None,
                source_path:  self.upload(name, files),
                platform:     PLATFORM,
            })
            .await
            .unwrap();
        let service = &self.service;
        let key = published.status_key.as_str();
        wait_for(|| async move { service.task_status(key).await.unwrap() }).await;
    }

    async fn wait_for_patch(&self, current: &str, target: &str) {
        let service = &self.service;
        wait_for(|| async move {
            service
                .patch_status("app", current, target, PLATFORM)
                .await
                .unwrap()
        })
        .await;
    }
}

async fn wait_for<F, Fut>(status: F)
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = TaskStatus>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        match status().await {
            TaskStatus::Completed => return,
            TaskStatus::Failed => panic!("background task failed"),
            _ if tokio::time::Instant::now() > deadline => panic!("background task timed out"),
            _ => tokio::time::sleep(Duration::from_millis(10)).await,
        }
    }
}

fn query(current: Option<&str>, cdk: Option<&str>) -> UpdateQuery {
    UpdateQuery {
        resource_id:     "app".into(),
        current_version: current.map(Into::into),
        os:              "windows".into(),
        arch:            "x64".into(),
        channel:         "stable".into(),
        cdk:             cdk.map(Into::into),
        region:          None,
        client_ip:       Some("10.0.0.1".into()),
    }
}

fn exists(root: &Path, url: &str) -> bool {
    let path = url
        .strip_prefix("https://cdn.example.com/")
        .and_then(|rest| rest.split('?').next())
        .unwrap();
    root.join(path).is_file()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn full_then_incremental() {
    let h = Harness::new(0, Arc::new(AcceptAll));
    h.release("1.0.0", Channel::Stable, &[("app.exe", "v1"), ("old.dll", "gone")]).await;

    let fresh = h.service.query(&query(None, Some("cdk"))).await.unwrap();
    assert_eq!(fresh.version_name, "1.0.0");
    let download = fresh.download.unwrap();
    assert_eq!(download.kind, UpdateKind::Full);
    assert!(exists(h.root.path(), &download.url));

    h.release("1.1.0", Channel::Stable, &[("app.exe", "v2"), ("new.dll", "new")]).await;

    let first = h.service.query(&query(Some("1.0.0"), Some("cdk"))).await.unwrap();
    assert_eq!(first.version_name, "1.1.0");
    assert_eq!(first.download.unwrap().kind, UpdateKind::Full);

    h.wait_for_patch("1.0.0", "1.1.0").await;
    let second = h.service.query(&query(Some("1.0.0"), Some("cdk"))).await.unwrap();
    let download = second.download.unwrap();
    assert_eq!(download.kind, UpdateKind::Incremental);
    assert!(download.url.contains("/patches/"));
    assert!(exists(h.root.path(), &download.url));

    let target = h.service.resolve_download(&download.download_key).await.unwrap();
    assert_eq!(target.cdk, "cdk");
    assert!(target.path.starts_with("patches/"));

    h.app.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn up_to_date_and_anonymous_queries_carry_no_download() {
    let h = Harness::new(0, Arc::new(AcceptAll));
    h.release("1.0.0", Channel::Stable, &[("app.exe", "v1")]).await;

    let current = h.service.query(&query(Some("1.0.0"), Some("cdk"))).await.unwrap();
    assert!(current.up_to_date);
    assert!(current.download.is_none());

    let anonymous = h.service.query(&query(None, None)).await.unwrap();
    assert!(!anonymous.up_to_date);
    assert!(anonymous.download.is_none());
    assert_eq!(anonymous.release_note.as_deref(), Some("notes for 1.0.0"));

    h.app.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn metadata_edits_are_visible_immediately() {
    let h = Harness::new(0, Arc::new(AcceptAll));
    h.release("1.0.0", Channel::Stable, &[("app.exe", "v1")]).await;

    let before = h.service.query(&query(None, None)).await.unwrap();
    assert_eq!(before.release_note.as_deref(), Some("notes for 1.0.0"));

    let updated = h
        .service
        .update_metadata("app", "1.0.0", Some("hotfix notes".into()), Some("{}".into()))
        .await
        .unwrap();
    assert_eq!(updated.sequence, 1);

    let after = h.service.query(&query(None, None)).await.unwrap();
    assert_eq!(after.release_note.as_deref(), Some("hotfix notes"));
    assert_eq!(after.custom_data.as_deref(), Some("{}"));

    h.app.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn daily_limit_applies_per_key() {
    let h = Harness::new(2, Arc::new(AcceptAll));
    h.release("1.0.0", Channel::Stable, &[("app.exe", "v1")]).await;

    for _ in 0..2 {
        h.service.query(&query(None, Some("cdk-1"))).await.unwrap();
    }
    let err = h.service.query(&query(None, Some("cdk-1"))).await.unwrap_err();
    assert!(matches!(err, Error::RateLimited { limit: 2, .. }));
    assert!(err.is_client_facing());
    assert!(h.service.query(&query(None, Some("cdk-2"))).await.is_ok());

    h.app.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn rejected_keys_surface_the_validator_message() {
    let h = Harness::new(0, Arc::new(RejectAll));
    h.release("1.0.0", Channel::Stable, &[("app.exe", "v1")]).await;

    let err = h.service.query(&query(None, Some("cdk"))).await.unwrap_err();
    assert!(matches!(&err, Error::CdkRejected(msg) if msg == "subscription expired"));
    assert_eq!(err.public_message(), "license key rejected: subscription expired");

    h.app.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn invalid_and_unknown_requests() {
    let h = Harness::new(0, Arc::new(AcceptAll));

    let mut bad = query(None, None);
    bad.os = "plan9".into();
    assert!(matches!(h.service.query(&bad).await, Err(Error::Validation(_))));

    let missing = h.service.query(&query(None, None)).await.unwrap_err();
    assert!(missing.is_not_found());
    assert!(h.service.resolve_download("nope").await.unwrap_err().is_not_found());

    h.app.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stable_release_cascades_to_beta() {
    let h = Harness::new(0, Arc::new(AcceptAll));
    h.release("1.0.0-beta.1", Channel::Beta, &[("app.exe", "b1")]).await;
    h.release("1.0.0", Channel::Stable, &[("app.exe", "v1")]).await;

    let mut beta = query(None, None);
    beta.channel = "beta".into();
    let answer = h.service.query(&beta).await.unwrap();
    assert_eq!(answer.version_name, "1.0.0");

    h.app.shutdown().await;
}
