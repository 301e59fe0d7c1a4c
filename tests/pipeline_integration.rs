//! End-to-end tests of the import, render and delete pipeline
//!
//! These run against the memory repository and a temporary markup
//! directory, so no database or server is required.

use std::io::{Cursor, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::Notify;
use tokio_test::{assert_err, assert_ok};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use template_service::template::{
    ArchiveFormatError, InvalidArgumentsReason, MarkupStore, MemoryTemplateRepository,
    PageQuery, ParameterSpec, ParameterValue, RenderRequest, RepositoryError, TemplateDescriptor,
    TemplateError, TemplateRepository, TemplateService, TemplateUnitOfWork, TeraRenderEngine,
};

struct TestEnvironment {
    service: Arc<TemplateService>,
    store: Arc<MarkupStore>,
    _dir: TempDir,
}

fn create_test_environment() -> TestEnvironment {
    create_test_environment_with(Arc::new(MemoryTemplateRepository::new()))
}

fn create_test_environment_with(repository: Arc<dyn TemplateRepository>) -> TestEnvironment {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MarkupStore::init(dir.path().join("templates")).unwrap());
    let service = Arc::new(TemplateService::new(
        repository,
        store.clone(),
        Arc::new(TeraRenderEngine::new()),
    ));
    TestEnvironment {
        service,
        store,
        _dir: dir,
    }
}

/// Memory repository whose commits can be held open, to interleave
/// operations with a unit of work that has not yet committed
struct GatedRepository {
    inner: MemoryTemplateRepository,
    gate: Arc<CommitGate>,
}

#[derive(Default)]
struct CommitGate {
    armed: AtomicBool,
    reached: Notify,
    release: Notify,
}

struct GatedUnitOfWork {
    inner: Box<dyn TemplateUnitOfWork>,
    gate: Arc<CommitGate>,
}

#[async_trait]
impl TemplateRepository for GatedRepository {
    fn backend_type(&self) -> &'static str {
        "gated-memory"
    }

    async fn exists_by_code(&self, code: &str) -> Result<bool, RepositoryError> {
        self.inner.exists_by_code(code).await
    }

    async fn exists_by_name(&self, name: &str) -> Result<bool, RepositoryError> {
        self.inner.exists_by_name(name).await
    }

    async fn find_by_code(
        &self,
        code: &str,
    ) -> Result<Option<TemplateDescriptor>, RepositoryError> {
        self.inner.find_by_code(code).await
    }

    async fn find_page(
        &self,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<TemplateDescriptor>, RepositoryError> {
        self.inner.find_page(offset, limit).await
    }

    async fn count(&self) -> Result<u64, RepositoryError> {
        self.inner.count().await
    }

    async fn begin(&self) -> Result<Box<dyn TemplateUnitOfWork>, RepositoryError> {
        Ok(Box::new(GatedUnitOfWork {
            inner: self.inner.begin().await?,
            gate: self.gate.clone(),
        }))
    }
}

#[async_trait]
impl TemplateUnitOfWork for GatedUnitOfWork {
    async fn exists_by_code(&mut self, code: &str) -> Result<bool, RepositoryError> {
        self.inner.exists_by_code(code).await
    }

    async fn exists_by_name(&mut self, name: &str) -> Result<bool, RepositoryError> {
        self.inner.exists_by_name(name).await
    }

    async fn insert(&mut self, descriptor: &TemplateDescriptor) -> Result<(), RepositoryError> {
        self.inner.insert(descriptor).await
    }

    async fn delete(&mut self, code: &str) -> Result<bool, RepositoryError> {
        self.inner.delete(code).await
    }

    async fn commit(self: Box<Self>) -> Result<(), RepositoryError> {
        if self.gate.armed.load(Ordering::SeqCst) {
            self.gate.reached.notify_one();
            self.gate.release.notified().await;
        }
        self.inner.commit().await
    }

    async fn rollback(self: Box<Self>) -> Result<(), RepositoryError> {
        self.inner.rollback().await
    }
}

/// Build a zip archive from `(name, contents)` entries; names ending in `/` become directories
fn build_archive(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    for (name, contents) in entries {
        if name.ends_with('/') {
            writer.add_directory(*name, options).unwrap();
        } else {
            writer.start_file(*name, options).unwrap();
            writer.write_all(contents.as_bytes()).unwrap();
        }
    }
    writer.finish().unwrap().into_inner()
}

fn template_archive(code: &str, name: &str, parameters: &str, markup: &str) -> Vec<u8> {
    let config = format!(
        r#"{{"name": "{}", "code": "{}", "description": "test", "parameters": {}}}"#,
        name, code, parameters
    );
    build_archive(&[("index.html", markup), ("config.json", &config)])
}

/// Template archive whose markup entry holds arbitrary bytes
fn raw_markup_archive(markup: &[u8]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    writer.start_file("index.html", options).unwrap();
    writer.write_all(markup).unwrap();
    writer.start_file("config.json", options).unwrap();
    writer
        .write_all(br#"{"name": "Tmpl", "code": "tmpl1", "parameters": []}"#)
        .unwrap();
    writer.finish().unwrap().into_inner()
}

fn contract_archive() -> Vec<u8> {
    template_archive(
        "contract",
        "Contract",
        r#"[{"name": "param1", "required": true},
            {"name": "param2", "required": true},
            {"name": "param3", "required": false}]"#,
        "<p>{{param1}} {{param2}} {{param3}}</p>",
    )
}

fn render_request(code: &str, names: &[&str]) -> RenderRequest {
    RenderRequest {
        code: code.to_string(),
        parameters: names
            .iter()
            .map(|name| ParameterValue::new(*name, format!("v-{}", name)))
            .collect(),
    }
}

fn archive_reason(result: Result<impl std::fmt::Debug, TemplateError>) -> ArchiveFormatError {
    match result {
        Err(TemplateError::InvalidArchive(reason)) => reason,
        other => panic!("expected archive rejection, got {:?}", other),
    }
}

fn argument_reason(result: Result<String, TemplateError>) -> InvalidArgumentsReason {
    match result {
        Err(TemplateError::InvalidArguments(reason)) => reason,
        other => panic!("expected argument rejection, got {:?}", other),
    }
}

// ============================================================================
// Archive shape
// ============================================================================

#[tokio::test]
async fn test_directory_entry_rejected_regardless_of_other_entries() {
    let env = create_test_environment();

    let archives = [
        build_archive(&[("assets/", ""), ("index.html", "<p/>"), ("config.json", "{}")]),
        build_archive(&[("index.html", "<p/>"), ("nested/", "")]),
        build_archive(&[("only/", "")]),
    ];

    for archive in archives {
        let result = env.service.import_template(archive).await;
        assert_eq!(archive_reason(result), ArchiveFormatError::ContainsDirectory);
    }
}

#[tokio::test]
async fn test_entry_count_must_be_two() {
    let env = create_test_environment();

    let result = env
        .service
        .import_template(build_archive(&[("index.html", "<p/>")]))
        .await;
    assert_eq!(archive_reason(result), ArchiveFormatError::TooFewEntries);

    let result = env.service.import_template(build_archive(&[])).await;
    assert_eq!(archive_reason(result), ArchiveFormatError::TooFewEntries);

    let result = env
        .service
        .import_template(build_archive(&[
            ("index.html", "<p/>"),
            ("config.json", "{}"),
            ("extra.html", "<p/>"),
        ]))
        .await;
    assert_eq!(archive_reason(result), ArchiveFormatError::TooManyEntries);
}

#[tokio::test]
async fn test_entries_must_be_one_markup_and_one_config() {
    let env = create_test_environment();

    for entries in [
        [("index.html", "<p/>"), ("other.html", "<p/>")],
        [("a.json", "{}"), ("b.json", "{}")],
        [("index.html", "<p/>"), ("config.yaml", "name: x")],
    ] {
        let result = env.service.import_template(build_archive(&entries)).await;
        assert_eq!(
            archive_reason(result),
            ArchiveFormatError::UnsupportedEntryExtension
        );
    }
}

#[tokio::test]
async fn test_non_zip_bytes_rejected() {
    let env = create_test_environment();

    let result = env.service.import_template(b"plain text".to_vec()).await;
    assert_eq!(archive_reason(result), ArchiveFormatError::NotAnArchive);
}

// ============================================================================
// Import
// ============================================================================

#[tokio::test]
async fn test_import_round_trip() {
    let env = create_test_environment();

    let descriptor = env
        .service
        .import_template(template_archive("tmpl1", "Tmpl", "[]", "<h1>Hello</h1>"))
        .await
        .unwrap();

    assert_eq!(descriptor.code, "tmpl1");
    assert_eq!(descriptor.name, "Tmpl");
    assert!(descriptor.parameters.is_empty());

    let markup = env.store.read("tmpl1").await.unwrap().unwrap();
    assert_eq!(markup, "<h1>Hello</h1>");

    let output = env.service.get_template("tmpl1").await.unwrap();
    assert_eq!(output.name, "Tmpl");
    assert_eq!(output.description.as_deref(), Some("test"));

    let html = env
        .service
        .render_template(&render_request("tmpl1", &[]))
        .await
        .unwrap();
    assert_eq!(html, "<h1>Hello</h1>");
}

#[tokio::test]
async fn test_duplicate_code_and_name_rejected() {
    let env = create_test_environment();

    assert_ok!(
        env.service
            .import_template(template_archive("tmpl1", "Tmpl", "[]", "<p>one</p>"))
            .await
    );

    let result = env
        .service
        .import_template(template_archive("tmpl1", "Other", "[]", "<p>two</p>"))
        .await;
    assert!(matches!(result, Err(TemplateError::CodeAlreadyExists(code)) if code == "tmpl1"));

    let result = env
        .service
        .import_template(template_archive("tmpl2", "Tmpl", "[]", "<p>two</p>"))
        .await;
    assert!(matches!(result, Err(TemplateError::NameAlreadyExists(name)) if name == "Tmpl"));

    // Rejected imports leave the original payload untouched and add nothing
    assert_eq!(env.store.read("tmpl1").await.unwrap().as_deref(), Some("<p>one</p>"));
    assert_eq!(env.store.read("tmpl2").await.unwrap(), None);
}

#[tokio::test]
async fn test_invalid_config_writes_nothing() {
    let env = create_test_environment();

    let archive = build_archive(&[
        ("index.html", "<p/>"),
        ("config.json", r#"{"name": "Bad", "code": "Not-Valid"}"#),
    ]);
    let result = env.service.import_template(archive).await;
    match result {
        Err(TemplateError::InvalidConfig(fields)) => {
            assert!(fields.get("code").is_some());
            assert!(fields.get("name").is_none());
        }
        other => panic!("expected validation error, got {:?}", other),
    }

    let archive = build_archive(&[("index.html", "<p/>"), ("config.json", "not json")]);
    let result = env.service.import_template(archive).await;
    assert!(matches!(result, Err(TemplateError::InvalidConfigFormat)));

    let page = env
        .service
        .get_templates(PageQuery {
            page: Some(0),
            page_size: Some(10),
        })
        .await
        .unwrap();
    assert!(page.is_empty());

    let leftovers = std::fs::read_dir(env.store.root()).unwrap().count();
    assert_eq!(leftovers, 0);
}

#[tokio::test]
async fn test_concurrent_imports_of_same_code() {
    let env = create_test_environment();

    let mut handles = Vec::new();
    for i in 0..8 {
        let service = env.service.clone();
        handles.push(tokio::spawn(async move {
            service
                .import_template(template_archive(
                    "shared",
                    &format!("Name {}", i),
                    "[]",
                    &format!("<p>{}</p>", i),
                ))
                .await
        }));
    }

    let mut succeeded = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(TemplateError::CodeAlreadyExists(_)) => {}
            Err(e) => panic!("unexpected error: {:?}", e),
        }
    }
    assert_eq!(succeeded, 1);

    // Only the published payload remains in the store directory
    let files = std::fs::read_dir(env.store.root()).unwrap().count();
    assert_eq!(files, 1);
}

#[tokio::test]
async fn test_non_utf8_markup_rejected_at_import() {
    let env = create_test_environment();

    // Latin-1 encoded "café"
    let result = env
        .service
        .import_template(raw_markup_archive(b"<p>caf\xe9</p>"))
        .await;
    assert!(matches!(result, Err(TemplateError::InvalidMarkup(_))));

    assert!(matches!(
        env.service.get_template("tmpl1").await,
        Err(TemplateError::NotFound(_))
    ));
    let leftovers = std::fs::read_dir(env.store.root()).unwrap().count();
    assert_eq!(leftovers, 0);
}

#[tokio::test]
async fn test_unparseable_markup_rejected_at_import() {
    let env = create_test_environment();

    let result = env
        .service
        .import_template(raw_markup_archive(b"<p>{{ name </p>"))
        .await;
    match result {
        Err(err @ TemplateError::InvalidMarkup(_)) => assert_eq!(err.reason(), "invalid-markup"),
        other => panic!("expected markup rejection, got {:?}", other),
    }
}

// ============================================================================
// Render
// ============================================================================

#[tokio::test]
async fn test_contract_enforcement() {
    let env = create_test_environment();
    assert_ok!(env.service.import_template(contract_archive()).await);

    let result = env
        .service
        .render_template(&render_request("contract", &["param1", "param2", "param2"]))
        .await;
    assert_eq!(argument_reason(result), InvalidArgumentsReason::Duplicate);

    let result = env
        .service
        .render_template(&render_request("contract", &["param1"]))
        .await;
    assert_eq!(
        argument_reason(result),
        InvalidArgumentsReason::MissingRequiredParameters
    );

    let result = env
        .service
        .render_template(&render_request(
            "contract",
            &["param1", "param2", "param3", "param4"],
        ))
        .await;
    assert_eq!(argument_reason(result), InvalidArgumentsReason::ExtraParameters);

    let html = env
        .service
        .render_template(&render_request("contract", &["param1", "param2"]))
        .await
        .unwrap();
    assert_eq!(html, "<p>v-param1 v-param2 </p>");
}

#[tokio::test]
async fn test_render_unknown_code() {
    let env = create_test_environment();

    let result = env
        .service
        .render_template(&render_request("missing", &[]))
        .await;
    assert!(matches!(result, Err(TemplateError::NotFound(_))));
}

#[tokio::test]
async fn test_render_after_payload_removed_out_of_band() {
    let env = create_test_environment();
    assert_ok!(
        env.service
            .import_template(template_archive("tmpl1", "Tmpl", "[]", "<p/>"))
            .await
    );

    std::fs::remove_file(env.store.path_for("tmpl1").unwrap()).unwrap();

    let result = env
        .service
        .render_template(&render_request("tmpl1", &[]))
        .await;
    assert!(matches!(result, Err(TemplateError::FileNotFound(code)) if code == "tmpl1"));
}

#[tokio::test]
async fn test_render_escapes_values() {
    let env = create_test_environment();
    assert_ok!(
        env.service
            .import_template(template_archive(
                "greeting",
                "Greeting",
                r#"[{"name": "user"}]"#,
                "<p>Hi {{ user }}</p>",
            ))
            .await
    );

    let request = RenderRequest {
        code: "greeting".to_string(),
        parameters: vec![ParameterValue::new("user", "Tom & \"Jerry\" <3")],
    };
    let html = env.service.render_template(&request).await.unwrap();
    assert_eq!(html, "<p>Hi Tom &amp; &quot;Jerry&quot; &lt;3</p>");
}

// ============================================================================
// Management
// ============================================================================

#[tokio::test]
async fn test_delete_removes_descriptor_and_payload() {
    let env = create_test_environment();
    assert_ok!(
        env.service
            .import_template(template_archive("tmpl1", "Tmpl", "[]", "<p/>"))
            .await
    );

    assert_ok!(env.service.delete_template("tmpl1").await);

    assert_eq!(env.store.read("tmpl1").await.unwrap(), None);
    assert!(matches!(
        env.service.get_template("tmpl1").await,
        Err(TemplateError::NotFound(_))
    ));
    assert!(matches!(
        env.service.render_template(&render_request("tmpl1", &[])).await,
        Err(TemplateError::NotFound(_))
    ));

    // Deleting again reports the template as missing
    assert_err!(env.service.delete_template("tmpl1").await);

    // Code and name are free for reuse
    assert_ok!(
        env.service
            .import_template(template_archive("tmpl1", "Tmpl", "[]", "<p>again</p>"))
            .await
    );
}

#[tokio::test]
async fn test_listing_is_paged_by_name() {
    let env = create_test_environment();
    for (code, name) in [("c_code", "Charlie"), ("a_code", "Alpha"), ("b_code", "Bravo")] {
        assert_ok!(
            env.service
                .import_template(template_archive(code, name, "[]", "<p/>"))
                .await
        );
    }

    let page = env
        .service
        .get_templates(PageQuery {
            page: Some(0),
            page_size: Some(2),
        })
        .await
        .unwrap();
    let names: Vec<_> = page.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["Alpha", "Bravo"]);

    let page = env
        .service
        .get_templates(PageQuery {
            page: Some(1),
            page_size: Some(2),
        })
        .await
        .unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].name, "Charlie");

    // Missing or out-of-range paging falls back to the first single-item page
    let page = env.service.get_templates(PageQuery::default()).await.unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].name, "Alpha");
    assert_eq!(page[0].parameters, Vec::<ParameterSpec>::new());
}

#[tokio::test]
async fn test_render_during_delete_never_reports_missing_file() {
    let gate = Arc::new(CommitGate::default());
    let env = create_test_environment_with(Arc::new(GatedRepository {
        inner: MemoryTemplateRepository::new(),
        gate: gate.clone(),
    }));
    assert_ok!(
        env.service
            .import_template(template_archive("tmpl1", "Tmpl", "[]", "<p>live</p>"))
            .await
    );

    gate.armed.store(true, Ordering::SeqCst);
    let service = env.service.clone();
    let delete = tokio::spawn(async move { service.delete_template("tmpl1").await });

    // Delete is now holding its unit of work open at commit
    gate.reached.notified().await;
    let during = env
        .service
        .render_template(&render_request("tmpl1", &[]))
        .await;
    assert_eq!(during.unwrap(), "<p>live</p>");

    gate.release.notify_one();
    assert_ok!(delete.await.unwrap());

    let after = env
        .service
        .render_template(&render_request("tmpl1", &[]))
        .await;
    assert!(matches!(after, Err(TemplateError::NotFound(_))));
}
