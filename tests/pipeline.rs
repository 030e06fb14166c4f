//! End-to-end pipeline tests over in-process doubles: ingestion, browsing,
//! ask/search, deletion, and re-embedding against a temp directory.

use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tempfile::TempDir;

use codebase_assistant::config::Config;
use codebase_assistant::context::AppContext;
use codebase_assistant::metadata::doc_id_for;
use codebase_assistant::projects;
use codebase_assistant::registry::NewProject;
use codebase_assistant::retrieval::{self, NO_CONTEXT_ANSWER};
use codebase_assistant::sqlite_store::SqliteVectorDb;
use codebase_assistant_core::completion::{CompletionParams, CompletionProvider};
use codebase_assistant_core::embedding::{l2_normalize, EmbeddingProvider};
use codebase_assistant_core::store::memory::InMemoryVectorDb;
use codebase_assistant_core::store::VectorDb;

const DIMS: usize = 64;

/// Bag-of-words hashed into a fixed number of buckets.
struct HashEmbedder;

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    fn model_name(&self) -> &str {
        "hash"
    }
    fn dims(&self) -> usize {
        DIMS
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| {
                let mut v = vec![0.0f32; DIMS];
                for word in t.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
                    let mut h = DefaultHasher::new();
                    word.to_lowercase().hash(&mut h);
                    v[(h.finish() as usize) % DIMS] += 1.0;
                }
                l2_normalize(&mut v);
                v
            })
            .collect())
    }
}

struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    fn model_name(&self) -> &str {
        "failing"
    }
    fn dims(&self) -> usize {
        DIMS
    }
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        anyhow::bail!("provider unreachable")
    }
}

/// Records how many times it was called and what prompt it last saw.
#[derive(Default)]
struct CountingCompletion {
    calls: AtomicUsize,
    last_prompt: std::sync::Mutex<String>,
}

#[async_trait]
impl CompletionProvider for CountingCompletion {
    fn model_name(&self) -> &str {
        "counting"
    }
    async fn complete(&self, prompt: &str, _params: CompletionParams) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_prompt.lock().unwrap() = prompt.to_string();
        Ok("It prints hello.".to_string())
    }
}

struct Harness {
    tmp: TempDir,
    ctx: AppContext,
    completion: Arc<CountingCompletion>,
}

fn harness_with(db: Arc<dyn VectorDb>, embedder: Arc<dyn EmbeddingProvider>, tmp: TempDir) -> Harness {
    let completion = Arc::new(CountingCompletion::default());
    let config = Config::minimal().rooted_at(tmp.path());
    let ctx = AppContext::new(config, db, embedder, completion.clone());
    Harness {
        tmp,
        ctx,
        completion,
    }
}

fn harness() -> Harness {
    harness_with(
        Arc::new(InMemoryVectorDb::new()),
        Arc::new(HashEmbedder),
        TempDir::new().unwrap(),
    )
}

fn write(root: &Path, rel: &str, body: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, body).unwrap();
}

async fn project_at(ctx: &AppContext, name: &str, root: &Path) -> String {
    projects::create_project(
        ctx,
        NewProject {
            project_name: name.to_string(),
            root_path: Some(root.to_string_lossy().to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap()
    .project_id
}

#[tokio::test]
async fn test_single_file_project_answers_from_context() {
    let h = harness();
    let src = h.tmp.path().join("src");
    write(&src, "a.py", "print('hello')\n");
    let id = project_at(&h.ctx, "demo", &src).await;

    let ingest = projects::ingest_folder(&h.ctx, &id, &src, None).await.unwrap();
    assert_eq!(ingest.files_ingested, 1);
    assert_eq!(ingest.chunks_upserted, 1);

    let files = h.ctx.store.list_files(&id, None).await.unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].rel_path, "a.py");
    assert_eq!(files[0].filetype, ".py");
    assert_eq!(files[0].chunks, 1);

    let resp = retrieval::ask(&h.ctx, "what does it print?", Some(id.as_str()), 5)
        .await
        .unwrap();
    assert_eq!(resp.answer, "It prints hello.");
    assert_eq!(resp.matches.len(), 1);
    assert_eq!(resp.matches[0].metadata.rel_path, "a.py");
    assert_eq!(resp.matches[0].text, "print('hello')");
    assert_eq!(h.completion.calls.load(Ordering::SeqCst), 1);

    let prompt = h.completion.last_prompt.lock().unwrap().clone();
    assert!(prompt.contains("print('hello')"));
    assert!(prompt.contains("what does it print?"));
}

#[tokio::test]
async fn test_reingest_is_idempotent() {
    let h = harness();
    let src = h.tmp.path().join("src");
    write(&src, "a.py", "first. second. third");
    write(&src, "lib/b.rs", "fn main() {}");
    let id = project_at(&h.ctx, "demo", &src).await;

    projects::ingest_folder(&h.ctx, &id, &src, None).await.unwrap();
    let before = h.ctx.store.get_chunks(&id, None, 200).await.unwrap();
    projects::ingest_folder(&h.ctx, &id, &src, None).await.unwrap();
    let after = h.ctx.store.get_chunks(&id, None, 200).await.unwrap();

    assert_eq!(before.len(), after.len());
    let ids_before: Vec<&str> = before.iter().map(|c| c.id.as_str()).collect();
    let ids_after: Vec<&str> = after.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids_before, ids_after);
    assert!(ids_after.contains(&format!("{}::lib/b.rs::0", id).as_str()));
}

#[tokio::test]
async fn test_reingest_of_shrunk_file_drops_stale_chunks() {
    let h = harness();
    let src = h.tmp.path().join("src");
    let long: Vec<String> = (0..60)
        .map(|i| format!("sentence number {} is here", i))
        .collect();
    write(&src, "a.py", &long.join(". "));
    let id = project_at(&h.ctx, "demo", &src).await;

    projects::ingest_folder(&h.ctx, &id, &src, None).await.unwrap();
    let before = h.ctx.store.get_chunks(&id, Some("a.py"), 200).await.unwrap();
    assert!(before.len() >= 2);

    write(&src, "a.py", "short now");
    let again = projects::ingest_folder(&h.ctx, &id, &src, None).await.unwrap();
    assert_eq!(again.chunks_upserted, 1);

    let after = h.ctx.store.get_chunks(&id, Some("a.py"), 200).await.unwrap();
    assert_eq!(after.len(), 1);
    assert_eq!(after[0].id, format!("{}::a.py::0", id));
    assert_eq!(after[0].text, "short now");
    assert_eq!(h.ctx.store.stats(&id).await.unwrap().chunk_count, 1);
    assert_eq!(h.ctx.store.list_files(&id, None).await.unwrap()[0].chunks, 1);
}

#[tokio::test]
async fn test_doc_id_is_stable_per_path() {
    let h = harness();
    let src = h.tmp.path().join("src");
    write(&src, "a.py", "x = 1");
    let id = project_at(&h.ctx, "demo", &src).await;

    projects::ingest_folder(&h.ctx, &id, &src, None).await.unwrap();
    let first = h.ctx.store.get_chunks(&id, None, 10).await.unwrap();
    write(&src, "a.py", "x = 2");
    projects::ingest_folder(&h.ctx, &id, &src, None).await.unwrap();
    let second = h.ctx.store.get_chunks(&id, None, 10).await.unwrap();

    assert_eq!(first[0].metadata.doc_id, second[0].metadata.doc_id);
    assert_eq!(second[0].metadata.doc_id, doc_id_for(&second[0].metadata.abs_path));
    assert_eq!(second[0].text, "x = 2");
}

#[tokio::test]
async fn test_queries_are_scoped_to_project() {
    let h = harness();
    let a = h.tmp.path().join("a");
    let b = h.tmp.path().join("b");
    write(&a, "parser.rs", "the parser tokenizes input");
    write(&b, "parser.rs", "the parser tokenizes input too");
    let id_a = project_at(&h.ctx, "alpha", &a).await;
    let id_b = project_at(&h.ctx, "beta", &b).await;
    projects::ingest_folder(&h.ctx, &id_a, &a, None).await.unwrap();
    projects::ingest_folder(&h.ctx, &id_b, &b, None).await.unwrap();

    let scoped = retrieval::search(&h.ctx, "parser tokenizes", Some(id_a.as_str()))
        .await
        .unwrap();
    assert_eq!(scoped.count, 1);

    let resp = retrieval::ask(&h.ctx, "parser tokenizes", Some(id_b.as_str()), 5)
        .await
        .unwrap();
    assert!(resp.matches.iter().all(|m| m.metadata.project_id == id_b));

    let everywhere = retrieval::search(&h.ctx, "parser tokenizes", None).await.unwrap();
    assert_eq!(everywhere.count, 2);
    let d: Vec<f32> = everywhere.results.iter().map(|r| r.distance.unwrap()).collect();
    assert!(d[0] <= d[1]);
}

#[tokio::test]
async fn test_empty_project_skips_completion() {
    let h = harness();
    let id = project_at(&h.ctx, "empty", h.tmp.path()).await;

    let resp = retrieval::ask(&h.ctx, "anything?", Some(id.as_str()), 5).await.unwrap();
    assert_eq!(resp.answer, NO_CONTEXT_ANSWER);
    assert!(resp.matches.is_empty());
    assert_eq!(h.completion.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_blank_question_is_rejected() {
    let h = harness();
    let err = retrieval::ask(&h.ctx, "   ", None, 5).await.unwrap_err();
    assert_eq!(err.code(), "bad_request");
}

#[tokio::test]
async fn test_delete_removes_chunks_and_record() {
    let h = harness();
    let src = h.tmp.path().join("src");
    write(&src, "a.py", "one. two");
    let id = project_at(&h.ctx, "demo", &src).await;
    projects::ingest_folder(&h.ctx, &id, &src, None).await.unwrap();

    let result = projects::delete_project(&h.ctx, &id).await.unwrap();
    assert_eq!(result.status, "deleted");
    assert_eq!(result.deleted_chunks, 1);

    assert_eq!(h.ctx.store.stats(&id).await.unwrap().chunk_count, 0);
    assert_eq!(
        projects::show_project(&h.ctx, &id).await.unwrap_err().code(),
        "not_found"
    );
    assert!(projects::list_projects(&h.ctx).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_ignored_dirs_and_extension_filter() {
    let h = harness();
    let src = h.tmp.path().join("src");
    write(&src, "main.py", "print(1)");
    write(&src, "notes.md", "notes");
    write(&src, "node_modules/dep/index.js", "module.exports = 1");
    write(&src, ".git/config", "[core]");
    let id = project_at(&h.ctx, "demo", &src).await;

    let exts = vec![".py".to_string()];
    let only_py = projects::ingest_folder(&h.ctx, &id, &src, Some(exts.as_slice()))
        .await
        .unwrap();
    assert_eq!(only_py.files_ingested, 1);

    let all = projects::ingest_folder(&h.ctx, &id, &src, None).await.unwrap();
    assert_eq!(all.files_ingested, 2);

    let paths: Vec<String> = h
        .ctx
        .store
        .list_files(&id, None)
        .await
        .unwrap()
        .into_iter()
        .map(|f| f.rel_path)
        .collect();
    assert_eq!(paths, vec!["main.py", "notes.md"]);

    let md = h.ctx.store.list_files(&id, Some("*.md")).await.unwrap();
    assert_eq!(md.len(), 1);
}

#[tokio::test]
async fn test_missing_folder_is_bad_request() {
    let h = harness();
    let id = project_at(&h.ctx, "demo", h.tmp.path()).await;
    let err = projects::ingest_folder(&h.ctx, &id, &h.tmp.path().join("nope"), None)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "bad_request");
}

#[tokio::test]
async fn test_unknown_project_is_not_found() {
    let h = harness();
    let err = projects::ingest_folder(&h.ctx, "proj_00000000", h.tmp.path(), None)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "not_found");
}

#[tokio::test]
async fn test_embedding_failure_skips_files() {
    let h = harness_with(
        Arc::new(InMemoryVectorDb::new()),
        Arc::new(FailingEmbedder),
        TempDir::new().unwrap(),
    );
    let src = h.tmp.path().join("src");
    write(&src, "a.py", "x = 1");
    let id = project_at(&h.ctx, "demo", &src).await;

    let result = projects::ingest_folder(&h.ctx, &id, &src, None).await.unwrap();
    assert_eq!(result.files_ingested, 0);
    assert_eq!(result.chunks_upserted, 0);

    let err = retrieval::search(&h.ctx, "x", Some(id.as_str())).await.unwrap_err();
    assert_eq!(err.code(), "embedding_failed");
}

#[tokio::test]
async fn test_reembed_replace_drops_removed_files() {
    let h = harness();
    let src = h.tmp.path().join("src");
    write(&src, "keep.py", "keep");
    write(&src, "gone.py", "gone");
    let id = project_at(&h.ctx, "demo", &src).await;
    projects::ingest_folder(&h.ctx, &id, &src, None).await.unwrap();

    fs::remove_file(src.join("gone.py")).unwrap();
    let result = projects::reembed(&h.ctx, &id, "replace").await.unwrap();
    assert_eq!(result.deleted_chunks, 2);
    assert_eq!(result.ingest.as_ref().unwrap().files_ingested, 1);

    let files = h.ctx.store.list_files(&id, None).await.unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].rel_path, "keep.py");

    let appended = projects::reembed(&h.ctx, &id, "append").await.unwrap();
    assert_eq!(appended.deleted_chunks, 0);
    assert_eq!(h.ctx.store.stats(&id).await.unwrap().chunk_count, 1);
}

#[tokio::test]
async fn test_sweep_removes_unregistered_chunks() {
    let h = harness();
    let src = h.tmp.path().join("src");
    write(&src, "a.py", "x = 1");
    let keep = project_at(&h.ctx, "keep", &src).await;
    let drop = project_at(&h.ctx, "drop", &src).await;
    projects::ingest_folder(&h.ctx, &keep, &src, None).await.unwrap();
    projects::ingest_folder(&h.ctx, &drop, &src, None).await.unwrap();

    // Remove only the registry record, leaving the chunks behind.
    h.ctx.registry.remove(&drop).await.unwrap();

    let swept = projects::sweep_orphans(&h.ctx).await.unwrap();
    assert_eq!(swept.deleted.get(&drop), Some(&1));
    assert!(!swept.deleted.contains_key(&keep));
    assert_eq!(h.ctx.store.stats(&keep).await.unwrap().chunk_count, 1);
}

#[tokio::test]
async fn test_upload_keeps_basename_only() {
    let h = harness();
    let id = project_at(&h.ctx, "demo", h.tmp.path()).await;

    let result = projects::upload_files(
        &h.ctx,
        &id,
        vec![("../../etc/evil.py".to_string(), b"x = 1".to_vec())],
    )
    .await
    .unwrap();
    assert_eq!(result.files_upserted, 1);
    assert!(h.ctx.config.ingest.uploads_dir.join("evil.py").exists());
}

#[tokio::test]
async fn test_upload_rejects_duplicate_basenames() {
    let h = harness();
    let id = project_at(&h.ctx, "demo", h.tmp.path()).await;

    let err = projects::upload_files(
        &h.ctx,
        &id,
        vec![
            ("one/util.py".to_string(), b"a = 1".to_vec()),
            ("two/util.py".to_string(), b"b = 2".to_vec()),
        ],
    )
    .await
    .unwrap_err();
    assert_eq!(err.code(), "bad_request");
    assert!(!h.ctx.config.ingest.uploads_dir.join("util.py").exists());
    assert_eq!(h.ctx.store.stats(&id).await.unwrap().chunk_count, 0);
}

#[tokio::test]
async fn test_sqlite_store_survives_reopen() {
    let tmp = TempDir::new().unwrap();
    let db_path = tmp.path().join("data/vectors.sqlite");
    let src = tmp.path().join("src");
    write(&src, "a.py", "print('hello')");

    let id = {
        let db = SqliteVectorDb::open(&db_path, "projects_codebase").await.unwrap();
        let h = harness_with(Arc::new(db), Arc::new(HashEmbedder), TempDir::new().unwrap());
        let id = project_at(&h.ctx, "demo", &src).await;
        projects::ingest_folder(&h.ctx, &id, &src, None).await.unwrap();
        id
    };

    let db = SqliteVectorDb::open(&db_path, "projects_codebase").await.unwrap();
    let h = harness_with(Arc::new(db), Arc::new(HashEmbedder), TempDir::new().unwrap());
    assert_eq!(h.ctx.store.stats(&id).await.unwrap().chunk_count, 1);

    let hits = retrieval::search(&h.ctx, "print hello", Some(id.as_str())).await.unwrap();
    assert_eq!(hits.count, 1);
    assert_eq!(hits.results[0].rel_path, "a.py");
}

#[tokio::test]
async fn test_chunk_indices_are_contiguous_and_copies_get_new_doc_ids() {
    let tmp = TempDir::new().unwrap();
    let mut config = Config::minimal().rooted_at(tmp.path());
    config.chunking.max_length = 12;
    let ctx = AppContext::new(
        config,
        Arc::new(InMemoryVectorDb::new()),
        Arc::new(HashEmbedder),
        Arc::new(CountingCompletion::default()),
    );

    let src = tmp.path().join("src");
    let body = "alpha beta. gamma delta. epsilon. zeta eta theta. iota";
    write(&src, "one.txt", body);
    write(&src, "copy/one.txt", body);
    let id = project_at(&ctx, "demo", &src).await;
    projects::ingest_folder(&ctx, &id, &src, None).await.unwrap();

    let chunks = ctx.store.get_chunks(&id, Some("one.txt"), 200).await.unwrap();
    assert!(chunks.len() > 1);
    let idx: Vec<usize> = chunks.iter().map(|c| c.metadata.chunk_idx).collect();
    assert_eq!(idx, (0..chunks.len()).collect::<Vec<_>>());

    let copy = ctx.store.get_chunks(&id, Some("copy/one.txt"), 200).await.unwrap();
    assert_eq!(copy.len(), chunks.len());
    assert_ne!(copy[0].metadata.doc_id, chunks[0].metadata.doc_id);

    let docs = ctx.store.list_documents(&id).await.unwrap();
    assert_eq!(docs.len(), 2);
    assert!(docs.iter().all(|d| d.source == "one.txt" && d.chunk_count == chunks.len()));
}

#[tokio::test]
async fn test_repo_ingest_with_unreachable_remote_is_bad_request() {
    let h = harness();
    let id = projects::create_project(
        &h.ctx,
        NewProject {
            project_name: "remote".to_string(),
            repo_url: Some("https://example.invalid/r.git".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap()
    .project_id;

    let missing = h.tmp.path().join("no-such-repo");
    let dest = h.tmp.path().join("checkout");
    let err = projects::ingest_repo(&h.ctx, &id, &missing.to_string_lossy(), None, &dest)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "bad_request");

    // The failed ingest must not record a source.
    let project = h.ctx.registry.require(&id).await.unwrap();
    assert_eq!(project.root_path, None);
}
