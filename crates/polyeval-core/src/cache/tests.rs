//! Tests for the model output cache.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use super::*;
use crate::model::Turn;
use tempfile::tempdir;

/// Log output captured by a test subscriber
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Run `f` with a subscriber that records WARN and above into the returned buffer
fn capture_warnings<T>(f: impl FnOnce() -> T) -> (T, String) {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    let value = tracing::subscriber::with_default(subscriber, f);
    (value, buffer.contents())
}

fn texts(items: &[&str]) -> ModelInputs {
    ModelInputs::Texts(items.iter().map(|s| s.to_string()).collect())
}

fn new_cache(dir: &Path, hash_inputs: bool) -> ModelCache {
    ModelCache::new(dir, "org/model-7b", "angry-tweets", 5, hash_inputs)
}

#[test]
fn test_cache_path_layout() {
    let path = cache_path(Path::new("/tmp/c"), "org/model-7b", "angry-tweets");
    assert_eq!(
        path,
        PathBuf::from("/tmp/c/model_cache/org%2Fmodel-7b/angry-tweets-model-outputs.json")
    );
}

#[test]
fn test_distinct_model_ids_get_distinct_directories() {
    let root = Path::new("/tmp/c");
    let ids = ["a/b", "a--b", "a:b", "a\\b", "a%2Fb"];
    for (i, a) in ids.iter().enumerate() {
        for b in &ids[i + 1..] {
            assert_ne!(model_cache_dir(root, a), model_cache_dir(root, b), "{} vs {}", a, b);
        }
    }
}

#[test]
fn test_cache_paths_stay_inside_the_cache_dir() {
    let root = Path::new("/tmp/c");
    let model_root = root.join("model_cache");
    for model in ["..", ".", "", "../..", "/etc"] {
        let dir = model_cache_dir(root, model);
        assert_eq!(dir.parent(), Some(model_root.as_path()), "{:?}", model);
        assert_ne!(dir, model_root);
    }
    let path = cache_path(root, "m", "../../escape");
    assert_eq!(path.parent(), Some(model_root.join("m").as_path()));
}

#[test]
fn test_validate_model_id() {
    for ok in ["org/model-7b", "llama3:8b", "local/keyword", "a..b"] {
        assert!(validate_model_id(ok).is_ok(), "{}", ok);
    }
    for bad in ["", "  ", "..", ".", "org/../x", "/abs", "org/./x", "a\\..", "x\ny"] {
        let err = validate_model_id(bad).unwrap_err();
        assert!(matches!(err, BenchError::InvalidValue { .. }), "{:?}", bad);
    }
}

#[test]
fn test_validate_dataset_name() {
    assert!(validate_dataset_name("angry-tweets").is_ok());
    assert!(validate_dataset_name("scala-da.v2").is_ok());
    for bad in ["", "..", ".", "a/b", "..\\x"] {
        assert!(validate_dataset_name(bad).is_err(), "{:?}", bad);
    }
}

#[test]
fn test_load_missing_file_is_empty() {
    let dir = tempdir().unwrap();
    let mut cache = new_cache(dir.path(), true);
    let ((), logs) = capture_warnings(|| cache.load());
    assert!(cache.is_empty());
    assert!(logs.is_empty(), "{}", logs);
}

#[test]
fn test_load_corrupted_file_recovers_empty() {
    let dir = tempdir().unwrap();
    let mut cache = new_cache(dir.path(), true);
    fs::create_dir_all(cache.path().parent().unwrap()).unwrap();
    fs::write(cache.path(), "{ this is not json").unwrap();

    let ((), logs) = capture_warnings(|| cache.load());
    assert!(cache.is_empty());
    assert!(logs.contains("WARN"), "{}", logs);
    assert!(logs.contains("model cache is corrupted"), "{}", logs);

    // Still usable after recovery
    cache.insert(&ModelInput::from("hello"), GeneratedOutput::new("world"));
    cache.save().unwrap();
    let mut reloaded = new_cache(dir.path(), true);
    reloaded.load();
    assert_eq!(reloaded.len(), 1);
}

#[test]
fn test_insert_get_contains_use_same_key() {
    let dir = tempdir().unwrap();
    for hash_inputs in [true, false] {
        let mut cache = new_cache(dir.path(), hash_inputs);
        let input = ModelInput::Messages(vec![Turn::new("user", "hej")]);
        assert!(!cache.contains(&input));
        assert!(cache.get(&input).is_none());

        cache.insert(&input, GeneratedOutput::new("hej hej"));
        assert!(cache.contains(&input));
        assert_eq!(cache.get(&input).unwrap().sequence, "hej hej");
        assert!(cache.contains_key(&cache.key_for(&input)));
    }
}

#[test]
fn test_insert_overwrites() {
    let dir = tempdir().unwrap();
    let mut cache = new_cache(dir.path(), false);
    let input = ModelInput::from("hello");
    cache.insert(&input, GeneratedOutput::new("first"));
    cache.insert(&input, GeneratedOutput::new("second"));
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.get(&input).unwrap().sequence, "second");
}

#[test]
fn test_save_and_load_roundtrip_across_instances() {
    let dir = tempdir().unwrap();
    let mut cache = new_cache(dir.path(), true);
    cache
        .add_to_cache(
            &texts(&["hello", "goodbye"]),
            &[
                GeneratedOutput::new("world").with_scores(vec![vec![("wor".into(), -0.2)]]),
                GeneratedOutput::new("moon"),
            ],
        )
        .unwrap();
    cache.save().unwrap();
    // Saving twice is fine, last write wins
    cache.save().unwrap();

    let mut reloaded = new_cache(dir.path(), true);
    reloaded.load();
    assert_eq!(reloaded.len(), 2);
    let hello = reloaded.get(&ModelInput::from("hello")).unwrap();
    assert_eq!(hello.sequence, "world");
    assert_eq!(hello.scores, Some(vec![vec![("wor".to_string(), -0.2)]]));
}

#[test]
fn test_unhashed_cache_file_is_readable() {
    let dir = tempdir().unwrap();
    let mut cache = new_cache(dir.path(), false);
    cache.insert(&ModelInput::from("hello"), GeneratedOutput::new("world"));
    cache.save().unwrap();

    let raw: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(cache.path()).unwrap()).unwrap();
    assert_eq!(raw["text:hello"]["sequence"], "world");
    assert_eq!(raw["text:hello"]["max_generated_tokens"], 5);
}

#[test]
fn test_add_to_cache_rejects_length_mismatch() {
    let dir = tempdir().unwrap();
    let mut cache = new_cache(dir.path(), true);
    let err = cache
        .add_to_cache(&texts(&["a", "b"]), &[GeneratedOutput::new("only one")])
        .unwrap_err();
    assert!(matches!(
        err,
        BenchError::CacheLengthMismatch {
            inputs: 2,
            outputs: 1
        }
    ));
    assert!(cache.is_empty());
}

#[test]
fn test_add_to_cache_drops_scores_for_long_generations() {
    let dir = tempdir().unwrap();
    let mut cache = ModelCache::new(dir.path(), "m", "summaries", 256, true);
    cache
        .add_to_cache(
            &texts(&["article"]),
            &[GeneratedOutput::new("summary").with_scores(vec![vec![("sum".into(), -1.0)]])],
        )
        .unwrap();
    assert!(cache.get(&ModelInput::from("article")).unwrap().scores.is_none());
}

#[test]
fn test_load_drops_entries_from_other_token_budget() {
    let dir = tempdir().unwrap();
    let mut old = ModelCache::new(dir.path(), "m", "ds", 5, false);
    old.insert(&ModelInput::from("hello"), GeneratedOutput::new("world"));
    old.save().unwrap();

    let mut same_budget = ModelCache::new(dir.path(), "m", "ds", 5, false);
    same_budget.load();
    assert_eq!(same_budget.len(), 1);

    let mut new_budget = ModelCache::new(dir.path(), "m", "ds", 10, false);
    new_budget.load();
    assert!(new_budget.is_empty());
}

#[test]
fn test_load_keeps_entries_without_recorded_budget() {
    let dir = tempdir().unwrap();
    let cache_file = cache_path(dir.path(), "m", "ds");
    fs::create_dir_all(cache_file.parent().unwrap()).unwrap();
    fs::write(
        &cache_file,
        r#"{"text:hello": {"sequence": "world", "scores": null}}"#,
    )
    .unwrap();

    let mut cache = ModelCache::new(dir.path(), "m", "ds", 5, false);
    cache.load();
    assert_eq!(
        cache.get(&ModelInput::from("hello")).unwrap().sequence,
        "world"
    );
}

#[test]
fn test_remove_is_idempotent() {
    let dir = tempdir().unwrap();
    let mut cache = new_cache(dir.path(), true);
    cache.insert(&ModelInput::from("x"), GeneratedOutput::new("y"));
    cache.save().unwrap();
    assert!(cache.path().exists());

    cache.remove().unwrap();
    assert!(!cache.path().exists());
    cache.remove().unwrap();
}
