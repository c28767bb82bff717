use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;

/// Scratch directory standing in for `history/`. Dropping it removes every
/// file written during the test.
pub fn history_dir() -> TempDir {
    return tempfile::tempdir().unwrap();
}

/// Writes `payload` as `{name}` into `dir`, returning the full path.
pub fn write_history_file(dir: &TempDir, name: &str, payload: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, payload).unwrap();
    return path;
}

/// Two exchanges with two different models, in the on-disk layout.
pub fn conversation_fixture() -> &'static str {
    return r#"
{
  "time": 1712000000.25,
  "model_name": ["mock1", "mock2"],
  "messages": [
    {"role": "user", "content": "hello"},
    {"role": "assistant", "content": "Mock response"},
    {"role": "user", "content": "how are you?"},
    {"role": "assistant", "content": "Mock response"}
  ]
}
"#
    .trim();
}
