use std::process::Command;

#[test]
fn init_creates_valid_toml() {
    let dir = tempfile::tempdir().unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_caira"))
        .arg("init")
        .current_dir(dir.path())
        .output()
        .unwrap();

    assert!(output.status.success(), "caira init failed: {}", String::from_utf8_lossy(&output.stderr));

    let config_path = dir.path().join(".caira.toml");
    assert!(config_path.exists(), ".caira.toml should exist");

    let content = std::fs::read_to_string(&config_path).unwrap();
    for section in ["[embedding]", "[llm]", "[chunking]", "[retrieval]", "[paths]"] {
        assert!(content.contains(section), "missing {section}");
    }

    // Must parse and validate with the same rules the CLI applies
    let config: caira_core::CairaConfig = toml::from_str(&content).unwrap();
    config.validate().unwrap();
    assert_eq!(config.chunking.chunk_size, 600);
    assert_eq!(config.retrieval.top_k, 5);
}

#[test]
fn init_refuses_if_exists() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(".caira.toml"), "# existing").unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_caira"))
        .arg("init")
        .current_dir(dir.path())
        .output()
        .unwrap();

    assert!(!output.status.success());
    let content = std::fs::read_to_string(dir.path().join(".caira.toml")).unwrap();
    assert_eq!(content, "# existing");
}

#[test]
fn stats_without_index_fails() {
    let dir = tempfile::tempdir().unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_caira"))
        .arg("stats")
        .current_dir(dir.path())
        .env_remove("CAIRA_DATA_DIR")
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("index.bin"), "unexpected stderr: {stderr}");
}
