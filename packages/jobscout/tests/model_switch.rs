//! Switching the backend edits the same `.env` the next run reads, even when
//! the home directory is not the working directory. Kept in its own test
//! binary because it changes the process environment.

use jobscout::config::{load_env_file, write_llm_mode, Config};
use jobscout::generation::BackendKind;

#[test]
fn switched_backend_is_read_back_from_home() {
    let home = tempfile::tempdir().unwrap();
    let elsewhere = tempfile::tempdir().unwrap();
    std::fs::write(home.path().join(".env"), "LLM_MODE=claude\nCANDIDATE_NAME=Ada\n").unwrap();

    std::env::remove_var("LLM_MODE");
    std::env::remove_var("CANDIDATE_NAME");
    std::env::set_var("JOBSCOUT_HOME", home.path());
    std::env::set_current_dir(elsewhere.path()).unwrap();

    write_llm_mode(&home.path().join(".env"), BackendKind::Codex).unwrap();

    assert_eq!(load_env_file(), home.path());
    let config = Config::from_env().unwrap();
    assert_eq!(config.generation.kind, BackendKind::Codex);
    assert_eq!(config.candidate.name, "Ada");
    assert_eq!(config.env_file(), home.path().join(".env"));
}
