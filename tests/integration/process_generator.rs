//! Refresh through the CLI route with a shell-script generator

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use stubcache::cli::{Commands, RunContext};
use stubcache::config::StubCacheConfig;
use tempfile::TempDir;

/// Generator speaking the listing protocol for a single module `a`.
fn write_generator_script(dir: &Path, lib: &Path) -> PathBuf {
    let script = dir.join("generator.sh");
    let body = format!(
        r#"#!/bin/sh
if [ "$1" = "-L" ]; then
  echo "1.5"
  printf 'a\t%s\t10\t1577836800\n' "{lib}/a.so"
  exit 0
fi
if [ "$1" = "-b" ]; then
  printf '# encoding: utf-8\n# module builtins\n# from (built-in)\n# by generator 1.5\n' > "$3/builtins.py"
  exit 0
fi
printf '# encoding: utf-8\n# module %s\n# from %s\n# by generator 1.5\n' "$5" "$6" > "$2/$5.py"
"#,
        lib = lib.display()
    );
    fs::write(&script, body).unwrap();
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
    script
}

fn refresh_command(home: &Path, cache_dir: &Path) -> Commands {
    Commands::Refresh {
        home: home.to_path_buf(),
        version: Some("Python 3.11.4".to_string()),
        roots: Vec::new(),
        cache_dir: Some(cache_dir.to_path_buf()),
        base_home: None,
        base_roots: Vec::new(),
        format: "json".to_string(),
    }
}

#[test]
fn test_refresh_with_external_generator() {
    let temp = TempDir::new().unwrap();
    let lib = temp.path().join("lib");
    fs::create_dir_all(&lib).unwrap();
    fs::write(lib.join("a.so"), vec![0u8; 10]).unwrap();
    let cache_dir = temp.path().join("cache");

    let mut config = StubCacheConfig::default();
    config.generator.program = Some(write_generator_script(temp.path(), &lib));
    config.cache_root = Some(temp.path().join("stubs"));
    let context = RunContext::with_config(temp.path().to_path_buf(), config).unwrap();
    let home = temp.path().join("python");

    let output = context.execute(&refresh_command(&home, &cache_dir)).unwrap();
    let first: serde_json::Value = serde_json::from_str(&output).unwrap();
    assert_eq!(first["generator_version"], "1.5");
    assert_eq!(first["migrated"], true);
    assert_eq!(first["builtins_updated"], true);
    assert_eq!(first["generated"], 1);
    assert!(cache_dir.join("a.py").exists());

    let output = context.execute(&refresh_command(&home, &cache_dir)).unwrap();
    let second: serde_json::Value = serde_json::from_str(&output).unwrap();
    assert_eq!(second["migrated"], false);
    assert_eq!(second["generated"], 0);
    assert_eq!(second["cleanup"]["removed_files"], 0);

    let inventory = context
        .execute(&Commands::Inspect {
            cache_dir: cache_dir.clone(),
            format: "text".to_string(),
        })
        .unwrap();
    assert!(inventory.contains("a.py"));
    assert!(inventory.contains("(built-in)"));
}
