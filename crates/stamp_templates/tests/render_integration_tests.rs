//! Integration tests for rendering templates end to end.

use std::fs;
use std::path::{Path, PathBuf};

use stamp_templates::{render, ErrorFs, FsOp, OsFs, RenderConfig, RenderError};
use tempfile::{tempdir, TempDir};

struct Workspace {
    root: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let root = tempdir().unwrap();
        for dir in ["template", "dest", "tmp", "backups"] {
            fs::create_dir_all(root.path().join(dir)).unwrap();
        }
        Self { root }
    }

    fn path(&self, dir: &str) -> PathBuf {
        self.root.path().join(dir)
    }

    fn write(&self, dir: &str, rel: &str, contents: &str) {
        let path = self.path(dir).join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn read(&self, dir: &str, rel: &str) -> String {
        fs::read_to_string(self.path(dir).join(rel)).unwrap()
    }

    fn spec(&self, yaml: &str) {
        self.write("template", "spec.yaml", yaml);
    }

    fn config(&self) -> RenderConfig {
        RenderConfig::new(self.path("template"), self.path("dest"))
            .with_temp_root(self.path("tmp"))
            .with_backup_root(self.path("backups"))
    }
}

fn entries(dir: &Path) -> usize {
    fs::read_dir(dir).unwrap().count()
}

#[test]
fn test_append_adds_newline() {
    let ws = Workspace::new();
    ws.write("template", "myfile.txt", "abc foo def");
    ws.spec(
        r#"
desc: append scenario
steps:
  - action: include
    params:
      paths:
        - paths: ['myfile.txt']
  - action: append
    params:
      paths: ['myfile.txt']
      with: 'foobar'
"#,
    );

    render(&OsFs, &ws.config(), &mut Vec::new(), None).unwrap();
    assert_eq!(ws.read("dest", "myfile.txt"), "abc foo deffoobar\n");
}

#[test]
fn test_append_skip_ensure_newline() {
    let ws = Workspace::new();
    ws.write("template", "myfile.txt", "abc foo def");
    ws.spec(
        r#"
steps:
  - action: include
    params:
      paths:
        - paths: ['myfile.txt']
  - action: append
    params:
      paths: ['myfile.txt']
      with: 'foobar'
      skip_ensure_newline: true
"#,
    );

    render(&OsFs, &ws.config(), &mut Vec::new(), None).unwrap();
    assert_eq!(ws.read("dest", "myfile.txt"), "abc foo deffoobar");
}

#[test]
fn test_include_skips_spec_file() {
    let ws = Workspace::new();
    ws.write("template", "myfile.txt", "hi");
    ws.spec(
        r#"
steps:
  - action: include
    params:
      paths:
        - paths: ['.']
"#,
    );

    let outcome = render(&OsFs, &ws.config(), &mut Vec::new(), None).unwrap();
    assert_eq!(ws.read("dest", "myfile.txt"), "hi");
    assert!(!ws.path("dest").join("spec.yaml").exists());
    assert_eq!(outcome.files, vec!["myfile.txt"]);
    assert_eq!(outcome.hashes.len(), 1);
    assert!(outcome.backup_dir.is_none());
}

#[test]
fn test_regex_name_lookup() {
    let ws = Workspace::new();
    ws.write("template", "words.txt", "alpha beta gamma delta");
    ws.spec(
        r#"
inputs:
  - name: x
steps:
  - action: include
    params:
      paths:
        - paths: ['words.txt']
  - action: regex_name_lookup
    params:
      paths: ['words.txt']
      replacements:
        - regex: '\b(?P<x>b...) (?P<x>g....)'
"#,
    );

    let config = ws.config().with_input("x", "foo");
    render(&OsFs, &config, &mut Vec::new(), None).unwrap();
    assert_eq!(ws.read("dest", "words.txt"), "alpha foo foo delta");
}

#[test]
fn test_overwrite_backs_up_existing_file() {
    let ws = Workspace::new();
    ws.write("template", "file1.txt", "new");
    ws.write("dest", "file1.txt", "old");
    ws.spec(
        r#"
steps:
  - action: include
    params:
      paths:
        - paths: ['file1.txt']
"#,
    );

    let config = ws.config().force_overwrite(true);
    let outcome = render(&OsFs, &config, &mut Vec::new(), None).unwrap();

    assert_eq!(ws.read("dest", "file1.txt"), "new");
    let backup_dir = outcome.backup_dir.expect("a backup directory");
    assert!(backup_dir.starts_with(ws.path("backups")));
    assert_eq!(fs::read_to_string(backup_dir.join("file1.txt")).unwrap(), "old");
}

#[test]
fn test_existing_file_without_force_fails() {
    let ws = Workspace::new();
    ws.write("template", "file1.txt", "new");
    ws.write("dest", "file1.txt", "old");
    ws.spec(
        r#"
steps:
  - action: include
    params:
      paths:
        - paths: ['file1.txt']
"#,
    );

    let err = render(&OsFs, &ws.config(), &mut Vec::new(), None).unwrap_err();
    assert!(matches!(err, RenderError::OverwriteConflict { .. }));
    assert!(err.to_string().contains("overwriting was not enabled"));
    assert_eq!(ws.read("dest", "file1.txt"), "old");
    assert_eq!(entries(&ws.path("backups")), 0);
}

#[test]
fn test_file_included_from_destination_may_be_replaced() {
    let ws = Workspace::new();
    ws.write("dest", "go.mod", "module orders\n");
    ws.spec(
        r#"
steps:
  - action: include
    params:
      paths:
        - paths: ['go.mod']
          from: destination
  - action: append
    params:
      paths: ['go.mod']
      with: 'require example.com/lib v1.0.0'
"#,
    );

    let outcome = render(&OsFs, &ws.config(), &mut Vec::new(), None).unwrap();
    assert_eq!(
        ws.read("dest", "go.mod"),
        "module orders\nrequire example.com/lib v1.0.0\n"
    );
    assert_eq!(outcome.included_from_destination, vec!["go.mod"]);
    let backup_dir = outcome.backup_dir.expect("a backup directory");
    assert_eq!(
        fs::read_to_string(backup_dir.join("go.mod")).unwrap(),
        "module orders\n"
    );
}

#[test]
fn test_dry_run_writes_nothing() {
    let ws = Workspace::new();
    ws.write("template", "a/b.txt", "{{.name}}");
    ws.spec(
        r#"
inputs:
  - name: name
    default: orders
steps:
  - action: include
    params:
      paths:
        - paths: ['a']
  - action: go_template
    params:
      paths: ['a']
"#,
    );

    let config = ws.config().dry_run(true);
    let outcome = render(&OsFs, &config, &mut Vec::new(), None).unwrap();
    assert!(outcome.dry_run);
    assert_eq!(outcome.files, vec!["a/b.txt"]);
    assert!(outcome.hashes.contains_key("a/b.txt"));
    assert_eq!(entries(&ws.path("dest")), 0);
}

#[test]
fn test_scratch_directory_lifecycle() {
    let ws = Workspace::new();
    ws.write("template", "a.txt", "a");
    ws.spec(
        r#"
steps:
  - action: include
    params:
      paths:
        - paths: ['a.txt']
"#,
    );

    render(&OsFs, &ws.config(), &mut Vec::new(), None).unwrap();
    assert_eq!(entries(&ws.path("tmp")), 0);

    let config = ws.config().force_overwrite(true).keep_temp_dirs(true);
    let outcome = render(&OsFs, &config, &mut Vec::new(), None).unwrap();
    let scratch = outcome.scratch_dir.expect("kept scratch directory");
    assert_eq!(fs::read_to_string(scratch.join("a.txt")).unwrap(), "a");
}

#[test]
fn test_print_and_for_each() {
    let ws = Workspace::new();
    ws.spec(
        r#"
inputs:
  - name: app
steps:
  - action: for_each
    params:
      iterator:
        key: env
        values: ['dev', 'prod']
      steps:
        - action: print
          params:
            message: 'deploying {{.app}} to {{.env}}'
"#,
    );

    let mut output = Vec::new();
    let config = ws.config().with_input("app", "orders");
    let outcome = render(&OsFs, &config, &mut output, None).unwrap();
    assert_eq!(
        String::from_utf8(output).unwrap(),
        "deploying orders to dev\ndeploying orders to prod\n"
    );
    assert!(outcome.files.is_empty());
}

#[test]
fn test_failing_step_is_named() {
    let ws = Workspace::new();
    ws.spec(
        r#"
steps:
  - action: go_template
    params:
      paths: ['*.md']
"#,
    );

    let err = render(&OsFs, &ws.config(), &mut Vec::new(), None).unwrap_err();
    assert_eq!(
        err.to_string(),
        "step 1 (go_template) failed: glob \"*.md\" did not match any files"
    );
    assert_eq!(entries(&ws.path("tmp")), 0);
}

#[test]
fn test_missing_input() {
    let ws = Workspace::new();
    ws.spec(
        r#"
inputs:
  - name: service
steps: []
"#,
    );

    let err = render(&OsFs, &ws.config(), &mut Vec::new(), None).unwrap_err();
    assert!(matches!(err, RenderError::MissingInput(ref name) if name == "service"));
}

#[test]
fn test_missing_spec() {
    let ws = Workspace::new();
    let err = render(&OsFs, &ws.config(), &mut Vec::new(), None).unwrap_err();
    assert!(matches!(err, RenderError::Spec(_)));
}

#[test]
fn test_scratch_creation_failure_is_wrapped() {
    let ws = Workspace::new();
    ws.spec("steps: []\n");

    let fs = ErrorFs::new(OsFs, FsOp::MkdirTemp);
    let err = render(&fs, &ws.config(), &mut Vec::new(), None).unwrap_err();
    assert!(matches!(err, RenderError::Io { op: "mkdir_temp", .. }));
    assert!(err.to_string().contains("injected mkdir_temp failure"));
}

#[cfg(unix)]
#[test]
fn test_symlink_in_template_aborts_render() {
    let ws = Workspace::new();
    ws.write("template", "src/main.rs", "fn main() {}");
    std::os::unix::fs::symlink("main.rs", ws.path("template").join("src/link.rs")).unwrap();
    ws.spec(
        r#"
steps:
  - action: include
    params:
      paths:
        - paths: ['src']
"#,
    );

    let err = render(&OsFs, &ws.config(), &mut Vec::new(), None).unwrap_err();
    match err.root_cause() {
        RenderError::SymlinkForbidden { path } => assert_eq!(path, "src/link.rs"),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(entries(&ws.path("dest")), 0);
}

#[cfg(unix)]
#[test]
fn test_executable_bit_survives() {
    use std::os::unix::fs::PermissionsExt;

    let ws = Workspace::new();
    ws.write("template", "run.sh", "#!/bin/sh\necho {{.name}}\n");
    fs::set_permissions(
        ws.path("template").join("run.sh"),
        fs::Permissions::from_mode(0o755),
    )
    .unwrap();
    ws.spec(
        r#"
inputs:
  - name: name
    default: hi
steps:
  - action: include
    params:
      paths:
        - paths: ['run.sh']
  - action: go_template
    params:
      paths: ['run.sh']
"#,
    );

    render(&OsFs, &ws.config(), &mut Vec::new(), None).unwrap();
    let mode = fs::metadata(ws.path("dest").join("run.sh"))
        .unwrap()
        .permissions()
        .mode();
    assert_eq!(mode & 0o777, 0o755);
    assert_eq!(ws.read("dest", "run.sh"), "#!/bin/sh\necho hi\n");
}
