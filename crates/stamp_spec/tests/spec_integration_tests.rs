//! Integration tests for spec reading.

use std::fs;
use tempfile::tempdir;

use stamp_spec::{Action, IncludeFrom, SpecReader, DEFAULT_SPEC_FILE};

const SPEC: &str = r#"
apiVersion: cli.stamp.dev/v1beta1
kind: Template
desc: A small service template
inputs:
  - name: service_name
    desc: Name of the service
  - name: port
    default: '8080'
steps:
  - desc: Copy sources
    action: include
    params:
      paths:
        - paths: ['src', 'README.md']
          skip: ['*.orig']
  - desc: Keep the existing changelog
    action: include
    params:
      paths:
        - paths: ['CHANGELOG.md']
          from: destination
  - desc: Fill in the service name
    action: regex_name_lookup
    params:
      paths: ['src']
      replacements:
        - regex: 'name = "(?P<service_name>[a-z]+)"'
  - desc: Render config
    action: go_template
    params:
      paths: ['src/config.yaml']
  - action: append
    params:
      paths: ['README.md']
      with: 'Generated for {{.service_name}}'
      skip_ensure_newline: true
"#;

#[test]
fn test_read_template_spec() {
    let temp = tempdir().unwrap();
    fs::write(temp.path().join(DEFAULT_SPEC_FILE), SPEC).unwrap();

    let spec = SpecReader::read_template(temp.path(), DEFAULT_SPEC_FILE).unwrap();

    assert_eq!(spec.kind.as_deref(), Some("Template"));
    assert_eq!(spec.inputs.len(), 2);
    assert_eq!(spec.inputs[1].default.as_deref(), Some("8080"));
    assert!(spec.inputs[0].default.is_none());

    let names: Vec<&str> = spec.steps.iter().map(|s| s.action.name()).collect();
    assert_eq!(
        names,
        vec!["include", "include", "regex_name_lookup", "go_template", "append"]
    );

    match &spec.steps[1].action {
        Action::Include(params) => assert_eq!(params.paths[0].from, IncludeFrom::Destination),
        other => panic!("unexpected action {:?}", other),
    }

    match &spec.steps[4].action {
        Action::Append(params) => assert!(params.skip_ensure_newline),
        other => panic!("unexpected action {:?}", other),
    }
}

#[test]
fn test_unknown_action_fails_whole_spec() {
    let result = SpecReader::from_str("steps:\n  - action: explode\n    params: {}\n");
    assert!(result.is_err());
}
