use super::*;

#[test]
fn empty_document_yields_defaults() {
    let cfg = Config::from_json_str("{}").unwrap();
    assert_eq!(cfg, Config::default());
    assert_eq!(cfg.pipeline.gamma, 2.2);
    assert_eq!(cfg.renderer.line_interval(), Duration::from_millis(1));
}

#[test]
fn partial_groups_keep_other_defaults() {
    let cfg = Config::from_json_str(r#"{"pipeline": {"threads": 2}, "session": {"valuable_after_ms": 10}}"#)
        .unwrap();
    assert_eq!(cfg.pipeline.threads, Some(2));
    assert_eq!(cfg.pipeline.histogram_bins, 256);
    assert_eq!(cfg.session.valuable_after(), Duration::from_millis(10));
}

#[test]
fn invalid_values_are_rejected() {
    for json in [
        r#"{"pipeline": {"gamma": 0.0}}"#,
        r#"{"pipeline": {"histogram_bins": 0}}"#,
        r#"{"pipeline": {"threads": 0}}"#,
    ] {
        assert!(matches!(Config::from_json_str(json), Err(PostError::Validation(_))), "{json}");
    }
}

#[test]
fn unknown_fields_are_serde_errors() {
    assert!(matches!(
        Config::from_json_str(r#"{"pipline": {}}"#),
        Err(PostError::Serde(_))
    ));
}

#[test]
fn reads_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("postkit.json");
    std::fs::write(&path, r#"{"renderer": {"line_interval_ms": 0}}"#).unwrap();
    let cfg = Config::from_path(&path).unwrap();
    assert_eq!(cfg.renderer.line_interval_ms, 0);
}
