use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        PostError::validation("x")
            .to_string()
            .contains("validation error:")
    );
    assert!(PostError::channel("x").to_string().contains("channel error:"));
    assert!(PostError::busy("x").to_string().contains("channel busy:"));
    assert!(
        PostError::pipeline("x")
            .to_string()
            .contains("pipeline error:")
    );
    assert!(PostError::session("x").to_string().contains("session error:"));
    assert!(
        PostError::serde("x")
            .to_string()
            .contains("serialization error:")
    );
    assert_eq!(PostError::Canceled.to_string(), "canceled");
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = PostError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
    assert!(!err.is_canceled());
    assert!(PostError::Canceled.is_canceled());
}
