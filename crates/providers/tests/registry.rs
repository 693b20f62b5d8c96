use providers::noop::NoopClassifier;
use providers::{ProviderError, ProviderRegistry, ZeroShotClassifier};
use std::sync::Arc;

#[test]
fn preferred_classifier_is_used_when_no_name_given() {
    let reg = ProviderRegistry::new()
        .with_classifier("noop", Arc::new(NoopClassifier))
        .set_preferred_classifier("noop");
    assert!(reg.classifier(None).is_ok());
    assert_eq!(reg.names(), vec!["noop"]);
}

#[test]
fn unknown_classifier_is_an_error() {
    let reg = ProviderRegistry::new().with_classifier("noop", Arc::new(NoopClassifier));
    match reg.classifier(Some("clip")) {
        Err(ProviderError::UnknownProvider(name)) => assert_eq!(name, "clip"),
        _ => panic!("expected UnknownProvider"),
    }
    assert!(matches!(
        reg.classifier(None),
        Err(ProviderError::UnknownProvider(_))
    ));
}

#[tokio::test]
async fn noop_never_classifies() {
    let res = NoopClassifier.classify(&[], &["cat".to_string()]).await;
    assert!(matches!(res, Err(ProviderError::NotImplemented)));
}
