//! Code issuance tests.

mod common;

use common::{browser, harness, harness_with, start, test_config};
use sso_server::error::SsoError;
use std::collections::HashSet;
use time::Duration;
use uuid::Uuid;

#[tokio::test]
async fn test_default_ttl_applies_when_none_requested() {
    let h = harness().await;
    let issued = h
        .service
        .issue_code(h.user.uuid, common::APP_ID, &browser())
        .await
        .expect("issue");
    assert_eq!(issued.expires_at, start() + Duration::hours(6));
    assert_eq!(issued.code.len(), 43);

    let stored = h.service.codes().find_by_code(&issued.code).await.unwrap().unwrap();
    assert!(stored.is_active);
    assert_eq!(stored.usage_count, 0);
    assert_eq!(stored.last_used_at, None);
    assert_eq!(stored.user_uuid, h.user.uuid);
    assert_eq!(stored.application_uuid, h.application.uuid);
    assert_eq!(stored.security_context(), browser());
    assert_eq!(h.service.metrics().codes_issued(), 1);
}

#[tokio::test]
async fn test_requested_ttl_is_clamped_to_maximum() {
    let h = harness().await;
    let issued = h
        .service
        .issue_code_with_ttl(h.user.uuid, common::APP_ID, &browser(), Some(Duration::days(3)))
        .await
        .unwrap();
    assert_eq!(issued.expires_at, start() + Duration::hours(12));

    let short = h
        .service
        .issue_code_with_ttl(h.user.uuid, common::APP_ID, &browser(), Some(Duration::minutes(90)))
        .await
        .unwrap();
    assert_eq!(short.expires_at, start() + Duration::minutes(90));
}

#[tokio::test]
async fn test_non_positive_ttl_is_rejected() {
    let h = harness().await;
    for ttl in [Duration::ZERO, Duration::seconds(-30)] {
        let err = h
            .service
            .issue_code_with_ttl(h.user.uuid, common::APP_ID, &browser(), Some(ttl))
            .await
            .unwrap_err();
        assert!(matches!(err, SsoError::InvalidInput(_)), "{ttl}: {err:?}");
        assert_eq!(err.public_reason().as_str(), "invalid_request");
    }
    assert_eq!(h.service.metrics().codes_issued(), 0);
}

#[tokio::test]
async fn test_unknown_or_inactive_parties_are_not_found() {
    let h = harness().await;
    let err = h
        .service
        .issue_code(Uuid::now_v7(), common::APP_ID, &browser())
        .await
        .unwrap_err();
    assert!(matches!(err, SsoError::NotFound));

    let err = h
        .service
        .issue_code(h.user.uuid, "no-such-app", &browser())
        .await
        .unwrap_err();
    assert!(matches!(err, SsoError::NotFound));

    let bob = common::insert_user(&h.db, "bob").await;
    h.service.deactivate_user(bob.uuid).await.unwrap();
    let err = h
        .service
        .issue_code(bob.uuid, common::APP_ID, &browser())
        .await
        .unwrap_err();
    assert!(matches!(err, SsoError::NotFound));
}

#[tokio::test]
async fn test_inactive_application_cannot_receive_codes() {
    use sea_orm::{ActiveModelTrait, ActiveValue::Set, IntoActiveModel};

    let h = harness().await;
    let mut app = h.application.clone().into_active_model();
    app.is_active = Set(false);
    app.update(h.db.as_ref()).await.unwrap();

    let err = h
        .service
        .issue_code(h.user.uuid, common::APP_ID, &browser())
        .await
        .unwrap_err();
    assert!(matches!(err, SsoError::NotFound));
}

#[tokio::test]
async fn test_new_codes_do_not_supersede_by_default() {
    let h = harness().await;
    let mut second_tab = browser();
    second_tab.browser_fingerprint = "fp-second-tab".into();

    let first = h
        .service
        .issue_code(h.user.uuid, common::APP_ID, &browser())
        .await
        .unwrap();
    let second = h
        .service
        .issue_code(h.user.uuid, common::APP_ID, &second_tab)
        .await
        .unwrap();
    assert_ne!(first.code, second.code);

    assert!(h.service.verify_code(&first.code, &browser()).await.is_ok());
    assert!(h.service.verify_code(&second.code, &second_tab).await.is_ok());
    assert_eq!(
        h.service
            .codes()
            .list_for_pair(h.user.uuid, h.application.uuid)
            .await
            .unwrap()
            .len(),
        2
    );
}

#[tokio::test]
async fn test_supersede_flag_deactivates_previous_codes() {
    let mut config = test_config();
    config.authorization.supersede_previous_codes = true;
    let h = harness_with(config).await;
    common::insert_application(&h.db, "wiki").await;

    let old = h
        .service
        .issue_code(h.user.uuid, common::APP_ID, &browser())
        .await
        .unwrap();
    let other_app = h
        .service
        .issue_code(h.user.uuid, "wiki", &browser())
        .await
        .unwrap();
    h.clock.advance(Duration::minutes(5));
    let new = h
        .service
        .issue_code(h.user.uuid, common::APP_ID, &browser())
        .await
        .unwrap();

    let err = h.service.verify_code(&old.code, &browser()).await.unwrap_err();
    assert!(matches!(err, SsoError::Revoked));
    assert!(h.service.verify_code(&new.code, &browser()).await.is_ok());
    assert!(h.service.verify_code(&other_app.code, &browser()).await.is_ok());

    let codes = h
        .service
        .codes()
        .list_for_pair(h.user.uuid, h.application.uuid)
        .await
        .unwrap();
    assert_eq!(codes.len(), 2);
    assert!(codes[0].is_active, "newest code first and active");
    assert!(!codes[1].is_active);
}

#[tokio::test]
async fn test_revoke_codes_for_pair() {
    let h = harness().await;
    let a = h
        .service
        .issue_code(h.user.uuid, common::APP_ID, &browser())
        .await
        .unwrap();
    let b = h
        .service
        .issue_code(h.user.uuid, common::APP_ID, &browser())
        .await
        .unwrap();

    let revoked = h
        .service
        .revoke_codes_for(h.user.uuid, common::APP_ID)
        .await
        .unwrap();
    assert_eq!(revoked, 2);
    for code in [a.code, b.code] {
        let err = h.service.verify_code(&code, &browser()).await.unwrap_err();
        assert!(matches!(err, SsoError::Revoked));
    }
    assert_eq!(
        h.service
            .revoke_codes_for(h.user.uuid, common::APP_ID)
            .await
            .unwrap(),
        0
    );
    assert!(matches!(
        h.service.revoke_code("never-issued").await,
        Err(SsoError::NotFound)
    ));
}

#[tokio::test]
async fn test_issued_codes_are_unique() {
    let h = harness().await;
    let mut seen = HashSet::new();
    for _ in 0..25 {
        let issued = h
            .service
            .issue_code(h.user.uuid, common::APP_ID, &browser())
            .await
            .unwrap();
        assert!(seen.insert(issued.code));
    }
}
