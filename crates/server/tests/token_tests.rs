//! Token lifecycle tests: minting, rotation, revocation, authentication.

mod common;

use common::{Harness, browser, harness, start};
use sso_server::error::SsoError;
use sso_server::tokens::{RevokeTarget, TokenPair};
use time::Duration;

async fn verified(h: &Harness) -> TokenPair {
    let issued = h
        .service
        .issue_code(h.user.uuid, common::APP_ID, &browser())
        .await
        .expect("issue");
    h.service
        .verify_code(&issued.code, &browser())
        .await
        .expect("verify")
}

#[tokio::test]
async fn test_issued_pair_has_configured_lifetimes() {
    let h = harness().await;
    let pair = verified(&h).await;
    assert_eq!(pair.access_token_expires_at, start() + Duration::minutes(15));
    assert_eq!(pair.refresh_token_expires_at, start() + Duration::days(14));
    assert_ne!(pair.access_token, pair.refresh_token);
    assert_eq!(pair.access_token.len(), 43);
}

#[tokio::test]
async fn test_authenticate_resolves_live_access_token() {
    let h = harness().await;
    let pair = verified(&h).await;

    h.clock.advance(Duration::minutes(5));
    let token = h.service.authenticate(&pair.access_token).await.expect("live");
    assert_eq!(token.user_uuid, h.user.uuid);
    assert_eq!(token.last_used_at, Some(start() + Duration::minutes(5)));
    assert_eq!(token.ip_address.as_deref(), Some(browser().ip_address.as_str()));
    assert_eq!(token.user_agent.as_deref(), Some(browser().user_agent.as_str()));

    h.clock.advance(Duration::minutes(10));
    let err = h.service.authenticate(&pair.access_token).await.unwrap_err();
    assert!(matches!(err, SsoError::InvalidToken));

    let err = h.service.authenticate("garbage").await.unwrap_err();
    assert!(matches!(err, SsoError::InvalidToken));
}

#[tokio::test]
async fn test_refresh_rotates_and_old_refresh_token_dies() {
    let h = harness().await;
    let first = verified(&h).await;

    // Access token expiry does not stop a refresh.
    h.clock.advance(Duration::hours(1));
    let second = h.service.refresh_token(&first.refresh_token).await.expect("refresh");
    assert_ne!(second.refresh_token, first.refresh_token);
    assert_ne!(second.access_token, first.access_token);
    assert_eq!(
        second.access_token_expires_at,
        start() + Duration::hours(1) + Duration::minutes(15)
    );

    let err = h.service.refresh_token(&first.refresh_token).await.unwrap_err();
    assert!(matches!(err, SsoError::InvalidToken));
    assert_eq!(err.public_reason().as_str(), "invalid_token");

    let err = h.service.authenticate(&first.access_token).await.unwrap_err();
    assert!(matches!(err, SsoError::InvalidToken));

    // Device metadata follows the rotation.
    let token = h.service.authenticate(&second.access_token).await.unwrap();
    assert_eq!(token.ip_address.as_deref(), Some("203.0.113.7"));

    let third = h.service.refresh_token(&second.refresh_token).await.unwrap();
    assert_ne!(third.refresh_token, second.refresh_token);
    assert_eq!(h.service.metrics().tokens_refreshed(), 2);
}

#[tokio::test]
async fn test_refresh_after_refresh_expiry_fails() {
    let h = harness().await;
    let pair = verified(&h).await;
    h.clock.advance(Duration::days(14));
    let err = h.service.refresh_token(&pair.refresh_token).await.unwrap_err();
    assert!(matches!(err, SsoError::InvalidToken));

    let err = h.service.refresh_token("unknown-refresh").await.unwrap_err();
    assert!(matches!(err, SsoError::InvalidToken));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_refresh_has_single_winner() {
    let h = harness().await;
    let pair = verified(&h).await;

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let service = h.service.clone();
            let refresh = pair.refresh_token.clone();
            tokio::spawn(async move { service.refresh_token(&refresh).await })
        })
        .collect();
    let results: Vec<_> = futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.expect("task"))
        .collect();

    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);
    assert!(
        results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, SsoError::InvalidToken))
    );
}

#[tokio::test]
async fn test_revoke_by_refresh_token_and_uuid() {
    let h = harness().await;
    let a = verified(&h).await;
    let b = verified(&h).await;

    let revoked = h
        .service
        .revoke_token(RevokeTarget::RefreshToken(a.refresh_token.clone()))
        .await
        .unwrap();
    assert_eq!(revoked, 1);
    assert!(matches!(
        h.service.refresh_token(&a.refresh_token).await,
        Err(SsoError::InvalidToken)
    ));
    // Revocation is idempotent and reports nothing changed.
    assert_eq!(
        h.service
            .revoke_token(RevokeTarget::RefreshToken(a.refresh_token))
            .await
            .unwrap(),
        0
    );

    assert_eq!(
        h.service
            .revoke_token(RevokeTarget::Token(b.token_uuid))
            .await
            .unwrap(),
        1
    );
    assert!(h.service.authenticate(&b.access_token).await.is_err());

    assert!(matches!(
        h.service
            .revoke_token(RevokeTarget::RefreshToken("nope".into()))
            .await,
        Err(SsoError::InvalidToken)
    ));
}

#[tokio::test]
async fn test_revoke_by_user_counts_sessions() {
    let h = harness().await;
    let sessions = [verified(&h).await, verified(&h).await, verified(&h).await];
    let bob = common::insert_user(&h.db, "bob").await;
    let bob_code = h
        .service
        .issue_code(bob.uuid, common::APP_ID, &browser())
        .await
        .unwrap();
    let bob_pair = h.service.verify_code(&bob_code.code, &browser()).await.unwrap();

    let revoked = h
        .service
        .revoke_token(RevokeTarget::User(h.user.uuid))
        .await
        .unwrap();
    assert_eq!(revoked, 3);
    for pair in &sessions {
        assert!(h.service.refresh_token(&pair.refresh_token).await.is_err());
    }
    assert!(h.service.authenticate(&bob_pair.access_token).await.is_ok());
}
