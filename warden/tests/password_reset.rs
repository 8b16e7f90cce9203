use chrono::Utc;
use warden::{ClientInfo, MemoryRepositoryProvider, NewRegistration, Warden, WardenBuilder};

const SIGNING_KEY: &[u8] = b"this_is_a_test_signing_key_for_hs256_not_for_prod";
const PASSWORD: &str = "Correct-h0rse-battery!";
const NEW_PASSWORD: &str = "Fresh-p4ssword-2!";

async fn setup() -> Warden<MemoryRepositoryProvider> {
    WardenBuilder::new()
        .with_memory()
        .with_signing_key(SIGNING_KEY.to_vec())
        .build()
        .await
        .unwrap()
}

async fn register(warden: &Warden<MemoryRepositoryProvider>, email: &str) {
    warden
        .register(NewRegistration {
            email: email.to_string(),
            password: PASSWORD.to_string(),
            given_name: None,
            family_name: None,
            tenant_name: "Test Tenant".to_string(),
            slug: None,
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_unknown_email_yields_no_request_and_no_error() {
    let warden = setup().await;
    let request = warden
        .request_password_reset("ghost@example.com")
        .await
        .unwrap();
    assert!(request.is_none());
}

#[tokio::test]
async fn test_reset_flow_end_to_end() {
    let warden = setup().await;
    register(&warden, "ada@example.com").await;

    let session = warden
        .login("ada@example.com", PASSWORD, false, &ClientInfo::default())
        .await
        .unwrap();

    let request = warden
        .request_password_reset("ada@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(request.user.email, "ada@example.com");
    assert!(request.expires_at > Utc::now());

    let user = warden
        .reset_password(&request.token, NEW_PASSWORD)
        .await
        .unwrap();
    assert_eq!(user.id, request.user.id);

    // The reset revoked every outstanding session.
    assert!(warden.refresh_session(&session.tokens.refresh_token).await.is_err());

    // Only the new password logs in.
    assert!(
        warden
            .login("ada@example.com", PASSWORD, false, &ClientInfo::default())
            .await
            .is_err()
    );
    warden
        .login("ada@example.com", NEW_PASSWORD, false, &ClientInfo::default())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_reset_token_is_single_use() {
    let warden = setup().await;
    register(&warden, "ada@example.com").await;

    let request = warden
        .request_password_reset("ada@example.com")
        .await
        .unwrap()
        .unwrap();

    warden
        .reset_password(&request.token, NEW_PASSWORD)
        .await
        .unwrap();

    let err = warden
        .reset_password(&request.token, "Another-p4ss!x")
        .await
        .unwrap_err();
    assert!(err.is_token_error());
    assert_eq!(err.client_message(), "Invalid or expired token");
}

#[tokio::test]
async fn test_weak_replacement_does_not_burn_the_token() {
    let warden = setup().await;
    register(&warden, "ada@example.com").await;

    let request = warden
        .request_password_reset("ada@example.com")
        .await
        .unwrap()
        .unwrap();

    let err = warden.reset_password(&request.token, "weak").await.unwrap_err();
    assert!(err.is_password_error());

    // The strength check runs before consumption, so the same link still
    // works with an acceptable password.
    warden
        .reset_password(&request.token, NEW_PASSWORD)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_reset_rejects_recently_used_password() {
    let warden = setup().await;
    register(&warden, "ada@example.com").await;

    let request = warden
        .request_password_reset("ada@example.com")
        .await
        .unwrap()
        .unwrap();

    let err = warden
        .reset_password(&request.token, PASSWORD)
        .await
        .unwrap_err();
    assert!(err.is_password_error());
}

#[tokio::test]
async fn test_check_reset_token() {
    let warden = setup().await;
    register(&warden, "ada@example.com").await;

    assert!(!warden.check_reset_token("no-such-token").await.unwrap());

    let request = warden
        .request_password_reset("ada@example.com")
        .await
        .unwrap()
        .unwrap();
    assert!(warden.check_reset_token(&request.token).await.unwrap());

    // Checking does not consume.
    assert!(warden.check_reset_token(&request.token).await.unwrap());

    warden
        .reset_password(&request.token, NEW_PASSWORD)
        .await
        .unwrap();
    assert!(!warden.check_reset_token(&request.token).await.unwrap());
}

#[tokio::test]
async fn test_reset_clears_an_active_lockout() {
    let warden = setup().await;
    register(&warden, "ada@example.com").await;

    for _ in 0..5 {
        warden
            .login("ada@example.com", "Wrong-passw0rd!", false, &ClientInfo::default())
            .await
            .unwrap_err();
    }
    assert!(warden.lockout_status("ada@example.com").await.unwrap().is_locked);

    let request = warden
        .request_password_reset("ada@example.com")
        .await
        .unwrap()
        .unwrap();
    warden
        .reset_password(&request.token, NEW_PASSWORD)
        .await
        .unwrap();

    // The owner proved control of the mailbox; the lock is gone.
    assert!(!warden.lockout_status("ada@example.com").await.unwrap().is_locked);
    warden
        .login("ada@example.com", NEW_PASSWORD, false, &ClientInfo::default())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_newer_request_does_not_invalidate_older_one() {
    let warden = setup().await;
    register(&warden, "ada@example.com").await;

    let first = warden
        .request_password_reset("ada@example.com")
        .await
        .unwrap()
        .unwrap();
    let second = warden
        .request_password_reset("ada@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_ne!(first.token, second.token);

    // Redemption consumes only its own token; the other link stays live
    // until it is redeemed or expires.
    warden.reset_password(&first.token, NEW_PASSWORD).await.unwrap();
    assert!(warden.check_reset_token(&second.token).await.unwrap());
}
