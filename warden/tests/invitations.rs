use chrono::Duration;
use warden::error::{AuthError, TokenError};
use warden::{
    Error, InvitationConfig, MemoryRepositoryProvider, NewRegistration, RateLimitConfig,
    RateLimitRule, RegistrationOutcome, TenantRole, Warden, WardenBuilder,
};

const SIGNING_KEY: &[u8] = b"this_is_a_test_signing_key_for_hs256_not_for_prod";
const PASSWORD: &str = "Correct-h0rse-battery!";

async fn setup() -> Warden<MemoryRepositoryProvider> {
    WardenBuilder::new()
        .with_memory()
        .with_signing_key(SIGNING_KEY.to_vec())
        .build()
        .await
        .unwrap()
}

async fn register(
    warden: &Warden<MemoryRepositoryProvider>,
    email: &str,
    tenant_name: &str,
) -> RegistrationOutcome {
    warden
        .register(NewRegistration {
            email: email.to_string(),
            password: PASSWORD.to_string(),
            given_name: None,
            family_name: None,
            tenant_name: tenant_name.to_string(),
            slug: None,
        })
        .await
        .unwrap()
}

#[tokio::test]
async fn test_invite_and_accept_creates_membership() {
    let warden = setup().await;
    let admin = register(&warden, "ada@example.com", "Acme").await;
    let invitee = register(&warden, "bob@example.com", "Bobs Workshop").await;

    let issued = warden
        .invite_user(&admin.tenant.id, "Bob@example.com", TenantRole::Member, &admin.user.id)
        .await
        .unwrap();
    assert_eq!(issued.invitation.email, "bob@example.com");
    assert!(issued.invitation.id.starts_with("inv_"));

    // The acceptance page can show tenant and role without consuming.
    let pending = warden.check_invitation(&issued.token).await.unwrap().unwrap();
    assert_eq!(pending.tenant_id, admin.tenant.id);
    assert_eq!(pending.role, TenantRole::Member);

    let membership = warden
        .accept_invitation(&issued.token, &invitee.user.id)
        .await
        .unwrap();
    assert_eq!(membership.tenant_id, admin.tenant.id);
    assert_eq!(membership.role, TenantRole::Member);

    // The invitee now belongs to both tenants; their own stays primary.
    let memberships = warden.get_memberships(&invitee.user.id).await.unwrap();
    assert_eq!(memberships.len(), 2);
    assert_eq!(memberships[0].tenant_id, invitee.tenant.id);

    assert!(warden.pending_invitations(&admin.tenant.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_invitation_is_single_use() {
    let warden = setup().await;
    let admin = register(&warden, "ada@example.com", "Acme").await;
    let invitee = register(&warden, "bob@example.com", "Bobs Workshop").await;

    let issued = warden
        .invite_user(&admin.tenant.id, "bob@example.com", TenantRole::Member, &admin.user.id)
        .await
        .unwrap();
    warden
        .accept_invitation(&issued.token, &invitee.user.id)
        .await
        .unwrap();

    let err = warden
        .accept_invitation(&issued.token, &invitee.user.id)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Token(TokenError::Revoked)));
    assert_eq!(err.client_message(), "Invalid or expired token");
}

#[tokio::test]
async fn test_accept_requires_the_invited_email() {
    let warden = setup().await;
    let admin = register(&warden, "ada@example.com", "Acme").await;
    let stranger = register(&warden, "mallory@example.com", "Mallory Inc").await;

    let issued = warden
        .invite_user(&admin.tenant.id, "bob@example.com", TenantRole::Member, &admin.user.id)
        .await
        .unwrap();

    let err = warden
        .accept_invitation(&issued.token, &stranger.user.id)
        .await
        .unwrap_err();
    assert!(err.is_validation_error());

    // The mismatch did not burn the link, and no membership was created.
    assert!(warden.check_invitation(&issued.token).await.unwrap().is_some());
    assert_eq!(warden.get_memberships(&stranger.user.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_declined_invitation_is_dead() {
    let warden = setup().await;
    let admin = register(&warden, "ada@example.com", "Acme").await;
    let invitee = register(&warden, "bob@example.com", "Bobs Workshop").await;

    let issued = warden
        .invite_user(&admin.tenant.id, "bob@example.com", TenantRole::Member, &admin.user.id)
        .await
        .unwrap();
    warden.decline_invitation(&issued.token).await.unwrap();

    let err = warden
        .accept_invitation(&issued.token, &invitee.user.id)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Token(TokenError::Revoked)));
    assert_eq!(warden.get_memberships(&invitee.user.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_revoked_invitation_cannot_be_accepted() {
    let warden = setup().await;
    let admin = register(&warden, "ada@example.com", "Acme").await;
    let invitee = register(&warden, "bob@example.com", "Bobs Workshop").await;

    let issued = warden
        .invite_user(&admin.tenant.id, "bob@example.com", TenantRole::Admin, &admin.user.id)
        .await
        .unwrap();
    assert_eq!(warden.pending_invitations(&admin.tenant.id).await.unwrap().len(), 1);

    warden
        .revoke_invitation(&issued.invitation.id, &admin.user.id)
        .await
        .unwrap();
    assert!(warden.pending_invitations(&admin.tenant.id).await.unwrap().is_empty());

    let err = warden
        .accept_invitation(&issued.token, &invitee.user.id)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Token(TokenError::Revoked)));
}

#[tokio::test]
async fn test_existing_member_cannot_be_invited() {
    let warden = setup().await;
    let admin = register(&warden, "ada@example.com", "Acme").await;

    let err = warden
        .invite_user(&admin.tenant.id, "ada@example.com", TenantRole::Member, &admin.user.id)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Auth(AuthError::UserAlreadyExists)));
}

#[tokio::test]
async fn test_pending_cap_per_address() {
    let warden = WardenBuilder::new()
        .with_memory()
        .with_signing_key(SIGNING_KEY.to_vec())
        .with_invitation_config(InvitationConfig {
            max_pending_per_email: 2,
            ..InvitationConfig::default()
        })
        .build()
        .await
        .unwrap();
    let admin = register(&warden, "ada@example.com", "Acme").await;

    for _ in 0..2 {
        warden
            .invite_user(&admin.tenant.id, "bob@example.com", TenantRole::Member, &admin.user.id)
            .await
            .unwrap();
    }
    let err = warden
        .invite_user(&admin.tenant.id, "bob@example.com", TenantRole::Member, &admin.user.id)
        .await
        .unwrap_err();
    assert!(err.is_validation_error());

    // A different address still goes through.
    warden
        .invite_user(&admin.tenant.id, "carol@example.com", TenantRole::Member, &admin.user.id)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_invitations_are_rate_limited_per_inviter() {
    let warden = WardenBuilder::new()
        .with_memory()
        .with_signing_key(SIGNING_KEY.to_vec())
        .with_rate_limit_config(RateLimitConfig {
            invitation: Some(RateLimitRule::new(2, Duration::hours(1))),
            ..RateLimitConfig::default()
        })
        .build()
        .await
        .unwrap();
    let admin = register(&warden, "ada@example.com", "Acme").await;

    warden
        .invite_user(&admin.tenant.id, "bob@example.com", TenantRole::Member, &admin.user.id)
        .await
        .unwrap();
    warden
        .invite_user(&admin.tenant.id, "carol@example.com", TenantRole::Member, &admin.user.id)
        .await
        .unwrap();

    let err = warden
        .invite_user(&admin.tenant.id, "dave@example.com", TenantRole::Member, &admin.user.id)
        .await
        .unwrap_err();
    assert!(err.is_rate_limit_error());
    assert!(err.retry_after_seconds().unwrap() >= 1);

    // Another admin is throttled independently.
    let other = register(&warden, "erin@example.com", "Erin Co").await;
    warden
        .invite_user(&other.tenant.id, "frank@example.com", TenantRole::Member, &other.user.id)
        .await
        .unwrap();
}
