use crate::{
    Error,
    error::{PasswordError, ValidationError},
    repositories::{PasswordHistoryEntry, PasswordRepository, StoredCredential},
    user::UserId,
};
use std::sync::Arc;

/// The symbols the strength policy accepts. Passwords may only contain
/// letters, digits, and these characters.
pub const ALLOWED_SYMBOLS: &str = "@$!%*?&#^~-_=.";

/// Strength and history rules applied to every new password.
///
/// The defaults are the production rules: 12 to 128 characters, one of
/// each character class, and the five most recent hashes retained for
/// reuse checks. Boundary layers may pre-validate for nicer UX, but the
/// services re-check here regardless.
#[derive(Debug, Clone)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub max_length: usize,
    pub require_uppercase: bool,
    pub require_lowercase: bool,
    pub require_digit: bool,
    pub require_symbol: bool,
    /// How many previous hashes are retained and checked for reuse.
    pub history_depth: usize,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 12,
            max_length: 128,
            require_uppercase: true,
            require_lowercase: true,
            require_digit: true,
            require_symbol: true,
            history_depth: 5,
        }
    }
}

/// Service for the password lifecycle: hashing, verification, strength
/// policy, and history.
pub struct PasswordService<P: PasswordRepository> {
    repository: Arc<P>,
    policy: PasswordPolicy,
}

impl<P: PasswordRepository> PasswordService<P> {
    pub fn new(repository: Arc<P>) -> Self {
        Self::with_policy(repository, PasswordPolicy::default())
    }

    pub fn with_policy(repository: Arc<P>, policy: PasswordPolicy) -> Self {
        Self { repository, policy }
    }

    pub fn policy(&self) -> &PasswordPolicy {
        &self.policy
    }

    /// Hash a password with a per-hash salt.
    ///
    /// Two calls on the same input produce different hashes that both
    /// verify. Empty input is rejected before any hashing work.
    pub fn hash_password(&self, password: &str) -> Result<String, Error> {
        if password.is_empty() {
            return Err(Error::Validation(ValidationError::MissingField(
                "password must not be empty".to_string(),
            )));
        }
        use password_auth::generate_hash;
        Ok(generate_hash(password))
    }

    /// Verify a password against a stored hash.
    ///
    /// Never fails: a malformed or truncated hash is simply a mismatch.
    /// Login paths rely on this so corrupt rows degrade to a failed
    /// attempt instead of a 500.
    pub fn verify_password(&self, password: &str, hash: &str) -> bool {
        use password_auth::verify_password;
        verify_password(password, hash).is_ok()
    }

    /// Verify a password for a user, treating a missing credential as a
    /// mismatch.
    pub async fn verify_for_user(&self, user_id: &UserId, password: &str) -> Result<bool, Error> {
        match self.repository.get_credential(user_id).await? {
            Some(credential) => Ok(self.verify_password(password, &credential.password_hash)),
            None => Ok(false),
        }
    }

    /// Check a candidate password against the strength policy.
    ///
    /// Collects every failed rule into one violation so the caller sees
    /// the full list, not just the first problem.
    pub fn validate_strength(&self, password: &str) -> Result<(), Error> {
        let mut violations = Vec::new();

        if password.chars().count() < self.policy.min_length {
            violations.push(format!("at least {} characters", self.policy.min_length));
        }
        if password.chars().count() > self.policy.max_length {
            violations.push(format!("at most {} characters", self.policy.max_length));
        }
        if self.policy.require_uppercase && !password.chars().any(|c| c.is_ascii_uppercase()) {
            violations.push("an uppercase letter".to_string());
        }
        if self.policy.require_lowercase && !password.chars().any(|c| c.is_ascii_lowercase()) {
            violations.push("a lowercase letter".to_string());
        }
        if self.policy.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
            violations.push("a digit".to_string());
        }
        if self.policy.require_symbol && !password.chars().any(|c| ALLOWED_SYMBOLS.contains(c)) {
            violations.push(format!("a symbol from {ALLOWED_SYMBOLS}"));
        }
        let charset_ok = password
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || ALLOWED_SYMBOLS.contains(c));
        if !charset_ok {
            violations.push(format!(
                "only letters, digits, and {ALLOWED_SYMBOLS}"
            ));
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(Error::Password(PasswordError::PolicyViolation(format!(
                "must contain {}",
                violations.join(", ")
            ))))
        }
    }

    /// Membership test against retained history entries.
    ///
    /// Hashes are salted, so this verifies the candidate against each
    /// entry rather than comparing digests; a digest comparison could
    /// never match and would make the history check a no-op.
    pub fn is_password_in_history(
        &self,
        candidate: &str,
        history: &[PasswordHistoryEntry],
    ) -> bool {
        history
            .iter()
            .any(|entry| self.verify_password(candidate, &entry.password_hash))
    }

    /// The retained history window for a user, newest first.
    pub async fn recent_history(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<PasswordHistoryEntry>, Error> {
        self.repository
            .recent_history(user_id, self.policy.history_depth)
            .await
    }

    /// Fail with [`PasswordError::Reused`] when the candidate matches one
    /// of the retained previous passwords.
    pub async fn ensure_not_reused(&self, user_id: &UserId, candidate: &str) -> Result<(), Error> {
        let history = self.recent_history(user_id).await?;
        if self.is_password_in_history(candidate, &history) {
            return Err(Error::Password(PasswordError::Reused));
        }
        Ok(())
    }

    /// Append a hash to the history and trim to the policy depth.
    pub async fn record_history(&self, user_id: &UserId, hash: &str) -> Result<(), Error> {
        self.repository.add_history_entry(user_id, hash).await?;
        self.repository
            .trim_history(user_id, self.policy.history_depth)
            .await?;
        Ok(())
    }

    /// Set a user's password: strength check, hash, store, record history.
    ///
    /// History reuse is NOT checked here; change and reset flows call
    /// [`ensure_not_reused`](Self::ensure_not_reused) first, while initial
    /// registration has no history to check.
    pub async fn set_password(&self, user_id: &UserId, password: &str) -> Result<(), Error> {
        self.validate_strength(password)?;
        let hash = self.hash_password(password)?;
        self.repository.set_password_hash(user_id, &hash).await?;
        self.record_history(user_id, &hash).await?;
        Ok(())
    }

    /// Fetch the stored credential, if any.
    pub async fn get_credential(
        &self,
        user_id: &UserId,
    ) -> Result<Option<StoredCredential>, Error> {
        self.repository.get_credential(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct MockPasswordRepository {
        credentials: Arc<Mutex<HashMap<UserId, StoredCredential>>>,
        history: Arc<Mutex<Vec<PasswordHistoryEntry>>>,
    }

    #[async_trait]
    impl PasswordRepository for MockPasswordRepository {
        async fn set_password_hash(&self, user_id: &UserId, hash: &str) -> Result<(), Error> {
            self.credentials.lock().await.insert(
                user_id.clone(),
                StoredCredential {
                    user_id: user_id.clone(),
                    password_hash: hash.to_string(),
                    changed_at: Utc::now(),
                },
            );
            Ok(())
        }

        async fn get_credential(
            &self,
            user_id: &UserId,
        ) -> Result<Option<StoredCredential>, Error> {
            Ok(self.credentials.lock().await.get(user_id).cloned())
        }

        async fn add_history_entry(
            &self,
            user_id: &UserId,
            hash: &str,
        ) -> Result<PasswordHistoryEntry, Error> {
            let entry = PasswordHistoryEntry {
                user_id: user_id.clone(),
                password_hash: hash.to_string(),
                created_at: Utc::now(),
            };
            self.history.lock().await.push(entry.clone());
            Ok(entry)
        }

        async fn recent_history(
            &self,
            user_id: &UserId,
            limit: usize,
        ) -> Result<Vec<PasswordHistoryEntry>, Error> {
            let history = self.history.lock().await;
            let mut entries: Vec<_> = history
                .iter()
                .filter(|e| &e.user_id == user_id)
                .cloned()
                .collect();
            entries.reverse();
            entries.truncate(limit);
            Ok(entries)
        }

        async fn trim_history(&self, user_id: &UserId, keep: usize) -> Result<u64, Error> {
            let mut history = self.history.lock().await;
            let mut seen = 0usize;
            let mut removed = 0u64;
            // Iterate newest first, drop everything past `keep`.
            let mut retained: Vec<PasswordHistoryEntry> = Vec::with_capacity(history.len());
            for entry in history.iter().rev() {
                if &entry.user_id == user_id {
                    seen += 1;
                    if seen > keep {
                        removed += 1;
                        continue;
                    }
                }
                retained.push(entry.clone());
            }
            retained.reverse();
            *history = retained;
            Ok(removed)
        }
    }

    fn service() -> PasswordService<MockPasswordRepository> {
        PasswordService::new(Arc::new(MockPasswordRepository::default()))
    }

    const GOOD_PASSWORD: &str = "Str0ng-enough!";

    #[test]
    fn test_hash_and_verify_roundtrip() {
        let service = service();
        let hash = service.hash_password(GOOD_PASSWORD).unwrap();
        assert!(service.verify_password(GOOD_PASSWORD, &hash));
        assert!(!service.verify_password("Wrong-passw0rd!", &hash));
    }

    #[test]
    fn test_hashes_are_salted() {
        let service = service();
        let first = service.hash_password(GOOD_PASSWORD).unwrap();
        let second = service.hash_password(GOOD_PASSWORD).unwrap();
        assert_ne!(first, second);
        assert!(service.verify_password(GOOD_PASSWORD, &first));
        assert!(service.verify_password(GOOD_PASSWORD, &second));
    }

    #[test]
    fn test_hash_rejects_empty_password() {
        let service = service();
        let result = service.hash_password("");
        assert!(matches!(
            result.unwrap_err(),
            Error::Validation(ValidationError::MissingField(_))
        ));
    }

    #[test]
    fn test_verify_never_fails_on_malformed_hash() {
        let service = service();
        assert!(!service.verify_password(GOOD_PASSWORD, "not-a-hash"));
        assert!(!service.verify_password(GOOD_PASSWORD, ""));
        assert!(!service.verify_password(GOOD_PASSWORD, "$argon2id$truncated"));
    }

    #[test]
    fn test_validate_strength_accepts_policy_compliant_password() {
        let service = service();
        assert!(service.validate_strength("Abcdefgh1234!").is_ok());
        assert!(service.validate_strength("xK9@wwwwwwwww").is_ok());
    }

    #[test]
    fn test_validate_strength_lists_every_violation() {
        let service = service();
        let err = service.validate_strength("short").unwrap_err();
        let Error::Password(PasswordError::PolicyViolation(message)) = err else {
            panic!("expected policy violation");
        };
        assert!(message.contains("at least 12 characters"));
        assert!(message.contains("an uppercase letter"));
        assert!(message.contains("a digit"));
        assert!(message.contains("a symbol"));
    }

    #[test]
    fn test_validate_strength_rejects_characters_outside_allowed_set() {
        let service = service();
        assert!(service.validate_strength("Has spaces 12!A").is_err());
        assert!(service.validate_strength("Emoji-p4ss🔒word").is_err());
    }

    #[test]
    fn test_validate_strength_rejects_overlong_password() {
        let service = service();
        let overlong = format!("Aa1!{}", "x".repeat(130));
        assert!(service.validate_strength(&overlong).is_err());
    }

    #[tokio::test]
    async fn test_history_membership() {
        let service = service();
        let user_id = UserId::new_random();

        service.set_password(&user_id, "First-passw0rd!").await.unwrap();
        let history = service.recent_history(&user_id).await.unwrap();

        assert!(service.is_password_in_history("First-passw0rd!", &history));
        assert!(!service.is_password_in_history("Other-passw0rd!", &history));
    }

    #[tokio::test]
    async fn test_history_is_trimmed_to_policy_depth() {
        let service = service();
        let user_id = UserId::new_random();

        for generation in 0..7 {
            service
                .set_password(&user_id, &format!("Rotation-{generation}-pw!"))
                .await
                .unwrap();
        }

        let history = service.recent_history(&user_id).await.unwrap();
        assert_eq!(history.len(), 5);

        // The two oldest generations fell out of the window.
        assert!(!service.is_password_in_history("Rotation-0-pw!", &history));
        assert!(!service.is_password_in_history("Rotation-1-pw!", &history));
        assert!(service.is_password_in_history("Rotation-6-pw!", &history));
    }

    #[tokio::test]
    async fn test_ensure_not_reused() {
        let service = service();
        let user_id = UserId::new_random();

        service.set_password(&user_id, "Original-pw-1!").await.unwrap();

        let err = service
            .ensure_not_reused(&user_id, "Original-pw-1!")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Password(PasswordError::Reused)));

        assert!(service.ensure_not_reused(&user_id, "Fresh-pw-22!").await.is_ok());
    }

    #[tokio::test]
    async fn test_verify_for_user_without_credential() {
        let service = service();
        let user_id = UserId::new_random();
        assert!(!service.verify_for_user(&user_id, GOOD_PASSWORD).await.unwrap());
    }
}
