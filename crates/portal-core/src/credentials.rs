//! Login gate in front of the session view.
//!
//! This is a placeholder: a single fixed credential pair compared in plain
//! text after an artificial delay. There is no hashing, lockout or rate
//! limiting.

use std::time::Duration;

use crate::config::Credentials;

pub const INVALID_CREDENTIALS: &str = "Invalid username or password. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    Success,
    Failure,
}

impl LoginOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, LoginOutcome::Success)
    }
}

#[derive(Debug, Clone)]
pub struct CredentialGate {
    valid: Credentials,
    delay: Duration,
}

impl CredentialGate {
    pub fn new(valid: Credentials, delay: Duration) -> Self {
        Self { valid, delay }
    }

    pub async fn attempt(&self, username: &str, password: &str) -> LoginOutcome {
        tokio::time::sleep(self.delay).await;

        if username == self.valid.username && password == self.valid.password {
            tracing::info!(username, "login accepted");
            LoginOutcome::Success
        } else {
            tracing::info!(username, "login rejected");
            LoginOutcome::Failure
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn gate() -> CredentialGate {
        CredentialGate::new(Credentials::default(), Duration::from_millis(1000))
    }

    #[tokio::test(start_paused = true)]
    async fn test_valid_pair_succeeds() {
        assert_eq!(gate().attempt("portal", "portal").await, LoginOutcome::Success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_other_pair_fails() {
        let gate = gate();
        let cases = [
            ("", ""),
            ("portal", ""),
            ("", "portal"),
            ("Portal", "portal"),
            ("portal", "PORTAL"),
            ("portal ", "portal"),
            ("admin", "admin"),
            ("portal", "portal\n"),
        ];
        for (user, pass) in cases {
            assert_eq!(gate.attempt(user, pass).await, LoginOutcome::Failure, "{user:?}/{pass:?}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolves_only_after_delay() {
        let gate = gate();
        let start = tokio::time::Instant::now();
        gate.attempt("portal", "portal").await;
        assert!(start.elapsed() >= Duration::from_millis(1000));
    }

    fn near_portal() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("portal".to_string()),
            "[pP][oO]rtal[ \n]?",
            ".{0,12}",
        ]
    }

    proptest! {
        #[test]
        fn test_any_other_pair_fails(user in near_portal(), pass in near_portal()) {
            prop_assume!(!(user == "portal" && pass == "portal"));
            let gate = CredentialGate::new(Credentials::default(), Duration::ZERO);
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
                .unwrap();
            prop_assert_eq!(rt.block_on(gate.attempt(&user, &pass)), LoginOutcome::Failure);
        }
    }
}
