use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;

/// An account at the hosted auth service.
#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// An authenticated session as returned by the token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: User,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(at) => now.timestamp() >= at,
            None => false,
        }
    }
}

/// Sign-up either yields a session immediately or a user waiting on an
/// email confirmation, depending on the project's settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SignUpOutcome {
    Session(Session),
    ConfirmationRequired(User),
}

/// Result of an account operation, delivered back to the event loop.
#[derive(Debug)]
pub enum AuthOutcome {
    SignedIn(Session),
    SignedUp(SignUpOutcome),
    SignedOut,
    UserFetched(User),
    RecoverySent,
    PasswordUpdated,
}

#[derive(Serialize)]
struct Credentials {
    email: String,
    password: String,
}

#[derive(Serialize)]
struct RefreshGrant {
    refresh_token: String,
}

#[derive(Serialize)]
struct RecoveryRequest {
    email: String,
}

#[derive(Serialize)]
struct PasswordChange {
    password: String,
}

/// Thin HTTP wrapper over a GoTrue-compatible auth API. One method per
/// endpoint, no logic beyond shaping requests and responses.
#[derive(Clone)]
pub struct AuthClient {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl AuthClient {
    pub fn new(base_url: &str, anon_key: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("Auth API error {}: {}", status, text));
        }
        Ok(response)
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome> {
        let response = self
            .client
            .post(self.endpoint("/signup"))
            .header("apikey", &self.anon_key)
            .json(&Credentials {
                email: email.to_string(),
                password: password.to_string(),
            })
            .send()
            .await?;

        Ok(Self::check(response).await?.json().await?)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let response = self
            .client
            .post(self.endpoint("/token?grant_type=password"))
            .header("apikey", &self.anon_key)
            .json(&Credentials {
                email: email.to_string(),
                password: password.to_string(),
            })
            .send()
            .await?;

        Ok(Self::check(response).await?.json().await?)
    }

    /// Build the browser URL that starts an OAuth sign-in. No network.
    pub fn oauth_url(&self, provider: &str, redirect_to: Option<&str>) -> String {
        let mut url = format!("{}/authorize?provider={}", self.base_url, provider);
        if let Some(target) = redirect_to {
            url.push_str("&redirect_to=");
            url.push_str(target);
        }
        url
    }

    pub async fn sign_out(&self, access_token: &str) -> Result<()> {
        let response = self
            .client
            .post(self.endpoint("/logout"))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        Self::check(response).await?;
        Ok(())
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<Session> {
        let response = self
            .client
            .post(self.endpoint("/token?grant_type=refresh_token"))
            .header("apikey", &self.anon_key)
            .json(&RefreshGrant {
                refresh_token: refresh_token.to_string(),
            })
            .send()
            .await?;

        Ok(Self::check(response).await?.json().await?)
    }

    pub async fn user(&self, access_token: &str) -> Result<User> {
        let response = self
            .client
            .get(self.endpoint("/user"))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        Ok(Self::check(response).await?.json().await?)
    }

    pub async fn request_recovery(&self, email: &str) -> Result<()> {
        let response = self
            .client
            .post(self.endpoint("/recover"))
            .header("apikey", &self.anon_key)
            .json(&RecoveryRequest {
                email: email.to_string(),
            })
            .send()
            .await?;

        Self::check(response).await?;
        Ok(())
    }

    pub async fn update_password(&self, access_token: &str, new_password: &str) -> Result<User> {
        let response = self
            .client
            .put(self.endpoint("/user"))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .json(&PasswordChange {
                password: new_password.to_string(),
            })
            .send()
            .await?;

        Ok(Self::check(response).await?.json().await?)
    }
}

/// The client plus the current session. Every transition is published on a
/// watch channel so any part of the app can follow sign-in state.
#[derive(Clone)]
pub struct AuthService {
    client: AuthClient,
    session: Arc<watch::Sender<Option<Session>>>,
}

impl AuthService {
    pub fn new(client: AuthClient) -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            client,
            session: Arc::new(tx),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.session.subscribe()
    }

    pub fn session(&self) -> Option<Session> {
        self.session.borrow().clone()
    }

    fn publish(&self, session: Option<Session>) {
        self.session.send_replace(session);
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome> {
        let outcome = self.client.sign_up(email, password).await?;
        if let SignUpOutcome::Session(session) = &outcome {
            self.publish(Some(session.clone()));
        }
        Ok(outcome)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let session = self.client.sign_in(email, password).await?;
        self.publish(Some(session.clone()));
        Ok(session)
    }

    pub fn oauth_url(&self, provider: &str, redirect_to: Option<&str>) -> String {
        self.client.oauth_url(provider, redirect_to)
    }

    /// Drops the local session first, then revokes at the service: a
    /// failed revocation still ends the session on this machine.
    pub async fn sign_out(&self) -> Result<()> {
        let current = self.session();
        self.publish(None);
        if let Some(session) = current {
            self.client.sign_out(&session.access_token).await?;
        }
        Ok(())
    }

    pub async fn refresh(&self) -> Result<Session> {
        let current = self
            .session()
            .ok_or_else(|| anyhow!("Not signed in"))?;
        let session = self.client.refresh(&current.refresh_token).await?;
        self.publish(Some(session.clone()));
        Ok(session)
    }

    pub async fn user(&self) -> Result<User> {
        let current = self
            .session()
            .ok_or_else(|| anyhow!("Not signed in"))?;
        self.client.user(&current.access_token).await
    }

    pub async fn request_recovery(&self, email: &str) -> Result<()> {
        self.client.request_recovery(email).await
    }

    pub async fn update_password(&self, new_password: &str) -> Result<User> {
        let current = self
            .session()
            .ok_or_else(|| anyhow!("Not signed in"))?;
        self.client
            .update_password(&current.access_token, new_password)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_oauth_url_with_redirect() {
        let client = AuthClient::new("https://example.supabase.co/auth/v1/", "anon");
        let url = client.oauth_url("google", Some("http://localhost:3000"));
        assert_eq!(
            url,
            "https://example.supabase.co/auth/v1/authorize?provider=google&redirect_to=http://localhost:3000"
        );
    }

    #[test]
    fn test_oauth_url_without_redirect() {
        let client = AuthClient::new("https://example.supabase.co/auth/v1", "anon");
        let url = client.oauth_url("github", None);
        assert_eq!(
            url,
            "https://example.supabase.co/auth/v1/authorize?provider=github"
        );
    }

    #[test]
    fn test_session_deserializes_token_response() {
        let raw = r#"{
            "access_token": "jwt",
            "token_type": "bearer",
            "expires_in": 3600,
            "expires_at": 1700003600,
            "refresh_token": "refresh",
            "user": {"id": "uuid-1", "email": "pastor@example.com"}
        }"#;
        let session: Session = serde_json::from_str(raw).expect("session");
        assert_eq!(session.access_token, "jwt");
        assert_eq!(session.user.email.as_deref(), Some("pastor@example.com"));
    }

    #[test]
    fn test_sign_up_without_session_means_confirmation() {
        let raw = r#"{"id": "uuid-2", "email": "new@example.com"}"#;
        let outcome: SignUpOutcome = serde_json::from_str(raw).expect("outcome");
        match outcome {
            SignUpOutcome::ConfirmationRequired(user) => {
                assert_eq!(user.email.as_deref(), Some("new@example.com"));
            }
            SignUpOutcome::Session(_) => panic!("expected confirmation"),
        }
    }

    #[test]
    fn test_session_expiry() {
        let session: Session = serde_json::from_str(
            r#"{"access_token": "jwt", "refresh_token": "r",
                "expires_at": 1700000000, "user": {"id": "u"}}"#,
        )
        .expect("session");
        let before = Utc.timestamp_opt(1699999999, 0).unwrap();
        let after = Utc.timestamp_opt(1700000001, 0).unwrap();
        assert!(!session.is_expired(before));
        assert!(session.is_expired(after));
    }

    #[test]
    fn test_service_publishes_transitions() {
        let service = AuthService::new(AuthClient::new("https://example.test", "anon"));
        let rx = service.subscribe();
        assert!(rx.borrow().is_none());

        let session: Session = serde_json::from_str(
            r#"{"access_token": "jwt", "refresh_token": "r", "user": {"id": "u"}}"#,
        )
        .expect("session");
        service.publish(Some(session));
        assert!(rx.borrow().is_some());

        service.publish(None);
        assert!(rx.borrow().is_none());
    }
}
