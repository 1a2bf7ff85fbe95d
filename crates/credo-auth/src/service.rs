//! Authentication flow orchestration — registration, email
//! verification, login with optional MFA challenge, federated login,
//! token refresh, logout, and the password change/reset flows.
//!
//! Every decision point records a login attempt and/or an audit event,
//! regardless of outcome. Unknown-identity and wrong-password failures
//! are collapsed into one `InvalidCredentials` error so responses never
//! reveal whether an identity exists.

use chrono::{DateTime, Duration, Utc};
use credo_core::error::{CoreError, CoreResult};
use credo_core::models::audit::{AuditCategory, AuditSeverity, CreateAuditEvent};
use credo_core::models::login_attempt::{CreateLoginAttempt, FailureReason};
use credo_core::models::user::{
    CreateUser, IdentityProvider, Role, UpdateUser, User, PASSWORD_HISTORY_CAP,
};
use credo_core::repository::{
    AuditEventRepository, BlocklistStore, LoginAttemptRepository, SessionRepository,
    UserRepository,
};
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use crate::audit::{Auditor, RequestMeta};
use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::lockout::{self, FailureUpdate, LockoutDecision, LockoutPolicy};
use crate::outbound::{CaptchaVerifier, Email, EmailSender, FederatedVerifier};
use crate::password;
use crate::session::{SessionManager, SessionPolicy};
use crate::token;
use crate::totp;

/// Input for registration.
#[derive(Debug)]
pub struct RegisterInput {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub captcha_token: String,
}

/// Input for the login flow.
#[derive(Debug)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
    pub captcha_token: String,
}

/// The three opaque credentials materializing an authenticated session.
#[derive(Debug, Clone)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub session_token: String,
    pub session_id: Uuid,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
}

/// Successful password check either completes or demands a second
/// factor.
#[derive(Debug)]
pub enum LoginOutcome {
    Success(SessionTokens),
    MfaRequired {
        /// Short-lived challenge token to present alongside the code.
        challenge_token: String,
    },
}

/// MFA enrollment material, shown to the user exactly once.
#[derive(Debug)]
pub struct MfaEnrollment {
    pub secret: String,
    pub otpauth_uri: String,
}

/// Authentication service.
///
/// Generic over the repository and store traits so the auth layer has no
/// dependency on any storage engine.
pub struct AuthService<U, S, A, L, B>
where
    U: UserRepository,
    S: SessionRepository,
    A: AuditEventRepository,
    L: LoginAttemptRepository,
    B: BlocklistStore,
{
    users: U,
    sessions: SessionManager<S>,
    auditor: Auditor<A, L>,
    blocklist: B,
    config: AuthConfig,
}

impl<U, S, A, L, B> AuthService<U, S, A, L, B>
where
    U: UserRepository,
    S: SessionRepository,
    A: AuditEventRepository,
    L: LoginAttemptRepository,
    B: BlocklistStore,
{
    pub fn new(
        users: U,
        session_repo: S,
        audit_repo: A,
        attempt_repo: L,
        blocklist: B,
        config: AuthConfig,
    ) -> Self {
        let sessions = SessionManager::new(
            session_repo,
            SessionPolicy {
                idle_timeout_secs: config.session_idle_timeout_secs,
                absolute_lifetime_secs: config.session_absolute_lifetime_secs,
            },
        );
        Self {
            users,
            sessions,
            auditor: Auditor::new(audit_repo, attempt_repo),
            blocklist,
            config,
        }
    }

    pub fn users(&self) -> &U {
        &self.users
    }

    pub fn sessions(&self) -> &SessionManager<S> {
        &self.sessions
    }

    pub fn auditor(&self) -> &Auditor<A, L> {
        &self.auditor
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    fn lockout_policy(&self) -> LockoutPolicy {
        LockoutPolicy {
            max_attempts: self.config.max_failed_login_attempts,
            lock_duration_secs: self.config.lockout_duration_secs,
        }
    }

    // -------------------------------------------------------------------
    // Registration and email verification
    // -------------------------------------------------------------------

    /// Register a local account. The account cannot authenticate until
    /// the emailed PIN is confirmed.
    pub async fn register<C: CaptchaVerifier, M: EmailSender>(
        &self,
        input: RegisterInput,
        captcha: &C,
        mailer: &M,
        meta: &RequestMeta,
    ) -> CoreResult<Uuid> {
        self.check_captcha(captcha, &input.captcha_token, meta).await?;

        let email = input.email.trim().to_lowercase();
        password::validate_strength(&input.password, self.config.min_password_length)
            .map_err(CoreError::from)?;

        match self.users.get_by_email(&email).await {
            Ok(_) => {
                return Err(CoreError::AlreadyExists {
                    entity: "user".into(),
                });
            }
            Err(CoreError::NotFound { .. }) => {}
            Err(e) => return Err(e),
        }

        let hash = password::hash_password(&input.password, self.config.pepper.as_deref())
            .map_err(CoreError::from)?;
        let pin = token::random_otp(6);
        let now = Utc::now();

        let user = self
            .users
            .create(CreateUser {
                email: email.clone(),
                password_hash: Some(hash),
                first_name: input.first_name,
                last_name: input.last_name,
                phone: input.phone,
                role: Role::User,
                provider: IdentityProvider::Local,
                provider_subject: None,
                email_verified: false,
                verification_pin: Some(pin.clone()),
                verification_pin_expires_at: Some(
                    now + Duration::seconds(self.config.verification_pin_ttl_secs as i64),
                ),
            })
            .await?;

        // Start the expiry clock on the initial password.
        self.users
            .update(
                user.id,
                UpdateUser {
                    password_expires_at: Some(Some(
                        now + Duration::days(self.config.password_max_age_days),
                    )),
                    ..Default::default()
                },
            )
            .await?;

        self.dispatch_email(
            mailer,
            Email {
                to: email.clone(),
                subject: "Verify your email".into(),
                html: format!("<p>Your verification code is <b>{pin}</b>.</p>"),
                text: format!("Your verification code is {pin}."),
            },
        )
        .await;

        let mut event = CreateAuditEvent::new(AuditCategory::User, "user.register", true);
        event.actor_id = Some(user.id);
        event.actor_email = Some(email);
        self.auditor.record(event, meta).await;

        Ok(user.id)
    }

    /// Confirm the emailed PIN. Succeeds only inside the PIN's lifetime
    /// and yields a full authenticated session.
    pub async fn verify_email(
        &self,
        email: &str,
        pin: &str,
        meta: &RequestMeta,
    ) -> CoreResult<SessionTokens> {
        let email = email.trim().to_lowercase();
        let now = Utc::now();

        let user = match self.users.get_by_email(&email).await {
            Ok(u) => u,
            Err(CoreError::NotFound { .. }) => {
                return Err(AuthError::PinInvalid.into());
            }
            Err(e) => return Err(e),
        };

        let valid = !user.email_verified
            && user.verification_pin.as_deref() == Some(pin)
            && user.verification_pin_expires_at.is_some_and(|t| now <= t);

        if !valid {
            let mut event =
                CreateAuditEvent::new(AuditCategory::Auth, "auth.verify_email", false);
            event.actor_email = Some(email);
            event.error_message = Some("invalid or expired PIN".into());
            self.auditor.record(event, meta).await;
            return Err(AuthError::PinInvalid.into());
        }

        let user = self
            .users
            .update(
                user.id,
                UpdateUser {
                    email_verified: Some(true),
                    verification_pin: Some(None),
                    verification_pin_expires_at: Some(None),
                    ..Default::default()
                },
            )
            .await?;

        let tokens = self.issue_session(&user, meta).await?;

        let mut event = CreateAuditEvent::new(AuditCategory::Auth, "auth.verify_email", true);
        event.actor_id = Some(user.id);
        event.actor_email = Some(user.email.clone());
        event.session_id = Some(tokens.session_id);
        self.auditor.record(event, meta).await;

        Ok(tokens)
    }

    // -------------------------------------------------------------------
    // Login
    // -------------------------------------------------------------------

    /// Authenticate with email + password.
    ///
    /// Pipeline: blocklist → CAPTCHA → lookup → lockout → suspension →
    /// verification → password → optional MFA challenge → session
    /// issuance. Every terminal failure records a login attempt with its
    /// real reason, while unknown-identity and wrong-password collapse to
    /// the same caller-visible error.
    pub async fn login<C: CaptchaVerifier>(
        &self,
        input: LoginInput,
        captcha: &C,
        meta: &RequestMeta,
    ) -> CoreResult<LoginOutcome> {
        let now = Utc::now();
        let email = input.email.trim().to_lowercase();

        if let Some(ip) = &meta.ip_address {
            if self.blocklist.is_blocked(ip, now).await? {
                let mut event =
                    CreateAuditEvent::new(AuditCategory::Security, "auth.login.blocked_ip", false);
                event.severity = AuditSeverity::Warning;
                event.actor_email = Some(email);
                self.auditor.record(event, meta).await;
                return Err(CoreError::RateLimited);
            }
        }

        self.check_captcha(captcha, &input.captcha_token, meta).await?;

        let user = match self.users.get_by_email(&email).await {
            Ok(u) => u,
            Err(CoreError::NotFound { .. }) => {
                // Burn a hash verification so this path takes as long as
                // a wrong-password attempt.
                password::burn_verification(&input.password, self.config.pepper.as_deref());
                self.record_login_failure(&email, None, FailureReason::InvalidCredentials, meta)
                    .await;
                return Err(AuthError::InvalidCredentials.into());
            }
            Err(e) => return Err(e),
        };

        let mut failed_attempts = user.failed_login_attempts;
        match lockout::evaluate(user.locked_until, now) {
            LockoutDecision::Locked { .. } => {
                self.record_login_failure(&email, Some(user.id), FailureReason::AccountLocked, meta)
                    .await;
                return Err(AuthError::AccountLocked.into());
            }
            LockoutDecision::Proceed { reset_counter } => {
                if reset_counter {
                    failed_attempts = 0;
                    self.users
                        .update(
                            user.id,
                            UpdateUser {
                                failed_login_attempts: Some(0),
                                locked_until: Some(None),
                                ..Default::default()
                            },
                        )
                        .await?;
                }
            }
        }

        if user.is_suspended || !user.is_active {
            self.record_login_failure(
                &email,
                Some(user.id),
                FailureReason::AccountSuspended,
                meta,
            )
            .await;
            return Err(AuthError::AccountSuspended.into());
        }

        if !user.email_verified {
            self.record_login_failure(
                &email,
                Some(user.id),
                FailureReason::EmailNotVerified,
                meta,
            )
            .await;
            return Err(AuthError::EmailNotVerified.into());
        }

        let pepper = self.config.pepper.as_deref();
        let password_ok = match &user.password_hash {
            Some(hash) => {
                password::verify_password(&input.password, hash, pepper).map_err(CoreError::from)?
            }
            // Federated-only account: no password can ever match, but the
            // path must cost the same.
            None => {
                password::burn_verification(&input.password, pepper);
                false
            }
        };

        if !password_ok {
            match lockout::register_failure(failed_attempts, now, self.lockout_policy()) {
                FailureUpdate::Count {
                    failed_attempts: next,
                } => {
                    self.users
                        .update(
                            user.id,
                            UpdateUser {
                                failed_login_attempts: Some(next),
                                ..Default::default()
                            },
                        )
                        .await?;
                }
                FailureUpdate::Lock { until } => {
                    self.users
                        .update(
                            user.id,
                            UpdateUser {
                                failed_login_attempts: Some(
                                    self.config.max_failed_login_attempts,
                                ),
                                locked_until: Some(Some(until)),
                                ..Default::default()
                            },
                        )
                        .await?;
                    let mut event = CreateAuditEvent::new(
                        AuditCategory::Security,
                        "security.account_locked",
                        false,
                    );
                    event.severity = AuditSeverity::Critical;
                    event.actor_id = Some(user.id);
                    event.actor_email = Some(email.clone());
                    event.detail = json!({ "locked_until": until });
                    self.auditor.record(event, meta).await;
                }
            }
            self.record_login_failure(
                &email,
                Some(user.id),
                FailureReason::InvalidCredentials,
                meta,
            )
            .await;
            return Err(AuthError::InvalidCredentials.into());
        }

        // Successful password check resets the counters before anything
        // else happens.
        let user = self
            .users
            .update(
                user.id,
                UpdateUser {
                    failed_login_attempts: Some(0),
                    locked_until: Some(None),
                    ..Default::default()
                },
            )
            .await?;

        if user.totp_enabled && user.totp_verified {
            let challenge = token::issue_mfa_challenge(user.id, &self.config)
                .map_err(CoreError::from)?;
            let mut event =
                CreateAuditEvent::new(AuditCategory::Auth, "auth.login.mfa_challenge", true);
            event.actor_id = Some(user.id);
            event.actor_email = Some(user.email.clone());
            self.auditor.record(event, meta).await;
            return Ok(LoginOutcome::MfaRequired {
                challenge_token: challenge,
            });
        }

        let tokens = self.complete_login(&user, meta).await?;
        Ok(LoginOutcome::Success(tokens))
    }

    /// Complete a login that required a second factor.
    pub async fn complete_mfa_login(
        &self,
        challenge_token: &str,
        code: &str,
        using_backup_code: bool,
        meta: &RequestMeta,
    ) -> CoreResult<SessionTokens> {
        let claims =
            token::decode_mfa_challenge(challenge_token, &self.config).map_err(CoreError::from)?;
        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| AuthError::TokenInvalid("malformed subject".into()))?;
        let user = self.users.get_by_id(user_id).await?;

        if !(user.totp_enabled && user.totp_verified) {
            return Err(AuthError::MfaNotEnrolled.into());
        }

        let accepted = if using_backup_code {
            self.consume_backup_code(&user, code).await?
        } else {
            self.verify_live_totp(&user, code).await?
        };

        if !accepted {
            self.record_login_failure(
                &user.email,
                Some(user.id),
                FailureReason::InvalidTwoFactorCode,
                meta,
            )
            .await;
            return Err(AuthError::MfaInvalidCode.into());
        }

        let user = self.users.get_by_id(user.id).await?;
        self.complete_login(&user, meta).await
    }

    /// Authenticate via the federated provider. Creates the credential
    /// record on first login. Fail-closed: a verifier error or timeout is
    /// a failed login, never a pass.
    pub async fn login_federated<F: FederatedVerifier>(
        &self,
        credential: &str,
        verifier: &F,
        meta: &RequestMeta,
    ) -> CoreResult<SessionTokens> {
        let identity = match verifier.verify(credential).await {
            Ok(id) => id,
            Err(e) => {
                warn!(error = %e, "federated verifier failed; treating as authentication failure");
                let mut event =
                    CreateAuditEvent::new(AuditCategory::Auth, "auth.login.federated", false);
                event.error_message = Some("identity verification failed".into());
                self.auditor.record(event, meta).await;
                return Err(AuthError::InvalidCredentials.into());
            }
        };

        let email = identity.email.trim().to_lowercase();
        let now = Utc::now();

        let user = match self.users.get_by_email(&email).await {
            Ok(u) => u,
            Err(CoreError::NotFound { .. }) => {
                self.users
                    .create(CreateUser {
                        email: email.clone(),
                        password_hash: None,
                        first_name: identity.given_name.unwrap_or_default(),
                        last_name: identity.family_name.unwrap_or_default(),
                        phone: None,
                        role: Role::User,
                        provider: IdentityProvider::Google,
                        provider_subject: Some(identity.subject_id.clone()),
                        email_verified: identity.email_verified,
                        verification_pin: None,
                        verification_pin_expires_at: None,
                    })
                    .await?
            }
            Err(e) => return Err(e),
        };

        if let LockoutDecision::Locked { .. } = lockout::evaluate(user.locked_until, now) {
            self.record_login_failure(&email, Some(user.id), FailureReason::AccountLocked, meta)
                .await;
            return Err(AuthError::AccountLocked.into());
        }
        if user.is_suspended || !user.is_active {
            self.record_login_failure(
                &email,
                Some(user.id),
                FailureReason::AccountSuspended,
                meta,
            )
            .await;
            return Err(AuthError::AccountSuspended.into());
        }
        if !user.email_verified {
            self.record_login_failure(
                &email,
                Some(user.id),
                FailureReason::EmailNotVerified,
                meta,
            )
            .await;
            return Err(AuthError::EmailNotVerified.into());
        }

        self.complete_login(&user, meta).await
    }

    // -------------------------------------------------------------------
    // Refresh and logout
    // -------------------------------------------------------------------

    /// Rotate the token pair bound to a session.
    ///
    /// The stored refresh hash is replaced via compare-and-swap, so of
    /// two concurrent refreshes exactly one succeeds — the loser, and any
    /// replay of a superseded token, fails as invalid.
    pub async fn refresh(
        &self,
        presented_refresh_token: &str,
        session_token: &str,
        meta: &RequestMeta,
    ) -> CoreResult<SessionTokens> {
        let claims = token::decode_refresh_token(presented_refresh_token, &self.config)
            .map_err(CoreError::from)?;
        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| AuthError::TokenInvalid("malformed subject".into()))?;
        let user = self.users.get_by_id(user_id).await?;
        let now = Utc::now();

        let presented_hash = token::hash_refresh_token(presented_refresh_token);
        let stored_ok = user.refresh_token_hash.as_deref() == Some(presented_hash.as_str())
            && user.refresh_token_expires_at.is_some_and(|t| t > now);
        if !stored_ok {
            let mut event =
                CreateAuditEvent::new(AuditCategory::Security, "security.refresh_reuse", false);
            event.severity = AuditSeverity::Warning;
            event.actor_id = Some(user.id);
            event.actor_email = Some(user.email.clone());
            self.auditor.record(event, meta).await;
            return Err(AuthError::TokenInvalid("refresh token superseded".into()).into());
        }

        // Session must be bound to the presented lineage before we rotate.
        self.sessions
            .verify(session_token, presented_refresh_token, now)
            .await?;

        let new_refresh =
            token::issue_refresh_token(user.id, &self.config).map_err(CoreError::from)?;
        let new_hash = token::hash_refresh_token(&new_refresh);
        let new_expiry = now + Duration::seconds(self.config.refresh_token_lifetime_secs as i64);

        match self
            .users
            .compare_and_swap_refresh_token(user.id, &presented_hash, &new_hash, new_expiry)
            .await
        {
            Ok(()) => {}
            Err(CoreError::Conflict { .. }) => {
                return Err(
                    AuthError::TokenInvalid("refresh token superseded".into()).into(),
                );
            }
            Err(e) => return Err(e),
        }

        self.sessions.rebind_refresh(session_token, &new_hash).await?;

        let access = token::issue_access_token(
            user.id,
            &user.email,
            user.role.as_str(),
            &self.config,
        )
        .map_err(CoreError::from)?;

        let session = self.sessions.verify(session_token, &new_refresh, now).await?;

        let mut event = CreateAuditEvent::new(AuditCategory::Auth, "auth.refresh", true);
        event.actor_id = Some(user.id);
        event.actor_email = Some(user.email.clone());
        event.session_id = Some(session.id);
        self.auditor.record(event, meta).await;

        Ok(SessionTokens {
            access_token: access,
            refresh_token: new_refresh,
            session_token: session_token.to_string(),
            session_id: session.id,
            expires_in: self.config.access_token_lifetime_secs,
        })
    }

    /// Invalidate a session and the refresh lineage behind it.
    pub async fn logout(&self, session_token: &str, meta: &RequestMeta) -> CoreResult<()> {
        if let Ok(session) = self.sessions.repo().get_by_token(session_token).await {
            self.users
                .update(
                    session.user_id,
                    UpdateUser {
                        refresh_token_hash: Some(None),
                        refresh_token_expires_at: Some(None),
                        ..Default::default()
                    },
                )
                .await?;

            let mut event = CreateAuditEvent::new(AuditCategory::Auth, "auth.logout", true);
            event.actor_id = Some(session.user_id);
            event.session_id = Some(session.id);
            self.auditor.record(event, meta).await;
        }
        self.sessions.revoke(session_token).await
    }

    // -------------------------------------------------------------------
    // Password change and reset
    // -------------------------------------------------------------------

    /// Change the password of an authenticated user. Requires the
    /// current password, rejects reuse from the bounded history, and
    /// forces re-login everywhere else.
    pub async fn change_password(
        &self,
        user_id: Uuid,
        current_password: &str,
        new_password: &str,
        keep_session_token: Option<&str>,
        meta: &RequestMeta,
    ) -> CoreResult<()> {
        let user = self.users.get_by_id(user_id).await?;
        let pepper = self.config.pepper.as_deref();

        let Some(current_hash) = user.password_hash.clone() else {
            return Err(AuthError::InvalidCredentials.into());
        };
        if !password::verify_password(current_password, &current_hash, pepper)
            .map_err(CoreError::from)?
        {
            let mut event =
                CreateAuditEvent::new(AuditCategory::Security, "security.password_change", false);
            event.actor_id = Some(user.id);
            event.error_message = Some("current password mismatch".into());
            self.auditor.record(event, meta).await;
            return Err(AuthError::InvalidCredentials.into());
        }

        self.apply_new_password(&user, new_password, UpdateUser::default()).await?;
        self.sessions.revoke_all(user.id, keep_session_token).await?;

        let mut event =
            CreateAuditEvent::new(AuditCategory::Security, "security.password_change", true);
        event.actor_id = Some(user.id);
        event.actor_email = Some(user.email.clone());
        self.auditor.record(event, meta).await;
        Ok(())
    }

    /// Start a password reset. Always answers generically — the caller
    /// cannot learn whether the email exists.
    pub async fn request_password_reset<M: EmailSender>(
        &self,
        email: &str,
        mailer: &M,
        meta: &RequestMeta,
    ) -> CoreResult<()> {
        let email = email.trim().to_lowercase();
        let user = match self.users.get_by_email(&email).await {
            Ok(u) => u,
            Err(CoreError::NotFound { .. }) => return Ok(()),
            Err(e) => return Err(e),
        };

        let reset_token = token::random_token(32);
        self.users
            .update(
                user.id,
                UpdateUser {
                    password_reset_token: Some(Some(reset_token.clone())),
                    password_reset_expires_at: Some(Some(
                        Utc::now() + Duration::seconds(self.config.reset_token_ttl_secs as i64),
                    )),
                    ..Default::default()
                },
            )
            .await?;

        self.dispatch_email(
            mailer,
            Email {
                to: email.clone(),
                subject: "Password reset".into(),
                html: format!("<p>Your reset code is <b>{reset_token}</b>.</p>"),
                text: format!("Your reset code is {reset_token}."),
            },
        )
        .await;

        let mut event =
            CreateAuditEvent::new(AuditCategory::Security, "security.password_reset_request", true);
        event.actor_id = Some(user.id);
        event.actor_email = Some(email);
        self.auditor.record(event, meta).await;
        Ok(())
    }

    /// Complete a password reset with an emailed token.
    pub async fn reset_password(
        &self,
        reset_token: &str,
        new_password: &str,
        meta: &RequestMeta,
    ) -> CoreResult<()> {
        let user = match self.users.get_by_reset_token(reset_token).await {
            Ok(u) => u,
            Err(CoreError::NotFound { .. }) => {
                return Err(AuthError::ResetTokenInvalid.into());
            }
            Err(e) => return Err(e),
        };
        if !user.password_reset_expires_at.is_some_and(|t| Utc::now() <= t) {
            return Err(AuthError::ResetTokenInvalid.into());
        }

        self.apply_new_password(
            &user,
            new_password,
            UpdateUser {
                password_reset_token: Some(None),
                password_reset_expires_at: Some(None),
                ..Default::default()
            },
        )
        .await?;
        self.sessions.revoke_all(user.id, None).await?;

        let mut event =
            CreateAuditEvent::new(AuditCategory::Security, "security.password_reset", true);
        event.actor_id = Some(user.id);
        event.actor_email = Some(user.email.clone());
        self.auditor.record(event, meta).await;
        Ok(())
    }

    // -------------------------------------------------------------------
    // MFA
    // -------------------------------------------------------------------

    /// Begin TOTP enrollment. The secret is stored encrypted and is not
    /// trusted until [`Self::mfa_confirm`] proves the authenticator.
    pub async fn mfa_setup(&self, user_id: Uuid) -> CoreResult<MfaEnrollment> {
        let user = self.users.get_by_id(user_id).await?;
        let master = self.field_master()?;

        let (secret, uri) =
            totp::generate_enrollment(&self.config.totp_issuer, &user.email)
                .map_err(CoreError::from)?;
        let sealed = crate::fields::encrypt_field(master, &secret).map_err(CoreError::from)?;

        self.users
            .update(
                user.id,
                UpdateUser {
                    totp_secret: Some(Some(sealed)),
                    totp_enabled: Some(false),
                    totp_verified: Some(false),
                    totp_last_used_step: Some(None),
                    backup_codes: Some(Vec::new()),
                    ..Default::default()
                },
            )
            .await?;

        Ok(MfaEnrollment {
            secret,
            otpauth_uri: uri,
        })
    }

    /// Confirm enrollment with a live code. Enables MFA and returns the
    /// plaintext backup codes — the only time they are ever visible.
    pub async fn mfa_confirm(&self, user_id: Uuid, code: &str) -> CoreResult<Vec<String>> {
        let user = self.users.get_by_id(user_id).await?;
        if !self.verify_live_totp(&user, code).await? {
            return Err(AuthError::MfaInvalidCode.into());
        }

        let codes = totp::generate_backup_codes(self.config.backup_code_count);
        let hashes = codes.iter().map(|c| totp::hash_backup_code(c)).collect();

        self.users
            .update(
                user.id,
                UpdateUser {
                    totp_enabled: Some(true),
                    totp_verified: Some(true),
                    backup_codes: Some(hashes),
                    ..Default::default()
                },
            )
            .await?;

        Ok(codes)
    }

    /// Disable MFA. Step-up: requires re-proof of the primary password,
    /// not just a live session.
    pub async fn mfa_disable(&self, user_id: Uuid, current_password: &str) -> CoreResult<()> {
        let user = self.step_up(user_id, current_password).await?;
        self.users
            .update(
                user.id,
                UpdateUser {
                    totp_enabled: Some(false),
                    totp_verified: Some(false),
                    totp_secret: Some(None),
                    totp_last_used_step: Some(None),
                    backup_codes: Some(Vec::new()),
                    ..Default::default()
                },
            )
            .await?;
        Ok(())
    }

    /// Replace the backup-code set. Step-up like [`Self::mfa_disable`].
    pub async fn mfa_regenerate_backup_codes(
        &self,
        user_id: Uuid,
        current_password: &str,
    ) -> CoreResult<Vec<String>> {
        let user = self.step_up(user_id, current_password).await?;
        if !(user.totp_enabled && user.totp_verified) {
            return Err(AuthError::MfaNotEnrolled.into());
        }

        let codes = totp::generate_backup_codes(self.config.backup_code_count);
        let hashes = codes.iter().map(|c| totp::hash_backup_code(c)).collect();
        self.users
            .update(
                user.id,
                UpdateUser {
                    backup_codes: Some(hashes),
                    ..Default::default()
                },
            )
            .await?;
        Ok(codes)
    }

    // -------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------

    fn field_master(&self) -> CoreResult<&str> {
        self.config
            .field_encryption_secret
            .as_deref()
            .ok_or_else(|| AuthError::Encryption("master secret is not set".into()).into())
    }

    async fn check_captcha<C: CaptchaVerifier>(
        &self,
        captcha: &C,
        captcha_token: &str,
        meta: &RequestMeta,
    ) -> CoreResult<()> {
        // Fail closed: verifier errors and timeouts are failures.
        let passed = matches!(captcha.verify(captcha_token).await, Ok(o) if o.success);
        if !passed {
            let mut event =
                CreateAuditEvent::new(AuditCategory::Security, "security.captcha_failed", false);
            event.severity = AuditSeverity::Warning;
            self.auditor.record(event, meta).await;
            return Err(CoreError::Validation {
                message: "captcha verification failed".into(),
            });
        }
        Ok(())
    }

    async fn dispatch_email<M: EmailSender>(&self, mailer: &M, email: Email) {
        // Delivery is off the critical path; failure is logged, never
        // surfaced.
        match mailer.send(email).await {
            Ok(true) => {}
            Ok(false) => warn!("email dispatch rejected"),
            Err(e) => warn!(error = %e, "email dispatch failed"),
        }
    }

    async fn record_login_failure(
        &self,
        email: &str,
        user_id: Option<Uuid>,
        reason: FailureReason,
        meta: &RequestMeta,
    ) {
        self.auditor
            .record_attempt(CreateLoginAttempt {
                email: email.to_string(),
                ip_address: meta.ip_address.clone(),
                user_agent: meta.user_agent.clone(),
                success: false,
                failure_reason: Some(reason),
                user_id,
            })
            .await;

        let mut event = CreateAuditEvent::new(AuditCategory::Auth, "auth.login", false);
        event.actor_id = user_id;
        event.actor_email = Some(email.to_string());
        event.error_message = Some(reason.as_str().to_string());
        self.auditor.record(event, meta).await;
    }

    /// Issue the token triple and session for a fully authenticated
    /// user, and record the successful attempt.
    async fn complete_login(&self, user: &User, meta: &RequestMeta) -> CoreResult<SessionTokens> {
        let tokens = self.issue_session(user, meta).await?;

        self.auditor
            .record_attempt(CreateLoginAttempt {
                email: user.email.clone(),
                ip_address: meta.ip_address.clone(),
                user_agent: meta.user_agent.clone(),
                success: true,
                failure_reason: None,
                user_id: Some(user.id),
            })
            .await;

        let mut event = CreateAuditEvent::new(AuditCategory::Auth, "auth.login", true);
        event.actor_id = Some(user.id);
        event.actor_email = Some(user.email.clone());
        event.session_id = Some(tokens.session_id);
        self.auditor.record(event, meta).await;

        Ok(tokens)
    }

    async fn issue_session(&self, user: &User, meta: &RequestMeta) -> CoreResult<SessionTokens> {
        let now = Utc::now();
        let refresh =
            token::issue_refresh_token(user.id, &self.config).map_err(CoreError::from)?;
        let refresh_hash = token::hash_refresh_token(&refresh);

        self.users
            .update(
                user.id,
                UpdateUser {
                    refresh_token_hash: Some(Some(refresh_hash.clone())),
                    refresh_token_expires_at: Some(Some(
                        now + Duration::seconds(self.config.refresh_token_lifetime_secs as i64),
                    )),
                    last_login_at: Some(Some(now)),
                    ..Default::default()
                },
            )
            .await?;

        let session = self
            .sessions
            .create(
                user.id,
                refresh_hash,
                meta.ip_address.clone(),
                meta.user_agent.clone(),
            )
            .await?;

        let access = token::issue_access_token(
            user.id,
            &user.email,
            user.role.as_str(),
            &self.config,
        )
        .map_err(CoreError::from)?;

        Ok(SessionTokens {
            access_token: access,
            refresh_token: refresh,
            session_token: session.session_token,
            session_id: session.id,
            expires_in: self.config.access_token_lifetime_secs,
        })
    }

    async fn step_up(&self, user_id: Uuid, current_password: &str) -> CoreResult<User> {
        let user = self.users.get_by_id(user_id).await?;
        let pepper = self.config.pepper.as_deref();
        let ok = match &user.password_hash {
            Some(hash) => password::verify_password(current_password, hash, pepper)
                .map_err(CoreError::from)?,
            None => false,
        };
        if !ok {
            return Err(AuthError::InvalidCredentials.into());
        }
        Ok(user)
    }

    async fn verify_live_totp(&self, user: &User, code: &str) -> CoreResult<bool> {
        let Some(sealed) = &user.totp_secret else {
            return Err(AuthError::MfaNotEnrolled.into());
        };
        let master = self.field_master()?;
        let secret = crate::fields::decrypt_field(master, sealed).map_err(CoreError::from)?;

        let step = totp::current_step();
        // Replay defence: an exact repeat inside the accepted window is
        // rejected even though the time check would pass.
        if user.totp_last_used_step == Some(step) {
            return Ok(false);
        }

        let ok = totp::verify_code(&secret, code, &self.config.totp_issuer, &user.email)
            .map_err(CoreError::from)?;
        if ok {
            self.users
                .update(
                    user.id,
                    UpdateUser {
                        totp_last_used_step: Some(Some(step)),
                        ..Default::default()
                    },
                )
                .await?;
        }
        Ok(ok)
    }

    async fn consume_backup_code(&self, user: &User, code: &str) -> CoreResult<bool> {
        match totp::find_backup_code(code, &user.backup_codes) {
            Some(index) => {
                let mut remaining = user.backup_codes.clone();
                remaining.remove(index);
                self.users
                    .update(
                        user.id,
                        UpdateUser {
                            backup_codes: Some(remaining),
                            ..Default::default()
                        },
                    )
                    .await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Apply a vetted new password: strength + reuse checks, history
    /// ring update, expiry bookkeeping, and refresh-lineage invalidation.
    async fn apply_new_password(
        &self,
        user: &User,
        new_password: &str,
        mut update: UpdateUser,
    ) -> CoreResult<()> {
        password::validate_strength(new_password, self.config.min_password_length)
            .map_err(CoreError::from)?;

        let pepper = self.config.pepper.as_deref();
        let mut previous: Vec<&String> = user.password_hash.iter().collect();
        previous.extend(user.password_history.iter());
        for old_hash in previous {
            if password::verify_password(new_password, old_hash, pepper)
                .map_err(CoreError::from)?
            {
                return Err(AuthError::PasswordReuse.into());
            }
        }

        let new_hash = password::hash_password(new_password, pepper).map_err(CoreError::from)?;
        let now = Utc::now();

        let mut history = user.password_history.clone();
        if let Some(old) = &user.password_hash {
            history.insert(0, old.clone());
            history.truncate(PASSWORD_HISTORY_CAP);
        }

        update.password_hash = Some(Some(new_hash));
        update.password_history = Some(history);
        update.password_changed_at = Some(Some(now));
        update.password_expires_at = Some(Some(
            now + Duration::days(self.config.password_max_age_days),
        ));
        update.refresh_token_hash = Some(None);
        update.refresh_token_expires_at = Some(None);

        self.users.update(user.id, update).await?;
        Ok(())
    }
}

/// Expiry helpers exposed for maintenance jobs.
impl<U, S, A, L, B> AuthService<U, S, A, L, B>
where
    U: UserRepository,
    S: SessionRepository,
    A: AuditEventRepository,
    L: LoginAttemptRepository,
    B: BlocklistStore,
{
    /// Garbage-collect sessions past absolute expiry.
    pub async fn prune_expired_sessions(&self, now: DateTime<Utc>) -> CoreResult<u64> {
        self.sessions.repo().delete_expired(now).await
    }

    /// Drop login-attempt records past their retention window.
    pub async fn prune_login_attempts(&self, cutoff: DateTime<Utc>) -> CoreResult<u64> {
        self.auditor.attempts().delete_older_than(cutoff).await
    }
}
