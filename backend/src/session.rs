use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;

use crate::error::{HealthError, Result};
use crate::intake::ConditionSelection;
use crate::model::{LoginForm, RegisterForm, UserRecord};
use crate::store::Repository;

const TOKEN_PREFIX: &str = "local-";
const ANONYMOUS_BUCKET: &str = "anon";

/// In-memory mirror of the active session.
#[derive(Debug, Default)]
pub struct SessionContext {
    pub user: Option<UserRecord>,
    pub token: Option<String>,
    /// Condition picks not yet saved.
    pub draft: ConditionSelection,
}

impl SessionContext {
    /// Picks up whatever session was persisted before a restart.
    pub async fn resume(repo: &Repository) -> Result<Self> {
        Ok(Self {
            user: repo.current_user().await?,
            token: repo.token().await?,
            draft: ConditionSelection::default(),
        })
    }
}

pub fn token_for(user_id: &str) -> String {
    format!("{}{}", TOKEN_PREFIX, STANDARD.encode(user_id))
}

/// Registers, authenticates and tracks the current session.
pub struct IdentityManager<'a> {
    repo: &'a Repository,
    ctx: &'a mut SessionContext,
}

impl<'a> IdentityManager<'a> {
    pub fn new(repo: &'a Repository, ctx: &'a mut SessionContext) -> Self {
        Self { repo, ctx }
    }

    pub async fn register(&mut self, form: RegisterForm) -> Result<UserRecord> {
        let user_id = form.user_id.trim().to_string();
        let name = form.name.trim().to_string();
        if user_id.is_empty() || form.secret.is_empty() || name.is_empty() {
            return Err(HealthError::validation("Name, userid and password required"));
        }

        let mut users = self.repo.users().await?;
        if users.iter().any(|u| u.user_id == user_id) {
            return Err(HealthError::DuplicateUser(user_id));
        }

        let user = UserRecord {
            user_id,
            secret: form.secret,
            name,
            age_range: form.age_range,
            age_num: form.age_num,
            phone: form.phone.trim().to_string(),
            email: form.email.trim().to_string(),
            caretaker: form.caretaker.trim().to_string(),
            conditions: Some(Vec::new()),
            created: Utc::now().timestamp_millis(),
            ..UserRecord::default()
        };
        users.push(user.clone());
        self.repo.save_users(&users).await?;
        self.start_session(&user).await?;

        log::info!("🆕 Registered user {}", user.user_id);
        Ok(user)
    }

    pub async fn login(&mut self, form: LoginForm) -> Result<UserRecord> {
        let user_id = form.user_id.trim();
        if user_id.is_empty() || form.secret.is_empty() {
            return Err(HealthError::validation("Enter userid and password"));
        }

        let users = self.repo.users().await?;
        let found = users
            .into_iter()
            .find(|u| u.user_id == user_id && u.secret == form.secret)
            .ok_or(HealthError::Auth)?;
        self.start_session(&found).await?;

        log::info!("🔓 Logged in user {}", found.user_id);
        Ok(found)
    }

    /// Safe to call with no active session.
    pub async fn logout(&mut self) -> Result<()> {
        self.ctx.user = None;
        self.ctx.token = None;
        self.ctx.draft = ConditionSelection::default();
        self.repo.clear_token().await?;
        self.repo.clear_current_user().await?;
        log::info!("🔒 Session cleared");
        Ok(())
    }

    /// The in-memory session if any, else the persisted pointer.
    pub async fn current_session(&mut self) -> Result<Option<UserRecord>> {
        if self.ctx.user.is_none() {
            self.ctx.user = self.repo.current_user().await?;
        }
        Ok(self.ctx.user.clone())
    }

    pub async fn derived_id(&self) -> Result<String> {
        derived_id(self.repo, self.ctx).await
    }

    async fn start_session(&mut self, user: &UserRecord) -> Result<()> {
        let token = token_for(&user.user_id);
        self.repo.set_token(&token).await?;
        self.repo.set_current_user(user).await?;
        self.ctx.user = Some(user.clone());
        self.ctx.token = Some(token);
        self.ctx.draft = ConditionSelection::default();
        Ok(())
    }
}

/// Storage key suffix for per-user tables: session token, then the
/// session user's id, then the persisted current user's id, then `anon`.
pub async fn derived_id(repo: &Repository, ctx: &SessionContext) -> Result<String> {
    if let Some(token) = ctx.token.as_deref().filter(|t| t.starts_with(TOKEN_PREFIX)) {
        return Ok(token.to_string());
    }
    if let Some(user) = ctx.user.as_ref().filter(|u| !u.user_id.is_empty()) {
        return Ok(format!("user_{}", user.user_id));
    }
    if let Some(stored) = repo.current_user().await?.filter(|u| !u.user_id.is_empty()) {
        return Ok(format!("user_{}", stored.user_id));
    }
    Ok(ANONYMOUS_BUCKET.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(user_id: &str, secret: &str, name: &str) -> RegisterForm {
        RegisterForm {
            user_id: user_id.into(),
            secret: secret.into(),
            name: name.into(),
            phone: "555-0101".into(),
            ..RegisterForm::default()
        }
    }

    fn login(user_id: &str, secret: &str) -> LoginForm {
        LoginForm {
            user_id: user_id.into(),
            secret: secret.into(),
        }
    }

    #[tokio::test]
    async fn register_then_login_returns_same_user() {
        let repo = Repository::in_memory();
        let mut ctx = SessionContext::default();
        let mut identity = IdentityManager::new(&repo, &mut ctx);

        let created = identity.register(form("asha", "s3cret", "Asha")).await.unwrap();
        identity.logout().await.unwrap();
        let back = identity.login(login("asha", "s3cret")).await.unwrap();

        assert_eq!(back.user_id, "asha");
        assert_eq!(back, created);
        assert_eq!(ctx.token.as_deref(), Some("local-YXNoYQ=="));
    }

    #[tokio::test]
    async fn duplicate_id_is_rejected_without_touching_existing_record() {
        let repo = Repository::in_memory();
        let mut ctx = SessionContext::default();
        let mut identity = IdentityManager::new(&repo, &mut ctx);

        let original = identity.register(form("asha", "one", "Asha")).await.unwrap();
        let err = identity.register(form("asha", "two", "Impostor")).await.unwrap_err();

        assert!(matches!(err, HealthError::DuplicateUser(ref id) if id == "asha"));
        assert_eq!(repo.users().await.unwrap(), vec![original]);
    }

    #[tokio::test]
    async fn wrong_secret_is_an_auth_error() {
        let repo = Repository::in_memory();
        let mut ctx = SessionContext::default();
        let mut identity = IdentityManager::new(&repo, &mut ctx);
        identity.register(form("asha", "s3cret", "Asha")).await.unwrap();

        let err = identity.login(login("asha", "S3cret")).await.unwrap_err();
        assert!(matches!(err, HealthError::Auth));
        let err = identity.login(login("nobody", "s3cret")).await.unwrap_err();
        assert!(matches!(err, HealthError::Auth));
    }

    #[tokio::test]
    async fn blank_required_fields_fail_validation() {
        let repo = Repository::in_memory();
        let mut ctx = SessionContext::default();
        let mut identity = IdentityManager::new(&repo, &mut ctx);

        for bad in [form("", "pw", "Asha"), form("asha", "", "Asha"), form("asha", "pw", "  ")] {
            let err = identity.register(bad).await.unwrap_err();
            assert!(matches!(err, HealthError::Validation(_)));
        }
        assert!(repo.users().await.unwrap().is_empty());

        let err = identity.login(login("asha", "")).await.unwrap_err();
        assert!(matches!(err, HealthError::Validation(_)));
    }

    #[tokio::test]
    async fn logout_is_idempotent_and_clears_persisted_pointer() {
        let repo = Repository::in_memory();
        let mut ctx = SessionContext::default();
        let mut identity = IdentityManager::new(&repo, &mut ctx);
        identity.register(form("asha", "pw", "Asha")).await.unwrap();

        identity.logout().await.unwrap();
        identity.logout().await.unwrap();

        assert!(identity.current_session().await.unwrap().is_none());
        assert!(repo.token().await.unwrap().is_none());
        assert!(repo.current_user().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn session_resumes_from_persisted_pointer() {
        let repo = Repository::in_memory();
        {
            let mut ctx = SessionContext::default();
            IdentityManager::new(&repo, &mut ctx)
                .register(form("asha", "pw", "Asha"))
                .await
                .unwrap();
        }

        let mut fresh = SessionContext::default();
        let resumed = IdentityManager::new(&repo, &mut fresh).current_session().await.unwrap();
        assert_eq!(resumed.map(|u| u.user_id), Some("asha".to_string()));

        let restored = SessionContext::resume(&repo).await.unwrap();
        assert_eq!(restored.token.as_deref(), Some("local-YXNoYQ=="));
    }

    #[tokio::test]
    async fn derived_id_follows_fallback_chain() {
        let repo = Repository::in_memory();
        let mut ctx = SessionContext::default();
        assert_eq!(derived_id(&repo, &ctx).await.unwrap(), "anon");

        let stored = UserRecord {
            user_id: "stored".into(),
            ..UserRecord::default()
        };
        repo.set_current_user(&stored).await.unwrap();
        assert_eq!(derived_id(&repo, &ctx).await.unwrap(), "user_stored");

        ctx.user = Some(UserRecord {
            user_id: "live".into(),
            ..UserRecord::default()
        });
        assert_eq!(derived_id(&repo, &ctx).await.unwrap(), "user_live");

        ctx.token = Some("not-a-local-token".into());
        assert_eq!(derived_id(&repo, &ctx).await.unwrap(), "user_live");

        ctx.token = Some(token_for("live"));
        assert_eq!(derived_id(&repo, &ctx).await.unwrap(), "local-bGl2ZQ==");
    }
}
