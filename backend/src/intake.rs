use serde::Serialize;

use crate::error::{HealthError, Result};
use crate::model::{Answer, Questionnaire, UserRecord};
use crate::session::{derived_id, SessionContext};
use crate::store::Repository;

pub const CONDITION_CATALOG: [&str; 15] = [
    "Hypertension (High BP)",
    "Diabetes",
    "Alzheimer's / Dementia",
    "Arthritis",
    "Osteoporosis",
    "Heart disease",
    "Asthma",
    "COPD",
    "Kidney disease",
    "Chronic pain",
    "Stroke history",
    "Cancer history",
    "Thyroid problem",
    "Depression / Anxiety",
    "Parkinson's",
];

pub fn is_catalog_condition(label: &str) -> bool {
    CONDITION_CATALOG.contains(&label)
}

/// Which screen follows the questionnaire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NextStep {
    SelectConditions,
    Tracker,
}

/// A set of catalog labels. Always kept in catalog order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConditionSelection {
    labels: Vec<String>,
}

impl ConditionSelection {
    /// Labels outside the catalog are dropped.
    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut selection = Self::default();
        for label in labels {
            let label = label.as_ref();
            if is_catalog_condition(label) && !selection.contains(label) {
                selection.labels.push(label.to_string());
            }
        }
        selection.sort();
        selection
    }

    pub fn contains(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    /// Flips membership; returns whether `label` is now selected.
    pub fn toggle(&mut self, label: &str) -> Result<bool> {
        if !is_catalog_condition(label) {
            return Err(HealthError::validation(format!("Unknown condition: {}", label)));
        }
        if let Some(pos) = self.labels.iter().position(|l| l == label) {
            self.labels.remove(pos);
            Ok(false)
        } else {
            self.labels.push(label.to_string());
            self.sort();
            Ok(true)
        }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn into_labels(self) -> Vec<String> {
        self.labels
    }

    fn sort(&mut self) {
        self.labels
            .sort_by_key(|l| CONDITION_CATALOG.iter().position(|c| *c == l.as_str()).unwrap_or(usize::MAX));
    }
}

#[derive(Debug, Serialize)]
pub struct CatalogItem {
    pub label: &'static str,
    pub selected: bool,
}

/// Attaches questionnaire answers and condition picks to the session user.
pub struct IntakeTracker<'a> {
    repo: &'a Repository,
    ctx: &'a mut SessionContext,
}

impl<'a> IntakeTracker<'a> {
    pub fn new(repo: &'a Repository, ctx: &'a mut SessionContext) -> Self {
        Self { repo, ctx }
    }

    /// Overwrites the questionnaire wholesale.
    ///
    /// With no session the answers land on a bare placeholder user that is
    /// written to the `current_user` pointer only, never to `users`.
    pub async fn submit_questionnaire(&mut self, answers: Questionnaire) -> Result<NextStep> {
        let next = if answers.has_health_issues == Answer::Yes {
            NextStep::SelectConditions
        } else {
            NextStep::Tracker
        };
        let user = self.active_user();
        user.questionnaire = answers;
        self.persist_active_user().await?;
        Ok(next)
    }

    /// Seeds the draft from the session user's conditions, else from the
    /// per-user cache, and lists the catalog with selection flags.
    ///
    /// A user that never carried a condition list (the anonymous
    /// placeholder) falls through to the cache.
    pub async fn populate_conditions(&mut self) -> Result<Vec<CatalogItem>> {
        let saved = match self.ctx.user.as_ref().and_then(|u| u.conditions.clone()) {
            Some(conditions) => conditions,
            None => {
                let id = derived_id(self.repo, self.ctx).await?;
                self.repo.conditions_for(&id).await?.unwrap_or_default()
            }
        };
        self.ctx.draft = ConditionSelection::from_labels(saved);
        Ok(self.catalog())
    }

    pub fn toggle_condition(&mut self, label: &str) -> Result<bool> {
        self.ctx.draft.toggle(label)
    }

    pub fn catalog(&self) -> Vec<CatalogItem> {
        CONDITION_CATALOG
            .iter()
            .map(|&label| CatalogItem {
                label,
                selected: self.ctx.draft.contains(label),
            })
            .collect()
    }

    pub async fn save_draft(&mut self) -> Result<Vec<String>> {
        let selection = self.ctx.draft.clone();
        self.save_conditions(selection).await
    }

    /// Writes the selection onto the user and under `diseases_<id>`.
    /// An empty selection is valid.
    pub async fn save_conditions(&mut self, selection: ConditionSelection) -> Result<Vec<String>> {
        let labels = selection.into_labels();
        let user = self.active_user();
        user.conditions = Some(labels.clone());
        self.persist_active_user().await?;

        let id = derived_id(self.repo, self.ctx).await?;
        self.repo.save_conditions_for(&id, &labels).await?;
        log::debug!("🩺 Saved {} condition(s) under {}", labels.len(), id);
        Ok(labels)
    }

    fn active_user(&mut self) -> &mut UserRecord {
        self.ctx.user.get_or_insert_with(|| {
            log::warn!("⚠️ No session: writing intake data to a placeholder user");
            UserRecord::default()
        })
    }

    /// Updates the pointer, and the stored record when the user has one.
    async fn persist_active_user(&mut self) -> Result<()> {
        let Some(user) = self.ctx.user.as_ref() else {
            return Ok(());
        };
        self.repo.set_current_user(user).await?;
        if user.user_id.is_empty() {
            return Ok(());
        }
        let mut users = self.repo.users().await?;
        if let Some(stored) = users.iter_mut().find(|u| u.user_id == user.user_id) {
            stored.questionnaire = user.questionnaire.clone();
            stored.conditions = user.conditions.clone();
            self.repo.save_users(&users).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RegisterForm;
    use crate::session::IdentityManager;

    async fn registered(repo: &Repository) -> SessionContext {
        let mut ctx = SessionContext::default();
        IdentityManager::new(repo, &mut ctx)
            .register(RegisterForm {
                user_id: "asha".into(),
                secret: "pw".into(),
                name: "Asha".into(),
                ..RegisterForm::default()
            })
            .await
            .unwrap();
        ctx
    }

    #[test]
    fn catalog_has_fifteen_unique_entries() {
        let mut labels = CONDITION_CATALOG.to_vec();
        labels.sort();
        labels.dedup();
        assert_eq!(labels.len(), 15);
    }

    #[test]
    fn toggling_twice_restores_selection() {
        let mut selection = ConditionSelection::from_labels(["Asthma"]);
        let before = selection.clone();

        assert!(selection.toggle("Diabetes").unwrap());
        assert!(!selection.toggle("Diabetes").unwrap());
        assert_eq!(selection, before);

        assert!(!selection.toggle("Asthma").unwrap());
        assert!(selection.toggle("Asthma").unwrap());
        assert_eq!(selection, before);
    }

    #[test]
    fn unknown_labels_are_rejected_or_dropped() {
        let mut selection = ConditionSelection::default();
        assert!(matches!(selection.toggle("Gout"), Err(HealthError::Validation(_))));

        let seeded = ConditionSelection::from_labels(["COPD", "Gout", "Diabetes", "COPD"]);
        assert_eq!(seeded.labels().to_vec(), vec!["Diabetes".to_string(), "COPD".to_string()]);
    }

    #[tokio::test]
    async fn questionnaire_routes_by_health_issue_answer() {
        let repo = Repository::in_memory();
        let mut ctx = registered(&repo).await;
        let mut intake = IntakeTracker::new(&repo, &mut ctx);

        let yes = Questionnaire {
            age: "70".into(),
            has_health_issues: Answer::Yes,
            takes_meds: Answer::No,
        };
        assert_eq!(intake.submit_questionnaire(yes.clone()).await.unwrap(), NextStep::SelectConditions);

        let no = Questionnaire {
            has_health_issues: Answer::No,
            ..yes.clone()
        };
        assert_eq!(intake.submit_questionnaire(no.clone()).await.unwrap(), NextStep::Tracker);

        let stored = repo.users().await.unwrap();
        assert_eq!(stored[0].questionnaire, no);
        assert_eq!(repo.current_user().await.unwrap().unwrap().questionnaire, no);
    }

    #[tokio::test]
    async fn questionnaire_without_session_only_touches_pointer() {
        let repo = Repository::in_memory();
        let mut ctx = SessionContext::default();
        let mut intake = IntakeTracker::new(&repo, &mut ctx);

        let answers = Questionnaire {
            age: "55".into(),
            has_health_issues: Answer::No,
            takes_meds: Answer::Yes,
        };
        intake.submit_questionnaire(answers.clone()).await.unwrap();

        assert!(repo.users().await.unwrap().is_empty());
        let pointer = repo.current_user().await.unwrap().unwrap();
        assert!(pointer.user_id.is_empty());
        assert_eq!(pointer.questionnaire, answers);
    }

    #[tokio::test]
    async fn saved_conditions_land_on_user_and_cache_key() {
        let repo = Repository::in_memory();
        let mut ctx = registered(&repo).await;
        let mut intake = IntakeTracker::new(&repo, &mut ctx);

        intake.populate_conditions().await.unwrap();
        intake.toggle_condition("Asthma").unwrap();
        intake.toggle_condition("Diabetes").unwrap();
        let saved = intake.save_draft().await.unwrap();
        assert_eq!(saved, vec!["Diabetes".to_string(), "Asthma".to_string()]);

        let cached = repo.conditions_for("local-YXNoYQ==").await.unwrap();
        assert_eq!(cached, Some(saved.clone()));
        assert_eq!(repo.users().await.unwrap()[0].conditions, Some(saved));

        let catalog = IntakeTracker::new(&repo, &mut ctx).populate_conditions().await.unwrap();
        let selected: Vec<_> = catalog.iter().filter(|c| c.selected).map(|c| c.label).collect();
        assert_eq!(selected, vec!["Diabetes", "Asthma"]);
    }

    #[tokio::test]
    async fn empty_selection_is_valid() {
        let repo = Repository::in_memory();
        let mut ctx = registered(&repo).await;
        let saved = IntakeTracker::new(&repo, &mut ctx)
            .save_conditions(ConditionSelection::default())
            .await
            .unwrap();
        assert!(saved.is_empty());
        assert_eq!(repo.conditions_for("local-YXNoYQ==").await.unwrap(), Some(vec![]));
    }

    #[tokio::test]
    async fn anonymous_questionnaire_keeps_cached_conditions_selectable() {
        let repo = Repository::in_memory();
        let mut ctx = registered(&repo).await;
        IdentityManager::new(&repo, &mut ctx).logout().await.unwrap();
        repo.save_conditions_for("anon", &["Asthma".to_string()]).await.unwrap();

        let mut intake = IntakeTracker::new(&repo, &mut ctx);
        intake
            .submit_questionnaire(Questionnaire {
                has_health_issues: Answer::Yes,
                ..Questionnaire::default()
            })
            .await
            .unwrap();
        let catalog = intake.populate_conditions().await.unwrap();

        let selected: Vec<_> = catalog.iter().filter(|c| c.selected).map(|c| c.label).collect();
        assert_eq!(selected, vec!["Asthma"]);
    }

    #[tokio::test]
    async fn saved_empty_list_wins_over_cache() {
        let repo = Repository::in_memory();
        let mut ctx = registered(&repo).await;
        repo.save_conditions_for("local-YXNoYQ==", &["COPD".to_string()]).await.unwrap();

        let catalog = IntakeTracker::new(&repo, &mut ctx).populate_conditions().await.unwrap();
        assert!(catalog.iter().all(|c| !c.selected));
    }
}
