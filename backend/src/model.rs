use serde::{Deserialize, Serialize};

// 1. QUESTIONNAIRE: tri-state answers ("Yes" / "No" / not answered)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Answer {
    Yes,
    No,
    #[default]
    Unknown,
}

impl From<String> for Answer {
    fn from(raw: String) -> Self {
        match raw.trim() {
            "Yes" => Answer::Yes,
            "No" => Answer::No,
            _ => Answer::Unknown,
        }
    }
}

impl From<Answer> for String {
    fn from(answer: Answer) -> Self {
        match answer {
            Answer::Yes => "Yes".to_string(),
            Answer::No => "No".to_string(),
            Answer::Unknown => String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Questionnaire {
    pub age: String,
    pub has_health_issues: Answer,
    pub takes_meds: Answer,
}

// 2. STORAGE: User record, in the field layout of the browser widget
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserRecord {
    #[serde(rename = "userid")]
    pub user_id: String,
    /// Compared verbatim on login.
    #[serde(rename = "password")]
    pub secret: String,
    pub name: String,
    pub age_range: String,
    pub age_num: String,
    pub phone: String,
    pub email: String,
    pub caretaker: String,
    pub questionnaire: Questionnaire,
    /// `None` when the record never carried a condition list, as with the
    /// placeholder user written by an anonymous questionnaire.
    #[serde(rename = "diseases", skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Vec<String>>,
    /// Milliseconds since the epoch.
    pub created: i64,
}

// 3. OUTPUT: what the API shows of a user (never the secret)
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub user_id: String,
    pub name: String,
    pub age_range: String,
    pub age_num: String,
    pub phone: String,
    pub email: String,
    pub caretaker: String,
    pub questionnaire: Questionnaire,
    pub conditions: Vec<String>,
    pub created: i64,
}

impl From<&UserRecord> for PublicUser {
    fn from(user: &UserRecord) -> Self {
        PublicUser {
            user_id: user.user_id.clone(),
            name: user.name.clone(),
            age_range: user.age_range.clone(),
            age_num: user.age_num.clone(),
            phone: user.phone.clone(),
            email: user.email.clone(),
            caretaker: user.caretaker.clone(),
            questionnaire: user.questionnaire.clone(),
            conditions: user.conditions.clone().unwrap_or_default(),
            created: user.created,
        }
    }
}

// 4. INPUT: Auth forms
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegisterForm {
    #[serde(alias = "userid")]
    pub user_id: String,
    #[serde(alias = "password")]
    pub secret: String,
    pub name: String,
    pub age_range: String,
    pub age_num: String,
    pub phone: String,
    pub email: String,
    pub caretaker: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoginForm {
    #[serde(alias = "userid")]
    pub user_id: String,
    #[serde(alias = "password")]
    pub secret: String,
}

// 5. INPUT / STORAGE: Vitals
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VitalsInput {
    pub name: String,
    pub systolic: String,
    pub diastolic: String,
    pub sugar: String,
    pub pulse: String,
    pub weight: String,
}

/// One ledger line. Immutable once appended.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VitalsEntry {
    pub name: String,
    /// `"systolic/diastolic"`
    pub bp: String,
    pub sugar: String,
    pub pulse: String,
    pub weight: String,
    /// Milliseconds since the epoch at save time.
    pub ts: i64,
}

// 6. PREFERENCES
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Dark,
    #[default]
    Light,
}

impl Theme {
    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Dark => "dark",
            Theme::Light => "light",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    pub theme: Theme,
    pub voice_enabled: bool,
}

// 7. CHAT: frames from the browser
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatCommand {
    Message {
        text: String,
    },
    VoiceStart,
    VoiceEnd {
        session: u64,
        #[serde(default)]
        transcript: Option<String>,
        #[serde(default)]
        error: Option<String>,
        #[serde(default = "platform_supported")]
        supported: bool,
    },
}

fn platform_supported() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Bot,
}

// 8. CHAT: events pushed to the browser
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    Bubble { id: u64, who: Speaker, html: String },
    Remove { id: u64 },
    Speak { text: String, lang: String, urgent: bool },
    Listening { session: u64 },
    Notice { message: String },
}
