//! Keyword triage: an ordered rule list, first match wins.

use serde::Serialize;

const PERSONALISED_CONDITION_LIMIT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriageKind {
    Emergency,
    Fever,
    Dizziness,
    Personalised,
    Fallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TriageReply {
    pub kind: TriageKind,
    pub html: String,
    /// Short paraphrase for speech playback.
    pub speech: String,
    pub urgent: bool,
}

/// Matches when the lower-cased message contains any keyword.
pub struct TriageRule {
    pub kind: TriageKind,
    pub keywords: &'static [&'static str],
    pub html: &'static str,
    pub speech: &'static str,
    pub urgent: bool,
}

impl TriageRule {
    pub fn matches(&self, lowered: &str) -> bool {
        self.keywords.iter().any(|k| lowered.contains(k))
    }

    fn reply(&self) -> TriageReply {
        TriageReply {
            kind: self.kind,
            html: self.html.to_string(),
            speech: self.speech.to_string(),
            urgent: self.urgent,
        }
    }
}

pub const DEFAULT_RULES: &[TriageRule] = &[
    TriageRule {
        kind: TriageKind::Emergency,
        keywords: &["chest", "heart"],
        html: "<strong>⚠️ EMERGENCY</strong><br/>This might be serious. Call ambulance now or press the emergency button.",
        speech: "This sounds like an emergency. Please call ambulance now.",
        urgent: true,
    },
    TriageRule {
        kind: TriageKind::Fever,
        keywords: &["fever", "temperature"],
        html: "For fever — hydrate, rest and check temperature. If >39°C or confused, seek medical care.",
        speech: "For fever, hydrate and rest. Seek care if temperature is high.",
        urgent: false,
    },
    TriageRule {
        kind: TriageKind::Dizziness,
        keywords: &["dizzy", "faint"],
        html: "If dizzy, sit or lie down. Check your BP & sugar. If you lose consciousness call emergency.",
        speech: "Sit or lie down and check vitals.",
        urgent: false,
    },
];

pub struct TriageEngine {
    rules: &'static [TriageRule],
}

impl Default for TriageEngine {
    fn default() -> Self {
        Self::new(DEFAULT_RULES)
    }
}

impl TriageEngine {
    pub fn new(rules: &'static [TriageRule]) -> Self {
        Self { rules }
    }

    /// `conditions` are the active user's recorded conditions and only
    /// matter when no keyword rule fires.
    pub fn respond(&self, message: &str, conditions: &[String]) -> TriageReply {
        let lowered = message.to_lowercase();
        if let Some(rule) = self.rules.iter().find(|r| r.matches(&lowered)) {
            return rule.reply();
        }

        if conditions.is_empty() {
            return TriageReply {
                kind: TriageKind::Fallback,
                html: "I didn't catch that. Try 'fever', 'cough', 'chest pain' or tell me your symptom in one word."
                    .to_string(),
                speech: "Could you tell me the symptom in one word?".to_string(),
                urgent: false,
            };
        }

        let named: Vec<&str> = conditions
            .iter()
            .take(PERSONALISED_CONDITION_LIMIT)
            .map(String::as_str)
            .collect();
        TriageReply {
            kind: TriageKind::Personalised,
            html: format!(
                "Based on your conditions ({}) — monitor vitals and contact caregiver if symptoms worsen.",
                named.join(", ")
            ),
            speech: "Based on your conditions, monitor your vitals.".to_string(),
            urgent: false,
        }
    }
}
