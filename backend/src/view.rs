use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;

use crate::model::{Answer, UserRecord, VitalsEntry};

fn or_dash(value: &str) -> &str {
    if value.is_empty() {
        "-"
    } else {
        value
    }
}

/// When an entry was taken. A zero or unrepresentable `ts` reads as now.
pub fn entry_time(ts: i64) -> DateTime<Utc> {
    if ts == 0 {
        return Utc::now();
    }
    Utc.timestamp_millis_opt(ts).single().unwrap_or_else(Utc::now)
}

/// Newest first.
pub fn history_lines(entries: &[VitalsEntry]) -> Vec<String> {
    if entries.is_empty() {
        return vec!["No records".to_string()];
    }
    entries
        .iter()
        .rev()
        .map(|e| {
            let at = entry_time(e.ts);
            format!(
                "{} | {} | BP: {} | Sugar:{} | Pulse:{} | Wt:{}",
                at.format("%Y-%m-%d %H:%M:%S"),
                e.name,
                e.bp,
                or_dash(&e.sugar),
                or_dash(&e.pulse),
                or_dash(&e.weight)
            )
        })
        .collect()
}

pub fn last_vitals(entries: &[VitalsEntry]) -> String {
    match entries.last() {
        None => "No vitals yet".to_string(),
        Some(e) => format!(
            "BP: {} • Sugar: {} • Pulse: {} • Weight: {}",
            e.bp,
            or_dash(&e.sugar),
            or_dash(&e.pulse),
            or_dash(&e.weight)
        ),
    }
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProfileCard {
    pub greeting: String,
    pub name: String,
    pub age: String,
    pub phone: String,
    pub email: String,
    pub caretaker: String,
    pub health_issues: String,
    pub takes_meds: String,
    pub conditions: String,
}

fn answer_text(primary: Answer, secondary: Answer) -> String {
    match (primary, secondary) {
        (Answer::Unknown, Answer::Unknown) => "Unknown".to_string(),
        (Answer::Unknown, other) | (other, _) => String::from(other),
    }
}

impl ProfileCard {
    /// `pointer` is the stored `current_user` value, whose answers win
    /// over the session copy. `cached_conditions` is the raw
    /// `diseases_<id>` value.
    pub fn build(user: Option<&UserRecord>, pointer: Option<&UserRecord>, cached_conditions: Option<&str>) -> Self {
        let fallback = UserRecord::default();
        let u = user.or(pointer).unwrap_or(&fallback);
        let p = pointer.unwrap_or(&fallback);

        let age = if !u.age_num.is_empty() {
            u.age_num.clone()
        } else {
            or_dash(&u.age_range).to_string()
        };
        let conditions = match u.conditions.as_deref() {
            Some(list) if !list.is_empty() => list.join(", "),
            _ => cached_conditions.unwrap_or("-").to_string(),
        };

        ProfileCard {
            greeting: format!("Hi, {}!", if u.name.is_empty() { "User" } else { u.name.as_str() }),
            name: or_dash(&u.name).to_string(),
            age,
            phone: or_dash(&u.phone).to_string(),
            email: or_dash(&u.email).to_string(),
            caretaker: or_dash(&u.caretaker).to_string(),
            health_issues: answer_text(p.questionnaire.has_health_issues, u.questionnaire.has_health_issues),
            takes_meds: answer_text(p.questionnaire.takes_meds, u.questionnaire.takes_meds),
            conditions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Questionnaire;

    fn entry(bp: &str, sugar: &str, ts: i64) -> VitalsEntry {
        VitalsEntry {
            name: "Asha".into(),
            bp: bp.into(),
            sugar: sugar.into(),
            ts,
            ..VitalsEntry::default()
        }
    }

    #[test]
    fn history_is_newest_first_with_dashes() {
        let lines = history_lines(&[entry("120/80", "95", 0), entry("130/85", "", 1_700_000_060_000)]);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "2023-11-14 22:14:20 | Asha | BP: 130/85 | Sugar:- | Pulse:- | Wt:-");
        assert!(lines[1].contains("BP: 120/80 | Sugar:95"));
    }

    #[test]
    fn missing_timestamp_renders_as_now() {
        let line = &history_lines(&[entry("120/80", "", 0)])[0];
        assert!(!line.starts_with("1970"));
        assert!(line.starts_with(&Utc::now().format("%Y-%m-%d").to_string()));
    }

    #[test]
    fn empty_ledger_has_placeholders() {
        assert_eq!(history_lines(&[]), vec!["No records".to_string()]);
        assert_eq!(last_vitals(&[]), "No vitals yet");
    }

    #[test]
    fn last_vitals_summarises_latest_entry() {
        let line = last_vitals(&[entry("120/80", "95", 0), entry("130/85", "101", 1)]);
        assert_eq!(line, "BP: 130/85 • Sugar: 101 • Pulse: - • Weight: -");
    }

    #[test]
    fn profile_falls_back_field_by_field() {
        let card = ProfileCard::build(None, None, None);
        assert_eq!(card.greeting, "Hi, User!");
        assert_eq!(card.age, "-");
        assert_eq!(card.health_issues, "Unknown");
        assert_eq!(card.conditions, "-");

        let user = UserRecord {
            name: "Asha".into(),
            age_range: "60-70".into(),
            questionnaire: Questionnaire {
                has_health_issues: Answer::No,
                ..Questionnaire::default()
            },
            ..UserRecord::default()
        };
        let pointer = UserRecord {
            questionnaire: Questionnaire {
                has_health_issues: Answer::Yes,
                ..Questionnaire::default()
            },
            ..UserRecord::default()
        };
        let card = ProfileCard::build(Some(&user), Some(&pointer), Some("[\"Asthma\"]"));
        assert_eq!(card.greeting, "Hi, Asha!");
        assert_eq!(card.age, "60-70");
        assert_eq!(card.health_issues, "Yes");
        assert_eq!(card.takes_meds, "Unknown");
        assert_eq!(card.conditions, "[\"Asthma\"]");
    }
}
