use super::fields;
use super::status::ApprovalStatus;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An account as listed by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceEntity {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Account creation time in epoch milliseconds, when the provider knows it
    #[serde(default, rename = "createdAt", skip_serializing_if = "Option::is_none")]
    pub created_at_ms: Option<i64>,
}

impl SourceEntity {
    pub fn new(id: impl Into<String>, email: impl Into<String>, created_at_ms: i64) -> Self {
        Self {
            id: id.into(),
            email: Some(email.into()),
            created_at_ms: Some(created_at_ms),
        }
    }
}

/// Approval record stored at `<collection>/<id>`.
///
/// Fields written by other parts of the system are kept in `extra` so a
/// decoded record carries everything that was stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetRecord {
    #[serde(skip)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub status: ApprovalStatus,
    #[serde(default)]
    pub is_approved: bool,
    #[serde(default, rename = "createdAt", skip_serializing_if = "Option::is_none")]
    pub created_at_ms: Option<i64>,
    #[serde(default, rename = "approvedAt", skip_serializing_if = "Option::is_none")]
    pub approved_at_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TargetRecord {
    /// Record created for an account that had none.
    /// `created_at_ms` falls back to `now_ms` when the provider has no value.
    pub fn backfilled(source: &SourceEntity, attributed_by: &str, note: &str, now_ms: i64) -> Self {
        Self {
            id: source.id.clone(),
            email: source.email.clone(),
            status: ApprovalStatus::Approved,
            is_approved: true,
            created_at_ms: Some(source.created_at_ms.unwrap_or(now_ms)),
            approved_at_ms: Some(now_ms),
            approved_by: Some(attributed_by.to_string()),
            note: Some(note.to_string()),
            extra: Map::new(),
        }
    }

    /// Decode a stored node
    pub fn from_value(id: &str, value: Value) -> Result<Self, serde_json::Error> {
        let mut record: TargetRecord = serde_json::from_value(value)?;
        record.id = id.to_string();
        Ok(record)
    }

    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

/// The four fields an explicit approval writes, as `(field, value)` pairs.
/// Every other field of the record is left alone.
pub fn approval_fields(attributed_by: &str, now_ms: i64) -> [(&'static str, Value); 4] {
    [
        (fields::STATUS, Value::from(ApprovalStatus::Approved.as_str())),
        (fields::IS_APPROVED, Value::Bool(true)),
        (fields::APPROVED_AT, Value::from(now_ms)),
        (fields::APPROVED_BY, Value::from(attributed_by)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_backfilled_record_value() {
        let source = SourceEntity::new("u1", "a@x.com", 1000);
        let record = TargetRecord::backfilled(&source, "migration", "note", 5000);

        assert_eq!(
            record.to_value().unwrap(),
            json!({
                "email": "a@x.com",
                "status": "approved",
                "isApproved": true,
                "createdAt": 1000,
                "approvedAt": 5000,
                "approvedBy": "migration",
                "note": "note"
            })
        );
    }

    #[test]
    fn test_backfilled_created_at_falls_back_to_now() {
        let source = SourceEntity {
            id: "u1".to_string(),
            email: None,
            created_at_ms: None,
        };
        let record = TargetRecord::backfilled(&source, "migration", "note", 5000);
        assert_eq!(record.created_at_ms, Some(5000));
        assert!(record.to_value().unwrap().get("email").is_none());
    }

    #[test]
    fn test_from_value_keeps_unknown_fields() {
        let value = json!({
            "email": "a@x.com",
            "status": "pending",
            "lastLoginIP": "10.0.0.1"
        });
        let record = TargetRecord::from_value("u1", value.clone()).unwrap();

        assert_eq!(record.id, "u1");
        assert_eq!(record.status, ApprovalStatus::Pending);
        assert!(!record.is_approved);
        assert_eq!(record.extra["lastLoginIP"], "10.0.0.1");
        assert_eq!(record.to_value().unwrap()["lastLoginIP"], value["lastLoginIP"]);
    }

    #[test]
    fn test_approval_fields() {
        let fields = approval_fields("admin", 42);
        let names: Vec<&str> = fields.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, vec!["status", "isApproved", "approvedAt", "approvedBy"]);
        assert_eq!(fields[2].1, json!(42));
        assert_eq!(fields[3].1, json!("admin"));
    }
}
