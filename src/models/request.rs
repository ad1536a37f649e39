use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;

/// A citizen's service request, worked by an assigned admin.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceRequest {
    #[schema(example = "8d3b6f0e-2a41-4c55-b1f7-5e9a0c7d2b34")]
    pub id: String,
    #[schema(example = "Birth certificate copy")]
    pub title: String,
    #[schema(example = "Certified copy for a passport application")]
    pub description: String,
    pub citizen_id: String,
    pub assigned_admin_id: Option<String>,
    pub status_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ServiceRequestCreate {
    #[schema(example = "Birth certificate copy")]
    pub title: Option<String>,
    #[schema(example = "Certified copy for a passport application")]
    pub description: Option<String>,
    pub citizen_id: Option<String>,
    pub assigned_admin_id: Option<String>,
    /// Defaults to `pending`.
    pub status_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ServiceRequestUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub citizen_id: Option<String>,
    /// `null` unassigns the request.
    #[serde(default, deserialize_with = "present")]
    #[schema(value_type = Option<String>)]
    pub assigned_admin_id: Option<Option<String>>,
    pub status_id: Option<i64>,
}

impl ServiceRequestUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.citizen_id.is_none()
            && self.assigned_admin_id.is_none()
            && self.status_id.is_none()
    }
}

// keeps an explicit `null` apart from an absent field
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_assignment_differs_from_absent() {
        let absent: ServiceRequestUpdate = serde_json::from_str(r#"{"title":"x"}"#).unwrap();
        assert_eq!(absent.assigned_admin_id, None);

        let cleared: ServiceRequestUpdate = serde_json::from_str(r#"{"assigned_admin_id":null}"#).unwrap();
        assert_eq!(cleared.assigned_admin_id, Some(None));
        assert!(!cleared.is_empty());

        let empty: ServiceRequestUpdate = serde_json::from_str("{}").unwrap();
        assert!(empty.is_empty());
    }
}
