use crate::database::{get_db, guarded};
use crate::error::AppError;
use chrono::{Datelike, TimeZone, Utc};
use futures::StreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId, to_bson, DateTime},
    Collection, Database,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Pending,
    Assigned,
    Rectifying,
    Verifying,
    Completed,
}

/// One entry of the append-only audit trail. `id` is the sender's emp_code.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ReportMessage {
    pub id: i32,
    pub message: String,
    pub timestamp: DateTime,
}

/// An audit report document. Workflow-managed fields default when absent so
/// documents written by older tooling still deserialize; `version` guards
/// every transition write against concurrent writers.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Report {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,
    pub status: ReportStatus,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub version: i64,
    pub emp_code: i32,
    pub location: String,
    pub description: String,
    pub date: DateTime,
    pub incident_type: String,
    pub corrective_action: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub assigned_department: String,
    #[serde(default)]
    pub assigned_supervisor: String,
    #[serde(default)]
    pub send_to: Vec<i32>,
    #[serde(default)]
    pub messages: Vec<ReportMessage>,
    #[serde(default)]
    pub completed_at: Option<DateTime>,
    #[serde(default)]
    pub rectified_by: String,
    #[serde(default)]
    pub chief_comment: String,
    #[serde(default)]
    pub supervisor_comment: String,
    pub created_at: DateTime,
}
#[derive(Debug, Deserialize)]
pub struct ReportRequest {
    pub location: String,
    pub description: String,
    /// Observation date as epoch milliseconds.
    pub date: i64,
    pub incident_type: String,
    pub corrective_action: String,
    pub image_url: Option<String>,
}
#[derive(Debug)]
pub struct ReportQuery {
    pub status: Option<ReportStatus>,
    pub month: Option<u32>,
    pub year: Option<i32>,
    pub limit: Option<usize>,
}
#[derive(Debug, Serialize)]
pub struct ReportStatusCount {
    pub status: ReportStatus,
    pub count: u64,
}

impl Report {
    pub fn new(emp_code: i32, payload: ReportRequest) -> Report {
        Report {
            _id: None,
            status: ReportStatus::Pending,
            completed: false,
            version: 0,
            emp_code,
            location: payload.location,
            description: payload.description,
            date: DateTime::from_millis(payload.date),
            incident_type: payload.incident_type,
            corrective_action: payload.corrective_action,
            image_url: payload.image_url,
            assigned_department: String::new(),
            assigned_supervisor: String::new(),
            send_to: Vec::new(),
            messages: Vec::new(),
            completed_at: None,
            rectified_by: String::new(),
            chief_comment: String::new(),
            supervisor_comment: String::new(),
            created_at: DateTime::now(),
        }
    }
    pub async fn save(&mut self) -> Result<ObjectId, AppError> {
        let db: Database = get_db();
        let collection: Collection<Report> = db.collection::<Report>("audit_reports");

        self._id = Some(ObjectId::new());

        guarded(collection.insert_one(&*self, None), "INSERTING_FAILED")
            .await
            .map(|result| result.inserted_id.as_object_id().unwrap())
    }
    pub async fn find_by_id(_id: &ObjectId) -> Result<Option<Report>, AppError> {
        let db: Database = get_db();
        let collection: Collection<Report> = db.collection::<Report>("audit_reports");

        guarded(
            collection.find_one(doc! { "_id": _id }, None),
            "REPORT_LOOKUP_FAILED",
        )
        .await
    }
    /// Reports whose `send_to` inbox set names the actor.
    pub async fn find_assigned_to(emp_code: i32) -> Result<Vec<Report>, AppError> {
        let db: Database = get_db();
        let collection: Collection<Report> = db.collection::<Report>("audit_reports");

        guarded(
            async move {
                let mut cursor = collection.find(doc! { "send_to": emp_code }, None).await?;
                let mut reports: Vec<Report> = Vec::new();
                while let Some(report) = cursor.next().await {
                    reports.push(report?);
                }
                Ok(reports)
            },
            "REPORT_LOOKUP_FAILED",
        )
        .await
    }
    /// Status filter is pushed to the store; the month/year filter runs here
    /// after the fetch, which is fine at these collection sizes.
    pub async fn find_many(query: &ReportQuery) -> Result<Vec<Report>, AppError> {
        let db: Database = get_db();
        let collection: Collection<Report> = db.collection::<Report>("audit_reports");

        let mut filter = doc! {};
        if let Some(status) = query.status {
            filter.insert("status", to_bson::<ReportStatus>(&status).unwrap());
        }

        let reports = guarded(
            async move {
                let mut cursor = collection.find(filter, None).await?;
                let mut reports: Vec<Report> = Vec::new();
                while let Some(report) = cursor.next().await {
                    reports.push(report?);
                }
                Ok(reports)
            },
            "REPORT_LOOKUP_FAILED",
        )
        .await?;

        Ok(reports
            .into_iter()
            .filter(|report| matches_period(report.created_at, query.month, query.year))
            .take(query.limit.unwrap_or(usize::MAX))
            .collect())
    }
    pub async fn count_by_status() -> Result<Vec<ReportStatusCount>, AppError> {
        const STATUSES: [ReportStatus; 5] = [
            ReportStatus::Pending,
            ReportStatus::Assigned,
            ReportStatus::Rectifying,
            ReportStatus::Verifying,
            ReportStatus::Completed,
        ];

        let db: Database = get_db();
        let collection: Collection<Report> = db.collection::<Report>("audit_reports");

        let mut counts: Vec<ReportStatusCount> = Vec::new();
        for status in STATUSES {
            let filter = doc! { "status": to_bson::<ReportStatus>(&status).unwrap() };
            let count = guarded(
                collection.count_documents(filter, None),
                "REPORT_COUNT_FAILED",
            )
            .await?;
            counts.push(ReportStatusCount { status, count });
        }
        Ok(counts)
    }
    /// Persist a validated transition as one whole-document replace,
    /// conditional on the version the transition was planned against. Zero
    /// matches means either a concurrent writer got there first or the
    /// document is gone; re-fetch to tell the two apart.
    pub async fn apply_transition(next: &Report, expected_version: i64) -> Result<(), AppError> {
        let _id = match next._id {
            Some(_id) => _id,
            None => return Err(AppError::NotFound("REPORT_NOT_FOUND")),
        };

        let db: Database = get_db();
        let collection: Collection<Report> = db.collection::<Report>("audit_reports");

        let result = guarded(
            collection.replace_one(doc! { "_id": _id, "version": expected_version }, next, None),
            "UPDATE_FAILED",
        )
        .await?;

        if result.matched_count == 0 {
            return match Self::find_by_id(&_id).await? {
                Some(_) => {
                    warn!(report = %_id, "Concurrent writer won the transition race");
                    Err(AppError::Conflict("REPORT_VERSION_CONFLICT"))
                }
                None => Err(AppError::NotFound("REPORT_NOT_FOUND")),
            };
        }
        Ok(())
    }
}

pub(crate) fn matches_period(at: DateTime, month: Option<u32>, year: Option<i32>) -> bool {
    if month.is_none() && year.is_none() {
        return true;
    }
    match Utc.timestamp_millis_opt(at.timestamp_millis()).single() {
        Some(at) => {
            month.map_or(true, |m| at.month() == m) && year.map_or(true, |y| at.year() == y)
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::from_document;

    // 2023-05-15T00:00:00Z
    const MAY_2023: i64 = 1_684_108_800_000;

    #[test]
    fn period_filter_matches_month_and_year() {
        let at = DateTime::from_millis(MAY_2023);
        assert!(matches_period(at, Some(5), Some(2023)));
        assert!(matches_period(at, Some(5), None));
        assert!(matches_period(at, None, Some(2023)));
        assert!(!matches_period(at, Some(6), Some(2023)));
        assert!(!matches_period(at, Some(5), Some(2024)));
    }

    #[test]
    fn period_filter_passes_everything_unfiltered() {
        assert!(matches_period(DateTime::from_millis(MAY_2023), None, None));
    }

    #[test]
    fn legacy_document_defaults_workflow_fields() {
        let report: Report = from_document(doc! {
            "status": "pending",
            "emp_code": 42,
            "location": "Dock 4",
            "description": "Hydraulic oil spill near the loading ramp",
            "date": DateTime::from_millis(MAY_2023),
            "incident_type": "near_miss",
            "corrective_action": "Cordon off and clean",
            "created_at": DateTime::from_millis(MAY_2023),
        })
        .unwrap();

        assert_eq!(report.status, ReportStatus::Pending);
        assert!(!report.completed);
        assert_eq!(report.version, 0);
        assert!(report.image_url.is_none());
        assert!(report.assigned_department.is_empty());
        assert!(report.assigned_supervisor.is_empty());
        assert!(report.send_to.is_empty());
        assert!(report.messages.is_empty());
        assert!(report.completed_at.is_none());
        assert!(report.rectified_by.is_empty());
    }

    #[test]
    fn status_round_trips_as_snake_case() {
        let bson = to_bson::<ReportStatus>(&ReportStatus::Rectifying).unwrap();
        assert_eq!(bson, mongodb::bson::Bson::String("rectifying".to_string()));
    }
}
