use crate::database::{get_db, guarded};
use crate::error::AppError;
use crate::models::department::Department;
use crate::models::workflow::ActorProfile;
use futures::StreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId},
    Collection, Database,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SafetyOfficer {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,
    pub emp_code: i32,
    pub name: String,
}
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Supervisor {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,
    pub emp_code: i32,
    pub name: String,
}
#[derive(Debug, Deserialize, Serialize)]
pub struct ReferencePersonRequest {
    pub emp_code: i32,
    pub name: String,
}

impl SafetyOfficer {
    pub async fn save(&mut self) -> Result<ObjectId, AppError> {
        let db: Database = get_db();
        let collection: Collection<SafetyOfficer> = db.collection::<SafetyOfficer>("safetyofficers");

        let existing = guarded(
            collection.find_one(doc! { "emp_code": self.emp_code }, None),
            "OFFICER_LOOKUP_FAILED",
        )
        .await?;
        if existing.is_some() {
            return Err(AppError::Conflict("OFFICER_ALREADY_EXIST"));
        }

        self._id = Some(ObjectId::new());

        guarded(collection.insert_one(&*self, None), "INSERTING_FAILED")
            .await
            .map(|result| result.inserted_id.as_object_id().unwrap())
    }
    pub async fn find_many() -> Result<Vec<SafetyOfficer>, AppError> {
        let db: Database = get_db();
        let collection: Collection<SafetyOfficer> = db.collection::<SafetyOfficer>("safetyofficers");

        guarded(
            async move {
                let mut cursor = collection.find(doc! {}, None).await?;
                let mut officers: Vec<SafetyOfficer> = Vec::new();
                while let Some(officer) = cursor.next().await {
                    officers.push(officer?);
                }
                Ok(officers)
            },
            "OFFICER_LOOKUP_FAILED",
        )
        .await
    }
}

impl Supervisor {
    pub async fn save(&mut self) -> Result<ObjectId, AppError> {
        let db: Database = get_db();
        let collection: Collection<Supervisor> = db.collection::<Supervisor>("supervisors");

        let existing = guarded(
            collection.find_one(doc! { "emp_code": self.emp_code }, None),
            "SUPERVISOR_LOOKUP_FAILED",
        )
        .await?;
        if existing.is_some() {
            return Err(AppError::Conflict("SUPERVISOR_ALREADY_EXIST"));
        }

        self._id = Some(ObjectId::new());

        guarded(collection.insert_one(&*self, None), "INSERTING_FAILED")
            .await
            .map(|result| result.inserted_id.as_object_id().unwrap())
    }
    pub async fn find_many() -> Result<Vec<Supervisor>, AppError> {
        let db: Database = get_db();
        let collection: Collection<Supervisor> = db.collection::<Supervisor>("supervisors");

        guarded(
            async move {
                let mut cursor = collection.find(doc! {}, None).await?;
                let mut supervisors: Vec<Supervisor> = Vec::new();
                while let Some(supervisor) = cursor.next().await {
                    supervisors.push(supervisor?);
                }
                Ok(supervisors)
            },
            "SUPERVISOR_LOOKUP_FAILED",
        )
        .await
    }
}

/// Point-in-time copy of the three reference collections role facts are
/// derived from. Never mutated after construction; consumers hold an `Arc`.
#[derive(Clone, Debug)]
pub struct ReferenceSnapshot {
    pub departments: Vec<Department>,
    pub officers: Vec<SafetyOfficer>,
    pub supervisors: Vec<Supervisor>,
    fetched_at: Instant,
}

impl ReferenceSnapshot {
    /// Derive the actor's role facts: officer membership, the department they
    /// head (if any), and supervisor membership via the reference list or any
    /// department roster.
    pub fn resolve(&self, emp_code: i32, name: &str) -> ActorProfile {
        let officer = self.officers.iter().any(|o| o.emp_code == emp_code);
        let chief_of = self
            .departments
            .iter()
            .find(|d| d.chief_code == emp_code)
            .cloned();
        let supervisor = self.supervisors.iter().any(|s| s.emp_code == emp_code)
            || self
                .departments
                .iter()
                .any(|d| d.supervisors.iter().any(|s| s.emp_code == emp_code));

        ActorProfile {
            emp_code,
            name: name.to_string(),
            officer,
            chief_of,
            supervisor,
        }
    }
    pub fn department(&self, dept_code: &str) -> Option<&Department> {
        self.departments.iter().find(|d| d.dept_code == dept_code)
    }
}

/// TTL cache over the reference collections, passed to handlers as explicit
/// shared app data. Stale snapshots are replaced on the next read; `refresh`
/// forces a refetch after admin data entry.
pub struct ReferenceCache {
    ttl: Duration,
    inner: RwLock<Option<Arc<ReferenceSnapshot>>>,
}

impl ReferenceCache {
    pub fn new(ttl: Duration) -> ReferenceCache {
        ReferenceCache {
            ttl,
            inner: RwLock::new(None),
        }
    }
    pub async fn snapshot(&self) -> Result<Arc<ReferenceSnapshot>, AppError> {
        if let Some(snapshot) = self.cached() {
            return Ok(snapshot);
        }
        self.refresh().await
    }
    pub async fn refresh(&self) -> Result<Arc<ReferenceSnapshot>, AppError> {
        let departments = Department::find_many().await?;
        let officers = SafetyOfficer::find_many().await?;
        let supervisors = Supervisor::find_many().await?;

        info!(
            departments = departments.len(),
            officers = officers.len(),
            supervisors = supervisors.len(),
            "Reference data refreshed"
        );

        let snapshot = Arc::new(ReferenceSnapshot {
            departments,
            officers,
            supervisors,
            fetched_at: Instant::now(),
        });
        if let Ok(mut guard) = self.inner.write() {
            *guard = Some(snapshot.clone());
        }
        Ok(snapshot)
    }
    fn cached(&self) -> Option<Arc<ReferenceSnapshot>> {
        let guard = self.inner.read().ok()?;
        guard
            .as_ref()
            .filter(|snapshot| snapshot.fetched_at.elapsed() < self.ttl)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::department::DepartmentSupervisor;

    fn snapshot() -> ReferenceSnapshot {
        ReferenceSnapshot {
            departments: vec![Department {
                _id: None,
                dept_code: "MAINT".to_string(),
                dept_name: "Maintenance".to_string(),
                chief_code: 501,
                chief_name: "Asha Verma".to_string(),
                supervisors: vec![DepartmentSupervisor {
                    emp_code: 777,
                    name: "Joko Susilo".to_string(),
                }],
            }],
            officers: vec![SafetyOfficer {
                _id: None,
                emp_code: 101,
                name: "Dewi Lestari".to_string(),
            }],
            supervisors: vec![Supervisor {
                _id: None,
                emp_code: 888,
                name: "Made Wira".to_string(),
            }],
            fetched_at: Instant::now(),
        }
    }

    #[test]
    fn resolves_officer_membership() {
        let actor = snapshot().resolve(101, "Dewi Lestari");
        assert!(actor.officer);
        assert!(actor.chief_of.is_none());
        assert!(!actor.supervisor);
    }

    #[test]
    fn resolves_chief_by_department_head() {
        let actor = snapshot().resolve(501, "Asha Verma");
        assert!(!actor.officer);
        assert_eq!(
            actor.chief_of.as_ref().map(|d| d.dept_code.as_str()),
            Some("MAINT")
        );
    }

    #[test]
    fn resolves_supervisor_from_reference_list() {
        let actor = snapshot().resolve(888, "Made Wira");
        assert!(actor.supervisor);
    }

    #[test]
    fn resolves_supervisor_from_department_roster() {
        let actor = snapshot().resolve(777, "Joko Susilo");
        assert!(actor.supervisor);
    }

    #[test]
    fn unknown_actor_has_no_roles() {
        let actor = snapshot().resolve(999, "Nobody");
        assert!(!actor.officer);
        assert!(actor.chief_of.is_none());
        assert!(!actor.supervisor);
    }

    #[test]
    fn department_lookup_by_code() {
        let snapshot = snapshot();
        assert!(snapshot.department("MAINT").is_some());
        assert!(snapshot.department("ELEC").is_none());
    }
}
