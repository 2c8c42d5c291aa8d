use crate::database::{get_db, guarded};
use crate::error::AppError;
use futures::StreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId},
    Collection, Database,
};
use serde::{Deserialize, Serialize};

/// Reference data describing a department and the people who act on its
/// behalf in the report workflow. Read-only from the workflow's perspective.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Department {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,
    pub dept_code: String,
    pub dept_name: String,
    pub chief_code: i32,
    pub chief_name: String,
    #[serde(default)]
    pub supervisors: Vec<DepartmentSupervisor>,
}
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct DepartmentSupervisor {
    pub emp_code: i32,
    pub name: String,
}
#[derive(Debug, Deserialize, Serialize)]
pub struct DepartmentRequest {
    pub dept_code: String,
    pub dept_name: String,
    pub chief_code: i32,
    pub chief_name: String,
    pub supervisors: Option<Vec<DepartmentSupervisor>>,
}

impl Department {
    pub async fn save(&mut self) -> Result<ObjectId, AppError> {
        let db: Database = get_db();
        let collection: Collection<Department> = db.collection::<Department>("departments");

        if Self::find_by_code(&self.dept_code).await?.is_some() {
            return Err(AppError::Conflict("DEPARTMENT_ALREADY_EXIST"));
        }

        self._id = Some(ObjectId::new());

        guarded(collection.insert_one(&*self, None), "INSERTING_FAILED")
            .await
            .map(|result| result.inserted_id.as_object_id().unwrap())
    }
    pub async fn find_many() -> Result<Vec<Department>, AppError> {
        let db: Database = get_db();
        let collection: Collection<Department> = db.collection::<Department>("departments");

        guarded(
            async move {
                let mut cursor = collection.find(doc! {}, None).await?;
                let mut departments: Vec<Department> = Vec::new();
                while let Some(department) = cursor.next().await {
                    departments.push(department?);
                }
                Ok(departments)
            },
            "DEPARTMENT_LOOKUP_FAILED",
        )
        .await
    }
    pub async fn find_by_code(dept_code: &str) -> Result<Option<Department>, AppError> {
        let db: Database = get_db();
        let collection: Collection<Department> = db.collection::<Department>("departments");

        guarded(
            collection.find_one(doc! { "dept_code": dept_code }, None),
            "DEPARTMENT_LOOKUP_FAILED",
        )
        .await
    }
    pub async fn find_by_chief(chief_code: i32) -> Result<Option<Department>, AppError> {
        let db: Database = get_db();
        let collection: Collection<Department> = db.collection::<Department>("departments");

        guarded(
            collection.find_one(doc! { "chief_code": chief_code }, None),
            "DEPARTMENT_LOOKUP_FAILED",
        )
        .await
    }
}
