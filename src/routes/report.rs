use actix_web::{get, post, web, HttpMessage, HttpRequest, HttpResponse};
use mongodb::bson::{oid::ObjectId, DateTime};
use serde::Deserialize;
use tracing::info;

use crate::error::AppError;
use crate::models::{
    reference::ReferenceCache,
    report::{Report, ReportQuery, ReportRequest, ReportStatus},
    user::UserAuthentication,
    workflow::{self, ActorProfile, WorkflowAction},
};

#[derive(Debug, Deserialize)]
pub struct ReportQueryParams {
    pub status: Option<ReportStatus>,
    pub month: Option<u32>,
    pub year: Option<i32>,
    pub limit: Option<usize>,
}
#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    pub dept_code: String,
    pub message: String,
}
#[derive(Debug, Deserialize)]
pub struct DelegateRequest {
    pub supervisor_code: i32,
    pub message: String,
}
#[derive(Debug, Deserialize)]
pub struct CompleteRequest {
    pub message: String,
}
#[derive(Debug, Deserialize)]
pub struct AcceptRequest {
    pub message: Option<String>,
}
#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    pub message: String,
}

fn issuer(req: &HttpRequest) -> Result<UserAuthentication, AppError> {
    req.extensions()
        .get::<UserAuthentication>()
        .cloned()
        .ok_or(AppError::Unauthenticated("UNAUTHORIZED"))
}

async fn resolve_actor(
    cache: &ReferenceCache,
    issuer: &UserAuthentication,
) -> Result<ActorProfile, AppError> {
    let snapshot = cache.snapshot().await?;
    Ok(snapshot.resolve(issuer.emp_code, &issuer.name))
}

/// Fetch, plan, and persist one workflow transition. The version read here
/// guards the write: a concurrent transition surfaces as a conflict, never
/// as a silent overwrite.
async fn run_transition(
    report_id: &str,
    actor: &ActorProfile,
    action: WorkflowAction,
) -> Result<Report, AppError> {
    let _id: ObjectId = report_id
        .parse()
        .map_err(|_| AppError::Validation("INVALID_ID"))?;
    let report = Report::find_by_id(&_id)
        .await?
        .ok_or(AppError::NotFound("REPORT_NOT_FOUND"))?;

    let next = workflow::advance(&report, actor, action, DateTime::now())?;
    Report::apply_transition(&next, report.version).await?;

    info!(
        report = %_id,
        actor = actor.emp_code,
        status = ?next.status,
        "Report transitioned"
    );
    Ok(next)
}

#[post("/reports")]
pub async fn create_report(
    payload: web::Json<ReportRequest>,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let issuer = issuer(&req)?;
    let payload = payload.into_inner();

    if payload.location.trim().is_empty() || payload.description.trim().is_empty() {
        return Err(AppError::Validation("REPORT_CONTENT_REQUIRED"));
    }

    let mut report = Report::new(issuer.emp_code, payload);
    let _id = report.save().await?;
    Ok(HttpResponse::Created().body(_id.to_string()))
}

#[get("/reports/inbox")]
pub async fn get_inbox(req: HttpRequest) -> Result<HttpResponse, AppError> {
    let issuer = issuer(&req)?;
    let reports = Report::find_assigned_to(issuer.emp_code).await?;
    Ok(HttpResponse::Ok().json(reports))
}

#[get("/reports/summary")]
pub async fn get_report_summary(
    cache: web::Data<ReferenceCache>,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let issuer = issuer(&req)?;
    let actor = resolve_actor(&cache, &issuer).await?;
    if !actor.officer {
        return Err(AppError::Forbidden("OFFICER_ROLE_REQUIRED"));
    }

    let counts = Report::count_by_status().await?;
    Ok(HttpResponse::Ok().json(counts))
}

#[get("/reports")]
pub async fn get_reports(
    query: web::Query<ReportQueryParams>,
    cache: web::Data<ReferenceCache>,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let issuer = issuer(&req)?;
    let actor = resolve_actor(&cache, &issuer).await?;
    if !actor.officer {
        return Err(AppError::Forbidden("OFFICER_ROLE_REQUIRED"));
    }

    let reports = Report::find_many(&ReportQuery {
        status: query.status,
        month: query.month,
        year: query.year,
        limit: query.limit,
    })
    .await?;
    Ok(HttpResponse::Ok().json(reports))
}

#[get("/reports/{report_id}")]
pub async fn get_report(
    report_id: web::Path<String>,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    issuer(&req)?;

    let report_id: ObjectId = report_id
        .parse()
        .map_err(|_| AppError::Validation("INVALID_ID"))?;
    match Report::find_by_id(&report_id).await? {
        Some(report) => Ok(HttpResponse::Ok().json(report)),
        None => Err(AppError::NotFound("REPORT_NOT_FOUND")),
    }
}

#[post("/reports/{report_id}/assign")]
pub async fn assign_report(
    report_id: web::Path<String>,
    payload: web::Json<AssignRequest>,
    cache: web::Data<ReferenceCache>,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let issuer = issuer(&req)?;
    let payload = payload.into_inner();
    let snapshot = cache.snapshot().await?;
    let actor = snapshot.resolve(issuer.emp_code, &issuer.name);

    let department = snapshot
        .department(&payload.dept_code)
        .cloned()
        .ok_or(AppError::Validation("DEPARTMENT_NOT_FOUND"))?;

    let next = run_transition(
        &report_id,
        &actor,
        WorkflowAction::Assign {
            department,
            message: payload.message,
        },
    )
    .await?;
    Ok(HttpResponse::Ok().json(next))
}

#[post("/reports/{report_id}/reassign")]
pub async fn reassign_report(
    report_id: web::Path<String>,
    payload: web::Json<AssignRequest>,
    cache: web::Data<ReferenceCache>,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let issuer = issuer(&req)?;
    let payload = payload.into_inner();
    let snapshot = cache.snapshot().await?;
    let actor = snapshot.resolve(issuer.emp_code, &issuer.name);

    let department = snapshot
        .department(&payload.dept_code)
        .cloned()
        .ok_or(AppError::Validation("DEPARTMENT_NOT_FOUND"))?;

    let next = run_transition(
        &report_id,
        &actor,
        WorkflowAction::Reassign {
            department,
            message: payload.message,
        },
    )
    .await?;
    Ok(HttpResponse::Ok().json(next))
}

#[post("/reports/{report_id}/delegate")]
pub async fn delegate_report(
    report_id: web::Path<String>,
    payload: web::Json<DelegateRequest>,
    cache: web::Data<ReferenceCache>,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let issuer = issuer(&req)?;
    let payload = payload.into_inner();
    let actor = resolve_actor(&cache, &issuer).await?;

    let department = actor
        .chief_of
        .as_ref()
        .ok_or(AppError::Forbidden("CHIEF_ROLE_REQUIRED"))?;
    let supervisor = department
        .supervisors
        .iter()
        .find(|s| s.emp_code == payload.supervisor_code)
        .cloned()
        .ok_or(AppError::Validation("SUPERVISOR_NOT_FOUND"))?;

    let next = run_transition(
        &report_id,
        &actor,
        WorkflowAction::Delegate {
            supervisor,
            message: payload.message,
        },
    )
    .await?;
    Ok(HttpResponse::Ok().json(next))
}

#[post("/reports/{report_id}/complete")]
pub async fn complete_report(
    report_id: web::Path<String>,
    payload: web::Json<CompleteRequest>,
    cache: web::Data<ReferenceCache>,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let issuer = issuer(&req)?;
    let payload = payload.into_inner();
    let actor = resolve_actor(&cache, &issuer).await?;

    let next = run_transition(
        &report_id,
        &actor,
        WorkflowAction::MarkComplete {
            message: payload.message,
        },
    )
    .await?;
    Ok(HttpResponse::Ok().json(next))
}

#[post("/reports/{report_id}/accept")]
pub async fn accept_report(
    report_id: web::Path<String>,
    payload: web::Json<AcceptRequest>,
    cache: web::Data<ReferenceCache>,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let issuer = issuer(&req)?;
    let payload = payload.into_inner();
    let actor = resolve_actor(&cache, &issuer).await?;

    let next = run_transition(
        &report_id,
        &actor,
        WorkflowAction::Accept {
            message: payload.message,
        },
    )
    .await?;
    Ok(HttpResponse::Ok().json(next))
}

#[post("/reports/{report_id}/reject")]
pub async fn reject_report(
    report_id: web::Path<String>,
    payload: web::Json<RejectRequest>,
    cache: web::Data<ReferenceCache>,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let issuer = issuer(&req)?;
    let payload = payload.into_inner();
    let actor = resolve_actor(&cache, &issuer).await?;

    let next = run_transition(
        &report_id,
        &actor,
        WorkflowAction::Reject {
            message: payload.message,
        },
    )
    .await?;
    Ok(HttpResponse::Ok().json(next))
}
