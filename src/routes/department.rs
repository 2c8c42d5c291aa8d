use actix_web::{get, post, web, HttpMessage, HttpRequest, HttpResponse};

use crate::error::AppError;
use crate::models::{
    department::{Department, DepartmentRequest},
    reference::{ReferenceCache, ReferencePersonRequest, SafetyOfficer, Supervisor},
    user::UserAuthentication,
};

fn issuer(req: &HttpRequest) -> Result<UserAuthentication, AppError> {
    req.extensions()
        .get::<UserAuthentication>()
        .cloned()
        .ok_or(AppError::Unauthenticated("UNAUTHORIZED"))
}

async fn require_officer(
    cache: &ReferenceCache,
    issuer: &UserAuthentication,
) -> Result<(), AppError> {
    let snapshot = cache.snapshot().await?;
    if !snapshot.resolve(issuer.emp_code, &issuer.name).officer {
        return Err(AppError::Forbidden("OFFICER_ROLE_REQUIRED"));
    }
    Ok(())
}

#[post("/departments")]
pub async fn create_department(
    payload: web::Json<DepartmentRequest>,
    cache: web::Data<ReferenceCache>,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let issuer = issuer(&req)?;
    require_officer(&cache, &issuer).await?;

    let payload = payload.into_inner();
    if payload.dept_code.trim().is_empty() || payload.dept_name.trim().is_empty() {
        return Err(AppError::Validation("DEPARTMENT_CONTENT_REQUIRED"));
    }

    let mut department = Department {
        _id: None,
        dept_code: payload.dept_code,
        dept_name: payload.dept_name,
        chief_code: payload.chief_code,
        chief_name: payload.chief_name,
        supervisors: payload.supervisors.unwrap_or_default(),
    };
    let _id = department.save().await?;
    cache.refresh().await?;
    Ok(HttpResponse::Created().body(_id.to_string()))
}

#[get("/departments")]
pub async fn get_departments(
    cache: web::Data<ReferenceCache>,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    issuer(&req)?;
    let snapshot = cache.snapshot().await?;
    Ok(HttpResponse::Ok().json(&snapshot.departments))
}

/// The first officer may be registered by any authenticated user; afterwards
/// the list is officer-maintained. Bootstrap mirrors first-user signup.
#[post("/officers")]
pub async fn create_officer(
    payload: web::Json<ReferencePersonRequest>,
    cache: web::Data<ReferenceCache>,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let issuer = issuer(&req)?;
    let snapshot = cache.refresh().await?;
    if !snapshot.officers.is_empty()
        && !snapshot.resolve(issuer.emp_code, &issuer.name).officer
    {
        return Err(AppError::Forbidden("OFFICER_ROLE_REQUIRED"));
    }

    let mut officer = SafetyOfficer {
        _id: None,
        emp_code: payload.emp_code,
        name: payload.name.clone(),
    };
    let _id = officer.save().await?;
    cache.refresh().await?;
    Ok(HttpResponse::Created().body(_id.to_string()))
}

#[get("/officers")]
pub async fn get_officers(
    cache: web::Data<ReferenceCache>,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let issuer = issuer(&req)?;
    require_officer(&cache, &issuer).await?;
    let snapshot = cache.snapshot().await?;
    Ok(HttpResponse::Ok().json(&snapshot.officers))
}

#[post("/supervisors")]
pub async fn create_supervisor(
    payload: web::Json<ReferencePersonRequest>,
    cache: web::Data<ReferenceCache>,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let issuer = issuer(&req)?;
    require_officer(&cache, &issuer).await?;

    let mut supervisor = Supervisor {
        _id: None,
        emp_code: payload.emp_code,
        name: payload.name.clone(),
    };
    let _id = supervisor.save().await?;
    cache.refresh().await?;
    Ok(HttpResponse::Created().body(_id.to_string()))
}

#[get("/supervisors")]
pub async fn get_supervisors(
    cache: web::Data<ReferenceCache>,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let issuer = issuer(&req)?;
    require_officer(&cache, &issuer).await?;
    let snapshot = cache.snapshot().await?;
    Ok(HttpResponse::Ok().json(&snapshot.supervisors))
}

#[post("/reference/refresh")]
pub async fn refresh_reference(
    cache: web::Data<ReferenceCache>,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let issuer = issuer(&req)?;
    require_officer(&cache, &issuer).await?;
    cache.refresh().await?;
    Ok(HttpResponse::Ok().body("REFERENCE_REFRESHED"))
}
