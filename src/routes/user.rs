use actix_web::{get, post, web, HttpMessage, HttpRequest, HttpResponse};
use mongodb::bson::{doc, to_bson};
use regex::Regex;

use crate::error::AppError;
use crate::models::user::{User, UserAuthentication, UserCredential, UserRequest};

#[post("/users")]
pub async fn create_user(payload: web::Json<UserRequest>) -> Result<HttpResponse, AppError> {
    let payload: UserRequest = payload.into_inner();
    let email_regex: Regex = Regex::new(
        r"^([a-z0-9_+]([a-z0-9_+.]*[a-z0-9_+])?)@([a-z0-9]+([\-\.]{1}[a-z0-9]+)*\.[a-z]{2,6})",
    )
    .unwrap();

    if payload.password.len() < 8 {
        return Err(AppError::Validation("USER_MUST_HAVE_VALID_PASSWORD"));
    }
    if !email_regex.is_match(&payload.email) {
        return Err(AppError::Validation("USER_MUST_HAVE_VALID_EMAIL"));
    }

    if User::find_by_email(&payload.email).await?.is_some() {
        return Err(AppError::Conflict("USER_ALREADY_EXIST"));
    }
    if User::find_by_emp_code(payload.emp_code).await?.is_some() {
        return Err(AppError::Conflict("EMP_CODE_ALREADY_TAKEN"));
    }

    let mut user: User = User {
        _id: None,
        emp_code: payload.emp_code,
        name: payload.name,
        email: payload.email,
        password: payload.password,
    };

    let _id = user.save().await?;
    Ok(HttpResponse::Created().body(_id.to_string()))
}

#[post("/users/login")]
pub async fn login(payload: web::Json<UserCredential>) -> Result<HttpResponse, AppError> {
    let payload: UserCredential = payload.into_inner();

    let (token, user) = payload.authenticate().await?;
    Ok(HttpResponse::Ok().json(doc! {
        "token": to_bson::<String>(&token).unwrap(),
        "user": to_bson(&user).unwrap(),
    }))
}

#[get("/users/{user_id}")]
pub async fn get_user(
    user_id: web::Path<String>,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    if req.extensions().get::<UserAuthentication>().is_none() {
        return Err(AppError::Unauthenticated("UNAUTHORIZED"));
    }

    let user_id = user_id
        .parse()
        .map_err(|_| AppError::Validation("INVALID_ID"))?;
    match User::find_by_id(&user_id).await? {
        Some(user) => Ok(HttpResponse::Ok().json(user.response())),
        None => Err(AppError::NotFound("USER_NOT_FOUND")),
    }
}
