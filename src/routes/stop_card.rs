use actix_web::{get, post, web, HttpMessage, HttpRequest, HttpResponse};
use serde::Deserialize;

use crate::error::AppError;
use crate::models::{
    reference::ReferenceCache,
    stop_card::{StopCard, StopCardQuery, StopCardRequest},
    user::UserAuthentication,
};

#[derive(Debug, Deserialize)]
pub struct StopCardQueryParams {
    pub emp_code: Option<i32>,
    pub month: Option<u32>,
    pub year: Option<i32>,
    pub limit: Option<usize>,
}

fn issuer(req: &HttpRequest) -> Result<UserAuthentication, AppError> {
    req.extensions()
        .get::<UserAuthentication>()
        .cloned()
        .ok_or(AppError::Unauthenticated("UNAUTHORIZED"))
}

#[post("/stop-cards")]
pub async fn create_stop_card(
    payload: web::Json<StopCardRequest>,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let issuer = issuer(&req)?;
    let payload = payload.into_inner();

    if payload.location.trim().is_empty() || payload.description.trim().is_empty() {
        return Err(AppError::Validation("STOP_CARD_CONTENT_REQUIRED"));
    }

    let mut card = StopCard::new(issuer.emp_code, payload);
    let _id = card.save().await?;
    Ok(HttpResponse::Created().body(_id.to_string()))
}

/// Reporters see their own cards; browsing another reporter's cards is an
/// officer capability.
#[get("/stop-cards")]
pub async fn get_stop_cards(
    query: web::Query<StopCardQueryParams>,
    cache: web::Data<ReferenceCache>,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let issuer = issuer(&req)?;

    let emp_code = query.emp_code.unwrap_or(issuer.emp_code);
    if emp_code != issuer.emp_code {
        let snapshot = cache.snapshot().await?;
        if !snapshot.resolve(issuer.emp_code, &issuer.name).officer {
            return Err(AppError::Forbidden("OFFICER_ROLE_REQUIRED"));
        }
    }

    let cards = StopCard::find_many(&StopCardQuery {
        emp_code: Some(emp_code),
        month: query.month,
        year: query.year,
        limit: query.limit,
    })
    .await?;
    Ok(HttpResponse::Ok().json(cards))
}
