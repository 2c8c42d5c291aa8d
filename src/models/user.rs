use crate::config;
use crate::database::{get_db, guarded};
use crate::error::AppError;
use actix_service::{self, Transform};
use actix_web::{
    dev::{Service, ServiceRequest, ServiceResponse},
    Error, HttpMessage,
};
use chrono::Utc;
use futures::{
    future::{ready, LocalBoxFuture, Ready},
    FutureExt,
};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use mongodb::{
    bson::{doc, oid::ObjectId},
    Collection, Database,
};
use pwhash::bcrypt;
use serde::{Deserialize, Serialize};
use std::{rc::Rc, str::FromStr};

#[derive(Debug, Serialize, Deserialize)]
struct UserClaims {
    aud: String,
    exp: i64,
    iss: String,
    sub: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct User {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,
    pub emp_code: i32,
    pub name: String,
    pub email: String,
    pub password: String,
}
#[derive(Debug, Deserialize, Serialize)]
pub struct UserCredential {
    pub email: String,
    pub password: String,
}
#[derive(Debug, Deserialize, Serialize)]
pub struct UserRequest {
    pub emp_code: i32,
    pub name: String,
    pub email: String,
    pub password: String,
}
#[derive(Debug, Deserialize, Serialize)]
pub struct UserResponse {
    pub _id: Option<ObjectId>,
    pub emp_code: i32,
    pub name: String,
    pub email: String,
}
#[derive(Debug)]
pub struct UserAuthenticationData {
    pub _id: ObjectId,
    pub emp_code: i32,
    pub name: String,
    pub token: String,
}
pub struct UserAuthenticationMiddleware<S> {
    service: Rc<S>,
}
pub struct UserAuthenticationMiddlewareFactory;

pub type UserAuthentication = Rc<UserAuthenticationData>;

impl User {
    pub async fn save(&mut self) -> Result<ObjectId, AppError> {
        let db: Database = get_db();
        let collection: Collection<User> = db.collection::<User>("users");

        self._id = Some(ObjectId::new());

        let hash = bcrypt::hash(&self.password)
            .map_err(|_| AppError::Store("HASHING_FAILED"))?;
        self.password = hash;

        guarded(collection.insert_one(&*self, None), "INSERTING_FAILED")
            .await
            .map(|result| result.inserted_id.as_object_id().unwrap())
    }
    pub async fn find_by_id(_id: &ObjectId) -> Result<Option<User>, AppError> {
        let db: Database = get_db();
        let collection: Collection<User> = db.collection::<User>("users");

        guarded(
            collection.find_one(doc! { "_id": _id }, None),
            "USER_LOOKUP_FAILED",
        )
        .await
    }
    pub async fn find_by_email(email: &str) -> Result<Option<User>, AppError> {
        let db: Database = get_db();
        let collection: Collection<User> = db.collection::<User>("users");

        guarded(
            collection.find_one(doc! { "email": email }, None),
            "USER_LOOKUP_FAILED",
        )
        .await
    }
    pub async fn find_by_emp_code(emp_code: i32) -> Result<Option<User>, AppError> {
        let db: Database = get_db();
        let collection: Collection<User> = db.collection::<User>("users");

        guarded(
            collection.find_one(doc! { "emp_code": emp_code }, None),
            "USER_LOOKUP_FAILED",
        )
        .await
    }
    pub fn response(&self) -> UserResponse {
        UserResponse {
            _id: self._id,
            emp_code: self.emp_code,
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }
}

impl UserCredential {
    pub async fn authenticate(&self) -> Result<(String, UserResponse), AppError> {
        let user = User::find_by_email(&self.email)
            .await?
            .ok_or(AppError::Unauthenticated("INVALID_COMBINATION"))?;
        if !bcrypt::verify(self.password.clone(), &user.password) {
            return Err(AppError::Unauthenticated("INVALID_COMBINATION"));
        }

        let auth = &config::get().auth;
        let claims: UserClaims = UserClaims {
            sub: ObjectId::to_string(&user._id.unwrap()),
            exp: Utc::now().timestamp() + auth.token_lifetime,
            iss: "stopcard".to_string(),
            aud: "stopcard-client".to_string(),
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(auth.jwt_secret.as_bytes()),
        )
        .map_err(|_| AppError::Unauthenticated("GENERATING_FAILED"))?;

        Ok((token, user.response()))
    }
    pub fn verify(token: &str) -> Option<ObjectId> {
        let validation: Validation = Validation::new(Algorithm::HS256);
        let secret = config::get().auth.jwt_secret.as_bytes();
        decode::<UserClaims>(token, &DecodingKey::from_secret(secret), &validation)
            .ok()
            .and_then(|data| ObjectId::from_str(&data.claims.sub).ok())
    }
}

impl<S, B> Service<ServiceRequest> for UserAuthenticationMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    actix_service::forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let srv: Rc<S> = self.service.clone();

        async move {
            let token = req
                .headers()
                .get("Authorization")
                .and_then(|header| header.to_str().ok())
                .and_then(|header| header.strip_prefix("Bearer "))
                .map(|token| token.to_string());
            if let Some(token) = token {
                if let Some(_id) = UserCredential::verify(&token) {
                    if let Ok(Some(user)) = User::find_by_id(&_id).await {
                        let auth_data: UserAuthenticationData = UserAuthenticationData {
                            _id,
                            emp_code: user.emp_code,
                            name: user.name,
                            token,
                        };
                        req.extensions_mut()
                            .insert::<UserAuthentication>(Rc::new(auth_data));
                    }
                }
            }
            let res: ServiceResponse<B> = srv.call(req).await?;
            Ok(res)
        }
        .boxed_local()
    }
}
impl<S, B> Transform<S, ServiceRequest> for UserAuthenticationMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = UserAuthenticationMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(UserAuthenticationMiddleware {
            service: Rc::new(service),
        }))
    }
}
