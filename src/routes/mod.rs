use actix_multipart::form::{tempfile::TempFile, MultipartForm};
use actix_web::{get, post, web, HttpMessage, HttpRequest, HttpResponse};
use mime_guess::{from_path, get_mime_extensions_str};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use std::fs::{self, create_dir_all, rename};
use std::path::PathBuf;

use crate::config;
use crate::error::AppError;
use crate::models::user::UserAuthentication;

pub mod department;
pub mod report;
pub mod stop_card;
pub mod user;

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    ReportImage,
    StopCardImage,
}

impl FileKind {
    fn directory(&self) -> &'static str {
        match self {
            FileKind::ReportImage => "reports",
            FileKind::StopCardImage => "stop-cards",
        }
    }
    fn as_str(&self) -> &'static str {
        match self {
            FileKind::ReportImage => "report_image",
            FileKind::StopCardImage => "stop_card_image",
        }
    }
}

#[derive(Deserialize)]
pub struct FileQueryParams {
    pub kind: FileKind,
    pub name: String,
}
#[derive(Deserialize)]
pub struct FileUploadQueryParams {
    pub kind: FileKind,
}
#[derive(Debug, MultipartForm)]
pub struct FileUploadForm {
    #[multipart(rename = "file")]
    pub file: TempFile,
}

#[get("/files")]
pub async fn get_file(query: web::Query<FileQueryParams>) -> HttpResponse {
    if query.name.contains('/') || query.name.contains("..") {
        return HttpResponse::BadRequest().body("INVALID_FILE_NAME");
    }
    let path = format!(
        "{}/{}/{}",
        config::get().media_dir,
        query.kind.directory(),
        query.name
    );
    if let Ok(file) = fs::read(path.clone()) {
        let mime = from_path(path).first_or_octet_stream();
        HttpResponse::Ok().content_type(mime).body(file)
    } else {
        HttpResponse::NotFound().body("CONTENT_NOT_FOUND")
    }
}

/// Store an uploaded blob under the kind's folder and answer with the stable
/// URL the client embeds in a report or STOP card.
#[post("/files")]
pub async fn upload_file(
    query: web::Query<FileUploadQueryParams>,
    form: MultipartForm<FileUploadForm>,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    if req.extensions().get::<UserAuthentication>().is_none() {
        return Err(AppError::Unauthenticated("UNAUTHORIZED"));
    }

    let content_type = form
        .file
        .content_type
        .as_ref()
        .map(|mime| mime.essence_str().to_string())
        .ok_or(AppError::Validation("FILE_CONTENT_TYPE_REQUIRED"))?;
    let ext = get_mime_extensions_str(&content_type)
        .and_then(|extensions| extensions.first())
        .ok_or(AppError::Validation("FILE_INVALID_MIME"))?;

    let save_dir = format!("{}/{}/", config::get().media_dir, query.kind.directory());
    if create_dir_all(&save_dir).is_err() {
        return Err(AppError::Store("DIRECTORY_CREATION_FAILED"));
    }

    let name = format!("{}.{}", ObjectId::new(), ext);
    let file_path = PathBuf::from(save_dir + &name);
    if rename(form.file.file.path(), &file_path).is_err() {
        return Err(AppError::Store("FILE_PERSIST_FAILED"));
    }

    Ok(HttpResponse::Created().body(format!(
        "/files?kind={}&name={}",
        query.kind.as_str(),
        name
    )))
}
