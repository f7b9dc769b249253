use http::{header::LOCATION, HeaderValue, Method, StatusCode};
use uuid::Uuid;

use crate::{
    error::StoreError,
    http::{IntoResponse, Json, Request, Response},
    validation::PersonPayload,
    AppState,
};

enum Route {
    CreatePerson,
    GetPerson(Option<Uuid>),
    SearchPeople,
    CountPeople,
    Unknown,
}

impl Route {
    fn resolve(method: &Method, path: &str) -> Self {
        let path = path.strip_suffix('/').unwrap_or(path);

        match path {
            "/pessoas" if method == Method::POST => Self::CreatePerson,
            "/pessoas" if method == Method::GET => Self::SearchPeople,
            "/contagem-pessoas" if method == Method::GET => Self::CountPeople,
            _ if method == Method::GET => match path.strip_prefix("/pessoas/") {
                Some(id) if !id.contains('/') => Self::GetPerson(id.parse().ok()),
                _ => Self::Unknown,
            },
            _ => Self::Unknown,
        }
    }
}

pub async fn route_request(request: Request, app_state: AppState) -> Response {
    match Route::resolve(request.method(), request.uri().path()) {
        Route::CreatePerson => create_person(app_state, request).await,
        Route::GetPerson(id) => get_person(app_state, id).await,
        Route::SearchPeople => search_people(app_state, &request).await,
        Route::CountPeople => count_people(app_state).await,
        Route::Unknown => {
            let msg = format!(
                "Unknown route {} {}",
                request.method(),
                request.uri().path()
            );
            (StatusCode::NOT_FOUND, msg).into_response()
        }
    }
}

fn storage_failure(err: StoreError) -> Response {
    tracing::error!(%err, "storage operation failed");
    StatusCode::INTERNAL_SERVER_ERROR.into_response()
}

async fn create_person(app_state: AppState, request: Request) -> Response {
    let Some(body) = request.into_body() else {
        return (StatusCode::BAD_REQUEST, "missing body").into_response();
    };
    let Ok(payload): Result<PersonPayload, _> = serde_json::from_slice(&body) else {
        return (StatusCode::BAD_REQUEST, "invalid json").into_response();
    };
    let Ok(person) = payload.validate() else {
        return StatusCode::UNPROCESSABLE_ENTITY.into_response();
    };

    match app_state.repository.create(person).await {
        Ok(id) => {
            let mut response = StatusCode::CREATED.into_response();
            if let Ok(location) = HeaderValue::try_from(format!("/pessoas/{id}")) {
                response.headers_mut().insert(LOCATION, location);
            }
            response
        }
        Err(StoreError::Conflict) => {
            (StatusCode::BAD_REQUEST, "this nickname is already registered").into_response()
        }
        Err(err) => storage_failure(err),
    }
}

async fn get_person(app_state: AppState, id: Option<Uuid>) -> Response {
    let Some(id) = id else {
        return StatusCode::NOT_FOUND.into_response();
    };

    match app_state.repository.find_by_id(id).await {
        Ok(person) => (StatusCode::OK, Json(person)).into_response(),
        Err(StoreError::NotFound) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => storage_failure(err),
    }
}

fn search_term(request: &Request) -> Option<String> {
    let query = request.uri().query()?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == "t")
        .map(|(_, term)| term.into_owned())
        .filter(|term| !term.trim().is_empty())
}

async fn search_people(app_state: AppState, request: &Request) -> Response {
    let Some(term) = search_term(request) else {
        return (StatusCode::BAD_REQUEST, "missing search term").into_response();
    };

    match app_state.repository.search(&term).await {
        Ok(people) => (StatusCode::OK, Json(people)).into_response(),
        Err(err) => storage_failure(err),
    }
}

async fn count_people(app_state: AppState) -> Response {
    match app_state.repository.count().await {
        Ok(rows) => (StatusCode::OK, rows.to_string()).into_response(),
        Err(err) => storage_failure(err),
    }
}
