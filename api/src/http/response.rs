use bytes::Bytes;
use http::{
    header::{CONTENT_LENGTH, CONTENT_TYPE},
    HeaderValue, StatusCode,
};

pub type Response = http::Response<Option<Bytes>>;

pub trait IntoResponse {
    fn into_response(self) -> Response;
}

fn with_body(body: Bytes, content_type: mime::Mime) -> Response {
    let len = body.len();
    let mut response = http::Response::new(Some(body));

    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(content_type.as_ref()) {
        headers.insert(CONTENT_TYPE, value);
    }
    headers.insert(CONTENT_LENGTH, len.into());

    response
}

impl IntoResponse for StatusCode {
    fn into_response(self) -> Response {
        let mut response = http::Response::new(None);
        *response.status_mut() = self;
        response.headers_mut().insert(CONTENT_LENGTH, 0.into());

        response
    }
}

impl IntoResponse for Bytes {
    fn into_response(self) -> Response {
        with_body(self, mime::APPLICATION_OCTET_STREAM)
    }
}

pub struct Json<T>(pub T);

impl<T> IntoResponse for Json<T>
where
    T: serde::Serialize,
{
    fn into_response(self) -> Response {
        match serde_json::to_vec(&self.0) {
            Ok(json) => with_body(json.into(), mime::APPLICATION_JSON),
            Err(err) => {
                tracing::error!(%err, "failed to serialize response body");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

impl IntoResponse for String {
    fn into_response(self) -> Response {
        with_body(Bytes::from(self), mime::TEXT_PLAIN_UTF_8)
    }
}

impl IntoResponse for &'static str {
    fn into_response(self) -> Response {
        with_body(Bytes::from_static(self.as_bytes()), mime::TEXT_PLAIN_UTF_8)
    }
}

impl<B: IntoResponse> IntoResponse for (StatusCode, B) {
    fn into_response(self) -> Response {
        let mut response = self.1.into_response();
        *response.status_mut() = self.0;

        response
    }
}
