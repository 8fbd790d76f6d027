//! Some helper functions for the API.

use crate::IngestContext;
use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome, Request};
use rocket::response::Response;
use rocket::serde::json::Json;
use sheet_meat_common::IngestResponse;
use std::time::Instant;

#[derive(Clone, Copy)]
pub struct RequestTimingFairing;

#[rocket::async_trait]
impl Fairing for RequestTimingFairing {
    fn info(&self) -> Info {
        Info {
            name: "Request timing",
            kind: Kind::Request | Kind::Response,
        }
    }

    async fn on_request(&self, request: &mut Request<'_>, _data: &mut rocket::Data<'_>) {
        request.local_cache(Instant::now);
    }

    async fn on_response<'r>(&self, request: &'r Request<'_>, response: &mut Response<'r>) {
        let elapsed_ms = request.local_cache(Instant::now).elapsed().as_millis();
        let status = response.status().code;

        if response.status().class().is_server_error() {
            tracing::warn!(
                method = %request.method(),
                path = %request.uri().path(),
                status,
                elapsed_ms,
                "Request Failed"
            );
        } else {
            tracing::info!(
                method = %request.method(),
                path = %request.uri().path(),
                status,
                elapsed_ms,
                "Request Completed"
            );
        }
    }
}

/// Guard for the cron trigger. With a `CRON_SECRET` configured the caller
/// must send `Authorization: Bearer <secret>`; without one anyone may trigger.
pub struct CronAuth;

#[rocket::async_trait]
impl<'r> FromRequest<'r> for CronAuth {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let secret = request
            .rocket()
            .state::<IngestContext>()
            .and_then(|context| context.cron_secret.as_deref());
        let Some(secret) = secret else {
            return Outcome::Success(CronAuth);
        };

        let presented = request
            .headers()
            .get_one("Authorization")
            .and_then(|value| value.strip_prefix("Bearer "));
        if presented == Some(secret) {
            Outcome::Success(CronAuth)
        } else {
            tracing::warn!(path = %request.uri().path(), "Rejected cron trigger without a valid secret");
            Outcome::Error((Status::Unauthorized, ()))
        }
    }
}

pub fn ingest_failure(message: impl Into<String>) -> (Status, Json<IngestResponse>) {
    (
        Status::InternalServerError,
        Json(IngestResponse::failure(message)),
    )
}
