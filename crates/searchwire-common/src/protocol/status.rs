use std::fmt;

/// Status of a response, mapped from the numeric HTTP-style code.
///
/// Codes the client branches on get their own variant. Anything else is
/// carried as [`Status::Other`] so the raw code is never lost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Ok,
    Created,
    Accepted,
    NoContent,
    BadRequest,
    Forbidden,
    NotFound,
    Conflict,
    InternalServerError,
    ServiceUnavailable,
    Other(u16),
}

impl Status {
    pub fn from_code(code: u16) -> Self {
        match code {
            200 => Status::Ok,
            201 => Status::Created,
            202 => Status::Accepted,
            204 => Status::NoContent,
            400 => Status::BadRequest,
            403 => Status::Forbidden,
            404 => Status::NotFound,
            409 => Status::Conflict,
            500 => Status::InternalServerError,
            503 => Status::ServiceUnavailable,
            other => Status::Other(other),
        }
    }

    pub fn code(&self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::Created => 201,
            Status::Accepted => 202,
            Status::NoContent => 204,
            Status::BadRequest => 400,
            Status::Forbidden => 403,
            Status::NotFound => 404,
            Status::Conflict => 409,
            Status::InternalServerError => 500,
            Status::ServiceUnavailable => 503,
            Status::Other(code) => *code,
        }
    }

    /// True for any 2xx code.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.code())
    }

    /// Responses with these codes never carry a body.
    pub fn forbids_body(&self) -> bool {
        let code = self.code();
        (100..200).contains(&code) || code == 204 || code == 304
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Status::Ok => "OK",
            Status::Created => "CREATED",
            Status::Accepted => "ACCEPTED",
            Status::NoContent => "NO_CONTENT",
            Status::BadRequest => "BAD_REQUEST",
            Status::Forbidden => "FORBIDDEN",
            Status::NotFound => "NOT_FOUND",
            Status::Conflict => "CONFLICT",
            Status::InternalServerError => "INTERNAL_SERVER_ERROR",
            Status::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            Status::Other(_) => "OTHER",
        };
        write!(f, "{} {}", self.code(), name)
    }
}
