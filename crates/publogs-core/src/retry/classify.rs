//! Map fetch failures onto retry error kinds.

use crate::fetch::FetchError;
use crate::retry::policy::ErrorKind;

pub fn classify_http_status(code: u32) -> ErrorKind {
    match code {
        429 | 503 => ErrorKind::Throttled,
        500..=599 => ErrorKind::Server(code as u16),
        _ => ErrorKind::Permanent,
    }
}

pub fn classify_curl_error(e: &curl::Error) -> ErrorKind {
    if e.is_operation_timedout() {
        ErrorKind::Timeout
    } else if e.is_couldnt_connect()
        || e.is_couldnt_resolve_host()
        || e.is_recv_error()
        || e.is_send_error()
        || e.is_read_error()
        || e.is_got_nothing()
        || e.is_partial_file()
    {
        ErrorKind::Connection
    } else {
        ErrorKind::Permanent
    }
}

pub fn classify(e: &FetchError) -> ErrorKind {
    match e {
        FetchError::Http(code) => classify_http_status(*code),
        FetchError::Curl(ce) => classify_curl_error(ce),
        FetchError::Storage(_) | FetchError::InvalidUrl(_) => ErrorKind::Permanent,
    }
}
