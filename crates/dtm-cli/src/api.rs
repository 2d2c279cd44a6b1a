//! Wire requests and response decoding for the REST service.
//!
//! Every endpoint the client uses is built here from the session's host,
//! alias and database. Query-string and form values are percent-escaped the
//! way the service expects, leaving only unreserved characters intact.

use std::fmt::Write as _;

use dtm_edn::{EdnError, Value, parse};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use thiserror::Error;
use url::Url;

use crate::session::{Session, SessionError};
use crate::transport::{HttpRequest, HttpResponse};

const UNRESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');
const DEFAULT_INDEX: &str = "eavt";
const LATEST_BASIS: &str = "-";

/// Errors raised while building a request or decoding its response.
#[derive(Debug, Clone, PartialEq, Error)]
pub(crate) enum ApiError {
    /// A connection setting required by the endpoint is unset.
    #[error(transparent)]
    Session(#[from] SessionError),
    /// The endpoint path could not be joined onto the host.
    #[error("invalid request path {path}: {source}")]
    Url {
        /// Relative path that failed to join.
        path: String,
        /// Parser diagnostic.
        #[source]
        source: url::ParseError,
    },
    /// The datoms arguments were not an EDN map.
    #[error("datoms expects an EDN map of arguments, found {kind}")]
    DatomsArguments {
        /// Kind of the rejected value.
        kind: &'static str,
    },
    /// A successful response body was not valid EDN.
    #[error("could not decode response: {source}")]
    Decode {
        /// Reader diagnostic.
        #[source]
        source: EdnError,
    },
}

/// Percent-escapes `text` for use in a query string or form body.
pub(crate) fn escape(text: &str) -> String {
    utf8_percent_encode(text, UNRESERVED).to_string()
}

fn endpoint(session: &Session, path: &str) -> Result<Url, ApiError> {
    session
        .host()?
        .join(path)
        .map_err(|source| ApiError::Url {
            path: path.to_owned(),
            source,
        })
}

fn database_path(session: &Session) -> Result<String, ApiError> {
    Ok(format!("data/{}/{}/", session.alias()?, session.db()?))
}

/// Lists the storage aliases known to the service.
pub(crate) fn storages(session: &Session) -> Result<HttpRequest, ApiError> {
    Ok(HttpRequest::get(endpoint(session, "data/")?))
}

/// Lists the databases of the current alias.
pub(crate) fn databases(session: &Session) -> Result<HttpRequest, ApiError> {
    let path = format!("data/{}/", session.alias()?);
    Ok(HttpRequest::get(endpoint(session, &path)?))
}

pub(crate) fn create_database(session: &Session, name: &str) -> Result<HttpRequest, ApiError> {
    let path = format!("data/{}/", session.alias()?);
    let body = format!("db-name={}", escape(name));
    Ok(HttpRequest::post(endpoint(session, &path)?, body))
}

/// Fetches every attribute of one entity, by id or ident.
pub(crate) fn entity(session: &Session, id: &str) -> Result<HttpRequest, ApiError> {
    let path = format!("{}{LATEST_BASIS}/entity?e={}", database_path(session)?, escape(id));
    Ok(HttpRequest::get(endpoint(session, &path)?))
}

/// Runs `query` against the current database, applying session paging.
pub(crate) fn query(session: &Session, query: &str) -> Result<HttpRequest, ApiError> {
    let args = format!(
        "[{{:db/alias {}}}]",
        Value::string(format!("{}/{}", session.alias()?, session.db()?))
    );
    let mut path = format!("api/query?q={}&args={}", escape(query), escape(&args));
    push_paging(&mut path, session);
    Ok(HttpRequest::get(endpoint(session, &path)?))
}

/// Submits transaction data to the current database.
pub(crate) fn transact(session: &Session, tx_data: &str) -> Result<HttpRequest, ApiError> {
    let path = database_path(session)?;
    let body = format!("tx-data={}", escape(tx_data));
    Ok(HttpRequest::post(endpoint(session, &path)?, body))
}

/// Reads raw datoms.
///
/// `arguments` is an EDN map such as `{:index :aevt :a :person/name}`. Each
/// key becomes a query parameter; `:as-of` selects the database basis
/// instead. The index defaults to `eavt`.
pub(crate) fn datoms(session: &Session, arguments: &Value) -> Result<HttpRequest, ApiError> {
    let Value::Map(map) = arguments else {
        return Err(ApiError::DatomsArguments {
            kind: arguments.kind(),
        });
    };

    let mut basis = String::from(LATEST_BASIS);
    let mut index = String::from(DEFAULT_INDEX);
    let mut parameters = Vec::new();
    for (key, value) in map.entries() {
        let key_text = parameter_text(key);
        let name = key_text.strip_prefix(':').unwrap_or(&key_text);
        let text = parameter_text(value);
        match name {
            "as-of" => basis = text,
            "index" => index = text.strip_prefix(':').unwrap_or(&text).to_owned(),
            _ => parameters.push(format!("{name}={}", escape(&text))),
        }
    }

    let mut path = format!(
        "{}{}/datoms?index={}",
        database_path(session)?,
        escape(&basis),
        escape(&index)
    );
    for parameter in parameters {
        path.push('&');
        path.push_str(&parameter);
    }
    push_paging(&mut path, session);
    Ok(HttpRequest::get(endpoint(session, &path)?))
}

/// Subscribes to transaction events for the current database.
pub(crate) fn events(session: &Session) -> Result<HttpRequest, ApiError> {
    let path = format!("events/{}/{}", session.alias()?, session.db()?);
    Ok(HttpRequest::get(endpoint(session, &path)?).streaming())
}

fn parameter_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_edn(),
    }
}

fn push_paging(path: &mut String, session: &Session) {
    let paging = session.paging();
    if let Some(offset) = paging.offset {
        let _ = write!(path, "&offset={offset}");
    }
    if let Some(limit) = paging.limit {
        let _ = write!(path, "&limit={limit}");
    }
}

/// Turns a response into the value to render.
///
/// A server error page becomes a `"Problem: <title>"` string. Other
/// non-success statuses keep their EDN body when it parses.
pub(crate) fn decode_response(response: &HttpResponse) -> Result<Value, ApiError> {
    let body = String::from_utf8_lossy(&response.body);
    if response.status == 500 {
        let problem = error_title(&body).map_or_else(
            || String::from("Problem: HTTP 500"),
            |title| format!("Problem: {title}"),
        );
        return Ok(Value::string(problem));
    }
    if response.is_success() {
        if body.trim().is_empty() {
            return Ok(Value::Nil);
        }
        return parse(&body).map_err(|source| ApiError::Decode { source });
    }
    Ok(parse(&body)
        .unwrap_or_else(|_| Value::string(format!("Problem: HTTP {}", response.status))))
}

fn error_title(body: &str) -> Option<&str> {
    let (_, after_open) = body.split_once("<title>")?;
    let (title, _) = after_open.split_once("</title>")?;
    Some(title.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Paging;
    use crate::transport::{Accept, Method};
    use rstest::{fixture, rstest};

    #[fixture]
    fn session() -> Session {
        Session::for_tests("http://localhost:8001", "dev", "seattle")
    }

    #[rstest]
    fn storages_hit_the_data_root(session: Session) {
        let request = storages(&session).expect("request");
        assert_eq!(request.url.as_str(), "http://localhost:8001/data/");
        assert_eq!(request.method, Method::Get);
        assert_eq!(request.accept, Accept::Edn);
    }

    #[rstest]
    fn entity_ids_are_escaped(session: Session) {
        let request = entity(&session, ":person/name").expect("request");
        assert_eq!(
            request.url.as_str(),
            "http://localhost:8001/data/dev/seattle/-/entity?e=%3Aperson%2Fname"
        );
    }

    #[rstest]
    fn queries_carry_alias_arguments_and_paging(mut session: Session) {
        session.set_paging(Paging {
            offset: Some(10),
            limit: Some(5),
        });
        let request = query(&session, "[:find ?e :where [?e :db/doc]]").expect("request");
        assert_eq!(
            request.url.as_str(),
            concat!(
                "http://localhost:8001/api/query",
                "?q=%5B%3Afind%20%3Fe%20%3Awhere%20%5B%3Fe%20%3Adb%2Fdoc%5D%5D",
                "&args=%5B%7B%3Adb%2Falias%20%22dev%2Fseattle%22%7D%5D",
                "&offset=10&limit=5"
            )
        );
    }

    #[rstest]
    fn transactions_post_form_bodies(session: Session) {
        let request = transact(&session, "[[:db/add 1 :db/doc \"x\"]]").expect("request");
        assert_eq!(request.method, Method::Post);
        assert_eq!(request.url.as_str(), "http://localhost:8001/data/dev/seattle/");
        assert_eq!(
            request.body.as_deref(),
            Some("tx-data=%5B%5B%3Adb%2Fadd%201%20%3Adb%2Fdoc%20%22x%22%5D%5D")
        );
    }

    #[rstest]
    fn create_database_posts_to_alias(session: Session) {
        let request = create_database(&session, "inventory").expect("request");
        assert_eq!(request.url.as_str(), "http://localhost:8001/data/dev/");
        assert_eq!(request.body.as_deref(), Some("db-name=inventory"));
    }

    #[rstest]
    fn datoms_default_to_eavt(session: Session) {
        let arguments = parse("{:e 17592186045418 :limit 3}").expect("valid map");
        let request = datoms(&session, &arguments).expect("request");
        assert_eq!(
            request.url.as_str(),
            "http://localhost:8001/data/dev/seattle/-/datoms?index=eavt&e=17592186045418&limit=3"
        );
    }

    #[rstest]
    fn datoms_take_index_and_basis(session: Session) {
        let arguments = parse("{:index :aevt :a :person/name :as-of 1000}").expect("valid map");
        let request = datoms(&session, &arguments).expect("request");
        assert_eq!(
            request.url.as_str(),
            "http://localhost:8001/data/dev/seattle/1000/datoms?index=aevt&a=%3Aperson%2Fname"
        );
    }

    #[rstest]
    fn datoms_reject_non_maps(session: Session) {
        let error = datoms(&session, &Value::Int(1)).expect_err("non-map must fail");
        assert_eq!(error, ApiError::DatomsArguments { kind: "integer" });
    }

    #[rstest]
    fn events_stream_from_the_database(session: Session) {
        let request = events(&session).expect("request");
        assert_eq!(request.url.as_str(), "http://localhost:8001/events/dev/seattle");
        assert_eq!(request.accept, Accept::EventStream);
    }

    #[test]
    fn missing_alias_is_reported_before_sending() {
        let session = Session::for_tests("http://localhost:8001", "", "");
        assert_eq!(
            databases(&session),
            Err(ApiError::Session(SessionError::MissingAlias))
        );
    }

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            body: body.as_bytes().to_vec(),
        }
    }

    #[rstest]
    #[case(500, "<html><title>Server Error</title></html>", "\"Problem: Server Error\"")]
    #[case(500, "oops", "\"Problem: HTTP 500\"")]
    #[case(404, "not found", "\"Problem: HTTP 404\"")]
    #[case(400, "{:message \"bad query\"}", "{:message \"bad query\"}")]
    #[case(200, "[[1]]", "[[1]]")]
    #[case(201, "  ", "nil")]
    fn decodes_by_status(#[case] status: u16, #[case] body: &str, #[case] expected: &str) {
        let value = decode_response(&response(status, body)).expect("decodes");
        assert_eq!(value.to_edn(), expected);
    }

    #[test]
    fn malformed_success_bodies_are_errors() {
        let error = decode_response(&response(200, "[1")).expect_err("must fail");
        assert!(matches!(error, ApiError::Decode { .. }));
    }
}
