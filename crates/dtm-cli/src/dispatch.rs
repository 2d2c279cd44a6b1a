//! Command execution against the REST service.
//!
//! The [`Dispatcher`] owns the [`Session`] and is the only code that mutates
//! it. Each command becomes one or more wire requests; schema-driven
//! commands first fetch attribute metadata and synthesise their query from
//! it. Results come back as [`Outcome`]s for the caller to render.

use std::io::{self, Write};

use dtm_config::OutputFormat;
use dtm_edn::{EdnError, Map, Value, parse};
use thiserror::Error;

use crate::api::{self, ApiError};
use crate::command::{Command, HELP, setting_value};
use crate::output;
use crate::prompt::{self, InputSource, PromptError};
use crate::query::{self, AttributeDescriptor, QueryError};
use crate::session::Session;
use crate::stream::{StreamDecoder, StreamFailure};
use crate::transport::{HttpRequest, Transport};

/// Errors that abort a command. Service-side problems are values, not errors.
#[derive(Debug, Error)]
pub(crate) enum DispatchError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error(transparent)]
    Prompt(#[from] PromptError),
    #[error("could not parse {command} argument: {source}")]
    Argument {
        command: &'static str,
        #[source]
        source: EdnError,
    },
    #[error("transaction data must be an EDN vector, found {kind}")]
    InvalidTransaction { kind: &'static str },
    #[error("failed to write output: {0}")]
    Output(#[source] io::Error),
    #[error("failed to encode output: {0}")]
    Encode(#[source] serde_json::Error),
}

/// What a command produced.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Outcome {
    /// A result to render in the session's format.
    Value(Value),
    /// Preformatted text such as the help screen.
    Text(&'static str),
    /// The terminal should be cleared.
    Clear,
    /// The REPL should exit.
    Quit,
    /// Results were already written while streaming.
    Streamed,
}

pub(crate) struct Dispatcher<'t, T: Transport> {
    transport: &'t T,
    session: Session,
}

impl<'t, T: Transport> Dispatcher<'t, T> {
    pub(crate) const fn new(transport: &'t T, session: Session) -> Self {
        Self { transport, session }
    }

    pub(crate) const fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Runs one command.
    ///
    /// `input` feeds the interactive creation commands; `out` receives
    /// prompt messages and streamed events; `err` receives verbose request
    /// traces.
    pub(crate) fn execute(
        &mut self,
        command: Command,
        input: &mut dyn InputSource,
        out: &mut dyn Write,
        err: &mut dyn Write,
    ) -> Result<Outcome, DispatchError> {
        tracing::debug!(?command, "executing command");
        let value = match command {
            Command::Storages => self.send(api::storages(&self.session)?, err)?,
            Command::Databases => self.send(api::databases(&self.session)?, err)?,
            Command::CreateDatabase(name) => {
                self.send(api::create_database(&self.session, &name)?, err)?
            }
            Command::Namespaces => {
                let result = self.run_query(&query::namespaces_query(), err)?;
                if result.elements().is_some() {
                    query::namespace_rows(&result)
                } else {
                    result
                }
            }
            Command::Attributes(namespace) => {
                self.run_query(&query::attributes_query(&namespace), err)?
            }
            Command::Entities(namespace) => match self.attributes(&namespace, err)? {
                Ok(attributes) => {
                    let text = query::entities_query(attributes.iter().map(|a| a.ident.as_str()));
                    self.run_query(&text, err)?
                }
                Err(problem) => problem,
            },
            Command::Entity(id) => self.send(api::entity(&self.session, &id)?, err)?,
            Command::Idents(namespace) => self.run_query(&query::idents_query(&namespace), err)?,
            Command::CreateIdent(ident) => self.transact(&query::create_ident_tx(&ident), err)?,
            Command::Fns => self.run_query(&query::fns_query(), err)?,
            Command::FnsIn(namespace) => self.run_query(&query::fns_in_query(&namespace), err)?,
            Command::Query(text) => self.run_query(&text, err)?,
            Command::Transact(text) => self.transact(&text, err)?,
            Command::Retract(text) => {
                let target = parse(&text).map_err(|source| DispatchError::Argument {
                    command: "retract",
                    source,
                })?;
                self.transact(&query::retract_entities_tx(&target)?, err)?
            }
            Command::Datoms(text) => {
                let arguments = parse(&text).map_err(|source| DispatchError::Argument {
                    command: "datoms",
                    source,
                })?;
                self.send(api::datoms(&self.session, &arguments)?, err)?
            }
            Command::Events => return self.stream_events(out, err),
            Command::CreateEntity(namespace) => {
                let attributes = match self.attributes(&namespace, err)? {
                    Ok(attributes) => attributes,
                    Err(problem) => return Ok(Outcome::Value(problem)),
                };
                if attributes.is_empty() {
                    return Ok(Outcome::Value(error_value(&format!(
                        "no attributes found in namespace {}",
                        query::just_namespace(&namespace)
                    ))));
                }
                let values = prompt::entity_values(&attributes, input, out)?;
                self.transact(&query::entity_tx(&values), err)?
            }
            Command::CreateAttribute(namespace) => {
                let (attribute, doc) = prompt::attribute_definition(&namespace, input, out)?;
                self.transact(&query::attribute_tx(&attribute, doc.as_deref()), err)?
            }
            Command::Help => return Ok(Outcome::Text(HELP)),
            Command::Format(name) => {
                if let Some(selected) = name {
                    self.session
                        .set_format(OutputFormat::from_name_or_edn(&selected));
                }
                setting_value("format", &self.session.format().to_string())
            }
            Command::Verbose(flag) => {
                if let Some(enabled) = flag {
                    self.session.set_verbose(enabled);
                }
                setting_value("verbose", on_off(self.session.verbose()))
            }
            Command::Validate(flag) => {
                if let Some(enabled) = flag {
                    self.session.set_validate(enabled);
                }
                setting_value("validate", on_off(self.session.validate()))
            }
            Command::Clear => return Ok(Outcome::Clear),
            Command::Quit => return Ok(Outcome::Quit),
        };
        Ok(Outcome::Value(value))
    }

    /// Renders `value` in the session format, consuming the pending header.
    pub(crate) fn render(&mut self, value: &Value) -> Result<String, DispatchError> {
        let header = self.session.take_header();
        output::render(value, self.session.format(), header).map_err(DispatchError::Encode)
    }

    fn send(&self, request: HttpRequest, err: &mut dyn Write) -> Result<Value, DispatchError> {
        tracing::debug!(method = %request.method, url = %request.url, "sending request");
        match self.transport.perform(&request, None) {
            Ok(response) => {
                if self.session.verbose() {
                    writeln!(
                        err,
                        "URL: {}\nRESPONSE CODE: {}\nDATA: {}",
                        request.url,
                        response.status,
                        String::from_utf8_lossy(&response.body)
                    )
                    .map_err(DispatchError::Output)?;
                }
                Ok(api::decode_response(&response)?)
            }
            Err(error) => {
                tracing::warn!(%error, "request failed");
                Ok(Value::string(format!("Problem: {error}")))
            }
        }
    }

    /// Sends `text` as a query, recording its column header for the render.
    fn run_query(&mut self, text: &str, err: &mut dyn Write) -> Result<Value, DispatchError> {
        let header = query::query_header(text)?;
        tracing::debug!(query = text, "running query");
        self.session.set_header(header);
        let request = api::query(&self.session, text)?;
        self.send(request, err)
    }

    /// Fetches the attribute rows of `namespace`.
    ///
    /// Anything other than a collection of rows, such as a `Problem:` string,
    /// comes back as the inner `Err` so the command can show it as its result.
    fn attributes(
        &self,
        namespace: &str,
        err: &mut dyn Write,
    ) -> Result<Result<Vec<AttributeDescriptor>, Value>, DispatchError> {
        let request = api::query(&self.session, &query::attributes_query(namespace))?;
        let rows = self.send(request, err)?;
        if rows.elements().is_some() {
            Ok(Ok(AttributeDescriptor::from_rows(&rows)))
        } else {
            tracing::debug!(%namespace, "attribute lookup returned no rows");
            Ok(Err(rows))
        }
    }

    fn transact(&self, tx_data: &str, err: &mut dyn Write) -> Result<Value, DispatchError> {
        if self.session.validate() {
            let parsed = parse(tx_data).map_err(|source| DispatchError::Argument {
                command: "transact",
                source,
            })?;
            if !matches!(parsed, Value::Vector(_)) {
                return Err(DispatchError::InvalidTransaction {
                    kind: parsed.kind(),
                });
            }
        }
        tracing::debug!(tx_data, "submitting transaction");
        self.send(api::transact(&self.session, tx_data)?, err)
    }

    fn stream_events(
        &self,
        out: &mut dyn Write,
        err: &mut dyn Write,
    ) -> Result<Outcome, DispatchError> {
        let request = api::events(&self.session)?;
        if self.session.verbose() {
            writeln!(err, "URL: {}", request.url).map_err(DispatchError::Output)?;
        }
        let mut decoder = StreamDecoder::new();
        let mut sink = EventSink {
            out,
            format: self.session.format(),
            failure: None,
        };
        let result = {
            let mut on_chunk = |chunk: &[u8]| decoder.push(chunk, |event| sink.emit(event));
            self.transport.perform(&request, Some(&mut on_chunk))
        };
        let response = match result {
            Ok(response) => response,
            Err(error) => {
                tracing::warn!(%error, "event stream failed");
                return Ok(Outcome::Value(Value::string(format!("Problem: {error}"))));
            }
        };
        if !response.is_success() {
            return Ok(Outcome::Value(api::decode_response(&response)?));
        }
        decoder.finish(|event| sink.emit(event));
        sink.failure.map_or(Ok(Outcome::Streamed), Err)
    }
}

/// Writes each decoded event as soon as it arrives.
struct EventSink<'w> {
    out: &'w mut dyn Write,
    format: OutputFormat,
    failure: Option<DispatchError>,
}

impl EventSink<'_> {
    fn emit(&mut self, event: Result<Value, StreamFailure>) {
        if self.failure.is_some() {
            return;
        }
        let value = event.unwrap_or_else(|failure| failure.to_value());
        let written = output::render(&value, self.format, None)
            .map_err(DispatchError::Encode)
            .and_then(|text| {
                self.out
                    .write_all(text.as_bytes())
                    .and_then(|()| self.out.flush())
                    .map_err(DispatchError::Output)
            });
        if let Err(error) = written {
            self.failure = Some(error);
        }
    }
}

const fn on_off(flag: bool) -> &'static str {
    if flag { "on" } else { "off" }
}

fn error_value(message: &str) -> Value {
    Value::Map(Map::from_entries(vec![(
        Value::keyword("error"),
        Value::string(message),
    )]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::ReaderInput;
    use crate::transport::{HttpResponse, Method, TransportError};
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::io::{Cursor, sink};

    /// Replays canned responses and records every request.
    #[derive(Default)]
    struct ScriptedTransport {
        responses: RefCell<VecDeque<Result<HttpResponse, TransportError>>>,
        requests: RefCell<Vec<HttpRequest>>,
    }

    impl ScriptedTransport {
        fn respond(self, status: u16, body: &str) -> Self {
            self.responses.borrow_mut().push_back(Ok(HttpResponse {
                status,
                body: body.as_bytes().to_vec(),
            }));
            self
        }

        fn fail(self) -> Self {
            self.responses.borrow_mut().push_back(Err(TransportError::Read {
                url: String::from("http://localhost:8001/"),
                source: io::Error::new(io::ErrorKind::ConnectionReset, "connection reset"),
            }));
            self
        }

        fn request(&self, index: usize) -> HttpRequest {
            self.requests
                .borrow()
                .get(index)
                .cloned()
                .expect("request was recorded")
        }
    }

    impl Transport for ScriptedTransport {
        fn perform(
            &self,
            request: &HttpRequest,
            on_chunk: Option<&mut dyn FnMut(&[u8])>,
        ) -> Result<HttpResponse, TransportError> {
            self.requests.borrow_mut().push(request.clone());
            let response = self
                .responses
                .borrow_mut()
                .pop_front()
                .expect("a scripted response")?;
            match on_chunk {
                Some(callback) if response.is_success() => {
                    for chunk in response.body.chunks(3) {
                        callback(chunk);
                    }
                    Ok(HttpResponse {
                        status: response.status,
                        body: Vec::new(),
                    })
                }
                _ => Ok(response),
            }
        }
    }

    fn session() -> Session {
        Session::for_tests("http://localhost:8001", "dev", "seattle")
    }

    fn run(transport: &ScriptedTransport, command: Command) -> (Outcome, Session) {
        let mut dispatcher = Dispatcher::new(transport, session());
        let mut input = ReaderInput::new(Cursor::new(Vec::new()));
        let outcome = dispatcher
            .execute(command, &mut input, &mut sink(), &mut sink())
            .expect("command succeeds");
        (outcome, dispatcher.session)
    }

    #[test]
    fn entities_query_is_built_from_attribute_rows() {
        let transport = ScriptedTransport::default()
            .respond(
                200,
                "[[:person/name :db.type/string :db.cardinality/one] \
                  [:person/age :db.type/long :db.cardinality/one]]",
            )
            .respond(200, "[[101 \"Ann\" 30]]");
        let (outcome, mut session) = run(&transport, Command::Entities(String::from("person")));
        assert_eq!(
            outcome,
            Outcome::Value(parse("[[101 \"Ann\" 30]]").expect("valid rows"))
        );
        let second = transport.request(1);
        assert!(second.url.as_str().contains(&api::escape(
            "[:find ?db-id ?person-name ?person-age :where [?db-id :person/name ?person-name] [?db-id :person/age ?person-age]]"
        )));
        assert_eq!(
            session.take_header(),
            Some(vec![
                String::from("?db-id"),
                String::from("?person-name"),
                String::from("?person-age"),
            ])
        );
    }

    #[test]
    fn attribute_lookup_problems_end_schema_commands() {
        let page = "<html><head><title>Attribute lookup exploded</title></head></html>";
        for command in [
            Command::Entities(String::from("person")),
            Command::CreateEntity(String::from("person")),
        ] {
            let transport = ScriptedTransport::default()
                .respond(500, page)
                .respond(200, "[[1] [2] [3]]");
            let (outcome, mut session) = run(&transport, command);
            assert_eq!(
                outcome,
                Outcome::Value(Value::string("Problem: Attribute lookup exploded"))
            );
            assert_eq!(transport.requests.borrow().len(), 1);
            assert_eq!(session.take_header(), None);
        }
    }

    #[test]
    fn malformed_queries_fail_before_sending() {
        let transport = ScriptedTransport::default();
        let mut dispatcher = Dispatcher::new(&transport, session());
        let mut input = ReaderInput::new(Cursor::new(Vec::new()));
        let error = dispatcher
            .execute(
                Command::Query(String::from("[:find ?e")),
                &mut input,
                &mut sink(),
                &mut sink(),
            )
            .expect_err("parse failure");
        assert!(matches!(error, DispatchError::Query(QueryError::Parse { .. })));
        assert!(transport.requests.borrow().is_empty());
    }

    #[test]
    fn transport_failures_become_problem_values() {
        let transport = ScriptedTransport::default().fail();
        let (outcome, _) = run(&transport, Command::Storages);
        let Outcome::Value(Value::String(text)) = outcome else {
            panic!("expected a problem string, got {outcome:?}");
        };
        assert!(text.starts_with("Problem: failed to read response"));
    }

    #[test]
    fn namespaces_hide_system_entries() {
        let transport = ScriptedTransport::default().respond(200, "[[:db] [:person] [nil]]");
        let (outcome, _) = run(&transport, Command::Namespaces);
        assert_eq!(
            outcome,
            Outcome::Value(parse("[[:person] [top-level]]").expect("valid rows"))
        );
    }

    #[test]
    fn validation_rejects_non_vector_transactions() {
        let transport = ScriptedTransport::default();
        let mut dispatcher = Dispatcher::new(&transport, session());
        dispatcher.session_mut().set_validate(true);
        let mut input = ReaderInput::new(Cursor::new(Vec::new()));
        let error = dispatcher
            .execute(
                Command::Transact(String::from("{:db/id 1}")),
                &mut input,
                &mut sink(),
                &mut sink(),
            )
            .expect_err("map tx-data must fail");
        assert!(matches!(error, DispatchError::InvalidTransaction { kind: "map" }));
        assert!(transport.requests.borrow().is_empty());
    }

    #[test]
    fn retract_builds_retract_entity_calls() {
        let transport = ScriptedTransport::default().respond(200, "{}");
        run(&transport, Command::Retract(String::from("[17 18]")));
        let request = transport.request(0);
        assert_eq!(request.method, Method::Post);
        assert_eq!(
            request.body,
            Some(format!(
                "tx-data={}",
                api::escape("[[:db.fn/retractEntity 17][:db.fn/retractEntity 18]]")
            ))
        );
    }

    #[test]
    fn create_entity_prompts_for_each_attribute() {
        let transport = ScriptedTransport::default()
            .respond(
                200,
                "[[:person/name :db.type/string :db.cardinality/one] \
                  [:person/active :db.type/boolean :db.cardinality/one]]",
            )
            .respond(200, "{}");
        let mut dispatcher = Dispatcher::new(&transport, session());
        let mut input = ReaderInput::new(Cursor::new(b"Ann\nmaybe\nfalse\n".to_vec()));
        let mut out: Vec<u8> = Vec::new();
        dispatcher
            .execute(
                Command::CreateEntity(String::from("person")),
                &mut input,
                &mut out,
                &mut sink(),
            )
            .expect("entity created");
        assert_eq!(
            String::from_utf8(out).expect("utf8"),
            "Error validating :db.type/boolean\n"
        );
        assert_eq!(
            transport.request(1).body,
            Some(format!(
                "tx-data={}",
                api::escape(
                    "[{:db/id #db/id [:db.part/user -1] :person/name \"Ann\" :person/active false}]"
                )
            ))
        );
    }

    #[test]
    fn settings_report_their_state() {
        let transport = ScriptedTransport::default();
        let (outcome, session) = run(&transport, Command::Format(Some(String::from("json"))));
        assert_eq!(outcome, Outcome::Value(setting_value("format", "json")));
        assert_eq!(session.format(), OutputFormat::Json);

        let (outcome, session) = run(&transport, Command::Verbose(Some(true)));
        assert_eq!(outcome, Outcome::Value(setting_value("verbose", "on")));
        assert!(session.verbose());
    }

    #[test]
    fn events_are_written_as_they_decode() {
        let transport = ScriptedTransport::default()
            .respond(200, "data: [1 2]\n\n:\n\ndata: )\n\ndata: [3]\n\n");
        let mut dispatcher = Dispatcher::new(&transport, session());
        dispatcher.session_mut().set_format(OutputFormat::Edn);
        let mut input = ReaderInput::new(Cursor::new(Vec::new()));
        let mut out: Vec<u8> = Vec::new();
        let outcome = dispatcher
            .execute(Command::Events, &mut input, &mut out, &mut sink())
            .expect("stream ends");
        assert_eq!(outcome, Outcome::Streamed);
        let printed = String::from_utf8(out).expect("utf8");
        let lines: Vec<&str> = printed.lines().collect();
        assert_eq!(lines.first(), Some(&"[1 2]"));
        assert!(lines.get(1).is_some_and(|line| line.starts_with("{:error")));
        assert_eq!(lines.last(), Some(&"[3]"));
        assert_eq!(transport.request(0).url.as_str(), "http://localhost:8001/events/dev/seattle");
    }

    #[test]
    fn verbose_mode_traces_requests() {
        let transport = ScriptedTransport::default().respond(200, "[\"dev\"]");
        let mut dispatcher = Dispatcher::new(&transport, session());
        dispatcher.session_mut().set_verbose(true);
        let mut input = ReaderInput::new(Cursor::new(Vec::new()));
        let mut err: Vec<u8> = Vec::new();
        dispatcher
            .execute(Command::Storages, &mut input, &mut sink(), &mut err)
            .expect("storages");
        assert_eq!(
            String::from_utf8(err).expect("utf8"),
            "URL: http://localhost:8001/data/\nRESPONSE CODE: 200\nDATA: [\"dev\"]\n"
        );
    }
}
