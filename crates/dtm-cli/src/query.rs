//! Query and transaction text synthesis.
//!
//! Schema-driven commands never carry hand-written queries: the text sent to
//! the service is assembled here from namespace names and from attribute
//! rows discovered at runtime. The same module derives the column header for
//! a query's result from its `:find` clause.

use std::fmt::Write as _;

use dtm_edn::{EdnError, Value, parse};
use thiserror::Error;

/// Errors raised while reading query or transaction text.
#[derive(Debug, Clone, PartialEq, Error)]
pub(crate) enum QueryError {
    /// The query text is not valid EDN.
    #[error("could not parse query: {source}")]
    Parse {
        /// Reader diagnostic.
        #[source]
        source: EdnError,
    },
    /// A retraction target was neither an entity id nor a vector of ids.
    #[error("retract expects an entity id or a vector of entity ids, found {kind}")]
    RetractTarget {
        /// Kind of the rejected value.
        kind: &'static str,
    },
}

/// One row of the attribute listing for a namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AttributeDescriptor {
    /// Attribute ident, for example `:person/name`.
    pub(crate) ident: String,
    /// Value type ident, for example `:db.type/string`.
    pub(crate) value_type: String,
    /// Cardinality ident, for example `:db.cardinality/one`.
    pub(crate) cardinality: String,
}

impl AttributeDescriptor {
    /// Reads descriptors from the rows returned by [`attributes_query`].
    ///
    /// Rows that do not hold three scalars are skipped.
    pub(crate) fn from_rows(result: &Value) -> Vec<Self> {
        let Some(rows) = result.elements() else {
            return Vec::new();
        };
        rows.iter()
            .filter_map(|row| match row.elements()? {
                [ident, value_type, cardinality, ..] => Some(Self {
                    ident: ident.literal()?,
                    value_type: value_type.literal()?,
                    cardinality: cardinality.literal()?,
                }),
                _ => None,
            })
            .collect()
    }
}

/// Strips one leading `:` from a namespace token.
pub(crate) fn just_namespace(token: &str) -> &str {
    token.strip_prefix(':').unwrap_or(token)
}

/// Query variable bound to an attribute: `:person/first.name` becomes
/// `?person-first-name`.
pub(crate) fn query_variable(ident: &str) -> String {
    let name = ident.strip_prefix(':').unwrap_or(ident);
    let mut variable = String::with_capacity(name.len() + 1);
    variable.push('?');
    variable.extend(
        name.chars()
            .map(|current| if matches!(current, '/' | '.') { '-' } else { current }),
    );
    variable
}

/// Lists every namespace that owns an ident.
pub(crate) fn namespaces_query() -> String {
    String::from(
        "[:find ?ns :where [_ :db/ident ?name] [(namespace ?name) ?n] [(keyword ?n) ?ns]]",
    )
}

/// Lists ident, value type and cardinality of every attribute in `namespace`.
pub(crate) fn attributes_query(namespace: &str) -> String {
    format!(
        "[:find ?ident ?valueType ?cardinality \
         :where [?e :db/ident ?ident] \
         [(namespace ?ident) ?ns] \
         [(= ?ns {ns})] \
         [?e :db/valueType ?v] \
         [?v :db/ident ?valueType] \
         [?e :db/cardinality ?c] \
         [?c :db/ident ?cardinality]]",
        ns = Value::string(just_namespace(namespace)).to_edn()
    )
}

/// Lists every ident in `namespace`, such as enum members.
pub(crate) fn idents_query(namespace: &str) -> String {
    format!(
        "[:find ?ident :where [_ :db/ident ?ident] [(namespace ?ident) ?ns] [(= ?ns {ns})]]",
        ns = Value::string(just_namespace(namespace)).to_edn()
    )
}

/// Lists every installed database function.
pub(crate) fn fns_query() -> String {
    String::from("[:find ?fn :where [?f :db/fn _] [?f :db/ident ?fn]]")
}

/// Lists the database functions whose ident lives in `namespace`.
pub(crate) fn fns_in_query(namespace: &str) -> String {
    format!(
        "[:find ?fn :where [?f :db/fn _] [?f :db/ident ?fn] [(namespace ?fn) ?ns] [(= ?ns {ns})]]",
        ns = Value::string(just_namespace(namespace)).to_edn()
    )
}

/// Finds every entity holding all of `idents`, one variable per attribute.
///
/// An empty attribute list yields `[:find ?db-id :where]`, which the service
/// accepts.
pub(crate) fn entities_query<'a, I>(idents: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut find = String::from("[:find ?db-id");
    let mut clauses = String::from(" :where");
    for ident in idents {
        let variable = query_variable(ident);
        let _ = write!(find, " {variable}");
        let _ = write!(clauses, " [?db-id {ident} {variable}]");
    }
    find.push_str(&clauses);
    find.push(']');
    find
}

/// Column names for the result of `query`, taken from its `:find` clause.
///
/// Each projected term up to the next keyword becomes one header cell, printed
/// as EDN with newlines removed. Map-form queries use their `:find` vector.
pub(crate) fn query_header(query: &str) -> Result<Vec<String>, QueryError> {
    let parsed = parse(query).map_err(|source| QueryError::Parse { source })?;
    let terms: &[Value] = match &parsed {
        Value::Map(map) => map
            .get(":find")
            .and_then(Value::elements)
            .unwrap_or_default(),
        other => other.elements().unwrap_or_default(),
    };

    let mut header = Vec::new();
    let mut started = false;
    for term in terms {
        if let Value::Keyword(keyword) = term {
            if keyword == ":find" && !started {
                started = true;
                continue;
            }
            break;
        }
        started = true;
        header.push(term.to_edn().replace('\n', ""));
    }
    Ok(header)
}

/// Post-processes the namespace listing.
///
/// System namespaces (`:db`, `:db.*`, `:fressian`) are dropped and a missing
/// namespace is shown as `top-level`.
pub(crate) fn namespace_rows(result: &Value) -> Value {
    let rows = result
        .elements()
        .unwrap_or_default()
        .iter()
        .filter_map(|row| {
            let namespace = row.elements()?.first()?;
            match namespace {
                Value::Nil => Some(Value::Vector(vec![Value::symbol("top-level")])),
                Value::Keyword(name) if is_system_namespace(name) => None,
                other => Some(Value::Vector(vec![other.clone()])),
            }
        })
        .collect();
    Value::Vector(rows)
}

fn is_system_namespace(name: &str) -> bool {
    name == ":db" || name == ":fressian" || name.starts_with(":db.")
}

/// Installs a bare ident such as an enum member.
pub(crate) fn create_ident_tx(ident: &str) -> String {
    format!(
        "[{{:db/id #db/id [:db.part/db] :db/ident {}}}]",
        Value::keyword(ident.trim())
    )
}

/// Retracts one entity or every entity in a vector of ids.
pub(crate) fn retract_entities_tx(target: &Value) -> Result<String, QueryError> {
    let ids: Vec<&Value> = match target {
        Value::Int(_) | Value::Keyword(_) => vec![target],
        Value::Vector(items) | Value::List(items) => {
            if let Some(bad) = items
                .iter()
                .find(|item| !matches!(item, Value::Int(_) | Value::Keyword(_)))
            {
                return Err(QueryError::RetractTarget { kind: bad.kind() });
            }
            items.iter().collect()
        }
        other => return Err(QueryError::RetractTarget { kind: other.kind() }),
    };

    let mut tx = String::from("[");
    for id in ids {
        let _ = write!(tx, "[:db.fn/retractEntity {id}]");
    }
    tx.push(']');
    Ok(tx)
}

/// Creates a new user entity from `(attribute ident, EDN value text)` pairs.
pub(crate) fn entity_tx(values: &[(String, String)]) -> String {
    let mut tx = String::from("[{:db/id #db/id [:db.part/user -1]");
    for (ident, value) in values {
        let _ = write!(tx, " {ident} {value}");
    }
    tx.push_str("}]");
    tx
}

/// Installs a new attribute.
pub(crate) fn attribute_tx(attribute: &AttributeDescriptor, doc: Option<&str>) -> String {
    let mut tx = format!(
        "[{{:db/id #db/id [:db.part/db] :db/ident {} :db/valueType {} :db/cardinality {}",
        attribute.ident, attribute.value_type, attribute.cardinality
    );
    if let Some(doc) = doc.filter(|text| !text.is_empty()) {
        let _ = write!(tx, " :db/doc {}", Value::string(doc));
    }
    tx.push_str(" :db.install/_attribute :db.part/db}]");
    tx
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("person", "person")]
    #[case(":person", "person")]
    #[case("::person", ":person")]
    fn strips_single_namespace_marker(#[case] token: &str, #[case] expected: &str) {
        assert_eq!(just_namespace(token), expected);
    }

    #[rstest]
    #[case(":person/name", "?person-name")]
    #[case(":person.address/street", "?person-address-street")]
    #[case("order/id", "?order-id")]
    fn derives_query_variables(#[case] ident: &str, #[case] expected: &str) {
        assert_eq!(query_variable(ident), expected);
    }

    #[test]
    fn attribute_listing_quotes_namespace() {
        let query = attributes_query(":person");
        assert!(query.starts_with("[:find ?ident ?valueType ?cardinality :where"));
        assert!(query.contains("[(= ?ns \"person\")]"));
        parse(&query).expect("synthesised query is valid EDN");
    }

    #[test]
    fn entities_query_binds_one_variable_per_attribute() {
        let query = entities_query([":person/name", ":person/age"]);
        assert_eq!(
            query,
            "[:find ?db-id ?person-name ?person-age :where \
             [?db-id :person/name ?person-name] [?db-id :person/age ?person-age]]"
        );
        assert_eq!(
            query_header(&query).expect("header"),
            vec!["?db-id", "?person-name", "?person-age"]
        );
    }

    #[test]
    fn entities_query_counts_variables_and_clauses() {
        let idents = [":a/one", ":a/two", ":a/three", ":a/four"];
        let query = entities_query(idents);
        let parsed = parse(&query).expect("valid query");
        let items = parsed.elements().expect("vector query");
        let clauses: Vec<&Value> = items
            .iter()
            .skip_while(|item| **item != Value::keyword("where"))
            .skip(1)
            .collect();
        assert_eq!(clauses.len(), idents.len());
        for (ident, clause) in idents.iter().zip(clauses) {
            let parts = clause.elements().expect("clause vector");
            assert_eq!(parts.get(1), Some(&Value::keyword(ident)));
            assert_eq!(parts.get(2), Some(&Value::symbol(query_variable(ident))));
        }
        assert_eq!(query_header(&query).expect("header").len(), idents.len() + 1);
    }

    #[test]
    fn empty_attribute_list_degenerates() {
        let none: [&str; 0] = [];
        assert_eq!(entities_query(none), "[:find ?db-id :where]");
    }

    #[test]
    fn header_ignores_layout() {
        let header = query_header("[:find\n  ?a\n\t?b ?c\n :where [?a :x/y ?b] [?b :x/z ?c]]")
            .expect("header");
        assert_eq!(header, vec!["?a", "?b", "?c"]);
    }

    #[test]
    fn header_prints_compound_terms() {
        let header =
            query_header("[:find (pull ?e [:person/name]) (count ?n) :in $ :where [?e _ ?n]]")
                .expect("header");
        assert_eq!(header, vec!["(pull ?e [:person/name])", "(count ?n)"]);
    }

    #[test]
    fn header_reads_map_queries() {
        let header = query_header("{:find [?e ?n] :where [[?e :person/name ?n]]}").expect("header");
        assert_eq!(header, vec!["?e", "?n"]);
    }

    #[test]
    fn malformed_query_is_rejected() {
        let error = query_header("[:find ?e :where [?e").expect_err("unterminated query");
        assert!(matches!(error, QueryError::Parse { .. }));
    }

    #[test]
    fn namespace_rows_hide_system_namespaces() {
        let result = parse("[[:db] [:db.type] [:fressian] [:person] [nil] [:order]]")
            .expect("valid rows");
        assert_eq!(
            namespace_rows(&result),
            parse("[[:person] [top-level] [:order]]").expect("expected rows")
        );
    }

    #[test]
    fn attribute_rows_become_descriptors() {
        let rows = parse(
            "[[:person/name :db.type/string :db.cardinality/one] \
              [:person/age :db.type/long :db.cardinality/one] [:broken]]",
        )
        .expect("valid rows");
        let descriptors = AttributeDescriptor::from_rows(&rows);
        assert_eq!(descriptors.len(), 2);
        assert_eq!(descriptors[0].ident, ":person/name");
        assert_eq!(descriptors[1].value_type, ":db.type/long");
    }

    #[test]
    fn create_ident_adds_missing_colon() {
        assert_eq!(
            create_ident_tx("color/red"),
            "[{:db/id #db/id [:db.part/db] :db/ident :color/red}]"
        );
    }

    #[test]
    fn retracts_each_id_in_a_vector() {
        let ids = parse("[17 18]").expect("valid ids");
        assert_eq!(
            retract_entities_tx(&ids).expect("retraction"),
            "[[:db.fn/retractEntity 17][:db.fn/retractEntity 18]]"
        );
        assert_eq!(
            retract_entities_tx(&Value::Int(5)).expect("retraction"),
            "[[:db.fn/retractEntity 5]]"
        );
    }

    #[test]
    fn rejects_non_id_retraction_targets() {
        let error = retract_entities_tx(&parse("[1 \"two\"]").expect("valid"))
            .expect_err("string id must fail");
        assert_eq!(error, QueryError::RetractTarget { kind: "string" });
    }

    #[test]
    fn entity_tx_lists_each_attribute() {
        let tx = entity_tx(&[
            (String::from(":person/name"), String::from("\"Ann\"")),
            (String::from(":person/age"), String::from("30")),
        ]);
        assert_eq!(
            tx,
            "[{:db/id #db/id [:db.part/user -1] :person/name \"Ann\" :person/age 30}]"
        );
        parse(&tx).expect("transaction is valid EDN");
    }

    #[test]
    fn attribute_tx_installs_attribute() {
        let attribute = AttributeDescriptor {
            ident: String::from(":person/email"),
            value_type: String::from(":db.type/string"),
            cardinality: String::from(":db.cardinality/one"),
        };
        let tx = attribute_tx(&attribute, Some("Primary \"email\""));
        assert!(tx.contains(":db/doc \"Primary \\\"email\\\"\""));
        assert!(tx.ends_with(":db.install/_attribute :db.part/db}]"));
        parse(&tx).expect("transaction is valid EDN");
    }
}
