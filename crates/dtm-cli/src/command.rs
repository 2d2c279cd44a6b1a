//! The command table shared by the one-shot CLI and the REPL.
//!
//! Both front ends resolve user input into a [`Command`]. CLI arguments
//! arrive as plain strings; REPL lines arrive as EDN forms whose arguments
//! are printed back to text, so a query typed at the prompt and a query
//! passed on the command line reach the dispatcher in the same shape.

use dtm_edn::{Map, Value};

/// One user request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Command {
    Storages,
    Databases,
    CreateDatabase(String),
    Namespaces,
    Attributes(String),
    Entities(String),
    Entity(String),
    Idents(String),
    CreateIdent(String),
    Fns,
    FnsIn(String),
    Query(String),
    Transact(String),
    Retract(String),
    Datoms(String),
    Events,
    CreateEntity(String),
    CreateAttribute(String),
    Help,
    /// Shows, or with an argument sets, the output format.
    Format(Option<String>),
    Verbose(Option<bool>),
    Validate(Option<bool>),
    Clear,
    Quit,
}

/// What a command name expects after it.
enum Arity {
    None,
    One(&'static str),
    /// REPL settings: shown without an argument, changed with one.
    Setting,
}

fn arity(name: &str) -> Option<Arity> {
    let arity = match name {
        "aliases" | "storages" | "databases" | "namespaces" | "fns" | "events" | "help"
        | "clear" | "quit" | "exit" => Arity::None,
        "create-database" => Arity::One("the database name"),
        "attributes" | "entities" | "idents" | "fns-in" | "create-entity"
        | "create-attribute" => Arity::One("the namespace"),
        "entity" => Arity::One("the entity id or ident"),
        "create-ident" => Arity::One("the ident"),
        "query" => Arity::One("the query"),
        "transact" => Arity::One("the transaction data"),
        "retract" => Arity::One("an entity id or vector of entity ids"),
        "datoms" => Arity::One("the argument map"),
        "format" | "verbose" | "validate" => Arity::Setting,
        _ => return None,
    };
    Some(arity)
}

fn build(name: &str, argument: Option<String>) -> Option<Command> {
    let command = match (name, argument) {
        ("aliases" | "storages", _) => Command::Storages,
        ("databases", _) => Command::Databases,
        ("namespaces", _) => Command::Namespaces,
        ("fns", _) => Command::Fns,
        ("events", _) => Command::Events,
        ("help", _) => Command::Help,
        ("clear", _) => Command::Clear,
        ("quit" | "exit", _) => Command::Quit,
        ("format", argument) => Command::Format(argument),
        ("verbose", argument) => Command::Verbose(argument.map(|text| text == "on")),
        ("validate", argument) => Command::Validate(argument.map(|text| text == "on")),
        (name, Some(argument)) => match name {
            "create-database" => Command::CreateDatabase(argument),
            "attributes" => Command::Attributes(argument),
            "entities" => Command::Entities(argument),
            "entity" => Command::Entity(argument),
            "idents" => Command::Idents(argument),
            "create-ident" => Command::CreateIdent(argument),
            "fns-in" => Command::FnsIn(argument),
            "query" => Command::Query(argument),
            "transact" => Command::Transact(argument),
            "retract" => Command::Retract(argument),
            "datoms" => Command::Datoms(argument),
            "create-entity" => Command::CreateEntity(argument),
            "create-attribute" => Command::CreateAttribute(argument),
            _ => return None,
        },
        (_, None) => return None,
    };
    Some(command)
}

impl Command {
    /// Whether the command reads answers from the operator.
    pub(crate) const fn prompts(&self) -> bool {
        matches!(self, Self::CreateEntity(_) | Self::CreateAttribute(_))
    }

    /// Resolves a REPL line read as a list of forms.
    ///
    /// A leading keyword or integer fetches that entity. Anything the table
    /// does not know yields a `{:does-not-understand …}` value and a wrong
    /// argument count yields an `{:error …}` value, both ready to render.
    pub(crate) fn from_form(forms: &[Value]) -> Result<Self, Value> {
        let not_understood = || does_not_understand(&Value::List(forms.to_vec()));
        let Some((head, arguments)) = forms.split_first() else {
            return Err(not_understood());
        };
        let name = match head {
            Value::Keyword(_) | Value::Int(_) => {
                return Ok(Self::Entity(argument_text(head)));
            }
            Value::Symbol(name) => name.as_str(),
            _ => return Err(not_understood()),
        };
        let Some(expected) = arity(name) else {
            return Err(not_understood());
        };

        let argument = match (expected, arguments) {
            (Arity::None, _) | (Arity::Setting, []) => None,
            (Arity::Setting, [.., last]) => Some(argument_text(last)),
            (Arity::One(_), [only]) => Some(argument_text(only)),
            (Arity::One(what), _) => return Err(arity_error(name, what)),
        };
        build(name, argument).ok_or_else(not_understood)
    }

    /// Resolves a one-shot command from its name and optional argument.
    pub(crate) fn from_cli(name: &str, argument: Option<&str>) -> Result<Self, Value> {
        let form = || {
            let mut forms = vec![Value::symbol(name)];
            forms.extend(argument.map(Value::string));
            Value::List(forms)
        };
        let Some(expected) = arity(name) else {
            return Err(does_not_understand(&form()));
        };
        if let (Arity::One(what), None) = (&expected, argument) {
            return Err(arity_error(name, what));
        }
        build(name, argument.map(str::to_owned)).ok_or_else(|| does_not_understand(&form()))
    }
}

/// Text handed to the dispatcher for one argument form.
///
/// Strings, symbols, keywords and numbers contribute their literal text;
/// collections are printed as EDN.
fn argument_text(form: &Value) -> String {
    form.literal().unwrap_or_else(|| form.to_edn())
}

pub(crate) fn does_not_understand(form: &Value) -> Value {
    Value::Map(Map::from_entries(vec![(
        Value::keyword("does-not-understand"),
        form.clone(),
    )]))
}

fn arity_error(name: &str, what: &str) -> Value {
    Value::Map(Map::from_entries(vec![(
        Value::keyword("error"),
        Value::string(format!("{name} expects one argument - {what}")),
    )]))
}

/// One setting echoed back as `{:<name> <value>}`.
pub(crate) fn setting_value(name: &str, value: &str) -> Value {
    Value::Map(Map::from_entries(vec![(
        Value::keyword(name),
        Value::symbol(value),
    )]))
}

pub(crate) const HELP: &str = "\
commands:
  aliases | storages          list the storage aliases of the REST service
  databases                   list the databases of the alias
  create-database <name>      create a database in the alias
  namespaces                  list the user namespaces of the database
  attributes <ns>             list the attributes of a namespace
  entities <ns>               list every entity holding the attributes of a namespace
  entity <id | ident>         fetch every attribute of one entity
  idents <ns>                 list the idents of a namespace, such as enum values
  create-ident <ident>        install a bare ident
  fns                         list the installed database functions
  fns-in <ns>                 list the database functions of a namespace
  query <query>               run a query; --offset and --limit page the results
  transact <tx-data>          submit transaction data
  retract <id | [ids]>        retract one entity or a vector of entities
  datoms <args>               read raw datoms, e.g. {:index :aevt :a :person/name}
  events                      listen to transaction events of the database
  create-entity <ns>          prompt for the attributes of a new entity
  create-attribute <ns>       prompt for the definition of a new attribute
  help                        this information
repl only:
  format [edn | tbl | json | csv | tsv]
  verbose [on | off]
  validate [on | off]
  clear
  quit | exit
a keyword or entity id on its own fetches that entity.
";
