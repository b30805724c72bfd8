//! Line parsing for interactive mode.

/// One parsed REPL line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Call {
        service: String,
        method: String,
        params: String,
    },
    Methods(String),
    List,
    Help,
    Quit,
    Empty,
    Unknown(String),
}

impl ReplCommand {
    /// Parse a line. Params after the method are re-joined with single spaces.
    pub fn parse(line: &str) -> Self {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some(first) = parts.first() else {
            return ReplCommand::Empty;
        };

        match (first.to_lowercase().as_str(), parts.len()) {
            ("quit" | "exit", _) => ReplCommand::Quit,
            ("help" | "?", _) => ReplCommand::Help,
            ("list", _) => ReplCommand::List,
            ("methods", n) if n >= 2 => ReplCommand::Methods(parts[1].to_string()),
            ("call", n) if n >= 3 => ReplCommand::Call {
                service: parts[1].to_string(),
                method: parts[2].to_string(),
                params: parts[3..].join(" "),
            },
            _ => ReplCommand::Unknown(line.trim().to_string()),
        }
    }
}

/// Services this client knows about. The registry has no discovery call.
pub const KNOWN_SERVICES: &[(&str, &str, &[&str])] = &[(
    "calc",
    "Calculator (basic arithmetic)",
    &["add", "subtract", "multiply", "divide", "info"],
)];

pub const HELP: &str = "\
Commands:
  call <service> <method> [params..]   call a method through the registry
  methods <service>                    show a service's info and methods
  list                                 list known services
  help                                 show this help
  quit | exit                          leave

Examples:
  call calc add 10 5
  call calc divide 20 4
  methods calc";
