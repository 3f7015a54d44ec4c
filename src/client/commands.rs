//! Parses a line of user input into a [`ChatCommand`], mirroring the
//! original client's `ui_handler`/`parse_*_command` dispatch: the first
//! whitespace-delimited token (lowercased) selects the command, and each
//! command has its own usage grammar for the remainder of the line.

const MAX_MESSAGE_LEN: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    List,
    Login { name: String, password: String },
    Logout,
    Register { name: String, password: String },
    Send { message: String, anonymous: bool },
    SendPrivate { recipient: String, message: String, anonymous: bool },
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    Unknown(String),
    Usage { command: &'static str, usage: &'static str },
    MessageTooLong { label: &'static str },
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandError::Unknown(cmd) => write!(f, "Unknown command \"{cmd}\""),
            CommandError::Usage { command, usage } => {
                write!(f, "Invalid use of \"{command}\" command - Usage: {usage}")
            }
            CommandError::MessageTooLong { label } => write!(
                f,
                "{label} error - Invalid message length (message must be between 1 and 4096 characters)"
            ),
        }
    }
}

pub fn parse_line(input_line: &str) -> Result<ChatCommand, CommandError> {
    let command_end = input_line.find(' ').unwrap_or(input_line.len());
    let command = input_line[..command_end].to_ascii_lowercase();

    match command.as_str() {
        "list" => parse_no_args(&command, input_line, ChatCommand::List),
        "logout" => parse_no_args(&command, input_line, ChatCommand::Logout),
        "quit" => {
            if input_line.len() > command.len() {
                Err(usage_error("quit", "quit"))
            } else {
                Ok(ChatCommand::Quit)
            }
        }
        "login" => parse_two_args(&command, input_line, "login name password", |name, password| {
            ChatCommand::Login { name, password }
        }),
        "register" => {
            parse_two_args(&command, input_line, "register name password", |name, password| {
                ChatCommand::Register { name, password }
            })
        }
        "send" => parse_message_arg(&command, input_line, "send", false),
        "senda" => parse_message_arg(&command, input_line, "senda", true),
        "sendpriv" => parse_private_arg(&command, input_line, "sendpriv", false),
        "sendpriva" => parse_private_arg(&command, input_line, "sendpriva", true),
        _ => Err(CommandError::Unknown(command)),
    }
}

fn usage_error(command: &'static str, usage: &'static str) -> CommandError {
    CommandError::Usage { command, usage }
}

fn parse_no_args(command: &str, input_line: &str, ok: ChatCommand) -> Result<ChatCommand, CommandError> {
    if input_line.len() != command.len() {
        let name: &'static str = match command {
            "list" => "list",
            "logout" => "logout",
            _ => unreachable!(),
        };
        Err(usage_error(name, name))
    } else {
        Ok(ok)
    }
}

fn parse_two_args(
    command: &str,
    input_line: &str,
    usage: &'static str,
    build: impl FnOnce(String, String) -> ChatCommand,
) -> Result<ChatCommand, CommandError> {
    let name: &'static str = if command == "login" { "login" } else { "register" };
    if input_line.len() == command.len() {
        return Err(usage_error(name, usage));
    }

    let rest = &input_line[command.len() + 1..];
    let parts: Vec<&str> = rest.split(' ').collect();
    if parts.len() != 2 {
        return Err(usage_error(name, usage));
    }

    Ok(build(parts[0].to_string(), parts[1].to_string()))
}

fn parse_message_arg(
    command: &str,
    input_line: &str,
    name: &'static str,
    anonymous: bool,
) -> Result<ChatCommand, CommandError> {
    if input_line.len() <= command.len() + 1 {
        let usage: &'static str = if anonymous { "senda message" } else { "send message" };
        return Err(usage_error(name, usage));
    }

    let message = input_line[command.len() + 1..].to_string();
    if message.len() > MAX_MESSAGE_LEN {
        let label = if anonymous { "Send anonymous message" } else { "Send message" };
        return Err(CommandError::MessageTooLong { label });
    }

    Ok(ChatCommand::Send { message, anonymous })
}

fn parse_private_arg(
    command: &str,
    input_line: &str,
    name: &'static str,
    anonymous: bool,
) -> Result<ChatCommand, CommandError> {
    let usage: &'static str = if anonymous { "sendpriva name message" } else { "sendpriv name message" };

    if input_line.len() == command.len() {
        return Err(usage_error(name, usage));
    }

    let rest = &input_line[command.len() + 1..];
    let mut parts = rest.splitn(2, ' ');
    let recipient = parts.next().unwrap_or("");
    let message = match parts.next() {
        None => return Err(usage_error(name, usage)),
        Some("") => return Err(usage_error(name, usage)),
        Some(m) => m,
    };

    if message.len() > MAX_MESSAGE_LEN {
        return Err(CommandError::MessageTooLong { label: "Send private message" });
    }

    Ok(ChatCommand::SendPrivate {
        recipient: recipient.to_string(),
        message: message.to_string(),
        anonymous,
    })
}
