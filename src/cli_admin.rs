use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

mod cli_style;

use cli_style::get_styles;
use rally_server::user::{SqliteUserStore, UserManager, UserRole};

use rustyline::{
    completion::Completer, highlight::Highlighter, history::FileHistory, validate::Validator,
    CompletionType, Config, Editor, Helper,
};

const USER_DB_FILE_NAME: &str = "user.db";

fn parse_path(s: &str) -> Result<PathBuf> {
    let original_path = PathBuf::from(s);
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
#[command(styles=get_styles())]
struct CliArgs {
    /// The server's db directory, or the user database file itself.
    #[clap(value_parser = parse_path)]
    pub path: PathBuf,
}

#[derive(Parser)]
#[command(styles=get_styles(),name = "")]
struct InnerCli {
    #[command(subcommand)]
    command: InnerCommand,
}

#[derive(Subcommand)]
enum InnerCommand {
    /// Creates a staff user with the given handle.
    AddUser { user_handle: String },

    /// Creates a password for the given user.
    /// Fails if the user already has a password set.
    AddLogin {
        user_handle: String,
        password: String,
    },

    /// Change the password of a user, fails if no password was set.
    UpdateLogin {
        user_handle: String,
        password: String,
    },

    /// Deletes the password of a given user, they won't be able to log in anymore.
    DeleteLogin { user_handle: String },

    /// Shows roles, permissions and login information of a given user.
    Show { user_handle: String },

    /// Verifies the password of a given user without logging in.
    CheckPassword {
        user_handle: String,
        password: String,
    },

    /// Shows all user handles.
    UserHandles,

    /// Shows all available roles and their permissions.
    ListRoles,

    /// Adds a role (admin, organizer) to a user.
    AddRole { user_handle: String, role: String },

    /// Removes a role from a user.
    RemoveRole { user_handle: String, role: String },

    /// Deletes session tokens not used in the given number of days.
    PruneTokens { days: u64 },

    /// Shows the path of the current user db.
    Where,

    /// Close this program.
    Exit,
}

enum CommandExecutionResult {
    Ok,
    Exit,
    Error(String),
}

const PROMPT: &str = ">> ";

fn format_time(time: Option<SystemTime>) -> String {
    match time.and_then(|t| t.duration_since(UNIX_EPOCH).ok()) {
        Some(duration) => chrono::DateTime::from_timestamp(duration.as_secs() as i64, 0)
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "?".to_string()),
        None => "never".to_string(),
    }
}

fn parse_role(role: &str) -> Result<UserRole, String> {
    UserRole::from_str(role).ok_or_else(|| {
        format!(
            "Unknown role {}, available roles: {}, {}",
            role,
            UserRole::Admin,
            UserRole::Organizer
        )
    })
}

fn require_user_id(user_manager: &UserManager, user_handle: &str) -> Result<usize, String> {
    match user_manager.get_user_id(user_handle) {
        Ok(Some(id)) => Ok(id),
        Ok(None) => Err(format!("User {} not found.", user_handle)),
        Err(err) => Err(format!("Could not load user {}: {}", user_handle, err)),
    }
}

fn show_user(user_manager: &UserManager, user_handle: &str) -> Result<(), String> {
    let user_id = require_user_id(user_manager, user_handle)?;
    let roles = user_manager
        .get_user_roles(user_id)
        .map_err(|e| e.to_string())?;
    let permissions = user_manager
        .get_user_permissions(user_id)
        .map_err(|e| e.to_string())?;
    let credentials = user_manager
        .get_user_credentials(user_handle)
        .map_err(|e| e.to_string())?;
    let tokens = user_manager
        .get_user_tokens(user_handle)
        .map_err(|e| e.to_string())?;

    println!("User {} (id {})", user_handle, user_id);
    println!("  Roles: {:?}", roles);
    println!("  Permissions: {:?}", permissions);
    match credentials.and_then(|c| c.username_password) {
        Some(password) => println!(
            "  Password: set with {}, last login {}",
            password.hasher,
            format_time(password.last_used)
        ),
        None => println!("  Password: not set"),
    }
    println!("  Session tokens: {}", tokens.len());
    for token in tokens {
        println!(
            "    created {}, last used {}",
            format_time(Some(token.created)),
            format_time(token.last_used)
        );
    }
    Ok(())
}

fn execute_command(
    line: String,
    user_manager: &UserManager,
    db_path: &str,
) -> CommandExecutionResult {
    if line.trim().is_empty() {
        return CommandExecutionResult::Ok;
    }

    let args =
        shlex::split(&line).unwrap_or_else(|| line.split_whitespace().map(String::from).collect());

    let cli = InnerCli::try_parse_from(std::iter::once(" ").chain(args.iter().map(String::as_str)));

    let result: Result<(), String> = match cli {
        Ok(cli) => match cli.command {
            InnerCommand::AddUser { user_handle } => user_manager
                .add_user(&user_handle)
                .map(|id| println!("Created user {} with id {}", user_handle, id))
                .map_err(|e| e.to_string()),
            InnerCommand::AddLogin {
                user_handle,
                password,
            } => user_manager
                .create_password_credentials(&user_handle, &password)
                .map_err(|e| e.to_string()),
            InnerCommand::UpdateLogin {
                user_handle,
                password,
            } => user_manager
                .update_password_credentials(&user_handle, &password)
                .map_err(|e| e.to_string()),
            InnerCommand::DeleteLogin { user_handle } => user_manager
                .delete_password_credentials(&user_handle)
                .map_err(|e| e.to_string()),
            InnerCommand::Show { user_handle } => show_user(user_manager, &user_handle),
            InnerCommand::CheckPassword {
                user_handle,
                password,
            } => match user_manager.get_user_credentials(&user_handle) {
                Ok(Some(credentials)) => match credentials.username_password {
                    Some(password_credentials) => {
                        match password_credentials
                            .hasher
                            .verify(&password, &password_credentials.hash)
                        {
                            Ok(true) => {
                                println!("The password provided is correct!");
                                Ok(())
                            }
                            Ok(false) => {
                                println!("Wrong password.");
                                Ok(())
                            }
                            Err(err) => Err(format!("Could not verify the password: {}", err)),
                        }
                    }
                    None => Err(format!("User {} has no password set.", user_handle)),
                },
                Ok(None) => Err(format!("User {} not found.", user_handle)),
                Err(err) => Err(err.to_string()),
            },
            InnerCommand::UserHandles => user_manager
                .get_all_user_handles()
                .map(|handles| {
                    for handle in handles {
                        println!("{}", handle);
                    }
                })
                .map_err(|e| e.to_string()),
            InnerCommand::ListRoles => {
                for role in [UserRole::Admin, UserRole::Organizer] {
                    println!("{}: {:?}", role, role.permissions());
                }
                Ok(())
            }
            InnerCommand::AddRole { user_handle, role } => parse_role(&role).and_then(|role| {
                let user_id = require_user_id(user_manager, &user_handle)?;
                user_manager
                    .add_user_role(user_id, role)
                    .map_err(|e| e.to_string())
            }),
            InnerCommand::RemoveRole { user_handle, role } => parse_role(&role).and_then(|role| {
                let user_id = require_user_id(user_manager, &user_handle)?;
                user_manager
                    .remove_user_role(user_id, role)
                    .map_err(|e| e.to_string())
            }),
            InnerCommand::PruneTokens { days } => user_manager
                .prune_unused_auth_tokens(days)
                .map(|count| println!("Deleted {} tokens.", count))
                .map_err(|e| e.to_string()),
            InnerCommand::Where => {
                println!("{}", db_path);
                Ok(())
            }
            InnerCommand::Exit => return CommandExecutionResult::Exit,
        },
        Err(e) => {
            if e.print().is_err() {
                println!("{}", e);
            }
            Ok(())
        }
    };

    match result {
        Ok(()) => CommandExecutionResult::Ok,
        Err(err) => CommandExecutionResult::Error(err),
    }
}

#[derive(rustyline_derive::Hinter)]
struct AdminHelper {
    commands_names: Vec<String>,
}

impl AdminHelper {
    pub fn new() -> Self {
        let commands_names: Vec<String> = InnerCli::command()
            .get_subcommands()
            .map(|sc| sc.get_name().to_string())
            .collect();

        AdminHelper { commands_names }
    }
}

impl Completer for AdminHelper {
    type Candidate = String;

    fn complete(
        &self,
        line: &str,
        _pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<String>)> {
        if line.contains(' ') {
            return Ok((0, Vec::with_capacity(0)));
        }
        let matches = self
            .commands_names
            .iter()
            .filter(|c| c.starts_with(line))
            .cloned()
            .collect::<Vec<_>>();

        Ok((0, matches))
    }
}

impl Highlighter for AdminHelper {}
impl Validator for AdminHelper {}
impl Helper for AdminHelper {}

fn main() -> Result<()> {
    let cli_args = CliArgs::parse();
    let db_path = if cli_args.path.is_dir() {
        cli_args.path.join(USER_DB_FILE_NAME)
    } else {
        cli_args.path
    };
    let user_store = SqliteUserStore::new(&db_path)
        .with_context(|| format!("Could not open user db at {:?}", db_path))?;
    let user_manager = UserManager::new(Box::new(user_store));

    InnerCli::command().print_long_help()?;

    let config = Config::builder()
        .completion_type(CompletionType::List)
        .build();

    let mut rl = Editor::<AdminHelper, FileHistory>::with_config(config)?;
    rl.set_helper(Some(AdminHelper::new()));

    let db_path = db_path.display().to_string();
    loop {
        match rl.readline(PROMPT) {
            Ok(line) => {
                let _ = rl.add_history_entry(&line);
                match execute_command(line, &user_manager, &db_path) {
                    CommandExecutionResult::Ok => {}
                    CommandExecutionResult::Exit => break,
                    CommandExecutionResult::Error(err) => {
                        eprintln!("Error: {}", err);
                    }
                }
            }
            Err(rustyline::error::ReadlineError::Interrupted) => {
                println!("CTRL-C");
                break;
            }
            Err(rustyline::error::ReadlineError::Eof) => {
                println!("CTRL-D: exiting.");
                break;
            }
            Err(e) => {
                println!("Error: {:?}", e);
                break;
            }
        }
    }
    Ok(())
}
