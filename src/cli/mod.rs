//! Command-line interface.
//!
//! Without a subcommand the binary runs the API server. Subcommands act as
//! a client of a running server:
//! - `login` / `register` / `logout` / `whoami` - session management
//! - `travel ...` - list, create, edit and review travel requests
//! - `users ...` - admin user management
//! - `config check` - validate the configuration file

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use crate::client::{
    views, ApiClient, FileStorage, GuardOutcome, SessionHolder, SortDirection, SortKey,
    StatusFilter, TravelQuery,
};
use crate::config::Config;
use crate::db::{
    CreateTravelRequest, RegisterRequest, Travel, UpdateTravelRequest, UpdateUserStatusRequest,
    UserSummary, UserType,
};

/// CLI arguments structure
#[derive(Parser, Debug)]
#[command(name = "travel-booking")]
#[command(author, version, about = "Travel request booking server and client", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "travel-booking.toml")]
    pub config: PathBuf,

    /// Override log level
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// API URL to connect to
    #[arg(long, env = "TRAVEL_API_URL", default_value = "http://localhost:5000")]
    pub api_url: String,

    /// File holding the signed-in session between invocations
    #[arg(long, env = "TRAVEL_SESSION_FILE", default_value = ".travel-session.json")]
    pub session_file: PathBuf,

    /// Subcommand to run (if none, starts the server)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sign in and store the session
    Login {
        email: String,
        /// Password (can also be set via TRAVEL_PASSWORD)
        #[arg(long, env = "TRAVEL_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Create an account and sign in as it
    Register {
        email: String,
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        /// Password (can also be set via TRAVEL_PASSWORD)
        #[arg(long, env = "TRAVEL_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Forget the stored session
    Logout,

    /// Show the signed-in user
    Whoami,

    /// Travel request commands
    #[command(subcommand)]
    Travel(TravelCommands),

    /// User management commands (admin)
    #[command(subcommand)]
    Users(UsersCommands),

    /// Configuration management commands
    #[command(subcommand)]
    Config(ConfigCommands),
}

/// Travel subcommands
#[derive(Subcommand, Debug)]
pub enum TravelCommands {
    /// List travel requests
    List {
        /// all, pending, approved, rejected or cancelled
        #[arg(long, default_value = "all")]
        status: StatusFilter,
        /// destination, start-date, end-date, status, cost or created
        #[arg(long, default_value = "created")]
        sort: SortKey,
        /// Sort ascending instead of descending
        #[arg(long)]
        asc: bool,
        /// Show at most this many rows
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show one travel request
    Show { id: i64 },
    /// Create a travel request
    Create {
        #[arg(long)]
        destination: String,
        /// YYYY-MM-DD or RFC 3339
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: String,
        #[arg(long)]
        purpose: String,
        #[arg(long)]
        cost: f64,
        #[arg(long)]
        comments: Option<String>,
    },
    /// Edit a pending travel request
    Update {
        id: i64,
        #[arg(long)]
        destination: Option<String>,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
        #[arg(long)]
        purpose: Option<String>,
        #[arg(long)]
        cost: Option<f64>,
        #[arg(long)]
        comments: Option<String>,
    },
    /// Delete a travel request
    Delete { id: i64 },
    /// Approve a pending request (admin)
    Approve {
        id: i64,
        #[arg(long)]
        comments: Option<String>,
    },
    /// Reject a pending request (admin)
    Reject {
        id: i64,
        #[arg(long)]
        comments: Option<String>,
    },
    /// Cancel a pending request (admin)
    Cancel {
        id: i64,
        #[arg(long)]
        comments: Option<String>,
    },
    /// Dashboard summary with the most recent requests
    Stats,
}

/// Users subcommands
#[derive(Subcommand, Debug)]
pub enum UsersCommands {
    /// List all users
    List,
    /// Show one user
    Show { id: i64 },
    /// Change a user's role and active flag
    SetStatus {
        id: i64,
        /// regular or admin
        #[arg(long)]
        user_type: UserType,
        /// true to enable the account, false to disable it
        #[arg(long, action = clap::ArgAction::Set)]
        active: bool,
    },
    /// Create another admin account
    CreateAdmin {
        email: String,
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long, env = "TRAVEL_PASSWORD", hide_env_values = true)]
        password: String,
    },
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Validate configuration file
    Check,
}

/// Build a client whose session lives in the configured session file
fn create_client(cli: &Cli) -> Result<ApiClient> {
    let storage = Arc::new(FileStorage::new(&cli.session_file));
    let session = Arc::new(SessionHolder::restore(storage));
    ApiClient::new(&cli.api_url, session).context("Failed to create HTTP client")
}

/// Bail out unless the stored session passes the given guard
fn require(outcome: GuardOutcome) -> Result<()> {
    match outcome {
        GuardOutcome::Allow => Ok(()),
        GuardOutcome::RedirectToLogin => {
            anyhow::bail!("Not signed in. Run 'travel-booking login <email>' first.")
        }
        GuardOutcome::RedirectHome => {
            anyhow::bail!("This command requires an administrator account.")
        }
    }
}

fn require_login(client: &ApiClient) -> Result<()> {
    require(client.session().require_authenticated())
}

fn require_admin(client: &ApiClient) -> Result<()> {
    require(client.session().require_admin())
}

/// Run a CLI command
pub async fn run_command(cli: &Cli) -> Result<()> {
    match &cli.command {
        Some(Commands::Login { email, password }) => cmd_login(cli, email, password).await,
        Some(Commands::Register {
            email,
            first_name,
            last_name,
            password,
        }) => {
            let request = RegisterRequest {
                email: email.clone(),
                password: password.clone(),
                first_name: first_name.clone(),
                last_name: last_name.clone(),
                user_type: None,
            };
            cmd_register(cli, &request).await
        }
        Some(Commands::Logout) => cmd_logout(cli),
        Some(Commands::Whoami) => cmd_whoami(cli),
        Some(Commands::Travel(command)) => cmd_travel(cli, command).await,
        Some(Commands::Users(command)) => cmd_users(cli, command).await,
        Some(Commands::Config(ConfigCommands::Check)) => cmd_config_check(cli),
        None => {
            // No subcommand means start the server - this is handled in main.rs
            Ok(())
        }
    }
}

async fn cmd_login(cli: &Cli, email: &str, password: &str) -> Result<()> {
    let client = create_client(cli)?;
    let user = client.login(email, password).await?;

    println!("[OK] Signed in as {} ({})", user.email, user.role);
    Ok(())
}

async fn cmd_register(cli: &Cli, request: &RegisterRequest) -> Result<()> {
    let client = create_client(cli)?;
    let user = client.register(request).await?;

    println!("[OK] Account created. Signed in as {} ({})", user.email, user.role);
    Ok(())
}

fn cmd_logout(cli: &Cli) -> Result<()> {
    let client = create_client(cli)?;
    client.logout();
    println!("Signed out.");
    Ok(())
}

fn cmd_whoami(cli: &Cli) -> Result<()> {
    let client = create_client(cli)?;
    require_login(&client)?;

    let session = client.session();
    let Some(user) = session.current_user() else {
        anyhow::bail!("Not signed in.");
    };

    println!();
    println!("ID:       {}", user.id);
    println!("Name:     {}", user.name);
    println!("Email:    {}", user.email);
    println!("Role:     {}", user.role);
    if let Some(token_user) = session.user_from_token() {
        if token_user.user_type != user.user_type {
            println!("          (token claims say {})", token_user.role);
        }
    }
    println!();
    Ok(())
}

async fn cmd_travel(cli: &Cli, command: &TravelCommands) -> Result<()> {
    let client = create_client(cli)?;
    require_login(&client)?;

    match command {
        TravelCommands::List {
            status,
            sort,
            asc,
            limit,
        } => {
            let travels = client.list_travels().await?;
            let query = TravelQuery {
                status: *status,
                sort: *sort,
                direction: if *asc {
                    SortDirection::Ascending
                } else {
                    SortDirection::Descending
                },
            };
            let mut rows = views::apply(&travels, &query);
            if let Some(limit) = limit {
                rows.truncate(*limit);
            }
            print_travel_table(&rows);
        }
        TravelCommands::Show { id } => {
            let travel = client.get_travel(*id).await?;
            print_travel(&travel);
        }
        TravelCommands::Create {
            destination,
            start,
            end,
            purpose,
            cost,
            comments,
        } => {
            let request = CreateTravelRequest {
                destination: destination.clone(),
                start_date: start.clone(),
                end_date: end.clone(),
                purpose: purpose.clone(),
                estimated_cost: *cost,
                status: None,
                comments: comments.clone(),
            };
            let errors = views::validate_form(&request);
            if !errors.is_empty() {
                for (field, message) in &errors {
                    eprintln!("  {}: {}", field, message);
                }
                anyhow::bail!("Travel request is invalid");
            }

            let travel = client.create_travel(&request).await?;
            println!("[OK] Created travel request {}", travel.id);
            print_travel(&travel);
        }
        TravelCommands::Update {
            id,
            destination,
            start,
            end,
            purpose,
            cost,
            comments,
        } => {
            let request = UpdateTravelRequest {
                id: Some(*id),
                destination: destination.clone(),
                start_date: start.clone(),
                end_date: end.clone(),
                purpose: purpose.clone(),
                estimated_cost: *cost,
                status: None,
                comments: comments.clone(),
            };
            let travel = client.update_travel(*id, &request).await?;
            println!("[OK] Updated travel request {}", travel.id);
            print_travel(&travel);
        }
        TravelCommands::Delete { id } => {
            client.delete_travel(*id).await?;
            println!("[OK] Deleted travel request {}", id);
        }
        TravelCommands::Approve { id, comments } => {
            require_admin(&client)?;
            let travel = client.approve(*id, comments.clone()).await?;
            println!("[OK] Travel request {} is now {}", travel.id, travel.status);
        }
        TravelCommands::Reject { id, comments } => {
            require_admin(&client)?;
            let travel = client.reject(*id, comments.clone()).await?;
            println!("[OK] Travel request {} is now {}", travel.id, travel.status);
        }
        TravelCommands::Cancel { id, comments } => {
            require_admin(&client)?;
            let travel = client.cancel(*id, comments.clone()).await?;
            println!("[OK] Travel request {} is now {}", travel.id, travel.status);
        }
        TravelCommands::Stats => {
            let travels = client.list_travels().await?;
            let stats = views::statistics(&travels);

            println!();
            println!("=== Travel Requests ===");
            println!();
            println!("Total:     {}", stats.total_requests);
            println!("Pending:   {}", stats.pending_requests);
            println!("Approved:  {}", stats.approved_requests);
            println!("Rejected:  {}", stats.rejected_requests);
            println!();
            println!("Recent:");
            print_travel_table(&views::recent(
                &travels,
                StatusFilter::All,
                views::DASHBOARD_RECENT,
            ));
        }
    }

    Ok(())
}

async fn cmd_users(cli: &Cli, command: &UsersCommands) -> Result<()> {
    let client = create_client(cli)?;
    require_admin(&client)?;

    match command {
        UsersCommands::List => {
            let users = client.list_users().await?;
            print_user_table(&users);
        }
        UsersCommands::Show { id } => {
            let user = client.get_user(*id).await?;
            println!();
            println!("ID:          {}", user.id);
            println!("Name:        {} {}", user.first_name, user.last_name);
            println!("Email:       {}", user.email);
            println!("Role:        {}", user.user_type);
            println!("Active:      {}", if user.is_active { "yes" } else { "no" });
            println!("Created:     {}", user.created_at);
            println!(
                "Last login:  {}",
                user.last_login_at.as_deref().unwrap_or("never")
            );
            println!();
        }
        UsersCommands::SetStatus {
            id,
            user_type,
            active,
        } => {
            let request = UpdateUserStatusRequest {
                user_type: *user_type,
                is_active: *active,
            };
            client.set_user_status(*id, &request).await?;
            println!(
                "[OK] User {} is now {} ({})",
                id,
                user_type,
                if *active { "active" } else { "disabled" }
            );
        }
        UsersCommands::CreateAdmin {
            email,
            first_name,
            last_name,
            password,
        } => {
            let request = RegisterRequest {
                email: email.clone(),
                password: password.clone(),
                first_name: first_name.clone(),
                last_name: last_name.clone(),
                user_type: Some(UserType::Admin),
            };
            let created = client.register_admin(&request).await?;
            println!("[OK] Created admin account {} (id {})", created.email, created.id);
        }
    }

    Ok(())
}

/// Validate configuration file
fn cmd_config_check(cli: &Cli) -> Result<()> {
    let config_path = &cli.config;

    println!("Checking configuration file: {}", config_path.display());
    println!();

    if !config_path.exists() {
        println!(
            "[!!] Configuration file not found: {}",
            config_path.display()
        );
        println!();
        println!("A default configuration will be used when starting the server.");
        return Ok(());
    }

    match Config::load(config_path) {
        Ok(config) => {
            println!("[OK] Configuration file is valid!");
            println!();
            println!("=== Configuration Summary ===");
            println!();
            println!("Server:");
            println!("  Host:         {}", config.server.host);
            println!("  API Port:     {}", config.server.api_port);
            println!("  Data Dir:     {}", config.server.data_dir.display());
            println!();
            println!("Database:");
            println!("  Backend:      {:?}", config.database.backend);
            println!("  File:         {}", config.database.file);
            println!();
            println!("Auth:");
            println!("  Issuer:       {}", config.auth.issuer);
            println!("  Audience:     {}", config.auth.audience);
            println!("  Token TTL:    {}h", config.auth.token_ttl_hours);
            println!();

            let mut warnings = Vec::new();
            if config.auth.admin_email.is_none() {
                warnings.push("No bootstrap admin configured - admin accounts must already exist");
            }
            if !warnings.is_empty() {
                println!("Warnings:");
                for warning in warnings {
                    println!("  [!] {}", warning);
                }
                println!();
            }

            Ok(())
        }
        Err(e) => {
            println!("[!!] Configuration file is invalid!");
            println!();
            println!("Error: {:#}", e);
            println!();
            println!("Please check the configuration file syntax and try again.");
            anyhow::bail!("Invalid configuration file");
        }
    }
}

// ============================================================================
// Output helpers
// ============================================================================

fn print_travel_table(travels: &[Travel]) {
    if travels.is_empty() {
        println!("No travel requests found.");
        return;
    }

    println!();
    println!(
        "{:<6}  {:<24}  {:<10}  {:<10}  {:<10}  {:>10}",
        "ID", "DESTINATION", "START", "END", "STATUS", "COST"
    );
    println!("{}", "-".repeat(82));

    for travel in travels {
        println!(
            "{:<6}  {:<24}  {:<10}  {:<10}  {:<10}  {:>10.2}",
            travel.id,
            truncate(&travel.destination, 24),
            short_date(&travel.start_date),
            short_date(&travel.end_date),
            travel.status,
            travel.estimated_cost
        );
    }

    println!();
}

fn print_travel(travel: &Travel) {
    println!();
    println!("=== Travel Request {} ===", travel.id);
    println!();
    println!("Destination: {}", travel.destination);
    println!("Dates:       {} to {}", short_date(&travel.start_date), short_date(&travel.end_date));
    println!("Purpose:     {}", travel.purpose);
    println!("Cost:        {:.2}", travel.estimated_cost);
    println!("Status:      {}", travel.status);
    println!("Owner:       {}", travel.user_id);
    println!("Created:     {}", travel.created_at);
    if let Some(updated) = &travel.updated_at {
        println!("Updated:     {}", updated);
    }
    if let (Some(by), Some(at)) = (travel.approved_by, &travel.approved_at) {
        println!("Approved:    by {} at {}", by, at);
    }
    if let (Some(by), Some(at)) = (travel.rejected_by, &travel.rejected_at) {
        println!("Rejected:    by {} at {}", by, at);
    }
    if let Some(comments) = &travel.comments {
        println!("Comments:    {}", comments);
    }
    println!();
}

fn print_user_table(users: &[UserSummary]) {
    if users.is_empty() {
        println!("No users found.");
        return;
    }

    println!();
    println!(
        "{:<6}  {:<30}  {:<24}  {:<8}  {:<6}",
        "ID", "EMAIL", "NAME", "ROLE", "ACTIVE"
    );
    println!("{}", "-".repeat(82));

    for user in users {
        let name = format!("{} {}", user.first_name, user.last_name);
        println!(
            "{:<6}  {:<30}  {:<24}  {:<8}  {:<6}",
            user.id,
            truncate(&user.email, 30),
            truncate(&name, 24),
            user.user_type.to_string(),
            if user.is_active { "yes" } else { "no" }
        );
    }

    println!();
}

/// Date part of an RFC 3339 timestamp
fn short_date(value: &str) -> &str {
    value.get(..10).unwrap_or(value)
}

/// Truncate a string to max length with ellipsis
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
