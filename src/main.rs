// Finance App - command-line client
//
// Talks to the API server configured by FINANCE_API_BASE_URL and keeps the
// login in FINANCE_SESSION_FILE between runs. The cnpj subcommands work
// offline.

use anyhow::Result;
use chrono::Local;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::process::ExitCode;
use std::sync::Arc;

use finance_app::cnpj::{self, Cnpj};
use finance_app::entities::{LoginCredentials, Period};
use finance_app::formatters::format_document;
use finance_app::list::MovementSource;
use finance_app::{
    logging, ApiError, AppConfig, ListController, ListOptions, LoadOutcome, MovementFilter,
    Notification, PageSource, Pagination, Services, Session, TokenStatus,
};

#[derive(Parser)]
#[command(name = "finance-app")]
#[command(about = "Finance App command-line client", version)]
struct CommandLine {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate or format a CNPJ (offline)
    Cnpj {
        #[command(subcommand)]
        action: CnpjAction,
    },
    /// Log in and store the session
    Login {
        username: String,
        #[arg(long)]
        password: String,
    },
    /// Drop the stored session
    Logout,
    /// Show the logged-in user and token state
    Whoami,
    /// People and companies
    Persons {
        #[command(subcommand)]
        action: PersonAction,
    },
    /// Financial movements
    Movements {
        #[command(subcommand)]
        action: MovementAction,
    },
    /// Movement statuses, in display order
    Statuses,
    /// Movement types with usage counts
    Types,
    /// Registered users
    Users {
        #[command(flatten)]
        paging: Paging,
    },
    /// Server health
    Health {
        #[arg(value_enum, default_value_t = HealthScope::All)]
        scope: HealthScope,
    },
}

#[derive(Subcommand)]
enum CnpjAction {
    Validate { value: String },
    Format { value: String },
}

#[derive(Subcommand)]
enum PersonAction {
    List {
        #[command(flatten)]
        paging: Paging,
    },
    Get { id: i64 },
    /// Register a company from its CNPJ
    CreateByCnpj { cnpj: String },
    Delete { id: i64 },
}

#[derive(Subcommand)]
enum MovementAction {
    List {
        #[command(flatten)]
        paging: Paging,
        #[command(flatten)]
        filter: MovementArgs,
    },
    Get { id: i64 },
    Cancel {
        id: i64,
        #[arg(long)]
        reason: String,
    },
    /// Totals per status and type over one page
    Metrics {
        #[command(flatten)]
        paging: Paging,
        #[command(flatten)]
        filter: MovementArgs,
    },
    Delete { id: i64 },
}

#[derive(clap::Args)]
struct Paging {
    #[arg(long, default_value_t = 1)]
    page: u32,
    #[arg(long, default_value_t = 10)]
    limit: u32,
    #[arg(long)]
    search: Option<String>,
}

#[derive(clap::Args)]
struct MovementArgs {
    /// all, today, week or month
    #[arg(long, default_value = "all", value_parser = parse_period)]
    period: Period,
    /// Status name, e.g. Pending
    #[arg(long)]
    status: Option<String>,
    #[arg(long = "type")]
    movement_type_id: Option<i64>,
}

impl MovementArgs {
    fn to_filter(&self) -> MovementFilter {
        MovementFilter {
            movement_type_id: self.movement_type_id,
            ..MovementFilter::default()
        }
        .period(self.period, Local::now().date_naive())
        .status(self.status.as_deref())
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum HealthScope {
    All,
    Databases,
    System,
}

fn parse_period(value: &str) -> Result<Period, String> {
    value.parse()
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    logging::init("warn");

    let command_line = CommandLine::parse();
    match run(command_line.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<ApiError>() {
                Some(api_error) => eprintln!("✗ {}", api_error.notification().message),
                None => eprintln!("✗ {:#}", e),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command) -> Result<()> {
    if let Command::Cnpj { action } = &command {
        run_cnpj(action);
        return Ok(());
    }

    let config = AppConfig::from_env()?;
    let session = Arc::new(Session::from_file(&config.auth)?);
    let services = Services::from_config(&config, session)?;

    match command {
        Command::Cnpj { .. } => Ok(()),
        Command::Login { username, password } => {
            let user = services
                .auth
                .login(&LoginCredentials::new(&username, &password))
                .await?;
            notify(Notification::success(format!("Logged in as {}", user.username)));
            Ok(())
        }
        Command::Logout => {
            services.auth.logout()?;
            notify(Notification::success("Logged out"));
            Ok(())
        }
        Command::Whoami => whoami(&services).await,
        Command::Persons { action } => {
            services.auth.ensure_fresh().await?;
            run_persons(&services, action).await
        }
        Command::Movements { action } => {
            services.auth.ensure_fresh().await?;
            run_movements(&services, action).await
        }
        Command::Statuses => {
            services.auth.ensure_fresh().await?;
            for status in services.movement_statuses.list().await? {
                println!(
                    "{:>4}  {:<20} order {:<3}{}",
                    status.movement_status_id,
                    status.status_name,
                    status.display_order,
                    if status.is_final { " (final)" } else { "" }
                );
            }
            Ok(())
        }
        Command::Types => {
            services.auth.ensure_fresh().await?;
            for kind in services.movement_types.list().await? {
                println!(
                    "{:>4}  {:<20} {} movement(s)",
                    kind.movement_type_id, kind.type_name, kind.count.movements
                );
            }
            Ok(())
        }
        Command::Users { paging } => {
            services.auth.ensure_fresh().await?;
            let mut list = controller(services.users.clone(), &paging);
            load(&mut list, &paging).await?;
            for user in list.data() {
                println!("{:>4}  {:<20} {}", user.user_id, user.username, user.person_name);
            }
            print_pagination(list.pagination());
            Ok(())
        }
        Command::Health { scope } => {
            match scope {
                HealthScope::All => print_json(&services.health.system().await?),
                HealthScope::Databases => print_json(&services.health.databases().await?),
                HealthScope::System => print_json(&services.health.metrics().await?),
            }
        }
    }
}

fn run_cnpj(action: &CnpjAction) {
    match action {
        CnpjAction::Validate { value } => match value.parse::<Cnpj>() {
            Ok(valid) => println!("✓ {} is valid", valid.formatted()),
            Err(e) => println!("✗ {}", e),
        },
        CnpjAction::Format { value } => println!("{}", cnpj::format(value)),
    }
}

async fn whoami(services: &Services) -> Result<()> {
    // A failed refresh logs out, which the status below reports
    services.auth.ensure_fresh().await.ok();

    let session = services.auth.session();
    match session.status() {
        TokenStatus::Missing => println!("Not logged in"),
        TokenStatus::Malformed | TokenStatus::Expired => {
            println!("Session expired. Please log in again.")
        }
        TokenStatus::ExpiringSoon { remaining } | TokenStatus::Valid { remaining } => {
            let user = services.auth.current_user().await?;
            println!(
                "{} (user {}), token valid for {} more minute(s)",
                user.username,
                user.user_id,
                remaining.as_secs() / 60
            );
        }
    }
    Ok(())
}

async fn run_persons(services: &Services, action: PersonAction) -> Result<()> {
    match action {
        PersonAction::List { paging } => {
            let mut list = controller(services.persons.clone(), &paging);
            load(&mut list, &paging).await?;
            for person in list.data() {
                let document = person
                    .main_document()
                    .map(|doc| format_document(&doc.document_type, &doc.document_value))
                    .unwrap_or_default();
                println!("{:>4}  {:<40} {}", person.person_id, person.display_name(), document);
            }
            print_pagination(list.pagination());
            Ok(())
        }
        PersonAction::Get { id } => print_json(&services.persons.get(id).await?),
        PersonAction::CreateByCnpj { cnpj } => {
            let person = services.persons.create_by_cnpj(&cnpj).await?;
            notify(Notification::success(format!(
                "Created person {} ({})",
                person.person_id, person.full_name
            )));
            Ok(())
        }
        PersonAction::Delete { id } => {
            services.persons.delete(id).await?;
            notify(Notification::success(format!("Deleted person {}", id)));
            Ok(())
        }
    }
}

async fn run_movements(services: &Services, action: MovementAction) -> Result<()> {
    match action {
        MovementAction::List { paging, filter } => {
            let source = MovementSource::new(services.movements.clone(), filter.to_filter());
            let mut list = controller(source, &paging);
            load(&mut list, &paging).await?;
            for movement in list.data() {
                println!(
                    "{:>4}  {}  {:<30} {:<10} {:<10} {:>12.2}",
                    movement.movement_id,
                    movement.movement_date,
                    movement.person_name,
                    movement.movement_type_name,
                    movement.movement_status_name,
                    movement.total_amount
                );
            }
            print_pagination(list.pagination());
            Ok(())
        }
        MovementAction::Get { id } => print_json(&services.movements.get(id).await?),
        MovementAction::Cancel { id, reason } => {
            let movement = services.movements.cancel(id, &reason).await?;
            notify(Notification::success(format!(
                "Movement {} is now {}",
                movement.movement_id, movement.movement_status_name
            )));
            Ok(())
        }
        MovementAction::Metrics { paging, filter } => {
            let filter = filter
                .to_filter()
                .page(paging.page, paging.limit)
                .search(paging.search.as_deref());
            print_json(&services.movements.metrics(&filter).await?)
        }
        MovementAction::Delete { id } => {
            services.movements.delete(id).await?;
            notify(Notification::success(format!("Deleted movement {}", id)));
            Ok(())
        }
    }
}

// ============================================================================
// OUTPUT HELPERS
// ============================================================================

fn controller<T, S>(source: S, paging: &Paging) -> ListController<T, S>
where
    T: Send,
    S: PageSource<T>,
{
    ListController::new(
        source,
        ListOptions {
            items_per_page: paging.limit,
            ..ListOptions::default()
        },
    )
}

async fn load<T, S>(list: &mut ListController<T, S>, paging: &Paging) -> Result<()>
where
    T: Send,
    S: PageSource<T>,
{
    match list.load(paging.page, paging.search.as_deref()).await {
        LoadOutcome::Failed(e) => Err(e.into()),
        LoadOutcome::Loaded | LoadOutcome::Skipped => Ok(()),
    }
}

fn print_pagination(pagination: Pagination) {
    println!(
        "page {} of {} ({} total)",
        pagination.current_page, pagination.total_pages, pagination.total_items
    );
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn notify(notification: Notification) {
    println!("✓ {}", notification.message);
}
