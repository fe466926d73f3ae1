use std::process;

use clap::{Parser, Subcommand};
use dialoguer::{Input, Password};
use dotenvy::dotenv;
use sqlx::PgPool;

use classdesk::modules::auth::blacklist::TokenBlacklistService;
use classdesk::modules::fees::sync::FeeSyncService;
use classdesk::modules::users::service::UserService;
use classdesk_cli::seeder::{self, SeedConfig};
use classdesk_config::FeeSyncConfig;
use classdesk_core::PasswordPolicy;
use classdesk_db::{init_db_pool, run_migrations};
use classdesk_models::fees::FeeSyncReport;
use classdesk_models::ids::ClassroomId;
use classdesk_models::users::{CreateUserDto, UserRole};
use classdesk_models::value_types::Email;

#[derive(Parser)]
#[command(name = "classdesk-cli")]
#[command(about = "ClassDesk CLI - administrative tools for ClassDesk", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an administrator account
    CreateAdmin {
        #[arg(short = 'f', long)]
        first_name: Option<String>,

        #[arg(short = 'l', long)]
        last_name: Option<String>,

        #[arg(short = 'e', long)]
        email: Option<String>,

        /// Prompted without echo when omitted
        #[arg(short = 'p', long)]
        password: Option<String>,
    },
    /// Seed a session, subjects, classrooms, staff, parents and students
    Seed {
        #[arg(short = 'c', long, default_value = "6")]
        classrooms: usize,

        /// Students per classroom
        #[arg(short = 's', long, default_value = "25")]
        students: usize,

        #[arg(long, default_value = "8")]
        teachers: usize,

        #[arg(long, default_value = "40")]
        parents: usize,
    },
    /// Remove seeded accounts and classrooms (admins are kept)
    ClearSeed,
    /// Bill missing fees and correct drifted amounts
    SyncFees {
        /// Only this classroom; all active classrooms when omitted
        #[arg(long)]
        classroom_id: Option<ClassroomId>,
    },
    /// Delete blacklisted tokens that have expired
    PurgeTokens,
}

fn fail(context: &str, err: impl std::fmt::Display) -> ! {
    eprintln!("\n❌ {}: {}", context, err);
    process::exit(1);
}

#[tokio::main]
async fn main() {
    dotenv().ok();

    let cli = Cli::parse();

    let pool = match init_db_pool().await {
        Ok(pool) => pool,
        Err(e) => fail("Failed to connect to database", e),
    };
    if let Err(e) = run_migrations(&pool).await {
        fail("Failed to run migrations", e);
    }

    match cli.command {
        Commands::CreateAdmin {
            first_name,
            last_name,
            email,
            password,
        } => handle_create_admin(&pool, first_name, last_name, email, password).await,
        Commands::Seed {
            classrooms,
            students,
            teachers,
            parents,
        } => {
            let config = SeedConfig::new(classrooms)
                .with_students(students)
                .with_teachers(teachers)
                .with_parents(parents);
            handle_seed(&pool, &config).await
        }
        Commands::ClearSeed => handle_clear_seed(&pool).await,
        Commands::SyncFees { classroom_id } => handle_sync_fees(&pool, classroom_id).await,
        Commands::PurgeTokens => handle_purge_tokens(&pool).await,
    }
}

fn prompt_text(existing: Option<String>, prompt: &str) -> String {
    if let Some(value) = existing {
        return value;
    }
    match Input::new().with_prompt(prompt).interact_text() {
        Ok(value) => value,
        Err(e) => fail(&format!("Failed to read {}", prompt.to_lowercase()), e),
    }
}

async fn handle_create_admin(
    pool: &PgPool,
    first_name: Option<String>,
    last_name: Option<String>,
    email: Option<String>,
    password: Option<String>,
) {
    let first_name = prompt_text(first_name, "First name");
    let last_name = prompt_text(last_name, "Last name");
    let email = prompt_text(email, "Email address");

    let email = match Email::new(email) {
        Ok(email) => email,
        Err(e) => fail("Invalid email", e),
    };

    let password = match password {
        Some(password) => password,
        None => match Password::new()
            .with_prompt("Password")
            .with_confirmation("Confirm password", "Passwords don't match")
            .interact()
        {
            Ok(password) => password,
            Err(e) => fail("Failed to read password", e),
        },
    };

    let dto = CreateUserDto {
        first_name,
        last_name,
        email,
        password,
        role: UserRole::Admin,
        phone: None,
    };

    match UserService::create_user(pool, &PasswordPolicy::default(), dto).await {
        Ok(user) => {
            println!("\n✅ Admin created successfully!");
            println!("   Email: {}", user.email);
            println!("   Name: {} {}", user.first_name, user.last_name);
        }
        Err(e) => fail("Error creating admin", e),
    }
}

async fn handle_seed(pool: &PgPool, config: &SeedConfig) {
    match seeder::seed_all(pool, config).await {
        Ok(summary) => {
            println!("   Run tag: {}", summary.run);
            println!("   Password for seeded accounts: {}", seeder::SEED_PASSWORD);
            println!("   Run `classdesk-cli sync-fees` to bill the seeded students");
        }
        Err(e) => fail("Error seeding database", e),
    }
}

async fn handle_clear_seed(pool: &PgPool) {
    if let Err(e) = seeder::clear_all(pool).await {
        fail("Error clearing seeded data", e);
    }
}

async fn handle_sync_fees(pool: &PgPool, classroom_id: Option<ClassroomId>) {
    let config = FeeSyncConfig::from_env();
    println!("💳 Syncing fees in batches of {}...", config.batch_size);

    let result = match classroom_id {
        Some(id) => FeeSyncService::sync_classroom(pool, &config, id, None).await,
        None => FeeSyncService::sync_all(pool, &config, None).await,
    };

    match result {
        Ok(report) => print_report(&report),
        Err(e) => fail("Fee sync failed", e),
    }
}

fn print_report(report: &FeeSyncReport) {
    println!(
        "\n✅ Fee sync finished in {} ms: {} created, {} updated, {} unchanged, {} failed",
        report.duration_ms, report.created, report.updated, report.unchanged, report.failed
    );
    println!(
        "   {} students, {} fee structures, {} batches",
        report.students, report.fee_structures, report.batches
    );
    for error in &report.errors {
        eprintln!(
            "   ⚠️  batch {} ({} operations): {}",
            error.batch, error.operations, error.error
        );
    }
    for error in &report.classroom_errors {
        eprintln!("   ⚠️  classroom {}: {}", error.classroom_id, error.error);
    }
}

async fn handle_purge_tokens(pool: &PgPool) {
    match TokenBlacklistService::purge_expired(pool).await {
        Ok(purged) => println!("✅ Purged {} expired blacklist entries", purged),
        Err(e) => fail("Error purging tokens", e),
    }
}
