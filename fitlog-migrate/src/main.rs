use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fitlog_server::db::{migrations, repositories::UserRepository, seed, Database};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Fitlog database maintenance utility
///
/// Brings an existing database up to the current schema, seeds demo data, and
/// lists accounts.
#[derive(Parser, Debug)]
#[command(name = "fitlog-migrate")]
#[command(about = "Maintain the Fitlog SQLite database", long_about = None)]
struct Args {
    /// Path to the SQLite database file
    #[arg(short, long, env = "DATABASE_PATH", default_value = "./fitlog.db", global = true)]
    database: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply pending schema migrations and create missing tables
    Migrate,
    /// Create demo users (alice, bob, carol; password "pass") if the database has no users
    Seed,
    /// Print every account
    ListUsers,
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fitlog_migrate=info,fitlog_server=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let db = Database::new(&args.database)
        .with_context(|| format!("Failed to open database {}", args.database))?;

    match args.command {
        Command::Migrate => run_migrate(&db),
        Command::Seed => run_seed(&db),
        Command::ListUsers => run_list_users(&db),
    }
}

fn run_migrate(db: &Database) -> Result<()> {
    let before = {
        let conn = db.connection()?;
        migrations::applied_versions(&conn)?
    };
    db.initialize()?;
    let after = {
        let conn = db.connection()?;
        migrations::applied_versions(&conn)?
    };

    let newly_applied: Vec<_> = migrations::MIGRATIONS
        .iter()
        .filter(|m| after.contains(&m.version) && !before.contains(&m.version))
        .collect();

    if newly_applied.is_empty() {
        println!("Schema is up to date");
    } else {
        for migration in newly_applied {
            println!("Applied migration {}: {}", migration.version, migration.name);
        }
    }
    Ok(())
}

fn run_seed(db: &Database) -> Result<()> {
    db.initialize()?;
    if seed::seed_demo_data(db)? {
        println!("Seeded demo users (password: {})", seed::DEMO_PASSWORD);
    } else {
        println!("Database already has users; skipping seed");
    }
    Ok(())
}

fn run_list_users(db: &Database) -> Result<()> {
    db.initialize()?;
    let users = UserRepository::new(db.pool.clone()).list_all()?;
    if users.is_empty() {
        println!("No users");
        return Ok(());
    }

    println!("{:<36}  {:<20}  {:<24}  {:>6}  {}", "ID", "USERNAME", "DISPLAY NAME", "STREAK", "JOINED");
    for user in users {
        println!(
            "{:<36}  {:<20}  {:<24}  {:>6}  {}",
            user.id,
            user.username,
            user.display_name,
            user.streak_days,
            user.created_at.format("%Y-%m-%d")
        );
    }
    Ok(())
}
