use std::sync::Arc;

use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;
use zeroize::Zeroizing;

use habitforge::{
    AppState, Config,
    models::habit::{Frequency, HabitInput},
    navigation::LogNavigator,
    pages::{
        dashboard::{self, DashboardView},
        login::LoginPage,
        preferences::PreferencesPage,
    },
    remote::{api::Backend, memory::MemoryBackend, supabase::SupabaseClient},
    validation::auth::require_credentials,
};

#[derive(Parser)]
#[command(name = "habitforge", version, about = "Track habits and streaks from the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the dashboard: habits and streak stats
    Habits,
    /// Create a habit
    Add {
        title: String,
        /// daily, weekly or monthly
        #[arg(default_value = "daily")]
        frequency: String,
    },
    /// Mark a habit done for today
    Toggle { habit_id: Uuid },
    /// Show notification preferences
    Preferences,
    /// Sign out
    Logout,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config = Config::from_env()?;
    tracing::info!("✅ Configuration loaded successfully");

    let email = std::env::var("HABITFORGE_EMAIL").context("HABITFORGE_EMAIL must be set")?;
    let password = Zeroizing::new(
        std::env::var("HABITFORGE_PASSWORD").context("HABITFORGE_PASSWORD must be set")?,
    );

    if config.offline {
        let backend = MemoryBackend::new();
        backend.register_user(&email, &password);
        tracing::info!("✅ Offline mode: in-memory backend");
        run(config, Arc::new(backend), cli.command, &email, &password).await
    } else {
        let client = SupabaseClient::from_config(&config)?;
        tracing::info!("✅ Supabase client initialized for {}", client.base_url);
        run(config, Arc::new(client), cli.command, &email, &password).await
    }
}

async fn run<R: Backend>(
    config: Config,
    remote: Arc<R>,
    command: Command,
    email: &str,
    password: &str,
) -> anyhow::Result<()> {
    let state = AppState::new(&config, remote, Arc::new(LogNavigator::new()));
    state.start().await;

    let outcome = match command {
        Command::Logout if !state.session().is_authenticated() => {
            println!("Already signed out");
            Ok(())
        }
        command => match sign_in(&state, email, password).await {
            Ok(()) => execute(&state, command).await,
            Err(e) => Err(e),
        },
    };

    state.shutdown().await;
    outcome
}

async fn sign_in<R: Backend>(
    state: &AppState<R, LogNavigator>,
    email: &str,
    password: &str,
) -> anyhow::Result<()> {
    if state.session().is_authenticated() {
        return Ok(());
    }

    require_credentials(email, password).context("Check HABITFORGE_EMAIL and HABITFORGE_PASSWORD")?;

    let mut login = LoginPage::with_credentials(email, password);
    if login.submit(state).await {
        return Ok(());
    }

    let message = login
        .banner
        .as_ref()
        .map(|b| b.message().to_string())
        .unwrap_or_else(|| "Login failed. Please try again.".to_string());
    Err(anyhow!(message))
}

async fn execute<R: Backend>(state: &AppState<R, LogNavigator>, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Habits => match dashboard::render(state).await {
            DashboardView::Ready(dashboard) => println!("{}", dashboard),
            DashboardView::Loading => println!("Loading..."),
            DashboardView::Redirected => println!("Please sign in to continue."),
        },
        Command::Add { title, frequency } => {
            let frequency = Frequency::parse(&frequency)
                .ok_or_else(|| anyhow!("Unknown frequency '{}': use daily, weekly or monthly", frequency))?;
            let habit = state
                .habits
                .create_habit(HabitInput {
                    title,
                    frequency,
                    ..HabitInput::default()
                })
                .await
                .map_err(|e| anyhow!(e.user_message()))?;
            println!("✅ Created {} ({})", habit.title, habit.id);
        }
        Command::Toggle { habit_id } => {
            state.habits.refresh().await;
            let habit = state
                .habits
                .toggle_habit(habit_id)
                .await
                .map_err(|e| anyhow!(e.user_message()))?;
            println!("🔥 {}: {} days", habit.title, habit.streak_days);
        }
        Command::Preferences => {
            let page = PreferencesPage::load(state).await;
            if let Some(banner) = page.banner {
                return Err(anyhow!(banner.message().to_string()));
            }
            if let Some(p) = page.preferences {
                println!("Email notifications:      {}", p.email_notifications);
                println!("Push notifications:       {}", p.push_notifications);
                println!("Daily reminder:           {}", p.daily_reminder_time.format("%H:%M"));
                println!("Completion reminders:     {}", p.habit_completion_reminders);
            }
        }
        Command::Logout => {
            state
                .auth
                .sign_out()
                .await
                .map_err(|e| anyhow!(e.user_message()))?;
            println!("👋 Signed out");
        }
    }
    Ok(())
}
