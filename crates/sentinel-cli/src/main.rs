use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

#[zbus::proxy(
    interface = "org.sentinel.Presence1",
    default_service = "org.sentinel.Presence1",
    default_path = "/org/sentinel/Presence1"
)]
trait Presence {
    async fn enroll(&self, mask: &str) -> zbus::Result<u32>;
    async fn start_monitoring(&self) -> zbus::Result<String>;
    async fn input_event(&self, kind: &str) -> zbus::Result<bool>;
    async fn visibility_changed(&self, visible: bool) -> zbus::Result<()>;
    async fn clear_enrollments(&self) -> zbus::Result<()>;
    async fn status(&self) -> zbus::Result<String>;
}

#[derive(Parser)]
#[command(name = "sentinel", about = "Sentinel presence alarm CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enroll the face currently in front of the camera
    Enroll {
        /// Enroll as wearing a mask / face covering
        #[arg(short, long)]
        mask: bool,
    },
    /// Start monitoring (cannot be stopped without restarting the daemon)
    Start,
    /// Show daemon status
    Status,
    /// Forward a user input event to the alarm gate
    Input {
        #[arg(value_enum)]
        kind: InputKind,
    },
    /// Report whether the monitoring surface is visible
    Visibility {
        #[arg(value_enum)]
        state: Visibility,
    },
    /// Delete every enrolled face sample
    Clear,
}

#[derive(Clone, Copy, ValueEnum)]
enum InputKind {
    Key,
    Pointer,
    Click,
}

impl InputKind {
    fn as_wire(self) -> &'static str {
        match self {
            InputKind::Key => "key",
            InputKind::Pointer => "pointer",
            InputKind::Click => "click",
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Visibility {
    Visible,
    Hidden,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let connection = zbus::Connection::session()
        .await
        .context("cannot connect to the session bus")?;
    let proxy = PresenceProxy::new(&connection)
        .await
        .context("cannot reach sentineld")?;

    match cli.command {
        Commands::Enroll { mask } => {
            let wire = if mask { "with_mask" } else { "no_mask" };
            println!("Look at the camera...");
            let samples = proxy.enroll(wire).await.context("enrollment refused")?;
            println!("Enrolled ({wire}): {samples} sample(s)");
        }
        Commands::Start => {
            let outcome = proxy
                .start_monitoring()
                .await
                .context("monitoring not started")?;
            println!("Monitoring {outcome}");
        }
        Commands::Status => {
            let raw = proxy.status().await?;
            let value: serde_json::Value = serde_json::from_str(&raw)?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        Commands::Input { kind } => {
            let fired = proxy.input_event(kind.as_wire()).await?;
            tracing::debug!(fired, "input event delivered");
            if fired {
                println!("ALERT raised");
            }
        }
        Commands::Visibility { state } => {
            proxy
                .visibility_changed(matches!(state, Visibility::Visible))
                .await?;
        }
        Commands::Clear => {
            proxy.clear_enrollments().await?;
            println!("All enrollments removed");
        }
    }

    Ok(())
}
