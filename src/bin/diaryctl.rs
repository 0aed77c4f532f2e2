use clap::{Parser, Subcommand};
use diarydrop::{
    calendar::{parse_date, today_utc},
    distribution::distribute,
    state::AppState,
    store::DiaryStore,
    telemetry,
};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "diaryctl", about = "Out-of-band maintenance for the diary service")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Deliver today's (or the given day's) diaries to every user.
    Distribute {
        /// Delivery date as YYYY-MM-DD; defaults to today in UTC.
        #[arg(long)]
        date: Option<String>,
    },
    /// Create sample users, each with a few diaries.
    Seed {
        #[arg(long, default_value_t = 3)]
        users: usize,
    },
}

const SAMPLE_DIARIES: &[&str] = &[
    "The sun finally came out, so I walked to the park. The cherry trees are in full bloom.",
    "We shipped the project at work today. Everyone pulled together and it shows.",
    "Finished a novel in one sitting. The main character grew on me more than I expected.",
    "Tried making pasta from scratch for the first time. It came out better than I hoped.",
    "Caught up with an old friend over coffee. Left feeling lighter than I arrived.",
    "Rain all day. Stayed in, put a record on and did absolutely nothing. It was great.",
    "Started learning the guitar. My fingers hurt, but I can almost play one chord.",
    "Woke up early enough to watch the sunrise. The quiet before the city wakes is lovely.",
    "Spent the afternoon in a little cafe with a good coffee. These slow days matter.",
    "Called my family tonight. Far away, yet it felt like sitting at the same table.",
];

async fn seed(store: &dyn DiaryStore, users: usize) -> anyhow::Result<()> {
    for i in 0..users {
        let user = store.create_user().await?;
        let count = 3 + i % 2;
        for j in 0..count {
            let content = SAMPLE_DIARIES[(i * 3 + j) % SAMPLE_DIARIES.len()];
            store.create_diary(user.id, content).await?;
        }
        info!(user_id = %user.id, diaries = count, "seeded user");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    telemetry::init_tracing();

    let cli = Cli::parse();
    let state = AppState::init().await?;

    match cli.command {
        Command::Distribute { date } => {
            let date = match date.as_deref() {
                Some(raw) => parse_date(raw)?,
                None => today_utc(),
            };
            let report = distribute(state.store.as_ref(), &state.selection_policy(), date).await?;
            let json = serde_json::to_string(&report)?;
            info!(report = %json, "distribution report");
            if !report.failures.is_empty() {
                anyhow::bail!("{} user(s) failed to receive diaries", report.failures.len());
            }
        }
        Command::Seed { users } => seed(state.store.as_ref(), users).await?,
    }
    Ok(())
}
