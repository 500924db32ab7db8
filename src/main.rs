use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use branchfix::config::AppConfig;
use branchfix::editor::ExternalEditor;
use branchfix::issue::{ApplicationCreationIssue, ChallengeCreationIssue, ChallengeRequestIssue};
use branchfix::operator::ConsoleOperator;
use branchfix::ticket::jira::JiraClient;
use branchfix::ticket::TicketClient;
use branchfix::workflow::session::{Session, SessionOptions};

#[derive(Parser)]
#[command(
    name = "branchfix",
    about = "Fix a defect across the branches of an application and transition its Jira tickets"
)]
struct Cli {
    /// Repository to clone and fix
    repository: Option<String>,

    /// Test run: no push, no ticket transitions
    #[arg(long)]
    test: bool,

    /// CHLRQ ticket number
    #[arg(long, value_parser = ChallengeRequestIssue::new)]
    chlrq: Option<ChallengeRequestIssue>,

    /// CHLC ticket number of the fixed challenge
    #[arg(long, value_parser = ChallengeCreationIssue::new)]
    chlc: Option<ChallengeCreationIssue>,

    /// CHLC ticket number of the application the challenges are linked to
    #[arg(long, value_parser = ApplicationCreationIssue::new)]
    application: Option<ApplicationCreationIssue>,

    /// Do not cherry-pick the secure branch fix onto the other branches
    #[arg(long)]
    no_pick: bool,

    /// Do not call the Jira API; print the ticket steps instead
    #[arg(long)]
    no_api: bool,

    /// Only transition tickets for a fix made elsewhere
    #[arg(long, conflicts_with_all = ["test", "no_api"])]
    transition: bool,

    /// Clone the repository and open a branch in the editor, nothing else
    #[arg(long, conflicts_with = "transition")]
    view: bool,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Diagnostics go to stderr so they never interleave with prompts
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref())?;

    let use_api = !cli.test && !cli.no_api && !cli.view;
    let jira = if use_api {
        Some(JiraClient::new(&config.jira, config.credentials()?))
    } else {
        None
    };

    let operator = ConsoleOperator::new(&config.fix.secure_branch);
    let editor = ExternalEditor::new(&config.editor);
    let options = SessionOptions {
        repository: cli.repository,
        test_mode: cli.test,
        request: cli.chlrq,
        creation: cli.chlc,
        application: cli.application,
        cherry_pick: !cli.no_pick,
    };

    tracing::debug!(api = use_api, test = cli.test, "Starting session");

    let tickets = jira.as_ref().map(|client| client as &dyn TicketClient);
    let session = Session::new(&config, &operator, &editor, tickets, options);
    if cli.view {
        session.run_view().await?;
    } else if cli.transition {
        session.run_transition().await?;
    } else {
        session.run_fix().await?;
    }

    Ok(())
}
