use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use companion_core::{
    persona, Companion, CompanionConfig, MoodAnalyzer, SendOutcome, SessionManager,
};
use companion_provider::create_provider;
use companion_schema::{mood_label, PersonaId, Role};
use companion_store::ProfileStore;

#[derive(Parser)]
#[command(name = "companion", version, about = "Persona-based chat companion with mood tracking")]
struct Cli {
    #[arg(
        long,
        default_value = "~/.companion",
        help = "Data root directory (contains config.yaml, records/ and logs/)"
    )]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Interactive chat REPL")]
    Chat,
    #[command(about = "List available personas")]
    Personas,
    #[command(subcommand, about = "Mood tracking")]
    Mood(MoodCommands),
    #[command(about = "Print the stored chat transcript")]
    History,
    #[command(about = "Erase all stored data")]
    Clear {
        #[arg(long, help = "Skip the safety check")]
        force: bool,
    },
}

#[derive(Subcommand)]
enum MoodCommands {
    #[command(about = "Log a mood rating (1-10)")]
    Log {
        #[arg(help = "Rating from 1 (very low) to 10 (excellent)")]
        value: i32,
        #[arg(long, default_value = "Manual Log", help = "Optional note")]
        note: String,
    },
    #[command(about = "Show the logged mood timeline")]
    History,
    #[command(about = "Score free text 1-10 with the model")]
    Score {
        #[arg(help = "Text to score")]
        text: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut cli = Cli::parse();

    // Expand ~ to home directory
    if cli.data_dir.starts_with("~") {
        if let Some(home) = std::env::var_os("HOME") {
            cli.data_dir =
                PathBuf::from(home).join(cli.data_dir.strip_prefix("~").unwrap_or(&cli.data_dir));
        }
    }

    let log_dir = cli.data_dir.join("logs");
    std::fs::create_dir_all(&log_dir)?;
    let file_appender = tracing_appender::rolling::daily(&log_dir, "companion.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking),
        )
        .init();

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    match command {
        Commands::Chat => run_repl(&cli.data_dir).await?,
        Commands::Personas => {
            let current = records_store(&cli.data_dir).get_last_persona().await;
            print_personas(current);
        }
        Commands::Mood(cmd) => match cmd {
            MoodCommands::Log { value, note } => {
                if !(1..=10).contains(&value) {
                    bail!("mood value must be 1-10, got {value}");
                }
                let store = records_store(&cli.data_dir);
                let history = store
                    .append_mood(companion_schema::MoodEntry::new(value, note))
                    .await?;
                println!("Logged mood {value}/10 ({} entries total).", history.len());
            }
            MoodCommands::History => {
                print_mood_history(&records_store(&cli.data_dir).get_mood_history().await);
            }
            MoodCommands::Score { text } => {
                let app = bootstrap(&cli.data_dir).await?;
                match app.analyzer.score_text(&text).await {
                    Some(score) => {
                        let label = mood_label(score)
                            .map(|l| format!(" ({l})"))
                            .unwrap_or_default();
                        println!("Sentiment: {score}/10{label}");
                    }
                    None => println!("Could not score that text."),
                }
            }
        },
        Commands::History => {
            let messages = records_store(&cli.data_dir).get_chat_history().await;
            if messages.is_empty() {
                println!("No stored transcript.");
            }
            for msg in messages {
                let speaker = match msg.role {
                    Role::User => "you",
                    Role::Model => "companion",
                };
                println!(
                    "[{}] {:>9}: {}",
                    msg.timestamp.format("%Y-%m-%d %H:%M"),
                    speaker,
                    msg.text
                );
            }
        }
        Commands::Clear { force } => {
            if !force {
                bail!("this erases the transcript, mood history and persona selection; re-run with --force");
            }
            records_store(&cli.data_dir).clear_all().await?;
            println!("All data cleared.");
        }
    }

    Ok(())
}

struct App {
    companion: Companion,
    analyzer: MoodAnalyzer,
}

async fn bootstrap(root: &Path) -> Result<App> {
    let config = CompanionConfig::load(root)?;
    let provider = create_provider(&config.provider)?;
    let sessions = SessionManager::new(provider.clone(), config.model.clone())
        .with_max_tokens(config.max_tokens);
    let analyzer = MoodAnalyzer::new(provider, config.model);
    let companion = Companion::open(records_store(root), sessions).await;
    Ok(App { companion, analyzer })
}

fn records_store(root: &Path) -> ProfileStore {
    ProfileStore::new(root.join("records"))
}

async fn run_repl(root: &Path) -> Result<()> {
    let app = bootstrap(root).await?;

    let current = persona::lookup(app.companion.current_persona());
    println!(
        "companion REPL. Talking to {} ({}). Type /help for commands, 'quit' to exit.",
        current.name, current.id
    );
    let restored = app.companion.transcript().len();
    if restored > 0 {
        println!("(restored {restored} transcript turns)");
    }
    println!("---");

    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let mut input = String::new();
        if stdin.read_line(&mut input)? == 0 {
            break;
        }
        let input = input.trim();
        if input == "quit" || input == "exit" {
            break;
        }
        if input.is_empty() {
            continue;
        }
        if let Some(command) = input.strip_prefix('/') {
            handle_slash_command(&app, command).await;
            continue;
        }

        match app.companion.send_message(input).await {
            Ok(SendOutcome::Replied(reply)) => println!("{reply}"),
            Ok(SendOutcome::Superseded) => {}
            Err(err) => eprintln!("Error: {err}"),
        }
    }

    Ok(())
}

async fn handle_slash_command(app: &App, command: &str) {
    let (name, rest) = match command.split_once(' ') {
        Some((name, rest)) => (name, rest.trim()),
        None => (command, ""),
    };

    let result = match name {
        "persona" => match PersonaId::parse(rest) {
            Some(id) => app.companion.select_persona(id).await.map(|()| {
                println!("Now talking to {} ({id}).", persona::lookup(id).name);
            }),
            None => {
                eprintln!("Unknown persona '{rest}'. Try /personas.");
                Ok(())
            }
        },
        "personas" => {
            print_personas(app.companion.current_persona());
            Ok(())
        }
        "new" => app.companion.start_new_chat().await.map(|()| {
            println!("Started a new chat.");
        }),
        "mood" => {
            let (value, note) = match rest.split_once(' ') {
                Some((value, note)) => (value, note.trim()),
                None => (rest, "Manual Log"),
            };
            match value.parse::<i32>() {
                Ok(value) => app.companion.log_mood(value, note).await.map(|history| {
                    println!("Logged mood {value}/10 ({} entries total).", history.len());
                }),
                Err(_) => {
                    eprintln!("Usage: /mood <1-10> [note]");
                    Ok(())
                }
            }
        }
        "moods" => {
            print_mood_history(&app.companion.mood_history().await);
            Ok(())
        }
        "clear" => app.companion.clear_all_data().await.map(|()| {
            println!("All data cleared.");
        }),
        "help" => {
            println!("/persona <friend|therapist|advisor>  switch persona");
            println!("/personas                            list personas");
            println!("/new                                 start a new chat");
            println!("/mood <1-10> [note]                  log a mood rating");
            println!("/moods                               show mood history");
            println!("/clear                               erase all data");
            Ok(())
        }
        _ => {
            eprintln!("Unknown command '/{name}'. Try /help.");
            Ok(())
        }
    };

    if let Err(err) = result {
        eprintln!("Error: {err}");
    }
}

fn print_personas(current: PersonaId) {
    println!("  {:<11} {:<14} {}", "ID", "NAME", "DESCRIPTION");
    println!("{}", "-".repeat(80));
    for config in persona::all() {
        let marker = if config.id == current { "*" } else { " " };
        println!(
            "{marker} {:<11} {:<14} {}",
            config.id.as_str(),
            config.name,
            config.description
        );
    }
}

fn print_mood_history(history: &[companion_schema::MoodEntry]) {
    if history.is_empty() {
        println!("No mood entries yet.");
        return;
    }
    for entry in history {
        let label = mood_label(entry.value)
            .map(|l| format!(" ({l})"))
            .unwrap_or_default();
        println!(
            "{}  {:>2}/10{}  {}",
            entry.timestamp.format("%Y-%m-%d %H:%M"),
            entry.value,
            label,
            entry.note
        );
    }
}
