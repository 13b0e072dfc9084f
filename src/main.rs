use rss_announcer::pipeline::{UpdateMode, UpdateOutcome};
use rss_announcer::{App, Config, Result};

const USAGE: &str = "usage:
  rss-announcer                                  update all feeds every interval until Ctrl-C
  rss-announcer --add <channel> <name> <url> [<format>]
  rss-announcer --del <name>
  rss-announcer --get <name> [all]
  rss-announcer --list [<name>|<channel>]
  rss-announcer --format <name> <format>
  rss-announcer --update";

#[derive(Debug, PartialEq)]
enum Command {
    Run,
    Add {
        channel: String,
        name: String,
        url: String,
        format: Option<String>,
    },
    Delete(String),
    Get {
        name: String,
        mode: UpdateMode,
    },
    List(Option<String>),
    Format {
        name: String,
        format: String,
    },
    Update,
}

impl Command {
    fn parse(args: &[String]) -> Option<Self> {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let command = match args.as_slice() {
            [] => Command::Run,
            ["--add", channel, name, url] => Command::Add {
                channel: channel.to_string(),
                name: name.to_string(),
                url: url.to_string(),
                format: None,
            },
            ["--add", channel, name, url, format] => Command::Add {
                channel: channel.to_string(),
                name: name.to_string(),
                url: url.to_string(),
                format: Some(format.to_string()),
            },
            ["--del", name] => Command::Delete(name.to_string()),
            ["--get", name] => Command::Get {
                name: name.to_string(),
                mode: UpdateMode::Normal,
            },
            ["--get", name, "all"] => Command::Get {
                name: name.to_string(),
                mode: UpdateMode::Chatty,
            },
            ["--list"] => Command::List(None),
            ["--list", filter] => Command::List(Some(filter.to_string())),
            ["--format", name, format] => Command::Format {
                name: name.to_string(),
                format: format.to_string(),
            },
            ["--update"] => Command::Update,
            _ => return None,
        };
        Some(command)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (info and above by default, RUST_LOG overrides)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    // Parse command line arguments
    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = Command::parse(&args) else {
        eprintln!("{}", USAGE);
        std::process::exit(2);
    };

    // Load configuration
    let config = Config::load()?;
    let mut app = App::new(config, Config::config_path()).await?;

    if let Err(e) = execute(&mut app, command).await {
        eprintln!("{}", e);
        std::process::exit(1);
    }

    Ok(())
}

async fn execute(app: &mut App, command: Command) -> Result<()> {
    match command {
        Command::Run => {
            app.run(shutdown_signal()).await?;
        }

        Command::Add {
            channel,
            name,
            url,
            format,
        } => {
            let feed = app
                .add_feed(&channel, &name, &url, format.as_deref())
                .await?;
            println!(
                "added rss feed \"{}\" to channel \"{}\" with url \"{}\"",
                feed.name, feed.channel, feed.url
            );
            app.persist().await?;
        }

        Command::Delete(name) => {
            let feed = app.remove_feed(&name).await?;
            println!(
                "deleted rss feed \"{}\" in channel \"{}\" with url \"{}\"",
                feed.name, feed.channel, feed.url
            );
            app.persist().await?;
        }

        Command::Get { name, mode } => {
            app.resolve_feeds().await?;
            match app.update_feed(&name, mode).await? {
                UpdateOutcome::FetchFailed => eprintln!("unable to read feed \"{}\"", name),
                UpdateOutcome::Deferred => eprintln!("database busy, feed \"{}\" not updated", name),
                UpdateOutcome::Done { .. } => {}
            }
            app.persist().await?;
        }

        Command::List(filter) => {
            let feeds = app.list(filter.as_deref());
            let unresolved = app.unresolved(filter.as_deref());
            if feeds.is_empty() && unresolved.is_empty() {
                match filter {
                    Some(arg) => println!(
                        "neither feed \"{}\" nor feed in channel \"{}\" found",
                        arg, arg
                    ),
                    None => println!("no feeds configured"),
                }
            }
            for feed in feeds {
                println!("{}", feed.config_line());
            }
            for line in unresolved {
                println!("{} (not read yet)", line);
            }
        }

        Command::Format { name, format } => {
            let feed = app.set_format(&name, &format)?;
            println!("format of feed \"{}\" is now \"{}\"", feed.name, feed.format);
            app.persist().await?;
        }

        Command::Update => {
            app.resolve_feeds().await?;
            let outcomes = app.update_all().await;
            println!("Updated {} feeds", outcomes.len());
            app.persist().await?;
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("unable to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
