use clap::{App, Arg, ArgMatches, SubCommand};
use colored::*;
use satos::shell::{self, Reply, ShellCommand};
use satos::{DescriptorStore, Event, EventBus, SatelliteAgent, SatelliteLimits, Topic};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

const DEFAULT_MODULES_DIR: &str = "spa_modules";
const PROMPT: &str = "sat> ";

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let matches = App::new("satos")
        .version("0.1.0")
        .author("Space Systems Engineering Team")
        .about("🛰️  Satellite OS - plug-and-play module admission and mode orchestration")
        .arg(
            Arg::with_name("modules")
                .short("m")
                .long("modules")
                .value_name("DIR")
                .help("Directory of module descriptor JSON files")
                .takes_value(true)
                .default_value(DEFAULT_MODULES_DIR),
        )
        .arg(
            Arg::with_name("limits")
                .short("l")
                .long("limits")
                .value_name("FILE")
                .help("JSON file overriding the satellite limits")
                .takes_value(true),
        )
        .subcommand(
            SubCommand::with_name("shell")
                .about("🖥️  Interactive operator shell")
                .long_about("Boots from the modules directory, then reads operator commands from stdin"),
        )
        .subcommand(
            SubCommand::with_name("run")
                .about("▶️  Boot and replay an event script")
                .arg(
                    Arg::with_name("events")
                        .help("JSON-lines file of {\"topic\", \"payload\"} events")
                        .required(false),
                ),
        )
        .get_matches();

    let limits = match matches.value_of("limits") {
        Some(path) => SatelliteLimits::from_path(path)?,
        None => SatelliteLimits::default(),
    };
    let store = DescriptorStore::open(matches.value_of("modules").unwrap_or(DEFAULT_MODULES_DIR))?;

    match matches.subcommand() {
        ("run", Some(sub)) => {
            init_tracing("info");
            run_batch(limits, &store, sub)
        }
        _ => {
            init_tracing("warn");
            run_shell(limits, &store).await
        }
    }
}

fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn boot(limits: SatelliteLimits, store: &DescriptorStore) -> Result<SatelliteAgent, Box<dyn std::error::Error>> {
    let agent = SatelliteAgent::with_observers(limits, attach_console);

    agent.publish(Event::log("Booting satellite OS..."));
    let joined = agent.boot_from_store(store)?;
    println!(
        "{} {} module(s) joined from {}",
        "✓".bright_green(),
        joined,
        store.dir().display()
    );
    Ok(agent)
}

fn attach_console(bus: &EventBus) {
    for topic in Topic::ALL {
        bus.subscribe(topic, |_, event| {
            let line = event.to_string();
            let styled = match event.topic() {
                Topic::ModuleJoined => line.bright_green(),
                Topic::ModuleQuarantined => line.bright_red(),
                Topic::ModuleRemoved => line.yellow(),
                Topic::ModeChanged => line.bright_cyan().bold(),
                Topic::Anomaly => line.red(),
                Topic::Log => line.dimmed(),
                Topic::SpaceWeather | Topic::NextPass => line.bright_blue(),
            };
            println!("{styled}");
        });
    }
}

fn run_batch(
    limits: SatelliteLimits,
    store: &DescriptorStore,
    matches: &ArgMatches,
) -> Result<(), Box<dyn std::error::Error>> {
    let agent = boot(limits, store)?;

    if let Some(path) = matches.value_of("events") {
        let file = std::fs::File::open(path)?;
        let published = agent.replay(std::io::BufReader::new(file))?;
        println!("{} replayed {} event(s)", "✓".bright_green(), published);
    }

    println!("{}", agent.status_report());
    Ok(())
}

async fn run_shell(limits: SatelliteLimits, store: &DescriptorStore) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", "🛰️  Satellite OS".bright_blue().bold());
    let agent = boot(limits, store)?;
    println!("\nType 'help' to see commands.\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{}", PROMPT);
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            println!("\nExiting.");
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        let command = match line.parse::<ShellCommand>() {
            Ok(command) => command,
            Err(e) => {
                println!("{}", e.to_string().yellow());
                continue;
            }
        };

        let reply = match shell::execute(&agent, store, command) {
            Ok(reply) => reply,
            Err(e) => {
                println!("{} {}", "❌".red(), e.to_string().bright_red());
                continue;
            }
        };

        match reply {
            Reply::Done => {}
            Reply::Text(text) => println!("{text}"),
            Reply::Quit => {
                println!("Bye.");
                break;
            }
            Reply::AwaitDocument { save } => {
                println!("Paste JSON (end with an empty line):");
                let mut document = Vec::new();
                while let Some(pasted) = lines.next_line().await? {
                    if pasted.trim().is_empty() {
                        break;
                    }
                    document.push(pasted);
                }

                match shell::submit_document(&agent, store, &document.join("\n"), save) {
                    Ok((Reply::Text(text), _)) => println!("{text}"),
                    Ok(_) => {}
                    Err(e) => println!("{} {}", "❌".red(), e.to_string().bright_red()),
                }
            }
        }
    }

    Ok(())
}
