//! Standalone CLI tool for compiling and sending input markup.

use std::process::ExitCode;

use clap::{Args as ClapArgs, Parser, Subcommand};
use deskauto_core::errors::DeskAutoError;
use deskauto_core::keys::{KeyTable, StandardKeys};
use deskauto_core::sequence::{normalize_key_name, CompileOptions};
use deskauto_core::sink::{send_markup, DeliveryMode};
use deskauto_core::window::{self, WindowQuery};
use deskauto_core::{input, sequence};

#[derive(Parser)]
#[command(name = "dka-input", about = "Compile and send [...] input markup")]
struct Args {
    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(ClapArgs)]
struct Markup {
    /// Markup text, e.g. "Hello[Enter 2][^]a"
    text: String,
    /// Block open delimiter
    #[arg(long, default_value_t = '[')]
    open: char,
    /// Block close delimiter
    #[arg(long, default_value_t = ']')]
    close: char,
    /// Fail on modifier blocks with nothing after them
    #[arg(long)]
    strict: bool,
}

impl Markup {
    fn options(&self) -> CompileOptions {
        CompileOptions {
            open: self.open,
            close: self.close,
            strict_modifiers: self.strict,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Print the compiled event sequence as JSON
    Compile {
        #[command(flatten)]
        markup: Markup,
        /// Pretty-print the JSON
        #[arg(long)]
        pretty: bool,
    },
    /// Send markup to the focused window via SendInput
    Send {
        #[command(flatten)]
        markup: Markup,
        /// Hardware scan codes, one event at a time
        #[arg(long)]
        game: bool,
        /// Delay between events in game mode (ms)
        #[arg(long, requires = "game")]
        delay_ms: Option<u64>,
    },
    /// Post markup to a window found by title
    Post {
        #[command(flatten)]
        markup: Markup,
        /// Case-insensitive title substring
        #[arg(short, long)]
        window: String,
    },
    /// List windows that can receive input
    Windows {
        /// Case-insensitive title substring
        #[arg(short, long)]
        title: Option<String>,
    },
    /// Look up a key name in the key table
    Key {
        /// Key name, e.g. Enter, F5, 1, WheelUp
        name: String,
    },
}

fn print_json<T: serde::Serialize>(value: &T, pretty: bool) -> Result<(), DeskAutoError> {
    let json = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .map_err(|e| DeskAutoError::InputError(format!("JSON serialization failed: {e}")))?;
    println!("{json}");
    Ok(())
}

fn run(command: Command) -> Result<(), DeskAutoError> {
    match command {
        Command::Compile { markup, pretty } => {
            let events = sequence::compile_with(&markup.text, markup.options())?;
            print_json(&events, pretty)?;
        }
        Command::Send {
            markup,
            game,
            delay_ms,
        } => {
            let mode = if game {
                DeliveryMode::game_style(delay_ms)
            } else {
                DeliveryMode::Injected
            };
            let sink = input::injector(mode)?;
            let count = send_markup(&markup.text, markup.options(), sink.as_ref())?;
            println!("Sent {count} events");
        }
        Command::Post { markup, window } => {
            let target = window::find_window(&WindowQuery::title(window))?;
            let sink = input::poster(target.hwnd)?;
            let count = send_markup(&markup.text, markup.options(), sink.as_ref())?;
            println!(
                "Posted {count} events to \"{}\" (0x{:X})",
                target.title, target.hwnd
            );
        }
        Command::Windows { title } => {
            let query = WindowQuery {
                title,
                ..WindowQuery::default()
            };
            for w in window::find_windows(&query)? {
                let marker = if w.is_foreground { "*" } else { " " };
                println!("{marker} 0x{:08X} {:>6} {}", w.hwnd, w.pid, w.title);
            }
        }
        Command::Key { name } => match StandardKeys.resolve(&normalize_key_name(&name)) {
            Some(key) => print_json(&key, false)?,
            None => {
                return Err(DeskAutoError::InputError(format!("unknown key name `{name}`")));
            }
        },
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    match run(args.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("dka-input: {e}");
            ExitCode::FAILURE
        }
    }
}
