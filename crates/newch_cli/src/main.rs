#![allow(missing_docs)]

use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod cmd;

#[derive(Parser)]
#[command(name = "newch", about = "Newton NSOF inspection and Dock sessions")]
struct Cli {
	/// Raise log verbosity (-v info, -vv debug, -vvv trace); RUST_LOG overrides.
	#[arg(short, long, action = ArgAction::Count, global = true)]
	verbose: u8,
	#[command(subcommand)]
	command: Commands,
}

#[derive(Subcommand)]
enum Commands {
	/// Decode NSOF objects from a file.
	Decode(cmd::decode::Args),
	/// Dock with a Newton and run the line prompt.
	Connect(cmd::connect::Args),
}

fn main() {
	let cli = Cli::parse();
	init_tracing(cli.verbose);

	if let Err(err) = run(cli.command) {
		eprintln!("error: {err}");
		std::process::exit(1);
	}
}

fn run(command: Commands) -> cmd::error::Result<()> {
	match command {
		Commands::Decode(args) => cmd::decode::run(args),
		Commands::Connect(args) => cmd::connect::run(args),
	}
}

fn init_tracing(verbose: u8) {
	let filter = if std::env::var_os("RUST_LOG").is_some() {
		EnvFilter::from_default_env()
	} else {
		let directive = match verbose {
			0 => "warn",
			1 => "info",
			2 => "debug",
			_ => "trace",
		};
		EnvFilter::new(directive)
	};

	tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}
