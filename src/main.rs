//! Redcode MARS - CLI Entry Point
//!
//! Commands:
//! - `mars-sim battle <warrior>...` - Load warriors into one core and fight
//! - `mars-sim asm <source>` - Assemble a warrior and print its listing

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use mars::{Event, Mars, MarsConfig, MarsState};

#[derive(Parser)]
#[command(name = "mars-sim")]
#[command(version = "0.1.0")]
#[command(about = "A battle simulator for Redcode warriors")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a match between the given warriors
    Battle {
        /// Paths to the warrior sources, in turn order
        #[arg(required = true)]
        warriors: Vec<PathBuf>,
        #[command(flatten)]
        limits: Limits,
        /// Seed for placement offsets (random if omitted)
        #[arg(short, long)]
        seed: Option<u64>,
        /// Print every executed instruction
        #[arg(short, long)]
        trace: bool,
        /// Print events as JSON lines
        #[arg(long)]
        json: bool,
        /// Dump occupied core cells after the match
        #[arg(long)]
        dump: bool,
    },
    /// Assemble a warrior and print its listing
    Asm {
        /// Path to the source file
        source: PathBuf,
        #[command(flatten)]
        limits: Limits,
    },
}

#[derive(Args)]
struct Limits {
    /// JSON file with match limits
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(long)]
    core_size: Option<usize>,
    #[arg(long)]
    max_cycles: Option<u64>,
    #[arg(long)]
    max_length: Option<usize>,
    #[arg(long)]
    max_tasks: Option<usize>,
}

impl Limits {
    fn resolve(&self) -> MarsConfig {
        let mut config = match &self.config {
            Some(path) => MarsConfig::load(path).unwrap_or_else(|e| fail(&format!("Failed to load config: {e}"))),
            None => MarsConfig::default(),
        };
        if let Some(v) = self.core_size {
            config.core_size = v;
        }
        if let Some(v) = self.max_cycles {
            config.max_cycles = v;
        }
        if let Some(v) = self.max_length {
            config.max_length = v;
        }
        if let Some(v) = self.max_tasks {
            config.max_tasks = v;
        }
        config
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Battle { warriors, limits, seed, trace, json, dump } => {
            battle(&warriors, limits.resolve(), seed, trace, json, dump);
        }
        Commands::Asm { source, limits } => {
            assemble_file(&source, &limits.resolve());
        }
    }
}

fn fail(message: &str) -> ! {
    eprintln!("❌ {message}");
    std::process::exit(1);
}

fn read_source(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap_or_else(|e| fail(&format!("Failed to read {}: {e}", path.display())))
}

fn battle(paths: &[PathBuf], config: MarsConfig, seed: Option<u64>, trace: bool, json: bool, dump: bool) {
    let created = match seed {
        Some(seed) => Mars::with_seed(config, seed),
        None => Mars::new(config),
    };
    let mut sim = created.unwrap_or_else(|e| fail(&e.to_string()));

    sim.subscribe(move |event| print_event(event, trace, json));

    for path in paths {
        let source = read_source(path);
        // Failures are reported through the event stream.
        let _ = sim.load_warrior(&source);
    }

    if sim.warriors().is_empty() {
        fail("No warriors loaded");
    }

    let state = sim.run().clone();

    if !json {
        println!();
        println!("━━━ Result ━━━");
        println!("Cycles: {}", sim.cycles());
        match state {
            MarsState::Won(name) => println!("Winner: {name}"),
            MarsState::Tie => println!("Tie"),
            MarsState::Running => {}
        }
    }

    if dump {
        print!("{}", mars::asm::dump_core(sim.core(), 0, sim.config().core_size));
    }
}

fn print_event(event: &Event, trace: bool, json: bool) {
    if matches!(event, Event::Step { .. }) && !trace {
        return;
    }

    if json {
        match serde_json::to_string(event) {
            Ok(line) => println!("{line}"),
            Err(e) => eprintln!("❌ Failed to encode event: {e}"),
        }
        return;
    }

    match event {
        Event::Step { warrior, address, instruction } => println!("{address:05}  {warrior:<16} {instruction}"),
        Event::Fault { warrior, address, message } => println!("⚠️  {warrior} faulted at {address}: {message}"),
        Event::Died { warrior } => println!("💀 {warrior} died"),
        Event::Won { warrior } => println!("🏆 {warrior} won"),
        Event::Tie { cycles } => println!("🤝 Tie after {cycles} cycles"),
        Event::Error { message } => eprintln!("❌ {message}"),
    }
}

fn assemble_file(path: &Path, config: &MarsConfig) {
    let source = read_source(path);

    if let Err(e) = config.validate() {
        fail(&e.to_string());
    }

    match mars::assemble(&source, config) {
        Ok(warrior) => print!("{}", mars::asm::listing(&warrior)),
        Err(e) => fail(&format!("Assembly error: {e}")),
    }
}
