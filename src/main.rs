//! siglog maintenance CLI.
//!
//! The logger daemon itself is embedded in a host network loop; this binary
//! covers offline maintenance against the same store:
//!
//!   siglog <config.json> status        - print log size and root hash
//!   siglog <config.json> save          - persist the pending subtrees
//!   siglog <config.json> prove <seq>   - print an existence proof as hex

use std::process::ExitCode;

use tracing::error;

use siglog::logger::{Logger, TimestampPolicy};
use siglog::{init_logging, LogLevel, LoggerConfig};

fn main() -> ExitCode {
    if init_logging(LogLevel::Info, false).is_err() {
        eprintln!("failed to initialize logging");
        return ExitCode::FAILURE;
    }

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        print_usage();
        return ExitCode::FAILURE;
    }

    match run(&args[1], &args[2], &args[3..]) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn print_usage() {
    println!("siglog - auditable signature log maintenance");
    println!();
    println!("Usage:");
    println!("  siglog <config.json> status        Print log size and root hash");
    println!("  siglog <config.json> save          Persist the pending subtrees");
    println!("  siglog <config.json> prove <seq>   Print an existence proof as hex");
    println!();
    println!("Environment Variables:");
    println!("  SIGLOG_DB_DIR       Override the store directory");
    println!("  SIGLOG_LOG_LEVEL    Logging level (trace, debug, info, warn, error)");
}

fn run(config_path: &str, command: &str, args: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let config = LoggerConfig::load(config_path)?;
    let policy = Box::new(TimestampPolicy::from_config(&config.policy));
    let mut logger = Logger::new(&config, policy)?;

    match command {
        "status" => {
            println!("logger:    {}", config.logger_name);
            println!("db dir:    {}", config.db_dir.display());
            println!("leaves:    {}", logger.next_leaf_seq_no());
            match logger.root_hash() {
                Some(hash) => println!("root hash: {}", hex::encode(hash)),
                None => println!("root hash: (empty log)"),
            }
        }
        "save" => {
            logger.save_pending_tree()?;
            println!("saved pending subtrees");
        }
        "prove" => {
            let seq_no: u64 = args
                .first()
                .ok_or("prove requires a leaf sequence number")?
                .parse()?;
            let proofs = logger.get_existence_proof(seq_no)?;
            if proofs.is_empty() {
                return Err(format!("leaf {seq_no} is not in the log").into());
            }
            for record in proofs {
                println!("{}", hex::encode(record.encode()));
            }
        }
        _ => {
            print_usage();
            return Err(format!("unknown command: {command}").into());
        }
    }
    Ok(())
}
