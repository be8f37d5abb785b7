use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "patrol")]
#[command(about = "Queue-driven browser session orchestrator")]
#[command(version)]
pub struct Cli {
    /// Increase verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Flags shared by `run` and forwarded to the subordinate by `schedule`.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Accounts file; the PATROL_ACCOUNTS env var wins when set
    #[arg(long, value_name = "FILE")]
    pub accounts: Option<PathBuf>,

    /// Shared queue endpoint
    #[arg(long, value_name = "URL")]
    pub queue_url: Option<String>,

    /// Target site root
    #[arg(long, value_name = "URL")]
    pub site_root: Option<String>,

    /// Session window per account, minutes
    #[arg(long, value_name = "MINS")]
    pub window_mins: Option<u64>,

    /// Run with a visible browser window
    #[arg(long)]
    pub headful: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run every configured account once, bounded to the session window
    Run(RunArgs),

    /// Launch the bounded run on a daily cadence, forever
    Schedule {
        #[command(flatten)]
        run: RunArgs,

        /// Launch hour in the target time zone (0-23)
        #[arg(long, default_value_t = 4)]
        hour: u32,

        /// Launch minute (0-59)
        #[arg(long, default_value_t = 15)]
        minute: u32,

        /// IANA time zone of the launch time
        #[arg(long, default_value = "Asia/Kolkata")]
        timezone: String,

        /// Rest between runs, hours
        #[arg(long, default_value_t = 25)]
        rest_hours: u64,

        /// Safety ceiling on one subordinate run, minutes
        #[arg(long, default_value_t = 65)]
        safety_mins: u64,

        /// Append cadence events to this file
        #[arg(long, value_name = "FILE")]
        event_log: Option<PathBuf>,
    },

    /// Inspect or edit the shared queue
    Queue {
        /// Shared queue endpoint
        #[arg(long, value_name = "URL")]
        queue_url: Option<String>,

        #[command(subcommand)]
        action: QueueAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum QueueAction {
    /// Print the queue, one address per line
    Show,
    /// Replace the whole queue with the given addresses
    Set { addresses: Vec<String> },
    /// Append addresses to the end of the queue
    Push {
        #[arg(required = true)]
        addresses: Vec<String>,
    },
    /// Empty the queue
    Clear,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_run_with_flags() {
        let cli = Cli::try_parse_from([
            "patrol",
            "run",
            "--accounts",
            "/tmp/accounts.json",
            "--window-mins",
            "30",
            "--headful",
        ])
        .unwrap();

        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.accounts, Some(PathBuf::from("/tmp/accounts.json")));
                assert_eq!(args.window_mins, Some(30));
                assert!(args.headful);
                assert!(args.queue_url.is_none());
            }
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn parse_schedule_defaults() {
        let cli = Cli::try_parse_from(["patrol", "schedule"]).unwrap();
        match cli.command {
            Commands::Schedule {
                hour,
                minute,
                timezone,
                rest_hours,
                safety_mins,
                event_log,
                ..
            } => {
                assert_eq!(hour, 4);
                assert_eq!(minute, 15);
                assert_eq!(timezone, "Asia/Kolkata");
                assert_eq!(rest_hours, 25);
                assert_eq!(safety_mins, 65);
                assert!(event_log.is_none());
            }
            _ => panic!("expected schedule command"),
        }
    }

    #[test]
    fn parse_queue_push() {
        let cli = Cli::try_parse_from([
            "patrol",
            "queue",
            "push",
            "https://site/threads/1",
            "https://site/threads/2",
        ])
        .unwrap();
        match cli.command {
            Commands::Queue { action: QueueAction::Push { addresses }, queue_url } => {
                assert_eq!(addresses.len(), 2);
                assert!(queue_url.is_none());
            }
            _ => panic!("expected queue push"),
        }
    }

    #[test]
    fn queue_push_requires_an_address() {
        assert!(Cli::try_parse_from(["patrol", "queue", "push"]).is_err());
    }

    #[test]
    fn verbose_flag_counts() {
        let cli = Cli::try_parse_from(["patrol", "-vv", "run"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn unknown_command_fails() {
        assert!(Cli::try_parse_from(["patrol", "wander"]).is_err());
    }
}
