use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "taskfleet")]
#[command(about = "TaskFleet - Windows scheduled task administration over WinRM", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Fleet configuration file
    #[arg(long, env = "CONFIG_PATH", default_value = "config.json")]
    pub config: String,

    /// Credentials file
    #[arg(long, env = "CREDENTIALS_PATH", default_value = "credentials.json")]
    pub credentials: String,

    /// Error code catalog file
    #[arg(long, env = "ERROR_CODES_PATH", default_value = "error_codes.json")]
    pub error_codes: String,

    /// Database URL
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite:logs.db")]
    pub database_url: String,

    /// Acting user recorded in the audit trail
    #[arg(long, env = "TASKFLEET_USER", default_value = "cli")]
    pub user: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List configured hosts
    Hosts,

    /// List scheduled tasks on one host
    Tasks {
        /// Host name from the configuration
        host: String,
    },

    /// Scan the whole fleet
    Scan {
        /// Concurrent host limit
        #[arg(long, default_value = "8")]
        limit: usize,
    },

    /// Create a scheduled task
    Create {
        /// Host name from the configuration
        host: String,

        /// Task name
        #[arg(long)]
        name: String,

        /// Program to run (or the script when --interpreter is given)
        #[arg(long)]
        program: String,

        /// Program arguments
        #[arg(long, default_value = "")]
        args: String,

        /// Run the program through this interpreter
        #[arg(long)]
        interpreter: Option<String>,

        /// Daily start time (HH:MM); omitted means a one-shot task
        #[arg(long)]
        at: Option<String>,

        /// Task description
        #[arg(long)]
        description: Option<String>,

        /// Account the task runs under
        #[arg(long, default_value = "SYSTEM")]
        run_as: String,
    },

    /// Delete a scheduled task
    Delete {
        /// Host name from the configuration
        host: String,

        /// Task name
        task: String,
    },

    /// Enable a scheduled task
    Enable {
        host: String,
        task: String,
    },

    /// Disable a scheduled task
    Disable {
        host: String,
        task: String,
    },

    /// Run a scheduled task immediately
    Run {
        host: String,
        task: String,
    },

    /// Update a task's description
    Describe {
        host: String,
        task: String,

        /// New description
        description: String,
    },

    /// Search execution logs
    Logs {
        /// Filter by PC name (substring)
        #[arg(long)]
        pc: Option<String>,

        /// Filter by task name (substring)
        #[arg(long)]
        task: Option<String>,

        /// Limit number of results
        #[arg(long, default_value = "20")]
        limit: i64,
    },

    /// Run AI analysis for one stored failure
    Analyze {
        /// Execution log id
        log_id: i64,
    },

    /// Show recent audit entries
    Audit {
        /// Limit number of results
        #[arg(long, default_value = "20")]
        limit: i64,
    },

    /// Show aggregate statistics
    Stats,
}
