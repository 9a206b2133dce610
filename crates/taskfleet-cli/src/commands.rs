use anyhow::Result;
use chrono::NaiveTime;
use std::sync::Arc;

use crate::cli::Commands;
use taskfleet_ai::{ErrorContext, GeminiAnalyzer};
use taskfleet_core::display::{format_datetime, format_trigger, result_info, state_info};
use taskfleet_core::{
    AppConfig, CredentialStore, ErrorCatalog, ExecutionStyle, HostTarget, TaskRecord, TaskSpec,
    TriggerSpec,
};
use taskfleet_db::{Database, LogFilter};
use taskfleet_scheduler::{discover, scan_fleet, MutationOutcome, TaskAdmin};
use taskfleet_winrm::{PsExecutor, WinRmExecutor};

pub struct CliContext {
    pub config: AppConfig,
    pub credentials: CredentialStore,
    pub catalog: ErrorCatalog,
    pub db: Arc<Database>,
    pub analyzer: GeminiAnalyzer,
    pub actor: String,
}

impl CliContext {
    fn host(&self, name: &str) -> Result<&HostTarget> {
        self.config
            .host(name)
            .ok_or_else(|| anyhow::anyhow!("Host not found in configuration: {}", name))
    }

    fn executor(&self, host: &HostTarget) -> Result<WinRmExecutor> {
        let credential = self
            .credentials
            .lookup(&host.name)
            .ok_or_else(|| anyhow::anyhow!("No credential configured for host: {}", host.name))?
            .clone();
        Ok(WinRmExecutor::new(&host.name, &host.address, credential)?)
    }

    fn executor_arc(&self, host: &HostTarget) -> Option<Arc<dyn PsExecutor>> {
        match self.executor(host) {
            Ok(executor) => Some(Arc::new(executor)),
            Err(e) => {
                tracing::warn!(host = %host.name, "{}", e);
                None
            }
        }
    }
}

pub async fn execute(command: Commands, ctx: CliContext) -> Result<()> {
    match command {
        Commands::Hosts => {
            for host in ctx.config.list_hosts() {
                let group = host.group.as_deref().unwrap_or("-");
                println!("{:<20} {:<20} {}", host.name, host.address, group);
            }
        }

        Commands::Tasks { host } => {
            let target = ctx.host(&host)?;
            let executor = ctx.executor(target)?;
            let tasks = discover(&executor).await;

            if tasks.is_empty() {
                println!("No tasks found on {}", host);
            } else {
                print_task_table(&tasks, &ctx.catalog);
            }
        }

        Commands::Scan { limit } => {
            let scans = scan_fleet(
                ctx.config.list_hosts(),
                |host| ctx.executor_arc(host),
                limit,
            )
            .await;

            for scan in scans {
                match scan.skipped {
                    Some(reason) => println!("\n=== {} (skipped: {}) ===", scan.host.name, reason),
                    None => {
                        println!("\n=== {} ({} tasks) ===", scan.host.name, scan.tasks.len());
                        print_task_table(&scan.tasks, &ctx.catalog);
                    }
                }
            }
        }

        Commands::Create {
            host,
            name,
            program,
            args,
            interpreter,
            at,
            description,
            run_as,
        } => {
            let target = ctx.host(&host)?;
            let executor = ctx.executor(target)?;

            let execution = match interpreter {
                Some(interpreter_path) => ExecutionStyle::Interpreter {
                    interpreter_path,
                    script_path: program,
                    arguments: args,
                },
                None => ExecutionStyle::Standard { program_path: program, arguments: args },
            };

            let trigger = match at {
                Some(at) => {
                    let time = NaiveTime::parse_from_str(&at, "%H:%M")
                        .map_err(|_| anyhow::anyhow!("Invalid --at time (expected HH:MM): {}", at))?;
                    TriggerSpec::Daily { at: time }
                }
                None => TriggerSpec::Once,
            };

            let spec = TaskSpec { task_name: name, description, run_as, execution, trigger };

            let admin = TaskAdmin::new(&executor, ctx.db.as_ref(), &ctx.actor);
            report(admin.create(&spec).await?);
        }

        Commands::Delete { host, task } => {
            let target = ctx.host(&host)?;
            let executor = ctx.executor(target)?;
            let admin = TaskAdmin::new(&executor, ctx.db.as_ref(), &ctx.actor);
            report(admin.delete(&task).await?);
        }

        Commands::Enable { host, task } => {
            let target = ctx.host(&host)?;
            let executor = ctx.executor(target)?;
            let admin = TaskAdmin::new(&executor, ctx.db.as_ref(), &ctx.actor);
            report(admin.set_enabled(&task, true).await?);
        }

        Commands::Disable { host, task } => {
            let target = ctx.host(&host)?;
            let executor = ctx.executor(target)?;
            let admin = TaskAdmin::new(&executor, ctx.db.as_ref(), &ctx.actor);
            report(admin.set_enabled(&task, false).await?);
        }

        Commands::Run { host, task } => {
            let target = ctx.host(&host)?;
            let executor = ctx.executor(target)?;
            let admin = TaskAdmin::new(&executor, ctx.db.as_ref(), &ctx.actor);
            report(admin.run_now(&task).await?);
        }

        Commands::Describe { host, task, description } => {
            let target = ctx.host(&host)?;
            let executor = ctx.executor(target)?;
            let admin = TaskAdmin::new(&executor, ctx.db.as_ref(), &ctx.actor);
            report(admin.set_description(&task, &description).await?);
        }

        Commands::Logs { pc, task, limit } => {
            let filter = LogFilter {
                pc_name: pc,
                task_name: task,
                limit: Some(limit),
                ..LogFilter::default()
            };
            let logs = ctx.db.search_execution_logs(&filter).await?;

            if logs.is_empty() {
                println!("No matching execution logs");
            }
            for log in logs {
                let code = log
                    .result_code
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "-".to_string());
                let analyzed = if log.ai_analysis.is_some() { " [analyzed]" } else { "" };
                println!(
                    "#{:<6} {} {:<16} {:<24} code={:<8} {}{}",
                    log.log_id,
                    log.recorded_at.format("%Y/%m/%d %H:%M"),
                    log.pc_name,
                    log.task_name,
                    code,
                    log.result_message,
                    analyzed
                );
            }
        }

        Commands::Analyze { log_id } => {
            let log = ctx
                .db
                .get_execution_log(log_id)
                .await?
                .ok_or_else(|| anyhow::anyhow!("Execution log not found: {}", log_id))?;

            println!("Analyzing log #{} ({} / {})...", log_id, log.pc_name, log.task_name);
            let context = ErrorContext {
                pc_name: log.pc_name,
                task_name: log.task_name,
                result_code: log.result_code,
                result_message: log.result_message,
            };
            let analysis = ctx.analyzer.analyze(&context).await;
            ctx.db.update_ai_analysis(log_id, &analysis).await?;

            println!("\n{}", analysis);
        }

        Commands::Audit { limit } => {
            for entry in ctx.db.get_audit_logs(limit).await? {
                println!(
                    "{} {:<12} {:<20} {:<16} {:<24} {}",
                    entry.timestamp.format("%Y/%m/%d %H:%M"),
                    entry.user_identifier,
                    entry.action_type,
                    entry.target_pc,
                    entry.target_task,
                    entry.details
                );
            }
        }

        Commands::Stats => {
            let stats = ctx.db.get_aggregate_stats().await?;
            println!("Execution logs:  {}", stats.total_logs);
            println!("  failed:        {}", stats.failed_logs);
            println!("  analyzed:      {}", stats.analyzed_logs);
            println!("Distinct hosts:  {}", stats.distinct_hosts);
            println!("Audit entries:   {}", stats.audit_entries);
        }
    }

    Ok(())
}

fn report(outcome: MutationOutcome) {
    if outcome.success {
        println!("✓ {}", if outcome.message.trim().is_empty() { "OK" } else { outcome.message.trim() });
    } else {
        println!("✗ {}", outcome.message.trim());
    }
}

fn print_task_table(tasks: &[TaskRecord], catalog: &ErrorCatalog) {
    println!(
        "{:<32} {:<10} {:<28} {:<17} {:<17} {}",
        "Task", "State", "Last result", "Next run", "Last run", "Trigger"
    );
    for task in tasks {
        let state = state_info(task.state);
        let result = result_info(task, catalog);
        let trigger = task
            .trigger_raw
            .as_deref()
            .map(format_trigger)
            .unwrap_or_else(|| "Not set".to_string());
        println!(
            "{:<32} {:<10} {:<28} {:<17} {:<17} {}",
            task.task_name,
            state.label,
            result.label,
            format_datetime(task.next_run_time),
            format_datetime(task.last_run_time),
            trigger
        );
    }
}
