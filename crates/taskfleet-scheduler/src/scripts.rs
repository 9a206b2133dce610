//! PowerShell script templates.
//!
//! Query strategies are data: each is a complete script plus the payload
//! kind the orchestrator should expect back. Mutation scripts are built by
//! substitution of caller-supplied values, every one of which is validated
//! against an allow-list first; quote, backtick and control characters are
//! rejected outright rather than escaped through.

use chrono::Timelike;

use taskfleet_core::{ExecutionStyle, TaskSpec, TriggerSpec};

/// Author heuristic for "manually created" tasks: a backslash in the author
/// (DOMAIN\user shape) and none of the known system-account patterns.
const AUTHOR_FILTER: &str = r#"$_.Author -like '*\*' -and
        $_.Author -notlike '*NT AUTHORITY*' -and
        $_.Author -notlike '*$(@%SystemRoot%*' -and
        $_.Author -notlike '*$(@%systemroot%*'"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    /// Output carries a JSON payload (possibly surrounded by noise).
    Json,
    /// Output is schtasks-style CSV with a header row.
    Csv,
    /// Output is only logged; never produces task records.
    Diagnostic,
}

#[derive(Debug, Clone)]
pub struct QueryStrategy {
    pub name: &'static str,
    pub kind: StrategyKind,
    pub script: String,
}

/// The fallback order discovery walks through. Progressively less detailed
/// and less reliable; the first strategy that yields a usable result wins.
pub fn strategies() -> Vec<QueryStrategy> {
    vec![typed_detailed(), typed_summary(), schtasks_csv(), wmi_diagnostic()]
}

/// Full detail via Get-ScheduledTask + Get-ScheduledTaskInfo, one JSON
/// object per task with a flattened trigger description. The count line in
/// front of the payload is deliberate; the parser must skim past it.
fn typed_detailed() -> QueryStrategy {
    let script = format!(
        r#"[Console]::OutputEncoding = [System.Text.Encoding]::UTF8
$manualTasks = Get-ScheduledTask | Where-Object {{
    {filter}
}}
"ManualTaskCount: $($manualTasks.Count)"
$result = @()
foreach ($task in $manualTasks) {{
    $nextRun = $null
    $lastRun = $null
    $lastResult = $null
    $taskInfo = Get-ScheduledTaskInfo -TaskName $task.TaskName -TaskPath $task.TaskPath -ErrorAction SilentlyContinue
    if ($taskInfo) {{
        if ($taskInfo.NextRunTime) {{ $nextRun = $taskInfo.NextRunTime.ToString("yyyy-MM-ddTHH:mm:ss") }}
        if ($taskInfo.LastRunTime) {{ $lastRun = $taskInfo.LastRunTime.ToString("yyyy-MM-ddTHH:mm:ss") }}
        if ($taskInfo.LastTaskResult -ne $null) {{ $lastResult = $taskInfo.LastTaskResult }}
    }}
    $result += [PSCustomObject]@{{
        TaskName = $task.TaskName
        State = [int]$task.State
        NextRunTime = $nextRun
        LastRunTime = $lastRun
        LastTaskResult = $lastResult
        Description = $task.Description
        TaskPath = $task.TaskPath
        Author = $task.Author
        Trigger = (($task.Triggers | ForEach-Object {{
            "Enabled: $($_.Enabled)`n" +
            "StartBoundary: $($_.StartBoundary)`n" +
            "EndBoundary: $($_.EndBoundary)`n" +
            "ExecutionTimeLimit: $($_.ExecutionTimeLimit)`n" +
            "Id: $($_.Id)`n" +
            "Repetition: $($_.Repetition)"
        }}) -join '; ')
    }}
}}
$result | ConvertTo-Json -Compress -Depth 3"#,
        filter = AUTHOR_FILTER
    );

    QueryStrategy { name: "typed-detailed", kind: StrategyKind::Json, script }
}

/// Lightweight two-field probe with the same author filter. Cheap on hosts
/// where the per-task info lookups of the detailed strategy are slow or
/// partially broken.
fn typed_summary() -> QueryStrategy {
    let script = format!(
        r#"[Console]::OutputEncoding = [System.Text.Encoding]::UTF8
Get-ScheduledTask | Where-Object {{
    {filter}
}} | Select-Object TaskName, @{{Name='State';Expression={{[int]$_.State}}}}, TaskPath |
ConvertTo-Json -Compress"#,
        filter = AUTHOR_FILTER
    );

    QueryStrategy { name: "typed-summary", kind: StrategyKind::Json, script }
}

/// schtasks CSV fallback for hosts where the typed cmdlet is unavailable
/// or returns nothing.
fn schtasks_csv() -> QueryStrategy {
    let script = r#"[Console]::OutputEncoding = [System.Text.Encoding]::UTF8
schtasks /query /fo csv /v 2>$null"#
        .to_string();

    QueryStrategy { name: "schtasks-csv", kind: StrategyKind::Csv, script }
}

/// Last resort: the WMI task-scheduler namespace, for diagnostic visibility
/// only when everything else failed.
fn wmi_diagnostic() -> QueryStrategy {
    let script = r#"[Console]::OutputEncoding = [System.Text.Encoding]::UTF8
try {
    $wmiTasks = Get-WmiObject -Class MSFT_ScheduledTask -Namespace "root\Microsoft\Windows\TaskScheduler" -ErrorAction Stop
    "WmiTaskCount: $($wmiTasks.Count)"
    $wmiTasks | Select-Object -First 5 | ForEach-Object { "TaskName: $($_.TaskName), TaskPath: '$($_.TaskPath)'" }
} catch {
    "WmiError: $($_.Exception.Message)"
}"#
    .to_string();

    QueryStrategy { name: "wmi-diagnostic", kind: StrategyKind::Diagnostic, script }
}

// ---------------------------------------------------------------------------
// Mutation scripts
// ---------------------------------------------------------------------------

/// Characters permitted in values interpolated into mutation scripts.
/// Everything that could terminate a PowerShell single-quoted string or
/// start an expression is absent on purpose.
fn is_allowed_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(c, ' ' | '_' | '-' | '.' | ',' | ':' | '\\' | '/' | '(' | ')' | '=')
        || (!c.is_ascii() && !c.is_control())
}

/// Validate one caller-supplied value before substitution. Returns the
/// operator-facing rejection message on failure.
pub fn ensure_safe(field: &str, value: &str) -> std::result::Result<(), String> {
    if value.is_empty() && field == "task_name" {
        return Err("task_name must not be empty".to_string());
    }
    match value.chars().find(|c| !is_allowed_char(*c)) {
        Some(bad) => Err(format!(
            "{} contains a forbidden character ({:?}); quote, backtick, dollar and control characters are not accepted",
            field, bad
        )),
        None => Ok(()),
    }
}

pub fn create_task(spec: &TaskSpec) -> std::result::Result<String, String> {
    ensure_safe("task_name", &spec.task_name)?;
    ensure_safe("run_as", &spec.run_as)?;
    let description = spec.description.clone().unwrap_or_default();
    ensure_safe("description", &description)?;

    let action = match &spec.execution {
        ExecutionStyle::Standard { program_path, arguments } => {
            ensure_safe("program_path", program_path)?;
            ensure_safe("arguments", arguments)?;
            format!(
                "New-ScheduledTaskAction -Execute '{}' -Argument '{}'",
                program_path, arguments
            )
        }
        ExecutionStyle::Interpreter { interpreter_path, script_path, arguments } => {
            ensure_safe("interpreter_path", interpreter_path)?;
            ensure_safe("script_path", script_path)?;
            ensure_safe("arguments", arguments)?;
            format!(
                "New-ScheduledTaskAction -Execute '{}' -Argument '{} {}'",
                interpreter_path, script_path, arguments
            )
        }
    };

    let trigger = match &spec.trigger {
        TriggerSpec::Daily { at } => format!(
            "New-ScheduledTaskTrigger -Daily -At {:02}:{:02}",
            at.hour(),
            at.minute()
        ),
        // Anything we cannot express registers a one-shot a minute out.
        TriggerSpec::Once => "New-ScheduledTaskTrigger -Once -At (Get-Date).AddMinutes(1)".to_string(),
    };

    let principal = format!(
        "New-ScheduledTaskPrincipal -UserId {} -RunLevel Highest",
        spec.run_as
    );

    Ok(format!(
        "$action = {action}; $trigger = {trigger}; $principal = {principal}; \
         Register-ScheduledTask -TaskName '{name}' -Description '{description}' \
         -Action $action -Trigger $trigger -Principal $principal",
        action = action,
        trigger = trigger,
        principal = principal,
        name = spec.task_name,
        description = description,
    ))
}

pub fn delete_task(task_name: &str) -> std::result::Result<String, String> {
    ensure_safe("task_name", task_name)?;
    Ok(format!(
        "Unregister-ScheduledTask -TaskName '{}' -Confirm:$false",
        task_name
    ))
}

pub fn set_enabled(task_name: &str, enabled: bool) -> std::result::Result<String, String> {
    ensure_safe("task_name", task_name)?;
    let cmdlet = if enabled { "Enable-ScheduledTask" } else { "Disable-ScheduledTask" };
    Ok(format!("{} -TaskName '{}'", cmdlet, task_name))
}

pub fn set_description(task_name: &str, description: &str) -> std::result::Result<String, String> {
    ensure_safe("task_name", task_name)?;
    ensure_safe("description", description)?;
    Ok(format!(
        "$task = Get-ScheduledTask -TaskName '{name}'; $task.Description = '{text}'; $task | Set-ScheduledTask",
        name = task_name,
        text = description,
    ))
}

pub fn run_task(task_name: &str) -> std::result::Result<String, String> {
    ensure_safe("task_name", task_name)?;
    Ok(format!("Start-ScheduledTask -TaskName '{}'", task_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;
    use taskfleet_core::{ExecutionStyle, TaskSpec, TriggerSpec};

    fn daily_spec(name: &str) -> TaskSpec {
        TaskSpec {
            task_name: name.to_string(),
            description: Some("Nightly backup".to_string()),
            run_as: "SYSTEM".to_string(),
            execution: ExecutionStyle::Standard {
                program_path: "C:\\bin\\backup.exe".to_string(),
                arguments: "--full".to_string(),
            },
            trigger: TriggerSpec::Daily { at: NaiveTime::from_hms_opt(3, 0, 0).unwrap() },
        }
    }

    #[test]
    fn create_script_contains_all_clauses() {
        let script = create_task(&daily_spec("NightlyBackup")).unwrap();
        assert!(script.contains("New-ScheduledTaskAction -Execute 'C:\\bin\\backup.exe'"));
        assert!(script.contains("New-ScheduledTaskTrigger -Daily -At 03:00"));
        assert!(script.contains("-RunLevel Highest"));
        assert!(script.contains("Register-ScheduledTask -TaskName 'NightlyBackup'"));
    }

    #[test]
    fn interpreter_style_prepends_script_path() {
        let mut spec = daily_spec("PyJob");
        spec.execution = ExecutionStyle::Interpreter {
            interpreter_path: "C:\\Python311\\python.exe".to_string(),
            script_path: "C:\\scripts\\job.py".to_string(),
            arguments: "--verbose".to_string(),
        };
        let script = create_task(&spec).unwrap();
        assert!(script.contains("-Argument 'C:\\scripts\\job.py --verbose'"));
    }

    #[test]
    fn unsupported_trigger_falls_back_to_one_shot() {
        let mut spec = daily_spec("OneShot");
        spec.trigger = TriggerSpec::Once;
        let script = create_task(&spec).unwrap();
        assert!(script.contains("-Once -At (Get-Date).AddMinutes(1)"));
    }

    #[test]
    fn quote_injection_is_rejected() {
        let mut spec = daily_spec("Evil' ; Remove-Item -Recurse C:\\ #");
        spec.description = None;
        let err = create_task(&spec).unwrap_err();
        assert!(err.contains("task_name"));

        assert!(delete_task("x'; schtasks /delete /tn *").is_err());
        assert!(set_description("Backup", "text`nwith$(expansion)").is_err());
    }

    #[test]
    fn empty_task_name_is_rejected() {
        assert!(delete_task("").is_err());
    }

    #[test]
    fn unicode_names_are_accepted() {
        // Fleet hosts carry Japanese task names.
        assert!(delete_task("夜間バックアップ").is_ok());
        assert!(run_task("日次レポート作成").is_ok());
    }

    #[test]
    fn strategies_are_ordered_most_detailed_first() {
        let list = strategies();
        assert_eq!(list[0].name, "typed-detailed");
        assert_eq!(list[0].kind, StrategyKind::Json);
        assert_eq!(list[2].kind, StrategyKind::Csv);
        assert_eq!(list[3].kind, StrategyKind::Diagnostic);
    }
}
