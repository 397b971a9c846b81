use std::io::IsTerminal;

use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use gamerepo_core::{CommandStatus, ExecutionOutcome};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

mod cli;
mod dispatch;
mod style;

pub use cli::*;
use style::Style;

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = GamerepoCli::parse();
    init_tracing(cli.trace, cli.verbose);

    let (name, outcome) = dispatch::execute(&cli).map_err(|err| eyre!("{err:?}"))?;
    let code = emit_output(&cli, name, &outcome)?;

    if code == 0 {
        Ok(())
    } else {
        std::process::exit(code);
    }
}

fn init_tracing(trace: bool, verbose: u8) {
    let level = if trace {
        "trace"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "gamerepo={level},gamerepo_cli={level},gamerepo_core={level},gamerepo_domain={level}"
        ))
    });
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn emit_output(cli: &GamerepoCli, name: &str, outcome: &ExecutionOutcome) -> Result<i32> {
    let code = outcome.exit_code();

    if cli.json {
        let payload = gamerepo_core::to_json_response(name, outcome);
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(code);
    }

    let style = Style::new(cli.no_color, std::io::stdout().is_terminal());
    let message = gamerepo_core::format_status_message(name, &outcome.message);
    if outcome.status != CommandStatus::Ok {
        eprintln!("{}", style.status(outcome.status, &message));
        if let Some(hint) = detail_str(&outcome.details, "hint") {
            eprintln!("{}", style.info(&format!("Hint: {hint}")));
        }
        if let Some(stderr) = detail_str(&outcome.details, "stderr").filter(|s| !s.is_empty()) {
            eprintln!("{}", style.dimmed(stderr.trim_end()));
        }
        return Ok(code);
    }
    print_skipped(&style, &outcome.details);
    if cli.quiet {
        return Ok(code);
    }

    println!("{}", style.status(outcome.status, &message));
    if let Some(table) = render_package_table(&style, &outcome.details) {
        println!("{table}");
    }
    for (key, label) in [("added", "+"), ("removed", "-")] {
        let Some(entries) = outcome.details.get(key).and_then(Value::as_array) else {
            continue;
        };
        for entry in entries {
            let id = entry.get("id").and_then(Value::as_str).unwrap_or_default();
            let title = entry.get("title").and_then(Value::as_str).unwrap_or_default();
            println!("{label} {id}  {title}");
        }
    }

    Ok(code)
}

fn print_skipped(style: &Style, details: &Value) {
    for (key, location, label) in [
        ("rejected", "directory", "skipped"),
        ("warnings", "path", "warning"),
    ] {
        let Some(entries) = details.get(key).and_then(Value::as_array) else {
            continue;
        };
        for entry in entries {
            let location = entry.get(location).and_then(Value::as_str).unwrap_or_default();
            let error = entry.get("error").and_then(Value::as_str).unwrap_or_default();
            eprintln!("{}", style.dimmed(&format!("{label} {location}: {error}")));
        }
    }
}

fn detail_str<'a>(details: &'a Value, key: &str) -> Option<&'a str> {
    details
        .as_object()
        .and_then(|map| map.get(key))
        .and_then(Value::as_str)
}

struct PackageRow {
    id: String,
    title: String,
    state: String,
    os: String,
}

fn render_package_table(style: &Style, details: &Value) -> Option<String> {
    let packages = details.get("packages")?.as_array()?;
    if packages.is_empty() {
        return None;
    }

    let mut rows = Vec::new();
    for pkg in packages {
        let obj = pkg.as_object()?;
        let installed = obj.get("installed").and_then(Value::as_bool).unwrap_or(false);
        let running = obj.get("running").and_then(Value::as_bool).unwrap_or(false);
        let state = match (installed, running) {
            (true, true) => "installed, running",
            (true, false) => "installed",
            (false, true) => "running",
            (false, false) => "-",
        };
        let os = obj
            .get("compatible_os")
            .and_then(Value::as_array)
            .map(|tags| {
                tags.iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join(",")
            })
            .filter(|tags| !tags.is_empty())
            .unwrap_or_else(|| "-".to_string());
        rows.push(PackageRow {
            id: obj.get("id")?.as_str()?.to_string(),
            title: obj.get("title")?.as_str()?.to_string(),
            state: state.to_string(),
            os,
        });
    }

    Some(format_package_table(style, &rows))
}

fn format_package_table(style: &Style, rows: &[PackageRow]) -> String {
    let headers = ["Id", "Title", "State", "OS"];
    let mut widths = headers.map(str::len);
    for row in rows {
        widths[0] = widths[0].max(row.id.len());
        widths[1] = widths[1].max(row.title.chars().count());
        widths[2] = widths[2].max(row.state.len());
        widths[3] = widths[3].max(row.os.len());
    }

    let line = |cells: [&str; 4]| {
        format!(
            "{:<w0$}  {:<w1$}  {:<w2$}  {}",
            cells[0],
            cells[1],
            cells[2],
            cells[3],
            w0 = widths[0],
            w1 = widths[1],
            w2 = widths[2],
        )
    };

    let mut lines = vec![style.table_header(&line(headers))];
    lines.push(format!(
        "{:-<w0$}  {:-<w1$}  {:-<w2$}  {:-<w3$}",
        "",
        "",
        "",
        "",
        w0 = widths[0],
        w1 = widths[1],
        w2 = widths[2],
        w3 = widths[3],
    ));
    for row in rows {
        lines.push(line([&row.id, &row.title, &row.state, &row.os]));
    }
    lines.join("\n")
}
