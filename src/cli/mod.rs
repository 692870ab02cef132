mod once;
mod serve;

use anyhow::Result;
use console::style;

use crate::core::config::Settings;
use crate::core::terminal::{self, GuideSection, print_error};
use crate::logging::init_tracing;

use once::OnceTarget;

fn print_help() {
    terminal::print_banner();

    GuideSection::new("Service")
        .command("serve", "Run the scheduler and status API until Ctrl+C (default)")
        .text("  --host <addr>   Bind address for the status API")
        .text("  --port <port>   Port for the status API")
        .print();

    GuideSection::new("Maintenance")
        .command("run-once lifecycle", "Start and finish due events once")
        .command("run-once start", "Start due events once")
        .command("run-once finish", "Finish due events once")
        .command("run-once cleanup", "Delete expired events once")
        .command("config", "Print the effective configuration")
        .print();

    println!(
        "\n {} {} <command> [options]\n",
        style("Usage:").bold(),
        style("event-status").green()
    );
}

pub(crate) fn parse_serve_flags(
    args: &[String],
    start: usize,
    mut host: String,
    mut port: u16,
) -> (String, u16) {
    let mut i = start;
    while i < args.len() {
        match args[i].as_str() {
            "--port" | "-p" => {
                if i + 1 < args.len() {
                    port = args[i + 1].parse().unwrap_or(port);
                    i += 2;
                } else {
                    i += 1;
                }
            }
            "--host" => {
                if i + 1 < args.len() {
                    host = args[i + 1].clone();
                    i += 2;
                } else {
                    i += 1;
                }
            }
            _ => i += 1,
        }
    }
    (host, port)
}

pub async fn run_main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let cmd = args.get(1).map(String::as_str).unwrap_or("serve");

    match cmd {
        "help" | "--help" | "-h" => {
            print_help();
            Ok(())
        }
        "serve" | "--host" | "--port" | "-p" => {
            let mut settings = Settings::load()?;
            let start = if cmd == "serve" { 2 } else { 1 };
            (settings.host, settings.port) =
                parse_serve_flags(&args, start, settings.host, settings.port);
            init_tracing(settings.level()?);
            serve::run_service(settings).await
        }
        "run-once" => {
            let Some(target) = args.get(2) else {
                print_error("Missing run-once target. Expected: lifecycle, start, finish, cleanup");
                print_help();
                return Ok(());
            };
            let target: OnceTarget = target.parse()?;
            let settings = Settings::load()?;
            init_tracing(settings.level()?);
            once::run_once(&settings, target).await
        }
        "config" => {
            let settings = Settings::load()?;
            println!("{}", once::render_config(&settings)?);
            Ok(())
        }
        _ => {
            print_error(&format!("Unknown command: {}", cmd));
            print_help();
            Ok(())
        }
    }
}
