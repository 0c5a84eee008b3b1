use clap::{Arg, ArgAction, ArgMatches, Command};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tokio::sync::mpsc;

use netdiag::{
    config::DiagConfig,
    output::{OutputConfig, OutputFormat, OutputManager, ReportStore},
    scanner::{PortScanner, ScanProgress},
    utils::{parse_host_list, parse_port_spec, Logger},
    Diagnostician,
};

fn print_banner() {
    println!("{}", "=".repeat(50).bright_blue());
    println!("{}", "        NETWORK TROUBLESHOOTING TOOLKIT".bright_white().bold());
    println!("{}", "=".repeat(50).bright_blue());
    println!();
}

fn target_arg() -> Arg {
    Arg::new("target")
        .value_name("TARGET")
        .help("Hostname or IP address")
        .required(true)
        .index(1)
}

fn build_cli() -> Command {
    Command::new("netdiag")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Reachability, DNS, traceroute and TCP port diagnostics for a host")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file (defaults to ~/.netdiag.toml)")
                .value_parser(clap::value_parser!(PathBuf))
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable debug logging")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .arg(
            Arg::new("no-color")
                .long("no-color")
                .help("Disable colored output")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("FORMAT")
                .help("Output format: text or json")
                .default_value("text")
                .global(true),
        )
        .subcommand(
            Command::new("ping")
                .about("Check reachability with the system ping tool")
                .arg(target_arg())
                .arg(
                    Arg::new("count")
                        .short('n')
                        .long("count")
                        .value_name("COUNT")
                        .help("Echo requests to send")
                        .value_parser(clap::value_parser!(u32).range(1..)),
                ),
        )
        .subcommand(
            Command::new("trace")
                .about("Trace the route to a host")
                .arg(target_arg()),
        )
        .subcommand(
            Command::new("dns")
                .about("Forward and reverse name lookup")
                .arg(target_arg()),
        )
        .subcommand(
            Command::new("scan")
                .about("TCP connect scan")
                .arg(target_arg())
                .arg(
                    Arg::new("ports")
                        .short('p')
                        .long("ports")
                        .value_name("PORTS")
                        .help("Ports to scan, e.g. 80, 20-100 or 22,80,443 (default: well-known ports)"),
                )
                .arg(
                    Arg::new("timeout")
                        .short('t')
                        .long("timeout")
                        .value_name("MS")
                        .help("Per-port connect timeout in milliseconds")
                        .value_parser(clap::value_parser!(u64).range(1..)),
                )
                .arg(
                    Arg::new("concurrency")
                        .short('j')
                        .long("concurrency")
                        .value_name("N")
                        .help("Simultaneous connection attempts")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    Arg::new("show-closed")
                        .long("show-closed")
                        .help("List closed ports too")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("report")
                .about("Run DNS, ping and port scan and save a JSON report")
                .arg(target_arg())
                .arg(
                    Arg::new("deadline")
                        .short('d')
                        .long("deadline")
                        .value_name("MS")
                        .help("Abandon stages still running after this many milliseconds")
                        .value_parser(clap::value_parser!(u64).range(1..)),
                )
                .arg(
                    Arg::new("report-dir")
                        .long("report-dir")
                        .value_name("DIR")
                        .help("Directory the report is written into")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("no-save")
                        .long("no-save")
                        .help("Print the report without writing it")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("batch")
                .about("Ping several hosts and summarise")
                .arg(
                    Arg::new("hosts")
                        .value_name("HOSTS")
                        .help("Comma-separated host list")
                        .required(true)
                        .index(1),
                ),
        )
        .subcommand(Command::new("menu").about("Interactive menu (default)"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = build_cli().get_matches();

    Logger::init(Logger::level_for(matches.get_flag("verbose")));

    let no_color = matches.get_flag("no-color");
    if no_color {
        colored::control::set_override(false);
    }

    let format = match matches.get_one::<String>("output") {
        Some(name) => name
            .parse::<OutputFormat>()
            .map_err(|e| anyhow::anyhow!(e))?,
        None => OutputFormat::Text,
    };

    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => DiagConfig::from_toml_file(path)?,
        None => DiagConfig::load_default_config(),
    };

    let output_config = OutputConfig {
        format,
        colored: !no_color,
        show_closed: false,
    };

    match matches.subcommand() {
        Some(("ping", sub)) => {
            if let Some(&count) = sub.get_one::<u32>("count") {
                config.ping_count = count;
            }
            let diag = Diagnostician::new(config)?;
            run_ping(&diag, &OutputManager::new(output_config), target(sub)?).await;
        }
        Some(("trace", sub)) => {
            let diag = Diagnostician::new(config)?;
            run_trace(&diag, &OutputManager::new(output_config), target(sub)?).await;
        }
        Some(("dns", sub)) => {
            let diag = Diagnostician::new(config)?;
            run_dns(&diag, &OutputManager::new(output_config), target(sub)?).await;
        }
        Some(("scan", sub)) => {
            if let Some(&timeout) = sub.get_one::<u64>("timeout") {
                config = config.with_port_timeout(timeout);
            }
            if let Some(&concurrency) = sub.get_one::<usize>("concurrency") {
                config = config.with_concurrency(concurrency);
            }
            config.validate()?;

            let ports = sub.get_one::<String>("ports").map(String::as_str);
            let output = OutputManager::new(OutputConfig {
                show_closed: sub.get_flag("show-closed"),
                ..output_config
            });
            run_scan(&config, &output, target(sub)?, ports).await?;
        }
        Some(("report", sub)) => {
            if let Some(&deadline) = sub.get_one::<u64>("deadline") {
                config = config.with_deadline(deadline);
            }
            if let Some(dir) = sub.get_one::<PathBuf>("report-dir") {
                config = config.with_report_dir(dir.clone());
            }
            let diag = Diagnostician::new(config)?;
            let save = !sub.get_flag("no-save");
            run_report(&diag, &OutputManager::new(output_config), target(sub)?, save).await?;
        }
        Some(("batch", sub)) => {
            let hosts = sub
                .get_one::<String>("hosts")
                .map(|h| parse_host_list(h))
                .unwrap_or_default();
            let diag = Diagnostician::new(config)?;
            run_batch(&diag, &OutputManager::new(output_config), &hosts).await;
        }
        _ => {
            let diag = Diagnostician::new(config)?;
            run_menu(&diag, &OutputManager::new(output_config)).await?;
        }
    }

    Ok(())
}

fn target(matches: &ArgMatches) -> anyhow::Result<&str> {
    matches
        .get_one::<String>("target")
        .map(String::as_str)
        .ok_or_else(|| anyhow::anyhow!("missing target"))
}

async fn run_ping(diag: &Diagnostician, output: &OutputManager, target: &str) {
    println!("{} {}...", "[~] Pinging".bright_blue(), target.bright_cyan());
    let record = diag.probe(target).await;
    print!("{}", output.render_probe(&record));
}

async fn run_trace(diag: &Diagnostician, output: &OutputManager, target: &str) {
    println!(
        "{} {}...",
        "[~] Tracing route to".bright_blue(),
        target.bright_cyan()
    );
    let outcome = diag.trace(target).await;
    print!("{}", output.render_trace(target, &outcome));
}

async fn run_dns(diag: &Diagnostician, output: &OutputManager, target: &str) {
    let result = diag.resolve(target).await;
    print!("{}", output.render_resolution(&result));
}

async fn run_scan(
    config: &DiagConfig,
    output: &OutputManager,
    target: &str,
    ports: Option<&str>,
) -> anyhow::Result<()> {
    let ports = match ports {
        Some(spec) => parse_port_spec(spec)?,
        None => netdiag::well_known_ports(),
    };

    println!(
        "{} {} ({} ports)...",
        "[~] Scanning".bright_blue(),
        target.bright_cyan(),
        ports.len()
    );

    let (tx, rx) = mpsc::unbounded_channel();
    let scanner = PortScanner::new(config.port_timeout(), config.scan_concurrency).with_progress(tx);
    let bar = spawn_progress(ports.len(), rx, output.format() == OutputFormat::Text);

    let results = scanner
        .scan(target, ports, config.port_timeout(), config.scan_concurrency)
        .await;
    drop(scanner);
    let _ = bar.await;

    print!("{}", output.render_ports(target, &results?));
    Ok(())
}

/// Drive an indicatif bar from scanner progress until the sender is dropped
fn spawn_progress(
    total: usize,
    mut rx: mpsc::UnboundedReceiver<ScanProgress>,
    visible: bool,
) -> tokio::task::JoinHandle<()> {
    let bar = if visible {
        ProgressBar::new(total as u64)
    } else {
        ProgressBar::hidden()
    };
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ports ({eta})")
    {
        bar.set_style(style.progress_chars("#>-"));
    }

    tokio::spawn(async move {
        while let Some(progress) = rx.recv().await {
            bar.set_position(progress.completed as u64);
        }
        bar.finish_and_clear();
    })
}

async fn run_report(
    diag: &Diagnostician,
    output: &OutputManager,
    target: &str,
    save: bool,
) -> anyhow::Result<()> {
    println!(
        "{} {}...",
        "[~] Generating report for".bright_blue(),
        target.bright_cyan()
    );
    let report = diag.diagnose(target).await?;
    print!("{}", output.render_report(&report));

    if save {
        let store = ReportStore::new(diag.config().report_dir.clone());
        let path = store.save(&report)?;
        println!(
            "{} {}",
            "[✓] Report saved to".bright_green(),
            path.display().to_string().bright_white()
        );
    }
    Ok(())
}

async fn run_batch(diag: &Diagnostician, output: &OutputManager, hosts: &[String]) {
    if hosts.is_empty() {
        println!("{}", "[!] No hosts given".bright_yellow());
        return;
    }

    println!(
        "{} {} hosts...",
        "[~] Pinging".bright_blue(),
        hosts.len()
    );
    let summary = diag.probe_batch(hosts).await;
    print!("{}", output.render_batch(&summary));
}

fn prompt(text: &str) -> io::Result<Option<String>> {
    print!("{}", text);
    io::stdout().flush()?;

    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

async fn run_menu(diag: &Diagnostician, output: &OutputManager) -> anyhow::Result<()> {
    print_banner();

    loop {
        println!("1. Ping Test");
        println!("2. Traceroute");
        println!("3. DNS Lookup");
        println!("4. Port Scan");
        println!("5. Generate Full Report");
        println!("6. Batch Ping Test");
        println!("7. Exit");

        let Some(choice) = prompt("\nSelect an option (1-7): ")? else {
            break;
        };

        match choice.as_str() {
            "1" | "2" | "3" | "4" | "5" => {
                let Some(host) = prompt("Enter hostname or IP: ")? else {
                    break;
                };
                match choice.as_str() {
                    "1" => run_ping(diag, output, &host).await,
                    "2" => run_trace(diag, output, &host).await,
                    "3" => run_dns(diag, output, &host).await,
                    "4" => {
                        let Some(spec) = prompt("Port range (e.g. 20-100, blank for well-known): ")?
                        else {
                            break;
                        };
                        let ports = Some(spec.as_str()).filter(|s| !s.is_empty());
                        if let Err(e) = run_scan(diag.config(), output, &host, ports).await {
                            eprintln!("{} {}", "[!]".bright_red(), e);
                        }
                    }
                    _ => {
                        let save = prompt("Save report to file? (y/n): ")?
                            .map(|answer| answer.eq_ignore_ascii_case("y"))
                            .unwrap_or(false);
                        if let Err(e) = run_report(diag, output, &host, save).await {
                            eprintln!("{} {}", "[!]".bright_red(), e);
                        }
                    }
                }
            }
            "6" => {
                let Some(list) = prompt("Enter hosts separated by commas: ")? else {
                    break;
                };
                run_batch(diag, output, &parse_host_list(&list)).await;
            }
            "7" => break,
            other => println!("{} {}", "[!] Invalid option:".bright_yellow(), other),
        }
        println!();
    }

    println!("Goodbye!");
    Ok(())
}
