#![deny(clippy::all)]

use std::env;
use std::process::ExitCode;

use clap::Parser;
use jello::cli::{Cli, Command, Mode};
use jello::config::Config;
use jello::{cli, driver};

fn main() -> anyhow::Result<ExitCode> {
    let cwd = env::current_dir()?;
    let config = Config::resolve(&cwd);

    let argv0 = env::args().next().unwrap_or_default();
    let _logging_guard = jello::logging::init(Some(config.log_level), config.silent, None);

    match cli::bin_dispatch(&argv0) {
        Mode::CcWrapper(lang) => {
            let args: Vec<String> = env::args().skip(1).collect();
            let code = driver::run_passthrough(lang, &args)?;
            Ok(exit_code(code))
        }
        Mode::LdReplacement => {
            let args: Vec<String> = env::args().skip(1).collect();
            match driver::run_pipeline(&args, &config) {
                Ok(outcome) => {
                    if config.dry_run {
                        println!("{}", jello::execute::dry_run(&outcome.plan));
                    }
                    Ok(exit_code(outcome.exit_code))
                }
                Err(e) => {
                    eprintln!("{argv0}: {e}");
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Mode::Direct => run_direct(&config),
    }
}

fn run_direct(config: &Config) -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    match cli.command {
        Command::Link(args) => {
            let mut config = config.clone();
            if args.dry_run {
                config.dry_run = true;
            }
            if args.explain {
                config.explain = true;
            }
            if args.no_plan {
                config.emit_plan = false;
            }
            if let Some(dir) = args.plan_dir {
                config.plan_dir = dir;
            }
            if let Some(mode) = args.mode {
                config.fix_mode = mode.into();
            }
            if let Some(backend) = args.backend {
                config.backend = Some(backend.into());
            }

            match driver::run_pipeline(&args.args, &config) {
                Ok(outcome) => {
                    if config.dry_run {
                        println!("{}", jello::execute::dry_run(&outcome.plan));
                    }
                    Ok(exit_code(outcome.exit_code))
                }
                Err(e) => {
                    eprintln!("jello: {e}");
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Command::Doctor => {
            println!("{}", driver::doctor_report(config));
            Ok(ExitCode::SUCCESS)
        }
        Command::Plan(args) => {
            let mut config = config.clone();
            config.dry_run = true;
            config.emit_plan = false;
            match driver::run_pipeline(&args.args, &config) {
                Ok(outcome) => {
                    print_plan(&outcome.plan, args.format);
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) => {
                    eprintln!("jello: {e}");
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Command::Init => {
            let cwd = env::current_dir()?;
            let path = driver::init_default_config(&cwd)?;
            println!("wrote {}", path.display());
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn print_plan(plan: &jello::types::LinkPlan, format: cli::PlanFormat) {
    match format {
        cli::PlanFormat::Json => match serde_json::to_string_pretty(plan) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("jello: failed to serialize plan: {e}"),
        },
        cli::PlanFormat::Shell => println!("{}", jello::execute::dry_run(plan)),
    }
}

fn exit_code(code: i32) -> ExitCode {
    u8::try_from(code.clamp(0, 255)).map(ExitCode::from).unwrap_or(ExitCode::FAILURE)
}
