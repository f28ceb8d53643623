// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod loader;

use anyhow::{Context, Result, bail};
use config::Config;
use std::env;
use std::path::PathBuf;
use vellum_engine::Session;

const DEMO_SEED: u64 = 1;
const DEMO_ROWS: usize = 1_000;

fn main() {
    if let Err(error) = run() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = parse_cli_args(env::args().skip(1), Config::default_path()?)?;
    if options.show_help {
        print_help();
        return Ok(());
    }

    if options.print_config_path {
        println!("{}", options.config_path.display());
        return Ok(());
    }

    if options.print_example {
        print!("{}", Config::example_config(&options.config_path));
        return Ok(());
    }

    let config = Config::load(&options.config_path).with_context(|| {
        format!(
            "load config {}; run `vellum --print-example-config` to generate a template",
            options.config_path.display()
        )
    })?;

    let mut engine_options = vellum_engine::default_options();
    config
        .apply(&mut engine_options)
        .with_context(|| format!("apply config {}", options.config_path.display()))?;

    let mut session = Session::new(engine_options, vellum_engine::default_commands());

    if !options.demo && options.files.is_empty() {
        if options.check_only {
            return Ok(());
        }
        bail!("no input files; pass one or more CSV/TSV paths, or --demo");
    }

    // Last named file ends up on top of the stack.
    for path in &options.files {
        let mut sheet = loader::sheet_from_path(path, &session.options)?;
        sheet.colorizers = vellum_tui::default_colorizers();
        session.push(sheet);
    }
    if options.demo {
        let mut sheet = vellum_testkit::demo_sheet(DEMO_SEED, DEMO_ROWS);
        sheet.colorizers = vellum_tui::default_colorizers();
        session.push(sheet);
    }

    if options.check_only {
        session.sync(0);
        return first_load_error(&session);
    }

    if options.batch {
        session.sync(0);
        first_load_error(&session)?;
        for sheet in session.stack() {
            println!(
                "{}\t{} rows\t{} cols",
                sheet.name,
                sheet.n_rows(),
                sheet.n_visible_cols()
            );
        }
        return Ok(());
    }

    vellum_tui::run(&mut session)?;
    session.sync(0);

    if session.hard_quit_requested()
        && let Some(trace) = session.last_error_trace()
    {
        eprintln!("{trace}");
    }
    Ok(())
}

/// Background loads report through the error log; surface the first
/// one as the process result in non-interactive modes.
fn first_load_error(session: &Session) -> Result<()> {
    if let Some(entry) = session.errors().entries().into_iter().next_back() {
        bail!("{}", entry.summary);
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    files: Vec<PathBuf>,
    print_config_path: bool,
    print_example: bool,
    demo: bool,
    batch: bool,
    check_only: bool,
    show_help: bool,
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        files: Vec::new(),
        print_config_path: false,
        print_example: false,
        demo: false,
        batch: false,
        check_only: false,
        show_help: false,
    };

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_ref() {
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--config requires a file path"))?;
                options.config_path = PathBuf::from(value.as_ref());
            }
            "--print-config-path" => {
                options.print_config_path = true;
            }
            "--print-example-config" => {
                options.print_example = true;
            }
            "--demo" => {
                options.demo = true;
            }
            "--batch" => {
                options.batch = true;
            }
            "--check" => {
                options.check_only = true;
            }
            "--help" | "-h" => {
                options.show_help = true;
            }
            flag if flag.starts_with('-') => {
                return Err(anyhow::anyhow!(
                    "unknown argument {flag:?}; run with --help to see supported options"
                ));
            }
            file => {
                options.files.push(PathBuf::from(file));
            }
        }
    }

    Ok(options)
}

fn print_help() {
    println!("vellum — a terminal tabular data browser");
    println!("  vellum [flags] [file.csv ...]");
    println!("  --config <path>          Use a specific config path");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-example-config   Print a config template");
    println!("  --demo                   Launch with generated demo data");
    println!("  --batch                  Load sources, print their shapes, exit");
    println!("  --check                  Validate config and sources, then exit");
    println!("  --help                   Show this help");
}

#[cfg(test)]
mod tests {
    use super::{CliOptions, parse_cli_args};
    use anyhow::Result;
    use std::path::PathBuf;

    fn default_options_path() -> PathBuf {
        PathBuf::from("/tmp/vellum-config.toml")
    }

    #[test]
    fn parse_cli_args_defaults_to_provided_config_path() -> Result<()> {
        let options = parse_cli_args(Vec::<String>::new(), default_options_path())?;
        assert_eq!(
            options,
            CliOptions {
                config_path: default_options_path(),
                files: Vec::new(),
                print_config_path: false,
                print_example: false,
                demo: false,
                batch: false,
                check_only: false,
                show_help: false,
            }
        );
        Ok(())
    }

    #[test]
    fn parse_cli_args_collects_positional_files_in_order() -> Result<()> {
        let options = parse_cli_args(vec!["a.csv", "--demo", "b.tsv"], default_options_path())?;
        assert_eq!(
            options.files,
            vec![PathBuf::from("a.csv"), PathBuf::from("b.tsv")]
        );
        assert!(options.demo);
        Ok(())
    }

    #[test]
    fn parse_cli_args_sets_config_path_override() -> Result<()> {
        let options = parse_cli_args(
            vec!["--config", "/custom/config.toml"],
            default_options_path(),
        )?;
        assert_eq!(options.config_path, PathBuf::from("/custom/config.toml"));
        Ok(())
    }

    #[test]
    fn parse_cli_args_errors_for_missing_config_value() {
        let error = parse_cli_args(vec!["--config"], default_options_path())
            .expect_err("missing config value should fail");
        assert!(error.to_string().contains("--config requires a file path"));
    }

    #[test]
    fn parse_cli_args_errors_for_unknown_flag() {
        let error = parse_cli_args(vec!["--wat"], default_options_path())
            .expect_err("unknown flag should fail");
        let message = error.to_string();
        assert!(message.contains("unknown argument"));
        assert!(message.contains("--help"));
    }

    #[test]
    fn parse_cli_args_sets_batch_and_check_flags() -> Result<()> {
        let options = parse_cli_args(vec!["--batch", "--check"], default_options_path())?;
        assert!(options.batch);
        assert!(options.check_only);
        Ok(())
    }

    #[test]
    fn parse_cli_args_sets_help_flag_for_long_and_short_variants() -> Result<()> {
        let long = parse_cli_args(vec!["--help"], default_options_path())?;
        assert!(long.show_help);

        let short = parse_cli_args(vec!["-h"], default_options_path())?;
        assert!(short.show_help);
        Ok(())
    }
}
