use std::path::PathBuf;

use hn_feeds::RunOptions;

enum Flags {
    Exit,
    Run(RunOptions),
}

fn main() {
    let options = match handle_cli_flags() {
        Ok(Flags::Exit) => return,
        Ok(Flags::Run(options)) => options,
        Err(message) => {
            eprintln!("error: {message}");
            std::process::exit(2);
        }
    };

    if let Err(err) = hn_feeds::run(options) {
        eprintln!("error: {err:?}");
        std::process::exit(1);
    }
}

fn handle_cli_flags() -> Result<Flags, String> {
    let mut options = RunOptions::default();
    let mut saw_flag = false;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("HN-Feeds {}", hn_feeds::VERSION);
                saw_flag = true;
            }
            "--help" | "-h" => {
                println!(
                    "HN-Feeds - Stories, jobs, polls and live news from Hacker News.\n\n  --config <path>      Read configuration from <path>\n  --version, -V        Show version and exit\n  --help,    -h        Show this help message"
                );
                saw_flag = true;
            }
            "--config" | "-c" => match args.next() {
                Some(path) => options.config_file = Some(PathBuf::from(path)),
                None => return Err("--config requires a path".to_string()),
            },
            other => return Err(format!("unknown argument: {other}")),
        }
    }
    if saw_flag {
        Ok(Flags::Exit)
    } else {
        Ok(Flags::Run(options))
    }
}
