use std::{env, fs, path::PathBuf};

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=OUT_DIR");

    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let completions_dir = out_dir.join("completions");

    fs::create_dir_all(&completions_dir).unwrap();

    let mut cmd = clap::Command::new("anthology")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Anthology Contributors")
        .about("Compile web articles into a single offline EPUB")
        .arg(clap::arg!([URLS] ... "Article URLs, in reading order"))
        .arg(
            clap::arg!(-i --input <FILE> "File with one URL per line, or '-' for stdin")
                .value_name("FILE")
                .value_hint(clap::ValueHint::FilePath),
        )
        .arg(
            clap::arg!(-o --output <FILE> "Output file (default: anthology_<timestamp>.epub)")
                .value_name("FILE")
                .value_parser(clap::value_parser!(std::path::PathBuf)),
        )
        .arg(clap::arg!(--title <TITLE> "Book title").default_value("Substack Collection"))
        .arg(clap::arg!(--author <AUTHOR> "Book author").default_value("Various"))
        .arg(clap::arg!(--language <LANG> "Language tag recorded in the book").default_value("en"))
        .arg(clap::arg!(--timeout <SECS> "Page fetch timeout in seconds").default_value("30"))
        .arg(
            clap::Arg::new("image_timeout")
                .long("image-timeout")
                .value_name("SECS")
                .help("Image fetch timeout in seconds")
                .default_value("10"),
        )
        .arg(
            clap::Arg::new("user_agent")
                .long("user-agent")
                .value_name("UA")
                .help("Custom User-Agent for HTTP requests"),
        )
        .arg(
            clap::Arg::new("no_referer")
                .long("no-referer")
                .action(clap::ArgAction::SetTrue)
                .help("Do not send the article URL as Referer when fetching images"),
        )
        .arg(clap::arg!(--delay <SECS> "Seconds to wait between articles").default_value("1"))
        .arg(clap::arg!(--json "Print the build report as JSON"))
        .arg(clap::arg!(-v --verbose "Enable debug logging"))
        .arg(
            clap::arg!(--completions <SHELL> "Generate shell completion script")
                .value_name("SHELL")
                .value_parser(["bash", "elvish", "fish", "powershell", "zsh"]),
        );

    clap_complete::generate_to(clap_complete::shells::Bash, &mut cmd, "anthology", &completions_dir).unwrap();
    clap_complete::generate_to(clap_complete::shells::Zsh, &mut cmd, "anthology", &completions_dir).unwrap();
    clap_complete::generate_to(clap_complete::shells::Fish, &mut cmd, "anthology", &completions_dir).unwrap();
    clap_complete::generate_to(clap_complete::shells::PowerShell, &mut cmd, "anthology", &completions_dir).unwrap();

    println!("cargo:warning=Shell completions generated in: {}", completions_dir.display());
}
