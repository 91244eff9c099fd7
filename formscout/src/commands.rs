use crate::CLAP_STYLING;
use clap::{arg, command};
use url::Url;

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("formscout")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("formscout")
        .styles(CLAP_STYLING)
        .arg(
            arg!(-q --"quiet" "Suppress banner and non-essential output")
                .required(false)
                .global(true),
        )
        .subcommand_required(false)
        .subcommand(
            command!("analyze")
                .about(
                    "Find each company's contact page, extract its form and assess how much of it \
                can be filled automatically.",
                )
                .arg(
                    arg!(-u --"url" <URL>)
                        .required(false)
                        .help("Homepage of a single company")
                        .value_parser(clap::value_parser!(Url))
                        .conflicts_with("companies-file"),
                )
                .arg(
                    arg!(--"name" <NAME>)
                        .required(false)
                        .help("Company name for --url (default: the host name)")
                        .requires("url"),
                )
                .arg(
                    arg!(-c --"companies-file" <PATH>)
                        .required(false)
                        .help("File with one company per line: 'name,url' or a bare URL")
                        .value_parser(clap::value_parser!(std::path::PathBuf))
                        .conflicts_with("url"),
                )
                .arg(
                    arg!(-t --"concurrency" <NUM>)
                        .required(false)
                        .help("How many companies to analyse at the same time")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("3"),
                )
                .arg(
                    arg!(--"timeout" <MILLIS>)
                        .required(false)
                        .help("Navigation and content timeout in milliseconds")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("30000"),
                )
                .arg(
                    arg!(--"max-retries" <NUM>)
                        .required(false)
                        .help("Extra attempts for a company after a navigation failure or timeout")
                        .value_parser(clap::value_parser!(u32))
                        .default_value("2"),
                )
                .arg(
                    arg!(--"lang" <LANG>)
                        .required(false)
                        .help("Preferred site language: auto, ja, or any other code")
                        .default_value("auto"),
                )
                .arg(
                    arg!(-k --"keyword" <KEYWORD>)
                        .required(false)
                        .help("Extra contact page keyword (repeatable)")
                        .action(clap::ArgAction::Append),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Report format: text, json, csv")
                        .value_parser(["text", "json", "csv"])
                        .default_value("text"),
                )
                .arg(
                    arg!(-o --"output-dir" <PATH>)
                        .required(false)
                        .help("Write the report into this directory (default: print to screen)"),
                ),
        )
        .subcommand(
            command!("find-contact")
                .about("Locate the contact page of a single homepage")
                .arg(
                    arg!(-u --"url" <URL>)
                        .required(true)
                        .help("The homepage to search")
                        .value_parser(clap::value_parser!(Url)),
                )
                .arg(
                    arg!(--"lang" <LANG>)
                        .required(false)
                        .help("Preferred site language: auto, ja, or any other code")
                        .default_value("ja"),
                )
                .arg(
                    arg!(--"all")
                        .required(false)
                        .help("List every candidate contact page, best first")
                        .action(clap::ArgAction::SetTrue),
                ),
        )
        .subcommand(
            command!("extract-form")
                .about("Extract and assess the contact form on a page")
                .arg(
                    arg!(-u --"url" <URL>)
                        .required(true)
                        .help("The page holding the form")
                        .value_parser(clap::value_parser!(Url)),
                ),
        )
}
