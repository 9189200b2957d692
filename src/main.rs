#[macro_use]
extern crate clap;
#[macro_use]
extern crate lazy_static;

use std::process;

use chrono::NaiveDate;
use clap::{App, Arg, ArgMatches, SubCommand};
use rpassword::prompt_password_stdout;
use serde_json::Value;
use tracing::{info, warn};

mod cache;
mod common;
mod config;
mod error;
mod integration;
mod logging;
mod notify;
mod pipeline;
mod resolver;
mod sink;
mod sources;
mod sync;

use config::{SecretConfig, TableNames, TrackerConfig};
use error::{Result, TrackerError};
use integration::postgres::{ConnectionSettings, PostgresStore};
use notify::SendgridNotifier;
use sources::propublica::{parse_date, LateScope};
use sources::{fec, ApiClient, ApiFamily};
use sync::{late_contributions_url, LateOptions, LateOutcome, Tracker};

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: &str = "5432";
const DEFAULT_USER: &str = "postgres";
const DEFAULT_CONFIG: &str = "config/tracker.toml";
const DEFAULT_SECRET_CONFIG: &str = "config/secret.toml";
const DEFAULT_LOG_LEVEL: &str = "info";

fn command_usage<'a, 'b>() -> App<'a, 'b> {
    let date = Arg::with_name("date")
        .short("d")
        .long("date")
        .takes_value(true)
        .help("Filing date as YYYY-MM-DD. Defaults to today on the east coast.");
    let no_email = Arg::with_name("no-email")
        .long("no-email")
        .takes_value(false)
        .help("Store new rows without sending the summary email");

    App::new("finance-tracker")
    .author("Matthew Scheffel <mscheffel@gmail.com>")
    .about("Tracks independent expenditures and late contributions filed with the FEC")
    .arg(
        Arg::with_name("config")
            .long("config")
            .takes_value(true)
            .help("Location of tracker configuration")
            .default_value(DEFAULT_CONFIG)
    )
    .arg(
        Arg::with_name("secret-config")
            .long("secret-config")
            .takes_value(true)
            .help("Location of private configuration (passwords, api keys, etc.)")
            .default_value(DEFAULT_SECRET_CONFIG)
    )
    .arg(
        Arg::with_name("create")
            .short("c")
            .long("create")
            .takes_value(false)
            .help("Create table structure required for insertion")
    )
    .arg(
        Arg::with_name("host")
            .short("h")
            .long("host")
            .takes_value(true)
            .default_value(DEFAULT_HOST)
            .help("The hostname of the PostgreSQL server to connect to.")
    )
    .arg(
        Arg::with_name("database")
            .short("b")
            .long("database")
            .takes_value(true)
            .help("The database to USE on the PostgreSQL server.")
    )
    .arg(
        Arg::with_name("port")
            .short("p")
            .long("port")
            .takes_value(true)
            .default_value(DEFAULT_PORT)
            .help("The port to connect to the PostgreSQL server on.")
    )
    .arg(
        Arg::with_name("user")
            .short("u")
            .long("user")
            .takes_value(true)
            .default_value(DEFAULT_USER)
            .help("The user to connect to the PostgreSQL server with.")
    )
    .arg(
        Arg::with_name("log-level")
            .long("log-level")
            .takes_value(true)
            .possible_values(&["error", "warn", "info", "debug", "trace"])
            .default_value(DEFAULT_LOG_LEVEL)
            .help("Log verbosity when RUST_LOG is not set")
    )
    .subcommand(
        SubCommand::with_name("late")
            .about("Fetches 24/48-hour contributions and stores the new PAC ones")
            .arg(
                Arg::with_name("candidate")
                    .long("candidate")
                    .takes_value(true)
                    .conflicts_with_all(&["committee", "date"])
                    .help("Contributions to one candidate (FEC candidate id)")
            )
            .arg(
                Arg::with_name("committee")
                    .long("committee")
                    .takes_value(true)
                    .conflicts_with("date")
                    .help("Contributions reported by one committee (FEC committee id)")
            )
            .arg(date.clone())
            .arg(
                Arg::with_name("return-url")
                    .long("return-url")
                    .takes_value(false)
                    .help("Print the URL that would be queried and exit")
            )
            .arg(no_email.clone())
    )
    .subcommand(
        SubCommand::with_name("ie")
            .about("Fetches the day's independent expenditures and stores the new ones")
            .arg(date)
            .arg(no_email)
    )
    .subcommand(
        SubCommand::with_name("schedule-a")
            .about("Prints every committee contribution received by a committee as JSON lines")
            .arg(
                Arg::with_name("committee_id")
                    .required(true)
                    .index(1)
                    .help("FEC committee id")
            )
    )
}

fn optional_date(matches: &ArgMatches) -> Result<Option<NaiveDate>> {
    matches.value_of("date").map(parse_date).transpose()
}

fn late_scope(matches: &ArgMatches) -> Result<LateScope> {
    if let Some(id) = matches.value_of("candidate") {
        return Ok(LateScope::Candidate(id.to_owned()));
    }
    if let Some(id) = matches.value_of("committee") {
        return Ok(LateScope::Committee(id.to_owned()));
    }
    match optional_date(matches)? {
        Some(date) => Ok(LateScope::Date(date)),
        None => Ok(LateScope::Today),
    }
}

fn connect_store(matches: &ArgMatches, secrets: &SecretConfig, tables: TableNames) -> Result<PostgresStore> {
    let host = matches.value_of("host").unwrap_or(DEFAULT_HOST).to_owned();
    let user = matches.value_of("user").unwrap_or(DEFAULT_USER).to_owned();
    let port = value_t!(matches, "port", u16).unwrap_or_else(|e| e.exit());

    let dbname = match secrets.get("postgres", "dbname").or_else(|| matches.value_of("database")) {
        Some(name) => name.to_owned(),
        None => return Err(TrackerError::MissingCredential("postgres dbname (--database)".to_owned())),
    };

    info!(host = host.as_str(), port, user = user.as_str(), "connecting to PostgreSQL");
    let password = match secrets.get("postgres", "password") {
        Some(p) => p.to_owned(),
        None => prompt_password_stdout("Password: ").map_err(TrackerError::PasswordPrompt)?,
    };

    let settings = ConnectionSettings { host, port, user, dbname, password };
    Ok(PostgresStore::connect(&settings, tables)?)
}

fn build_tracker(store: PostgresStore, config: &TrackerConfig, secrets: &SecretConfig) -> Result<Tracker<PostgresStore, SendgridNotifier>> {
    let api_key = secrets.require("propublica", "key", "PRO_PUBLICA_API_KEY")?;
    let client = ApiClient::new(ApiFamily::Aggregator, config.aggregator_url(), api_key, config.http());

    let notifier = match secrets.credential("sendgrid", "key", "SENDGRID_API_KEY") {
        Some(key) => Some(SendgridNotifier::new(config.email.sendgrid_url.clone(), key, &config.http())),
        None => {
            warn!("no SendGrid key configured, emails are disabled");
            None
        },
    };

    Ok(Tracker::new(client, store, notifier, config.email.clone(), config.page_size))
}

/// Hands back a connection opened earlier in the run, so the password is asked for once.
fn reuse_or_connect<T, F>(opened: &mut Option<T>, connect: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    match opened.take() {
        Some(store) => Ok(store),
        None => connect(),
    }
}

fn run() -> Result<()> {
    let matches = command_usage().get_matches();
    logging::init_subscriber(matches.value_of("log-level").unwrap_or(DEFAULT_LOG_LEVEL));

    let config = TrackerConfig::load(matches.value_of("config").unwrap_or(DEFAULT_CONFIG))?;
    let secrets = SecretConfig::load(matches.value_of("secret-config").unwrap_or(DEFAULT_SECRET_CONFIG))?;

    let mut created = None;
    if matches.is_present("create") {
        let mut store = connect_store(&matches, &secrets, config.tables.clone())?;
        store.create_tables()?;
        info!("tables created");
        created = Some(store);
    }
    let mut open_store = || reuse_or_connect(&mut created, || connect_store(&matches, &secrets, config.tables.clone()));

    match matches.subcommand() {
        ("late", Some(sub)) => {
            let scope = late_scope(sub)?;
            if sub.is_present("return-url") {
                // no credentials or database needed to build the URL
                let client = ApiClient::new(ApiFamily::Aggregator, config.aggregator_url(), String::new(), config.http());
                println!("{}", late_contributions_url(&client, &scope));
                return Ok(());
            }

            let mut tracker = build_tracker(open_store()?, &config, &secrets)?;
            let options = LateOptions { return_url: false, notify: !sub.is_present("no-email") };
            if let LateOutcome::Completed(summary) = tracker.update_late_contributions(&scope, options)? {
                println!(
                    "{} fetched, {} new, {} new committees, {} new candidates",
                    summary.fetched, summary.enriched, summary.new_committees, summary.new_candidates
                );
            }
        },
        ("ie", Some(sub)) => {
            let date = optional_date(sub)?;
            let mut tracker = build_tracker(open_store()?, &config, &secrets)?;
            let rows = tracker.update_daily_transactions(date, !sub.is_present("no-email"))?;
            println!("{} new independent expenditures", rows.len());
        },
        ("schedule-a", Some(sub)) => {
            let committee_id = sub.value_of("committee_id").unwrap_or_default();
            let api_key = secrets.require("fec", "key", "GOV_API_KEY")?;
            let client = ApiClient::new(ApiFamily::Government, config.government_base_url.clone(), api_key, config.http());

            for row in fec::scrape_schedule_a(&client, committee_id)? {
                println!("{}", Value::Object(row));
            }
        },
        _ => {
            if !matches.is_present("create") {
                eprintln!("{}", matches.usage());
            }
        },
    }

    Ok(())
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
