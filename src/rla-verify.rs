//! A CLI tool for independently reproducing a county's audit sample.
//! Given the published seed, it regenerates the random draws and, given the
//! county's ballot manifest and cast vote records, the ballots to audit.

use std::fs::File;
use std::io::BufReader;

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use serde::de::DeserializeOwned;

use rla_engine::controller::select_ballots;
use rla_engine::crypto::generate;
use rla_engine::model::{BallotManifestInfo, CastVoteRecord, CountyId, CvrToAudit};
use rla_engine::store::{CvrStore, InMemoryStore, ManifestStore, MongoStore};
use rla_engine::Config;

const PROGRAM_NAME: &str = "rla-verify";

const ABOUT_TEXT: &str = "Reproduce the random draws and ballot selection of a risk-limiting audit.

EXIT CODES:
     0: Sample reproduced.
     1: Invalid input.
   255: Ran successfully, but the ballots could not be selected.";

const SEED: &str = "SEED";
const MINIMUM: &str = "MINIMUM";
const MAXIMUM: &str = "MAXIMUM";
const FROM: &str = "FROM";
const TO: &str = "TO";
const WITHOUT_REPLACEMENT: &str = "WITHOUT_REPLACEMENT";
const MANIFEST: &str = "MANIFEST";
const CVRS: &str = "CVRS";
const COUNTY: &str = "COUNTY";
const FROM_DB: &str = "FROM_DB";

/// Construct the CLI configuration.
fn cli() -> Command {
    // Make the build dirty when the toml changes.
    include_str!("../Cargo.toml");

    clap::command!(PROGRAM_NAME)
        .about(ABOUT_TEXT)
        .arg(
            Arg::new(SEED)
                .long("seed")
                .help("The published random seed")
                .action(ArgAction::Set)
                .required(true),
        )
        .arg(
            Arg::new(MINIMUM)
                .long("minimum")
                .help("Smallest value that can be drawn")
                .action(ArgAction::Set)
                .value_parser(value_parser!(u64))
                .default_value("1"),
        )
        .arg(
            Arg::new(MAXIMUM)
                .long("maximum")
                .help("Largest value that can be drawn [default: the county's ballot count]")
                .action(ArgAction::Set)
                .value_parser(value_parser!(u64)),
        )
        .arg(
            Arg::new(FROM)
                .long("from")
                .help("Index of the first draw")
                .action(ArgAction::Set)
                .value_parser(value_parser!(usize))
                .default_value("0"),
        )
        .arg(
            Arg::new(TO)
                .long("to")
                .help("Index after the last draw")
                .action(ArgAction::Set)
                .value_parser(value_parser!(usize))
                .required(true),
        )
        .arg(
            Arg::new(WITHOUT_REPLACEMENT)
                .long("without-replacement")
                .help("Never draw the same value twice")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(MANIFEST)
                .long("manifest")
                .help("JSON list of the county's ballot manifest records")
                .action(ArgAction::Set)
                .requires(CVRS)
                .requires(COUNTY)
                .conflicts_with(FROM_DB),
        )
        .arg(
            Arg::new(CVRS)
                .long("cvrs")
                .help("JSON list of the county's cast vote records")
                .action(ArgAction::Set)
                .requires(MANIFEST),
        )
        .arg(
            Arg::new(COUNTY)
                .long("county")
                .help("The county whose ballots to select")
                .action(ArgAction::Set)
                .value_parser(value_parser!(CountyId)),
        )
        .arg(
            Arg::new(FROM_DB)
                .long("from-db")
                .help("Read the county's manifest and records from the configured database")
                .action(ArgAction::SetTrue)
                .requires(COUNTY),
        )
}

/// Errors that this program may produce.
#[derive(Debug)]
enum Error {
    /// IO error described by the inner message.
    IO(String),
    /// Failed to decode an input file.
    Format(String),
    /// The arguments or data do not describe a valid sample.
    Input(String),
    /// The draws could not be resolved to ballots.
    Selection(rla_engine::Error),
}

/// What was reproduced.
#[derive(Debug, PartialEq, Eq)]
struct Sample {
    draws: Vec<u64>,
    ballots: Option<Vec<CvrToAudit>>,
}

fn read_json<T: DeserializeOwned>(path: &str) -> Result<T, Error> {
    let file = BufReader::new(File::open(path).map_err(|e| Error::IO(format!("{path}: {e}")))?);
    serde_json::from_reader(file).map_err(|e| Error::Format(format!("{path}: {e}")))
}

/// Draw `[from, to)` and, if `store` is given, select the county's ballots.
fn sample<S>(
    args: &ArgMatches,
    store: Option<(&S, CountyId)>,
) -> Result<Sample, Error>
where
    S: ManifestStore + CvrStore,
{
    // Arguments with defaults or `required` are guaranteed to be present.
    let seed: &String = args.get_one(SEED).unwrap();
    let minimum = *args.get_one::<u64>(MINIMUM).unwrap();
    let from = *args.get_one::<usize>(FROM).unwrap();
    let to = *args.get_one::<usize>(TO).unwrap();
    let with_replacement = !args.get_flag(WITHOUT_REPLACEMENT);

    let maximum = match (args.get_one::<u64>(MAXIMUM), store) {
        (Some(&maximum), _) => maximum,
        (None, Some((store, county_id))) => store
            .count_ballots(county_id)
            .map_err(|e| Error::Input(e.to_string()))?
            .ok_or_else(|| Error::Input(format!("county {county_id} has no ballot manifest")))?,
        (None, None) => {
            return Err(Error::Input(
                "--maximum is required without a ballot manifest".to_string(),
            ))
        }
    };

    let draws = generate(seed, minimum, maximum, with_replacement)
        .and_then(|mut prng| prng.get_random_numbers(from, to))
        .map_err(|e| Error::Input(e.to_string()))?;
    let ballots = match store {
        Some((store, county_id)) => {
            Some(select_ballots(store, &draws, county_id).map_err(Error::Selection)?)
        }
        None => None,
    };
    Ok(Sample { draws, ballots })
}

/// Gather the inputs and reproduce the sample.
fn verify(args: &ArgMatches) -> Result<Sample, Error> {
    let county_id = args.get_one::<CountyId>(COUNTY).copied();

    if let Some(manifest_path) = args.get_one::<String>(MANIFEST) {
        // `--manifest` requires `--cvrs` and `--county`.
        let cvrs_path: &String = args.get_one(CVRS).unwrap();
        let county_id = county_id.unwrap();
        let manifest: Vec<BallotManifestInfo> = read_json(manifest_path)?;
        let cvrs: Vec<CastVoteRecord> = read_json(cvrs_path)?;

        let store = InMemoryStore::new();
        store
            .import_manifest(county_id, manifest)
            .map_err(|e| Error::Input(e.to_string()))?;
        store
            .import_cvrs(county_id, cvrs)
            .map_err(|e| Error::Input(e.to_string()))?;
        sample(args, Some((&store, county_id)))
    } else if args.get_flag(FROM_DB) {
        // `--from-db` requires `--county`.
        let county_id = county_id.unwrap();
        let config = Config::load().map_err(|e| Error::Input(e.to_string()))?;
        let store = MongoStore::connect(&config).map_err(|e| Error::IO(e.to_string()))?;
        sample(args, Some((&store, county_id)))
    } else {
        sample::<InMemoryStore>(args, None)
    }
}

fn print_sample(sample: &Sample) {
    let draws: Vec<String> = sample.draws.iter().map(u64::to_string).collect();
    println!("Draws: {}", draws.join(", "));

    if let Some(ballots) = &sample.ballots {
        println!(
            "{} ballot{} to audit:",
            ballots.len(),
            if ballots.len() != 1 { "s" } else { "" }
        );
        println!("  #    scanner  batch     position  imprinted id      cvr   location");
        for ballot in ballots {
            println!(
                "  {:<4} {:<8} {:<9} {:<9} {:<17} {:<5} {}",
                ballot.audit_sequence_number,
                ballot.scanner_id,
                ballot.batch_id,
                ballot.record_id,
                ballot.imprinted_id,
                ballot.cvr_number,
                ballot.storage_location
            );
        }
    }
}

/// Reproduce the sample, report the result, and return the exit code.
fn run(args: &ArgMatches) -> u8 {
    match verify(args) {
        Ok(sample) => {
            print_sample(&sample);
            0
        }
        Err(Error::IO(msg)) => {
            println!("IO error: {msg}");
            1
        }
        Err(Error::Format(msg)) => {
            println!("Invalid JSON: {msg}");
            1
        }
        Err(Error::Input(msg)) => {
            println!("Invalid input: {msg}");
            1
        }
        Err(Error::Selection(err)) => {
            println!("Ballot selection failed: {err}");
            255
        }
    }
}

fn main() {
    rla_engine::logging::init_from_file("log4rs.yaml");
    let args = cli().get_matches();
    let exit_code = run(&args);
    std::process::exit(exit_code.into())
}
