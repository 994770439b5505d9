//! Command line handling for the `robust-flow` binary.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::prelude::*;

use robust_flow::compute::evolution::{EvolutionDriver, EvolutionError};
use robust_flow::schema::{ConfigError, NetworkType, Parameters};
use robust_flow::storage::{CheckpointError, DirectoryStore, ParameterHeader, resolve_output};

/// Configuration file read when `--config-file` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "simulation.json";

/// Errors surfaced to the user.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Unknown option '{0}'")]
    UnknownOption(String),
    #[error("Option '--{0}' requires a value")]
    MissingValue(&'static str),
    #[error("Option '--{0}' does not take a value")]
    UnexpectedValue(&'static str),
    #[error("Invalid value '{value}' for option '--{option}'")]
    InvalidValue { option: &'static str, value: String },
    #[error("Options -f, -l, -n and -w are mutually exclusive")]
    ConflictingNetworkTypes,
    #[error("No network name given")]
    MissingNetworkName,
    #[error("Failed to read configuration file {path}: {source}")]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse configuration file {path}: {source}")]
    ConfigFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Evolution(#[from] EvolutionError),
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to serialise configuration: {0}")]
    Json(#[from] serde_json::Error),
}

/// `(long name, short name, takes a value)`.
const OPTIONS: &[(&str, Option<char>, bool)] = &[
    ("help", Some('h'), false),
    ("version", Some('v'), false),
    ("print-config", None, false),
    ("config-file", None, true),
    ("network-name", None, true),
    ("flow", Some('f'), false),
    ("link-robust", Some('l'), false),
    ("node-robust", Some('n'), false),
    ("noise-robust", Some('w'), true),
    ("input-nodes", Some('i'), true),
    ("middle-nodes", Some('m'), true),
    ("output-nodes", Some('o'), true),
    ("activated-nodes", Some('k'), true),
    ("flow-threshold", Some('t'), true),
    ("flow-factor", Some('s'), true),
    ("evolution-time", Some('e'), true),
    ("snapshots", None, true),
    ("seed", Some('g'), true),
    ("connectivity", Some('c'), true),
    ("add-to", None, true),
    ("network-init", None, true),
    ("edge-list", None, true),
    ("pattern-init", None, true),
    ("mutation", None, true),
    ("lower-bound", None, true),
    ("upper-bound", None, true),
    ("robust-threshold", None, true),
    ("robust-factor", None, true),
    ("min-robustness", None, true),
];

/// What the binary was asked to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Version,
    Run(Invocation),
}

/// Parsed options of a simulation run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Invocation {
    pub config_file: Option<PathBuf>,
    pub print_config: bool,
    pub names: Vec<String>,
    /// Option settings in command line order, applied over the configuration file.
    pub settings: Vec<(&'static str, Option<String>)>,
}

fn lookup_long(name: &str) -> Option<(&'static str, bool)> {
    OPTIONS
        .iter()
        .find(|(long, _, _)| *long == name)
        .map(|&(long, _, takes)| (long, takes))
}

fn lookup_short(c: char) -> Option<(&'static str, bool)> {
    OPTIONS
        .iter()
        .find(|(_, short, _)| *short == Some(c))
        .map(|&(long, _, takes)| (long, takes))
}

/// Parse command line arguments (without the program name).
pub fn parse_args<I>(args: I) -> Result<Command, CliError>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let mut invocation = Invocation::default();

    while let Some(arg) = args.next() {
        let (option, inline) = if let Some(rest) = arg.strip_prefix("--") {
            let (name, inline) = match rest.split_once('=') {
                Some((name, value)) => (name, Some(value.to_string())),
                None => (rest, None),
            };
            let option = lookup_long(name).ok_or_else(|| CliError::UnknownOption(arg.clone()))?;
            (option, inline)
        } else if arg.len() > 1 && arg.starts_with('-') && arg.parse::<f64>().is_err() {
            let mut chars = arg.chars().skip(1);
            let (Some(c), None) = (chars.next(), chars.next()) else {
                return Err(CliError::UnknownOption(arg));
            };
            (lookup_short(c).ok_or_else(|| CliError::UnknownOption(arg.clone()))?, None)
        } else {
            invocation.names.push(arg);
            continue;
        };

        let (name, takes_value) = option;
        let value = match (takes_value, inline) {
            (true, Some(value)) => Some(value),
            (true, None) => Some(args.next().ok_or(CliError::MissingValue(name))?),
            (false, Some(_)) => return Err(CliError::UnexpectedValue(name)),
            (false, None) => None,
        };

        match name {
            "help" => return Ok(Command::Help),
            "version" => return Ok(Command::Version),
            "print-config" => invocation.print_config = true,
            "config-file" => invocation.config_file = value.map(PathBuf::from),
            "network-name" => invocation.names.extend(value),
            _ => invocation.settings.push((name, value)),
        }
    }

    Ok(Command::Run(invocation))
}

fn parse_value<T: FromStr>(option: &'static str, value: Option<&str>) -> Result<T, CliError> {
    let value = value.ok_or(CliError::MissingValue(option))?;
    value.parse().map_err(|_| CliError::InvalidValue {
        option,
        value: value.to_string(),
    })
}

/// Apply command line settings on top of `params`.
pub fn apply_settings(
    params: &mut Parameters,
    settings: &[(&'static str, Option<String>)],
) -> Result<(), CliError> {
    let mut network_type = None;

    for (option, value) in settings {
        let option = *option;
        let value = value.as_deref();
        match option {
            "flow" | "link-robust" | "node-robust" | "noise-robust" => {
                if network_type.is_some() {
                    return Err(CliError::ConflictingNetworkTypes);
                }
                network_type = Some(match option {
                    "flow" => NetworkType::Flow,
                    "link-robust" => NetworkType::LinkRobust,
                    "node-robust" => NetworkType::NodeRobust,
                    _ => NetworkType::NoiseRobust {
                        noise_level: parse_value(option, value)?,
                    },
                });
            }
            "input-nodes" => params.nodes_in = parse_value(option, value)?,
            "middle-nodes" => params.nodes_middle = parse_value(option, value)?,
            "output-nodes" => params.nodes_out = parse_value(option, value)?,
            "activated-nodes" => params.activated_k = parse_value(option, value)?,
            "flow-threshold" => params.error_threshold = parse_value(option, value)?,
            "flow-factor" => params.annealing_factor = parse_value(option, value)?,
            "evolution-time" => params.max_time = parse_value(option, value)?,
            "snapshots" => params.snapshots = parse_value(option, value)?,
            "seed" => params.seed = Some(parse_value(option, value)?),
            "connectivity" => params.connectivity = Some(parse_value(option, value)?),
            "add-to" => params.add_probability = parse_value(option, value)?,
            "network-init" => params.network_init = parse_value(option, value)?,
            "edge-list" => params.edge_list = Some(parse_value(option, value)?),
            "pattern-init" => params.pattern_init = parse_value(option, value)?,
            "mutation" => params.mutation = parse_value(option, value)?,
            "lower-bound" => params.lower_bound = parse_value(option, value)?,
            "upper-bound" => params.upper_bound = parse_value(option, value)?,
            "robust-threshold" => params.robust.robust_threshold = parse_value(option, value)?,
            "robust-factor" => params.robust.robust_factor = parse_value(option, value)?,
            "min-robustness" => params.robust.min_robustness = parse_value(option, value)?,
            _ => return Err(CliError::UnknownOption(format!("--{}", option))),
        }
    }

    if let Some(network_type) = network_type {
        params.network_type = network_type;
    }
    Ok(())
}

/// Load parameters from a JSON file.
///
/// A missing default file yields the built-in defaults; a missing file that
/// was named explicitly is an error.
pub fn load_parameters(path: &Path, explicit: bool) -> Result<Parameters, CliError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if !explicit && e.kind() == std::io::ErrorKind::NotFound => {
            log::debug!("No {} found, using defaults", path.display());
            return Ok(Parameters::default());
        }
        Err(source) => {
            return Err(CliError::ConfigFile {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    serde_json::from_str(&text).map_err(|source| CliError::ConfigFormat {
        path: path.to_path_buf(),
        source,
    })
}

/// Seed to use when none (or zero) was configured.
fn clock_seed() -> u32 {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    (secs as u32).wrapping_add(std::process::id())
}

/// Connectivity for runs without a configured one, derived from the seed only.
fn seeded_connectivity(seed: u32) -> f64 {
    let mut rng = StdRng::seed_from_u64(!(seed as u64));
    rng.r#gen::<f64>()
}

pub fn print_usage() {
    println!("Usage: robust-flow [OPTIONS] <network-name>...");
    println!();
    println!("Evolve flow distribution networks, optionally for robustness.");
    println!();
    println!("Generic options:");
    println!("  -h, --help                   print this help message");
    println!("  -v, --version                print version information");
    println!("      --config-file <path>     JSON configuration (default: {})", DEFAULT_CONFIG_FILE);
    println!("      --print-config           print the effective configuration and exit");
    println!();
    println!("Network type (mutually exclusive):");
    println!("  -f, --flow                   evolve for function only");
    println!("  -l, --link-robust            evolve for robustness against link removal");
    println!("  -n, --node-robust            evolve for robustness against node removal");
    println!("  -w, --noise-robust <level>   evolve for robustness against weight noise");
    println!();
    println!("Network options:");
    println!("  -i, --input-nodes <n>        input layer size (default: 8)");
    println!("  -m, --middle-nodes <n>       middle layer size (default: 20)");
    println!("  -o, --output-nodes <n>       output layer size (default: 8)");
    println!("  -k, --activated-nodes <n>    active outputs per input (default: 4)");
    println!("  -c, --connectivity <p>       initial link density (default: drawn)");
    println!("      --network-init <scheme>  random | fixed (default: random)");
    println!("      --edge-list <path>       edge list for the fixed scheme");
    println!("      --pattern-init <scheme>  random | complexity | high-complexity |");
    println!("                               low-complexity | equal-complexity | equal-spread");
    println!("      --lower-bound <x>        lower complexity bound");
    println!("      --upper-bound <x>        upper complexity bound");
    println!();
    println!("Evolution options:");
    println!("  -t, --flow-threshold <x>     flow error threshold (default: 0.007)");
    println!("  -s, --flow-factor <x>        flow annealing factor (default: 0.0001)");
    println!("  -e, --evolution-time <n>     maximum ticks (default: 100000)");
    println!("      --snapshots <n>          number of stored snapshots (default: 0)");
    println!("  -g, --seed <n>               random seed (default: time based)");
    println!("      --mutation <scheme>      path | link (default: path)");
    println!("      --add-to <p>             probability of adding links (default: 0.5)");
    println!("      --robust-threshold <x>   robustness flow error threshold (default: 0.007)");
    println!("      --robust-factor <x>      robustness annealing factor (default: 0.0001)");
    println!("      --min-robustness <x>     robustness to stop at (default: 1.0)");
}

/// Run the binary with the given arguments.
pub fn main(args: Vec<String>) -> Result<(), CliError> {
    let invocation = match parse_args(args)? {
        Command::Help => {
            print_usage();
            return Ok(());
        }
        Command::Version => {
            println!("robust-flow {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        Command::Run(invocation) => invocation,
    };

    let (config_path, explicit) = match &invocation.config_file {
        Some(path) => (path.clone(), true),
        None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
    };
    let mut params = load_parameters(&config_path, explicit)?;
    apply_settings(&mut params, &invocation.settings)?;

    if invocation.print_config {
        println!("{}", serde_json::to_string_pretty(&params)?);
        return Ok(());
    }

    params.validate()?;
    for note in params.advisories() {
        log::warn!("{}", note);
    }
    if invocation.names.is_empty() {
        return Err(CliError::MissingNetworkName);
    }

    let seed = match params.seed {
        Some(seed) if seed != 0 => seed,
        _ => {
            let seed = clock_seed();
            params.seed = Some(seed);
            seed
        }
    };
    let connectivity = params
        .connectivity
        .unwrap_or_else(|| seeded_connectivity(seed));
    let header = ParameterHeader::from_parameters(&params, connectivity);

    for name in &invocation.names {
        let Some((dir, stem)) = resolve_output(name) else {
            log::warn!("Directory of '{}' does not exist, skipping", name);
            continue;
        };
        let mut store = DirectoryStore::new(dir);
        let stem = store.unique_name(&stem);

        let mut driver = EvolutionDriver::new(&params, stem, seed, connectivity);
        let mut network = driver.generate_network()?;
        let outcome = driver.run(&mut network, &mut store)?;

        println!(
            "{}: {:?} at time {}, flow error {:.6}{}, {} links",
            outcome.name,
            outcome.stop_reason,
            outcome.final_time,
            outcome.flow_error,
            outcome
                .robustness
                .map(|r| format!(", robustness {:.4}", r))
                .unwrap_or_default(),
            outcome.links
        );

        store.write_parameters(&header)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use robust_flow::schema::{MutationScheme, PatternInit};
    use robust_flow::storage::CheckpointKind;
    use tempfile::tempdir;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn invocation(list: &[&str]) -> Invocation {
        match parse_args(args(list)).unwrap() {
            Command::Run(invocation) => invocation,
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_help_and_version() {
        assert_eq!(parse_args(args(&["-h"])).unwrap(), Command::Help);
        assert_eq!(parse_args(args(&["net", "--version"])).unwrap(), Command::Version);
    }

    #[test]
    fn test_parse_names_and_options() {
        let inv = invocation(&["-i", "4", "--middle-nodes=12", "a", "--network-name", "b", "c"]);
        assert_eq!(inv.names, vec!["a", "b", "c"]);
        assert_eq!(
            inv.settings,
            vec![
                ("input-nodes", Some("4".to_string())),
                ("middle-nodes", Some("12".to_string()))
            ]
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            parse_args(args(&["--bogus"])),
            Err(CliError::UnknownOption(_))
        ));
        assert!(matches!(
            parse_args(args(&["-e"])),
            Err(CliError::MissingValue("evolution-time"))
        ));
        assert!(matches!(
            parse_args(args(&["--flow=yes"])),
            Err(CliError::UnexpectedValue("flow"))
        ));
    }

    #[test]
    fn test_apply_settings() {
        let inv = invocation(&[
            "-w", "0.2", "-k", "3", "--pattern-init", "equal-spread", "--mutation", "link",
            "--min-robustness", "0.9", "-g", "77", "net",
        ]);
        let mut params = Parameters::default();
        apply_settings(&mut params, &inv.settings).unwrap();
        assert_eq!(params.network_type, NetworkType::NoiseRobust { noise_level: 0.2 });
        assert_eq!(params.activated_k, 3);
        assert_eq!(params.pattern_init, PatternInit::EqualSpread);
        assert_eq!(params.mutation, MutationScheme::Link);
        assert_eq!(params.robust.min_robustness, 0.9);
        assert_eq!(params.seed, Some(77));
    }

    #[test]
    fn test_network_types_exclusive() {
        let inv = invocation(&["-f", "-l", "net"]);
        let mut params = Parameters::default();
        assert!(matches!(
            apply_settings(&mut params, &inv.settings),
            Err(CliError::ConflictingNetworkTypes)
        ));
    }

    #[test]
    fn test_invalid_scheme_value() {
        let inv = invocation(&["--pattern-init", "spiral", "net"]);
        let mut params = Parameters::default();
        assert!(matches!(
            apply_settings(&mut params, &inv.settings),
            Err(CliError::InvalidValue { option: "pattern-init", .. })
        ));
    }

    #[test]
    fn test_load_parameters() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        assert_eq!(load_parameters(&missing, false).unwrap().nodes_in, 8);
        assert!(load_parameters(&missing, true).is_err());

        let path = dir.path().join("sim.json");
        fs::write(&path, r#"{"nodes_in": 5, "network_type": {"type": "node-robust"}}"#).unwrap();
        let params = load_parameters(&path, true).unwrap();
        assert_eq!(params.nodes_in, 5);
        assert_eq!(params.network_type, NetworkType::NodeRobust);
    }

    #[test]
    fn test_seeded_connectivity_is_stable() {
        let c = seeded_connectivity(12);
        assert_eq!(c, seeded_connectivity(12));
        assert!((0.0..1.0).contains(&c));
    }

    #[test]
    fn test_run_writes_outputs() {
        let dir = tempdir().unwrap();
        let name = dir.path().join("net").to_string_lossy().into_owned();
        let argv = args(&[
            "-f", "-i", "2", "-m", "4", "-o", "2", "-k", "1", "-e", "50", "-g", "9", "-c", "0.4",
            "--config-file",
        ]);
        let missing_config = dir.path().join("none.json");
        let mut argv = argv;
        argv.push(missing_config.to_string_lossy().into_owned());
        argv.push(name.clone());
        argv.push(name);

        // explicit missing config file is an error
        assert!(main(argv.clone()).is_err());

        let config = dir.path().join("sim.json");
        fs::write(&config, "{}").unwrap();
        let argv: Vec<String> = argv
            .into_iter()
            .map(|a| {
                if a == missing_config.to_string_lossy() {
                    config.to_string_lossy().into_owned()
                } else {
                    a
                }
            })
            .collect();
        main(argv).unwrap();

        assert!(dir.path().join("net_final.dat").exists());
        assert!(dir.path().join("net_duplicate_final.dat").exists());
        assert!(dir.path().join("parameters.dat").exists());
    }

    #[test]
    fn test_drawn_connectivity_in_header() {
        let dir = tempdir().unwrap();
        let config = dir.path().join("sim.json");
        fs::write(&config, "{}").unwrap();
        let name = dir.path().join("net").to_string_lossy().into_owned();
        let mut argv = args(&[
            "-f", "-i", "2", "-m", "4", "-o", "2", "-k", "1", "-e", "20", "-g", "31",
            "--config-file",
        ]);
        argv.push(config.to_string_lossy().into_owned());
        argv.push(name);
        main(argv).unwrap();

        let store = DirectoryStore::new(dir.path());
        let header = store.read_parameters().unwrap();
        assert_eq!(header.connectivity, seeded_connectivity(31));

        let record = store
            .load("net", CheckpointKind::Final, &header)
            .unwrap();
        assert_eq!(record.connectivity, header.connectivity);
    }
}
