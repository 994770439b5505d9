//! Robust flow CLI - Evolve flow networks from the command line.

#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

mod cli;

fn main() {
    #[cfg(feature = "dhat-heap")]
    let _profiler = dhat::Profiler::new_heap();

    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();

    if let Err(e) = cli::main(args) {
        log::error!("{}", e);
        eprintln!("Error: {}", e);
        if matches!(
            e,
            cli::CliError::UnknownOption(_)
                | cli::CliError::MissingValue(_)
                | cli::CliError::MissingNetworkName
        ) {
            eprintln!("Run with --help for usage.");
        }
        std::process::exit(1);
    }
}
