use std::fs;
use std::path::Path;
use std::process;

use env_logger;
use log;

use filesort::FileSorterBuilder;

/// Buffer size bounds, in MiB.
const BUF_MIN: u64 = 1;
const BUF_MAX: u64 = 1024;

/// Thread count bounds.
const THR_MIN: usize = 1;
const THR_MAX: usize = 1024;

fn main() {
    env_logger::init();

    let arg_parser = build_arg_parser();

    let path = arg_parser.value_of("file").expect("value is required");
    let buf_mib: u64 = arg_parser.value_of_t_or_exit("buffer_size");
    let threads = if arg_parser.is_present("threads") {
        arg_parser.value_of_t_or_exit("threads")
    } else {
        num_cpus::get().max(1)
    };

    let path = Path::new(path);
    match fs::metadata(path) {
        Ok(meta) if meta.len() == 0 => {
            // File is empty, there is nothing to sort.
            return;
        }
        Ok(_) => {}
        Err(err) => {
            log::error!("cannot access {}: {}", path.display(), err);
            process::exit(1);
        }
    }

    let sorter_builder = FileSorterBuilder::new()
        .with_buffer_bytes((buf_mib as usize) << 20)
        .with_threads(threads);

    let sorter = match sorter_builder.build() {
        Ok(sorter) => sorter,
        Err(err) => {
            log::error!("sorter initialization error: {}", err);
            process::exit(1);
        }
    };

    if let Err(err) = sorter.sort(path) {
        log::error!("sorting error: {}", err);
        process::exit(1);
    }
}

fn build_arg_parser() -> clap::ArgMatches {
    clap::App::new("filesort")
        .about("Sorts a file of 32-bit integers in place using limited RAM")
        .arg(
            clap::Arg::new("file")
                .help("text file to sort in place, one integer per line")
                .required(true)
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("buffer_size")
                .short('b')
                .long("buffer-size")
                .help("sorting buffer size, in MiB")
                .takes_value(true)
                .default_value("128")
                .validator(validate_buffer_size),
        )
        .arg(
            clap::Arg::new("threads")
                .short('t')
                .long("threads")
                .help("number of threads to use for chunk sorting [default: online CPUs]")
                .takes_value(true)
                .validator(validate_threads),
        )
        .get_matches()
}

fn validate_buffer_size(value: &str) -> Result<(), String> {
    match value.parse::<u64>() {
        Ok(mib) if (BUF_MIN..=BUF_MAX).contains(&mib) => Ok(()),
        Ok(_) => Err(format!("buffer size must be {}..{} MiB", BUF_MIN, BUF_MAX)),
        Err(err) => Err(format!("wrong buffer size: {}", err)),
    }
}

fn validate_threads(value: &str) -> Result<(), String> {
    match value.parse::<usize>() {
        Ok(count) if (THR_MIN..=THR_MAX).contains(&count) => Ok(()),
        Ok(_) => Err(format!("thread count must be {}..{}", THR_MIN, THR_MAX)),
        Err(err) => Err(format!("wrong thread count: {}", err)),
    }
}
