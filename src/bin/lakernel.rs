use clap::{App, Arg, ArgMatches, SubCommand};
use std::io::Write;
use lakernel::{
    Combine, DriverConfig, KernelError, KernelParams, LocalAlignmentKernel, LogSum, Sequence,
    Viterbi,
};
#[macro_use]
extern crate log;

fn verbose_arg() -> Arg<'static, 'static> {
    Arg::with_name("verbose")
        .short("v")
        .multiple(true)
        .help("Debug mode")
}

fn params_arg() -> Arg<'static, 'static> {
    Arg::with_name("params")
        .long("params")
        .short("p")
        .value_name("FILE")
        .takes_value(true)
        .help("Parameter file: 210 substitution values, beta, gap open, gap extend. BLOSUM62 if absent.")
}

fn viterbi_arg() -> Arg<'static, 'static> {
    Arg::with_name("viterbi")
        .long("viterbi")
        .help("Score the best local alignment (Smith-Waterman) instead of the sum over all of them.")
}

fn subcommand_pair() -> App<'static, 'static> {
    SubCommand::with_name("pair")
        .version("0.1")
        .about("Kernel value of two sequences.")
        .arg(verbose_arg())
        .arg(params_arg())
        .arg(viterbi_arg())
        .arg(
            Arg::with_name("seq1")
                .long("seq1")
                .value_name("SEQ")
                .takes_value(true)
                .required(true)
                .help("First protein sequence."),
        )
        .arg(
            Arg::with_name("seq2")
                .long("seq2")
                .value_name("SEQ")
                .takes_value(true)
                .required(true)
                .help("Second protein sequence."),
        )
}

fn subcommand_matrix() -> App<'static, 'static> {
    SubCommand::with_name("matrix")
        .version("0.1")
        .about("Kernel matrix of all the sequences in a FASTA file. TSV to stdout.")
        .arg(verbose_arg())
        .arg(params_arg())
        .arg(viterbi_arg())
        .arg(
            Arg::with_name("sequences")
                .long("sequences")
                .short("s")
                .value_name("FASTA")
                .takes_value(true)
                .required(true)
                .help("Protein sequences. FASTA format."),
        )
        .arg(
            Arg::with_name("threads")
                .long("threads")
                .short("t")
                .takes_value(true)
                .default_value("1")
                .help("Number of workers."),
        )
        .arg(
            Arg::with_name("backend")
                .long("backend")
                .takes_value(true)
                .possible_values(&["channel", "rayon"])
                .default_value("channel")
                .help("Worker pool."),
        )
        .arg(
            Arg::with_name("retries")
                .long("retries")
                .takes_value(true)
                .default_value("0")
                .help("How many times a failed range is dispatched again."),
        )
}

fn load_params(matches: &ArgMatches) -> Result<&'static KernelParams, KernelError> {
    let params = match matches.value_of("params") {
        Some(path) => KernelParams::from_path(path)?,
        None => KernelParams::default(),
    };
    lakernel::params::install(params)
}

fn parse_arg<T: std::str::FromStr>(matches: &ArgMatches, name: &str) -> Result<T, KernelError> {
    let value = matches.value_of(name).unwrap_or_default();
    value.parse().map_err(|_| KernelError::InvalidArgument {
        reason: format!("invalid value `{}` for --{}", value, name),
    })
}

fn pair<C: Combine>(matches: &ArgMatches) -> Result<(), KernelError> {
    let params = load_params(matches)?;
    let xs = Sequence::new("seq1", matches.value_of("seq1").unwrap_or_default().as_bytes())?;
    let ys = Sequence::new("seq2", matches.value_of("seq2").unwrap_or_default().as_bytes())?;
    debug!("{} mode, |seq1|={}, |seq2|={}", C::NAME, xs.len(), ys.len());
    let kernel: LocalAlignmentKernel<C> = LocalAlignmentKernel::new(params);
    let value = kernel.align(&xs, &ys)?;
    println!("{:.5}", value);
    Ok(())
}

fn matrix<C: Combine>(matches: &ArgMatches) -> Result<(), KernelError> {
    let params = load_params(matches)?;
    let config = DriverConfig::new(
        parse_arg(matches, "threads")?,
        parse_arg(matches, "backend")?,
        parse_arg(matches, "retries")?,
    );
    let path = matches.value_of("sequences");
    let records = lakernel::fasta::read_fasta(&path).map_err(|e| KernelError::SequenceFile {
        reason: e.to_string(),
    })?;
    let seqs = lakernel::sequence::encode_records(&records)?;
    info!("{} sequences, {} mode, {:?}", seqs.len(), C::NAME, config);
    let kernel: LocalAlignmentKernel<C> = LocalAlignmentKernel::new(params);
    let matrix = lakernel::pairwise::compute_all_pairs(&kernel, &seqs, &config)?;
    let stdout = std::io::stdout();
    let mut wtr = std::io::BufWriter::new(stdout.lock());
    matrix.write_tsv(&mut wtr, 2)?;
    wtr.flush()?;
    Ok(())
}

fn main() {
    let matches = App::new("lakernel")
        .version("0.1")
        .about("Local alignment kernel: [SEQ]x[SEQ]->value or [FASTA]->kernel matrix")
        .setting(clap::AppSettings::ArgRequiredElseHelp)
        .subcommand(subcommand_pair())
        .subcommand(subcommand_matrix())
        .get_matches();
    if let Some(sub_m) = matches.subcommand().1 {
        let level = match sub_m.occurrences_of("verbose") {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
    }
    debug!("Start");
    let result = match matches.subcommand() {
        ("pair", Some(sub_m)) if sub_m.is_present("viterbi") => pair::<Viterbi>(sub_m),
        ("pair", Some(sub_m)) => pair::<LogSum>(sub_m),
        ("matrix", Some(sub_m)) if sub_m.is_present("viterbi") => matrix::<Viterbi>(sub_m),
        ("matrix", Some(sub_m)) => matrix::<LogSum>(sub_m),
        _ => unreachable!(),
    };
    if let Err(why) = result {
        error!("[{}] {}", why.stage(), why);
        eprintln!("lakernel: {} failed: {}", why.stage(), why);
        std::process::exit(1);
    }
}
