//! Word-count client: reads a text file, maps lines to lowercase words,
//! reduces to per-word counts, prints the most frequent ones.

use anyhow::{Context, Result};
use clap::Parser;
use kvern::utils::default_workers;
use kvern::{start_job, Mapper, Reducer};
use regex::Regex;

#[derive(Parser, Debug)]
struct Args {
    /// Input text file
    #[arg(long)]
    input: String,
    /// Worker threads (defaults to KVERN_WORKERS or the CPU count)
    #[arg(long)]
    workers: Option<usize>,
    /// How many of the most frequent words to print
    #[arg(long, default_value_t = 20)]
    top: usize,
}

struct WordMapper {
    word_re: Regex,
}

impl Mapper for WordMapper {
    type Key = ();
    type Value = String;
    type OutKey = String;
    type OutValue = u64;

    fn map<F>(&self, _key: &(), line: &String, emit: &mut F)
    where
        F: FnMut(String, u64),
    {
        for cap in self.word_re.find_iter(line) {
            emit(cap.as_str().to_lowercase(), 1);
        }
    }
}

struct WordReducer;

impl Reducer for WordReducer {
    type Key = String;
    type Value = u64;
    type OutKey = String;
    type OutValue = u64;

    fn reduce<F>(&self, group: &[(String, u64)], emit: &mut F)
    where
        F: FnMut(String, u64),
    {
        emit(group[0].0.clone(), group.iter().map(|pair| pair.1).sum());
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let args = Args::parse();

    let text = std::fs::read_to_string(&args.input)
        .with_context(|| format!("read {}", args.input))?;
    let input: Vec<((), String)> = text.lines().map(|line| ((), line.to_string())).collect();
    let workers = args.workers.unwrap_or_else(default_workers);

    let mapper = WordMapper {
        word_re: Regex::new(r"[A-Za-z0-9_']+")?,
    };
    let mut counts = start_job(mapper, WordReducer, input, workers).close();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    for (word, n) in counts.iter().take(args.top) {
        println!("{word}\t{n}");
    }
    Ok(())
}
