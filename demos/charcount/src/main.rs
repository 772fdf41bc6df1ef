//! Character-count client: maps strings to per-character counts, reduces
//! by summing, and prints job progress while the workers run.

use anyhow::Result;
use clap::Parser;
use kvern::{start_job, JobState, Mapper, Reducer, Stage};
use std::collections::BTreeMap;
use std::thread;
use std::time::Duration;

#[derive(Parser, Debug)]
struct Args {
    /// Strings to count characters in (sample texts when omitted)
    strings: Vec<String>,
    /// Number of worker threads
    #[arg(long, default_value_t = 4)]
    workers: usize,
    /// Simulated work per map/reduce call, so progress is watchable
    #[arg(long, default_value_t = 50)]
    work_ms: u64,
}

struct CharMapper {
    work: Duration,
}

impl Mapper for CharMapper {
    type Key = ();
    type Value = String;
    type OutKey = char;
    type OutValue = u32;

    fn map<F>(&self, _key: &(), value: &String, emit: &mut F)
    where
        F: FnMut(char, u32),
    {
        let mut counts: BTreeMap<char, u32> = BTreeMap::new();
        for c in value.chars() {
            *counts.entry(c).or_insert(0) += 1;
        }
        for (c, n) in counts {
            thread::sleep(self.work);
            emit(c, n);
        }
    }
}

struct SumReducer {
    work: Duration,
}

impl Reducer for SumReducer {
    type Key = char;
    type Value = u32;
    type OutKey = char;
    type OutValue = u32;

    fn reduce<F>(&self, group: &[(char, u32)], emit: &mut F)
    where
        F: FnMut(char, u32),
    {
        thread::sleep(self.work);
        emit(group[0].0, group.iter().map(|pair| pair.1).sum());
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let args = Args::parse();

    let strings = if args.strings.is_empty() {
        vec![
            "This string is full of characters".to_string(),
            "Multithreading is awesome".to_string(),
            "race conditions are bad".to_string(),
        ]
    } else {
        args.strings
    };
    let input: Vec<((), String)> = strings.into_iter().map(|s| ((), s)).collect();

    let work = Duration::from_millis(args.work_ms);
    let mut handle = start_job(
        CharMapper { work },
        SumReducer { work },
        input,
        args.workers,
    );

    let mut last: Option<JobState> = None;
    loop {
        let state = handle.state();
        if last != Some(state) {
            println!("stage {:?}, {:.2}%", state.stage, state.percentage);
        }
        last = Some(state);
        if state.stage == Stage::Reduce && state.percentage == 100.0 {
            break;
        }
        thread::sleep(Duration::from_millis(100));
    }
    handle.wait();

    let stats = handle.stats();
    let mut output = handle.close();
    output.sort_unstable();
    for (c, n) in &output {
        let plural = if *n == 1 { "" } else { "s" };
        println!("character '{c}' appeared {n} time{plural}");
    }
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}
