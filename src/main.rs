use anyhow::{Context, Result};
use clap::Parser;
use itertools::Itertools;
use std::fs;
use std::io::{self, Read};

use onibi::{Options, Regex};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Pattern to search for
    pattern: String,

    /// File to search (stdin if omitted)
    #[arg(value_name = "FILE")]
    file: Option<String>,

    /// Case-insensitive matching
    #[arg(short = 'i', long)]
    ignore_case: bool,

    /// Extended pattern syntax (whitespace and # comments ignored)
    #[arg(short = 'x', long)]
    extended: bool,

    /// Let . match newline
    #[arg(short = 'm', long)]
    multiline: bool,

    /// Keep the longest match at each anchor
    #[arg(short = 'l', long)]
    longest: bool,

    /// Print line numbers
    #[arg(short = 'n', long)]
    line_numbers: bool,

    /// Print capture groups for each match
    #[arg(short = 'g', long)]
    groups: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut options = Options::empty();
    if args.ignore_case {
        options |= Options::IGNORECASE;
    }
    if args.extended {
        options |= Options::EXTEND;
    }
    if args.multiline {
        options |= Options::MULTILINE;
    }
    if args.longest {
        options |= Options::FIND_LONGEST;
    }

    let re = Regex::with_options(&args.pattern, options)
        .map_err(|err| anyhow::anyhow!("bad pattern: {err}"))?;

    let input = match &args.file {
        Some(path) => {
            fs::read_to_string(path).with_context(|| format!("failed to read {path}"))?
        }
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read stdin")?;
            buf
        }
    };

    for (idx, line) in input.lines().enumerate() {
        let matches: Vec<_> = re
            .find_iter(line.as_bytes(), options)
            .collect::<std::result::Result<_, _>>()
            .map_err(|err| anyhow::anyhow!("line {}: {err}", idx + 1))?;
        if matches.is_empty() {
            continue;
        }
        if args.line_numbers {
            print!("{}:", idx + 1);
        }
        println!("{line}");
        if args.groups {
            for m in &matches {
                let spans = (0..=re.group_count())
                    .map(|g| match m.group(g) {
                        Some(text) => format!("{g}={:?}", String::from_utf8_lossy(text)),
                        None => format!("{g}=-"),
                    })
                    .join(" ");
                println!("  {spans}");
            }
        }
    }
    Ok(())
}
