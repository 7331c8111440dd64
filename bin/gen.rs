use clap::{Arg, ArgAction, Command};
use std::io::{self, Write};

/// Writes a deterministic users fixture for seeding, e.g.
/// `gen --rows 1000 | gzip > database/seeds/csvs/users.csv`.
fn main() -> anyhow::Result<()> {
    let matches = Command::new("gen")
        .arg(
            Arg::new("rows")
                .long("rows")
                .value_parser(clap::value_parser!(u64))
                .required(true),
        )
        .arg(Arg::new("delim").long("delim").default_value(";"))
        .arg(
            Arg::new("bom")
                .long("bom")
                .help("Prefix the header with a UTF-8 byte-order mark")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("blank-every")
                .long("blank-every")
                .help("Emit an empty line after every N rows")
                .value_parser(clap::value_parser!(u64)),
        )
        .get_matches();

    let rows: u64 = matches.get_one::<u64>("rows").copied().unwrap_or_default();
    let delim = matches
        .get_one::<String>("delim")
        .map(String::as_str)
        .unwrap_or(";");
    let blank_every = matches.get_one::<u64>("blank-every").copied();

    let mut out = io::BufWriter::new(io::stdout().lock());

    if matches.get_flag("bom") {
        out.write_all(b"\xef\xbb\xbf")?;
    }
    writeln!(&mut out, "id{d}name{d}email{d}password", d = delim)?;

    for i in 1..=rows {
        // every tenth user has no password
        let password = if i % 10 == 0 {
            String::new()
        } else {
            format!("pw{i:06}")
        };
        writeln!(
            &mut out,
            "{i}{d}User {i}{d}user{i}@example.test{d}{password}",
            d = delim
        )?;
        if blank_every.is_some_and(|n| n > 0 && i % n == 0) {
            writeln!(&mut out)?;
        }
        if i % 10_000 == 0 {
            out.flush()?;
        } // keep buffers moving on huge runs
    }

    out.flush()?;
    Ok(())
}
