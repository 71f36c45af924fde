//! Very thin Fasta reader. Only support batch IO.
use std::io::{BufRead, BufReader};
pub type FASTARecord = (String, Vec<u8>);

/// Read file or stdin, return parsed fasta records.
pub fn read_fasta<P: AsRef<std::path::Path>>(
    file: &Option<P>,
) -> std::io::Result<Vec<FASTARecord>> {
    let stdin = std::io::stdin();
    let mut reader: Box<dyn BufRead> = match file {
        Some(file) => std::fs::File::open(file)
            .map(BufReader::new)
            .map(Box::new)?,
        None => {
            let lock = stdin.lock();
            Box::new(BufReader::new(lock))
        }
    };
    let mut contents = vec![];
    reader.read_to_end(&mut contents)?;
    parse_fasta(&contents)
}

/// Split `contents` into `(id line, sequence)` records.
/// The id keeps the whole header line; sequence lines are concatenated as is.
pub fn parse_fasta(contents: &[u8]) -> std::io::Result<Vec<FASTARecord>> {
    let mut records = contents.split(|&x| x == b'>');
    if let Some(first) = records.next() {
        if first.iter().any(|x| !x.is_ascii_whitespace()) {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "FASTA input does not start with `>`",
            ));
        }
    }
    Ok(records
        .filter_map(|record| {
            let mut record = record.splitn(2, |&x| x == b'\n');
            let id = record.next()?;
            let id = String::from_utf8_lossy(id).trim().to_string();
            let seq: Vec<_> = record
                .next()
                .unwrap_or(&[])
                .iter()
                .filter(|&&x| x != b'\n' && x != b'\r')
                .copied()
                .collect();
            Some((id, seq))
        })
        .collect())
}
