use anyhow::{Context, Result, bail};
use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::PathBuf;

pub fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(|x| x.trim().to_string())
        .filter(|x| !x.is_empty())
        .collect()
}

/// Parse seed tokens: decimal, `0x`-prefixed hex, or `a..b` ranges (end exclusive).
pub fn resolve_seeds(tokens: &[String]) -> Result<Vec<u64>> {
    let mut seeds = Vec::new();
    for token in tokens {
        if let Some((start, end)) = token.split_once("..") {
            let start = parse_seed(start)?;
            let end = parse_seed(end)?;
            if end <= start {
                bail!("empty seed range {token}");
            }
            seeds.extend(start..end);
        } else {
            seeds.push(parse_seed(token)?);
        }
    }
    if seeds.is_empty() {
        bail!("no seeds given");
    }
    seeds.dedup();
    Ok(seeds)
}

fn parse_seed(raw: &str) -> Result<u64> {
    let raw = raw.trim();
    if let Some(hex) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).with_context(|| format!("invalid hex seed {raw}"))
    } else {
        raw.parse::<u64>()
            .with_context(|| format!("invalid seed {raw}"))
    }
}

pub enum OutputTarget {
    Stdout(BufWriter<std::io::Stdout>),
    File(BufWriter<File>),
}

impl OutputTarget {
    pub fn new(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Self::File(BufWriter::new(file)))
        } else {
            Ok(Self::Stdout(BufWriter::new(stdout())))
        }
    }

    pub fn writer(&mut self) -> &mut dyn Write {
        match self {
            Self::Stdout(w) => w,
            Self::File(w) => w,
        }
    }

    pub fn flush_inner(&mut self) -> std::io::Result<()> {
        match self {
            Self::Stdout(w) => w.flush(),
            Self::File(w) => w.flush(),
        }
    }
}

impl Write for OutputTarget {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_csv_trims_and_filters() {
        let parts = split_csv(" alpha, ,beta,  gamma ");
        assert_eq!(parts, vec!["alpha", "beta", "gamma"]);
    }

    #[test]
    fn seeds_accept_decimal_hex_and_ranges() {
        let tokens = split_csv("7, 0x10, 3..6");
        assert_eq!(resolve_seeds(&tokens).unwrap(), vec![7, 16, 3, 4, 5]);
    }

    #[test]
    fn seeds_reject_garbage_and_empty_ranges() {
        assert!(resolve_seeds(&["frog".to_string()]).is_err());
        assert!(resolve_seeds(&["9..9".to_string()]).is_err());
        assert!(resolve_seeds(&[]).is_err());
    }

    #[test]
    fn output_target_writes_file() {
        let path = std::env::temp_dir().join(format!(
            "mutants-output-{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        ));
        let mut target = OutputTarget::new(Some(path.clone())).unwrap();
        target.write_all(b"ok").unwrap();
        target.flush().unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "ok");
    }
}
