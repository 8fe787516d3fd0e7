use anyhow::Result;
#[cfg(any(feature = "with-serde", feature = "with-csv"))]
use anyhow::Context;
#[cfg(not(feature = "with-csv"))]
use anyhow::bail;

use mailprobe::{CatchAllResult, MxHost, Verdict};

use crate::args::{Cli, Format};

/// One line of output, whatever the subcommand.
pub trait Report {
    fn human(&self) -> String;
    #[cfg_attr(not(feature = "with-csv"), allow(dead_code))]
    fn csv_fields(&self) -> Vec<String>;
    #[cfg(feature = "with-serde")]
    fn json(&self) -> serde_json::Result<serde_json::Value>;
}

impl Report for Verdict {
    fn human(&self) -> String {
        let tag = if self.is_valid() {
            "[OK]".to_string()
        } else {
            format!("[{}]", self.kind.as_str().to_uppercase())
        };
        let mut line = format!("{tag:<16} {} :: {}", self.email, self.reason);
        if let Some(mx) = &self.mx_records {
            line.push_str(&format!("\n        mx: {}", mx.join(", ")));
        }
        if let Some(smtp) = &self.smtp_response {
            line.push_str(&format!("\n        smtp: {smtp}"));
        }
        line
    }

    fn csv_fields(&self) -> Vec<String> {
        vec![
            self.email.clone(),
            self.kind.to_string(),
            self.reason.clone(),
            self.mx_records.as_ref().map(|mx| mx.join("|")).unwrap_or_default(),
            self.smtp_response.clone().unwrap_or_default(),
            self.catch_all
                .map(|result| result.is_catch_all.to_string())
                .unwrap_or_default(),
        ]
    }

    #[cfg(feature = "with-serde")]
    fn json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}

impl Report for MxHost {
    fn human(&self) -> String {
        format!("{:>5}  {}", self.preference, self.exchange)
    }

    fn csv_fields(&self) -> Vec<String> {
        vec![self.preference.to_string(), self.exchange.clone()]
    }

    #[cfg(feature = "with-serde")]
    fn json(&self) -> serde_json::Result<serde_json::Value> {
        Ok(serde_json::json!({
            "preference": self.preference,
            "exchange": self.exchange,
        }))
    }
}

pub struct CatchAllRow {
    pub domain: String,
    pub result: CatchAllResult,
}

impl Report for CatchAllRow {
    fn human(&self) -> String {
        let tag = if self.result.is_catch_all {
            "[CATCH-ALL]"
        } else {
            "[STRICT]"
        };
        format!(
            "{tag:<16} {} :: ratio {:.2} over {} probe(s)",
            self.domain, self.result.positive_ratio, self.result.probes_sent
        )
    }

    fn csv_fields(&self) -> Vec<String> {
        vec![
            self.domain.clone(),
            self.result.is_catch_all.to_string(),
            format!("{:.4}", self.result.positive_ratio),
            self.result.probes_sent.to_string(),
        ]
    }

    #[cfg(feature = "with-serde")]
    fn json(&self) -> serde_json::Result<serde_json::Value> {
        let mut value = serde_json::to_value(self.result)?;
        if let Some(map) = value.as_object_mut() {
            map.insert("domain".into(), self.domain.clone().into());
        }
        Ok(value)
    }
}

pub fn write_reports<R: Report>(rows: &[R], cli: &Cli) -> Result<()> {
    match cli.format {
        Format::Human => write_human(rows, cli),
        Format::Json => write_json(rows, cli),
        Format::Ndjson => write_ndjson(rows, cli),
        Format::Csv => write_csv(rows, cli),
    }
}

fn write_human<R: Report>(rows: &[R], cli: &Cli) -> Result<()> {
    let mut text = String::new();
    for row in rows {
        text.push_str(&row.human());
        text.push('\n');
    }
    match &cli.out {
        Some(path) => write_plain(path, text.as_bytes()),
        None => {
            print!("{text}");
            Ok(())
        }
    }
}

#[cfg(any(feature = "with-serde", feature = "with-csv"))]
fn write_plain(path: &str, bytes: &[u8]) -> Result<()> {
    write_all_atomically(path, bytes)
}

#[cfg(not(any(feature = "with-serde", feature = "with-csv")))]
fn write_plain(path: &str, bytes: &[u8]) -> Result<()> {
    std::fs::write(path, bytes)?;
    Ok(())
}

#[cfg(feature = "with-serde")]
fn write_json<R: Report>(rows: &[R], cli: &Cli) -> Result<()> {
    let values = rows
        .iter()
        .map(Report::json)
        .collect::<serde_json::Result<Vec<_>>>()?;
    let s = serde_json::to_string_pretty(&values)?;
    if let Some(path) = &cli.out {
        write_all_atomically(path, s.as_bytes())?;
    } else {
        println!("{s}");
    }
    Ok(())
}

#[cfg(not(feature = "with-serde"))]
fn write_json<R: Report>(_: &[R], _: &Cli) -> Result<()> {
    bail!("format=json nécessite la feature 'with-serde'")
}

#[cfg(feature = "with-serde")]
fn write_ndjson<R: Report>(rows: &[R], cli: &Cli) -> Result<()> {
    let mut buf = Vec::new();
    for row in rows {
        let line = serde_json::to_string(&row.json()?)?;
        buf.extend_from_slice(line.as_bytes());
        buf.push(b'\n');
    }
    if let Some(path) = &cli.out {
        write_all_atomically(path, &buf)?;
    } else {
        print!("{}", String::from_utf8_lossy(&buf));
    }
    Ok(())
}

#[cfg(not(feature = "with-serde"))]
fn write_ndjson<R: Report>(_: &[R], _: &Cli) -> Result<()> {
    bail!("format=ndjson nécessite la feature 'with-serde'")
}

#[cfg(feature = "with-csv")]
fn write_csv<R: Report>(rows: &[R], cli: &Cli) -> Result<()> {
    if let Some(path) = &cli.out {
        let mut wtr = csv::Writer::from_writer(Vec::new());
        for row in rows {
            wtr.write_record(row.csv_fields())?;
        }
        let data = wtr.into_inner()?;
        write_all_atomically(path, &data)?;
    } else {
        let mut wtr = csv::Writer::from_writer(std::io::stdout());
        for row in rows {
            wtr.write_record(row.csv_fields())?;
        }
        wtr.flush()?;
    }
    Ok(())
}

#[cfg(not(feature = "with-csv"))]
fn write_csv<R: Report>(_: &[R], _: &Cli) -> Result<()> {
    bail!("format=csv nécessite la feature 'with-csv'")
}

#[cfg(any(feature = "with-serde", feature = "with-csv"))]
fn write_all_atomically(path: &str, bytes: &[u8]) -> Result<()> {
    use std::io::Write;

    let tmp = format!("{path}.tmp");
    {
        let mut f = std::fs::File::create(&tmp).with_context(|| format!("create {tmp}"))?;
        f.write_all(bytes)?;
        f.sync_all()?;
    }
    std::fs::rename(&tmp, path).with_context(|| format!("rename {tmp} -> {path}"))?;
    Ok(())
}
