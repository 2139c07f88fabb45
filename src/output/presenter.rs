use std::io::{self, Write};

use serde_json::Value;

use super::config::{OutputConfig, OutputFormat};
use super::types::Envelope;

pub trait Presenter: Send + Sync {
    fn emit(&self, env: &Envelope, w: &mut dyn Write) -> io::Result<()>;
}

pub struct JsonPresenter { pub pretty: bool }
impl Presenter for JsonPresenter {
    fn emit(&self, env: &Envelope, w: &mut dyn Write) -> io::Result<()> {
        if self.pretty { serde_json::to_writer_pretty(&mut *w, env).map_err(to_io)? } else { serde_json::to_writer(&mut *w, env).map_err(to_io)? }
        writeln!(w)
    }
}

/// Flat `key: value` rendering of the result object, one field per line.
pub struct TextPresenter { pub pretty: bool }
impl Presenter for TextPresenter {
    fn emit(&self, env: &Envelope, w: &mut dyn Write) -> io::Result<()> {
        writeln!(w, "Result: {}", env.op)?;
        match &env.result {
            Some(Value::Object(map)) if !self.pretty => {
                for (k, v) in map {
                    match v {
                        Value::String(s) => writeln!(w, "  {k}: {s}")?,
                        Value::Null => writeln!(w, "  {k}: -")?,
                        other => writeln!(w, "  {k}: {other}")?,
                    }
                }
            }
            Some(res) => { serde_json::to_writer_pretty(&mut *w, res).map_err(to_io)?; writeln!(w)?; }
            None => {}
        }
        Ok(())
    }
}

pub struct Emitter {
    presenter: Box<dyn Presenter>,
}

impl Emitter {
    pub fn from_config(cfg: OutputConfig) -> Self {
        let presenter: Box<dyn Presenter> = match cfg.format {
            OutputFormat::Json => Box::new(JsonPresenter { pretty: cfg.pretty }),
            OutputFormat::Text => Box::new(TextPresenter { pretty: cfg.pretty }),
        };
        Emitter { presenter }
    }

    pub fn emit(&self, env: &Envelope) -> io::Result<()> {
        let mut out = io::stdout();
        self.presenter.emit(env, &mut out)?;
        out.flush()
    }
}

fn to_io(e: serde_json::Error) -> io::Error { io::Error::new(io::ErrorKind::Other, e) }

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn text_presenter_lists_fields() {
        let env = Envelope::result("stats", &json!({"total": 4, "latest": null}), None).unwrap();
        let mut buf = Vec::new();
        TextPresenter { pretty: false }.emit(&env, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("Result: stats\n"));
        assert!(text.contains("  total: 4\n"));
        assert!(text.contains("  latest: -\n"));
    }

    #[test]
    fn json_presenter_writes_single_line() {
        let env = Envelope::result("ingest", &json!({"fetched": 2}), None).unwrap();
        let mut buf = Vec::new();
        JsonPresenter { pretty: false }.emit(&env, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(text.contains("\"fetched\":2"));
    }
}
