//! Config command for showing the effective merge configuration.

use std::io::Write;

use anyhow::{Context, Result};

use crate::Config;

/// Writes the configuration as TOML, flagging settings that cannot be used.
pub fn run<W: Write>(writer: &mut W, config: &Config) -> Result<()> {
    let rendered = config
        .to_toml()
        .context("failed to render configuration")?;
    write!(writer, "{rendered}")?;

    if let Err(err) = config.merge.validate() {
        writeln!(writer, "# invalid: {err}")?;
    }

    Ok(())
}
