use anyhow::Result;

pub fn execute() -> Result<()> {
    println!("dbpulse version {}", env!("CARGO_PKG_VERSION"));
    Ok(())
}
