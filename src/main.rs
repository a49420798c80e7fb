use anyhow::Result;
use collide_rs::{run, Config};

fn main() -> Result<()> {
    let cfg = Config::new()?;
    run(cfg)
}
