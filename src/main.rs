fn main() -> anyhow::Result<()> {
    playdeck::run()?;
    Ok(())
}
