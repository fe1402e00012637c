fn main() -> anyhow::Result<()> {
    unitext::cli::run_cli()
}
