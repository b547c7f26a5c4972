use anyhow::Result;
use till_cli::app;

fn main() -> Result<()> {
    app::run()
}
